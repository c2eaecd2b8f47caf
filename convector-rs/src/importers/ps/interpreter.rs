//! Operand stack, dictionary stack and the execution loop.

use super::lexer::{Lexer, Token};
use super::operators::system_dict;
use super::value::{new_dict, Dict, Value};
use convector_core::{Canvas, ConvectorError, ConvectorResult};
use std::rc::Rc;

/// Nested procedure calls deeper than this abort the program.
const MAX_EXEC_DEPTH: usize = 256;

/// Non-local control flow raised while executing.
#[derive(Debug)]
pub(crate) enum Interrupt {
    /// `exit`: leave the innermost loop.
    Exit,
    /// `stop`: unwind to the innermost `stopped`.
    Stop,
    /// `quit`: end the program.
    Quit,
    Error(ConvectorError),
}

impl From<ConvectorError> for Interrupt {
    fn from(e: ConvectorError) -> Self {
        Interrupt::Error(e)
    }
}

pub(crate) type ExecResult<T = ()> = Result<T, Interrupt>;

pub(crate) fn malformed(msg: impl Into<String>) -> Interrupt {
    Interrupt::Error(ConvectorError::malformed(msg))
}

pub(crate) struct Interpreter {
    pub(crate) operands: Vec<Value>,
    /// `systemdict`, `userdict`, then dictionaries pushed by `begin`.
    pub(crate) dicts: Vec<Dict>,
    /// Name of the operator being run.
    pub(crate) current: &'static str,
    depth: usize,
}

impl Interpreter {
    pub fn new() -> Self {
        let system = system_dict();
        let user = new_dict();
        {
            let mut s = system.borrow_mut();
            s.insert("systemdict".into(), Value::Dict(system.clone()));
            s.insert("userdict".into(), Value::Dict(user.clone()));
            s.insert("statusdict".into(), Value::Dict(new_dict()));
            s.insert("errordict".into(), Value::Dict(new_dict()));
        }
        Self {
            operands: Vec::new(),
            dicts: vec![system, user],
            current: "",
            depth: 0,
        }
    }

    /// Scan and execute a whole program.
    pub fn run(&mut self, input: &[u8], canvas: &mut Canvas) -> ConvectorResult<()> {
        let mut lexer = Lexer::new(input);
        while let Some(token) = lexer.next_token()? {
            let value = match token {
                Token::ProcBegin => self.procedure(&mut lexer)?,
                Token::ProcEnd => return Err(ConvectorError::malformed("unbalanced }")),
                token => self.token_value(token)?,
            };
            match self.execute_token(value, canvas) {
                Ok(()) => {}
                Err(Interrupt::Quit) => return Ok(()),
                Err(Interrupt::Exit) => {
                    log::warn!(target: "import", "exit outside a loop ignored")
                }
                Err(Interrupt::Stop) => {
                    return Err(ConvectorError::malformed("stop outside stopped"))
                }
                Err(Interrupt::Error(e)) => return Err(e),
            }
        }
        Ok(())
    }

    fn token_value(&self, token: Token) -> ConvectorResult<Value> {
        Ok(match token {
            Token::Number(n) => Value::Number(n),
            Token::Name(name) => Value::name(&name),
            Token::LiteralName(name) => Value::literal_name(&name),
            Token::ImmediateName(name) => self
                .lookup(&name)
                .ok_or(ConvectorError::UnknownOperator(name))?,
            Token::String(bytes) => Value::string(bytes),
            Token::ProcBegin | Token::ProcEnd => {
                return Err(ConvectorError::malformed("unexpected procedure delimiter"))
            }
        })
    }

    /// Body of a procedure, after its opening brace.
    fn procedure(&self, lexer: &mut Lexer) -> ConvectorResult<Value> {
        let mut body = Vec::new();
        loop {
            match lexer.next_token()? {
                None => return Err(ConvectorError::malformed("unterminated procedure")),
                Some(Token::ProcEnd) => return Ok(Value::Procedure(Rc::new(body))),
                Some(Token::ProcBegin) => body.push(self.procedure(lexer)?),
                Some(token) => body.push(self.token_value(token)?),
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.dicts
            .iter()
            .rev()
            .find_map(|d| d.borrow().get(name).cloned())
    }

    /// Execute an object as met in program text: executable names are looked
    /// up and run, operators run, everything else is pushed.
    pub fn execute_token(&mut self, value: Value, canvas: &mut Canvas) -> ExecResult {
        match value {
            Value::Name {
                name,
                executable: true,
            } => {
                let found = self
                    .lookup(&name)
                    .ok_or_else(|| ConvectorError::UnknownOperator(name.to_string()))?;
                self.execute_value(found, canvas)
            }
            Value::Operator(op) => {
                self.current = op.name;
                (op.func)(self, canvas)
            }
            other => {
                self.operands.push(other);
                Ok(())
            }
        }
    }

    /// Execute an object explicitly, as `exec` does: procedures run their
    /// body.
    pub fn execute_value(&mut self, value: Value, canvas: &mut Canvas) -> ExecResult {
        match value {
            Value::Procedure(body) => {
                if self.depth >= MAX_EXEC_DEPTH {
                    return Err(malformed("execstackoverflow"));
                }
                self.depth += 1;
                let result = body
                    .iter()
                    .try_for_each(|item| self.execute_token(item.clone(), canvas));
                self.depth -= 1;
                result
            }
            other => self.execute_token(other, canvas),
        }
    }

    pub fn push(&mut self, value: Value) {
        self.operands.push(value);
    }

    pub fn push_number(&mut self, n: f64) {
        self.operands.push(Value::Number(n));
    }

    pub fn pop(&mut self) -> ExecResult<Value> {
        self.operands
            .pop()
            .ok_or_else(|| malformed(format!("stackunderflow in {}", self.current)))
    }

    pub fn peek(&self) -> ExecResult<&Value> {
        self.operands
            .last()
            .ok_or_else(|| malformed(format!("stackunderflow in {}", self.current)))
    }

    fn typecheck(&self, expected: &str, found: &Value) -> Interrupt {
        malformed(format!(
            "typecheck in {}: expected {}, found {}",
            self.current,
            expected,
            found.type_name()
        ))
    }

    pub fn pop_number(&mut self) -> ExecResult<f64> {
        match self.pop()? {
            Value::Number(n) => Ok(n),
            other => Err(self.typecheck("number", &other)),
        }
    }

    /// `N` numbers, bottom-most first.
    pub fn pop_numbers<const N: usize>(&mut self) -> ExecResult<[f64; N]> {
        if self.operands.len() < N {
            return Err(malformed(format!("stackunderflow in {}", self.current)));
        }
        let mut out = [0.0; N];
        for slot in out.iter_mut().rev() {
            *slot = self.pop_number()?;
        }
        Ok(out)
    }

    pub fn pop_int(&mut self) -> ExecResult<i64> {
        let n = self.pop_number()?;
        if n.fract() != 0.0 {
            return Err(malformed(format!("typecheck in {}: expected integer", self.current)));
        }
        Ok(n as i64)
    }

    /// A non-negative integer, such as a count or an index.
    pub fn pop_count(&mut self) -> ExecResult<usize> {
        let n = self.pop_int()?;
        usize::try_from(n).map_err(|_| malformed(format!("rangecheck in {}", self.current)))
    }

    pub fn pop_bool(&mut self) -> ExecResult<bool> {
        match self.pop()? {
            Value::Bool(b) => Ok(b),
            other => Err(self.typecheck("boolean", &other)),
        }
    }

    pub fn pop_dict(&mut self) -> ExecResult<Dict> {
        match self.pop()? {
            Value::Dict(d) => Ok(d),
            other => Err(self.typecheck("dictionary", &other)),
        }
    }

    pub fn pop_bytes(&mut self) -> ExecResult<Vec<u8>> {
        match self.pop()? {
            Value::String(s) => Ok(s.borrow().clone()),
            other => Err(self.typecheck("string", &other)),
        }
    }

    /// Elements of an array or procedure.
    pub fn pop_items(&mut self) -> ExecResult<Vec<Value>> {
        match self.pop()? {
            Value::Array(a) => Ok(a.borrow().clone()),
            Value::Procedure(p) => Ok(p.as_ref().clone()),
            other => Err(self.typecheck("array", &other)),
        }
    }

    /// An array of numbers, such as a matrix or a dash pattern.
    pub fn pop_number_array(&mut self) -> ExecResult<Vec<f64>> {
        self.pop_items()?
            .into_iter()
            .map(|v| match v {
                Value::Number(n) => Ok(n),
                other => Err(self.typecheck("number", &other)),
            })
            .collect()
    }

    /// Something executable, such as a loop body.
    pub fn pop_proc(&mut self) -> ExecResult<Value> {
        match self.pop()? {
            v @ (Value::Procedure(_) | Value::Operator(_) | Value::Name { .. }) => Ok(v),
            other => Err(self.typecheck("procedure", &other)),
        }
    }

    /// Index of the topmost mark.
    pub fn mark_index(&self) -> ExecResult<usize> {
        self.operands
            .iter()
            .rposition(|v| matches!(v, Value::Mark))
            .ok_or_else(|| malformed(format!("unmatchedmark in {}", self.current)))
    }

    /// Pop everything above the topmost mark, and the mark.
    pub fn pop_to_mark(&mut self) -> ExecResult<Vec<Value>> {
        let index = self.mark_index()?;
        let items = self.operands.split_off(index + 1);
        self.operands.pop();
        Ok(items)
    }

    /// Run `body`, treating `exit` as the end of the enclosing loop.
    /// Returns `false` once the loop must stop.
    pub fn loop_body(&mut self, body: &Value, canvas: &mut Canvas) -> ExecResult<bool> {
        match self.execute_value(body.clone(), canvas) {
            Ok(()) => Ok(true),
            Err(Interrupt::Exit) => Ok(false),
            Err(other) => Err(other),
        }
    }
}
