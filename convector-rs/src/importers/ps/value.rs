//! PostScript objects.

use super::interpreter::Interrupt;
use super::Interpreter;
use convector_core::{Canvas, ConvectorError};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub(crate) type OpFn = fn(&mut Interpreter, &mut Canvas) -> Result<(), Interrupt>;

#[derive(Clone, Copy)]
pub(crate) struct Operator {
    pub name: &'static str,
    pub func: OpFn,
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "--{}--", self.name)
    }
}

pub(crate) type Dict = Rc<RefCell<HashMap<Rc<str>, Value>>>;

pub(crate) fn new_dict() -> Dict {
    Rc::new(RefCell::new(HashMap::new()))
}

/// A PostScript object. Composite objects share their storage, as in
/// PostScript: `dup` copies the reference, not the contents.
#[derive(Debug, Clone)]
pub(crate) enum Value {
    Number(f64),
    Bool(bool),
    Name { name: Rc<str>, executable: bool },
    String(Rc<RefCell<Vec<u8>>>),
    Array(Rc<RefCell<Vec<Value>>>),
    Procedure(Rc<Vec<Value>>),
    Dict(Dict),
    Operator(Operator),
    Mark,
    Null,
}

impl Value {
    pub fn name(name: &str) -> Self {
        Value::Name {
            name: name.into(),
            executable: true,
        }
    }

    pub fn literal_name(name: &str) -> Self {
        Value::Name {
            name: name.into(),
            executable: false,
        }
    }

    pub fn string(bytes: Vec<u8>) -> Self {
        Value::String(Rc::new(RefCell::new(bytes)))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(n) if n.fract() == 0.0 => "integertype",
            Value::Number(_) => "realtype",
            Value::Bool(_) => "booleantype",
            Value::Name { .. } => "nametype",
            Value::String(_) => "stringtype",
            Value::Array(_) | Value::Procedure(_) => "arraytype",
            Value::Dict(_) => "dicttype",
            Value::Operator(_) => "operatortype",
            Value::Mark => "marktype",
            Value::Null => "nulltype",
        }
    }

    /// Dictionary key for names, strings and numbers.
    pub fn key(&self) -> Result<Rc<str>, ConvectorError> {
        match self {
            Value::Name { name, .. } => Ok(name.clone()),
            Value::String(s) => Ok(String::from_utf8_lossy(&s.borrow()).as_ref().into()),
            Value::Number(n) => Ok(format_number(*n).into()),
            Value::Bool(b) => Ok(b.to_string().into()),
            other => Err(ConvectorError::malformed(format!(
                "typecheck: {} as dictionary key",
                other.type_name()
            ))),
        }
    }

    /// PostScript `eq`: numbers by value, names and strings by text,
    /// composites by identity.
    pub fn ps_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Name { .. } | Value::String(_), Value::Name { .. } | Value::String(_)) => {
                matches!((self.key(), other.key()), (Ok(a), Ok(b)) if a == b)
            }
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Procedure(a), Value::Procedure(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
            (Value::Operator(a), Value::Operator(b)) => a.name == b.name,
            (Value::Mark, Value::Mark) | (Value::Null, Value::Null) => true,
            _ => false,
        }
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_and_strings_compare_by_text() {
        assert!(Value::literal_name("abc").ps_eq(&Value::string(b"abc".to_vec())));
        assert!(!Value::name("abc").ps_eq(&Value::name("abd")));
    }

    #[test]
    fn test_composites_compare_by_identity() {
        let a = Value::array(vec![Value::Number(1.0)]);
        let b = Value::array(vec![Value::Number(1.0)]);
        assert!(a.ps_eq(&a.clone()));
        assert!(!a.ps_eq(&b));
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Number(2.0).type_name(), "integertype");
        assert_eq!(Value::Number(2.5).type_name(), "realtype");
        assert_eq!(Value::Mark.type_name(), "marktype");
    }

    #[test]
    fn test_number_keys() {
        assert_eq!(&*Value::Number(3.0).key().unwrap(), "3");
        assert!(Value::Mark.key().is_err());
    }
}
