//! Built-in operators of the PostScript subset.

use super::interpreter::{malformed, ExecResult, Interrupt, Interpreter};
use super::value::{format_number, new_dict, Dict, OpFn, Operator, Value};
use convector_core::kurbo::{Point, Rect};
use convector_core::{
    Canvas, Color, ConvectorError, CubicBezierParams, LineCap, LineJoin, Region, Transform,
    WindingRule,
};
use std::rc::Rc;

/// `loop` bodies running longer than this abort the program.
const MAX_LOOP_ITERATIONS: usize = 10_000_000;

/// Letter-size page used when `clippath` runs without a clip.
const PAGE: Rect = Rect::new(0.0, 0.0, 612.0, 792.0);

/// Recognized operators that this interpreter does not implement.
const UNSUPPORTED: &[&str] = &[
    "image",
    "colorimage",
    "imagemask",
    "kshow",
    "currentmatrix",
    "filenameforall",
    "eexec",
];

const OPERATORS: &[(&str, OpFn)] = &[
    // Stack
    ("pop", op_pop),
    ("exch", op_exch),
    ("dup", op_dup),
    ("copy", op_copy),
    ("index", op_index),
    ("roll", op_roll),
    ("clear", op_clear),
    ("count", op_count),
    ("mark", op_mark),
    ("[", op_mark),
    ("<<", op_mark),
    ("cleartomark", op_cleartomark),
    ("counttomark", op_counttomark),
    // Math
    ("add", op_add),
    ("sub", op_sub),
    ("mul", op_mul),
    ("div", op_div),
    ("idiv", op_idiv),
    ("mod", op_mod),
    ("abs", op_abs),
    ("neg", op_neg),
    ("ceiling", op_ceiling),
    ("floor", op_floor),
    ("round", op_round),
    ("truncate", op_truncate),
    ("sqrt", op_sqrt),
    ("sin", op_sin),
    ("cos", op_cos),
    ("atan", op_atan),
    ("exp", op_exp),
    ("ln", op_ln),
    ("log", op_log),
    // Arrays and dictionaries
    ("array", op_array),
    ("]", op_array_end),
    (">>", op_dict_end),
    ("astore", op_astore),
    ("aload", op_aload),
    ("length", op_length),
    ("dict", op_dict),
    ("begin", op_begin),
    ("end", op_end),
    ("def", op_def),
    ("load", op_load),
    ("get", op_get),
    ("put", op_put),
    ("known", op_known),
    ("where", op_where),
    ("currentdict", op_currentdict),
    // Relational and boolean
    ("eq", op_eq),
    ("ne", op_ne),
    ("gt", op_gt),
    ("lt", op_lt),
    ("ge", op_ge),
    ("le", op_le),
    ("and", op_and),
    ("or", op_or),
    ("xor", op_xor),
    ("not", op_not),
    // Control
    ("exec", op_exec),
    ("if", op_if),
    ("ifelse", op_ifelse),
    ("repeat", op_repeat),
    ("for", op_for),
    ("forall", op_forall),
    ("loop", op_loop),
    ("exit", op_exit),
    ("stop", op_stop),
    ("stopped", op_stopped),
    ("quit", op_quit),
    // Conversions and attributes
    ("cvx", op_cvx),
    ("cvlit", op_cvlit),
    ("cvi", op_cvi),
    ("cvr", op_cvr),
    ("bind", op_bind),
    ("readonly", op_noop),
    ("executeonly", op_noop),
    ("noaccess", op_noop),
    ("type", op_type),
    // Graphics state
    ("gsave", op_gsave),
    ("grestore", op_grestore),
    ("grestoreall", op_grestoreall),
    ("save", op_save),
    ("restore", op_restore),
    ("setlinewidth", op_setlinewidth),
    ("setlinecap", op_setlinecap),
    ("setlinejoin", op_setlinejoin),
    ("setmiterlimit", op_setmiterlimit),
    ("setdash", op_setdash),
    ("setrgbcolor", op_setrgbcolor),
    ("setgray", op_setgray),
    ("sethsbcolor", op_sethsbcolor),
    ("setcmykcolor", op_setcmykcolor),
    // Matrices
    ("matrix", op_matrix),
    ("translate", op_translate),
    ("scale", op_scale),
    ("rotate", op_rotate),
    ("concat", op_concat),
    ("setmatrix", op_setmatrix),
    // Path construction
    ("newpath", op_newpath),
    ("moveto", op_moveto),
    ("rmoveto", op_rmoveto),
    ("lineto", op_lineto),
    ("rlineto", op_rlineto),
    ("curveto", op_curveto),
    ("rcurveto", op_rcurveto),
    ("arc", op_arc),
    ("arcn", op_arcn),
    ("closepath", op_closepath),
    ("currentpoint", op_currentpoint),
    ("pathbbox", op_pathbbox),
    ("clippath", op_clippath),
    // Painting
    ("fill", op_fill),
    ("eofill", op_eofill),
    ("stroke", op_stroke),
    ("clip", op_clip),
    ("eoclip", op_eoclip),
    ("showpage", op_noop),
    // Fonts
    ("findfont", op_findfont),
    ("scalefont", op_scalefont),
    ("setfont", op_setfont),
    ("show", op_show),
    ("charpath", op_charpath),
];

pub(crate) fn system_dict() -> Dict {
    let dict = new_dict();
    {
        let mut d = dict.borrow_mut();
        for (name, func) in OPERATORS {
            d.insert(
                (*name).into(),
                Value::Operator(Operator {
                    name: *name,
                    func: *func,
                }),
            );
        }
        for name in UNSUPPORTED {
            d.insert(
                (*name).into(),
                Value::Operator(Operator {
                    name: *name,
                    func: op_unsupported,
                }),
            );
        }
        d.insert("true".into(), Value::Bool(true));
        d.insert("false".into(), Value::Bool(false));
        d.insert("null".into(), Value::Null);
    }
    dict
}

fn op_noop(_: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    Ok(())
}

fn op_unsupported(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    Err(ConvectorError::UnsupportedOperator(ps.current.to_string()).into())
}

// Stack

fn op_pop(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    ps.pop().map(drop)
}

fn op_exch(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let b = ps.pop()?;
    let a = ps.pop()?;
    ps.push(b);
    ps.push(a);
    Ok(())
}

fn op_dup(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let top = ps.peek()?.clone();
    ps.push(top);
    Ok(())
}

fn op_copy(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let n = ps.pop_count()?;
    let len = ps.operands.len();
    if n > len {
        return Err(malformed("stackunderflow in copy"));
    }
    let copied = ps.operands[len - n..].to_vec();
    ps.operands.extend(copied);
    Ok(())
}

fn op_index(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let n = ps.pop_count()?;
    let len = ps.operands.len();
    if n >= len {
        return Err(malformed("stackunderflow in index"));
    }
    let value = ps.operands[len - 1 - n].clone();
    ps.push(value);
    Ok(())
}

fn op_roll(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let j = ps.pop_int()?;
    let n = ps.pop_count()?;
    let len = ps.operands.len();
    if n > len {
        return Err(malformed("stackunderflow in roll"));
    }
    if n > 0 {
        let shift = j.rem_euclid(n as i64) as usize;
        ps.operands[len - n..].rotate_right(shift);
    }
    Ok(())
}

fn op_clear(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    ps.operands.clear();
    Ok(())
}

fn op_count(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let n = ps.operands.len();
    ps.push_number(n as f64);
    Ok(())
}

fn op_mark(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    ps.push(Value::Mark);
    Ok(())
}

fn op_cleartomark(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    ps.pop_to_mark().map(drop)
}

fn op_counttomark(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let index = ps.mark_index()?;
    let n = ps.operands.len() - index - 1;
    ps.push_number(n as f64);
    Ok(())
}

// Math

fn binary(ps: &mut Interpreter, f: impl Fn(f64, f64) -> f64) -> ExecResult {
    let [a, b] = ps.pop_numbers::<2>()?;
    ps.push_number(f(a, b));
    Ok(())
}

fn unary(ps: &mut Interpreter, f: impl Fn(f64) -> f64) -> ExecResult {
    let n = ps.pop_number()?;
    ps.push_number(f(n));
    Ok(())
}

fn op_add(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    binary(ps, |a, b| a + b)
}

fn op_sub(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    binary(ps, |a, b| a - b)
}

fn op_mul(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    binary(ps, |a, b| a * b)
}

fn op_div(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let [a, b] = ps.pop_numbers::<2>()?;
    if b == 0.0 {
        return Err(malformed("undefinedresult in div"));
    }
    ps.push_number(a / b);
    Ok(())
}

fn op_idiv(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let b = ps.pop_int()?;
    let a = ps.pop_int()?;
    if b == 0 {
        return Err(malformed("undefinedresult in idiv"));
    }
    ps.push_number((a / b) as f64);
    Ok(())
}

fn op_mod(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let b = ps.pop_int()?;
    let a = ps.pop_int()?;
    if b == 0 {
        return Err(malformed("undefinedresult in mod"));
    }
    ps.push_number((a % b) as f64);
    Ok(())
}

fn op_abs(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    unary(ps, f64::abs)
}

fn op_neg(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    unary(ps, |n| -n)
}

fn op_ceiling(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    unary(ps, f64::ceil)
}

fn op_floor(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    unary(ps, f64::floor)
}

/// Halves round up, as in PostScript.
fn op_round(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    unary(ps, |n| (n + 0.5).floor())
}

fn op_truncate(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    unary(ps, f64::trunc)
}

fn op_sqrt(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let n = ps.pop_number()?;
    if n < 0.0 {
        return Err(malformed("rangecheck in sqrt"));
    }
    ps.push_number(n.sqrt());
    Ok(())
}

fn op_sin(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    unary(ps, |deg| deg.to_radians().sin())
}

fn op_cos(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    unary(ps, |deg| deg.to_radians().cos())
}

/// Angle of `num/den` in degrees, within [0, 360).
fn op_atan(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let [num, den] = ps.pop_numbers::<2>()?;
    if num == 0.0 && den == 0.0 {
        return Err(malformed("undefinedresult in atan"));
    }
    let deg = num.atan2(den).to_degrees();
    ps.push_number(if deg < 0.0 { deg + 360.0 } else { deg });
    Ok(())
}

fn op_exp(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    binary(ps, f64::powf)
}

fn op_ln(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    unary(ps, f64::ln)
}

fn op_log(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    unary(ps, f64::log10)
}

// Arrays and dictionaries

fn op_array(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let n = ps.pop_count()?;
    ps.push(Value::array(vec![Value::Null; n]));
    Ok(())
}

fn op_array_end(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let items = ps.pop_to_mark()?;
    ps.push(Value::array(items));
    Ok(())
}

fn op_dict_end(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let items = ps.pop_to_mark()?;
    if items.len() % 2 == 1 {
        return Err(malformed("rangecheck in >>"));
    }
    let dict = new_dict();
    for pair in items.chunks(2) {
        dict.borrow_mut().insert(pair[0].key()?, pair[1].clone());
    }
    ps.push(Value::Dict(dict));
    Ok(())
}

fn op_astore(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let Value::Array(array) = ps.pop()? else {
        return Err(malformed("typecheck in astore"));
    };
    let n = array.borrow().len();
    let len = ps.operands.len();
    if n > len {
        return Err(malformed("stackunderflow in astore"));
    }
    let items = ps.operands.split_off(len - n);
    *array.borrow_mut() = items;
    ps.push(Value::Array(array));
    Ok(())
}

fn op_aload(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let array = ps.pop()?;
    let items = match &array {
        Value::Array(a) => a.borrow().clone(),
        Value::Procedure(p) => p.as_ref().clone(),
        _ => return Err(malformed("typecheck in aload")),
    };
    ps.operands.extend(items);
    ps.push(array);
    Ok(())
}

fn op_length(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let n = match ps.pop()? {
        Value::Array(a) => a.borrow().len(),
        Value::Procedure(p) => p.len(),
        Value::String(s) => s.borrow().len(),
        Value::Dict(d) => d.borrow().len(),
        Value::Name { name, .. } => name.len(),
        _ => return Err(malformed("typecheck in length")),
    };
    ps.push_number(n as f64);
    Ok(())
}

fn op_dict(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    ps.pop_count()?;
    ps.push(Value::Dict(new_dict()));
    Ok(())
}

fn op_begin(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let dict = ps.pop_dict()?;
    ps.dicts.push(dict);
    Ok(())
}

fn op_end(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    if ps.dicts.len() <= 2 {
        return Err(malformed("dictstackunderflow in end"));
    }
    ps.dicts.pop();
    Ok(())
}

fn op_def(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let value = ps.pop()?;
    let key = ps.pop()?.key()?;
    if let Some(top) = ps.dicts.last() {
        top.borrow_mut().insert(key, value);
    }
    Ok(())
}

fn op_load(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let key = ps.pop()?.key()?;
    let value = ps
        .lookup(&key)
        .ok_or_else(|| ConvectorError::UnknownOperator(key.to_string()))?;
    ps.push(value);
    Ok(())
}

fn element<T: Clone>(items: &[T], index: i64) -> ExecResult<T> {
    usize::try_from(index)
        .ok()
        .and_then(|i| items.get(i).cloned())
        .ok_or_else(|| malformed("rangecheck in get"))
}

fn op_get(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let key = ps.pop()?;
    let value = match ps.pop()? {
        Value::Dict(d) => {
            let key = key.key()?;
            let found = d.borrow().get(&key).cloned();
            found.ok_or(ConvectorError::UnknownOperator(key.to_string()))?
        }
        container => {
            let Value::Number(index) = key else {
                return Err(malformed("typecheck in get"));
            };
            let index = index as i64;
            match container {
                Value::Array(a) => element(&a.borrow(), index)?,
                Value::Procedure(p) => element(&p, index)?,
                Value::String(s) => Value::Number(element(&s.borrow(), index)? as f64),
                _ => return Err(malformed("typecheck in get")),
            }
        }
    };
    ps.push(value);
    Ok(())
}

fn op_put(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let value = ps.pop()?;
    let key = ps.pop()?;
    match ps.pop()? {
        Value::Dict(d) => {
            d.borrow_mut().insert(key.key()?, value);
        }
        Value::Array(a) => {
            let Value::Number(index) = key else {
                return Err(malformed("typecheck in put"));
            };
            let mut items = a.borrow_mut();
            let slot = usize::try_from(index as i64)
                .ok()
                .and_then(|i| items.get_mut(i))
                .ok_or_else(|| malformed("rangecheck in put"))?;
            *slot = value;
        }
        Value::String(s) => {
            let (Value::Number(index), Value::Number(byte)) = (key, value) else {
                return Err(malformed("typecheck in put"));
            };
            let mut bytes = s.borrow_mut();
            let slot = usize::try_from(index as i64)
                .ok()
                .and_then(|i| bytes.get_mut(i))
                .ok_or_else(|| malformed("rangecheck in put"))?;
            *slot = byte as u8;
        }
        _ => return Err(malformed("typecheck in put")),
    }
    Ok(())
}

fn op_known(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let key = ps.pop()?.key()?;
    let dict = ps.pop_dict()?;
    let known = dict.borrow().contains_key(&key);
    ps.push(Value::Bool(known));
    Ok(())
}

fn op_where(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let key = ps.pop()?.key()?;
    let found = ps
        .dicts
        .iter()
        .rev()
        .find(|d| d.borrow().contains_key(&key))
        .cloned();
    match found {
        Some(dict) => {
            ps.push(Value::Dict(dict));
            ps.push(Value::Bool(true));
        }
        None => ps.push(Value::Bool(false)),
    }
    Ok(())
}

fn op_currentdict(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    if let Some(top) = ps.dicts.last().cloned() {
        ps.push(Value::Dict(top));
    }
    Ok(())
}

// Relational and boolean

fn op_eq(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let b = ps.pop()?;
    let a = ps.pop()?;
    ps.push(Value::Bool(a.ps_eq(&b)));
    Ok(())
}

fn op_ne(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let b = ps.pop()?;
    let a = ps.pop()?;
    ps.push(Value::Bool(!a.ps_eq(&b)));
    Ok(())
}

/// Numbers compare by value, strings byte-wise.
fn compare(ps: &mut Interpreter, accept: fn(std::cmp::Ordering) -> bool) -> ExecResult {
    let b = ps.pop()?;
    let a = ps.pop()?;
    let ordering = match (&a, &b) {
        (Value::Number(x), Value::Number(y)) => x
            .partial_cmp(y)
            .ok_or_else(|| malformed(format!("undefinedresult in {}", ps.current)))?,
        (Value::String(x), Value::String(y)) => x.borrow().as_slice().cmp(y.borrow().as_slice()),
        _ => return Err(malformed(format!("typecheck in {}", ps.current))),
    };
    ps.push(Value::Bool(accept(ordering)));
    Ok(())
}

fn op_gt(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    compare(ps, |o| o.is_gt())
}

fn op_lt(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    compare(ps, |o| o.is_lt())
}

fn op_ge(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    compare(ps, |o| o.is_ge())
}

fn op_le(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    compare(ps, |o| o.is_le())
}

/// Booleans logically, integers bitwise.
fn logical(
    ps: &mut Interpreter,
    bools: fn(bool, bool) -> bool,
    ints: fn(i64, i64) -> i64,
) -> ExecResult {
    let b = ps.pop()?;
    let a = ps.pop()?;
    let result = match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => Value::Bool(bools(x, y)),
        (Value::Number(x), Value::Number(y)) => Value::Number(ints(x as i64, y as i64) as f64),
        _ => return Err(malformed(format!("typecheck in {}", ps.current))),
    };
    ps.push(result);
    Ok(())
}

fn op_and(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    logical(ps, |a, b| a && b, |a, b| a & b)
}

fn op_or(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    logical(ps, |a, b| a || b, |a, b| a | b)
}

fn op_xor(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    logical(ps, |a, b| a ^ b, |a, b| a ^ b)
}

fn op_not(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let value = match ps.pop()? {
        Value::Bool(b) => Value::Bool(!b),
        Value::Number(n) => Value::Number(!(n as i64) as f64),
        _ => return Err(malformed("typecheck in not")),
    };
    ps.push(value);
    Ok(())
}

// Control

fn op_exec(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let value = ps.pop()?;
    ps.execute_value(value, canvas)
}

fn op_if(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let body = ps.pop_proc()?;
    if ps.pop_bool()? {
        ps.execute_value(body, canvas)?;
    }
    Ok(())
}

fn op_ifelse(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let otherwise = ps.pop_proc()?;
    let then = ps.pop_proc()?;
    let body = if ps.pop_bool()? { then } else { otherwise };
    ps.execute_value(body, canvas)
}

fn op_repeat(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let body = ps.pop_proc()?;
    let n = ps.pop_count()?;
    for _ in 0..n {
        if !ps.loop_body(&body, canvas)? {
            break;
        }
    }
    Ok(())
}

fn op_for(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let body = ps.pop_proc()?;
    let [initial, increment, limit] = ps.pop_numbers::<3>()?;
    if increment == 0.0 {
        return Err(malformed("rangecheck in for"));
    }
    let mut control = initial;
    let mut iterations = 0;
    while (increment > 0.0 && control <= limit) || (increment < 0.0 && control >= limit) {
        iterations += 1;
        if iterations > MAX_LOOP_ITERATIONS {
            return Err(malformed("limitcheck in for"));
        }
        ps.push_number(control);
        if !ps.loop_body(&body, canvas)? {
            break;
        }
        control += increment;
    }
    Ok(())
}

fn op_forall(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let body = ps.pop_proc()?;
    let groups: Vec<Vec<Value>> = match ps.pop()? {
        Value::Array(a) => a.borrow().iter().map(|v| vec![v.clone()]).collect(),
        Value::Procedure(p) => p.iter().map(|v| vec![v.clone()]).collect(),
        Value::String(s) => s
            .borrow()
            .iter()
            .map(|b| vec![Value::Number(*b as f64)])
            .collect(),
        Value::Dict(d) => d
            .borrow()
            .iter()
            .map(|(k, v)| vec![Value::literal_name(k), v.clone()])
            .collect(),
        _ => return Err(malformed("typecheck in forall")),
    };
    for group in groups {
        ps.operands.extend(group);
        if !ps.loop_body(&body, canvas)? {
            break;
        }
    }
    Ok(())
}

fn op_loop(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let body = ps.pop_proc()?;
    for _ in 0..MAX_LOOP_ITERATIONS {
        if !ps.loop_body(&body, canvas)? {
            return Ok(());
        }
    }
    Err(malformed("limitcheck in loop"))
}

fn op_exit(_: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    Err(Interrupt::Exit)
}

fn op_stop(_: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    Err(Interrupt::Stop)
}

/// Runs the body and reports whether it stopped, either through `stop` or
/// an error.
fn op_stopped(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let body = ps.pop()?;
    let stopped = match ps.execute_value(body, canvas) {
        Ok(()) => false,
        Err(Interrupt::Stop) => true,
        Err(Interrupt::Error(e)) => {
            log::debug!(target: "import", "stopped caught: {}", e);
            true
        }
        Err(other) => return Err(other),
    };
    ps.push(Value::Bool(stopped));
    Ok(())
}

fn op_quit(_: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    Err(Interrupt::Quit)
}

// Conversions

fn op_cvx(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let value = match ps.pop()? {
        Value::Array(a) => Value::Procedure(Rc::new(a.borrow().clone())),
        Value::Name { name, .. } => Value::Name {
            name,
            executable: true,
        },
        other => other,
    };
    ps.push(value);
    Ok(())
}

fn op_cvlit(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let value = match ps.pop()? {
        Value::Procedure(p) => Value::array(p.as_ref().clone()),
        Value::Name { name, .. } => Value::Name {
            name,
            executable: false,
        },
        other => other,
    };
    ps.push(value);
    Ok(())
}

fn number_of(value: Value) -> ExecResult<f64> {
    match value {
        Value::Number(n) => Ok(n),
        Value::String(s) => String::from_utf8_lossy(&s.borrow())
            .trim()
            .parse::<f64>()
            .map_err(|_| malformed("syntaxerror in conversion")),
        _ => Err(malformed("typecheck in conversion")),
    }
}

fn op_cvi(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let value = ps.pop()?;
    let n = number_of(value)?;
    ps.push_number(n.trunc());
    Ok(())
}

fn op_cvr(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let value = ps.pop()?;
    let n = number_of(value)?;
    ps.push_number(n);
    Ok(())
}

/// Replace names bound to operators by the operators themselves.
fn bind(ps: &Interpreter, body: &[Value]) -> Vec<Value> {
    body.iter()
        .map(|item| match item {
            Value::Name {
                name,
                executable: true,
            } => match ps.lookup(name) {
                Some(op @ Value::Operator(_)) => op,
                _ => item.clone(),
            },
            Value::Procedure(inner) => Value::Procedure(Rc::new(bind(ps, inner))),
            other => other.clone(),
        })
        .collect()
}

fn op_bind(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let value = match ps.pop()? {
        Value::Procedure(body) => Value::Procedure(Rc::new(bind(ps, &body))),
        other => other,
    };
    ps.push(value);
    Ok(())
}

fn op_type(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let value = ps.pop()?;
    ps.push(Value::name(value.type_name()));
    Ok(())
}

// Graphics state

fn op_gsave(_: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    canvas.save();
    Ok(())
}

fn op_grestore(_: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    canvas.restore();
    Ok(())
}

fn op_grestoreall(_: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    canvas.restore_all();
    Ok(())
}

/// Virtual memory snapshots only cover the graphics state.
fn op_save(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    canvas.save();
    ps.push(Value::Null);
    Ok(())
}

fn op_restore(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    ps.pop()?;
    canvas.restore();
    Ok(())
}

fn op_setlinewidth(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    canvas.set_line_width(ps.pop_number()?.abs());
    Ok(())
}

fn op_setlinecap(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let cap = match ps.pop_int()? {
        0 => LineCap::Butt,
        1 => LineCap::Round,
        2 => LineCap::Square,
        _ => return Err(malformed("rangecheck in setlinecap")),
    };
    canvas.set_line_cap(cap);
    Ok(())
}

fn op_setlinejoin(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let join = match ps.pop_int()? {
        0 => LineJoin::Miter,
        1 => LineJoin::Round,
        2 => LineJoin::Bevel,
        _ => return Err(malformed("rangecheck in setlinejoin")),
    };
    canvas.set_line_join(join);
    Ok(())
}

fn op_setmiterlimit(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let limit = ps.pop_number()?;
    if limit < 1.0 {
        return Err(malformed("rangecheck in setmiterlimit"));
    }
    canvas.set_miter_limit(limit);
    Ok(())
}

fn op_setdash(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let phase = ps.pop_number()?;
    let pattern = ps.pop_number_array()?;
    canvas.set_dash(pattern, phase);
    Ok(())
}

fn set_rgb(canvas: &mut Canvas, r: f64, g: f64, b: f64) {
    canvas.set_color(Color::from_unit(r, g, b, 1.0));
}

fn op_setrgbcolor(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let [r, g, b] = ps.pop_numbers::<3>()?;
    set_rgb(canvas, r, g, b);
    Ok(())
}

fn op_setgray(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let gray = ps.pop_number()?;
    set_rgb(canvas, gray, gray, gray);
    Ok(())
}

fn op_sethsbcolor(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let [h, s, v] = ps.pop_numbers::<3>()?;
    let (r, g, b) = hsb_to_rgb(h, s, v);
    set_rgb(canvas, r, g, b);
    Ok(())
}

fn op_setcmykcolor(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let [c, m, y, k] = ps.pop_numbers::<4>()?;
    set_rgb(
        canvas,
        1.0 - (c + k).min(1.0),
        1.0 - (m + k).min(1.0),
        1.0 - (y + k).min(1.0),
    );
    Ok(())
}

/// Hue, saturation and brightness in [0, 1].
pub(crate) fn hsb_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    let h = h.clamp(0.0, 1.0) * 6.0;
    let s = s.clamp(0.0, 1.0);
    let v = v.clamp(0.0, 1.0);
    let sector = (h.floor() as i64).min(5);
    let f = h - sector as f64;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match sector {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

// Matrices

fn matrix_value(t: Transform) -> Value {
    Value::array(
        [t.a, t.b, t.c, t.d, t.e, t.f]
            .into_iter()
            .map(Value::Number)
            .collect(),
    )
}

fn matrix_of(values: &[f64]) -> ExecResult<Transform> {
    match *values {
        [a, b, c, d, e, f] => Ok(Transform::new(a, b, c, d, e, f)),
        _ => Err(malformed("rangecheck: matrix needs 6 numbers")),
    }
}

fn op_matrix(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    ps.push(matrix_value(Transform::identity()));
    Ok(())
}

/// Whether the operator got the optional trailing matrix operand.
fn has_matrix(ps: &Interpreter) -> bool {
    matches!(ps.operands.last(), Some(Value::Array(_)))
}

/// Matrix form of `translate`, `scale` and `rotate`: the matrix operand
/// receives `t` and is pushed back, the transform is left alone.
fn store_matrix(ps: &mut Interpreter, matrix: Value, t: Transform) -> ExecResult {
    let Value::Array(array) = matrix else {
        return Err(malformed(format!("typecheck in {}", ps.current)));
    };
    *array.borrow_mut() = [t.a, t.b, t.c, t.d, t.e, t.f]
        .into_iter()
        .map(Value::Number)
        .collect();
    ps.push(Value::Array(array));
    Ok(())
}

fn op_translate(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    if has_matrix(ps) {
        let matrix = ps.pop()?;
        let [x, y] = ps.pop_numbers::<2>()?;
        return store_matrix(ps, matrix, Transform::translation(x, y));
    }
    let [x, y] = ps.pop_numbers::<2>()?;
    canvas.translate(x, y);
    Ok(())
}

fn op_scale(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    if has_matrix(ps) {
        let matrix = ps.pop()?;
        let [x, y] = ps.pop_numbers::<2>()?;
        return store_matrix(ps, matrix, Transform::scaling(x, y));
    }
    let [x, y] = ps.pop_numbers::<2>()?;
    canvas.scale(x, y);
    Ok(())
}

fn op_rotate(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    if has_matrix(ps) {
        let matrix = ps.pop()?;
        let angle = ps.pop_number()?;
        return store_matrix(ps, matrix, Transform::rotation(angle.to_radians()));
    }
    let angle = ps.pop_number()?;
    canvas.rotate(angle.to_radians());
    Ok(())
}

fn op_concat(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let matrix = matrix_of(&ps.pop_number_array()?)?;
    canvas.concat(matrix);
    Ok(())
}

fn op_setmatrix(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let matrix = matrix_of(&ps.pop_number_array()?)?;
    canvas.set_transform(matrix);
    Ok(())
}

// Path construction

fn op_newpath(_: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    canvas.reset_path();
    Ok(())
}

fn require_current_point(ps: &Interpreter, canvas: &Canvas) -> ExecResult {
    if canvas.device_point().is_none() {
        return Err(malformed(format!("nocurrentpoint in {}", ps.current)));
    }
    Ok(())
}

fn op_moveto(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let [x, y] = ps.pop_numbers::<2>()?;
    canvas.move_to(x, y);
    Ok(())
}

fn op_rmoveto(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let [dx, dy] = ps.pop_numbers::<2>()?;
    require_current_point(ps, canvas)?;
    canvas.set_relative(true);
    canvas.move_to(dx, dy);
    canvas.set_relative(false);
    Ok(())
}

fn op_lineto(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let [x, y] = ps.pop_numbers::<2>()?;
    canvas.line_to(x, y);
    Ok(())
}

fn op_rlineto(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let [dx, dy] = ps.pop_numbers::<2>()?;
    require_current_point(ps, canvas)?;
    canvas.set_relative(true);
    canvas.line_to(dx, dy);
    canvas.set_relative(false);
    Ok(())
}

fn curve(ps: &mut Interpreter, canvas: &mut Canvas, relative: bool) -> ExecResult {
    let [cp1x, cp1y, cp2x, cp2y, x, y] = ps.pop_numbers::<6>()?;
    if relative {
        require_current_point(ps, canvas)?;
    }
    canvas.set_relative(relative);
    canvas.curve_to(&CubicBezierParams {
        cp1x,
        cp1y,
        cp2x,
        cp2y,
        x,
        y,
    });
    canvas.set_relative(false);
    Ok(())
}

fn op_curveto(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    curve(ps, canvas, false)
}

fn op_rcurveto(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    curve(ps, canvas, true)
}

fn op_arc(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let [x, y, r, a1, a2] = ps.pop_numbers::<5>()?;
    canvas.arc(x, y, r, a1, a2, true);
    Ok(())
}

fn op_arcn(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let [x, y, r, a1, a2] = ps.pop_numbers::<5>()?;
    canvas.arc(x, y, r, a1, a2, false);
    Ok(())
}

fn op_closepath(_: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    canvas.close_path();
    Ok(())
}

fn op_currentpoint(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let point = canvas
        .current_point()
        .ok_or_else(|| malformed("nocurrentpoint in currentpoint"))?;
    ps.push_number(point.x);
    ps.push_number(point.y);
    Ok(())
}

/// Bounding box of the path in user space.
fn op_pathbbox(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let bounds = canvas
        .path_bounds()
        .ok_or_else(|| malformed("nocurrentpoint in pathbbox"))?;
    let inverse = canvas
        .transform()
        .invert()
        .ok_or_else(|| malformed("undefinedresult in pathbbox"))?;
    let corners = [
        inverse.apply(bounds.x0, bounds.y0),
        inverse.apply(bounds.x1, bounds.y0),
        inverse.apply(bounds.x0, bounds.y1),
        inverse.apply(bounds.x1, bounds.y1),
    ];
    let user = corners[1..]
        .iter()
        .fold(Rect::from_points(corners[0], corners[0]), |r, p| {
            r.union_pt(*p)
        });
    for n in [user.x0, user.y0, user.x1, user.y1] {
        ps.push_number(n);
    }
    Ok(())
}

fn op_clippath(_: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let clip = canvas
        .clip_region()
        .cloned()
        .unwrap_or_else(|| Region::rect(PAGE));
    canvas.reset_path();
    canvas.append_region(&clip);
    Ok(())
}

// Painting

/// Run `paint` under a temporary winding rule.
fn with_rule(canvas: &mut Canvas, rule: WindingRule, paint: fn(&mut Canvas)) {
    let previous = canvas.state().winding_rule;
    canvas.set_winding_rule(rule);
    paint(canvas);
    canvas.set_winding_rule(previous);
}

fn op_fill(_: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    with_rule(canvas, WindingRule::NonZero, Canvas::fill);
    canvas.reset_path();
    Ok(())
}

fn op_eofill(_: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    with_rule(canvas, WindingRule::EvenOdd, Canvas::fill);
    canvas.reset_path();
    Ok(())
}

fn op_stroke(_: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    canvas.stroke();
    canvas.reset_path();
    Ok(())
}

fn op_clip(_: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    with_rule(canvas, WindingRule::NonZero, Canvas::clip_path);
    Ok(())
}

fn op_eoclip(_: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    with_rule(canvas, WindingRule::EvenOdd, Canvas::clip_path);
    Ok(())
}

// Fonts

fn font_dict(name: &str, size: f64) -> Value {
    let dict = new_dict();
    {
        let mut d = dict.borrow_mut();
        d.insert("FontName".into(), Value::literal_name(name));
        d.insert("FontSize".into(), Value::Number(size));
    }
    Value::Dict(dict)
}

fn font_of(dict: &Dict) -> ExecResult<(Rc<str>, f64)> {
    let d = dict.borrow();
    let name = match d.get("FontName") {
        Some(v) => v.key()?,
        None => return Err(malformed("invalidfont")),
    };
    let size = match d.get("FontSize") {
        Some(Value::Number(n)) => *n,
        _ => 1.0,
    };
    Ok((name, size))
}

fn op_findfont(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let name = ps.pop()?.key()?;
    ps.push(font_dict(&name, 1.0));
    Ok(())
}

fn op_scalefont(ps: &mut Interpreter, _: &mut Canvas) -> ExecResult {
    let scale = ps.pop_number()?;
    let (name, size) = font_of(&ps.pop_dict()?)?;
    ps.push(font_dict(&name, size * scale));
    Ok(())
}

fn op_setfont(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let (name, size) = font_of(&ps.pop_dict()?)?;
    canvas.set_font_family(name.as_ref());
    canvas.set_font_size(size);
    Ok(())
}

/// Strings hold Latin-1 bytes.
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Paints the glyphs at the current point, which then advances. The path
/// under construction is replaced by the new current point.
fn op_show(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    let text = latin1(&ps.pop_bytes()?);
    let start = canvas
        .current_point()
        .ok_or_else(|| malformed("nocurrentpoint in show"))?;
    canvas.reset_path();
    canvas.move_to(start.x, start.y);
    canvas.char_path(&text);
    let end: Option<Point> = canvas.current_point();
    op_fill(ps, canvas)?;
    if let Some(end) = end {
        canvas.move_to(end.x, end.y);
    }
    Ok(())
}

fn op_charpath(ps: &mut Interpreter, canvas: &mut Canvas) -> ExecResult {
    ps.pop_bool()?;
    let text = latin1(&ps.pop_bytes()?);
    require_current_point(ps, canvas)?;
    canvas.char_path(&text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hsb_primaries() {
        assert_eq!(hsb_to_rgb(0.0, 1.0, 1.0), (1.0, 0.0, 0.0));
        let (r, g, b) = hsb_to_rgb(1.0 / 3.0, 1.0, 1.0);
        assert!(r.abs() < 1e-9 && (g - 1.0).abs() < 1e-9 && b.abs() < 1e-9);
        assert_eq!(hsb_to_rgb(0.5, 0.0, 0.25), (0.25, 0.25, 0.25));
    }

    #[test]
    fn test_every_operator_has_a_distinct_name() {
        let mut names: Vec<_> = OPERATORS
            .iter()
            .map(|(n, _)| *n)
            .chain(UNSUPPORTED.iter().copied())
            .collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn test_format_number_drops_integral_fraction() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(0.5), "0.5");
    }
}
