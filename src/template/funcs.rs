//! Functions callable from templates.
//!
//! `contains` and `replaceAll` are the string helpers message templates rely
//! on; the rest are the usual text/template builtins.

use std::cmp::Ordering;

use serde_json::{Number, Value};

use super::exec::is_truthy;
use super::format::{self, go_type};

pub(super) type Func = fn(&[Value]) -> Result<Value, String>;

/// Returns the function registered under `name`.
pub(super) fn lookup(name: &str) -> Option<Func> {
    let func: Func = match name {
        "contains" => contains,
        "replaceAll" => replace_all,
        "len" => len,
        "not" => not,
        "and" => and,
        "or" => or,
        "eq" => eq,
        "ne" => ne,
        "lt" => lt,
        "le" => le,
        "gt" => gt,
        "ge" => ge,
        "index" => index,
        "slice" => slice,
        "print" => print,
        "printf" => printf,
        "println" => println,
        _ => return None,
    };
    Some(func)
}

fn expect_args(name: &str, args: &[Value], want: usize) -> Result<(), String> {
    if args.len() != want {
        return Err(format!(
            "wrong number of args for {name}: want {want} got {}",
            args.len()
        ));
    }
    Ok(())
}

fn expect_str<'v>(name: &str, value: &'v Value) -> Result<&'v str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("{name}: expected string argument, got {value}"))
}

fn contains(args: &[Value]) -> Result<Value, String> {
    expect_args("contains", args, 2)?;
    let s = expect_str("contains", &args[0])?;
    let substr = expect_str("contains", &args[1])?;
    Ok(Value::Bool(s.contains(substr)))
}

fn replace_all(args: &[Value]) -> Result<Value, String> {
    expect_args("replaceAll", args, 3)?;
    let s = expect_str("replaceAll", &args[0])?;
    let old = expect_str("replaceAll", &args[1])?;
    let new = expect_str("replaceAll", &args[2])?;
    Ok(Value::String(s.replace(old, new)))
}

fn len(args: &[Value]) -> Result<Value, String> {
    expect_args("len", args, 1)?;
    let n = match &args[0] {
        // Byte length, as text/template reports it.
        Value::String(s) => s.len(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => return Err(format!("len of {other}")),
    };
    Ok(Value::from(n))
}

fn not(args: &[Value]) -> Result<Value, String> {
    expect_args("not", args, 1)?;
    Ok(Value::Bool(!is_truthy(&args[0])))
}

/// First falsy argument, or the last argument.
fn and(args: &[Value]) -> Result<Value, String> {
    let Some(last) = args.last() else {
        return Err("wrong number of args for and: want at least 1 got 0".to_string());
    };
    Ok(args
        .iter()
        .find(|v| !is_truthy(v))
        .unwrap_or(last)
        .clone())
}

/// First truthy argument, or the last argument.
fn or(args: &[Value]) -> Result<Value, String> {
    let Some(last) = args.last() else {
        return Err("wrong number of args for or: want at least 1 got 0".to_string());
    };
    Ok(args.iter().find(|v| is_truthy(v)).unwrap_or(last).clone())
}

/// True if the first argument equals any of the others.
fn eq(args: &[Value]) -> Result<Value, String> {
    let Some((first, rest)) = args.split_first() else {
        return Err("wrong number of args for eq: want at least 2 got 0".to_string());
    };
    if rest.is_empty() {
        return Err("wrong number of args for eq: want at least 2 got 1".to_string());
    }
    Ok(Value::Bool(rest.iter().any(|v| v == first)))
}

fn ne(args: &[Value]) -> Result<Value, String> {
    expect_args("ne", args, 2)?;
    Ok(Value::Bool(args[0] != args[1]))
}

fn compare(name: &str, args: &[Value]) -> Result<Ordering, String> {
    expect_args(name, args, 2)?;
    let ordering = match (&args[0], &args[1]) {
        (Value::Number(a), Value::Number(b)) => compare_numbers(a, b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (a, b) if go_type(a) == go_type(b) => {
            return Err(format!("invalid type for comparison: {}", go_type(a)));
        }
        _ => None,
    };
    ordering.ok_or_else(|| "incompatible types for comparison".to_string())
}

fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    let as_int = |n: &Number| n.as_i64().map(i128::from).or(n.as_u64().map(i128::from));
    match (as_int(a), as_int(b)) {
        (Some(a), Some(b)) => Some(a.cmp(&b)),
        _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

fn lt(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Bool(compare("lt", args)?.is_lt()))
}

fn le(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Bool(compare("le", args)?.is_le()))
}

fn gt(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Bool(compare("gt", args)?.is_gt()))
}

fn ge(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Bool(compare("ge", args)?.is_ge()))
}

fn int_arg(value: &Value) -> Result<i64, String> {
    match value {
        Value::Number(n) if !n.is_f64() => n
            .as_i64()
            .ok_or_else(|| format!("index out of range: {n}")),
        other => Err(format!("cannot index slice/array with type {}", go_type(other))),
    }
}

/// A position usable as an index: `0 <= i < len`.
fn position(value: &Value, len: usize) -> Result<usize, String> {
    let i = int_arg(value)?;
    usize::try_from(i)
        .ok()
        .filter(|&p| p < len)
        .ok_or_else(|| format!("index out of range: {i}"))
}

/// A position usable as a slice bound: `0 <= i <= len`.
fn bound(value: &Value, len: usize) -> Result<usize, String> {
    let i = int_arg(value)?;
    usize::try_from(i)
        .ok()
        .filter(|&p| p <= len)
        .ok_or_else(|| format!("index out of range: {i}"))
}

/// `index x 1 "key"`: successive list positions, string bytes or map keys.
/// A missing map key yields no value rather than an error.
fn index(args: &[Value]) -> Result<Value, String> {
    let Some((item, keys)) = args.split_first() else {
        return Err("wrong number of args for index: want at least 1 got 0".to_string());
    };
    let mut current = item.clone();
    for key in keys {
        current = match &current {
            Value::Array(items) => items[position(key, items.len())?].clone(),
            Value::String(s) => Value::from(s.as_bytes()[position(key, s.len())?]),
            Value::Object(map) => match key {
                Value::String(k) => map.get(k).cloned().unwrap_or(Value::Null),
                other => {
                    return Err(format!(
                        "value has type {}; should be string",
                        go_type(other)
                    ));
                }
            },
            Value::Null => return Err("index of untyped nil".to_string()),
            other => return Err(format!("can't index item of type {}", go_type(other))),
        };
    }
    Ok(current)
}

/// Resolves `low`, `high` and an optional capacity bound against `len`.
fn slice_bounds(bounds: &[Value], len: usize, max: usize) -> Result<(usize, usize), String> {
    if bounds.len() > max {
        return Err(format!("too many slice indexes: {}", bounds.len()));
    }
    let positions = bounds
        .iter()
        .map(|b| bound(b, len))
        .collect::<Result<Vec<_>, _>>()?;
    let low = positions.first().copied().unwrap_or(0);
    let high = positions.get(1).copied().unwrap_or(len);
    if low > high {
        return Err(format!("invalid slice index: {low} > {high}"));
    }
    if let Some(&cap) = positions.get(2)
        && high > cap
    {
        return Err(format!("invalid slice index: {high} > {cap}"));
    }
    Ok((low, high))
}

/// `slice x 1 2`: a sub-list or a byte range of a string.
fn slice(args: &[Value]) -> Result<Value, String> {
    let Some((item, bounds)) = args.split_first() else {
        return Err("wrong number of args for slice: want at least 1 got 0".to_string());
    };
    match item {
        Value::String(s) => {
            let (low, high) = slice_bounds(bounds, s.len(), 2)?;
            s.get(low..high)
                .map(|sub| Value::String(sub.to_string()))
                .ok_or_else(|| format!("slice {low}:{high} splits a character"))
        }
        Value::Array(items) => {
            let (low, high) = slice_bounds(bounds, items.len(), 3)?;
            Ok(Value::Array(items[low..high].to_vec()))
        }
        Value::Null => Err("slice of untyped nil".to_string()),
        other => Err(format!("can't slice item of type {}", go_type(other))),
    }
}

fn print(args: &[Value]) -> Result<Value, String> {
    Ok(Value::String(format::sprint(args)))
}

fn printf(args: &[Value]) -> Result<Value, String> {
    let Some((template, rest)) = args.split_first() else {
        return Err("wrong number of args for printf: want at least 1 got 0".to_string());
    };
    let template = expect_str("printf", template)?;
    Ok(Value::String(format::sprintf(template, rest)))
}

fn println(args: &[Value]) -> Result<Value, String> {
    Ok(Value::String(format::sprintln(args)))
}
