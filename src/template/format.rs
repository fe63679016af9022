//! Value formatting: how actions print values, and the `printf` family.
//!
//! Output follows Go's fmt package for the values a JSON document can hold.
//! Unsupported verbs and mismatched arguments are rendered inline
//! (`%!d(string=dev)`) rather than failing the render.

use std::fmt::Write;

use serde_json::{Number, Value};

/// Prints the result of an action. A missing value prints as `<no value>`.
pub(super) fn print_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("<no value>"),
        other => fmt_value(other, out),
    }
}

/// `%v` formatting.
pub(super) fn fmt_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("<nil>"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&fmt_number(n)),
        Value::String(s) => out.push_str(s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                fmt_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push_str("map[");
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                out.push_str(key);
                out.push(':');
                fmt_value(item, out);
            }
            out.push(']');
        }
    }
}

fn fmt_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    let f = n.as_f64().unwrap_or(f64::NAN);
    if f.fract() == 0.0 && f.abs() < 1e21 {
        format!("{f:.0}")
    } else {
        f.to_string()
    }
}

/// Name of the Go type a decoded JSON value would have, for error output.
pub(super) fn go_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "<nil>",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float64",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "[]interface {}",
        Value::Object(_) => "map[string]interface {}",
    }
}

/// `print`: operands are separated by a space when neither side is a string.
pub(super) fn sprint(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 && !arg.is_string() && !args[i - 1].is_string() {
            out.push(' ');
        }
        fmt_value(arg, &mut out);
    }
    out
}

/// `println`: operands are always space-separated and a newline is appended.
pub(super) fn sprintln(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        fmt_value(arg, &mut out);
    }
    out.push('\n');
    out
}

#[derive(Debug, Default)]
struct Spec {
    left: bool,
    plus: bool,
    zero: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

/// `printf`.
pub(super) fn sprintf(format: &str, args: &[Value]) -> String {
    let mut out = String::new();
    let mut args = args.iter();
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut spec = Spec::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => spec.left = true,
                '+' => spec.plus = true,
                '0' => spec.zero = true,
                ' ' | '#' => {}
                _ => break,
            }
            chars.next();
        }
        spec.width = take_number(&mut chars);
        if chars.peek() == Some(&'.') {
            chars.next();
            spec.precision = Some(take_number(&mut chars).unwrap_or(0));
        }

        let Some(verb) = chars.next() else {
            out.push_str("%!(NOVERB)");
            break;
        };
        if verb == '%' {
            out.push('%');
            continue;
        }
        let Some(arg) = args.next() else {
            let _ = write!(out, "%!{verb}(MISSING)");
            continue;
        };

        match format_arg(verb, &spec, arg) {
            Some(body) => pad(&mut out, &body, &spec, is_numeric_verb(verb)),
            None => bad_verb(&mut out, verb, arg),
        }
    }

    let extra: Vec<&Value> = args.collect();
    if !extra.is_empty() {
        out.push_str("%!(EXTRA ");
        for (i, arg) in extra.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(go_type(arg));
            out.push('=');
            fmt_value(arg, &mut out);
        }
        out.push(')');
    }
    out
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<usize> {
    let mut value: Option<usize> = None;
    while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
        value = Some(value.unwrap_or(0).saturating_mul(10).saturating_add(digit as usize));
        chars.next();
    }
    value
}

fn is_numeric_verb(verb: char) -> bool {
    matches!(verb, 'd' | 'f' | 'F' | 'e' | 'E' | 'g' | 'G' | 'x' | 'X' | 'o' | 'b')
}

/// Formats one argument, or `None` if the verb doesn't apply to it.
fn format_arg(verb: char, spec: &Spec, arg: &Value) -> Option<String> {
    match (verb, arg) {
        ('v', _) => {
            let mut out = String::new();
            fmt_value(arg, &mut out);
            Some(out)
        }
        ('s', Value::String(s)) => Some(truncate(s, spec.precision)),
        ('s', Value::Array(_) | Value::Object(_)) => {
            let mut out = String::new();
            fmt_value(arg, &mut out);
            Some(out)
        }
        ('q', Value::String(s)) => Some(quote(s)),
        ('t', Value::Bool(b)) => Some(b.to_string()),
        ('d', Value::Number(n)) if !n.is_f64() => Some(signed(fmt_number(n), spec.plus)),
        ('x' | 'X' | 'o' | 'b', Value::Number(n)) if !n.is_f64() => {
            let i = n.as_i64().map(i128::from).or(n.as_u64().map(i128::from))?;
            let digits = match verb {
                'x' => format!("{:x}", i.unsigned_abs()),
                'X' => format!("{:X}", i.unsigned_abs()),
                'o' => format!("{:o}", i.unsigned_abs()),
                _ => format!("{:b}", i.unsigned_abs()),
            };
            Some(if i < 0 { format!("-{digits}") } else { signed(digits, spec.plus) })
        }
        ('x', Value::String(s)) => Some(s.bytes().map(|b| format!("{b:02x}")).collect()),
        ('X', Value::String(s)) => Some(s.bytes().map(|b| format!("{b:02X}")).collect()),
        ('c', Value::Number(n)) => n
            .as_u64()
            .and_then(|u| u32::try_from(u).ok())
            .and_then(char::from_u32)
            .map(String::from),
        ('f' | 'F', Value::Number(n)) if n.is_f64() => {
            let f = n.as_f64()?;
            Some(signed(format!("{:.*}", spec.precision.unwrap_or(6), f), spec.plus))
        }
        ('e' | 'E', Value::Number(n)) if n.is_f64() => {
            let f = n.as_f64()?;
            let formatted = exponent(f, spec.precision.unwrap_or(6));
            let formatted = if verb == 'E' {
                formatted.to_uppercase()
            } else {
                formatted
            };
            Some(signed(formatted, spec.plus))
        }
        ('g' | 'G', Value::Number(n)) if n.is_f64() => {
            let f = n.as_f64()?;
            let formatted = match spec.precision {
                Some(p) => format!("{:.*e}", p.saturating_sub(1), f)
                    .parse::<f64>()
                    .ok()?
                    .to_string(),
                None => fmt_number(n),
            };
            Some(signed(formatted, spec.plus))
        }
        ('T', _) => Some(go_type(arg).to_string()),
        _ => None,
    }
}

fn truncate(s: &str, precision: Option<usize>) -> String {
    match precision {
        Some(p) => s.chars().take(p).collect(),
        None => s.to_string(),
    }
}

fn signed(digits: String, plus: bool) -> String {
    if plus && !digits.starts_with('-') {
        format!("+{digits}")
    } else {
        digits
    }
}

/// `1.5e0` in Rust is `1.500000e+00` in Go.
fn exponent(f: f64, precision: usize) -> String {
    let rust = format!("{:.*e}", precision, f);
    let Some((mantissa, exp)) = rust.split_once('e') else {
        return rust;
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exp.unsigned_abs())
}

/// Double-quoted with Go escapes.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn pad(out: &mut String, body: &str, spec: &Spec, numeric: bool) {
    let len = body.chars().count();
    let fill = spec.width.unwrap_or(0).saturating_sub(len);
    if fill == 0 {
        out.push_str(body);
    } else if spec.left {
        out.push_str(body);
        out.extend(std::iter::repeat_n(' ', fill));
    } else if spec.zero && numeric {
        let (sign, digits) = match body.strip_prefix(['-', '+']) {
            Some(rest) => body.split_at(body.len() - rest.len()),
            None => ("", body),
        };
        out.push_str(sign);
        out.extend(std::iter::repeat_n('0', fill));
        out.push_str(digits);
    } else {
        out.extend(std::iter::repeat_n(' ', fill));
        out.push_str(body);
    }
}

fn bad_verb(out: &mut String, verb: char, arg: &Value) {
    if arg.is_null() {
        let _ = write!(out, "%!{verb}(<nil>)");
        return;
    }
    let _ = write!(out, "%!{verb}({}=", go_type(arg));
    fmt_value(arg, out);
    out.push(')');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn printf(format: &str, args: &[Value]) -> String {
        sprintf(format, args)
    }

    #[test]
    fn action_printing() {
        let mut out = String::new();
        print_value(&json!(["dev", 2, true, null]), &mut out);
        assert_eq!(out, "[dev 2 true <nil>]");

        let mut out = String::new();
        print_value(&json!(null), &mut out);
        assert_eq!(out, "<no value>");

        let mut out = String::new();
        print_value(&json!({"a": 1.5, "b": 2.0}), &mut out);
        assert_eq!(out, "map[a:1.5 b:2]");
    }

    #[test]
    fn printf_common_verbs() {
        assert_eq!(
            printf("%s -> %v (%d)", &[json!("master"), json!(["dev", "prod"]), json!(2)]),
            "master -> [dev prod] (2)"
        );
        assert_eq!(printf("%q", &[json!("a\"b")]), r#""a\"b""#);
        assert_eq!(printf("%t|%x|%X", &[json!(true), json!(255), json!("hi")]), "true|ff|6869");
        assert_eq!(printf("%.2f|%e", &[json!(1.5), json!(1234.5)]), "1.50|1.234500e+03");
        assert_eq!(printf("100%%", &[]), "100%");
    }

    #[test]
    fn printf_width_and_flags() {
        assert_eq!(printf("[%5s]", &[json!("dev")]), "[  dev]");
        assert_eq!(printf("[%-5s]", &[json!("dev")]), "[dev  ]");
        assert_eq!(printf("[%05d]", &[json!(-42)]), "[-0042]");
        assert_eq!(printf("[%+d]", &[json!(7)]), "[+7]");
        assert_eq!(printf("[%.3s]", &[json!("staging")]), "[sta]");
    }

    #[test]
    fn printf_argument_mismatches_are_inline() {
        assert_eq!(printf("%d", &[json!("dev")]), "%!d(string=dev)");
        assert_eq!(printf("%s %s", &[json!("dev")]), "dev %!s(MISSING)");
        assert_eq!(printf("%s", &[json!("dev"), json!(1)]), "dev%!(EXTRA int=1)");
        assert_eq!(printf("%d", &[json!(null)]), "%!d(<nil>)");
    }

    #[test]
    fn print_spacing() {
        assert_eq!(sprint(&[json!("a"), json!("b")]), "ab");
        assert_eq!(sprint(&[json!(1), json!(2), json!("x"), json!(3)]), "1 2x3");
        assert_eq!(sprintln(&[json!("a"), json!(1)]), "a 1\n");
    }
}
