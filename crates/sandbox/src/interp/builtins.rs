//! Global objects and the methods reachable from primitive receivers.

use std::cmp::Ordering;
use std::rc::Rc;

use crate::value::{
    ArrayRef, BoundMethod, JsObject, JsonError, MAX_STRING_LEN, Value, display_for_log,
    json_to_string, number_to_string, strict_equals, to_fixed, to_integer, to_json_indented,
};

use super::heap::{SLOT_BYTES, STRING_HEADER_BYTES};
use super::scope::Scope;
use super::{Eval, Interpreter, push_text, throw};

/// Estimated cost of one `Object.entries`-style listing entry beyond its slot.
const LISTING_ENTRY_BYTES: usize = 2 * STRING_HEADER_BYTES + 2 * SLOT_BYTES;

const STRING_METHODS: &[&str] = &[
    "at", "charAt", "concat", "endsWith", "includes", "indexOf", "lastIndexOf", "padEnd",
    "padStart", "repeat", "replace", "replaceAll", "slice", "split", "startsWith", "substring",
    "toLowerCase", "toString", "toUpperCase", "trim", "trimEnd", "trimStart",
];

const ARRAY_METHODS: &[&str] = &[
    "at", "concat", "every", "filter", "find", "findIndex", "forEach", "includes", "indexOf",
    "join", "lastIndexOf", "map", "pop", "push", "reduce", "reverse", "shift", "slice", "some",
    "sort", "splice", "toString", "unshift",
];

const NUMBER_METHODS: &[&str] = &["toFixed", "toString"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathFn {
    Floor,
    Ceil,
    Round,
    Abs,
    Max,
    Min,
    Pow,
    Sqrt,
    Trunc,
    Sign,
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    TypeError,
    RangeError,
    ReferenceError,
    SyntaxError,
}

impl ErrorKind {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::SyntaxError => "SyntaxError",
        }
    }
}

/// Host functions exposed to programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    ConsoleLog,
    ConsoleInfo,
    ConsoleWarn,
    ConsoleError,
    Math(MathFn),
    JsonStringify,
    JsonParse,
    String,
    Number,
    Boolean,
    ParseInt,
    ParseFloat,
    IsNaN,
    IsFinite,
    NumberIsInteger,
    NumberIsFinite,
    ArrayIsArray,
    ObjectKeys,
    ObjectValues,
    ObjectEntries,
    Error(ErrorKind),
}

impl Builtin {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Builtin::ConsoleLog => "log",
            Builtin::ConsoleInfo => "info",
            Builtin::ConsoleWarn => "warn",
            Builtin::ConsoleError => "error",
            Builtin::Math(f) => match f {
                MathFn::Floor => "floor",
                MathFn::Ceil => "ceil",
                MathFn::Round => "round",
                MathFn::Abs => "abs",
                MathFn::Max => "max",
                MathFn::Min => "min",
                MathFn::Pow => "pow",
                MathFn::Sqrt => "sqrt",
                MathFn::Trunc => "trunc",
                MathFn::Sign => "sign",
                MathFn::Random => "random",
            },
            Builtin::JsonStringify => "stringify",
            Builtin::JsonParse => "parse",
            Builtin::String => "String",
            Builtin::Number => "Number",
            Builtin::Boolean => "Boolean",
            Builtin::ParseInt => "parseInt",
            Builtin::ParseFloat => "parseFloat",
            Builtin::IsNaN => "isNaN",
            Builtin::IsFinite | Builtin::NumberIsFinite => "isFinite",
            Builtin::NumberIsInteger => "isInteger",
            Builtin::ArrayIsArray => "isArray",
            Builtin::ObjectKeys => "keys",
            Builtin::ObjectValues => "values",
            Builtin::ObjectEntries => "entries",
            Builtin::Error(kind) => kind.name(),
        }
    }

    #[must_use]
    pub fn is_constructor(self) -> bool {
        matches!(
            self,
            Builtin::Error(_) | Builtin::String | Builtin::Number | Builtin::Boolean
        )
    }
}

// ─── globals ──────────────────────────────────────────────────────────────────

fn namespace(entries: &[(&str, Value)]) -> Value {
    Value::object(JsObject::with_props(
        entries
            .iter()
            .map(|(key, value)| ((*key).to_owned(), value.clone()))
            .collect(),
    ))
}

pub(crate) fn install_globals(env: &mut Scope) {
    env.declare("undefined", Some(Value::Undefined), false);
    env.declare("NaN", Some(Value::Number(f64::NAN)), false);
    env.declare("Infinity", Some(Value::Number(f64::INFINITY)), false);

    let console = namespace(&[
        ("log", Value::Native(Builtin::ConsoleLog)),
        ("info", Value::Native(Builtin::ConsoleInfo)),
        ("warn", Value::Native(Builtin::ConsoleWarn)),
        ("error", Value::Native(Builtin::ConsoleError)),
    ]);
    let math = namespace(&[
        ("PI", Value::Number(std::f64::consts::PI)),
        ("E", Value::Number(std::f64::consts::E)),
        ("floor", Value::Native(Builtin::Math(MathFn::Floor))),
        ("ceil", Value::Native(Builtin::Math(MathFn::Ceil))),
        ("round", Value::Native(Builtin::Math(MathFn::Round))),
        ("abs", Value::Native(Builtin::Math(MathFn::Abs))),
        ("max", Value::Native(Builtin::Math(MathFn::Max))),
        ("min", Value::Native(Builtin::Math(MathFn::Min))),
        ("pow", Value::Native(Builtin::Math(MathFn::Pow))),
        ("sqrt", Value::Native(Builtin::Math(MathFn::Sqrt))),
        ("trunc", Value::Native(Builtin::Math(MathFn::Trunc))),
        ("sign", Value::Native(Builtin::Math(MathFn::Sign))),
        ("random", Value::Native(Builtin::Math(MathFn::Random))),
    ]);
    let json = namespace(&[
        ("stringify", Value::Native(Builtin::JsonStringify)),
        ("parse", Value::Native(Builtin::JsonParse)),
    ]);
    let object = namespace(&[
        ("keys", Value::Native(Builtin::ObjectKeys)),
        ("values", Value::Native(Builtin::ObjectValues)),
        ("entries", Value::Native(Builtin::ObjectEntries)),
    ]);
    let array = namespace(&[("isArray", Value::Native(Builtin::ArrayIsArray))]);

    let bindings = [
        ("console", console),
        ("Math", math),
        ("JSON", json),
        ("Object", object),
        ("Array", array),
        ("String", Value::Native(Builtin::String)),
        ("Number", Value::Native(Builtin::Number)),
        ("Boolean", Value::Native(Builtin::Boolean)),
        ("parseInt", Value::Native(Builtin::ParseInt)),
        ("parseFloat", Value::Native(Builtin::ParseFloat)),
        ("isNaN", Value::Native(Builtin::IsNaN)),
        ("isFinite", Value::Native(Builtin::IsFinite)),
        ("Error", Value::Native(Builtin::Error(ErrorKind::Error))),
        ("TypeError", Value::Native(Builtin::Error(ErrorKind::TypeError))),
        ("RangeError", Value::Native(Builtin::Error(ErrorKind::RangeError))),
        ("ReferenceError", Value::Native(Builtin::Error(ErrorKind::ReferenceError))),
        ("SyntaxError", Value::Native(Builtin::Error(ErrorKind::SyntaxError))),
    ];
    for (name, value) in bindings {
        env.declare(name, Some(value), true);
    }
}

/// Properties read off a builtin function value, e.g. `Number.isInteger`.
pub(crate) fn static_property(builtin: Builtin, key: &str) -> Option<Value> {
    if key == "name" {
        return Some(Value::from(builtin.name()));
    }
    match (builtin, key) {
        (Builtin::Number, "isInteger") => Some(Value::Native(Builtin::NumberIsInteger)),
        (Builtin::Number, "isFinite") => Some(Value::Native(Builtin::NumberIsFinite)),
        (Builtin::Number, "isNaN") => Some(Value::Native(Builtin::IsNaN)),
        (Builtin::Number, "parseInt") => Some(Value::Native(Builtin::ParseInt)),
        (Builtin::Number, "parseFloat") => Some(Value::Native(Builtin::ParseFloat)),
        (Builtin::Number, "MAX_SAFE_INTEGER") => Some(Value::Number(9_007_199_254_740_991.0)),
        (Builtin::Number, "MIN_SAFE_INTEGER") => Some(Value::Number(-9_007_199_254_740_991.0)),
        (Builtin::Number, "EPSILON") => Some(Value::Number(f64::EPSILON)),
        _ => None,
    }
}

pub(crate) fn is_string_method(name: &str) -> bool {
    STRING_METHODS.contains(&name)
}

pub(crate) fn is_array_method(name: &str) -> bool {
    ARRAY_METHODS.contains(&name)
}

pub(crate) fn is_number_method(name: &str) -> bool {
    NUMBER_METHODS.contains(&name)
}

pub(crate) fn bind(receiver: &Value, name: &str) -> Value {
    Value::Method(Rc::new(BoundMethod {
        receiver: receiver.clone(),
        name: name.to_owned(),
    }))
}

// ─── argument helpers ─────────────────────────────────────────────────────────

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn num(args: &[Value], index: usize) -> f64 {
    args.get(index).map_or(f64::NAN, Value::to_number)
}

fn text(args: &[Value], index: usize) -> String {
    args.get(index).map(Value::to_js_string).unwrap_or_default()
}

/// Resolve a relative index (negative counts from the end) against `len`.
fn relative(value: Option<&Value>, len: usize, default: usize) -> usize {
    let Some(value) = value.filter(|v| !matches!(v, Value::Undefined)) else {
        return default;
    };
    let index = to_integer(value.to_number());
    let len_f = len as f64;
    let clamped = if index < 0.0 {
        (len_f + index).max(0.0)
    } else {
        index.min(len_f)
    };
    clamped as usize
}

fn json_failure<T>(err: JsonError) -> Eval<T> {
    match err {
        JsonError::Circular => throw("TypeError", "Converting circular structure to JSON"),
        JsonError::TooLarge => throw("RangeError", "Invalid string length"),
        JsonError::TooDeep => throw("RangeError", "Maximum call stack size exceeded"),
    }
}

fn log_line(args: &[Value]) -> Eval<String> {
    let mut line = String::new();
    for (index, value) in args.iter().enumerate() {
        let part = display_for_log(value).or_else(json_failure)?;
        if index > 0 {
            push_text(&mut line, " ")?;
        }
        push_text(&mut line, &part)?;
    }
    Ok(line)
}

// ─── global functions ─────────────────────────────────────────────────────────

pub(crate) fn call_native(
    interp: &mut Interpreter<'_>,
    builtin: Builtin,
    args: Vec<Value>,
) -> Eval<Value> {
    let value = match builtin {
        Builtin::ConsoleLog => {
            let line = log_line(&args)?;
            interp.write_line(&line)?;
            Value::Undefined
        }
        Builtin::ConsoleInfo | Builtin::ConsoleWarn | Builtin::ConsoleError => {
            let line = log_line(&args)?;
            tracing::debug!(target: "sandbox::console", stream = builtin.name(), "{line}");
            Value::Undefined
        }
        Builtin::Math(function) => Value::Number(math(function, &args)),
        Builtin::JsonStringify => {
            let indent = match args.get(2) {
                Some(Value::Number(n)) if *n > 0.0 => n.min(10.0) as usize,
                Some(Value::Str(s)) => s.len().min(10),
                _ => 0,
            };
            match to_json_indented(&arg(&args, 0), indent) {
                Ok(Some(json)) => return interp.new_string(json_to_string(&json, indent)),
                Ok(None) => Value::Undefined,
                Err(err) => return json_failure(err),
            }
        }
        Builtin::JsonParse => {
            let source = text(&args, 0);
            // Every node needs at least one byte of source, so this covers what parsing builds.
            interp.charge(source.len().saturating_mul(SLOT_BYTES))?;
            match serde_json::from_str::<serde_json::Value>(&source) {
                Ok(json) => from_json(interp, &json),
                Err(_) => {
                    return throw("SyntaxError", format!("\"{source}\" is not valid JSON"));
                }
            }
        }
        Builtin::String | Builtin::Number | Builtin::Boolean | Builtin::Error(_) => {
            return construct(interp, builtin, &args);
        }
        Builtin::ParseInt => {
            let radix = args.get(1).filter(|v| !matches!(v, Value::Undefined));
            Value::Number(parse_int(&text(&args, 0), radix.map(Value::to_number)))
        }
        Builtin::ParseFloat => Value::Number(parse_float(&text(&args, 0))),
        Builtin::IsNaN => Value::Bool(num(&args, 0).is_nan()),
        Builtin::IsFinite => Value::Bool(num(&args, 0).is_finite()),
        Builtin::NumberIsInteger => Value::Bool(
            matches!(args.first(), Some(Value::Number(n)) if n.is_finite() && n.fract() == 0.0),
        ),
        Builtin::NumberIsFinite => {
            Value::Bool(matches!(args.first(), Some(Value::Number(n)) if n.is_finite()))
        }
        Builtin::ArrayIsArray => Value::Bool(matches!(args.first(), Some(Value::Array(_)))),
        Builtin::ObjectKeys | Builtin::ObjectValues | Builtin::ObjectEntries => {
            return object_listing(interp, builtin, &arg(&args, 0));
        }
    };
    Ok(value)
}

/// `new X(...)` for the builtin constructors; also their plain-call behavior.
pub(crate) fn construct(
    interp: &mut Interpreter<'_>,
    builtin: Builtin,
    args: &[Value],
) -> Eval<Value> {
    Ok(match builtin {
        Builtin::Error(kind) => error_object(kind, args),
        Builtin::String => return interp.new_string(text(args, 0)),
        Builtin::Number => Value::Number(args.first().map_or(0.0, Value::to_number)),
        Builtin::Boolean => Value::Bool(args.first().is_some_and(Value::truthy)),
        other => {
            return throw("TypeError", format!("{} is not a constructor", other.name()));
        }
    })
}

fn error_object(kind: ErrorKind, args: &[Value]) -> Value {
    let message = match args.first() {
        None | Some(Value::Undefined) => String::new(),
        Some(value) => value.to_js_string(),
    };
    Value::error(kind.name(), message)
}

fn math(function: MathFn, args: &[Value]) -> f64 {
    let x = num(args, 0);
    match function {
        MathFn::Floor => x.floor(),
        MathFn::Ceil => x.ceil(),
        MathFn::Round => {
            let floor = x.floor();
            if x - floor >= 0.5 { floor + 1.0 } else { floor }
        }
        MathFn::Abs => x.abs(),
        MathFn::Max => args.iter().map(Value::to_number).fold(f64::NEG_INFINITY, |acc, n| {
            if acc.is_nan() || n.is_nan() { f64::NAN } else { acc.max(n) }
        }),
        MathFn::Min => args.iter().map(Value::to_number).fold(f64::INFINITY, |acc, n| {
            if acc.is_nan() || n.is_nan() { f64::NAN } else { acc.min(n) }
        }),
        MathFn::Pow => {
            let exponent = num(args, 1);
            if exponent.is_nan() || (x.abs() == 1.0 && exponent.is_infinite()) {
                f64::NAN
            } else {
                x.powf(exponent)
            }
        }
        MathFn::Sqrt => x.sqrt(),
        MathFn::Trunc => x.trunc(),
        MathFn::Sign => {
            if x.is_nan() || x == 0.0 {
                x
            } else {
                x.signum()
            }
        }
        MathFn::Random => rand::random::<f64>(),
    }
}

fn object_listing(
    interp: &mut Interpreter<'_>,
    builtin: Builtin,
    target: &Value,
) -> Eval<Value> {
    let count = match target {
        Value::Undefined | Value::Null => {
            return throw("TypeError", "Cannot convert undefined or null to object");
        }
        Value::Object(obj) => obj.borrow().props.len(),
        Value::Array(items) => items.borrow().len(),
        Value::Str(s) => s.chars().count(),
        _ => 0,
    };
    interp.reserve_slots(count)?;
    interp.charge(count.saturating_mul(LISTING_ENTRY_BYTES))?;

    let entries: Vec<(String, Value)> = match target {
        Value::Object(obj) => obj.borrow().props.clone(),
        Value::Array(items) => items
            .borrow()
            .iter()
            .enumerate()
            .map(|(index, value)| (index.to_string(), value.clone()))
            .collect(),
        Value::Str(s) => s
            .chars()
            .enumerate()
            .map(|(index, c)| (index.to_string(), Value::from(c.to_string())))
            .collect(),
        _ => Vec::new(),
    };
    let mut listed = Vec::with_capacity(count);
    for (key, value) in entries {
        listed.push(match builtin {
            Builtin::ObjectKeys => Value::from(key),
            Builtin::ObjectValues => value,
            _ => interp.keep_array(vec![Value::from(key), value]),
        });
    }
    Ok(interp.keep_array(listed))
}

/// Build program values from parsed JSON whose size was already charged.
fn from_json(interp: &mut Interpreter<'_>, json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::from(s.as_str()),
        serde_json::Value::Array(items) => {
            let items = items.iter().map(|item| from_json(interp, item)).collect();
            interp.keep_array(items)
        }
        serde_json::Value::Object(map) => {
            let props = map
                .iter()
                .map(|(key, value)| (key.clone(), from_json(interp, value)))
                .collect();
            interp.keep_object(JsObject::with_props(props))
        }
    }
}

fn parse_int(source: &str, radix: Option<f64>) -> f64 {
    let trimmed = source.trim_start();
    let (negative, mut digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let mut radix = match radix.map(to_integer) {
        None => 0,
        Some(r) if (0.0..=36.0).contains(&r) => r as u32,
        Some(_) => return f64::NAN,
    };
    if radix == 0 || radix == 16 {
        if let Some(rest) = digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
        {
            digits = rest;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if radix < 2 {
        return f64::NAN;
    }

    let mut value: Option<f64> = None;
    for c in digits.chars() {
        let Some(digit) = c.to_digit(radix) else { break };
        value = Some(value.unwrap_or(0.0) * f64::from(radix) + f64::from(digit));
    }
    match value {
        Some(v) if negative => -v,
        Some(v) => v,
        None => f64::NAN,
    }
}

fn parse_float(source: &str) -> f64 {
    let trimmed = source.trim_start();
    for (prefix, value) in [
        ("Infinity", f64::INFINITY),
        ("+Infinity", f64::INFINITY),
        ("-Infinity", f64::NEG_INFINITY),
    ] {
        if trimmed.starts_with(prefix) {
            return value;
        }
    }

    let bytes = trimmed.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let digits_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    if bytes.get(end) == Some(&b'.') {
        end += 1;
        while bytes.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
        }
    }
    if end == digits_start || &trimmed[digits_start..end] == "." {
        return f64::NAN;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        if bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
                exp_end += 1;
            }
            end = exp_end;
        }
    }
    trimmed[..end].parse().unwrap_or(f64::NAN)
}

// ─── methods ──────────────────────────────────────────────────────────────────

pub(crate) fn call_method(
    interp: &mut Interpreter<'_>,
    receiver: &Value,
    name: &str,
    args: Vec<Value>,
) -> Eval<Value> {
    match receiver {
        Value::Str(s) => string_method(interp, s, name, &args),
        Value::Array(items) => array_method(interp, items, receiver, name, &args),
        Value::Number(n) => number_method(*n, name, &args),
        Value::Bool(b) => Ok(Value::from(b.to_string())),
        _ => throw("TypeError", format!("{name} is not a function")),
    }
}

fn number_method(n: f64, name: &str, args: &[Value]) -> Eval<Value> {
    match name {
        "toFixed" => {
            let digits = to_integer(args.first().map_or(0.0, Value::to_number));
            if !(0.0..=100.0).contains(&digits) {
                return throw(
                    "RangeError",
                    "toFixed() digits argument must be between 0 and 100",
                );
            }
            let digits = digits as usize;
            Ok(Value::from(to_fixed(n, digits)))
        }
        _ => {
            let radix = match args.first() {
                None | Some(Value::Undefined) => 10.0,
                Some(value) => to_integer(value.to_number()),
            };
            if !(2.0..=36.0).contains(&radix) {
                return throw("RangeError", "toString() radix must be between 2 and 36");
            }
            let radix = radix as u32;
            if radix == 10 || !n.is_finite() {
                Ok(Value::from(number_to_string(n)))
            } else {
                Ok(Value::from(integer_to_radix(n, radix)))
            }
        }
    }
}

/// Integer part of `n` in `radix`; the fraction is dropped.
fn integer_to_radix(n: f64, radix: u32) -> String {
    let mut rest = n.abs().trunc();
    if rest == 0.0 {
        return "0".to_owned();
    }
    let base = f64::from(radix);
    let mut digits = Vec::new();
    while rest >= 1.0 {
        let digit = (rest % base) as u32;
        digits.push(char::from_digit(digit, radix).unwrap_or('0'));
        rest = (rest / base).trunc();
    }
    if n < 0.0 {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

fn char_index_of(haystack: &str, byte_index: usize) -> f64 {
    haystack[..byte_index].chars().count() as f64
}

fn string_method(
    interp: &mut Interpreter<'_>,
    s: &Rc<str>,
    name: &str,
    args: &[Value],
) -> Eval<Value> {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    let value = match name {
        "toUpperCase" => interp.new_string(s.to_uppercase())?,
        "toLowerCase" => interp.new_string(s.to_lowercase())?,
        "trim" => interp.new_string(s.trim().to_owned())?,
        "trimStart" => interp.new_string(s.trim_start().to_owned())?,
        "trimEnd" => interp.new_string(s.trim_end().to_owned())?,
        "toString" => Value::Str(Rc::clone(s)),
        "includes" => Value::Bool(s.contains(text(args, 0).as_str())),
        "startsWith" => Value::Bool(s.starts_with(text(args, 0).as_str())),
        "endsWith" => Value::Bool(s.ends_with(text(args, 0).as_str())),
        "indexOf" => {
            let needle = text(args, 0);
            let from = relative(args.get(1), len, 0);
            let offset: usize = chars[..from].iter().map(|c| c.len_utf8()).sum();
            Value::Number(
                s[offset..]
                    .find(needle.as_str())
                    .map_or(-1.0, |i| char_index_of(s, offset + i)),
            )
        }
        "lastIndexOf" => {
            let needle = text(args, 0);
            Value::Number(
                s.rfind(needle.as_str())
                    .map_or(-1.0, |i| char_index_of(s, i)),
            )
        }
        "charAt" => {
            let index = to_integer(args.first().map_or(0.0, Value::to_number));
            let c = if index >= 0.0 {
                chars.get(index as usize).copied()
            } else {
                None
            };
            Value::from(c.map(String::from).unwrap_or_default())
        }
        "at" => {
            let index = to_integer(args.first().map_or(0.0, Value::to_number));
            let resolved = if index < 0.0 { len as f64 + index } else { index };
            if resolved < 0.0 || resolved >= len as f64 {
                Value::Undefined
            } else {
                Value::from(chars[resolved as usize].to_string())
            }
        }
        "slice" => {
            let start = relative(args.first(), len, 0);
            let end = relative(args.get(1), len, len);
            interp.new_string(chars[start..end.max(start)].iter().collect())?
        }
        "substring" => {
            let clamp = |value: Option<&Value>, default: usize| match value {
                None | Some(Value::Undefined) => default,
                Some(v) => to_integer(v.to_number()).clamp(0.0, len as f64) as usize,
            };
            let (a, b) = (clamp(args.first(), 0), clamp(args.get(1), len));
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            interp.new_string(chars[start..end].iter().collect())?
        }
        "split" => {
            let separator = match args.first() {
                None | Some(Value::Undefined) => None,
                Some(separator) => Some(separator.to_js_string()),
            };
            let limit = match args.get(1) {
                None | Some(Value::Undefined) => usize::MAX,
                Some(value) => to_integer(value.to_number()).max(0.0) as usize,
            };
            let count = match separator.as_deref() {
                None => 1,
                Some("") => len,
                Some(separator) => s.matches(separator).count() + 1,
            }
            .min(limit);
            interp.reserve_slots(count)?;
            interp.charge(
                count
                    .saturating_mul(STRING_HEADER_BYTES)
                    .saturating_add(s.len()),
            )?;
            let parts: Vec<Value> = match separator.as_deref() {
                None => vec![Value::Str(Rc::clone(s))],
                Some("") => chars
                    .iter()
                    .take(count)
                    .map(|c| Value::from(c.to_string()))
                    .collect(),
                Some(separator) => s.split(separator).take(count).map(Value::from).collect(),
            };
            interp.keep_array(parts)
        }
        "repeat" => {
            let count = to_integer(args.first().map_or(0.0, Value::to_number));
            if count < 0.0 || count.is_infinite() {
                return throw(
                    "RangeError",
                    format!("Invalid count value: {}", number_to_string(count)),
                );
            }
            if count * s.len() as f64 > MAX_STRING_LEN as f64 {
                return throw("RangeError", "Invalid string length");
            }
            interp.new_string(s.repeat(count as usize))?
        }
        "padStart" | "padEnd" => {
            let target = to_integer(args.first().map_or(0.0, Value::to_number));
            if target > MAX_STRING_LEN as f64 {
                return throw("RangeError", "Invalid string length");
            }
            let filler: Vec<char> = match args.get(1) {
                None | Some(Value::Undefined) => vec![' '],
                Some(value) => value.to_js_string().chars().collect(),
            };
            let target = target.max(0.0) as usize;
            if target <= len || filler.is_empty() {
                Value::Str(Rc::clone(s))
            } else {
                let pad: String = filler.iter().cycle().take(target - len).collect();
                let mut out = String::new();
                if name == "padStart" {
                    push_text(&mut out, &pad)?;
                    push_text(&mut out, s)?;
                } else {
                    push_text(&mut out, s)?;
                    push_text(&mut out, &pad)?;
                }
                interp.new_string(out)?
            }
        }
        "replace" | "replaceAll" => {
            let pattern = text(args, 0);
            let replacement = arg(args, 1);
            let positions: Vec<usize> = if name == "replaceAll" {
                s.match_indices(pattern.as_str()).map(|(i, _)| i).collect()
            } else {
                s.find(pattern.as_str()).into_iter().collect()
            };
            let fixed = (!replacement.is_callable()).then(|| replacement.to_js_string());
            let mut out = String::with_capacity(s.len());
            let mut last = 0;
            for position in positions {
                push_text(&mut out, &s[last..position])?;
                match &fixed {
                    Some(fixed) => push_text(&mut out, fixed)?,
                    None => {
                        let matched = vec![
                            Value::from(pattern.as_str()),
                            Value::Number(char_index_of(s, position)),
                        ];
                        let piece = interp.call_value(&replacement, matched)?.to_js_string();
                        push_text(&mut out, &piece)?;
                    }
                }
                last = position + pattern.len();
            }
            push_text(&mut out, &s[last..])?;
            interp.new_string(out)?
        }
        "concat" => {
            let mut out = s.to_string();
            for value in args {
                push_text(&mut out, &value.to_js_string())?;
            }
            interp.new_string(out)?
        }
        _ => return throw("TypeError", format!("{name} is not a function")),
    };
    Ok(value)
}

fn expect_callback(args: &[Value]) -> Eval<Value> {
    let callback = arg(args, 0);
    if callback.is_callable() {
        Ok(callback)
    } else {
        throw(
            "TypeError",
            format!("{} is not a function", callback.to_js_string()),
        )
    }
}

fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_nan() && y.is_nan() => true,
        _ => strict_equals(a, b),
    }
}

fn array_method(
    interp: &mut Interpreter<'_>,
    items: &ArrayRef,
    this: &Value,
    name: &str,
    args: &[Value],
) -> Eval<Value> {
    let len = items.borrow().len();
    let value = match name {
        "push" => {
            interp.grow_array(items, args.len())?;
            let mut items = items.borrow_mut();
            items.extend(args.iter().cloned());
            Value::Number(items.len() as f64)
        }
        "pop" => items.borrow_mut().pop().unwrap_or_default(),
        "shift" => {
            let mut items = items.borrow_mut();
            if items.is_empty() {
                Value::Undefined
            } else {
                items.remove(0)
            }
        }
        "unshift" => {
            interp.grow_array(items, args.len())?;
            let mut items = items.borrow_mut();
            items.splice(0..0, args.iter().cloned());
            Value::Number(items.len() as f64)
        }
        "join" | "toString" => {
            let separator = match args.first() {
                Some(value) if name == "join" && !matches!(value, Value::Undefined) => {
                    value.to_js_string()
                }
                _ => ",".to_owned(),
            };
            let snapshot = items.borrow().clone();
            let mut joined = String::new();
            for (index, item) in snapshot.iter().enumerate() {
                if index > 0 {
                    push_text(&mut joined, &separator)?;
                }
                if !item.is_nullish() {
                    push_text(&mut joined, &item.to_js_string())?;
                }
            }
            interp.new_string(joined)?
        }
        "includes" => {
            let needle = arg(args, 0);
            Value::Bool(items.borrow().iter().any(|item| same_value_zero(item, &needle)))
        }
        "indexOf" => {
            let needle = arg(args, 0);
            let from = relative(args.get(1), len, 0);
            let found = items
                .borrow()
                .iter()
                .enumerate()
                .skip(from)
                .find(|(_, item)| strict_equals(item, &needle))
                .map(|(index, _)| index);
            Value::Number(found.map_or(-1.0, |i| i as f64))
        }
        "lastIndexOf" => {
            let needle = arg(args, 0);
            let found = items
                .borrow()
                .iter()
                .rposition(|item| strict_equals(item, &needle));
            Value::Number(found.map_or(-1.0, |i| i as f64))
        }
        "at" => {
            let index = to_integer(args.first().map_or(0.0, Value::to_number));
            let resolved = if index < 0.0 { len as f64 + index } else { index };
            if resolved < 0.0 || resolved >= len as f64 {
                Value::Undefined
            } else {
                items.borrow()[resolved as usize].clone()
            }
        }
        "slice" => {
            let start = relative(args.first(), len, 0);
            let end = relative(args.get(1), len, len);
            let sliced = items.borrow()[start..end.max(start)].to_vec();
            interp.new_array(sliced)?
        }
        "splice" => {
            let start = relative(args.first(), len, len);
            let delete = match args.get(1) {
                None => len - start,
                Some(value) => {
                    to_integer(value.to_number()).clamp(0.0, (len - start) as f64) as usize
                }
            };
            let inserted = args.iter().skip(2).cloned();
            interp.grow_array(items, inserted.len().saturating_sub(delete))?;
            let removed: Vec<Value> = items
                .borrow_mut()
                .splice(start..start + delete, inserted)
                .collect();
            interp.new_array(removed)?
        }
        "concat" => {
            let total = args.iter().fold(len, |total, value| {
                let added = match value {
                    Value::Array(other) => other.borrow().len(),
                    _ => 1,
                };
                total.saturating_add(added)
            });
            interp.reserve_slots(total)?;
            let mut out = Vec::with_capacity(total);
            out.extend(items.borrow().iter().cloned());
            for value in args {
                match value {
                    Value::Array(other) => out.extend(other.borrow().iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            interp.keep_array(out)
        }
        "reverse" => {
            items.borrow_mut().reverse();
            this.clone()
        }
        "map" | "filter" | "forEach" | "find" | "findIndex" | "some" | "every" => {
            let callback = expect_callback(args)?;
            let mut mapped = Vec::new();
            for index in 0..len {
                let Some(item) = items.borrow().get(index).cloned() else {
                    break;
                };
                let result = interp.call_value(
                    &callback,
                    vec![item.clone(), Value::Number(index as f64), this.clone()],
                )?;
                match name {
                    "map" => mapped.push(result),
                    "filter" if result.truthy() => mapped.push(item),
                    "find" if result.truthy() => return Ok(item),
                    "findIndex" if result.truthy() => return Ok(Value::Number(index as f64)),
                    "some" if result.truthy() => return Ok(Value::Bool(true)),
                    "every" if !result.truthy() => return Ok(Value::Bool(false)),
                    _ => {}
                }
            }
            match name {
                "map" | "filter" => interp.new_array(mapped)?,
                "findIndex" => Value::Number(-1.0),
                "some" => Value::Bool(false),
                "every" => Value::Bool(true),
                _ => Value::Undefined,
            }
        }
        "reduce" => {
            let callback = expect_callback(args)?;
            let mut index = 0;
            let mut accumulator = match args.get(1) {
                Some(initial) => initial.clone(),
                None => {
                    if len == 0 {
                        return throw("TypeError", "Reduce of empty array with no initial value");
                    }
                    index = 1;
                    items.borrow()[0].clone()
                }
            };
            while index < len {
                let Some(item) = items.borrow().get(index).cloned() else {
                    break;
                };
                accumulator = interp.call_value(
                    &callback,
                    vec![accumulator, item, Value::Number(index as f64), this.clone()],
                )?;
                index += 1;
            }
            accumulator
        }
        "sort" => {
            let comparator = match args.first() {
                None | Some(Value::Undefined) => None,
                Some(value) if value.is_callable() => Some(value.clone()),
                Some(_) => {
                    return throw(
                        "TypeError",
                        "The comparison function must be either a function or undefined",
                    );
                }
            };
            let snapshot = items.borrow().clone();
            let sorted = merge_sort(interp, snapshot, comparator.as_ref())?;
            *items.borrow_mut() = sorted;
            this.clone()
        }
        _ => return throw("TypeError", format!("{name} is not a function")),
    };
    Ok(value)
}

fn compare(
    interp: &mut Interpreter<'_>,
    a: &Value,
    b: &Value,
    comparator: Option<&Value>,
) -> Eval<Ordering> {
    match (a, b) {
        (Value::Undefined, Value::Undefined) => return Ok(Ordering::Equal),
        (Value::Undefined, _) => return Ok(Ordering::Greater),
        (_, Value::Undefined) => return Ok(Ordering::Less),
        _ => {}
    }
    match comparator {
        Some(function) => {
            let result = interp
                .call_value(function, vec![a.clone(), b.clone()])?
                .to_number();
            Ok(result.partial_cmp(&0.0).unwrap_or(Ordering::Equal))
        }
        None => Ok(a.to_js_string().cmp(&b.to_js_string())),
    }
}

/// Stable merge sort whose comparator may call back into the program.
fn merge_sort(
    interp: &mut Interpreter<'_>,
    mut items: Vec<Value>,
    comparator: Option<&Value>,
) -> Eval<Vec<Value>> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(interp, items, comparator)?;
    let right = merge_sort(interp, right, comparator)?;

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_left = match (left.peek(), right.peek()) {
            (Some(a), Some(b)) => compare(interp, a, b, comparator)? != Ordering::Greater,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_left { left.next() } else { right.next() };
        merged.extend(next);
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_reads_leading_digits() {
        assert_eq!(parse_int("42px", None), 42.0);
        assert_eq!(parse_int("  -17", None), -17.0);
        assert_eq!(parse_int("0x1A", None), 26.0);
        assert_eq!(parse_int("101", Some(2.0)), 5.0);
        assert!(parse_int("px", None).is_nan());
    }

    #[test]
    fn parse_float_reads_longest_prefix() {
        assert_eq!(parse_float("3.14abc"), 3.14);
        assert_eq!(parse_float("1e3"), 1000.0);
        assert_eq!(parse_float("2e"), 2.0);
        assert_eq!(parse_float("-Infinity"), f64::NEG_INFINITY);
        assert!(parse_float(".").is_nan());
    }

    #[test]
    fn math_round_rounds_halves_up() {
        let round = |x: f64| math(MathFn::Round, &[Value::Number(x)]);
        assert_eq!(round(2.5), 3.0);
        assert_eq!(round(-2.5), -2.0);
        assert_eq!(round(2.4), 2.0);
    }

    #[test]
    fn math_max_of_nothing_is_negative_infinity() {
        assert_eq!(math(MathFn::Max, &[]), f64::NEG_INFINITY);
        assert!(math(MathFn::Min, &[Value::Number(1.0), Value::from("x")]).is_nan());
    }

    #[test]
    fn integers_format_in_other_radixes() {
        assert_eq!(integer_to_radix(255.0, 16), "ff");
        assert_eq!(integer_to_radix(-5.0, 2), "-101");
        assert_eq!(integer_to_radix(0.0, 8), "0");
    }

    #[test]
    fn error_constructor_builds_error_objects() {
        let err = error_object(ErrorKind::RangeError, &[Value::from("too big")]);
        assert_eq!(err.to_js_string(), "RangeError: too big");
    }
}
