//! Runtime values and the coercions learner programs observe.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Map, Number};

use crate::interp::Closure;
use crate::interp::builtins::Builtin;

pub type ArrayRef = Rc<RefCell<Vec<Value>>>;
pub type ObjectRef = Rc<RefCell<JsObject>>;

/// Longest string a program may build, in bytes.
pub(crate) const MAX_STRING_LEN: usize = 1 << 24;
/// Longest array a program may build.
pub(crate) const MAX_ARRAY_LEN: usize = 1 << 24;
/// Deepest nesting `ToString` and JSON conversion walk into.
const MAX_NESTING: usize = 2_000;

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(Rc<Closure>),
    Native(Builtin),
    /// A string or array method read off its receiver without being called.
    Method(Rc<BoundMethod>),
}

#[derive(Debug)]
pub struct BoundMethod {
    pub receiver: Value,
    pub name: String,
}

/// Name and message carried by error objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorData {
    pub name: String,
    pub message: String,
}

/// Insertion-ordered property bag.
#[derive(Debug, Default)]
pub struct JsObject {
    pub props: Vec<(String, Value)>,
    pub error: Option<ErrorData>,
}

impl JsObject {
    #[must_use]
    pub fn with_props(props: Vec<(String, Value)>) -> Self {
        Self { props, error: None }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some((_, value)) = self.props.iter().find(|(k, _)| k == key) {
            return Some(value.clone());
        }
        let error = self.error.as_ref()?;
        match key {
            "name" => Some(Value::from(error.name.as_str())),
            "message" => Some(Value::from(error.message.as_str())),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: Value) {
        if let Some(slot) = self.props.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value;
        } else {
            self.props.push((key.to_owned(), value));
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl Value {
    #[must_use]
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    #[must_use]
    pub fn object(obj: JsObject) -> Self {
        Value::Object(Rc::new(RefCell::new(obj)))
    }

    #[must_use]
    pub fn error(name: &str, message: impl Into<String>) -> Self {
        Value::object(JsObject {
            props: Vec::new(),
            error: Some(ErrorData {
                name: name.to_owned(),
                message: message.into(),
            }),
        })
    }

    /// Name and message when this is an error object.
    #[must_use]
    pub fn error_data(&self) -> Option<ErrorData> {
        match self {
            Value::Object(obj) => {
                let obj = obj.borrow();
                let error = obj.error.as_ref()?;
                let message = obj
                    .get("message")
                    .map_or_else(|| error.message.clone(), |m| m.to_js_string());
                Some(ErrorData {
                    name: error.name.clone(),
                    message,
                })
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    #[must_use]
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Function(_) | Value::Native(_) | Value::Method(_)
        )
    }

    #[must_use]
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Function(_) | Value::Native(_) | Value::Method(_) => "function",
        }
    }

    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::Str(s) => string_to_number(s),
            Value::Array(_) => string_to_number(&self.to_js_string()),
            _ => f64::NAN,
        }
    }

    /// Abstract `ToString`.
    ///
    /// Array text stops growing once it passes [`MAX_STRING_LEN`], so callers
    /// that keep the result check its length.
    #[must_use]
    pub fn to_js_string(&self) -> String {
        let mut out = String::new();
        let mut seen = Vec::new();
        self.write_js_string(&mut out, &mut seen);
        out
    }

    fn write_js_string(&self, out: &mut String, seen: &mut Vec<*const RefCell<Vec<Value>>>) {
        match self {
            Value::Undefined => out.push_str("undefined"),
            Value::Null => out.push_str("null"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Number(n) => out.push_str(&number_to_string(*n)),
            Value::Str(s) => out.push_str(s),
            Value::Array(items) => {
                let ptr = Rc::as_ptr(items);
                if seen.len() >= MAX_NESTING || seen.contains(&ptr) {
                    return;
                }
                seen.push(ptr);
                for (index, item) in items.borrow().iter().enumerate() {
                    if out.len() > MAX_STRING_LEN {
                        break;
                    }
                    if index > 0 {
                        out.push(',');
                    }
                    if !item.is_nullish() {
                        item.write_js_string(out, seen);
                    }
                }
                seen.pop();
            }
            Value::Object(_) => match self.error_data() {
                Some(ErrorData { name, message }) if message.is_empty() => out.push_str(&name),
                Some(ErrorData { name, message }) => {
                    out.push_str(&name);
                    out.push_str(": ");
                    out.push_str(&message);
                }
                None => out.push_str("[object Object]"),
            },
            Value::Function(closure) => {
                out.push_str(&format!("function {}() {{ [code] }}", closure.name()));
            }
            Value::Native(builtin) => {
                out.push_str(&format!("function {}() {{ [native code] }}", builtin.name()));
            }
            Value::Method(method) => {
                out.push_str(&format!("function {}() {{ [native code] }}", method.name));
            }
        }
    }

    /// Property key form of a value used with `obj[key]`.
    #[must_use]
    pub fn to_property_key(&self) -> String {
        self.to_js_string()
    }
}

//
// ─── NUMBERS ───────────────────────────────────────────────────────────────────
//

/// `Number.prototype.toString()` for base 10.
#[must_use]
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_owned();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned();
    }
    if n == 0.0 {
        return "0".to_owned();
    }
    let magnitude = n.abs();
    if (1e-6..1e21).contains(&magnitude) {
        return format!("{n}");
    }
    let formatted = format!("{n:e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{mantissa}e+{exponent}")
        }
        _ => formatted,
    }
}

/// String-to-number coercion: whitespace-trimmed, empty is zero, garbage is NaN.
#[must_use]
pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    let radix = match trimmed.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return u64::from_str_radix(&trimmed[2..], radix).map_or(f64::NAN, |v| v as f64);
    }
    let numeric = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !numeric {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Integer part, with NaN read as zero.
#[must_use]
pub fn to_integer(n: f64) -> f64 {
    if n.is_nan() { 0.0 } else { n.trunc() }
}

/// `Number.prototype.toFixed`: exact decimal value, exact ties pick the larger magnitude.
#[must_use]
pub fn to_fixed(n: f64, digits: usize) -> String {
    if !n.is_finite() || n.abs() >= 1e21 {
        return number_to_string(n);
    }
    let magnitude = n.abs();
    let wide = format!("{magnitude:.*}", digits + 30);
    let (head, tail) = wide.split_at(wide.len() - 30);
    let is_tie = tail.starts_with('5') && tail[1..].bytes().all(|b| b == b'0');
    let mut out = if is_tie {
        increment_last_digit(head.trim_end_matches('.'))
    } else {
        format!("{magnitude:.digits$}")
    };
    if n < 0.0 {
        out.insert(0, '-');
    }
    out
}

/// Add one unit in the last place of a plain decimal string.
fn increment_last_digit(decimal: &str) -> String {
    let mut bytes = decimal.as_bytes().to_vec();
    let mut index = bytes.len();
    loop {
        if index == 0 {
            bytes.insert(0, b'1');
            break;
        }
        index -= 1;
        match bytes[index] {
            b'.' => continue,
            b'9' => bytes[index] = b'0',
            digit => {
                bytes[index] = digit + 1;
                break;
            }
        }
    }
    String::from_utf8(bytes).unwrap_or_default()
}

//
// ─── EQUALITY ──────────────────────────────────────────────────────────────────
//

#[must_use]
pub fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => Rc::ptr_eq(x, y),
        (Value::Object(x), Value::Object(y)) => Rc::ptr_eq(x, y),
        (Value::Function(x), Value::Function(y)) => Rc::ptr_eq(x, y),
        (Value::Native(x), Value::Native(y)) => x == y,
        (Value::Method(x), Value::Method(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

/// Abstract equality (`==`).
#[must_use]
pub fn loose_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (x, y) if x.is_nullish() && y.is_nullish() => true,
        (x, y) if x.is_nullish() || y.is_nullish() => false,
        (Value::Number(_), Value::Str(_)) | (Value::Str(_), Value::Number(_)) => {
            a.to_number() == b.to_number()
        }
        (Value::Bool(_), _) => loose_equals(&Value::Number(a.to_number()), b),
        (_, Value::Bool(_)) => loose_equals(a, &Value::Number(b.to_number())),
        (
            Value::Array(_) | Value::Object(_),
            Value::Number(_) | Value::Str(_),
        ) => loose_equals(&Value::from(a.to_js_string()), b),
        (
            Value::Number(_) | Value::Str(_),
            Value::Array(_) | Value::Object(_),
        ) => loose_equals(a, &Value::from(b.to_js_string())),
        _ => strict_equals(a, b),
    }
}

//
// ─── JSON ──────────────────────────────────────────────────────────────────────
//

/// Why a value could not become JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonError {
    /// The value contains itself.
    Circular,
    /// The text would be longer than any string a program may hold.
    TooLarge,
    /// Nesting goes deeper than conversion walks.
    TooDeep,
}

/// Convert to the JSON tree `JSON.stringify` would serialize.
///
/// `Ok(None)` is the "not serializable" case (functions, `undefined`).
pub fn to_json(value: &Value) -> Result<Option<serde_json::Value>, JsonError> {
    to_json_indented(value, 0)
}

/// [`to_json`] for text that will be printed with `indent` spaces per level.
pub fn to_json_indented(
    value: &Value,
    indent: usize,
) -> Result<Option<serde_json::Value>, JsonError> {
    let mut walk = JsonWalk {
        indent,
        ..JsonWalk::default()
    };
    walk.convert(value)
}

/// Cycle stack plus a running estimate of the serialized size.
#[derive(Default)]
struct JsonWalk {
    stack: Vec<usize>,
    size: usize,
    indent: usize,
}

impl JsonWalk {
    fn convert(&mut self, value: &Value) -> Result<Option<serde_json::Value>, JsonError> {
        let json = match value {
            Value::Undefined | Value::Function(_) | Value::Native(_) | Value::Method(_) => {
                return Ok(None);
            }
            Value::Null => {
                self.grow(4)?;
                serde_json::Value::Null
            }
            Value::Bool(b) => {
                self.grow(5)?;
                serde_json::Value::Bool(*b)
            }
            Value::Number(n) => {
                self.grow(24)?;
                json_number(*n)
            }
            Value::Str(s) => {
                self.grow(s.len() + 2)?;
                serde_json::Value::String(s.to_string())
            }
            Value::Array(items) => {
                self.enter(Rc::as_ptr(items) as usize)?;
                let mut out = Vec::new();
                for item in items.borrow().iter() {
                    self.grow_entry()?;
                    out.push(self.convert(item)?.unwrap_or(serde_json::Value::Null));
                }
                self.stack.pop();
                serde_json::Value::Array(out)
            }
            Value::Object(obj) => {
                self.enter(Rc::as_ptr(obj) as usize)?;
                let mut out = Map::new();
                for (key, item) in &obj.borrow().props {
                    if let Some(json) = self.convert(item)? {
                        self.grow_entry()?;
                        self.grow(key.len() + 4)?;
                        out.insert(key.clone(), json);
                    }
                }
                self.stack.pop();
                serde_json::Value::Object(out)
            }
        };
        Ok(Some(json))
    }

    fn enter(&mut self, id: usize) -> Result<(), JsonError> {
        if self.stack.contains(&id) {
            return Err(JsonError::Circular);
        }
        if self.stack.len() >= MAX_NESTING {
            return Err(JsonError::TooDeep);
        }
        self.grow(2)?;
        self.stack.push(id);
        Ok(())
    }

    /// Separator plus the indentation pretty printing puts before an entry.
    fn grow_entry(&mut self) -> Result<(), JsonError> {
        let pad = if self.indent == 0 {
            0
        } else {
            1 + self.indent.saturating_mul(self.stack.len())
        };
        self.grow(1 + pad)
    }

    fn grow(&mut self, bytes: usize) -> Result<(), JsonError> {
        self.size = self.size.saturating_add(bytes);
        if self.size > MAX_STRING_LEN {
            return Err(JsonError::TooLarge);
        }
        Ok(())
    }
}

fn json_number(n: f64) -> serde_json::Value {
    const SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
    if !n.is_finite() {
        return serde_json::Value::Null;
    }
    if n.fract() == 0.0 && n.abs() <= SAFE_INTEGER {
        return serde_json::Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

/// Serialize a JSON tree compactly or with `indent` spaces per level.
#[must_use]
pub fn json_to_string(json: &serde_json::Value, indent: usize) -> String {
    if indent == 0 {
        return json.to_string();
    }
    let pad = " ".repeat(indent.min(10));
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(pad.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    if serde::Serialize::serialize(json, &mut serializer).is_err() {
        return json.to_string();
    }
    String::from_utf8(buf).unwrap_or_else(|_| json.to_string())
}

/// Text `console.log` prints for one argument.
///
/// Objects, arrays and `null` go through JSON; everything else through `ToString`.
pub fn display_for_log(value: &Value) -> Result<String, JsonError> {
    match value {
        Value::Null | Value::Array(_) | Value::Object(_) => Ok(to_json(value)?
            .map(|json| json.to_string())
            .unwrap_or_default()),
        other => Ok(other.to_js_string()),
    }
}

/// Quote a string the way `JSON.stringify` does.
#[must_use]
pub fn quote(s: &str) -> String {
    serde_json::Value::String(s.to_owned()).to_string()
}
