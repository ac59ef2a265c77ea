//! Remote value codec
//!
//! Converts host values into `Runtime.callFunctionOn` arguments and decodes
//! returned `RemoteObject`s. `undefined` and `null` stay distinct in both
//! directions; objects are only ever passed back by `objectId`.

use crate::cdp::types::{CallArgument, RemoteObject};
use crate::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Browser-issued handle to an in-page object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteObjectId(String);

impl RemoteObjectId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A remote reference stamped with the context generation it was issued in
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRef {
    /// Remote object id
    pub id: RemoteObjectId,
    /// Context generation at creation time
    pub generation: u64,
    /// Protocol subtype (`node`, `array`, `error`, ...)
    pub subtype: Option<String>,
    /// Constructor name, e.g. `HTMLDivElement`
    pub class_name: Option<String>,
    /// Short description, e.g. `div#outer.outer`
    pub description: Option<String>,
}

impl ObjectRef {
    /// Bare reference with no type information
    pub fn new<S: Into<String>>(id: S, generation: u64) -> Self {
        Self {
            id: RemoteObjectId::new(id),
            generation,
            subtype: None,
            class_name: None,
            description: None,
        }
    }

    /// Whether the object is a DOM node
    pub fn is_node(&self) -> bool {
        self.subtype.as_deref() == Some("node")
    }

    /// Whether the object is an array
    pub fn is_array(&self) -> bool {
        self.subtype.as_deref() == Some("array")
    }
}

/// A reference whose owner is kept alive for as long as the argument exists
///
/// The owner is whatever releases the remote object when dropped, so the id
/// stays valid until the call that carries it has finished.
#[derive(Clone)]
pub struct RetainedRef {
    object: ObjectRef,
    _owner: Arc<dyn Any + Send + Sync>,
}

impl RetainedRef {
    pub(crate) fn new(object: ObjectRef, owner: Arc<dyn Any + Send + Sync>) -> Self {
        Self { object, _owner: owner }
    }

    pub fn object(&self) -> &ObjectRef {
        &self.object
    }
}

impl fmt::Debug for RetainedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RetainedRef").field(&self.object).finish()
    }
}

impl PartialEq for RetainedRef {
    fn eq(&self, other: &Self) -> bool {
        self.object == other.object
    }
}

/// Decoded result of an in-page evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    Object(ObjectRef),
}

impl RemoteValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, RemoteValue::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RemoteValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RemoteValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RemoteValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RemoteValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            RemoteValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            RemoteValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// JavaScript truthiness
    pub fn is_truthy(&self) -> bool {
        match self {
            RemoteValue::Undefined | RemoteValue::Null => false,
            RemoteValue::Bool(b) => *b,
            RemoteValue::Number(n) => *n != 0.0 && !n.is_nan(),
            RemoteValue::String(s) => !s.is_empty(),
            RemoteValue::Date(_) | RemoteValue::Object(_) => true,
        }
    }

    /// Name of the variant for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            RemoteValue::Undefined => "undefined",
            RemoteValue::Null => "null",
            RemoteValue::Bool(_) => "boolean",
            RemoteValue::Number(_) => "number",
            RemoteValue::String(_) => "string",
            RemoteValue::Date(_) => "date",
            RemoteValue::Object(_) => "object",
        }
    }
}

/// Host value passed as an evaluation argument
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<Argument>),
    Record(BTreeMap<String, Argument>),
    Reference(ObjectRef),
    Retained(RetainedRef),
}

impl Argument {
    /// Remote object carried by this argument, if any
    pub fn reference(&self) -> Option<&ObjectRef> {
        match self {
            Argument::Reference(obj) => Some(obj),
            Argument::Retained(retained) => Some(retained.object()),
            _ => None,
        }
    }
}

impl From<bool> for Argument {
    fn from(b: bool) -> Self {
        Argument::Bool(b)
    }
}

impl From<f64> for Argument {
    fn from(n: f64) -> Self {
        Argument::Number(n)
    }
}

impl From<i32> for Argument {
    fn from(n: i32) -> Self {
        Argument::Number(f64::from(n))
    }
}

impl From<i64> for Argument {
    fn from(n: i64) -> Self {
        Argument::Number(n as f64)
    }
}

impl From<&str> for Argument {
    fn from(s: &str) -> Self {
        Argument::String(s.to_string())
    }
}

impl From<String> for Argument {
    fn from(s: String) -> Self {
        Argument::String(s)
    }
}

impl From<DateTime<Utc>> for Argument {
    fn from(d: DateTime<Utc>) -> Self {
        Argument::Date(d)
    }
}

impl From<ObjectRef> for Argument {
    fn from(obj: ObjectRef) -> Self {
        Argument::Reference(obj)
    }
}

impl<T: Into<Argument>> From<Vec<T>> for Argument {
    fn from(items: Vec<T>) -> Self {
        Argument::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Argument>> From<Option<T>> for Argument {
    fn from(value: Option<T>) -> Self {
        value.map_or(Argument::Null, Into::into)
    }
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Argument::Null,
            Value::Bool(b) => Argument::Bool(b),
            Value::Number(n) => Argument::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => Argument::String(s),
            Value::Array(items) => Argument::Array(items.into_iter().map(Argument::from).collect()),
            Value::Object(map) => {
                Argument::Record(map.into_iter().map(|(k, v)| (k, Argument::from(v))).collect())
            }
        }
    }
}

impl From<RemoteValue> for Argument {
    fn from(value: RemoteValue) -> Self {
        match value {
            RemoteValue::Undefined => Argument::Undefined,
            RemoteValue::Null => Argument::Null,
            RemoteValue::Bool(b) => Argument::Bool(b),
            RemoteValue::Number(n) => Argument::Number(n),
            RemoteValue::String(s) => Argument::String(s),
            RemoteValue::Date(d) => Argument::Date(d),
            RemoteValue::Object(obj) => Argument::Reference(obj),
        }
    }
}

/// Wire form of one argument
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedArgument {
    pub argument: CallArgument,
    /// The slot carries epoch millis that must become a `Date` in the page
    pub revive_date: bool,
}

fn by_value(value: Value) -> CallArgument {
    CallArgument {
        value: Some(value),
        ..Default::default()
    }
}

fn encode_number(n: f64) -> CallArgument {
    let unserializable = if n.is_nan() {
        "NaN"
    } else if n == f64::INFINITY {
        "Infinity"
    } else if n == f64::NEG_INFINITY {
        "-Infinity"
    } else if n == 0.0 && n.is_sign_negative() {
        "-0"
    } else {
        return by_value(Value::from(n));
    };

    CallArgument {
        unserializable_value: Some(unserializable.to_string()),
        ..Default::default()
    }
}

/// Encode a host value as a call argument
pub fn encode(arg: &Argument) -> Result<EncodedArgument> {
    let argument = match arg {
        Argument::Undefined => CallArgument::default(),
        Argument::Null => by_value(Value::Null),
        Argument::Bool(b) => by_value(Value::Bool(*b)),
        Argument::Number(n) => encode_number(*n),
        Argument::String(s) => by_value(Value::String(s.clone())),
        Argument::Date(d) => {
            return Ok(EncodedArgument {
                argument: by_value(Value::from(d.timestamp_millis())),
                revive_date: true,
            })
        }
        Argument::Reference(obj) | Argument::Retained(RetainedRef { object: obj, .. }) => {
            CallArgument {
                object_id: Some(obj.id.as_str().to_string()),
                ..Default::default()
            }
        }
        Argument::Array(_) | Argument::Record(_) => by_value(to_json(arg, "$")?),
    };

    Ok(EncodedArgument {
        argument,
        revive_date: false,
    })
}

/// JSON form of a value nested inside a composite
fn to_json(arg: &Argument, path: &str) -> Result<Value> {
    match arg {
        Argument::Null => Ok(Value::Null),
        Argument::Bool(b) => Ok(Value::Bool(*b)),
        Argument::Number(n) if n.is_finite() => Ok(Value::from(*n)),
        Argument::Number(n) => Err(Error::unencodable(format!(
            "{} at {} cannot be nested inside a composite value",
            n, path
        ))),
        Argument::String(s) => Ok(Value::String(s.clone())),
        Argument::Date(d) => Ok(Value::from(d.timestamp_millis())),
        Argument::Undefined => Err(Error::unencodable(format!(
            "undefined at {} cannot be nested inside a composite value",
            path
        ))),
        Argument::Reference(obj) | Argument::Retained(RetainedRef { object: obj, .. }) => {
            Err(Error::unencodable(format!(
                "remote reference {} at {} can only be passed as a top-level argument",
                obj.id, path
            )))
        }
        Argument::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| to_json(item, &format!("{}[{}]", path, i)))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Argument::Record(map) => map
            .iter()
            .map(|(k, v)| Ok((k.clone(), to_json(v, &format!("{}.{}", path, k))?)))
            .collect::<Result<serde_json::Map<_, _>>>()
            .map(Value::Object),
    }
}

fn malformed(obj: &RemoteObject) -> Error {
    Error::protocol(format!("Malformed remote {} value: {:?}", obj.r#type, obj.value))
}

fn parse_unserializable(literal: &str) -> Result<f64> {
    match literal {
        "NaN" => Ok(f64::NAN),
        "Infinity" => Ok(f64::INFINITY),
        "-Infinity" => Ok(f64::NEG_INFINITY),
        "-0" => Ok(-0.0),
        other => Err(Error::unsupported(format!("number literal {}", other))),
    }
}

/// Date from epoch milliseconds
pub fn date_from_millis(millis: f64) -> Result<RemoteValue> {
    if !millis.is_finite() {
        return Err(Error::unsupported(format!("date {}", millis)));
    }

    Utc.timestamp_millis_opt(millis.round() as i64)
        .single()
        .map(RemoteValue::Date)
        .ok_or_else(|| Error::unsupported(format!("date {}", millis)))
}

/// Parse `Date.prototype.toString()` output, e.g.
/// `Tue Feb 04 2020 10:00:00 GMT+0100 (Central European Standard Time)`
///
/// Second precision only; the bridge asks the page for the exact time instead.
fn parse_date_description(description: &str) -> Result<DateTime<Utc>> {
    let trimmed = description
        .split(" (")
        .next()
        .unwrap_or(description)
        .trim();

    DateTime::parse_from_str(trimmed, "%a %b %d %Y %H:%M:%S GMT%z")
        .map(|d| d.with_timezone(&Utc))
        .map_err(|_| Error::unsupported(format!("date {}", description)))
}

fn decode_date(obj: &RemoteObject) -> Result<RemoteValue> {
    // Dates returned by value arrive as epoch millis
    if let Some(millis) = obj.value.as_ref().and_then(Value::as_f64) {
        return date_from_millis(millis);
    }

    let description = obj
        .description
        .as_deref()
        .ok_or_else(|| Error::unsupported("date without description"))?;
    parse_date_description(description).map(RemoteValue::Date)
}

fn object_ref(obj: &RemoteObject, generation: u64) -> Result<RemoteValue> {
    let id = obj.object_id.as_deref().ok_or_else(|| {
        Error::unsupported(format!(
            "{} {} without object id",
            obj.r#type,
            obj.description.as_deref().unwrap_or("")
        ))
    })?;

    Ok(RemoteValue::Object(ObjectRef {
        id: RemoteObjectId::new(id),
        generation,
        subtype: obj.subtype.clone(),
        class_name: obj.class_name.clone(),
        description: obj.description.clone(),
    }))
}

/// Decode a remote object issued in the given context generation
pub fn decode(obj: &RemoteObject, generation: u64) -> Result<RemoteValue> {
    match obj.r#type.as_str() {
        "undefined" => Ok(RemoteValue::Undefined),
        "boolean" => obj
            .value
            .as_ref()
            .and_then(Value::as_bool)
            .map(RemoteValue::Bool)
            .ok_or_else(|| malformed(obj)),
        "string" => obj
            .value
            .as_ref()
            .and_then(Value::as_str)
            .map(|s| RemoteValue::String(s.to_string()))
            .ok_or_else(|| malformed(obj)),
        "number" => match &obj.unserializable_value {
            Some(literal) => parse_unserializable(literal).map(RemoteValue::Number),
            None => obj
                .value
                .as_ref()
                .and_then(Value::as_f64)
                .map(RemoteValue::Number)
                .ok_or_else(|| malformed(obj)),
        },
        "object" => match obj.subtype.as_deref() {
            Some("null") => Ok(RemoteValue::Null),
            Some("date") => decode_date(obj),
            Some("wasmvalue") | Some("webassemblymemory") => {
                Err(Error::unsupported(format!("wasm {}", obj.subtype.as_deref().unwrap_or(""))))
            }
            _ => object_ref(obj, generation),
        },
        "function" => object_ref(obj, generation),
        "bigint" | "symbol" => Err(Error::unsupported(format!(
            "{} {}",
            obj.r#type,
            obj.description
                .as_deref()
                .or(obj.unserializable_value.as_deref())
                .unwrap_or("")
        ))),
        other => Err(Error::unsupported(other.to_string())),
    }
}
