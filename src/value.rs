//! The JSON value model that compiled queries operate over.
//!
//! A bit-flag type tag gives composite classification of value shapes,
//! and the distinguished [`Value::Deferred`] variant stands in for "a
//! function of the current input" wherever a concrete value would
//! otherwise go.

use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use linked_hash_map::LinkedHashMap;
use regex::Regex;

use crate::error::Result;

bitflags! {
    /// A bit-flag classification of [`Value`] variants. Composite flags
    /// (`NUM`, `ITERABLE`, `STR_OR_REGEX`, `INT_OR_SLICE`) let callers
    /// test "is this any of several shapes" in one comparison.
    #[derive(Default)]
    pub struct TypeTag: u16 {
        /// No value; JSON `null`.
        const NULL    = 0b0000_0000_0001;
        /// `true` or `false`.
        const BOOL    = 0b0000_0000_0010;
        /// A signed 64-bit integer.
        const INT     = 0b0000_0000_0100;
        /// A double-precision float.
        const FLOAT   = 0b0000_0000_1000;
        /// A UTF-8 string.
        const STR     = 0b0000_0001_0000;
        /// A compiled regular expression.
        const REGEX   = 0b0000_0010_0000;
        /// A `[start?, stop?, step?]` slice triple.
        const SLICE   = 0b0000_0100_0000;
        /// An ordered sequence of values.
        const ARR     = 0b0000_1000_0000;
        /// An insertion-ordered, key-unique mapping.
        const OBJ     = 0b0001_0000_0000;
        /// The type could not be determined statically.
        const UNKNOWN = 0b0010_0000_0000;

        /// Either numeric variant.
        const NUM          = Self::INT.bits | Self::FLOAT.bits;
        /// Either container variant.
        const ITERABLE     = Self::ARR.bits | Self::OBJ.bits;
        /// A string or a regex (both valid `NameList` entries).
        const STR_OR_REGEX = Self::STR.bits | Self::REGEX.bits;
        /// An int or a slice (both valid `SliceList` entries).
        const INT_OR_SLICE = Self::INT.bits | Self::SLICE.bits;
        /// A string or either container variant (anything `len` accepts).
        const STR_OR_ITERABLE = Self::STR.bits | Self::ARR.bits | Self::OBJ.bits;
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.contains(TypeTag::UNKNOWN) {
            return f.write_str("unknown");
        }

        let names: &[(TypeTag, &str)] = &[
            (TypeTag::NULL, "null"),
            (TypeTag::BOOL, "bool"),
            (TypeTag::INT, "int"),
            (TypeTag::FLOAT, "float"),
            (TypeTag::STR, "string"),
            (TypeTag::REGEX, "regex"),
            (TypeTag::SLICE, "slice"),
            (TypeTag::ARR, "array"),
            (TypeTag::OBJ, "object"),
        ];

        let mut first = true;
        for &(flag, name) in names {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }

        Ok(())
    }
}

/// A `[start?, stop?, step?]` slice specifier, using Python-style
/// negative-index and clamping semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SliceSpec {
    /// Inclusive start index, if given.
    pub start: Option<i64>,
    /// Exclusive stop index, if given.
    pub stop: Option<i64>,
    /// Step, if given; must not be zero.
    pub step: Option<i64>,
}

/// A value standing for "a function of the current input".
/// Every operator and indexer that encounters a `Deferred` operand must
/// either invoke it (if the current input is at hand) or wrap itself in
/// a new `Deferred` that closes over it.
#[derive(Clone)]
pub struct Deferred {
    /// The statically-known output type, or `TypeTag::UNKNOWN`.
    pub type_hint: TypeTag,
    func: Rc<dyn Fn(&Value) -> Result<Value>>,
}

impl Deferred {
    /// Wraps a pure function of the current input as a `Deferred` value.
    pub fn new<F>(type_hint: TypeTag, func: F) -> Self
    where
        F: Fn(&Value) -> Result<Value> + 'static,
    {
        Deferred {
            type_hint,
            func: Rc::new(func),
        }
    }

    /// Evaluates the thunk against the given input.
    pub fn call(&self, input: &Value) -> Result<Value> {
        (self.func)(input)
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Deferred({})", self.type_hint)
    }
}

/// A JSON-like value, extended with a [`Deferred`] variant standing for
/// "a function of the current input".
#[derive(Debug, Clone)]
pub enum Value {
    /// JSON `null`.
    Null,
    /// `true` or `false`.
    Bool(bool),
    /// A signed 64-bit integer.
    Int(i64),
    /// A double-precision float.
    Float(f64),
    /// A UTF-8 string.
    String(String),
    /// A compiled regular expression.
    Regex(Regex),
    /// A `[start?, stop?, step?]` slice triple.
    Slice(SliceSpec),
    /// An ordered sequence of values.
    Array(Vec<Value>),
    /// An insertion-ordered, key-unique mapping from strings to values.
    Object(LinkedHashMap<String, Value>),
    /// A function of the current input, not yet applied to one.
    Deferred(Deferred),
}

impl Value {
    /// Classifies this value's shape.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Null => TypeTag::NULL,
            Value::Bool(_) => TypeTag::BOOL,
            Value::Int(_) => TypeTag::INT,
            Value::Float(_) => TypeTag::FLOAT,
            Value::String(_) => TypeTag::STR,
            Value::Regex(_) => TypeTag::REGEX,
            Value::Slice(_) => TypeTag::SLICE,
            Value::Array(_) => TypeTag::ARR,
            Value::Object(_) => TypeTag::OBJ,
            Value::Deferred(d) => d.type_hint,
        }
    }

    /// `true` for `Value::Deferred(_)`.
    pub fn is_deferred(&self) -> bool {
        matches!(self, Value::Deferred(_))
    }

    /// `true` for `Value::Array(_)` or `Value::Object(_)`.
    pub fn is_iterable(&self) -> bool {
        self.type_tag().intersects(TypeTag::ITERABLE)
    }

    /// Wraps a pure function of the current input in a `Value::Deferred`.
    pub fn deferred<F>(type_hint: TypeTag, func: F) -> Self
    where
        F: Fn(&Value) -> Result<Value> + 'static,
    {
        Value::Deferred(Deferred::new(type_hint, func))
    }

    /// The identity thunk: `Value::deferred` that returns its input
    /// unchanged. This is what the current-input sigil (`@`) compiles to
    ///.
    pub fn current_input() -> Self {
        Value::deferred(TypeTag::UNKNOWN, |input| Ok(input.clone()))
    }

    /// Converts a `serde_json::Value` into this crate's `Value`.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => {
                let mut out = LinkedHashMap::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k, Value::from_json(v));
                }
                Value::Object(out)
            }
        }
    }

    /// Converts this `Value` back to a `serde_json::Value`. Fails with
    /// `ErrorKind::InternalCast` for a `Deferred` that was never resolved
    /// against an input, and for a non-finite float or a bare regex/slice,
    /// none of which have a JSON representation.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        use crate::error::Error;

        match self {
            Value::Null => Ok(serde_json::Value::Null),
            Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            Value::Int(i) => Ok(serde_json::Value::from(*i)),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .ok_or_else(|| Error::internal_cast("non-finite float has no JSON representation")),
            Value::String(s) => Ok(serde_json::Value::String(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(Value::to_json)
                .collect::<Result<Vec<_>>>()
                .map(serde_json::Value::Array),
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map.iter() {
                    out.insert(k.clone(), v.to_json()?);
                }
                Ok(serde_json::Value::Object(out))
            }
            Value::Regex(_) => Err(Error::internal_cast("a regex has no JSON representation")),
            Value::Slice(_) => Err(Error::internal_cast("a slice has no JSON representation")),
            Value::Deferred(_) => Err(Error::internal_cast("an unresolved deferred value has no JSON representation")),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Regex(a), Value::Regex(b)) => a.as_str() == b.as_str(),
            (Value::Slice(a), Value::Slice(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
            }
            (Value::Deferred(a), Value::Deferred(b)) => Rc::ptr_eq(&a.func, &b.func),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_tag_composites() {
        assert!(TypeTag::NUM.contains(TypeTag::INT));
        assert!(TypeTag::NUM.contains(TypeTag::FLOAT));
        assert!(!TypeTag::NUM.contains(TypeTag::STR));
        assert!(TypeTag::ITERABLE.contains(TypeTag::ARR));
        assert!(TypeTag::ITERABLE.contains(TypeTag::OBJ));
    }

    #[test]
    fn from_json_round_trips_object_order() {
        let json: serde_json::Value = serde_json::json!({ "b": 1, "a": 2 });
        let value = Value::from_json(json);
        match &value {
            Value::Object(map) => {
                let keys: Vec<&str> = map.keys().map(String::as_str).collect();
                assert_eq!(keys, vec!["b", "a"]);
            }
            _ => panic!("expected an object"),
        }
        let back = value.to_json().unwrap();
        assert_eq!(back, serde_json::json!({ "b": 1, "a": 2 }));
    }

    #[test]
    fn deferred_call_resolves_against_input() {
        let input = Value::Int(41);
        let d = Value::deferred(TypeTag::INT, |v| match v {
            Value::Int(n) => Ok(Value::Int(n + 1)),
            _ => unreachable!(),
        });
        match d {
            Value::Deferred(d) => assert_eq!(d.call(&input).unwrap(), Value::Int(42)),
            _ => panic!("expected deferred"),
        }
    }

    #[test]
    fn current_input_is_identity() {
        let input = Value::String("hi".into());
        match Value::current_input() {
            Value::Deferred(d) => assert_eq!(d.call(&input).unwrap(), input),
            _ => panic!("expected deferred"),
        }
    }
}
