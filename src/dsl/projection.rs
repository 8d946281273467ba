//! Projections: the `{expr, expr, …}` / `{"k": expr, …}` synthesizer
//! that builds a new Array or Object out of arbitrary expressions over
//! the current value.
//!
//! Unlike a wire-protocol projection option evaluated server-side, this
//! one runs locally: each entry is an expression evaluated fresh against
//! the current value and collected into the synthesized container.

use crate::dsl::indexer::Element;
use crate::error::Result;
use crate::value::Value;

/// A compiled `{…}` synthesizer. Each child expression is compiled to a
/// `Value` — typically `Deferred`, since it is almost always built from
/// the enclosing current-input sigil — and resolved against the
/// projection's current input at evaluation time.
#[derive(Debug, Clone)]
pub enum Projection {
    /// `{expr, expr, …}`: yields bare values, array-shaped.
    Array(Vec<Value>),
    /// `{"k": expr, …}`: yields `(k, v)` pairs, object-shaped.
    Object(Vec<(String, Value)>),
}

impl Projection {
    /// Evaluates every child expression against `current_input` (the
    /// value this projection indexer was applied to), resolving
    /// `Deferred` children automatically.
    pub fn eval(&self, current_input: &Value) -> Result<Vec<Element>> {
        match self {
            Projection::Array(exprs) => exprs
                .iter()
                .map(|e| resolve(e, current_input).map(Element::Bare))
                .collect(),
            Projection::Object(entries) => entries
                .iter()
                .map(|(k, e)| resolve(e, current_input).map(|v| Element::Pair(k.clone(), v)))
                .collect(),
        }
    }
}

fn resolve(v: &Value, input: &Value) -> Result<Value> {
    match v {
        Value::Deferred(d) => d.call(input),
        other => Ok(other.clone()),
    }
}
