//! Composes a sequence of [`IndexerStep`]s into a single shape-preserving
//! `Value -> Value` function.
//!
//! This is the component that makes `@.a[0]` on `{"a":[1]}` return `1`
//! rather than `{"a":[1]}`: every step in the chain is `has_one_option`,
//! so each join point unwraps instead of re-wrapping in a one-element
//! container.

use linked_hash_map::LinkedHashMap;

use crate::dsl::indexer::{Element, IndexerStep};
use crate::error::Result;
use crate::value::Value;

/// An ordered chain of indexer steps, compiled once and applied to
/// however many inputs.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    steps: Vec<IndexerStep>,
}

impl Pipeline {
    /// Builds a pipeline from its steps, in application order.
    pub fn new(steps: Vec<IndexerStep>) -> Self {
        Pipeline { steps }
    }

    /// `true` if this pipeline has no steps at all (the atom is returned
    /// unchanged).
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Applies the full chain to `value`.
    pub fn apply(&self, value: &Value) -> Result<Value> {
        if self.steps.is_empty() {
            return Ok(value.clone());
        }
        apply_step(&self.steps, 0, value)
    }
}

fn apply_step(steps: &[IndexerStep], i: usize, value: &Value) -> Result<Value> {
    let step = &steps[i];
    let elements = step.eval(value)?;

    if elements.is_empty() {
        return Ok(empty_container(step.is_dict));
    }

    let is_last = i == steps.len() - 1;

    if is_last {
        return if step.has_one_option {
            Ok(elements.into_iter().next().expect("checked non-empty above").into_value())
        } else {
            Ok(materialize(elements))
        };
    }

    if step.is_projection {
        let container = materialize(elements);
        return apply_step(steps, i + 1, &container);
    }

    if step.has_one_option {
        let only = elements.into_iter().next().expect("checked non-empty above");
        return apply_step(steps, i + 1, &only.into_value());
    }

    // The step's actual shape is determined by peeking its elements, not
    // by trusting `step.is_dict` blindly: `Star` and `Boolean` yield
    // pairs or bare values depending on whether they were applied to an
    // Object or an Array, which isn't known until evaluation. `step.is_dict`
    // is only the fallback used above for the all-empty case, where
    // there is nothing left to peek.
    let is_dict = matches!(elements.first(), Some(Element::Pair(..)));

    let mut pairs = Vec::with_capacity(elements.len());
    for element in elements {
        let key = element.key().map(str::to_owned);
        let child = element.into_value();
        let result = apply_step(steps, i + 1, &child)?;
        // A sub-result that is an empty container (length 0) contributes
        // nothing to this level; a scalar sub-result, even one that looks
        // "empty" by some other measure, is always kept.
        if is_empty_container(&result) {
            continue;
        }
        pairs.push((key, result));
    }

    Ok(if is_dict {
        let mut out = LinkedHashMap::with_capacity(pairs.len());
        for (key, value) in pairs {
            out.insert(key.expect("dict-shaped step always carries keys"), value);
        }
        Value::Object(out)
    } else {
        Value::Array(pairs.into_iter().map(|(_, v)| v).collect())
    })
}

fn materialize(elements: Vec<Element>) -> Value {
    let is_dict = matches!(elements.first(), Some(Element::Pair(..)));
    if is_dict {
        let mut out = LinkedHashMap::with_capacity(elements.len());
        for element in elements {
            if let Element::Pair(k, v) = element {
                out.insert(k, v);
            }
        }
        Value::Object(out)
    } else {
        Value::Array(elements.into_iter().map(Element::into_value).collect())
    }
}

fn empty_container(is_dict: bool) -> Value {
    if is_dict {
        Value::Object(LinkedHashMap::new())
    } else {
        Value::Array(Vec::new())
    }
}

fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
