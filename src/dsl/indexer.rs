//! The indexer algebra: five strategies for selecting or synthesizing
//! child values out of a single JSON value.
//!
//! Each variant is a flat, tagged strategy rather than a trait object,
//! so the whole algebra stays a closed, matchable enum. `IndexerStep`'s
//! shape-classification flags (`has_one_option`, `is_dict`,
//! `is_recursive`, `is_projection`) are consumed by `dsl::pipeline`,
//! which composes a sequence of steps into a single shape-preserving
//! function.

use std::collections::HashSet;

use regex::Regex;

use crate::dsl::projection::Projection;
use crate::error::{Error, Result};
use crate::value::{SliceSpec, Value};

/// One selected or synthesized child: either a keyed entry (for
/// object-shaped results) or a bare value (for array-shaped results).
#[derive(Debug, Clone)]
pub enum Element {
    /// A `(key, value)` pair, selected from or destined for an Object.
    Pair(String, Value),
    /// A bare value, selected from or destined for an Array.
    Bare(Value),
}

impl Element {
    /// Unwraps to the underlying value, discarding any key.
    pub fn into_value(self) -> Value {
        match self {
            Element::Pair(_, v) => v,
            Element::Bare(v) => v,
        }
    }

    /// The key, if this is a `Pair`.
    pub fn key(&self) -> Option<&str> {
        match self {
            Element::Pair(k, _) => Some(k),
            Element::Bare(_) => None,
        }
    }
}

/// One entry of a [`Indexer::NameList`]: a literal key or a pattern to
/// match keys against.
#[derive(Debug, Clone)]
pub enum NameEntry {
    /// Matches a key by exact equality.
    Literal(String),
    /// Matches any key the regex matches.
    Pattern(Regex),
}

/// One entry of a [`Indexer::SliceList`]: a single position or a
/// `[start?, stop?, step?]` range.
#[derive(Debug, Clone)]
pub enum SliceEntry {
    /// A single, possibly negative, index.
    Index(i64),
    /// A Python-style slice.
    Range(SliceSpec),
}

/// A strategy for selecting or synthesizing child values from a single
/// JSON value.
#[derive(Debug, Clone)]
pub enum Indexer {
    /// Selects keys from an Object, in list order.
    NameList(Vec<NameEntry>),
    /// Selects positions from an Array, in list order.
    SliceList(Vec<SliceEntry>),
    /// Selects every child.
    Star,
    /// A (often `Deferred`) value that decides inclusion per element.
    Boolean(Value),
    /// Synthesizes a new Object or Array from arbitrary expressions.
    Projection(Projection),
}

impl Indexer {
    /// Evaluates this indexer against `value`, non-recursively.
    pub fn eval(&self, value: &Value) -> Result<Vec<Element>> {
        match self {
            Indexer::NameList(entries) => eval_namelist(entries, value),
            Indexer::SliceList(entries) => eval_slicelist(entries, value),
            Indexer::Star => eval_star(value),
            Indexer::Boolean(index) => eval_boolean(index, value),
            Indexer::Projection(p) => p.eval(value),
        }
    }

    /// Evaluates this indexer against `value` with `..`-style recursive
    /// descent. Only `NameList` and `Star` support this; every other variant rejects with an indexing error.
    pub fn eval_recursive(&self, value: &Value) -> Result<Vec<Element>> {
        match self {
            Indexer::NameList(entries) => Ok(eval_namelist_recursive(entries, value)),
            Indexer::Star => Ok(eval_star_recursive(value)),
            Indexer::SliceList(_) => Err(Error::indexing("recursive slice indexers (`..[n]`) are not supported")),
            Indexer::Boolean(_) => Err(Error::indexing("a boolean index cannot be applied recursively")),
            Indexer::Projection(_) => Err(Error::indexing("a projection cannot be applied recursively")),
        }
    }
}

fn eval_namelist(entries: &[NameEntry], value: &Value) -> Result<Vec<Element>> {
    let obj = match value {
        Value::Object(map) => map,
        _ => return Err(Error::internal_cast("a name indexer requires an object")),
    };

    let mut out = Vec::new();
    for entry in entries {
        match entry {
            NameEntry::Literal(key) => {
                if let Some(v) = obj.get(key) {
                    out.push(Element::Pair(key.clone(), v.clone()));
                }
            }
            NameEntry::Pattern(re) => {
                for (k, v) in obj.iter() {
                    if re.is_match(k) {
                        out.push(Element::Pair(k.clone(), v.clone()));
                    }
                }
            }
        }
    }
    Ok(out)
}

/// Depth-first recursive search for `..name` / `..[names]`. One pass per
/// list entry, in document order, with a shared visited-path set so a
/// node matched independently by two entries (e.g. a literal and an
/// overlapping regex) is only emitted once.
///
/// Results are emitted as bare values, not `(k, v)` pairs: distinct
/// matched nodes may legitimately share a key (that's the whole point of
/// `..name`), so the result can never be reassembled into a key-unique
/// Object — a recursive step is always array-shaped regardless of what
/// it searches for.
fn eval_namelist_recursive(entries: &[NameEntry], value: &Value) -> Vec<Element> {
    let mut visited = HashSet::new();
    let mut out = Vec::new();
    for entry in entries {
        visit_namelist(entry, value, "", &mut visited, &mut out);
    }
    out
}

fn visit_namelist(entry: &NameEntry, node: &Value, path: &str, visited: &mut HashSet<String>, out: &mut Vec<Element>) {
    match node {
        Value::Object(map) => {
            for (k, v) in map.iter() {
                let child_path = format!("{}/{}", path, k);
                let matched = match entry {
                    NameEntry::Literal(lit) => k == lit,
                    NameEntry::Pattern(re) => re.is_match(k),
                };
                if matched && visited.insert(child_path.clone()) {
                    out.push(Element::Bare(v.clone()));
                }
                // A matched node's own descendants are still searched:
                // `..a` on nested same-key objects must yield every
                // physically distinct match, not just the outermost one.
                visit_namelist(entry, v, &child_path, visited, out);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                let child_path = format!("{}/[{}]", path, i);
                visit_namelist(entry, v, &child_path, visited, out);
            }
        }
        _ => {}
    }
}

fn eval_star(value: &Value) -> Result<Vec<Element>> {
    match value {
        Value::Object(map) => Ok(map.iter().map(|(k, v)| Element::Pair(k.clone(), v.clone())).collect()),
        Value::Array(items) => Ok(items.iter().cloned().map(Element::Bare).collect()),
        _ => Err(Error::internal_cast("`*` requires an object or an array")),
    }
}

/// `..*` / `..[*]`: every scalar leaf, in document order, with no keys
/// and no interior containers emitted.
fn eval_star_recursive(value: &Value) -> Vec<Element> {
    let mut out = Vec::new();
    collect_leaves(value, &mut out);
    out
}

fn collect_leaves(value: &Value, out: &mut Vec<Element>) {
    match value {
        Value::Object(map) => {
            for (_, v) in map.iter() {
                collect_leaves(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_leaves(v, out);
            }
        }
        scalar => out.push(Element::Bare(scalar.clone())),
    }
}

fn eval_slicelist(entries: &[SliceEntry], value: &Value) -> Result<Vec<Element>> {
    let items = match value {
        Value::Array(items) => items,
        _ => return Err(Error::internal_cast("an index/slice indexer requires an array")),
    };
    let len = items.len() as i64;

    let mut out = Vec::new();
    for entry in entries {
        match entry {
            SliceEntry::Index(i) => {
                if let Some(idx) = normalize_index(*i, len) {
                    out.push(Element::Bare(items[idx as usize].clone()));
                }
                // Out-of-range indices are silently skipped, not an error.
            }
            SliceEntry::Range(spec) => {
                if spec.step == Some(0) {
                    return Err(Error::indexing("a slice step must not be zero"));
                }
                for idx in slice_indices(spec, len) {
                    out.push(Element::Bare(items[idx as usize].clone()));
                }
            }
        }
    }
    Ok(out)
}

fn normalize_index(i: i64, len: i64) -> Option<i64> {
    let idx = if i < 0 { i + len } else { i };
    if idx >= 0 && idx < len {
        Some(idx)
    } else {
        None
    }
}

/// Python-style `[start:stop:step]` bounds clamping, including negative
/// step.
fn slice_bounds(spec: &SliceSpec, len: i64) -> (i64, i64, i64) {
    let step = spec.step.unwrap_or(1);
    let (default_start, default_stop) = if step > 0 { (0, len) } else { (len - 1, -1) };

    let normalize = |v: i64, lo: i64, hi: i64| {
        let v = if v < 0 { v + len } else { v };
        v.max(lo).min(hi)
    };

    let start = match spec.start {
        Some(s) if step > 0 => normalize(s, 0, len),
        Some(s) => normalize(s, -1, len - 1),
        None => default_start,
    };
    let stop = match spec.stop {
        Some(s) if step > 0 => normalize(s, 0, len),
        Some(s) => normalize(s, -1, len - 1),
        None => default_stop,
    };
    (start, stop, step)
}

fn slice_indices(spec: &SliceSpec, len: i64) -> Vec<i64> {
    let (start, stop, step) = slice_bounds(spec, len);
    let mut out = Vec::new();
    let mut i = start;
    if step > 0 {
        while i < stop {
            out.push(i);
            i += step;
        }
    } else {
        while i > stop {
            out.push(i);
            i += step;
        }
    }
    out
}

/// Resolves `index` (calling its `Deferred` body against `value`, the
/// container currently being indexed, if it has one) then applies one
/// of three shapes: a single boolean gates every element uniformly, a
/// parallel array of booleans gates element by position, and an object
/// of booleans gates entries by key.
fn eval_boolean(index: &Value, value: &Value) -> Result<Vec<Element>> {
    let resolved = match index {
        Value::Deferred(d) => d.call(value)?,
        other => other.clone(),
    };

    match (&resolved, value) {
        (Value::Bool(true), Value::Object(map)) => {
            Ok(map.iter().map(|(k, v)| Element::Pair(k.clone(), v.clone())).collect())
        }
        (Value::Bool(true), Value::Array(items)) => Ok(items.iter().cloned().map(Element::Bare).collect()),
        (Value::Bool(false), _) => Ok(Vec::new()),
        (Value::Object(idx_map), Value::Object(data_map)) => {
            if idx_map.len() != data_map.len() || !idx_map.keys().all(|k| data_map.contains_key(k)) {
                return Err(Error::vectorized_arithmetic(
                    "boolean index object has a different key set than its target",
                ));
            }
            let mut out = Vec::new();
            for (k, v) in data_map.iter() {
                match idx_map.get(k) {
                    Some(Value::Bool(true)) => out.push(Element::Pair(k.clone(), v.clone())),
                    Some(Value::Bool(false)) => {}
                    _ => return Err(Error::vectorized_arithmetic("a boolean index object must contain only booleans")),
                }
            }
            Ok(out)
        }
        (Value::Array(idx_items), Value::Array(data_items)) => {
            if idx_items.len() != data_items.len() {
                return Err(Error::vectorized_arithmetic("boolean index array length does not match its target"));
            }
            let mut out = Vec::new();
            for (flag, v) in idx_items.iter().zip(data_items.iter()) {
                match flag {
                    Value::Bool(true) => out.push(Element::Bare(v.clone())),
                    Value::Bool(false) => {}
                    _ => return Err(Error::vectorized_arithmetic("a boolean index array must contain only booleans")),
                }
            }
            Ok(out)
        }
        _ => Err(Error::vectorized_arithmetic("boolean index shape does not match its target")),
    }
}

/// An [`Indexer`] plus the shape-classification flags the pipeline
/// (`dsl::pipeline`) needs to preserve shape while composing a sequence
/// of them.
#[derive(Debug, Clone)]
pub struct IndexerStep {
    /// The selection/synthesis strategy.
    pub indexer: Indexer,
    /// `true` if this indexer is known to select at most one element, so
    /// the pipeline unwraps the result to a scalar instead of wrapping
    /// it in a one-element container.
    pub has_one_option: bool,
    /// `true` for `Indexer::Projection`.
    pub is_projection: bool,
    /// `true` if this step produces an Object (keyed pairs), `false` if
    /// it produces an Array (bare values).
    pub is_dict: bool,
    /// `true` for a `..`-prefixed indexer.
    pub is_recursive: bool,
}

impl IndexerStep {
    /// Evaluates the step, dispatching to [`Indexer::eval_recursive`] or
    /// [`Indexer::eval`] depending on `is_recursive`.
    pub fn eval(&self, value: &Value) -> Result<Vec<Element>> {
        if self.is_recursive {
            self.indexer.eval_recursive(value)
        } else {
            self.indexer.eval(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linked_hash_map::LinkedHashMap;

    fn obj(pairs: &[(&str, Value)]) -> Value {
        let mut m = LinkedHashMap::new();
        for (k, v) in pairs {
            m.insert((*k).to_owned(), v.clone());
        }
        Value::Object(m)
    }

    #[test]
    fn namelist_single_literal_hit() {
        let value = obj(&[("a", Value::Int(1)), ("b", Value::Int(2))]);
        let out = eval_namelist(&[NameEntry::Literal("a".into())], &value).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].key(), Some("a"));
    }

    #[test]
    fn namelist_on_array_is_internal_cast_error() {
        let value = Value::Array(vec![Value::Int(1)]);
        let err = eval_namelist(&[NameEntry::Literal("a".into())], &value).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InternalCast);
    }

    #[test]
    fn slicelist_negative_index() {
        let value = Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let out = eval_slicelist(&[SliceEntry::Index(-1)], &value).unwrap();
        assert_eq!(out[0].clone().into_value(), Value::Int(3));
    }

    #[test]
    fn slicelist_out_of_range_is_skipped_not_errored() {
        let value = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        let out = eval_slicelist(&[SliceEntry::Index(5)], &value).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn slicelist_basic_range() {
        let value = Value::Array((0..5).map(Value::Int).collect());
        let spec = SliceSpec { start: Some(1), stop: Some(4), step: None };
        let out = eval_slicelist(&[SliceEntry::Range(spec)], &value).unwrap();
        let values: Vec<Value> = out.into_iter().map(Element::into_value).collect();
        assert_eq!(values, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn slicelist_negative_step_reverses() {
        let value = Value::Array((0..5).map(Value::Int).collect());
        let spec = SliceSpec { start: None, stop: None, step: Some(-1) };
        let out = eval_slicelist(&[SliceEntry::Range(spec)], &value).unwrap();
        let values: Vec<Value> = out.into_iter().map(Element::into_value).collect();
        assert_eq!(values, vec![Value::Int(4), Value::Int(3), Value::Int(2), Value::Int(1), Value::Int(0)]);
    }

    #[test]
    fn recursive_namelist_visits_each_physical_node_once() {
        // {"a": {"a": 1}} · ..a
        let inner = obj(&[("a", Value::Int(1))]);
        let value = obj(&[("a", inner.clone())]);
        let out = eval_namelist_recursive(&[NameEntry::Literal("a".into())], &value);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn recursive_star_yields_scalar_leaves_only() {
        let value = obj(&[("x", obj(&[("y", obj(&[("z", Value::Int(5))]))]))]);
        let out = eval_star_recursive(&value);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].clone().into_value(), Value::Int(5));
    }

    #[test]
    fn boolean_index_array_matches_shape() {
        let data = Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]);
        let mask = Value::Array(vec![Value::Bool(false), Value::Bool(false), Value::Bool(true), Value::Bool(true)]);
        let out = eval_boolean(&mask, &data).unwrap();
        let values: Vec<Value> = out.into_iter().map(Element::into_value).collect();
        assert_eq!(values, vec![Value::Int(3), Value::Int(4)]);
    }

    #[test]
    fn boolean_index_length_mismatch_is_vectorized_arithmetic_error() {
        let data = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        let mask = Value::Array(vec![Value::Bool(true)]);
        let err = eval_boolean(&mask, &data).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::VectorizedArithmetic);
    }

    #[test]
    fn boolean_index_scalar_true_selects_everything() {
        let data = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        let out = eval_boolean(&Value::Bool(true), &data).unwrap();
        assert_eq!(out.len(), 2);
    }
}
