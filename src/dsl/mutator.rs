//! The mutator contract: walking a compiled selector down
//! to an addressable position in the input and overwriting it with a
//! separately-evaluated right-hand side.
//!
//! General tree-splicing is out of scope: `MutatorSpec` is scoped down
//! to selectors that address a *single* physical position — a chain of
//! single-literal `NameList`/single-index `SliceList` steps, each
//! `has_one_option`. `Star`, `Boolean`, `Projection`, multi-entry lists,
//! and recursive (`..`) steps all select more than one position (or a
//! synthesized one with no back-reference into the input), so none of
//! them are reconstructible targets and are rejected with
//! `ErrorKind::InvalidMutation` at compile time rather than silently
//! doing something partial at write time.

use linked_hash_map::LinkedHashMap;

use crate::dsl::indexer::{Indexer, IndexerStep, NameEntry, SliceEntry};
use crate::error::{Error, Result};
use crate::value::Value;

/// One step of a resolved, addressable path into a `Value` tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Descend into an `Object` by key.
    Key(String),
    /// Descend into an `Array` by position.
    Index(usize),
}

/// A compiled mutator selector: an ordered chain of single-position path
/// segments, plus `write`/`read` operations (obtain the addressable
/// sub-tree; overwrite it with the mutator's evaluation).
#[derive(Debug, Clone, Default)]
pub struct MutatorSpec {
    path: Vec<PathSegment>,
}

impl MutatorSpec {
    /// Compiles a selector's indexer chain into a `MutatorSpec`, rejecting
    /// any step that does not address exactly one physical position.
    pub fn compile(steps: &[IndexerStep]) -> Result<Self> {
        let mut path = Vec::with_capacity(steps.len());
        for step in steps {
            path.push(compile_segment(step)?);
        }
        Ok(MutatorSpec { path })
    }

    /// `true` for a selector with no indexers at all (the mutator
    /// replaces the whole input).
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Reads the addressable sub-value the selector points to, without
    /// modifying `root`. This is what the mutator is evaluated against
    /// as its current input.
    pub fn read<'a>(&self, root: &'a Value) -> Result<&'a Value> {
        read_path(root, &self.path)
    }

    /// Overwrites the addressable sub-value the selector points to with
    /// `new_value`, in place.
    pub fn write(&self, root: &mut Value, new_value: Value) -> Result<()> {
        write_path(root, &self.path, new_value)
    }
}

fn compile_segment(step: &IndexerStep) -> Result<PathSegment> {
    if step.is_recursive {
        return Err(Error::invalid_mutation("a recursive (`..`) selector is not a reconstructible mutation target"));
    }
    if step.is_projection {
        return Err(Error::invalid_mutation("a projection is synthesized and has no position in the input"));
    }
    if !step.has_one_option {
        return Err(Error::invalid_mutation("a mutator selector must address exactly one position at each step"));
    }

    match &step.indexer {
        Indexer::NameList(entries) => match entries.as_slice() {
            [NameEntry::Literal(key)] => Ok(PathSegment::Key(key.clone())),
            _ => Err(Error::invalid_mutation("a mutator name step must be a single literal key")),
        },
        Indexer::SliceList(entries) => match entries.as_slice() {
            [SliceEntry::Index(i)] if *i >= 0 => Ok(PathSegment::Index(*i as usize)),
            [SliceEntry::Index(_)] => {
                Err(Error::invalid_mutation("a mutator index step must not be negative"))
            }
            _ => Err(Error::invalid_mutation("a mutator index step must be a single integer")),
        },
        Indexer::Star => Err(Error::invalid_mutation("`*` selects every child and cannot be a mutation target")),
        Indexer::Boolean(_) => {
            Err(Error::invalid_mutation("a boolean index selects a variable number of positions"))
        }
        Indexer::Projection(_) => unreachable!("is_projection checked above"),
    }
}

fn read_path<'a>(value: &'a Value, path: &[PathSegment]) -> Result<&'a Value> {
    match path.split_first() {
        None => Ok(value),
        Some((PathSegment::Key(key), rest)) => match value {
            Value::Object(map) => {
                let child = map
                    .get(key)
                    .ok_or_else(|| Error::invalid_mutation(format!("no key `{}` to descend into", key)))?;
                read_path(child, rest)
            }
            _ => Err(Error::internal_cast(format!("cannot index `{}` into a non-object", key))),
        },
        Some((PathSegment::Index(i), rest)) => match value {
            Value::Array(items) => {
                let child = items
                    .get(*i)
                    .ok_or_else(|| Error::invalid_mutation(format!("index {} is out of range", i)))?;
                read_path(child, rest)
            }
            _ => Err(Error::internal_cast(format!("cannot index {} into a non-array", i))),
        },
    }
}

fn write_path(value: &mut Value, path: &[PathSegment], new_value: Value) -> Result<()> {
    match path.split_first() {
        None => {
            *value = new_value;
            Ok(())
        }
        Some((PathSegment::Key(key), rest)) => match value {
            Value::Object(map) => write_into_object(map, key, rest, new_value),
            _ => Err(Error::internal_cast(format!("cannot index `{}` into a non-object", key))),
        },
        Some((PathSegment::Index(i), rest)) => match value {
            Value::Array(items) => write_into_array(items, *i, rest, new_value),
            _ => Err(Error::internal_cast(format!("cannot index {} into a non-array", i))),
        },
    }
}

fn write_into_object(
    map: &mut LinkedHashMap<String, Value>,
    key: &str,
    rest: &[PathSegment],
    new_value: Value,
) -> Result<()> {
    if rest.is_empty() {
        map.insert(key.to_owned(), new_value);
        return Ok(());
    }
    let child = map
        .get_mut(key)
        .ok_or_else(|| Error::invalid_mutation(format!("no key `{}` to descend into", key)))?;
    write_path(child, rest, new_value)
}

fn write_into_array(items: &mut [Value], index: usize, rest: &[PathSegment], new_value: Value) -> Result<()> {
    let child = items
        .get_mut(index)
        .ok_or_else(|| Error::invalid_mutation(format!("index {} is out of range", index)))?;
    write_path(child, rest, new_value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(pairs: &[(&str, Value)]) -> Value {
        let mut m = LinkedHashMap::new();
        for (k, v) in pairs {
            m.insert((*k).to_owned(), v.clone());
        }
        Value::Object(m)
    }

    fn name_step(key: &str) -> IndexerStep {
        IndexerStep {
            indexer: Indexer::NameList(vec![NameEntry::Literal(key.to_owned())]),
            has_one_option: true,
            is_projection: false,
            is_dict: true,
            is_recursive: false,
        }
    }

    fn index_step(i: i64) -> IndexerStep {
        IndexerStep {
            indexer: Indexer::SliceList(vec![SliceEntry::Index(i)]),
            has_one_option: true,
            is_projection: false,
            is_dict: false,
            is_recursive: false,
        }
    }

    #[test]
    fn compiles_single_key_path() {
        let spec = MutatorSpec::compile(&[name_step("a")]).unwrap();
        let mut value = obj(&[("a", Value::Int(1))]);
        spec.write(&mut value, Value::Int(99)).unwrap();
        assert_eq!(value, obj(&[("a", Value::Int(99))]));
    }

    #[test]
    fn compiles_nested_key_then_index_path() {
        // @.a[1] = 99 on {"a":[1,2,3]}
        let spec = MutatorSpec::compile(&[name_step("a"), index_step(1)]).unwrap();
        let mut value = obj(&[("a", Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]))]);
        spec.write(&mut value, Value::Int(99)).unwrap();
        assert_eq!(value, obj(&[("a", Value::Array(vec![Value::Int(1), Value::Int(99), Value::Int(3)]))]));
    }

    #[test]
    fn read_returns_the_addressed_subvalue() {
        let spec = MutatorSpec::compile(&[name_step("a")]).unwrap();
        let value = obj(&[("a", Value::Int(7))]);
        assert_eq!(spec.read(&value).unwrap(), &Value::Int(7));
    }

    #[test]
    fn root_mutator_replaces_whole_input() {
        let spec = MutatorSpec::compile(&[]).unwrap();
        assert!(spec.is_root());
        let mut value = Value::Int(1);
        spec.write(&mut value, Value::Int(2)).unwrap();
        assert_eq!(value, Value::Int(2));
    }

    #[test]
    fn star_step_is_rejected_at_compile_time() {
        let step = IndexerStep {
            indexer: Indexer::Star,
            has_one_option: false,
            is_projection: false,
            is_dict: false,
            is_recursive: false,
        };
        let err = MutatorSpec::compile(&[step]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidMutation);
    }

    #[test]
    fn recursive_step_is_rejected_at_compile_time() {
        let mut step = name_step("a");
        step.is_recursive = true;
        let err = MutatorSpec::compile(&[step]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidMutation);
    }

    #[test]
    fn multi_entry_name_list_is_rejected_at_compile_time() {
        let step = IndexerStep {
            indexer: Indexer::NameList(vec![NameEntry::Literal("a".into()), NameEntry::Literal("b".into())]),
            has_one_option: false,
            is_projection: false,
            is_dict: true,
            is_recursive: false,
        };
        let err = MutatorSpec::compile(&[step]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidMutation);
    }

    #[test]
    fn out_of_range_index_is_invalid_mutation() {
        let spec = MutatorSpec::compile(&[index_step(5)]).unwrap();
        let mut value = Value::Array(vec![Value::Int(1)]);
        let err = spec.write(&mut value, Value::Int(9)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidMutation);
    }
}
