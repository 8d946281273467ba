//! # jsonquery: a small, embeddable query language for JSON trees
//!
//! This library compiles a token stream into a `Query` — an indexer
//! chain, arg-function calls, and binary operators over a single JSON
//! value — and evaluates it without re-parsing.
//!
//! ### The Prelude
//!
//! The most commonly used types are re-exported under
//! [`prelude`](prelude/index.html), so for most purposes it's enough to:
//!
//! ```rust
//! use jsonquery::prelude::*;
//! ```
//!
//! ### Compiling and evaluating a query
//!
//! A [`Query`] is built from a [`TokenStream`](token::TokenStream) — the
//! lexer that turns source text into tokens is an external collaborator,
//! out of this crate's scope; what's here is the compiler and evaluator
//! that take over once tokens exist.
//!
//! ```
//! use jsonquery::prelude::*;
//! use jsonquery::token::{Delimiter, Token, TokenStream, UnquotedString};
//!
//! // @.a[1]  — equivalent to the token stream below, since this crate
//! // does not include a lexer.
//! let stream = TokenStream {
//!     selector: vec![
//!         Token::CurrentInput,
//!         Token::Delim(Delimiter::Dot),
//!         Token::Ident(UnquotedString { value: "a".to_owned() }),
//!         Token::Delim(Delimiter::LBracket),
//!         Token::Literal(Value::Int(1)),
//!         Token::Delim(Delimiter::RBracket),
//!     ],
//!     mutator: None,
//! };
//!
//! let query = compile(&stream).unwrap();
//! let input: Value = Value::from_json(serde_json::json!({ "a": [1, 2, 3] }));
//! assert_eq!(query.eval(&input).unwrap(), Value::Int(2));
//! ```

#![doc(html_root_url = "https://docs.rs/jsonquery/0.1.0")]
#![deny(missing_debug_implementations, missing_copy_implementations,
        trivial_casts, trivial_numeric_casts,
        unsafe_code,
        unstable_features,
        unused_import_braces, unused_qualifications, missing_docs)]
#![allow(clippy::single_match, clippy::match_same_arms, clippy::match_ref_pats,
         clippy::clone_on_ref_ptr, clippy::needless_pass_by_value)]
#![deny(clippy::wrong_pub_self_convention, clippy::used_underscore_binding,
        clippy::similar_names,
        clippy::missing_docs_in_private_items,
        clippy::non_ascii_literal, clippy::unicode_not_nfc,
        clippy::shadow_unrelated, clippy::shadow_reuse, clippy::shadow_same,
        clippy::int_plus_one, clippy::string_add_assign, clippy::if_not_else,
        clippy::invalid_upcast_comparisons,
        clippy::cast_precision_loss, clippy::cast_lossless,
        clippy::mutex_integer, clippy::mut_mut, clippy::items_after_statements,
        clippy::print_stdout, clippy::mem_forget, clippy::maybe_infinite_iter)]

pub mod dsl;
pub mod error;
pub mod prelude;
pub mod token;
pub mod value;

use crate::dsl::mutator::MutatorSpec;
use crate::error::{Error, Result};
use crate::token::TokenStream;
use crate::value::Value;

/// A mutator's compiled halves: the selector's addressable path into the
/// input, and the right-hand-side expression evaluated against the
/// addressed sub-value.
#[derive(Debug, Clone)]
struct Mutation {
    spec: MutatorSpec,
    expr: Value,
}

/// A compiled query: a selector expression, and optionally a mutator
/// paired with it.
#[derive(Debug, Clone)]
pub struct Query {
    selector: Value,
    mutation: Option<Mutation>,
}

/// Compiles a token stream into a [`Query`]. The selector half is always
/// compiled; the mutator half (if present) additionally requires the
/// selector to resolve to a single addressable position —
/// compiling a mutator atop a `*`, boolean, or projection selector fails
/// with `ErrorKind::InvalidMutation`.
pub fn compile(tokens: &TokenStream) -> Result<Query> {
    let selector = dsl::parser::parse(&tokens.selector)?;

    let mutation = match &tokens.mutator {
        Some(mutator_tokens) => {
            let steps = dsl::parser::parse_selector_steps(&tokens.selector)?;
            let spec = MutatorSpec::compile(&steps)?;
            let expr = dsl::parser::parse(mutator_tokens)?;
            Some(Mutation { spec, expr })
        }
        None => None,
    };

    Ok(Query { selector, mutation })
}

fn resolve(value: &Value, input: &Value) -> Result<Value> {
    match value {
        Value::Deferred(d) => d.call(input),
        other => Ok(other.clone()),
    }
}

impl Query {
    /// Evaluates this query's selector against `input`.
    pub fn eval(&self, input: &Value) -> Result<Value> {
        resolve(&self.selector, input)
    }

    /// `true` if this query was compiled with a mutator half.
    pub fn has_mutator(&self) -> bool {
        self.mutation.is_some()
    }

    /// Applies this query's mutator to `input` in place: reads the
    /// selector's addressed sub-value, evaluates the mutator expression
    /// against it as the current input, and writes the result back to
    /// that same position.
    ///
    /// Fails with `ErrorKind::InvalidMutation` if this query has no
    /// mutator, or if the selector's addressed position no longer exists
    /// in `input` (e.g. an out-of-range index).
    pub fn apply(&self, input: &mut Value) -> Result<()> {
        let mutation = self
            .mutation
            .as_ref()
            .ok_or_else(|| Error::invalid_mutation("this query was compiled without a mutator"))?;
        let current = mutation.spec.read(input)?.clone();
        let new_value = resolve(&mutation.expr, &current)?;
        mutation.spec.write(input, new_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Delimiter, Token, UnquotedString};

    fn ident(s: &str) -> Token {
        Token::Ident(UnquotedString { value: s.to_owned() })
    }

    #[test]
    fn compiles_and_evaluates_a_selector_only_query() {
        let stream = TokenStream {
            selector: vec![
                Token::CurrentInput,
                Token::Delim(Delimiter::Dot),
                ident("a"),
            ],
            mutator: None,
        };
        let query = compile(&stream).unwrap();
        assert!(!query.has_mutator());

        let input = Value::from_json(serde_json::json!({ "a": 5 }));
        assert_eq!(query.eval(&input).unwrap(), Value::Int(5));
    }

    #[test]
    fn compiles_and_applies_a_mutator() {
        // @.a = 99  on {"a": 1}
        let stream = TokenStream {
            selector: vec![Token::CurrentInput, Token::Delim(Delimiter::Dot), ident("a")],
            mutator: Some(vec![Token::Literal(Value::Int(99))]),
        };
        let query = compile(&stream).unwrap();

        let mut input = Value::from_json(serde_json::json!({ "a": 1 }));
        query.apply(&mut input).unwrap();
        assert_eq!(input, Value::from_json(serde_json::json!({ "a": 99 })));
    }

    #[test]
    fn mutator_atop_a_star_selector_is_rejected_at_compile_time() {
        let stream = TokenStream {
            selector: vec![Token::CurrentInput, Token::Delim(Delimiter::Dot), ident("*")],
            mutator: Some(vec![Token::Literal(Value::Int(0))]),
        };
        let err = compile(&stream).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidMutation);
    }

    #[test]
    fn apply_without_a_compiled_mutator_is_invalid_mutation() {
        let stream = TokenStream { selector: vec![Token::CurrentInput], mutator: None };
        let query = compile(&stream).unwrap();
        let mut input = Value::Int(1);
        let err = query.apply(&mut input).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidMutation);
    }
}
