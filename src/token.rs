//! Token stream types consumed by the parser.
//!
//! The lexer that turns query source text into a `Vec<Token>` lives
//! outside this crate; only the token shapes it must produce are
//! defined here.

use crate::dsl::binop::BinopDef;
use crate::value::Value;

/// A single delimiter character recognized by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// `.`
    Dot,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `(`
    LParen,
    /// `)`
    RParen,
}

impl Delimiter {
    /// `true` for the tokens that terminate an expression.
    pub fn is_expr_terminator(self) -> bool {
        matches!(
            self,
            Delimiter::RBracket | Delimiter::Colon | Delimiter::RBrace | Delimiter::Comma | Delimiter::RParen
        )
    }

    /// `true` for the tokens that may open an indexer.
    pub fn is_indexer_starter(self) -> bool {
        matches!(self, Delimiter::Dot | Delimiter::LBracket | Delimiter::LBrace)
    }
}

/// An unquoted identifier: a bare word that is either a standalone name
/// reference or, when followed by `(`, an arg-function call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnquotedString {
    /// The identifier's text.
    pub value: String,
}

/// One lexical unit consumed by the parser.
#[derive(Debug, Clone)]
pub enum Token {
    /// A compiled literal: number, string, regex, or slice.
    Literal(Value),
    /// A binary operator descriptor.
    Binop(BinopDef),
    /// An unquoted identifier.
    Ident(UnquotedString),
    /// A single delimiter character.
    Delim(Delimiter),
    /// The current-input sigil (e.g. `@`), which materializes to the
    /// identity `Deferred` value.
    CurrentInput,
}

impl Token {
    /// Convenience constructor for `Token::Ident`.
    pub fn ident<S: Into<String>>(value: S) -> Self {
        Token::Ident(UnquotedString { value: value.into() })
    }
}

/// The lexer's output: a selector token stream, and an optional mutator
/// token stream, absent when the query has no right-hand assignment.
#[derive(Debug, Clone, Default)]
pub struct TokenStream {
    /// Tokens making up the selector (left-hand side) of the query.
    pub selector: Vec<Token>,
    /// Tokens making up the mutator (right-hand side), if any.
    pub mutator: Option<Vec<Token>>,
}
