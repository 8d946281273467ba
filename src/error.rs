//! `Error` and `Result` types arising out of compiling and evaluating queries.

use std::borrow::Cow;
use std::error;
use std::fmt;
use std::ops::Deref;
use std::result;

/// The classification of an error, corresponding to one of the six
/// failure modes of the query engine (parsing, indexing, vectorized
/// arithmetic, typing, mutation, or an internal cast assumption).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed token sequence, unterminated bracket, unknown function
    /// name, wrong arity, or a type mismatch on a function argument.
    Parse,
    /// Mixed key-like/index-like entries in one `[...]`, a recursive
    /// slice list, or a `.`-style indexer applied to a non-string/regex/star.
    Indexing,
    /// A container/container binop with mismatched length or key set, or
    /// a boolean index whose shape doesn't match its target.
    VectorizedArithmetic,
    /// An operand type disallowed by `out_type` for the given binop.
    Type,
    /// A mutator target that cannot be written back into the input.
    InvalidMutation,
    /// A container was expected where a scalar was found, or vice versa.
    InternalCast,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Parse => "parse error",
            ErrorKind::Indexing => "indexing error",
            ErrorKind::VectorizedArithmetic => "vectorized arithmetic error",
            ErrorKind::Type => "type error",
            ErrorKind::InvalidMutation => "invalid mutation error",
            ErrorKind::InternalCast => "internal cast error",
        };
        f.write_str(name)
    }
}

/// Slightly augmented trait for chainable errors.
pub trait ErrorExt: error::Error {
    /// Similar to `std::error::Error::source()`, but with richer type info.
    fn reason(&self) -> Option<&dyn ErrorExt> {
        None
    }

    /// Returns the receiver as a `&dyn std::error::Error` trait object.
    /// Necessary until subtrait coercions are implemented.
    fn as_std_error(&self) -> &dyn error::Error;
}

/// A trait for conveniently propagating errors up the call stack.
pub trait ResultExt<T>: Sized {
    /// If this `Result` is an `Err`, wrap it as the given kind with the
    /// specified message prepended to the front of the cause chain.
    fn chain<M: ErrMsg>(self, kind: ErrorKind, message: M) -> Result<T>;
}

/// Values that can act as or generate an error message.
pub trait ErrMsg: Sized {
    /// Converts the value to an error message.
    fn into_message(self) -> Cow<'static, str>;
}

/// Type alias for a `Result` containing a query-engine `Error`.
pub type Result<T> = result::Result<T, Error>;

impl<T, E> ResultExt<T> for result::Result<T, E>
where
    E: ErrorExt + 'static,
{
    fn chain<M: ErrMsg>(self, kind: ErrorKind, message: M) -> Result<T> {
        self.map_err(|cause| Error::with_cause(kind, message.into_message(), cause))
    }
}

/// Blanket `impl ErrMsg` for string literals.
impl ErrMsg for &'static str {
    fn into_message(self) -> Cow<'static, str> {
        Cow::Borrowed(self)
    }
}

/// Blanket `impl ErrMsg` for error message formatting functions.
impl<F> ErrMsg for F
where
    F: FnOnce() -> String,
{
    fn into_message(self) -> Cow<'static, str> {
        Cow::Owned(self())
    }
}

/// The central error type for the query engine.
#[derive(Debug)]
pub struct Error {
    /// What kind of failure this is.
    kind: ErrorKind,
    /// The human-readable description.
    message: Cow<'static, str>,
    /// The underlying error, if any.
    cause: Option<Box<dyn ErrorExt>>,
}

impl Error {
    /// Creates an error of the given kind with the specified message and no cause.
    pub fn new<S>(kind: ErrorKind, message: S) -> Self
    where
        S: Into<Cow<'static, str>>,
    {
        Error {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// Creates an error with the specified kind, message and cause.
    pub fn with_cause<S, E>(kind: ErrorKind, message: S, cause: E) -> Self
    where
        S: Into<Cow<'static, str>>,
        E: ErrorExt + 'static,
    {
        Error {
            kind,
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    /// The classification of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl ErrorExt for Error {
    fn reason(&self) -> Option<&dyn ErrorExt> {
        self.cause.as_ref().map(Deref::deref)
    }

    fn as_std_error(&self) -> &dyn error::Error {
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.reason().map(ErrorExt::as_std_error)
    }
}

/// Implementing `ErrorExt` and `From` boilerplate for upstream error types.
macro_rules! impl_error_type {
    ($ty:path, $kind:expr, $message:expr) => {
        impl From<$ty> for Error {
            fn from(error: $ty) -> Self {
                Self::with_cause($kind, $message, error)
            }
        }

        impl ErrorExt for $ty {
            fn as_std_error(&self) -> &dyn error::Error {
                self
            }
        }
    };
}

impl_error_type! { serde_json::Error, ErrorKind::Parse, "JSON transcoding error" }
impl_error_type! { regex::Error,      ErrorKind::Parse, "invalid regular expression" }

/// Convenience constructors for each error kind, used throughout the
/// parser and evaluator instead of spelling out `Error::new(ErrorKind::X, ...)`.
impl Error {
    /// Shorthand for `Error::new(ErrorKind::Parse, ...)`.
    pub fn parse<S: Into<Cow<'static, str>>>(message: S) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    /// Shorthand for `Error::new(ErrorKind::Indexing, ...)`.
    pub fn indexing<S: Into<Cow<'static, str>>>(message: S) -> Self {
        Self::new(ErrorKind::Indexing, message)
    }

    /// Shorthand for `Error::new(ErrorKind::VectorizedArithmetic, ...)`.
    pub fn vectorized_arithmetic<S: Into<Cow<'static, str>>>(message: S) -> Self {
        Self::new(ErrorKind::VectorizedArithmetic, message)
    }

    /// Shorthand for `Error::new(ErrorKind::Type, ...)`.
    pub fn type_error<S: Into<Cow<'static, str>>>(message: S) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    /// Shorthand for `Error::new(ErrorKind::InvalidMutation, ...)`.
    pub fn invalid_mutation<S: Into<Cow<'static, str>>>(message: S) -> Self {
        Self::new(ErrorKind::InvalidMutation, message)
    }

    /// Shorthand for `Error::new(ErrorKind::InternalCast, ...)`.
    pub fn internal_cast<S: Into<Cow<'static, str>>>(message: S) -> Self {
        Self::new(ErrorKind::InternalCast, message)
    }
}

/// Turns an `Error` into a single-line, human-readable message, walking
/// the full cause chain. Structured `Error`s are the source of truth;
/// this function is the only place user-facing text is assembled from
/// them.
pub fn prettify(error: &Error) -> String {
    let mut message = format!("{}", error);
    let mut next = error.reason();

    while let Some(cause) = next {
        message.push_str(" -> ");
        message.push_str(&cause.to_string());
        next = cause.reason();
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_message() {
        let err = Error::parse("unexpected token `]`");
        assert_eq!(err.to_string(), "parse error: unexpected token `]`");
    }

    #[test]
    fn chain_wraps_with_cause() {
        let inner: result::Result<(), Error> = Err(Error::type_error("bad operand"));
        let outer = inner.chain(ErrorKind::Type, "while resolving binop").unwrap_err();
        assert!(prettify(&outer).contains("bad operand"));
    }

    #[test]
    fn prettify_walks_cause_chain() {
        let cause = Error::type_error("string + number");
        let outer = Error::with_cause(ErrorKind::Parse, "while parsing binop", cause);
        let rendered = prettify(&outer);
        assert!(rendered.contains("while parsing binop"));
        assert!(rendered.contains("string + number"));
    }

    #[test]
    fn prettify_renders_each_cause_exactly_once() {
        let cause = Error::type_error("string + number");
        let outer = Error::with_cause(ErrorKind::Parse, "while parsing binop", cause);
        let rendered = prettify(&outer);
        assert_eq!(rendered.matches("string + number").count(), 1);
        assert_eq!(rendered.matches("while parsing binop").count(), 1);
    }
}
