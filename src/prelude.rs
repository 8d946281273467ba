//! The jsonquery prelude provides re-exports of the most commonly used
//! types for convenience, so that `use jsonquery::prelude::*;` is
//! usually enough to compile and evaluate a query.

pub use crate::{compile, Query};
pub use crate::dsl::binop::BinopDef;
pub use crate::dsl::function::FunctionDef;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::value::{TypeTag, Value};
