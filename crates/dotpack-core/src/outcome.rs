//! Outcome helpers.
//!
//! Every fallible operation returns the standard [`Result`]; `ok` and `fail`
//! are the two constructors, `map` / `and_then` / `unwrap_or` come from std.
//! `unwrap` is reserved for trust boundaries and tests.

use crate::error::AppError;

/// Result of any fallible host operation.
pub type AppResult<T> = Result<T, AppError>;

/// Success constructor.
pub fn ok<T, E>(value: T) -> Result<T, E> {
    Ok(value)
}

/// Failure constructor.
pub fn fail<T, E>(error: E) -> Result<T, E> {
    Err(error)
}

/// Collapse a list of results.
///
/// Returns the first error in input order, or every value in input order.
/// An empty input is a success with an empty list.
pub fn combine<T, E, I>(results: I) -> Result<Vec<T>, E>
where
    I: IntoIterator<Item = Result<T, E>>,
{
    results.into_iter().collect()
}
