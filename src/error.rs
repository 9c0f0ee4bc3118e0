use serde_json::Value;
use thiserror::Error;

use crate::path::Path;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can stop resolution, generation or validation.
///
/// A node that merely cannot resolve *yet* is not an error; it stays in the
/// tree as a deferred node and is retried on the next round. The variants
/// here are the terminal outcomes. `Clone` because failures discovered in the
/// middle of a flat-map chain travel through the strategy as values.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("circular dependency: {}", arrows(cycle))]
    Cycle { cycle: Vec<Path> },

    #[error("unresolved field(s) after {rounds} round(s): {}", listing(fields))]
    Exhausted { rounds: usize, fields: Vec<Path> },

    #[error("unresolved field(s), resolution made no progress: {}", listing(fields))]
    Stalled { fields: Vec<Path> },

    #[error("unresolved field(s) in drawn example: {}", listing(fields))]
    Unresolved { fields: Vec<Path> },

    #[error("invalid value at `{path}`: {reason} (got {value})")]
    Invalid { path: Path, value: Value, reason: String },

    #[error("path `{path}` cannot be traversed at `{segment}`: found {found}")]
    NotTraversable { path: Path, segment: String, found: &'static str },

    #[error("type error: {0}")]
    Type(String),

    #[error("empty integer range: min {min} > max {max}")]
    EmptyRange { min: i64, max: i64 },

    #[error("malformed path `{0}`")]
    BadPath(String),

    #[error("schema error at {at}: {msg}")]
    Schema { at: String, msg: String },

    #[error("failed to draw an example: {0}")]
    Draw(String),
}

impl Error {
    pub fn invalid(path: &Path, value: &Value, reason: impl Into<String>) -> Self {
        Error::Invalid { path: path.clone(), value: value.clone(), reason: reason.into() }
    }
    pub fn schema(at: &Path, msg: impl Into<String>) -> Self {
        Error::Schema { at: at.to_string(), msg: msg.into() }
    }
}

fn listing(paths: &[Path]) -> String {
    paths.iter().map(|p| format!("`{p}`")).collect::<Vec<_>>().join(", ")
}

fn arrows(paths: &[Path]) -> String {
    paths.iter().map(ToString::to_string).collect::<Vec<_>>().join(" -> ")
}
