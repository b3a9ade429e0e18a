//! Error types shared by every stage of the pipeline.

use thiserror::Error;

use crate::types::Probe;

/// Result type for decoding, loading and characterization.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while ingesting or characterizing a measurement.
#[derive(Debug, Error)]
pub enum Error {
    /// File name does not follow the identifier grammar.
    #[error("malformed identifier `{identifier}`: {reason}")]
    MalformedIdentifier { identifier: String, reason: String },

    /// Tabular body is not a rectangular table of numbers.
    #[error("malformed table at line {line}: {reason}")]
    MalformedTable { line: usize, reason: String },

    /// No `Time` column, so no derived quantity has a time base.
    #[error("{source_name} has no `Time` column")]
    MissingAxis { source_name: String },

    /// A probe column does not share the time axis' length.
    #[error("{source_name}: column `{column}` has {found} samples, `Time` has {expected}")]
    LengthMismatch {
        source_name: String,
        column: String,
        expected: usize,
        found: usize,
    },

    /// The probe a derivation needs has no voltage/current columns.
    #[error("{source_name} has no probe {probe} voltage/current columns")]
    MissingProbe { source_name: String, probe: Probe },

    /// Activity-specific query on a record of another activity.
    #[error("{query} is not defined for {activity} measurements")]
    WrongActivity { query: &'static str, activity: String },

    /// Any derivation requested on an observe record.
    #[error("{query} is not defined for observe measurements")]
    InapplicableQuery { query: &'static str },

    /// Two-probe activity name outside set/form/reset/observe.
    #[error("`{0}` is not a valid two-probe activity")]
    InvalidActivity(String),

    /// Hyperparameters outside their admissible range.
    #[error("invalid analysis configuration: {0}")]
    InvalidConfig(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn malformed_identifier(identifier: &str, reason: impl Into<String>) -> Self {
        Error::MalformedIdentifier {
            identifier: identifier.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed_table(line: usize, reason: impl Into<String>) -> Self {
        Error::MalformedTable {
            line,
            reason: reason.into(),
        }
    }

    /// True for errors caused by the content of a single input file.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedIdentifier { .. }
                | Error::MalformedTable { .. }
                | Error::MissingAxis { .. }
                | Error::LengthMismatch { .. }
                | Error::MissingProbe { .. }
                | Error::InvalidActivity(_)
                | Error::Io(_)
        )
    }
}
