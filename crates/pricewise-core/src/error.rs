use thiserror::Error;

use crate::merge::RejectReason;

/// All errors that can occur in pricewise-core.
#[derive(Debug, Error)]
pub enum PricewiseError {
    /// Empty or blank name submitted for resolution or alias creation,
    /// or an out-of-range threshold/confidence.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A uniqueness invariant rejected a write (usually a concurrent creation
    /// of the same normalized name). Recoverable by re-resolving.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Merge rejected: {0}")]
    MergeRejected(RejectReason),

    /// A step of an atomic merge failed; the whole transition was rolled back.
    #[error("Merge of {loser} into {survivor} failed and was rolled back: {reason}")]
    PartialMergeFailure {
        survivor: String,
        loser: String,
        reason: String,
    },

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl PricewiseError {
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation(_))
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidInput(_) => ExitCode::InvalidArgs,
            Self::ProductNotFound(_) => ExitCode::NotFound,
            Self::ConstraintViolation(_) => ExitCode::Conflict,
            Self::MergeRejected(_) => ExitCode::Rejected,
            Self::PartialMergeFailure { .. } => ExitCode::MergeFailure,
            Self::Io(_) => ExitCode::FileSystemError,
            _ => ExitCode::GeneralError,
        }
    }
}

/// Process exit codes used by the CLI.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NotFound = 2,
    InvalidArgs = 3,
    FileSystemError = 4,
    Conflict = 7,
    Rejected = 9,
    MergeFailure = 10,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Maps a failed write to `ConstraintViolation` when SQLite reports a UNIQUE
/// or PRIMARY KEY conflict; every other failure stays a database error.
pub(crate) fn map_write_error(err: rusqlite::Error, what: impl std::fmt::Display) -> PricewiseError {
    if let rusqlite::Error::SqliteFailure(ref failure, ref message) = err
        && failure.code == rusqlite::ErrorCode::ConstraintViolation
        && matches!(
            failure.extended_code,
            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        )
    {
        let detail = message.as_deref().unwrap_or("unique constraint failed");
        return PricewiseError::ConstraintViolation(format!("{what}: {detail}"));
    }
    PricewiseError::Database(err)
}

pub type Result<T> = std::result::Result<T, PricewiseError>;
