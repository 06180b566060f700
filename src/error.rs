use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure kinds of a `pdftools` invocation. Each maps to its own exit code.
#[derive(Debug, Error)]
pub enum SectionError {
    #[error("invalid arguments: {0}")]
    ArgumentInvalid(String),

    #[error("license key missing or rejected: {0}")]
    LicenseMissing(String),

    #[error("cannot read source PDF {}: {reason}", path.display())]
    SourceUnreadable { path: PathBuf, reason: String },

    #[error("cannot write output PDF {}: {source}", path.display())]
    OutputWriteFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SectionError {
    pub fn source_unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        SectionError::SourceUnreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn output_write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SectionError::OutputWriteFailure {
            path: path.into(),
            source,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            SectionError::ArgumentInvalid(_) => 2,
            SectionError::LicenseMissing(_) => 3,
            SectionError::SourceUnreadable { .. } => 4,
            SectionError::OutputWriteFailure { .. } => 5,
        }
    }
}

/// Exit code for an arbitrary failure bubbling up to `main`.
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<SectionError>())
        .map_or(1, SectionError::exit_code)
}
