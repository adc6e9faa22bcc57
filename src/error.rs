use thiserror::Error;

pub type PatentResult<T> = std::result::Result<T, PatentError>;

#[derive(Debug, Error)]
pub enum PatentError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("invalid field: {0}")]
    InvalidField(String),

    #[error("bad patent-number: {0}")]
    InvalidPatentNumber(String),

    #[error("invalid date: {0}")]
    InvalidDate(String),
}

impl PatentError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedInput(_) => "MalformedInputError",
            Self::InvalidDocument(_) => "InvalidDocumentError",
            Self::InvalidField(_) => "InvalidFieldError",
            Self::InvalidPatentNumber(_) => "InvalidPatentNumberError",
            Self::InvalidDate(_) => "InvalidDateError",
        }
    }

    /// Document-local failures are tallied by the caller; anything else
    /// points at a mapping defect and must propagate.
    pub fn is_document_local(&self) -> bool {
        matches!(self, Self::MalformedInput(_) | Self::InvalidDocument(_))
    }
}
