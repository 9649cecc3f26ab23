use std::fmt::{self, Display, Formatter};

pub type Result<T> = std::result::Result<T, Error>;

/// Failure categories of a merge request.
///
/// The first seven variants form the caller-facing taxonomy; `MalformedObject` covers
/// object-level syntax damage surfaced by lazy materialization, `InvalidPageOrder` a bad
/// explicit page permutation, and `Io` a failing output sink.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// The `%PDF-x.y` version marker is missing or unrecognized.
    #[error("missing or malformed PDF header")]
    MalformedHeader,
    /// The buffer ends before data referenced by the cross-reference table.
    #[error("file ends before referenced data")]
    TruncatedFile,
    /// The cross-reference table or trailer cannot be parsed, or the section
    /// chain closes over a cycle.
    #[error("invalid cross-reference data: {0}")]
    InvalidXref(&'static str),
    /// The trailer declares an `/Encrypt` dictionary. No decryption is attempted.
    #[error("document is encrypted")]
    UnsupportedEncryption,
    /// A reference cycle that the visited-set mechanism could not resolve.
    #[error("unresolvable reference cycle")]
    CircularReference,
    /// A construct the engine cannot carry over byte-for-byte.
    #[error("unsupported construct: {0}")]
    UnsupportedFeature(&'static str),
    /// Fewer than two source documents were supplied.
    #[error("at least two source documents are required")]
    EmptyInput,
    /// An indirect object body could not be parsed.
    #[error("malformed object: {0}")]
    MalformedObject(&'static str),
    /// The explicit page order is not a permutation of the merged page list.
    #[error("page order is not a permutation of the available pages")]
    InvalidPageOrder,
    /// The output sink reported an error.
    #[error("output error: {0}")]
    Io(std::io::Error),
}

impl From<std::io::Error> for ErrorKind {
    fn from(err: std::io::Error) -> ErrorKind {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => ErrorKind::TruncatedFile,
            _ => ErrorKind::Io(err)
        }
    }
}

/// An [`ErrorKind`] optionally tagged with the label of the source document
/// that caused it. Stage failures past loading carry no label.
#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub label: Option<String>,
}

impl Error {
    pub(crate) fn labeled(kind: impl Into<ErrorKind>, label: &str) -> Error {
        Error { kind: kind.into(), label: Some(label.to_owned()) }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error { kind, label: None }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error { kind: err.into(), label: None }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{}: {}", label, self.kind),
            None => write!(f, "{}", self.kind)
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}
