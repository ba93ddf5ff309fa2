use std::fmt;

/// A host capability error, preserved alongside whatever JS-level error the
/// embedding crate maps it to. The host only ever returns an opaque code and
/// a short diagnostic string; we keep both rather than collapsing to a
/// single message, so embedders can attach the code as a `cause`.
#[derive(Debug, Clone)]
pub struct HostError {
    pub code: i32,
    pub message: String,
}

impl HostError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for HostError {}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error("decr_interest called with no outstanding interest")]
    InterestUnderflow,
}

pub type Result<T> = std::result::Result<T, Error>;
