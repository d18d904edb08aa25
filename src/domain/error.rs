//! Error taxonomy of the dialog core.
//!
//! Every network-origin failure is converted into one of these kinds by the
//! component that issued the call; the controller never sees a raw transport
//! error.

use thiserror::Error;

/// The credential could not be obtained at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("auth request failed: {0}")]
    Transport(String),

    #[error("auth endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("auth response could not be decoded: {0}")]
    Decode(String),
}

/// Read-path failure. Non-fatal: the dialog degrades to "no data".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("read request failed: {0}")]
    Transport(String),

    #[error("read endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("read response could not be decoded: {0}")]
    Decode(String),
}

/// Write-path failure after any auth retry has been exhausted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    #[error("write request failed: {0}")]
    Transport(String),

    #[error("write endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("credential rejected again after refresh")]
    CredentialRejected,
}

/// Result of a single write attempt as seen by the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteFailure {
    /// The server rejected the credential (HTTP 401); refresh and retry.
    #[error("credential rejected by server")]
    AuthExpired,

    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Local, pre-network form validation failure.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("value is required")]
    Required,

    #[error("value must be a finite number")]
    NotFinite,

    #[error("value is unchanged")]
    Unchanged,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DialogError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl DialogError {
    pub fn kind(&self) -> &'static str {
        match self {
            DialogError::Auth(_) => "auth",
            DialogError::Load(_) => "load",
            DialogError::Write(_) => "write",
            DialogError::Validation(_) => "validation",
        }
    }
}
