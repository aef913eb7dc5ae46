//! Typed failure surface for native-call and contract errors.
//!
//! Every fallible native call is wrapped at its call site; the wrapper fetches
//! the OS last-error text immediately (the side channel is overwritten by the
//! next call) and folds it into one of these variants. Nothing is retried:
//! these are one-shot setup/teardown operations.

use crate::tray::IconState;

/// Process exit status for a command-line usage problem.
pub const EXIT_USAGE_ERROR: u8 = 1;
/// Process exit status when a native API call failed.
pub const EXIT_API_ERROR: u8 = 2;
/// Process exit status for failures outside the native API surface.
pub const EXIT_UNKNOWN_ERROR: u8 = 9;

/// Errors produced while delivering a tray notification.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("malformed UUID text: {0}")]
    MalformedInput(String),

    #[error("module handle lookup failed: {0}")]
    ModuleLookupFailed(String),

    #[error("window class registration failed: {0}")]
    ClassRegistrationFailed(String),

    #[error("window class unregistration failed: {0}")]
    ClassUnregistrationFailed(String),

    #[error("window creation failed: {0}")]
    WindowCreationFailed(String),

    #[error("window destruction failed: {0}")]
    WindowDestructionFailed(String),

    #[error("icon load failed: {0}")]
    IconLoadFailed(String),

    #[error("tray icon add failed: {0}")]
    IconAddFailed(String),

    #[error("balloon post failed: {0}")]
    BalloonPostFailed(String),

    #[error("tray icon removal failed: {0}")]
    IconRemoveFailed(String),

    #[error("message retrieval failed: {0}")]
    MessageRetrievalFailed(String),

    #[error("invalid state transition: {operation} on entry in state {state}")]
    InvalidStateTransition {
        operation: &'static str,
        state: IconState,
    },

    #[error("failed to format diagnostic text for OS error {code:#010X}")]
    MessageFormatFailed { code: u32 },
}

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, NotifyError>;
