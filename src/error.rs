//! Error types for bridgecalc.

use thiserror::Error;

use crate::construct::ConstructType;

/// Error type for bridging operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No bridge chain reaches a natively supported construct type, or a
    /// bridge rejected the specific parameterization it was given.
    ///
    /// Raised at add time; the underlying model is left unchanged.
    #[error("Unsupported construct: {construct}")]
    UnsupportedConstruct {
        /// The construct type that could not be bridged.
        construct: ConstructType,
    },

    /// A bridge's final touch could not produce a valid reformulation.
    ///
    /// Raised when finalizing before a solve; the solve is not attempted.
    #[error("Reformulation failed: {0}")]
    Reformulation(String),

    /// Operation on a deleted or foreign index.
    #[error("Invalid index: {0}")]
    InvalidIndex(String),

    /// An operation conflicts with an attached bridge's constraints on
    /// structural change. The caller must remove the construct first.
    #[error("Invalid state: {0}")]
    State(String),
}

/// Result type for bridging operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
