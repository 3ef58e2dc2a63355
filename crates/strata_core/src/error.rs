//! Error types for strata

use thiserror::Error;

use crate::dom::NodeId;

/// Errors surfaced by the overlay engine
///
/// Most lifecycle misuse (detaching twice, applying a strategy with no content)
/// is resolved internally as a no-op. The variants here cover the programming
/// errors that are reported back to the caller instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrataError {
    /// The overlay has been disposed and can no longer attach content
    #[error("overlay has already been disposed")]
    OverlayDisposed,

    /// Content is already attached to the outlet
    #[error("outlet already has content attached")]
    AlreadyAttached,

    /// The outlet has been disposed
    #[error("outlet has already been disposed")]
    OutletDisposed,

    /// A node handle does not refer to a live node
    #[error("node {0:?} is not part of the document")]
    NodeNotFound(NodeId),

    /// A node that must be parented has no parent
    #[error("node {0:?} has no parent node")]
    MissingParent(NodeId),

    /// Subscribing to a channel that has already completed
    #[error("event channel has already completed")]
    ChannelCompleted,
}

/// Result type for strata operations
pub type Result<T> = std::result::Result<T, StrataError>;
