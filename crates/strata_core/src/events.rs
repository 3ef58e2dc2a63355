//! Document event types
//!
//! Events are delivered to listeners registered on document nodes. The
//! overlay engine only cares about a handful of event types, listed in
//! [`event_types`].

use crate::dom::NodeId;

/// Well-known event type names
pub mod event_types {
    /// Pointer click
    pub const CLICK: &str = "click";
    /// Key pressed
    pub const KEYDOWN: &str = "keydown";
    /// CSS transition finished on an element
    pub const TRANSITION_END: &str = "transitionend";
}

/// Payload carried by an event
#[derive(Clone, Debug, Default, PartialEq)]
pub enum EventDetail {
    #[default]
    None,
    /// Pointer position in viewport coordinates
    Pointer { x: f32, y: f32 },
    /// Logical key name (e.g. "Escape")
    Key { key: String },
}

/// An event dispatched through the document
#[derive(Clone, Debug, PartialEq)]
pub struct DomEvent {
    /// Event type name
    pub event_type: String,
    /// Node the event originated from
    pub target: NodeId,
    /// Event payload
    pub detail: EventDetail,
}

impl DomEvent {
    /// Create an event without payload
    pub fn new(event_type: impl Into<String>, target: NodeId) -> Self {
        Self {
            event_type: event_type.into(),
            target,
            detail: EventDetail::None,
        }
    }

    /// Create a click event at the given position
    pub fn click(target: NodeId, x: f32, y: f32) -> Self {
        Self {
            event_type: event_types::CLICK.to_string(),
            target,
            detail: EventDetail::Pointer { x, y },
        }
    }

    /// Create a keydown event
    pub fn keydown(target: NodeId, key: impl Into<String>) -> Self {
        Self {
            event_type: event_types::KEYDOWN.to_string(),
            target,
            detail: EventDetail::Key { key: key.into() },
        }
    }

    /// Create a transitionend event
    pub fn transition_end(target: NodeId) -> Self {
        Self::new(event_types::TRANSITION_END, target)
    }

    /// Key name for keyboard events
    pub fn key(&self) -> Option<&str> {
        match &self.detail {
            EventDetail::Key { key } => Some(key),
            _ => None,
        }
    }
}
