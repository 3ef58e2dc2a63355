//! Scroll strategies
//!
//! A [`ScrollStrategy`] decides what happens to an open overlay when the page
//! scrolls. Only the contract and the no-op strategy live here; blocking,
//! repositioning and closing strategies plug in through the trait.

use std::sync::Arc;

use crate::overlay_ref::OverlayRef;

/// Behavior of an overlay while the page scrolls
pub trait ScrollStrategy: Send + Sync {
    /// Bind to an overlay; called once when the strategy is installed
    fn attach(&self, overlay: &OverlayRef);

    /// Called when the overlay is attached
    fn enable(&self);

    /// Called when the overlay is detached or disposed
    fn disable(&self);

    /// Called when the strategy is replaced or the overlay is disposed
    fn detach(&self) {}
}

/// Scroll strategy that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopScrollStrategy;

impl ScrollStrategy for NoopScrollStrategy {
    fn attach(&self, _overlay: &OverlayRef) {}

    fn enable(&self) {}

    fn disable(&self) {}
}

/// Factory for the available scroll strategies
#[derive(Debug, Default, Clone, Copy)]
pub struct ScrollStrategyOptions;

impl ScrollStrategyOptions {
    pub fn new() -> Self {
        Self
    }

    /// Leave scrolling alone
    pub fn noop(&self) -> Arc<dyn ScrollStrategy> {
        Arc::new(NoopScrollStrategy)
    }
}
