//! Overlay positioning
//!
//! A [`PositionStrategy`] computes and writes the placement of one overlay
//! pane. Strategies are built through [`OverlayPositionBuilder`], which binds
//! them to the shared document, viewport measurement, platform detection and
//! overlay container.
//!
//! - [`GlobalPositionStrategy`]: fixed viewport-relative placement
//! - [`FlexibleConnectedPositionStrategy`]: placement anchored to an origin,
//!   flipping between preferred positions to stay inside the viewport

mod connected;
mod global;

use std::sync::Arc;

use strata_core::{Platform, Rect, SharedDocument};

use crate::container::ContainerHost;
use crate::overlay_ref::OverlayRef;

pub use connected::{
    ConnectedOrigin, ConnectedPositionChange, ConnectionPosition,
    FlexibleConnectedPositionStrategy, HorizontalConnection, VerticalConnection,
    CONNECTED_BOUNDING_BOX_CLASS,
};
pub use global::{Alignment, GlobalPositionStrategy, GLOBAL_WRAPPER_CLASS};

/// Strategy for placing an overlay pane on screen
///
/// `attach` binds the strategy to an overlay and is called on every attach.
/// `apply` may run many times and must do nothing while the overlay has no
/// content or after disposal. `dispose` must tolerate repeated calls and
/// calls before `attach`.
pub trait PositionStrategy: Send + Sync {
    fn attach(&self, overlay: &OverlayRef);

    fn apply(&self);

    /// Called when the overlay is detached
    fn detach(&self) {}

    fn dispose(&self);
}

/// Identity comparison for shared strategies
pub(crate) fn same_strategy<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

// =============================================================================
// ViewportRuler
// =============================================================================

/// Viewport measurement service
#[derive(Clone)]
pub struct ViewportRuler {
    document: SharedDocument,
}

impl ViewportRuler {
    pub fn new(document: SharedDocument) -> Self {
        Self { document }
    }

    /// Viewport width and height
    pub fn viewport_size(&self) -> (f32, f32) {
        let viewport = self.document.lock().unwrap().viewport();
        (viewport.width, viewport.height)
    }

    /// Visible area in viewport coordinates
    pub fn viewport_rect(&self) -> Rect {
        let (width, height) = self.viewport_size();
        Rect::new(0.0, 0.0, width, height)
    }
}

// =============================================================================
// OverlayPositionBuilder
// =============================================================================

/// Factory for position strategies bound to shared services
#[derive(Clone)]
pub struct OverlayPositionBuilder {
    viewport_ruler: ViewportRuler,
    document: SharedDocument,
    platform: Platform,
    container: Arc<dyn ContainerHost>,
}

impl OverlayPositionBuilder {
    pub fn new(
        viewport_ruler: ViewportRuler,
        document: SharedDocument,
        platform: Platform,
        container: Arc<dyn ContainerHost>,
    ) -> Self {
        Self {
            viewport_ruler,
            document,
            platform,
            container,
        }
    }

    /// Strategy for global, viewport-relative placement
    pub fn global(&self) -> Arc<GlobalPositionStrategy> {
        Arc::new(GlobalPositionStrategy::new())
    }

    /// Strategy anchored to `origin`
    pub fn flexible_connected_to(
        &self,
        origin: impl Into<ConnectedOrigin>,
    ) -> Arc<FlexibleConnectedPositionStrategy> {
        Arc::new(FlexibleConnectedPositionStrategy::new(
            origin.into(),
            self.viewport_ruler.clone(),
            self.document.clone(),
            self.platform,
            Arc::clone(&self.container),
        ))
    }
}
