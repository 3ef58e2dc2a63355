//! Strata Overlay Engine
//!
//! Creates, positions, stacks and tears down floating surfaces (menus,
//! dialogs, tooltips, dropdowns) rendered outside the normal document flow.
//!
//! - **Context**: [`OverlayContext`] owns the shared services and creates overlays
//! - **Lifecycle**: [`OverlayRef`] attaches content, manages the backdrop and
//!   publishes attach / detach / backdrop-click events
//! - **Positioning**: global and origin-anchored [`PositionStrategy`] implementations
//! - **Container**: one root node per document, optionally fullscreen-aware
//! - **Dispatch**: keyboard and outside-click routing to the topmost overlay
//!
//! # Example
//!
//! ```rust
//! use strata_core::{Document, Platform, QueueScheduler};
//! use strata_overlay::{OverlayConfig, OverlayContext, OverlayContextConfig, Portal};
//!
//! let document = Document::new().into_shared();
//! let scheduler = QueueScheduler::new().shared();
//! let ctx = OverlayContext::new(
//!     document.clone(),
//!     scheduler.clone(),
//!     OverlayContextConfig::new().platform(Platform::test()),
//! );
//!
//! let strategy = ctx.position().global();
//! strategy.top("10px").left("20px");
//!
//! let overlay = ctx
//!     .create(OverlayConfig::new().position_strategy(strategy).has_backdrop(true))
//!     .unwrap();
//! let menu = document.lock().unwrap().create_element("ul");
//! overlay.attach(Portal::element(menu)).unwrap();
//!
//! // Positions are applied once the host render cycle settles
//! scheduler.run_idle();
//! let pane = overlay.overlay_element().unwrap();
//! assert_eq!(document.lock().unwrap().style(pane, "margin-top"), "10px");
//!
//! overlay.dispose();
//! ```

pub mod config;
pub mod container;
pub mod context;
pub mod dispatch;
pub mod fullscreen;
pub mod location;
pub mod overlay_ref;
pub mod portal;
pub mod position;
pub mod scroll;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{
    ClassList, CssLength, DirectionSource, OverlayConfig, OverlaySizeConfig,
    DEFAULT_BACKDROP_CLASS,
};
pub use container::{ContainerHost, OverlayContainer, CONTAINER_CLASS, PLATFORM_ATTRIBUTE};
pub use context::{OverlayContext, OverlayContextConfig, PANE_CLASS};
pub use dispatch::{KeyboardDispatcher, OutsidePointerDispatcher, OverlayDispatcher};
pub use fullscreen::FullscreenOverlayContainer;
pub use location::{Location, NavigationEvent};
pub use overlay_ref::{
    OverlayId, OverlayRef, OverlayServices, WeakOverlayRef, BACKDROP_CLASS,
    BACKDROP_FALLBACK_MS, BACKDROP_NOOP_ANIMATION_CLASS, BACKDROP_SHOWING_CLASS,
};
pub use portal::{DomPortalOutlet, Portal, PortalBuilder, PortalHandle, PortalOutlet};
pub use position::{
    Alignment, ConnectedOrigin, ConnectedPositionChange, ConnectionPosition,
    FlexibleConnectedPositionStrategy, GlobalPositionStrategy, HorizontalConnection,
    OverlayPositionBuilder, PositionStrategy, VerticalConnection, ViewportRuler,
    CONNECTED_BOUNDING_BOX_CLASS, GLOBAL_WRAPPER_CLASS,
};
pub use scroll::{NoopScrollStrategy, ScrollStrategy, ScrollStrategyOptions};
