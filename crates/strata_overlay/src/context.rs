//! Overlay context
//!
//! The host application builds one [`OverlayContext`] per document. It owns
//! the services every overlay shares (container, dispatchers, navigation
//! signal, scheduler) and creates overlays with [`OverlayContext::create`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use strata_core::{Direction, Platform, Result, SharedDocument, SharedScheduler};

use crate::config::{DirectionSource, OverlayConfig};
use crate::container::{ContainerHost, OverlayContainer};
use crate::dispatch::{KeyboardDispatcher, OutsidePointerDispatcher};
use crate::fullscreen::FullscreenOverlayContainer;
use crate::location::Location;
use crate::overlay_ref::{OverlayRef, OverlayServices};
use crate::portal::DomPortalOutlet;
use crate::position::{OverlayPositionBuilder, ViewportRuler};
use crate::scroll::ScrollStrategyOptions;

/// Class carried by every pane
pub const PANE_CLASS: &str = "cdk-overlay-pane";

/// Context-wide settings
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OverlayContextConfig {
    pub platform: Platform,
    /// Skip backdrop transitions
    pub animations_disabled: bool,
    /// Keep the container inside the fullscreen element
    pub fullscreen: bool,
}

impl OverlayContextConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn animations_disabled(mut self, disabled: bool) -> Self {
        self.animations_disabled = disabled;
        self
    }

    pub fn fullscreen(mut self, fullscreen: bool) -> Self {
        self.fullscreen = fullscreen;
        self
    }
}

/// Shared services and overlay factory
pub struct OverlayContext {
    document: SharedDocument,
    scheduler: SharedScheduler,
    config: OverlayContextConfig,
    container: Arc<dyn ContainerHost>,
    position: OverlayPositionBuilder,
    scroll_strategies: ScrollStrategyOptions,
    keyboard_dispatcher: Arc<KeyboardDispatcher>,
    outside_pointer_dispatcher: Arc<OutsidePointerDispatcher>,
    location: Arc<Location>,
    next_pane_id: AtomicUsize,
}

impl OverlayContext {
    pub fn new(
        document: SharedDocument,
        scheduler: SharedScheduler,
        config: OverlayContextConfig,
    ) -> Self {
        let container: Arc<dyn ContainerHost> = if config.fullscreen {
            Arc::new(FullscreenOverlayContainer::new(
                document.clone(),
                config.platform,
            ))
        } else {
            Arc::new(OverlayContainer::new(document.clone(), config.platform))
        };
        let position = OverlayPositionBuilder::new(
            ViewportRuler::new(document.clone()),
            document.clone(),
            config.platform,
            Arc::clone(&container),
        );

        Self {
            keyboard_dispatcher: KeyboardDispatcher::new(document.clone()),
            outside_pointer_dispatcher: OutsidePointerDispatcher::new(document.clone()),
            document,
            scheduler,
            config,
            container,
            position,
            scroll_strategies: ScrollStrategyOptions::new(),
            location: Arc::new(Location::default()),
            next_pane_id: AtomicUsize::new(0),
        }
    }

    /// Create an unattached overlay
    ///
    /// The host and pane are created inside the container. Without a
    /// configured direction the overlay is laid out left-to-right.
    pub fn create(&self, mut config: OverlayConfig) -> Result<OverlayRef> {
        let container = self.container.container_element();
        let pane_id = self.next_pane_id.fetch_add(1, Ordering::Relaxed);

        let (host, pane) = {
            let mut doc = self.document.lock().unwrap();
            let host = doc.create_element("div");
            doc.append_child(container, host)?;

            let pane = doc.create_element("div");
            doc.set_attribute(pane, "id", &format!("cdk-overlay-{}", pane_id));
            doc.add_class(pane, PANE_CLASS);
            doc.append_child(host, pane)?;
            (host, pane)
        };

        if config.direction.is_none() {
            config.direction = Some(DirectionSource::Fixed(Direction::Ltr));
        }

        let services = OverlayServices {
            document: self.document.clone(),
            scheduler: Arc::clone(&self.scheduler),
            keyboard_dispatcher: self.keyboard_dispatcher.clone(),
            outside_pointer_dispatcher: self.outside_pointer_dispatcher.clone(),
            location: Arc::clone(&self.location),
            animations_disabled: self.config.animations_disabled,
        };
        let outlet = Arc::new(DomPortalOutlet::new(self.document.clone(), pane));
        let overlay = OverlayRef::new(services, outlet, host, pane, config);

        tracing::debug!(
            "OverlayContext: created overlay {:?} (host={:?}, pane=cdk-overlay-{})",
            overlay.id(),
            host,
            pane_id
        );
        Ok(overlay)
    }

    /// Factory for position strategies
    pub fn position(&self) -> &OverlayPositionBuilder {
        &self.position
    }

    /// Factory for scroll strategies
    pub fn scroll_strategies(&self) -> &ScrollStrategyOptions {
        &self.scroll_strategies
    }

    pub fn container(&self) -> &Arc<dyn ContainerHost> {
        &self.container
    }

    pub fn keyboard_dispatcher(&self) -> &Arc<KeyboardDispatcher> {
        &self.keyboard_dispatcher
    }

    pub fn outside_pointer_dispatcher(&self) -> &Arc<OutsidePointerDispatcher> {
        &self.outside_pointer_dispatcher
    }

    /// Navigation signal observed by `dispose_on_navigation` overlays
    pub fn location(&self) -> &Arc<Location> {
        &self.location
    }

    pub fn document(&self) -> &SharedDocument {
        &self.document
    }

    pub fn scheduler(&self) -> &SharedScheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &OverlayContextConfig {
        &self.config
    }
}
