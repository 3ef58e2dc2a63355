//! Overlay reference
//!
//! [`OverlayRef`] is the lifecycle controller of one floating surface. It owns
//! the host wrapper and the pane, drives the position and scroll strategies,
//! manages the backdrop, and publishes lifecycle events.
//!
//! ```text
//!   Unattached ──attach──▶ Attached ──detach──▶ Detached
//!        │                    ▲  │                 │
//!        │                    │  └───dispose──┐    │
//!        │                    └─────attach────┼────┘
//!        └──────────────dispose───────────────┴──▶ Disposed
//! ```
//!
//! Cloning an `OverlayRef` yields another handle to the same overlay. Handles
//! held by strategies, dispatchers and deferred tasks are weak.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use strata_core::{
    event_types, Direction, DomEvent, EventChannel, ListenerId, NodeId, Result, SharedDocument,
    SharedScheduler, StrataError, Subscription, TimerId,
};

use crate::config::{ClassList, CssLength, DirectionSource, OverlayConfig, OverlaySizeConfig};
use crate::dispatch::OverlayDispatcher;
use crate::location::Location;
use crate::portal::{Portal, PortalHandle, PortalOutlet};
use crate::position::{same_strategy, PositionStrategy};
use crate::scroll::ScrollStrategy;

/// Class carried by every backdrop
pub const BACKDROP_CLASS: &str = "cdk-overlay-backdrop";

/// Class that fades a backdrop in
pub const BACKDROP_SHOWING_CLASS: &str = "cdk-overlay-backdrop-showing";

/// Class added to backdrops when animations are disabled
pub const BACKDROP_NOOP_ANIMATION_CLASS: &str = "cdk-overlay-backdrop-noop-animation";

/// Fallback delay before a fading backdrop is removed
pub const BACKDROP_FALLBACK_MS: u64 = 500;

static NEXT_OVERLAY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique overlay identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverlayId(u64);

impl OverlayId {
    fn next() -> Self {
        Self(NEXT_OVERLAY_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Shared services an overlay needs beyond its own nodes
#[derive(Clone)]
pub struct OverlayServices {
    pub document: SharedDocument,
    pub scheduler: SharedScheduler,
    pub keyboard_dispatcher: Arc<dyn OverlayDispatcher>,
    pub outside_pointer_dispatcher: Arc<dyn OverlayDispatcher>,
    pub location: Arc<Location>,
    pub animations_disabled: bool,
}

struct BackdropState {
    element: NodeId,
    click_listener: ListenerId,
    transition_listener: Option<ListenerId>,
    timeout: Option<TimerId>,
    detaching: bool,
}

struct OverlayState {
    config: OverlayConfig,
    host: Option<NodeId>,
    pane: Option<NodeId>,
    previous_host_parent: Option<NodeId>,
    backdrop: Option<BackdropState>,
    navigation: Option<Subscription>,
    /// Bumped on every attach and detach; deferred work compares it
    generation: u64,
    is_disposed: bool,
}

struct OverlayRefInner {
    id: OverlayId,
    services: OverlayServices,
    outlet: Arc<dyn PortalOutlet>,
    state: Mutex<OverlayState>,
    attachments: EventChannel<()>,
    detachments: EventChannel<()>,
    backdrop_click: EventChannel<DomEvent>,
    keydown_events: EventChannel<DomEvent>,
    outside_pointer_events: EventChannel<DomEvent>,
}

/// Handle to an overlay
#[derive(Clone)]
pub struct OverlayRef {
    inner: Arc<OverlayRefInner>,
}

/// Non-owning overlay handle
#[derive(Clone)]
pub struct WeakOverlayRef {
    inner: Weak<OverlayRefInner>,
}

impl WeakOverlayRef {
    pub fn upgrade(&self) -> Option<OverlayRef> {
        self.inner.upgrade().map(|inner| OverlayRef { inner })
    }
}

impl std::fmt::Debug for WeakOverlayRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakOverlayRef")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl OverlayRef {
    /// Wire an overlay around existing host and pane nodes
    ///
    /// `pane` must be a child of `host`; `outlet` renders into `pane`.
    /// A configured scroll strategy is bound immediately.
    pub fn new(
        services: OverlayServices,
        outlet: Arc<dyn PortalOutlet>,
        host: NodeId,
        pane: NodeId,
        config: OverlayConfig,
    ) -> Self {
        let scroll = config.scroll_strategy.clone();
        let overlay = Self {
            inner: Arc::new(OverlayRefInner {
                id: OverlayId::next(),
                services,
                outlet,
                state: Mutex::new(OverlayState {
                    config,
                    host: Some(host),
                    pane: Some(pane),
                    previous_host_parent: None,
                    backdrop: None,
                    navigation: None,
                    generation: 0,
                    is_disposed: false,
                }),
                attachments: EventChannel::new(),
                detachments: EventChannel::new(),
                backdrop_click: EventChannel::new(),
                keydown_events: EventChannel::new(),
                outside_pointer_events: EventChannel::new(),
            }),
        };
        if let Some(scroll) = scroll {
            scroll.attach(&overlay);
        }
        overlay
    }

    pub fn id(&self) -> OverlayId {
        self.inner.id
    }

    pub fn downgrade(&self) -> WeakOverlayRef {
        WeakOverlayRef {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn document(&self) -> &SharedDocument {
        &self.inner.services.document
    }

    /// Wrapper node positioned by the strategy (`None` once disposed)
    pub fn host_element(&self) -> Option<NodeId> {
        self.inner.state.lock().unwrap().host
    }

    /// Pane holding the attached content (`None` once disposed)
    pub fn overlay_element(&self) -> Option<NodeId> {
        self.inner.state.lock().unwrap().pane
    }

    /// Live backdrop, including one that is still fading out
    pub fn backdrop_element(&self) -> Option<NodeId> {
        self.inner
            .state
            .lock()
            .unwrap()
            .backdrop
            .as_ref()
            .map(|b| b.element)
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> OverlayConfig {
        self.inner.state.lock().unwrap().config.clone()
    }

    pub fn direction(&self) -> Direction {
        self.inner.state.lock().unwrap().config.resolved_direction()
    }

    pub fn has_attached(&self) -> bool {
        self.inner.outlet.has_attached()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().unwrap().is_disposed
    }

    /// Emits after content is attached and the overlay is fully configured
    pub fn attachments(&self) -> &EventChannel<()> {
        &self.inner.attachments
    }

    /// Emits after content is released
    pub fn detachments(&self) -> &EventChannel<()> {
        &self.inner.detachments
    }

    /// Clicks on the backdrop
    pub fn backdrop_click(&self) -> &EventChannel<DomEvent> {
        &self.inner.backdrop_click
    }

    /// Key presses routed here by the keyboard dispatcher
    pub fn keydown_events(&self) -> &EventChannel<DomEvent> {
        &self.inner.keydown_events
    }

    /// Clicks outside the pane routed here by the outside-pointer dispatcher
    pub fn outside_pointer_events(&self) -> &EventChannel<DomEvent> {
        &self.inner.outside_pointer_events
    }

    pub(crate) fn generation(&self) -> u64 {
        self.inner.state.lock().unwrap().generation
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Attach content to the pane and activate the overlay
    pub fn attach(&self, portal: Portal) -> Result<PortalHandle> {
        let host = {
            let st = self.inner.state.lock().unwrap();
            match (st.is_disposed, st.host) {
                (false, Some(host)) => host,
                _ => return Err(StrataError::OverlayDisposed),
            }
        };

        let handle = self.inner.outlet.attach(portal)?;

        let (previous_parent, generation, config) = {
            let mut st = self.inner.state.lock().unwrap();
            st.generation += 1;
            (st.previous_host_parent, st.generation, st.config.clone())
        };

        if let Some(parent) = previous_parent {
            let mut doc = self.document().lock().unwrap();
            if doc.parent(host).is_none() {
                if let Err(err) = doc.append_child(parent, host) {
                    tracing::warn!("Overlay {:?}: could not restore host: {}", self.id(), err);
                }
            }
        }

        if let Some(position) = &config.position_strategy {
            position.attach(self);
        }
        self.update_stacking_order(host);
        self.update_element_size();
        self.update_element_direction();

        if let Some(scroll) = &config.scroll_strategy {
            scroll.enable();
        }

        // Layout may depend on content that has not rendered yet
        let weak = self.downgrade();
        self.inner.services.scheduler.run_when_idle(Box::new(move || {
            if let Some(overlay) = weak.upgrade() {
                if overlay.has_attached() && overlay.generation() == generation {
                    overlay.update_position();
                }
            }
        }));

        self.toggle_pointer_events(true);
        if config.has_backdrop {
            self.attach_backdrop();
        }
        self.toggle_panel_classes(&config.panel_class, true);

        tracing::debug!("Overlay {:?}: attached", self.id());
        self.inner.attachments.next(&());

        // An observer may have detached or disposed the overlay already
        if self.generation() != generation {
            return Ok(handle);
        }

        self.inner.services.keyboard_dispatcher.add(self);
        if config.dispose_on_navigation {
            self.subscribe_to_navigation();
        }
        self.inner.services.outside_pointer_dispatcher.add(self);

        Ok(handle)
    }

    /// Release the content and deactivate the overlay
    ///
    /// Returns `None` when nothing was attached.
    pub fn detach(&self) -> Option<PortalHandle> {
        if !self.has_attached() {
            return None;
        }

        let (generation, config) = {
            let mut st = self.inner.state.lock().unwrap();
            st.generation += 1;
            (st.generation, st.config.clone())
        };

        self.detach_backdrop();
        self.toggle_pointer_events(false);
        if let Some(position) = &config.position_strategy {
            position.detach();
        }
        if let Some(scroll) = &config.scroll_strategy {
            scroll.disable();
        }

        let handle = self.inner.outlet.detach();

        tracing::debug!("Overlay {:?}: detached", self.id());
        self.inner.detachments.next(&());

        self.inner.services.keyboard_dispatcher.remove(self);
        self.remove_host_when_empty(generation);
        self.unsubscribe_from_navigation();
        self.inner.services.outside_pointer_dispatcher.remove(self);

        handle
    }

    /// Release every resource held by the overlay; idempotent and terminal
    pub fn dispose(&self) {
        let was_attached = self.has_attached();
        let (position, scroll) = {
            let mut st = self.inner.state.lock().unwrap();
            if st.is_disposed {
                return;
            }
            st.is_disposed = true;
            st.generation += 1;
            (
                st.config.position_strategy.take(),
                st.config.scroll_strategy.take(),
            )
        };

        if let Some(position) = position {
            position.dispose();
        }
        if let Some(scroll) = scroll {
            scroll.disable();
            scroll.detach();
        }
        self.detach_backdrop();
        self.unsubscribe_from_navigation();
        self.inner.services.keyboard_dispatcher.remove(self);
        self.inner.outlet.dispose();

        self.inner.attachments.complete();
        self.inner.backdrop_click.complete();
        self.inner.keydown_events.complete();
        self.inner.outside_pointer_events.complete();
        self.inner.services.outside_pointer_dispatcher.remove(self);

        let host = {
            let mut st = self.inner.state.lock().unwrap();
            st.pane = None;
            st.previous_host_parent = None;
            st.host.take()
        };
        if let Some(host) = host {
            self.document().lock().unwrap().destroy(host);
        }

        tracing::debug!("Overlay {:?}: disposed", self.id());
        if was_attached {
            self.inner.detachments.next(&());
        }
        self.inner.detachments.complete();
    }

    // =========================================================================
    // Updates
    // =========================================================================

    /// Re-run the position strategy
    pub fn update_position(&self) {
        let position = self.inner.state.lock().unwrap().config.position_strategy.clone();
        if let Some(position) = position {
            position.apply();
        }
    }

    /// Swap the position strategy, disposing the previous one
    pub fn update_position_strategy(&self, strategy: Arc<dyn PositionStrategy>) {
        let previous = {
            let mut st = self.inner.state.lock().unwrap();
            if st.is_disposed {
                return;
            }
            if let Some(current) = &st.config.position_strategy {
                if same_strategy(current, &strategy) {
                    return;
                }
            }
            let mut next = st.config.clone();
            let previous = next.position_strategy.replace(Arc::clone(&strategy));
            st.config = next;
            previous
        };

        if let Some(previous) = previous {
            previous.dispose();
        }
        if self.has_attached() {
            strategy.attach(self);
            self.update_position();
        }
    }

    /// Swap the scroll strategy, disabling and detaching the previous one
    pub fn update_scroll_strategy(&self, strategy: Arc<dyn ScrollStrategy>) {
        let previous = {
            let mut st = self.inner.state.lock().unwrap();
            if st.is_disposed {
                return;
            }
            if let Some(current) = &st.config.scroll_strategy {
                if same_strategy(current, &strategy) {
                    return;
                }
            }
            let mut next = st.config.clone();
            let previous = next.scroll_strategy.replace(Arc::clone(&strategy));
            st.config = next;
            previous
        };

        if let Some(previous) = previous {
            previous.disable();
            previous.detach();
        }
        strategy.attach(self);
        if self.has_attached() {
            strategy.enable();
        }
    }

    /// Merge a partial size into the configuration and resize the pane
    pub fn update_size(&self, size: OverlaySizeConfig) {
        {
            let mut st = self.inner.state.lock().unwrap();
            st.config = st.config.with_size(&size);
        }
        self.update_element_size();
    }

    /// Change the layout direction and update the host `dir` attribute
    pub fn set_direction(&self, direction: impl Into<DirectionSource>) {
        {
            let mut st = self.inner.state.lock().unwrap();
            let mut next = st.config.clone();
            next.direction = Some(direction.into());
            st.config = next;
        }
        self.update_element_direction();
    }

    pub fn add_panel_class(&self, classes: impl Into<ClassList>) {
        self.toggle_panel_classes(&classes.into(), true);
    }

    pub fn remove_panel_class(&self, classes: impl Into<ClassList>) {
        self.toggle_panel_classes(&classes.into(), false);
    }

    // =========================================================================
    // Backdrop
    // =========================================================================

    /// Fade out and remove the backdrop
    ///
    /// Cleanup runs on the backdrop's `transitionend` or after
    /// [`BACKDROP_FALLBACK_MS`], whichever comes first. With animations
    /// disabled the backdrop is removed immediately.
    pub fn detach_backdrop(&self) {
        let element = {
            let mut st = self.inner.state.lock().unwrap();
            match st.backdrop.as_mut() {
                Some(backdrop) if !backdrop.detaching => {
                    backdrop.detaching = true;
                    backdrop.element
                }
                _ => return,
            }
        };

        if self.inner.services.animations_disabled {
            self.dispose_backdrop(element);
            return;
        }

        let transition_listener = {
            let weak = Arc::downgrade(&self.inner);
            let document = self.document().clone();
            let mut doc = self.document().lock().unwrap();
            doc.remove_class(element, BACKDROP_SHOWING_CLASS);
            doc.set_style(element, "pointer-events", "none");
            doc.add_event_listener(element, event_types::TRANSITION_END, move |_| {
                tracing::trace!("Backdrop {:?}: transitionend", element);
                finish_backdrop(&weak, &document, element);
            })
        };

        let timeout = {
            let weak = Arc::downgrade(&self.inner);
            let document = self.document().clone();
            self.inner.services.scheduler.set_timeout(
                BACKDROP_FALLBACK_MS,
                Box::new(move || {
                    tracing::trace!("Backdrop {:?}: fallback timer", element);
                    finish_backdrop(&weak, &document, element);
                }),
            )
        };

        let stale = {
            let mut st = self.inner.state.lock().unwrap();
            match st.backdrop.as_mut() {
                Some(backdrop) if backdrop.element == element => {
                    backdrop.transition_listener = Some(transition_listener);
                    backdrop.timeout = Some(timeout);
                    false
                }
                _ => true,
            }
        };
        if stale {
            // Cleanup already ran while the listeners were being installed
            self.inner.services.scheduler.clear_timeout(timeout);
            self.document()
                .lock()
                .unwrap()
                .remove_event_listener(transition_listener);
        }
    }

    fn attach_backdrop(&self) {
        let (host, previous, classes) = {
            let st = self.inner.state.lock().unwrap();
            (
                st.host,
                st.backdrop.as_ref().map(|b| b.element),
                st.config.backdrop_class.clone(),
            )
        };
        let Some(host) = host else {
            return;
        };
        // At most one backdrop per overlay, even mid-fade
        if let Some(previous) = previous {
            self.dispose_backdrop(previous);
        }

        let animations_disabled = self.inner.services.animations_disabled;
        let weak = self.downgrade();
        let (element, click_listener) = {
            let mut doc = self.document().lock().unwrap();
            let Some(parent) = doc.parent(host) else {
                tracing::warn!("Overlay {:?}: host has no parent, skipping backdrop", self.id());
                return;
            };
            let element = doc.create_element("div");
            doc.add_class(element, BACKDROP_CLASS);
            for class in classes.iter() {
                doc.add_class(element, class);
            }
            if animations_disabled {
                doc.add_class(element, BACKDROP_NOOP_ANIMATION_CLASS);
            }
            if let Err(err) = doc.insert_before(parent, element, host) {
                doc.destroy(element);
                tracing::warn!("Overlay {:?}: could not insert backdrop: {}", self.id(), err);
                return;
            }
            let click_listener = doc.add_event_listener(element, event_types::CLICK, move |event| {
                if let Some(overlay) = weak.upgrade() {
                    overlay.inner.backdrop_click.next(event);
                }
            });
            (element, click_listener)
        };
        self.inner.state.lock().unwrap().backdrop = Some(BackdropState {
            element,
            click_listener,
            transition_listener: None,
            timeout: None,
            detaching: false,
        });
        tracing::trace!("Overlay {:?}: backdrop {:?} created", self.id(), element);

        let scheduler = &self.inner.services.scheduler;
        if !animations_disabled && scheduler.supports_animation_frames() {
            let weak = self.downgrade();
            scheduler.request_animation_frame(Box::new(move || {
                if let Some(overlay) = weak.upgrade() {
                    overlay.show_backdrop(element);
                }
            }));
        } else {
            self.show_backdrop(element);
        }
    }

    fn show_backdrop(&self, element: NodeId) {
        let current = {
            let st = self.inner.state.lock().unwrap();
            st.backdrop
                .as_ref()
                .is_some_and(|b| b.element == element && !b.detaching)
        };
        if current {
            self.document()
                .lock()
                .unwrap()
                .add_class(element, BACKDROP_SHOWING_CLASS);
        }
    }

    /// Remove `element` if it is still this overlay's backdrop
    fn dispose_backdrop(&self, element: NodeId) {
        let backdrop = {
            let mut st = self.inner.state.lock().unwrap();
            if st.backdrop.as_ref().is_some_and(|b| b.element == element) {
                st.backdrop.take()
            } else {
                None
            }
        };
        let Some(backdrop) = backdrop else {
            return;
        };

        if let Some(timeout) = backdrop.timeout {
            self.inner.services.scheduler.clear_timeout(timeout);
        }
        let mut doc = self.document().lock().unwrap();
        doc.remove_event_listener(backdrop.click_listener);
        if let Some(listener) = backdrop.transition_listener {
            doc.remove_event_listener(listener);
        }
        doc.destroy(element);
        tracing::trace!("Overlay {:?}: backdrop {:?} removed", self.id(), element);
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn update_stacking_order(&self, host: NodeId) {
        let mut doc = self.document().lock().unwrap();
        if let Some(parent) = doc.parent(host) {
            if doc.next_sibling(host).is_some() {
                if let Err(err) = doc.append_child(parent, host) {
                    tracing::warn!("Overlay {:?}: could not raise host: {}", self.id(), err);
                }
            }
        }
    }

    fn update_element_size(&self) {
        let (pane, config) = {
            let st = self.inner.state.lock().unwrap();
            (st.pane, st.config.clone())
        };
        let Some(pane) = pane else {
            return;
        };
        let css = |value: &Option<CssLength>| value.as_ref().map(CssLength::to_css).unwrap_or_default();

        let mut doc = self.document().lock().unwrap();
        doc.set_style(pane, "width", &css(&config.width));
        doc.set_style(pane, "height", &css(&config.height));
        doc.set_style(pane, "min-width", &css(&config.min_width));
        doc.set_style(pane, "min-height", &css(&config.min_height));
        doc.set_style(pane, "max-width", &css(&config.max_width));
        doc.set_style(pane, "max-height", &css(&config.max_height));
    }

    fn update_element_direction(&self) {
        let (host, direction) = {
            let st = self.inner.state.lock().unwrap();
            (st.host, st.config.resolved_direction())
        };
        if let Some(host) = host {
            self.document()
                .lock()
                .unwrap()
                .set_attribute(host, "dir", direction.as_str());
        }
    }

    fn toggle_pointer_events(&self, enable: bool) {
        if let Some(pane) = self.overlay_element() {
            let value = if enable { "" } else { "none" };
            self.document()
                .lock()
                .unwrap()
                .set_style(pane, "pointer-events", value);
        }
    }

    fn toggle_panel_classes(&self, classes: &ClassList, add: bool) {
        let Some(pane) = self.overlay_element() else {
            return;
        };
        let mut doc = self.document().lock().unwrap();
        for class in classes.iter() {
            if add {
                doc.add_class(pane, class);
            } else {
                doc.remove_class(pane, class);
            }
        }
    }

    /// Detach the host at the first quiet point where the pane is empty
    ///
    /// Re-checks at every quiet point; abandoned once the overlay is attached
    /// or detached again.
    fn remove_host_when_empty(&self, generation: u64) {
        let weak = self.downgrade();
        self.inner.services.scheduler.run_when_idle(Box::new(move || {
            let Some(overlay) = weak.upgrade() else {
                return;
            };
            let (host, pane, panel_class) = {
                let st = overlay.inner.state.lock().unwrap();
                if st.is_disposed || st.generation != generation {
                    return;
                }
                (st.host, st.pane, st.config.panel_class.clone())
            };
            let (Some(host), Some(pane)) = (host, pane) else {
                return;
            };

            let removed_from = {
                let mut doc = overlay.document().lock().unwrap();
                if doc.child_count(pane) > 0 {
                    None
                } else {
                    for class in panel_class.iter() {
                        doc.remove_class(pane, class);
                    }
                    let parent = doc.parent(host);
                    if parent.is_some() {
                        doc.remove(host);
                    }
                    Some(parent)
                }
            };

            match removed_from {
                None => overlay.remove_host_when_empty(generation),
                Some(parent) => {
                    if parent.is_some() {
                        overlay.inner.state.lock().unwrap().previous_host_parent = parent;
                    }
                    tracing::trace!("Overlay {:?}: host removed", overlay.id());
                }
            }
        }));
    }

    fn subscribe_to_navigation(&self) {
        let weak = self.downgrade();
        let subscription = self
            .inner
            .services
            .location
            .changes()
            .subscribe(move |_| {
                if let Some(overlay) = weak.upgrade() {
                    tracing::debug!("Overlay {:?}: disposing on navigation", overlay.id());
                    overlay.dispose();
                }
            });

        match subscription {
            Ok(subscription) => {
                let previous = self
                    .inner
                    .state
                    .lock()
                    .unwrap()
                    .navigation
                    .replace(subscription);
                if let Some(previous) = previous {
                    previous.unsubscribe();
                }
            }
            Err(err) => tracing::warn!(
                "Overlay {:?}: navigation signal unavailable: {}",
                self.id(),
                err
            ),
        }
    }

    fn unsubscribe_from_navigation(&self) {
        let subscription = self.inner.state.lock().unwrap().navigation.take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
    }
}

impl std::fmt::Debug for OverlayRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.inner.state.lock().unwrap();
        f.debug_struct("OverlayRef")
            .field("id", &self.inner.id)
            .field("host", &st.host)
            .field("pane", &st.pane)
            .field("is_disposed", &st.is_disposed)
            .finish()
    }
}

/// Backdrop cleanup shared by the transitionend and timer paths
fn finish_backdrop(overlay: &Weak<OverlayRefInner>, document: &SharedDocument, element: NodeId) {
    match overlay.upgrade() {
        Some(inner) => OverlayRef { inner }.dispose_backdrop(element),
        None => document.lock().unwrap().destroy(element),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::OverlayContextConfig;
    use crate::testing::TestBed;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use strata_core::{DocumentExt, Platform, QueueScheduler};

    fn counter<T: 'static>(channel: &EventChannel<T>) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let _sub = channel
            .subscribe(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        count
    }

    fn backdrops(bed: &TestBed) -> usize {
        bed.doc().query_by_class(BACKDROP_CLASS).len()
    }

    #[test]
    fn test_attach_configures_overlay_before_emitting() {
        let bed = TestBed::new();
        let overlay = bed
            .ctx
            .create(
                OverlayConfig::new()
                    .panel_class("menu wide")
                    .width(240)
                    .direction(Direction::Rtl),
            )
            .unwrap();

        let seen = Arc::new(Mutex::new(None));
        {
            let seen = Arc::clone(&seen);
            let o = overlay.clone();
            let _sub = overlay.attachments().subscribe(move |_| {
                let pane = o.overlay_element().unwrap();
                let doc = o.document().lock().unwrap();
                *seen.lock().unwrap() = Some((
                    doc.has_class(pane, "menu") && doc.has_class(pane, "wide"),
                    doc.style(pane, "width").to_string(),
                ));
            });
        }

        let content = bed.content();
        let handle = overlay.attach(Portal::element(content)).unwrap();
        assert_eq!(handle.root(), Some(content));
        assert!(overlay.has_attached());
        assert_eq!(*seen.lock().unwrap(), Some((true, "240px".to_string())));

        let host = overlay.host_element().unwrap();
        assert_eq!(bed.doc().attribute(host, "dir"), Some("rtl"));
        assert_eq!(overlay.direction(), Direction::Rtl);
    }

    #[test]
    fn test_attach_detach_symmetry() {
        let bed = TestBed::new();
        let overlay = bed.ctx.create(OverlayConfig::new()).unwrap();
        let host = overlay.host_element().unwrap();
        let container = bed.ctx.container().container_element();

        overlay.attach(Portal::element(bed.content())).unwrap();
        assert!(overlay.detach().is_some());
        assert!(!overlay.has_attached());

        // Host leaves the document only at the next quiet point
        assert_eq!(bed.doc().parent(host), Some(container));
        bed.scheduler.run_idle();
        assert_eq!(bed.doc().parent(host), None);

        overlay.attach(Portal::element(bed.content())).unwrap();
        assert_eq!(bed.doc().parent(host), Some(container));
        assert!(overlay.has_attached());
    }

    #[test]
    fn test_detach_when_not_attached_is_noop() {
        let bed = TestBed::new();
        let overlay = bed.ctx.create(OverlayConfig::new()).unwrap();
        let detachments = counter(overlay.detachments());

        assert!(overlay.detach().is_none());
        assert_eq!(detachments.load(Ordering::SeqCst), 0);
        assert_eq!(bed.scheduler.pending_idle(), 0);
    }

    #[test]
    fn test_host_removal_waits_for_empty_pane() {
        let bed = TestBed::new();
        let overlay = bed.ctx.create(OverlayConfig::new().panel_class("menu")).unwrap();
        let host = overlay.host_element().unwrap();
        let pane = overlay.overlay_element().unwrap();
        overlay.attach(Portal::element(bed.content())).unwrap();
        overlay.detach();

        // A leaving animation keeps a node in the pane
        let leaving = {
            let mut doc = bed.doc();
            let node = doc.create_element("div");
            doc.append_child(pane, node).unwrap();
            node
        };
        bed.scheduler.run_idle();
        assert!(bed.doc().parent(host).is_some());
        assert!(bed.doc().has_class(pane, "menu"));

        bed.doc().destroy(leaving);
        bed.scheduler.run_idle();
        assert_eq!(bed.doc().parent(host), None);
        assert!(!bed.doc().has_class(pane, "menu"));
    }

    #[test]
    fn test_failed_attach_does_not_pin_host() {
        let bed = TestBed::new();
        let overlay = bed.ctx.create(OverlayConfig::new()).unwrap();
        let host = overlay.host_element().unwrap();
        let gone = {
            let mut doc = bed.doc();
            let node = doc.create_element("div");
            doc.destroy(node);
            node
        };

        let result =
            overlay.attach(Portal::build(move |doc| vec![doc.create_element("span"), gone]));
        assert_eq!(result.err(), Some(StrataError::NodeNotFound(gone)));
        assert!(!overlay.has_attached());

        overlay.attach(Portal::element(bed.content())).unwrap();
        overlay.detach();
        bed.scheduler.run_idle();
        assert_eq!(bed.doc().parent(host), None);
        assert_eq!(bed.scheduler.pending_idle(), 0);
    }

    #[test]
    fn test_reattach_cancels_pending_host_removal() {
        let bed = TestBed::new();
        let overlay = bed.ctx.create(OverlayConfig::new()).unwrap();
        let host = overlay.host_element().unwrap();

        overlay.attach(Portal::element(bed.content())).unwrap();
        overlay.detach();
        overlay.attach(Portal::element(bed.content())).unwrap();
        bed.scheduler.run_idle();

        assert!(bed.doc().parent(host).is_some());
        assert!(overlay.has_attached());
    }

    #[test]
    fn test_deferred_position_update_skipped_after_detach() {
        let bed = TestBed::new();
        let strategy = bed.ctx.position().global();
        strategy.top("10px");
        let overlay = bed
            .ctx
            .create(OverlayConfig::new().position_strategy(strategy.clone()))
            .unwrap();
        let pane = overlay.overlay_element().unwrap();

        overlay.attach(Portal::element(bed.content())).unwrap();
        assert_eq!(bed.doc().style(pane, "margin-top"), "");
        bed.scheduler.run_idle();
        assert_eq!(bed.doc().style(pane, "margin-top"), "10px");

        overlay.detach();
        strategy.top("30px");
        overlay.attach(Portal::element(bed.content())).unwrap();
        overlay.detach();
        bed.scheduler.run_idle();
        assert_eq!(bed.doc().style(pane, "margin-top"), "10px");
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let bed = TestBed::new();
        let overlay = bed.ctx.create(OverlayConfig::new()).unwrap();
        let host = overlay.host_element().unwrap();
        let content = bed.content();
        overlay.attach(Portal::element(content)).unwrap();

        let detachments = counter(overlay.detachments());
        overlay.dispose();
        overlay.dispose();

        assert_eq!(detachments.load(Ordering::SeqCst), 1);
        assert!(overlay.detachments().is_completed());
        assert!(overlay.attachments().is_completed());
        assert!(overlay.keydown_events().is_completed());
        assert!(!overlay.has_attached());
        assert_eq!(overlay.host_element(), None);
        assert_eq!(overlay.overlay_element(), None);
        assert!(!bed.doc().exists(host));
        assert!(bed.doc().exists(content));
        assert_eq!(
            overlay.attach(Portal::element(content)).err(),
            Some(StrataError::OverlayDisposed)
        );
    }

    #[test]
    fn test_dispose_unattached_emits_no_detachment() {
        let bed = TestBed::new();
        let overlay = bed.ctx.create(OverlayConfig::new()).unwrap();
        let detachments = counter(overlay.detachments());
        overlay.dispose();
        assert_eq!(detachments.load(Ordering::SeqCst), 0);
        assert!(overlay.detachments().is_completed());
    }

    #[test]
    fn test_stacking_order_repaired_on_attach() {
        let bed = TestBed::new();
        let a = bed.ctx.create(OverlayConfig::new()).unwrap();
        let b = bed.ctx.create(OverlayConfig::new()).unwrap();
        let container = bed.ctx.container().container_element();

        b.attach(Portal::element(bed.content())).unwrap();
        a.attach(Portal::element(bed.content())).unwrap();

        let children = bed.doc().children(container).to_vec();
        let a_index = children.iter().position(|&n| Some(n) == a.host_element());
        let b_index = children.iter().position(|&n| Some(n) == b.host_element());
        assert!(a_index > b_index);
    }

    #[test]
    fn test_backdrop_inserted_before_host_and_shown_next_frame() {
        let bed = TestBed::new();
        let overlay = bed
            .ctx
            .create(OverlayConfig::new().has_backdrop(true).backdrop_class("dim"))
            .unwrap();
        overlay.attach(Portal::element(bed.content())).unwrap();

        let backdrop = overlay.backdrop_element().unwrap();
        let host = overlay.host_element().unwrap();
        assert_eq!(bed.doc().next_sibling(backdrop), Some(host));
        assert!(bed.doc().has_class(backdrop, "dim"));
        assert!(!bed.doc().has_class(backdrop, BACKDROP_SHOWING_CLASS));

        bed.scheduler.run_frame();
        assert!(bed.doc().has_class(backdrop, BACKDROP_SHOWING_CLASS));
    }

    #[test]
    fn test_backdrop_click_is_forwarded() {
        let bed = TestBed::new();
        let overlay = bed.ctx.create(OverlayConfig::new().has_backdrop(true)).unwrap();
        overlay.attach(Portal::element(bed.content())).unwrap();
        let clicks = counter(overlay.backdrop_click());

        let backdrop = overlay.backdrop_element().unwrap();
        bed.document.dispatch_event(&DomEvent::click(backdrop, 5.0, 5.0));
        assert_eq!(clicks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backdrop_removed_on_transition_end() {
        let bed = TestBed::new();
        let overlay = bed.ctx.create(OverlayConfig::new().has_backdrop(true)).unwrap();
        overlay.attach(Portal::element(bed.content())).unwrap();
        let backdrop = overlay.backdrop_element().unwrap();

        overlay.detach();
        assert!(bed.doc().exists(backdrop));
        assert_eq!(bed.doc().style(backdrop, "pointer-events"), "none");
        assert_eq!(bed.scheduler.pending_timers(), 1);

        bed.document.dispatch_event(&DomEvent::transition_end(backdrop));
        assert!(!bed.doc().exists(backdrop));
        assert_eq!(overlay.backdrop_element(), None);
        assert_eq!(bed.scheduler.pending_timers(), 0);

        // The fallback has nothing left to do
        bed.scheduler.advance(BACKDROP_FALLBACK_MS);
        assert_eq!(backdrops(&bed), 0);
    }

    #[test]
    fn test_dispose_with_backdrop_cleans_up_after_fallback() {
        let bed = TestBed::new();
        let overlay = bed.ctx.create(OverlayConfig::new().has_backdrop(true)).unwrap();
        overlay.attach(Portal::element(bed.content())).unwrap();
        let backdrop = overlay.backdrop_element().unwrap();

        overlay.dispose();
        assert!(bed.doc().exists(backdrop));

        bed.scheduler.advance(BACKDROP_FALLBACK_MS - 1);
        assert!(bed.doc().exists(backdrop));
        bed.scheduler.advance(1);
        assert!(!bed.doc().exists(backdrop));
        assert_eq!(overlay.backdrop_element(), None);
    }

    #[test]
    fn test_fallback_removes_backdrop_after_handle_dropped() {
        let bed = TestBed::new();
        let overlay = bed.ctx.create(OverlayConfig::new().has_backdrop(true)).unwrap();
        overlay.attach(Portal::element(bed.content())).unwrap();
        let backdrop = overlay.backdrop_element().unwrap();

        overlay.dispose();
        drop(overlay);
        bed.scheduler.advance(BACKDROP_FALLBACK_MS);
        assert!(!bed.doc().exists(backdrop));
    }

    #[test]
    fn test_at_most_one_backdrop() {
        let bed = TestBed::new();
        let overlay = bed.ctx.create(OverlayConfig::new().has_backdrop(true)).unwrap();

        for _ in 0..3 {
            overlay.attach(Portal::element(bed.content())).unwrap();
            assert_eq!(backdrops(&bed), 1);
            overlay.detach();
            assert!(backdrops(&bed) <= 1);
        }
        bed.scheduler.advance(BACKDROP_FALLBACK_MS);
        assert_eq!(backdrops(&bed), 0);
    }

    #[test]
    fn test_detach_backdrop_twice_installs_one_timer() {
        let bed = TestBed::new();
        let overlay = bed.ctx.create(OverlayConfig::new().has_backdrop(true)).unwrap();
        overlay.attach(Portal::element(bed.content())).unwrap();

        overlay.detach_backdrop();
        overlay.detach_backdrop();
        assert_eq!(bed.scheduler.pending_timers(), 1);
    }

    #[test]
    fn test_backdrop_without_animations() {
        let bed = TestBed::with_config(OverlayContextConfig {
            platform: Platform::test(),
            animations_disabled: true,
            ..Default::default()
        });
        let overlay = bed.ctx.create(OverlayConfig::new().has_backdrop(true)).unwrap();
        overlay.attach(Portal::element(bed.content())).unwrap();

        let backdrop = overlay.backdrop_element().unwrap();
        assert!(bed.doc().has_class(backdrop, BACKDROP_NOOP_ANIMATION_CLASS));
        assert!(bed.doc().has_class(backdrop, BACKDROP_SHOWING_CLASS));

        overlay.detach();
        assert!(!bed.doc().exists(backdrop));
        assert_eq!(bed.scheduler.pending_timers(), 0);
    }

    #[test]
    fn test_backdrop_shown_synchronously_without_frames() {
        let bed = TestBed::with_scheduler(
            OverlayContextConfig::new().platform(Platform::test()),
            QueueScheduler::without_animation_frames().shared(),
        );
        let overlay = bed.ctx.create(OverlayConfig::new().has_backdrop(true)).unwrap();
        overlay.attach(Portal::element(bed.content())).unwrap();

        let backdrop = overlay.backdrop_element().unwrap();
        assert!(bed.doc().has_class(backdrop, BACKDROP_SHOWING_CLASS));
        assert!(!bed.doc().has_class(backdrop, BACKDROP_NOOP_ANIMATION_CLASS));
        assert_eq!(bed.scheduler.pending_frames(), 0);
    }

    #[test]
    fn test_update_size_and_panel_classes() {
        let bed = TestBed::new();
        let overlay = bed.ctx.create(OverlayConfig::new().width(100)).unwrap();
        overlay.attach(Portal::element(bed.content())).unwrap();
        let pane = overlay.overlay_element().unwrap();

        overlay.update_size(OverlaySizeConfig::new().height("50vh"));
        assert_eq!(bed.doc().style(pane, "width"), "100px");
        assert_eq!(bed.doc().style(pane, "height"), "50vh");

        overlay.add_panel_class(["a", "b"]);
        overlay.remove_panel_class("a");
        assert!(!bed.doc().has_class(pane, "a"));
        assert!(bed.doc().has_class(pane, "b"));

        overlay.dispose();
        // No pane left to touch
        overlay.add_panel_class("c");
    }

    #[test]
    fn test_update_position_strategy_disposes_previous() {
        let bed = TestBed::new();
        let first = bed.ctx.position().global();
        let second = bed.ctx.position().global();
        second.top("8px");

        let overlay = bed
            .ctx
            .create(OverlayConfig::new().position_strategy(first.clone()))
            .unwrap();
        overlay.attach(Portal::element(bed.content())).unwrap();

        overlay.update_position_strategy(first.clone());
        assert!(!first.is_disposed());

        overlay.update_position_strategy(second.clone());
        assert!(first.is_disposed());
        let pane = overlay.overlay_element().unwrap();
        assert_eq!(bed.doc().style(pane, "margin-top"), "8px");
    }

    #[derive(Default)]
    struct RecordingScroll {
        calls: Mutex<Vec<&'static str>>,
    }

    impl RecordingScroll {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ScrollStrategy for RecordingScroll {
        fn attach(&self, _overlay: &OverlayRef) {
            self.calls.lock().unwrap().push("attach");
        }

        fn enable(&self) {
            self.calls.lock().unwrap().push("enable");
        }

        fn disable(&self) {
            self.calls.lock().unwrap().push("disable");
        }

        fn detach(&self) {
            self.calls.lock().unwrap().push("detach");
        }
    }

    #[test]
    fn test_scroll_strategy_follows_lifecycle() {
        let bed = TestBed::new();
        let scroll = Arc::new(RecordingScroll::default());
        let overlay = bed
            .ctx
            .create(OverlayConfig::new().scroll_strategy(scroll.clone()))
            .unwrap();
        assert_eq!(scroll.calls(), vec!["attach"]);

        overlay.attach(Portal::element(bed.content())).unwrap();
        overlay.detach();
        assert_eq!(scroll.calls(), vec!["attach", "enable", "disable"]);

        overlay.attach(Portal::element(bed.content())).unwrap();
        let replacement = Arc::new(RecordingScroll::default());
        overlay.update_scroll_strategy(replacement.clone());
        assert_eq!(
            scroll.calls(),
            vec!["attach", "enable", "disable", "enable", "disable", "detach"]
        );
        assert_eq!(replacement.calls(), vec!["attach", "enable"]);

        // Same strategy again: nothing happens
        overlay.update_scroll_strategy(replacement.clone());
        assert_eq!(replacement.calls(), vec!["attach", "enable"]);

        overlay.dispose();
        assert_eq!(
            replacement.calls(),
            vec!["attach", "enable", "disable", "detach"]
        );
    }

    #[test]
    fn test_noop_scroll_strategy_swaps_in_while_detached() {
        let bed = TestBed::new();
        let scroll = Arc::new(RecordingScroll::default());
        let overlay = bed
            .ctx
            .create(OverlayConfig::new().scroll_strategy(scroll.clone()))
            .unwrap();

        overlay.update_scroll_strategy(bed.ctx.scroll_strategies().noop());
        assert_eq!(scroll.calls(), vec!["attach", "disable", "detach"]);
        assert!(overlay.config().scroll_strategy.is_some());
        overlay.attach(Portal::element(bed.content())).unwrap();
        assert!(overlay.has_attached());
    }

    #[test]
    fn test_dispose_on_navigation() {
        let bed = TestBed::new();
        let overlay = bed
            .ctx
            .create(OverlayConfig::new().dispose_on_navigation(true))
            .unwrap();
        let other = bed.ctx.create(OverlayConfig::new()).unwrap();
        overlay.attach(Portal::element(bed.content())).unwrap();
        other.attach(Portal::element(bed.content())).unwrap();

        bed.ctx.location().navigate("/elsewhere");
        assert!(overlay.is_disposed());
        assert!(!other.is_disposed());
        assert_eq!(bed.ctx.location().changes().observer_count(), 0);
    }

    #[test]
    fn test_dispose_during_attachments_skips_registration() {
        let bed = TestBed::new();
        let overlay = bed
            .ctx
            .create(OverlayConfig::new().dispose_on_navigation(true))
            .unwrap();
        let weak = overlay.downgrade();
        overlay
            .attachments()
            .subscribe(move |_| {
                if let Some(overlay) = weak.upgrade() {
                    overlay.dispose();
                }
            })
            .unwrap();

        assert!(overlay.attach(Portal::element(bed.content())).is_ok());
        assert!(overlay.is_disposed());
        assert!(bed.ctx.keyboard_dispatcher().is_empty());
        assert!(!bed.ctx.keyboard_dispatcher().is_listening());
        assert!(bed.ctx.outside_pointer_dispatcher().is_empty());
        assert!(!bed.ctx.outside_pointer_dispatcher().is_listening());
        assert_eq!(bed.ctx.location().changes().observer_count(), 0);
    }

    #[test]
    fn test_detach_during_attachments_skips_registration() {
        let bed = TestBed::new();
        let overlay = bed.ctx.create(OverlayConfig::new()).unwrap();
        let weak = overlay.downgrade();
        overlay
            .attachments()
            .subscribe(move |_| {
                if let Some(overlay) = weak.upgrade() {
                    overlay.detach();
                }
            })
            .unwrap();

        overlay.attach(Portal::element(bed.content())).unwrap();
        assert!(!overlay.has_attached());
        assert_eq!(bed.ctx.keyboard_dispatcher().len(), 0);
        assert_eq!(bed.ctx.outside_pointer_dispatcher().len(), 0);
    }

    #[test]
    fn test_detach_unsubscribes_navigation() {
        let bed = TestBed::new();
        let overlay = bed
            .ctx
            .create(OverlayConfig::new().dispose_on_navigation(true))
            .unwrap();
        overlay.attach(Portal::element(bed.content())).unwrap();
        overlay.detach();

        bed.ctx.location().navigate("/elsewhere");
        assert!(!overlay.is_disposed());
    }
}
