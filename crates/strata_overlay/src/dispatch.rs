//! Overlay event dispatchers
//!
//! Attached overlays register with two dispatchers. Each dispatcher installs a
//! single document-level listener while at least one overlay is registered
//! and routes matching events to overlays, most recently registered first.
//!
//! - [`KeyboardDispatcher`]: `keydown` goes to the topmost overlay that has
//!   keydown subscribers
//! - [`OutsidePointerDispatcher`]: clicks outside a pane go to every overlay
//!   above the one that contains the click target

use std::sync::{Arc, Mutex, Weak};

use indexmap::IndexMap;
use strata_core::{event_types, DomEvent, ListenerId, SharedDocument};

use crate::overlay_ref::{OverlayId, OverlayRef, WeakOverlayRef};

/// Registration surface used by overlays on attach and detach
pub trait OverlayDispatcher: Send + Sync {
    /// Register an overlay; re-adding moves it to the top
    fn add(&self, overlay: &OverlayRef);

    fn remove(&self, overlay: &OverlayRef);
}

#[derive(Default)]
struct RegistryState {
    overlays: IndexMap<OverlayId, WeakOverlayRef>,
    listener: Option<ListenerId>,
}

/// Ordered overlay set with a lazily installed document listener
struct Registry {
    document: SharedDocument,
    event_type: &'static str,
    state: Mutex<RegistryState>,
}

impl Registry {
    fn new(document: SharedDocument, event_type: &'static str) -> Self {
        Self {
            document,
            event_type,
            state: Mutex::new(RegistryState::default()),
        }
    }

    fn add<F>(&self, overlay: &OverlayRef, listener: F)
    where
        F: Fn(&DomEvent) + Send + Sync + 'static,
    {
        let mut st = self.state.lock().unwrap();
        st.overlays.shift_remove(&overlay.id());
        st.overlays.insert(overlay.id(), overlay.downgrade());

        if st.listener.is_none() {
            let mut doc = self.document.lock().unwrap();
            let root = doc.root();
            st.listener = Some(doc.add_event_listener(root, self.event_type, listener));
            tracing::trace!("{} dispatcher: listening", self.event_type);
        }
    }

    fn remove(&self, overlay: &OverlayRef) {
        let mut st = self.state.lock().unwrap();
        st.overlays.shift_remove(&overlay.id());
        if st.overlays.is_empty() {
            if let Some(listener) = st.listener.take() {
                self.document.lock().unwrap().remove_event_listener(listener);
                tracing::trace!("{} dispatcher: idle", self.event_type);
            }
        }
    }

    /// Live overlays, most recently added first
    fn topmost_first(&self) -> Vec<OverlayRef> {
        let st = self.state.lock().unwrap();
        st.overlays
            .values()
            .rev()
            .filter_map(WeakOverlayRef::upgrade)
            .collect()
    }

    fn len(&self) -> usize {
        self.state.lock().unwrap().overlays.len()
    }

    fn is_listening(&self) -> bool {
        self.state.lock().unwrap().listener.is_some()
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        let Some(listener) = self.state.get_mut().ok().and_then(|s| s.listener.take()) else {
            return;
        };
        if let Ok(mut doc) = self.document.lock() {
            doc.remove_event_listener(listener);
        }
    }
}

// =============================================================================
// KeyboardDispatcher
// =============================================================================

/// Routes `keydown` events to the topmost interested overlay
pub struct KeyboardDispatcher {
    registry: Registry,
    this: Weak<KeyboardDispatcher>,
}

impl KeyboardDispatcher {
    pub fn new(document: SharedDocument) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            registry: Registry::new(document, event_types::KEYDOWN),
            this: this.clone(),
        })
    }

    /// Deliver a key event; returns `true` if an overlay received it
    pub fn dispatch_keydown(&self, event: &DomEvent) -> bool {
        for overlay in self.registry.topmost_first() {
            if overlay.keydown_events().has_observers() {
                overlay.keydown_events().next(event);
                return true;
            }
        }
        false
    }

    /// Number of registered overlays
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the document listener is installed
    pub fn is_listening(&self) -> bool {
        self.registry.is_listening()
    }
}

impl OverlayDispatcher for KeyboardDispatcher {
    fn add(&self, overlay: &OverlayRef) {
        let this = self.this.clone();
        self.registry.add(overlay, move |event| {
            if let Some(dispatcher) = this.upgrade() {
                dispatcher.dispatch_keydown(event);
            }
        });
    }

    fn remove(&self, overlay: &OverlayRef) {
        self.registry.remove(overlay);
    }
}

// =============================================================================
// OutsidePointerDispatcher
// =============================================================================

/// Routes clicks outside an overlay's pane to that overlay
pub struct OutsidePointerDispatcher {
    registry: Registry,
    this: Weak<OutsidePointerDispatcher>,
}

impl OutsidePointerDispatcher {
    pub fn new(document: SharedDocument) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            registry: Registry::new(document, event_types::CLICK),
            this: this.clone(),
        })
    }

    /// Deliver a click; returns the number of overlays notified
    ///
    /// Walks overlays from the top and stops at the first one whose pane
    /// contains the target.
    pub fn dispatch_click(&self, event: &DomEvent) -> usize {
        let mut notified = 0;
        for overlay in self.registry.topmost_first() {
            if !overlay.outside_pointer_events().has_observers() || !overlay.has_attached() {
                continue;
            }
            let Some(pane) = overlay.overlay_element() else {
                continue;
            };
            let inside = overlay.document().lock().unwrap().contains(pane, event.target);
            if inside {
                break;
            }
            overlay.outside_pointer_events().next(event);
            notified += 1;
        }
        notified
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_listening(&self) -> bool {
        self.registry.is_listening()
    }
}

impl OverlayDispatcher for OutsidePointerDispatcher {
    fn add(&self, overlay: &OverlayRef) {
        let this = self.this.clone();
        self.registry.add(overlay, move |event| {
            if let Some(dispatcher) = this.upgrade() {
                dispatcher.dispatch_click(event);
            }
        });
    }

    fn remove(&self, overlay: &OverlayRef) {
        self.registry.remove(overlay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OverlayConfig;
    use crate::portal::Portal;
    use crate::testing::TestBed;
    use strata_core::DocumentExt;

    fn record(overlay: &OverlayRef, log: &Arc<Mutex<Vec<u64>>>, keydown: bool) {
        let id = overlay.id().as_u64();
        let log = Arc::clone(log);
        let channel = if keydown {
            overlay.keydown_events()
        } else {
            overlay.outside_pointer_events()
        };
        channel
            .subscribe(move |_| log.lock().unwrap().push(id))
            .unwrap();
    }

    fn open(bed: &TestBed) -> OverlayRef {
        let overlay = bed.ctx.create(OverlayConfig::new()).unwrap();
        overlay.attach(Portal::element(bed.content())).unwrap();
        overlay
    }

    #[test]
    fn test_listener_installed_while_registered() {
        let bed = TestBed::new();
        let keyboard = bed.ctx.keyboard_dispatcher();
        assert!(!keyboard.is_listening());

        let overlay = open(&bed);
        assert!(keyboard.is_listening());
        assert_eq!(keyboard.len(), 1);

        overlay.detach();
        assert!(!keyboard.is_listening());
        assert!(keyboard.is_empty());
    }

    #[test]
    fn test_keydown_goes_to_topmost_subscriber() {
        let bed = TestBed::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let bottom = open(&bed);
        let middle = open(&bed);
        let _top = open(&bed);
        record(&bottom, &log, true);
        record(&middle, &log, true);

        let body = bed.doc().body();
        bed.document.dispatch_event(&DomEvent::keydown(body, "Escape"));
        assert_eq!(*log.lock().unwrap(), vec![middle.id().as_u64()]);

        // Re-adding moves an overlay to the top
        bed.ctx.keyboard_dispatcher().add(&bottom);
        bed.document.dispatch_event(&DomEvent::keydown(body, "Escape"));
        assert_eq!(
            *log.lock().unwrap(),
            vec![middle.id().as_u64(), bottom.id().as_u64()]
        );
    }

    #[test]
    fn test_click_inside_pane_stops_propagation() {
        let bed = TestBed::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let lower = open(&bed);
        let upper = open(&bed);
        record(&lower, &log, false);
        record(&upper, &log, false);

        // Inside the upper pane: nobody hears about it
        let upper_pane = upper.overlay_element().unwrap();
        bed.document
            .dispatch_event(&DomEvent::click(upper_pane, 1.0, 1.0));
        assert!(log.lock().unwrap().is_empty());

        // Inside the lower pane: only the upper overlay is outside
        let lower_pane = lower.overlay_element().unwrap();
        bed.document
            .dispatch_event(&DomEvent::click(lower_pane, 1.0, 1.0));
        assert_eq!(*log.lock().unwrap(), vec![upper.id().as_u64()]);

        // On the body: both, topmost first
        log.lock().unwrap().clear();
        let body = bed.doc().body();
        let notified = bed
            .ctx
            .outside_pointer_dispatcher()
            .dispatch_click(&DomEvent::click(body, 0.0, 0.0));
        assert_eq!(notified, 2);
        assert_eq!(
            *log.lock().unwrap(),
            vec![upper.id().as_u64(), lower.id().as_u64()]
        );
    }

    #[test]
    fn test_dropped_dispatcher_removes_listener() {
        let bed = TestBed::new();
        let root = bed.doc().root();
        let dispatcher = KeyboardDispatcher::new(bed.document.clone());
        let overlay = bed.ctx.create(OverlayConfig::new()).unwrap();
        dispatcher.add(&overlay);
        assert_eq!(bed.doc().listener_count(root, event_types::KEYDOWN), 1);

        drop(dispatcher);
        assert_eq!(bed.doc().listener_count(root, event_types::KEYDOWN), 0);
    }
}
