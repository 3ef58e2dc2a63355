//! Fullscreen-aware overlay container
//!
//! Only the fullscreen element and its descendants are painted while the
//! document is in fullscreen mode, so the overlay root follows the fullscreen
//! element around and returns to the body when fullscreen ends.

use std::sync::Mutex;

use strata_core::{ListenerId, NodeId, Platform, SharedDocument};

use crate::container::{ContainerHost, OverlayContainer};

/// Overlay container that re-parents its root into the fullscreen element
pub struct FullscreenOverlayContainer {
    base: OverlayContainer,
    listener: Mutex<Option<ListenerId>>,
}

impl FullscreenOverlayContainer {
    pub fn new(document: SharedDocument, platform: Platform) -> Self {
        Self {
            base: OverlayContainer::new(document, platform),
            listener: Mutex::new(None),
        }
    }

    /// Current fullscreen element of the document
    pub fn fullscreen_element(&self) -> Option<NodeId> {
        self.base.document().lock().unwrap().fullscreen_element()
    }

    pub fn document(&self) -> &SharedDocument {
        self.base.document()
    }

    fn add_fullscreen_listener(&self, container: NodeId) {
        let document = self.base.document();
        let mut listener = self.listener.lock().unwrap();
        let mut doc = document.lock().unwrap();

        let Some(api) = doc.capabilities().fullscreen_api else {
            return;
        };
        if let Some(previous) = listener.take() {
            doc.remove_event_listener(previous);
        }

        let shared = document.clone();
        let root = doc.root();
        let id = doc.add_event_listener(root, api.change_event(), move |_| {
            let mut doc = shared.lock().unwrap();
            reparent(&mut doc, container);
        });
        *listener = Some(id);
    }
}

/// Move the container under the fullscreen element, or back to the body
fn reparent(doc: &mut strata_core::Document, container: NodeId) {
    if !doc.exists(container) {
        return;
    }
    let parent = doc.fullscreen_element().unwrap_or_else(|| doc.body());
    if doc.parent(container) == Some(parent) {
        return;
    }
    match doc.append_child(parent, container) {
        Ok(()) => tracing::debug!(
            "FullscreenOverlayContainer: moved {:?} under {:?}",
            container,
            parent
        ),
        Err(err) => tracing::warn!(
            "FullscreenOverlayContainer: could not move {:?}: {}",
            container,
            err
        ),
    }
}

impl ContainerHost for FullscreenOverlayContainer {
    fn container_element(&self) -> NodeId {
        let (node, created) = self.base.get_or_create();
        if created {
            reparent(&mut self.base.document().lock().unwrap(), node);
            self.add_fullscreen_listener(node);
        }
        node
    }
}

impl Drop for FullscreenOverlayContainer {
    fn drop(&mut self) {
        let Some(id) = self.listener.get_mut().ok().and_then(|l| l.take()) else {
            return;
        };
        if let Ok(mut doc) = self.base.document().lock() {
            doc.remove_event_listener(id);
        }
    }
}
