//! Overlay container
//!
//! Every overlay host renders under one root node appended to the body. The
//! node is created lazily on first use. Roots left behind by a different
//! rendering context (a server render hydrated in a test, for instance) are
//! removed when a new root is created.

use std::sync::Mutex;

use strata_core::{NodeId, Platform, SharedDocument};

/// Class carried by the container root
pub const CONTAINER_CLASS: &str = "cdk-overlay-container";

/// Attribute holding the platform marker of the container root
pub const PLATFORM_ATTRIBUTE: &str = "platform";

/// Anything that can hand out the overlay root node
pub trait ContainerHost: Send + Sync {
    /// Root node under which overlay hosts render, created on first call
    fn container_element(&self) -> NodeId;
}

/// Owner of the overlay root node
pub struct OverlayContainer {
    document: SharedDocument,
    platform: Platform,
    element: Mutex<Option<NodeId>>,
}

impl OverlayContainer {
    pub fn new(document: SharedDocument, platform: Platform) -> Self {
        Self {
            document,
            platform,
            element: Mutex::new(None),
        }
    }

    /// Root node if it has been created
    pub fn element(&self) -> Option<NodeId> {
        *self.element.lock().unwrap()
    }

    pub fn document(&self) -> &SharedDocument {
        &self.document
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Root node, reporting whether this call created it
    pub(crate) fn get_or_create(&self) -> (NodeId, bool) {
        let mut element = self.element.lock().unwrap();
        if let Some(node) = *element {
            if self.document.lock().unwrap().exists(node) {
                return (node, false);
            }
        }
        let node = self.create_container();
        *element = Some(node);
        (node, true)
    }

    fn create_container(&self) -> NodeId {
        let marker = self.platform.marker();
        let mut doc = self.document.lock().unwrap();

        if self.platform.is_browser || self.platform.is_test_environment {
            let stale: Vec<NodeId> = doc
                .query_by_class(CONTAINER_CLASS)
                .into_iter()
                .filter(|&node| {
                    doc.attribute(node, PLATFORM_ATTRIBUTE)
                        .is_some_and(|value| Some(value) != marker.map(|m| m.as_str()))
                })
                .collect();
            for node in stale {
                tracing::debug!("OverlayContainer: removing stale container {:?}", node);
                doc.destroy(node);
            }
        }

        let node = doc.create_element("div");
        doc.add_class(node, CONTAINER_CLASS);
        if let Some(marker) = marker {
            doc.set_attribute(node, PLATFORM_ATTRIBUTE, marker.as_str());
        }
        let body = doc.body();
        if let Err(err) = doc.append_child(body, node) {
            tracing::warn!("OverlayContainer: could not insert {:?}: {}", node, err);
        }

        tracing::debug!(
            "OverlayContainer: created {:?} (marker={:?})",
            node,
            marker.map(|m| m.as_str())
        );
        node
    }
}

impl ContainerHost for OverlayContainer {
    fn container_element(&self) -> NodeId {
        self.get_or_create().0
    }
}

impl Drop for OverlayContainer {
    fn drop(&mut self) {
        let Some(node) = self.element.get_mut().ok().and_then(|e| e.take()) else {
            return;
        };
        if let Ok(mut doc) = self.document.lock() {
            if doc.remove(node) {
                tracing::debug!("OverlayContainer: detached {:?}", node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::Document;

    fn stale_root(document: &SharedDocument, marker: Option<&str>) -> NodeId {
        let mut doc = document.lock().unwrap();
        let node = doc.create_element("div");
        doc.add_class(node, CONTAINER_CLASS);
        if let Some(marker) = marker {
            doc.set_attribute(node, PLATFORM_ATTRIBUTE, marker);
        }
        let body = doc.body();
        doc.append_child(body, node).unwrap();
        node
    }

    #[test]
    fn test_container_is_singleton() {
        let document = Document::new().into_shared();
        let container = OverlayContainer::new(document.clone(), Platform::test());

        let first = container.container_element();
        let second = container.container_element();
        assert_eq!(first, second);

        let doc = document.lock().unwrap();
        assert_eq!(doc.query_by_class(CONTAINER_CLASS), vec![first]);
        assert_eq!(doc.attribute(first, PLATFORM_ATTRIBUTE), Some("test"));
        assert_eq!(doc.parent(first), Some(doc.body()));
    }

    #[test]
    fn test_removes_containers_with_other_markers() {
        let document = Document::new().into_shared();
        let from_server = stale_root(&document, Some("server"));
        let from_test = stale_root(&document, Some("test"));
        let unmarked = stale_root(&document, None);

        let container = OverlayContainer::new(document.clone(), Platform::test());
        let node = container.container_element();

        let doc = document.lock().unwrap();
        assert!(!doc.exists(from_server));
        assert!(doc.exists(from_test));
        assert!(doc.exists(unmarked));
        assert!(doc.is_connected(node));
    }

    #[test]
    fn test_server_keeps_existing_containers() {
        let document = Document::new().into_shared();
        let from_test = stale_root(&document, Some("test"));

        let container = OverlayContainer::new(document.clone(), Platform::server());
        let node = container.container_element();

        let doc = document.lock().unwrap();
        assert!(doc.exists(from_test));
        assert_eq!(doc.attribute(node, PLATFORM_ATTRIBUTE), Some("server"));
    }

    #[test]
    fn test_browser_container_has_no_marker() {
        let document = Document::new().into_shared();
        let from_server = stale_root(&document, Some("server"));
        let container = OverlayContainer::new(document.clone(), Platform::browser());
        let node = container.container_element();

        let doc = document.lock().unwrap();
        assert_eq!(doc.attribute(node, PLATFORM_ATTRIBUTE), None);
        assert!(!doc.exists(from_server));
    }

    #[test]
    fn test_drop_detaches_root() {
        let document = Document::new().into_shared();
        let container = OverlayContainer::new(document.clone(), Platform::test());
        let node = container.container_element();
        drop(container);

        let doc = document.lock().unwrap();
        assert!(doc.exists(node));
        assert_eq!(doc.parent(node), None);
    }
}
