//! Shared fixtures for unit tests

use std::sync::{Arc, MutexGuard};

use strata_core::{Document, NodeId, Platform, QueueScheduler, SharedDocument};

use crate::context::{OverlayContext, OverlayContextConfig};

/// A document, a manual scheduler and a context wired together
pub(crate) struct TestBed {
    pub document: SharedDocument,
    pub scheduler: Arc<QueueScheduler>,
    pub ctx: OverlayContext,
}

impl TestBed {
    pub fn new() -> Self {
        Self::with_config(OverlayContextConfig::new().platform(Platform::test()))
    }

    pub fn with_config(config: OverlayContextConfig) -> Self {
        Self::with_scheduler(config, QueueScheduler::new().shared())
    }

    pub fn with_scheduler(config: OverlayContextConfig, scheduler: Arc<QueueScheduler>) -> Self {
        let document = Document::new().into_shared();
        let ctx = OverlayContext::new(document.clone(), scheduler.clone(), config);
        Self {
            document,
            scheduler,
            ctx,
        }
    }

    pub fn doc(&self) -> MutexGuard<'_, Document> {
        self.document.lock().unwrap()
    }

    /// A fresh element living in the body, ready to be portaled
    pub fn content(&self) -> NodeId {
        let mut doc = self.doc();
        let node = doc.create_element("section");
        let body = doc.body();
        doc.append_child(body, node).unwrap();
        node
    }
}
