//! Arena-backed document model
//!
//! Overlays are rendered into a lightweight element tree rather than a real
//! browser DOM. The tree tracks exactly what the overlay engine needs:
//!
//! - **Structure**: parent/child links and sibling order (stacking order)
//! - **Marker state**: classes, attributes and inline styles
//! - **Listeners**: string-keyed event listeners with bubbling dispatch
//! - **Environment**: viewport metrics, element bounds and fullscreen state
//!
//! Node handles are generational slotmap keys, so a handle to a destroyed
//! node never aliases a node created later.
//!
//! # Example
//!
//! ```rust
//! use strata_core::dom::Document;
//!
//! let mut doc = Document::new();
//! let body = doc.body();
//! let div = doc.create_element("div");
//! doc.append_child(body, div).unwrap();
//! doc.add_class(div, "menu");
//!
//! assert_eq!(doc.parent(div), Some(body));
//! assert!(doc.has_class(div, "menu"));
//! ```

use std::sync::{Arc, Mutex};

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;

use crate::error::{Result, StrataError};
use crate::events::DomEvent;

new_key_type! {
    /// Unique identifier for a document node
    pub struct NodeId;
    /// Unique identifier for a registered event listener
    pub struct ListenerId;
}

/// Callback invoked when an event reaches a node
pub type EventListener = Arc<dyn Fn(&DomEvent) + Send + Sync>;

/// Document shared between the container, strategies and overlay references
pub type SharedDocument = Arc<Mutex<Document>>;

// =============================================================================
// Capabilities
// =============================================================================

/// Vendor variant of the fullscreen API exposed by the host document
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FullscreenApi {
    Standard,
    Webkit,
    Moz,
    Ms,
}

impl FullscreenApi {
    /// Name of the event fired when the fullscreen element changes
    pub fn change_event(&self) -> &'static str {
        match self {
            FullscreenApi::Standard => "fullscreenchange",
            FullscreenApi::Webkit => "webkitfullscreenchange",
            FullscreenApi::Moz => "mozfullscreenchange",
            FullscreenApi::Ms => "MSFullscreenChange",
        }
    }
}

/// Optional features of the host document
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DocumentCapabilities {
    /// Fullscreen API variant, `None` when fullscreen is unsupported
    pub fullscreen_api: Option<FullscreenApi>,
}

// =============================================================================
// Geometry
// =============================================================================

/// Axis-aligned rectangle in viewport coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Whether `other` lies entirely inside this rectangle
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Area of the overlap between two rectangles
    pub fn intersection_area(&self, other: &Rect) -> f32 {
        let w = (self.right().min(other.right()) - self.x.max(other.x)).max(0.0);
        let h = (self.bottom().min(other.bottom()) - self.y.max(other.y)).max(0.0);
        w * h
    }
}

/// Viewport size and scroll offset (logical pixels)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub scroll_x: f32,
    pub scroll_y: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1024.0,
            height: 768.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }
}

// =============================================================================
// Document
// =============================================================================

/// Internal element storage
struct Element {
    tag: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    classes: IndexSet<String>,
    attributes: FxHashMap<String, String>,
    styles: IndexMap<String, String>,
    bounds: Option<Rect>,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            parent: None,
            children: Vec::new(),
            classes: IndexSet::new(),
            attributes: FxHashMap::default(),
            styles: IndexMap::new(),
            bounds: None,
        }
    }
}

/// Internal listener storage
struct ListenerEntry {
    node: NodeId,
    event_type: String,
    callback: EventListener,
}

/// An element tree with a document node and a body
pub struct Document {
    nodes: SlotMap<NodeId, Element>,
    listeners: SlotMap<ListenerId, ListenerEntry>,
    root: NodeId,
    body: NodeId,
    fullscreen_element: Option<NodeId>,
    capabilities: DocumentCapabilities,
    viewport: Viewport,
}

impl Document {
    /// Create a document with a body and no optional capabilities
    pub fn new() -> Self {
        Self::with_capabilities(DocumentCapabilities::default())
    }

    /// Create a document advertising the given capabilities
    pub fn with_capabilities(capabilities: DocumentCapabilities) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Element::new("#document"));
        let body = nodes.insert(Element::new("body"));
        nodes[body].parent = Some(root);
        nodes[root].children.push(body);

        Self {
            nodes,
            listeners: SlotMap::with_key(),
            root,
            body,
            fullscreen_element: None,
            capabilities,
            viewport: Viewport::default(),
        }
    }

    /// Wrap the document for shared ownership
    pub fn into_shared(self) -> SharedDocument {
        Arc::new(Mutex::new(self))
    }

    /// The document node (event target for document-level listeners)
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn capabilities(&self) -> &DocumentCapabilities {
        &self.capabilities
    }

    // =========================================================================
    // Structure
    // =========================================================================

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.nodes.insert(Element::new(tag))
    }

    /// Whether the handle refers to a live node
    pub fn exists(&self, node: NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node).map(|e| e.tag.as_str())
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node).and_then(|e| e.parent)
    }

    /// Children in document order (empty for unknown nodes)
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node)
            .map(|e| e.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn child_count(&self, node: NodeId) -> usize {
        self.children(node).len()
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let siblings = self.children(parent);
        let index = siblings.iter().position(|&n| n == node)?;
        siblings.get(index + 1).copied()
    }

    /// Append `child` as the last child of `parent`, moving it if already parented
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check_insertable(parent, child)?;
        self.unlink(child);
        self.nodes[parent].children.push(child);
        self.nodes[child].parent = Some(parent);
        Ok(())
    }

    /// Insert `child` into `parent` immediately before `reference`
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) -> Result<()> {
        self.check_insertable(parent, child)?;
        match self.parent(reference) {
            Some(p) if p == parent => {}
            Some(_) => return Err(StrataError::NodeNotFound(reference)),
            None => return Err(StrataError::MissingParent(reference)),
        }
        if child == reference {
            return Ok(());
        }
        self.unlink(child);
        let index = self.nodes[parent]
            .children
            .iter()
            .position(|&n| n == reference)
            .ok_or(StrataError::NodeNotFound(reference))?;
        self.nodes[parent].children.insert(index, child);
        self.nodes[child].parent = Some(parent);
        Ok(())
    }

    /// Detach a node from its parent, keeping it alive
    ///
    /// Returns `true` if the node had a parent.
    pub fn remove(&mut self, node: NodeId) -> bool {
        self.unlink(node)
    }

    /// Detach a node and free it together with its subtree and listeners
    pub fn destroy(&mut self, node: NodeId) {
        if node == self.root || node == self.body || !self.exists(node) {
            return;
        }
        self.unlink(node);

        let mut stack: SmallVec<[NodeId; 8]> = SmallVec::new();
        stack.push(node);
        while let Some(current) = stack.pop() {
            if let Some(element) = self.nodes.remove(current) {
                stack.extend(element.children);
            }
            if self.fullscreen_element == Some(current) {
                self.fullscreen_element = None;
            }
            self.listeners.retain(|_, l| l.node != current);
        }
    }

    /// Whether `node` is `ancestor` or one of its descendants
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    /// Whether the node is reachable from the document node
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.exists(node) && self.contains(self.root, node)
    }

    /// Connected elements carrying `class`, in document order
    pub fn query_by_class(&self, class: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            if self.has_class(node, class) {
                found.push(node);
            }
            stack.extend(self.children(node).iter().rev().copied());
        }
        found
    }

    /// Whether `child` may be appended under `parent` without breaking the tree
    pub fn check_insertable(&self, parent: NodeId, child: NodeId) -> Result<()> {
        if !self.exists(parent) {
            return Err(StrataError::NodeNotFound(parent));
        }
        if !self.exists(child) || child == self.root || self.contains(child, parent) {
            return Err(StrataError::NodeNotFound(child));
        }
        Ok(())
    }

    fn unlink(&mut self, node: NodeId) -> bool {
        let Some(parent) = self.parent(node) else {
            return false;
        };
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.retain(|&n| n != node);
        }
        self.nodes[node].parent = None;
        true
    }

    // =========================================================================
    // Classes, attributes, styles
    // =========================================================================

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        if let Some(e) = self.nodes.get_mut(node) {
            e.classes.insert(class.to_string());
        }
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) {
        if let Some(e) = self.nodes.get_mut(node) {
            e.classes.shift_remove(class);
        }
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.nodes
            .get(node)
            .map(|e| e.classes.contains(class))
            .unwrap_or(false)
    }

    pub fn classes(&self, node: NodeId) -> Vec<String> {
        self.nodes
            .get(node)
            .map(|e| e.classes.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(e) = self.nodes.get_mut(node) {
            e.attributes.insert(name.to_string(), value.to_string());
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes
            .get(node)
            .and_then(|e| e.attributes.get(name))
            .map(String::as_str)
    }

    /// Set an inline style property; an empty value clears it
    pub fn set_style(&mut self, node: NodeId, property: &str, value: &str) {
        if let Some(e) = self.nodes.get_mut(node) {
            if value.is_empty() {
                e.styles.shift_remove(property);
            } else {
                e.styles.insert(property.to_string(), value.to_string());
            }
        }
    }

    /// Inline style value, empty when unset
    pub fn style(&self, node: NodeId, property: &str) -> &str {
        self.nodes
            .get(node)
            .and_then(|e| e.styles.get(property))
            .map(String::as_str)
            .unwrap_or("")
    }

    // =========================================================================
    // Geometry & environment
    // =========================================================================

    /// Record the laid-out bounds of an element (set by the host renderer)
    pub fn set_bounds(&mut self, node: NodeId, bounds: Rect) {
        if let Some(e) = self.nodes.get_mut(node) {
            e.bounds = Some(bounds);
        }
    }

    pub fn bounds(&self, node: NodeId) -> Option<Rect> {
        self.nodes.get(node).and_then(|e| e.bounds)
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn fullscreen_element(&self) -> Option<NodeId> {
        self.fullscreen_element
    }

    /// Set the fullscreen element without firing change events
    pub fn set_fullscreen_element(&mut self, node: Option<NodeId>) {
        self.fullscreen_element = node.filter(|&n| self.exists(n));
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    pub fn add_event_listener<F>(&mut self, node: NodeId, event_type: &str, callback: F) -> ListenerId
    where
        F: Fn(&DomEvent) + Send + Sync + 'static,
    {
        self.listeners.insert(ListenerEntry {
            node,
            event_type: event_type.to_string(),
            callback: Arc::new(callback),
        })
    }

    /// Remove a listener; returns `false` if it was already gone
    pub fn remove_event_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id).is_some()
    }

    pub fn listener_count(&self, node: NodeId, event_type: &str) -> usize {
        self.listeners
            .values()
            .filter(|l| l.node == node && l.event_type == event_type)
            .count()
    }

    /// Listeners that should receive `event`, target first then ancestors
    fn listeners_for(&self, event: &DomEvent) -> Vec<EventListener> {
        let mut path: SmallVec<[NodeId; 16]> = SmallVec::new();
        let mut current = Some(event.target);
        while let Some(node) = current {
            path.push(node);
            current = self.parent(node);
        }

        let mut out = Vec::new();
        for node in path {
            out.extend(
                self.listeners
                    .values()
                    .filter(|l| l.node == node && l.event_type == event.event_type)
                    .map(|l| Arc::clone(&l.callback)),
            );
        }
        out
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// DocumentExt - operations that invoke listeners
// =============================================================================

/// Operations on a shared document that may run listener callbacks
///
/// Listeners are collected under the lock and invoked after it is released,
/// so callbacks are free to mutate the document.
pub trait DocumentExt {
    /// Dispatch an event to its target and bubble it to the ancestors
    ///
    /// Returns the number of listeners invoked.
    fn dispatch_event(&self, event: &DomEvent) -> usize;

    /// Make `node` the fullscreen element and fire the change event
    fn enter_fullscreen(&self, node: NodeId);

    /// Leave fullscreen and fire the change event
    fn exit_fullscreen(&self);
}

impl DocumentExt for SharedDocument {
    fn dispatch_event(&self, event: &DomEvent) -> usize {
        let listeners = self.lock().unwrap().listeners_for(event);
        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }

    fn enter_fullscreen(&self, node: NodeId) {
        set_fullscreen(self, Some(node));
    }

    fn exit_fullscreen(&self) {
        set_fullscreen(self, None);
    }
}

fn set_fullscreen(doc: &SharedDocument, node: Option<NodeId>) {
    let (root, api) = {
        let mut d = doc.lock().unwrap();
        d.set_fullscreen_element(node);
        (d.root(), d.capabilities().fullscreen_api)
    };
    if let Some(api) = api {
        doc.dispatch_event(&DomEvent::new(api.change_event(), root));
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_append_moves_node() {
        let mut doc = Document::new();
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        let child = doc.create_element("span");
        doc.append_child(doc.body(), a).unwrap();
        doc.append_child(doc.body(), b).unwrap();

        doc.append_child(a, child).unwrap();
        assert_eq!(doc.children(a), &[child]);

        doc.append_child(b, child).unwrap();
        assert!(doc.children(a).is_empty());
        assert_eq!(doc.parent(child), Some(b));
    }

    #[test]
    fn test_insert_before_and_siblings() {
        let mut doc = Document::new();
        let body = doc.body();
        let first = doc.create_element("div");
        let second = doc.create_element("div");
        doc.append_child(body, second).unwrap();
        doc.insert_before(body, first, second).unwrap();

        assert_eq!(doc.children(body), &[first, second]);
        assert_eq!(doc.next_sibling(first), Some(second));
        assert_eq!(doc.next_sibling(second), None);

        let stray = doc.create_element("div");
        let orphan = doc.create_element("div");
        assert_eq!(
            doc.insert_before(body, stray, orphan),
            Err(StrataError::MissingParent(orphan))
        );
    }

    #[test]
    fn test_cannot_append_ancestor() {
        let mut doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        doc.append_child(outer, inner).unwrap();
        assert!(doc.append_child(inner, outer).is_err());
    }

    #[test]
    fn test_destroy_frees_subtree_and_listeners() {
        let mut doc = Document::new();
        let parent = doc.create_element("div");
        let child = doc.create_element("div");
        doc.append_child(doc.body(), parent).unwrap();
        doc.append_child(parent, child).unwrap();
        doc.add_event_listener(child, "click", |_| {});

        doc.destroy(parent);
        assert!(!doc.exists(parent));
        assert!(!doc.exists(child));
        assert_eq!(doc.listener_count(child, "click"), 0);
        assert!(doc.children(doc.body()).is_empty());

        // Stale handles never alias new nodes
        let fresh = doc.create_element("div");
        assert_ne!(fresh, parent);
        assert_ne!(fresh, child);
    }

    #[test]
    fn test_styles_and_classes() {
        let mut doc = Document::new();
        let node = doc.create_element("div");
        doc.set_style(node, "margin-top", "10px");
        assert_eq!(doc.style(node, "margin-top"), "10px");
        doc.set_style(node, "margin-top", "");
        assert_eq!(doc.style(node, "margin-top"), "");

        doc.add_class(node, "a");
        doc.add_class(node, "b");
        doc.remove_class(node, "a");
        assert_eq!(doc.classes(node), vec!["b".to_string()]);
    }

    #[test]
    fn test_query_by_class_only_connected() {
        let mut doc = Document::new();
        let connected = doc.create_element("div");
        let detached = doc.create_element("div");
        doc.add_class(connected, "target");
        doc.add_class(detached, "target");
        doc.append_child(doc.body(), connected).unwrap();

        assert_eq!(doc.query_by_class("target"), vec![connected]);
    }

    #[test]
    fn test_dispatch_bubbles_and_allows_mutation() {
        let doc = Document::new().into_shared();
        let (body, node) = {
            let mut d = doc.lock().unwrap();
            let node = d.create_element("div");
            let body = d.body();
            d.append_child(body, node).unwrap();
            (body, node)
        };

        let hits = Arc::new(AtomicUsize::new(0));
        {
            let hits = Arc::clone(&hits);
            let doc_for_listener = Arc::clone(&doc);
            doc.lock().unwrap().add_event_listener(body, "click", move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
                // Re-entrant mutation must not deadlock
                doc_for_listener.lock().unwrap().add_class(body, "clicked");
            });
        }

        let invoked = doc.dispatch_event(&DomEvent::click(node, 0.0, 0.0));
        assert_eq!(invoked, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(doc.lock().unwrap().has_class(body, "clicked"));
    }

    #[test]
    fn test_fullscreen_change_requires_api() {
        let plain = Document::new().into_shared();
        let fired = Arc::new(AtomicUsize::new(0));
        {
            let fired = Arc::clone(&fired);
            let mut d = plain.lock().unwrap();
            let root = d.root();
            d.add_event_listener(root, "fullscreenchange", move |_| {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }
        let body = plain.lock().unwrap().body();
        plain.enter_fullscreen(body);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(plain.lock().unwrap().fullscreen_element(), Some(body));

        let webkit = Document::with_capabilities(DocumentCapabilities {
            fullscreen_api: Some(FullscreenApi::Webkit),
        })
        .into_shared();
        {
            let fired = Arc::clone(&fired);
            let mut d = webkit.lock().unwrap();
            let root = d.root();
            d.add_event_listener(root, "webkitfullscreenchange", move |_| {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }
        webkit.exit_fullscreen();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rect_helpers() {
        let viewport = Rect::new(0.0, 0.0, 100.0, 100.0);
        let inside = Rect::new(10.0, 10.0, 20.0, 20.0);
        let spilling = Rect::new(90.0, 90.0, 20.0, 20.0);
        assert!(viewport.contains_rect(&inside));
        assert!(!viewport.contains_rect(&spilling));
        assert_eq!(viewport.intersection_area(&spilling), 100.0);
    }
}
