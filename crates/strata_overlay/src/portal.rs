//! Content attachment
//!
//! A [`Portal`] is a piece of content to render somewhere else in the
//! document. A [`PortalOutlet`] is the place it renders into. Overlays render
//! their content into the pane through a [`DomPortalOutlet`].

use std::fmt;
use std::sync::Mutex;

use smallvec::SmallVec;
use strata_core::{Document, NodeId, Result, SharedDocument, StrataError};

/// Builds portal content directly in the document
pub type PortalBuilder = Box<dyn FnOnce(&mut Document) -> Vec<NodeId> + Send>;

/// Content to attach to an outlet
pub enum Portal {
    /// An existing node, moved into the outlet and restored on detach
    Element(NodeId),
    /// Nodes built on attach and destroyed on detach
    Builder(PortalBuilder),
}

impl Portal {
    pub fn element(node: NodeId) -> Self {
        Portal::Element(node)
    }

    pub fn build<F>(builder: F) -> Self
    where
        F: FnOnce(&mut Document) -> Vec<NodeId> + Send + 'static,
    {
        Portal::Builder(Box::new(builder))
    }
}

impl fmt::Debug for Portal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Portal::Element(node) => f.debug_tuple("Element").field(node).finish(),
            Portal::Builder(_) => f.write_str("Builder(..)"),
        }
    }
}

/// Nodes rendered by an attached portal
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PortalHandle {
    nodes: SmallVec<[NodeId; 4]>,
}

impl PortalHandle {
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// First rendered node, if any
    pub fn root(&self) -> Option<NodeId> {
        self.nodes.first().copied()
    }
}

/// A place portal content renders into
pub trait PortalOutlet: Send + Sync {
    /// Render `portal`; fails if the outlet is disposed or already holds content
    fn attach(&self, portal: Portal) -> Result<PortalHandle>;

    /// Release the current content, returning what was rendered
    fn detach(&self) -> Option<PortalHandle>;

    /// Release content and refuse further attachments
    fn dispose(&self);

    fn has_attached(&self) -> bool;
}

enum Attached {
    Moved {
        node: NodeId,
        origin: Option<(NodeId, Option<NodeId>)>,
    },
    Built {
        nodes: SmallVec<[NodeId; 4]>,
    },
}

impl Attached {
    fn handle(&self) -> PortalHandle {
        match self {
            Attached::Moved { node, .. } => PortalHandle {
                nodes: SmallVec::from_slice(&[*node]),
            },
            Attached::Built { nodes } => PortalHandle {
                nodes: nodes.clone(),
            },
        }
    }
}

#[derive(Default)]
struct OutletState {
    attached: Option<Attached>,
    is_disposed: bool,
}

/// Outlet rendering into an element of the shared document
pub struct DomPortalOutlet {
    document: SharedDocument,
    outlet_element: NodeId,
    state: Mutex<OutletState>,
}

impl DomPortalOutlet {
    pub fn new(document: SharedDocument, outlet_element: NodeId) -> Self {
        Self {
            document,
            outlet_element,
            state: Mutex::new(OutletState::default()),
        }
    }

    pub fn outlet_element(&self) -> NodeId {
        self.outlet_element
    }
}

impl PortalOutlet for DomPortalOutlet {
    fn attach(&self, portal: Portal) -> Result<PortalHandle> {
        let mut st = self.state.lock().unwrap();
        if st.is_disposed {
            return Err(StrataError::OutletDisposed);
        }
        if st.attached.is_some() {
            return Err(StrataError::AlreadyAttached);
        }

        let mut doc = self.document.lock().unwrap();
        if !doc.exists(self.outlet_element) {
            return Err(StrataError::NodeNotFound(self.outlet_element));
        }

        let attached = match portal {
            Portal::Element(node) => {
                if !doc.exists(node) {
                    return Err(StrataError::NodeNotFound(node));
                }
                let origin = doc.parent(node).map(|parent| (parent, doc.next_sibling(node)));
                doc.append_child(self.outlet_element, node)?;
                Attached::Moved { node, origin }
            }
            Portal::Builder(build) => {
                let nodes: SmallVec<[NodeId; 4]> = build(&mut *doc).into_iter().collect();
                let invalid = nodes
                    .iter()
                    .find_map(|&node| doc.check_insertable(self.outlet_element, node).err());
                if let Some(err) = invalid {
                    // Built nodes belong to the portal even when the attach fails
                    for &node in &nodes {
                        if doc.check_insertable(self.outlet_element, node).is_ok() {
                            doc.destroy(node);
                        }
                    }
                    return Err(err);
                }
                for &node in &nodes {
                    doc.append_child(self.outlet_element, node)?;
                }
                Attached::Built { nodes }
            }
        };

        let handle = attached.handle();
        st.attached = Some(attached);
        Ok(handle)
    }

    fn detach(&self) -> Option<PortalHandle> {
        let attached = self.state.lock().unwrap().attached.take()?;
        let handle = attached.handle();
        let mut doc = self.document.lock().unwrap();

        match attached {
            Attached::Moved { node, origin } => {
                let restored = match origin {
                    Some((parent, Some(sibling))) if doc.parent(sibling) == Some(parent) => {
                        doc.insert_before(parent, node, sibling).is_ok()
                    }
                    Some((parent, _)) => doc.append_child(parent, node).is_ok(),
                    None => false,
                };
                if !restored {
                    doc.remove(node);
                }
            }
            Attached::Built { nodes } => {
                for node in nodes {
                    doc.destroy(node);
                }
            }
        }
        Some(handle)
    }

    fn dispose(&self) {
        self.detach();
        self.state.lock().unwrap().is_disposed = true;
    }

    fn has_attached(&self) -> bool {
        self.state.lock().unwrap().attached.is_some()
    }
}
