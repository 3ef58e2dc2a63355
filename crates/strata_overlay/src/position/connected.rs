//! Flexible connected position strategy
//!
//! Anchors the pane to an origin (an element, a point, or a rectangle). The
//! strategy walks its preferred [`ConnectionPosition`]s in order and uses the
//! first one whose pane rectangle fits inside the viewport. When nothing
//! fits, the position that leaves the largest visible area wins.

use std::sync::{Arc, Mutex};

use strata_core::{EventChannel, NodeId, Platform, Rect, SharedDocument};

use crate::container::ContainerHost;
use crate::overlay_ref::{OverlayRef, WeakOverlayRef};
use crate::position::{PositionStrategy, ViewportRuler};

/// Class added to the host while the strategy is attached
pub const CONNECTED_BOUNDING_BOX_CLASS: &str = "cdk-overlay-connected-position-bounding-box";

/// What the overlay is anchored to
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConnectedOrigin {
    Element(NodeId),
    Point { x: f32, y: f32 },
    Rect(Rect),
}

impl From<NodeId> for ConnectedOrigin {
    fn from(node: NodeId) -> Self {
        ConnectedOrigin::Element(node)
    }
}

impl From<Rect> for ConnectedOrigin {
    fn from(rect: Rect) -> Self {
        ConnectedOrigin::Rect(rect)
    }
}

impl From<(f32, f32)> for ConnectedOrigin {
    fn from((x, y): (f32, f32)) -> Self {
        ConnectedOrigin::Point { x, y }
    }
}

/// Horizontal anchor point (start/end follow the layout direction)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HorizontalConnection {
    Start,
    Center,
    End,
}

/// Vertical anchor point
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerticalConnection {
    Top,
    Center,
    Bottom,
}

/// One preferred way of connecting the pane to the origin
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConnectionPosition {
    pub origin_x: HorizontalConnection,
    pub origin_y: VerticalConnection,
    pub overlay_x: HorizontalConnection,
    pub overlay_y: VerticalConnection,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl ConnectionPosition {
    pub fn new(
        origin: (HorizontalConnection, VerticalConnection),
        overlay: (HorizontalConnection, VerticalConnection),
    ) -> Self {
        Self {
            origin_x: origin.0,
            origin_y: origin.1,
            overlay_x: overlay.0,
            overlay_y: overlay.1,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }

    pub fn with_offset(mut self, x: f32, y: f32) -> Self {
        self.offset_x = x;
        self.offset_y = y;
        self
    }

    /// Pane below the origin, start edges aligned
    pub fn below() -> Self {
        Self::new(
            (HorizontalConnection::Start, VerticalConnection::Bottom),
            (HorizontalConnection::Start, VerticalConnection::Top),
        )
    }

    /// Pane above the origin, start edges aligned
    pub fn above() -> Self {
        Self::new(
            (HorizontalConnection::Start, VerticalConnection::Top),
            (HorizontalConnection::Start, VerticalConnection::Bottom),
        )
    }
}

/// Published when the applied position changes
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectedPositionChange {
    pub position: ConnectionPosition,
    /// Whether the pane fits inside the viewport at this position
    pub fits: bool,
}

struct ConnectedState {
    origin: ConnectedOrigin,
    positions: Vec<ConnectionPosition>,
    viewport_margin: f32,
    overlay: Option<WeakOverlayRef>,
    last_position: Option<ConnectionPosition>,
    is_disposed: bool,
}

/// Strategy anchoring the pane to an origin with fallback positions
pub struct FlexibleConnectedPositionStrategy {
    viewport_ruler: ViewportRuler,
    document: SharedDocument,
    platform: Platform,
    container: Arc<dyn ContainerHost>,
    state: Mutex<ConnectedState>,
    position_changes: EventChannel<ConnectedPositionChange>,
}

impl FlexibleConnectedPositionStrategy {
    pub fn new(
        origin: ConnectedOrigin,
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
            state: Mutex::new(ConnectedState {
                origin,
                positions: vec![ConnectionPosition::below(), ConnectionPosition::above()],
                viewport_margin: 0.0,
                overlay: None,
                last_position: None,
                is_disposed: false,
            }),
            position_changes: EventChannel::new(),
        }
    }

    /// Preferred positions, most preferred first
    pub fn with_positions(&self, positions: Vec<ConnectionPosition>) -> &Self {
        self.state.lock().unwrap().positions = positions;
        self
    }

    /// Minimum distance to keep from the viewport edges
    pub fn with_viewport_margin(&self, margin: f32) -> &Self {
        self.state.lock().unwrap().viewport_margin = margin;
        self
    }

    pub fn set_origin(&self, origin: impl Into<ConnectedOrigin>) -> &Self {
        self.state.lock().unwrap().origin = origin.into();
        self
    }

    /// Position used by the last `apply`
    pub fn last_position(&self) -> Option<ConnectionPosition> {
        self.state.lock().unwrap().last_position
    }

    /// Stream of position changes
    pub fn position_changes(&self) -> &EventChannel<ConnectedPositionChange> {
        &self.position_changes
    }

    fn origin_rect(&self, origin: ConnectedOrigin) -> Option<Rect> {
        match origin {
            ConnectedOrigin::Element(node) => self.document.lock().unwrap().bounds(node),
            ConnectedOrigin::Point { x, y } => Some(Rect::new(x, y, 0.0, 0.0)),
            ConnectedOrigin::Rect(rect) => Some(rect),
        }
    }
}

fn horizontal_point(rect: &Rect, anchor: HorizontalConnection, is_rtl: bool) -> f32 {
    match (anchor, is_rtl) {
        (HorizontalConnection::Center, _) => rect.x + rect.width / 2.0,
        (HorizontalConnection::Start, false) | (HorizontalConnection::End, true) => rect.x,
        (HorizontalConnection::End, false) | (HorizontalConnection::Start, true) => rect.right(),
    }
}

fn vertical_point(rect: &Rect, anchor: VerticalConnection) -> f32 {
    match anchor {
        VerticalConnection::Top => rect.y,
        VerticalConnection::Center => rect.y + rect.height / 2.0,
        VerticalConnection::Bottom => rect.bottom(),
    }
}

/// Pane rectangle for one connection position
fn overlay_rect(
    origin: &Rect,
    size: (f32, f32),
    position: &ConnectionPosition,
    is_rtl: bool,
) -> Rect {
    let pane = Rect::new(0.0, 0.0, size.0, size.1);
    let x = horizontal_point(origin, position.origin_x, is_rtl)
        - horizontal_point(&pane, position.overlay_x, is_rtl)
        + position.offset_x;
    let y = vertical_point(origin, position.origin_y) - vertical_point(&pane, position.overlay_y)
        + position.offset_y;
    Rect::new(x, y, size.0, size.1)
}

impl PositionStrategy for FlexibleConnectedPositionStrategy {
    fn attach(&self, overlay: &OverlayRef) {
        {
            let mut st = self.state.lock().unwrap();
            st.overlay = Some(overlay.downgrade());
            st.is_disposed = false;
        }
        if let Some(host) = overlay.host_element() {
            self.document
                .lock()
                .unwrap()
                .add_class(host, CONNECTED_BOUNDING_BOX_CLASS);
        }
    }

    fn apply(&self) {
        // Server rendering has no layout to measure
        if !self.platform.is_browser && !self.platform.is_test_environment {
            return;
        }

        let (overlay, origin, positions, margin, last) = {
            let st = self.state.lock().unwrap();
            if st.is_disposed {
                return;
            }
            let Some(overlay) = st.overlay.as_ref().and_then(WeakOverlayRef::upgrade) else {
                return;
            };
            (
                overlay,
                st.origin,
                st.positions.clone(),
                st.viewport_margin,
                st.last_position,
            )
        };
        if !overlay.has_attached() || positions.is_empty() {
            return;
        }
        let Some(pane) = overlay.overlay_element() else {
            return;
        };
        let Some(origin_rect) = self.origin_rect(origin) else {
            tracing::trace!("FlexibleConnectedPositionStrategy::apply - origin has no layout");
            return;
        };

        let container = self.container.container_element();
        let (pane_size, container_offset) = {
            let doc = self.document.lock().unwrap();
            let size = doc
                .bounds(pane)
                .map(|b| (b.width, b.height))
                .unwrap_or((0.0, 0.0));
            let offset = doc
                .bounds(container)
                .map(|b| (b.x, b.y))
                .unwrap_or((0.0, 0.0));
            (size, offset)
        };

        let viewport = self.viewport_ruler.viewport_rect();
        let bounds = Rect::new(
            viewport.x + margin,
            viewport.y + margin,
            (viewport.width - margin * 2.0).max(0.0),
            (viewport.height - margin * 2.0).max(0.0),
        );
        let is_rtl = overlay.direction().is_rtl();

        let candidates: Vec<(ConnectionPosition, Rect)> = positions
            .iter()
            .map(|p| (*p, overlay_rect(&origin_rect, pane_size, p, is_rtl)))
            .collect();

        let (position, rect, fits) = match candidates
            .iter()
            .find(|(_, rect)| bounds.contains_rect(rect))
        {
            Some((position, rect)) => (*position, *rect, true),
            None => {
                let mut best = candidates[0];
                let mut best_area = bounds.intersection_area(&best.1);
                for candidate in &candidates[1..] {
                    let area = bounds.intersection_area(&candidate.1);
                    if area > best_area {
                        best = *candidate;
                        best_area = area;
                    }
                }
                (best.0, best.1, false)
            }
        };

        {
            let mut doc = self.document.lock().unwrap();
            doc.set_style(pane, "position", "absolute");
            doc.set_style(pane, "left", &format!("{}px", rect.x - container_offset.0));
            doc.set_style(pane, "top", &format!("{}px", rect.y - container_offset.1));
        }

        self.state.lock().unwrap().last_position = Some(position);
        if last != Some(position) {
            tracing::trace!(
                "FlexibleConnectedPositionStrategy::apply - overlay {:?} moved to {:?} (fits={})",
                overlay.id(),
                position,
                fits
            );
            self.position_changes
                .next(&ConnectedPositionChange { position, fits });
        }
    }

    fn detach(&self) {
        self.state.lock().unwrap().last_position = None;
    }

    fn dispose(&self) {
        let overlay = {
            let mut st = self.state.lock().unwrap();
            if st.is_disposed {
                return;
            }
            st.is_disposed = true;
            st.last_position = None;
            st.overlay.take().and_then(|weak| weak.upgrade())
        };

        if let Some(overlay) = overlay {
            let (pane, host) = (overlay.overlay_element(), overlay.host_element());
            let mut doc = self.document.lock().unwrap();
            if let Some(pane) = pane {
                for property in ["position", "left", "top"] {
                    doc.set_style(pane, property, "");
                }
            }
            if let Some(host) = host {
                doc.remove_class(host, CONNECTED_BOUNDING_BOX_CLASS);
            }
        }
    }
}
