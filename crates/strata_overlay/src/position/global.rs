//! Global position strategy
//!
//! Places the pane at fixed viewport-relative offsets. The host wrapper is a
//! flex container: alignment keywords on the host choose the edge, and the
//! offsets are written as margins on the pane. Avoiding `transform` keeps the
//! pane on whole pixels.

use std::sync::Mutex;

use strata_core::NodeId;

use crate::config::{CssLength, OverlaySizeConfig};
use crate::overlay_ref::{OverlayRef, WeakOverlayRef};
use crate::position::PositionStrategy;

/// Class added to the host while the strategy is attached
pub const GLOBAL_WRAPPER_CLASS: &str = "cdk-global-overlay-wrapper";

/// Flex alignment of the pane inside the host wrapper
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Alignment {
    #[default]
    Unset,
    Start,
    Center,
    End,
}

impl Alignment {
    pub fn as_css(&self) -> &'static str {
        match self {
            Alignment::Unset => "",
            Alignment::Start => "flex-start",
            Alignment::Center => "center",
            Alignment::End => "flex-end",
        }
    }

    /// Swap start and end
    fn mirrored(self) -> Self {
        match self {
            Alignment::Start => Alignment::End,
            Alignment::End => Alignment::Start,
            other => other,
        }
    }
}

#[derive(Default)]
struct GlobalState {
    overlay: Option<WeakOverlayRef>,
    top_offset: String,
    bottom_offset: String,
    left_offset: String,
    right_offset: String,
    align_items: Alignment,
    justify_content: Alignment,
    width: Option<CssLength>,
    height: Option<CssLength>,
    is_disposed: bool,
}

/// Strategy for global, viewport-relative placement
///
/// ```ignore
/// let strategy = ctx.position().global();
/// strategy.top("10px").left("20px");
/// let overlay = ctx.create(OverlayConfig::new().position_strategy(strategy))?;
/// ```
pub struct GlobalPositionStrategy {
    state: Mutex<GlobalState>,
}

impl GlobalPositionStrategy {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GlobalState::default()),
        }
    }

    /// Offset from the top edge; clears any bottom offset
    pub fn top(&self, value: impl Into<CssLength>) -> &Self {
        let mut st = self.state.lock().unwrap();
        st.bottom_offset.clear();
        st.top_offset = value.into().to_css();
        st.align_items = Alignment::Start;
        self
    }

    /// Offset from the left edge; clears any right offset
    pub fn left(&self, value: impl Into<CssLength>) -> &Self {
        let mut st = self.state.lock().unwrap();
        st.right_offset.clear();
        st.left_offset = value.into().to_css();
        st.justify_content = Alignment::Start;
        self
    }

    /// Offset from the bottom edge; clears any top offset
    pub fn bottom(&self, value: impl Into<CssLength>) -> &Self {
        let mut st = self.state.lock().unwrap();
        st.top_offset.clear();
        st.bottom_offset = value.into().to_css();
        st.align_items = Alignment::End;
        self
    }

    /// Offset from the right edge; clears any left offset
    pub fn right(&self, value: impl Into<CssLength>) -> &Self {
        let mut st = self.state.lock().unwrap();
        st.left_offset.clear();
        st.right_offset = value.into().to_css();
        st.justify_content = Alignment::End;
        self
    }

    /// Center horizontally, shifted by `offset`
    pub fn center_horizontally(&self, offset: impl Into<CssLength>) -> &Self {
        self.left(offset);
        self.state.lock().unwrap().justify_content = Alignment::Center;
        self
    }

    /// Center vertically, shifted by `offset`
    pub fn center_vertically(&self, offset: impl Into<CssLength>) -> &Self {
        self.top(offset);
        self.state.lock().unwrap().align_items = Alignment::Center;
        self
    }

    /// Pane width; resizes a live overlay immediately, otherwise applied at attach
    pub fn width(&self, value: impl Into<CssLength>) -> &Self {
        let value = value.into();
        match self.live_overlay() {
            Some(overlay) => overlay.update_size(OverlaySizeConfig::new().width(value)),
            None => self.state.lock().unwrap().width = Some(value),
        }
        self
    }

    /// Pane height; resizes a live overlay immediately, otherwise applied at attach
    pub fn height(&self, value: impl Into<CssLength>) -> &Self {
        let value = value.into();
        match self.live_overlay() {
            Some(overlay) => overlay.update_size(OverlaySizeConfig::new().height(value)),
            None => self.state.lock().unwrap().height = Some(value),
        }
        self
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().unwrap().is_disposed
    }

    fn live_overlay(&self) -> Option<OverlayRef> {
        let st = self.state.lock().unwrap();
        if st.is_disposed {
            return None;
        }
        st.overlay.as_ref().and_then(WeakOverlayRef::upgrade)
    }
}

impl Default for GlobalPositionStrategy {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether an axis spans the whole viewport and should ignore offsets
fn is_flush(size: Option<&CssLength>, max: Option<&CssLength>, viewport_unit: &str) -> bool {
    size.map(|s| s.is_full(viewport_unit)).unwrap_or(false)
        && max.map(|m| m.is_full(viewport_unit)).unwrap_or(true)
}

impl PositionStrategy for GlobalPositionStrategy {
    fn attach(&self, overlay: &OverlayRef) {
        let config = overlay.config();
        let (width, height) = {
            let mut st = self.state.lock().unwrap();
            st.overlay = Some(overlay.downgrade());
            st.is_disposed = false;
            (st.width.clone(), st.height.clone())
        };

        if let (Some(width), None) = (width, config.width.as_ref()) {
            overlay.update_size(OverlaySizeConfig::new().width(width));
        }
        if let (Some(height), None) = (height, config.height.as_ref()) {
            overlay.update_size(OverlaySizeConfig::new().height(height));
        }

        if let Some(host) = overlay.host_element() {
            overlay
                .document()
                .lock()
                .unwrap()
                .add_class(host, GLOBAL_WRAPPER_CLASS);
        }
    }

    fn apply(&self) {
        let Some(overlay) = self.live_overlay() else {
            return;
        };
        if !overlay.has_attached() {
            return;
        }
        let (Some(host), Some(pane)) = (overlay.host_element(), overlay.overlay_element()) else {
            return;
        };

        let config = overlay.config();
        let flush_horizontally = is_flush(config.width.as_ref(), config.max_width.as_ref(), "100vw");
        let flush_vertically = is_flush(config.height.as_ref(), config.max_height.as_ref(), "100vh");
        let is_rtl = config.resolved_direction().is_rtl();

        let st = self.state.lock().unwrap();

        let justify_content = if flush_horizontally {
            Alignment::Start
        } else if is_rtl {
            // The flex container already mirrors start/end under rtl while the
            // left/right offsets stay physical, so undo the mirroring.
            st.justify_content.mirrored()
        } else {
            st.justify_content
        };
        let align_items = if flush_vertically {
            Alignment::Start
        } else {
            st.align_items
        };

        let (margin_left, margin_right) = if flush_horizontally {
            ("0", "0")
        } else {
            (st.left_offset.as_str(), st.right_offset.as_str())
        };
        let (margin_top, margin_bottom) = if flush_vertically {
            ("0", "0")
        } else {
            (st.top_offset.as_str(), st.bottom_offset.as_str())
        };

        tracing::trace!(
            "GlobalPositionStrategy::apply - overlay {:?} justify={:?} align={:?}",
            overlay.id(),
            justify_content,
            align_items
        );

        let document = overlay.document();
        let mut doc = document.lock().unwrap();
        doc.set_style(pane, "position", "static");
        doc.set_style(pane, "margin-top", margin_top);
        doc.set_style(pane, "margin-left", margin_left);
        doc.set_style(pane, "margin-bottom", margin_bottom);
        doc.set_style(pane, "margin-right", margin_right);
        doc.set_style(host, "justify-content", justify_content.as_css());
        doc.set_style(host, "align-items", align_items.as_css());
    }

    fn dispose(&self) {
        let overlay = {
            let mut st = self.state.lock().unwrap();
            if st.is_disposed || st.overlay.is_none() {
                return;
            }
            st.is_disposed = true;
            st.overlay.take().and_then(|weak| weak.upgrade())
        };

        if let Some(overlay) = overlay {
            clear_styles(&overlay, overlay.host_element(), overlay.overlay_element());
        }
    }
}

fn clear_styles(overlay: &OverlayRef, host: Option<NodeId>, pane: Option<NodeId>) {
    let document = overlay.document();
    let mut doc = document.lock().unwrap();
    if let Some(pane) = pane {
        for property in ["position", "margin-top", "margin-left", "margin-bottom", "margin-right"] {
            doc.set_style(pane, property, "");
        }
    }
    if let Some(host) = host {
        doc.remove_class(host, GLOBAL_WRAPPER_CLASS);
        doc.set_style(host, "justify-content", "");
        doc.set_style(host, "align-items", "");
    }
}
