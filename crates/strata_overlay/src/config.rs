//! Overlay configuration
//!
//! [`OverlayConfig`] is treated as an immutable value once an overlay is
//! created: size and direction updates produce a new configuration that
//! replaces the old one.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;
use strata_core::{Direction, Directionality};

use crate::position::PositionStrategy;
use crate::scroll::ScrollStrategy;

/// Default class applied to backdrops
pub const DEFAULT_BACKDROP_CLASS: &str = "cdk-overlay-dark-backdrop";

// =============================================================================
// CssLength
// =============================================================================

/// A CSS length: a pixel count or a string carrying its own unit
#[derive(Clone, Debug, PartialEq)]
pub enum CssLength {
    Px(f32),
    Value(String),
}

impl CssLength {
    /// Render as a CSS value (`10` becomes `10px`)
    pub fn to_css(&self) -> String {
        match self {
            CssLength::Px(px) => format!("{}px", px),
            CssLength::Value(value) => value.clone(),
        }
    }

    /// Whether the length spans the full viewport along an axis
    ///
    /// `viewport_unit` is `100vw` for the horizontal axis and `100vh` for the
    /// vertical axis.
    pub fn is_full(&self, viewport_unit: &str) -> bool {
        let css = self.to_css();
        css == "100%" || css == viewport_unit
    }
}

impl From<f32> for CssLength {
    fn from(px: f32) -> Self {
        CssLength::Px(px)
    }
}

impl From<i32> for CssLength {
    fn from(px: i32) -> Self {
        CssLength::Px(px as f32)
    }
}

impl From<&str> for CssLength {
    fn from(value: &str) -> Self {
        CssLength::Value(value.to_string())
    }
}

impl From<String> for CssLength {
    fn from(value: String) -> Self {
        CssLength::Value(value)
    }
}

impl fmt::Display for CssLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}

// =============================================================================
// ClassList
// =============================================================================

/// A normalized set of class names
///
/// Accepts a single name, a whitespace-separated string, or a list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassList(SmallVec<[String; 2]>);

impl ClassList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    fn push_names(&mut self, names: &str) {
        for name in names.split_whitespace() {
            if !self.0.iter().any(|c| c == name) {
                self.0.push(name.to_string());
            }
        }
    }
}

impl From<&str> for ClassList {
    fn from(names: &str) -> Self {
        let mut list = ClassList::new();
        list.push_names(names);
        list
    }
}

impl From<String> for ClassList {
    fn from(names: String) -> Self {
        ClassList::from(names.as_str())
    }
}

impl From<&[&str]> for ClassList {
    fn from(names: &[&str]) -> Self {
        let mut list = ClassList::new();
        for name in names {
            list.push_names(name);
        }
        list
    }
}

impl<const N: usize> From<[&str; N]> for ClassList {
    fn from(names: [&str; N]) -> Self {
        ClassList::from(&names[..])
    }
}

impl From<Vec<&str>> for ClassList {
    fn from(names: Vec<&str>) -> Self {
        ClassList::from(names.as_slice())
    }
}

impl From<Vec<String>> for ClassList {
    fn from(names: Vec<String>) -> Self {
        let mut list = ClassList::new();
        for name in &names {
            list.push_names(name);
        }
        list
    }
}

// =============================================================================
// DirectionSource
// =============================================================================

/// Layout direction of an overlay: fixed, or read from a shared handle
#[derive(Clone, Debug)]
pub enum DirectionSource {
    Fixed(Direction),
    Shared(Arc<Directionality>),
}

impl DirectionSource {
    pub fn value(&self) -> Direction {
        match self {
            DirectionSource::Fixed(direction) => *direction,
            DirectionSource::Shared(handle) => handle.value(),
        }
    }
}

impl From<Direction> for DirectionSource {
    fn from(direction: Direction) -> Self {
        DirectionSource::Fixed(direction)
    }
}

impl From<Arc<Directionality>> for DirectionSource {
    fn from(handle: Arc<Directionality>) -> Self {
        DirectionSource::Shared(handle)
    }
}

// =============================================================================
// OverlaySizeConfig
// =============================================================================

/// Partial size update; unset fields keep their current value
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OverlaySizeConfig {
    pub width: Option<CssLength>,
    pub height: Option<CssLength>,
    pub min_width: Option<CssLength>,
    pub min_height: Option<CssLength>,
    pub max_width: Option<CssLength>,
    pub max_height: Option<CssLength>,
}

impl OverlaySizeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn width(mut self, value: impl Into<CssLength>) -> Self {
        self.width = Some(value.into());
        self
    }

    pub fn height(mut self, value: impl Into<CssLength>) -> Self {
        self.height = Some(value.into());
        self
    }

    pub fn min_width(mut self, value: impl Into<CssLength>) -> Self {
        self.min_width = Some(value.into());
        self
    }

    pub fn min_height(mut self, value: impl Into<CssLength>) -> Self {
        self.min_height = Some(value.into());
        self
    }

    pub fn max_width(mut self, value: impl Into<CssLength>) -> Self {
        self.max_width = Some(value.into());
        self
    }

    pub fn max_height(mut self, value: impl Into<CssLength>) -> Self {
        self.max_height = Some(value.into());
        self
    }
}

// =============================================================================
// OverlayConfig
// =============================================================================

/// Configuration for an overlay instance
#[derive(Clone)]
pub struct OverlayConfig {
    /// Strategy that places the pane on screen
    pub position_strategy: Option<Arc<dyn PositionStrategy>>,
    /// Strategy that governs page scrolling while open
    pub scroll_strategy: Option<Arc<dyn ScrollStrategy>>,
    /// Classes added to the pane while attached
    pub panel_class: ClassList,
    /// Whether a backdrop is inserted behind the overlay
    pub has_backdrop: bool,
    /// Classes added to the backdrop
    pub backdrop_class: ClassList,
    pub width: Option<CssLength>,
    pub height: Option<CssLength>,
    pub min_width: Option<CssLength>,
    pub min_height: Option<CssLength>,
    pub max_width: Option<CssLength>,
    pub max_height: Option<CssLength>,
    /// Layout direction (ltr when unset)
    pub direction: Option<DirectionSource>,
    /// Dispose the overlay when the host navigates
    pub dispose_on_navigation: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            position_strategy: None,
            scroll_strategy: None,
            panel_class: ClassList::new(),
            has_backdrop: false,
            backdrop_class: ClassList::from(DEFAULT_BACKDROP_CLASS),
            width: None,
            height: None,
            min_width: None,
            min_height: None,
            max_width: None,
            max_height: None,
            direction: None,
            dispose_on_navigation: false,
        }
    }
}

impl fmt::Debug for OverlayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayConfig")
            .field("position_strategy", &self.position_strategy.is_some())
            .field("scroll_strategy", &self.scroll_strategy.is_some())
            .field("panel_class", &self.panel_class)
            .field("has_backdrop", &self.has_backdrop)
            .field("backdrop_class", &self.backdrop_class)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("min_width", &self.min_width)
            .field("min_height", &self.min_height)
            .field("max_width", &self.max_width)
            .field("max_height", &self.max_height)
            .field("direction", &self.direction)
            .field("dispose_on_navigation", &self.dispose_on_navigation)
            .finish()
    }
}

impl OverlayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position_strategy(mut self, strategy: Arc<dyn PositionStrategy>) -> Self {
        self.position_strategy = Some(strategy);
        self
    }

    pub fn scroll_strategy(mut self, strategy: Arc<dyn ScrollStrategy>) -> Self {
        self.scroll_strategy = Some(strategy);
        self
    }

    pub fn panel_class(mut self, classes: impl Into<ClassList>) -> Self {
        self.panel_class = classes.into();
        self
    }

    pub fn has_backdrop(mut self, has_backdrop: bool) -> Self {
        self.has_backdrop = has_backdrop;
        self
    }

    pub fn backdrop_class(mut self, classes: impl Into<ClassList>) -> Self {
        self.backdrop_class = classes.into();
        self
    }

    pub fn width(mut self, value: impl Into<CssLength>) -> Self {
        self.width = Some(value.into());
        self
    }

    pub fn height(mut self, value: impl Into<CssLength>) -> Self {
        self.height = Some(value.into());
        self
    }

    pub fn min_width(mut self, value: impl Into<CssLength>) -> Self {
        self.min_width = Some(value.into());
        self
    }

    pub fn min_height(mut self, value: impl Into<CssLength>) -> Self {
        self.min_height = Some(value.into());
        self
    }

    pub fn max_width(mut self, value: impl Into<CssLength>) -> Self {
        self.max_width = Some(value.into());
        self
    }

    pub fn max_height(mut self, value: impl Into<CssLength>) -> Self {
        self.max_height = Some(value.into());
        self
    }

    pub fn direction(mut self, direction: impl Into<DirectionSource>) -> Self {
        self.direction = Some(direction.into());
        self
    }

    pub fn dispose_on_navigation(mut self, dispose: bool) -> Self {
        self.dispose_on_navigation = dispose;
        self
    }

    /// New configuration with the set fields of `size` merged in
    pub fn with_size(&self, size: &OverlaySizeConfig) -> Self {
        let mut next = self.clone();
        let merge = |slot: &mut Option<CssLength>, value: &Option<CssLength>| {
            if let Some(value) = value {
                *slot = Some(value.clone());
            }
        };
        merge(&mut next.width, &size.width);
        merge(&mut next.height, &size.height);
        merge(&mut next.min_width, &size.min_width);
        merge(&mut next.min_height, &size.min_height);
        merge(&mut next.max_width, &size.max_width);
        merge(&mut next.max_height, &size.max_height);
        next
    }

    /// Resolved layout direction
    pub fn resolved_direction(&self) -> Direction {
        self.direction
            .as_ref()
            .map(DirectionSource::value)
            .unwrap_or_default()
    }
}
