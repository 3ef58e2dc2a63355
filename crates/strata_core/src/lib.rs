//! Strata Core Runtime
//!
//! Foundational primitives for the Strata overlay engine:
//!
//! - **Document Model**: Arena-backed element tree with classes, styles and listeners
//! - **Event Channels**: Unbuffered multi-subscriber streams with completion
//! - **Scheduling**: Idle (quiet point), animation frame and timer primitives
//! - **Platform**: Browser / server / test environment detection
//! - **Direction**: Layout direction and observable directionality
//!
//! # Example
//!
//! ```rust
//! use strata_core::dom::Document;
//! use strata_core::scheduler::{QueueScheduler, Scheduler};
//!
//! let doc = Document::new().into_shared();
//! let scheduler = QueueScheduler::new();
//!
//! let d = doc.clone();
//! scheduler.run_when_idle(Box::new(move || {
//!     let mut d = d.lock().unwrap();
//!     let body = d.body();
//!     d.add_class(body, "settled");
//! }));
//!
//! scheduler.run_idle();
//! let d = doc.lock().unwrap();
//! assert!(d.has_class(d.body(), "settled"));
//! ```

pub mod channel;
pub mod direction;
pub mod dom;
pub mod error;
pub mod events;
pub mod platform;
pub mod scheduler;

pub use channel::{EventChannel, SubscriberId, Subscription};
pub use direction::{Direction, Directionality};
pub use dom::{
    Document, DocumentCapabilities, DocumentExt, EventListener, FullscreenApi, ListenerId, NodeId,
    Rect, SharedDocument, Viewport,
};
pub use error::{Result, StrataError};
pub use events::{event_types, DomEvent, EventDetail};
pub use platform::{Platform, PlatformMarker};
pub use scheduler::{QueueScheduler, Scheduler, SharedScheduler, Task, TimerId};
