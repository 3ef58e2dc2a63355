//! Navigation signal
//!
//! Overlays configured with `dispose_on_navigation` listen here and dispose
//! themselves when the host application navigates.

use std::sync::Mutex;

use strata_core::EventChannel;

/// A navigation performed by the host
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NavigationEvent {
    pub from: String,
    pub to: String,
}

/// Current location of the host application
#[derive(Debug)]
pub struct Location {
    path: Mutex<String>,
    changes: EventChannel<NavigationEvent>,
}

impl Location {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            path: Mutex::new(initial.into()),
            changes: EventChannel::new(),
        }
    }

    pub fn path(&self) -> String {
        self.path.lock().unwrap().clone()
    }

    /// Move to `url` and notify listeners
    ///
    /// Navigating to the current path still counts as a navigation.
    pub fn navigate(&self, url: impl Into<String>) {
        let to = url.into();
        let from = std::mem::replace(&mut *self.path.lock().unwrap(), to.clone());
        tracing::debug!("Location: {} -> {}", from, to);
        self.changes.next(&NavigationEvent { from, to });
    }

    /// Stream of navigations
    pub fn changes(&self) -> &EventChannel<NavigationEvent> {
        &self.changes
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::new("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_navigate_emits_change() {
        let location = Location::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let _sub = location
            .changes()
            .subscribe(move |event: &NavigationEvent| s.lock().unwrap().push(event.clone()))
            .unwrap();

        location.navigate("/settings");
        assert_eq!(location.path(), "/settings");
        assert_eq!(
            *seen.lock().unwrap(),
            vec![NavigationEvent {
                from: "/".to_string(),
                to: "/settings".to_string(),
            }]
        );
    }
}
