//! Layout direction

use std::sync::Mutex;

use crate::channel::EventChannel;

/// Reading direction of a subtree
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    #[default]
    Ltr,
    Rtl,
}

impl Direction {
    /// Value of the `dir` attribute
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Ltr => "ltr",
            Direction::Rtl => "rtl",
        }
    }

    pub fn is_rtl(&self) -> bool {
        matches!(self, Direction::Rtl)
    }
}

/// Shared, observable direction handle (e.g. owned by an application shell)
pub struct Directionality {
    value: Mutex<Direction>,
    change: EventChannel<Direction>,
}

impl Directionality {
    pub fn new(value: Direction) -> Self {
        Self {
            value: Mutex::new(value),
            change: EventChannel::new(),
        }
    }

    pub fn value(&self) -> Direction {
        *self.value.lock().unwrap()
    }

    /// Update the direction, notifying `change` observers when it differs
    pub fn set(&self, value: Direction) {
        let changed = {
            let mut current = self.value.lock().unwrap();
            let changed = *current != value;
            *current = value;
            changed
        };
        if changed {
            self.change.next(&value);
        }
    }

    /// Stream of direction changes
    pub fn change(&self) -> &EventChannel<Direction> {
        &self.change
    }
}

impl Default for Directionality {
    fn default() -> Self {
        Self::new(Direction::Ltr)
    }
}

impl std::fmt::Debug for Directionality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directionality")
            .field("value", &self.value())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_change_only_on_difference() {
        let dir = Directionality::new(Direction::Ltr);
        let changes = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&changes);
        let _sub = dir.change().subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        dir.set(Direction::Ltr);
        dir.set(Direction::Rtl);
        assert_eq!(dir.value(), Direction::Rtl);
        assert_eq!(changes.load(Ordering::SeqCst), 1);
    }
}
