//! Deferred work scheduling
//!
//! The overlay engine never blocks. Work that depends on the host having
//! finished its render pass is handed to a [`Scheduler`]:
//!
//! - **Idle tasks** run once at the next quiet point of the host render cycle
//! - **Animation frames** run before the next paint (optional capability)
//! - **Timers** run after a delay in milliseconds
//!
//! [`QueueScheduler`] is a manually-driven implementation for headless hosts
//! and tests: the host calls [`QueueScheduler::run_idle`] when its render
//! cycle settles, [`QueueScheduler::run_frame`] before painting, and
//! [`QueueScheduler::advance`] as time passes.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Identifier of a pending timer
    pub struct TimerId;
}

/// A unit of deferred work
pub type Task = Box<dyn FnOnce() + Send>;

/// Scheduler shared by every overlay in a context
pub type SharedScheduler = Arc<dyn Scheduler>;

/// Deferred execution primitives consumed by the overlay engine
pub trait Scheduler: Send + Sync {
    /// Run `task` once, after pending synchronous work, at the next quiet point
    fn run_when_idle(&self, task: Task);

    /// Whether animation frames are available
    fn supports_animation_frames(&self) -> bool;

    /// Run `task` before the next paint
    ///
    /// Schedulers without frame support run the task immediately.
    fn request_animation_frame(&self, task: Task);

    /// Run `task` after `delay_ms` milliseconds
    fn set_timeout(&self, delay_ms: u64, task: Task) -> TimerId;

    /// Cancel a pending timer; unknown or fired timers are ignored
    fn clear_timeout(&self, id: TimerId);
}

struct PendingTimer {
    due_ms: u64,
    seq: u64,
    task: Task,
}

#[derive(Default)]
struct QueueState {
    idle: VecDeque<Task>,
    frames: VecDeque<Task>,
    timers: SlotMap<TimerId, PendingTimer>,
    now_ms: u64,
    seq: u64,
}

/// Manually-driven scheduler
pub struct QueueScheduler {
    state: Mutex<QueueState>,
    frames_supported: bool,
}

impl QueueScheduler {
    /// Scheduler with animation frame support
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            frames_supported: true,
        }
    }

    /// Scheduler for environments without animation frames
    pub fn without_animation_frames() -> Self {
        Self {
            frames_supported: false,
            ..Self::new()
        }
    }

    /// Wrap for sharing with an overlay context
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Signal one quiet point: run the idle tasks queued so far
    ///
    /// Tasks queued while running are deferred to the next quiet point.
    /// Returns the number of tasks run.
    pub fn run_idle(&self) -> usize {
        let tasks = std::mem::take(&mut self.state.lock().unwrap().idle);
        let count = tasks.len();
        for task in tasks {
            task();
        }
        count
    }

    /// Run the animation frame callbacks queued so far
    pub fn run_frame(&self) -> usize {
        let tasks = std::mem::take(&mut self.state.lock().unwrap().frames);
        let count = tasks.len();
        for task in tasks {
            task();
        }
        count
    }

    /// Advance the clock, firing due timers in deadline order
    ///
    /// Returns the number of timers fired.
    pub fn advance(&self, ms: u64) -> usize {
        let target = self.state.lock().unwrap().now_ms.saturating_add(ms);
        let mut fired = 0;

        loop {
            let task = {
                let mut state = self.state.lock().unwrap();
                let next = state
                    .timers
                    .iter()
                    .filter(|(_, t)| t.due_ms <= target)
                    .min_by_key(|(_, t)| (t.due_ms, t.seq))
                    .map(|(id, t)| (id, t.due_ms));

                match next {
                    Some((id, due_ms)) => {
                        state.now_ms = state.now_ms.max(due_ms);
                        state.timers.remove(id).map(|t| t.task)
                    }
                    None => {
                        state.now_ms = target;
                        None
                    }
                }
            };

            match task {
                Some(task) => {
                    task();
                    fired += 1;
                }
                None => break,
            }
        }

        fired
    }

    pub fn now_ms(&self) -> u64 {
        self.state.lock().unwrap().now_ms
    }

    pub fn pending_idle(&self) -> usize {
        self.state.lock().unwrap().idle.len()
    }

    pub fn pending_frames(&self) -> usize {
        self.state.lock().unwrap().frames.len()
    }

    pub fn pending_timers(&self) -> usize {
        self.state.lock().unwrap().timers.len()
    }
}

impl Default for QueueScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for QueueScheduler {
    fn run_when_idle(&self, task: Task) {
        self.state.lock().unwrap().idle.push_back(task);
    }

    fn supports_animation_frames(&self) -> bool {
        self.frames_supported
    }

    fn request_animation_frame(&self, task: Task) {
        if self.frames_supported {
            self.state.lock().unwrap().frames.push_back(task);
        } else {
            task();
        }
    }

    fn set_timeout(&self, delay_ms: u64, task: Task) -> TimerId {
        let mut state = self.state.lock().unwrap();
        state.seq += 1;
        let timer = PendingTimer {
            due_ms: state.now_ms.saturating_add(delay_ms),
            seq: state.seq,
            task,
        };
        state.timers.insert(timer)
    }

    fn clear_timeout(&self, id: TimerId) {
        self.state.lock().unwrap().timers.remove(id);
    }
}
