//! Frame scheduling and inertial motion.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// Host hook for "call me on the next frame". The host answers by calling
/// `ViewportManager::on_animation_frame`.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameHandle;
    fn cancel_frame(&mut self, handle: FrameHandle);
}

#[derive(Debug, Default)]
pub struct ManualFrameLog {
    pub next_id: u64,
    pub pending: Option<FrameHandle>,
    pub requested: u64,
    pub cancelled: Vec<FrameHandle>,
}

/// Scheduler that only records requests. Callers drive frames themselves.
/// Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct ManualFrameScheduler {
    log: Rc<RefCell<ManualFrameLog>>,
}

impl ManualFrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_pending_frame(&self) -> bool {
        self.log.borrow().pending.is_some()
    }

    pub fn requested_frames(&self) -> u64 {
        self.log.borrow().requested
    }

    pub fn cancelled_frames(&self) -> usize {
        self.log.borrow().cancelled.len()
    }

    /// Marks the pending frame as fired.
    pub fn take_pending(&self) -> Option<FrameHandle> {
        self.log.borrow_mut().pending.take()
    }
}

impl FrameScheduler for ManualFrameScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        let mut log = self.log.borrow_mut();
        log.next_id += 1;
        log.requested += 1;
        let handle = FrameHandle(log.next_id);
        log.pending = Some(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        let mut log = self.log.borrow_mut();
        if log.pending == Some(handle) {
            log.pending = None;
        }
        log.cancelled.push(handle);
    }
}

/// Pointer velocity from recent samples, in px/ms.
#[derive(Debug, Clone)]
pub struct VelocityTracker {
    samples: VecDeque<(f64, f64)>,
    max_samples: usize,
    window_ms: f64,
}

impl Default for VelocityTracker {
    fn default() -> Self {
        Self::new(5, 100.0)
    }
}

impl VelocityTracker {
    pub fn new(max_samples: usize, window_ms: f64) -> Self {
        Self { samples: VecDeque::with_capacity(max_samples + 1), max_samples: max_samples.max(2), window_ms }
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }

    pub fn record(&mut self, x: f64, time_ms: f64) {
        self.samples.push_back((x, time_ms));
        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
    }

    /// Average velocity across samples inside the window ending at the newest one.
    pub fn velocity(&self) -> f64 {
        let Some(&(last_x, last_t)) = self.samples.back() else { return 0.0 };
        let Some(&(first_x, first_t)) = self.samples.iter().find(|(_, t)| last_t - t <= self.window_ms) else {
            return 0.0;
        };
        let dt = last_t - first_t;
        if dt <= 0.0 { 0.0 } else { (last_x - first_x) / dt }
    }
}

/// Momentum and smooth-zoom tuning.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Release velocity (px/ms) needed to start coasting.
    pub start_velocity: f64,
    /// Coasting stops below this velocity (px/ms).
    pub stop_velocity: f64,
    pub decay: f64,
    pub frame_ms: f64,
    pub zoom_frames: u32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self { start_velocity: 0.25, stop_velocity: 0.02, decay: 0.92, frame_ms: 16.0, zoom_frames: 6 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Animation {
    Momentum { velocity: f64 },
    Zoom { anchor_x: f64, step_factor: f64, remaining: u32 },
}
