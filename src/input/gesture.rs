//! Camera hand tracking as a pointing device.
//!
//! Landmark inference happens upstream; this adapter consumes one set of 21
//! hand landmarks per frame, moves the pointer to the hand centre and treats
//! a closed fist as a held primary button.

use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::AdapterError;

use super::{
    worker::{join_all, Worker},
    DeviceKind, Edge, InputAdapter, InputSink, NormalizedPoint,
};

pub const LANDMARK_COUNT: usize = 21;
const WRIST: usize = 0;
const MIDDLE_BASE: usize = 9;
const FINGER_TIPS: [usize; 4] = [8, 12, 16, 20];
const FINGER_BASES: [usize; 4] = [5, 9, 13, 17];
/// Folded fingers needed to call the hand a fist.
const FIST_MIN_FOLDED: usize = 3;
/// Pause after a failed frame read.
const READ_ERROR_BACKOFF: Duration = Duration::from_millis(20);

/// Landmark in normalized image coordinates (already mirrored upstream).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HandLandmarks(pub [Landmark; LANDMARK_COUNT]);

impl HandLandmarks {
    fn at(&self, idx: usize) -> Landmark {
        self.0[idx]
    }
}

/// Upstream producer: camera capture plus landmark inference.
pub trait HandTracker: Send + 'static {
    /// Blocks for about one frame. `Ok(None)` means no hand in view.
    fn next_frame(&mut self) -> io::Result<Option<HandLandmarks>>;
}

pub trait HandTrackerBackend: Send {
    fn open(&mut self) -> io::Result<Box<dyn HandTracker>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureSettings {
    /// Max fingertip-to-wrist distance for a finger to count as folded.
    pub fist_radius: f64,
    /// Minimum spacing between processed frames; 0 lets the tracker pace.
    pub frame_interval_ms: u64,
}

impl Default for GestureSettings {
    fn default() -> Self {
        Self {
            fist_radius: 0.15,
            frame_interval_ms: 0,
        }
    }
}

pub fn is_fist(hand: &HandLandmarks, radius: f64) -> bool {
    let wrist = hand.at(WRIST);
    let folded = FINGER_TIPS
        .iter()
        .zip(FINGER_BASES.iter())
        .filter(|&(&tip, &base)| {
            let tip = hand.at(tip);
            let base = hand.at(base);
            let curled = tip.y > base.y;
            let near_wrist = (tip.x - wrist.x).hypot(tip.y - wrist.y) < radius;
            curled && near_wrist
        })
        .count();

    folded >= FIST_MIN_FOLDED
}

/// Midpoint of the wrist and the middle-finger base.
pub fn hand_center(hand: &HandLandmarks) -> NormalizedPoint {
    let wrist = hand.at(WRIST);
    let middle = hand.at(MIDDLE_BASE);
    NormalizedPoint::new((wrist.x + middle.x) / 2.0, (wrist.y + middle.y) / 2.0)
}

/// Open→fist presses, fist→open releases.
#[derive(Debug, Default)]
pub struct Grip {
    closed: bool,
}

impl Grip {
    pub fn update(&mut self, fist: bool) -> Option<Edge> {
        let edge = Edge::between(self.closed, fist);
        self.closed = fist;
        edge
    }
}

pub struct GestureAdapter {
    tracker: Arc<Mutex<Box<dyn HandTracker>>>,
    settings: GestureSettings,
    running: Arc<AtomicBool>,
    workers: Vec<Worker>,
}

impl GestureAdapter {
    pub fn new(tracker: Box<dyn HandTracker>, settings: GestureSettings) -> Self {
        Self {
            tracker: Arc::new(Mutex::new(tracker)),
            settings,
            running: Arc::new(AtomicBool::new(false)),
            workers: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.workers.is_empty()
    }
}

fn track(
    tracker: &Mutex<Box<dyn HandTracker>>,
    settings: GestureSettings,
    running: &AtomicBool,
    sink: &InputSink,
) {
    let mut grip = Grip::default();
    let pace = Duration::from_millis(settings.frame_interval_ms);

    while running.load(Ordering::Acquire) {
        let frame = tracker
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .next_frame();

        match frame {
            Ok(Some(hand)) => {
                let center = hand_center(&hand);
                let fist = is_fist(&hand, settings.fist_radius);
                if !running.load(Ordering::Acquire) || !sink.move_to(center) {
                    return;
                }
                let delivered = match grip.update(fist) {
                    Some(Edge::Press) => sink.left_click(center),
                    Some(Edge::Release) => sink.left_release(center),
                    None => true,
                };
                if !delivered {
                    return;
                }
            }
            Ok(None) => {}
            Err(err) => {
                debug!("hand tracking frame failed: {err}");
                thread::sleep(pace.max(READ_ERROR_BACKOFF));
                continue;
            }
        }

        if !pace.is_zero() {
            thread::sleep(pace);
        }
    }
}

impl InputAdapter for GestureAdapter {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Gesture
    }

    fn activate(&mut self, sink: InputSink) -> Result<(), AdapterError> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let tracker = self.tracker.clone();
        let running = self.running.clone();
        let settings = self.settings;
        match Worker::spawn("hand-tracking", move || {
            track(&tracker, settings, &running, &sink)
        }) {
            Ok(worker) => self.workers.push(worker),
            Err(err) => {
                self.deactivate();
                return Err(AdapterError::Spawn(err));
            }
        }
        info!("hand tracking active");
        Ok(())
    }

    fn deactivate(&mut self) {
        self.running.store(false, Ordering::Release);
        join_all(&mut self.workers);
    }
}

impl Drop for GestureAdapter {
    fn drop(&mut self) {
        self.deactivate();
    }
}
