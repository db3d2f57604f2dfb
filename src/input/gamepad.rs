//! Gamepad as a pointing device: the left stick drives a pointer, any face
//! button acts as the primary button.
//!
//! Two threads per active adapter. The reader drains raw driver events and
//! keeps the latest stick vector and button set; the integrator advances the
//! pointer on a fixed interval and reports it when it moved.

use std::{
    collections::HashSet,
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    thread,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{error::AdapterError, util::clamp_unit};

use super::{
    worker::{join_all, Worker},
    DeviceKind, Edge, InputAdapter, InputSink, NormalizedPoint,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Button {
    South,
    East,
    North,
    West,
}

/// Event as delivered by the driver. Axis values span the signed 16-bit range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawGamepadEvent {
    Axis(Axis, i32),
    Button(Button, bool),
}

/// Driver-side event stream.
pub trait GamepadSource: Send + 'static {
    /// Blocks for at most `timeout` and returns whatever arrived, possibly
    /// nothing.
    fn poll(&mut self, timeout: Duration) -> io::Result<Vec<RawGamepadEvent>>;
}

/// Hardware probe plus a way to open the device.
pub trait GamepadBackend: Send {
    fn detected(&self) -> bool;
    fn open(&mut self) -> io::Result<Box<dyn GamepadSource>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GamepadSettings {
    /// Pointer travel per interval at full stick deflection, in surface widths.
    pub sensitivity: f64,
    /// Stick magnitudes below this are treated as zero.
    pub deadzone: f64,
    pub update_interval_ms: u64,
}

impl Default for GamepadSettings {
    fn default() -> Self {
        Self {
            sensitivity: 0.05,
            deadzone: 0.1,
            update_interval_ms: 50,
        }
    }
}

impl GamepadSettings {
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}

/// Maps a raw axis value in `-32768..=32767` onto `[-1, 1]`.
pub fn normalize_axis(raw: i32) -> f64 {
    (2.0 * (f64::from(raw) + 32768.0) / 65535.0) - 1.0
}

pub fn apply_deadzone(value: f64, deadzone: f64) -> f64 {
    if value.abs() < deadzone {
        0.0
    } else {
        value
    }
}

/// One integrator step. Stick Y points up, surface Y points down, and the
/// vertical step is scaled so equal deflection covers equal pixel distance.
pub fn integrate(
    pointer: NormalizedPoint,
    stick: (f64, f64),
    sensitivity: f64,
    aspect_ratio: f64,
) -> NormalizedPoint {
    NormalizedPoint::new(
        clamp_unit(pointer.x + stick.0 * sensitivity),
        clamp_unit(pointer.y - stick.1 * sensitivity * aspect_ratio),
    )
}

fn rounded(point: NormalizedPoint) -> (i64, i64) {
    (
        (point.x * 10_000.0).round() as i64,
        (point.y * 10_000.0).round() as i64,
    )
}

/// Tracks held buttons; chords collapse into a single logical button.
#[derive(Debug, Default)]
struct ButtonSet {
    held: HashSet<Button>,
}

impl ButtonSet {
    fn update(&mut self, button: Button, pressed: bool) -> Option<Edge> {
        let was_held = !self.held.is_empty();
        if pressed {
            self.held.insert(button);
        } else {
            self.held.remove(&button);
        }
        Edge::between(was_held, !self.held.is_empty())
    }
}

#[derive(Debug)]
struct PadState {
    stick: (f64, f64),
    pointer: NormalizedPoint,
    buttons: ButtonSet,
}

impl Default for PadState {
    fn default() -> Self {
        Self {
            stick: (0.0, 0.0),
            pointer: NormalizedPoint::new(0.5, 0.5),
            buttons: ButtonSet::default(),
        }
    }
}

fn lock(state: &Mutex<PadState>) -> MutexGuard<'_, PadState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct GamepadAdapter {
    source: Arc<Mutex<Box<dyn GamepadSource>>>,
    settings: GamepadSettings,
    aspect_ratio: f64,
    state: Arc<Mutex<PadState>>,
    running: Arc<AtomicBool>,
    workers: Vec<Worker>,
}

impl GamepadAdapter {
    pub fn new(source: Box<dyn GamepadSource>, settings: GamepadSettings, aspect_ratio: f64) -> Self {
        Self {
            source: Arc::new(Mutex::new(source)),
            settings,
            aspect_ratio,
            state: Arc::new(Mutex::new(PadState::default())),
            running: Arc::new(AtomicBool::new(false)),
            workers: Vec::new(),
        }
    }

    pub fn pointer(&self) -> NormalizedPoint {
        lock(&self.state).pointer
    }

    fn start(&mut self, sink: InputSink) -> io::Result<()> {
        let reader = self.spawn_reader(sink.clone())?;
        self.workers.push(reader);
        let integrator = self.spawn_integrator(sink)?;
        self.workers.push(integrator);
        Ok(())
    }

    fn spawn_reader(&self, sink: InputSink) -> io::Result<Worker> {
        let source = self.source.clone();
        let state = self.state.clone();
        let running = self.running.clone();
        let settings = self.settings;

        Worker::spawn("gamepad-events", move || {
            while running.load(Ordering::Acquire) {
                let polled = {
                    let mut source = source.lock().unwrap_or_else(|p| p.into_inner());
                    source.poll(settings.update_interval())
                };
                let events = match polled {
                    Ok(events) => events,
                    Err(err) => {
                        debug!("gamepad read failed: {err}");
                        thread::sleep(settings.update_interval());
                        continue;
                    }
                };

                for event in events {
                    let edge = {
                        let mut pad = lock(&state);
                        match event {
                            RawGamepadEvent::Axis(axis, raw) => {
                                let value = apply_deadzone(normalize_axis(raw), settings.deadzone);
                                match axis {
                                    Axis::X => pad.stick.0 = value,
                                    Axis::Y => pad.stick.1 = value,
                                }
                                None
                            }
                            RawGamepadEvent::Button(button, pressed) => pad
                                .buttons
                                .update(button, pressed)
                                .map(|edge| (edge, pad.pointer)),
                        }
                    };

                    let delivered = match edge {
                        _ if !running.load(Ordering::Acquire) => return,
                        Some((Edge::Press, at)) => sink.left_click(at),
                        Some((Edge::Release, at)) => sink.left_release(at),
                        None => true,
                    };
                    if !delivered {
                        return;
                    }
                }
            }
        })
    }

    fn spawn_integrator(&self, sink: InputSink) -> io::Result<Worker> {
        let state = self.state.clone();
        let running = self.running.clone();
        let settings = self.settings;
        let aspect_ratio = self.aspect_ratio;

        Worker::spawn("gamepad-pointer", move || {
            let mut last_reported = rounded(lock(&state).pointer);
            while running.load(Ordering::Acquire) {
                let pointer = {
                    let mut pad = lock(&state);
                    pad.pointer = integrate(pad.pointer, pad.stick, settings.sensitivity, aspect_ratio);
                    pad.pointer
                };

                let current = rounded(pointer);
                if current != last_reported {
                    if !running.load(Ordering::Acquire) || !sink.move_to(pointer) {
                        return;
                    }
                    last_reported = current;
                }

                thread::sleep(settings.update_interval());
            }
        })
    }
}

impl InputAdapter for GamepadAdapter {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Gamepad
    }

    fn activate(&mut self, sink: InputSink) -> Result<(), AdapterError> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        if let Err(err) = self.start(sink) {
            self.deactivate();
            return Err(AdapterError::Spawn(err));
        }
        info!("gamepad active (aspect ratio {:.3})", self.aspect_ratio);
        Ok(())
    }

    fn deactivate(&mut self) {
        self.running.store(false, Ordering::Release);
        join_all(&mut self.workers);
    }
}

impl Drop for GamepadAdapter {
    fn drop(&mut self) {
        self.deactivate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{input::PointerAction, runtime::EngineEvent};
    use std::{collections::VecDeque, sync::mpsc, time::Instant};

    #[test]
    fn test_normalize_axis_spans_unit_range() {
        assert_eq!(normalize_axis(-32768), -1.0);
        assert_eq!(normalize_axis(32767), 1.0);
        assert!(normalize_axis(0).abs() < 1e-4);
    }

    #[test]
    fn test_deadzone_zeroes_small_deflection() {
        let settings = GamepadSettings::default();
        let start = NormalizedPoint::new(0.5, 0.5);

        let inside = apply_deadzone(0.05, settings.deadzone);
        assert_eq!(inside, 0.0);
        assert_eq!(integrate(start, (inside, 0.0), settings.sensitivity, 1.0), start);

        let small = integrate(start, (apply_deadzone(0.2, 0.1), 0.0), 0.05, 1.0);
        let large = integrate(start, (apply_deadzone(0.4, 0.1), 0.0), 0.05, 1.0);
        assert!(small.x > start.x);
        assert!(large.x > small.x);
        assert!((small.x - 0.51).abs() < 1e-12);
    }

    #[test]
    fn test_integrate_inverts_y_and_scales_by_aspect() {
        let moved = integrate(NormalizedPoint::new(0.5, 0.5), (0.0, 1.0), 0.1, 2.0);
        assert!((moved.y - 0.3).abs() < 1e-12);
        assert_eq!(moved.x, 0.5);
    }

    #[test]
    fn test_integrate_clamps_to_surface() {
        let moved = integrate(NormalizedPoint::new(0.99, 0.01), (1.0, 1.0), 0.5, 1.0);
        assert_eq!(moved, NormalizedPoint::new(1.0, 0.0));
    }

    #[test]
    fn test_chords_collapse_to_single_button() {
        let mut buttons = ButtonSet::default();
        assert_eq!(buttons.update(Button::South, true), Some(Edge::Press));
        assert_eq!(buttons.update(Button::East, true), None);
        assert_eq!(buttons.update(Button::South, false), None);
        assert_eq!(buttons.update(Button::East, false), Some(Edge::Release));
        assert_eq!(buttons.update(Button::East, false), None);
    }

    struct Scripted {
        batches: VecDeque<io::Result<Vec<RawGamepadEvent>>>,
    }

    impl GamepadSource for Scripted {
        fn poll(&mut self, timeout: Duration) -> io::Result<Vec<RawGamepadEvent>> {
            match self.batches.pop_front() {
                Some(batch) => batch,
                None => {
                    thread::sleep(timeout);
                    Ok(Vec::new())
                }
            }
        }
    }

    fn collect_for(rx: &mpsc::Receiver<EngineEvent>, wait: Duration) -> Vec<PointerAction> {
        let deadline = Instant::now() + wait;
        let mut actions = Vec::new();
        while let Some(left) = deadline.checked_duration_since(Instant::now()) {
            match rx.recv_timeout(left) {
                Ok(EngineEvent::Input(tagged)) => actions.push(tagged.event.action),
                Ok(_) => {}
                Err(_) => break,
            }
        }
        actions
    }

    #[test]
    fn test_threads_emit_moves_and_clicks_then_stop() {
        let source = Scripted {
            batches: VecDeque::from(vec![
                Err(io::Error::new(io::ErrorKind::Other, "unplugged")),
                Ok(vec![RawGamepadEvent::Axis(Axis::X, 32767)]),
                Ok(vec![
                    RawGamepadEvent::Button(Button::South, true),
                    RawGamepadEvent::Button(Button::South, false),
                ]),
            ]),
        };
        let settings = GamepadSettings {
            update_interval_ms: 5,
            ..GamepadSettings::default()
        };
        let (tx, rx) = mpsc::channel();
        let mut pad = GamepadAdapter::new(Box::new(source), settings, 1.0);

        pad.activate(InputSink::new(tx, 3)).unwrap();
        let actions = collect_for(&rx, Duration::from_millis(200));
        pad.deactivate();

        assert!(actions.contains(&PointerAction::Move));
        let press = actions.iter().position(|a| *a == PointerAction::Press).unwrap();
        let release = actions.iter().position(|a| *a == PointerAction::Release).unwrap();
        assert!(press < release);
        assert!(pad.pointer().x > 0.5);

        // nothing arrives once deactivate has returned
        while rx.try_recv().is_ok() {}
        thread::sleep(Duration::from_millis(30));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_deactivate_is_idempotent() {
        let source = Scripted {
            batches: VecDeque::new(),
        };
        let (tx, _rx) = mpsc::channel();
        let mut pad = GamepadAdapter::new(Box::new(source), GamepadSettings::default(), 1.0);
        pad.deactivate();
        pad.activate(InputSink::new(tx, 1)).unwrap();
        pad.deactivate();
        pad.deactivate();
    }
}
