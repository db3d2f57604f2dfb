//! Input unification: every pointing device ends up as the same stream of
//! normalized move/press/release events on one channel.

pub mod gamepad;
pub mod gesture;
pub mod hub;
pub mod pointer;
pub mod replay;
mod worker;

use std::{fmt, str::FromStr, sync::mpsc::Sender};

use serde::{Deserialize, Serialize};

use crate::{error::AdapterError, runtime::EngineEvent};

pub use hub::{DeviceRegistry, InputHub};

/// Devices offered by the selection UI. `Display` yields the exact names the
/// UI shows.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
pub enum DeviceKind {
    #[strum(serialize = "Mouse")]
    #[serde(rename = "Mouse")]
    Pointer,
    #[strum(serialize = "Hand Tracking")]
    #[serde(rename = "Hand Tracking")]
    Gesture,
    #[strum(serialize = "Gamepad")]
    #[serde(rename = "Gamepad")]
    Gamepad,
}

impl FromStr for DeviceKind {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Mouse" => Ok(DeviceKind::Pointer),
            "Hand Tracking" => Ok(DeviceKind::Gesture),
            "Gamepad" => Ok(DeviceKind::Gamepad),
            other => Err(AdapterError::UnknownDevice(other.to_string())),
        }
    }
}

/// Device-independent position in `[0, 1]²`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for NormalizedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerAction {
    Move,
    Press,
    Release,
    /// Secondary (right) click; only the pointer device produces it.
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputEvent {
    pub action: PointerAction,
    pub point: NormalizedPoint,
}

/// An input event stamped with the device generation that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaggedInput {
    pub generation: u64,
    pub event: InputEvent,
}

/// Input converted to surface pixels, ready for the state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub action: PointerAction,
    pub x: f64,
    pub y: f64,
}

impl PointerEvent {
    pub fn new(action: PointerAction, x: f64, y: f64) -> Self {
        Self { action, x, y }
    }
}

/// Raw pointer event from the drawable surface, in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceEvent {
    pub action: PointerAction,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Where an adapter sends its events. Cloned into adapter threads.
#[derive(Debug, Clone)]
pub struct InputSink {
    tx: Sender<EngineEvent>,
    generation: u64,
}

impl InputSink {
    pub fn new(tx: Sender<EngineEvent>, generation: u64) -> Self {
        Self { tx, generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns false once the consumer has gone away.
    pub fn emit(&self, action: PointerAction, point: NormalizedPoint) -> bool {
        let tagged = TaggedInput {
            generation: self.generation,
            event: InputEvent { action, point },
        };
        self.tx.send(EngineEvent::Input(tagged)).is_ok()
    }

    pub fn move_to(&self, point: NormalizedPoint) -> bool {
        self.emit(PointerAction::Move, point)
    }

    pub fn left_click(&self, point: NormalizedPoint) -> bool {
        self.emit(PointerAction::Press, point)
    }

    pub fn left_release(&self, point: NormalizedPoint) -> bool {
        self.emit(PointerAction::Release, point)
    }
}

/// A pointing device. `deactivate` must not return while any thread the
/// adapter owns is still able to emit, and must be safe to call twice or
/// after a failed `activate`.
pub trait InputAdapter: Send {
    fn kind(&self) -> DeviceKind;

    fn activate(&mut self, sink: InputSink) -> Result<(), AdapterError>;

    fn deactivate(&mut self);

    fn name(&self) -> String {
        self.kind().to_string()
    }

    /// Surface pointer events; only event-driven adapters care.
    fn surface_event(&mut self, _event: SurfaceEvent) {}
}

/// Press/release edges derived from a "held" signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Press,
    Release,
}

impl Edge {
    pub fn between(was_held: bool, is_held: bool) -> Option<Self> {
        match (was_held, is_held) {
            (false, true) => Some(Edge::Press),
            (true, false) => Some(Edge::Release),
            _ => None,
        }
    }
}
