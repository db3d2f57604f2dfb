use std::sync::mpsc::Sender;

use tracing::{debug, info, warn};

use crate::{error::AdapterError, geometry::Surface, runtime::EngineEvent};

use super::{
    gamepad::{GamepadAdapter, GamepadBackend, GamepadSettings},
    gesture::{GestureAdapter, GestureSettings, HandTrackerBackend},
    pointer::PointerAdapter,
    DeviceKind, InputAdapter, InputSink, NormalizedPoint, PointerEvent, SurfaceEvent, TaggedInput,
};

/// Which devices exist on this machine and how to open them.
pub struct DeviceRegistry {
    gamepad: Option<Box<dyn GamepadBackend>>,
    hand_tracker: Option<Box<dyn HandTrackerBackend>>,
    gamepad_settings: GamepadSettings,
    gesture_settings: GestureSettings,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new(GamepadSettings::default(), GestureSettings::default())
    }
}

impl DeviceRegistry {
    /// Only the pointer is available until backends are attached.
    pub fn new(gamepad_settings: GamepadSettings, gesture_settings: GestureSettings) -> Self {
        Self {
            gamepad: None,
            hand_tracker: None,
            gamepad_settings,
            gesture_settings,
        }
    }

    pub fn with_gamepad(mut self, backend: Box<dyn GamepadBackend>) -> Self {
        self.gamepad = Some(backend);
        self
    }

    pub fn with_hand_tracker(mut self, backend: Box<dyn HandTrackerBackend>) -> Self {
        self.hand_tracker = Some(backend);
        self
    }

    /// Devices to offer, in selection-UI order. The gamepad is listed only
    /// while the hardware probe finds one.
    pub fn available(&self) -> Vec<DeviceKind> {
        let mut kinds = vec![DeviceKind::Pointer];
        if self.hand_tracker.is_some() {
            kinds.push(DeviceKind::Gesture);
        }
        if self.gamepad.as_ref().is_some_and(|pad| pad.detected()) {
            kinds.push(DeviceKind::Gamepad);
        }
        kinds
    }

    pub fn create(
        &mut self,
        kind: DeviceKind,
        surface: Surface,
    ) -> Result<Box<dyn InputAdapter>, AdapterError> {
        match kind {
            DeviceKind::Pointer => Ok(Box::new(PointerAdapter::new())),
            DeviceKind::Gamepad => {
                let backend = self
                    .gamepad
                    .as_mut()
                    .filter(|pad| pad.detected())
                    .ok_or(AdapterError::Unavailable(kind))?;
                let source = backend.open().map_err(|err| {
                    warn!("opening gamepad failed: {err}");
                    AdapterError::Unavailable(kind)
                })?;
                Ok(Box::new(GamepadAdapter::new(
                    source,
                    self.gamepad_settings,
                    surface.aspect_ratio(),
                )))
            }
            DeviceKind::Gesture => {
                let backend = self
                    .hand_tracker
                    .as_mut()
                    .ok_or(AdapterError::Unavailable(kind))?;
                let tracker = backend.open().map_err(|err| {
                    warn!("opening hand tracking failed: {err}");
                    AdapterError::Unavailable(kind)
                })?;
                Ok(Box::new(GestureAdapter::new(tracker, self.gesture_settings)))
            }
        }
    }
}

/// Owns the single live adapter and converts its output to surface pixels.
pub struct InputHub {
    registry: DeviceRegistry,
    current: Box<dyn InputAdapter>,
    tx: Sender<EngineEvent>,
    generation: u64,
}

impl InputHub {
    /// Starts with the pointer active.
    pub fn new(registry: DeviceRegistry, tx: Sender<EngineEvent>) -> Self {
        let mut current: Box<dyn InputAdapter> = Box::new(PointerAdapter::new());
        let generation = 1;
        // The pointer adapter has nothing that can fail on activation.
        let _ = current.activate(InputSink::new(tx.clone(), generation));
        Self {
            registry,
            current,
            tx,
            generation,
        }
    }

    pub fn current(&self) -> DeviceKind {
        self.current.kind()
    }

    pub fn current_name(&self) -> String {
        self.current.name()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn available(&self) -> Vec<DeviceKind> {
        self.registry.available()
    }

    /// Swaps the live adapter. The new device is opened before the old one is
    /// touched, so an unavailable device leaves the current one running. The
    /// old adapter's threads are stopped before the new adapter starts. If
    /// the new adapter then fails to start, the pointer takes over and the
    /// error is returned.
    pub fn change_device(&mut self, kind: DeviceKind, surface: Surface) -> Result<(), AdapterError> {
        if kind == self.current.kind() {
            debug!("{kind} already active");
            return Ok(());
        }

        let next = self.registry.create(kind, surface)?;
        if let Err(err) = self.install(next) {
            warn!("{kind} failed to start, falling back to Mouse: {err}");
            self.install(Box::new(PointerAdapter::new()))?;
            return Err(err);
        }
        info!("input device: {kind}");
        Ok(())
    }

    fn install(&mut self, mut next: Box<dyn InputAdapter>) -> Result<(), AdapterError> {
        self.current.deactivate();
        self.generation += 1;
        let sink = InputSink::new(self.tx.clone(), self.generation);
        let activated = next.activate(sink);
        if activated.is_err() {
            next.deactivate();
        }
        self.current = next;
        activated
    }

    /// Raw surface events go to the live adapter; only the pointer uses them.
    pub fn surface_event(&mut self, event: SurfaceEvent) {
        self.current.surface_event(event);
    }

    /// Converts an adapter event to surface pixels. Events tagged with an
    /// older generation come from a replaced adapter and are dropped.
    pub fn translate(&self, tagged: TaggedInput, surface: Surface) -> Option<PointerEvent> {
        if tagged.generation != self.generation {
            debug!(
                "dropping input from stale generation {} (current {})",
                tagged.generation, self.generation
            );
            return None;
        }
        let (x, y) = to_pixels(tagged.event.point, surface);
        Some(PointerEvent {
            action: tagged.event.action,
            x,
            y,
        })
    }

    pub fn shutdown(&mut self) {
        self.current.deactivate();
    }
}

impl Drop for InputHub {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Normalized coordinates to whole surface pixels.
pub fn to_pixels(point: NormalizedPoint, surface: Surface) -> (f64, f64) {
    (
        (point.x * surface.width).trunc(),
        (point.y * surface.height).trunc(),
    )
}
