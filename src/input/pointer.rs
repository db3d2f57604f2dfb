use crate::error::AdapterError;

use super::{DeviceKind, InputAdapter, InputSink, NormalizedPoint, SurfaceEvent};

/// Mouse/trackpad on the drawable surface. Event-driven: no thread, the host
/// feeds it surface events and it forwards them while active.
#[derive(Debug, Default)]
pub struct PointerAdapter {
    sink: Option<InputSink>,
}

impl PointerAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.sink.is_some()
    }
}

/// Surface pixels to `[0, 1]` using the live surface size.
pub fn normalize(x: f64, y: f64, width: f64, height: f64) -> NormalizedPoint {
    let nx = if width > 0.0 { x / width } else { 0.0 };
    let ny = if height > 0.0 { y / height } else { 0.0 };
    NormalizedPoint::new(nx, ny)
}

impl InputAdapter for PointerAdapter {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Pointer
    }

    fn activate(&mut self, sink: InputSink) -> Result<(), AdapterError> {
        self.sink = Some(sink);
        Ok(())
    }

    fn deactivate(&mut self) {
        self.sink = None;
    }

    fn surface_event(&mut self, event: SurfaceEvent) {
        if let Some(sink) = &self.sink {
            let point = normalize(event.x, event.y, event.width, event.height);
            sink.emit(event.action, point);
        }
    }
}
