use std::sync::mpsc::Sender;

use tracing::{debug, error, warn};

use crate::{
    error::EngineError,
    export::{self, ExportRequest},
    geometry::Surface,
    input::{DeviceKind, DeviceRegistry, InputHub, PointerAction, PointerEvent, SurfaceEvent},
    machine::{Command, Effect, Machine, Phase},
    runtime::{EngineEvent, TickScheduler},
    session::{Change, Session},
};

/// Collaborators outside the engine: the renderer and the shape dialogs.
/// Every method has a no-op default so a front end implements only what it
/// shows.
pub trait Frontend {
    fn on_shapes_changed(&mut self) {}
    fn on_timer_changed(&mut self) {}
    fn on_countdown(&mut self, _seconds: u32) {}
    fn on_phase_changed(&mut self, _phase: Phase) {}
    fn on_device_changed(&mut self, _device: DeviceKind) {}
    fn on_device_selection(&mut self, _locked: bool) {}
    fn on_edit_shape(&mut self, _id: &str, _x: i32, _y: i32) {}
    fn on_create_shape(&mut self, _x: i32, _y: i32) {}
    fn on_exported(&mut self, _request: &ExportRequest) {}
}

/// Front end that ignores everything.
#[derive(Debug, Default)]
pub struct NullFrontend;

impl Frontend for NullFrontend {}

/// Last pointer position in surface pixels, for cursor feedback.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Cursor {
    pub x: f64,
    pub y: f64,
    pub pressed: bool,
}

/// Host loop state: owns the model, the machine and the input devices, and
/// carries out the machine's effects.
pub struct App<F: Frontend> {
    session: Session,
    machine: Machine,
    hub: InputHub,
    scheduler: TickScheduler,
    cursor: Cursor,
    countdown: u32,
    device_locked: bool,
    frontend: F,
}

impl<F: Frontend> App<F> {
    pub fn new(
        session: Session,
        surface: Surface,
        registry: DeviceRegistry,
        tx: Sender<EngineEvent>,
        frontend: F,
    ) -> Self {
        let countdown = session.timer_duration();
        Self {
            session,
            machine: Machine::new(surface),
            hub: InputHub::new(registry, tx),
            scheduler: TickScheduler::new(),
            cursor: Cursor::default(),
            countdown,
            device_locked: false,
            frontend,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn phase(&self) -> Phase {
        self.machine.phase()
    }

    pub fn surface(&self) -> Surface {
        self.machine.surface()
    }

    pub fn device(&self) -> DeviceKind {
        self.hub.current()
    }

    pub fn available_devices(&self) -> Vec<DeviceKind> {
        self.hub.available()
    }

    pub fn device_locked(&self) -> bool {
        self.device_locked
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Seconds shown on the countdown widget.
    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    pub fn frontend(&self) -> &F {
        &self.frontend
    }

    pub fn frontend_mut(&mut self) -> &mut F {
        &mut self.frontend
    }

    pub fn scheduler_mut(&mut self) -> &mut TickScheduler {
        &mut self.scheduler
    }

    pub fn command(&mut self, command: Command) -> Result<(), EngineError> {
        let effects = self
            .machine
            .handle(&mut self.session, command)
            .inspect_err(|err| warn!("{err}"))?;
        self.apply(effects)
    }

    /// Feeds one runner event through the machine. Keys, terminal mouse
    /// events and resizes belong to the front end and are ignored here.
    pub fn handle_event(&mut self, event: EngineEvent) -> Result<(), EngineError> {
        match event {
            EngineEvent::Input(tagged) => {
                match self.hub.translate(tagged, self.machine.surface()) {
                    Some(pointer) => self.pointer(pointer),
                    None => Ok(()),
                }
            }
            EngineEvent::Tick(token) => self.command(Command::Tick(token)),
            EngineEvent::Key(_)
            | EngineEvent::Mouse(_)
            | EngineEvent::Resize(..)
            | EngineEvent::Heartbeat => Ok(()),
        }
    }

    fn pointer(&mut self, event: PointerEvent) -> Result<(), EngineError> {
        self.cursor.x = event.x;
        self.cursor.y = event.y;
        match event.action {
            PointerAction::Press => self.cursor.pressed = true,
            PointerAction::Release => self.cursor.pressed = false,
            PointerAction::Move | PointerAction::Secondary => {}
        }
        self.command(Command::Pointer(event))
    }

    /// Raw pointer activity on the drawing surface.
    pub fn surface_event(&mut self, event: SurfaceEvent) {
        self.hub.surface_event(event);
    }

    pub fn resize(&mut self, surface: Surface) -> Result<(), EngineError> {
        self.command(Command::Resize(surface))
    }

    pub fn change_device(&mut self, kind: DeviceKind) -> Result<(), EngineError> {
        self.command(Command::ChangeDevice(kind))
    }

    /// Runs every effect even when one fails; the first failure is returned.
    fn apply(&mut self, effects: Vec<Effect>) -> Result<(), EngineError> {
        let mut first_error = None;

        for effect in effects {
            debug!("effect {effect:?}");
            if let Err(err) = self.apply_one(effect) {
                error!("{err}");
                first_error.get_or_insert(err);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    fn apply_one(&mut self, effect: Effect) -> Result<(), EngineError> {
        match effect {
            Effect::Notify(Change::Shapes) => self.frontend.on_shapes_changed(),
            Effect::Notify(Change::Timer) => {
                if self.machine.phase() != Phase::Running {
                    self.countdown = self.session.timer_duration();
                }
                self.frontend.on_timer_changed();
            }
            Effect::PhaseChanged(phase) => self.frontend.on_phase_changed(phase),
            Effect::Countdown(seconds) => {
                self.countdown = seconds;
                self.frontend.on_countdown(seconds);
            }
            Effect::ScheduleTick { token, after } => self.scheduler.schedule(token, after),
            Effect::CancelTick(token) => self.scheduler.cancel(token),
            Effect::SwitchDevice(kind) => {
                let switched = self.hub.change_device(kind, self.machine.surface());
                self.frontend.on_device_changed(self.hub.current());
                switched?;
            }
            Effect::DeviceSelection { locked } => {
                self.device_locked = locked;
                self.frontend.on_device_selection(locked);
            }
            Effect::EditShapeRequested { id, x, y } => self.frontend.on_edit_shape(&id, x, y),
            Effect::CreateShapeRequested { x, y } => self.frontend.on_create_shape(x, y),
            Effect::Export(request) => {
                export::export(&request, &self.session).map_err(EngineError::Export)?;
                self.frontend.on_exported(&request);
            }
        }
        Ok(())
    }

    /// Stops device threads and drops pending ticks.
    pub fn shutdown(&mut self) {
        self.hub.shutdown();
        self.scheduler.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::AdapterError,
        export::LogFormat,
        layout::Layout,
        shape::{ShapeKind, ShapeRecord},
    };
    use assert_matches::assert_matches;
    use std::{
        io,
        sync::{
            mpsc::{self, Receiver},
            Arc, Mutex,
        },
    };

    #[derive(Debug, Default)]
    struct Recorder {
        shapes_changed: usize,
        timer_changed: usize,
        phases: Vec<Phase>,
        created: Vec<(i32, i32)>,
        exported: usize,
    }

    impl Frontend for Recorder {
        fn on_shapes_changed(&mut self) {
            self.shapes_changed += 1;
        }
        fn on_timer_changed(&mut self) {
            self.timer_changed += 1;
        }
        fn on_phase_changed(&mut self, phase: Phase) {
            self.phases.push(phase);
        }
        fn on_create_shape(&mut self, x: i32, y: i32) {
            self.created.push((x, y));
        }
        fn on_exported(&mut self, _request: &ExportRequest) {
            self.exported += 1;
        }
    }

    fn layout() -> Layout {
        let mut record = ShapeRecord::new(ShapeKind::Circle, "c", 0, 0);
        record.radius = Some(50);
        Layout {
            timer_duration: 3,
            shapes: vec![record],
        }
    }

    fn app() -> (App<Recorder>, Receiver<EngineEvent>) {
        let (tx, rx) = mpsc::channel();
        let session = Session::from_layout(&layout()).unwrap();
        let app = App::new(
            session,
            Surface::new(800.0, 600.0),
            DeviceRegistry::default(),
            tx,
            Recorder::default(),
        );
        (app, rx)
    }

    /// Pushes a surface event through the pointer adapter and back in.
    fn surface(app: &mut App<Recorder>, rx: &Receiver<EngineEvent>, action: PointerAction, x: f64, y: f64) {
        app.surface_event(SurfaceEvent {
            action,
            x,
            y,
            width: 800.0,
            height: 600.0,
        });
        let event = rx.try_recv().unwrap();
        app.handle_event(event).unwrap();
    }

    #[test]
    fn test_pointer_round_trip_starts_a_run() {
        let (mut app, rx) = app();
        surface(&mut app, &rx, PointerAction::Move, 400.0, 300.0);
        assert_eq!(app.cursor(), Cursor { x: 400.0, y: 300.0, pressed: false });

        surface(&mut app, &rx, PointerAction::Press, 400.0, 300.0);
        assert!(app.cursor().pressed);
        assert_eq!(app.phase(), Phase::Running);
        assert_eq!(app.countdown(), 3);
        assert!(app.device_locked());
        assert!(!app.scheduler_mut().is_empty());
        assert_eq!(app.frontend().phases, vec![Phase::Running]);

        surface(&mut app, &rx, PointerAction::Press, 25.0, 75.0);
        assert_eq!(app.session().click_log().len(), 1);
        assert!(app.session().click_log()[0].hit);

        app.command(Command::Stop).unwrap();
        assert_eq!(app.phase(), Phase::Idle);
        assert!(app.scheduler_mut().is_empty());
        assert!(!app.device_locked());
    }

    #[test]
    fn test_unavailable_device_reports_error_and_keeps_pointer() {
        let (mut app, _rx) = app();
        assert_matches!(
            app.change_device(DeviceKind::Gamepad),
            Err(EngineError::Adapter(AdapterError::Unavailable(DeviceKind::Gamepad)))
        );
        assert_eq!(app.device(), DeviceKind::Pointer);
    }

    #[test]
    fn test_timer_edit_updates_idle_countdown() {
        let (mut app, _rx) = app();
        app.command(Command::EnterEdit).unwrap();
        app.command(Command::SetTimer(42)).unwrap();
        assert_eq!(app.countdown(), 42);
        assert!(app.frontend().timer_changed > 0);
    }

    #[test]
    fn test_secondary_click_while_editing_asks_for_new_shape() {
        let (mut app, rx) = app();
        app.command(Command::EnterEdit).unwrap();
        surface(&mut app, &rx, PointerAction::Secondary, 500.0, 400.0);
        assert_eq!(app.frontend().created, vec![(500, 400)]);
    }

    #[test]
    fn test_export_writes_click_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clicks.csv");
        let (mut app, _rx) = app();

        app.command(Command::Export(ExportRequest::ClickLog {
            path: path.clone(),
            format: LogFormat::Csv,
        }))
        .unwrap();

        assert_eq!(app.frontend().exported, 1);
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.starts_with("timestamp,target_id,x,y,shape_hit"));
    }

    #[test]
    fn test_failed_export_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _rx) = app();
        // a directory cannot be opened as a file
        let result = app.command(Command::Export(ExportRequest::Layout {
            path: dir.path().to_path_buf(),
        }));
        assert_matches!(result, Err(EngineError::Export(_)));
        assert_eq!(app.frontend().exported, 0);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_rejected_command_is_logged() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let (mut app, _rx) = app();

        tracing::subscriber::with_default(subscriber, || {
            app.command(Command::EnterEdit).unwrap();
            let duplicate = ShapeRecord::new(ShapeKind::Circle, "c", 5, 5);
            assert_matches!(
                app.command(Command::AddShape(duplicate)),
                Err(EngineError::Shape(_))
            );
        });

        let text = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("WARN"));
        assert!(text.contains("duplicate shape id 'c'"));
    }
}
