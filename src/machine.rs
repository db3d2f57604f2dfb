//! Idle / Running / Editing.
//!
//! The machine never performs I/O. Each command mutates the session and
//! yields a list of effects for the host to carry out: redraws, timer
//! scheduling, device switches, dialogs and exports.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::{
    error::EngineError,
    export::ExportRequest,
    geometry::{contains, hit_test, Surface},
    input::{DeviceKind, PointerAction, PointerEvent},
    layout::Layout,
    runtime::TickToken,
    session::{Change, Session},
    shape::{ShapeRecord, ShapeUpdate},
};

/// Countdown resolution.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Phase {
    Idle,
    Running,
    Editing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Pointer(PointerEvent),
    Tick(TickToken),
    Resize(Surface),
    Stop,
    EnterEdit,
    ExitEdit,
    ChangeDevice(DeviceKind),
    AddShape(ShapeRecord),
    UpdateShape { id: String, update: ShapeUpdate },
    DeleteShape(String),
    SetTimer(i64),
    Undo,
    Redo,
    LoadLayout(Layout),
    Export(ExportRequest),
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Pointer(_) => "pointer",
            Command::Tick(_) => "tick",
            Command::Resize(_) => "resize",
            Command::Stop => "stop",
            Command::EnterEdit => "edit mode",
            Command::ExitEdit => "exit edit mode",
            Command::ChangeDevice(_) => "change device",
            Command::AddShape(_) => "add shape",
            Command::UpdateShape { .. } => "update shape",
            Command::DeleteShape(_) => "delete shape",
            Command::SetTimer(_) => "set timer",
            Command::Undo => "undo",
            Command::Redo => "redo",
            Command::LoadLayout(_) => "load layout",
            Command::Export(_) => "export",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Notify(Change),
    PhaseChanged(Phase),
    /// Seconds to show on the countdown widget.
    Countdown(u32),
    ScheduleTick { token: TickToken, after: Duration },
    CancelTick(TickToken),
    SwitchDevice(DeviceKind),
    DeviceSelection { locked: bool },
    /// Secondary click on a shape while editing.
    EditShapeRequested { id: String, x: i32, y: i32 },
    /// Secondary click on empty space while editing.
    CreateShapeRequested { x: i32, y: i32 },
    Export(ExportRequest),
}

#[derive(Debug, Clone, PartialEq)]
struct Drag {
    id: String,
    offset: (f64, f64),
}

#[derive(Debug)]
enum State {
    Idle,
    Running { remaining: u32, tick: Option<TickToken> },
    Editing { drag: Option<Drag> },
}

#[derive(Debug)]
pub struct Machine {
    state: State,
    surface: Surface,
    last_token: u64,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new(Surface::default())
    }
}

impl Machine {
    pub fn new(surface: Surface) -> Self {
        Self {
            state: State::Idle,
            surface,
            last_token: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            State::Idle => Phase::Idle,
            State::Running { .. } => Phase::Running,
            State::Editing { .. } => Phase::Editing,
        }
    }

    pub fn surface(&self) -> Surface {
        self.surface
    }

    /// Seconds left in the current run.
    pub fn remaining(&self) -> Option<u32> {
        match self.state {
            State::Running { remaining, .. } => Some(remaining),
            _ => None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, State::Editing { drag: Some(_) })
    }

    /// Applies `command` to `session`. Commands that make no sense in the
    /// current phase are logged and ignored. Validation errors leave the
    /// session unchanged and are returned to the caller.
    pub fn handle(
        &mut self,
        session: &mut Session,
        command: Command,
    ) -> Result<Vec<Effect>, EngineError> {
        let mut effects = Vec::new();

        match (self.phase(), command) {
            (_, Command::Resize(surface)) => self.surface = surface,
            (Phase::Idle, command) => self.idle(session, command, &mut effects)?,
            (Phase::Running, command) => self.running(session, command, &mut effects),
            (Phase::Editing, command) => self.editing(session, command, &mut effects)?,
        }

        effects.extend(session.take_changes().into_iter().map(Effect::Notify));
        Ok(effects)
    }

    fn idle(
        &mut self,
        session: &mut Session,
        command: Command,
        effects: &mut Vec<Effect>,
    ) -> Result<(), EngineError> {
        match command {
            Command::Pointer(PointerEvent {
                action: PointerAction::Press,
                x,
                y,
            }) => {
                if self.surface.start_region().contains(x, y) {
                    self.start(session, effects);
                }
            }
            Command::Pointer(_) => {}
            Command::Tick(token) => debug!("ignoring tick {token:?} while idle"),
            Command::ChangeDevice(kind) => effects.push(Effect::SwitchDevice(kind)),
            Command::EnterEdit => self.enter_editing(effects),
            Command::LoadLayout(layout) => session.load_layout(&layout)?,
            Command::Export(request) => effects.push(Effect::Export(request)),
            other => reject(Phase::Idle, &other),
        }
        Ok(())
    }

    fn running(&mut self, session: &mut Session, command: Command, effects: &mut Vec<Effect>) {
        match command {
            Command::Pointer(PointerEvent {
                action: PointerAction::Press,
                x,
                y,
            }) => click(session, x, y),
            Command::Pointer(_) => {}
            Command::Tick(token) => {
                if let State::Running {
                    tick: Some(armed), ..
                } = self.state
                {
                    if armed == token {
                        self.countdown(session, effects);
                        return;
                    }
                }
                debug!("ignoring stale tick {token:?}");
            }
            Command::Stop => self.stop(session, effects),
            other => reject(Phase::Running, &other),
        }
    }

    fn editing(
        &mut self,
        session: &mut Session,
        command: Command,
        effects: &mut Vec<Effect>,
    ) -> Result<(), EngineError> {
        match command {
            Command::Pointer(event) => self.edit_pointer(session, event, effects)?,
            Command::Tick(token) => debug!("ignoring tick {token:?} while editing"),
            Command::ExitEdit => self.enter_idle(effects),
            Command::AddShape(record) => {
                session.add_shape(&record)?;
                session.snapshot();
            }
            Command::UpdateShape { id, update } => {
                session.update_shape(&id, &update)?;
                session.snapshot();
            }
            Command::DeleteShape(id) => {
                session.delete_shape(&id)?;
                session.snapshot();
            }
            Command::SetTimer(seconds) => {
                session.set_timer_duration(seconds)?;
                session.snapshot();
            }
            Command::Undo => {
                session.undo();
            }
            Command::Redo => {
                session.redo();
            }
            Command::LoadLayout(layout) => session.load_layout(&layout)?,
            Command::Export(request) => effects.push(Effect::Export(request)),
            other => reject(Phase::Editing, &other),
        }
        self.forget_missing_drag(session);
        Ok(())
    }

    /// Undo, redo, delete, rename or a layout load can remove the shape
    /// being dragged.
    fn forget_missing_drag(&mut self, session: &Session) {
        if let State::Editing { drag } = &mut self.state {
            if drag.as_ref().is_some_and(|d| session.shape(&d.id).is_none()) {
                debug!("dragged shape is gone, dropping the drag");
                *drag = None;
            }
        }
    }

    fn edit_pointer(
        &mut self,
        session: &mut Session,
        event: PointerEvent,
        effects: &mut Vec<Effect>,
    ) -> Result<(), EngineError> {
        let State::Editing { drag } = &mut self.state else {
            return Ok(());
        };
        let PointerEvent { action, x, y } = event;

        match action {
            PointerAction::Press => {
                *drag = hit_test(session.shapes(), x, y).map(|shape| Drag {
                    id: shape.id.clone(),
                    offset: (x - f64::from(shape.x), y - f64::from(shape.y)),
                });
            }
            PointerAction::Move => {
                if let Some(drag) = drag {
                    session.update_shape(&drag.id, &drag_to(drag, x, y))?;
                }
            }
            PointerAction::Release => {
                if let Some(drag) = drag.take() {
                    session.update_shape(&drag.id, &drag_to(&drag, x, y))?;
                    session.snapshot();
                }
            }
            PointerAction::Secondary => {
                let (px, py) = (x as i32, y as i32);
                effects.push(match hit_test(session.shapes(), x, y) {
                    Some(shape) => Effect::EditShapeRequested {
                        id: shape.id.clone(),
                        x: px,
                        y: py,
                    },
                    None => Effect::CreateShapeRequested { x: px, y: py },
                });
            }
        }
        Ok(())
    }

    fn next_token(&mut self) -> TickToken {
        self.last_token += 1;
        TickToken(self.last_token)
    }

    fn start(&mut self, session: &mut Session, effects: &mut Vec<Effect>) {
        if session.shapes().is_empty() {
            warn!("cannot start test without shapes");
            return;
        }

        session.clear_log();
        session.next_active();
        self.state = State::Running {
            remaining: session.timer_duration(),
            tick: None,
        };
        effects.push(Effect::PhaseChanged(Phase::Running));
        effects.push(Effect::DeviceSelection { locked: true });
        info!("entered running state");
        self.countdown(session, effects);
    }

    /// Shows the remaining time and arms the next tick, or stops the run
    /// once nothing is left.
    fn countdown(&mut self, session: &mut Session, effects: &mut Vec<Effect>) {
        let State::Running { remaining, .. } = self.state else {
            return;
        };
        if remaining == 0 {
            self.stop(session, effects);
            return;
        }

        let token = self.next_token();
        self.state = State::Running {
            remaining: remaining - 1,
            tick: Some(token),
        };
        effects.push(Effect::Countdown(remaining));
        effects.push(Effect::ScheduleTick {
            token,
            after: TICK_INTERVAL,
        });
    }

    fn stop(&mut self, session: &mut Session, effects: &mut Vec<Effect>) {
        if let State::Running {
            tick: Some(token), ..
        } = self.state
        {
            effects.push(Effect::CancelTick(token));
        }
        session.clear_active();
        effects.push(Effect::Countdown(session.timer_duration()));
        info!("test stopped, {} clicks logged", session.click_log().len());
        self.enter_idle(effects);
    }

    fn enter_idle(&mut self, effects: &mut Vec<Effect>) {
        self.state = State::Idle;
        effects.push(Effect::PhaseChanged(Phase::Idle));
        effects.push(Effect::DeviceSelection { locked: false });
        info!("entered idle state");
    }

    fn enter_editing(&mut self, effects: &mut Vec<Effect>) {
        self.state = State::Editing { drag: None };
        effects.push(Effect::PhaseChanged(Phase::Editing));
        effects.push(Effect::SwitchDevice(DeviceKind::Pointer));
        effects.push(Effect::DeviceSelection { locked: true });
        info!("entered edit state");
    }
}

/// Tests the press against the active target only. A hit advances the
/// rotation, a miss keeps the same target.
fn click(session: &mut Session, x: f64, y: f64) {
    let Some(hit) = session.active_shape().map(|shape| contains(shape, x, y)) else {
        warn!("click while running without an active shape");
        return;
    };

    session.register_click(hit, x as i32, y as i32);
    if hit {
        debug!("active shape clicked");
        session.next_active();
    } else {
        debug!("active shape missed");
    }
}

fn drag_to(drag: &Drag, x: f64, y: f64) -> ShapeUpdate {
    ShapeUpdate::position((x - drag.offset.0) as i32, (y - drag.offset.1) as i32)
}

fn reject(phase: Phase, command: &Command) {
    info!("{} is not available while {phase}", command.name());
}
