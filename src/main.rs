mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};
use crossterm::{
    event::{
        DisableMouseCapture, EnableMouseCapture, KeyCode, KeyEvent, KeyModifiers, MouseButton,
        MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::Rect,
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::{Path, PathBuf},
    sync::mpsc,
    time::Duration,
};
use tracing::{error, info, warn};

use reflex::{
    app::{App, Frontend},
    app_dirs::AppDirs,
    config::{FileSettingsStore, Settings, SettingsStore},
    error::EngineError,
    export::{timestamped_name, ExportRequest, LogFormat},
    geometry::Surface,
    input::{
        replay::{ReplayGamepadBackend, ReplayHandBackend},
        DeviceKind, DeviceRegistry, PointerAction, PointerEvent, SurfaceEvent,
    },
    layout::{self, Layout},
    logging,
    machine::{Command, Phase},
    runtime::{spawn_terminal_reader, ChannelEventSource, EngineEvent, FixedTicker, Runner},
    session::Session,
    shape::{Geometry, ShapeKind, ShapeRecord, ShapeUpdate},
};

/// Redraw cadence while nothing else happens.
const HEARTBEAT_MS: u64 = 100;
const DEFAULT_LAYOUT: &str = "default";
/// Colours offered when recolouring a shape in edit mode.
const PALETTE: [&str; 8] = [
    "gray", "red", "blue", "yellow", "cyan", "magenta", "orange", "white",
];

/// reaction-time test: click the highlighted shape as fast as you can
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A reaction-time test harness: shapes are highlighted one after another and have to be clicked with the mouse, a gamepad or hand tracking before the countdown runs out. Click logs can be exported for analysis."
)]
pub struct Cli {
    /// layout file to load, or the name of a built-in layout
    #[clap(short = 'l', long)]
    layout: Option<String>,

    /// input device to start with
    #[clap(short = 'd', long, value_enum)]
    device: Option<DeviceArg>,

    /// run length in seconds, overriding the layout
    #[clap(short = 't', long)]
    timer: Option<u32>,

    /// logical surface width in pixels
    #[clap(long)]
    width: Option<f64>,

    /// logical surface height in pixels
    #[clap(long)]
    height: Option<f64>,

    /// directory for click-log and layout exports
    #[clap(long)]
    export_dir: Option<PathBuf>,

    /// replay hand tracking from a JSON-lines recording
    #[clap(long)]
    hand_replay: Option<PathBuf>,

    /// replay a gamepad from a JSON-lines recording
    #[clap(long)]
    gamepad_replay: Option<PathBuf>,

    /// enable debug logging (RUST_LOG is honoured)
    #[clap(long)]
    debug: bool,

    /// list the built-in layouts and exit
    #[clap(long)]
    list_layouts: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum DeviceArg {
    Mouse,
    HandTracking,
    Gamepad,
}

impl From<DeviceArg> for DeviceKind {
    fn from(arg: DeviceArg) -> Self {
        match arg {
            DeviceArg::Mouse => DeviceKind::Pointer,
            DeviceArg::HandTracking => DeviceKind::Gesture,
            DeviceArg::Gamepad => DeviceKind::Gamepad,
        }
    }
}

impl Cli {
    /// Command-line flags win over persisted settings.
    fn apply(&self, settings: &mut Settings) {
        if let Some(device) = self.device {
            settings.device = device.into();
        }
        if let Some(width) = self.width {
            settings.surface_width = width;
        }
        if let Some(height) = self.height {
            settings.surface_height = height;
        }
        if let Some(dir) = &self.export_dir {
            settings.export_dir = Some(dir.clone());
        }
        if let Some(path) = &self.hand_replay {
            settings.hand_replay = Some(path.clone());
        }
        if let Some(path) = &self.gamepad_replay {
            settings.gamepad_replay = Some(path.clone());
        }
    }
}

/// Front-end side of the engine: status text plus the shape dialogs, which
/// in the terminal become immediate actions.
#[derive(Debug, Default)]
pub struct TuiFrontend {
    pub message: String,
    pub selected: Option<String>,
    pending_create: Option<(i32, i32)>,
}

impl TuiFrontend {
    fn say(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }
}

impl Frontend for TuiFrontend {
    fn on_phase_changed(&mut self, phase: Phase) {
        self.selected = None;
        self.say(format!("{phase}"));
    }

    fn on_device_changed(&mut self, device: DeviceKind) {
        self.say(format!("input device: {device}"));
    }

    fn on_edit_shape(&mut self, id: &str, _x: i32, _y: i32) {
        self.selected = Some(id.to_string());
        self.say(format!("selected '{id}'"));
    }

    fn on_create_shape(&mut self, x: i32, y: i32) {
        self.pending_create = Some((x, y));
    }

    fn on_exported(&mut self, request: &ExportRequest) {
        self.say(format!("saved {}", request.path().display()));
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if cli.list_layouts {
        for name in layout::builtin_names() {
            println!("{name}");
        }
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let store = FileSettingsStore::new();
    let mut settings = store.load();
    cli.apply(&mut settings);

    logging::init(cli.debug, AppDirs::log_path().as_deref())?;
    info!("starting, settings from {}", store.path().display());

    let session = initial_session(&cli, &mut settings);
    let registry = registry(&settings);

    let (tx, rx) = mpsc::channel();
    spawn_terminal_reader(tx.clone())?;
    let mut app = App::new(
        session,
        settings.surface(),
        registry,
        tx,
        TuiFrontend::default(),
    );
    if settings.device != DeviceKind::Pointer {
        if let Err(err) = app.change_device(settings.device) {
            warn!("starting with Mouse: {err}");
        }
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(
        ChannelEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(HEARTBEAT_MS)),
    );
    let result = start_tui(&mut terminal, &mut app, &runner, &settings);
    app.shutdown();

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    settings.device = app.device();
    if let Err(err) = store.save(&settings) {
        error!("failed to save settings: {err}");
    }

    result
}

fn registry(settings: &Settings) -> DeviceRegistry {
    let mut registry = DeviceRegistry::new(settings.gamepad, settings.gesture);
    if let Some(path) = &settings.hand_replay {
        registry = registry.with_hand_tracker(Box::new(ReplayHandBackend::new(path)));
    }
    if let Some(path) = &settings.gamepad_replay {
        registry = registry.with_gamepad(Box::new(ReplayGamepadBackend::new(path)));
    }
    registry
}

/// Resolves `--layout` (a file or a built-in name), then the last layout
/// used, then the default built-in. A layout that fails to load is logged
/// and the next candidate is tried.
fn initial_session(cli: &Cli, settings: &mut Settings) -> Session {
    let requested = cli
        .layout
        .clone()
        .or_else(|| settings.last_layout.as_ref().map(|p| p.display().to_string()));

    let mut layout = requested
        .and_then(|name| match load_layout(&name) {
            Ok(layout) => {
                if Path::new(&name).is_file() {
                    settings.last_layout = Some(PathBuf::from(&name));
                }
                Some(layout)
            }
            Err(err) => {
                error!("could not load layout '{name}': {err}");
                None
            }
        })
        .or_else(|| layout::builtin(DEFAULT_LAYOUT).and_then(Result::ok))
        .unwrap_or(Layout {
            timer_duration: layout::DEFAULT_TIMER_SECS,
            shapes: Vec::new(),
        });

    if let Some(timer) = cli.timer {
        layout.timer_duration = timer;
    }

    Session::from_layout(&layout).unwrap_or_else(|err| {
        error!("invalid layout: {err}");
        Session::new()
    })
}

fn load_layout(name: &str) -> Result<Layout, Box<dyn Error>> {
    if Path::new(name).is_file() {
        return Ok(Layout::from_path(name)?);
    }
    match layout::builtin(name) {
        Some(layout) => Ok(layout?),
        None => Err(format!("no layout file or built-in layout named '{name}'").into()),
    }
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App<TuiFrontend>,
    runner: &Runner<ChannelEventSource, FixedTicker>,
    settings: &Settings,
) -> Result<(), Box<dyn Error>> {
    let mut shapes_made = 0usize;
    let mut layout_index = 0usize;
    let export_dir = settings.export_dir.clone().unwrap_or_else(AppDirs::export_dir);

    let area = terminal.size()?;
    let mut area = Rect::new(0, 0, area.width, area.height);
    terminal.draw(|f| ui::draw(f, app))?;

    loop {
        let event = {
            let scheduler = app.scheduler_mut();
            runner.step(scheduler)
        };

        let outcome = match event {
            EngineEvent::Key(key) => match handle_key(app, key, &export_dir, &mut layout_index) {
                KeyOutcome::Quit => break,
                KeyOutcome::Handled(result) => result,
            },
            EngineEvent::Mouse(mouse) => {
                surface_mouse(app, area, mouse);
                Ok(())
            }
            EngineEvent::Resize(width, height) => {
                area = Rect::new(0, 0, width, height);
                Ok(())
            }
            other => app.handle_event(other),
        };
        if let Err(err) = outcome {
            app.frontend_mut().say(err.to_string());
        }

        if let Some((x, y)) = app.frontend_mut().pending_create.take() {
            create_shape(app, x, y, &mut shapes_made);
        }

        terminal.draw(|f| ui::draw(f, app))?;
    }

    Ok(())
}

enum KeyOutcome {
    Quit,
    Handled(Result<(), EngineError>),
}

fn handle_key(
    app: &mut App<TuiFrontend>,
    key: KeyEvent,
    export_dir: &Path,
    layout_index: &mut usize,
) -> KeyOutcome {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return KeyOutcome::Quit;
    }

    let result = match (app.phase(), key.code) {
        (Phase::Idle, KeyCode::Char('q')) | (Phase::Idle, KeyCode::Esc) => {
            return KeyOutcome::Quit
        }
        (Phase::Idle, KeyCode::Char('s')) | (Phase::Idle, KeyCode::Enter) => {
            let region = app.surface().start_region();
            app.command(Command::Pointer(PointerEvent::new(
                PointerAction::Press,
                (region.x1 + region.x2) / 2.0,
                (region.y1 + region.y2) / 2.0,
            )))
        }
        (Phase::Idle, KeyCode::Char('e')) => app.command(Command::EnterEdit),
        (Phase::Idle, KeyCode::Tab) => {
            let devices = app.available_devices();
            let next = devices
                .iter()
                .position(|d| *d == app.device())
                .map_or(DeviceKind::Pointer, |i| devices[(i + 1) % devices.len()]);
            app.change_device(next)
        }
        (Phase::Idle, KeyCode::Char('l')) | (Phase::Editing, KeyCode::Char('l')) => {
            let names = layout::builtin_names();
            if names.is_empty() {
                Ok(())
            } else {
                *layout_index = (*layout_index + 1) % names.len();
                let name = names[*layout_index];
                match layout::builtin(name) {
                    Some(Ok(layout)) => app.command(Command::LoadLayout(layout)),
                    Some(Err(err)) => Err(err.into()),
                    None => Ok(()),
                }
            }
        }
        (Phase::Idle | Phase::Editing, KeyCode::Char(c @ ('c' | 'j'))) => {
            let format = if c == 'c' { LogFormat::Csv } else { LogFormat::Json };
            let name = timestamped_name("click_log", chrono::Local::now(), format);
            app.command(Command::Export(ExportRequest::ClickLog {
                path: export_dir.join(name),
                format,
            }))
        }
        (Phase::Idle | Phase::Editing, KeyCode::Char('w')) => {
            let name = format!("layout_{}.json", chrono::Local::now().format("%Y%m%d_%H%M%S"));
            app.command(Command::Export(ExportRequest::Layout {
                path: export_dir.join(name),
            }))
        }
        (Phase::Running, KeyCode::Esc) | (Phase::Running, KeyCode::Char('x')) => {
            app.command(Command::Stop)
        }
        (Phase::Editing, KeyCode::Esc) | (Phase::Editing, KeyCode::Char('x')) => {
            app.command(Command::ExitEdit)
        }
        (Phase::Editing, KeyCode::Char('u')) => app.command(Command::Undo),
        (Phase::Editing, KeyCode::Char('r')) => app.command(Command::Redo),
        (Phase::Editing, KeyCode::Char('+')) => {
            let secs = i64::from(app.session().timer_duration()) + 1;
            app.command(Command::SetTimer(secs))
        }
        (Phase::Editing, KeyCode::Char('-')) => {
            let secs = i64::from(app.session().timer_duration()) - 1;
            app.command(Command::SetTimer(secs))
        }
        (Phase::Editing, KeyCode::Char('d')) => match app.frontend().selected.clone() {
            Some(id) => {
                app.frontend_mut().selected = None;
                app.command(Command::DeleteShape(id))
            }
            None => Ok(()),
        },
        (Phase::Editing, KeyCode::Char(c @ ('<' | '>'))) => {
            let step = if c == '>' { 10 } else { -10 };
            match selected_update(app, |geometry| resized(geometry, step)) {
                Some((id, update)) => app.command(Command::UpdateShape { id, update }),
                None => Ok(()),
            }
        }
        (Phase::Editing, KeyCode::Char('k')) => match app.frontend().selected.clone() {
            Some(id) => {
                let current = app.session().shape(&id).map(|s| s.color.clone());
                let next = current
                    .and_then(|c| PALETTE.iter().position(|p| *p == c))
                    .map_or(PALETTE[0], |i| PALETTE[(i + 1) % PALETTE.len()]);
                let update = ShapeUpdate {
                    color: Some(next.to_string()),
                    ..ShapeUpdate::default()
                };
                app.command(Command::UpdateShape { id, update })
            }
            None => Ok(()),
        },
        _ => Ok(()),
    };
    KeyOutcome::Handled(result)
}

fn selected_update(
    app: &App<TuiFrontend>,
    change: impl Fn(Geometry) -> ShapeUpdate,
) -> Option<(String, ShapeUpdate)> {
    let id = app.frontend().selected.clone()?;
    let shape = app.session().shape(&id)?;
    Some((id, change(shape.geometry)))
}

fn grow(value: u32, step: i64) -> Option<u32> {
    u32::try_from((i64::from(value) + step).max(0)).ok()
}

fn resized(geometry: Geometry, step: i64) -> ShapeUpdate {
    let mut update = ShapeUpdate::default();
    match geometry {
        Geometry::Square { size } | Geometry::Triangle { size } => update.size = grow(size, step),
        Geometry::Circle { radius } => update.radius = grow(radius, step / 2),
        Geometry::Rectangle { width, height } => {
            update.width = grow(width, step);
            update.height = grow(height, step / 2);
        }
        Geometry::Ellipse { rx, ry } => {
            update.rx = grow(rx, step);
            update.ry = grow(ry, step / 2);
        }
    }
    update
}

/// A right click on empty space adds a shape there, cycling through the
/// kinds. Ids already taken are skipped.
fn create_shape(app: &mut App<TuiFrontend>, x: i32, y: i32, made: &mut usize) {
    let kind = ShapeKind::ALL[*made % ShapeKind::ALL.len()];
    *made += 1;

    for n in *made.. {
        let id = format!("{kind}_{n}");
        match app.command(Command::AddShape(ShapeRecord::new(kind, &id, x, y))) {
            Ok(()) => {
                app.frontend_mut().selected = Some(id.clone());
                app.frontend_mut().say(format!("added {kind} '{id}'"));
                return;
            }
            Err(EngineError::Shape(reflex::error::ShapeError::DuplicateId(_))) => continue,
            Err(err) => {
                app.frontend_mut().say(err.to_string());
                return;
            }
        }
    }
}

fn surface_mouse(app: &mut App<TuiFrontend>, area: Rect, mouse: MouseEvent) {
    let action = match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => PointerAction::Press,
        MouseEventKind::Up(MouseButton::Left) => PointerAction::Release,
        MouseEventKind::Down(MouseButton::Right) => PointerAction::Secondary,
        MouseEventKind::Drag(MouseButton::Left) | MouseEventKind::Moved => PointerAction::Move,
        _ => return,
    };
    let surface: Surface = app.surface();
    if let Some((x, y)) = ui::cell_to_surface(area, mouse.column, mouse.row, surface) {
        app.surface_event(SurfaceEvent {
            action,
            x,
            y,
            width: surface.width,
            height: surface.height,
        });
    }
}
