use std::str::FromStr;

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Circle, Context, Line as Segment, Points, Rectangle},
        Block, Borders, Paragraph,
    },
    Frame,
};

use reflex::{
    app::App,
    geometry::{triangle_vertices, Surface},
    machine::Phase,
    shape::{Geometry, Shape, HIGHLIGHT_COLOR},
};

use crate::TuiFrontend;

const STATUS_LINES: u16 = 4;
/// Points used to outline an ellipse.
const ELLIPSE_STEPS: usize = 96;

fn split(area: Rect) -> (Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(STATUS_LINES)].as_ref())
        .split(area);
    (chunks[0], chunks[1])
}

/// Where the drawing surface lands inside the frame, excluding its border.
pub fn canvas_area(area: Rect) -> Rect {
    let (canvas, _) = split(area);
    Block::default().borders(Borders::ALL).inner(canvas)
}

/// Terminal cell to surface pixels, or `None` outside the canvas.
pub fn cell_to_surface(area: Rect, column: u16, row: u16, surface: Surface) -> Option<(f64, f64)> {
    let canvas = canvas_area(area);
    let inside = column >= canvas.x
        && column < canvas.x + canvas.width
        && row >= canvas.y
        && row < canvas.y + canvas.height;
    if !inside {
        return None;
    }

    let x = (f64::from(column - canvas.x) + 0.5) / f64::from(canvas.width) * surface.width;
    let y = (f64::from(row - canvas.y) + 0.5) / f64::from(canvas.height) * surface.height;
    Some((x, y))
}

/// Layout colour names to terminal colours. Names the terminal palette lacks
/// get an RGB approximation; anything else is drawn white.
pub fn color(name: &str) -> Color {
    if let Ok(color) = Color::from_str(name) {
        return color;
    }
    match name.to_ascii_lowercase().as_str() {
        "orange" => Color::Rgb(255, 165, 0),
        "purple" => Color::Rgb(128, 0, 128),
        "gold" => Color::Rgb(255, 215, 0),
        "tomato" => Color::Rgb(255, 99, 71),
        "steelblue" => Color::Rgb(70, 130, 180),
        "pink" => Color::Rgb(255, 192, 203),
        "brown" => Color::Rgb(165, 42, 42),
        _ => Color::White,
    }
}

/// Draws one shape; the canvas y axis points up, the surface y axis down.
fn draw_shape(ctx: &mut Context, shape: &Shape, surface: Surface, color: Color) {
    let x = f64::from(shape.x);
    let flip = |y: f64| surface.height - y;
    let y = f64::from(shape.y);

    match shape.geometry {
        Geometry::Square { size } => ctx.draw(&Rectangle {
            x,
            y: flip(y + f64::from(size)),
            width: f64::from(size),
            height: f64::from(size),
            color,
        }),
        Geometry::Rectangle { width, height } => ctx.draw(&Rectangle {
            x,
            y: flip(y + f64::from(height)),
            width: f64::from(width),
            height: f64::from(height),
            color,
        }),
        Geometry::Circle { radius } => {
            let r = f64::from(radius);
            ctx.draw(&Circle {
                x: x + r,
                y: flip(y + r),
                radius: r,
                color,
            });
        }
        Geometry::Triangle { size } => {
            let [a, b, c] = triangle_vertices(x, y, f64::from(size));
            for (from, to) in [(a, b), (b, c), (c, a)] {
                ctx.draw(&Segment {
                    x1: from.0,
                    y1: flip(from.1),
                    x2: to.0,
                    y2: flip(to.1),
                    color,
                });
            }
        }
        Geometry::Ellipse { rx, ry } => {
            let (rx, ry) = (f64::from(rx), f64::from(ry));
            let (cx, cy) = (x + rx, y + ry);
            let coords: Vec<(f64, f64)> = (0..ELLIPSE_STEPS)
                .map(|i| {
                    let t = i as f64 / ELLIPSE_STEPS as f64 * std::f64::consts::TAU;
                    (cx + rx * t.cos(), flip(cy + ry * t.sin()))
                })
                .collect();
            ctx.draw(&Points {
                coords: &coords,
                color,
            });
        }
    }
}

pub fn draw(f: &mut Frame, app: &App<TuiFrontend>) {
    let (canvas_rect, status_rect) = split(f.area());
    let surface = app.surface();
    let session = app.session();
    let phase = app.phase();
    let active = session.active_shape().map(|s| s.id.clone());
    let selected = app.frontend().selected.clone();
    let cursor = app.cursor();

    let title = match phase {
        Phase::Idle => " reflex ",
        Phase::Running => " reflex - running ",
        Phase::Editing => " reflex - editing ",
    };

    let canvas = Canvas::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .marker(Marker::Braille)
        .x_bounds([0.0, surface.width])
        .y_bounds([0.0, surface.height])
        .paint(|ctx| {
            for shape in session.shapes() {
                let shape_color = if active.as_deref() == Some(shape.id.as_str()) {
                    color(HIGHLIGHT_COLOR)
                } else if phase == Phase::Editing && selected.as_deref() == Some(shape.id.as_str()) {
                    Color::Yellow
                } else {
                    color(&shape.color)
                };
                draw_shape(ctx, shape, surface, shape_color);
            }

            if phase == Phase::Idle {
                let region = surface.start_region();
                ctx.draw(&Rectangle {
                    x: region.x1,
                    y: surface.height - region.y2,
                    width: region.x2 - region.x1,
                    height: region.y2 - region.y1,
                    color: Color::Green,
                });
                ctx.print(
                    region.x1 + (region.x2 - region.x1) * 0.4,
                    surface.height - (region.y1 + region.y2) / 2.0,
                    Span::styled("START", Style::default().add_modifier(Modifier::BOLD)),
                );
            }

            if phase == Phase::Editing {
                for shape in session.shapes() {
                    ctx.print(
                        f64::from(shape.x),
                        surface.height - f64::from(shape.y),
                        Span::styled(shape.id.clone(), Style::default().fg(Color::DarkGray)),
                    );
                }
            }

            let marker = if cursor.pressed { "●" } else { "+" };
            ctx.print(cursor.x, surface.height - cursor.y, marker);
        });
    f.render_widget(canvas, canvas_rect);

    f.render_widget(status(app), status_rect);
}

fn status(app: &App<TuiFrontend>) -> Paragraph<'static> {
    let session = app.session();
    let summary = session.summary();
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().add_modifier(Modifier::DIM);

    let device = if app.device_locked() {
        format!("{} (locked)", app.device())
    } else {
        app.device().to_string()
    };
    let rate = summary
        .hit_rate
        .map_or_else(|| "-".to_string(), |r| format!("{:.0}%", r * 100.0));
    let interval = summary
        .mean_interval
        .map_or_else(|| "-".to_string(), |m| format!("{m:.2}s"));

    let first = Line::from(vec![
        Span::styled(format!("{}  ", app.phase()), bold),
        Span::raw(format!("time {}s  ", app.countdown())),
        Span::raw(format!("device {device}  ")),
        Span::raw(format!(
            "hits {} misses {} rate {rate} avg {interval}",
            summary.hits, summary.misses
        )),
    ]);

    let help = match app.phase() {
        Phase::Idle => "click START or (s)tart | (e)dit | (tab) device | (l)ayout | export (c)sv (j)son | (w)rite layout | (q)uit",
        Phase::Running => "click the green shape | (esc) stop",
        Phase::Editing => "drag to move | right-click to add/select | (d)elete (< >) size (k) colour | (+/-) timer | (u)ndo (r)edo | (esc) done",
    };
    let undo = match (session.can_undo(), session.can_redo()) {
        (true, true) => "undo/redo available",
        (true, false) => "undo available",
        (false, true) => "redo available",
        (false, false) => "",
    };

    Paragraph::new(vec![
        first,
        Line::from(Span::raw(app.frontend().message.clone())),
        Line::from(Span::styled(help, dim)),
        Line::from(Span::styled(undo, dim)),
    ])
    .alignment(Alignment::Left)
}
