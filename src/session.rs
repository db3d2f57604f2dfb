use chrono::Utc;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    error::{ConfigError, ShapeError, TimerError},
    history::{History, Snapshot},
    layout::{Layout, DEFAULT_TIMER_SECS},
    shape::{Shape, ShapeRecord, ShapeUpdate, HIGHLIGHT_COLOR},
    util::{mean, std_dev},
};

/// What a renderer has to redraw. Timer changes are reported separately so
/// the countdown widget can be refreshed on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Shapes,
    Timer,
}

/// One click during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickRecord {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub target_id: String,
    pub x: i32,
    pub y: i32,
    #[serde(rename = "shape_hit")]
    pub hit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClickSummary {
    pub hits: usize,
    pub misses: usize,
    pub hit_rate: Option<f64>,
    /// Mean seconds between consecutive hits.
    pub mean_interval: Option<f64>,
    pub interval_std_dev: Option<f64>,
}

/// The session model: shapes in rotation order, the active target, the run
/// length, the click log and the undo/redo history.
#[derive(Debug)]
pub struct Session {
    shapes: Vec<Shape>,
    active: Option<String>,
    timer_duration: u32,
    click_log: Vec<ClickRecord>,
    history: History,
    pending: Vec<Change>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// An empty session whose history already holds its baseline snapshot.
    pub fn new() -> Self {
        let mut session = Self {
            shapes: Vec::new(),
            active: None,
            timer_duration: DEFAULT_TIMER_SECS,
            click_log: Vec::new(),
            history: History::default(),
            pending: Vec::new(),
        };
        session.history.commit(session.current_state());
        session
    }

    pub fn from_layout(layout: &Layout) -> Result<Self, ConfigError> {
        let mut session = Self::new();
        session.load_layout(layout)?;
        session.pending.clear();
        Ok(session)
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn shape(&self, id: &str) -> Option<&Shape> {
        self.shapes.iter().find(|s| s.id == id)
    }

    /// The live shape currently expected to be clicked.
    pub fn active_shape(&self) -> Option<&Shape> {
        self.active.as_deref().and_then(|id| self.shape(id))
    }

    pub fn timer_duration(&self) -> u32 {
        self.timer_duration
    }

    pub fn click_log(&self) -> &[ClickRecord] {
        &self.click_log
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Drains the change notifications raised since the last call.
    pub fn take_changes(&mut self) -> Vec<Change> {
        std::mem::take(&mut self.pending)
    }

    fn notify(&mut self, change: Change) {
        if !self.pending.contains(&change) {
            self.pending.push(change);
        }
    }

    pub fn add_shape(&mut self, record: &ShapeRecord) -> Result<&Shape, ShapeError> {
        let shape = Shape::from_record(record)?;
        if self.shape(&shape.id).is_some() {
            return Err(ShapeError::DuplicateId(shape.id));
        }

        debug!("added {} '{}'", shape.kind(), shape.id);
        self.shapes.push(shape);
        self.notify(Change::Shapes);
        Ok(&self.shapes[self.shapes.len() - 1])
    }

    pub fn delete_shape(&mut self, id: &str) -> Result<Shape, ShapeError> {
        let idx = self.position(id)?;
        let removed = self.shapes.remove(idx);
        if self.active.as_deref() == Some(id) {
            self.active = None;
        }
        self.notify(Change::Shapes);
        Ok(removed)
    }

    /// Applies a partial update in place. Renaming onto an id that another
    /// shape already uses fails and leaves the shape untouched.
    pub fn update_shape(&mut self, id: &str, update: &ShapeUpdate) -> Result<(), ShapeError> {
        let idx = self.position(id)?;
        if let Some(new_id) = update.id.as_deref() {
            if new_id.is_empty() {
                return Err(ShapeError::MissingId);
            }
            if new_id != id && self.shape(new_id).is_some() {
                return Err(ShapeError::DuplicateId(new_id.to_string()));
            }
        }

        self.shapes[idx].apply(update);
        if self.active.as_deref() == Some(id) {
            self.active = Some(self.shapes[idx].id.clone());
        }
        self.notify(Change::Shapes);
        Ok(())
    }

    fn position(&self, id: &str) -> Result<usize, ShapeError> {
        self.shapes
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| ShapeError::UnknownShape(id.to_string()))
    }

    /// Activates the next shape in rotation order, or the first one when
    /// nothing is active.
    pub fn next_active(&mut self) -> Option<&Shape> {
        if self.shapes.is_empty() {
            return None;
        }

        let next = match self.active.as_deref().and_then(|id| self.position(id).ok()) {
            Some(idx) => (idx + 1) % self.shapes.len(),
            None => 0,
        };
        self.active = Some(self.shapes[next].id.clone());
        self.notify(Change::Shapes);
        self.shapes.get(next)
    }

    pub fn clear_active(&mut self) {
        self.active = None;
        self.notify(Change::Shapes);
    }

    /// Logs a click against the active target. Callers only do this while a
    /// target is active; without one the click is dropped.
    pub fn register_click(&mut self, hit: bool, x: i32, y: i32) {
        let Some(target_id) = self.active.clone() else {
            warn!("click at ({x}, {y}) registered without an active shape");
            return;
        };

        let now = Utc::now();
        self.click_log.push(ClickRecord {
            timestamp: now.timestamp_micros() as f64 / 1_000_000.0,
            target_id,
            x,
            y,
            hit,
        });
    }

    pub fn clear_log(&mut self) {
        self.click_log.clear();
    }

    pub fn set_timer_duration(&mut self, seconds: i64) -> Result<(), TimerError> {
        let seconds = u32::try_from(seconds)
            .map_err(|_| TimerError::InvalidTimerValue(seconds.to_string()))?;
        self.timer_duration = seconds;
        self.notify(Change::Timer);
        info!("timer set to {seconds}s");
        Ok(())
    }

    fn current_state(&self) -> Snapshot {
        Snapshot {
            shapes: self.shapes.clone(),
            timer_duration: self.timer_duration,
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.shapes = snapshot.shapes;
        self.timer_duration = snapshot.timer_duration;
        self.notify(Change::Shapes);
        self.notify(Change::Timer);
    }

    /// Commits the current shapes and timer as a new history entry.
    pub fn snapshot(&mut self) {
        debug!("snapshot");
        let state = self.current_state();
        self.history.commit(state);
        self.notify(Change::Shapes);
        self.notify(Change::Timer);
    }

    /// Returns false when there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.history.undo().cloned() {
            Some(previous) => {
                self.restore(previous);
                debug!("undo");
                true
            }
            None => {
                info!("nothing to undo");
                false
            }
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo().cloned() {
            Some(next) => {
                self.restore(next);
                debug!("redo");
                true
            }
            None => {
                info!("nothing to redo");
                false
            }
        }
    }

    /// Replaces shapes and timer with `layout`. Either the whole layout is
    /// accepted or the session is left exactly as it was.
    pub fn load_layout(&mut self, layout: &Layout) -> Result<(), ConfigError> {
        let mut shapes: Vec<Shape> = Vec::with_capacity(layout.shapes.len());
        for record in &layout.shapes {
            let shape = Shape::from_record(record)?;
            if shapes.iter().any(|s| s.id == shape.id) {
                return Err(ShapeError::DuplicateId(shape.id).into());
            }
            if shape.color == HIGHLIGHT_COLOR {
                warn!(
                    "shape '{}' uses {}, which is also the highlight colour",
                    shape.id, HIGHLIGHT_COLOR
                );
            }
            shapes.push(shape);
        }

        self.shapes = shapes;
        self.timer_duration = layout.timer_duration;
        self.active = None;
        self.history.clear();
        self.snapshot();
        info!(
            "layout loaded: {} shapes, {}s",
            self.shapes.len(),
            self.timer_duration
        );
        Ok(())
    }

    pub fn to_layout(&self) -> Layout {
        Layout {
            timer_duration: self.timer_duration,
            shapes: self.shapes.iter().map(Shape::to_record).collect(),
        }
    }

    pub fn summary(&self) -> ClickSummary {
        let hits = self.click_log.iter().filter(|c| c.hit).count();
        let misses = self.click_log.len() - hits;
        let intervals = self
            .click_log
            .iter()
            .filter(|c| c.hit)
            .tuple_windows()
            .map(|(a, b)| b.timestamp - a.timestamp)
            .collect::<Vec<f64>>();

        ClickSummary {
            hits,
            misses,
            hit_rate: (!self.click_log.is_empty())
                .then(|| hits as f64 / self.click_log.len() as f64),
            mean_interval: mean(&intervals),
            interval_std_dev: std_dev(&intervals),
        }
    }
}
