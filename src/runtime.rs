use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent, MouseEvent};
use tracing::debug;

use crate::input::TaggedInput;

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum EngineEvent {
    /// Normalized input from whichever device is active
    Input(TaggedInput),
    Key(KeyEvent),
    /// Raw terminal mouse event, routed to the pointer adapter
    Mouse(MouseEvent),
    Resize(u16, u16),
    /// A scheduled one-shot tick came due
    Tick(TickToken),
    /// Nothing happened within the heartbeat interval
    Heartbeat,
}

/// Source of engine events (terminal, input adapters, tests)
pub trait EngineEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&self, timeout: Duration) -> Result<EngineEvent, RecvTimeoutError>;
}

/// Event source over the shared engine channel
pub struct ChannelEventSource {
    rx: Receiver<EngineEvent>,
}

impl ChannelEventSource {
    pub fn new(rx: Receiver<EngineEvent>) -> Self {
        Self { rx }
    }
}

impl EngineEventSource for ChannelEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<EngineEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Forwards crossterm key, mouse and resize events into the engine channel.
/// The thread exits once the channel closes or the terminal read fails.
pub fn spawn_terminal_reader(tx: Sender<EngineEvent>) -> std::io::Result<()> {
    thread::Builder::new()
        .name("terminal-events".into())
        .spawn(move || loop {
            let forwarded = match event::read() {
                Ok(CtEvent::Key(key)) => tx.send(EngineEvent::Key(key)),
                Ok(CtEvent::Mouse(mouse)) => tx.send(EngineEvent::Mouse(mouse)),
                Ok(CtEvent::Resize(w, h)) => tx.send(EngineEvent::Resize(w, h)),
                Ok(_) => Ok(()),
                Err(err) => {
                    debug!("terminal read failed: {err}");
                    break;
                }
            };
            if forwarded.is_err() {
                break;
            }
        })?;
    Ok(())
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Identifies one scheduled tick. Ticks that arrive after being superseded
/// carry a token nobody is waiting for anymore.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickToken(pub u64);

/// One-shot timers driven by the runner.
#[derive(Debug, Default)]
pub struct TickScheduler {
    pending: Vec<(Instant, TickToken)>,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, token: TickToken, after: Duration) {
        self.schedule_at(token, Instant::now() + after);
    }

    pub fn schedule_at(&mut self, token: TickToken, at: Instant) {
        self.pending.retain(|(_, t)| *t != token);
        self.pending.push((at, token));
    }

    pub fn cancel(&mut self, token: TickToken) {
        self.pending.retain(|(_, t)| *t != token);
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn is_pending(&self, token: TickToken) -> bool {
        self.pending.iter().any(|(_, t)| *t == token)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Removes and returns the earliest tick due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<TickToken> {
        let idx = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, (at, _))| *at <= now)
            .min_by_key(|(_, (at, _))| *at)
            .map(|(idx, _)| idx)?;
        Some(self.pending.swap_remove(idx).1)
    }

    pub fn until_next(&self, now: Instant) -> Option<Duration> {
        self.pending
            .iter()
            .map(|(at, _)| at.saturating_duration_since(now))
            .min()
    }
}

/// Runner that advances the application one event/tick at a time
pub struct Runner<E: EngineEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: EngineEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Returns a due tick if there is one, otherwise blocks until the next
    /// event, the next scheduled tick or the heartbeat interval, whichever
    /// comes first.
    pub fn step(&self, scheduler: &mut TickScheduler) -> EngineEvent {
        let now = Instant::now();
        if let Some(token) = scheduler.pop_due(now) {
            return EngineEvent::Tick(token);
        }

        let wait = scheduler
            .until_next(now)
            .map_or(self.ticker.interval(), |d| d.min(self.ticker.interval()));

        match self.event_source.recv_timeout(wait) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) => scheduler
                .pop_due(Instant::now())
                .map_or(EngineEvent::Heartbeat, EngineEvent::Tick),
            Err(RecvTimeoutError::Disconnected) => {
                // Nobody left to send; keep pacing so ticks still fire.
                thread::sleep(wait);
                scheduler
                    .pop_due(Instant::now())
                    .map_or(EngineEvent::Heartbeat, EngineEvent::Tick)
            }
        }
    }
}
