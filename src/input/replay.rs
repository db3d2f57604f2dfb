//! Device backends fed from recorded JSON-lines files.
//!
//! Hand tracking recordings hold one frame per line: a 21-landmark array or
//! `null` when no hand was visible. Gamepad recordings hold one batch of raw
//! events per line. Both are consumed at the device's natural pace.

use std::{
    fs::File,
    io::{self, BufRead, BufReader, Lines},
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use tracing::debug;

use super::{
    gamepad::{GamepadBackend, GamepadSource, RawGamepadEvent},
    gesture::{HandLandmarks, HandTracker, HandTrackerBackend},
};

/// Frame spacing of recorded hand tracking, roughly 30 fps.
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

fn open_lines(path: &Path) -> io::Result<Lines<BufReader<File>>> {
    Ok(BufReader::new(File::open(path)?).lines())
}

fn invalid(err: serde_json::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

pub struct ReplayHandTracker<R> {
    lines: Lines<R>,
    frame_interval: Duration,
}

impl<R: BufRead> ReplayHandTracker<R> {
    pub fn new(reader: R, frame_interval: Duration) -> Self {
        Self {
            lines: reader.lines(),
            frame_interval,
        }
    }
}

impl<R: BufRead + Send + 'static> HandTracker for ReplayHandTracker<R> {
    fn next_frame(&mut self) -> io::Result<Option<HandLandmarks>> {
        thread::sleep(self.frame_interval);
        match self.lines.next() {
            Some(line) => {
                let line = line?;
                if line.trim().is_empty() {
                    return Ok(None);
                }
                serde_json::from_str(&line).map_err(invalid)
            }
            // recording over: the hand left the frame
            None => Ok(None),
        }
    }
}

pub struct ReplayGamepad<R> {
    lines: Lines<R>,
}

impl<R: BufRead> ReplayGamepad<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

impl<R: BufRead + Send + 'static> GamepadSource for ReplayGamepad<R> {
    fn poll(&mut self, timeout: Duration) -> io::Result<Vec<RawGamepadEvent>> {
        thread::sleep(timeout);
        match self.lines.next() {
            Some(line) => {
                let line = line?;
                if line.trim().is_empty() {
                    return Ok(Vec::new());
                }
                serde_json::from_str(&line).map_err(invalid)
            }
            None => Ok(Vec::new()),
        }
    }
}

/// Hand tracking backed by a recording on disk.
#[derive(Debug, Clone)]
pub struct ReplayHandBackend {
    path: PathBuf,
}

impl ReplayHandBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl HandTrackerBackend for ReplayHandBackend {
    fn open(&mut self) -> io::Result<Box<dyn HandTracker>> {
        debug!("replaying hand tracking from {}", self.path.display());
        let lines = open_lines(&self.path)?;
        Ok(Box::new(ReplayHandTracker {
            lines,
            frame_interval: FRAME_INTERVAL,
        }))
    }
}

/// Gamepad backed by a recording on disk; "connected" while the file exists.
#[derive(Debug, Clone)]
pub struct ReplayGamepadBackend {
    path: PathBuf,
}

impl ReplayGamepadBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl GamepadBackend for ReplayGamepadBackend {
    fn detected(&self) -> bool {
        self.path.is_file()
    }

    fn open(&mut self) -> io::Result<Box<dyn GamepadSource>> {
        debug!("replaying gamepad from {}", self.path.display());
        let lines = open_lines(&self.path)?;
        Ok(Box::new(ReplayGamepad { lines }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::gamepad::{Axis, Button};
    use std::io::{Cursor, Write};

    #[test]
    fn test_hand_recording_yields_frames_then_nothing() {
        let hand = HandLandmarks([crate::input::gesture::Landmark { x: 0.1, y: 0.2 }; 21]);
        let text = format!("{}\nnull\n\n", serde_json::to_string(&hand).unwrap());
        let mut tracker = ReplayHandTracker::new(Cursor::new(text), Duration::ZERO);

        assert_eq!(tracker.next_frame().unwrap(), Some(hand));
        assert_eq!(tracker.next_frame().unwrap(), None);
        assert_eq!(tracker.next_frame().unwrap(), None);
        assert_eq!(tracker.next_frame().unwrap(), None);
    }

    #[test]
    fn test_malformed_frame_is_an_error() {
        let mut tracker = ReplayHandTracker::new(Cursor::new("{not json}\n"), Duration::ZERO);
        let err = tracker.next_frame().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_gamepad_recording_yields_batches() {
        let batch = vec![
            RawGamepadEvent::Axis(Axis::X, 1000),
            RawGamepadEvent::Button(Button::South, true),
        ];
        let text = format!("{}\n", serde_json::to_string(&batch).unwrap());
        let mut pad = ReplayGamepad::new(Cursor::new(text));

        assert_eq!(pad.poll(Duration::ZERO).unwrap(), batch);
        assert!(pad.poll(Duration::ZERO).unwrap().is_empty());
    }

    #[test]
    fn test_gamepad_backend_detects_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[]").unwrap();

        let mut backend = ReplayGamepadBackend::new(file.path());
        assert!(backend.detected());
        assert!(backend.open().is_ok());

        let missing = ReplayGamepadBackend::new(file.path().with_extension("missing"));
        assert!(!missing.detected());
    }
}
