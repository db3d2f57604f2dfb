//! Writers for the click log and the current layout.

use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::session::{ClickRecord, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum LogFormat {
    #[strum(serialize = "csv")]
    Csv,
    #[strum(serialize = "json")]
    Json,
}

impl LogFormat {
    /// Picks the format from the file extension; anything unknown is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => LogFormat::Csv,
            Some(ext) if ext.eq_ignore_ascii_case("json") => LogFormat::Json,
            other => {
                warn!("unknown export type {other:?}, defaulting to JSON");
                LogFormat::Json
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportRequest {
    ClickLog { path: PathBuf, format: LogFormat },
    Layout { path: PathBuf },
}

impl ExportRequest {
    pub fn path(&self) -> &Path {
        match self {
            ExportRequest::ClickLog { path, .. } | ExportRequest::Layout { path } => path,
        }
    }
}

/// One row per click under the header `timestamp,target_id,x,y,shape_hit`.
pub fn write_click_log_csv<W: Write>(writer: W, log: &[ClickRecord]) -> csv::Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    if log.is_empty() {
        csv.write_record(["timestamp", "target_id", "x", "y", "shape_hit"])?;
    }
    for record in log {
        csv.serialize(record)?;
    }
    csv.flush()?;
    Ok(())
}

pub fn write_click_log_json<W: Write>(writer: W, log: &[ClickRecord]) -> serde_json::Result<()> {
    serde_json::to_writer_pretty(writer, log)
}

fn create(path: &Path) -> io::Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}

/// Writes whatever `request` asks for from the current session.
pub fn export(request: &ExportRequest, session: &Session) -> io::Result<()> {
    let mut out = create(request.path())?;
    match request {
        ExportRequest::ClickLog { format, .. } => {
            let log = session.click_log();
            match format {
                LogFormat::Csv => write_click_log_csv(&mut out, log)?,
                LogFormat::Json => write_click_log_json(&mut out, log)?,
            }
            info!(
                "exported {} clicks as {format} to {}",
                log.len(),
                request.path().display()
            );
        }
        ExportRequest::Layout { .. } => {
            let json = session.to_layout().to_json()?;
            out.write_all(json.as_bytes())?;
            info!("exported layout to {}", request.path().display());
        }
    }
    out.flush()
}

/// `click_log_20240131_154501.csv` style name for an export made at `now`.
pub fn timestamped_name(stem: &str, now: DateTime<Local>, format: LogFormat) -> String {
    format!("{stem}_{}.{format}", now.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        layout::Layout,
        shape::{ShapeKind, ShapeRecord},
    };
    use chrono::TimeZone;

    fn record(target: &str, hit: bool) -> ClickRecord {
        ClickRecord {
            timestamp: 1_700_000_000.25,
            target_id: target.to_string(),
            x: 12,
            y: 34,
            hit,
        }
    }

    #[test]
    fn test_csv_has_analysis_header() {
        let mut buf = Vec::new();
        write_click_log_csv(&mut buf, &[record("a", true), record("b", false)]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "timestamp,target_id,x,y,shape_hit");
        assert_eq!(lines[1], "1700000000.25,a,12,34,true");
        assert_eq!(lines[2], "1700000000.25,b,12,34,false");
    }

    #[test]
    fn test_empty_csv_still_has_header() {
        let mut buf = Vec::new();
        write_click_log_csv(&mut buf, &[]).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "timestamp,target_id,x,y,shape_hit\n"
        );
    }

    #[test]
    fn test_json_uses_same_field_names() {
        let mut buf = Vec::new();
        write_click_log_json(&mut buf, &[record("a", true)]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value[0]["target_id"], "a");
        assert_eq!(value[0]["shape_hit"], true);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(LogFormat::from_path(Path::new("log.CSV")), LogFormat::Csv);
        assert_eq!(LogFormat::from_path(Path::new("log.json")), LogFormat::Json);
        assert_eq!(LogFormat::from_path(Path::new("log.txt")), LogFormat::Json);
    }

    #[test]
    fn test_layout_export_can_be_loaded_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("layout.json");

        let mut session = Session::new();
        let mut circle = ShapeRecord::new(ShapeKind::Circle, "c", 5, 6);
        circle.radius = Some(7);
        session.add_shape(&circle).unwrap();
        session.set_timer_duration(12).unwrap();

        export(&ExportRequest::Layout { path: path.clone() }, &session).unwrap();
        let loaded = Layout::from_path(&path).unwrap();
        assert_eq!(loaded, session.to_layout());
    }

    #[test]
    fn test_timestamped_names() {
        let at = Local.with_ymd_and_hms(2024, 1, 31, 15, 45, 1).unwrap();
        assert_eq!(
            timestamped_name("click_log", at, LogFormat::Csv),
            "click_log_20240131_154501.csv"
        );
    }
}
