use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ShapeError;

/// Colour used to highlight the active target; layouts should avoid it.
pub const HIGHLIGHT_COLOR: &str = "lightgreen";

pub const DEFAULT_COLOR: &str = "gray";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Square,
    Circle,
    Rectangle,
    Triangle,
    Ellipse,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 5] = [
        ShapeKind::Square,
        ShapeKind::Circle,
        ShapeKind::Rectangle,
        ShapeKind::Triangle,
        ShapeKind::Ellipse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeKind::Square => "square",
            ShapeKind::Circle => "circle",
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Triangle => "triangle",
            ShapeKind::Ellipse => "ellipse",
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShapeKind {
    type Err = ShapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShapeKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ShapeError::UnknownShapeKind(s.to_string()))
    }
}

/// Variant-specific extents. `x`/`y` on [`Shape`] are always the top-left
/// corner of the bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Geometry {
    Square { size: u32 },
    Circle { radius: u32 },
    Rectangle { width: u32, height: u32 },
    Triangle { size: u32 },
    Ellipse { rx: u32, ry: u32 },
}

impl Geometry {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Geometry::Square { .. } => ShapeKind::Square,
            Geometry::Circle { .. } => ShapeKind::Circle,
            Geometry::Rectangle { .. } => ShapeKind::Rectangle,
            Geometry::Triangle { .. } => ShapeKind::Triangle,
            Geometry::Ellipse { .. } => ShapeKind::Ellipse,
        }
    }

    /// Width and height of the bounding box.
    pub fn extents(&self) -> (u32, u32) {
        match *self {
            Geometry::Square { size } | Geometry::Triangle { size } => (size, size),
            Geometry::Circle { radius } => (radius * 2, radius * 2),
            Geometry::Rectangle { width, height } => (width, height),
            Geometry::Ellipse { rx, ry } => (rx * 2, ry * 2),
        }
    }

    fn from_fields(kind: ShapeKind, record: &ShapeRecord) -> Self {
        match kind {
            ShapeKind::Square => Geometry::Square {
                size: record.size.unwrap_or(100),
            },
            ShapeKind::Circle => Geometry::Circle {
                radius: record.radius.unwrap_or(50),
            },
            ShapeKind::Rectangle => Geometry::Rectangle {
                width: record.width.unwrap_or(150),
                height: record.height.unwrap_or(75),
            },
            ShapeKind::Triangle => Geometry::Triangle {
                size: record.size.unwrap_or(100),
            },
            ShapeKind::Ellipse => Geometry::Ellipse {
                rx: record.rx.unwrap_or(100),
                ry: record.ry.unwrap_or(50),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    pub id: String,
    pub x: i32,
    pub y: i32,
    pub color: String,
    pub geometry: Geometry,
}

impl Shape {
    /// Builds a shape from a layout/dialog record, applying per-variant
    /// defaults for absent extents.
    pub fn from_record(record: &ShapeRecord) -> Result<Self, ShapeError> {
        let kind = record.kind.parse::<ShapeKind>()?;
        if record.id.is_empty() {
            return Err(ShapeError::MissingId);
        }

        Ok(Self {
            id: record.id.clone(),
            x: record.x,
            y: record.y,
            color: record.color.clone(),
            geometry: Geometry::from_fields(kind, record),
        })
    }

    pub fn kind(&self) -> ShapeKind {
        self.geometry.kind()
    }

    pub fn to_record(&self) -> ShapeRecord {
        let mut record = ShapeRecord::new(self.kind(), &self.id, self.x, self.y);
        record.color = self.color.clone();
        match self.geometry {
            Geometry::Square { size } | Geometry::Triangle { size } => record.size = Some(size),
            Geometry::Circle { radius } => record.radius = Some(radius),
            Geometry::Rectangle { width, height } => {
                record.width = Some(width);
                record.height = Some(height);
            }
            Geometry::Ellipse { rx, ry } => {
                record.rx = Some(rx);
                record.ry = Some(ry);
            }
        }
        record
    }

    /// Applies the fields present in `update`. Extents that do not belong to
    /// this variant are ignored. The id is not checked for uniqueness here.
    pub fn apply(&mut self, update: &ShapeUpdate) {
        if let Some(id) = &update.id {
            self.id = id.clone();
        }
        if let Some(x) = update.x {
            self.x = x;
        }
        if let Some(y) = update.y {
            self.y = y;
        }
        if let Some(color) = &update.color {
            self.color = color.clone();
        }

        match &mut self.geometry {
            Geometry::Square { size } | Geometry::Triangle { size } => {
                *size = update.size.unwrap_or(*size);
            }
            Geometry::Circle { radius } => {
                *radius = update.radius.unwrap_or(*radius);
            }
            Geometry::Rectangle { width, height } => {
                *width = update.width.unwrap_or(*width);
                *height = update.height.unwrap_or(*height);
            }
            Geometry::Ellipse { rx, ry } => {
                *rx = update.rx.unwrap_or(*rx);
                *ry = update.ry.unwrap_or(*ry);
            }
        }
    }
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

/// Flat record used by layout files and shape-creation dialogs:
/// `{"type": "circle", "id": "c1", "x": 10, "y": 10, "color": "red", "radius": 40}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeRecord {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: String,
    pub x: i32,
    pub y: i32,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rx: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ry: Option<u32>,
}

impl ShapeRecord {
    pub fn new(kind: ShapeKind, id: &str, x: i32, y: i32) -> Self {
        Self {
            kind: kind.to_string(),
            id: id.to_string(),
            x,
            y,
            color: default_color(),
            size: None,
            radius: None,
            width: None,
            height: None,
            rx: None,
            ry: None,
        }
    }
}

/// Partial change to an existing shape, as produced by an edit dialog or a drag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeUpdate {
    pub id: Option<String>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub color: Option<String>,
    pub size: Option<u32>,
    pub radius: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub rx: Option<u32>,
    pub ry: Option<u32>,
}

impl ShapeUpdate {
    pub fn position(x: i32, y: i32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }
}
