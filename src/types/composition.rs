//! Reference-image composition types

use serde::{Deserialize, Serialize};

pub const DEFAULT_CANVAS_MAX_WIDTH: u32 = 1920;
pub const DEFAULT_CANVAS_MAX_HEIGHT: u32 = 1080;

/// Canvas arrangement policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    /// Primary image on top, secondaries in an equal-width strip below.
    PrimaryStrip,
    /// All images side by side at a common height.
    UniformRow,
}

/// What to compose and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionSpec {
    /// Required for [`Layout::PrimaryStrip`]; first image of a [`Layout::UniformRow`].
    pub primary: Option<String>,
    pub secondaries: Vec<String>,
    pub canvas_max_width: u32,
    pub canvas_max_height: u32,
    pub layout: Layout,
}

impl CompositionSpec {
    pub fn primary_strip(primary: impl Into<String>, secondaries: Vec<String>) -> Self {
        Self {
            primary: Some(primary.into()),
            secondaries,
            canvas_max_width: DEFAULT_CANVAS_MAX_WIDTH,
            canvas_max_height: DEFAULT_CANVAS_MAX_HEIGHT,
            layout: Layout::PrimaryStrip,
        }
    }

    pub fn uniform_row(references: Vec<String>) -> Self {
        Self {
            primary: None,
            secondaries: references,
            canvas_max_width: DEFAULT_CANVAS_MAX_WIDTH,
            canvas_max_height: DEFAULT_CANVAS_MAX_HEIGHT,
            layout: Layout::UniformRow,
        }
    }

    pub fn with_canvas(mut self, max_width: u32, max_height: u32) -> Self {
        self.canvas_max_width = max_width;
        self.canvas_max_height = max_height;
        self
    }
}

/// Encoded (PNG) composite plus its pixel size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}
