//! Types for the planner module.

use serde::{Deserialize, Serialize};

use crate::bitrate;

/// A configured rendition: one row of the standard rendition table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenditionTemplate {
    /// Display name (e.g. "480p"); also the rendition subdirectory name.
    pub name: String,
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Target video bitrate, ffmpeg notation (e.g. "800k").
    pub bitrate: String,
}

impl RenditionTemplate {
    /// Creates a table entry.
    pub fn new(name: impl Into<String>, width: u32, height: u32, bitrate: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            bitrate: bitrate.into(),
        }
    }
}

/// The conventional two-entry table: one lower and one mid resolution.
pub fn default_rendition_table() -> Vec<RenditionTemplate> {
    vec![
        RenditionTemplate::new("480p", 854, 480, "800k"),
        RenditionTemplate::new("720p", 1280, 720, "1500k"),
    ]
}

/// A rendition planned for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenditionSpec {
    /// Rendition name (e.g. "480p").
    pub name: String,
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Target video bitrate, ffmpeg notation.
    pub target_bitrate: String,
    /// Whether streams are copied without re-encoding.
    pub is_source_copy: bool,
}

impl RenditionSpec {
    /// Resolution formatted as `WxH`.
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Bandwidth to advertise for this rendition; never zero.
    pub fn bandwidth_bps(&self) -> u64 {
        bitrate::bandwidth_for(&self.target_bitrate)
    }
}

impl From<&RenditionTemplate> for RenditionSpec {
    fn from(template: &RenditionTemplate) -> Self {
        Self {
            name: template.name.clone(),
            width: template.width,
            height: template.height,
            target_bitrate: template.bitrate.clone(),
            is_source_copy: false,
        }
    }
}
