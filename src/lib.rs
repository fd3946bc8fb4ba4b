// Library exports for salesdash

pub mod aggregate;
pub mod charts;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod filter;
pub mod graph;
pub mod ir;
pub mod scale;
pub mod tooltip;

use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[serde(rename = "png")]
    #[default]
    Png,
    #[serde(rename = "svg")]
    Svg,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Svg => "svg",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "svg" => Ok(OutputFormat::Svg),
            other => Err(format!("unsupported output format '{}' (expected png or svg)", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderOptions {
    #[serde(default, rename = "type")]
    pub format: OutputFormat,
    /// Pixel multiplier applied to every scene coordinate.
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_scale() -> f64 { 1.0 }

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Png,
            scale: default_scale(),
        }
    }
}
