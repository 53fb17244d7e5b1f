//! # Artifact Rendering
//!
//! Produces the visual artifacts attached to every explanation response:
//! attribution charts, dataset summaries, counterfactual rasters, feature
//! comparisons, and the HTML counterfactual table. Callers depend only on
//! the input/output contract (explanation data in, encoded bytes out).

pub mod charts;
pub mod image_plot;
pub mod table;

use thiserror::Error;

pub use charts::{attribution_chart, comparison_chart, summary_chart, ChartKind};
pub use image_plot::{decode_image, raster_image};
pub use table::counterfactual_table_html;

/// Result type for rendering
pub type RenderResult<T> = Result<T, RenderError>;

/// Rendering errors
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("Drawing failed: {0}")]
    Draw(String),

    #[error("Image encoding failed: {0}")]
    Encode(String),

    #[error("Image decoding failed: {0}")]
    Decode(String),

    #[error("Nothing to render: {0}")]
    Empty(String),
}

impl RenderError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            RenderError::Decode(_) => 400,
            _ => 500,
        }
    }
}
