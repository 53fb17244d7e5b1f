//! # Plot-Type Selection
//!
//! Maps the requested `plot_type` parameter to a chart form. Unspecified or
//! unrecognized values fall back to the waterfall form with a logged
//! diagnostic; this is a documented default, never an error.

use crate::observability::Logger;
use crate::render::ChartKind;

/// Resolve the requested plot type, defaulting and warning as needed
pub fn resolve_plot_type(requested: Option<&str>) -> ChartKind {
    match requested {
        Some("bar") => ChartKind::Bar,
        Some("decision") => ChartKind::Decision,
        Some("force") => ChartKind::Force,
        Some("waterfall") => ChartKind::Waterfall,
        Some(other) => {
            Logger::warn(
                "plot_type.defaulted",
                &[("requested", other), ("fallback", "waterfall")],
            );
            ChartKind::Waterfall
        }
        None => {
            Logger::info("plot_type.defaulted", &[("fallback", "waterfall")]);
            ChartKind::Waterfall
        }
    }
}
