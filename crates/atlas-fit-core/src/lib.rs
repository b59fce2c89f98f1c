//! Core library for fitting rectangular areas into a minimal-area set of
//! output images.
//!
//! - Search: budget-limited branch-and-bound over guillotine splits of free
//!   regions, minimizing summed output size and then image count
//! - Entry point: [`fit_areas`] takes sizes and returns placements; there is
//!   no pixel data anywhere in this crate
//! - Data model is serde-serializable
//!
//! Quick example:
//! ```
//! use atlas_fit_core::{fit_areas, FitArea, FitConfig, OutImage};
//!
//! # fn main() -> atlas_fit_core::Result<()> {
//! let mut areas = vec![
//!     FitArea::new("hero", 50, 30),
//!     FitArea::new("tile", 80, 80),
//! ];
//! let mut images: Vec<OutImage> = Vec::new();
//! let cfg = FitConfig::builder().max_dimensions(300, 300).build();
//! let report = fit_areas(&mut areas, &mut images, &cfg)?;
//! println!("{} image(s), quality {:.1}%", images.len(), report.fit_quality);
//! # Ok(()) }
//! ```

pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;

mod fitter;

pub use config::*;
pub use error::*;
pub use model::*;
pub use pipeline::*;

/// Convenience prelude for common types and functions.
/// Importing `atlas_fit_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::config::{FitConfig, FitConfigBuilder};
    pub use crate::error::{AtlasFitError, Result};
    pub use crate::model::{FitArea, FitReport, OutImage};
    pub use crate::pipeline::fit_areas;
}
