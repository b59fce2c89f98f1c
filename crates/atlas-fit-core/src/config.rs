use serde::{Deserialize, Serialize};

/// Packing limits and search budget.
///
/// Key notes:
///   - `max_image_size` is a hard cap on one image's pixel count and is
///     raised internally to the largest single area, so an oversized area
///     still ends up alone in its own image rather than failing outright.
///   - `fit_calls_limit` bounds worst-case search time; raise it when the
///     returned quality is poor.
///   - `workers` > 1 runs that many search workers sharing one budget and
///     one best-fit record; results may then depend on thread timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitConfig {
    /// Maximum output image width in pixels.
    pub max_image_width: i32,
    /// Maximum output image height in pixels.
    pub max_image_height: i32,
    /// Hard cap on a single output image's pixel count.
    #[serde(default = "default_max_image_size")]
    pub max_image_size: i32,
    /// Number of output images to start with (>= 1). Raise after a failed
    /// fit to allow more splitting.
    #[serde(default = "default_min_image_count")]
    pub min_image_count: i32,
    /// Total search-step budget across all workers (> 0).
    #[serde(default = "default_fit_calls_limit")]
    pub fit_calls_limit: i32,
    /// Number of parallel search workers (>= 1).
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_image_width: 1024,
            max_image_height: 1024,
            max_image_size: default_max_image_size(),
            min_image_count: default_min_image_count(),
            fit_calls_limit: default_fit_calls_limit(),
            workers: default_workers(),
        }
    }
}

fn default_max_image_size() -> i32 {
    i32::MAX
}
fn default_min_image_count() -> i32 {
    1
}
fn default_fit_calls_limit() -> i32 {
    100_000
}
fn default_workers() -> usize {
    1
}

impl FitConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::AtlasFitError;

        if self.max_image_width <= 0 || self.max_image_height <= 0 {
            return Err(AtlasFitError::InvalidConfig(format!(
                "image dimension caps must be positive (got {}x{})",
                self.max_image_width, self.max_image_height
            )));
        }
        if self.max_image_size <= 0 {
            return Err(AtlasFitError::InvalidConfig(format!(
                "max_image_size must be positive (got {})",
                self.max_image_size
            )));
        }
        if self.min_image_count < 1 {
            return Err(AtlasFitError::InvalidConfig(format!(
                "min_image_count must be >= 1 (got {})",
                self.min_image_count
            )));
        }
        if self.fit_calls_limit <= 0 {
            return Err(AtlasFitError::InvalidConfig(format!(
                "fit_calls_limit must be positive (got {})",
                self.fit_calls_limit
            )));
        }
        if self.workers == 0 {
            return Err(AtlasFitError::InvalidConfig(
                "workers must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Create a fluent builder for `FitConfig`.
    pub fn builder() -> FitConfigBuilder {
        FitConfigBuilder::new()
    }
}

/// Builder for `FitConfig` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct FitConfigBuilder {
    cfg: FitConfig,
}

impl FitConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: FitConfig::default(),
        }
    }
    pub fn max_dimensions(mut self, w: i32, h: i32) -> Self {
        self.cfg.max_image_width = w;
        self.cfg.max_image_height = h;
        self
    }
    pub fn max_image_size(mut self, v: i32) -> Self {
        self.cfg.max_image_size = v;
        self
    }
    pub fn min_image_count(mut self, v: i32) -> Self {
        self.cfg.min_image_count = v;
        self
    }
    pub fn fit_calls_limit(mut self, v: i32) -> Self {
        self.cfg.fit_calls_limit = v;
        self
    }
    pub fn workers(mut self, v: usize) -> Self {
        self.cfg.workers = v;
        self
    }
    pub fn build(self) -> FitConfig {
        self.cfg
    }
}
