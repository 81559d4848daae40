//! Core configuration.

use std::path::PathBuf;

/// Configuration shared by the orchestrators.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Base directory downloaded media lands under
    pub output_dir: PathBuf,
    /// Maximum video height requested from the downloader
    pub max_height: u32,
    /// Hard ceiling on per-category scan items
    pub scan_items_cap: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("/var/lib/tubevault/videos"),
            max_height: 1080,
            scan_items_cap: 5000,
        }
    }
}

impl CoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            output_dir: std::env::var("VIDEO_OUTDIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            max_height: std::env::var("MAX_HEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_height),
            scan_items_cap: std::env::var("SCAN_ITEMS_CAP")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.scan_items_cap),
        }
    }

    /// Effective per-category item limit for a requested value.
    ///
    /// Zero means "no explicit limit" and maps to the cap; the cap is a
    /// hard ceiling regardless of what is requested.
    pub fn effective_max_items(&self, requested: u32) -> u32 {
        if requested == 0 {
            self.scan_items_cap
        } else {
            requested.min(self.scan_items_cap)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_max_items_clamping() {
        let config = CoreConfig {
            scan_items_cap: 5000,
            ..CoreConfig::default()
        };

        assert_eq!(config.effective_max_items(0), 5000);
        assert_eq!(config.effective_max_items(10000), 5000);
        assert_eq!(config.effective_max_items(10), 10);
        assert_eq!(config.effective_max_items(5000), 5000);
    }
}
