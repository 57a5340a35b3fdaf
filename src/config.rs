//! Reader configuration

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Environment variable holding the process-wide geometry switch
pub const FLIP_TO_SAR_GEOMETRY_ENV: &str = "RISAT1_FLIP_TO_SAR_GEOMETRY";

/// Configuration shared by every ingestion in the process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Keep imagery in SAR (acquisition) geometry.
    /// Swaps first/last line times for ascending passes and disables the
    /// left/right flip of tie-point grids.
    pub flip_to_sar_geometry: bool,
}

impl ReaderConfig {
    /// Build the configuration from the environment
    pub fn from_env() -> Self {
        let flip = std::env::var(FLIP_TO_SAR_GEOMETRY_ENV)
            .map(|v| Self::parse_switch(&v))
            .unwrap_or(false);
        Self {
            flip_to_sar_geometry: flip,
        }
    }

    /// Process-wide configuration, read from the environment on first use
    pub fn global() -> &'static ReaderConfig {
        static GLOBAL: OnceLock<ReaderConfig> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let config = Self::from_env();
            log::debug!("Reader configuration: {:?}", config);
            config
        })
    }

    fn parse_switch(value: &str) -> bool {
        value.trim() == "true"
    }
}
