//! TOML configuration.
//!
//! Every section and key is optional; anything left out falls back to the
//! original 12x4 build with three PCA9685 banks at 0x40..0x42.
//!
//! ```toml
//! [topology]
//! canvas_width = 12
//! canvas_height = 4
//! tile_width = 4
//! tile_height = 4
//! panel_order = "row_major"
//! tile_wiring = "column_major"
//! bank_addresses = [0x40, 0x41, 0x42]
//!
//! [servo]
//! min_angle = 0
//! max_angle = 60
//! frequency_hz = 60.0
//!
//! [timing]
//! tick_ms = 10
//! wave_interval_ms = 10
//!
//! [render]
//! policy = "always"
//! ```

use crate::animation::Timing;
use crate::error::{Error, Result};
use crate::mapper::Topology;
use crate::render::RenderConfig;
use crate::servo::ServoCalibration;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ── Configuration ────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub topology: Topology,
    pub servo: ServoCalibration,
    pub timing: Timing,
    pub render: RenderConfig,
}

// ── Loading and validation ───────────────────────────────────────────

impl Config {
    /// Read, parse, and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::ReadingConfig {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.topology.validate()?;
        self.servo.validate()?;
        if self.timing.tick_ms == 0 {
            tracing::warn!("tick_ms is 0, the loop will spin without sleeping");
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::RasterOrder;
    use crate::render::RenderPolicy;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    // ── Parsing tests ──────────────────────────────────────────────

    #[test]
    fn empty_file_is_the_default_build() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [servo]
            max_angle = 45
            rest_angle = 20

            [timing]
            wave_interval_ms = 40

            [render]
            policy = "on_change"
            "#,
        )
        .unwrap();

        assert_eq!(config.servo.max_angle, 45);
        assert_eq!(config.servo.pulse_max, 600);
        assert_eq!(config.timing.wave_interval_ms, 40);
        assert_eq!(config.timing.invert_interval_ms, 10);
        assert_eq!(config.render.policy, RenderPolicy::OnChange);
        assert_eq!(config.topology, Topology::default());
    }

    #[test]
    fn alternate_wiring_is_configurable() {
        let config = Config::from_toml_str(
            r#"
            [topology]
            canvas_width = 8
            canvas_height = 8
            panel_order = "column_major"
            tile_wiring = "row_major"
            bank_addresses = [0x40, 0x41, 0x44, 0x45]
            "#,
        )
        .unwrap();

        assert_eq!(config.topology.panel_order, RasterOrder::ColumnMajor);
        assert_eq!(config.topology.tile_wiring, RasterOrder::RowMajor);
        assert_eq!(config.topology.bank_count(), 4);
    }

    // ── Validation tests ───────────────────────────────────────────

    #[test]
    fn inconsistent_topology_is_rejected() {
        let err = Config::from_toml_str(
            r#"
            [topology]
            canvas_width = 16
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidTopology(_)));
    }

    #[test]
    fn bank_wider_than_sixteen_channels_is_rejected() {
        let err = Config::from_toml_str(
            r#"
            [topology]
            canvas_width = 8
            canvas_height = 4
            tile_width = 8
            tile_height = 4
            channels_per_bank = 32
            bank_addresses = [0x40]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidTopology(_)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::from_toml_str("[servo]\nmax_angel = 50\n").unwrap_err();
        assert!(matches!(err, Error::ParsingConfig(_)));
    }

    // ── File loading tests ─────────────────────────────────────────

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[timing]\ntick_ms = 20").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.timing.tick_ms, 20);
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, Error::ReadingConfig { .. }));
        assert!(err.to_string().contains("missing.toml"));
    }

    // ── Serialization tests ────────────────────────────────────────

    #[test]
    fn serializes_back_to_json() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(json["topology"]["tile_wiring"], "column_major");
        assert_eq!(json["servo"]["pulse_min"], 150);
        assert_eq!(json["render"]["policy"], "always");
    }
}
