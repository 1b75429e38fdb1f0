//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Report non-fatal issues that disable individual rules
//! - Generate `SiteBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("site.toml")).unwrap();
//! println!("Site: {}", blueprint.site.name);
//! ```

mod parser;
mod validator;

pub use contracts::SiteBlueprint;
pub use parser::ConfigFormat;
pub use validator::collect_warnings;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<SiteBlueprint, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<SiteBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Serialize SiteBlueprint to TOML string
    pub fn to_toml(blueprint: &SiteBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize SiteBlueprint to JSON string
    pub fn to_json(blueprint: &SiteBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITE_TOML: &str = r#"
[site]
name = "junction-7"
nominal_fps = 25.0

[roi]
lanes = [
    [[0.0, 0.0], [0.5, 0.0], [0.5, 1.0], [0.0, 1.0]],
    [[0.5, 0.0], [1.0, 0.0], [1.0, 1.0], [0.5, 1.0]],
]
stop_line = [[0.3, 0.8], [0.7, 0.8]]
lane_directions = [
    [[0.25, 0.9], [0.25, 0.1]],
    [[0.75, 0.1], [0.75, 0.9]],
]
speed_calib_points = [[0.1, 0.9], [0.4, 0.9]]
speed_calib_distance_m = 10.0
speed_limit_kmh = 50.0

[session]
pacing_factor = 2.0

[evidence]
base_dir = "evidence"

[[sinks]]
name = "log_sink"
sink_type = "log"

[[sinks]]
name = "viewers"
sink_type = "broadcast"
queue_capacity = 16
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(SITE_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.site.name, "junction-7");
        assert_eq!(bp.roi.lanes.len(), 2);
        assert_eq!(bp.roi.lane_directions.len(), 2);
        assert_eq!(bp.session.pacing_factor, 2.0);
        assert_eq!(bp.sinks[1].queue_capacity, 16);
        assert!(collect_warnings(&bp).is_empty());
    }

    #[test]
    fn test_round_trip_toml() {
        let bp = ConfigLoader::load_from_str(SITE_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.site.name, bp2.site.name);
        assert_eq!(bp.roi, bp2.roi);
        assert_eq!(bp.engine, bp2.engine);
    }

    #[test]
    fn test_round_trip_json() {
        let bp = ConfigLoader::load_from_str(SITE_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(bp.roi, bp2.roi);
        assert_eq!(bp.sinks.len(), bp2.sinks.len());
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = r#"
[site]
name = "s"

[roi]
lanes = [[[0.0, 0.0], [1.0, 0.0]]]
"#;
        let result = ConfigLoader::load_from_str(content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("at least 3 vertices"));
    }

    #[test]
    fn test_load_from_path_detects_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.toml");
        std::fs::write(&path, SITE_TOML).unwrap();
        let bp = ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(bp.site.nominal_fps, 25.0);

        let bad = dir.path().join("site.yaml");
        std::fs::write(&bad, SITE_TOML).unwrap();
        assert!(ConfigLoader::load_from_path(&bad).is_err());
    }
}
