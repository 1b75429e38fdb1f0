//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::{ContractError, SiteBlueprint};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<SiteBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<SiteBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
///
/// 编辑器写入的 UTF-8 BOM 会被忽略。
pub fn parse(content: &str, format: ConfigFormat) -> Result<SiteBlueprint, ContractError> {
    let content = content.trim_start_matches('\u{feff}');
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[site]
name = "junction-7"
source = "rtsp://camera-7/stream"

[roi]
stop_line = [[0.3, 0.8], [0.7, 0.8]]
lanes = [[[0.0, 0.0], [0.5, 0.0], [0.5, 1.0], [0.0, 1.0]]]

[[sinks]]
name = "log_sink"
sink_type = "log"
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.site.name, "junction-7");
        assert_eq!(bp.roi.lanes.len(), 1);
        assert_eq!(bp.roi.lanes[0].len(), 4);
        assert!(bp.roi.stop_line.is_some());
        assert_eq!(bp.engine.cooldown_s, 5.0);
        assert_eq!(bp.sinks.len(), 1);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "site": { "name": "junction-7" },
            "roi": {
                "lanes": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]],
                "lane_directions": [[[0.5, 0.9], [0.5, 0.1]]],
                "speed_calib_points": [[0.1, 0.9], [0.4, 0.9]],
                "speed_calib_distance_m": 10.0,
                "speed_limit_kmh": 50.0
            },
            "sinks": [{ "name": "log", "sink_type": "log" }]
        }"#;
        let result = parse_json(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert!(bp.roi.speed_rule_configured());
        assert_eq!(bp.roi.lane_directions.len(), 1);
    }

    #[test]
    fn test_parse_engine_overrides() {
        let content = r#"
[site]
name = "s"

[engine]
cooldown_s = 2.5

[engine.wrong_way]
threshold_frames = 6
"#;
        let bp = parse_toml(content).unwrap();
        assert_eq!(bp.engine.cooldown_s, 2.5);
        assert_eq!(bp.engine.wrong_way.threshold_frames, 6);
        // untouched fields keep their defaults
        assert_eq!(bp.engine.wrong_way.history_capacity, 12);
        assert_eq!(bp.engine.learning.sample_capacity, 600);
    }

    #[test]
    fn test_parse_ignores_bom() {
        let content = "\u{feff}[site]\nname = \"s\"\n";
        let bp = parse(content, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.site.name, "s");
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let result = parse_toml(content);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
