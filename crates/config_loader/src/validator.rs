//! 配置校验模块
//!
//! 校验规则（硬错误）：
//! - 归一化坐标有限且位于 [0, 1]
//! - 车道多边形至少 3 个顶点
//! - 限速 / 标定距离 > 0
//! - 窗口、容量、节奏参数 > 0
//! - sink 名称非空且唯一
//!
//! 非致命问题由 [`collect_warnings`] 给出，对应规则在运行时被跳过。

use std::collections::HashSet;

use contracts::{ContractError, LineSegment, Point, SiteBlueprint};

/// 校验 SiteBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &SiteBlueprint) -> Result<(), ContractError> {
    validate_site(blueprint)?;
    validate_roi_geometry(blueprint)?;
    validate_speed_calibration(blueprint)?;
    validate_engine(blueprint)?;
    validate_session(blueprint)?;
    validate_evidence(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

/// 收集非致命配置问题
pub fn collect_warnings(blueprint: &SiteBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();
    let roi = &blueprint.roi;

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - alerts are only kept in the in-memory log".to_string());
    }

    if roi.stop_line.is_none() {
        warnings.push("roi.stop_line not set - signal crossing rule disabled".to_string());
    }

    if !roi.lane_directions.is_empty() && roi.lane_directions.len() != roi.lanes.len() {
        warnings.push(format!(
            "roi.lane_directions has {} entries but roi.lanes has {} - directions are applied positionally",
            roi.lane_directions.len(),
            roi.lanes.len()
        ));
    }

    if roi.auto_lane_direction && !roi.lane_directions.is_empty() {
        warnings.push(
            "roi.auto_lane_direction ignored - explicit lane_directions take precedence".to_string(),
        );
    }

    if roi.auto_lane_direction && roi.lanes.is_empty() {
        warnings.push("roi.auto_lane_direction set but no lanes configured".to_string());
    }

    let calibrated = roi.speed_calib_points.is_some() && roi.speed_calib_distance_m.is_some();
    if roi.speed_limit_kmh.is_some() && !calibrated {
        warnings.push(
            "roi.speed_limit_kmh set without speed calibration - speed rule disabled".to_string(),
        );
    }
    if calibrated && roi.speed_limit_kmh.is_none() {
        warnings.push("speed calibration set without roi.speed_limit_kmh - speed rule disabled".to_string());
    }
    if roi.speed_calib_points.is_some() != roi.speed_calib_distance_m.is_some() {
        warnings.push(
            "roi.speed_calib_points and roi.speed_calib_distance_m must be set together".to_string(),
        );
    }

    warnings
}

/// 校验站点配置
fn validate_site(blueprint: &SiteBlueprint) -> Result<(), ContractError> {
    if blueprint.site.name.trim().is_empty() {
        return Err(ContractError::config_validation(
            "site.name",
            "site name cannot be empty",
        ));
    }
    let fps = blueprint.site.nominal_fps;
    if !fps.is_finite() || fps <= 0.0 {
        return Err(ContractError::config_validation(
            "site.nominal_fps",
            format!("nominal_fps must be > 0, got {fps}"),
        ));
    }
    Ok(())
}

/// 校验 ROI 几何 (归一化坐标)
fn validate_roi_geometry(blueprint: &SiteBlueprint) -> Result<(), ContractError> {
    let roi = &blueprint.roi;

    for (idx, lane) in roi.lanes.iter().enumerate() {
        if lane.len() < 3 {
            return Err(ContractError::config_validation(
                format!("roi.lanes[{idx}]"),
                format!("lane polygon needs at least 3 vertices, got {}", lane.len()),
            ));
        }
        for (v, point) in lane.iter().enumerate() {
            check_normalized(*point, || format!("roi.lanes[{idx}][{v}]"))?;
        }
    }

    if let Some(line) = &roi.stop_line {
        check_segment(line, "roi.stop_line")?;
    }

    for (idx, direction) in roi.lane_directions.iter().enumerate() {
        check_segment(direction, &format!("roi.lane_directions[{idx}]"))?;
    }

    Ok(())
}

/// 校验测速标定
fn validate_speed_calibration(blueprint: &SiteBlueprint) -> Result<(), ContractError> {
    let roi = &blueprint.roi;

    if let Some(points) = &roi.speed_calib_points {
        check_segment(points, "roi.speed_calib_points")?;
    }

    if let Some(distance) = roi.speed_calib_distance_m {
        if !distance.is_finite() || distance <= 0.0 {
            return Err(ContractError::config_validation(
                "roi.speed_calib_distance_m",
                format!("calibration distance must be > 0, got {distance}"),
            ));
        }
    }

    if let Some(limit) = roi.speed_limit_kmh {
        if !limit.is_finite() || limit <= 0.0 {
            return Err(ContractError::config_validation(
                "roi.speed_limit_kmh",
                format!("speed limit must be > 0, got {limit}"),
            ));
        }
    }

    Ok(())
}

/// 校验规则引擎参数
fn validate_engine(blueprint: &SiteBlueprint) -> Result<(), ContractError> {
    let engine = &blueprint.engine;

    for (field, value) in [
        ("engine.cooldown_s", engine.cooldown_s),
        ("engine.highlight_s", engine.highlight_s),
        ("engine.focus_s", engine.focus_s),
        ("engine.speed.min_dt_s", engine.speed.min_dt_s),
        ("engine.wrong_way.min_span_s", engine.wrong_way.min_span_s),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(ContractError::config_validation(
                field,
                format!("must be a finite value >= 0, got {value}"),
            ));
        }
    }

    for (field, value) in [
        ("engine.line_tolerance_px", engine.line_tolerance_px),
        ("engine.track_idle_timeout_s", engine.track_idle_timeout_s),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(ContractError::config_validation(
                field,
                format!("must be > 0, got {value}"),
            ));
        }
    }

    let wrong_way = &engine.wrong_way;
    if wrong_way.threshold_frames == 0 {
        return Err(ContractError::config_validation(
            "engine.wrong_way.threshold_frames",
            "threshold_frames must be > 0",
        ));
    }
    if wrong_way.min_history < 2 || wrong_way.min_history > wrong_way.history_capacity {
        return Err(ContractError::config_validation(
            "engine.wrong_way.min_history",
            format!(
                "min_history ({}) must be >= 2 and <= history_capacity ({})",
                wrong_way.min_history, wrong_way.history_capacity
            ),
        ));
    }

    let learning = &engine.learning;
    if learning.min_samples == 0 || learning.min_samples > learning.sample_capacity {
        return Err(ContractError::config_validation(
            "engine.learning.min_samples",
            format!(
                "min_samples ({}) must be > 0 and <= sample_capacity ({})",
                learning.min_samples, learning.sample_capacity
            ),
        ));
    }
    if learning.update_interval_frames == 0 {
        return Err(ContractError::config_validation(
            "engine.learning.update_interval_frames",
            "update_interval_frames must be > 0",
        ));
    }

    let cadence = &engine.classifiers;
    if cadence.helmet_every == 0 || cadence.plate_every == 0 {
        return Err(ContractError::config_validation(
            "engine.classifiers",
            "classifier cadence must be > 0",
        ));
    }
    if !(cadence.head_fraction > 0.0 && cadence.head_fraction <= 1.0) {
        return Err(ContractError::config_validation(
            "engine.classifiers.head_fraction",
            format!("head_fraction must be in (0, 1], got {}", cadence.head_fraction),
        ));
    }

    if engine.alert_log_capacity == 0 {
        return Err(ContractError::config_validation(
            "engine.alert_log_capacity",
            "alert_log_capacity must be > 0",
        ));
    }

    Ok(())
}

/// 校验会话参数
fn validate_session(blueprint: &SiteBlueprint) -> Result<(), ContractError> {
    let session = &blueprint.session;
    if !session.pacing_factor.is_finite() || session.pacing_factor < 0.0 {
        return Err(ContractError::config_validation(
            "session.pacing_factor",
            format!("pacing_factor must be >= 0, got {}", session.pacing_factor),
        ));
    }
    if session.latency_window == 0 || session.detection_window == 0 {
        return Err(ContractError::config_validation(
            "session.latency_window / session.detection_window",
            "metrics windows must be > 0",
        ));
    }
    Ok(())
}

/// 校验取证存储
fn validate_evidence(blueprint: &SiteBlueprint) -> Result<(), ContractError> {
    let evidence = &blueprint.evidence;
    for (field, quality) in [
        ("evidence.crop_quality", evidence.crop_quality),
        ("evidence.frame_quality", evidence.frame_quality),
    ] {
        if !(1..=100).contains(&quality) {
            return Err(ContractError::config_validation(
                field,
                format!("JPEG quality must be in 1..=100, got {quality}"),
            ));
        }
    }
    if evidence.frame_max_width == 0 {
        return Err(ContractError::config_validation(
            "evidence.frame_max_width",
            "frame_max_width must be > 0",
        ));
    }
    Ok(())
}

/// 校验 sink 配置
fn validate_sinks(blueprint: &SiteBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        if sink.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("sinks[{}].queue_capacity", sink.name),
                "queue_capacity must be > 0",
            ));
        }
    }
    Ok(())
}

fn check_normalized(point: Point, field: impl FnOnce() -> String) -> Result<(), ContractError> {
    let in_range = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
    if in_range(point.x) && in_range(point.y) {
        Ok(())
    } else {
        Err(ContractError::config_validation(
            field(),
            format!(
                "normalized coordinates must be within [0, 1], got ({}, {})",
                point.x, point.y
            ),
        ))
    }
}

fn check_segment(segment: &LineSegment, field: &str) -> Result<(), ContractError> {
    check_normalized(segment.a, || format!("{field}[0]"))?;
    check_normalized(segment.b, || format!("{field}[1]"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        ConfigVersion, EvidenceConfig, RoiConfig, RuleEngineConfig, SessionConfig, SinkConfig,
        SinkType, SiteConfig,
    };
    use std::collections::HashMap;

    fn minimal_blueprint() -> SiteBlueprint {
        SiteBlueprint {
            version: ConfigVersion::V1,
            site: SiteConfig {
                name: "junction-7".into(),
                source: None,
                nominal_fps: 30.0,
            },
            roi: RoiConfig {
                lanes: vec![vec![
                    Point::new(0.0, 0.0),
                    Point::new(0.5, 0.0),
                    Point::new(0.5, 1.0),
                ]],
                stop_line: Some(LineSegment::new(Point::new(0.3, 0.8), Point::new(0.7, 0.8))),
                ..Default::default()
            },
            engine: RuleEngineConfig::default(),
            session: SessionConfig::default(),
            evidence: EvidenceConfig::default(),
            sinks: vec![SinkConfig {
                name: "log".into(),
                sink_type: SinkType::Log,
                queue_capacity: 100,
                params: HashMap::new(),
            }],
        }
    }

    #[test]
    fn test_valid_config() {
        let bp = minimal_blueprint();
        assert!(validate(&bp).is_ok());
        assert!(collect_warnings(&bp).is_empty());
    }

    #[test]
    fn test_lane_needs_three_vertices() {
        let mut bp = minimal_blueprint();
        bp.roi.lanes[0].truncate(2);
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("roi.lanes[0]"));
    }

    #[test]
    fn test_out_of_range_coordinate() {
        let mut bp = minimal_blueprint();
        bp.roi.stop_line = Some(LineSegment::new(Point::new(0.3, 1.2), Point::new(0.7, 0.8)));
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("roi.stop_line[0]"));

        let mut bp = minimal_blueprint();
        bp.roi.lanes[0][1] = Point::new(f64::NAN, 0.0);
        assert!(validate(&bp).is_err());
    }

    #[test]
    fn test_non_positive_speed_limit() {
        let mut bp = minimal_blueprint();
        bp.roi.speed_limit_kmh = Some(0.0);
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("speed_limit_kmh"));
    }

    #[test]
    fn test_duplicate_sink_name() {
        let mut bp = minimal_blueprint();
        bp.sinks.push(bp.sinks[0].clone());
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_empty_sink_name() {
        let mut bp = minimal_blueprint();
        bp.sinks[0].name = String::new();
        assert!(validate(&bp).is_err());
    }

    #[test]
    fn test_invalid_jpeg_quality() {
        let mut bp = minimal_blueprint();
        bp.evidence.crop_quality = 0;
        assert!(validate(&bp).is_err());
    }

    #[test]
    fn test_warning_direction_count_mismatch() {
        let mut bp = minimal_blueprint();
        bp.roi.lane_directions = vec![
            LineSegment::new(Point::new(0.5, 0.9), Point::new(0.5, 0.1)),
            LineSegment::new(Point::new(0.5, 0.1), Point::new(0.5, 0.9)),
        ];
        assert!(validate(&bp).is_ok());
        let warnings = collect_warnings(&bp);
        assert!(warnings.iter().any(|w| w.contains("positionally")));
    }

    #[test]
    fn test_warning_speed_limit_without_calibration() {
        let mut bp = minimal_blueprint();
        bp.roi.speed_limit_kmh = Some(50.0);
        assert!(validate(&bp).is_ok());
        let warnings = collect_warnings(&bp);
        assert!(warnings.iter().any(|w| w.contains("speed rule disabled")));
    }
}
