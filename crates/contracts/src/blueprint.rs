//! SiteBlueprint - Config Loader 输出
//!
//! 描述完整的站点配置：视频源、ROI、规则引擎参数、会话节流、取证存储、告警订阅。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::{RoiConfig, RuleEngineConfig};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的站点配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 站点设置
    pub site: SiteConfig,

    /// 区域配置 (归一化坐标)
    #[serde(default)]
    pub roi: RoiConfig,

    /// 规则引擎参数
    #[serde(default)]
    pub engine: RuleEngineConfig,

    /// 会话参数
    #[serde(default)]
    pub session: SessionConfig,

    /// 取证存储
    #[serde(default)]
    pub evidence: EvidenceConfig,

    /// 告警订阅配置
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// 站点配置：名称、视频源
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// 站点名称
    pub name: String,

    /// 视频源定位符 (设备号、文件路径或回放文件)
    #[serde(default)]
    pub source: Option<String>,

    /// 视频源未报告帧率时使用的名义帧率
    #[serde(default = "default_nominal_fps")]
    pub nominal_fps: f64,
}

fn default_nominal_fps() -> f64 {
    30.0
}

/// 会话配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// 发布节流倍数：每帧休眠 `1 / fps / pacing_factor` 秒，0 表示不休眠
    #[serde(default = "default_pacing_factor")]
    pub pacing_factor: f64,

    /// 停止时等待工作线程的上限 (毫秒)
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,

    /// 帧耗时滚动窗口
    #[serde(default = "default_latency_window")]
    pub latency_window: usize,

    /// 检测数滚动窗口
    #[serde(default = "default_detection_window")]
    pub detection_window: usize,
}

fn default_pacing_factor() -> f64 {
    4.0
}

fn default_join_timeout_ms() -> u64 {
    2000
}

fn default_latency_window() -> usize {
    60
}

fn default_detection_window() -> usize {
    100
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pacing_factor: default_pacing_factor(),
            join_timeout_ms: default_join_timeout_ms(),
            latency_window: default_latency_window(),
            detection_window: default_detection_window(),
        }
    }
}

impl SessionConfig {
    /// 每帧节流休眠时长
    pub fn pacing_interval(&self, fps: f64) -> Option<Duration> {
        if self.pacing_factor <= 0.0 || fps <= 0.0 || !fps.is_finite() {
            return None;
        }
        Some(Duration::from_secs_f64(1.0 / fps / self.pacing_factor))
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

/// 取证存储配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceConfig {
    /// 是否保存取证
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 根目录
    #[serde(default = "default_evidence_dir")]
    pub base_dir: PathBuf,

    /// 裁剪图 JPEG 质量
    #[serde(default = "default_crop_quality")]
    pub crop_quality: u8,

    /// 全帧 JPEG 质量
    #[serde(default = "default_frame_quality")]
    pub frame_quality: u8,

    /// 全帧最大宽度 (超出则等比缩放)
    #[serde(default = "default_frame_max_width")]
    pub frame_max_width: u32,
}

fn default_true() -> bool {
    true
}

fn default_evidence_dir() -> PathBuf {
    PathBuf::from("violations")
}

fn default_crop_quality() -> u8 {
    90
}

fn default_frame_quality() -> u8 {
    85
}

fn default_frame_max_width() -> u32 {
    1280
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            base_dir: default_evidence_dir(),
            crop_quality: default_crop_quality(),
            frame_quality: default_frame_quality(),
            frame_max_width: default_frame_max_width(),
        }
    }
}

/// Sink 输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink 名称
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 队列容量
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 日志输出
    Log,
    /// JSON Lines 文件输出
    File,
    /// 进程内广播 (查看端)
    Broadcast,
}
