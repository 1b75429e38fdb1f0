//! Frame - FrameSource 输出
//!
//! 原始帧与检测/跟踪结果结构。

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::BBox;

/// 单帧
///
/// `timestamp` 为会话时钟（秒，f64），所有规则与冷却窗口均以此为准。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// 会话内帧序号 (从 0 开始，单调递增)
    pub index: u64,

    /// 时间戳 (seconds, f64)
    pub timestamp: f64,

    /// 像素数据 (零拷贝)
    pub image: ImageData,
}

impl Frame {
    pub fn width(&self) -> u32 {
        self.image.width
    }

    pub fn height(&self) -> u32 {
        self.image.height
    }
}

/// 图像数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageData {
    /// 图像宽度
    pub width: u32,

    /// 图像高度
    pub height: u32,

    /// 像素格式
    pub format: ImageFormat,

    /// 原始像素数据
    pub data: Bytes,
}

impl ImageData {
    /// 纯黑 RGB 图像 (回放/测试用)
    pub fn blank(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * ImageFormat::Rgb8.bytes_per_pixel();
        Self {
            width,
            height,
            format: ImageFormat::Rgb8,
            data: Bytes::from(vec![0u8; len]),
        }
    }

    /// 数据长度是否与宽高/格式一致
    pub fn is_consistent(&self) -> bool {
        self.data.len()
            == self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

/// 图像格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Rgb8,
    Bgr8,
    Rgba8,
}

impl ImageFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ImageFormat::Rgb8 | ImageFormat::Bgr8 => 3,
            ImageFormat::Rgba8 => 4,
        }
    }
}

/// 跟踪目标
///
/// 外部 detector+tracker 的单条输出。`track_id` 为 `None` 表示未跟踪。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedObject {
    /// 像素坐标边框
    pub bbox: BBox,

    /// 跟踪 ID (会话内稳定)
    #[serde(default)]
    pub track_id: Option<u64>,

    /// 类别名称 (e.g., "car")
    pub class_name: String,

    /// 置信度
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    1.0
}

impl TrackedObject {
    pub fn new(bbox: BBox, track_id: Option<u64>, class_name: impl Into<String>) -> Self {
        Self {
            bbox,
            track_id,
            class_name: class_name.into(),
            confidence: 1.0,
        }
    }
}
