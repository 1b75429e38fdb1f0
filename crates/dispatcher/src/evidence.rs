//! FileEvidenceStore - violation evidence on disk
//!
//! Layout under `base_dir`:
//! - `crops/<id>.jpg`       clamped box crop
//! - `fullframes/<id>.jpg`  full frame, downscaled to `frame_max_width`
//! - `metadata/<id>.json`   [`EvidenceRecord`]
//!
//! `id = <kind>_<track>_<YYYYmmdd_HHMMSS_mmm>` (local time).

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use contracts::{
    AlertInfo, BBox, ContractError, EvidenceConfig, EvidenceStore, Frame, ImageData, ImageFormat,
    ViolationKind,
};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::DispatcherError;

const CROPS_DIR: &str = "crops";
const FRAMES_DIR: &str = "fullframes";
const METADATA_DIR: &str = "metadata";

/// Metadata persisted next to the images of one violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    /// Capture time, `YYYYmmdd_HHMMSS_mmm`
    pub timestamp: String,
    pub violation_type: ViolationKind,
    pub track_id: Option<u64>,
    /// Clamped pixel box `[x1, y1, x2, y2]`
    pub bbox: [u32; 4],
    /// Relative to the store root
    pub crop_path: String,
    /// Relative to the store root
    pub frame_path: String,
    /// Alert info fields
    #[serde(flatten)]
    pub info: AlertInfo,
}

/// Evidence store writing JPEG images and JSON metadata
#[derive(Debug, Clone)]
pub struct FileEvidenceStore {
    base_dir: PathBuf,
    crop_quality: u8,
    frame_quality: u8,
    frame_max_width: u32,
}

impl FileEvidenceStore {
    /// Create the store and its directory layout
    pub fn new(config: &EvidenceConfig) -> Result<Self, DispatcherError> {
        for dir in [CROPS_DIR, FRAMES_DIR, METADATA_DIR] {
            fs::create_dir_all(config.base_dir.join(dir)).map_err(|e| {
                DispatcherError::evidence_store(config.base_dir.display().to_string(), e.to_string())
            })?;
        }
        info!(base_dir = %config.base_dir.display(), "Evidence store ready");

        Ok(Self {
            base_dir: config.base_dir.clone(),
            crop_quality: config.crop_quality.clamp(1, 100),
            frame_quality: config.frame_quality.clamp(1, 100),
            frame_max_width: config.frame_max_width.max(1),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Most recent records (by metadata modification time), newest first
    ///
    /// Unreadable records are skipped with a warning.
    pub fn recent(&self, limit: usize) -> Result<Vec<EvidenceRecord>, ContractError> {
        let mut files: Vec<(SystemTime, PathBuf)> = fs::read_dir(self.base_dir.join(METADATA_DIR))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| {
                let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
                Some((modified, path))
            })
            .collect();
        files.sort_by(|a, b| b.cmp(a));

        let records = files
            .into_iter()
            .take(limit)
            .filter_map(|(_, path)| match read_record(&path) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable evidence record");
                    None
                }
            })
            .collect();
        Ok(records)
    }

    /// Record for one evidence id
    pub fn load(&self, id: &str) -> Result<EvidenceRecord, ContractError> {
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(ContractError::evidence(format!("invalid evidence id '{id}'")));
        }
        read_record(&self.base_dir.join(METADATA_DIR).join(format!("{id}.json")))
    }

    fn write_jpeg(&self, path: &Path, image: &RgbImage, quality: u8) -> Result<(), ContractError> {
        let mut writer = BufWriter::new(File::create(path)?);
        JpegEncoder::new_with_quality(&mut writer, quality)
            .encode_image(image)
            .map_err(|e| ContractError::evidence(format!("jpeg encode {}: {e}", path.display())))
    }

    /// Crop, full frame, metadata; every path is recorded before it is created
    fn write_files(
        &self,
        id: &str,
        crop: &RgbImage,
        full: &RgbImage,
        record: &EvidenceRecord,
        written: &mut Vec<PathBuf>,
    ) -> Result<(), ContractError> {
        let crop_file = self.base_dir.join(&record.crop_path);
        written.push(crop_file.clone());
        self.write_jpeg(&crop_file, crop, self.crop_quality)?;

        let frame_file = self.base_dir.join(&record.frame_path);
        written.push(frame_file.clone());
        self.write_jpeg(&frame_file, full, self.frame_quality)?;

        let meta_file = self.base_dir.join(METADATA_DIR).join(format!("{id}.json"));
        written.push(meta_file.clone());
        let writer = BufWriter::new(File::create(&meta_file)?);
        serde_json::to_writer_pretty(writer, record)
            .map_err(|e| ContractError::evidence(format!("metadata write: {e}")))
    }

    fn downscale(&self, image: RgbImage) -> RgbImage {
        let (w, h) = image.dimensions();
        if w <= self.frame_max_width {
            return image;
        }
        let scale = f64::from(self.frame_max_width) / f64::from(w);
        let nh = ((f64::from(h) * scale).round() as u32).max(1);
        imageops::resize(&image, self.frame_max_width, nh, FilterType::Triangle)
    }
}

impl EvidenceStore for FileEvidenceStore {
    #[instrument(
        level = "debug",
        name = "evidence_save_violation",
        skip(self, frame, bbox, info),
        fields(kind = %kind, track_id = ?track_id)
    )]
    fn save_violation(
        &self,
        kind: ViolationKind,
        track_id: Option<u64>,
        frame: &Frame,
        bbox: &BBox,
        info: &AlertInfo,
    ) -> Result<String, ContractError> {
        let image = to_rgb(&frame.image)
            .ok_or_else(|| ContractError::evidence("frame buffer does not match its dimensions"))?;
        let clamped = clamp_box(bbox, image.width(), image.height())
            .ok_or_else(|| ContractError::evidence("empty crop"))?;

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f").to_string();
        let track = track_id.map_or_else(|| "untracked".to_string(), |id| id.to_string());
        let id = format!("{kind}_{track}_{timestamp}");

        let [x1, y1, x2, y2] = clamped;
        let crop = imageops::crop_imm(&image, x1, y1, x2 - x1, y2 - y1).to_image();
        let full = self.downscale(image);

        let record = EvidenceRecord {
            timestamp,
            violation_type: kind,
            track_id,
            bbox: clamped,
            crop_path: format!("{CROPS_DIR}/{id}.jpg"),
            frame_path: format!("{FRAMES_DIR}/{id}.jpg"),
            info: info.clone(),
        };

        let mut written = Vec::with_capacity(3);
        if let Err(e) = self.write_files(&id, &crop, &full, &record, &mut written) {
            remove_partial(&written);
            return Err(e);
        }

        debug!(evidence_id = %id, "Evidence saved");
        Ok(id)
    }
}

/// Best-effort cleanup after a failed save
fn remove_partial(paths: &[PathBuf]) {
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "Removed partial evidence file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Could not remove partial evidence file"),
        }
    }
}

fn read_record(path: &Path) -> Result<EvidenceRecord, ContractError> {
    let reader = BufReader::new(File::open(path)?);
    serde_json::from_reader(reader)
        .map_err(|e| ContractError::evidence(format!("{}: {e}", path.display())))
}

/// Frame pixels as RGB, `None` when the buffer is inconsistent
fn to_rgb(image: &ImageData) -> Option<RgbImage> {
    if !image.is_consistent() {
        return None;
    }
    let data = &image.data;
    let rgb: Vec<u8> = match image.format {
        ImageFormat::Rgb8 => data.to_vec(),
        ImageFormat::Bgr8 => data
            .chunks_exact(3)
            .flat_map(|px| [px[2], px[1], px[0]])
            .collect(),
        ImageFormat::Rgba8 => data
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect(),
    };
    RgbImage::from_raw(image.width, image.height, rgb)
}

/// Box clamped to the frame, `None` when nothing is left
fn clamp_box(bbox: &BBox, width: u32, height: u32) -> Option<[u32; 4]> {
    let clamp = |v: f64, max: u32| v.clamp(0.0, f64::from(max)) as u32;
    let x1 = clamp(bbox.x1, width);
    let y1 = clamp(bbox.y1, height);
    let x2 = clamp(bbox.x2, width);
    let y2 = clamp(bbox.y2, height);
    (x2 > x1 && y2 > y1).then_some([x1, y1, x2, y2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ImageData;
    use tempfile::tempdir;

    /// Gradient RGB frame
    fn rgb_frame(width: u32, height: u32) -> Frame {
        let data: Vec<u8> = (0..width * height)
            .flat_map(|i| [(i % 251) as u8, (i % 13) as u8, 128])
            .collect();
        Frame {
            index: 0,
            timestamp: 0.0,
            image: ImageData {
                width,
                height,
                format: ImageFormat::Rgb8,
                data: data.into(),
            },
        }
    }

    fn make_store(dir: &Path, max_width: u32) -> FileEvidenceStore {
        FileEvidenceStore::new(&EvidenceConfig {
            base_dir: dir.to_path_buf(),
            frame_max_width: max_width,
            ..Default::default()
        })
        .unwrap()
    }

    fn speed_info() -> AlertInfo {
        let mut info = AlertInfo::new();
        info.insert("speed_kmh".into(), 36.0.into());
        info
    }

    #[test]
    fn test_save_violation_layout() {
        let dir = tempdir().unwrap();
        let store = make_store(dir.path(), 1280);
        let frame = rgb_frame(64, 48);

        let id = store
            .save_violation(
                ViolationKind::Speeding,
                Some(7),
                &frame,
                &BBox::new(10.0, 5.0, 30.0, 25.0),
                &speed_info(),
            )
            .unwrap();
        assert!(id.starts_with("speeding_7_"));

        assert!(dir.path().join(format!("crops/{id}.jpg")).exists());
        assert!(dir.path().join(format!("fullframes/{id}.jpg")).exists());

        let record = store.load(&id).unwrap();
        assert_eq!(record.violation_type, ViolationKind::Speeding);
        assert_eq!(record.track_id, Some(7));
        assert_eq!(record.bbox, [10, 5, 30, 25]);
        assert_eq!(record.crop_path, format!("crops/{id}.jpg"));
        assert_eq!(record.info["speed_kmh"], 36.0);

        let crop = image::open(dir.path().join(&record.crop_path)).unwrap();
        assert_eq!((crop.width(), crop.height()), (20, 20));
    }

    #[test]
    fn test_box_clamped_to_frame() {
        let dir = tempdir().unwrap();
        let store = make_store(dir.path(), 1280);
        let frame = rgb_frame(64, 48);

        let id = store
            .save_violation(
                ViolationKind::LaneExit,
                None,
                &frame,
                &BBox::new(-10.0, 40.0, 20.0, 90.0),
                &AlertInfo::new(),
            )
            .unwrap();
        assert!(id.starts_with("lane_exit_untracked_"));
        assert_eq!(store.load(&id).unwrap().bbox, [0, 40, 20, 48]);
    }

    #[test]
    fn test_empty_crop_fails() {
        let dir = tempdir().unwrap();
        let store = make_store(dir.path(), 1280);
        let frame = rgb_frame(64, 48);

        let result = store.save_violation(
            ViolationKind::WrongWay,
            Some(1),
            &frame,
            &BBox::new(100.0, 100.0, 120.0, 120.0),
            &AlertInfo::new(),
        );
        assert!(result.is_err());
        assert!(store.recent(10).unwrap().is_empty());
    }

    #[test]
    fn test_failed_save_leaves_no_crop() {
        let dir = tempdir().unwrap();
        let store = make_store(dir.path(), 1280);
        // full-frame writes fail: the directory is now a plain file
        fs::remove_dir(dir.path().join(FRAMES_DIR)).unwrap();
        fs::write(dir.path().join(FRAMES_DIR), b"").unwrap();

        let result = store.save_violation(
            ViolationKind::SignalCrossing,
            Some(2),
            &rgb_frame(64, 48),
            &BBox::new(10.0, 10.0, 30.0, 30.0),
            &AlertInfo::new(),
        );
        assert!(result.is_err());
        assert_eq!(fs::read_dir(dir.path().join(CROPS_DIR)).unwrap().count(), 0);
        assert_eq!(fs::read_dir(dir.path().join(METADATA_DIR)).unwrap().count(), 0);
    }

    #[test]
    fn test_full_frame_downscaled() {
        let dir = tempdir().unwrap();
        let store = make_store(dir.path(), 32);
        let frame = rgb_frame(64, 48);

        let id = store
            .save_violation(
                ViolationKind::NoHelmet,
                Some(2),
                &frame,
                &BBox::new(0.0, 0.0, 16.0, 16.0),
                &AlertInfo::new(),
            )
            .unwrap();
        let full = image::open(dir.path().join(format!("fullframes/{id}.jpg"))).unwrap();
        assert_eq!((full.width(), full.height()), (32, 24));
    }

    #[test]
    fn test_recent_newest_first() {
        let dir = tempdir().unwrap();
        let store = make_store(dir.path(), 1280);
        let frame = rgb_frame(32, 32);
        let bbox = BBox::new(0.0, 0.0, 8.0, 8.0);

        let first = store
            .save_violation(ViolationKind::LaneExit, Some(1), &frame, &bbox, &AlertInfo::new())
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        let second = store
            .save_violation(ViolationKind::LaneExit, Some(2), &frame, &bbox, &AlertInfo::new())
            .unwrap();

        let recent = store.recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].track_id, Some(2));
        assert_eq!(recent[1].track_id, Some(1));
        assert_eq!(store.recent(1).unwrap().len(), 1);
        assert_ne!(first, second);
    }

    #[test]
    fn test_load_rejects_paths() {
        let dir = tempdir().unwrap();
        let store = make_store(dir.path(), 1280);
        assert!(store.load("../etc/passwd").is_err());
        assert!(store.load("missing").is_err());
    }
}
