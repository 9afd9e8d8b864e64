use crate::camera::Capture;
use mavlink_codec::message::{CameraImageCaptured, GlobalPositionInt, ObjectDetected};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// Identity rotation, w first.
const LEVEL: [f32; 4] = [1.0, 0.0, 0.0, 0.0];

/// Vehicle state stamped onto outgoing capture reports.
#[derive(Debug)]
pub struct Telemetry {
    boot: Instant,
    position: Option<GlobalPositionInt>,
}

struct Stamp {
    time_utc: u64,
    time_boot_ms: u32,
    lat: i32,
    lon: i32,
    alt: i32,
    relative_alt: i32,
}

impl Telemetry {
    pub fn new(boot: Instant) -> Self {
        Self {
            boot,
            position: None,
        }
    }

    pub fn update_position(&mut self, position: GlobalPositionInt) {
        tracing::trace!("Position update {position:?}");
        self.position = Some(position);
    }

    pub fn position(&self) -> Option<&GlobalPositionInt> {
        self.position.as_ref()
    }

    pub fn image_captured(
        &self,
        camera_id: u8,
        capture: &Capture,
        success: bool,
        url_prefix: &str,
    ) -> CameraImageCaptured {
        let stamp = self.stamp();
        CameraImageCaptured {
            time_utc: stamp.time_utc,
            time_boot_ms: stamp.time_boot_ms,
            lat: stamp.lat,
            lon: stamp.lon,
            alt: stamp.alt,
            relative_alt: stamp.relative_alt,
            q: LEVEL,
            image_index: capture.index as i32,
            camera_id,
            capture_result: success.into(),
            file_url: format!("{url_prefix}/{}", file_name(capture)),
        }
    }

    /// Reports the capture to the ground as a detection.
    ///
    /// No detector runs onboard, so the bounding box is all zeros.
    pub fn object_detected(
        &self,
        camera_id: u8,
        capture: &Capture,
        url_prefix: &str,
    ) -> ObjectDetected {
        let stamp = self.stamp();
        ObjectDetected {
            time_utc: stamp.time_utc,
            time_boot_ms: stamp.time_boot_ms,
            lat: stamp.lat,
            lon: stamp.lon,
            alt: stamp.alt,
            relative_alt: stamp.relative_alt,
            source_image_index: capture.index as i32,
            bbox: [0; 4],
            camera_id,
            file_url: format!("{url_prefix}/{}/{}", capture.index, file_name(capture)),
        }
    }

    fn stamp(&self) -> Stamp {
        let position = self.position.unwrap_or_default();
        let time_utc = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |since| since.as_micros() as u64);
        let time_boot_ms = u32::try_from(self.boot.elapsed().as_millis()).unwrap_or(u32::MAX);
        Stamp {
            time_utc,
            time_boot_ms,
            lat: position.lat,
            lon: position.lon,
            alt: position.alt,
            relative_alt: position.relative_alt,
        }
    }
}

fn file_name(capture: &Capture) -> String {
    capture
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
