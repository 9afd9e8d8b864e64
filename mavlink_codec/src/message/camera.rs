use super::{get_chars, id, put_chars, Payload};
use bytes::{Buf, BufMut, BytesMut};

pub const FILE_URL_LEN: usize = 205;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CameraTrigger {
    pub time_usec: u64,
    pub seq: u32,
}

impl Payload for CameraTrigger {
    const ID: u32 = id::CAMERA_TRIGGER;
    const CRC_EXTRA: u8 = 174;
    const LEN: usize = 12;

    fn serialize(&self, dst: &mut BytesMut) {
        dst.put_u64_le(self.time_usec);
        dst.put_u32_le(self.seq);
    }

    fn deserialize(src: &mut &[u8]) -> Self {
        Self {
            time_usec: src.get_u64_le(),
            seq: src.get_u32_le(),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct CameraCaptureStatus {
    pub time_boot_ms: u32,
    pub image_interval: f32,
    pub recording_time_ms: u32,
    /// MiB
    pub available_capacity: f32,
    pub image_status: u8,
    pub video_status: u8,
    /// Extension field, zero when the sender predates it.
    pub image_count: i32,
}

impl Payload for CameraCaptureStatus {
    const ID: u32 = id::CAMERA_CAPTURE_STATUS;
    const CRC_EXTRA: u8 = 12;
    const LEN: usize = 22;

    fn serialize(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.time_boot_ms);
        dst.put_f32_le(self.image_interval);
        dst.put_u32_le(self.recording_time_ms);
        dst.put_f32_le(self.available_capacity);
        dst.put_u8(self.image_status);
        dst.put_u8(self.video_status);
        dst.put_i32_le(self.image_count);
    }

    fn deserialize(src: &mut &[u8]) -> Self {
        Self {
            time_boot_ms: src.get_u32_le(),
            image_interval: src.get_f32_le(),
            recording_time_ms: src.get_u32_le(),
            available_capacity: src.get_f32_le(),
            image_status: src.get_u8(),
            video_status: src.get_u8(),
            image_count: src.get_i32_le(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CameraImageCaptured {
    pub time_utc: u64,
    pub time_boot_ms: u32,
    pub lat: i32,
    pub lon: i32,
    pub alt: i32,
    pub relative_alt: i32,
    /// w, x, y, z
    pub q: [f32; 4],
    pub image_index: i32,
    pub camera_id: u8,
    pub capture_result: i8,
    pub file_url: String,
}

impl Payload for CameraImageCaptured {
    const ID: u32 = id::CAMERA_IMAGE_CAPTURED;
    const CRC_EXTRA: u8 = 133;
    const LEN: usize = 255;

    fn serialize(&self, dst: &mut BytesMut) {
        dst.put_u64_le(self.time_utc);
        dst.put_u32_le(self.time_boot_ms);
        dst.put_i32_le(self.lat);
        dst.put_i32_le(self.lon);
        dst.put_i32_le(self.alt);
        dst.put_i32_le(self.relative_alt);
        for q in self.q {
            dst.put_f32_le(q);
        }
        dst.put_i32_le(self.image_index);
        dst.put_u8(self.camera_id);
        dst.put_i8(self.capture_result);
        put_chars(dst, &self.file_url, FILE_URL_LEN);
    }

    fn deserialize(src: &mut &[u8]) -> Self {
        let time_utc = src.get_u64_le();
        let time_boot_ms = src.get_u32_le();
        let lat = src.get_i32_le();
        let lon = src.get_i32_le();
        let alt = src.get_i32_le();
        let relative_alt = src.get_i32_le();
        let mut q = [0f32; 4];
        for value in &mut q {
            *value = src.get_f32_le();
        }
        Self {
            time_utc,
            time_boot_ms,
            lat,
            lon,
            alt,
            relative_alt,
            q,
            image_index: src.get_i32_le(),
            camera_id: src.get_u8(),
            capture_result: src.get_i8(),
            file_url: get_chars(src, FILE_URL_LEN),
        }
    }
}
