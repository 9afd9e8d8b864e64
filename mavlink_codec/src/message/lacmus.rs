//! Messages of the lacmus dialect, layered on top of the common set.

use super::{camera::FILE_URL_LEN, get_chars, id, put_chars, Payload};
use bytes::{Buf, BufMut, BytesMut};

/// An object found in a previously captured image.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectDetected {
    pub time_utc: u64,
    pub time_boot_ms: u32,
    pub lat: i32,
    pub lon: i32,
    pub alt: i32,
    pub relative_alt: i32,
    pub source_image_index: i32,
    /// x, y, width, height in image pixels
    pub bbox: [u16; 4],
    pub camera_id: u8,
    pub file_url: String,
}

impl Payload for ObjectDetected {
    const ID: u32 = id::LACMUS_OBJECT_DETECTED;
    const CRC_EXTRA: u8 = 24;
    const LEN: usize = 246;

    fn serialize(&self, dst: &mut BytesMut) {
        dst.put_u64_le(self.time_utc);
        dst.put_u32_le(self.time_boot_ms);
        dst.put_i32_le(self.lat);
        dst.put_i32_le(self.lon);
        dst.put_i32_le(self.alt);
        dst.put_i32_le(self.relative_alt);
        dst.put_i32_le(self.source_image_index);
        for value in self.bbox {
            dst.put_u16_le(value);
        }
        dst.put_u8(self.camera_id);
        put_chars(dst, &self.file_url, FILE_URL_LEN);
    }

    fn deserialize(src: &mut &[u8]) -> Self {
        let time_utc = src.get_u64_le();
        let time_boot_ms = src.get_u32_le();
        let lat = src.get_i32_le();
        let lon = src.get_i32_le();
        let alt = src.get_i32_le();
        let relative_alt = src.get_i32_le();
        let source_image_index = src.get_i32_le();
        let mut bbox = [0u16; 4];
        for value in &mut bbox {
            *value = src.get_u16_le();
        }
        Self {
            time_utc,
            time_boot_ms,
            lat,
            lon,
            alt,
            relative_alt,
            source_image_index,
            bbox,
            camera_id: src.get_u8(),
            file_url: get_chars(src, FILE_URL_LEN),
        }
    }
}
