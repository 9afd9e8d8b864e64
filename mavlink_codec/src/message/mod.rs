use bytes::{Buf, BufMut, Bytes, BytesMut};

pub mod camera;
pub mod common;
pub mod lacmus;

pub use camera::{CameraCaptureStatus, CameraImageCaptured, CameraTrigger};
pub use common::{CommandLong, GlobalPositionInt, Heartbeat, MavCmd};
pub use lacmus::ObjectDetected;

pub mod id {
    pub const HEARTBEAT: u32 = 0;
    pub const GLOBAL_POSITION_INT: u32 = 33;
    pub const COMMAND_LONG: u32 = 76;
    pub const CAMERA_TRIGGER: u32 = 112;
    pub const CAMERA_CAPTURE_STATUS: u32 = 262;
    pub const CAMERA_IMAGE_CAPTURED: u32 = 263;
    pub const LACMUS_OBJECT_DETECTED: u32 = 50000;
}

/// Fixed wire layout of one message kind.
///
/// Fields are serialized in MAVLink wire order (largest type first), little
/// endian, with `LEN` being the untruncated payload length including any
/// extension fields this crate knows about.
pub trait Payload: Sized {
    const ID: u32;
    const CRC_EXTRA: u8;
    const LEN: usize;

    fn serialize(&self, dst: &mut BytesMut);

    /// `src` always holds exactly `LEN` bytes, zero extended if the frame
    /// was truncated on the wire.
    fn deserialize(src: &mut &[u8]) -> Self;
}

#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    Heartbeat(Heartbeat),
    GlobalPositionInt(GlobalPositionInt),
    CommandLong(CommandLong),
    CameraTrigger(CameraTrigger),
    CameraCaptureStatus(CameraCaptureStatus),
    CameraImageCaptured(CameraImageCaptured),
    ObjectDetected(ObjectDetected),
    Unknown { id: u32, payload: Bytes },
}

impl Message {
    pub fn id(&self) -> u32 {
        match self {
            Message::Heartbeat(_) => id::HEARTBEAT,
            Message::GlobalPositionInt(_) => id::GLOBAL_POSITION_INT,
            Message::CommandLong(_) => id::COMMAND_LONG,
            Message::CameraTrigger(_) => id::CAMERA_TRIGGER,
            Message::CameraCaptureStatus(_) => id::CAMERA_CAPTURE_STATUS,
            Message::CameraImageCaptured(_) => id::CAMERA_IMAGE_CAPTURED,
            Message::ObjectDetected(_) => id::LACMUS_OBJECT_DETECTED,
            Message::Unknown { id, .. } => *id,
        }
    }

    pub(crate) fn from_payload(id: u32, payload: Bytes) -> Self {
        match id {
            id::HEARTBEAT => Message::Heartbeat(parse(&payload)),
            id::GLOBAL_POSITION_INT => Message::GlobalPositionInt(parse(&payload)),
            id::COMMAND_LONG => Message::CommandLong(parse(&payload)),
            id::CAMERA_TRIGGER => Message::CameraTrigger(parse(&payload)),
            id::CAMERA_CAPTURE_STATUS => Message::CameraCaptureStatus(parse(&payload)),
            id::CAMERA_IMAGE_CAPTURED => Message::CameraImageCaptured(parse(&payload)),
            id::LACMUS_OBJECT_DETECTED => Message::ObjectDetected(parse(&payload)),
            id => Message::Unknown { id, payload },
        }
    }

    pub(crate) fn serialize(&self, dst: &mut BytesMut) {
        match self {
            Message::Heartbeat(m) => m.serialize(dst),
            Message::GlobalPositionInt(m) => m.serialize(dst),
            Message::CommandLong(m) => m.serialize(dst),
            Message::CameraTrigger(m) => m.serialize(dst),
            Message::CameraCaptureStatus(m) => m.serialize(dst),
            Message::CameraImageCaptured(m) => m.serialize(dst),
            Message::ObjectDetected(m) => m.serialize(dst),
            Message::Unknown { payload, .. } => dst.put_slice(payload),
        }
    }
}

/// CRC_EXTRA seed for the given message id, `None` for ids this crate
/// cannot validate.
pub fn crc_extra(id: u32) -> Option<u8> {
    match id {
        id::HEARTBEAT => Some(Heartbeat::CRC_EXTRA),
        id::GLOBAL_POSITION_INT => Some(GlobalPositionInt::CRC_EXTRA),
        id::COMMAND_LONG => Some(CommandLong::CRC_EXTRA),
        id::CAMERA_TRIGGER => Some(CameraTrigger::CRC_EXTRA),
        id::CAMERA_CAPTURE_STATUS => Some(CameraCaptureStatus::CRC_EXTRA),
        id::CAMERA_IMAGE_CAPTURED => Some(CameraImageCaptured::CRC_EXTRA),
        id::LACMUS_OBJECT_DETECTED => Some(ObjectDetected::CRC_EXTRA),
        _ => None,
    }
}

fn parse<P: Payload>(payload: &[u8]) -> P {
    let mut buffer = [0u8; crate::MAX_PAYLOAD_LEN];
    let len = payload.len().min(P::LEN);
    buffer[..len].copy_from_slice(&payload[..len]);
    P::deserialize(&mut &buffer[..P::LEN])
}

pub(crate) fn put_chars(dst: &mut BytesMut, text: &str, len: usize) {
    let bytes = text.as_bytes();
    let n = bytes.len().min(len);
    dst.put_slice(&bytes[..n]);
    dst.put_bytes(0, len - n);
}

pub(crate) fn get_chars(src: &mut &[u8], len: usize) -> String {
    let raw = &src[..len];
    let end = raw.iter().position(|b| *b == 0).unwrap_or(len);
    let text = String::from_utf8_lossy(&raw[..end]).into_owned();
    src.advance(len);
    text
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn chars_are_nul_padded_and_trimmed() {
        let mut buffer = BytesMut::new();
        put_chars(&mut buffer, "/captures/img_7.jpg", 32);
        assert_eq!(32, buffer.len());

        let mut src = &buffer[..];
        assert_eq!("/captures/img_7.jpg", get_chars(&mut src, 32));
        assert!(src.is_empty());
    }

    #[test]
    fn chars_are_cut_at_field_length() {
        let mut buffer = BytesMut::new();
        put_chars(&mut buffer, "abcdef", 4);
        assert_eq!(&b"abcd"[..], &buffer[..]);
    }

    #[test]
    fn short_payload_is_zero_extended() {
        let message = Message::from_payload(id::CAMERA_TRIGGER, Bytes::from_static(&[0x01]));
        assert_eq!(
            Message::CameraTrigger(CameraTrigger {
                time_usec: 1,
                seq: 0
            }),
            message
        );
    }

    #[test]
    fn unknown_ids_pass_through() {
        let payload = Bytes::from_static(&[1, 2, 3]);
        let message = Message::from_payload(999, payload.clone());
        assert_eq!(Message::Unknown { id: 999, payload }, message);
        assert_eq!(None, crc_extra(999));
    }
}
