use crate::{
    checksum::Checksum, error::CodecError, frame::Frame, message, message::Message,
    CHECKSUM_LEN, HEADER_LEN, IFLAG_SIGNED, MAGIC_V2, MAX_PAYLOAD_LEN, SIGNATURE_LEN,
};
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// MAVLink v2 framing.
///
/// Signed frames are accepted but their signature is not verified. Frames
/// of unknown message ids are passed through as [`Message::Unknown`]
/// without checksum validation, since their CRC_EXTRA seed is not known.
#[derive(Debug, Copy, Clone, Default)]
pub struct MavlinkCodec;

impl Decoder for MavlinkCodec {
    type Item = Frame;

    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(&first) = src.first() else {
            return Ok(None);
        };
        if first != MAGIC_V2 {
            let skipped = src
                .iter()
                .position(|b| *b == MAGIC_V2)
                .unwrap_or(src.len());
            src.advance(skipped);
            return Err(CodecError::BadMagic {
                found: first,
                skipped,
            });
        }
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let payload_len = src[1] as usize;
        let incompat_flags = src[2];
        if incompat_flags & !IFLAG_SIGNED != 0 {
            src.advance(1);
            return Err(CodecError::UnsupportedFlags(incompat_flags));
        }
        let signature_len = if incompat_flags & IFLAG_SIGNED != 0 {
            SIGNATURE_LEN
        } else {
            0
        };
        let frame_len = HEADER_LEN + payload_len + CHECKSUM_LEN + signature_len;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let raw = src.split_to(frame_len).freeze();
        let id = u32::from_le_bytes([raw[7], raw[8], raw[9], 0]);
        let checksum_at = HEADER_LEN + payload_len;
        let received = u16::from_le_bytes([raw[checksum_at], raw[checksum_at + 1]]);

        if let Some(crc_extra) = message::crc_extra(id) {
            let mut checksum = Checksum::default();
            checksum.update(&raw[1..checksum_at]);
            checksum.accumulate(crc_extra);
            if checksum.value() != received {
                return Err(CodecError::ChecksumMismatch {
                    id,
                    computed: checksum.value(),
                    received,
                });
            }
        } else {
            log::debug!("Passing through unknown message {id} unchecked");
        }

        let frame = Frame {
            sequence: raw[4],
            system_id: raw[5],
            component_id: raw[6],
            message: Message::from_payload(id, raw.slice(HEADER_LEN..checksum_at)),
        };
        log::trace!("Decoded frame {frame:?}");
        Ok(Some(frame))
    }
}

impl Encoder<Frame> for MavlinkCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut payload = BytesMut::with_capacity(MAX_PAYLOAD_LEN);
        item.message.serialize(&mut payload);
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(CodecError::PayloadTooLong(payload.len()));
        }
        // Trailing zeros are implied on the wire, at least one byte stays.
        let len = payload
            .iter()
            .rposition(|b| *b != 0)
            .map_or(1, |last| last + 1);
        payload.resize(len, 0);

        let id = item.message.id();
        let start = dst.len();
        dst.reserve(HEADER_LEN + len + CHECKSUM_LEN);
        dst.put_u8(MAGIC_V2);
        dst.put_u8(len as u8);
        dst.put_u8(0);
        dst.put_u8(0);
        dst.put_u8(item.sequence);
        dst.put_u8(item.system_id);
        dst.put_u8(item.component_id);
        dst.put_slice(&id.to_le_bytes()[..3]);
        dst.put_slice(&payload);

        let mut checksum = Checksum::default();
        checksum.update(&dst[start + 1..]);
        if let Some(crc_extra) = message::crc_extra(id) {
            checksum.accumulate(crc_extra);
        }
        dst.put_u16_le(checksum.value());
        Ok(())
    }
}
