use super::{id, Payload};
use bytes::{Buf, BufMut, BytesMut};

pub const MAV_TYPE_GCS: u8 = 6;
pub const MAV_TYPE_ONBOARD_CONTROLLER: u8 = 18;
pub const MAV_AUTOPILOT_INVALID: u8 = 8;
pub const MAV_STATE_ACTIVE: u8 = 4;
pub const MAVLINK_VERSION: u8 = 3;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Heartbeat {
    pub custom_mode: u32,
    pub mav_type: u8,
    pub autopilot: u8,
    pub base_mode: u8,
    pub system_status: u8,
    pub mavlink_version: u8,
}

impl Payload for Heartbeat {
    const ID: u32 = id::HEARTBEAT;
    const CRC_EXTRA: u8 = 50;
    const LEN: usize = 9;

    fn serialize(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.custom_mode);
        dst.put_u8(self.mav_type);
        dst.put_u8(self.autopilot);
        dst.put_u8(self.base_mode);
        dst.put_u8(self.system_status);
        dst.put_u8(self.mavlink_version);
    }

    fn deserialize(src: &mut &[u8]) -> Self {
        Self {
            custom_mode: src.get_u32_le(),
            mav_type: src.get_u8(),
            autopilot: src.get_u8(),
            base_mode: src.get_u8(),
            system_status: src.get_u8(),
            mavlink_version: src.get_u8(),
        }
    }
}

/// Fused global position as published by the autopilot.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GlobalPositionInt {
    pub time_boot_ms: u32,
    /// degE7
    pub lat: i32,
    /// degE7
    pub lon: i32,
    /// mm above MSL
    pub alt: i32,
    /// mm above home
    pub relative_alt: i32,
    pub vx: i16,
    pub vy: i16,
    pub vz: i16,
    /// cdeg, `u16::MAX` if unknown
    pub hdg: u16,
}

impl Payload for GlobalPositionInt {
    const ID: u32 = id::GLOBAL_POSITION_INT;
    const CRC_EXTRA: u8 = 104;
    const LEN: usize = 28;

    fn serialize(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.time_boot_ms);
        dst.put_i32_le(self.lat);
        dst.put_i32_le(self.lon);
        dst.put_i32_le(self.alt);
        dst.put_i32_le(self.relative_alt);
        dst.put_i16_le(self.vx);
        dst.put_i16_le(self.vy);
        dst.put_i16_le(self.vz);
        dst.put_u16_le(self.hdg);
    }

    fn deserialize(src: &mut &[u8]) -> Self {
        Self {
            time_boot_ms: src.get_u32_le(),
            lat: src.get_i32_le(),
            lon: src.get_i32_le(),
            alt: src.get_i32_le(),
            relative_alt: src.get_i32_le(),
            vx: src.get_i16_le(),
            vy: src.get_i16_le(),
            vz: src.get_i16_le(),
            hdg: src.get_u16_le(),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct CommandLong {
    pub params: [f32; 7],
    pub command: u16,
    pub target_system: u8,
    pub target_component: u8,
    pub confirmation: u8,
}

impl CommandLong {
    pub fn mav_cmd(&self) -> Option<MavCmd> {
        MavCmd::try_from(self.command).ok()
    }
}

impl Payload for CommandLong {
    const ID: u32 = id::COMMAND_LONG;
    const CRC_EXTRA: u8 = 152;
    const LEN: usize = 33;

    fn serialize(&self, dst: &mut BytesMut) {
        for param in self.params {
            dst.put_f32_le(param);
        }
        dst.put_u16_le(self.command);
        dst.put_u8(self.target_system);
        dst.put_u8(self.target_component);
        dst.put_u8(self.confirmation);
    }

    fn deserialize(src: &mut &[u8]) -> Self {
        let mut params = [0f32; 7];
        for param in &mut params {
            *param = src.get_f32_le();
        }
        Self {
            params,
            command: src.get_u16_le(),
            target_system: src.get_u8(),
            target_component: src.get_u8(),
            confirmation: src.get_u8(),
        }
    }
}

/// The camera related commands this system cares about.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MavCmd {
    DoDigicamControl,
    RequestCameraSettings,
    ImageStartCapture,
    ImageStopCapture,
}

impl TryFrom<u16> for MavCmd {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            203 => Ok(MavCmd::DoDigicamControl),
            522 => Ok(MavCmd::RequestCameraSettings),
            2000 => Ok(MavCmd::ImageStartCapture),
            2001 => Ok(MavCmd::ImageStopCapture),
            n => Err(n),
        }
    }
}

impl From<MavCmd> for u16 {
    fn from(cmd: MavCmd) -> Self {
        match cmd {
            MavCmd::DoDigicamControl => 203,
            MavCmd::RequestCameraSettings => 522,
            MavCmd::ImageStartCapture => 2000,
            MavCmd::ImageStopCapture => 2001,
        }
    }
}
