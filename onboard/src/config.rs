use crate::{
    camera::{CameraSettings, CaptureRequest, FocusMode},
    dispatcher::DispatchSettings,
    inbound::BufferPolicy,
    session::{Identity, SessionSettings},
};
use anyhow::Context;
use serde::Deserialize;
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mavlink: MavlinkConfig,
    pub camera: CameraConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MavlinkConfig {
    pub host: IpAddr,
    pub port: u16,
    pub system_id: u8,
    pub component_id: u8,
    #[serde(with = "humantime_serde")]
    pub heartbeat_interval: Duration,
    pub buffer: BufferPolicy,
}

impl Default for MavlinkConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 14550,
            system_id: 1,
            component_id: 100,
            heartbeat_interval: Duration::from_secs(1),
            buffer: BufferPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub enabled: bool,
    /// Directory holding `chdkptp.sh` and `shoot.lua`.
    pub chdkptp_root: PathBuf,
    pub captures_dir: PathBuf,
    pub camera_id: u8,
    pub init_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub settle_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub focus_settle_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub command_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    pub poll_attempts: u32,
    pub focus: FocusMode,
    /// Zoom step applied once after the camera connected.
    pub zoom: Option<u32>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        let driver = CameraSettings::default();
        Self {
            enabled: true,
            chdkptp_root: PathBuf::from("chdkptp"),
            captures_dir: driver.captures_dir,
            camera_id: 1,
            init_attempts: 5,
            settle_delay: driver.settle_delay,
            focus_settle_delay: driver.focus_settle_delay,
            command_timeout: driver.command_timeout,
            poll_interval: driver.poll_interval,
            poll_attempts: driver.poll_attempts,
            focus: FocusMode::default(),
            zoom: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub capture_url_prefix: String,
    pub detection_url_prefix: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            capture_url_prefix: "/captures".to_string(),
            detection_url_prefix: "/detections".to_string(),
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let config = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&config).context("Failed to parse configuration toml file")
    }

    pub fn endpoint(&self) -> SocketAddr {
        SocketAddr::new(self.mavlink.host, self.mavlink.port)
    }

    pub fn identity(&self) -> Identity {
        Identity {
            system_id: self.mavlink.system_id,
            component_id: self.mavlink.component_id,
        }
    }

    pub fn camera_settings(&self) -> CameraSettings {
        let camera = &self.camera;
        CameraSettings {
            captures_dir: camera.captures_dir.clone(),
            shoot_script: camera.chdkptp_root.join("shoot.lua"),
            settle_delay: camera.settle_delay,
            focus_settle_delay: camera.focus_settle_delay,
            command_timeout: camera.command_timeout,
            poll_interval: camera.poll_interval,
            poll_attempts: camera.poll_attempts,
            init_attempts: camera.init_attempts,
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            heartbeat_interval: self.mavlink.heartbeat_interval,
            buffer: self.mavlink.buffer,
            dispatch: DispatchSettings {
                camera_id: self.camera.camera_id,
                capture: CaptureRequest {
                    focus: self.camera.focus,
                },
                capture_url_prefix: self.telemetry.capture_url_prefix.clone(),
                detection_url_prefix: self.telemetry.detection_url_prefix.clone(),
            },
        }
    }
}
