use async_trait::async_trait;
use serde::Deserialize;
use std::{io, path::PathBuf, time::Duration};
use thiserror::Error;

pub mod channel;
pub mod driver;
pub mod launcher;
#[cfg(test)]
pub mod scripted;

pub use driver::{CameraDriver, CameraSettings};
pub use launcher::ChdkptpLauncher;

#[derive(Copy, Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FocusMode {
    #[default]
    Auto,
    Manual {
        #[serde(rename = "distance_m")]
        distance: Option<f32>,
    },
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct CaptureRequest {
    pub focus: FocusMode,
}

/// A finished capture: the counter value it consumed and the image path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Capture {
    pub index: u32,
    pub path: PathBuf,
}

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("failed to start {}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("child process has no {0} pipe")]
    MissingPipe(&'static str),

    #[error("camera is not initialized")]
    NotInitialized,

    #[error("no response to `{command}` within {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },

    #[error("camera process closed its output during `{command}`")]
    ProcessExited { command: String },

    #[error("image {} did not appear after {attempts} polls", .path.display())]
    CaptureTimeout {
        index: u32,
        path: PathBuf,
        attempts: u32,
    },

    #[error("camera init failed {0} times in a row")]
    InitExhausted(u32),

    #[error("camera is disabled")]
    Disabled,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl CameraError {
    /// The camera cannot be brought back without restarting the service.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CameraError::InitExhausted(_))
    }
}

#[async_trait]
pub trait Camera: Send {
    async fn capture(&mut self, request: &CaptureRequest) -> Result<Capture, CameraError>;

    async fn close(&mut self) -> Result<(), CameraError> {
        Ok(())
    }
}

/// Stand-in used when the service runs without a camera attached.
#[derive(Copy, Clone, Debug, Default)]
pub struct DisabledCamera;

#[async_trait]
impl Camera for DisabledCamera {
    async fn capture(&mut self, _request: &CaptureRequest) -> Result<Capture, CameraError> {
        Err(CameraError::Disabled)
    }
}
