use super::{
    channel::{LineChannel, Response},
    launcher::Launch,
    Camera, CameraError, Capture, CaptureRequest, FocusMode,
};
use async_trait::async_trait;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{process::Child, time::sleep};

const CONNECTED: &str = "connected";

#[derive(Clone, Debug)]
pub struct CameraSettings {
    pub captures_dir: PathBuf,
    pub shoot_script: PathBuf,
    /// Pause after `connect` and after `rec`.
    pub settle_delay: Duration,
    /// Pause after each focus command.
    pub focus_settle_delay: Duration,
    pub command_timeout: Duration,
    pub poll_interval: Duration,
    pub poll_attempts: u32,
    /// Init attempts when reconnecting after a lost child process.
    pub init_attempts: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            captures_dir: PathBuf::from("captures"),
            shoot_script: PathBuf::from("shoot.lua"),
            settle_delay: Duration::from_secs(1),
            focus_settle_delay: Duration::from_millis(100),
            command_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
            poll_attempts: 100,
            init_attempts: 5,
        }
    }
}

/// Drives a CHDK camera through an interactive chdkptp child process.
pub struct CameraDriver<L> {
    launcher: L,
    settings: CameraSettings,
    channel: Option<LineChannel>,
    child: Option<Child>,
    initialized: bool,
    last_zoom: Option<String>,
    counter: u32,
}

impl<L: Launch> CameraDriver<L> {
    pub fn new(launcher: L, settings: CameraSettings) -> Self {
        Self {
            launcher,
            settings,
            channel: None,
            child: None,
            initialized: false,
            last_zoom: None,
            counter: 0,
        }
    }

    /// Starts a fresh child process and runs the connect handshake.
    ///
    /// Returns `Ok(false)` when the camera refused to connect; the child has
    /// been shut down again in that case.
    pub async fn init(&mut self) -> Result<bool, CameraError> {
        self.close().await?;

        let io = self.launcher.launch()?;
        self.child = io.child;
        self.channel = Some(LineChannel::new(
            io.stdin,
            io.stdout,
            self.settings.command_timeout,
        ));

        self.exchange("set usb_reset_on_close=false", Response::Single)
            .await?;
        let connected = self.exchange("connect", Response::Echo).await?;
        if !connected.starts_with(CONNECTED) {
            tracing::warn!("Camera did not connect: {connected}");
            self.close().await?;
            return Ok(false);
        }
        sleep(self.settings.settle_delay).await;
        self.exchange("rec", Response::Single).await?;
        sleep(self.settings.settle_delay).await;
        self.exchange("=init_usb_capture(0)", Response::Single)
            .await?;

        self.initialized = true;
        tracing::info!("Camera init done");
        Ok(true)
    }

    pub async fn init_with_retries(&mut self, attempts: u32) -> Result<(), CameraError> {
        for attempt in 1..=attempts {
            match self.init().await {
                Ok(true) => return Ok(()),
                Ok(false) => tracing::warn!("Camera init attempt {attempt}/{attempts} failed"),
                Err(e) => tracing::warn!("Camera init attempt {attempt}/{attempts} failed: {e}"),
            }
        }
        tracing::error!("Camera init failed {attempts} times, giving up");
        Err(CameraError::InitExhausted(attempts))
    }

    /// Focuses, fires the shutter and waits for the image to appear.
    ///
    /// The capture counter advances once the shutter command went through,
    /// whether or not the image shows up in time.
    ///
    /// A driver that lost its child process reconnects first. Running out of
    /// init attempts there is reported as [`CameraError::InitExhausted`].
    pub async fn capture(&mut self, request: &CaptureRequest) -> Result<Capture, CameraError> {
        self.reconnect().await?;

        match request.focus {
            FocusMode::Manual { distance } => {
                self.exchange("=set_mf(1)", Response::Single).await?;
                sleep(self.settings.focus_settle_delay).await;
                if let Some(distance) = distance {
                    let command = format!("=set_focus({})", millimetres(distance));
                    self.exchange(&command, Response::Single).await?;
                    sleep(self.settings.focus_settle_delay).await;
                }
            }
            FocusMode::Auto => {
                self.exchange("=set_mf(0)", Response::Single).await?;
            }
        }

        let index = self.counter;
        let stem = self.settings.captures_dir.join(format!("img_{index}"));
        let shoot = format!(
            "rs {} -script={}",
            stem.display(),
            self.settings.shoot_script.display()
        );
        self.exchange(&shoot, Response::EchoTrailing).await?;

        let path = stem.with_extension("jpg");
        let found = wait_for(
            &path,
            self.settings.poll_interval,
            self.settings.poll_attempts,
        )
        .await;
        self.counter += 1;

        if found {
            tracing::info!("Captured image {}", path.display());
            Ok(Capture { index, path })
        } else {
            Err(CameraError::CaptureTimeout {
                index,
                path,
                attempts: self.settings.poll_attempts,
            })
        }
    }

    async fn reconnect(&mut self) -> Result<(), CameraError> {
        if self.initialized && self.channel.is_some() {
            return Ok(());
        }
        tracing::warn!("Camera is not initialized, reconnecting");
        self.init_with_retries(self.settings.init_attempts).await
    }

    pub async fn set_zoom(&mut self, value: u32) -> Result<(), CameraError> {
        self.ensure_initialized()?;
        self.exchange(&format!("=set_zoom({value})"), Response::Single)
            .await?;
        Ok(())
    }

    /// Asks the camera for its zoom step, returned as the camera reports it.
    pub async fn get_zoom(&mut self) -> Result<String, CameraError> {
        self.ensure_initialized()?;
        let zoom = self.exchange("=return get_zoom()", Response::Echo).await?;
        self.last_zoom = Some(zoom.clone());
        Ok(zoom)
    }

    pub fn last_zoom(&self) -> Option<&str> {
        self.last_zoom.as_deref()
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub async fn close(&mut self) -> Result<(), CameraError> {
        self.initialized = false;
        self.channel = None;
        if let Some(mut child) = self.child.take() {
            tracing::info!("Terminating chdkptp subprocess");
            child.kill().await?;
        }
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<(), CameraError> {
        if self.initialized && self.channel.is_some() {
            Ok(())
        } else {
            Err(CameraError::NotInitialized)
        }
    }

    async fn exchange(&mut self, command: &str, response: Response) -> Result<String, CameraError> {
        let channel = self.channel.as_mut().ok_or(CameraError::NotInitialized)?;
        let result = channel.exchange(command, response).await;
        if result.is_err() {
            // replies can no longer be matched to commands
            self.initialized = false;
        }
        result
    }
}

#[async_trait]
impl<L: Launch> Camera for CameraDriver<L> {
    async fn capture(&mut self, request: &CaptureRequest) -> Result<Capture, CameraError> {
        CameraDriver::capture(self, request).await
    }

    async fn close(&mut self) -> Result<(), CameraError> {
        CameraDriver::close(self).await
    }
}

/// Polls for `path`, with one last look after the final interval.
async fn wait_for(path: &Path, interval: Duration, attempts: u32) -> bool {
    for attempt in 1..=attempts {
        if exists(path).await {
            return true;
        }
        tracing::debug!("Waiting for {} ({attempt}/{attempts})", path.display());
        sleep(interval).await;
    }
    if exists(path).await {
        return true;
    }
    tracing::warn!("Gave up waiting for {}", path.display());
    false
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

fn millimetres(metres: f32) -> u32 {
    (metres * 1000.0).round() as u32
}
