//! Camera processes replaced by scripted `tokio_test` mocks.

use super::{launcher::ChildIo, launcher::Launch, CameraError};
use std::{collections::VecDeque, io, path::PathBuf};
use tokio_test::io::{Builder, Mock};

/// Hands out one script per launch, in order.
pub struct ScriptedLauncher {
    pub scripts: VecDeque<Mock>,
    pub launches: u32,
}

impl ScriptedLauncher {
    pub fn new(scripts: impl IntoIterator<Item = Mock>) -> Self {
        Self {
            scripts: scripts.into_iter().collect(),
            launches: 0,
        }
    }
}

impl Launch for ScriptedLauncher {
    fn launch(&mut self) -> Result<ChildIo, CameraError> {
        self.launches += 1;
        let mock = self.scripts.pop_front().ok_or_else(|| CameraError::Spawn {
            program: PathBuf::from("chdkptp.sh"),
            source: io::Error::new(io::ErrorKind::NotFound, "no script left"),
        })?;
        let (stdout, stdin) = tokio::io::split(mock);
        Ok(ChildIo {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            child: None,
        })
    }
}

pub fn handshake(builder: &mut Builder) -> &mut Builder {
    builder
        .write(b"set usb_reset_on_close=false\n")
        .read(b"\n")
        .write(b"connect\n")
        .read(b"___> connect\nconnected: Canon PowerShot S100, max packet size 512\n")
        .write(b"rec\n")
        .read(b"\n")
        .write(b"=init_usb_capture(0)\n")
        .read(b"true\n")
}

pub fn refused() -> Mock {
    Builder::new()
        .write(b"set usb_reset_on_close=false\n")
        .read(b"\n")
        .write(b"connect\n")
        .read(b"___> connect\nERROR: no matching devices found\n")
        .build()
}

pub fn shoot(captures_dir: &std::path::Path, index: u32) -> String {
    format!(
        "rs {}/img_{index} -script=/opt/chdkptp/shoot.lua\n",
        captures_dir.display()
    )
}
