use super::CameraError;
use std::{
    path::{Path, PathBuf},
    process::Stdio,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader},
    process::{Child, ChildStderr, Command},
};

/// Pipes to a freshly started camera control process.
pub struct ChildIo {
    pub stdin: Box<dyn AsyncWrite + Send + Unpin>,
    pub stdout: Box<dyn AsyncRead + Send + Unpin>,
    /// `None` when the pipes are not backed by an OS process.
    pub child: Option<Child>,
}

pub trait Launch: Send {
    fn launch(&mut self) -> Result<ChildIo, CameraError>;
}

/// Starts `chdkptp.sh -i` from the chdkptp install directory.
#[derive(Clone, Debug)]
pub struct ChdkptpLauncher {
    program: PathBuf,
    args: Vec<String>,
}

impl ChdkptpLauncher {
    pub fn new(root: &Path) -> Self {
        Self {
            program: root.join("chdkptp.sh"),
            args: vec!["-i".to_string()],
        }
    }
}

impl Launch for ChdkptpLauncher {
    fn launch(&mut self) -> Result<ChildIo, CameraError> {
        tracing::info!(
            "Starting chdkptp subprocess: {} {}",
            self.program.display(),
            self.args.join(" ")
        );
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CameraError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(CameraError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(CameraError::MissingPipe("stdout"))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr));
        }
        tracing::info!("chdkptp subprocess started with pid {:?}", child.id());

        Ok(ChildIo {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            child: Some(child),
        })
    }
}

async fn forward_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => tracing::warn!("chdkptp: {line}"),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!("Stopped reading chdkptp stderr: {e}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let mut launcher = ChdkptpLauncher::new(Path::new("/nonexistent/chdkptp"));
        let err = launcher.launch().err().unwrap();
        assert!(matches!(
            err,
            CameraError::Spawn { program, .. } if program == Path::new("/nonexistent/chdkptp/chdkptp.sh")
        ));
    }
}
