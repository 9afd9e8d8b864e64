use super::CameraError;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// How many lines the child answers a command with.
///
/// There are no request ids on this channel, replies are matched to
/// commands purely by position. Reading the wrong number of lines shifts
/// every later reply by one.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Response {
    /// One line, which is the reply.
    Single,
    /// A status line, then the reply.
    Echo,
    /// Like [`Response::Echo`], followed by a completion line.
    EchoTrailing,
}

pub struct LineChannel {
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    reader: BufReader<Box<dyn AsyncRead + Send + Unpin>>,
    timeout: Duration,
}

impl LineChannel {
    pub fn new(
        writer: Box<dyn AsyncWrite + Send + Unpin>,
        reader: Box<dyn AsyncRead + Send + Unpin>,
        timeout: Duration,
    ) -> Self {
        Self {
            writer,
            reader: BufReader::new(reader),
            timeout,
        }
    }

    /// Writes `command` and reads the reply lines `response` calls for.
    ///
    /// The whole exchange is bounded by the channel timeout. After any
    /// error the channel is out of step with the child and must not be
    /// reused.
    pub async fn exchange(
        &mut self,
        command: &str,
        response: Response,
    ) -> Result<String, CameraError> {
        let timeout = self.timeout;
        tokio::time::timeout(timeout, self.exchange_unbounded(command, response))
            .await
            .map_err(|_| CameraError::CommandTimeout {
                command: command.to_string(),
                timeout,
            })?
    }

    async fn exchange_unbounded(
        &mut self,
        command: &str,
        response: Response,
    ) -> Result<String, CameraError> {
        self.writer.write_all(format!("{command}\n").as_bytes()).await?;
        self.writer.flush().await?;

        let mut reply = self.read_line(command).await?;
        if response != Response::Single {
            tracing::debug!("Cmd: {command}, status: {reply}");
            reply = self.read_line(command).await?;
        }
        if response == Response::EchoTrailing {
            let trailing = self.read_line(command).await?;
            tracing::debug!("Cmd: {command}, done: {trailing}");
        }
        tracing::info!("Cmd: {command}, ret: {reply}");
        Ok(reply)
    }

    async fn read_line(&mut self, command: &str) -> Result<String, CameraError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Err(CameraError::ProcessExited {
                command: command.to_string(),
            });
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}
