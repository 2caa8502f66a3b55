use async_trait::async_trait;
use sheetforge_core::{MessageSink, SinkResult, TapMessage};
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::sync::Mutex;

/// Writes messages to stdout as JSON lines.
///
/// Log output goes to stderr, so stdout carries nothing but the message
/// stream. Each line is flushed immediately: a consumer must never wait on
/// a buffered STATE message.
pub struct StdoutSink {
    out: Mutex<Stdout>,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self {
            out: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageSink for StdoutSink {
    fn id(&self) -> &str {
        "stdout"
    }

    async fn write(&self, message: &TapMessage) -> SinkResult<()> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');

        let mut out = self.out.lock().await;
        out.write_all(&line).await?;
        out.flush().await?;
        Ok(())
    }

    async fn write_batch(&self, messages: &[TapMessage]) -> SinkResult<()> {
        let mut lines = Vec::new();
        for message in messages {
            serde_json::to_writer(&mut lines, message)?;
            lines.push(b'\n');
        }

        let mut out = self.out.lock().await;
        out.write_all(&lines).await?;
        out.flush().await?;
        Ok(())
    }
}
