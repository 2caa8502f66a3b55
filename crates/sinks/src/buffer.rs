use async_trait::async_trait;
use sheetforge_core::{MessageSink, SinkResult, TapMessage};
use tokio::sync::Mutex;

/// In-memory sink for tests: captures every message in arrival order.
#[derive(Default)]
pub struct BufferSink {
    messages: Mutex<Vec<TapMessage>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far.
    pub async fn messages(&self) -> Vec<TapMessage> {
        self.messages.lock().await.clone()
    }

    /// Drain the buffer, returning the captured messages.
    pub async fn take(&self) -> Vec<TapMessage> {
        std::mem::take(&mut *self.messages.lock().await)
    }
}

#[async_trait]
impl MessageSink for BufferSink {
    fn id(&self) -> &str {
        "buffer"
    }

    async fn write(&self, message: &TapMessage) -> SinkResult<()> {
        self.messages.lock().await.push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn captures_in_order() {
        let sink = BufferSink::new();
        sink.write(&TapMessage::activate_version("s", 1)).await.unwrap();
        sink.write(&TapMessage::record("s", json!({}), None, None))
            .await
            .unwrap();

        let messages = sink.take().await;
        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0], TapMessage::ActivateVersion { .. }));
        assert!(sink.messages().await.is_empty());
    }
}
