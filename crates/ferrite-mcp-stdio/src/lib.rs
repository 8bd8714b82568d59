//! Newline-delimited JSON-RPC over stdin/stdout: one [`Message`] per line,
//! the MCP spec's baseline transport and the one every SDK implements first.

use async_trait::async_trait;
use ferrite_mcp_transport_traits::{Connection, ConnectionError};
use ferrite_mcp_wire::{Codec, JsonCodec, Message};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::Mutex;

/// A [`Connection`] over the process's own stdin/stdout. Reads are
/// line-buffered; a line with no trailing newline at EOF is still decoded
/// (`read_line` returns it, just with `n == 0` on the *next* call).
pub struct StdioConnection {
    reader: Mutex<BufReader<Stdin>>,
    writer: Mutex<Stdout>,
    codec: JsonCodec,
}

impl StdioConnection {
    pub fn new() -> Self {
        Self {
            reader: Mutex::new(BufReader::new(tokio::io::stdin())),
            writer: Mutex::new(tokio::io::stdout()),
            codec: JsonCodec::new(),
        }
    }

    pub fn with_max_message_bytes(max: usize) -> Self {
        Self {
            codec: JsonCodec::with_max_message_bytes(max),
            ..Self::new()
        }
    }
}

impl Default for StdioConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connection for StdioConnection {
    async fn send(&self, message: Message) -> Result<(), ConnectionError> {
        let mut bytes = self.codec.encode(&message)?;
        bytes.push(b'\n');
        let mut writer = self.writer.lock().await;
        writer
            .write_all(&bytes)
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))
    }

    async fn recv(&self) -> Result<Option<Message>, ConnectionError> {
        let mut line = String::new();
        let mut reader = self.reader.lock().await;
        loop {
            line.clear();
            let n = reader
                .read_line(&mut line)
                .await
                .map_err(|e| ConnectionError::Io(e.to_string()))?;
            if n == 0 {
                return Ok(None);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Ok(Some(self.codec.decode(trimmed.as_bytes())?));
        }
    }

    async fn close(&self) {
        let _ = self.writer.lock().await.shutdown().await;
    }
}
