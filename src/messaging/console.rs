//! Console channel: one local conversation over stdin/stdout

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;

use crate::messaging::Channel;
use crate::types::{InboundMessage, OutboundMessage};

/// Conversation id used for console input
pub const CONSOLE_CONVERSATION: &str = "console";

type Reader = Box<dyn AsyncBufRead + Unpin + Send>;
type Writer = Box<dyn AsyncWrite + Unpin + Send>;

pub struct ConsoleChannel {
    lines: Mutex<Lines<Reader>>,
    writer: Mutex<Writer>,
}

impl ConsoleChannel {
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let reader: Reader = Box::new(reader);
        Self {
            lines: Mutex::new(reader.lines()),
            writer: Mutex::new(Box::new(writer)),
        }
    }

    /// Channel over the process's stdin and stdout
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

#[async_trait::async_trait]
impl Channel for ConsoleChannel {
    async fn receive(&self) -> Result<Option<Vec<InboundMessage>>> {
        let mut lines = self.lines.lock().await;
        loop {
            let Some(line) = lines.next_line().await.context("Failed to read from console")? else {
                return Ok(None);
            };
            if !line.trim().is_empty() {
                return Ok(Some(vec![InboundMessage::new(CONSOLE_CONVERSATION, &line)]));
            }
        }
    }

    async fn send(&self, reply: &OutboundMessage) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(format!("bot> {}\n", reply.text).as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_reads_non_empty_lines_until_eof() {
        let channel = ConsoleChannel::new(&b"Hola\n\n  \nAdios\n"[..], tokio::io::sink());

        let first = channel.receive().await.unwrap().unwrap();
        assert_eq!(first[0].text, "hola");
        assert_eq!(first[0].conversation_id, CONSOLE_CONVERSATION);

        let second = channel.receive().await.unwrap().unwrap();
        assert_eq!(second[0].text, "adios");

        assert!(channel.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_send_writes_reply() {
        let (client, mut server) = tokio::io::duplex(256);
        let channel = ConsoleChannel::new(&b""[..], client);

        channel.send(&OutboundMessage::new(CONSOLE_CONVERSATION, "hi")).await.unwrap();
        drop(channel);

        let mut out = String::new();
        server.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "bot> hi\n");
    }
}
