//! Line-oriented transport over any async reader/writer.
//!
//! Inbound lines have the form `<port> <message>`; the first space splits
//! the port from the message handed to the dispatcher. Outbound payloads
//! are written as `<port> <payload>\n`. Wired to stdin/stdout this is the
//! transport the `panelbusd` binary runs on.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{InboundLine, Transport, TransportError, INBOUND_BUFFER};

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Transport speaking `<port> <text>` lines.
pub struct LineTransport {
    writer: Mutex<BoxedWriter>,
    open_ports: Mutex<HashSet<String>>,
    inbound_tx: Mutex<Option<mpsc::Sender<InboundLine>>>,
    inbound_rx: Mutex<Option<mpsc::Receiver<InboundLine>>>,
}

/// `LineTransport` bound to the process's stdout.
pub type StdioTransport = LineTransport;

impl LineTransport {
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (tx, rx) = mpsc::channel(INBOUND_BUFFER);
        Self {
            writer: Mutex::new(Box::new(writer)),
            open_ports: Mutex::new(HashSet::new()),
            inbound_tx: Mutex::new(Some(tx)),
            inbound_rx: Mutex::new(Some(rx)),
        }
    }

    /// Writes payloads to stdout. Pair with [`LineTransport::spawn_reader`]
    /// on `tokio::io::stdin()`.
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdout())
    }

    /// Spawns a task that reads lines from `reader` and feeds them into the
    /// inbound stream until EOF, a read error, or cancellation.
    ///
    /// The reader waits while the inbound channel is full, so no line is
    /// dropped for lack of buffer space. When the task ends the inbound
    /// stream closes. The task resolves to the number of lines delivered.
    ///
    /// # Errors
    ///
    /// - `TransportError::Closed` if a reader was already attached
    pub async fn spawn_reader<R>(
        &self,
        reader: R,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<usize>, TransportError>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let sender = self
            .inbound_tx
            .lock()
            .await
            .take()
            .ok_or(TransportError::Closed)?;

        Ok(tokio::spawn(read_lines(reader, sender, cancel)))
    }
}

async fn read_lines<R>(
    reader: R,
    sender: mpsc::Sender<InboundLine>,
    cancel: CancellationToken,
) -> usize
where
    R: AsyncRead + Send + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut delivered = 0usize;

    loop {
        let raw = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Line reader cancelled");
                break;
            }
            next = lines.next_line() => match next {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    info!(lines = delivered, "Line reader reached end of input");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Line reader failed");
                    break;
                }
            }
        };

        let Some(line) = parse_inbound(&raw) else {
            if !raw.trim().is_empty() {
                warn!(line = %raw, "Inbound line has no port prefix, dropping");
            }
            continue;
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Line reader cancelled");
                break;
            }
            sent = sender.send(line) => {
                if sent.is_err() {
                    debug!("Inbound stream consumer gone, reader stopping");
                    break;
                }
                delivered += 1;
            }
        }
    }

    delivered
}

/// Splits `<port> <message>` and strips a trailing carriage return.
pub fn parse_inbound(raw: &str) -> Option<InboundLine> {
    let raw = raw.trim_end_matches(['\r', '\n']);
    let (port, line) = raw.split_once(' ')?;
    if port.is_empty() {
        return None;
    }
    Some(InboundLine::new(port, line))
}

#[async_trait]
impl Transport for LineTransport {
    fn name(&self) -> &'static str {
        "line"
    }

    async fn open(&self, port: &str) -> Result<(), TransportError> {
        self.open_ports.lock().await.insert(port.to_string());
        Ok(())
    }

    async fn close(&self, port: &str) -> Result<(), TransportError> {
        self.open_ports.lock().await.remove(port);
        Ok(())
    }

    async fn write(&self, port: &str, payload: &str) -> Result<(), TransportError> {
        if !self.open_ports.lock().await.contains(port) {
            return Err(TransportError::PortNotOpen(port.to_string()));
        }

        let mut writer = self.writer.lock().await;
        let line = format!("{port} {payload}\n");
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn take_inbound(&self) -> Option<mpsc::Receiver<InboundLine>> {
        self.inbound_rx.lock().await.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_parse_inbound() {
        assert_eq!(
            parse_inbound("COM3 oid1 I 5\r"),
            Some(InboundLine::new("COM3", "oid1 I 5"))
        );
        assert_eq!(parse_inbound("COM3"), None);
        assert_eq!(parse_inbound(" oid1 I 5"), None);
        // Everything after the port is passed through untouched
        assert_eq!(
            parse_inbound("COM3 oid1  I 5"),
            Some(InboundLine::new("COM3", "oid1  I 5"))
        );
    }

    #[tokio::test]
    async fn test_write_formats_port_prefix() {
        let (client, mut server) = tokio::io::duplex(1024);
        let transport = LineTransport::new(client);

        transport.open("COM3").await.unwrap();
        transport.write("COM3", r#"{"link":"oid1"}"#).await.unwrap();
        drop(transport);

        let mut out = String::new();
        server.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "COM3 {\"link\":\"oid1\"}\n");
    }

    #[tokio::test]
    async fn test_write_to_closed_port_fails() {
        let (client, _server) = tokio::io::duplex(64);
        let transport = LineTransport::new(client);

        let result = transport.write("COM3", "x").await;
        assert_eq!(result, Err(TransportError::PortNotOpen("COM3".to_string())));
    }

    #[tokio::test]
    async fn test_reader_delivers_lines_then_closes() {
        let transport = LineTransport::new(tokio::io::sink());
        let mut rx = transport.take_inbound().await.unwrap();
        assert!(transport.take_inbound().await.is_none());

        let input: &[u8] = b"COM3 oid1 I 5\nnoport\n\nCOM4 oid2 B true\n";
        let reader = transport
            .spawn_reader(input, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(reader.await.unwrap(), 2);
        assert_eq!(rx.recv().await.unwrap(), InboundLine::new("COM3", "oid1 I 5"));
        assert_eq!(rx.recv().await.unwrap(), InboundLine::new("COM4", "oid2 B true"));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_second_reader_is_refused() {
        let transport = LineTransport::new(tokio::io::sink());
        let first: &[u8] = b"";
        let second: &[u8] = b"";

        transport
            .spawn_reader(first, CancellationToken::new())
            .await
            .unwrap();
        let result = transport.spawn_reader(second, CancellationToken::new()).await;

        assert_eq!(result.err(), Some(TransportError::Closed));
    }

    #[tokio::test]
    async fn test_reader_waits_for_slow_consumer() {
        let transport = LineTransport::new(tokio::io::sink());
        let mut rx = transport.take_inbound().await.unwrap();

        let count = INBOUND_BUFFER * 4;
        let input: String = (0..count).map(|i| format!("COM3 oid1 I {i}\n")).collect();
        let reader = transport
            .spawn_reader(
                std::io::Cursor::new(input.into_bytes()),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        // Consume only after the reader has filled the channel
        tokio::task::yield_now().await;
        let mut received = Vec::new();
        while let Some(line) = rx.recv().await {
            received.push(line.line);
        }

        assert_eq!(reader.await.unwrap(), count);
        assert_eq!(received.len(), count);
        assert_eq!(received.first().map(String::as_str), Some("oid1 I 0"));
        assert_eq!(received.last(), Some(&format!("oid1 I {}", count - 1)));
    }

    #[tokio::test]
    async fn test_cancelled_reader_closes_stream() {
        let transport = LineTransport::new(tokio::io::sink());
        let mut rx = transport.take_inbound().await.unwrap();
        let (_input_writer, input) = tokio::io::duplex(64);
        let cancel = CancellationToken::new();

        let reader = transport.spawn_reader(input, cancel.clone()).await.unwrap();
        cancel.cancel();

        assert_eq!(reader.await.unwrap(), 0);
        assert_eq!(rx.recv().await, None);
    }
}
