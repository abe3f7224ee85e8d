//! Interactive pass-through between a local terminal and the PDU menu.
//!
//! Input is line-oriented: each line read locally is sent to the device
//! with the menu's line terminator. Device output is copied out as it
//! arrives, unmodified, so the menu renders as it would in a telnet client.
//!
//! The exception is output already waiting when pass-through starts: it is
//! drained through the session's pattern buffer and so comes out as plain
//! text, escape sequences stripped.

use std::time::Duration;

use log::{debug, info};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::channel::TerminalSession;
use crate::error::{Result, TransportError};
use crate::transport::Transport;

/// Lines buffered between the input reader and the session.
const INPUT_BACKLOG: usize = 16;

/// Why a pass-through session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassthroughEnd {
    /// Local input reached end of file.
    InputClosed,
    /// The device closed the connection.
    DeviceClosed,
}

/// Relay `input` to the session and session output to `output` until
/// either side closes.
///
/// Output already buffered by the session is written first, as plain
/// text. When input closes, whatever the device has already sent is
/// flushed before returning.
pub async fn passthrough<T, R, W>(
    session: &mut TerminalSession<T>,
    input: R,
    output: &mut W,
) -> Result<PassthroughEnd>
where
    T: Transport,
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    let (tx, mut rx) = mpsc::channel::<String>(INPUT_BACKLOG);
    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(input).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });

    info!("entering interactive mode");
    let pending = session.read_all().await?;
    relay(output, pending.as_bytes()).await?;

    let end = loop {
        tokio::select! {
            line = rx.recv() => match line {
                Some(line) => session.send(line.trim_end_matches('\r')).await?,
                None => {
                    drain(session, output).await?;
                    break PassthroughEnd::InputClosed;
                }
            },
            chunk = session.transport_mut().read_chunk() => match chunk? {
                Some(data) => relay(output, &data).await?,
                None => break PassthroughEnd::DeviceClosed,
            },
        }
    };

    reader.abort();
    debug!("interactive mode ended: {:?}", end);
    Ok(end)
}

/// Copy out whatever the device has already sent, without waiting.
async fn drain<T, W>(session: &mut TerminalSession<T>, output: &mut W) -> Result<()>
where
    T: Transport,
    W: AsyncWrite + Unpin,
{
    let transport = session.transport_mut();
    while let Ok(chunk) = tokio::time::timeout(Duration::ZERO, transport.read_chunk()).await {
        match chunk? {
            Some(data) => relay(output, &data).await?,
            None => break,
        }
    }
    Ok(())
}

async fn relay<W: AsyncWrite + Unpin>(output: &mut W, data: &[u8]) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    output.write_all(data).await.map_err(TransportError::Io)?;
    output.flush().await.map_err(TransportError::Io)?;
    Ok(())
}
