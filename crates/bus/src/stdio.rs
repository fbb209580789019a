//! Process stdio plumbing for [`Transport`]

use std::io::{self, BufRead};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{LineSender, OutboundReceiver, Transport};

/// Forward lines from a blocking reader until EOF, a read error, or the
/// receiving side going away. Bytes that are not UTF-8 are replaced rather
/// than ending the stream, so a garbled line reaches the transport as
/// malformed input.
pub fn pump_lines<R: BufRead>(mut reader: R, tx: LineSender) {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                if buf.ends_with(b"\n") {
                    buf.pop();
                    if buf.ends_with(b"\r") {
                        buf.pop();
                    }
                }
                let line = String::from_utf8_lossy(&buf).into_owned();
                if tx.send(line).is_err() {
                    debug!("line receiver dropped, stopping pump");
                    return;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("stdin read failed: {}", e);
                return;
            }
        }
    }
    debug!("stdin reached end of stream");
}

/// Read stdin on a dedicated thread. A plain thread never holds up runtime
/// shutdown while blocked in `read`.
pub fn spawn_stdin_pump(tx: LineSender) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || pump_lines(io::stdin().lock(), tx))
}

/// Write each outbound message as one JSON line, flushing after every line.
/// Returns once every sender is dropped and the queue is drained.
pub async fn write_lines<W>(mut writer: W, mut rx: OutboundReceiver) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = rx.recv().await {
        let mut line = serde_json::to_string(&msg).map_err(io::Error::other)?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}

pub fn spawn_stdout_writer(rx: OutboundReceiver) -> JoinHandle<io::Result<()>> {
    tokio::spawn(write_lines(tokio::io::stdout(), rx))
}

impl Transport {
    /// Transport bound to this process's stdin/stdout. Await the returned
    /// handle after dropping the transport to be sure every line is flushed.
    pub fn stdio() -> (Self, JoinHandle<io::Result<()>>) {
        let (transport, lines, outbound) = Self::channels();
        spawn_stdin_pump(lines);
        let writer = spawn_stdout_writer(outbound);
        (transport, writer)
    }
}
