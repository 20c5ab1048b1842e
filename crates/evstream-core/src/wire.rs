//! Newline-delimited JSON wire codec.
//!
//! One JSON object per `\n`-terminated line. Reads are capped at
//! [`MAX_LINE_BYTES`] so a misbehaving peer cannot grow the read buffer
//! without bound; empty lines are skipped.

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::protocol::Hello;

/// Maximum accepted line length in bytes (terminator included).
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Read the next JSON value from the stream.
///
/// Returns `Ok(None)` on a cleanly closed stream. A line longer than
/// [`MAX_LINE_BYTES`] is a wire error; the connection should be dropped
/// since the stream position is no longer trustworthy.
pub async fn read_value<R>(reader: &mut R) -> Result<Option<Value>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        line.clear();
        let mut limited = (&mut *reader).take(MAX_LINE_BYTES as u64 + 1);
        let n = limited.read_until(b'\n', &mut line).await?;
        if n == 0 {
            return Ok(None);
        }
        if n > MAX_LINE_BYTES {
            return Err(Error::Wire(format!(
                "Line exceeds {MAX_LINE_BYTES} bytes"
            )));
        }

        let text = std::str::from_utf8(&line)
            .map_err(|e| Error::Wire(format!("Line is not valid UTF-8: {e}")))?
            .trim();
        if text.is_empty() {
            continue;
        }
        return Ok(Some(serde_json::from_str(text)?));
    }
}

/// Write one value as a single line and flush it.
pub async fn write_value<W, T>(writer: &mut W, value: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

/// Interpret a value as the hello frame opening a connection.
pub fn parse_hello(value: &Value) -> Result<Hello> {
    serde_json::from_value(value.clone())
        .map_err(|e| Error::Wire(format!("Invalid hello frame: {e}")))
}
