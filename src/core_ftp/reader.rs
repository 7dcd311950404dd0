use crate::constants::{MAX_COMMAND_LINE, TELNET_DONT, TELNET_IAC, TELNET_SB, TELNET_SE, TELNET_WILL};
use crate::core_ftp::error::ControlError;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio_util::sync::CancellationToken;

/// Removes telnet command sequences (RFC 854) from a raw control line. `IAC IAC` is an escaped
/// data byte and is kept as a single 0xFF.
pub fn strip_telnet(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] != TELNET_IAC {
            out.push(raw[i]);
            i += 1;
            continue;
        }
        match raw.get(i + 1).copied() {
            Some(TELNET_IAC) => {
                out.push(TELNET_IAC);
                i += 2;
            }
            // WILL, WONT, DO, DONT carry one option byte
            Some(cmd) if (TELNET_WILL..=TELNET_DONT).contains(&cmd) => i += 3,
            Some(TELNET_SB) => {
                let mut j = i + 2;
                while j + 1 < raw.len() && !(raw[j] == TELNET_IAC && raw[j + 1] == TELNET_SE) {
                    j += 1;
                }
                i = j + 2;
            }
            Some(_) => i += 2,
            None => i += 1,
        }
    }
    out
}

/// Strips the line terminator and telnet sequences from one raw command line.
pub fn clean_line(raw: &[u8]) -> String {
    let mut end = raw.len();
    while end > 0 && raw[end - 1] == b'\n' {
        end -= 1;
    }
    while end > 0 && raw[end - 1] == b'\r' {
        end -= 1;
    }
    String::from_utf8_lossy(&strip_telnet(&raw[..end])).into_owned()
}

/// Reads up to and including the next LF into `pending`. Bytes already in `pending` from an
/// interrupted call count towards the line.
async fn read_line<R>(reader: &mut R, pending: &mut Vec<u8>) -> Result<Vec<u8>, ControlError>
where
    R: AsyncBufRead + Unpin,
{
    let limit = MAX_COMMAND_LINE.saturating_sub(pending.len()) as u64;
    let read = (&mut *reader).take(limit).read_until(b'\n', pending).await?;

    if pending.last() == Some(&b'\n') {
        return Ok(std::mem::take(pending));
    }
    if pending.len() >= MAX_COMMAND_LINE {
        pending.clear();
        return Err(ControlError::LineTooLong(MAX_COMMAND_LINE));
    }
    if read == 0 && pending.is_empty() {
        return Err(ControlError::EndOfStream);
    }
    // peer closed in the middle of a line
    Ok(std::mem::take(pending))
}

/// Reads one command line. Returns the cleaned line and the number of raw bytes consumed.
///
/// `timeout` bounds the whole line, not just the first byte. A partial line left by a
/// timeout or cancellation stays in `pending` for the next call.
pub async fn read_command<R>(
    reader: &mut R,
    pending: &mut Vec<u8>,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<(String, usize), ControlError>
where
    R: AsyncBufRead + Unpin,
{
    let line = async {
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, read_line(reader, pending)).await {
                Ok(read) => read,
                Err(_) => Err(ControlError::Timeout),
            },
            None => read_line(reader, pending).await,
        }
    };

    let raw = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ControlError::Cancelled),
        raw = line => raw?,
    };

    Ok((clean_line(&raw), raw.len()))
}
