//! # Reader
//!
//! Line-oriented reading of the control channel and of line-mode data channels

use std::io::{BufRead, Read};

use crate::types::{FtpError, FtpResult, Response, MAX_LINE_LENGTH};
use crate::ReplyCode;

/// Read a single raw line, terminator included, reading at most `limit + 1` bytes.
///
/// Returns `Ok(None)` when the stream is at its end and no byte has been read.
/// A line longer than `limit` fails with [`FtpError::LineTooLong`]; it is never truncated.
/// A last line without terminator is returned as is.
pub fn read_line<R: BufRead>(reader: &mut R, limit: usize) -> FtpResult<Option<Vec<u8>>> {
    let mut line = Vec::new();
    reader
        .by_ref()
        .take(limit as u64 + 1)
        .read_until(b'\n', &mut line)?;
    if line.len() > limit {
        return Err(FtpError::LineTooLong(limit));
    }
    if line.is_empty() {
        Ok(None)
    } else {
        Ok(Some(line))
    }
}

/// Read a reply line from the control channel.
///
/// Exactly one terminator is stripped (`\r\n`, or a single `\r` or `\n`).
/// Bytes which are not valid UTF-8 are replaced; the reply code is ASCII and is not affected.
pub fn read_reply_line<R: BufRead>(reader: &mut R) -> FtpResult<String> {
    let mut line = read_line(reader, MAX_LINE_LENGTH)?.ok_or(FtpError::ConnectionClosed)?;
    if line.ends_with(b"\r\n") {
        line.truncate(line.len() - 2);
    } else if matches!(line.last(), Some(b'\r' | b'\n')) {
        line.pop();
    }
    let line = String::from_utf8_lossy(&line).into_owned();
    trace!("CC IN: {:?}", line);
    Ok(line)
}

/// Read a whole, possibly multi-line, reply.
///
/// A reply whose first line has `-` after the code continues until a line starting with
/// the same code not followed by `-`.
pub fn read_response<R: BufRead>(reader: &mut R) -> FtpResult<Response> {
    let first = read_reply_line(reader)?;
    let status = parse_reply_code(&first)?;
    let multiline = first.as_bytes().get(3) == Some(&b'-');
    let code = first[..3].to_string();
    let mut lines = vec![first];
    if multiline {
        loop {
            let line = read_reply_line(reader)?;
            let last = line.starts_with(&code) && line.as_bytes().get(3) != Some(&b'-');
            lines.push(line);
            if last {
                break;
            }
        }
    }
    trace!("Code parsed from response: {}", status);
    Ok(Response::new(status, lines))
}

/// Get the reply code from the first three bytes of a reply line
fn parse_reply_code(line: &str) -> FtpResult<ReplyCode> {
    match line.as_bytes().get(..3) {
        Some(digits) if digits.iter().all(u8::is_ascii_digit) => Ok(ReplyCode(
            digits
                .iter()
                .fold(0, |code, digit| code * 10 + u16::from(digit - b'0')),
        )),
        _ => {
            error!("malformed reply line: {:?}", line);
            Err(FtpError::BadResponse)
        }
    }
}
