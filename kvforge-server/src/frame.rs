//! The length-prefixed request/response wire format.
//!
//! Request grammar (all integers big-endian, unsigned 32-bit):
//! ```text
//! Request := NArgs (ArgLen Arg)^NArgs
//! NArgs    <= MAX_ARGS
//! ArgLen   <= MAX_TOKEN_LEN, Arg is ArgLen bytes of UTF-8
//! ```
//! Response grammar:
//! ```text
//! Response := TotalLen Status Payload
//! TotalLen = 4 + |Payload|     (length of everything after TotalLen itself)
//! Status   in {0=OK, 1=NX, 2=ERR}, encoded as a 4-byte big-endian field
//! Payload  UTF-8 bytes
//! ```
//! so a full response frame is exactly `8 + |Payload|` bytes on the wire:
//! 4 for `TotalLen`, 4 for `Status`, then the payload.

use bytes::{BufMut, BytesMut};
use kvforge_core::{Error, Result, Status, Token, MAX_ARGS, MAX_TOKEN_LEN};

const LEN_FIELD: usize = 4;

/// Attempts to decode one request frame from the front of `buf`.
///
/// Returns `Ok(Some((args, consumed)))` on a complete frame, `Ok(None)` if
/// `buf` does not yet hold a full frame, and `Err` if the frame violates
/// the arity, length, or encoding limits — the caller should then close
/// the connection without consuming any bytes.
pub fn decode(buf: &[u8]) -> Result<Option<(Vec<Token>, usize)>> {
    if buf.len() < LEN_FIELD {
        return Ok(None);
    }
    let nargs = u32::from_be_bytes(buf[0..4].try_into().unwrap()) as usize;
    if nargs > MAX_ARGS {
        return Err(Error::Protocol(format!(
            "request declares {nargs} arguments, limit is {MAX_ARGS}"
        )));
    }

    let mut pos = LEN_FIELD;
    let mut args = Vec::with_capacity(nargs);
    for _ in 0..nargs {
        if buf.len() < pos + LEN_FIELD {
            return Ok(None);
        }
        let arg_len =
            u32::from_be_bytes(buf[pos..pos + LEN_FIELD].try_into().unwrap()) as usize;
        if arg_len > MAX_TOKEN_LEN {
            return Err(Error::Protocol(format!(
                "argument length {arg_len} exceeds limit of {MAX_TOKEN_LEN}"
            )));
        }
        pos += LEN_FIELD;
        if buf.len() < pos + arg_len {
            return Ok(None);
        }
        let bytes = buf[pos..pos + arg_len].to_vec();
        pos += arg_len;
        let token = Token::from_bytes(bytes)
            .ok_or_else(|| Error::Protocol("argument is not valid UTF-8".to_string()))?;
        args.push(token);
    }

    Ok(Some((args, pos)))
}

/// Encodes a response frame. Never fails: `status` is always representable
/// and `payload` is already a valid UTF-8 `str`.
pub fn encode(status: Status, payload: &str) -> BytesMut {
    let payload_bytes = payload.as_bytes();
    let total_len = (LEN_FIELD + payload_bytes.len()) as u32;

    let mut frame = BytesMut::with_capacity(LEN_FIELD + LEN_FIELD + payload_bytes.len());
    frame.put_u32(total_len);
    frame.put_u32(status.as_u8() as u32);
    frame.put_slice(payload_bytes);
    frame
}
