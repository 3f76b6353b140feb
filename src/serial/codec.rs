//! Line framing for the device link
//!
//! The firmware terminates its lines with `\r\n` and expects commands
//! terminated by a single `\n`.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::SerialError;
use crate::translate::SerialCommand;

const DELIMITER: &[u8] = b"\r\n";

pub struct SerialLineCodec {
    max_length: usize,
    /// Bytes already scanned without finding a delimiter
    next_index: usize,
    /// Dropping the rest of an over-long line up to its delimiter
    is_discarding: bool,
}

impl SerialLineCodec {
    pub fn new(max_length: usize) -> Self {
        SerialLineCodec {
            max_length,
            next_index: 0,
            is_discarding: false,
        }
    }
}

impl Decoder for SerialLineCodec {
    type Item = String;
    type Error = SerialError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, SerialError> {
        loop {
            // A '\r' at the end of the previous scan may pair with a new '\n'
            let from = self.next_index.saturating_sub(1).min(src.len());
            let found = src[from..]
                .windows(DELIMITER.len())
                .position(|w| w == DELIMITER)
                .map(|offset| from + offset);
            // Never counted against the limit, it may start the delimiter
            let trailing_cr = usize::from(src.last() == Some(&b'\r'));

            match (self.is_discarding, found) {
                (true, Some(end)) => {
                    src.advance(end + DELIMITER.len());
                    self.is_discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    src.advance(src.len() - trailing_cr);
                    self.next_index = src.len();
                    return Ok(None);
                }
                (false, Some(end)) => {
                    let frame = src.split_to(end + DELIMITER.len());
                    self.next_index = 0;
                    if end > self.max_length {
                        return Err(SerialError::LineTooLong(end));
                    }
                    return Ok(Some(String::from_utf8_lossy(&frame[..end]).into_owned()));
                }
                (false, None) => {
                    let pending = src.len() - trailing_cr;
                    if pending > self.max_length {
                        src.advance(pending);
                        self.is_discarding = true;
                        self.next_index = src.len();
                        return Err(SerialError::LineTooLong(pending));
                    }
                    self.next_index = src.len();
                    return Ok(None);
                }
            }
        }
    }
}

impl Encoder<&SerialCommand> for SerialLineCodec {
    type Error = SerialError;

    fn encode(&mut self, item: &SerialCommand, dst: &mut BytesMut) -> Result<(), SerialError> {
        let line = item.to_string();
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}
