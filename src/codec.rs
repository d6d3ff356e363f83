// Framing codec for the stats stream protocol
// Frames are: <decimal payload length>\n<payload>

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::TonearmError;

/// Upper bound on a single frame payload. A larger declared size is treated
/// as a protocol violation and tears the connection down.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

pub struct FrameCodec {
    // Current parsing state
    state: FrameCodecState,
}

enum FrameCodecState {
    // Waiting for a line containing the size
    ReadingSize,
    // Found size, now reading the payload
    ReadingPayload { expected_size: usize },
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            state: FrameCodecState::ReadingSize,
        }
    }
}

impl Decoder for FrameCodec {
    type Item = String;
    type Error = TonearmError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match &mut self.state {
                FrameCodecState::ReadingSize => {
                    // Look for a newline to delimit the size
                    if let Some(newline_pos) = buf.iter().position(|&b| b == b'\n') {
                        // Extract the size line (including the newline)
                        let line = buf.split_to(newline_pos + 1);

                        let size_str =
                            std::str::from_utf8(&line[..line.len() - 1]).map_err(|_| {
                                TonearmError::InvalidFrameHeader(
                                    "non-UTF-8 bytes in size header".to_string(),
                                )
                            })?;
                        let size_str = size_str.trim();

                        if size_str.is_empty() || !size_str.chars().all(|c| c.is_ascii_digit()) {
                            return Err(TonearmError::InvalidFrameHeader(format!(
                                "expected numeric size, got: {:?}",
                                size_str
                            )));
                        }

                        let expected_size = size_str.parse::<usize>().map_err(|_| {
                            TonearmError::InvalidFrameHeader(format!(
                                "unparseable size: {}",
                                size_str
                            ))
                        })?;

                        if expected_size > MAX_FRAME_BYTES {
                            return Err(TonearmError::FrameTooLarge {
                                size: expected_size,
                                max: MAX_FRAME_BYTES,
                            });
                        }

                        // Move to the payload state and try to finish the
                        // frame with what is already buffered
                        self.state = FrameCodecState::ReadingPayload { expected_size };
                        continue;
                    }

                    // Not enough data for a full size line
                    return Ok(None);
                }

                FrameCodecState::ReadingPayload { expected_size } => {
                    if buf.len() >= *expected_size {
                        let payload = buf.split_to(*expected_size);

                        let message = String::from_utf8(payload.to_vec()).map_err(|_| {
                            TonearmError::InvalidFrameHeader(
                                "non-UTF-8 bytes in frame payload".to_string(),
                            )
                        })?;

                        // Reset for the next frame
                        self.state = FrameCodecState::ReadingSize;

                        return Ok(Some(message));
                    }

                    // Wait for more data
                    return Ok(None);
                }
            }
        }
    }
}

impl Encoder<String> for FrameCodec {
    type Error = TonearmError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > MAX_FRAME_BYTES {
            return Err(TonearmError::FrameTooLarge {
                size: item.len(),
                max: MAX_FRAME_BYTES,
            });
        }

        let header = item.len().to_string();
        dst.reserve(header.len() + 1 + item.len());
        dst.put_slice(header.as_bytes());
        dst.put_u8(b'\n');
        dst.put_slice(item.as_bytes());
        Ok(())
    }
}
