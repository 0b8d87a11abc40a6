//! The incremental frame reader: turns an accumulating byte buffer into
//! typed frames, one call at a time.

use bytes::{Buf, Bytes, BytesMut};
use tracing::trace;

use crate::{
    error::{ConnectionError, ErrorCode},
    frame::{
        DataFlags, Frame, FrameFields, FrameType, HeadersFlags, PrioritySpec, StreamId,
        FRAME_HEADER_LEN,
    },
};

/// Try to decode one frame out of `buf`.
///
/// Returns `Ok(None)` when fewer than a whole frame's bytes are buffered;
/// in that case the buffer is left untouched and the header is re-parsed
/// on the next call. On success, the frame's type-specific payload-prefix
/// fields are decoded into [Frame::fields], the remaining payload is
/// returned as a zero-copy view, and the buffer is advanced past the
/// whole frame.
///
/// `max_frame_size` is the currently negotiated SETTINGS_MAX_FRAME_SIZE.
/// A header declaring a larger payload fails immediately, before any of
/// that payload is buffered, so an oversized length field cannot force
/// unbounded buffering.
///
/// Every error returned here is fatal to the connection.
pub fn read_frame(
    buf: &mut BytesMut,
    max_frame_size: u32,
) -> Result<Option<(Frame, Bytes)>, ConnectionError> {
    let mut frame = match Frame::parse(&buf[..]) {
        Ok((_, frame)) => frame,
        Err(nom::Err::Incomplete(_)) => {
            trace!(buffered = buf.len(), "not enough data for a frame header");
            return Ok(None);
        }
        // the header parser is four fixed-width integer reads; short
        // input is its only failure mode
        Err(_) => unreachable!("frame header parsing only fails on incomplete input"),
    };

    if frame.len > max_frame_size {
        return Err(ConnectionError::FrameTooLarge {
            frame_type: frame.frame_type,
            frame_size: frame.len,
            max_frame_size,
        });
    }

    let total = FRAME_HEADER_LEN + frame.len as usize;
    if buf.len() < total {
        trace!(
            buffered = buf.len(),
            needed = total,
            "not enough data for the frame payload"
        );
        return Ok(None);
    }

    let fields_size = fields_size(&frame);
    if fields_size > frame.len {
        return Err(ConnectionError::InvalidFrameLength {
            frame_type: frame.frame_type,
            frame_size: frame.len,
            fields_size,
        });
    }

    let prefix = &buf[FRAME_HEADER_LEN..FRAME_HEADER_LEN + fields_size as usize];
    frame.fields = parse_fields(&frame, prefix);

    buf.advance(FRAME_HEADER_LEN + fields_size as usize);
    let payload = buf.split_to(frame.len as usize - fields_size as usize).freeze();
    trace!(frame = ?frame, payload_len = payload.len(), "decoded frame");

    Ok(Some((frame, payload)))
}

/// How many of the payload's leading bytes are type-specific fields for
/// this frame, given its flags. Unknown frame types have none.
fn fields_size(frame: &Frame) -> u32 {
    match frame.frame_type {
        FrameType::Data(flags) => flags.contains(DataFlags::Padded) as u32,
        FrameType::Headers(flags) => {
            let pad = flags.contains(HeadersFlags::Padded) as u32;
            let priority = if flags.contains(HeadersFlags::Priority) {
                PrioritySpec::WIRE_SIZE as u32
            } else {
                0
            };
            pad + priority
        }
        FrameType::Priority => PrioritySpec::WIRE_SIZE as u32,
        FrameType::RstStream => 4,
        FrameType::GoAway => 8,
        FrameType::WindowUpdate => 4,
        FrameType::Settings(_)
        | FrameType::PushPromise
        | FrameType::Ping(_)
        | FrameType::Continuation(_)
        | FrameType::Unknown(_) => 0,
    }
}

/// Decode the type-specific fields out of `prefix`, which is exactly
/// [fields_size] bytes long.
fn parse_fields(frame: &Frame, prefix: &[u8]) -> FrameFields {
    match frame.frame_type {
        FrameType::Data(flags) => FrameFields::Data {
            pad_length: flags.contains(DataFlags::Padded).then(|| prefix[0]),
        },
        FrameType::Headers(flags) => {
            // padding length comes before the priority fields on the wire
            let mut rest = prefix;
            let pad_length = if flags.contains(HeadersFlags::Padded) {
                let pad = rest[0];
                rest = &rest[1..];
                Some(pad)
            } else {
                None
            };
            let priority = if flags.contains(HeadersFlags::Priority) {
                Some(PrioritySpec::from_be_bytes([
                    rest[0], rest[1], rest[2], rest[3], rest[4],
                ]))
            } else {
                None
            };
            FrameFields::Headers {
                pad_length,
                priority,
            }
        }
        FrameType::Priority => FrameFields::Priority(PrioritySpec::from_be_bytes([
            prefix[0], prefix[1], prefix[2], prefix[3], prefix[4],
        ])),
        FrameType::RstStream => FrameFields::RstStream {
            error_code: ErrorCode(u32::from_be_bytes([
                prefix[0], prefix[1], prefix[2], prefix[3],
            ])),
        },
        FrameType::GoAway => {
            let last = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
            let code = u32::from_be_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]);
            FrameFields::GoAway {
                // top bit of the last-stream-id word is reserved
                last_stream_id: StreamId(last & 0x7FFF_FFFF),
                error_code: ErrorCode(code),
            }
        }
        FrameType::WindowUpdate => {
            let x = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
            FrameFields::WindowUpdate {
                reserved: (x >> 31) as u8,
                increment: x & 0x7FFF_FFFF,
            }
        }
        FrameType::Settings(_)
        | FrameType::PushPromise
        | FrameType::Ping(_)
        | FrameType::Continuation(_)
        | FrameType::Unknown(_) => FrameFields::None,
    }
}
