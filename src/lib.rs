//! HTTP/2 frame and connection-settings protocol layer
//!
//! Wire-exact frame decoding, peer-settings negotiation and the
//! connection error taxonomy for HTTP/2, with everything above the frame
//! boundary (streams, HPACK, flow control, TLS) left to the caller.
//!
//! HTTP/2 <https://httpwg.org/specs/rfc9113.html>
//! HTTP semantics <https://httpwg.org/specs/rfc9110.html>

pub use enumflags2;
pub use nom;

use nom::IResult;

mod error;
mod frame;
mod read;
mod settings;

pub use error::{
    ConnectionEndReason, ConnectionError, ErrorCode, KnownErrorCode, SettingOutOfRangeError,
};
pub use frame::{
    pack_bit_and_u31, pack_reserved_and_stream_id, parse_bit_and_u31, ContinuationFlags,
    DataFlags, EncodedFrameType, Frame, FrameFields, FrameType, HeadersFlags, PingFlags,
    PrioritySpec, RawFrameType, SettingsFlags, StreamId, StreamIdOutOfRange, FRAME_HEADER_LEN,
};
pub use read::read_frame;
pub use settings::{PeerSetting, PeerSettings, Setting};

/// This is sent by h2 clients after negotiating over ALPN, or when doing h2c.
pub const PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

pub fn preface(i: &[u8]) -> IResult<&[u8], ()> {
    let (i, _) = nom::bytes::streaming::tag(PREFACE)(i)?;
    Ok((i, ()))
}

#[test]
fn test_preface_is_streaming() {
    assert!(matches!(
        preface(&PREFACE[..7]),
        Err(nom::Err::Incomplete(_))
    ));
    let (rest, ()) = preface(PREFACE).unwrap();
    assert!(rest.is_empty());
    assert!(preface(b"GET / HTTP/1.1\r\n\r\nSM\r\n\r\n").is_err());
}
