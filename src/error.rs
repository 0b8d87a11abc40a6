//! Error codes and the connection termination taxonomy.
//!
//! See <https://httpwg.org/specs/rfc9113.html#ErrorCodes>

use std::{fmt, ops::RangeInclusive};

use crate::{frame::FrameType, settings::Setting};

/// A 32-bit error code as carried by RST_STREAM and GOAWAY frames.
/// Unknown codes are preserved as-is.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode(pub u32);

impl ErrorCode {
    /// Returns the underlying u32
    pub fn as_repr(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match KnownErrorCode::from_repr(self.0) {
            Some(e) => fmt::Debug::fmt(&e, f),
            None => write!(f, "ErrorCode(0x{:02x})", self.0),
        }
    }
}

impl From<KnownErrorCode> for ErrorCode {
    fn from(e: KnownErrorCode) -> Self {
        Self(e as u32)
    }
}

/// See <https://httpwg.org/specs/rfc9113.html#ErrorCodes>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum KnownErrorCode {
    /// The associated condition is not a result of an error. For example, a
    /// GOAWAY might include this code to indicate graceful shutdown of a
    /// connection.
    NoError = 0x00,

    /// The endpoint detected an unspecific protocol error. This error is for
    /// use when a more specific error code is not available.
    ProtocolError = 0x01,

    /// The endpoint encountered an unexpected internal error.
    InternalError = 0x02,

    /// The endpoint detected that its peer violated the flow-control protocol.
    FlowControlError = 0x03,

    /// The endpoint sent a SETTINGS frame but did not receive a response in a
    /// timely manner. See Section 6.5.3 ("Settings Synchronization").
    SettingsTimeout = 0x04,

    /// The endpoint received a frame after a stream was half-closed.
    StreamClosed = 0x05,

    /// The endpoint received a frame with an invalid size.
    FrameSizeError = 0x06,

    /// The endpoint refused the stream prior to performing any application
    /// processing.
    RefusedStream = 0x07,

    /// The endpoint uses this error code to indicate that the stream is no
    /// longer needed.
    Cancel = 0x08,

    /// The endpoint is unable to maintain the field section compression
    /// context for the connection.
    CompressionError = 0x09,

    /// The connection established in response to a CONNECT request was reset
    /// or abnormally closed.
    ConnectError = 0x0a,

    /// The endpoint detected that its peer is exhibiting a behavior that
    /// might be generating excessive load.
    EnhanceYourCalm = 0x0b,

    /// The underlying transport has properties that do not meet minimum
    /// security requirements (see Section 9.2).
    InadequateSecurity = 0x0c,

    /// The endpoint requires that HTTP/1.1 be used instead of HTTP/2.
    Http1_1Required = 0x0d,
}

impl KnownErrorCode {
    pub fn from_repr(value: u32) -> Option<Self> {
        use KnownErrorCode as K;
        Some(match value {
            0x00 => K::NoError,
            0x01 => K::ProtocolError,
            0x02 => K::InternalError,
            0x03 => K::FlowControlError,
            0x04 => K::SettingsTimeout,
            0x05 => K::StreamClosed,
            0x06 => K::FrameSizeError,
            0x07 => K::RefusedStream,
            0x08 => K::Cancel,
            0x09 => K::CompressionError,
            0x0a => K::ConnectError,
            0x0b => K::EnhanceYourCalm,
            0x0c => K::InadequateSecurity,
            0x0d => K::Http1_1Required,
            _ => return None,
        })
    }

    pub fn repr(self) -> u32 {
        self as u32
    }
}

impl TryFrom<ErrorCode> for KnownErrorCode {
    type Error = ();

    fn try_from(e: ErrorCode) -> Result<Self, Self::Error> {
        KnownErrorCode::from_repr(e.0).ok_or(())
    }
}

/// Why a connection ended, for logs and metrics. This is internal
/// classification, not a wire value: the wire carries a [KnownErrorCode],
/// this carries the operator-facing story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ConnectionEndReason {
    /// Orderly shutdown requested by the application.
    GracefulShutdown,
    /// The application shut down but streams did not drain in time.
    AppShutdownTimeout,
    /// The client sent a GOAWAY frame.
    ClientGoAway,
    /// The transport was closed by the peer without a GOAWAY.
    ClientDisconnect,
    /// No frames received within the keep-alive window.
    KeepAliveTimeout,
    ServerTimeout,
    StreamTimeout,
    /// The connection preface was missing or malformed.
    InvalidHandshake,
    InvalidHttpVersion,
    InsufficientTlsVersion,
    /// A frame header declared a payload larger than the negotiated
    /// SETTINGS_MAX_FRAME_SIZE.
    MaxFrameLengthExceeded,
    /// A frame was too short to contain its mandatory type-specific fields.
    InvalidFrameLength,
    /// A frame type that is not allowed in the current connection state.
    UnexpectedFrame,
    UnknownStream,
    FrameAfterStreamClose,
    InvalidStreamId,
    /// A stream declared a priority dependency on itself.
    StreamSelfDependency,
    /// Declared padding did not fit in the frame payload.
    InvalidDataPadding,
    /// WINDOW_UPDATE with a zero or overflowing increment.
    InvalidWindowUpdateSize,
    /// HEADERS without END_HEADERS was not followed by CONTINUATION.
    RequiredContinuationMissing,
    /// A SETTINGS frame violated framing rules (misaligned length, ACK with
    /// payload, non-zero stream id).
    InvalidSettings,
    /// A SETTINGS value was outside its RFC-mandated range.
    SettingsOutOfRange,
    ErrorReadingHeaders,
    ErrorWritingHeaders,
    InvalidRequestHeaders,
    MaxHeaderListSizeExceeded,
    MaxConcurrentStreamsExceeded,
    /// Too many RST_STREAM frames in a short window (rapid-reset abuse).
    StreamResetLimitExceeded,
    FlowControlWindowExceeded,
    MaxRequestBodySizeExceeded,
    MinRequestBodyDataRate,
    MinResponseDataRate,
    /// A pending write was canceled while the connection closed.
    WriteCanceled,
    /// The transport failed underneath us.
    IoError,
    OtherError,
}

impl ConnectionEndReason {
    /// Stable snake_case label for metrics and structured logs.
    pub fn as_str(&self) -> &'static str {
        use ConnectionEndReason as R;
        match self {
            R::GracefulShutdown => "graceful_shutdown",
            R::AppShutdownTimeout => "app_shutdown_timeout",
            R::ClientGoAway => "client_go_away",
            R::ClientDisconnect => "client_disconnect",
            R::KeepAliveTimeout => "keep_alive_timeout",
            R::ServerTimeout => "server_timeout",
            R::StreamTimeout => "stream_timeout",
            R::InvalidHandshake => "invalid_handshake",
            R::InvalidHttpVersion => "invalid_http_version",
            R::InsufficientTlsVersion => "insufficient_tls_version",
            R::MaxFrameLengthExceeded => "max_frame_length_exceeded",
            R::InvalidFrameLength => "invalid_frame_length",
            R::UnexpectedFrame => "unexpected_frame",
            R::UnknownStream => "unknown_stream",
            R::FrameAfterStreamClose => "frame_after_stream_close",
            R::InvalidStreamId => "invalid_stream_id",
            R::StreamSelfDependency => "stream_self_dependency",
            R::InvalidDataPadding => "invalid_data_padding",
            R::InvalidWindowUpdateSize => "invalid_window_update_size",
            R::RequiredContinuationMissing => "required_continuation_missing",
            R::InvalidSettings => "invalid_settings",
            R::SettingsOutOfRange => "settings_out_of_range",
            R::ErrorReadingHeaders => "error_reading_headers",
            R::ErrorWritingHeaders => "error_writing_headers",
            R::InvalidRequestHeaders => "invalid_request_headers",
            R::MaxHeaderListSizeExceeded => "max_header_list_size_exceeded",
            R::MaxConcurrentStreamsExceeded => "max_concurrent_streams_exceeded",
            R::StreamResetLimitExceeded => "stream_reset_limit_exceeded",
            R::FlowControlWindowExceeded => "flow_control_window_exceeded",
            R::MaxRequestBodySizeExceeded => "max_request_body_size_exceeded",
            R::MinRequestBodyDataRate => "min_request_body_data_rate",
            R::MinResponseDataRate => "min_response_data_rate",
            R::WriteCanceled => "write_canceled",
            R::IoError => "io_error",
            R::OtherError => "other_error",
        }
    }
}

/// A received SETTINGS value outside its RFC-mandated range.
///
/// Carries the offending parameter; the valid bounds show up in the Display
/// message and in [SettingOutOfRangeError::allowed].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "HTTP/2 SETTINGS parameter {setting:?} must be within {} to {}, got {value}",
    .allowed.start(),
    .allowed.end()
)]
pub struct SettingOutOfRangeError {
    pub setting: Setting,
    pub value: u32,
    pub allowed: RangeInclusive<u32>,
}

/// A protocol violation that is fatal to the connection.
///
/// This is the sole failure channel out of the frame reader and the
/// settings table. The connection layer catches it, sends a GOAWAY with
/// [ConnectionError::error_code], and records
/// [ConnectionError::end_reason].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConnectionError {
    #[error("frame too large: {frame_type:?} frame of size {frame_size} exceeds max frame size of {max_frame_size}")]
    FrameTooLarge {
        frame_type: FrameType,
        frame_size: u32,
        max_frame_size: u32,
    },

    #[error("invalid frame length: {frame_type:?} frame of size {frame_size} cannot hold its {fields_size} bytes of type-specific fields")]
    InvalidFrameLength {
        frame_type: FrameType,
        frame_size: u32,
        fields_size: u32,
    },

    #[error("bad setting value: {0}")]
    SettingOutOfRange(#[from] SettingOutOfRangeError),
}

impl ConnectionError {
    /// The wire error code to send in the GOAWAY that tears this
    /// connection down.
    pub fn error_code(&self) -> KnownErrorCode {
        match self {
            ConnectionError::FrameTooLarge { .. } => KnownErrorCode::FrameSizeError,
            ConnectionError::InvalidFrameLength { .. } => KnownErrorCode::FrameSizeError,
            // RFC 9113, 6.5.2: window size violations are flow-control
            // errors, every other settings violation is a protocol error.
            ConnectionError::SettingOutOfRange(e) => match e.setting {
                Setting::InitialWindowSize => KnownErrorCode::FlowControlError,
                _ => KnownErrorCode::ProtocolError,
            },
        }
    }

    /// The internal classification for logs and metrics.
    pub fn end_reason(&self) -> ConnectionEndReason {
        match self {
            ConnectionError::FrameTooLarge { .. } => ConnectionEndReason::MaxFrameLengthExceeded,
            ConnectionError::InvalidFrameLength { .. } => ConnectionEndReason::InvalidFrameLength,
            ConnectionError::SettingOutOfRange(_) => ConnectionEndReason::SettingsOutOfRange,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_error_code_round_trip() {
        for code in 0x00..=0x0d {
            let known = KnownErrorCode::from_repr(code).unwrap();
            assert_eq!(known.repr(), code);
            assert_eq!(KnownErrorCode::try_from(ErrorCode(code)), Ok(known));
        }
        assert!(KnownErrorCode::from_repr(0x0e).is_none());
    }

    #[test]
    fn unknown_error_code_debug_is_hex() {
        assert_eq!(format!("{:?}", ErrorCode(0xbeef)), "ErrorCode(0xbeef)");
        assert_eq!(format!("{:?}", ErrorCode(0x01)), "ProtocolError");
    }

    #[test]
    fn settings_error_maps_per_parameter() {
        let flow = ConnectionError::from(SettingOutOfRangeError {
            setting: Setting::InitialWindowSize,
            value: 1 << 31,
            allowed: 0..=(1 << 31) - 1,
        });
        assert_eq!(flow.error_code(), KnownErrorCode::FlowControlError);
        assert_eq!(flow.end_reason(), ConnectionEndReason::SettingsOutOfRange);

        let proto = ConnectionError::from(SettingOutOfRangeError {
            setting: Setting::EnablePush,
            value: 2,
            allowed: 0..=1,
        });
        assert_eq!(proto.error_code(), KnownErrorCode::ProtocolError);
    }

    #[test]
    fn out_of_range_message_names_bounds() {
        let err = SettingOutOfRangeError {
            setting: Setting::MaxFrameSize,
            value: 100,
            allowed: 16_384..=16_777_215,
        };
        let msg = err.to_string();
        assert!(msg.contains("16384"), "{msg}");
        assert!(msg.contains("16777215"), "{msg}");
        assert!(msg.contains("100"), "{msg}");
    }
}
