//! The HTTP/2 frame model: header fields, typed flags, and the
//! type-specific payload-prefix fields.
//!
//! See <https://httpwg.org/specs/rfc9113.html#FrameTypes>

use std::fmt;

use byteorder::{BigEndian, WriteBytesExt};
use enumflags2::{bitflags, BitFlags};
use nom::{
    combinator::map,
    number::streaming::{be_u24, be_u32, be_u8},
    sequence::tuple,
    IResult,
};

use crate::error::ErrorCode;

/// Size of the fixed frame header: 3 bytes of length, 1 of type, 1 of
/// flags, 4 of reserved-bit-plus-stream-id.
pub const FRAME_HEADER_LEN: usize = 9;

/// See <https://httpwg.org/specs/rfc9113.html#FrameTypes>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RawFrameType {
    Data = 0x00,
    Headers = 0x01,
    Priority = 0x02,
    RstStream = 0x03,
    Settings = 0x04,
    PushPromise = 0x05,
    Ping = 0x06,
    GoAway = 0x07,
    WindowUpdate = 0x08,
    Continuation = 0x09,
}

impl RawFrameType {
    pub fn from_repr(ty: u8) -> Option<Self> {
        use RawFrameType as T;
        Some(match ty {
            0x00 => T::Data,
            0x01 => T::Headers,
            0x02 => T::Priority,
            0x03 => T::RstStream,
            0x04 => T::Settings,
            0x05 => T::PushPromise,
            0x06 => T::Ping,
            0x07 => T::GoAway,
            0x08 => T::WindowUpdate,
            0x09 => T::Continuation,
            _ => return None,
        })
    }

    pub fn repr(self) -> u8 {
        self as u8
    }
}

/// Typed flags for various frame types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Data(BitFlags<DataFlags>),
    Headers(BitFlags<HeadersFlags>),
    Priority,
    RstStream,
    Settings(BitFlags<SettingsFlags>),
    PushPromise,
    Ping(BitFlags<PingFlags>),
    GoAway,
    WindowUpdate,
    Continuation(BitFlags<ContinuationFlags>),
    Unknown(EncodedFrameType),
}

/// See <https://httpwg.org/specs/rfc9113.html#DATA>
#[bitflags]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DataFlags {
    Padded = 0x08,
    EndStream = 0x01,
}

/// See <https://httpwg.org/specs/rfc9113.html#rfc.section.6.2>
#[bitflags]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HeadersFlags {
    Priority = 0x20,
    Padded = 0x08,
    EndHeaders = 0x04,
    EndStream = 0x01,
}

/// See <https://httpwg.org/specs/rfc9113.html#SETTINGS>
#[bitflags]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SettingsFlags {
    Ack = 0x01,
}

/// See <https://httpwg.org/specs/rfc9113.html#PING>
#[bitflags]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PingFlags {
    Ack = 0x01,
}

/// See <https://httpwg.org/specs/rfc9113.html#CONTINUATION>
#[bitflags]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContinuationFlags {
    EndHeaders = 0x04,
}

/// Raw (type, flags) bytes of a frame header. Unknown frame types keep
/// these around so they can round-trip untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedFrameType {
    pub ty: u8,
    pub flags: u8,
}

impl EncodedFrameType {
    fn parse(i: &[u8]) -> IResult<&[u8], Self> {
        let (i, (ty, flags)) = tuple((be_u8, be_u8))(i)?;
        Ok((i, Self { ty, flags }))
    }
}

impl From<(RawFrameType, u8)> for EncodedFrameType {
    fn from((ty, flags): (RawFrameType, u8)) -> Self {
        Self {
            ty: ty.repr(),
            flags,
        }
    }
}

impl FrameType {
    pub(crate) fn encode(self) -> EncodedFrameType {
        match self {
            FrameType::Data(f) => (RawFrameType::Data, f.bits()).into(),
            FrameType::Headers(f) => (RawFrameType::Headers, f.bits()).into(),
            FrameType::Priority => (RawFrameType::Priority, 0).into(),
            FrameType::RstStream => (RawFrameType::RstStream, 0).into(),
            FrameType::Settings(f) => (RawFrameType::Settings, f.bits()).into(),
            FrameType::PushPromise => (RawFrameType::PushPromise, 0).into(),
            FrameType::Ping(f) => (RawFrameType::Ping, f.bits()).into(),
            FrameType::GoAway => (RawFrameType::GoAway, 0).into(),
            FrameType::WindowUpdate => (RawFrameType::WindowUpdate, 0).into(),
            FrameType::Continuation(f) => (RawFrameType::Continuation, f.bits()).into(),
            FrameType::Unknown(ft) => ft,
        }
    }

    fn decode(ft: EncodedFrameType) -> Self {
        match RawFrameType::from_repr(ft.ty) {
            Some(ty) => match ty {
                RawFrameType::Data => {
                    FrameType::Data(BitFlags::<DataFlags>::from_bits_truncate(ft.flags))
                }
                RawFrameType::Headers => {
                    FrameType::Headers(BitFlags::<HeadersFlags>::from_bits_truncate(ft.flags))
                }
                RawFrameType::Priority => FrameType::Priority,
                RawFrameType::RstStream => FrameType::RstStream,
                RawFrameType::Settings => {
                    FrameType::Settings(BitFlags::<SettingsFlags>::from_bits_truncate(ft.flags))
                }
                RawFrameType::PushPromise => FrameType::PushPromise,
                RawFrameType::Ping => {
                    FrameType::Ping(BitFlags::<PingFlags>::from_bits_truncate(ft.flags))
                }
                RawFrameType::GoAway => FrameType::GoAway,
                RawFrameType::WindowUpdate => FrameType::WindowUpdate,
                RawFrameType::Continuation => FrameType::Continuation(
                    BitFlags::<ContinuationFlags>::from_bits_truncate(ft.flags),
                ),
            },
            None => FrameType::Unknown(ft),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub u32);

impl StreamId {
    /// Stream ID used for connection control frames
    pub const CONNECTION: Self = Self(0);

    /// Server-initiated streams have even IDs
    pub fn is_server_initiated(&self) -> bool {
        self.0 % 2 == 0
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid stream id: {0}")]
pub struct StreamIdOutOfRange(u32);

impl TryFrom<u32> for StreamId {
    type Error = StreamIdOutOfRange;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value & 0x8000_0000 != 0 {
            Err(StreamIdOutOfRange(value))
        } else {
            Ok(Self(value))
        }
    }
}

impl fmt::Debug for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// cf. https://httpwg.org/specs/rfc9113.html#HEADERS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrioritySpec {
    pub exclusive: bool,
    pub stream_dependency: StreamId,
    // 0-255 => 1-256
    pub weight: u8,
}

impl PrioritySpec {
    /// On-the-wire size: 4 bytes of exclusive-bit + dependency, 1 of weight.
    pub const WIRE_SIZE: usize = 5;

    pub fn parse(i: &[u8]) -> IResult<&[u8], Self> {
        map(
            tuple((parse_reserved_and_stream_id, be_u8)),
            |((exclusive, stream_dependency), weight)| Self {
                exclusive: exclusive != 0,
                stream_dependency,
                weight,
            },
        )(i)
    }

    pub(crate) fn from_be_bytes(b: [u8; 5]) -> Self {
        let x = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
        Self {
            exclusive: (x >> 31) != 0,
            stream_dependency: StreamId(x & 0x7FFF_FFFF),
            weight: b[4],
        }
    }

    pub fn write_into(&self, mut w: impl std::io::Write) -> std::io::Result<()> {
        w.write_all(&pack_reserved_and_stream_id(
            self.exclusive as u8,
            self.stream_dependency,
        ))?;
        w.write_u8(self.weight)?;
        Ok(())
    }
}

/// The type-specific fields at the front of a frame's payload, decoded.
///
/// Only the types that actually define such fields get a variant; PING's
/// opaque 8 bytes, SETTINGS records and CONTINUATION fragments are plain
/// payload. Keying this off the frame type (instead of a flat record with
/// one slot per field) makes it impossible to read a field that is
/// meaningless for the current frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FrameFields {
    #[default]
    None,
    Data {
        pad_length: Option<u8>,
    },
    Headers {
        pad_length: Option<u8>,
        priority: Option<PrioritySpec>,
    },
    Priority(PrioritySpec),
    RstStream {
        error_code: ErrorCode,
    },
    GoAway {
        last_stream_id: StreamId,
        error_code: ErrorCode,
    },
    WindowUpdate {
        reserved: u8,
        increment: u32,
    },
}

impl FrameFields {
    /// How many payload bytes these fields occupy on the wire.
    pub fn wire_size(&self) -> u32 {
        match self {
            FrameFields::None => 0,
            FrameFields::Data { pad_length } => pad_length.is_some() as u32,
            FrameFields::Headers {
                pad_length,
                priority,
            } => {
                pad_length.is_some() as u32
                    + if priority.is_some() {
                        PrioritySpec::WIRE_SIZE as u32
                    } else {
                        0
                    }
            }
            FrameFields::Priority(_) => PrioritySpec::WIRE_SIZE as u32,
            FrameFields::RstStream { .. } => 4,
            FrameFields::GoAway { .. } => 8,
            FrameFields::WindowUpdate { .. } => 4,
        }
    }
}

/// One HTTP/2 frame: the 9-byte header plus the decoded type-specific
/// payload-prefix fields. `len` is the declared payload length and always
/// counts the bytes consumed into `fields`.
///
/// See <https://httpwg.org/specs/rfc9113.html#FrameHeader>
pub struct Frame {
    pub frame_type: FrameType,
    pub reserved: u8,
    pub stream_id: StreamId,
    pub len: u32,
    pub fields: FrameFields,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            frame_type: FrameType::Unknown(EncodedFrameType {
                ty: 0xff,
                flags: 0xff,
            }),
            reserved: 0,
            stream_id: StreamId::CONNECTION,
            len: 0,
            fields: FrameFields::None,
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.stream_id.0 == 0 {
            write!(f, "Conn:")?;
        } else {
            write!(f, "#{}:", self.stream_id.0)?;
        }

        let name = match &self.frame_type {
            FrameType::Data(_) => "Data",
            FrameType::Headers(_) => "Headers",
            FrameType::Priority => "Priority",
            FrameType::RstStream => "RstStream",
            FrameType::Settings(_) => "Settings",
            FrameType::PushPromise => "PushPromise",
            FrameType::Ping(_) => "Ping",
            FrameType::GoAway => "GoAway",
            FrameType::WindowUpdate => "WindowUpdate",
            FrameType::Continuation(_) => "Continuation",
            FrameType::Unknown(EncodedFrameType { ty, flags }) => {
                return write!(f, "UnknownFrame({:#x}, {:#x}, len={})", ty, flags, self.len)
            }
        };
        let mut s = f.debug_struct(name);

        if self.reserved != 0 {
            s.field("reserved", &self.reserved);
        }
        if self.len > 0 {
            s.field("len", &self.len);
        }

        struct DisplayDebug<'a, D: fmt::Display>(&'a D);
        impl<'a, D: fmt::Display> fmt::Debug for DisplayDebug<'a, D> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(self.0, f)
            }
        }

        match &self.frame_type {
            FrameType::Data(flags) => {
                if !flags.is_empty() {
                    s.field("flags", &DisplayDebug(flags));
                }
            }
            FrameType::Headers(flags) => {
                if !flags.is_empty() {
                    s.field("flags", &DisplayDebug(flags));
                }
            }
            FrameType::Settings(flags) => {
                if !flags.is_empty() {
                    s.field("flags", &DisplayDebug(flags));
                }
            }
            FrameType::Ping(flags) => {
                if !flags.is_empty() {
                    s.field("flags", &DisplayDebug(flags));
                }
            }
            FrameType::Continuation(flags) => {
                if !flags.is_empty() {
                    s.field("flags", &DisplayDebug(flags));
                }
            }
            _ => {}
        }

        if self.fields != FrameFields::None {
            s.field("fields", &self.fields);
        }

        s.finish()
    }
}

impl Frame {
    /// Create a new frame with the given type and stream ID.
    pub fn new(frame_type: FrameType, stream_id: StreamId) -> Self {
        Self {
            frame_type,
            reserved: 0,
            stream_id,
            len: 0,
            fields: FrameFields::None,
        }
    }

    /// Set the frame's length.
    pub fn with_len(mut self, len: u32) -> Self {
        self.len = len;
        self
    }

    /// Prepare an outbound DATA frame carrying `body_len` bytes.
    pub fn data(stream_id: StreamId, flags: BitFlags<DataFlags>, body_len: u32) -> Self {
        Self {
            frame_type: FrameType::Data(flags & !DataFlags::Padded),
            reserved: 0,
            stream_id,
            len: body_len,
            fields: FrameFields::Data { pad_length: None },
        }
    }

    /// Prepare an outbound HEADERS frame carrying a `fragment_len`-byte
    /// field block fragment.
    pub fn headers(stream_id: StreamId, flags: BitFlags<HeadersFlags>, fragment_len: u32) -> Self {
        Self {
            frame_type: FrameType::Headers(flags & !(HeadersFlags::Padded | HeadersFlags::Priority)),
            reserved: 0,
            stream_id,
            len: fragment_len,
            fields: FrameFields::Headers {
                pad_length: None,
                priority: None,
            },
        }
    }

    /// Add padding to a prepared DATA or HEADERS frame: sets the Padded
    /// flag and grows `len` by the pad-length byte plus the padding
    /// itself. No-op for other frame types.
    pub fn with_padding(mut self, pad: u8) -> Self {
        match (&mut self.frame_type, &mut self.fields) {
            (FrameType::Data(flags), FrameFields::Data { pad_length }) => {
                *flags |= DataFlags::Padded;
                *pad_length = Some(pad);
                self.len += 1 + pad as u32;
            }
            (FrameType::Headers(flags), FrameFields::Headers { pad_length, .. }) => {
                *flags |= HeadersFlags::Padded;
                *pad_length = Some(pad);
                self.len += 1 + pad as u32;
            }
            _ => {}
        }
        self
    }

    /// Add a priority triple to a prepared HEADERS frame: sets the
    /// Priority flag and grows `len` by 5. No-op for other frame types.
    pub fn with_priority(mut self, spec: PrioritySpec) -> Self {
        if let (FrameType::Headers(flags), FrameFields::Headers { priority, .. }) =
            (&mut self.frame_type, &mut self.fields)
        {
            *flags |= HeadersFlags::Priority;
            *priority = Some(spec);
            self.len += PrioritySpec::WIRE_SIZE as u32;
        }
        self
    }

    /// Prepare an outbound PRIORITY frame. Always 5 bytes.
    pub fn priority(stream_id: StreamId, spec: PrioritySpec) -> Self {
        Self {
            frame_type: FrameType::Priority,
            reserved: 0,
            stream_id,
            len: PrioritySpec::WIRE_SIZE as u32,
            fields: FrameFields::Priority(spec),
        }
    }

    /// Prepare an outbound RST_STREAM frame. Always 4 bytes of error code.
    pub fn rst_stream(stream_id: StreamId, error_code: ErrorCode) -> Self {
        Self {
            frame_type: FrameType::RstStream,
            reserved: 0,
            stream_id,
            len: 4,
            fields: FrameFields::RstStream { error_code },
        }
    }

    /// Prepare an outbound SETTINGS frame; the caller appends
    /// `payload_len` bytes of 6-byte settings records separately.
    pub fn settings(payload_len: u32) -> Self {
        Self {
            frame_type: FrameType::Settings(Default::default()),
            reserved: 0,
            stream_id: StreamId::CONNECTION,
            len: payload_len,
            fields: FrameFields::None,
        }
    }

    /// Prepare an outbound SETTINGS ACK. Always empty.
    pub fn settings_ack() -> Self {
        Self {
            frame_type: FrameType::Settings(SettingsFlags::Ack.into()),
            reserved: 0,
            stream_id: StreamId::CONNECTION,
            len: 0,
            fields: FrameFields::None,
        }
    }

    /// Prepare an outbound PING frame; the caller appends the 8 opaque
    /// bytes separately.
    pub fn ping(flags: BitFlags<PingFlags>) -> Self {
        Self {
            frame_type: FrameType::Ping(flags),
            reserved: 0,
            stream_id: StreamId::CONNECTION,
            len: 8,
            fields: FrameFields::None,
        }
    }

    /// Prepare an outbound PING ack, echoing back the 8 opaque bytes the
    /// caller appends separately.
    pub fn ping_ack() -> Self {
        Self::ping(PingFlags::Ack.into())
    }

    /// Prepare an outbound GOAWAY frame: 8 bytes of last-stream-id and
    /// error code, then `debug_data_len` bytes appended by the caller.
    pub fn goaway(last_stream_id: StreamId, error_code: ErrorCode, debug_data_len: u32) -> Self {
        Self {
            frame_type: FrameType::GoAway,
            reserved: 0,
            stream_id: StreamId::CONNECTION,
            len: 8 + debug_data_len,
            fields: FrameFields::GoAway {
                last_stream_id,
                error_code,
            },
        }
    }

    /// Prepare an outbound WINDOW_UPDATE frame. Always 4 bytes.
    pub fn window_update(stream_id: StreamId, increment: u32) -> Self {
        Self {
            frame_type: FrameType::WindowUpdate,
            reserved: 0,
            stream_id,
            len: 4,
            fields: FrameFields::WindowUpdate {
                reserved: 0,
                increment,
            },
        }
    }

    /// Prepare an outbound CONTINUATION frame carrying a
    /// `fragment_len`-byte field block fragment.
    pub fn continuation(
        stream_id: StreamId,
        flags: BitFlags<ContinuationFlags>,
        fragment_len: u32,
    ) -> Self {
        Self {
            frame_type: FrameType::Continuation(flags),
            reserved: 0,
            stream_id,
            len: fragment_len,
            fields: FrameFields::None,
        }
    }

    /// Parse a frame header from the given slice. The type-specific
    /// payload-prefix fields are left at [FrameFields::None]; the frame
    /// reader fills them in once the payload is buffered.
    pub fn parse(i: &[u8]) -> IResult<&[u8], Self> {
        let (i, (len, frame_type, (reserved, stream_id))) = tuple((
            be_u24,
            EncodedFrameType::parse,
            parse_reserved_and_stream_id,
        ))(i)?;

        let frame = Frame {
            frame_type: FrameType::decode(frame_type),
            reserved,
            stream_id,
            len,
            fields: FrameFields::None,
        };
        Ok((i, frame))
    }

    /// Serialize the 9-byte header followed by the type-specific
    /// payload-prefix fields. The byte-exact inverse of what the frame
    /// reader consumes before handing back the payload view.
    pub fn write_into(&self, mut w: impl std::io::Write) -> std::io::Result<()> {
        w.write_u24::<BigEndian>(self.len)?;
        let ft = self.frame_type.encode();
        w.write_u8(ft.ty)?;
        w.write_u8(ft.flags)?;
        w.write_all(&pack_reserved_and_stream_id(self.reserved, self.stream_id))?;

        match &self.fields {
            FrameFields::None => {}
            FrameFields::Data { pad_length } => {
                if let Some(pad) = pad_length {
                    w.write_u8(*pad)?;
                }
            }
            FrameFields::Headers {
                pad_length,
                priority,
            } => {
                if let Some(pad) = pad_length {
                    w.write_u8(*pad)?;
                }
                if let Some(spec) = priority {
                    spec.write_into(&mut w)?;
                }
            }
            FrameFields::Priority(spec) => {
                spec.write_into(&mut w)?;
            }
            FrameFields::RstStream { error_code } => {
                w.write_u32::<BigEndian>(error_code.0)?;
            }
            FrameFields::GoAway {
                last_stream_id,
                error_code,
            } => {
                w.write_u32::<BigEndian>(last_stream_id.0)?;
                w.write_u32::<BigEndian>(error_code.0)?;
            }
            FrameFields::WindowUpdate {
                reserved,
                increment,
            } => {
                w.write_all(&pack_bit_and_u31(*reserved, *increment))?;
            }
        }

        Ok(())
    }

    /// Returns true if this frame is an ack
    pub fn is_ack(&self) -> bool {
        match self.frame_type {
            FrameType::Settings(flags) => flags.contains(SettingsFlags::Ack),
            FrameType::Ping(flags) => flags.contains(PingFlags::Ack),
            _ => false,
        }
    }

    /// Returns true if this frame has `EndHeaders` set
    pub fn is_end_headers(&self) -> bool {
        match self.frame_type {
            FrameType::Headers(flags) => flags.contains(HeadersFlags::EndHeaders),
            FrameType::Continuation(flags) => flags.contains(ContinuationFlags::EndHeaders),
            _ => false,
        }
    }

    /// Returns true if this frame has `EndStream` set
    pub fn is_end_stream(&self) -> bool {
        match self.frame_type {
            FrameType::Data(flags) => flags.contains(DataFlags::EndStream),
            FrameType::Headers(flags) => flags.contains(HeadersFlags::EndStream),
            _ => false,
        }
    }

    /// Returns true if this frame has `Padded` set
    pub fn has_padding(&self) -> bool {
        match self.frame_type {
            FrameType::Data(flags) => flags.contains(DataFlags::Padded),
            FrameType::Headers(flags) => flags.contains(HeadersFlags::Padded),
            _ => false,
        }
    }

    /// The decoded pad length of a DATA or HEADERS frame, if any. The
    /// padding bytes themselves sit at the end of the payload view.
    pub fn pad_length(&self) -> Option<u8> {
        match self.fields {
            FrameFields::Data { pad_length } => pad_length,
            FrameFields::Headers { pad_length, .. } => pad_length,
            _ => None,
        }
    }
}

/// See <https://httpwg.org/specs/rfc9113.html#FrameHeader> - the first bit
/// is reserved, and the rest is a 31-bit stream id
pub fn parse_bit_and_u31(i: &[u8]) -> IResult<&[u8], (u8, u32)> {
    // first, parse a u32:
    let (i, x) = be_u32(i)?;

    let bit = (x >> 31) as u8;
    let val = x & 0x7FFF_FFFF;

    Ok((i, (bit, val)))
}

fn parse_reserved_and_stream_id(i: &[u8]) -> IResult<&[u8], (u8, StreamId)> {
    parse_bit_and_u31(i).map(|(i, (reserved, stream_id))| (i, (reserved, StreamId(stream_id))))
}

/// Pack a bit and a u31 into a 4-byte array (big-endian)
pub fn pack_bit_and_u31(bit: u8, val: u32) -> [u8; 4] {
    // assert val is in range
    assert_eq!(val & 0x7FFF_FFFF, val, "val is too large: {val:x}");

    // assert bit is in range
    assert_eq!(bit & 0x1, bit, "bit should be 0 or 1: {bit:x}");

    // pack
    let mut bytes = val.to_be_bytes();
    if bit != 0 {
        bytes[0] |= 0x80;
    }

    bytes
}

pub fn pack_reserved_and_stream_id(reserved: u8, stream_id: StreamId) -> [u8; 4] {
    pack_bit_and_u31(reserved, stream_id.0)
}

#[test]
fn test_pack_and_parse_bit_and_u31() {
    // Test round-tripping through parse_bit_and_u31 and pack_bit_and_u31
    let test_cases = [
        (0, 0),
        (1, 0),
        (0, 1),
        (1, 1),
        (0, 0x7FFF_FFFF),
        (1, 0x7FFF_FFFF),
    ];

    for &(bit, number) in &test_cases {
        let packed = pack_bit_and_u31(bit, number);
        let (rest, (parsed_bit, parsed_number)) = parse_bit_and_u31(&packed[..]).unwrap();
        assert!(rest.is_empty());
        assert_eq!(dbg!(bit), dbg!(parsed_bit));
        assert_eq!(dbg!(number), dbg!(parsed_number));
    }
}

#[test]
#[should_panic(expected = "bit should be 0 or 1: 2")]
fn test_pack_bit_and_u31_panic_not_a_bit() {
    pack_bit_and_u31(2, 0);
}

#[test]
#[should_panic(expected = "val is too large: 80000000")]
fn test_pack_bit_and_u31_panic_val_too_large() {
    pack_bit_and_u31(0, 1 << 31);
}

#[test]
fn test_prepare_sets_canonical_lengths() {
    use crate::error::KnownErrorCode;

    assert_eq!(Frame::rst_stream(StreamId(3), KnownErrorCode::Cancel.into()).len, 4);
    assert_eq!(Frame::window_update(StreamId(0), 1024).len, 4);
    assert_eq!(
        Frame::goaway(StreamId(5), KnownErrorCode::NoError.into(), 0).len,
        8
    );
    assert_eq!(
        Frame::goaway(StreamId(5), KnownErrorCode::NoError.into(), 11).len,
        19
    );
    assert_eq!(
        Frame::priority(
            StreamId(3),
            PrioritySpec {
                exclusive: false,
                stream_dependency: StreamId(1),
                weight: 0
            }
        )
        .len,
        5
    );
    assert_eq!(Frame::ping(Default::default()).len, 8);
    assert_eq!(Frame::settings_ack().len, 0);

    let ping_ack = Frame::ping_ack();
    assert_eq!(ping_ack.len, 8);
    assert!(ping_ack.is_ack());
}

#[test]
fn test_stream_id_rejects_reserved_bit() {
    assert_eq!(StreamId::try_from(0).unwrap(), StreamId::CONNECTION);
    assert_eq!(StreamId::try_from(0x7FFF_FFFF).unwrap(), StreamId(0x7FFF_FFFF));

    let err = StreamId::try_from(0x8000_0001).unwrap_err();
    assert_eq!(err.to_string(), "invalid stream id: 2147483649");
    assert!(StreamId::try_from(1 << 31).is_err());
}

#[test]
fn test_padding_and_priority_grow_headers_len() {
    let spec = PrioritySpec {
        exclusive: true,
        stream_dependency: StreamId(1),
        weight: 200,
    };
    let frame = Frame::headers(StreamId(3), HeadersFlags::EndHeaders.into(), 10)
        .with_padding(4)
        .with_priority(spec);

    // 10 bytes of fragment + 1 pad-length byte + 4 padding + 5 priority
    assert_eq!(frame.len, 20);
    assert_eq!(frame.fields.wire_size(), 6);
    assert!(frame.has_padding());
    assert_eq!(frame.pad_length(), Some(4));
    assert!(frame.is_end_headers());
    assert!(!frame.is_end_stream());
}

#[test]
fn test_header_write_parse_round_trip() {
    let mut buf = Vec::new();
    Frame::data(StreamId(7), DataFlags::EndStream.into(), 42)
        .write_into(&mut buf)
        .unwrap();
    assert_eq!(buf.len(), FRAME_HEADER_LEN);

    let (rest, frame) = Frame::parse(&buf[..]).unwrap();
    assert!(rest.is_empty());
    assert_eq!(frame.len, 42);
    assert_eq!(frame.stream_id, StreamId(7));
    assert_eq!(frame.frame_type, FrameType::Data(DataFlags::EndStream.into()));
    assert!(frame.is_end_stream());
}

#[test]
fn test_unknown_frame_type_round_trips_raw_bytes() {
    let mut buf = Vec::new();
    Frame::new(
        FrameType::Unknown(EncodedFrameType { ty: 0x42, flags: 0x07 }),
        StreamId(9),
    )
    .with_len(3)
    .write_into(&mut buf)
    .unwrap();

    let (_, frame) = Frame::parse(&buf[..]).unwrap();
    assert_eq!(
        frame.frame_type,
        FrameType::Unknown(EncodedFrameType { ty: 0x42, flags: 0x07 })
    );
    assert_eq!(frame.len, 3);
}
