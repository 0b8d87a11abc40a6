//! End-to-end wire tests: frames serialized with the prepare
//! constructors, fed back through the reader one byte at a time, and a
//! settings exchange decoded into the peer table.

use bytes::BytesMut;
use pretty_assertions::assert_eq;
use skiff_h2::{
    read_frame, ConnectionError, DataFlags, Frame, FrameFields, FrameType, HeadersFlags,
    KnownErrorCode, PeerSetting, PeerSettings, PrioritySpec, Setting, StreamId,
};

const MAX: u32 = PeerSettings::DEFAULT_MAX_FRAME_SIZE;

/// Feed `bytes` to the reader one byte at a time; every prefix must come
/// back incomplete without disturbing the buffer, and the full input
/// must decode in one go.
fn decode_byte_by_byte(bytes: &[u8]) -> (Frame, bytes::Bytes) {
    let mut buf = BytesMut::new();
    for (i, byte) in bytes.iter().enumerate() {
        if i + 1 < bytes.len() {
            buf.extend_from_slice(&[*byte]);
            assert!(
                read_frame(&mut buf, MAX).expect("prefix must not error").is_none(),
                "reader claimed a frame after {} of {} bytes",
                i + 1,
                bytes.len()
            );
            assert_eq!(buf.len(), i + 1, "incomplete read must not consume");
        }
    }
    buf.extend_from_slice(&bytes[bytes.len() - 1..]);
    let (frame, payload) = read_frame(&mut buf, MAX)
        .expect("full frame must decode")
        .expect("full frame must be complete");
    assert!(buf.is_empty(), "whole frame must be consumed");
    (frame, payload)
}

#[test]
fn every_frame_type_round_trips() {
    let priority = PrioritySpec {
        exclusive: true,
        stream_dependency: StreamId(1),
        weight: 255,
    };

    let frames: Vec<(Frame, &[u8])> = vec![
        (
            Frame::data(StreamId(1), DataFlags::EndStream.into(), 5),
            b"hello",
        ),
        (
            Frame::headers(StreamId(3), HeadersFlags::EndHeaders.into(), 4)
                .with_priority(priority),
            b"\x82\x84\x86\x41",
        ),
        (Frame::priority(StreamId(5), priority), b""),
        (
            Frame::rst_stream(StreamId(7), KnownErrorCode::Cancel.into()),
            b"",
        ),
        (Frame::settings(6), b"\x00\x03\x00\x00\x00\x64"),
        (Frame::settings_ack(), b""),
        (Frame::ping(Default::default()), b"\x01\x02\x03\x04\x05\x06\x07\x08"),
        (
            Frame::goaway(StreamId(9), KnownErrorCode::NoError.into(), 3),
            b"bye",
        ),
        (Frame::window_update(StreamId(0), 65_535), b""),
        (Frame::continuation(StreamId(3), Default::default(), 2), b"\x01\x02"),
    ];

    for (frame, body) in frames {
        let mut bytes = Vec::new();
        frame.write_into(&mut bytes).unwrap();
        bytes.extend_from_slice(body);

        let (decoded, payload) = decode_byte_by_byte(&bytes);
        assert_eq!(decoded.frame_type, frame.frame_type);
        assert_eq!(decoded.len, frame.len);
        assert_eq!(decoded.stream_id, frame.stream_id);
        assert_eq!(decoded.fields, frame.fields);
        assert_eq!(&payload[..], body);
    }
}

#[test]
fn settings_exchange() {
    // the server advertises its non-defaults...
    let mut server = PeerSettings {
        max_concurrent_streams: 100,
        max_header_list_size: 1 << 15,
        ..Default::default()
    };
    let advertised = server.non_protocol_defaults();
    assert_eq!(
        advertised,
        vec![
            PeerSetting::new(Setting::MaxConcurrentStreams, 100),
            PeerSetting::new(Setting::MaxHeaderListSize, 1 << 15),
            PeerSetting::new(Setting::EnableConnectProtocol, 1),
        ]
    );

    let mut payload = Vec::new();
    for setting in &advertised {
        setting.write_into(&mut payload).unwrap();
    }
    let mut bytes = Vec::new();
    Frame::settings(payload.len() as u32)
        .write_into(&mut bytes)
        .unwrap();
    bytes.extend_from_slice(&payload);

    // ...and the client decodes the frame and applies the records
    let mut buf = BytesMut::from(&bytes[..]);
    let (frame, payload) = read_frame(&mut buf, MAX).unwrap().unwrap();
    assert!(matches!(frame.frame_type, FrameType::Settings(_)));
    assert!(!frame.is_ack());
    assert_eq!(frame.stream_id, StreamId::CONNECTION);

    let mut client_view = PeerSettings::default();
    client_view
        .update(&PeerSetting::decode_payload(&payload))
        .unwrap();
    assert_eq!(client_view.max_concurrent_streams, 100);
    assert_eq!(client_view.max_header_list_size, 1 << 15);
    assert!(client_view.enable_connect_protocol);

    // raising the peer's max frame size changes what the reader accepts
    server
        .update(&[PeerSetting::new(Setting::MaxFrameSize, 20_000)])
        .unwrap();
    let mut big = Vec::new();
    Frame::data(StreamId(1), Default::default(), 17_000)
        .write_into(&mut big)
        .unwrap();
    big.extend_from_slice(&vec![0u8; 17_000]);

    let mut buf = BytesMut::from(&big[..]);
    assert!(matches!(
        read_frame(&mut buf, PeerSettings::DEFAULT_MAX_FRAME_SIZE),
        Err(ConnectionError::FrameTooLarge { .. })
    ));

    let mut buf = BytesMut::from(&big[..]);
    let (frame, payload) = read_frame(&mut buf, server.max_frame_size).unwrap().unwrap();
    assert_eq!(frame.len, 17_000);
    assert_eq!(payload.len(), 17_000);
}

#[test]
fn goaway_tear_down_uses_the_error_mapping() {
    // an oversized frame comes in...
    let mut buf = BytesMut::from(&[0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01][..]);
    let err = read_frame(&mut buf, MAX).unwrap_err();

    // ...and the connection layer answers with a GOAWAY carrying the
    // mapped wire code, logging the internal reason
    let code = err.error_code();
    assert_eq!(code, KnownErrorCode::FrameSizeError);
    assert_eq!(err.end_reason().as_str(), "max_frame_length_exceeded");

    let goaway = Frame::goaway(StreamId(0), code.into(), 0);
    let mut bytes = Vec::new();
    goaway.write_into(&mut bytes).unwrap();

    let mut buf = BytesMut::from(&bytes[..]);
    let (frame, _) = read_frame(&mut buf, MAX).unwrap().unwrap();
    assert_eq!(
        frame.fields,
        FrameFields::GoAway {
            last_stream_id: StreamId(0),
            error_code: KnownErrorCode::FrameSizeError.into(),
        }
    );
}
