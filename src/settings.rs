//! Peer settings: the 6-byte settings-record codec and the authoritative
//! per-peer settings table.
//!
//! See <https://httpwg.org/specs/rfc9113.html#SettingValues>

use std::ops::RangeInclusive;

use byteorder::{BigEndian, WriteBytesExt};

use crate::error::SettingOutOfRangeError;

/// Known setting identifiers.
///
/// `EnableConnectProtocol` is the RFC 8441 extended-CONNECT extension;
/// the rest are RFC 9113.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Setting {
    HeaderTableSize = 0x01,
    EnablePush = 0x02,
    MaxConcurrentStreams = 0x03,
    InitialWindowSize = 0x04,
    MaxFrameSize = 0x05,
    MaxHeaderListSize = 0x06,
    EnableConnectProtocol = 0x08,
}

impl Setting {
    pub fn from_repr(id: u16) -> Option<Self> {
        use Setting as S;
        Some(match id {
            0x01 => S::HeaderTableSize,
            0x02 => S::EnablePush,
            0x03 => S::MaxConcurrentStreams,
            0x04 => S::InitialWindowSize,
            0x05 => S::MaxFrameSize,
            0x06 => S::MaxHeaderListSize,
            0x08 => S::EnableConnectProtocol,
            _ => return None,
        })
    }

    pub fn repr(self) -> u16 {
        self as u16
    }
}

/// One (identifier, value) pair as it appears on the wire. The identifier
/// stays raw so that unknown settings survive decoding; receivers MUST
/// ignore them (RFC 9113, 6.5.2), and it is the table's job to do so.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerSetting {
    pub id: u16,
    pub value: u32,
}

impl PeerSetting {
    pub fn new(setting: Setting, value: u32) -> Self {
        Self {
            id: setting.repr(),
            value,
        }
    }

    /// The known identifier for this record, if any.
    pub fn known(&self) -> Option<Setting> {
        Setting::from_repr(self.id)
    }

    /// Decode a SETTINGS payload: a flat sequence of 6-byte records,
    /// 2 bytes of big-endian identifier then 4 of big-endian value.
    ///
    /// The payload length must be a multiple of 6; misaligned SETTINGS
    /// frames are a FRAME_SIZE_ERROR under the general framing rules and
    /// never reach this decoder.
    pub fn decode_payload(buf: &[u8]) -> Vec<PeerSetting> {
        debug_assert!(
            buf.len() % 6 == 0,
            "settings payload length must be a multiple of 6 bytes"
        );

        buf.chunks_exact(6)
            .map(|chunk| PeerSetting {
                id: u16::from_be_bytes([chunk[0], chunk[1]]),
                value: u32::from_be_bytes([chunk[2], chunk[3], chunk[4], chunk[5]]),
            })
            .collect()
    }

    /// Emit the 6-byte wire record.
    pub fn write_into(&self, mut w: impl std::io::Write) -> std::io::Result<()> {
        w.write_u16::<BigEndian>(self.id)?;
        w.write_u32::<BigEndian>(self.value)?;
        Ok(())
    }
}

/// The authoritative snapshot of one peer's settings. Two live per
/// connection: what we told the peer, and what the peer told us. Access
/// is single-threaded per connection; the owning connection serializes
/// all calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSettings {
    pub header_table_size: u32,
    pub enable_push: bool,
    pub max_concurrent_streams: u32,
    pub initial_window_size: u32,
    pub max_frame_size: u32,
    pub max_header_list_size: u32,
    /// RFC 8441 extended CONNECT. No protocol default exists; false
    /// until the peer advertises it.
    pub enable_connect_protocol: bool,
}

impl Default for PeerSettings {
    fn default() -> Self {
        // protocol-mandated initial values, cf. RFC 9113, 6.5.2
        Self {
            header_table_size: Self::DEFAULT_HEADER_TABLE_SIZE,
            enable_push: Self::DEFAULT_ENABLE_PUSH,
            max_concurrent_streams: Self::DEFAULT_MAX_CONCURRENT_STREAMS,
            initial_window_size: Self::DEFAULT_INITIAL_WINDOW_SIZE,
            max_frame_size: Self::DEFAULT_MAX_FRAME_SIZE,
            max_header_list_size: Self::DEFAULT_MAX_HEADER_LIST_SIZE,
            enable_connect_protocol: false,
        }
    }
}

impl PeerSettings {
    pub const DEFAULT_HEADER_TABLE_SIZE: u32 = 4096;
    pub const DEFAULT_ENABLE_PUSH: bool = true;
    pub const DEFAULT_MAX_CONCURRENT_STREAMS: u32 = u32::MAX;
    pub const DEFAULT_INITIAL_WINDOW_SIZE: u32 = (1 << 16) - 1;
    pub const DEFAULT_MAX_FRAME_SIZE: u32 = 1 << 14;
    pub const DEFAULT_MAX_HEADER_LIST_SIZE: u32 = u32::MAX;

    pub const MAX_INITIAL_WINDOW_SIZE: u32 = (1 << 31) - 1;
    pub const ALLOWED_MAX_FRAME_SIZE: RangeInclusive<u32> = (1 << 14)..=((1 << 24) - 1);

    /// Apply a batch of received settings, in arrival order: a later
    /// record for the same parameter wins, unknown identifiers are
    /// ignored, known ones are range-checked before assignment.
    ///
    /// Returns at the first out-of-range record. Records applied earlier
    /// in the same batch stay applied; the connection is torn down on
    /// the error anyway, so the table is never read again.
    pub fn update(&mut self, settings: &[PeerSetting]) -> Result<(), SettingOutOfRangeError> {
        for setting in settings {
            self.apply(setting)?;
        }
        Ok(())
    }

    fn apply(&mut self, received: &PeerSetting) -> Result<(), SettingOutOfRangeError> {
        let setting = match received.known() {
            Some(setting) => setting,
            // receivers MUST ignore unknown identifiers
            None => return Ok(()),
        };

        match setting {
            Setting::HeaderTableSize => {
                self.header_table_size = received.value;
            }
            Setting::EnablePush => {
                self.enable_push = bool_setting(setting, received.value)?;
            }
            Setting::MaxConcurrentStreams => {
                self.max_concurrent_streams = received.value;
            }
            Setting::InitialWindowSize => {
                if received.value > Self::MAX_INITIAL_WINDOW_SIZE {
                    return Err(SettingOutOfRangeError {
                        setting,
                        value: received.value,
                        allowed: 0..=Self::MAX_INITIAL_WINDOW_SIZE,
                    });
                }
                self.initial_window_size = received.value;
            }
            Setting::MaxFrameSize => {
                if !Self::ALLOWED_MAX_FRAME_SIZE.contains(&received.value) {
                    return Err(SettingOutOfRangeError {
                        setting,
                        value: received.value,
                        allowed: Self::ALLOWED_MAX_FRAME_SIZE,
                    });
                }
                self.max_frame_size = received.value;
            }
            Setting::MaxHeaderListSize => {
                self.max_header_list_size = received.value;
            }
            Setting::EnableConnectProtocol => {
                self.enable_connect_protocol = bool_setting(setting, received.value)?;
            }
        }

        Ok(())
    }

    /// The settings whose current value differs from the protocol
    /// default, in a fixed order, for building an outbound SETTINGS
    /// payload without re-advertising what the peer already assumes.
    ///
    /// `EnableConnectProtocol = 1` is always appended: the extension has
    /// no protocol default, so support must be stated explicitly.
    pub fn non_protocol_defaults(&self) -> Vec<PeerSetting> {
        let mut settings = Vec::with_capacity(7);

        if self.header_table_size != Self::DEFAULT_HEADER_TABLE_SIZE {
            settings.push(PeerSetting::new(
                Setting::HeaderTableSize,
                self.header_table_size,
            ));
        }
        if self.enable_push != Self::DEFAULT_ENABLE_PUSH {
            settings.push(PeerSetting::new(Setting::EnablePush, self.enable_push as u32));
        }
        if self.max_concurrent_streams != Self::DEFAULT_MAX_CONCURRENT_STREAMS {
            settings.push(PeerSetting::new(
                Setting::MaxConcurrentStreams,
                self.max_concurrent_streams,
            ));
        }
        if self.initial_window_size != Self::DEFAULT_INITIAL_WINDOW_SIZE {
            settings.push(PeerSetting::new(
                Setting::InitialWindowSize,
                self.initial_window_size,
            ));
        }
        if self.max_frame_size != Self::DEFAULT_MAX_FRAME_SIZE {
            settings.push(PeerSetting::new(Setting::MaxFrameSize, self.max_frame_size));
        }
        if self.max_header_list_size != Self::DEFAULT_MAX_HEADER_LIST_SIZE {
            settings.push(PeerSetting::new(
                Setting::MaxHeaderListSize,
                self.max_header_list_size,
            ));
        }

        settings.push(PeerSetting::new(Setting::EnableConnectProtocol, 1));

        settings
    }
}

fn bool_setting(setting: Setting, value: u32) -> Result<bool, SettingOutOfRangeError> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(SettingOutOfRangeError {
            setting,
            value,
            allowed: 0..=1,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_the_protocol_defaults() {
        let settings = PeerSettings::default();
        assert_eq!(settings.header_table_size, 4096);
        assert!(settings.enable_push);
        assert_eq!(settings.max_concurrent_streams, u32::MAX);
        assert_eq!(settings.initial_window_size, 65_535);
        assert_eq!(settings.max_frame_size, 16_384);
        assert_eq!(settings.max_header_list_size, u32::MAX);
        assert!(!settings.enable_connect_protocol);
    }

    #[test]
    fn enable_push_must_be_zero_or_one() {
        let mut settings = PeerSettings::default();
        let err = settings
            .update(&[PeerSetting::new(Setting::EnablePush, 2)])
            .unwrap_err();
        assert_eq!(err.setting, Setting::EnablePush);
        assert_eq!(err.allowed, 0..=1);

        settings
            .update(&[PeerSetting::new(Setting::EnablePush, 0)])
            .unwrap();
        assert!(!settings.enable_push);
    }

    #[test]
    fn max_frame_size_range_checked() {
        let mut settings = PeerSettings::default();

        let err = settings
            .update(&[PeerSetting::new(Setting::MaxFrameSize, 100)])
            .unwrap_err();
        assert_eq!(err.setting, Setting::MaxFrameSize);
        assert_eq!(err.allowed, 16_384..=16_777_215);
        // the bad value was not applied
        assert_eq!(settings.max_frame_size, 16_384);

        settings
            .update(&[PeerSetting::new(Setting::MaxFrameSize, 20_000)])
            .unwrap();
        assert_eq!(settings.max_frame_size, 20_000);

        let err = settings
            .update(&[PeerSetting::new(Setting::MaxFrameSize, 16_777_216)])
            .unwrap_err();
        assert_eq!(err.value, 16_777_216);
    }

    #[test]
    fn initial_window_size_capped_at_u31() {
        let mut settings = PeerSettings::default();
        settings
            .update(&[PeerSetting::new(
                Setting::InitialWindowSize,
                PeerSettings::MAX_INITIAL_WINDOW_SIZE,
            )])
            .unwrap();
        assert_eq!(
            settings.initial_window_size,
            PeerSettings::MAX_INITIAL_WINDOW_SIZE
        );

        let err = settings
            .update(&[PeerSetting::new(Setting::InitialWindowSize, 1 << 31)])
            .unwrap_err();
        assert_eq!(err.setting, Setting::InitialWindowSize);
        assert_eq!(err.allowed, 0..=(1 << 31) - 1);
    }

    #[test]
    fn unknown_identifier_ignored() {
        let mut settings = PeerSettings::default();
        settings.update(&[PeerSetting { id: 999, value: 42 }]).unwrap();
        assert_eq!(settings, PeerSettings::default());
    }

    #[test]
    fn later_record_wins_within_a_batch() {
        let mut settings = PeerSettings::default();
        settings
            .update(&[
                PeerSetting::new(Setting::HeaderTableSize, 1),
                PeerSetting::new(Setting::HeaderTableSize, 2),
            ])
            .unwrap();
        assert_eq!(settings.header_table_size, 2);
    }

    #[test]
    fn batch_aborts_at_first_bad_record_keeping_earlier_ones() {
        let mut settings = PeerSettings::default();
        let err = settings
            .update(&[
                PeerSetting::new(Setting::HeaderTableSize, 8192),
                PeerSetting::new(Setting::EnablePush, 7),
                PeerSetting::new(Setting::MaxConcurrentStreams, 50),
            ])
            .unwrap_err();
        assert_eq!(err.setting, Setting::EnablePush);

        // the record before the bad one was applied, the one after wasn't
        assert_eq!(settings.header_table_size, 8192);
        assert_eq!(settings.max_concurrent_streams, u32::MAX);
    }

    #[test]
    fn fresh_table_advertises_only_connect_protocol() {
        let settings = PeerSettings::default();
        assert_eq!(
            settings.non_protocol_defaults(),
            vec![PeerSetting::new(Setting::EnableConnectProtocol, 1)]
        );
    }

    #[test]
    fn non_defaults_come_out_in_fixed_order() {
        let settings = PeerSettings {
            header_table_size: 0,
            enable_push: false,
            max_concurrent_streams: 100,
            initial_window_size: 1 << 20,
            max_frame_size: 1 << 15,
            max_header_list_size: 1 << 14,
            enable_connect_protocol: true,
        };
        let advertised = settings.non_protocol_defaults();
        assert_eq!(
            advertised,
            vec![
                PeerSetting::new(Setting::HeaderTableSize, 0),
                PeerSetting::new(Setting::EnablePush, 0),
                PeerSetting::new(Setting::MaxConcurrentStreams, 100),
                PeerSetting::new(Setting::InitialWindowSize, 1 << 20),
                PeerSetting::new(Setting::MaxFrameSize, 1 << 15),
                PeerSetting::new(Setting::MaxHeaderListSize, 1 << 14),
                PeerSetting::new(Setting::EnableConnectProtocol, 1),
            ]
        );
    }

    #[test]
    fn payload_codec_round_trip() {
        let records = [
            PeerSetting::new(Setting::MaxFrameSize, 20_000),
            PeerSetting { id: 0xf00d, value: 7 },
            PeerSetting::new(Setting::EnablePush, 0),
        ];
        let mut payload = Vec::new();
        for record in &records {
            record.write_into(&mut payload).unwrap();
        }
        assert_eq!(payload.len(), 18);
        assert_eq!(&payload[..6], &[0x00, 0x05, 0x00, 0x00, 0x4e, 0x20]);

        assert_eq!(PeerSetting::decode_payload(&payload), records.to_vec());
    }

    #[test]
    fn connect_protocol_validated_like_a_bool() {
        let mut settings = PeerSettings::default();
        settings
            .update(&[PeerSetting::new(Setting::EnableConnectProtocol, 1)])
            .unwrap();
        assert!(settings.enable_connect_protocol);

        let err = settings
            .update(&[PeerSetting::new(Setting::EnableConnectProtocol, 3)])
            .unwrap_err();
        assert_eq!(err.allowed, 0..=1);
    }
}
