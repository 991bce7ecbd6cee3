//! Packetized elementary stream packets.
//!
//! PES packets carry one coded media unit each. The reader side reassembles
//! them from TS packet payloads; the writer side serializes headers for
//! re-packetization.

use crate::error::{Result, TsError};

/// PES start code prefix.
pub const PES_START_CODE_PREFIX: [u8; 3] = [0x00, 0x00, 0x01];

/// Stream-id helpers.
pub struct StreamId;

impl StreamId {
    /// Audio stream base ID (0xC0 - 0xDF).
    pub const AUDIO_BASE: u8 = 0xC0;
    /// Video stream base ID (0xE0 - 0xEF).
    pub const VIDEO_BASE: u8 = 0xE0;

    pub fn is_audio(id: u8) -> bool {
        (0xC0..=0xDF).contains(&id)
    }

    pub fn is_video(id: u8) -> bool {
        (0xE0..=0xEF).contains(&id)
    }

    /// Whether this stream id carries the optional header with PTS/DTS.
    pub fn has_optional_header(id: u8) -> bool {
        !matches!(id, 0xBC | 0xBE | 0xBF | 0xF0 | 0xF1 | 0xF2 | 0xF8 | 0xFF)
    }
}

/// A 33-bit PTS or DTS on the 90 kHz clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PesTimestamp {
    /// Timestamp value, masked to 33 bits.
    pub value: u64,
}

impl PesTimestamp {
    /// Maximum value for a 33-bit timestamp.
    pub const MAX_VALUE: u64 = (1u64 << 33) - 1;

    /// Clock rate (90 kHz).
    pub const CLOCK_RATE: u64 = 90_000;

    pub fn new(value: u64) -> Self {
        Self {
            value: value & Self::MAX_VALUE,
        }
    }

    pub fn from_seconds(seconds: f64) -> Self {
        Self::new((seconds * Self::CLOCK_RATE as f64) as u64)
    }

    pub fn to_seconds(&self) -> f64 {
        self.value as f64 / Self::CLOCK_RATE as f64
    }

    /// Signed distance from `earlier` to `self` on the 33-bit circle.
    ///
    /// The 33-bit clock rolls over every ~26.5 hours; a plain `>` comparison
    /// across the rollover would hold the result hostage for another full
    /// cycle. Differences are therefore reduced modulo 2^33 and interpreted
    /// as signed, so `a.wrapping_delta(b) > 0` means "a is later than b" for
    /// any two timestamps less than ~13 hours apart.
    pub fn wrapping_delta(&self, earlier: PesTimestamp) -> i64 {
        const WRAP: u64 = 1 << 33;
        let diff = self.value.wrapping_sub(earlier.value) & (WRAP - 1);
        if diff >= WRAP / 2 {
            diff as i64 - WRAP as i64
        } else {
            diff as i64
        }
    }

    /// Parse a 5-byte PTS/DTS field.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 5 {
            return Err(TsError::invalid_pes("timestamp requires 5 bytes"));
        }

        // 4-bit prefix, then ts[32:30], marker, ts[29:15], marker,
        // ts[14:0], marker.
        let value = ((data[0] as u64 & 0x0E) << 29)
            | ((data[1] as u64) << 22)
            | ((data[2] as u64 & 0xFE) << 14)
            | ((data[3] as u64) << 7)
            | ((data[4] as u64) >> 1);

        Ok(Self::new(value))
    }

    /// Write a 5-byte PTS/DTS field.
    ///
    /// `prefix` is 0x20 for a lone PTS, 0x30 for a PTS followed by a DTS,
    /// 0x10 for the DTS itself.
    pub fn write(&self, data: &mut [u8], prefix: u8) {
        data[0] = prefix | ((((self.value >> 30) as u8) & 0x07) << 1) | 0x01;
        data[1] = ((self.value >> 22) & 0xFF) as u8;
        data[2] = (((self.value >> 15) & 0x7F) << 1) as u8 | 0x01;
        data[3] = ((self.value >> 7) & 0xFF) as u8;
        data[4] = ((self.value & 0x7F) << 1) as u8 | 0x01;
    }
}

/// Parsed PES packet header.
#[derive(Debug, Clone)]
pub struct PesHeader {
    pub stream_id: u8,
    /// PES packet length field (0 for unbounded video).
    pub packet_length: u16,
    pub data_alignment: bool,
    pub pts: Option<PesTimestamp>,
    pub dts: Option<PesTimestamp>,
    /// Total header size including the start code.
    pub header_size: usize,
}

impl PesHeader {
    /// Minimum header size: start code + stream id + length.
    pub const MIN_SIZE: usize = 6;

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE {
            return Err(TsError::invalid_pes("data too short for PES header"));
        }
        if data[0..3] != PES_START_CODE_PREFIX {
            return Err(TsError::invalid_pes("invalid PES start code prefix"));
        }

        let stream_id = data[3];
        let packet_length = ((data[4] as u16) << 8) | (data[5] as u16);

        if !StreamId::has_optional_header(stream_id) {
            return Ok(Self {
                stream_id,
                packet_length,
                data_alignment: false,
                pts: None,
                dts: None,
                header_size: 6,
            });
        }

        if data.len() < 9 {
            return Err(TsError::invalid_pes("data too short for optional header"));
        }
        if (data[6] & 0xC0) != 0x80 {
            return Err(TsError::invalid_pes("invalid optional header marker bits"));
        }

        let data_alignment = (data[6] & 0x04) != 0;
        let pts_dts_flags = (data[7] >> 6) & 0x03;
        let header_data_length = data[8] as usize;
        let header_size = 9 + header_data_length;

        if data.len() < header_size {
            return Err(TsError::invalid_pes(
                "header data length exceeds available data",
            ));
        }

        let mut pts = None;
        let mut dts = None;
        if pts_dts_flags & 0x02 != 0 {
            if header_data_length < 5 {
                return Err(TsError::invalid_pes("truncated PTS"));
            }
            pts = Some(PesTimestamp::parse(&data[9..14])?);

            if pts_dts_flags == 0x03 {
                if header_data_length < 10 {
                    return Err(TsError::invalid_pes("truncated DTS"));
                }
                dts = Some(PesTimestamp::parse(&data[14..19])?);
            }
        }

        Ok(Self {
            stream_id,
            packet_length,
            data_alignment,
            pts,
            dts,
            header_size,
        })
    }
}

/// Header fields for serializing a PES packet.
#[derive(Debug, Clone)]
pub struct PesHeaderSpec {
    pub stream_id: u8,
    pub pts: Option<PesTimestamp>,
    pub dts: Option<PesTimestamp>,
    pub data_alignment: bool,
}

impl PesHeaderSpec {
    pub fn new(stream_id: u8) -> Self {
        Self {
            stream_id,
            pts: None,
            dts: None,
            data_alignment: true,
        }
    }

    pub fn pts(mut self, pts: PesTimestamp) -> Self {
        self.pts = Some(pts);
        self
    }

    pub fn dts(mut self, dts: PesTimestamp) -> Self {
        self.dts = Some(dts);
        self
    }

    /// Serialize the header for a packet with `payload_length` bytes of
    /// elementary stream data.
    ///
    /// Video stream ids get an unbounded (zero) packet length, as do payloads
    /// too large for the 16-bit length field.
    pub fn serialize(&self, payload_length: usize) -> Vec<u8> {
        let header_data_length: usize = match (self.pts.is_some(), self.dts.is_some()) {
            (true, true) => 10,
            (true, false) => 5,
            _ => 0,
        };

        let tail_length = 3 + header_data_length + payload_length;
        let packet_length = if StreamId::is_video(self.stream_id) || tail_length > 0xFFFF {
            0
        } else {
            tail_length as u16
        };

        let mut header = Vec::with_capacity(9 + header_data_length);
        header.extend_from_slice(&PES_START_CODE_PREFIX);
        header.push(self.stream_id);
        header.push((packet_length >> 8) as u8);
        header.push((packet_length & 0xFF) as u8);

        // '10' marker, alignment, original-or-copy
        header.push(0x80 | ((self.data_alignment as u8) << 2) | 0x01);

        let pts_dts_flags: u8 = match (self.pts.is_some(), self.dts.is_some()) {
            (true, true) => 0x03,
            (true, false) => 0x02,
            _ => 0x00,
        };
        header.push(pts_dts_flags << 6);
        header.push(header_data_length as u8);

        if let Some(pts) = self.pts {
            let mut field = [0u8; 5];
            let prefix = if self.dts.is_some() { 0x30 } else { 0x20 };
            pts.write(&mut field, prefix);
            header.extend_from_slice(&field);
        }
        if let Some(dts) = self.dts {
            let mut field = [0u8; 5];
            dts.write(&mut field, 0x10);
            header.extend_from_slice(&field);
        }

        header
    }
}

/// Reassembles PES packets from TS packet payloads on one PID.
#[derive(Debug)]
pub struct PesAssembler {
    pid: u16,
    buffer: Vec<u8>,
    started: bool,
    header: Option<PesHeader>,
}

impl PesAssembler {
    pub fn new(pid: u16) -> Self {
        Self {
            pid,
            buffer: Vec::with_capacity(65536),
            started: false,
            header: None,
        }
    }

    pub fn pid(&self) -> u16 {
        self.pid
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.started = false;
        self.header = None;
    }

    /// Feed one TS packet payload.
    ///
    /// A packet with PUSI set finishes the in-flight PES packet (returned, if
    /// any) and starts the next one. Bounded packets complete as soon as
    /// `packet_length` bytes have arrived; unbounded video completes at the
    /// next PUSI.
    pub fn push(&mut self, payload: &[u8], pusi: bool) -> Option<Vec<u8>> {
        if pusi {
            let previous = if self.started && !self.buffer.is_empty() {
                Some(std::mem::take(&mut self.buffer))
            } else {
                None
            };

            self.buffer.clear();
            self.started = true;
            self.header = None;
            self.buffer.extend_from_slice(payload);

            if self.buffer.len() >= PesHeader::MIN_SIZE {
                self.header = PesHeader::parse(&self.buffer).ok();
            }

            return previous;
        }

        if self.started {
            self.buffer.extend_from_slice(payload);
            if self.header.is_none() && self.buffer.len() >= PesHeader::MIN_SIZE {
                self.header = PesHeader::parse(&self.buffer).ok();
            }
        }

        if let Some(ref header) = self.header {
            if header.packet_length > 0 {
                let expected = 6 + header.packet_length as usize;
                if self.buffer.len() >= expected {
                    let data: Vec<u8> = self.buffer.drain(..expected).collect();
                    if self.buffer.is_empty() {
                        self.started = false;
                    }
                    self.header = None;
                    return Some(data);
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_round_trip() {
        let ts = PesTimestamp::new(12_345_678);

        let mut data = [0u8; 5];
        ts.write(&mut data, 0x20);

        assert_eq!(PesTimestamp::parse(&data).unwrap(), ts);
    }

    #[test]
    fn test_timestamp_seconds() {
        let ts = PesTimestamp::from_seconds(1.0);
        assert_eq!(ts.value, 90_000);
        assert!((ts.to_seconds() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_wrapping_delta() {
        let a = PesTimestamp::new(100_000);
        let b = PesTimestamp::new(10_000);
        assert_eq!(a.wrapping_delta(b), 90_000);
        assert_eq!(b.wrapping_delta(a), -90_000);

        // across the 33-bit rollover
        let before = PesTimestamp::new(PesTimestamp::MAX_VALUE - 4_500);
        let after = PesTimestamp::new(4_500);
        assert_eq!(after.wrapping_delta(before), 9_001);
        assert_eq!(before.wrapping_delta(after), -9_001);
    }

    #[test]
    fn test_header_round_trip_audio() {
        let spec = PesHeaderSpec::new(StreamId::AUDIO_BASE).pts(PesTimestamp::new(45_000));
        let header = spec.serialize(500);

        let parsed = PesHeader::parse(&header).unwrap();
        assert_eq!(parsed.stream_id, StreamId::AUDIO_BASE);
        assert_eq!(parsed.pts.unwrap().value, 45_000);
        assert!(parsed.dts.is_none());
        assert_eq!(parsed.packet_length, 3 + 5 + 500);
    }

    #[test]
    fn test_header_round_trip_video() {
        let spec = PesHeaderSpec::new(StreamId::VIDEO_BASE)
            .pts(PesTimestamp::new(90_000))
            .dts(PesTimestamp::new(87_000));
        let header = spec.serialize(100_000);

        let parsed = PesHeader::parse(&header).unwrap();
        assert_eq!(parsed.pts.unwrap().value, 90_000);
        assert_eq!(parsed.dts.unwrap().value, 87_000);
        // video is unbounded
        assert_eq!(parsed.packet_length, 0);
    }

    #[test]
    fn test_assembler_bounded() {
        let mut assembler = PesAssembler::new(257);

        let spec = PesHeaderSpec::new(StreamId::AUDIO_BASE).pts(PesTimestamp::new(1000));
        let mut pes = spec.serialize(32);
        pes.extend_from_slice(&[0xAB; 32]);

        let mid = pes.len() / 2;
        assert!(assembler.push(&pes[..mid], true).is_none());
        let done = assembler.push(&pes[mid..], false).unwrap();
        assert_eq!(done, pes);
    }

    #[test]
    fn test_assembler_unbounded_completes_at_next_pusi() {
        let mut assembler = PesAssembler::new(256);

        let spec = PesHeaderSpec::new(StreamId::VIDEO_BASE).pts(PesTimestamp::new(1000));
        let mut pes = spec.serialize(64);
        pes.extend_from_slice(&[0xCD; 64]);

        assert!(assembler.push(&pes, true).is_none());
        let done = assembler.push(&pes[..10], true).unwrap();
        assert_eq!(done, pes);
    }

    #[test]
    fn test_stream_id_ranges() {
        assert!(StreamId::is_video(0xE0));
        assert!(StreamId::is_video(0xEF));
        assert!(!StreamId::is_video(0xC0));
        assert!(StreamId::is_audio(0xC0));
        assert!(StreamId::is_audio(0xDF));
        assert!(!StreamId::has_optional_header(0xBE));
    }
}
