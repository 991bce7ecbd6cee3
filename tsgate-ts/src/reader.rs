//! Streaming transport stream reader.
//!
//! Consumes a forward-only byte stream and yields typed units: PAT tables,
//! PMT tables, and reassembled PES packets tagged with their elementary PID.
//! There is no seeking and no probing; live input never ends on purpose, so
//! end of stream surfaces as an error to the caller.

use crate::error::{Result, TsError};
use crate::packet::{TsPacket, PID_NULL, PID_PAT, SYNC_BYTE, TS_PACKET_SIZE};
use crate::pes::{PesAssembler, PesHeader, PesTimestamp, PES_START_CODE_PREFIX};
use crate::psi::{Pat, Pmt, SectionAssembler};

use std::collections::HashMap;
use std::io::Read;

/// A reassembled PES packet with its elementary stream payload.
#[derive(Debug, Clone)]
pub struct PesUnit {
    /// PID the packet arrived on.
    pub pid: u16,
    /// PES stream id (0xC0.. audio, 0xE0.. video).
    pub stream_id: u8,
    pub pts: Option<PesTimestamp>,
    pub dts: Option<PesTimestamp>,
    /// Elementary stream bytes, PES header stripped.
    pub payload: Vec<u8>,
}

/// One demultiplexed unit of the transport stream.
#[derive(Debug)]
pub enum TsUnit {
    Pat(Pat),
    Pmt {
        /// Program map PID the table arrived on.
        pid: u16,
        table: Pmt,
    },
    Pes(PesUnit),
}

/// Streaming TS demultiplexer over any byte source.
pub struct TsReader<R: Read> {
    input: R,
    buffer: [u8; TS_PACKET_SIZE],
    pat_assembler: SectionAssembler,
    pmt_assemblers: HashMap<u16, SectionAssembler>,
    pes_assemblers: HashMap<u16, PesAssembler>,
}

impl<R: Read> TsReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            buffer: [0u8; TS_PACKET_SIZE],
            pat_assembler: SectionAssembler::new(),
            pmt_assemblers: HashMap::new(),
            pes_assemblers: HashMap::new(),
        }
    }

    /// Pull the next unit from the stream.
    ///
    /// Packets that complete nothing (null PID, partial sections, PES
    /// continuations) are consumed silently. Returns
    /// [`TsError::EndOfStream`] when the source is exhausted.
    pub fn next_unit(&mut self) -> Result<TsUnit> {
        loop {
            let packet = self.read_packet()?;

            let pid = packet.pid();
            if pid == PID_NULL || !packet.has_payload() {
                continue;
            }

            let payload = match packet.payload() {
                Some(p) => p,
                None => continue,
            };
            let pusi = packet.payload_unit_start();
            let cc = packet.continuity_counter();

            if pid == PID_PAT {
                if let Some(section) = self.pat_assembler.push(payload, pusi, cc) {
                    let pat = Pat::parse(&section)?;
                    for program in &pat.programs {
                        if program.program_number != 0 {
                            self.pmt_assemblers
                                .entry(program.pmt_pid)
                                .or_default();
                        }
                    }
                    return Ok(TsUnit::Pat(pat));
                }
                continue;
            }

            if let Some(assembler) = self.pmt_assemblers.get_mut(&pid) {
                if let Some(section) = assembler.push(payload, pusi, cc) {
                    let table = Pmt::parse(&section)?;
                    return Ok(TsUnit::Pmt { pid, table });
                }
                continue;
            }

            // Everything else is treated as a PES PID once a payload unit
            // starting with the PES prefix shows up; other private sections
            // (SDT, EIT, ...) fail that check and are ignored.
            if pusi && !payload.starts_with(&PES_START_CODE_PREFIX) {
                if let Some(assembler) = self.pes_assemblers.get_mut(&pid) {
                    assembler.reset();
                }
                continue;
            }

            let assembler = self
                .pes_assemblers
                .entry(pid)
                .or_insert_with(|| PesAssembler::new(pid));

            if let Some(data) = assembler.push(payload, pusi) {
                let header = PesHeader::parse(&data)?;
                return Ok(TsUnit::Pes(PesUnit {
                    pid,
                    stream_id: header.stream_id,
                    pts: header.pts,
                    dts: header.dts,
                    payload: data[header.header_size..].to_vec(),
                }));
            }
        }
    }

    /// Read one 188-byte packet, resynchronizing on a lost sync byte.
    fn read_packet(&mut self) -> Result<TsPacket> {
        loop {
            match self.input.read_exact(&mut self.buffer) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Err(TsError::EndOfStream)
                }
                Err(e) => return Err(TsError::Io(e)),
            }

            if self.buffer[0] == SYNC_BYTE {
                return TsPacket::from_slice(&self.buffer);
            }

            // scan for the next sync byte and refill the tail
            if let Some(pos) = self.buffer.iter().position(|&b| b == SYNC_BYTE) {
                self.buffer.copy_within(pos.., 0);
                let tail = TS_PACKET_SIZE - pos;
                match self.input.read_exact(&mut self.buffer[tail..]) {
                    Ok(()) => return TsPacket::from_slice(&self.buffer),
                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                        return Err(TsError::EndOfStream)
                    }
                    Err(e) => return Err(TsError::Io(e)),
                }
            }
        }
    }

    /// Consume the reader, returning the underlying source.
    pub fn into_inner(self) -> R {
        self.input
    }
}
