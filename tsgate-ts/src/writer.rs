//! Single-program transport stream writer.
//!
//! Accepts elementary stream declarations and PES units and serializes a
//! syntactically valid TS byte stream into an internal buffer. The caller
//! drains finished output with [`TsWriter::take`]; one drain per segment.

use crate::error::{Result, TsError};
use crate::packet::{
    AdaptationField, AdaptationFieldControl, Pcr, TsHeader, PID_PAT, TS_PACKET_SIZE,
};
use crate::pes::PesHeaderSpec;
use crate::psi::{Pat, Pmt, PmtStream};
use crate::reader::PesUnit;

use bytes::Bytes;
use std::collections::HashMap;

/// Elementary stream declaration.
#[derive(Debug, Clone)]
pub struct EsDecl {
    pub pid: u16,
    pub stream_type: u8,
    /// ES info descriptors copied into the PMT verbatim.
    pub descriptors: Vec<u8>,
}

impl EsDecl {
    pub fn new(pid: u16, stream_type: u8) -> Self {
        Self {
            pid,
            stream_type,
            descriptors: Vec::new(),
        }
    }

    pub fn with_descriptors(pid: u16, stream_type: u8, descriptors: Vec<u8>) -> Self {
        Self {
            pid,
            stream_type,
            descriptors,
        }
    }
}

/// Buffer-backed single-program TS muxer.
pub struct TsWriter {
    buf: Vec<u8>,
    streams: Vec<EsDecl>,
    pcr_pid: Option<u16>,
    continuity: HashMap<u16, u8>,
    pat_cc: u8,
    pmt_cc: u8,
    transport_stream_id: u16,
    program_number: u16,
    pmt_pid: u16,
}

impl TsWriter {
    /// PMT PID for the generated program. High enough to stay clear of the
    /// elementary PIDs commonly used by encoders (0x100..).
    pub const PMT_PID: u16 = 0x1000;

    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(64 * 1024),
            streams: Vec::new(),
            pcr_pid: None,
            continuity: HashMap::new(),
            pat_cc: 0,
            pmt_cc: 0,
            transport_stream_id: 1,
            program_number: 1,
            pmt_pid: Self::PMT_PID,
        }
    }

    /// Declare an elementary stream. Re-declaring a PID replaces the entry.
    pub fn add_stream(&mut self, decl: EsDecl) {
        if let Some(existing) = self.streams.iter_mut().find(|s| s.pid == decl.pid) {
            *existing = decl;
        } else {
            self.streams.push(decl);
        }
    }

    /// Nominate the PID that carries the program clock reference.
    pub fn set_pcr_pid(&mut self, pid: u16) {
        self.pcr_pid = Some(pid);
    }

    pub fn pcr_pid(&self) -> Option<u16> {
        self.pcr_pid
    }

    pub fn has_stream(&self, pid: u16) -> bool {
        self.streams.iter().any(|s| s.pid == pid)
    }

    /// Write the PAT and PMT for the declared program.
    pub fn write_tables(&mut self) -> Result<()> {
        let mut pat = Pat::new(self.transport_stream_id);
        pat.add_program(self.program_number, self.pmt_pid);

        let mut pmt = Pmt::new(
            self.program_number,
            self.pcr_pid.unwrap_or(crate::packet::PID_NULL),
        );
        for decl in &self.streams {
            pmt.streams.push(PmtStream {
                stream_type: decl.stream_type,
                pid: decl.pid,
                descriptors: decl.descriptors.clone(),
            });
        }

        let pat_section = pat.serialize();
        let pmt_section = pmt.serialize();

        let mut pat_cc = self.pat_cc;
        self.write_section(PID_PAT, &pat_section, &mut pat_cc);
        self.pat_cc = pat_cc;

        let mut pmt_cc = self.pmt_cc;
        self.write_section(self.pmt_pid, &pmt_section, &mut pmt_cc);
        self.pmt_cc = pmt_cc;

        Ok(())
    }

    /// Write one PES unit on `pid`, packetized into TS packets.
    ///
    /// The first packet carries PUSI and, on the PCR PID, a PCR derived from
    /// the unit's DTS (PTS when no DTS is present).
    pub fn write_pes(&mut self, pid: u16, unit: &PesUnit) -> Result<()> {
        if !self.has_stream(pid) {
            return Err(TsError::UndeclaredPid(pid));
        }

        let mut spec = PesHeaderSpec::new(unit.stream_id);
        spec.pts = unit.pts;
        spec.dts = unit.dts;
        let mut pes_data = spec.serialize(unit.payload.len());
        pes_data.extend_from_slice(&unit.payload);

        let pcr = if Some(pid) == self.pcr_pid {
            unit.dts.or(unit.pts).map(|ts| Pcr::from_90khz(ts.value))
        } else {
            None
        };

        let mut remaining = pes_data.as_slice();
        let mut first = true;

        while !remaining.is_empty() {
            let mut packet = [0xFFu8; TS_PACKET_SIZE];

            let mut adaptation = if first {
                pcr.map(AdaptationField::with_pcr)
            } else {
                None
            };

            let af_size = adaptation.as_ref().map_or(0, AdaptationField::total_size);
            let available = TS_PACKET_SIZE - TsHeader::SIZE - af_size;

            // short tail: absorb the slack into the adaptation field
            if remaining.len() < available {
                let pad = available - remaining.len();
                match adaptation {
                    Some(ref mut af) => af.pad_to(af.total_size() + pad),
                    None => adaptation = Some(AdaptationField::stuffing(pad)),
                }
            }

            let af_size = adaptation.as_ref().map_or(0, AdaptationField::total_size);
            let payload_len = remaining.len().min(TS_PACKET_SIZE - TsHeader::SIZE - af_size);

            let cc = self.next_cc(pid);
            let mut header = TsHeader::new(pid);
            header.payload_unit_start = first;
            header.continuity_counter = cc;
            header.adaptation_field_control = if adaptation.is_some() {
                AdaptationFieldControl::AdaptationFieldAndPayload
            } else {
                AdaptationFieldControl::PayloadOnly
            };
            header.write(&mut packet[..TsHeader::SIZE]);

            let mut offset = TsHeader::SIZE;
            if let Some(ref af) = adaptation {
                offset += af.write(&mut packet[offset..])?;
            }

            packet[offset..offset + payload_len].copy_from_slice(&remaining[..payload_len]);
            remaining = &remaining[payload_len..];

            self.buf.extend_from_slice(&packet);
            first = false;
        }

        Ok(())
    }

    /// Take and clear the accumulated output.
    pub fn take(&mut self) -> Bytes {
        Bytes::from(std::mem::take(&mut self.buf))
    }

    /// Bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Packetize a PSI section with a leading pointer field.
    fn write_section(&mut self, pid: u16, section: &[u8], cc: &mut u8) {
        let mut remaining = section;
        let mut first = true;

        while !remaining.is_empty() {
            let mut packet = [0xFFu8; TS_PACKET_SIZE];

            let mut header = TsHeader::new(pid);
            header.payload_unit_start = first;
            header.continuity_counter = *cc;
            header.write(&mut packet[..TsHeader::SIZE]);
            *cc = (*cc + 1) & 0x0F;

            let mut offset = TsHeader::SIZE;
            if first {
                packet[offset] = 0; // pointer field
                offset += 1;
            }

            let take = remaining.len().min(TS_PACKET_SIZE - offset);
            packet[offset..offset + take].copy_from_slice(&remaining[..take]);
            remaining = &remaining[take..];

            self.buf.extend_from_slice(&packet);
            first = false;
        }
    }

    fn next_cc(&mut self, pid: u16) -> u8 {
        let cc = self.continuity.entry(pid).or_insert(0);
        let current = *cc;
        *cc = (*cc + 1) & 0x0F;
        current
    }
}

impl Default for TsWriter {
    fn default() -> Self {
        Self::new()
    }
}
