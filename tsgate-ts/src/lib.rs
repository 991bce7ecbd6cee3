//! # tsgate-ts
//!
//! MPEG transport stream support for the tsgate gateway.
//!
//! The crate covers the two directions the gateway needs:
//!
//! - [`TsReader`]: a streaming demultiplexer over any [`std::io::Read`] that
//!   yields typed units (PAT, PMT, reassembled PES packets). Forward-only,
//!   no seeking; built for live input where end of stream is an error.
//! - [`TsWriter`]: a single-program muxer that accumulates a valid TS byte
//!   stream in memory. Declare elementary streams, nominate a PCR PID, write
//!   the tables, write PES units, then [`TsWriter::take`] the finished blob.
//!
//! ```no_run
//! use tsgate_ts::{TsReader, TsUnit};
//! use std::net::TcpStream;
//!
//! let source = TcpStream::connect("example.org:9000").unwrap();
//! let mut reader = TsReader::new(source);
//! loop {
//!     match reader.next_unit().unwrap() {
//!         TsUnit::Pat(pat) => println!("programs: {}", pat.programs.len()),
//!         TsUnit::Pmt { pid, table } => println!("PMT on {}: {} streams", pid, table.streams.len()),
//!         TsUnit::Pes(pes) => println!("PES on {}: {} bytes", pes.pid, pes.payload.len()),
//!     }
//! }
//! ```

pub mod error;
pub mod packet;
pub mod pes;
pub mod psi;
pub mod reader;
pub mod writer;

pub use error::{Result, TsError};
pub use packet::{
    AdaptationField, AdaptationFieldControl, Pcr, TsHeader, TsPacket, PID_MAX, PID_NULL, PID_PAT,
    SYNC_BYTE, TS_PACKET_SIZE,
};
pub use pes::{PesAssembler, PesHeader, PesHeaderSpec, PesTimestamp, StreamId};
pub use psi::{Pat, PatProgram, Pmt, PmtStream, SectionAssembler, StreamType};
pub use reader::{PesUnit, TsReader, TsUnit};
pub use writer::{EsDecl, TsWriter};
