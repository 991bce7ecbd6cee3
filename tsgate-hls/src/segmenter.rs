//! Segment builder.
//!
//! Drives the TS reader, the writer, and (when engaged) the audio rewriter
//! to produce exactly one segment per call, cut on an interval in PTS time
//! and aligned on program boundaries.

use crate::error::{HlsError, Result};
use crate::rewrite::AudioRewriter;

use tsgate_ts::psi::StreamType;
use tsgate_ts::reader::{TsReader, TsUnit};
use tsgate_ts::writer::{EsDecl, TsWriter};
use tsgate_ts::{PatProgram, PesTimestamp};

use bytes::Bytes;
use std::io::Read;
use std::time::Duration;
use tracing::info;

/// Builder phases. `WaitPat` and `WaitPmt` run once per session; after the
/// first segment every call re-enters at `ReadPes` with the established
/// program, declarations, and PCR PID intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WaitPat,
    WaitPmt,
    ReadPes,
    Complete,
}

/// One-segment-at-a-time transmuxer over an upstream byte source.
pub struct Segmenter<R: Read> {
    reader: TsReader<R>,
    writer: TsWriter,
    state: State,
    program: Option<PatProgram>,
    rewriter: Option<AudioRewriter>,
    /// Segment length in 90 kHz ticks.
    interval: i64,
}

impl<R: Read> Segmenter<R> {
    pub fn new(input: R, interval: Duration) -> Self {
        Self {
            reader: TsReader::new(input),
            writer: TsWriter::new(),
            state: State::WaitPat,
            program: None,
            rewriter: None,
            interval: (interval.as_secs_f64() * PesTimestamp::CLOCK_RATE as f64) as i64,
        }
    }

    /// Accumulate and return the next segment.
    ///
    /// The first call walks the machine through PAT and PMT discovery; every
    /// call ends once an incoming PES timestamp passes the segment interval.
    /// Any error is fatal to the session.
    pub fn next_segment(&mut self) -> Result<Bytes> {
        loop {
            match self.state {
                State::WaitPat => self.wait_pat()?,
                State::WaitPmt => self.wait_pmt()?,
                State::ReadPes => self.read_pes()?,
                State::Complete => break,
            }
        }

        self.state = State::ReadPes;
        Ok(self.writer.take())
    }

    /// Pull units until a PAT with at least one program arrives.
    fn wait_pat(&mut self) -> Result<()> {
        loop {
            if let TsUnit::Pat(pat) = self.reader.next_unit()? {
                if let Some(program) = pat.first_program() {
                    self.program = Some(program);
                    self.state = State::WaitPmt;
                    return Ok(());
                }
            }
        }
    }

    /// Pull units until the PMT of the chosen program arrives, then declare
    /// its elementary streams to the writer.
    ///
    /// MPEG-1 audio engages the rewriter, which substitutes an ADTS AAC
    /// declaration on the same PID. The PCR PID goes to the first video
    /// stream, or to the sole elementary stream of an audio-only program.
    fn wait_pmt(&mut self) -> Result<()> {
        let map_pid = self.program.map(|p| p.pmt_pid).unwrap_or_default();

        loop {
            let (pid, table) = match self.reader.next_unit()? {
                TsUnit::Pmt { pid, table } => (pid, table),
                _ => continue,
            };
            if pid != map_pid {
                continue;
            }

            for es in &table.streams {
                info!(
                    pid = es.pid,
                    stream_type = StreamType::name(es.stream_type),
                    "stream detected"
                );

                if es.stream_type == StreamType::Mpeg1Audio as u8 {
                    let rewriter = AudioRewriter::new(es.pid)?;
                    self.writer.add_stream(rewriter.declaration());
                    self.rewriter = Some(rewriter);
                } else {
                    self.writer.add_stream(EsDecl::with_descriptors(
                        es.pid,
                        es.stream_type,
                        es.descriptors.clone(),
                    ));
                }

                if es.is_video() && self.writer.pcr_pid().is_none() {
                    self.writer.set_pcr_pid(es.pid);
                }
            }

            if self.writer.pcr_pid().is_none() {
                if let Some(first) = table.streams.first() {
                    self.writer.set_pcr_pid(first.pid);
                }
            }

            self.state = State::ReadPes;
            return Ok(());
        }
    }

    /// Route PES packets until one segment's worth of PTS time has passed.
    fn read_pes(&mut self) -> Result<()> {
        let mut start: Option<PesTimestamp> = None;

        loop {
            let unit = match self.reader.next_unit()? {
                TsUnit::Pes(unit) => unit,
                // repeated tables mid-stream carry nothing new
                _ => continue,
            };
            if !self.writer.has_stream(unit.pid) {
                continue;
            }

            let pts = unit.pts.ok_or(HlsError::MissingPts(unit.pid))?;

            let start_pts = match start {
                Some(start_pts) => start_pts,
                None => {
                    // first PES of the segment: tables lead the data
                    self.writer.write_tables()?;
                    start = Some(pts);
                    pts
                }
            };

            match self.rewriter {
                Some(ref mut rewriter) if rewriter.pid() == unit.pid => {
                    rewriter.handle_pes(&unit, &mut self.writer)?;
                }
                _ => self.writer.write_pes(unit.pid, &unit)?,
            }

            if pts.wrapping_delta(start_pts) > self.interval {
                if let Some(ref mut rewriter) = self.rewriter {
                    rewriter.flush(&mut self.writer)?;
                }
                self.state = State::Complete;
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tsgate_ts::reader::PesUnit;
    use tsgate_ts::{Pmt, StreamId, TsError};

    /// Synthesize an upstream TS: video on PID 256 at 30 fps, optionally
    /// MPEG-1 audio on PID 257, spanning `units` video frames.
    fn upstream(units: u64, with_mpeg1_audio: bool) -> Vec<u8> {
        let mut writer = TsWriter::new();
        writer.add_stream(EsDecl::new(256, StreamType::H264 as u8));
        if with_mpeg1_audio {
            writer.add_stream(EsDecl::new(257, StreamType::Mpeg1Audio as u8));
        }
        writer.set_pcr_pid(256);
        writer.write_tables().unwrap();

        for i in 0..units {
            writer
                .write_pes(
                    256,
                    &PesUnit {
                        pid: 256,
                        stream_id: StreamId::VIDEO_BASE,
                        pts: Some(PesTimestamp::new(i * 3_000)),
                        dts: None,
                        payload: vec![i as u8; 600],
                    },
                )
                .unwrap();

            if with_mpeg1_audio {
                writer
                    .write_pes(
                        257,
                        &PesUnit {
                            pid: 257,
                            stream_id: StreamId::AUDIO_BASE,
                            pts: Some(PesTimestamp::new(i * 3_000)),
                            dts: None,
                            // inert payload: no audio sync word anywhere
                            payload: vec![0u8; 256],
                        },
                    )
                    .unwrap();
            }
        }

        writer.take().to_vec()
    }

    /// Collect the PES PTS values and the PMT from a finished segment.
    fn inspect(segment: &[u8]) -> (Pmt, Vec<(u16, u64)>) {
        let mut reader = TsReader::new(Cursor::new(segment.to_vec()));
        let mut pmt = None;
        let mut pes = Vec::new();
        loop {
            match reader.next_unit() {
                Ok(TsUnit::Pmt { table, .. }) => pmt = Some(table),
                Ok(TsUnit::Pes(unit)) => pes.push((unit.pid, unit.pts.unwrap().value)),
                Ok(TsUnit::Pat(_)) => {}
                Err(TsError::EndOfStream) => break,
                Err(e) => panic!("segment failed to parse: {e}"),
            }
        }
        (pmt.expect("segment has a PMT"), pes)
    }

    #[test]
    fn test_video_only_segment_spans_interval() {
        let data = upstream(120, false);
        let mut segmenter = Segmenter::new(Cursor::new(data), Duration::from_secs(1));

        let segment = segmenter.next_segment().unwrap();
        assert!(!segment.is_empty());
        assert_eq!(segment.len() % tsgate_ts::TS_PACKET_SIZE, 0);

        let (pmt, pes) = inspect(&segment);
        assert_eq!(pmt.pcr_pid, 256);
        assert_eq!(pmt.streams.len(), 1);
        assert_eq!(pmt.streams[0].stream_type, StreamType::H264 as u8);

        // PTS span covers the interval but stays under twice the interval
        let first = pes.first().unwrap().1 as i64;
        let last = pes.last().unwrap().1 as i64;
        let span = last - first;
        assert!(span >= 90_000, "span {span} < one interval");
        assert!(span < 180_000, "span {span} >= two intervals");
    }

    #[test]
    fn test_consecutive_segments_continue_where_previous_ended() {
        let data = upstream(120, false);
        let mut segmenter = Segmenter::new(Cursor::new(data), Duration::from_secs(1));

        let first = segmenter.next_segment().unwrap();
        let second = segmenter.next_segment().unwrap();

        let (_, first_pes) = inspect(&first);
        let (_, second_pes) = inspect(&second);
        assert!(second_pes.first().unwrap().1 > first_pes.last().unwrap().1);
    }

    #[test]
    fn test_mpeg1_audio_declared_as_adts() {
        let data = upstream(80, true);
        let mut segmenter = Segmenter::new(Cursor::new(data), Duration::from_secs(1));

        let segment = segmenter.next_segment().unwrap();
        let (pmt, pes) = inspect(&segment);

        // same PID, rewritten stream type
        let audio = pmt.stream(257).expect("audio stream declared");
        assert_eq!(audio.stream_type, StreamType::AacAdts as u8);

        // the inert audio payload decoded to nothing, so PID 257 carries no
        // PES; video passed through untouched
        assert!(pes.iter().all(|&(pid, _)| pid == 256));
    }

    #[test]
    fn test_missing_pts_is_fatal() {
        let mut writer = TsWriter::new();
        writer.add_stream(EsDecl::new(256, StreamType::H264 as u8));
        writer.set_pcr_pid(256);
        writer.write_tables().unwrap();
        writer
            .write_pes(
                256,
                &PesUnit {
                    pid: 256,
                    stream_id: StreamId::VIDEO_BASE,
                    pts: None,
                    dts: None,
                    payload: vec![0; 64],
                },
            )
            .unwrap();
        // the PES only completes at the next payload unit start
        writer
            .write_pes(
                256,
                &PesUnit {
                    pid: 256,
                    stream_id: StreamId::VIDEO_BASE,
                    pts: Some(PesTimestamp::new(0)),
                    dts: None,
                    payload: vec![0; 64],
                },
            )
            .unwrap();

        let mut segmenter =
            Segmenter::new(Cursor::new(writer.take().to_vec()), Duration::from_secs(1));
        assert!(matches!(
            segmenter.next_segment(),
            Err(HlsError::MissingPts(256))
        ));
    }

    #[test]
    fn test_upstream_eof_is_fatal() {
        let data = upstream(10, false); // well under one interval
        let mut segmenter = Segmenter::new(Cursor::new(data), Duration::from_secs(1));
        assert!(matches!(
            segmenter.next_segment(),
            Err(HlsError::Ts(TsError::EndOfStream))
        ));
    }

    #[test]
    fn test_audio_only_program_gets_pcr_on_audio_pid() {
        let mut writer = TsWriter::new();
        writer.add_stream(EsDecl::new(257, StreamType::AacAdts as u8));
        writer.set_pcr_pid(257);
        writer.write_tables().unwrap();
        for i in 0..60u64 {
            writer
                .write_pes(
                    257,
                    &PesUnit {
                        pid: 257,
                        stream_id: StreamId::AUDIO_BASE,
                        pts: Some(PesTimestamp::new(i * 2_000)),
                        dts: None,
                        payload: vec![0x11; 128],
                    },
                )
                .unwrap();
        }

        let mut segmenter =
            Segmenter::new(Cursor::new(writer.take().to_vec()), Duration::from_secs(1));
        let segment = segmenter.next_segment().unwrap();
        let (pmt, _) = inspect(&segment);
        assert_eq!(pmt.pcr_pid, 257);
    }
}
