//! `DemuxSplit`: PID filter, continuity-counter validation, PES reassembly,
//! PCR extraction and fan-out to the audio/video `DecoderBuffer`s and `Stc`.

use crate::channels::{DecoderBuffer, FillBuffer, SignalBuffer, SignalBufferReader, SignalScalar};
use crate::config::Config;
use crate::error::Result;
use crate::kernel::Kernel;
use crate::modules::stc::request_reply;
use crate::ts::{self, TS_HEADER_SIZE};
use std::collections::HashMap;

struct StreamAssembly {
    buf: Vec<u8>,
    pts: Option<u64>,
    started: bool,
}

impl StreamAssembly {
    fn new() -> Self {
        StreamAssembly { buf: Vec::new(), pts: None, started: false }
    }
}

/// PID filter, CC check, PES reassembly and PCR extraction.
pub struct Demux {
    kernel: Kernel,
    name: String,
    video_pid: u16,
    audio_pid: u16,
    pcr_pid: u16,
    input: FillBuffer<Vec<u8>>,
    video_out: DecoderBuffer,
    audio_out: DecoderBuffer,
    pcr_out: SignalBuffer<u64>,
    stc_started: SignalScalar,
    stc_request: SignalScalar,
    stc_reply: SignalBufferReader<i64>,
    stc_offset_request: SignalScalar,
    stc_offset_reply: SignalBufferReader<i64>,
}

impl Demux {
    /// Builds `Demux` from `<module_name>.videoPid` / `.audioPid` / `.pcrPid`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kernel: &Kernel,
        config: &Config,
        module_name: &str,
        input: FillBuffer<Vec<u8>>,
        video_out: DecoderBuffer,
        audio_out: DecoderBuffer,
        pcr_out: SignalBuffer<u64>,
        stc_started: SignalScalar,
        stc_request: SignalScalar,
        stc_reply: SignalBufferReader<i64>,
        stc_offset_request: SignalScalar,
        stc_offset_reply: SignalBufferReader<i64>,
    ) -> Result<Self> {
        Ok(Demux {
            kernel: kernel.clone(),
            name: module_name.to_string(),
            video_pid: config.require_i64(module_name, "videoPid")? as u16,
            audio_pid: config.require_i64(module_name, "audioPid")? as u16,
            pcr_pid: config.require_i64(module_name, "pcrPid")? as u16,
            input,
            video_out,
            audio_out,
            pcr_out,
            stc_started,
            stc_request,
            stc_reply,
            stc_offset_request,
            stc_offset_reply,
        })
    }

    /// Spawns the demultiplex loop.
    pub fn spawn(self) {
        let kernel = self.kernel.clone();
        kernel.spawn(&self.name.clone(), run(self));
    }
}

async fn run(mut m: Demux) {
    let mut cc: HashMap<u16, i32> = HashMap::new();
    let mut video = StreamAssembly::new();
    let mut audio = StreamAssembly::new();
    let mut first_pcr = true;

    loop {
        let packet = m.input.read().await;
        let Ok(header) = ts::parse_header(&packet) else {
            continue;
        };
        let pid = header.pid;
        if pid != m.video_pid && pid != m.audio_pid && pid != m.pcr_pid {
            continue;
        }

        let expected = cc.get(&pid).copied().unwrap_or(-1);
        let actual = header.continuity_counter as i32;
        let accepted = if expected == -1 {
            true
        } else if actual == (expected + 1) % 16 {
            true
        } else if actual == expected % 16 && !header.contains_payload {
            true
        } else if actual == expected % 16 {
            log::warn!(target: "simulator::demux", "[{}] Double Packet", m.name);
            false
        } else {
            log::warn!(target: "simulator::demux", "[{}] continuity counter mismatch on pid {pid}: expected {}, got {actual}", m.name, (expected + 1) % 16);
            true
        };
        cc.insert(pid, actual);
        if !accepted {
            continue;
        }

        let mut offset = TS_HEADER_SIZE;
        if header.adaptation_field_exists {
            match ts::parse_adaptation_field(&packet, &header, TS_HEADER_SIZE) {
                Ok(Some(field)) => {
                    offset += 1 + field.length;
                    if pid == m.pcr_pid {
                        if let Some(pcr) = field.pcr {
                            m.pcr_out.write(pcr);
                            if first_pcr {
                                m.stc_started.write(true);
                                first_pcr = false;
                            }
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    log::warn!(target: "simulator::demux", "[{}] {e}", m.name);
                    continue;
                }
            }
        }

        if pid == m.video_pid || pid == m.audio_pid {
            let stream = if pid == m.video_pid { &mut video } else { &mut audio };
            let out = if pid == m.video_pid { &m.video_out } else { &m.audio_out };

            if header.payload_unit_start {
                if stream.started && !stream.buf.is_empty() {
                    emit_pes(&m, stream, out).await;
                }
                stream.buf.clear();
                stream.started = true;
            }
            if stream.started && offset < packet.len() {
                stream.buf.extend_from_slice(&packet[offset..]);
            }
        }
    }
}

async fn emit_pes(m: &Demux, stream: &mut StreamAssembly, out: &DecoderBuffer) {
    let Ok(Some(header)) = ts::parse_pes_header(&stream.buf) else {
        log::warn!(target: "simulator::demux", "[{}] invalid PES header, dropping", m.name);
        stream.pts = None;
        return;
    };
    let Some(pts) = header.pts else {
        log::warn!(target: "simulator::demux", "[{}] PES has no PTS, dropping", m.name);
        return;
    };
    if header.header_len > stream.buf.len() {
        log::warn!(target: "simulator::demux", "[{}] PES header overruns payload, dropping", m.name);
        return;
    }
    let payload = stream.buf[header.header_len..].to_vec();

    let stc = request_reply(&m.kernel, &m.stc_request, &m.stc_reply).await;
    let stc_offset = request_reply(&m.kernel, &m.stc_offset_request, &m.stc_offset_reply).await;
    let time_to_present = pts as i64 - stc;
    let time_to_present_including_offset = pts as i64 - stc_offset;
    log::info!(
        target: "simulator::demux",
        "[{}] pts={pts} timeToPresent={time_to_present} timeToPresentIncludingStcOffset={time_to_present_including_offset}",
        m.name
    );

    out.write(payload, pts as i64).await;
}
