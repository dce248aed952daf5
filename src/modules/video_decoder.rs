//! `VideoDecoder`: waits a configurable decode latency, then for MPEG-2
//! video splits the payload into per-picture units at `00 00 01 00` picture
//! start codes, interpolating a PTS for each from the sequence header's
//! framerate. Non-MPEG-2 streams pass through untouched.

use crate::channels::{DecoderBuffer, PictureBuffer, SignalBufferReader, SignalScalar};
use crate::config::Config;
use crate::error::Result;
use crate::kernel::Kernel;
use crate::modules::stc::request_reply;
use std::time::Duration;

const MPEG2_VIDEO_TYPE: &str = "13818-2 video (MPEG-2)";

/// Splits demultiplexed video PES payloads into per-picture units.
pub struct VideoDecoder {
    kernel: Kernel,
    name: String,
    video_typ: String,
    decoding_time: Duration,
    input: DecoderBuffer,
    output: PictureBuffer,
    stc_request: SignalScalar,
    stc_reply: SignalBufferReader<i64>,
    stc_offset_request: SignalScalar,
    stc_offset_reply: SignalBufferReader<i64>,
}

impl VideoDecoder {
    /// Builds `VideoDecoder` from `<module_name>.videoTyp` / `.decodingTime`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kernel: &Kernel,
        config: &Config,
        module_name: &str,
        input: DecoderBuffer,
        output: PictureBuffer,
        stc_request: SignalScalar,
        stc_reply: SignalBufferReader<i64>,
        stc_offset_request: SignalScalar,
        stc_offset_reply: SignalBufferReader<i64>,
    ) -> Result<Self> {
        let video_typ = config.require_str(module_name, "videoTyp")?;
        let decoding_time = config.require_f64(module_name, "decodingTime")?;
        Ok(VideoDecoder {
            kernel: kernel.clone(),
            name: module_name.to_string(),
            video_typ,
            decoding_time: Duration::from_secs_f64(decoding_time),
            input,
            output,
            stc_request,
            stc_reply,
            stc_offset_request,
            stc_offset_reply,
        })
    }

    /// Spawns the decode loop.
    pub fn spawn(self) {
        let kernel = self.kernel.clone();
        kernel.spawn(&self.name.clone(), run(self));
    }
}

async fn run(m: VideoDecoder) {
    let mut framerate = 25.0f64;
    loop {
        let entry = m.input.read().await;
        m.kernel.wait_delay(m.decoding_time).await;
        let _stc = request_reply(&m.kernel, &m.stc_request, &m.stc_reply).await;
        let _stc_offset = request_reply(&m.kernel, &m.stc_offset_request, &m.stc_offset_reply).await;

        if m.video_typ == MPEG2_VIDEO_TYPE {
            for (payload, pts) in split_pictures(&entry.payload, entry.pts, &mut framerate, &m.name) {
                let key = m.output.write(payload, pts).await;
                m.output.finished(&[key]);
            }
        } else {
            let key = m.output.write(entry.payload, entry.pts).await;
            m.output.finished(&[key]);
        }
    }
}

fn framerate_from_index(index: u8, name: &str) -> f64 {
    match index {
        1 => 24000.0 / 1001.0,
        2 => 24.0,
        3 => 25.0,
        4 => 30000.0 / 1001.0,
        5 => 30.0,
        6 => 50.0,
        7 => 60000.0 / 1001.0,
        8 => 60.0,
        other => {
            log::warn!(target: "simulator::video_decoder", "[{name}] unrecognised framerate index {other}, defaulting to 25");
            25.0
        }
    }
}

/// Scans `payload` for MPEG-2 start codes, splitting at each picture start
/// code and interpolating a PTS for every resulting unit.
fn split_pictures(payload: &[u8], pts: i64, framerate: &mut f64, name: &str) -> Vec<(Vec<u8>, i64)> {
    let mut out = Vec::new();
    let mut pict_start = 0usize;
    let mut count_pict: i64 = 0;
    let mut found_any = false;

    let mut i = 0usize;
    while i + 3 < payload.len() {
        if payload[i] == 0x00 && payload[i + 1] == 0x00 && payload[i + 2] == 0x01 {
            match payload[i + 3] {
                0xb3 if i + 7 < payload.len() => {
                    *framerate = framerate_from_index(payload[i + 7] & 0x0f, name);
                }
                0x00 => {
                    if found_any || pict_start != 0 {
                        let interpolated = pts + interpolate(count_pict, *framerate);
                        out.push((payload[pict_start..i].to_vec(), interpolated));
                        count_pict += 1;
                    }
                    pict_start = i;
                    found_any = true;
                }
                _ => {}
            }
        }
        i += 1;
    }

    if found_any {
        let interpolated = pts + interpolate(count_pict, *framerate);
        out.push((payload[pict_start..].to_vec(), interpolated));
    } else {
        out.push((payload.to_vec(), pts));
    }
    out
}

fn interpolate(count_pict: i64, framerate: f64) -> i64 {
    ((count_pict as f64) / framerate * 90_000.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_when_no_picture_start_codes() {
        let payload = vec![1, 2, 3, 4, 5];
        let mut framerate = 25.0;
        let result = split_pictures(&payload, 1000, &mut framerate, "t");
        assert_eq!(result, vec![(payload, 1000)]);
    }

    #[test]
    fn splits_at_picture_start_codes_with_interpolated_pts() {
        let mut payload = vec![0x00, 0x00, 0x01, 0x00]; // picture start at 0
        payload.extend_from_slice(&[0xaa; 4]);
        payload.extend_from_slice(&[0x00, 0x00, 0x01, 0x00]); // picture start at 8
        payload.extend_from_slice(&[0xbb; 4]);
        let mut framerate = 25.0;
        let result = split_pictures(&payload, 90_000, &mut framerate, "t");
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].1, 90_000);
        assert_eq!(result[1].1, 90_000 + 3_600);
    }
}
