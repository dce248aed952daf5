//! End-to-end test: builds a small synthetic transport stream fixture and
//! `config.json` on disk, wires `ModelBasic`, and runs the kernel for a
//! short virtual duration. Exercises the whole pipeline (tuner -> demux ->
//! stc/stcOffset -> decoders -> sync -> output) together rather than module
//! by module.

use std::io::Write;
use std::rc::Rc;
use std::time::Duration;

use stb_simulator::config::Config;
use stb_simulator::kernel::Kernel;
use stb_simulator::modules::ModelBasic;

const VIDEO_PID: u16 = 512;
const AUDIO_PID: u16 = 650;
const PCR_PID: u16 = 256;

fn pcr_packet(cc: u8, pcr: u64) -> [u8; 188] {
    let mut p = [0u8; 188];
    p[0] = 0x47;
    p[1] = ((PCR_PID >> 8) & 0x1f) as u8;
    p[2] = (PCR_PID & 0xff) as u8;
    p[3] = 0x20 | (cc & 0x0f); // adaptation field only, no payload
    let base = pcr / 300;
    let ext = pcr % 300;
    p[4] = 183;
    p[5] = 0x10; // pcr_flag
    p[6] = (base >> 25) as u8;
    p[7] = (base >> 17) as u8;
    p[8] = (base >> 9) as u8;
    p[9] = (base >> 1) as u8;
    p[10] = (((base & 1) << 7) as u8) | 0x7e | ((ext >> 8) as u8 & 0x01);
    p[11] = (ext & 0xff) as u8;
    p
}

fn pes_packet(pid: u16, cc: u8, stream_id: u8, pts: u64, payload: &[u8]) -> [u8; 188] {
    let mut p = [0u8; 188];
    p[0] = 0x47;
    p[1] = 0x40 | (((pid >> 8) & 0x1f) as u8); // payload_unit_start
    p[2] = (pid & 0xff) as u8;
    p[3] = 0x10 | (cc & 0x0f); // payload only

    let mut pes = vec![0x00, 0x00, 0x01, stream_id, 0x00, 0x00, 0x80, 0x80, 0x05];
    pes.push(0x21 | (((pts >> 30) & 0x07) as u8) << 1);
    let mid = ((pts >> 15) & 0x7fff) as u16;
    pes.push((mid >> 7) as u8);
    pes.push(((mid << 1) | 1) as u8);
    let low = (pts & 0x7fff) as u16;
    pes.push((low >> 7) as u8);
    pes.push(((low << 1) | 1) as u8);
    pes.extend_from_slice(payload);

    let body = &mut p[4..];
    let n = pes.len().min(body.len());
    body[..n].copy_from_slice(&pes[..n]);
    p
}

fn build_ts_fixture() -> Vec<u8> {
    let mut data = Vec::new();
    let frame_ticks: u64 = 27_000_000 / 25; // one video/audio frame every 1/25s of 27MHz ticks
    for i in 0..40u64 {
        let pcr = i * frame_ticks;
        data.extend_from_slice(&pcr_packet((i % 16) as u8, pcr));

        let pts = 90_000 + (i * 90_000 / 25); // 90kHz units, offset ahead of pcr
        let video_payload = vec![0xAAu8; 120];
        data.extend_from_slice(&pes_packet(VIDEO_PID, (i % 16) as u8, 0xe0, pts, &video_payload));

        let audio_payload = vec![0xBBu8; 80];
        data.extend_from_slice(&pes_packet(AUDIO_PID, (i % 16) as u8, 0xc0, pts, &audio_payload));
    }
    data
}

fn write_config(dir: &std::path::Path, ts_path: &std::path::Path) {
    let config = serde_json::json!({
        "mainModel": "ModelBasic",
        "runTime": 1,
        "read": {
            "filename": ts_path.to_string_lossy(),
            "bitRate": 6_000_000.0
        },
        "demux": {
            "videoPid": VIDEO_PID,
            "audioPid": AUDIO_PID,
            "pcrPid": PCR_PID
        },
        "stc": { "pcrJumpBorder": 27_000_000i64 },
        "stcOffset": { "offset": 0 },
        "videoDecoder": { "videoTyp": "passthrough", "decodingTime": 0.001 },
        "audioDecoder": {},
        "demuxInBuffer": { "size": 32 },
        "videoDecoderBuffer": { "size": 1_000_000 },
        "audioDecoderBuffer": { "size": 1_000_000 },
        "pictureBuffer": { "size": 8 },
        "audioBuffer": { "size": 8 },
        "syncVideo": {},
        "syncAudio": {},
        "outPutVideo": { "framerate": 25.0 },
        "outPutAudio": { "framerate": 25.0 }
    });
    let mut f = std::fs::File::create(dir.join("config.json")).unwrap();
    f.write_all(serde_json::to_string_pretty(&config).unwrap().as_bytes()).unwrap();
}

#[test]
fn runs_full_pipeline_without_deadlock() {
    let dir = std::env::temp_dir().join(format!("stb-sim-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let ts_path = dir.join("capture.ts");
    std::fs::write(&ts_path, build_ts_fixture()).unwrap();
    write_config(&dir, &ts_path);

    let config = Rc::new(Config::load_from_dir(&dir).unwrap());
    let kernel = Kernel::new();
    ModelBasic::build(&kernel, config).unwrap();
    kernel.run(Duration::from_millis(500));

    assert!(kernel.now_secs() > 0.0);

    std::fs::remove_dir_all(&dir).ok();
}
