//! `Sync` (offset-STC-driven frame selection) and `OutPut` (the pull master
//! that issues exactly one display request per nominal frame period).

use crate::channels::{PictureBuffer, SignalBuffer, SignalBufferReader, SignalScalar, SignalScalarReader};
use crate::config::Config;
use crate::error::Result;
use crate::kernel::Kernel;
use crate::modules::stc::request_reply;
use crate::trace::CsvTrace;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// A sequence number wrapping each frame hand-off so `SignalBuffer`'s
/// change-detection fires even when the same bytes (or `None`) are selected
/// twice in a row — the pull protocol cares about a fresh decision being
/// made each request, not just a change in payload.
#[derive(Clone, PartialEq)]
pub struct FramePush {
    /// Monotonically increasing per push.
    pub seq: u64,
    /// The selected frame, or `None` if nothing satisfied the display window.
    pub payload: Option<Vec<u8>>,
}

/// Selects the latest usable frame from `frame_in` whenever `OutPut` raises
/// its request edge, and hands it to `frame_out`.
pub struct Sync {
    kernel: Kernel,
    name: String,
    frame_in: PictureBuffer,
    frame_out: SignalBuffer<FramePush>,
    request: SignalScalarReader,
    stc_offset_request: SignalScalar,
    stc_offset_reply: SignalBufferReader<i64>,
    seq: u64,
}

impl Sync {
    /// Builds `Sync`. Has no configuration keys of its own.
    pub fn new(
        kernel: &Kernel,
        _config: &Config,
        module_name: &str,
        frame_in: PictureBuffer,
        frame_out: SignalBuffer<FramePush>,
        request: SignalScalarReader,
        stc_offset_request: SignalScalar,
        stc_offset_reply: SignalBufferReader<i64>,
    ) -> Result<Self> {
        Ok(Sync {
            kernel: kernel.clone(),
            name: module_name.to_string(),
            frame_in,
            frame_out,
            request,
            stc_offset_request,
            stc_offset_reply,
            seq: 0,
        })
    }

    /// Spawns the selection loop.
    pub fn spawn(self) {
        let kernel = self.kernel.clone();
        kernel.spawn(&self.name.clone(), run(self));
    }
}

async fn run(mut m: Sync) {
    loop {
        let rising = m.request.changed(&m.kernel).await;
        if !rising {
            continue;
        }
        let stc = request_reply(&m.kernel, &m.stc_offset_request, &m.stc_offset_reply).await;
        let result = m.frame_in.nbread(stc).await;
        m.seq += 1;
        m.frame_out.write(FramePush { seq: m.seq, payload: result.payload });
    }
}

/// The pull master: requests one frame per `1/framerate` seconds.
pub struct OutPut {
    kernel: Kernel,
    name: String,
    framerate: f64,
    request: SignalScalar,
    frame_in: SignalBufferReader<FramePush>,
    trace: Option<Rc<RefCell<CsvTrace>>>,
}

impl OutPut {
    /// Builds `OutPut` from `<module_name>.framerate`.
    pub fn new(
        kernel: &Kernel,
        config: &Config,
        module_name: &str,
        request: SignalScalar,
        frame_in: SignalBufferReader<FramePush>,
        trace: Option<Rc<RefCell<CsvTrace>>>,
    ) -> Result<Self> {
        let framerate = config.require_f64(module_name, "framerate")?;
        Ok(OutPut {
            kernel: kernel.clone(),
            name: module_name.to_string(),
            framerate,
            request,
            frame_in,
            trace,
        })
    }

    /// Spawns the display-pull loop.
    pub fn spawn(self) {
        let kernel = self.kernel.clone();
        kernel.spawn(&self.name.clone(), run_output(self));
    }
}

async fn run_output(m: OutPut) {
    let mut shown_before = false;
    let mut stutter_logged = false;
    let period = Duration::from_secs_f64(1.0 / m.framerate);

    loop {
        m.request.write(true);
        let push = m.frame_in.changed(&m.kernel).await;
        let displayed = match push.and_then(|p| p.payload) {
            Some(_) => {
                shown_before = true;
                true
            }
            None => {
                if shown_before && !stutter_logged {
                    log::warn!(target: "simulator::output", "[{}] stutter occurred", m.name);
                    stutter_logged = true;
                }
                false
            }
        };

        if let Some(trace) = &m.trace {
            let t = m.kernel.now_secs();
            let _ = trace.borrow_mut().record(t, if displayed { "1" } else { "0" });
        }

        m.request.write(false);
        m.kernel.wait_delay(period).await;
    }
}
