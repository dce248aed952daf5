//! PCR-locked virtual clock (`Stc`) and its request/reply sampling protocol.
//!
//! Grounded on the original `Stc`'s three concurrent procedures: an edge
//! detector reflecting `startStc` into an internal running flag, an updater
//! that re-seeds or tracks error against incoming PCR, and a responder that
//! answers `stcRequest` rising edges with the current virtual PCR.

use crate::channels::{SignalBuffer, SignalBufferReader, SignalScalar, SignalScalarReader};
use crate::config::Config;
use crate::error::Result;
use crate::kernel::Kernel;
use std::cell::RefCell;
use std::rc::Rc;

/// `pcr(t) = ((27e6*t)/300 mod 2^33)*300 + (27e6*t mod 300)`, integer
/// arithmetic on the virtual clock `t`.
pub fn pcr_now(kernel: &Kernel) -> i64 {
    let nanos = kernel.now().as_nanos();
    let ticks = (nanos * 27_000_000u128 / 1_000_000_000u128) as i128;
    let wrap = (1i128 << 33) * 300;
    (ticks.rem_euclid(wrap)) as i64
}

struct State {
    offset: Option<i64>,
    last_pcr: i64,
    running: bool,
    rms_sum_sq: f64,
    rms_count: u64,
}

/// Samples a request/reply clock pair: writes `true` to `request`, waits for
/// any reply change, reads it, writes `false`. Used by every consumer of
/// `Stc` and `StcOffset`.
pub async fn request_reply(kernel: &Kernel, request: &SignalScalar, reply: &SignalBufferReader<i64>) -> i64 {
    request.write(true);
    let value = reply.changed(kernel).await;
    request.write(false);
    value.unwrap_or(0)
}

/// PCR-locked virtual system clock.
pub struct Stc {
    kernel: Kernel,
    name: String,
    pcr_jump_border: i64,
    pcr_in: SignalBufferReader<u64>,
    start_stc: SignalScalarReader,
    request: SignalScalarReader,
    reply: SignalBuffer<i64>,
    state: Rc<RefCell<State>>,
}

impl Stc {
    /// Builds `Stc` from `<module_name>.pcrJumpBorder`.
    pub fn new(
        kernel: &Kernel,
        config: &Config,
        module_name: &str,
        pcr_in: SignalBufferReader<u64>,
        start_stc: SignalScalarReader,
        request: SignalScalarReader,
        reply: SignalBuffer<i64>,
    ) -> Result<Self> {
        let pcr_jump_border = config.require_i64(module_name, "pcrJumpBorder")?;
        Ok(Stc {
            kernel: kernel.clone(),
            name: module_name.to_string(),
            pcr_jump_border,
            pcr_in,
            start_stc,
            request,
            reply,
            state: Rc::new(RefCell::new(State {
                offset: None,
                last_pcr: 0,
                running: false,
                rms_sum_sq: 0.0,
                rms_count: 0,
            })),
        })
    }

    /// Spawns the three concurrent tasks that make up `Stc`.
    pub fn spawn(self) {
        let kernel = self.kernel.clone();
        let start_stc_for_responder = self.start_stc.clone();
        kernel.spawn(&format!("{}.edge", self.name), edge_detector(self.kernel.clone(), self.start_stc, self.state.clone()));
        kernel.spawn(&format!("{}.update", self.name), updater(self.kernel.clone(), self.name.clone(), self.pcr_jump_border, self.pcr_in, self.state.clone()));
        kernel.spawn(&format!("{}.respond", self.name), responder(self.kernel.clone(), start_stc_for_responder, self.request, self.reply, self.state));
    }
}

async fn edge_detector(kernel: Kernel, start_stc: SignalScalarReader, state: Rc<RefCell<State>>) {
    loop {
        let running = start_stc.changed(&kernel).await;
        state.borrow_mut().running = running;
    }
}

async fn updater(
    kernel: Kernel,
    name: String,
    pcr_jump_border: i64,
    pcr_in: SignalBufferReader<u64>,
    state: Rc<RefCell<State>>,
) {
    loop {
        let Some(p) = pcr_in.changed(&kernel).await else { continue };
        let p = p as i64;
        let mut st = state.borrow_mut();
        let now_pcr = pcr_now(&kernel);
        match st.offset {
            None => {
                st.offset = Some(p - now_pcr);
                log::info!(target: "simulator::stc", "[{name}] initial pcr offset set to {}", p - now_pcr);
            }
            Some(offset) if (p - st.last_pcr).abs() > pcr_jump_border => {
                log::warn!(target: "simulator::stc", "[{name}] pcr jump or warp around");
                let _ = offset;
                let new_offset = p - now_pcr;
                st.offset = Some(new_offset);
                log::info!(target: "simulator::stc", "[{name}] new offset {new_offset}");
            }
            Some(offset) => {
                let expected = now_pcr + offset;
                let error = (p - expected) as f64;
                st.rms_sum_sq += error * error;
                st.rms_count += 1;
            }
        }
        st.last_pcr = p;
    }
}

async fn responder(
    kernel: Kernel,
    start_stc: SignalScalarReader,
    request: SignalScalarReader,
    reply: SignalBuffer<i64>,
    state: Rc<RefCell<State>>,
) {
    loop {
        if !state.borrow().running {
            start_stc.changed(&kernel).await;
            continue;
        }
        let rising = request.changed(&kernel).await;
        if !rising {
            continue;
        }
        let offset = state.borrow().offset.unwrap_or(0);
        let stc = pcr_now(&kernel) + offset;
        reply.write(stc / 300);
    }
}
