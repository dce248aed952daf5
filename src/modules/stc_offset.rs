//! `StcOffset`: shifts `Stc`'s virtual PCR by a presentation-time reference
//! offset and tolerates 33-bit wrap-around, interposed between a consumer
//! and `Stc`'s own request/reply pair.

use crate::channels::{SignalBuffer, SignalBufferReader, SignalScalar, SignalScalarReader};
use crate::config::Config;
use crate::error::Result;
use crate::kernel::Kernel;
use crate::modules::stc::request_reply;
use std::cell::RefCell;
use std::rc::Rc;

struct State {
    offset: i64,
    old_stc: Option<i64>,
    wraparound_offset: i64,
    wraparound_stc: i64,
    wrapping: bool,
}

/// Offset-shifted view of `Stc`, fanned in from multiple consumers.
pub struct StcOffset {
    kernel: Kernel,
    name: String,
    request_to_stc: SignalScalar,
    reply_from_stc: SignalBufferReader<i64>,
    request_from_module: SignalScalarReader,
    reply_to_module: SignalBuffer<i64>,
    state: Rc<RefCell<State>>,
}

impl StcOffset {
    /// Builds `StcOffset` from `<module_name>.offset`.
    pub fn new(
        kernel: &Kernel,
        config: &Config,
        module_name: &str,
        request_to_stc: SignalScalar,
        reply_from_stc: SignalBufferReader<i64>,
        request_from_module: SignalScalarReader,
        reply_to_module: SignalBuffer<i64>,
    ) -> Result<Self> {
        let offset = config.require_i64(module_name, "offset")?;
        Ok(StcOffset {
            kernel: kernel.clone(),
            name: module_name.to_string(),
            request_to_stc,
            reply_from_stc,
            request_from_module,
            reply_to_module,
            state: Rc::new(RefCell::new(State {
                offset,
                old_stc: None,
                wraparound_offset: 0,
                wraparound_stc: 0,
                wrapping: false,
            })),
        })
    }

    /// Spawns the forwarding task.
    pub fn spawn(self) {
        let kernel = self.kernel.clone();
        kernel.spawn(&self.name.clone(), run(self));
    }
}

async fn run(m: StcOffset) {
    loop {
        let rising = m.request_from_module.changed(&m.kernel).await;
        if !rising {
            continue;
        }
        let stc = request_reply(&m.kernel, &m.request_to_stc, &m.reply_from_stc).await;

        let mut st = m.state.borrow_mut();
        if let Some(old_stc) = st.old_stc {
            if stc < old_stc {
                st.wraparound_offset = old_stc - stc;
                st.wraparound_stc = old_stc;
                st.wrapping = true;
                log::info!(target: "simulator::stc_offset", "[{}] wrap-around detected, wraparoundOffset={}", m.name, st.wraparound_offset);
            }
        }
        st.old_stc = Some(stc);

        let mut out = if st.wrapping {
            stc - st.offset + st.wraparound_offset
        } else {
            stc - st.offset
        };
        if st.wrapping && st.wraparound_stc < out {
            st.wrapping = false;
            st.wraparound_offset = 0;
            st.wraparound_stc = 0;
            out = stc - st.offset;
        }
        if out < 0 {
            out = 0;
        }
        drop(st);

        m.reply_to_module.write(out);
    }
}
