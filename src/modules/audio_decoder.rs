//! `AudioDecoder`: no decoding latency, no splitting — reads an entry,
//! samples the clocks for diagnostics, and writes the whole payload through
//! as a single picture.

use crate::channels::{DecoderBuffer, PictureBuffer, SignalBufferReader, SignalScalar};
use crate::config::Config;
use crate::error::Result;
use crate::kernel::Kernel;
use crate::modules::stc::request_reply;

/// Passes audio frames straight from `DecoderBuffer` to `PictureBuffer`.
pub struct AudioDecoder {
    kernel: Kernel,
    name: String,
    input: DecoderBuffer,
    output: PictureBuffer,
    stc_request: SignalScalar,
    stc_reply: SignalBufferReader<i64>,
    stc_offset_request: SignalScalar,
    stc_offset_reply: SignalBufferReader<i64>,
}

impl AudioDecoder {
    /// Builds `AudioDecoder`. Unlike `VideoDecoder` there is no
    /// `decodingTime` configuration key at all: the decode is free.
    pub fn new(
        kernel: &Kernel,
        _config: &Config,
        module_name: &str,
        input: DecoderBuffer,
        output: PictureBuffer,
        stc_request: SignalScalar,
        stc_reply: SignalBufferReader<i64>,
        stc_offset_request: SignalScalar,
        stc_offset_reply: SignalBufferReader<i64>,
    ) -> Result<Self> {
        Ok(AudioDecoder {
            kernel: kernel.clone(),
            name: module_name.to_string(),
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

async fn run(m: AudioDecoder) {
    loop {
        let entry = m.input.read().await;
        let _stc = request_reply(&m.kernel, &m.stc_request, &m.stc_reply).await;
        let _stc_offset = request_reply(&m.kernel, &m.stc_offset_request, &m.stc_offset_reply).await;

        let key = m.output.write(entry.payload, entry.pts).await;
        m.output.finished(&[key]);
    }
}
