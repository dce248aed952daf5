//! `ModelBasic`: the one shipped wiring graph connecting a single-program TS
//! source through demux, clock recovery, decode and display-pull for both
//! the video and audio elementary streams.
//!
//! Grounded on the original `ModelBasic`'s declarative module/channel graph
//! (§2's wiring list): every channel here is instantiated once and handed by
//! reference (well, by cloned `Rc`-backed handle) to exactly the modules
//! that read or write it.

use crate::channels::{DecoderBuffer, FillBuffer, PictureBuffer, SignalBuffer, SignalScalar};
use crate::config::Config;
use crate::error::Result;
use crate::kernel::Kernel;
use crate::modules::{AudioDecoder, Demux, OutPut, ReadMulticast, Stc, StcOffset, Sync, TunerDvb, VideoDecoder};
use std::rc::Rc;

/// Builds and spawns every module and channel of the one supported model.
pub struct ModelBasic;

impl ModelBasic {
    /// Wires the full pipeline from `config` and spawns every module's task
    /// onto `kernel`. Returns once everything is spawned; the simulation
    /// itself runs when the caller later calls [`Kernel::run`].
    pub fn build(kernel: &Kernel, config: Rc<Config>) -> Result<()> {
        let demux_in = FillBuffer::new(kernel, config.require_i64("demuxInBuffer", "size")? as usize);

        let video_decoder_buf = DecoderBuffer::new(kernel, config.require_i64("videoDecoderBuffer", "size")? as usize);
        let audio_decoder_buf = DecoderBuffer::new(kernel, config.require_i64("audioDecoderBuffer", "size")? as usize);

        let picture_buf = PictureBuffer::new(kernel, config.require_i64("pictureBuffer", "size")? as usize);
        let audio_picture_buf = PictureBuffer::new(kernel, config.require_i64("audioBuffer", "size")? as usize);

        let pcr_chan: SignalBuffer<u64> = SignalBuffer::new(kernel);
        let stc_started = SignalScalar::new(kernel, false);

        let stc_request = SignalScalar::new(kernel, false);
        let stc_reply: SignalBuffer<i64> = SignalBuffer::new(kernel);

        let stc_offset_request = SignalScalar::new(kernel, false);
        let stc_offset_reply: SignalBuffer<i64> = SignalBuffer::new(kernel);

        let video_frame_request = SignalScalar::new(kernel, false);
        let video_frame_chan: SignalBuffer<crate::modules::FramePush> = SignalBuffer::new(kernel);
        let audio_frame_request = SignalScalar::new(kernel, false);
        let audio_frame_chan: SignalBuffer<crate::modules::FramePush> = SignalBuffer::new(kernel);

        if config.module("read")?.get("filenameAux").is_some() {
            ReadMulticast::new(kernel, &config, "read", demux_in.clone())?.spawn();
        } else {
            TunerDvb::new(kernel, &config, "read", demux_in.clone())?.spawn();
        }

        Demux::new(
            kernel,
            &config,
            "demux",
            demux_in,
            video_decoder_buf.clone(),
            audio_decoder_buf.clone(),
            pcr_chan.clone(),
            stc_started.clone(),
            stc_request.clone(),
            stc_reply.reader(),
            stc_offset_request.clone(),
            stc_offset_reply.reader(),
        )?
        .spawn();

        Stc::new(
            kernel,
            &config,
            "stc",
            pcr_chan.reader(),
            stc_started.reader(),
            stc_request.reader(),
            stc_reply.clone(),
        )?
        .spawn();

        StcOffset::new(
            kernel,
            &config,
            "stcOffset",
            stc_request.clone(),
            stc_reply.reader(),
            stc_offset_request.reader(),
            stc_offset_reply.clone(),
        )?
        .spawn();

        VideoDecoder::new(
            kernel,
            &config,
            "videoDecoder",
            video_decoder_buf,
            picture_buf.clone(),
            stc_request.clone(),
            stc_reply.reader(),
            stc_offset_request.clone(),
            stc_offset_reply.reader(),
        )?
        .spawn();

        AudioDecoder::new(
            kernel,
            &config,
            "audioDecoder",
            audio_decoder_buf,
            audio_picture_buf.clone(),
            stc_request.clone(),
            stc_reply.reader(),
            stc_offset_request.clone(),
            stc_offset_reply.reader(),
        )?
        .spawn();

        Sync::new(
            kernel,
            &config,
            "syncVideo",
            picture_buf,
            video_frame_chan.clone(),
            video_frame_request.reader(),
            stc_offset_request.clone(),
            stc_offset_reply.reader(),
        )?
        .spawn();

        OutPut::new(kernel, &config, "outPutVideo", video_frame_request, video_frame_chan.reader(), None)?.spawn();

        Sync::new(
            kernel,
            &config,
            "syncAudio",
            audio_picture_buf,
            audio_frame_chan.clone(),
            audio_frame_request.reader(),
            stc_offset_request.clone(),
            stc_offset_reply.reader(),
        )?
        .spawn();

        OutPut::new(kernel, &config, "outPutAudio", audio_frame_request, audio_frame_chan.reader(), None)?.spawn();

        Ok(())
    }
}
