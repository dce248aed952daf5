//! Pipeline modules: sources, demultiplexer, clock recovery, decoders,
//! display pull, and the `ModelBasic` wiring graph that connects them all.

pub mod audio_decoder;
pub mod demux;
pub mod model_basic;
pub mod stc;
pub mod stc_offset;
pub mod sync_output;
pub mod tuner;
pub mod video_decoder;

pub use audio_decoder::AudioDecoder;
pub use demux::Demux;
pub use model_basic::ModelBasic;
pub use stc::Stc;
pub use stc_offset::StcOffset;
pub use sync_output::{FramePush, OutPut, Sync};
pub use tuner::{ReadMulticast, TunerDvb};
pub use video_decoder::VideoDecoder;
