//! Channel types connecting simulation modules.
//!
//! Every channel is built directly on [`crate::kernel::Event`]/[`crate::kernel::Kernel`]
//! and is single-owner `Rc<RefCell<..>>` state, since the kernel never runs
//! more than one task at a time.

mod decoder;
mod fifo;
mod fill;
mod picture;
mod signal;

pub use decoder::DecoderBuffer;
pub use fifo::FiFoBuffer;
pub use fill::FillBuffer;
pub use picture::{PictureBuffer, PictureRead};
pub use signal::{SignalBuffer, SignalBufferReader, SignalScalar, SignalScalarReader};
