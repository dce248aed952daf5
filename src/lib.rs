#![doc(html_root_url = "https://docs.rs/stb-simulator/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
//! Discrete-event simulator of a DVB set-top-box receive pipeline: a tuner
//! reads a captured MPEG transport stream at a configured bitrate, a
//! demultiplexer splits it into audio/video/PCR substreams, a PCR-locked
//! virtual clock drives decode and display timing, and a display sink pulls
//! frames at a nominal framerate while this crate measures whether the
//! configured buffers and latencies produce smooth playback or stutter.
//!
//! The binary entry point (`simulator <dir>`) loads `<dir>/config.json`,
//! wires the named model (see [`modules::ModelBasic`]), and runs
//! [`kernel::Kernel::run`] for the configured `runTime`.
//!
//! ```no_run
//! use std::rc::Rc;
//! use std::time::Duration;
//! use stb_simulator::config::Config;
//! use stb_simulator::kernel::Kernel;
//! use stb_simulator::modules::ModelBasic;
//!
//! # fn main() -> Result<(), stb_simulator::error::SimError> {
//! let config = Rc::new(Config::load_from_dir(std::path::Path::new("."))?);
//! let kernel = Kernel::new();
//! ModelBasic::build(&kernel, config)?;
//! kernel.run(Duration::from_secs(10));
//! # Ok(())
//! # }
//! ```

pub mod channels;
pub mod config;
pub mod error;
pub mod kernel;
pub mod modules;
pub mod trace;
pub mod ts;

pub use error::{Result, SimError};
