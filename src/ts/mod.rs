//! MPEG-2 Transport Stream wire format: packet headers, adaptation field PCR
//! extraction, and PES header PTS extraction.
//!
//! Only single-program parsing is implemented: there is no PAT/PMT walk,
//! since the pipeline is wired to exactly one video PID, one audio PID and
//! one PCR PID taken directly from configuration.

mod packet;
mod pes;

pub use packet::{parse_adaptation_field, parse_header, AdaptationField, TsHeader};
pub use pes::{parse_pes_header, PesHeader};

/// Size of a Transport Stream packet in bytes.
pub const TS_PACKET_SIZE: usize = 188;
/// Size of the fixed TS header in bytes.
pub const TS_HEADER_SIZE: usize = 4;
/// PTS/DTS clock frequency, in Hz.
pub const PTS_HZ: u64 = 90_000;
/// PCR clock frequency, in Hz.
pub const PCR_HZ: u64 = 27_000_000;
/// PCR base wraps modulo 2^33.
pub const PCR_BASE_WRAP: u64 = 1 << 33;
