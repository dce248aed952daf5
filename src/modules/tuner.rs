//! Transport-stream sources: `TunerDVB` (fixed bitrate) and `ReadMulticast`
//! (inter-packet delay read from a paired `.aux` sidecar).
//!
//! Both read a pre-captured TS file entirely into memory at construction —
//! these are small fixture captures for simulation, not live broadcast
//! ingest — and replay 188-byte packets into a [`FillBuffer`], advancing
//! virtual time between writes. Grounded on the original's `TunerDVB`/
//! `ReadMulticast` read loop and its sync-byte resync-by-one-byte recovery.

use crate::channels::FillBuffer;
use crate::config::Config;
use crate::error::Result;
use crate::kernel::Kernel;
use crate::ts::TS_PACKET_SIZE;
use std::rc::Rc;
use std::time::Duration;

/// Reads 188-byte packets at a fixed configured bitrate.
pub struct TunerDvb {
    kernel: Kernel,
    name: String,
    data: Vec<u8>,
    pos: usize,
    bit_rate: f64,
    output: FillBuffer<Vec<u8>>,
}

impl TunerDvb {
    /// Builds the reader from `<module_name>.filename` / `.bitRate`.
    pub fn new(kernel: &Kernel, config: &Config, module_name: &str, output: FillBuffer<Vec<u8>>) -> Result<Self> {
        let filename = config.require_str(module_name, "filename")?;
        let bit_rate = config.require_f64(module_name, "bitRate")?;
        let data = std::fs::read(&filename)?;
        Ok(TunerDvb {
            kernel: kernel.clone(),
            name: module_name.to_string(),
            data,
            pos: 0,
            bit_rate,
            output,
        })
    }

    /// Spawns the read loop as a kernel task.
    pub fn spawn(self) {
        let name = self.name.clone();
        self.kernel.clone().spawn(&name.clone(), self.run());
    }

    async fn run(mut self) {
        loop {
            match resync_and_read(&self.data, &mut self.pos, &self.name) {
                Some(packet) => {
                    self.output.write(packet).await;
                    let sleep_secs = TS_PACKET_SIZE as f64 / (self.bit_rate / 8.0);
                    self.kernel.wait_delay(Duration::from_secs_f64(sleep_secs)).await;
                }
                None => {
                    log::warn!(target: "simulator::tuner", "[{}] end of file reached", self.name);
                    return;
                }
            }
        }
    }
}

/// Reads 188-byte packets whose inter-packet delay comes from an `.aux`
/// sidecar of 8-byte big-endian 27 MHz tick counts, one per packet.
pub struct ReadMulticast {
    kernel: Kernel,
    name: String,
    data: Vec<u8>,
    pos: usize,
    aux: Vec<u64>,
    aux_pos: usize,
    output: FillBuffer<Vec<u8>>,
}

impl ReadMulticast {
    /// Builds the reader from `<module_name>.filename` / `.filenameAux`.
    pub fn new(kernel: &Kernel, config: &Config, module_name: &str, output: FillBuffer<Vec<u8>>) -> Result<Self> {
        let filename = config.require_str(module_name, "filename")?;
        let filename_aux = config.require_str(module_name, "filenameAux")?;
        let data = std::fs::read(&filename)?;
        let aux_bytes = std::fs::read(&filename_aux)?;
        let aux = aux_bytes
            .chunks_exact(8)
            .map(|c| u64::from_be_bytes(c.try_into().expect("chunks_exact(8) yields 8-byte slices")))
            .collect();
        Ok(ReadMulticast {
            kernel: kernel.clone(),
            name: module_name.to_string(),
            data,
            pos: 0,
            aux,
            aux_pos: 0,
            output,
        })
    }

    /// Spawns the read loop as a kernel task.
    pub fn spawn(self) {
        let name = self.name.clone();
        self.kernel.clone().spawn(&name.clone(), self.run());
    }

    async fn run(mut self) {
        loop {
            let Some(packet) = resync_and_read(&self.data, &mut self.pos, &self.name) else {
                log::warn!(target: "simulator::read_multicast", "[{}] end of file reached", self.name);
                return;
            };
            let Some(&ticks) = self.aux.get(self.aux_pos) else {
                log::warn!(target: "simulator::read_multicast", "[{}] aux sidecar exhausted", self.name);
                return;
            };
            self.aux_pos += 1;

            // Write then sleep: the literal ordering the aux format was captured with.
            self.output.write(packet).await;
            let sleep_secs = ticks as f64 / crate::ts::PCR_HZ as f64;
            self.kernel.wait_delay(Duration::from_secs_f64(sleep_secs)).await;
        }
    }
}

/// Reads the next 188-byte packet at `*pos`, advancing `*pos`. If the sync
/// byte is wrong, logs once and advances one byte at a time until
/// re-synchronised or the data is exhausted.
fn resync_and_read(data: &[u8], pos: &mut usize, module_name: &str) -> Option<Vec<u8>> {
    if *pos + TS_PACKET_SIZE > data.len() {
        return None;
    }
    if data[*pos] == 0x47 {
        let packet = data[*pos..*pos + TS_PACKET_SIZE].to_vec();
        *pos += TS_PACKET_SIZE;
        return Some(packet);
    }

    log::warn!(target: "simulator::tuner", "[{module_name}] invalid tsPacket, trying to find sync byte");
    let start = *pos;
    let mut skipped = 0usize;
    loop {
        *pos += 1;
        skipped += 1;
        if *pos + TS_PACKET_SIZE > data.len() {
            return None;
        }
        if data[*pos] == 0x47 {
            log::warn!(target: "simulator::tuner", "[{module_name}] sync byte found {skipped} bytes Later.");
            let packet = data[*pos..*pos + TS_PACKET_SIZE].to_vec();
            *pos += TS_PACKET_SIZE;
            return Some(packet);
        }
        if *pos - start > TS_PACKET_SIZE {
            // Never find two sync bytes 188 apart within one packet span; give up.
            return None;
        }
    }
}
