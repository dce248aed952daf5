//! CSV trace sink for module variables.
//!
//! Grounded on `CsvTrace`: one file per traced variable, header row
//! `"<xlabel>,<ylabel>"`, and a data row appended only when the live value
//! differs from what was last written (change-only tracing). Time is printed
//! at 9 decimal places, fixed notation, matching the original's `%.9f`.

use crate::error::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Appends `(time, value)` rows to a CSV file, skipping unchanged values.
pub struct CsvTrace {
    writer: BufWriter<File>,
    last_value: Option<String>,
    delta_cycles: bool,
}

impl CsvTrace {
    /// Opens `<dir>/<name>.csv`, writing the header row immediately.
    /// `ylabel` defaults to `name` when empty, mirroring the original.
    pub fn create(dir: &Path, name: &str, xlabel: &str, ylabel: &str, delta_cycles: bool) -> Result<Self> {
        let path = dir.join(format!("{name}.csv"));
        let mut writer = BufWriter::new(File::create(path)?);
        let ylabel = if ylabel.is_empty() { name } else { ylabel };
        writeln!(writer, "{xlabel},{ylabel}")?;
        Ok(CsvTrace { writer, last_value: None, delta_cycles })
    }

    /// Whether this sink should be sampled at delta-cycle granularity rather
    /// than only at the end of each scheduling iteration.
    pub fn delta_cycles(&self) -> bool {
        self.delta_cycles
    }

    /// Records `value` at `time_secs` if it differs from the last recorded
    /// value. `value` is pre-formatted by the caller since traced variables
    /// have heterogeneous types (bool, integer, float, frame-present flag).
    pub fn record(&mut self, time_secs: f64, value: &str) -> Result<()> {
        if self.last_value.as_deref() == Some(value) {
            return Ok(());
        }
        writeln!(self.writer, "{time_secs:.9},{value}")?;
        self.last_value = Some(value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;

    #[test]
    fn skips_unchanged_values() {
        let dir = std::env::temp_dir().join(format!("stb-sim-trace-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        {
            let mut trace = CsvTrace::create(&dir, "fill", "time", "", false).unwrap();
            trace.record(0.0, "0").unwrap();
            trace.record(0.1, "0").unwrap();
            trace.record(0.2, "3").unwrap();
        }
        let mut content = String::new();
        File::open(dir.join("fill.csv")).unwrap().read_to_string(&mut content).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "time,fill");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "0.200000000,3");
        std::fs::remove_dir_all(&dir).ok();
    }
}
