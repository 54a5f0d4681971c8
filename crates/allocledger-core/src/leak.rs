//! Leak sweep results.
//!
//! Teardown is the only point where a leak becomes observable: every record
//! still tracked at that time is released and, with leak reporting on,
//! listed in the [`SweepReport`] first.

use std::io::Write;

use serde::{Serialize, Serializer};

use crate::table::AllocationRecord;

/// An allocation still tracked when the registry was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LeakRecord {
    #[serde(serialize_with = "serialize_hex")]
    pub address: usize,
    pub size: usize,
}

impl From<AllocationRecord> for LeakRecord {
    fn from(record: AllocationRecord) -> Self {
        Self {
            address: record.address,
            size: record.size,
        }
    }
}

/// Outcome of a teardown sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Tracked allocations released by the sweep.
    pub released: usize,
    /// Sum of their sizes.
    pub released_bytes: usize,
    /// Per-allocation listing; empty unless leak reporting is on.
    pub leaks: Vec<LeakRecord>,
}

impl SweepReport {
    /// Returns true when the sweep released nothing.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.released == 0
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write one JSON object per leaked allocation.
    pub fn write_jsonl<W: Write>(&self, writer: W) -> std::io::Result<()> {
        write_leak_jsonl(&self.leaks, writer)
    }
}

/// Write `leaks` as JSONL, one `{"event":"leak",...}` line each.
pub fn write_leak_jsonl<W: Write>(leaks: &[LeakRecord], mut writer: W) -> std::io::Result<()> {
    for leak in leaks {
        write_leak_line(leak, &mut writer)?;
    }
    writer.flush()
}

/// Write a single `{"event":"leak",...}` line.
pub fn write_leak_line<W: Write + ?Sized>(leak: &LeakRecord, writer: &mut W) -> std::io::Result<()> {
    #[derive(Serialize)]
    struct LeakLine<'a> {
        event: &'static str,
        #[serde(flatten)]
        leak: &'a LeakRecord,
    }

    let line = serde_json::to_string(&LeakLine { event: "leak", leak })
        .map_err(std::io::Error::other)?;
    writeln!(writer, "{line}")
}

fn serialize_hex<S: Serializer>(address: &usize, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{address:#x}"))
}
