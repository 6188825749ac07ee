use std::io::{Read, Seek, SeekFrom};

use super::error::PcapSourceError;
use super::layout;
use pcap_parser::Linktype;

/// Link type and clock of one pcapng interface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interface {
    pub linktype: Linktype,
    /// Timestamp units per second.
    pub ts_units: f64,
}

impl Default for Interface {
    fn default() -> Self {
        Self {
            linktype: Linktype::ETHERNET,
            ts_units: ts_units_per_second(layout::DEFAULT_TS_RESOLUTION),
        }
    }
}

/// Read the magic bytes and rewind the reader to the start.
///
/// # Errors
/// Returns `PcapSourceError` when the reader cannot be read or rewound.
pub fn read_magic_and_rewind<R: Read + Seek>(reader: &mut R) -> Result<[u8; 4], PcapSourceError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(magic)
}

pub fn is_pcapng_magic(magic: &[u8; 4]) -> bool {
    magic == &layout::PCAPNG_MAGIC
}

/// Interface for a packet's `if_id`; unknown ids fall back to Ethernet with
/// microsecond timestamps.
pub fn interface_for(interfaces: &[Interface], if_id: u32) -> Interface {
    interfaces
        .get(if_id as usize)
        .copied()
        .unwrap_or_default()
}

/// Decode `if_tsresol`: decimal exponent, or binary when the high bit is set.
pub fn ts_units_per_second(tsresol: u8) -> f64 {
    let exponent = i32::from(tsresol & !layout::TS_RESOLUTION_BINARY);
    if tsresol & layout::TS_RESOLUTION_BINARY == 0 {
        10f64.powi(exponent)
    } else {
        2f64.powi(exponent)
    }
}

/// Convert a PCAPNG high/low timestamp to seconds.
pub fn pcapng_ts_to_seconds(ts_high: u32, ts_low: u32, ts_units: f64) -> f64 {
    let ts = (u64::from(ts_high) << 32) | u64::from(ts_low);
    ts as f64 / ts_units
}

/// Convert a legacy record timestamp; the fraction is micro- or nanoseconds.
pub fn legacy_ts_to_seconds(ts_sec: u32, ts_frac: u32, nanosecond: bool) -> f64 {
    let scale = if nanosecond { 1e-9 } else { 1e-6 };
    f64::from(ts_sec) + f64::from(ts_frac) * scale
}

/// Captured bytes without block padding.
pub fn captured(data: &[u8], caplen: u32) -> &[u8] {
    let len = (caplen as usize).min(data.len());
    &data[..len]
}
