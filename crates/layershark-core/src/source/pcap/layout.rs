pub const PCAPNG_MAGIC: [u8; 4] = [0x0a, 0x0d, 0x0d, 0x0a];

pub const PCAP_READER_BUFFER_SIZE: usize = 64 * 1024;

/// `if_tsresol` when an interface does not declare one (microseconds).
pub const DEFAULT_TS_RESOLUTION: u8 = 6;
/// Set in `if_tsresol` when the exponent is a power of two.
pub const TS_RESOLUTION_BINARY: u8 = 0x80;
