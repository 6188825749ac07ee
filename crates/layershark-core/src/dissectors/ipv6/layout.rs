pub const HEADER_LEN: usize = 40;
pub const ADDR_LEN: usize = 16;

pub const VERSION_RANGE: std::ops::Range<usize> = 0..1;
pub const TRAFFIC_CLASS_RANGE: std::ops::Range<usize> = 0..2;
pub const FLOW_LABEL_RANGE: std::ops::Range<usize> = 1..4;

/// Extension headers are sized in 8-octet units, not counting the first.
pub const EXT_UNIT: usize = 8;
/// Next-header and length octets at the start of an extension header.
pub const EXT_PREFIX_LEN: usize = 2;
