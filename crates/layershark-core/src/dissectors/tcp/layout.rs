pub const MIN_HEADER_LEN: usize = 20;
/// Data offset counts 32-bit words.
pub const OFFSET_UNIT: usize = 4;

pub const FLAGS_RANGE: std::ops::Range<usize> = 12..14;
pub const NS_FLAG_RANGE: std::ops::Range<usize> = 12..13;
pub const FLAG_BITS_RANGE: std::ops::Range<usize> = 13..14;

pub const FLAG_NS: u16 = 1 << 8;

/// Single-bit flags in the low octet, most significant first.
pub const FLAG_BITS: [(&str, u16); 8] = [
    ("cwr", 1 << 7),
    ("ece", 1 << 6),
    ("urg", 1 << 5),
    ("ack", 1 << 4),
    ("psh", 1 << 3),
    ("rst", 1 << 2),
    ("syn", 1 << 1),
    ("fin", 1),
];

pub const OPTION_NOP: u8 = 1;
pub const OPTION_MSS: u8 = 2;
pub const OPTION_SCALE: u8 = 3;
pub const OPTION_SACK_PERMITTED: u8 = 4;
