//! PCAP/PCAPNG file source.
//!
//! File I/O and block parsing live here; everything above sees only
//! `PacketEvent`s with link type, timestamp and captured bytes.

pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use parser::PcapFileSource;
