//! Captured packet sources.
//!
//! A source yields raw packets in capture order together with the link
//! type they were recorded with. The link type decides which root dispatch
//! namespace (`root.eth`, `root.raw`) a session starts from.

pub mod pcap;

pub use pcap::PcapFileSource;

use bytes::Bytes;
use pcap_parser::Linktype;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct PacketEvent {
    pub ts: Option<f64>,
    pub linktype: Linktype,
    pub data: Bytes,
}

impl PacketEvent {
    pub fn link_hint(&self) -> Option<&'static str> {
        link_hint(self.linktype)
    }
}

/// Link hint for the bundled link-layer dissectors.
///
/// # Examples
/// ```
/// use layershark_core::link_hint;
/// use pcap_parser::Linktype;
///
/// assert_eq!(link_hint(Linktype::ETHERNET), Some("eth"));
/// assert_eq!(link_hint(Linktype::RAW), Some("raw"));
/// assert_eq!(link_hint(Linktype::NULL), None);
/// ```
pub fn link_hint(linktype: Linktype) -> Option<&'static str> {
    match linktype {
        Linktype::ETHERNET => Some("eth"),
        Linktype::RAW | Linktype::IPV4 | Linktype::IPV6 => Some("raw"),
        _ => None,
    }
}

pub trait PacketSource {
    fn next_packet(&mut self) -> Result<Option<PacketEvent>, SourceError>;
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PCAP parse error: {0}")]
    Pcap(String),
}

impl From<pcap::error::PcapSourceError> for SourceError {
    fn from(value: pcap::error::PcapSourceError) -> Self {
        match value {
            pcap::error::PcapSourceError::Io(err) => SourceError::Io(err),
            err @ pcap::error::PcapSourceError::Parse { .. } => {
                SourceError::Pcap(err.to_string())
            }
        }
    }
}
