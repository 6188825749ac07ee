use std::fmt;

use thiserror::Error;

/// On-disk capture layout, detected from the magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFormat {
    Legacy,
    PcapNg,
}

impl fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => f.write_str("pcap"),
            Self::PcapNg => f.write_str("pcapng"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PcapSourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{format} {stage} failed: {message}")]
    Parse {
        format: CaptureFormat,
        stage: &'static str,
        message: String,
    },
}
