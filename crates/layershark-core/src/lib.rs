//! LayerShark core library: incremental packet dissection.
//!
//! A captured packet becomes a `Frame`; a `Pipeline` walks it through the
//! dissectors registered on a `Session`, each producing one child `Layer`
//! with byte-range-addressable `Attribute`s. Dissectors are chained by
//! namespace tokens interned in a shared `TokenRegistry` and read their
//! input only through `ByteReader`, which never fails: truncated fields come
//! back zeroed and flagged instead.
//!
//! Invariants:
//! - Attribute ranges are absolute frame offsets and never overlap the
//!   payload their layer hands on.
//! - `Frame::tree_indices` is the pre-order flattening of the layer tree.
//! - Dissecting the same bytes twice yields identical trees.
//!
//! Capture files are read by `source` (pcap/pcapng); `analysis` runs whole
//! captures and builds the deterministic JSON report.
//!
//! Version française (résumé):
//! Cette crate découpe chaque paquet en couches de protocole : la session
//! fixe la table de dispatch, le pipeline enchaîne les dissecteurs par
//! espace de noms, et le lecteur d'octets signale les champs tronqués sans
//! jamais interrompre le décodage. Le rapport JSON reste stable d'une
//! exécution à l'autre.
//!
//! # Examples
//! ```
//! use std::sync::Arc;
//!
//! use layershark_core::{FrameView, Session, SessionConfig, TokenRegistry};
//!
//! let tokens = Arc::new(TokenRegistry::new());
//! let config = SessionConfig {
//!     link: Some("raw".to_string()),
//!     ..SessionConfig::default()
//! };
//! let session = Session::builder(Arc::clone(&tokens), config)
//!     .with_builtin_dissectors()
//!     .build()?;
//! let mut pipeline = session.pipeline()?;
//!
//! let mut packet = vec![0x60, 0, 0, 0, 0, 0, 59, 64];
//! packet.extend_from_slice(&[0u8; 32]);
//! let frame = pipeline.dissect_next(0.0, packet)?;
//!
//! let view = FrameView::new(&frame);
//! let version = view.attr(tokens.intern("ipv6.version")).expect("version");
//! assert_eq!(version.value.as_u64(), Some(6));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use serde::{Deserialize, Serialize};

mod analysis;
mod attr;
mod config;
mod dissector;
pub mod dissectors;
mod frame;
mod layer;
mod pipeline;
mod reader;
mod session;
mod slice;
mod source;
mod token;
mod view;

pub use analysis::{AnalysisError, Capture, QueryHit, dissect_pcap_file, dissect_source};
pub use attr::{Attribute, Variant};
pub use config::{ConfigError, DEFAULT_MAX_DEPTH, SessionConfig, SessionContext};
pub use dissector::{
    Dissector, DissectorError, DissectorFactory, Registration, StreamDissector, StreamWorker,
    Worker,
};
pub use frame::{Frame, LayerId};
pub use layer::{Confidence, Layer, LayerError};
pub use pipeline::{Pipeline, PipelineError};
pub use reader::{ByteReader, ReadInt};
pub use session::{ROOT_NAMESPACE, RawFrame, Session, SessionBuilder, SessionError};
pub use slice::{Slice, to_hex};
pub use source::{PacketEvent, PacketSource, PcapFileSource, SourceError, link_hint};
pub use token::{NamespaceMatching, NamespacePattern, Token, TokenRegistry};
pub use view::{FrameView, QueryMatch};

/// Current report schema version.
pub const REPORT_VERSION: u32 = 1;
/// Default timestamp used when no capture time is available.
pub const DEFAULT_GENERATED_AT: &str = "1970-01-01T00:00:00Z";

/// Dissection report for a whole capture, frames in capture order.
///
/// # Examples
/// ```
/// use layershark_core::make_stub_report;
///
/// let report = make_stub_report("capture.pcapng", 123);
/// assert_eq!(report.report_version, layershark_core::REPORT_VERSION);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureReport {
    /// Report schema version (not the binary version).
    pub report_version: u32,
    pub tool: ToolInfo,
    /// RFC3339 time of the last captured packet.
    pub generated_at: String,
    pub input: InputInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_summary: Option<CaptureSummary>,
    pub frames: Vec<FrameReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputInfo {
    /// Input path as provided to the dissector.
    pub path: String,
    pub bytes: u64,
}

/// Capture-wide counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSummary {
    pub packets_total: u64,
    /// Frames with a truncated attribute or a layer-level error.
    pub frames_with_errors: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_end: Option<String>,
    /// Layer count per namespace, sorted by name.
    pub layers: std::collections::BTreeMap<String, u64>,
}

/// One dissected frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameReport {
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Captured length in bytes.
    pub length: usize,
    /// Pre-order layer ids.
    pub tree_indices: Vec<u32>,
    /// Namespace of the primary layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Layers indexed by layer id.
    pub layers: Vec<LayerReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerReport {
    pub id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<u32>,
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Stream key as 16 hex digits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
    /// Absolute `[start, end)` of the bytes left for the next layer.
    pub payload: [usize; 2],
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<LayerErrorReport>,
    pub attributes: Vec<AttributeReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerErrorReport {
    pub id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeReport {
    pub id: String,
    /// JSON rendering of the value; byte strings are lowercase hex.
    pub value: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<[usize; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

/// Build a report with base fields filled and no frames.
///
/// # Examples
/// ```
/// use layershark_core::make_stub_report;
///
/// let report = make_stub_report("capture.pcapng", 123);
/// assert_eq!(report.input.bytes, 123);
/// assert!(report.frames.is_empty());
/// ```
pub fn make_stub_report(input_path: &str, input_bytes: u64) -> CaptureReport {
    CaptureReport {
        report_version: REPORT_VERSION,
        tool: ToolInfo {
            name: "layershark".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        generated_at: DEFAULT_GENERATED_AT.to_string(),
        input: InputInfo {
            path: input_path.to_string(),
            bytes: input_bytes,
        },
        capture_summary: None,
        frames: vec![],
    }
}
