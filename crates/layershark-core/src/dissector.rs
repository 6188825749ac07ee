//! Dissector plugin contract.
//!
//! A `DissectorFactory` is registered once and asked for a fresh dissector
//! per session. The dissector declares the namespaces it consumes and hands
//! out workers; a worker turns one layer's payload into at most one child
//! layer. Stateless workers may run on any pipeline; stream workers keep
//! state for one stream and must see its frames in arrival order.

use thiserror::Error;

use crate::config::SessionContext;
use crate::layer::Layer;
use crate::token::NamespacePattern;

#[derive(Debug, Error)]
pub enum DissectorError {
    #[error("dissector {name} is misconfigured: {reason}")]
    Config { name: String, reason: String },
    #[error("dissector {name} could not create a worker: {reason}")]
    Worker { name: String, reason: String },
}

/// Decodes one layer into the next.
pub trait Worker: Send {
    /// Produce a child layer from `layer.payload()`, or `None` when this
    /// worker cannot make progress. Must not depend on anything but the
    /// input layer.
    fn analyze(&mut self, layer: &Layer) -> Option<Layer>;
}

/// Stateless dissector: one worker per pipeline.
pub trait Dissector: Send + Sync {
    fn name(&self) -> &str;
    fn namespaces(&self) -> Vec<NamespacePattern>;
    fn create_worker(&self) -> Result<Box<dyn Worker>, DissectorError>;
}

/// Decodes successive layers belonging to one stream.
pub trait StreamWorker: Send {
    fn analyze(&mut self, layer: &Layer) -> Option<Layer>;
}

/// Stateful dissector: one worker per stream key.
pub trait StreamDissector: Send + Sync {
    fn name(&self) -> &str;
    fn namespaces(&self) -> Vec<NamespacePattern>;
    fn create_worker(&self, stream_key: u64) -> Result<Box<dyn StreamWorker>, DissectorError>;
}

/// What a factory builds for a session.
pub enum Registration {
    Dissector(Box<dyn Dissector>),
    Stream(Box<dyn StreamDissector>),
}

impl Registration {
    pub fn name(&self) -> &str {
        match self {
            Self::Dissector(dissector) => dissector.name(),
            Self::Stream(dissector) => dissector.name(),
        }
    }

    pub fn namespaces(&self) -> Vec<NamespacePattern> {
        match self {
            Self::Dissector(dissector) => dissector.namespaces(),
            Self::Stream(dissector) => dissector.namespaces(),
        }
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dissector(dissector) => write!(f, "Dissector({})", dissector.name()),
            Self::Stream(dissector) => write!(f, "Stream({})", dissector.name()),
        }
    }
}

/// Builds dissectors for sessions.
pub trait DissectorFactory: Send + Sync {
    /// Name used by `SessionConfig::enabled`.
    fn name(&self) -> &str;
    fn create(&self, ctx: &SessionContext) -> Result<Registration, DissectorError>;
}
