//! Analysis sessions.
//!
//! A session is built once from a set of dissector factories and a
//! `SessionConfig`. Building it instantiates every enabled dissector and
//! freezes the dispatch table; pipelines created from the session share
//! that table and own their workers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::{ConfigError, SessionConfig, SessionContext};
use crate::dissector::{DissectorError, DissectorFactory, Registration};
use crate::frame::Frame;
use crate::pipeline::{Pipeline, PipelineError};
use crate::token::{NamespacePattern, Token, TokenRegistry};

/// Namespace of the synthetic layer wrapping each raw frame.
pub const ROOT_NAMESPACE: &str = "root";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("dissector construction failed: {0}")]
    Dissector(#[from] DissectorError),
}

/// One raw captured packet waiting for dissection.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub index: u32,
    pub timestamp: Option<f64>,
    pub data: Bytes,
}

pub(crate) struct DispatchEntry {
    pub(crate) name: String,
    pub(crate) patterns: Vec<NamespacePattern>,
    pub(crate) registration: Registration,
}

/// Collects factories before a session is built.
pub struct SessionBuilder {
    tokens: Arc<TokenRegistry>,
    config: SessionConfig,
    factories: Vec<Arc<dyn DissectorFactory>>,
}

impl SessionBuilder {
    pub fn new(tokens: Arc<TokenRegistry>, config: SessionConfig) -> Self {
        Self {
            tokens,
            config,
            factories: Vec::new(),
        }
    }

    /// Register a factory; registration order is dispatch priority.
    pub fn register(mut self, factory: impl DissectorFactory + 'static) -> Self {
        self.factories.push(Arc::new(factory));
        self
    }

    pub fn register_shared(mut self, factory: Arc<dyn DissectorFactory>) -> Self {
        self.factories.push(factory);
        self
    }

    pub fn build(self) -> Result<Session, SessionError> {
        self.config.validate()?;
        let ctx = SessionContext::new(self.tokens, self.config);
        let mut entries = Vec::new();
        for factory in &self.factories {
            if !ctx.config().is_enabled(factory.name()) {
                debug!(dissector = factory.name(), "dissector disabled by config");
                continue;
            }
            let registration = factory.create(&ctx).inspect_err(|err| {
                error!(dissector = factory.name(), error = %err, "dissector construction failed");
            })?;
            let patterns = registration.namespaces();
            debug!(
                dissector = registration.name(),
                namespaces = ?patterns
                    .iter()
                    .map(|pattern| pattern.describe(ctx.tokens()))
                    .collect::<Vec<_>>(),
                "registered dissector"
            );
            entries.push(DispatchEntry {
                name: registration.name().to_string(),
                patterns,
                registration,
            });
        }

        let tokens = ctx.tokens();
        let root = tokens.intern(ROOT_NAMESPACE);
        let root_dispatch = ctx
            .config()
            .link
            .as_deref()
            .map(|link| tokens.compose_str(root, link));
        info!(dissectors = entries.len(), "session ready");

        Ok(Session {
            ctx,
            entries,
            root,
            root_dispatch,
            closed: AtomicBool::new(false),
            next_index: AtomicU32::new(0),
        })
    }
}

/// A configured analysis session.
pub struct Session {
    ctx: SessionContext,
    entries: Vec<DispatchEntry>,
    root: Token,
    root_dispatch: Option<Token>,
    closed: AtomicBool,
    next_index: AtomicU32,
}

impl Session {
    pub fn builder(tokens: Arc<TokenRegistry>, config: SessionConfig) -> SessionBuilder {
        SessionBuilder::new(tokens, config)
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn tokens(&self) -> &Arc<TokenRegistry> {
        self.ctx.tokens()
    }

    pub fn config(&self) -> &SessionConfig {
        self.ctx.config()
    }

    /// Names of the active dissectors in dispatch order.
    pub fn dissector_names(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.name.as_str()).collect()
    }

    /// Create a pipeline with its own workers.
    pub fn pipeline(&self) -> Result<Pipeline<'_>, SessionError> {
        Pipeline::new(self)
    }

    /// Allocate the next frame index.
    pub fn next_index(&self) -> u32 {
        self.next_index.fetch_add(1, Ordering::Relaxed)
    }

    /// Stop accepting new frames; frames already being dissected finish.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("session closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Dissect independent frames on up to `threads` worker threads.
    ///
    /// Frames are split into contiguous chunks, one pipeline per chunk, and
    /// returned in input order. Stream workers live per pipeline, so when a
    /// stream dissector is active every frame goes through one pipeline.
    pub fn dissect_batch(
        &self,
        frames: Vec<RawFrame>,
        threads: usize,
    ) -> Result<Vec<Frame>, PipelineError> {
        let mut threads = threads.max(1);
        if threads > 1 && self.has_stream_dissectors() {
            debug!(threads, "stream dissectors active, dissecting on one pipeline");
            threads = 1;
        }
        if threads == 1 || frames.len() < 2 {
            let mut pipeline = self.pipeline()?;
            return frames
                .into_iter()
                .map(|raw| pipeline.dissect_raw(raw))
                .collect();
        }

        let chunk_len = frames.len().div_ceil(threads);
        let results = thread::scope(|scope| {
            let handles: Vec<_> = frames
                .chunks(chunk_len)
                .map(|chunk| {
                    scope.spawn(move || -> Result<Vec<Frame>, PipelineError> {
                        let mut pipeline = self.pipeline()?;
                        chunk
                            .iter()
                            .cloned()
                            .map(|raw| pipeline.dissect_raw(raw))
                            .collect()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or(Err(PipelineError::WorkerPanicked)))
                .collect::<Vec<_>>()
        });

        let mut out = Vec::with_capacity(frames.len());
        for chunk in results {
            out.extend(chunk?);
        }
        Ok(out)
    }

    /// Whether any active dissector keeps per-stream state.
    pub fn has_stream_dissectors(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| matches!(entry.registration, Registration::Stream(_)))
    }

    pub(crate) fn entries(&self) -> &[DispatchEntry] {
        &self.entries
    }

    pub(crate) fn root(&self) -> Token {
        self.root
    }

    pub(crate) fn root_dispatch(&self) -> Option<Token> {
        self.root_dispatch
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("dissectors", &self.dissector_names())
            .field("config", self.config())
            .field("closed", &self.is_closed())
            .finish()
    }
}
