use serde::{Deserialize, Serialize};

use crate::attr::Attribute;
use crate::slice::Slice;
use crate::token::Token;

/// How sure a dissector is that it decoded the right protocol.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// The input could not be decoded as claimed.
    Error,
    Possible,
    Probable,
    #[default]
    Exact,
}

/// A problem with the layer as a whole rather than one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerError {
    pub id: Token,
    pub message: String,
}

/// One protocol's decoded view of part of a frame.
///
/// Workers build a `Layer` value and hand it back to the pipeline; tree
/// links (parent and children) live in the owning `Frame`, so a layer is a
/// plain value with no back-references.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    namespace: Token,
    dispatch: Option<Token>,
    summary: Option<String>,
    attributes: Vec<Attribute>,
    payload: Slice,
    primary: bool,
    tags: Vec<Token>,
    stream_key: Option<u64>,
    confidence: Confidence,
    errors: Vec<LayerError>,
}

impl Layer {
    pub fn new(namespace: Token, payload: Slice) -> Self {
        Self {
            namespace,
            dispatch: None,
            summary: None,
            attributes: Vec::new(),
            payload,
            primary: false,
            tags: Vec::new(),
            stream_key: None,
            confidence: Confidence::default(),
            errors: Vec::new(),
        }
    }

    pub fn namespace(&self) -> Token {
        self.namespace
    }

    /// Namespace used to pick the next dissector.
    pub fn effective_namespace(&self) -> Token {
        self.dispatch.unwrap_or(self.namespace)
    }

    pub fn dispatch(&self) -> Option<Token> {
        self.dispatch
    }

    pub fn set_dispatch(&mut self, namespace: Token) {
        self.dispatch = Some(namespace);
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn set_summary(&mut self, summary: impl Into<String>) {
        self.summary = Some(summary.into());
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Append an attribute; order is decode order.
    pub fn push(&mut self, attr: Attribute) {
        self.attributes.push(attr);
    }

    /// First attribute with the given id.
    pub fn attr(&self, id: Token) -> Option<&Attribute> {
        self.attributes.iter().find(|attr| attr.id == id)
    }

    /// Bytes not yet consumed by this layer.
    pub fn payload(&self) -> &Slice {
        &self.payload
    }

    pub fn set_payload(&mut self, payload: Slice) {
        self.payload = payload;
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// Mark this layer as the most specific decode of its frame.
    pub fn mark_primary(&mut self) {
        self.primary = true;
    }

    pub fn tags(&self) -> &[Token] {
        &self.tags
    }

    pub fn add_tag(&mut self, tag: Token) {
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    pub fn has_tag(&self, tag: Token) -> bool {
        self.tags.contains(&tag)
    }

    /// Key routing this layer to a stream worker, if any.
    pub fn stream_key(&self) -> Option<u64> {
        self.stream_key
    }

    pub fn set_stream_key(&mut self, key: u64) {
        self.stream_key = Some(key);
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub fn set_confidence(&mut self, confidence: Confidence) {
        self.confidence = confidence;
    }

    pub fn errors(&self) -> &[LayerError] {
        &self.errors
    }

    /// Record a layer-level decode error.
    pub fn add_error(&mut self, id: Token, message: impl Into<String>) {
        self.errors.push(LayerError {
            id,
            message: message.into(),
        });
    }

    /// True when any attribute was read past the end of the input or a
    /// layer-level error was recorded.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty() || self.attributes.iter().any(|attr| attr.error)
    }
}
