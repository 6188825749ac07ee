//! Token interning and namespace matching.
//!
//! Every name the engine handles (protocol namespaces such as `ipv6`,
//! attribute ids such as `ipv6.src`) is interned once into a `Token`. After
//! registration, layers and attributes are addressed by token only.
//!
//! The registry is append-only and safe to share between threads: the
//! forward map is sharded (`DashMap`), the reverse table is a vector guarded
//! by a read-mostly lock. Id allocation happens while the shard entry for
//! the string is held, so two threads interning the same string always
//! observe the same token.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Separator between namespace segments.
pub const NAMESPACE_SEPARATOR: char = '.';
/// Prefix marking a wildcard namespace pattern (`*ipv6`).
pub const WILDCARD_PREFIX: char = '*';

/// Interned identifier for a namespace or attribute path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Token(u32);

impl Token {
    /// Token of the empty string; always present.
    pub const NULL: Token = Token(0);

    /// Raw integer value.
    pub fn id(self) -> u32 {
        self.0
    }

    pub fn is_null(self) -> bool {
        self == Self::NULL
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Process-wide string interner.
///
/// # Examples
/// ```
/// use layershark_core::TokenRegistry;
///
/// let tokens = TokenRegistry::new();
/// let ipv6 = tokens.intern("ipv6");
/// let src = tokens.intern("src");
/// assert_eq!(tokens.compose(ipv6, src), tokens.intern("ipv6.src"));
/// ```
#[derive(Debug)]
pub struct TokenRegistry {
    ids: DashMap<Arc<str>, Token>,
    names: RwLock<Vec<Arc<str>>>,
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenRegistry {
    pub fn new() -> Self {
        let empty: Arc<str> = Arc::from("");
        let ids = DashMap::new();
        ids.insert(empty.clone(), Token::NULL);
        Self {
            ids,
            names: RwLock::new(vec![empty]),
        }
    }

    /// Intern `name`, returning its stable token.
    pub fn intern(&self, name: &str) -> Token {
        if let Some(token) = self.ids.get(name) {
            return *token;
        }
        let key: Arc<str> = Arc::from(name);
        *self.ids.entry(key.clone()).or_insert_with(|| {
            let mut names = self.names.write();
            let token = Token(names.len() as u32);
            names.push(key);
            token
        })
    }

    /// Token for `"parent.child"`; an empty side yields the other side.
    pub fn compose(&self, parent: Token, child: Token) -> Token {
        if parent.is_null() {
            return child;
        }
        if child.is_null() {
            return parent;
        }
        let joined = {
            let names = self.names.read();
            match (names.get(parent.0 as usize), names.get(child.0 as usize)) {
                (Some(parent), Some(child)) => {
                    format!("{parent}{NAMESPACE_SEPARATOR}{child}")
                }
                _ => return Token::NULL,
            }
        };
        self.intern(&joined)
    }

    /// Compose with a child given as a string.
    pub fn compose_str(&self, parent: Token, child: &str) -> Token {
        let child = self.intern(child);
        self.compose(parent, child)
    }

    /// String for a token, if it was issued by this registry.
    pub fn resolve(&self, token: Token) -> Option<Arc<str>> {
        self.names.read().get(token.0 as usize).cloned()
    }

    /// String for a token, or an empty string for unknown tokens.
    pub fn name(&self, token: Token) -> String {
        self.resolve(token)
            .map(|name| name.to_string())
            .unwrap_or_default()
    }

    /// Whether `namespace` equals `candidate` or starts with `candidate.`.
    pub fn is_prefix(&self, candidate: Token, namespace: Token) -> bool {
        if candidate == namespace {
            return true;
        }
        let names = self.names.read();
        match (names.get(candidate.0 as usize), names.get(namespace.0 as usize)) {
            (Some(candidate), Some(namespace)) => is_dotted_prefix(candidate, namespace),
            _ => false,
        }
    }

    /// Whether the last dotted segment of `namespace` is `segment`.
    pub fn ends_with_segment(&self, segment: Token, namespace: Token) -> bool {
        let names = self.names.read();
        match (names.get(segment.0 as usize), names.get(namespace.0 as usize)) {
            (Some(segment), Some(namespace)) => last_segment(namespace) == segment.as_ref(),
            _ => false,
        }
    }

    /// Number of interned strings, including the empty string.
    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}

fn is_dotted_prefix(candidate: &str, namespace: &str) -> bool {
    namespace
        .strip_prefix(candidate)
        .is_some_and(|rest| rest.starts_with(NAMESPACE_SEPARATOR))
}

fn last_segment(namespace: &str) -> &str {
    namespace
        .rsplit(NAMESPACE_SEPARATOR)
        .next()
        .unwrap_or(namespace)
}

/// How plain (non-wildcard) patterns match a layer namespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceMatching {
    /// `ipv6` matches `ipv6` and `ipv6.*`.
    #[default]
    Prefix,
    /// `ipv6` matches `ipv6` only.
    Exact,
}

/// A namespace a dissector claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamespacePattern {
    /// Matches the namespace itself (and its children under `Prefix`).
    Plain(Token),
    /// `*name`: matches any namespace whose dispatch target is `name`.
    Wildcard(Token),
}

impl NamespacePattern {
    /// Parse `"ipv6"` or `"*ipv6"`.
    pub fn parse(tokens: &TokenRegistry, pattern: &str) -> Self {
        match pattern.strip_prefix(WILDCARD_PREFIX) {
            Some(name) => Self::Wildcard(tokens.intern(name)),
            None => Self::Plain(tokens.intern(pattern)),
        }
    }

    pub fn matches(
        &self,
        tokens: &TokenRegistry,
        namespace: Token,
        policy: NamespaceMatching,
    ) -> bool {
        match (*self, policy) {
            (Self::Plain(token), NamespaceMatching::Exact) => token == namespace,
            (Self::Plain(token), NamespaceMatching::Prefix) => tokens.is_prefix(token, namespace),
            (Self::Wildcard(token), _) => tokens.ends_with_segment(token, namespace),
        }
    }

    /// Human-readable form, `*` restored for wildcards.
    pub fn describe(&self, tokens: &TokenRegistry) -> String {
        match *self {
            Self::Plain(token) => tokens.name(token),
            Self::Wildcard(token) => format!("{WILDCARD_PREFIX}{}", tokens.name(token)),
        }
    }
}
