use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::token::{NamespaceMatching, TokenRegistry};

/// Default cap on dissection depth per frame.
pub const DEFAULT_MAX_DEPTH: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid session config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("max_depth must be at least 1")]
    ZeroDepth,
}

/// User-facing session settings, loadable from TOML.
///
/// # Examples
/// ```
/// use layershark_core::{NamespaceMatching, SessionConfig};
///
/// let config = SessionConfig::from_toml_str(
///     r#"
///     link = "eth"
///     matching = "exact"
///     enabled = ["eth", "ipv6"]
///     "#,
/// )?;
/// assert_eq!(config.matching, NamespaceMatching::Exact);
/// assert!(config.is_enabled("ipv6"));
/// assert!(!config.is_enabled("tcp"));
/// # Ok::<(), layershark_core::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Link-layer hint; the root layer dispatches as `root.<link>`.
    pub link: Option<String>,
    /// Dissector names to enable; `None` enables every registered factory.
    pub enabled: Option<BTreeSet<String>>,
    /// Matching rule for plain namespace patterns.
    pub matching: NamespaceMatching,
    /// Maximum number of layers stacked below the root.
    pub max_depth: usize,
    /// Free-form options for dissectors.
    pub options: BTreeMap<String, String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            link: None,
            enabled: None,
            matching: NamespaceMatching::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            options: BTreeMap::new(),
        }
    }
}

impl SessionConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path)?;
        Self::from_toml_str(&input)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }
        Ok(())
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled
            .as_ref()
            .is_none_or(|enabled| enabled.contains(name))
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }
}

/// Read-only bundle handed to dissector factories.
#[derive(Debug, Clone)]
pub struct SessionContext {
    tokens: Arc<TokenRegistry>,
    config: SessionConfig,
}

impl SessionContext {
    pub fn new(tokens: Arc<TokenRegistry>, config: SessionConfig) -> Self {
        Self { tokens, config }
    }

    pub fn tokens(&self) -> &Arc<TokenRegistry> {
        &self.tokens
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, DEFAULT_MAX_DEPTH, SessionConfig};
    use crate::token::NamespaceMatching;

    #[test]
    fn empty_toml_uses_defaults() {
        let config = SessionConfig::from_toml_str("").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert!(config.is_enabled("anything"));
    }

    #[test]
    fn options_and_matching_parse() {
        let config = SessionConfig::from_toml_str(
            r#"
            matching = "prefix"
            max_depth = 4

            [options]
            "tcp.track" = "on"
            "#,
        )
        .unwrap();
        assert_eq!(config.matching, NamespaceMatching::Prefix);
        assert_eq!(config.max_depth, 4);
        assert_eq!(config.option("tcp.track"), Some("on"));
    }

    #[test]
    fn zero_depth_is_rejected() {
        let err = SessionConfig::from_toml_str("max_depth = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroDepth));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = SessionConfig::from_toml_str("bogus = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }
}
