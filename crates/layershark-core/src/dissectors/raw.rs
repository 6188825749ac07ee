//! Raw IP link type: the frame starts directly with an IP header.

use crate::attr::Attribute;
use crate::config::SessionContext;
use crate::dissector::{Dissector, DissectorError, DissectorFactory, Registration, Worker};
use crate::layer::{Confidence, Layer};
use crate::token::{NamespacePattern, Token};

pub const NAME: &str = "raw";

#[derive(Debug, Default, Clone, Copy)]
pub struct RawFactory;

impl DissectorFactory for RawFactory {
    fn name(&self) -> &str {
        NAME
    }

    fn create(&self, ctx: &SessionContext) -> Result<Registration, DissectorError> {
        let tokens = ctx.tokens();
        let namespace = tokens.intern("raw");
        Ok(Registration::Dissector(Box::new(RawDissector {
            namespace,
            version: tokens.compose_str(namespace, "version"),
            ipv4: tokens.compose_str(namespace, "ipv4"),
            ipv6: tokens.compose_str(namespace, "ipv6"),
            pattern: NamespacePattern::parse(tokens, "*raw"),
        })))
    }
}

#[derive(Debug, Clone, Copy)]
struct RawDissector {
    namespace: Token,
    version: Token,
    ipv4: Token,
    ipv6: Token,
    pattern: NamespacePattern,
}

impl Dissector for RawDissector {
    fn name(&self) -> &str {
        NAME
    }

    fn namespaces(&self) -> Vec<NamespacePattern> {
        vec![self.pattern]
    }

    fn create_worker(&self) -> Result<Box<dyn Worker>, DissectorError> {
        Ok(Box::new(*self))
    }
}

impl Worker for RawDissector {
    /// Consumes nothing; only the version nibble is inspected, so the
    /// attribute is synthetic and the payload is handed on untouched.
    fn analyze(&mut self, layer: &Layer) -> Option<Layer> {
        let first = *layer.payload().as_bytes().first()?;
        let version = first >> 4;
        let dispatch = match version {
            4 => self.ipv4,
            6 => self.ipv6,
            _ => return None,
        };
        let mut child = Layer::new(self.namespace, layer.payload().clone());
        child.push(Attribute::new(self.version, version));
        child.set_dispatch(dispatch);
        child.set_summary(format!("IPv{version}"));
        child.set_confidence(Confidence::Probable);
        Some(child)
    }
}

#[cfg(test)]
mod tests {
    use super::RawFactory;
    use crate::layer::Confidence;
    use crate::config::{SessionConfig, SessionContext};
    use crate::dissector::{DissectorFactory, Registration};
    use crate::layer::Layer;
    use crate::slice::Slice;
    use crate::token::TokenRegistry;
    use std::sync::Arc;

    fn run(data: Vec<u8>) -> (Arc<TokenRegistry>, Option<Layer>) {
        let tokens = Arc::new(TokenRegistry::new());
        let ctx = SessionContext::new(Arc::clone(&tokens), SessionConfig::default());
        let Registration::Dissector(dissector) = RawFactory.create(&ctx).expect("create") else {
            panic!("expected a stateless dissector");
        };
        let input = Layer::new(tokens.intern("root"), Slice::new(data));
        let layer = dissector.create_worker().expect("worker").analyze(&input);
        (tokens, layer)
    }

    #[test]
    fn picks_ip_version() {
        let (tokens, layer) = run(vec![0x45, 0x00]);
        let layer = layer.expect("raw layer");
        assert_eq!(layer.dispatch(), Some(tokens.intern("raw.ipv4")));
        assert_eq!(layer.payload().len(), 2);
        assert_eq!(layer.attr(tokens.intern("raw.version")).expect("version").range, None);
        assert_eq!(layer.confidence(), Confidence::Probable);

        let (tokens, layer) = run(vec![0x60]);
        assert_eq!(layer.expect("raw layer").dispatch(), Some(tokens.intern("raw.ipv6")));
    }

    #[test]
    fn declines_unknown_version() {
        assert!(run(vec![0x20, 0x00]).1.is_none());
        assert!(run(Vec::new()).1.is_none());
    }
}
