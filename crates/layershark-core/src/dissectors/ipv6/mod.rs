//! IPv6 fixed header plus hop-by-hop and destination-options extensions.

mod layout;
mod worker;

use std::sync::Arc;

use crate::config::SessionContext;
use crate::dissector::{Dissector, DissectorError, DissectorFactory, Registration, Worker};
use crate::token::{NamespacePattern, TokenRegistry};

use worker::{Ipv6Tokens, Ipv6Worker};

pub const NAME: &str = "ipv6";

#[derive(Debug, Default, Clone, Copy)]
pub struct Ipv6Factory;

impl DissectorFactory for Ipv6Factory {
    fn name(&self) -> &str {
        NAME
    }

    fn create(&self, ctx: &SessionContext) -> Result<Registration, DissectorError> {
        let tokens = Arc::clone(ctx.tokens());
        let ids = Ipv6Tokens::new(&tokens);
        let pattern = NamespacePattern::parse(&tokens, "*ipv6");
        Ok(Registration::Dissector(Box::new(Ipv6Dissector {
            tokens,
            ids,
            pattern,
        })))
    }
}

struct Ipv6Dissector {
    tokens: Arc<TokenRegistry>,
    ids: Ipv6Tokens,
    pattern: NamespacePattern,
}

impl Dissector for Ipv6Dissector {
    fn name(&self) -> &str {
        NAME
    }

    fn namespaces(&self) -> Vec<NamespacePattern> {
        vec![self.pattern]
    }

    fn create_worker(&self) -> Result<Box<dyn Worker>, DissectorError> {
        Ok(Box::new(Ipv6Worker {
            tokens: Arc::clone(&self.tokens),
            ids: self.ids,
        }))
    }
}
