//! TCP segment header, flags and the common options.
//!
//! The produced layer carries a directional stream key built from the
//! ports and the parent layer's `src`/`dst` addresses, so stream
//! dissectors registered on `tcp` see each half-connection separately.

mod layout;
mod worker;

use std::sync::Arc;

use crate::config::SessionContext;
use crate::dissector::{Dissector, DissectorError, DissectorFactory, Registration, Worker};
use crate::token::{NamespacePattern, TokenRegistry};

use worker::{TcpTokens, TcpWorker};

pub const NAME: &str = "tcp";

#[derive(Debug, Default, Clone, Copy)]
pub struct TcpFactory;

impl DissectorFactory for TcpFactory {
    fn name(&self) -> &str {
        NAME
    }

    fn create(&self, ctx: &SessionContext) -> Result<Registration, DissectorError> {
        let tokens = Arc::clone(ctx.tokens());
        let ids = TcpTokens::new(&tokens);
        let pattern = NamespacePattern::parse(&tokens, "*tcp");
        Ok(Registration::Dissector(Box::new(TcpDissector {
            tokens,
            ids,
            pattern,
        })))
    }
}

struct TcpDissector {
    tokens: Arc<TokenRegistry>,
    ids: TcpTokens,
    pattern: NamespacePattern,
}

impl Dissector for TcpDissector {
    fn name(&self) -> &str {
        NAME
    }

    fn namespaces(&self) -> Vec<NamespacePattern> {
        vec![self.pattern]
    }

    fn create_worker(&self) -> Result<Box<dyn Worker>, DissectorError> {
        Ok(Box::new(TcpWorker {
            tokens: Arc::clone(&self.tokens),
            ids: self.ids,
        }))
    }
}
