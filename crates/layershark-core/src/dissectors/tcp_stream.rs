//! Per-direction TCP sequence tracking.
//!
//! One worker exists per stream key. It reports where each segment's data
//! sits relative to the first byte seen on the stream and whether the
//! segment repeats data that was already delivered.

use crate::attr::Attribute;
use crate::config::SessionContext;
use crate::dissector::{
    DissectorError, DissectorFactory, Registration, StreamDissector, StreamWorker,
};
use crate::layer::Layer;
use crate::token::{NamespacePattern, Token};

pub const NAME: &str = "tcp-stream";

const SYN: u64 = 1 << 1;
const FIN: u64 = 1;

#[derive(Debug, Default, Clone, Copy)]
pub struct TcpStreamFactory;

impl DissectorFactory for TcpStreamFactory {
    fn name(&self) -> &str {
        NAME
    }

    fn create(&self, ctx: &SessionContext) -> Result<Registration, DissectorError> {
        let tokens = ctx.tokens();
        let namespace = tokens.intern(NAME);
        let field = |name: &str| tokens.compose_str(namespace, name);
        Ok(Registration::Stream(Box::new(TcpStreamDissector {
            ids: StreamTokens {
                namespace,
                id: field("id"),
                offset: field("offset"),
                length: field("length"),
                retransmit: field("retransmit"),
                tcp_seq: tokens.intern("tcp.seq"),
                tcp_flags: tokens.intern("tcp.flags"),
            },
            pattern: NamespacePattern::parse(tokens, "tcp"),
        })))
    }
}

#[derive(Debug, Clone, Copy)]
struct StreamTokens {
    namespace: Token,
    id: Token,
    offset: Token,
    length: Token,
    retransmit: Token,
    tcp_seq: Token,
    tcp_flags: Token,
}

struct TcpStreamDissector {
    ids: StreamTokens,
    pattern: NamespacePattern,
}

impl StreamDissector for TcpStreamDissector {
    fn name(&self) -> &str {
        NAME
    }

    fn namespaces(&self) -> Vec<NamespacePattern> {
        vec![self.pattern]
    }

    fn create_worker(&self, stream_key: u64) -> Result<Box<dyn StreamWorker>, DissectorError> {
        Ok(Box::new(TcpStreamWorker {
            ids: self.ids,
            stream_key,
            base_seq: None,
            next_seq: None,
        }))
    }
}

struct TcpStreamWorker {
    ids: StreamTokens,
    stream_key: u64,
    base_seq: Option<u32>,
    next_seq: Option<u32>,
}

impl StreamWorker for TcpStreamWorker {
    fn analyze(&mut self, layer: &Layer) -> Option<Layer> {
        let ids = self.ids;
        let seq = layer.attr(ids.tcp_seq)?;
        if seq.error {
            return None;
        }
        let seq = u32::try_from(seq.value.as_u64()?).ok()?;
        let flags = layer
            .attr(ids.tcp_flags)
            .and_then(|attr| attr.value.as_u64())
            .unwrap_or_default();
        let syn = u32::from(flags & SYN != 0);
        let fin = u32::from(flags & FIN != 0);

        let data_seq = seq.wrapping_add(syn);
        let length = layer.payload().len();
        let base = *self.base_seq.get_or_insert(data_seq);
        let retransmit = self
            .next_seq
            .is_some_and(|next| (data_seq.wrapping_sub(next) as i32) < 0);

        // Length is bounded by the frame, far below the sequence space.
        let end = data_seq.wrapping_add(length as u32).wrapping_add(fin);
        if self
            .next_seq
            .is_none_or(|next| (end.wrapping_sub(next) as i32) > 0)
        {
            self.next_seq = Some(end);
        }

        let offset = data_seq.wrapping_sub(base);
        let mut child = Layer::new(ids.namespace, layer.payload().clone());
        child.push(
            Attribute::new(ids.id, self.stream_key)
                .with_summary(format!("{:#018x}", self.stream_key)),
        );
        child.push(Attribute::new(ids.offset, offset));
        child.push(Attribute::new(ids.length, length as u64));
        child.push(Attribute::new(ids.retransmit, retransmit));
        let note = if retransmit { " (retransmission)" } else { "" };
        child.set_summary(format!("offset={offset} len={length}{note}"));
        Some(child)
    }
}
