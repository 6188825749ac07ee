//! UDP datagram header.

use crate::attr::Attribute;
use crate::config::SessionContext;
use crate::dissector::{Dissector, DissectorError, DissectorFactory, Registration, Worker};
use crate::dissectors::common::settle_confidence;
use crate::layer::Layer;
use crate::reader::ByteReader;
use crate::token::{NamespacePattern, Token};

pub const NAME: &str = "udp";

const HEADER_LEN: usize = 8;

#[derive(Debug, Default, Clone, Copy)]
pub struct UdpFactory;

impl DissectorFactory for UdpFactory {
    fn name(&self) -> &str {
        NAME
    }

    fn create(&self, ctx: &SessionContext) -> Result<Registration, DissectorError> {
        let tokens = ctx.tokens();
        let namespace = tokens.intern("udp");
        let field = |name: &str| tokens.compose_str(namespace, name);
        Ok(Registration::Dissector(Box::new(UdpDissector {
            namespace,
            src: field("src"),
            dst: field("dst"),
            length: field("length"),
            checksum: field("checksum"),
            pattern: NamespacePattern::parse(tokens, "*udp"),
        })))
    }
}

#[derive(Debug, Clone, Copy)]
struct UdpDissector {
    namespace: Token,
    src: Token,
    dst: Token,
    length: Token,
    checksum: Token,
    pattern: NamespacePattern,
}

impl Dissector for UdpDissector {
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

impl Worker for UdpDissector {
    fn analyze(&mut self, layer: &Layer) -> Option<Layer> {
        let input = layer.payload();
        let mut reader = ByteReader::new(input);
        let mut child = Layer::new(self.namespace, input.tail());

        let src: u16 = reader.read_be();
        child.push(Attribute::from_reader(self.src, src, &reader));
        let dst: u16 = reader.read_be();
        child.push(Attribute::from_reader(self.dst, dst, &reader));
        let length: u16 = reader.read_be();
        let length_read = !reader.last_error();
        child.push(Attribute::from_reader(self.length, length, &reader));
        let checksum: u16 = reader.read_be();
        child.push(Attribute::from_reader(self.checksum, checksum, &reader));

        if length_read && length != 0 && usize::from(length) < HEADER_LEN {
            child.add_error(self.length, format!("length {length} shorter than header"));
        }

        // A zero length is left to the lower layer (e.g. IPv6 jumbograms).
        let body_len = usize::from(length).saturating_sub(HEADER_LEN);
        let payload = if length == 0 || body_len > reader.remaining() {
            reader.remainder()
        } else {
            reader.slice(body_len)
        };

        child.set_summary(format!("{src} -> {dst} Len={}", payload.len()));
        child.set_payload(payload);
        child.mark_primary();
        settle_confidence(&mut child);
        Some(child)
    }
}
