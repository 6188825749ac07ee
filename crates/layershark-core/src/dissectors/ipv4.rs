//! IPv4 header. Options are covered by one attribute and not decoded.

use std::sync::Arc;

use crate::attr::{Attribute, Variant};
use crate::config::SessionContext;
use crate::dissector::{Dissector, DissectorError, DissectorFactory, Registration, Worker};
use crate::dissectors::common::{ip_protocol, ipv4_addr, settle_confidence};
use crate::layer::Layer;
use crate::reader::ByteReader;
use crate::token::{NamespacePattern, Token, TokenRegistry};

pub const NAME: &str = "ipv4";

const MIN_HEADER_LEN: usize = 20;
const ADDR_LEN: usize = 4;
const IHL_UNIT: usize = 4;
const FLAG_DONT_FRAGMENT: u16 = 0x4000;
const FLAG_MORE_FRAGMENTS: u16 = 0x2000;
const FRAGMENT_OFFSET_MASK: u16 = 0x1fff;

#[derive(Debug, Clone, Copy)]
struct Ipv4Tokens {
    namespace: Token,
    version: Token,
    header_len: Token,
    tos: Token,
    total_len: Token,
    id: Token,
    flags: Token,
    dont_fragment: Token,
    more_fragments: Token,
    fragment_offset: Token,
    ttl: Token,
    protocol: Token,
    checksum: Token,
    src: Token,
    dst: Token,
    options: Token,
}

impl Ipv4Tokens {
    fn new(tokens: &TokenRegistry) -> Self {
        let namespace = tokens.intern("ipv4");
        let field = |name: &str| tokens.compose_str(namespace, name);
        let flags = field("flags");
        Self {
            namespace,
            version: field("version"),
            header_len: field("headerLength"),
            tos: field("type"),
            total_len: field("totalLength"),
            id: field("id"),
            flags,
            dont_fragment: tokens.compose_str(flags, "dontFragment"),
            more_fragments: tokens.compose_str(flags, "moreFragments"),
            fragment_offset: field("fragmentOffset"),
            ttl: field("ttl"),
            protocol: field("protocol"),
            checksum: field("checksum"),
            src: field("src"),
            dst: field("dst"),
            options: field("options"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Ipv4Factory;

impl DissectorFactory for Ipv4Factory {
    fn name(&self) -> &str {
        NAME
    }

    fn create(&self, ctx: &SessionContext) -> Result<Registration, DissectorError> {
        let tokens = Arc::clone(ctx.tokens());
        Ok(Registration::Dissector(Box::new(Ipv4Dissector {
            ids: Ipv4Tokens::new(&tokens),
            pattern: NamespacePattern::parse(&tokens, "*ipv4"),
            tokens,
        })))
    }
}

struct Ipv4Dissector {
    tokens: Arc<TokenRegistry>,
    ids: Ipv4Tokens,
    pattern: NamespacePattern,
}

impl Dissector for Ipv4Dissector {
    fn name(&self) -> &str {
        NAME
    }

    fn namespaces(&self) -> Vec<NamespacePattern> {
        vec![self.pattern]
    }

    fn create_worker(&self) -> Result<Box<dyn Worker>, DissectorError> {
        Ok(Box::new(Ipv4Worker {
            tokens: Arc::clone(&self.tokens),
            ids: self.ids,
        }))
    }
}

struct Ipv4Worker {
    tokens: Arc<TokenRegistry>,
    ids: Ipv4Tokens,
}

impl Worker for Ipv4Worker {
    fn analyze(&mut self, layer: &Layer) -> Option<Layer> {
        let ids = self.ids;
        let input = layer.payload();
        let mut reader = ByteReader::new(input);
        let mut child = Layer::new(ids.namespace, input.tail());

        let version_and_ihl: u8 = reader.read_be();
        child.push(Attribute::from_reader(ids.version, version_and_ihl >> 4, &reader));
        let header_len = usize::from(version_and_ihl & 0x0f) * IHL_UNIT;
        child.push(Attribute::from_reader(ids.header_len, header_len as u64, &reader));
        if !reader.last_error() && header_len < MIN_HEADER_LEN {
            child.add_error(
                ids.header_len,
                format!("header length {header_len} below minimum {MIN_HEADER_LEN}"),
            );
        }

        let tos: u8 = reader.read_be();
        child.push(Attribute::from_reader(ids.tos, tos, &reader));
        let total_len: u16 = reader.read_be();
        let total_len_read = !reader.last_error();
        child.push(Attribute::from_reader(ids.total_len, total_len, &reader));
        let id: u16 = reader.read_be();
        child.push(Attribute::from_reader(ids.id, id, &reader));

        let flags_and_offset: u16 = reader.read_be();
        child.push(Attribute::from_reader(ids.flags, flags_and_offset >> 13, &reader));
        child.push(Attribute::from_reader(
            ids.dont_fragment,
            flags_and_offset & FLAG_DONT_FRAGMENT != 0,
            &reader,
        ));
        child.push(Attribute::from_reader(
            ids.more_fragments,
            flags_and_offset & FLAG_MORE_FRAGMENTS != 0,
            &reader,
        ));
        child.push(Attribute::from_reader(
            ids.fragment_offset,
            flags_and_offset & FRAGMENT_OFFSET_MASK,
            &reader,
        ));

        let ttl: u8 = reader.read_be();
        child.push(Attribute::from_reader(ids.ttl, ttl, &reader));
        let protocol: u8 = reader.read_be();
        let protocol_range = reader.last_range();
        let protocol_error = reader.last_error();
        let checksum: u16 = reader.read_be();
        let checksum_attr = Attribute::from_reader(ids.checksum, checksum, &reader);

        let label = match ip_protocol(protocol) {
            Some((label, segment)) => {
                child.set_dispatch(self.tokens.compose_str(ids.namespace, segment));
                label
            }
            None => "Unknown",
        };
        child.push(
            Attribute::new(ids.protocol, protocol)
                .with_range(protocol_range)
                .with_summary(label)
                .with_error(protocol_error),
        );
        child.push(checksum_attr);

        let src = reader.slice(ADDR_LEN);
        let src_summary = ipv4_addr(src.as_bytes()).to_string();
        child.push(Attribute::from_reader(ids.src, src, &reader).with_summary(src_summary.clone()));
        let dst = reader.slice(ADDR_LEN);
        let dst_summary = ipv4_addr(dst.as_bytes()).to_string();
        child.push(Attribute::from_reader(ids.dst, dst, &reader).with_summary(dst_summary.clone()));

        if header_len > MIN_HEADER_LEN {
            let options = reader.slice(header_len - MIN_HEADER_LEN);
            child.push(Attribute::from_reader(ids.options, Variant::Bytes(options), &reader));
        }

        if total_len_read && total_len != 0 && usize::from(total_len) < reader.position() {
            child.add_error(
                ids.total_len,
                format!("total length {total_len} shorter than header"),
            );
        }

        let body_len = usize::from(total_len).saturating_sub(reader.position());
        let payload = if total_len == 0 || body_len > reader.remaining() {
            // Zero total length shows up with TCP segmentation offload.
            reader.remainder()
        } else {
            reader.slice(body_len)
        };

        child.set_summary(format!("[{label}] {src_summary} -> {dst_summary}"));
        child.set_payload(payload);
        settle_confidence(&mut child);
        Some(child)
    }
}

#[cfg(test)]
mod tests {
    use super::Ipv4Factory;
    use crate::attr::Variant;
    use crate::config::{SessionConfig, SessionContext};
    use crate::dissector::{DissectorFactory, Registration};
    use crate::layer::{Confidence, Layer};
    use crate::slice::Slice;
    use crate::token::TokenRegistry;
    use std::sync::Arc;

    fn run(tokens: &Arc<TokenRegistry>, data: Vec<u8>) -> Layer {
        let ctx = SessionContext::new(Arc::clone(tokens), SessionConfig::default());
        let Registration::Dissector(dissector) = Ipv4Factory.create(&ctx).expect("create") else {
            panic!("expected a stateless dissector");
        };
        let input = Layer::new(tokens.intern("eth.ipv4"), Slice::new(data));
        dissector
            .create_worker()
            .expect("worker")
            .analyze(&input)
            .expect("ipv4 layer")
    }

    fn header(ihl: u8, total_len: u16, protocol: u8) -> Vec<u8> {
        let mut bytes = vec![0x40 | ihl, 0];
        bytes.extend_from_slice(&total_len.to_be_bytes());
        bytes.extend_from_slice(&[0x12, 0x34, 0x40, 0x00, 64, protocol, 0, 0]);
        bytes.extend_from_slice(&[192, 168, 0, 1]);
        bytes.extend_from_slice(&[192, 168, 0, 2]);
        bytes
    }

    #[test]
    fn decodes_header_and_bounds_payload() {
        let tokens = Arc::new(TokenRegistry::new());
        let mut data = header(5, 24, 17);
        data.extend_from_slice(&[1, 2, 3, 4]);
        // Ethernet padding after the datagram.
        data.extend_from_slice(&[0, 0]);
        let layer = run(&tokens, data);

        let attr = |name: &str| layer.attr(tokens.intern(name)).expect(name).clone();
        assert_eq!(attr("ipv4.version").value, Variant::UInt(4));
        assert_eq!(attr("ipv4.headerLength").value, Variant::UInt(20));
        assert_eq!(attr("ipv4.id").value, Variant::UInt(0x1234));
        assert_eq!(attr("ipv4.flags.dontFragment").value, Variant::Bool(true));
        assert_eq!(attr("ipv4.ttl").value, Variant::UInt(64));
        assert_eq!(attr("ipv4.protocol").summary.as_deref(), Some("UDP"));
        assert_eq!(attr("ipv4.src").summary.as_deref(), Some("192.168.0.1"));
        assert_eq!(attr("ipv4.dst").range, Some(16..20));
        assert_eq!(layer.dispatch(), Some(tokens.intern("ipv4.udp")));
        assert_eq!(layer.payload().range(), 20..24);
        assert_eq!(layer.summary(), Some("[UDP] 192.168.0.1 -> 192.168.0.2"));
        assert_eq!(layer.confidence(), Confidence::Exact);
    }

    #[test]
    fn header_only_datagram_leaves_padding_out_of_payload() {
        let tokens = Arc::new(TokenRegistry::new());
        let mut data = header(5, 20, 17);
        data.extend_from_slice(&[0; 6]);
        let layer = run(&tokens, data);
        assert!(layer.payload().is_empty());
        assert_eq!(layer.payload().range(), 20..20);
        assert!(layer.errors().is_empty());
    }

    #[test]
    fn zero_total_length_takes_the_rest() {
        let tokens = Arc::new(TokenRegistry::new());
        let mut data = header(5, 0, 6);
        data.extend_from_slice(&[7, 7, 7]);
        let layer = run(&tokens, data);
        assert_eq!(layer.payload().as_bytes(), &[7, 7, 7]);
        assert_eq!(layer.confidence(), Confidence::Exact);
    }

    #[test]
    fn short_header_length_is_a_layer_error() {
        let tokens = Arc::new(TokenRegistry::new());
        let mut data = header(3, 24, 17);
        data.extend_from_slice(&[1, 2, 3, 4]);
        let layer = run(&tokens, data);
        assert_eq!(layer.errors().len(), 1);
        assert_eq!(layer.errors()[0].id, tokens.intern("ipv4.headerLength"));
        assert_eq!(layer.confidence(), Confidence::Error);
    }

    #[test]
    fn skips_options_by_header_length() {
        let tokens = Arc::new(TokenRegistry::new());
        let mut data = header(6, 28, 6);
        data.extend_from_slice(&[1, 1, 0, 0]);
        data.extend_from_slice(&[9, 9, 9, 9]);
        let layer = run(&tokens, data);

        let options = layer.attr(tokens.intern("ipv4.options")).expect("options");
        assert_eq!(options.range, Some(20..24));
        assert_eq!(layer.payload().as_bytes(), &[9, 9, 9, 9]);
        assert_eq!(layer.dispatch(), Some(tokens.intern("ipv4.tcp")));
    }

    #[test]
    fn truncated_header_marks_addresses() {
        let tokens = Arc::new(TokenRegistry::new());
        let data = header(5, 20, 6)[..14].to_vec();
        let layer = run(&tokens, data);
        assert!(layer.attr(tokens.intern("ipv4.src")).expect("src").error);
        assert!(layer.attr(tokens.intern("ipv4.dst")).expect("dst").error);
        assert!(!layer.attr(tokens.intern("ipv4.ttl")).expect("ttl").error);
        assert!(layer.payload().is_empty());
        assert_eq!(layer.confidence(), Confidence::Error);
    }
}
