use std::ops::Range;
use std::sync::Arc;

use bytes::Bytes;
use etherparse::IpNumber;

use super::layout;
use crate::attr::{Attribute, Variant};
use crate::dissector::Worker;
use crate::dissectors::common::{ip_protocol, ipv6_addr, settle_confidence};
use crate::layer::Layer;
use crate::reader::ByteReader;
use crate::slice::Slice;
use crate::token::{Token, TokenRegistry};

#[derive(Debug, Clone, Copy)]
pub(crate) struct Ipv6Tokens {
    pub namespace: Token,
    pub version: Token,
    pub traffic_class: Token,
    pub flow_label: Token,
    pub payload_len: Token,
    pub next_header: Token,
    pub hop_limit: Token,
    pub src: Token,
    pub dst: Token,
    pub hop_by_hop: Token,
    pub dst_options: Token,
    pub protocol: Token,
}

impl Ipv6Tokens {
    pub(crate) fn new(tokens: &TokenRegistry) -> Self {
        let namespace = tokens.intern("ipv6");
        let field = |name: &str| tokens.compose_str(namespace, name);
        Self {
            namespace,
            version: field("version"),
            traffic_class: field("tClass"),
            flow_label: field("fLevel"),
            payload_len: field("pLen"),
            next_header: field("nHeader"),
            hop_limit: field("hLimit"),
            src: field("src"),
            dst: field("dst"),
            hop_by_hop: field("hbyh"),
            dst_options: field("dstOpts"),
            protocol: field("protocol"),
        }
    }
}

pub(crate) struct Ipv6Worker {
    pub(crate) tokens: Arc<TokenRegistry>,
    pub(crate) ids: Ipv6Tokens,
}

impl Worker for Ipv6Worker {
    fn analyze(&mut self, layer: &Layer) -> Option<Layer> {
        let ids = self.ids;
        let input = layer.payload();
        let base = input.offset();
        let end = input.range().end;
        let fixed =
            |range: Range<usize>| (base + range.start).min(end)..(base + range.end).min(end);

        let mut reader = ByteReader::new(input);
        let mut child = Layer::new(ids.namespace, input.tail());

        let header: u8 = reader.read_be();
        let version_error = reader.last_error();
        let header2: u8 = reader.read_be();
        let class_error = reader.last_error();
        let flow_low: u16 = reader.read_be();
        let flow_error = reader.last_error();

        let version = header >> 4;
        let traffic_class = ((header & 0x0f) << 4) | (header2 >> 4);
        let flow_label = u32::from(flow_low) | (u32::from(header2 & 0x0f) << 16);

        child.push(
            Attribute::new(ids.version, version)
                .with_range(fixed(layout::VERSION_RANGE))
                .with_error(version_error),
        );
        child.push(
            Attribute::new(ids.traffic_class, traffic_class)
                .with_range(fixed(layout::TRAFFIC_CLASS_RANGE))
                .with_error(class_error),
        );
        child.push(
            Attribute::new(ids.flow_label, flow_label)
                .with_range(fixed(layout::FLOW_LABEL_RANGE))
                .with_error(flow_error),
        );

        let payload_len: u16 = reader.read_be();
        child.push(Attribute::from_reader(ids.payload_len, payload_len, &reader));

        let mut next_header: u8 = reader.read_be();
        let mut protocol_range = reader.last_range();
        child.push(Attribute::from_reader(ids.next_header, next_header, &reader));

        let hop_limit: u8 = reader.read_be();
        child.push(Attribute::from_reader(ids.hop_limit, hop_limit, &reader));

        let src = address(reader.slice(layout::ADDR_LEN));
        let src_summary = ipv6_addr(src.as_bytes()).to_string();
        child.push(
            Attribute::from_reader(ids.src, src, &reader).with_summary(src_summary.clone()),
        );

        let dst = address(reader.slice(layout::ADDR_LEN));
        let dst_summary = ipv6_addr(dst.as_bytes()).to_string();
        child.push(
            Attribute::from_reader(ids.dst, dst, &reader).with_summary(dst_summary.clone()),
        );

        // Each pass consumes at least the two prefix octets, or fails and stops.
        while !reader.last_error() {
            let id = match IpNumber(next_header) {
                IpNumber::IPV6_HEADER_HOP_BY_HOP => ids.hop_by_hop,
                IpNumber::IPV6_DESTINATION_OPTIONS => ids.dst_options,
                _ => break,
            };
            let start = base + reader.position();
            let header: u8 = reader.read_be();
            let header_range = reader.last_range();
            let ext_len: u8 = reader.read_be();
            let byte_len = (usize::from(ext_len) + 1) * layout::EXT_UNIT;
            reader.skip(byte_len - layout::EXT_PREFIX_LEN);
            let stop = reader.last_range().end;
            child.push(
                Attribute::new(id, Variant::Nil)
                    .with_range(start..stop)
                    .with_error(reader.last_error()),
            );
            next_header = header;
            protocol_range = header_range;
        }

        let protocol_name = match ip_protocol(next_header) {
            Some((name, segment)) => {
                child.set_dispatch(self.tokens.compose_str(ids.namespace, segment));
                name
            }
            None => "Unknown",
        };
        child.push(
            Attribute::new(ids.protocol, next_header)
                .with_range(protocol_range)
                .with_summary(protocol_name)
                .with_error(reader.last_error()),
        );

        child.set_summary(format!("[{protocol_name}] {src_summary} -> {dst_summary}"));
        child.set_payload(reader.remainder());
        settle_confidence(&mut child);
        Some(child)
    }
}

/// Truncated addresses read as the unspecified address `::`.
fn address(bytes: Slice) -> Slice {
    if bytes.len() == layout::ADDR_LEN {
        bytes
    } else {
        Slice::new(Bytes::from_static(&[0; layout::ADDR_LEN]))
    }
}
