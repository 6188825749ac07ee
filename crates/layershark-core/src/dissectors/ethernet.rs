//! Ethernet II with optional 802.1Q tags.

use std::sync::Arc;

use etherparse::EtherType;

use crate::attr::Attribute;
use crate::config::SessionContext;
use crate::dissector::{Dissector, DissectorError, DissectorFactory, Registration, Worker};
use crate::dissectors::common::{mac_addr, settle_confidence};
use crate::layer::Layer;
use crate::reader::ByteReader;
use crate::token::{NamespacePattern, Token, TokenRegistry};

pub const NAME: &str = "eth";

const MAC_LEN: usize = 6;
/// Stacked VLAN tags decoded before giving up.
const MAX_VLAN_TAGS: usize = 2;

fn ether_type(value: u16) -> Option<(&'static str, &'static str)> {
    let entry = match EtherType(value) {
        EtherType::IPV4 => ("IPv4", "ipv4"),
        EtherType::IPV6 => ("IPv6", "ipv6"),
        EtherType::ARP => ("ARP", "arp"),
        _ => return None,
    };
    Some(entry)
}

fn is_vlan(value: u16) -> bool {
    matches!(
        EtherType(value),
        EtherType::VLAN_TAGGED_FRAME | EtherType::PROVIDER_BRIDGING | EtherType::VLAN_DOUBLE_TAGGED_FRAME
    )
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EthernetFactory;

impl DissectorFactory for EthernetFactory {
    fn name(&self) -> &str {
        NAME
    }

    fn create(&self, ctx: &SessionContext) -> Result<Registration, DissectorError> {
        let tokens = Arc::clone(ctx.tokens());
        let namespace = tokens.intern("eth");
        let field = |name: &str| tokens.compose_str(namespace, name);
        let ids = EthernetTokens {
            namespace,
            dst: field("dst"),
            src: field("src"),
            vlan: field("vlan"),
            ether_type: field("type"),
        };
        Ok(Registration::Dissector(Box::new(EthernetDissector {
            pattern: NamespacePattern::parse(&tokens, "*eth"),
            tokens,
            ids,
        })))
    }
}

#[derive(Debug, Clone, Copy)]
struct EthernetTokens {
    namespace: Token,
    dst: Token,
    src: Token,
    vlan: Token,
    ether_type: Token,
}

struct EthernetDissector {
    tokens: Arc<TokenRegistry>,
    ids: EthernetTokens,
    pattern: NamespacePattern,
}

impl Dissector for EthernetDissector {
    fn name(&self) -> &str {
        NAME
    }

    fn namespaces(&self) -> Vec<NamespacePattern> {
        vec![self.pattern]
    }

    fn create_worker(&self) -> Result<Box<dyn Worker>, DissectorError> {
        Ok(Box::new(EthernetWorker {
            tokens: Arc::clone(&self.tokens),
            ids: self.ids,
        }))
    }
}

struct EthernetWorker {
    tokens: Arc<TokenRegistry>,
    ids: EthernetTokens,
}

impl Worker for EthernetWorker {
    fn analyze(&mut self, layer: &Layer) -> Option<Layer> {
        let ids = self.ids;
        let input = layer.payload();
        let mut reader = ByteReader::new(input);
        let mut child = Layer::new(ids.namespace, input.tail());

        let dst = reader.slice(MAC_LEN);
        let dst_summary = mac_addr(dst.as_bytes());
        child.push(Attribute::from_reader(ids.dst, dst, &reader).with_summary(dst_summary.clone()));
        let src = reader.slice(MAC_LEN);
        let src_summary = mac_addr(src.as_bytes());
        child.push(Attribute::from_reader(ids.src, src, &reader).with_summary(src_summary.clone()));

        let mut kind: u16 = reader.read_be();
        let mut kind_range = reader.last_range();
        let mut tags = 0;
        while is_vlan(kind) && tags < MAX_VLAN_TAGS && !reader.last_error() {
            let tci: u16 = reader.read_be();
            child.push(
                Attribute::from_reader(ids.vlan, tci & 0x0fff, &reader)
                    .with_summary(format!("VLAN {}", tci & 0x0fff)),
            );
            kind = reader.read_be();
            kind_range = reader.last_range();
            tags += 1;
        }

        let label = match ether_type(kind) {
            Some((label, segment)) => {
                child.set_dispatch(self.tokens.compose_str(ids.namespace, segment));
                label
            }
            None => "Unknown",
        };
        child.push(
            Attribute::new(ids.ether_type, kind)
                .with_range(kind_range)
                .with_summary(label)
                .with_error(reader.last_error()),
        );

        child.set_summary(format!("[{label}] {src_summary} -> {dst_summary}"));
        child.set_payload(reader.remainder());
        settle_confidence(&mut child);
        Some(child)
    }
}
