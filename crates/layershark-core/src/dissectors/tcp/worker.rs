use std::ops::Range;
use std::sync::Arc;

use super::layout;
use crate::attr::{Attribute, Variant};
use crate::dissector::Worker;
use crate::dissectors::common::{fnv1a, settle_confidence};
use crate::layer::Layer;
use crate::reader::ByteReader;
use crate::token::{Token, TokenRegistry};

#[derive(Debug, Clone, Copy)]
pub(crate) struct TcpTokens {
    pub namespace: Token,
    pub src: Token,
    pub dst: Token,
    pub seq: Token,
    pub ack: Token,
    pub offset: Token,
    pub flags: Token,
    pub flag_ns: Token,
    pub flag_bits: [Token; layout::FLAG_BITS.len()],
    pub window: Token,
    pub checksum: Token,
    pub urgent: Token,
    pub options: Token,
    pub option_nop: Token,
    pub option_mss: Token,
    pub option_scale: Token,
    pub option_sack_permitted: Token,
    pub typ_flags: Token,
    pub typ_nested: Token,
    pub typ_novalue: Token,
}

impl TcpTokens {
    pub(crate) fn new(tokens: &TokenRegistry) -> Self {
        let namespace = tokens.intern("tcp");
        let field = |name: &str| tokens.compose_str(namespace, name);
        let flags = field("flags");
        let options = field("options");
        Self {
            namespace,
            src: field("src"),
            dst: field("dst"),
            seq: field("seq"),
            ack: field("ack"),
            offset: field("offset"),
            flags,
            flag_ns: tokens.compose_str(flags, "ns"),
            flag_bits: layout::FLAG_BITS.map(|(name, _)| tokens.compose_str(flags, name)),
            window: field("window"),
            checksum: field("checksum"),
            urgent: field("urgent"),
            options,
            option_nop: tokens.compose_str(options, "nop"),
            option_mss: tokens.compose_str(options, "mss"),
            option_scale: tokens.compose_str(options, "scale"),
            option_sack_permitted: tokens.compose_str(options, "selectiveAckPermitted"),
            typ_flags: tokens.intern("@flags"),
            typ_nested: tokens.intern("@nested"),
            typ_novalue: tokens.intern("@novalue"),
        }
    }
}

pub(crate) struct TcpWorker {
    pub(crate) tokens: Arc<TokenRegistry>,
    pub(crate) ids: TcpTokens,
}

impl TcpWorker {
    /// Directional key: the two halves of a connection get different keys.
    fn stream_key(&self, parent: &Layer, src_port: u16, dst_port: u16) -> u64 {
        fnv1a(&[
            parent_address(&self.tokens, parent, "src"),
            &src_port.to_be_bytes(),
            parent_address(&self.tokens, parent, "dst"),
            &dst_port.to_be_bytes(),
        ])
    }
}

fn parent_address<'l>(tokens: &TokenRegistry, parent: &'l Layer, field: &str) -> &'l [u8] {
    let id = tokens.compose_str(parent.namespace(), field);
    parent
        .attr(id)
        .and_then(|attr| attr.value.as_bytes())
        .unwrap_or_default()
}

impl Worker for TcpWorker {
    fn analyze(&mut self, layer: &Layer) -> Option<Layer> {
        let ids = self.ids;
        let input = layer.payload();
        let base = input.offset();
        let end = input.range().end;
        let fixed =
            |range: Range<usize>| (base + range.start).min(end)..(base + range.end).min(end);

        let mut reader = ByteReader::new(input);
        let mut child = Layer::new(ids.namespace, input.tail());
        child.add_tag(ids.namespace);

        let src_port: u16 = reader.read_be();
        child.push(Attribute::from_reader(ids.src, src_port, &reader));
        let dst_port: u16 = reader.read_be();
        child.push(Attribute::from_reader(ids.dst, dst_port, &reader));

        let seq: u32 = reader.read_be();
        child.push(Attribute::from_reader(ids.seq, seq, &reader));
        let ack: u32 = reader.read_be();
        child.push(Attribute::from_reader(ids.ack, ack, &reader));

        let offset_and_ns: u8 = reader.read_be();
        let data_offset = offset_and_ns >> 4;
        child.push(Attribute::from_reader(ids.offset, data_offset, &reader));
        let declared_len = usize::from(data_offset) * layout::OFFSET_UNIT;
        if !reader.last_error() && declared_len < layout::MIN_HEADER_LEN {
            child.add_error(
                ids.offset,
                format!("data offset {data_offset} below minimum header length"),
            );
        }

        let low_flags: u8 = reader.read_be();
        let flags_error = reader.last_error();
        let flags = u16::from(low_flags) | (u16::from(offset_and_ns & 0x1) << 8);
        child.push(
            Attribute::new(ids.flags, flags)
                .with_range(fixed(layout::FLAGS_RANGE))
                .with_error(flags_error)
                .with_typ(ids.typ_flags),
        );
        child.push(
            Attribute::new(ids.flag_ns, flags & layout::FLAG_NS != 0)
                .with_range(fixed(layout::NS_FLAG_RANGE))
                .with_error(flags_error),
        );
        let mut set_flags = Vec::new();
        for (id, (name, bit)) in ids.flag_bits.iter().zip(layout::FLAG_BITS) {
            let set = flags & bit != 0;
            if set {
                set_flags.push(name.to_ascii_uppercase());
            }
            child.push(
                Attribute::new(*id, set)
                    .with_range(fixed(layout::FLAG_BITS_RANGE))
                    .with_error(flags_error),
            );
        }

        let window: u16 = reader.read_be();
        child.push(Attribute::from_reader(ids.window, window, &reader));
        let checksum: u16 = reader.read_be();
        child.push(Attribute::from_reader(ids.checksum, checksum, &reader));
        let urgent: u16 = reader.read_be();
        child.push(Attribute::from_reader(ids.urgent, urgent, &reader));

        let header_len =
            (usize::from(data_offset) * layout::OFFSET_UNIT).max(layout::MIN_HEADER_LEN);
        child.push(
            Attribute::new(ids.options, Variant::Nil)
                .with_range(fixed(layout::MIN_HEADER_LEN..header_len))
                .with_error(reader.last_error())
                .with_typ(ids.typ_nested),
        );

        while !reader.last_error() && reader.position() < header_len {
            let kind: u8 = reader.read_be();
            let kind_range = reader.last_range();
            match kind {
                layout::OPTION_NOP => {
                    child.push(
                        Attribute::new(ids.option_nop, true)
                            .with_range(kind_range)
                            .with_typ(ids.typ_novalue),
                    );
                }
                layout::OPTION_MSS => {
                    reader.skip(1);
                    let mss: u16 = reader.read_be();
                    child.push(Attribute::from_reader(ids.option_mss, mss, &reader));
                }
                layout::OPTION_SCALE => {
                    reader.skip(1);
                    let shift: u8 = reader.read_be();
                    child.push(Attribute::from_reader(ids.option_scale, shift, &reader));
                }
                layout::OPTION_SACK_PERMITTED => {
                    reader.skip(1);
                    child.push(
                        Attribute::new(ids.option_sack_permitted, true)
                            .with_range(kind_range.start..reader.last_range().end)
                            .with_error(reader.last_error()),
                    );
                }
                // End of option list, or a kind we do not decode.
                _ => break,
            }
        }
        if reader.position() < header_len {
            reader.skip(header_len - reader.position());
        }

        let payload = reader.remainder();
        let flag_list = if set_flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", set_flags.join(", "))
        };
        child.set_summary(format!(
            "{src_port} -> {dst_port}{flag_list} Seq={seq} Ack={ack} Win={window} Len={}",
            payload.len()
        ));
        child.set_payload(payload);
        child.set_stream_key(self.stream_key(layer, src_port, dst_port));
        child.mark_primary();
        settle_confidence(&mut child);
        Some(child)
    }
}
