use crate::attr::Attribute;
use crate::frame::{Frame, LayerId};
use crate::layer::Layer;
use crate::slice::Slice;
use crate::token::Token;

/// Attribute hit returned by `FrameView::query`.
#[derive(Debug, Clone, Copy)]
pub struct QueryMatch<'f> {
    pub layer_id: LayerId,
    pub layer: &'f Layer,
    pub attr: &'f Attribute,
}

/// Read-only snapshot over a fully dissected frame.
#[derive(Debug)]
pub struct FrameView<'f> {
    frame: &'f Frame,
    primary: Option<LayerId>,
    leaves: Vec<LayerId>,
}

impl<'f> FrameView<'f> {
    pub fn new(frame: &'f Frame) -> Self {
        let leaves = frame
            .layers()
            .filter(|(id, _)| frame.children(*id).is_empty())
            .map(|(id, _)| id)
            .collect();
        Self {
            frame,
            primary: find_primary(frame),
            leaves,
        }
    }

    pub fn frame(&self) -> &'f Frame {
        self.frame
    }

    pub fn timestamp(&self) -> Option<f64> {
        self.frame.timestamp()
    }

    pub fn payload(&self) -> &'f Slice {
        self.frame.payload()
    }

    pub fn primary_layer_id(&self) -> Option<LayerId> {
        self.primary
    }

    /// Most specific decode: the last layer marked primary, otherwise the
    /// deepest layer on the first root's leftmost spine.
    pub fn primary_layer(&self) -> Option<&'f Layer> {
        self.primary.and_then(|id| self.frame.layer(id))
    }

    /// Layers without children, in pre-order.
    pub fn leaf_layers(&self) -> impl Iterator<Item = &'f Layer> + '_ {
        self.leaves.iter().filter_map(|id| self.frame.layer(*id))
    }

    pub fn leaf_ids(&self) -> &[LayerId] {
        &self.leaves
    }

    /// First attribute with `id` in pre-order, with its owning layer.
    pub fn query(&self, id: Token) -> Option<QueryMatch<'f>> {
        let frame = self.frame;
        frame.layers().find_map(|(layer_id, layer)| {
            layer.attr(id).map(|attr| QueryMatch {
                layer_id,
                layer,
                attr,
            })
        })
    }

    pub fn attr(&self, id: Token) -> Option<&'f Attribute> {
        self.query(id).map(|hit| hit.attr)
    }
}

fn find_primary(frame: &Frame) -> Option<LayerId> {
    let marked = frame
        .layers()
        .filter(|(_, layer)| layer.is_primary())
        .map(|(id, _)| id)
        .last();
    if marked.is_some() {
        return marked;
    }
    let mut current = *frame.roots().first()?;
    while let Some(first) = frame.children(current).first() {
        current = *first;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::FrameView;
    use crate::attr::Attribute;
    use crate::frame::Frame;
    use crate::layer::Layer;
    use crate::slice::Slice;
    use crate::token::TokenRegistry;

    fn sample(tokens: &TokenRegistry) -> Frame {
        let mut frame = Frame::new(7, 1.5, Slice::new(vec![0u8; 4]));
        let root = frame.add_root(Layer::new(tokens.intern("root"), Slice::default()));
        let mut eth = Layer::new(tokens.intern("eth"), Slice::default());
        eth.push(Attribute::new(tokens.intern("eth.type"), 0x86ddu16));
        let eth = frame.attach(root, eth).unwrap();
        let mut ip = Layer::new(tokens.intern("ipv6"), Slice::default());
        ip.push(Attribute::new(tokens.intern("ipv6.hLimit"), 64u8));
        frame.attach(eth, ip).unwrap();
        let mut extra = Layer::new(tokens.intern("trailer"), Slice::default());
        extra.push(Attribute::new(tokens.intern("eth.type"), 1u8));
        frame.attach(root, extra).unwrap();
        frame
    }

    #[test]
    fn primary_defaults_to_leftmost_deepest() {
        let tokens = TokenRegistry::new();
        let frame = sample(&tokens);
        let view = FrameView::new(&frame);
        let primary = view.primary_layer().unwrap();
        assert_eq!(primary.namespace(), tokens.intern("ipv6"));
    }

    #[test]
    fn explicit_primary_mark_wins() {
        let tokens = TokenRegistry::new();
        let mut frame = sample(&tokens);
        let root = frame.roots()[0];
        let mut marked = Layer::new(tokens.intern("marked"), Slice::default());
        marked.mark_primary();
        frame.attach(root, marked).unwrap();
        let view = FrameView::new(&frame);
        assert_eq!(view.primary_layer().unwrap().namespace(), tokens.intern("marked"));
    }

    #[test]
    fn leaves_in_pre_order() {
        let tokens = TokenRegistry::new();
        let frame = sample(&tokens);
        let view = FrameView::new(&frame);
        let leaves: Vec<_> = view.leaf_layers().map(|layer| layer.namespace()).collect();
        assert_eq!(leaves, vec![tokens.intern("ipv6"), tokens.intern("trailer")]);
    }

    #[test]
    fn query_returns_first_match_in_pre_order() {
        let tokens = TokenRegistry::new();
        let frame = sample(&tokens);
        let view = FrameView::new(&frame);
        let hit = view.query(tokens.intern("eth.type")).unwrap();
        assert_eq!(hit.layer.namespace(), tokens.intern("eth"));
        assert_eq!(hit.attr.value.as_u64(), Some(0x86dd));
        assert!(view.query(tokens.intern("missing")).is_none());
        assert_eq!(view.timestamp(), Some(1.5));
    }

    #[test]
    fn empty_frame_has_no_primary() {
        let frame = Frame::new(0, 0.0, Slice::default());
        let view = FrameView::new(&frame);
        assert!(view.primary_layer().is_none());
        assert_eq!(view.leaf_ids().len(), 0);
    }
}
