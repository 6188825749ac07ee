use crate::layer::Layer;
use crate::slice::Slice;

/// Index of a layer inside its frame's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(u32);

impl LayerId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct LayerNode {
    layer: Layer,
    parent: Option<LayerId>,
    children: Vec<LayerId>,
    origin: Option<usize>,
}

/// One captured packet and the layer tree decoded from it.
///
/// Layers are stored in an arena addressed by `LayerId`; parent links are
/// plain indices. `tree_indices` is the pre-order flattening of the tree and
/// is rebuilt on every attach, so it always covers every layer exactly once.
#[derive(Debug, Clone)]
pub struct Frame {
    index: u32,
    timestamp: Option<f64>,
    payload: Slice,
    nodes: Vec<LayerNode>,
    roots: Vec<LayerId>,
    tree_indices: Vec<u32>,
}

impl Frame {
    pub fn new(index: u32, timestamp: impl Into<Option<f64>>, payload: Slice) -> Self {
        Self {
            index,
            timestamp: timestamp.into(),
            payload,
            nodes: Vec::new(),
            roots: Vec::new(),
            tree_indices: Vec::new(),
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Capture time in seconds since the epoch, when the source recorded one.
    pub fn timestamp(&self) -> Option<f64> {
        self.timestamp
    }

    /// Raw captured bytes.
    pub fn payload(&self) -> &Slice {
        &self.payload
    }

    /// Add a top-level layer.
    pub fn add_root(&mut self, layer: Layer) -> LayerId {
        let id = self.insert(layer, None, None);
        self.roots.push(id);
        self.rebuild_tree_indices();
        id
    }

    /// Attach `layer` as the last child of `parent`.
    ///
    /// Returns `None` when `parent` does not belong to this frame.
    pub fn attach(&mut self, parent: LayerId, layer: Layer) -> Option<LayerId> {
        self.attach_from(parent, layer, None)
    }

    pub(crate) fn attach_from(
        &mut self,
        parent: LayerId,
        layer: Layer,
        origin: Option<usize>,
    ) -> Option<LayerId> {
        self.nodes.get(parent.index())?;
        let id = self.insert(layer, Some(parent), origin);
        self.nodes[parent.index()].children.push(id);
        self.rebuild_tree_indices();
        Some(id)
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.nodes.get(id.index()).map(|node| &node.layer)
    }

    pub fn parent(&self, id: LayerId) -> Option<LayerId> {
        self.nodes.get(id.index()).and_then(|node| node.parent)
    }

    pub fn children(&self, id: LayerId) -> &[LayerId] {
        self.nodes
            .get(id.index())
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn origin(&self, id: LayerId) -> Option<usize> {
        self.nodes.get(id.index()).and_then(|node| node.origin)
    }

    /// Top-level layers in insertion order.
    pub fn roots(&self) -> &[LayerId] {
        &self.roots
    }

    /// Arena indices in pre-order.
    pub fn tree_indices(&self) -> &[u32] {
        &self.tree_indices
    }

    pub fn layer_count(&self) -> usize {
        self.nodes.len()
    }

    /// Layers in pre-order with their ids.
    pub fn layers(&self) -> impl Iterator<Item = (LayerId, &Layer)> + '_ {
        self.tree_indices.iter().map(move |&index| {
            let id = LayerId(index);
            (id, &self.nodes[id.index()].layer)
        })
    }

    /// Number of ancestors of `id`.
    pub fn depth(&self, id: LayerId) -> usize {
        let mut depth = 0;
        let mut current = self.parent(id);
        while let Some(parent) = current {
            depth += 1;
            current = self.parent(parent);
        }
        depth
    }

    fn insert(&mut self, layer: Layer, parent: Option<LayerId>, origin: Option<usize>) -> LayerId {
        let id = LayerId(self.nodes.len() as u32);
        self.nodes.push(LayerNode {
            layer,
            parent,
            children: Vec::new(),
            origin,
        });
        id
    }

    fn rebuild_tree_indices(&mut self) {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<LayerId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id.0);
            stack.extend(self.nodes[id.index()].children.iter().rev().copied());
        }
        self.tree_indices = order;
    }
}
