use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::frame::Frame;
use crate::token::TokenRegistry;
use crate::view::FrameView;
use crate::{AttributeReport, FrameReport, LayerErrorReport, LayerReport};

pub(super) fn frame_report(frame: &Frame, tokens: &TokenRegistry) -> FrameReport {
    let view = FrameView::new(frame);
    let primary = view.primary_layer();

    let mut layers: Vec<LayerReport> = frame
        .layers()
        .map(|(id, layer)| {
            let payload = layer.payload().range();
            LayerReport {
                id: id.index() as u32,
                parent: frame.parent(id).map(|parent| parent.index() as u32),
                namespace: tokens.name(layer.namespace()),
                dispatch: layer.dispatch().map(|token| tokens.name(token)),
                summary: layer.summary().map(str::to_string),
                tags: layer.tags().iter().map(|tag| tokens.name(*tag)).collect(),
                stream: layer.stream_key().map(|key| format!("{key:016x}")),
                payload: [payload.start, payload.end],
                confidence: layer.confidence(),
                errors: layer
                    .errors()
                    .iter()
                    .map(|err| LayerErrorReport {
                        id: tokens.name(err.id),
                        message: err.message.clone(),
                    })
                    .collect(),
                attributes: layer
                    .attributes()
                    .iter()
                    .map(|attr| AttributeReport {
                        id: tokens.name(attr.id),
                        value: serde_json::to_value(&attr.value)
                            .unwrap_or(serde_json::Value::Null),
                        range: attr.range.as_ref().map(|range| [range.start, range.end]),
                        summary: attr.summary.clone(),
                        error: attr.error,
                        typ: attr.typ.map(|typ| tokens.name(typ)),
                    })
                    .collect(),
            }
        })
        .collect();
    layers.sort_by_key(|layer| layer.id);

    FrameReport {
        index: frame.index(),
        timestamp: ts_to_rfc3339(frame.timestamp()),
        length: frame.payload().len(),
        tree_indices: frame.tree_indices().to_vec(),
        primary: primary.map(|layer| tokens.name(layer.namespace())),
        summary: primary.and_then(|layer| layer.summary()).map(str::to_string),
        layers,
    }
}

pub(super) fn ts_to_rfc3339(ts: Option<f64>) -> Option<String> {
    let ts = ts?;
    let nanos = (ts * 1_000_000_000.0) as i128;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
}
