use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::frame::Frame;
use crate::pipeline::PipelineError;
use crate::session::{RawFrame, Session, SessionError};
use crate::source::{PacketEvent, PacketSource, PcapFileSource, SourceError};
use crate::token::TokenRegistry;
use crate::view::FrameView;
use crate::{CaptureReport, CaptureSummary, DEFAULT_GENERATED_AT, InputInfo, make_stub_report};

mod report;

use report::{frame_report, ts_to_rfc3339};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
    #[error("Dissection error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Every frame of a capture, dissected.
#[derive(Debug)]
pub struct Capture {
    tokens: Arc<TokenRegistry>,
    frames: Vec<Frame>,
    first_ts: Option<f64>,
    last_ts: Option<f64>,
}

/// One `Capture::query` result line.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub frame: u32,
    /// Namespace of the layer holding the attribute.
    pub layer: String,
    /// Attribute summary, or its value when it has none.
    pub value: String,
}

impl Capture {
    pub fn tokens(&self) -> &Arc<TokenRegistry> {
        &self.tokens
    }

    /// Frames in capture order.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// First attribute named `name` in each frame that has one.
    pub fn query(&self, name: &str) -> Vec<QueryHit> {
        let id = self.tokens.intern(name);
        self.frames
            .iter()
            .filter_map(|frame| {
                let hit = FrameView::new(frame).query(id)?;
                Some(QueryHit {
                    frame: frame.index(),
                    layer: self.tokens.name(hit.layer.namespace()),
                    value: hit
                        .attr
                        .summary
                        .clone()
                        .unwrap_or_else(|| hit.attr.value.to_string()),
                })
            })
            .collect()
    }

    pub fn to_report(&self, input: InputInfo) -> CaptureReport {
        let mut report = make_stub_report(&input.path, input.bytes);
        let mut layers: BTreeMap<String, u64> = BTreeMap::new();
        let mut frames_with_errors = 0u64;
        for frame in &self.frames {
            let mut has_errors = false;
            for (_, layer) in frame.layers() {
                *layers.entry(self.tokens.name(layer.namespace())).or_default() += 1;
                has_errors |= layer.has_errors();
            }
            frames_with_errors += u64::from(has_errors);
        }

        report.capture_summary = Some(CaptureSummary {
            packets_total: self.frames.len() as u64,
            frames_with_errors,
            time_start: ts_to_rfc3339(self.first_ts),
            time_end: ts_to_rfc3339(self.last_ts),
            layers,
        });
        report.generated_at = report
            .capture_summary
            .as_ref()
            .and_then(|summary| summary.time_end.clone().or(summary.time_start.clone()))
            .unwrap_or_else(|| DEFAULT_GENERATED_AT.to_string());
        report.frames = self
            .frames
            .iter()
            .map(|frame| frame_report(frame, &self.tokens))
            .collect();
        report
    }
}

pub fn dissect_pcap_file(
    path: &Path,
    config: &SessionConfig,
    threads: usize,
) -> Result<CaptureReport, AnalysisError> {
    let source = PcapFileSource::open(path)?;
    let capture = dissect_source(source, config, threads)?;
    Ok(capture.to_report(InputInfo {
        path: path.display().to_string(),
        bytes: path.metadata()?.len(),
    }))
}

/// Dissect every packet of `source` with the bundled dissectors.
///
/// Packets are grouped by link hint (the configured `link`, else the one
/// derived from each packet's link type) and each group gets its own
/// session over one shared token registry. Frame indices follow capture
/// order across groups.
pub fn dissect_source<S: PacketSource>(
    mut source: S,
    config: &SessionConfig,
    threads: usize,
) -> Result<Capture, AnalysisError> {
    let mut groups: BTreeMap<Option<String>, Vec<RawFrame>> = BTreeMap::new();
    let mut first_ts = None;
    let mut last_ts = None;
    let mut index = 0u32;

    while let Some(event) = source.next_packet()? {
        update_ts_bounds(&mut first_ts, &mut last_ts, event.ts);
        let link = config
            .link
            .clone()
            .or_else(|| event.link_hint().map(str::to_string));
        if link.is_none() {
            debug!(
                frame = index,
                linktype = event.linktype.0,
                "no link dissector for link type"
            );
        }
        let PacketEvent { ts, data, .. } = event;
        groups.entry(link).or_default().push(RawFrame {
            index,
            timestamp: ts,
            data,
        });
        index += 1;
    }

    let tokens = Arc::new(TokenRegistry::new());
    let mut frames = Vec::with_capacity(index as usize);
    for (link, raw) in groups {
        let session_config = SessionConfig {
            link,
            ..config.clone()
        };
        let session = Session::builder(Arc::clone(&tokens), session_config)
            .with_builtin_dissectors()
            .build()?;
        frames.extend(session.dissect_batch(raw, threads)?);
        session.close();
    }
    frames.sort_by_key(Frame::index);
    info!(frames = frames.len(), tokens = tokens.len(), "capture dissected");

    Ok(Capture {
        tokens,
        frames,
        first_ts,
        last_ts,
    })
}

fn update_ts_bounds(first: &mut Option<f64>, last: &mut Option<f64>, ts: Option<f64>) {
    let Some(ts) = ts else {
        return;
    };
    if first.is_none_or(|existing| ts < existing) {
        *first = Some(ts);
    }
    if last.is_none_or(|existing| ts > existing) {
        *last = Some(ts);
    }
}

#[cfg(test)]
mod tests {
    use super::{dissect_source, update_ts_bounds};
    use crate::config::SessionConfig;
    use crate::source::{PacketEvent, PacketSource, SourceError};
    use bytes::Bytes;
    use pcap_parser::Linktype;
    use std::collections::VecDeque;

    struct MemorySource(VecDeque<PacketEvent>);

    impl PacketSource for MemorySource {
        fn next_packet(&mut self) -> Result<Option<PacketEvent>, SourceError> {
            Ok(self.0.pop_front())
        }
    }

    fn raw_ipv6(ts: f64) -> PacketEvent {
        let mut data = vec![0x60, 0, 0, 0, 0, 0, 59, 64];
        data.extend_from_slice(&[0u8; 32]);
        PacketEvent {
            ts: Some(ts),
            linktype: Linktype::RAW,
            data: Bytes::from(data),
        }
    }

    #[test]
    fn ts_bounds_track_min_and_max() {
        let mut first = None;
        let mut last = None;
        for ts in [Some(2.0), None, Some(1.0), Some(3.0)] {
            update_ts_bounds(&mut first, &mut last, ts);
        }
        assert_eq!(first, Some(1.0));
        assert_eq!(last, Some(3.0));
    }

    #[test]
    fn mixed_link_types_keep_capture_order() {
        let unknown = PacketEvent {
            ts: Some(1.5),
            linktype: Linktype::NULL,
            data: Bytes::from_static(&[2, 0, 0, 0]),
        };
        let source = MemorySource(VecDeque::from([raw_ipv6(1.0), unknown, raw_ipv6(2.0)]));
        let capture = dissect_source(source, &SessionConfig::default(), 1).expect("dissect");

        let indices: Vec<u32> = capture.frames().iter().map(|frame| frame.index()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(capture.frames()[0].layer_count(), 3);
        assert_eq!(capture.frames()[1].layer_count(), 1);

        let hits = capture.query("ipv6.version");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].frame, 2);
        assert_eq!(hits[1].layer, "ipv6");
        assert_eq!(hits[1].value, "6");
    }

    #[test]
    fn report_counts_layers_and_times() {
        let source = MemorySource(VecDeque::from([raw_ipv6(0.0), raw_ipv6(1.0)]));
        let capture = dissect_source(source, &SessionConfig::default(), 2).expect("dissect");
        let report = capture.to_report(crate::InputInfo {
            path: "memory".to_string(),
            bytes: 0,
        });

        let summary = report.capture_summary.expect("summary");
        assert_eq!(summary.packets_total, 2);
        assert_eq!(summary.layers.get("ipv6"), Some(&2));
        assert_eq!(summary.layers.get("root"), Some(&2));
        assert_eq!(summary.time_start.as_deref(), Some("1970-01-01T00:00:00Z"));
        assert_eq!(report.generated_at, "1970-01-01T00:00:01Z");
        assert_eq!(report.frames[1].primary.as_deref(), Some("ipv6"));
    }

    #[test]
    fn frames_without_capture_time_omit_timestamp() {
        let mut untimed = raw_ipv6(0.0);
        untimed.ts = None;
        let source = MemorySource(VecDeque::from([untimed, raw_ipv6(0.0)]));
        let capture = dissect_source(source, &SessionConfig::default(), 1).expect("dissect");
        assert_eq!(capture.frames()[0].timestamp(), None);
        assert_eq!(capture.frames()[1].timestamp(), Some(0.0));

        let report = capture.to_report(crate::InputInfo {
            path: "memory".to_string(),
            bytes: 0,
        });
        let frames = serde_json::to_value(&report.frames).expect("json");
        assert!(frames[0].get("timestamp").is_none());
        assert_eq!(frames[1]["timestamp"], "1970-01-01T00:00:00Z");
    }
}
