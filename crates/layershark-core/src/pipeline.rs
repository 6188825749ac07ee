//! Per-frame dispatch loop.
//!
//! Starting from a root layer that wraps the raw bytes, the pipeline looks
//! up every dissector whose namespace pattern matches the frontier layer's
//! effective namespace, runs them in registration order and attaches the
//! first child produced. The child becomes the new frontier. The loop stops
//! when nothing matches, every match declines, the payload is exhausted, a
//! dissector makes no progress, or the configured depth is reached.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::dissector::{DissectorError, Registration, StreamWorker, Worker};
use crate::frame::{Frame, LayerId};
use crate::layer::Layer;
use crate::session::{RawFrame, Session, SessionError};
use crate::slice::Slice;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("session is closed")]
    Closed,
    #[error(
        "stream {stream_key:#x} of {dissector} received frame {frame} after frame {last}"
    )]
    OutOfOrder {
        dissector: String,
        stream_key: u64,
        last: u32,
        frame: u32,
    },
    #[error("stream worker creation failed: {0}")]
    Worker(#[from] DissectorError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("dissection thread panicked")]
    WorkerPanicked,
}

struct StreamSlot {
    worker: Box<dyn StreamWorker>,
    last_frame: u32,
}

/// Owns the workers used to dissect frames on one thread.
pub struct Pipeline<'s> {
    session: &'s Session,
    workers: Vec<Option<Box<dyn Worker>>>,
    streams: HashMap<(usize, u64), StreamSlot>,
}

impl<'s> Pipeline<'s> {
    pub(crate) fn new(session: &'s Session) -> Result<Self, SessionError> {
        let workers = session
            .entries()
            .iter()
            .map(|entry| match &entry.registration {
                Registration::Dissector(dissector) => dissector.create_worker().map(Some),
                Registration::Stream(_) => Ok(None),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            session,
            workers,
            streams: HashMap::new(),
        })
    }

    pub fn session(&self) -> &'s Session {
        self.session
    }

    /// Number of live stream workers.
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Dissect a frame using the session's next index.
    pub fn dissect_next(
        &mut self,
        timestamp: impl Into<Option<f64>>,
        data: impl Into<Bytes>,
    ) -> Result<Frame, PipelineError> {
        let index = self.session.next_index();
        self.dissect(index, timestamp, data)
    }

    pub fn dissect_raw(&mut self, raw: RawFrame) -> Result<Frame, PipelineError> {
        self.dissect(raw.index, raw.timestamp, raw.data)
    }

    /// Dissect one frame into a complete layer tree.
    pub fn dissect(
        &mut self,
        index: u32,
        timestamp: impl Into<Option<f64>>,
        data: impl Into<Bytes>,
    ) -> Result<Frame, PipelineError> {
        if self.session.is_closed() {
            return Err(PipelineError::Closed);
        }

        let payload = Slice::new(data);
        let mut frame = Frame::new(index, timestamp, payload.clone());
        let mut root = Layer::new(self.session.root(), payload);
        if let Some(dispatch) = self.session.root_dispatch() {
            root.set_dispatch(dispatch);
        }
        let mut frontier = frame.add_root(root);

        let max_depth = self.session.config().max_depth;
        let mut depth = 0;
        while depth < max_depth {
            let Some((winner, child)) = self.step(&frame, frontier)? else {
                break;
            };
            let stalled = frame.layer(frontier).is_some_and(|parent| {
                child.payload().len() >= parent.payload().len()
                    && child.effective_namespace() == parent.effective_namespace()
            });
            let Some(id) = frame.attach_from(frontier, child, Some(winner)) else {
                break;
            };
            frontier = id;
            depth += 1;
            if stalled {
                warn!(
                    frame = index,
                    dissector = self.session.entries()[winner].name.as_str(),
                    "dissector made no progress, stopping"
                );
                break;
            }
        }
        if depth == max_depth {
            warn!(frame = index, max_depth, "dissection depth limit reached");
        }
        Ok(frame)
    }

    fn step(
        &mut self,
        frame: &Frame,
        frontier: LayerId,
    ) -> Result<Option<(usize, Layer)>, PipelineError> {
        let Some(layer) = frame.layer(frontier) else {
            return Ok(None);
        };
        if layer.payload().is_empty() {
            return Ok(None);
        }

        let session = self.session;
        let tokens = session.tokens();
        let namespace = layer.effective_namespace();
        let policy = session.config().matching;
        let origin = frame.origin(frontier);
        let candidates: Vec<usize> = session
            .entries()
            .iter()
            .enumerate()
            .filter(|(idx, _)| Some(*idx) != origin)
            .filter(|(_, entry)| {
                entry
                    .patterns
                    .iter()
                    .any(|pattern| pattern.matches(tokens, namespace, policy))
            })
            .map(|(idx, _)| idx)
            .collect();

        if candidates.is_empty() {
            trace!(
                frame = frame.index(),
                namespace = %tokens.name(namespace),
                "no dissector matches"
            );
            return Ok(None);
        }

        for &idx in &candidates {
            let produced = match &session.entries()[idx].registration {
                Registration::Dissector(_) => self.workers[idx]
                    .as_mut()
                    .and_then(|worker| worker.analyze(layer)),
                Registration::Stream(_) => self.analyze_stream(idx, frame.index(), layer)?,
            };
            if let Some(child) = produced {
                if candidates.len() > 1 {
                    debug!(
                        frame = frame.index(),
                        namespace = %tokens.name(namespace),
                        winner = session.entries()[idx].name.as_str(),
                        candidates = ?candidates
                            .iter()
                            .map(|other| session.entries()[*other].name.as_str())
                            .collect::<Vec<_>>(),
                        "several dissectors match one namespace"
                    );
                }
                return Ok(Some((idx, child)));
            }
        }
        Ok(None)
    }

    fn analyze_stream(
        &mut self,
        idx: usize,
        frame_index: u32,
        layer: &Layer,
    ) -> Result<Option<Layer>, PipelineError> {
        let session = self.session;
        let entry = &session.entries()[idx];
        let Registration::Stream(dissector) = &entry.registration else {
            return Ok(None);
        };
        let Some(stream_key) = layer.stream_key() else {
            trace!(dissector = entry.name.as_str(), "layer has no stream key");
            return Ok(None);
        };

        let slot = match self.streams.entry((idx, stream_key)) {
            Entry::Occupied(slot) => {
                let slot = slot.into_mut();
                if frame_index < slot.last_frame {
                    return Err(PipelineError::OutOfOrder {
                        dissector: entry.name.clone(),
                        stream_key,
                        last: slot.last_frame,
                        frame: frame_index,
                    });
                }
                slot
            }
            Entry::Vacant(slot) => {
                debug!(dissector = entry.name.as_str(), stream_key, "new stream");
                slot.insert(StreamSlot {
                    worker: dissector.create_worker(stream_key)?,
                    last_frame: frame_index,
                })
            }
        };
        slot.last_frame = frame_index;
        Ok(slot.worker.analyze(layer))
    }
}
