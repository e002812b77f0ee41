//! Framing Strategies
//!
//! Each strategy scans one contiguous snapshot of unread bytes, emits the
//! payload of every complete frame it recognizes, and reports how many
//! leading bytes of the snapshot are consumed. Bytes that may still belong
//! to an incomplete frame are never consumed.

use crate::config::FramingConfig;
use crate::search::{find, search_frame};
use serde::{Deserialize, Serialize};

/// Framing disciplines, in selection priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FramingMode {
    /// No extraction, the application drains bytes itself
    None,
    /// Frames of a fixed byte count
    FixedLength,
    /// Frames separated by a start marker
    StartMarker,
    /// Frames terminated by an end marker
    EndMarker,
    /// Frames enclosed in a start and an end marker
    StartEndMarker,
}

impl FramingMode {
    /// Pick the discipline for a configuration.
    ///
    /// Fixed length wins over any marker; a lone start or end marker selects
    /// its own discipline; both markers select the enclosing discipline.
    pub fn select(config: &FramingConfig) -> Self {
        let has_start = !config.start_marker.is_empty();
        let has_end = !config.end_marker.is_empty();

        if config.expected_length > 0 {
            FramingMode::FixedLength
        } else if has_start && !has_end {
            FramingMode::StartMarker
        } else if has_end && !has_start {
            FramingMode::EndMarker
        } else if has_start && has_end {
            FramingMode::StartEndMarker
        } else {
            FramingMode::None
        }
    }
}

/// A pluggable framing discipline
pub trait FramingStrategy: Send {
    /// Discipline implemented by this strategy
    fn mode(&self) -> FramingMode;

    /// Scan `snapshot`, calling `emit` with each complete payload in order.
    ///
    /// Returns the number of leading snapshot bytes to discard.
    fn extract(&mut self, snapshot: &[u8], emit: &mut dyn FnMut(&[u8])) -> usize;
}

/// Build the strategy selected by `config`
pub fn build_strategy(config: &FramingConfig) -> Box<dyn FramingStrategy> {
    match config.mode() {
        FramingMode::None => Box::new(Passthrough),
        FramingMode::FixedLength => Box::new(FixedLength {
            length: config.expected_length,
        }),
        FramingMode::StartMarker => Box::new(StartMarker::new(
            &config.start_marker,
            config.max_search_depth,
        )),
        FramingMode::EndMarker => {
            Box::new(EndMarker::new(&config.end_marker, config.max_search_depth))
        }
        FramingMode::StartEndMarker => Box::new(StartEndMarker::new(
            &config.start_marker,
            &config.end_marker,
            config.max_search_depth,
        )),
    }
}

/// Leaves every byte in the ring
struct Passthrough;

impl FramingStrategy for Passthrough {
    fn mode(&self) -> FramingMode {
        FramingMode::None
    }

    fn extract(&mut self, _snapshot: &[u8], _emit: &mut dyn FnMut(&[u8])) -> usize {
        0
    }
}

struct FixedLength {
    length: usize,
}

impl FramingStrategy for FixedLength {
    fn mode(&self) -> FramingMode {
        FramingMode::FixedLength
    }

    fn extract(&mut self, snapshot: &[u8], emit: &mut dyn FnMut(&[u8])) -> usize {
        let mut consumed = 0;
        for frame in snapshot.chunks_exact(self.length) {
            emit(frame);
            consumed += self.length;
        }
        consumed
    }
}

struct StartMarker {
    marker: Vec<u8>,
    max_depth: usize,
    starts: Vec<usize>,
}

impl StartMarker {
    fn new(marker: &[u8], max_depth: usize) -> Self {
        // A frame needs two consecutive markers to be delimited
        let max_depth = if max_depth == 0 { 0 } else { max_depth.max(2) };
        Self {
            marker: marker.to_vec(),
            max_depth,
            starts: Vec::with_capacity(max_depth),
        }
    }
}

impl FramingStrategy for StartMarker {
    fn mode(&self) -> FramingMode {
        FramingMode::StartMarker
    }

    fn extract(&mut self, snapshot: &[u8], emit: &mut dyn FnMut(&[u8])) -> usize {
        let len = self.marker.len();
        self.starts.clear();
        search_frame(snapshot, &self.marker, &mut self.starts, self.max_depth, 0);

        match self.starts.as_slice() {
            // Nothing here can start a frame; keep a possible marker prefix
            [] => snapshot.len().saturating_sub(len - 1),
            [only] => *only,
            starts => {
                for pair in starts.windows(2) {
                    emit(&snapshot[pair[0] + len..pair[1]]);
                }
                starts[starts.len() - 1]
            }
        }
    }
}

struct EndMarker {
    marker: Vec<u8>,
    max_depth: usize,
    ends: Vec<usize>,
}

impl EndMarker {
    fn new(marker: &[u8], max_depth: usize) -> Self {
        Self {
            marker: marker.to_vec(),
            max_depth,
            ends: Vec::with_capacity(max_depth),
        }
    }
}

impl FramingStrategy for EndMarker {
    fn mode(&self) -> FramingMode {
        FramingMode::EndMarker
    }

    fn extract(&mut self, snapshot: &[u8], emit: &mut dyn FnMut(&[u8])) -> usize {
        self.ends.clear();
        search_frame(snapshot, &self.marker, &mut self.ends, self.max_depth, 0);

        let mut consumed = 0;
        for &end in &self.ends {
            emit(&snapshot[consumed..end]);
            consumed = end + self.marker.len();
        }
        consumed
    }
}

/// Pairs start and end markers strictly left to right.
///
/// An open start is closed by the first end marker beginning after it. If
/// another start marker completes before that end marker, the earlier start
/// is abandoned and the later one opens the frame instead. End markers with
/// no open start are ignored, and an unterminated start is kept for the
/// next poll. The depth bound limits how many frames are closed per poll.
struct StartEndMarker {
    start: Vec<u8>,
    end: Vec<u8>,
    max_depth: usize,
}

impl StartEndMarker {
    fn new(start: &[u8], end: &[u8], max_depth: usize) -> Self {
        Self {
            start: start.to_vec(),
            end: end.to_vec(),
            max_depth,
        }
    }

    /// Last start marker completing at or before `end`, beginning from `open`
    fn latest_start(&self, snapshot: &[u8], mut open: usize, end: usize) -> usize {
        let start_len = self.start.len();
        while let Some(next) = find(snapshot, &self.start, open + start_len) {
            if next + start_len > end {
                break;
            }
            open = next;
        }
        open
    }
}

impl FramingStrategy for StartEndMarker {
    fn mode(&self) -> FramingMode {
        FramingMode::StartEndMarker
    }

    fn extract(&mut self, snapshot: &[u8], emit: &mut dyn FnMut(&[u8])) -> usize {
        let start_len = self.start.len();
        let mut consumed = 0;
        let mut closed = 0;

        while self.max_depth == 0 || closed < self.max_depth {
            let Some(open) = find(snapshot, &self.start, consumed) else {
                // Nothing left can open a frame; keep a possible marker prefix
                return consumed.max(snapshot.len().saturating_sub(start_len - 1));
            };
            let Some(end) = find(snapshot, &self.end, open + start_len) else {
                return open;
            };

            let open = self.latest_start(snapshot, open, end);
            emit(&snapshot[open + start_len..end]);
            consumed = end + self.end.len();
            closed += 1;
        }
        consumed
    }
}
