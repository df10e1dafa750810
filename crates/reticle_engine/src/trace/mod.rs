//! Watch facility for the matcher.
//!
//! Entity, agenda, and rule events land in a ring buffer, filtered by
//! [`WatchItem`]. Independent of the `tracing` spans emitted by the network
//! itself: this is the user-facing "watch" stream, and costs one branch per
//! event while nothing is watched.

pub mod buffer;
pub mod record;

pub use buffer::TraceBuffer;
pub use record::{TraceEvent, TraceRecord, WatchItem};

use std::collections::HashSet;
use std::io::{self, Write};
use std::time::Instant;

// =============================================================================
// Trace Output
// =============================================================================

/// Where watch lines are echoed, besides the buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TraceOutput {
    /// Buffer only.
    #[default]
    None,
    /// Also print each watch line to stderr.
    Stderr,
}

// =============================================================================
// Tracer Configuration
// =============================================================================

/// Which categories are watched, and where they go.
#[derive(Clone, Debug)]
pub struct TracerConfig {
    /// Watched categories. Empty means nothing is recorded.
    pub watching: HashSet<WatchItem>,
    /// Ring buffer capacity.
    pub buffer_size: usize,
    /// Echo target.
    pub output: TraceOutput,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            watching: HashSet::new(),
            buffer_size: 10_000,
            output: TraceOutput::None,
        }
    }
}

impl TracerConfig {
    /// Watches nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Watches every category.
    #[must_use]
    pub fn all() -> Self {
        Self::default().watch_all()
    }

    /// Adds one category.
    #[must_use]
    pub fn watch(mut self, item: WatchItem) -> Self {
        self.watching.insert(item);
        self
    }

    /// Adds every category.
    #[must_use]
    pub fn watch_all(mut self) -> Self {
        self.watching.extend(WatchItem::ALL);
        self
    }

    /// Sets the ring buffer capacity.
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Also prints each watch line to stderr.
    #[must_use]
    pub fn echo_to_stderr(mut self) -> Self {
        self.output = TraceOutput::Stderr;
        self
    }
}

// =============================================================================
// Tracer
// =============================================================================

/// Records watch events, numbered by the top-level operation that caused them.
#[derive(Debug)]
pub struct Tracer {
    config: TracerConfig,
    buffer: TraceBuffer,
    operation: u64,
    start_time: Instant,
}

impl Tracer {
    /// Creates a tracer with an empty buffer.
    #[must_use]
    pub fn new(config: TracerConfig) -> Self {
        let buffer = TraceBuffer::new(config.buffer_size);
        Self {
            config,
            buffer,
            operation: 0,
            start_time: Instant::now(),
        }
    }

    /// True if any category is watched.
    #[must_use]
    #[inline]
    pub fn is_enabled(&self) -> bool {
        !self.config.watching.is_empty()
    }

    /// True if `item` is recorded.
    #[must_use]
    pub fn is_watching(&self, item: WatchItem) -> bool {
        self.config.watching.contains(&item)
    }

    /// Starts recording one category.
    pub fn watch(&mut self, item: WatchItem) {
        self.config.watching.insert(item);
    }

    /// Stops recording one category.
    pub fn unwatch(&mut self, item: WatchItem) {
        self.config.watching.remove(&item);
    }

    /// Changes where watch lines are echoed.
    pub fn set_output(&mut self, output: TraceOutput) {
        self.config.output = output;
    }

    /// Starts a new top-level operation; later records carry its number.
    pub fn begin_operation(&mut self) -> u64 {
        self.operation += 1;
        self.operation
    }

    /// The number of the operation in progress.
    #[must_use]
    pub fn current_operation(&self) -> u64 {
        self.operation
    }

    /// Records `event` if its category is watched.
    #[inline]
    pub fn record(&mut self, event: TraceEvent) {
        if self.is_enabled() && self.is_watching(event.watch_item()) {
            self.push(event);
        }
    }

    fn push(&mut self, event: TraceEvent) {
        let elapsed = u64::try_from(self.start_time.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.buffer.push(self.operation, elapsed, event);

        if self.config.output == TraceOutput::Stderr {
            if let Some(record) = self.buffer.last() {
                let _ = writeln!(io::stderr(), "[{:>4}] {}", record.operation, record.event);
            }
        }
    }

    /// Recorded events.
    #[must_use]
    pub fn buffer(&self) -> &TraceBuffer {
        &self.buffer
    }

    /// Drops every recorded event.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new(TracerConfig::default())
    }
}
