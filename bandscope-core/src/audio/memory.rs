//! In-memory capture source.
//!
//! Bytes pushed through a `MemoryFeed` become readable from every stream the
//! matching `MemorySource` opens. Used for tests, file replay and headless
//! hosts. The feed also records what the analyzer did to the stream (volume,
//! open/close counts) so callers can observe it.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{CaptureSource, CaptureStream, StreamFormat};
use crate::buffering::pcm::encode_le;
use crate::error::{BandscopeError, Result};

#[derive(Debug, Default)]
struct FeedState {
    pending: VecDeque<u8>,
    volume: Option<f32>,
    open_streams: usize,
    opened_total: usize,
}

/// Producer handle for a `MemorySource`. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct MemoryFeed {
    state: Arc<Mutex<FeedState>>,
}

impl MemoryFeed {
    pub fn push_bytes(&self, bytes: &[u8]) {
        self.state.lock().pending.extend(bytes.iter().copied());
    }

    pub fn push_samples(&self, samples: &[i16]) {
        self.push_bytes(&encode_le(samples));
    }

    /// Bytes queued but not yet read.
    pub fn pending_bytes(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Last volume forwarded by the analyzer, if any stream was opened.
    pub fn volume(&self) -> Option<f32> {
        self.state.lock().volume
    }

    /// Streams currently open.
    pub fn open_streams(&self) -> usize {
        self.state.lock().open_streams
    }

    /// Streams opened over the feed's lifetime.
    pub fn opened_total(&self) -> usize {
        self.state.lock().opened_total
    }
}

/// A `CaptureSource` backed by a `MemoryFeed`.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    feed: MemoryFeed,
    fail_open: bool,
}

impl MemorySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            feed: MemoryFeed::default(),
            fail_open: false,
        }
    }

    /// A source whose `open_stream` always fails, like an unplugged device.
    pub fn failing(name: impl Into<String>) -> Self {
        Self {
            fail_open: true,
            ..Self::new(name)
        }
    }

    pub fn feed(&self) -> MemoryFeed {
        self.feed.clone()
    }
}

impl CaptureSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open_stream(&self, format: StreamFormat) -> Result<Box<dyn CaptureStream>> {
        if self.fail_open {
            return Err(BandscopeError::StreamOpen(format!(
                "{} refused to open",
                self.name
            )));
        }
        if format.bits_per_sample != 16 || format.channels != 1 {
            return Err(BandscopeError::StreamOpen(format!(
                "unsupported format: {format:?}"
            )));
        }

        let mut state = self.feed.state.lock();
        state.open_streams += 1;
        state.opened_total += 1;
        drop(state);

        Ok(Box::new(MemoryStream {
            feed: self.feed.clone(),
            closed: false,
        }))
    }
}

struct MemoryStream {
    feed: MemoryFeed,
    closed: bool,
}

impl CaptureStream for MemoryStream {
    fn bytes_available(&mut self) -> usize {
        if self.closed {
            return 0;
        }
        self.feed.pending_bytes()
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        if self.closed {
            return 0;
        }
        let mut state = self.feed.state.lock();
        let n = buf.len().min(state.pending.len());
        for (dst, src) in buf.iter_mut().zip(state.pending.drain(..n)) {
            *dst = src;
        }
        n
    }

    fn set_volume(&mut self, level: f32) {
        self.feed.state.lock().volume = Some(level);
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut state = self.feed.state.lock();
        state.open_streams = state.open_streams.saturating_sub(1);
    }
}

impl Drop for MemoryStream {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_reads_pushed_bytes_in_order() {
        let source = MemorySource::new("mem");
        let feed = source.feed();
        let mut stream = source
            .open_stream(StreamFormat::default())
            .expect("open memory stream");

        feed.push_bytes(&[1, 2, 3, 4, 5]);
        assert_eq!(stream.bytes_available(), 5);

        let mut buf = [0u8; 3];
        assert_eq!(stream.read(&mut buf), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(stream.bytes_available(), 2);

        let mut rest = [0u8; 8];
        assert_eq!(stream.read(&mut rest), 2);
        assert_eq!(&rest[..2], &[4, 5]);
    }

    #[test]
    fn open_and_close_are_counted() {
        let source = MemorySource::new("mem");
        let feed = source.feed();
        let mut stream = source
            .open_stream(StreamFormat::default())
            .expect("open memory stream");
        assert_eq!(feed.open_streams(), 1);
        stream.close();
        stream.close();
        assert_eq!(feed.open_streams(), 0);
        drop(stream);
        assert_eq!(feed.open_streams(), 0);
        assert_eq!(feed.opened_total(), 1);
    }

    #[test]
    fn dropping_stream_closes_it() {
        let source = MemorySource::new("mem");
        let feed = source.feed();
        let stream = source
            .open_stream(StreamFormat::default())
            .expect("open memory stream");
        drop(stream);
        assert_eq!(feed.open_streams(), 0);
    }

    #[test]
    fn failing_source_refuses_to_open() {
        let source = MemorySource::failing("unplugged");
        let err = source.open_stream(StreamFormat::default());
        assert!(matches!(err, Err(BandscopeError::StreamOpen(_))));
        assert_eq!(source.feed().opened_total(), 0);
    }

    #[test]
    fn stereo_format_is_rejected() {
        let source = MemorySource::new("mem");
        let format = StreamFormat {
            channels: 2,
            ..StreamFormat::default()
        };
        assert!(source.open_stream(format).is_err());
    }

    #[test]
    fn volume_is_recorded() {
        let source = MemorySource::new("mem");
        let feed = source.feed();
        let mut stream = source
            .open_stream(StreamFormat::default())
            .expect("open memory stream");
        assert_eq!(feed.volume(), None);
        stream.set_volume(0.25);
        assert_eq!(feed.volume(), Some(0.25));
    }
}
