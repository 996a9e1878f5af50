//! Captured frames and the keep-latest hand-off slot.
//!
//! - `Frame`: one captured image in whatever layout the source produced.
//! - `LatestFrameSlot`: single-slot buffer between the capture thread and the
//!   analysis worker. Pushing while a frame is still waiting replaces it, so
//!   a slow worker drops frames instead of queueing them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// Pixel layout of a captured frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PixelData {
    /// Packed 8-bit RGB, `width * height * 3` bytes.
    Rgb24(Vec<u8>),
    /// Full-resolution Y plane followed by interleaved half-resolution UV.
    Nv12(Vec<u8>),
    /// Packed YUYV 4:2:2, `width * height * 2` bytes.
    Yuyv(Vec<u8>),
    /// Compressed image (JPEG/PNG). Dimensions are read from the stream.
    Encoded(Vec<u8>),
}

impl PixelData {
    pub fn byte_len(&self) -> usize {
        match self {
            PixelData::Rgb24(data)
            | PixelData::Nv12(data)
            | PixelData::Yuyv(data)
            | PixelData::Encoded(data) => data.len(),
        }
    }
}

/// One captured frame.
#[derive(Clone, Debug)]
pub struct Frame {
    pixels: PixelData,
    /// Frame dimensions as reported by the source. For encoded frames this is
    /// a hint; the decoder's dimensions win.
    pub width: u32,
    pub height: u32,
    /// Clockwise rotation that brings the frame upright.
    pub rotation_degrees: u32,
    /// Source-local sequence number, starting at 1.
    pub sequence: u64,
    captured_at: Instant,
}

impl Frame {
    pub fn new(pixels: PixelData, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            pixels,
            width,
            height,
            rotation_degrees: 0,
            sequence,
            captured_at: Instant::now(),
        }
    }

    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self::new(PixelData::Rgb24(data), width, height, 0)
    }

    pub fn with_rotation(mut self, degrees: u32) -> Self {
        self.rotation_degrees = degrees;
        self
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn pixels(&self) -> &PixelData {
        &self.pixels
    }

    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }
}

// ----------------------------------------------------------------------------
// LatestFrameSlot
// ----------------------------------------------------------------------------

/// Counters for a `LatestFrameSlot`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SlotStats {
    /// Frames offered by the capture side.
    pub pushed: u64,
    /// Frames replaced before the worker took them.
    pub dropped: u64,
    /// Frames handed to the worker.
    pub taken: u64,
}

#[derive(Default)]
struct SlotState {
    frame: Option<Frame>,
    closed: bool,
}

/// Keep-only-latest hand-off between one producer and one consumer.
#[derive(Default)]
pub struct LatestFrameSlot {
    state: Mutex<SlotState>,
    ready: Condvar,
    pushed: AtomicU64,
    dropped: AtomicU64,
    taken: AtomicU64,
}

impl LatestFrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a frame. Replaces any frame the worker has not taken yet.
    ///
    /// Returns false once the slot is closed.
    pub fn push(&self, frame: Frame) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return false;
        }
        self.pushed.fetch_add(1, Ordering::Relaxed);
        if state.frame.replace(frame).is_some() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        drop(state);
        self.ready.notify_one();
        true
    }

    /// Wait up to `timeout` for a frame.
    ///
    /// Returns `None` on timeout or once the slot is closed and empty.
    pub fn take_timeout(&self, timeout: Duration) -> Option<Frame> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(frame) = state.frame.take() {
                self.taken.fetch_add(1, Ordering::Relaxed);
                return Some(frame);
            }
            if state.closed {
                return None;
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            state = self
                .ready
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Close the slot and discard any pending frame. Wakes a waiting worker.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.closed = true;
        state.frame = None;
        drop(state);
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .closed
    }

    pub fn stats(&self) -> SlotStats {
        SlotStats {
            pushed: self.pushed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            taken: self.taken.load(Ordering::Relaxed),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn make_frame(sequence: u64) -> Frame {
        Frame::from_rgb(vec![0u8; 12], 2, 2).with_sequence(sequence)
    }

    #[test]
    fn slot_keeps_only_latest_frame() {
        let slot = LatestFrameSlot::new();
        assert!(slot.push(make_frame(1)));
        assert!(slot.push(make_frame(2)));
        assert!(slot.push(make_frame(3)));

        let frame = slot.take_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(frame.sequence, 3);
        assert!(slot.take_timeout(Duration::from_millis(10)).is_none());

        let stats = slot.stats();
        assert_eq!(stats.pushed, 3);
        assert_eq!(stats.dropped, 2);
        assert_eq!(stats.taken, 1);
    }

    #[test]
    fn closed_slot_rejects_frames_and_releases_waiter() {
        let slot = Arc::new(LatestFrameSlot::new());
        let waiter = {
            let slot = Arc::clone(&slot);
            std::thread::spawn(move || slot.take_timeout(Duration::from_secs(10)))
        };
        std::thread::sleep(Duration::from_millis(20));
        slot.close();

        assert!(waiter.join().unwrap().is_none());
        assert!(!slot.push(make_frame(1)));
        assert!(slot.is_closed());
    }

    #[test]
    fn worker_wakes_on_push() {
        let slot = Arc::new(LatestFrameSlot::new());
        let waiter = {
            let slot = Arc::clone(&slot);
            std::thread::spawn(move || slot.take_timeout(Duration::from_secs(10)))
        };
        std::thread::sleep(Duration::from_millis(20));
        slot.push(make_frame(7));

        let frame = waiter.join().unwrap().unwrap();
        assert_eq!(frame.sequence, 7);
    }

    #[test]
    fn frame_builders_set_metadata() {
        let frame = Frame::from_rgb(vec![1u8; 27], 3, 3)
            .with_rotation(90)
            .with_sequence(4);
        assert_eq!(frame.rotation_degrees, 90);
        assert_eq!(frame.sequence, 4);
        assert_eq!(frame.pixels().byte_len(), 27);
    }
}
