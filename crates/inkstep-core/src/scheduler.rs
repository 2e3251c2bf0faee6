//! Frame and timer source for pencil animation.
//!
//! The pencil never touches a clock directly. It awaits frames and sleeps
//! through a [`Scheduler`], so the same playback code runs headless in tests
//! (virtual time) and in a real runtime.

use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

/// Boxed future for scheduler operations (compatible with WASM).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Default interval between animation frames (~60 fps).
pub const DEFAULT_FRAME_MS: f64 = 16.0;

/// Tick source and timers.
pub trait Scheduler {
    /// Current time in milliseconds.
    fn now(&self) -> f64;

    /// Resolve at the next animation frame with that frame's timestamp.
    fn next_frame(&self) -> BoxFuture<'_, f64>;

    /// Resolve after `ms` milliseconds.
    fn sleep(&self, ms: f64) -> BoxFuture<'_, ()>;
}

impl<S: Scheduler + ?Sized> Scheduler for Rc<S> {
    fn now(&self) -> f64 {
        (**self).now()
    }

    fn next_frame(&self) -> BoxFuture<'_, f64> {
        (**self).next_frame()
    }

    fn sleep(&self, ms: f64) -> BoxFuture<'_, ()> {
        (**self).sleep(ms)
    }
}

/// Cancellation flag for one in-flight animation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Rc<Cell<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }

    /// Whether both tokens guard the same animation.
    pub fn same_as(&self, other: &CancelToken) -> bool {
        Rc::ptr_eq(&self.cancelled, &other.cancelled)
    }
}

/// Headless scheduler driven by a virtual clock.
///
/// Frames advance the clock by a fixed interval and sleeps by the requested
/// amount; both resolve immediately.
#[derive(Debug)]
pub struct VirtualScheduler {
    clock: Cell<f64>,
    frame_ms: f64,
    frames: Cell<u64>,
}

impl Default for VirtualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualScheduler {
    pub fn new() -> Self {
        Self::with_frame_interval(DEFAULT_FRAME_MS)
    }

    pub fn with_frame_interval(frame_ms: f64) -> Self {
        Self {
            clock: Cell::new(0.0),
            frame_ms: frame_ms.max(f64::EPSILON),
            frames: Cell::new(0),
        }
    }

    /// Number of frames handed out so far.
    pub fn frame_count(&self) -> u64 {
        self.frames.get()
    }

    /// Move the clock forward without producing a frame.
    pub fn advance(&self, ms: f64) {
        self.clock.set(self.clock.get() + ms.max(0.0));
    }
}

impl Scheduler for VirtualScheduler {
    fn now(&self) -> f64 {
        self.clock.get()
    }

    fn next_frame(&self) -> BoxFuture<'_, f64> {
        self.advance(self.frame_ms);
        self.frames.set(self.frames.get() + 1);
        let now = self.clock.get();
        Box::pin(std::future::ready(now))
    }

    fn sleep(&self, ms: f64) -> BoxFuture<'_, ()> {
        self.advance(ms);
        Box::pin(std::future::ready(()))
    }
}

/// Real-time scheduler on the tokio timer wheel.
#[cfg(feature = "tokio")]
#[derive(Debug)]
pub struct TokioScheduler {
    origin: tokio::time::Instant,
    frame: std::time::Duration,
}

#[cfg(feature = "tokio")]
impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "tokio")]
impl TokioScheduler {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
            frame: std::time::Duration::from_secs_f64(DEFAULT_FRAME_MS / 1000.0),
        }
    }
}

#[cfg(feature = "tokio")]
impl Scheduler for TokioScheduler {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    fn next_frame(&self) -> BoxFuture<'_, f64> {
        Box::pin(async move {
            tokio::time::sleep(self.frame).await;
            self.now()
        })
    }

    fn sleep(&self, ms: f64) -> BoxFuture<'_, ()> {
        let duration = std::time::Duration::from_secs_f64(ms.max(0.0) / 1000.0);
        Box::pin(tokio::time::sleep(duration))
    }
}


#[cfg(all(test, feature = "tokio"))]
mod tokio_tests {
    use super::*;

    #[tokio::test]
    async fn test_tokio_sleep_and_frames_follow_wall_clock() {
        let scheduler = TokioScheduler::new();
        let start = scheduler.now();
        scheduler.sleep(20.0).await;
        let after_sleep = scheduler.now();
        assert!(after_sleep - start >= 20.0, "slept only {}ms", after_sleep - start);

        let frame = scheduler.next_frame().await;
        assert!(frame >= after_sleep);
        assert!(scheduler.now() >= frame);
    }

    #[tokio::test]
    async fn test_tokio_negative_sleep_returns() {
        let scheduler = TokioScheduler::default();
        scheduler.sleep(-5.0).await;
        assert!(scheduler.now() >= 0.0);
    }
}
