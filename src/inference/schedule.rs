use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Waits for the next display refresh before a cycle runs
pub trait DisplayClock {
    fn wait_for_frame(&mut self);
}

/// Paces cycles to a fixed refresh rate
///
/// A cycle that overruns its frame starts the next one immediately, so work
/// never queues up behind a slow predict.
pub struct RefreshClock {
    frame_duration: Duration,
    last_frame: Option<Instant>,
}

impl RefreshClock {
    pub fn new(refresh_hz: u32) -> Self {
        Self {
            frame_duration: Duration::from_secs_f32(1.0 / refresh_hz.max(1) as f32),
            last_frame: None,
        }
    }
}

impl DisplayClock for RefreshClock {
    fn wait_for_frame(&mut self) {
        if let Some(last) = self.last_frame {
            let elapsed = last.elapsed();
            if elapsed < self.frame_duration {
                std::thread::sleep(self.frame_duration - elapsed);
            }
        }
        self.last_frame = Some(Instant::now());
    }
}

/// Handle to the recurring per-frame inference task
///
/// Cancelling is cooperative: the loop checks the handle before each cycle.
#[derive(Debug, Clone)]
pub struct FrameTask {
    id: u64,
    cancelled: Arc<AtomicBool>,
}

impl FrameTask {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            tracing::debug!("Frame task {} cancelled", self.id);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
