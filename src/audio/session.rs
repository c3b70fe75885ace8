//! Capture session — one in-progress recording.
//!
//! cpal streams are not `Send`, so the stream lives on a dedicated thread
//! for the session's lifetime. The thread opens the device, reports setup
//! success or failure synchronously back to `begin()`, then accumulates
//! downmixed 16 kHz samples into a shared buffer until told to stop.
//!
//! `finish()` signals the thread and joins it; the thread drops the cpal
//! stream on its way out, which releases the microphone *before* any of the
//! accumulated audio is handed to a provider. Only one `begin()` may be
//! outstanding; the trigger coordinator enforces that, the session itself
//! does not arbitrate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use crate::audio::capture::{AudioCapture, CaptureError};
use crate::audio::resample::{downmix_mono, resample};
use crate::audio::TARGET_SAMPLE_RATE;

// ---------------------------------------------------------------------------
// CaptureBackend / ActiveCapture traits
// ---------------------------------------------------------------------------

/// Opens capture sessions. Injected into the coordinator so tests can run
/// without audio hardware.
pub trait CaptureBackend: Send + Sync {
    /// Start one recording. Blocks until the device is open and streaming
    /// (or has failed to open).
    fn begin(&self) -> Result<Box<dyn ActiveCapture>, CaptureError>;
}

/// Handle to a running recording.
pub trait ActiveCapture: Send {
    /// Samples accumulated so far (16 kHz mono).
    fn sample_count(&self) -> usize;

    /// Stop the stream, release the microphone unconditionally, and return
    /// the accumulated 16 kHz mono samples.
    fn finish(self: Box<Self>) -> Result<Vec<f32>, CaptureError>;
}

// ---------------------------------------------------------------------------
// CpalCaptureBackend
// ---------------------------------------------------------------------------

/// Production backend: every `begin()` spawns a fresh capture thread that
/// owns the cpal stream.
#[derive(Default)]
pub struct CpalCaptureBackend;

impl CpalCaptureBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureBackend for CpalCaptureBackend {
    fn begin(&self) -> Result<Box<dyn ActiveCapture>, CaptureError> {
        CaptureSession::begin().map(|s| Box::new(s) as Box<dyn ActiveCapture>)
    }
}

// ---------------------------------------------------------------------------
// CaptureSession
// ---------------------------------------------------------------------------

/// One microphone recording backed by a dedicated stream thread.
pub struct CaptureSession {
    samples: Arc<Mutex<Vec<f32>>>,
    stop: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl CaptureSession {
    /// Open the default input device and start accumulating audio.
    ///
    /// Device setup happens on the capture thread; its result is reported
    /// back synchronously, so a missing device or a permission refusal
    /// surfaces here rather than as a silent empty recording.
    pub fn begin() -> Result<Self, CaptureError> {
        let samples: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));

        let (setup_tx, setup_rx) = mpsc::channel::<Result<(), CaptureError>>();
        let samples_thread = Arc::clone(&samples);
        let stop_thread = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("capture-session".into())
            .spawn(move || {
                capture_thread_main(setup_tx, samples_thread, stop_thread);
            })
            .map_err(|_| CaptureError::ThreadFailed)?;

        // Wait for the thread to report whether the device opened.
        match setup_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                samples,
                stop,
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                // Thread exits on its own after a failed setup.
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(CaptureError::ThreadFailed),
        }
    }
}

impl ActiveCapture for CaptureSession {
    fn sample_count(&self) -> usize {
        self.samples.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn finish(mut self: Box<Self>) -> Result<Vec<f32>, CaptureError> {
        self.stop.store(true, Ordering::Relaxed);

        if let Some(thread) = self.thread.take() {
            // Joining guarantees the stream has been dropped and the
            // microphone released before we return.
            thread.join().map_err(|_| CaptureError::ThreadFailed)?;
        }

        let mut samples = self.samples.lock().map_err(|_| CaptureError::ThreadFailed)?;
        Ok(std::mem::take(&mut *samples))
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        // Dropping without finish() (error paths) must still stop the
        // stream thread and release the hardware.
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

// ---------------------------------------------------------------------------
// Capture thread
// ---------------------------------------------------------------------------

fn capture_thread_main(
    setup_tx: mpsc::Sender<Result<(), CaptureError>>,
    samples: Arc<Mutex<Vec<f32>>>,
    stop: Arc<AtomicBool>,
) {
    let capture = match AudioCapture::new() {
        Ok(c) => c,
        Err(e) => {
            let _ = setup_tx.send(Err(e));
            return;
        }
    };

    let (chunk_tx, chunk_rx) = mpsc::channel();
    let handle = match capture.start(chunk_tx) {
        Ok(h) => h,
        Err(e) => {
            let _ = setup_tx.send(Err(e));
            return;
        }
    };

    log::debug!(
        "capture: stream open ({} Hz, {} ch)",
        capture.sample_rate(),
        capture.channels()
    );
    let _ = setup_tx.send(Ok(()));

    // Accumulate until the stop flag is set, then drain whatever the
    // callback delivered in the meantime.
    while !stop.load(Ordering::Relaxed) {
        match chunk_rx.recv_timeout(Duration::from_millis(50)) {
            Ok(chunk) => accumulate(&samples, &chunk.samples, chunk.sample_rate, chunk.channels),
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    // Stream drop stops the hardware; do it before the final drain so no
    // more chunks arrive while we empty the channel.
    drop(handle);
    while let Ok(chunk) = chunk_rx.try_recv() {
        accumulate(&samples, &chunk.samples, chunk.sample_rate, chunk.channels);
    }

    log::debug!("capture: stream closed");
}

fn accumulate(samples: &Arc<Mutex<Vec<f32>>>, raw: &[f32], rate: u32, channels: u16) {
    let mono = downmix_mono(raw, channels);
    let converted = resample(&mono, rate, TARGET_SAMPLE_RATE);
    if let Ok(mut buf) = samples.lock() {
        buf.extend_from_slice(&converted);
    }
}

// ---------------------------------------------------------------------------
// Mock backend (test-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Scriptable backend for coordinator tests: either fails `begin()` or
    /// hands out sessions pre-filled with fixed samples.
    pub struct MockCaptureBackend {
        pub samples: Vec<f32>,
        pub fail_begin: bool,
        /// Total `begin()` calls observed.
        pub begins: AtomicUsize,
        /// Sessions currently open; asserts the single-session invariant.
        pub open: Arc<AtomicUsize>,
    }

    impl MockCaptureBackend {
        pub fn with_samples(samples: Vec<f32>) -> Self {
            Self {
                samples,
                fail_begin: false,
                begins: AtomicUsize::new(0),
                open: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn failing() -> Self {
            Self {
                samples: Vec::new(),
                fail_begin: true,
                begins: AtomicUsize::new(0),
                open: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// One second of silence at the target rate.
        pub fn one_second() -> Self {
            Self::with_samples(vec![0.0; TARGET_SAMPLE_RATE as usize])
        }

        pub fn begin_count(&self) -> usize {
            self.begins.load(Ordering::SeqCst)
        }
    }

    impl CaptureBackend for MockCaptureBackend {
        fn begin(&self) -> Result<Box<dyn ActiveCapture>, CaptureError> {
            self.begins.fetch_add(1, Ordering::SeqCst);
            if self.fail_begin {
                return Err(CaptureError::NoDevice);
            }
            let previous = self.open.fetch_add(1, Ordering::SeqCst);
            assert_eq!(previous, 0, "second concurrent capture session opened");
            Ok(Box::new(MockActiveCapture {
                samples: self.samples.clone(),
                open: Arc::clone(&self.open),
            }))
        }
    }

    pub struct MockActiveCapture {
        samples: Vec<f32>,
        open: Arc<AtomicUsize>,
    }

    impl ActiveCapture for MockActiveCapture {
        fn sample_count(&self) -> usize {
            self.samples.len()
        }

        fn finish(self: Box<Self>) -> Result<Vec<f32>, CaptureError> {
            // Drop releases the open-session slot.
            Ok(self.samples.clone())
        }
    }

    impl Drop for MockActiveCapture {
        fn drop(&mut self) {
            // Runs for both finish() and bare drops on error paths.
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::mock::MockCaptureBackend;
    use super::*;

    #[test]
    fn mock_backend_round_trips_samples() {
        let backend = MockCaptureBackend::with_samples(vec![0.5; 100]);
        let session = backend.begin().expect("begin");
        assert_eq!(session.sample_count(), 100);
        let samples = session.finish().expect("finish");
        assert_eq!(samples.len(), 100);
    }

    #[test]
    fn failing_backend_reports_no_device() {
        let backend = MockCaptureBackend::failing();
        assert!(matches!(backend.begin(), Err(CaptureError::NoDevice)));
    }

    #[test]
    fn active_capture_is_send() {
        fn assert_send<T: Send + ?Sized>() {}
        assert_send::<Box<dyn ActiveCapture>>();
    }
}
