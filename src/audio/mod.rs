//! Audio capture — microphone stream → accumulated samples → WAV artifact.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → AudioChunk (mpsc) → downmix_mono
//!           → resample to 16 kHz → session buffer → encode_wav_mono16
//! ```
//!
//! [`CaptureSession`] owns exactly one recording at a time: the cpal stream
//! lives on a dedicated thread (cpal streams are not `Send`), samples
//! accumulate while the session is active, and `finish()` releases the
//! microphone before returning the audio — transcription latency never
//! keeps the device open.

pub mod capture;
pub mod resample;
pub mod session;
pub mod wav;

pub use capture::{AudioCapture, AudioChunk, CaptureError};
pub use resample::{downmix_mono, resample};
pub use session::{ActiveCapture, CaptureBackend, CaptureSession, CpalCaptureBackend};
pub use wav::encode_wav_mono16;

/// Sample rate of every finished artifact, in Hz.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

// ---------------------------------------------------------------------------
// AudioArtifact
// ---------------------------------------------------------------------------

/// A finalized recording: one opaque binary blob plus its mime descriptor.
///
/// Fixed encoding: 16 kHz mono 16-bit PCM WAV.
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

impl AudioArtifact {
    /// Encode 16 kHz mono samples into a WAV artifact.
    pub fn wav(samples: &[f32]) -> Result<Self, CaptureError> {
        let bytes = encode_wav_mono16(samples, TARGET_SAMPLE_RATE)
            .map_err(|e| CaptureError::Encode(e.to_string()))?;
        Ok(Self {
            bytes,
            mime: "audio/wav",
        })
    }
}
