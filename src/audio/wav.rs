//! In-memory WAV encoding via `hound`.

use std::io::Cursor;

/// Encode mono `f32` samples as a 16-bit PCM WAV file in memory.
///
/// Samples are clamped to `[-1.0, 1.0]` before conversion so a clipped
/// capture cannot wrap around when scaled to `i16`.
pub fn encode_wav_mono16(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut bytes = Vec::with_capacity(44 + samples.len() * 2);
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec)?;
        for &sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(value)?;
        }
        writer.finalize()?;
    }

    Ok(bytes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_declares_riff_wave() {
        let bytes = encode_wav_mono16(&vec![0.0f32; 16], 16_000).expect("encode");
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
    }

    #[test]
    fn data_size_matches_sample_count() {
        let samples = vec![0.5f32; 100];
        let bytes = encode_wav_mono16(&samples, 16_000).expect("encode");
        // 44-byte canonical header + 2 bytes per 16-bit sample.
        assert_eq!(bytes.len(), 44 + samples.len() * 2);
    }

    #[test]
    fn out_of_range_samples_are_clamped() {
        // Would overflow i16 without clamping; must not panic.
        let bytes = encode_wav_mono16(&[2.0, -2.0, 1.0, -1.0], 16_000).expect("encode");
        assert!(bytes.len() > 44);
    }

    #[test]
    fn empty_input_yields_header_only() {
        let bytes = encode_wav_mono16(&[], 16_000).expect("encode");
        assert_eq!(bytes.len(), 44);
    }

    #[test]
    fn round_trips_through_hound_reader() {
        let samples = vec![0.25f32; 64];
        let bytes = encode_wav_mono16(&samples, 16_000).expect("encode");

        let reader = hound::WavReader::new(Cursor::new(bytes)).expect("read");
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len(), 64);
    }
}
