use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::types::AudioData;
use crate::error::{PlayerError, Result};

/// Decode the first audio track of a media file into memory.
///
/// Works for plain audio files and for the soundtrack of video containers.
/// The whole track is held as interleaved `f32`, roughly 1.4 GB per hour of
/// 48 kHz stereo, so feature-length videos need that much memory.
pub fn decode_file(path: &Path) -> Result<AudioData> {
    let file = File::open(path).map_err(|source| PlayerError::OpenFile {
        path: path.to_path_buf(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(PlayerError::Probe)?;

    let mut format = probed.format;

    // Video containers may list non-audio tracks first.
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
        .ok_or(PlayerError::NoAudioTrack)?
        .clone();

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(PlayerError::NoAudioTrack)?;
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(2);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(PlayerError::Decode)?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(PlayerError::Decode(e)),
        };

        if packet.track_id() != track.id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!("Decode warning in {}: {e}", path.display());
                continue;
            }
            Err(e) => return Err(PlayerError::Decode(e)),
        };

        let spec = *decoded.spec();
        channels = spec.channels.count() as u16;
        let num_frames = decoded.capacity();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    let channels = channels.max(1);
    let num_frames = samples.len() / channels as usize;
    let duration = num_frames as f64 / sample_rate as f64;

    tracing::debug!(
        "Decoded {}: {num_frames} frames, {channels} ch @ {sample_rate} Hz",
        path.display()
    );

    Ok(AudioData {
        samples,
        sample_rate,
        channels,
        duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_open_error() {
        let err = decode_file(Path::new("/definitely/not/here.mp3")).unwrap_err();
        assert!(matches!(err, PlayerError::OpenFile { .. }));
    }

    #[test]
    fn garbage_file_fails_to_probe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"this is not a riff header").unwrap();
        assert!(decode_file(&path).is_err());
    }

    #[test]
    fn decodes_pcm_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        std::fs::write(&path, wav_bytes(8_000, &[0, 16_384, -16_384, 0])).unwrap();

        let data = decode_file(&path).unwrap();
        assert_eq!(data.sample_rate, 8_000);
        assert_eq!(data.channels, 1);
        assert_eq!(data.num_frames(), 4);
        assert!((data.samples[1] - 0.5).abs() < 1e-3);
    }

    /// Minimal 16-bit mono RIFF/WAVE file.
    fn wav_bytes(sample_rate: u32, samples: &[i16]) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVEfmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }
}
