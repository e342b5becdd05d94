//! Framing of raw speech PCM into playable files.
//!
//! The TTS endpoint returns mono little-endian 16-bit PCM with the sample rate
//! in the MIME type (`audio/L16;codec=pcm;rate=24000`).

use mp3lame_encoder::{Bitrate, Builder, FlushNoGap, MonoPcm};

use crate::core::{AudioFormat, ErgonError};

pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;
pub const MAX_SAMPLE_RATE: u32 = 384_000;
pub const MP3_BLOCK_SAMPLES: usize = 1152;

const CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;
const WAV_HEADER_LEN: usize = 44;
/// LAME needs at least this much room to flush
const FLUSH_BUFFER_LEN: usize = 7200;

/// Extracts `rate=<N>` from a MIME type, falling back to 24 kHz when it is
/// missing, zero or above 384 kHz
pub fn sample_rate_from_mime(mime_type: &str) -> u32 {
    mime_type
        .split(';')
        .filter_map(|param| param.trim().strip_prefix("rate="))
        .find_map(|rate| rate.trim().parse::<u32>().ok())
        .filter(|rate| (1..=MAX_SAMPLE_RATE).contains(rate))
        .unwrap_or(DEFAULT_SAMPLE_RATE)
}

/// Prepends a 44-byte PCM WAV header to `pcm`, which is copied unchanged
pub fn pcm_to_wav(pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>, ErgonError> {
    let block_align = CHANNELS * BITS_PER_SAMPLE / 8;
    let byte_rate = sample_rate
        .checked_mul(u32::from(block_align))
        .ok_or_else(|| ErgonError::Audio(format!("sample rate {} is too large for WAV", sample_rate)))?;
    let data_len = u32::try_from(pcm.len())
        .ok()
        .filter(|len| len.checked_add(36).is_some())
        .ok_or_else(|| ErgonError::Audio(format!("{} bytes of PCM exceed the WAV size limit", pcm.len())))?;

    let mut wav = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&CHANNELS.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.extend_from_slice(pcm);
    Ok(wav)
}

/// One MP3 encoding session fed block by block
pub trait FrameEncoder {
    fn encode_block(&mut self, samples: &[i16], out: &mut Vec<u8>) -> Result<(), ErgonError>;
    fn flush(&mut self, out: &mut Vec<u8>) -> Result<(), ErgonError>;
}

/// LAME encoder configured for mono 128 kbps
pub struct LameEncoder {
    inner: mp3lame_encoder::Encoder,
}

impl LameEncoder {
    pub fn new(sample_rate: u32) -> Result<Self, ErgonError> {
        let mut builder =
            Builder::new().ok_or_else(|| ErgonError::Audio("Failed to create LAME encoder".to_string()))?;
        builder
            .set_num_channels(CHANNELS as u8)
            .map_err(|e| ErgonError::Audio(format!("channels: {:?}", e)))?;
        builder
            .set_sample_rate(sample_rate)
            .map_err(|e| ErgonError::Audio(format!("sample rate {}: {:?}", sample_rate, e)))?;
        builder
            .set_brate(Bitrate::Kbps128)
            .map_err(|e| ErgonError::Audio(format!("bitrate: {:?}", e)))?;
        let inner = builder
            .build()
            .map_err(|e| ErgonError::Audio(format!("init: {:?}", e)))?;
        Ok(Self { inner })
    }
}

impl FrameEncoder for LameEncoder {
    fn encode_block(&mut self, samples: &[i16], out: &mut Vec<u8>) -> Result<(), ErgonError> {
        out.reserve(mp3lame_encoder::max_required_buffer_size(samples.len()));
        self.inner
            .encode_to_vec(MonoPcm(samples), out)
            .map_err(|e| ErgonError::Audio(format!("encode: {:?}", e)))?;
        Ok(())
    }

    fn flush(&mut self, out: &mut Vec<u8>) -> Result<(), ErgonError> {
        out.reserve(FLUSH_BUFFER_LEN);
        self.inner
            .flush_to_vec::<FlushNoGap>(out)
            .map_err(|e| ErgonError::Audio(format!("flush: {:?}", e)))?;
        Ok(())
    }
}

/// Reinterprets `pcm` as little-endian i16 samples; a trailing odd byte is dropped
pub fn pcm_samples(pcm: &[u8]) -> Vec<i16> {
    pcm.chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Feeds `pcm` through `encoder` in 1152-sample blocks, then flushes.
/// Output chunks are concatenated in input order.
pub fn encode_mp3_with<E: FrameEncoder>(encoder: &mut E, pcm: &[u8]) -> Result<Vec<u8>, ErgonError> {
    let samples = pcm_samples(pcm);
    let mut mp3 = Vec::new();
    for block in samples.chunks(MP3_BLOCK_SAMPLES) {
        encoder.encode_block(block, &mut mp3)?;
    }
    encoder.flush(&mut mp3)?;
    Ok(mp3)
}

pub fn pcm_to_mp3(pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>, ErgonError> {
    let mut encoder = LameEncoder::new(sample_rate)?;
    encode_mp3_with(&mut encoder, pcm)
}

/// Frames `pcm` in the requested container, returning the bytes and MIME type
pub fn encode_pcm(format: AudioFormat, pcm: &[u8], sample_rate: u32) -> Result<(Vec<u8>, &'static str), ErgonError> {
    let data = match format {
        AudioFormat::Wav => pcm_to_wav(pcm, sample_rate)?,
        AudioFormat::Mp3 => pcm_to_mp3(pcm, sample_rate)?,
    };
    tracing::debug!("{} data size: {} bytes", format, data.len());
    Ok((data, format.mime_type()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    fn u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes(bytes[offset..offset + 2].try_into().unwrap())
    }

    #[test]
    fn wav_header_layout() {
        let pcm: Vec<u8> = (0..10).collect();
        let wav = pcm_to_wav(&pcm, 24_000).unwrap();

        assert_eq!(wav.len(), 54);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32_at(&wav, 4), 36 + 10);
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(u32_at(&wav, 16), 16);
        assert_eq!(u16_at(&wav, 20), 1);
        assert_eq!(u16_at(&wav, 22), 1);
        assert_eq!(u32_at(&wav, 24), 24_000);
        assert_eq!(u32_at(&wav, 28), 48_000);
        assert_eq!(u16_at(&wav, 32), 2);
        assert_eq!(u16_at(&wav, 34), 16);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32_at(&wav, 40), 10);
        assert_eq!(&wav[44..], &pcm[..]);
    }

    #[test]
    fn wav_is_deterministic_and_keeps_odd_payloads() {
        let pcm = [1u8, 2, 3];
        let a = pcm_to_wav(&pcm, 44_100).unwrap();
        let b = pcm_to_wav(&pcm, 44_100).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 47);
        assert_eq!(u32_at(&a, 24), 44_100);
        assert_eq!(&a[44..], &pcm);
    }

    #[test]
    fn wav_parses_with_hound() {
        let samples: Vec<i16> = vec![0, 1000, -1000, i16::MAX, i16::MIN];
        let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let wav = pcm_to_wav(&pcm, 16_000).unwrap();

        let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.bits_per_sample, 16);
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn sample_rate_parsing() {
        assert_eq!(sample_rate_from_mime("audio/L16;codec=pcm;rate=24000"), 24_000);
        assert_eq!(sample_rate_from_mime("audio/L16; rate=16000"), 16_000);
        assert_eq!(sample_rate_from_mime("audio/L16;codec=pcm"), DEFAULT_SAMPLE_RATE);
        assert_eq!(sample_rate_from_mime("audio/L16;rate=abc"), DEFAULT_SAMPLE_RATE);
        assert_eq!(sample_rate_from_mime("audio/L16;rate=0"), DEFAULT_SAMPLE_RATE);
        assert_eq!(sample_rate_from_mime(""), DEFAULT_SAMPLE_RATE);
    }

    #[test]
    fn oversized_sample_rates_never_overflow() {
        assert_eq!(sample_rate_from_mime("audio/L16;rate=384000"), 384_000);
        assert_eq!(sample_rate_from_mime("audio/L16;codec=pcm;rate=3000000000"), DEFAULT_SAMPLE_RATE);

        let wav = pcm_to_wav(&[0, 0], sample_rate_from_mime("audio/L16;rate=3000000000")).unwrap();
        assert_eq!(u32_at(&wav, 24), DEFAULT_SAMPLE_RATE);

        let err = pcm_to_wav(&[0, 0], 3_000_000_000).unwrap_err();
        assert!(matches!(err, ErgonError::Audio(_)));
    }

    #[test]
    fn samples_are_little_endian() {
        assert_eq!(pcm_samples(&[0x01, 0x00, 0xff, 0xff, 0x07]), vec![1, -1]);
    }

    #[derive(Default)]
    struct CountingEncoder {
        blocks: Vec<usize>,
        flushes: usize,
    }

    impl FrameEncoder for CountingEncoder {
        fn encode_block(&mut self, samples: &[i16], out: &mut Vec<u8>) -> Result<(), ErgonError> {
            self.blocks.push(samples.len());
            out.push(self.blocks.len() as u8);
            Ok(())
        }

        fn flush(&mut self, out: &mut Vec<u8>) -> Result<(), ErgonError> {
            self.flushes += 1;
            out.push(0xff);
            Ok(())
        }
    }

    #[test]
    fn mp3_block_accounting() {
        let samples = 2 * MP3_BLOCK_SAMPLES + 1;
        let pcm = vec![0u8; samples * 2];
        let mut encoder = CountingEncoder::default();

        let out = encode_mp3_with(&mut encoder, &pcm).unwrap();

        assert_eq!(encoder.blocks, vec![MP3_BLOCK_SAMPLES, MP3_BLOCK_SAMPLES, 1]);
        assert_eq!(encoder.flushes, 1);
        assert_eq!(out, vec![1, 2, 3, 0xff]);
    }

    #[test]
    fn mp3_exact_multiple_and_empty_input() {
        let mut encoder = CountingEncoder::default();
        encode_mp3_with(&mut encoder, &vec![0u8; MP3_BLOCK_SAMPLES * 2]).unwrap();
        assert_eq!(encoder.blocks.len(), 1);
        assert_eq!(encoder.flushes, 1);

        let mut encoder = CountingEncoder::default();
        encode_mp3_with(&mut encoder, &[]).unwrap();
        assert!(encoder.blocks.is_empty());
        assert_eq!(encoder.flushes, 1);
    }

    #[test]
    fn lame_produces_bytes_for_non_empty_input() {
        let pcm: Vec<u8> = (0..4800i32)
            .map(|i| ((i % 200 - 100) * 100) as i16)
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let mp3 = pcm_to_mp3(&pcm, DEFAULT_SAMPLE_RATE).unwrap();
        assert!(!mp3.is_empty());
    }

    #[test]
    fn encode_pcm_selects_container() {
        let (wav, mime) = encode_pcm(AudioFormat::Wav, &[0, 0], 24_000).unwrap();
        assert_eq!(mime, "audio/wav");
        assert_eq!(wav.len(), 46);
    }
}
