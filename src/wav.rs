use std::io::Cursor;

use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};

use ymopm::ym2151::OUTPUTS;
use ymopm::OutputFrame;

/// Encode chip output as an interleaved 16-bit WAV image.
pub fn encode_wav(frames: &[OutputFrame<OUTPUTS>], sample_rate: u32) -> Result<Vec<u8>> {
    let wav_spec = WavSpec {
        channels: OUTPUTS as u16,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut wav = vec![];
    let mut cursor = Cursor::new(&mut wav);
    let mut wav_writer = WavWriter::new(&mut cursor, wav_spec).context("unable to start wav stream")?;

    for frame in frames {
        for value in frame.data {
            // generate() already clamps to 16 bits
            wav_writer.write_sample(value as i16)?;
        }
    }

    wav_writer.finalize()?;

    Ok(wav)
}
