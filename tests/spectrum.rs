mod common;

use num_complex::Complex;
use rustfft::FftPlanner;

use common::*;

/// Frequency of the strongest bin, interpolated between neighbours
fn dominant_frequency(samples: &[f32], sample_rate: u32) -> f32 {
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(samples.len());

    // Hann window keeps leakage away from the peak
    let n = samples.len() as f32;
    let mut buffer: Vec<Complex<f32>> = samples
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let w = 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / n).cos();
            Complex { re: s * w, im: 0.0 }
        })
        .collect();

    fft.process(&mut buffer);

    let magnitudes: Vec<f32> = buffer.iter().take(buffer.len() / 2).map(|c| c.norm()).collect();
    let (peak, _) = magnitudes
        .iter()
        .enumerate()
        .skip(1)
        .fold((0, 0.0f32), |best, (i, &m)| if m > best.1 { (i, m) } else { best });

    // parabolic interpolation
    let (a, b, c) = (magnitudes[peak - 1], magnitudes[peak], magnitudes[peak + 1]);
    let offset = 0.5 * (a - c) / (a - 2.0 * b + c);

    (peak as f32 + offset) * sample_rate as f32 / samples.len() as f32
}

fn sine_frequency(key_code: u8, key_fraction: u8) -> f32 {
    let mut chip = chip();
    program_sine(&mut chip, 1, key_code, 0x1f);
    chip.write_register(0x31, key_fraction << 2).unwrap();
    key_on(&mut chip, 1);

    let sample_rate = chip.sample_rate(CLOCK);
    let frames = render(&mut chip, 16384);
    dominant_frequency(&left(&frames), sample_rate)
}

#[test]
fn test_a4_is_440hz() {
    let freq = sine_frequency(0x4a, 0);
    assert!((freq - 440.0).abs() < 1.0, "got {} Hz", freq);
}

#[test]
fn test_octaves_double() {
    let a3 = sine_frequency(0x3a, 0);
    let a5 = sine_frequency(0x5a, 0);
    assert!((a3 - 220.0).abs() < 1.0, "got {} Hz", a3);
    assert!((a5 - 880.0).abs() < 2.0, "got {} Hz", a5);
}

#[test]
fn test_key_fraction_raises_pitch() {
    // 32/64 of a semitone above A4
    let freq = sine_frequency(0x4a, 32);
    let expected = 440.0 * 2.0f32.powf(0.5 / 12.0);
    assert!((freq - expected).abs() < 1.5, "got {} Hz, expected {}", freq, expected);
}

#[test]
fn test_multiple_scales_frequency() {
    let mut chip = chip();
    program_sine(&mut chip, 0, 0x4a, 0x1f);
    // x3
    chip.write_register(0x40, 0x03).unwrap();
    key_on(&mut chip, 0);

    let sample_rate = chip.sample_rate(CLOCK);
    let frames = render(&mut chip, 16384);
    let freq = dominant_frequency(&left(&frames), sample_rate);
    assert!((freq - 1320.0).abs() < 3.0, "got {} Hz", freq);
}
