//! Log-mel filterbank features for the speaker embedding model
//!
//! Kaldi-compatible defaults (as used by WeSpeaker and 3D-Speaker exports):
//! 25 ms frames, 10 ms shift, Povey window, pre-emphasis 0.97, 80 mel bins
//! between 20 Hz and Nyquist - 400 Hz. Input is a [-1, 1] waveform which is
//! scaled back to 16-bit amplitude first, matching how the models were
//! trained.

use std::f64::consts::PI;

/// Filterbank options
#[derive(Debug, Clone)]
pub struct FbankOptions {
    pub sample_rate: usize,
    pub num_mels: usize,
    /// Frame length in samples (400 = 25 ms @ 16 kHz)
    pub frame_length: usize,
    /// Frame shift in samples (160 = 10 ms @ 16 kHz)
    pub frame_shift: usize,
    pub pre_emphasis: f64,
    /// Floor applied before taking the log
    pub energy_floor: f64,
    pub low_freq: f64,
    /// Upper mel edge; values <= 0 are an offset from Nyquist
    pub high_freq: f64,
    /// Multiplier applied to input samples (32768 maps [-1, 1] to int16 range)
    pub input_scale: f64,
}

impl Default for FbankOptions {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            num_mels: 80,
            frame_length: 400,
            frame_shift: 160,
            pre_emphasis: 0.97,
            energy_floor: 1e-10,
            low_freq: 20.0,
            high_freq: -400.0,
            input_scale: 32768.0,
        }
    }
}

impl FbankOptions {
    /// Number of frames produced for `num_samples` input samples
    pub fn num_frames(&self, num_samples: usize) -> usize {
        if self.frame_shift == 0 || num_samples < self.frame_length {
            return 0;
        }
        (num_samples - self.frame_length) / self.frame_shift + 1
    }
}

/// Compute `[frames][num_mels]` log-mel energies.
///
/// Returns `None` when the waveform is shorter than one frame.
pub fn compute_fbank(waveform: &[f32], opts: &FbankOptions) -> Option<Vec<Vec<f32>>> {
    let num_frames = opts.num_frames(waveform.len());
    if num_frames == 0 || opts.num_mels == 0 {
        return None;
    }

    let fft_size = opts.frame_length.next_power_of_two();
    let num_bins = fft_size / 2 + 1;
    let window = povey_window(opts.frame_length);
    let nyquist = opts.sample_rate as f64 / 2.0;
    let high_freq = if opts.high_freq <= 0.0 {
        nyquist + opts.high_freq
    } else {
        opts.high_freq
    };
    let filters = mel_filters(opts.num_mels, fft_size, opts.sample_rate, opts.low_freq, high_freq);

    let mut frame = vec![0.0f64; opts.frame_length];
    let mut spectrum = vec![(0.0f64, 0.0f64); fft_size];
    let mut power = vec![0.0f64; num_bins];
    let mut features = Vec::with_capacity(num_frames);

    for index in 0..num_frames {
        let start = index * opts.frame_shift;
        for (dst, &src) in frame
            .iter_mut()
            .zip(&waveform[start..start + opts.frame_length])
        {
            *dst = src as f64 * opts.input_scale;
        }

        let mean = frame.iter().sum::<f64>() / frame.len() as f64;
        frame.iter_mut().for_each(|v| *v -= mean);

        if opts.pre_emphasis > 0.0 {
            for i in (1..frame.len()).rev() {
                frame[i] -= opts.pre_emphasis * frame[i - 1];
            }
            frame[0] *= 1.0 - opts.pre_emphasis;
        }

        spectrum.iter_mut().for_each(|c| *c = (0.0, 0.0));
        for (i, (&v, &w)) in frame.iter().zip(&window).enumerate() {
            spectrum[i] = (v * w, 0.0);
        }
        fft_in_place(&mut spectrum);

        for (p, &(re, im)) in power.iter_mut().zip(&spectrum) {
            *p = re * re + im * im;
        }

        let row: Vec<f32> = filters
            .iter()
            .map(|filter| {
                let energy: f64 = filter.iter().zip(&power).map(|(w, p)| w * p).sum();
                energy.max(opts.energy_floor).ln() as f32
            })
            .collect();
        features.push(row);
    }

    Some(features)
}

/// Subtract the per-bin mean across frames (cepstral mean normalization)
pub fn mean_normalize(features: &mut [Vec<f32>]) {
    let Some(width) = features.first().map(|f| f.len()) else {
        return;
    };

    let count = features.len() as f64;
    for bin in 0..width {
        let mean = features.iter().map(|f| f[bin] as f64).sum::<f64>() / count;
        for f in features.iter_mut() {
            f[bin] = (f[bin] as f64 - mean) as f32;
        }
    }
}

/// Povey window (Hann raised to 0.85), Kaldi's default
fn povey_window(n: usize) -> Vec<f64> {
    let denom = (n.max(2) - 1) as f64;
    (0..n)
        .map(|i| (0.5 - 0.5 * (2.0 * PI * i as f64 / denom).cos()).powf(0.85))
        .collect()
}

fn hz_to_mel(hz: f64) -> f64 {
    1127.0 * (1.0 + hz / 700.0).ln()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * ((mel / 1127.0).exp() - 1.0)
}

/// Triangular filters on the mel scale, `[num_mels][fft_size / 2 + 1]`
fn mel_filters(
    num_mels: usize,
    fft_size: usize,
    sample_rate: usize,
    low_freq: f64,
    high_freq: f64,
) -> Vec<Vec<f64>> {
    let num_bins = fft_size / 2 + 1;
    let bin_hz = sample_rate as f64 / fft_size as f64;
    let mel_low = hz_to_mel(low_freq);
    let mel_step = (hz_to_mel(high_freq) - mel_low) / (num_mels + 1) as f64;

    (0..num_mels)
        .map(|m| {
            let left = mel_low + m as f64 * mel_step;
            let center = left + mel_step;
            let right = center + mel_step;

            (0..num_bins)
                .map(|k| {
                    let mel = hz_to_mel(k as f64 * bin_hz);
                    if mel <= left || mel >= right {
                        0.0
                    } else if mel <= center {
                        (mel - left) / (center - left)
                    } else {
                        (right - mel) / (right - center)
                    }
                })
                .collect()
        })
        .collect()
}

/// Radix-2 Cooley-Tukey FFT over `(re, im)` pairs; length must be a power of two
fn fft_in_place(buf: &mut [(f64, f64)]) {
    let n = buf.len();
    if n <= 1 {
        return;
    }

    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j ^= bit;
        if i < j {
            buf.swap(i, j);
        }
    }

    let mut len = 2;
    while len <= n {
        let angle = -2.0 * PI / len as f64;
        let step = (angle.cos(), angle.sin());
        for start in (0..n).step_by(len) {
            let mut w = (1.0f64, 0.0f64);
            for k in 0..len / 2 {
                let a = buf[start + k];
                let b = buf[start + k + len / 2];
                let t = (w.0 * b.0 - w.1 * b.1, w.0 * b.1 + w.1 * b.0);
                buf[start + k] = (a.0 + t.0, a.1 + t.1);
                buf[start + k + len / 2] = (a.0 - t.0, a.1 - t.1);
                w = (w.0 * step.0 - w.1 * step.1, w.0 * step.1 + w.1 * step.0);
            }
        }
        len <<= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(len: usize, hz: f32) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * hz * i as f32 / 16000.0).sin() * 0.5)
            .collect()
    }

    #[test]
    fn test_too_short_for_a_frame() {
        assert!(compute_fbank(&[0.0; 399], &FbankOptions::default()).is_none());
    }

    #[test]
    fn test_frame_count_for_minimum_clip() {
        // 1600 samples: (1600 - 400) / 160 + 1 = 8
        let features = compute_fbank(&tone(1600, 440.0), &FbankOptions::default()).unwrap();
        assert_eq!(features.len(), 8);
        assert_eq!(features[0].len(), 80);
    }

    #[test]
    fn test_silence_hits_energy_floor() {
        let features = compute_fbank(&[0.0; 800], &FbankOptions::default()).unwrap();
        let floor = (1e-10f64).ln() as f32;
        assert!(features.iter().flatten().all(|&v| (v - floor).abs() < 1e-3));
    }

    #[test]
    fn test_tone_energy_peaks_near_its_frequency() {
        let features = compute_fbank(&tone(16000, 1000.0), &FbankOptions::default()).unwrap();
        let frame = &features[10];
        let peak = frame
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        // 1 kHz sits in the lower-middle of the 20..7600 Hz mel range
        assert!((15..40).contains(&peak), "peak bin {}", peak);
    }

    #[test]
    fn test_mean_normalize_zeroes_bin_means() {
        let mut features = vec![vec![1.0f32, 10.0], vec![3.0, 20.0], vec![5.0, 30.0]];
        mean_normalize(&mut features);
        for bin in 0..2 {
            let mean: f32 = features.iter().map(|f| f[bin]).sum::<f32>() / 3.0;
            assert!(mean.abs() < 1e-5);
        }
        assert_eq!(features[0], vec![-2.0, -10.0]);
    }

    #[test]
    fn test_fft_impulse_is_flat() {
        let mut buf = vec![(1.0, 0.0), (0.0, 0.0), (0.0, 0.0), (0.0, 0.0)];
        fft_in_place(&mut buf);
        for (re, im) in buf {
            assert!((re - 1.0).abs() < 1e-12);
            assert!(im.abs() < 1e-12);
        }
    }

    #[test]
    fn test_mel_scale_roundtrip() {
        for hz in [20.0, 440.0, 1000.0, 7600.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
    }
}
