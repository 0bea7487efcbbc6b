//! Sample-level helpers: normalization, resampling, PCM conversion

/// Bring a waveform into `[-1.0, 1.0]`.
///
/// Non-finite samples are zeroed. If the peak exceeds 1.0 the whole
/// waveform is scaled down so the peak lands on 1.0; quieter audio is left
/// untouched.
pub fn normalize(samples: &mut [f32]) {
    for s in samples.iter_mut() {
        if !s.is_finite() {
            *s = 0.0;
        }
    }

    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak > 1.0 {
        let scale = 1.0 / peak;
        for s in samples.iter_mut() {
            *s *= scale;
        }
    }
}

/// Convert f32 samples to 16-bit PCM
pub fn to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

/// Linear-interpolation resampler
#[derive(Debug, Clone, Copy)]
pub struct Resampler {
    from_rate: u32,
    to_rate: u32,
}

impl Resampler {
    /// Create a new resampler
    pub fn new(from_rate: u32, to_rate: u32) -> Self {
        Self { from_rate, to_rate }
    }

    /// Output length for `input_len` source samples
    pub fn output_len(&self, input_len: usize) -> usize {
        if self.from_rate == 0 {
            return 0;
        }
        let ratio = self.to_rate as f64 / self.from_rate as f64;
        (input_len as f64 * ratio).round() as usize
    }

    /// Resample with linear interpolation.
    ///
    /// The first and last output samples coincide with the first and last
    /// input samples.
    pub fn resample(&self, input: &[f32]) -> Vec<f32> {
        if self.from_rate == self.to_rate {
            return input.to_vec();
        }

        let output_len = self.output_len(input.len());
        if output_len == 0 || input.is_empty() {
            return Vec::new();
        }
        if input.len() == 1 || output_len == 1 {
            return vec![input[0]; output_len];
        }

        let step = (input.len() - 1) as f64 / (output_len - 1) as f64;
        let last = input.len() - 1;
        let mut output = Vec::with_capacity(output_len);

        for i in 0..output_len {
            let src_idx = i as f64 * step;
            let idx_floor = (src_idx.floor() as usize).min(last);
            let idx_ceil = (idx_floor + 1).min(last);
            let frac = (src_idx - idx_floor as f64) as f32;

            output.push(input[idx_floor] * (1.0 - frac) + input[idx_ceil] * frac);
        }

        output
    }
}
