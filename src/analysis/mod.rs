//! Spectral analysis of captured audio
//!
//! Turns a block of raw loopback samples into four band-energy scalars
//! (bass/low/mid/treble) per tick. The chain is: stereo downmix, Hann
//! window, radix-2 FFT, A-weighting, normalization against a slow EMA
//! loudness reference, then a cumulative-sum band split over the lower
//! half of the spectrum.

pub mod fft;

use crate::error::AnalysisError;

/// EMA smoothing factor for the adaptive loudness reference. Smaller
/// means slower adaptation.
const EMA_ALPHA: f32 = 0.02;

/// Seed for the loudness reference; keeps the first normalizations away
/// from a division by zero.
const EMA_SEED: f32 = 1e-6;

/// Four normalized band energies in ascending frequency order.
///
/// Nominally in [0,1] but not guaranteed: per-bin intensities are
/// clamped, their sums over a band are not. Consumers that need a hard
/// [0,1] must clamp again.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bands {
    pub bass: f32,
    pub low: f32,
    pub mid: f32,
    pub treble: f32,
}

/// Reusable analysis state for a fixed block size.
pub struct SpectrumAnalyzer {
    block_size: usize,
    sample_rate: f32,
    window: Vec<f32>,
    re: Vec<f32>,
    im: Vec<f32>,
    bins: Vec<f32>,
    cumulative: Vec<f32>,
    ema_ref: f32,
}

impl SpectrumAnalyzer {
    pub fn new(block_size: usize, sample_rate: u32) -> Result<Self, AnalysisError> {
        if !block_size.is_power_of_two() {
            return Err(AnalysisError::BlockSizeNotPowerOfTwo(block_size));
        }

        // Hann window, precomputed once
        let window = (0..block_size)
            .map(|i| {
                let phase = 2.0 * std::f64::consts::PI * i as f64 / (block_size - 1) as f64;
                (0.5 - 0.5 * phase.cos()) as f32
            })
            .collect();

        let half = block_size / 2;
        Ok(Self {
            block_size,
            sample_rate: sample_rate as f32,
            window,
            re: vec![0.0; block_size],
            im: vec![0.0; block_size],
            bins: vec![0.0; half],
            cumulative: vec![0.0; half],
            ema_ref: EMA_SEED,
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Current adaptive loudness reference.
    pub fn loudness_ref(&self) -> f32 {
        self.ema_ref
    }

    /// Analyze one block of freshly captured samples.
    ///
    /// `samples` must hold `block_size` samples. Interleaved stereo is
    /// averaged pairwise into mono; once the pairs run out the tail is
    /// passed through unchanged, so a mono buffer works too.
    pub fn analyze(&mut self, samples: &[f32]) -> Bands {
        let n = self.block_size;
        debug_assert_eq!(samples.len(), n);

        // Downmix + window into the FFT buffers
        for i in 0..n {
            let j = i * 2;
            let mono = if j + 1 < samples.len() {
                0.5 * (samples[j] + samples[j + 1])
            } else {
                samples[i]
            };
            self.re[i] = mono * self.window[i];
            self.im[i] = 0.0;
        }

        fft::radix2(&mut self.re, &mut self.im);

        // Real input: spectrum is symmetric, keep bins 0..n/2
        let half = n / 2;

        // Update the loudness reference from mean non-DC magnitude,
        // pre-weighting, so the reference tracks overall signal energy.
        let mut energy = 0.0f32;
        for k in 1..half {
            energy += (self.re[k] * self.re[k] + self.im[k] * self.im[k]).sqrt();
        }
        energy /= (half - 1) as f32;
        self.ema_ref = (1.0 - EMA_ALPHA) * self.ema_ref + EMA_ALPHA * energy.max(1e-6);

        // Weighted, normalized, compressed per-bin intensity in [0,1]
        for k in 0..half {
            let freq = k as f32 * self.sample_rate / n as f32;
            let mag = (self.re[k] * self.re[k] + self.im[k] * self.im[k]).sqrt();

            let gain = 10.0f32.powf(a_weighting_db(freq) / 20.0);
            let x = (mag * gain / (self.ema_ref + 1e-9)).max(0.0).sqrt();
            self.bins[k] = x.min(1.0);
        }

        // Monotonic prefix sum, then band differences at the quartile
        // boundaries of the half spectrum. The 4/half factor puts each
        // band on a comparable scale regardless of block size.
        let mut running = 0.0f32;
        for (cum, &bin) in self.cumulative.iter_mut().zip(&self.bins) {
            running += bin;
            *cum = running;
        }

        let cum = &self.cumulative;
        let norm = 4.0 / half as f32;
        Bands {
            bass: (cum[half / 4] - cum[0]) * norm,
            low: (cum[half / 2] - cum[half / 4]) * norm,
            mid: (cum[3 * half / 4] - cum[half / 2]) * norm,
            treble: (cum[half - 1] - cum[3 * half / 4]) * norm,
        }
    }
}

/// Approximate A-weighting in dB for a frequency in Hz.
///
/// Standard four-pole formula; roughly 0 dB through 1–5 kHz, strongly
/// negative toward the low end. The curve is undefined at 0 Hz, so DC
/// is forced to a heavily attenuated value.
pub fn a_weighting_db(freq: f32) -> f32 {
    if freq <= 0.0 {
        return -80.0;
    }

    let f = f64::from(freq);
    let f2 = f * f;

    let ra = (12200.0f64.powi(2) * f.powi(4))
        / ((f2 + 20.6f64.powi(2))
            * ((f2 + 107.7f64.powi(2)) * (f2 + 737.9f64.powi(2))).sqrt()
            * (f2 + 12200.0f64.powi(2)));

    (20.0 * ra.log10() + 2.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 48_000;

    fn sine_block(n: usize, bin: usize, amplitude: f32) -> Vec<f32> {
        (0..n)
            .map(|i| {
                amplitude
                    * (2.0 * std::f32::consts::PI * bin as f32 * i as f32 / n as f32).sin()
            })
            .collect()
    }

    #[test]
    fn test_rejects_non_power_of_two_block() {
        assert!(matches!(
            SpectrumAnalyzer::new(1000, SAMPLE_RATE),
            Err(AnalysisError::BlockSizeNotPowerOfTwo(1000))
        ));
        assert!(SpectrumAnalyzer::new(1024, SAMPLE_RATE).is_ok());
    }

    #[test]
    fn test_a_weighting_curve_shape() {
        // ~+2 dB at 1 kHz with this formula's offset, well below zero
        // in the rumble region, forced floor at DC.
        assert!((a_weighting_db(1000.0) - 2.0).abs() < 1.0);
        assert!(a_weighting_db(20.0) < -40.0);
        assert!(a_weighting_db(0.0) == -80.0);
        assert!(a_weighting_db(-5.0) == -80.0);
    }

    #[test]
    fn test_low_tone_concentrates_in_bass_band() {
        const N: usize = 1024;
        let mut analyzer = SpectrumAnalyzer::new(N, SAMPLE_RATE).unwrap();

        // Mono content at bin 32 (~1.5 kHz): inside the bass quartile of
        // the half spectrum. Run enough ticks for the EMA reference to
        // settle so per-bin values are no longer pinned at the clamp.
        let block = sine_block(N, 32, 0.5);
        let mut bands = Bands::default();
        for _ in 0..50 {
            bands = analyzer.analyze(&block);
        }

        assert!(bands.bass > bands.low);
        assert!(bands.bass > bands.mid);
        assert!(bands.bass > bands.treble);
        assert!(bands.treble < 0.1);
    }

    #[test]
    fn test_loudness_reference_adapts_upward() {
        const N: usize = 512;
        let mut analyzer = SpectrumAnalyzer::new(N, SAMPLE_RATE).unwrap();
        let initial = analyzer.loudness_ref();

        let block = sine_block(N, 20, 0.8);
        analyzer.analyze(&block);
        let after_one = analyzer.loudness_ref();
        assert!(after_one > initial);

        for _ in 0..100 {
            analyzer.analyze(&block);
        }
        assert!(analyzer.loudness_ref() > after_one);
    }

    #[test]
    fn test_silence_yields_near_zero_bands() {
        const N: usize = 512;
        let mut analyzer = SpectrumAnalyzer::new(N, SAMPLE_RATE).unwrap();
        let silence = vec![0.0f32; N];
        let bands = analyzer.analyze(&silence);
        assert_eq!(bands.bass, 0.0);
        assert_eq!(bands.treble, 0.0);
    }

    #[test]
    fn test_bands_stay_finite() {
        const N: usize = 512;
        let mut analyzer = SpectrumAnalyzer::new(N, SAMPLE_RATE).unwrap();

        // Harsh broadband content, including clipping-level samples.
        let block: Vec<f32> = (0..N)
            .map(|i| if i % 3 == 0 { 1.0 } else { -1.0 })
            .collect();
        for _ in 0..10 {
            let bands = analyzer.analyze(&block);
            for v in [bands.bass, bands.low, bands.mid, bands.treble] {
                assert!(v.is_finite());
                assert!(v >= 0.0);
            }
        }
    }
}
