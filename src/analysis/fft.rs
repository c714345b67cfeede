//! In-place radix-2 Cooley–Tukey FFT
//!
//! Small fixed-size transform tuned for the analysis loop: no planner,
//! no allocation, operates on separate real/imaginary buffers.

/// Forward FFT over `re`/`im` in place.
///
/// Length must be a power of two; anything else is a programming error
/// and panics immediately rather than producing garbage spectra.
pub fn radix2(re: &mut [f32], im: &mut [f32]) {
    let n = re.len();
    assert_eq!(n, im.len(), "mismatched FFT buffer lengths");
    assert!(n.is_power_of_two(), "FFT size must be a power of two");

    // Bit-reversal permutation
    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j |= bit;

        if i < j {
            re.swap(i, j);
            im.swap(i, j);
        }
    }

    // Butterfly stages
    let mut len = 2;
    while len <= n {
        let ang = -2.0 * std::f64::consts::PI / len as f64;
        let wlen_re = ang.cos() as f32;
        let wlen_im = ang.sin() as f32;

        let half = len >> 1;
        let mut i = 0;
        while i < n {
            let mut w_re = 1.0f32;
            let mut w_im = 0.0f32;

            for k in 0..half {
                let u = i + k;
                let v = u + half;

                let vr = re[v] * w_re - im[v] * w_im;
                let vi = re[v] * w_im + im[v] * w_re;

                let ur = re[u];
                let ui = im[u];

                re[u] = ur + vr;
                im[u] = ui + vi;
                re[v] = ur - vr;
                im[v] = ui - vi;

                let next_re = w_re * wlen_re - w_im * wlen_im;
                let next_im = w_re * wlen_im + w_im * wlen_re;
                w_re = next_re;
                w_im = next_im;
            }
            i += len;
        }
        len <<= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn magnitudes(re: &[f32], im: &[f32]) -> Vec<f32> {
        re.iter()
            .zip(im)
            .map(|(r, i)| (r * r + i * i).sqrt())
            .collect()
    }

    #[test]
    fn test_sinusoid_peaks_at_its_bin() {
        const N: usize = 256;
        const K: usize = 19;

        let mut re: Vec<f32> = (0..N)
            .map(|i| (2.0 * std::f32::consts::PI * K as f32 * i as f32 / N as f32).sin())
            .collect();
        let mut im = vec![0.0f32; N];
        radix2(&mut re, &mut im);

        let mags = magnitudes(&re, &im);
        let peak = mags[..N / 2]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, K);

        // An exact-bin sinusoid carries amplitude N/2 in its bin.
        assert!((mags[K] - N as f32 / 2.0).abs() < 1e-2);
    }

    #[test]
    fn test_dc_input_lands_in_bin_zero() {
        const N: usize = 64;
        let mut re = vec![1.0f32; N];
        let mut im = vec![0.0f32; N];
        radix2(&mut re, &mut im);

        assert!((re[0] - N as f32).abs() < 1e-3);
        for k in 1..N {
            assert!(re[k].abs() < 1e-3);
            assert!(im[k].abs() < 1e-3);
        }
    }

    #[test]
    fn test_deterministic_across_runs() {
        const N: usize = 128;
        let input: Vec<f32> = (0..N).map(|i| ((i * 37 % 97) as f32 - 48.0) / 48.0).collect();

        let mut re1 = input.clone();
        let mut im1 = vec![0.0f32; N];
        radix2(&mut re1, &mut im1);

        let mut re2 = input;
        let mut im2 = vec![0.0f32; N];
        radix2(&mut re2, &mut im2);

        assert_eq!(re1, re2);
        assert_eq!(im1, im2);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn test_rejects_non_power_of_two() {
        let mut re = vec![0.0f32; 100];
        let mut im = vec![0.0f32; 100];
        radix2(&mut re, &mut im);
    }
}
