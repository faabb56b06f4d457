use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Inputs shorter than this skip the FFT machinery.
const DIRECT_THRESHOLD: usize = 64;

/// Linear convolution, `signal.len() + kernel.len() - 1` samples long.
///
/// Long inputs go through FFT overlap-add; short ones are convolved
/// directly, which is faster and exact.
pub fn convolve(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    if signal.is_empty() || kernel.is_empty() {
        return Vec::new();
    }
    if signal.len() <= DIRECT_THRESHOLD || kernel.len() <= DIRECT_THRESHOLD {
        return convolve_direct(signal, kernel);
    }

    let output_len = signal.len() + kernel.len() - 1;

    // Transform size: next power of two holding a block plus the kernel tail
    let fft_size = (2 * kernel.len()).next_power_of_two();
    let block_size = fft_size - kernel.len() + 1;

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(fft_size);
    let ifft = planner.plan_fft_inverse(fft_size);

    let mut kernel_fft = vec![Complex::new(0.0, 0.0); fft_size];
    for (slot, &k) in kernel_fft.iter_mut().zip(kernel.iter()) {
        slot.re = k;
    }
    fft.process(&mut kernel_fft);

    let mut output = vec![0.0; output_len];
    let scale = 1.0 / fft_size as f64;
    let mut block = vec![Complex::new(0.0, 0.0); fft_size];

    let mut pos = 0;
    while pos < signal.len() {
        let end = (pos + block_size).min(signal.len());
        let chunk = &signal[pos..end];

        for slot in block.iter_mut() {
            *slot = Complex::new(0.0, 0.0);
        }
        for (slot, &s) in block.iter_mut().zip(chunk.iter()) {
            slot.re = s;
        }

        fft.process(&mut block);
        for (b, k) in block.iter_mut().zip(kernel_fft.iter()) {
            *b *= k;
        }
        ifft.process(&mut block);

        let valid = (chunk.len() + kernel.len() - 1).min(output_len - pos);
        for (out, b) in output[pos..pos + valid].iter_mut().zip(block.iter()) {
            *out += b.re * scale;
        }

        pos = end;
    }

    output
}

fn convolve_direct(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    let mut output = vec![0.0; signal.len() + kernel.len() - 1];
    for (i, &s) in signal.iter().enumerate() {
        if s == 0.0 {
            continue;
        }
        for (j, &k) in kernel.iter().enumerate() {
            output[i + j] += s * k;
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_impulse_identity() {
        let signal = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = convolve(&signal, &[1.0]);
        assert_eq!(result.len(), signal.len());
        for (a, b) in signal.iter().zip(result.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_delay_kernel() {
        let result = convolve(&[1.0, 2.0, 3.0], &[0.0, 1.0]);
        let expected = [0.0, 1.0, 2.0, 3.0];
        assert_eq!(result.len(), expected.len());
        for (a, b) in result.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_known_result() {
        // [1,2,3] * [1,1] = [1,3,5,3]
        let result = convolve(&[1.0, 2.0, 3.0], &[1.0, 1.0]);
        let expected = [1.0, 3.0, 5.0, 3.0];
        for (a, b) in result.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_empty_inputs() {
        assert!(convolve(&[], &[1.0]).is_empty());
        assert!(convolve(&[1.0], &[]).is_empty());
    }

    #[test]
    fn test_fft_path_matches_direct() {
        let signal: Vec<f64> = (0..700).map(|i| (i as f64 * 0.05).sin()).collect();
        let kernel: Vec<f64> = (0..150).map(|i| (-0.02 * i as f64).exp()).collect();

        let fft_result = convolve(&signal, &kernel);
        let direct = convolve_direct(&signal, &kernel);

        assert_eq!(fft_result.len(), direct.len());
        for (i, (a, b)) in fft_result.iter().zip(direct.iter()).enumerate() {
            assert!((a - b).abs() < 1e-8, "mismatch at {i}: {a} vs {b}");
        }
    }

    #[test]
    fn test_long_signal_with_padded_impulse() {
        let signal: Vec<f64> = (0..2000).map(|i| (i as f64 * 0.01).cos()).collect();
        let mut kernel = vec![0.0; 300];
        kernel[0] = 1.0;

        let result = convolve(&signal, &kernel);
        assert_eq!(result.len(), signal.len() + kernel.len() - 1);
        for (i, &s) in signal.iter().enumerate() {
            assert!((result[i] - s).abs() < 1e-10, "mismatch at {i}");
        }
    }
}
