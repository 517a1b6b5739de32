//! False positive rate models for the builtin encodings.
//!
//! These are estimates used for sizing and for checking observed rates in
//! tests; none of them influence the bytes a builder writes.

/// Standard Bloom filter false positive rate:
/// `p = (1 - e^(-k / bits_per_key))^k`.
pub fn standard_fp_rate(bits_per_key: f64, num_probes: u32) -> f64 {
    if bits_per_key <= 0.0 {
        return 1.0;
    }
    let k = num_probes as f64;
    (1.0 - (-k / bits_per_key).exp()).powf(k)
}

/// False positive rate of a Bloom filter whose probes for one key all land
/// in a single cache line of `cache_line_bits` bits.
///
/// Key counts per line vary, so the rate is averaged over a line one
/// standard deviation more crowded and one less crowded than the mean.
pub fn cache_local_fp_rate(bits_per_key: f64, num_probes: u32, cache_line_bits: u32) -> f64 {
    if bits_per_key <= 0.0 {
        return 1.0;
    }
    let line_bits = cache_line_bits as f64;
    let keys_per_line = line_bits / bits_per_key;
    let keys_stddev = keys_per_line.sqrt();
    let crowded = standard_fp_rate(line_bits / (keys_per_line + keys_stddev), num_probes);
    let uncrowded_keys = (keys_per_line - keys_stddev).max(f64::MIN_POSITIVE);
    let uncrowded = standard_fp_rate(line_bits / uncrowded_keys, num_probes);
    (crowded + uncrowded) / 2.0
}

/// Probability that a query collides with some key on all
/// `fingerprint_bits` bits of its hash.
pub fn fingerprint_fp_rate(num_keys: usize, fingerprint_bits: u32) -> f64 {
    let inv_fingerprint_space = 0.5f64.powi(fingerprint_bits as i32);
    let base_estimate = num_keys as f64 * inv_fingerprint_space;
    if base_estimate > 0.0001 {
        1.0 - (-base_estimate).exp()
    } else {
        // Taylor expansion keeps precision for tiny rates.
        base_estimate - (base_estimate * base_estimate * 0.5)
    }
}

/// Rate of either of two independent events occurring.
pub fn independent_probability_sum(rate1: f64, rate2: f64) -> f64 {
    rate1 + rate2 - (rate1 * rate2)
}
