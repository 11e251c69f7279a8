//! Numeric helpers for field statistics and deterministic sampling.

/// Arithmetic mean, 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance, 0.0 for an empty slice.
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Component-wise mean of equal-length rows.
pub fn column_means<const N: usize>(rows: &[[f64; N]]) -> [f64; N] {
    let mut out = [0.0; N];
    if rows.is_empty() {
        return out;
    }
    for row in rows {
        for (acc, v) in out.iter_mut().zip(row.iter()) {
            *acc += v;
        }
    }
    for acc in out.iter_mut() {
        *acc /= rows.len() as f64;
    }
    out
}

/// ‖w ⊙ (x − center)‖₂
pub fn weighted_deviation<const N: usize>(x: &[f64; N], center: &[f64; N], weights: &[f64; N]) -> f64 {
    x.iter()
        .zip(center.iter())
        .zip(weights.iter())
        .map(|((xi, ci), wi)| (wi * (xi - ci)).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Clamp to `[lo, hi]`, replacing non-finite input with `fallback`.
pub fn clamp_or(value: f64, lo: f64, hi: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(lo, hi)
    } else {
        fallback.clamp(lo, hi)
    }
}

/// Deterministic value in [0, 1) derived from `parts` with blake3.
pub fn hash_unit(parts: &[&[u8]]) -> f64 {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
        hasher.update(&[0x1f]);
    }
    let digest = hasher.finalize();
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&digest.as_bytes()[..8]);
    (u64::from_le_bytes(buf) >> 11) as f64 / (1u64 << 53) as f64
}
