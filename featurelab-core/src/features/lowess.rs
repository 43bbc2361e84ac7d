//! Causal LOWESS: robust locally weighted linear regression that only looks
//! at the current and earlier points.
//!
//! The bandwidth at point `i` is `min(span, i)` and the tricube kernel covers
//! `i - h < j <= i`. Regression is solved in coordinates centred on `i`, so a
//! fitted value depends only on the values inside its kernel and not on where
//! the series starts. With one iteration the smoother is therefore causal and
//! windowed: appending points never changes earlier output.
//!
//! Further iterations down-weight outliers with bisquare robustness weights
//! computed from the median absolute residual of the whole series, which makes
//! the result depend on the full history.

/// Determinant threshold, relative to the diagonal product, below which the
/// 2×2 system is treated as singular.
const SINGULAR_TOLERANCE: f64 = 1e-12;

/// Smooth `series` with bandwidth `span_period` and `iterations` robustifying
/// rounds (at least one round is always run).
///
/// Series containing non-finite values are returned unchanged. Index 0 has no
/// history and always returns the observation itself.
pub fn lowess(series: &[f64], span_period: usize, iterations: usize) -> Vec<f64> {
    if series.iter().any(|v| !v.is_finite()) {
        return series.to_vec();
    }
    let n = series.len();
    let rounds = iterations.max(1);
    let mut delta = vec![1.0; n];
    let mut fitted = series.to_vec();

    for round in 0..rounds {
        fitted = (0..n)
            .map(|i| fit_point(series, &delta, i, span_period))
            .collect();
        if round + 1 < rounds {
            delta = robustness_weights(series, &fitted);
        }
    }
    fitted
}

/// Tricube kernel weight for a point `distance` away within bandwidth `h`.
fn tricube(distance: f64, h: f64) -> f64 {
    let u = (distance / h).clamp(0.0, 1.0);
    let t = 1.0 - u * u * u;
    t * t * t
}

/// Weighted linear fit evaluated at `i`; falls back to `y[i]` when singular.
fn fit_point(y: &[f64], delta: &[f64], i: usize, span: usize) -> f64 {
    let h = span.min(i);
    if h == 0 {
        return y[i];
    }

    let (mut s0, mut s1, mut s2, mut t0, mut t1) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for j in (i + 1 - h)..=i {
        let d = (i - j) as f64;
        let w = tricube(d, h as f64) * delta[j];
        let x = -d;
        s0 += w;
        s1 += w * x;
        s2 += w * x * x;
        t0 += w * y[j];
        t1 += w * x * y[j];
    }

    let det = s0 * s2 - s1 * s1;
    if s0 == 0.0 || !det.is_finite() || det.abs() <= SINGULAR_TOLERANCE * (s0 * s2).abs() {
        return y[i];
    }
    // intercept of the local line, i.e. the fit at x = 0
    (s2 * t0 - s1 * t1) / det
}

/// Bisquare weights `(1 - clip(e / 6s, -1, 1)^2)^2`, `s` the median |residual|.
fn robustness_weights(y: &[f64], fitted: &[f64]) -> Vec<f64> {
    let residuals: Vec<f64> = y.iter().zip(fitted).map(|(a, b)| a - b).collect();
    let s = median_abs(&residuals);
    residuals
        .iter()
        .map(|&e| {
            let u = if s == 0.0 {
                if e == 0.0 {
                    0.0
                } else {
                    e.signum()
                }
            } else {
                (e / (6.0 * s)).clamp(-1.0, 1.0)
            };
            let t = 1.0 - u * u;
            t * t
        })
        .collect()
}

fn median_abs(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut abs: Vec<f64> = values.iter().map(|v| v.abs()).collect();
    abs.sort_by(|a, b| a.total_cmp(b));
    let mid = abs.len() / 2;
    if abs.len() % 2 == 0 {
        (abs[mid - 1] + abs[mid]) / 2.0
    } else {
        abs[mid]
    }
}
