//! Numeric building blocks for waveform characterization.
//!
//! All helpers are pure functions over sample slices.

/// Indices `k` where `signal[k] != signal[k + 1]`.
pub fn crossings(signal: &[bool]) -> Vec<usize> {
    signal
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| pair[0] != pair[1])
        .map(|(k, _)| k)
        .collect()
}

/// Mean step between consecutive samples; `None` for fewer than two samples.
pub fn mean_step(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    Some((values[values.len() - 1] - values[0]) / (values.len() - 1) as f64)
}

/// Valid-range convolution with the `[1, -2, 1]` kernel.
///
/// The output is two samples shorter than the input; entry `k` is centered
/// on input sample `k + 1`.
pub fn second_difference(values: &[f64]) -> Vec<f64> {
    values
        .windows(3)
        .map(|w| w[0] - 2.0 * w[1] + w[2])
        .collect()
}

/// First sample index where the IV curve leaves its linear regime.
///
/// Curvature is approximated by the second difference of `current` divided
/// by the squared mean voltage step. `None` means the whole sweep is linear,
/// including sweeps too short or too flat to estimate curvature.
pub fn linearity_boundary(voltage: &[f64], current: &[f64], threshold: f64) -> Option<usize> {
    let dv = mean_step(voltage)?;
    if dv == 0.0 || !dv.is_finite() {
        return None;
    }

    let signal: Vec<bool> = second_difference(current)
        .into_iter()
        .map(|d2| (d2 / (dv * dv)).abs() >= threshold)
        .collect();

    crossings(&signal).first().map(|&k| k + 1)
}

/// Ordinary least-squares fit `y = slope * x + intercept`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination.
    pub r_squared: f64,
}

/// Fit `y` against `x`; `None` when the slope is undefined.
pub fn linear_fit(x: &[f64], y: &[f64]) -> Option<LinearFit> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let (x, y) = (&x[..n], &y[..n]);

    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;

    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }

    if sxx == 0.0 || !sxx.is_finite() {
        return None;
    }

    let slope = sxy / sxx;
    let r_squared = if syy == 0.0 {
        0.0
    } else {
        ((sxy * sxy) / (sxx * syy)).min(1.0)
    };

    Some(LinearFit {
        slope,
        intercept: mean_y - slope * mean_x,
        r_squared,
    })
}
