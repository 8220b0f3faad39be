//! NaN skipping reductions over slices of `f64`.
//!
//! Missing values are represented as NaN throughout and are left out of every statistic, the way
//! numpy's `nan*` family of functions behaves.

/// Mean of the non-NaN values, or NaN if there are none
pub fn nanmean(values: &[f64]) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0_usize), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Sum of the non-NaN values, zero if there are none
pub fn nansum(values: &[f64]) -> f64 {
    values.iter().filter(|v| !v.is_nan()).sum()
}

/// Sorted copy of the non-NaN values
fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(f64::total_cmp);

    sorted
}

/// Quantile of already sorted, NaN free values, interpolating linearly between the two nearest
/// order statistics.
///
fn sorted_quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let position = q * (n - 1) as f64;
            let lower = position.floor() as usize;
            let upper = position.ceil() as usize;
            let fraction = position - lower as f64;

            sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
        }
    }
}

/// Quantile `q` (0 to 1) of the non-NaN values
pub fn nanquantile(values: &[f64], q: f64) -> f64 {
    sorted_quantile(&sorted(values), q)
}

/// Several quantiles of the same values, sorting once
pub fn nanquantiles(values: &[f64], qs: &[f64]) -> Vec<f64> {
    let sorted = sorted(values);
    qs.iter().map(|&q| sorted_quantile(&sorted, q)).collect()
}

pub fn nanmedian(values: &[f64]) -> f64 {
    nanquantile(values, 0.5)
}

/// Pearson correlation coefficient over the pairs where neither value is missing.
///
/// Returns NaN when fewer than two pairs remain or either side has no variance.
///
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter(|(x, y)| !x.is_nan() && !y.is_nan())
        .map(|(&x, &y)| (x, y))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }

    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a == 0.0 || var_b == 0.0 {
        return f64::NAN;
    }

    (cov / (var_a * var_b).sqrt()).clamp(-1.0, 1.0)
}

/// Autocorrelation function of a series for lags `0..=max_lag`.
///
/// The series is centered on its mean, then each lag is the sum of lagged products divided by
/// the sum of squares. Lag zero is always 1. Lags at or past the length of the series are 0.
///
pub fn autocorrelation(series: &[f64], max_lag: usize) -> Vec<f64> {
    let mean = nanmean(series);
    let centered: Vec<f64> = series.iter().map(|x| x - mean).collect();
    let c0 = nansum(&centered.iter().map(|x| x * x).collect::<Vec<f64>>());

    (0..=max_lag)
        .map(|lag| {
            if lag == 0 {
                1.0
            } else if lag >= centered.len() {
                0.0 / c0
            } else {
                let products: Vec<f64> = centered[..centered.len() - lag]
                    .iter()
                    .zip(&centered[lag..])
                    .map(|(a, b)| a * b)
                    .collect();
                nansum(&products) / c0
            }
        })
        .collect()
}
