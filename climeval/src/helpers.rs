use num_traits::{Float, Num};
use std::fmt::Debug;

/// Make sure bounds are ordered correctly, eg lower is below upper, so a domain can be given as
/// `[60, 20]` as well as `[20, 60]`.
///
pub fn rearrange<N>(lower: N, upper: N) -> (N, N)
where
    N: Num + Debug + PartialOrd,
{
    if lower > upper {
        (upper, lower)
    } else {
        (lower, upper)
    }
}

/// Compare two coordinate values with a relative tolerance.
///
pub(crate) fn close_enough<F>(a: F, b: F) -> bool
where
    F: Float,
{
    if a == b {
        return true;
    }
    let scale = a.abs().max(b.abs()).max(F::one());

    (a - b).abs() <= scale * F::from(1e-9).unwrap_or_else(F::epsilon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rearrange() {
        assert_eq!(rearrange(60.0, 20.0), (20.0, 60.0));
        assert_eq!(rearrange(20, 60), (20, 60));
    }

    #[test]
    fn test_close_enough() {
        assert!(close_enough(45.0, 45.0 + 1e-12));
        assert!(!close_enough(45.0, 45.001));
    }
}
