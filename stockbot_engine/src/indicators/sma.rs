/// Simple moving average over a trailing window.
///
/// Uses a running sum, so the whole series costs O(n).  The first
/// `window − 1` outputs are `None`; a zero window yields an all-`None` series.
pub fn sma(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if window == 0 || closes.len() < window {
        return out;
    }

    let mut sum: f64 = closes[..window].iter().sum();
    out[window - 1] = Some(sum / window as f64);
    for i in window..closes.len() {
        sum += closes[i] - closes[i - window];
        out[i] = Some(sum / window as f64);
    }
    out
}

/// SMA of the last `window` values of `closes` (the value at the end of a
/// prefix), or `None` if the prefix is shorter than the window.
pub fn sma_at(closes: &[f64], window: usize) -> Option<f64> {
    if window == 0 || closes.len() < window {
        return None;
    }
    let tail = &closes[closes.len() - window..];
    Some(tail.iter().sum::<f64>() / window as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warm_up_is_undefined() {
        let s = sma(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(s[0], None);
        assert_eq!(s[1], None);
        assert!((s[2].unwrap() - 2.0).abs() < 1e-12);
        assert!((s[3].unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn constant_series_equals_constant() {
        let closes = vec![42.5; 30];
        for v in sma(&closes, 8).into_iter().flatten() {
            assert!((v - 42.5).abs() < 1e-12);
        }
    }

    #[test]
    fn prefix_value_matches_series() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let series = sma(&closes, 21);
        for end in 21..=closes.len() {
            let at = sma_at(&closes[..end], 21).unwrap();
            assert!((at - series[end - 1].unwrap()).abs() < 1e-9);
        }
    }

    #[test]
    fn short_input_is_all_none() {
        assert!(sma(&[1.0, 2.0], 5).iter().all(|v| v.is_none()));
        assert!(sma(&[1.0, 2.0], 0).iter().all(|v| v.is_none()));
        assert_eq!(sma_at(&[1.0, 2.0], 5), None);
    }
}
