/// indicators/rsi.rs — Relative Strength Index
///
/// ─────────────────────────────────────────────────────────────────────────
///   Δ_t   = close_t − close_{t−1}
///   G_t   = max(Δ_t, 0)        L_t = max(−Δ_t, 0)
///   RS    = avg(G) / avg(L)
///   RSI   = 100 − 100 / (1 + RS)
///
/// Two averaging methods:
///   Simple: arithmetic mean of the last `period` gains/losses
///            (screener and backtest)
///   Wilder: recursive smoothing, α = 1/period, seeded with the first
///            change (chat indicator tool)
///
/// Degenerate ratios:
///   avg(L) = 0, avg(G) > 0  → RSI = 100
///   avg(L) = 0, avg(G) = 0  → RSI = 50 (flat: no gains, no losses)
///
/// Values are defined from index `period` onward (`period` changes needed).
/// ─────────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use super::ema::Ema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RsiMethod {
    #[default]
    Simple,
    Wilder,
}

/// Map average gain / average loss onto the 0–100 oscillator.
pub fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss <= 0.0 {
        return if avg_gain > 0.0 { 100.0 } else { 50.0 };
    }
    let rs = avg_gain / avg_loss;
    (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
}

/// Simple-average RSI at the end of a prefix.  Needs `period + 1` closes.
pub fn simple_rsi_at(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }
    let tail = &closes[closes.len() - period - 1..];
    let (gain, loss) = tail.windows(2).fold((0.0, 0.0), |(g, l), w| {
        let change = w[1] - w[0];
        if change > 0.0 {
            (g + change, l)
        } else {
            (g, l - change)
        }
    });
    Some(rsi_from_averages(gain / period as f64, loss / period as f64))
}

/// RSI series aligned with `closes`.
pub fn rsi(closes: &[f64], period: usize, method: RsiMethod) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() < period + 1 {
        return out;
    }

    match method {
        RsiMethod::Simple => {
            for i in period..closes.len() {
                out[i] = simple_rsi_at(&closes[..=i], period);
            }
        }
        RsiMethod::Wilder => {
            let alpha = 1.0 / period as f64;
            let mut avg_gain = Ema::with_alpha(alpha, period);
            let mut avg_loss = Ema::with_alpha(alpha, period);
            for i in 1..closes.len() {
                let change = closes[i] - closes[i - 1];
                let gain = avg_gain.update(change.max(0.0));
                let loss = avg_loss.update((-change).max(0.0));
                if avg_gain.is_warm() {
                    out[i] = Some(rsi_from_averages(gain, loss));
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_series_is_neutral() {
        let closes = vec![50.0; 40];
        for method in [RsiMethod::Simple, RsiMethod::Wilder] {
            for v in rsi(&closes, 14, method).into_iter().flatten() {
                assert_eq!(v, 50.0);
            }
        }
    }

    #[test]
    fn rising_series_saturates_at_100() {
        let closes: Vec<f64> = (0..60).map(|i| 10.0 + i as f64 * 0.5).collect();
        for method in [RsiMethod::Simple, RsiMethod::Wilder] {
            let series = rsi(&closes, 14, method);
            for v in series.iter().flatten() {
                assert!(*v <= 100.0);
            }
            assert_eq!(series.last().copied().flatten(), Some(100.0));
        }
    }

    #[test]
    fn falling_series_goes_to_zero() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        let last = rsi(&closes, 14, RsiMethod::Simple).last().copied().flatten().unwrap();
        assert!(last.abs() < 1e-12);
    }

    #[test]
    fn warm_up_covers_first_period_bars() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + (i % 3) as f64).collect();
        let series = rsi(&closes, 14, RsiMethod::Simple);
        assert!(series[..14].iter().all(|v| v.is_none()));
        assert!(series[14..].iter().all(|v| v.is_some()));
    }

    #[test]
    fn balanced_moves_give_fifty() {
        // +1, −1 alternating over an even window → equal averages
        let closes: Vec<f64> = (0..15).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect();
        let v = simple_rsi_at(&closes, 14).unwrap();
        assert!((v - 50.0).abs() < 1e-9, "rsi = {v}");
    }

    #[test]
    fn wilder_smooths_from_first_change() {
        // period 2, alpha 0.5: gains 1,0,0.5 → 1, 0.5, 0.5; losses 0,1,0 → 0, 0.5, 0.25
        let series = rsi(&[1.0, 2.0, 1.0, 1.5], 2, RsiMethod::Wilder);
        assert_eq!(series[..2], [None, None]);
        assert!((series[2].unwrap() - 50.0).abs() < 1e-12);
        assert!((series[3].unwrap() - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn ratio_maps_into_oscillator() {
        // RS = 3 → 100 − 100/4 = 75
        assert!((rsi_from_averages(3.0, 1.0) - 75.0).abs() < 1e-12);
        assert_eq!(rsi_from_averages(0.0, 2.0), 0.0);
    }
}
