use super::ema::ema_raw;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdParams {
    pub fast:   usize,
    pub slow:   usize,
    pub signal: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self { fast: 12, slow: 26, signal: 9 }
    }
}

/// MACD line, its signal EMA and the histogram (line − signal).
#[derive(Debug, Clone, Default)]
pub struct MacdSeries {
    pub line:      Vec<Option<f64>>,
    pub signal:    Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

impl MacdSeries {
    /// (line, signal, histogram) at the last bar.
    pub fn latest(&self) -> Option<(f64, f64, f64)> {
        let i = self.line.len().checked_sub(1)?;
        Some((self.line[i]?, self.signal[i]?, self.histogram[i]?))
    }
}

/// Both EMAs run from the first bar; the line is masked until the slow EMA
/// has warmed up, and signal/histogram until the signal EMA has seen
/// `signal` defined line values.
pub fn macd(closes: &[f64], params: MacdParams) -> MacdSeries {
    let n = closes.len();
    let MacdParams { fast, slow, signal } = params;
    if fast == 0 || slow == 0 || signal == 0 || fast >= slow {
        return MacdSeries {
            line: vec![None; n],
            signal: vec![None; n],
            histogram: vec![None; n],
        };
    }

    let fast_ema = ema_raw(closes, fast);
    let slow_ema = ema_raw(closes, slow);
    let raw_line: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let raw_signal = ema_raw(&raw_line, signal);

    let line_from = slow - 1;
    let signal_from = slow + signal - 2;

    let mut out = MacdSeries {
        line: vec![None; n],
        signal: vec![None; n],
        histogram: vec![None; n],
    };
    for i in 0..n {
        if i >= line_from {
            out.line[i] = Some(raw_line[i]);
        }
        if i >= signal_from {
            out.signal[i] = Some(raw_signal[i]);
            out.histogram[i] = Some(raw_line[i] - raw_signal[i]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_series_has_zero_macd() {
        let series = macd(&[25.0; 60], MacdParams::default());
        let (line, signal, hist) = series.latest().unwrap();
        assert!(line.abs() < 1e-12);
        assert!(signal.abs() < 1e-12);
        assert!(hist.abs() < 1e-12);
    }

    #[test]
    fn uptrend_has_positive_line() {
        let closes: Vec<f64> = (0..80).map(|i| 50.0 + i as f64).collect();
        let (line, _, _) = macd(&closes, MacdParams::default()).latest().unwrap();
        assert!(line > 0.0);
    }

    #[test]
    fn warm_up_masks() {
        let closes: Vec<f64> = (0..40).map(|i| 50.0 + (i as f64).sin()).collect();
        let series = macd(&closes, MacdParams::default());
        assert!(series.line[24].is_none());
        assert!(series.line[25].is_some());
        assert!(series.signal[32].is_none());
        assert!(series.signal[33].is_some());
    }

    #[test]
    fn too_short_input_has_no_latest() {
        assert!(macd(&[1.0, 2.0, 3.0], MacdParams::default()).latest().is_none());
    }
}
