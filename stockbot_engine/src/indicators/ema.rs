/// Exponential Moving Average: incremental computation.
///
/// Non-adjusted recursive form:
///   bar 0  → value = price (first observation)
///   bar 1+ → value = α·price + (1−α)·prev   where α = 2/(span+1)
///
/// `is_warm()` returns true once `span` observations have been seen.
#[derive(Debug, Clone)]
pub struct Ema {
    alpha: f64,
    pub value: f64,
    span: usize,
    count: usize,
}

impl Ema {
    pub fn new(span: usize) -> Self {
        Self::with_alpha(2.0 / (span as f64 + 1.0), span)
    }

    /// Custom smoothing factor; `warm_after` sets when `is_warm()` flips.
    pub fn with_alpha(alpha: f64, warm_after: usize) -> Self {
        Self { alpha, value: 0.0, span: warm_after, count: 0 }
    }

    /// Feed one price, return the current EMA value.
    pub fn update(&mut self, price: f64) -> f64 {
        if self.count == 0 {
            self.value = price;
        } else {
            self.value = self.alpha * price + (1.0 - self.alpha) * self.value;
        }
        self.count += 1;
        self.value
    }

    pub fn is_warm(&self) -> bool {
        self.span > 0 && self.count >= self.span
    }
}

/// EMA series with the first `span − 1` values marked undefined.
pub fn ema(closes: &[f64], span: usize) -> Vec<Option<f64>> {
    if span == 0 {
        return vec![None; closes.len()];
    }
    let mut e = Ema::new(span);
    closes
        .iter()
        .map(|&c| {
            let v = e.update(c);
            e.is_warm().then_some(v)
        })
        .collect()
}

/// Full recursive EMA with no warm-up masking (MACD building block).
pub(crate) fn ema_raw(values: &[f64], span: usize) -> Vec<f64> {
    let mut e = Ema::new(span);
    values.iter().map(|&v| e.update(v)).collect()
}
