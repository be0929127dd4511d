use statrs::statistics::Statistics;

/// Bollinger Bands: rolling SMA ± k population standard deviations.
#[derive(Debug, Clone, Default)]
pub struct BollingerBands {
    pub upper:  Vec<Option<f64>>,
    pub middle: Vec<Option<f64>>,
    pub lower:  Vec<Option<f64>>,
}

impl BollingerBands {
    /// (upper, middle, lower) at the last bar, if the window has filled.
    pub fn latest(&self) -> Option<(f64, f64, f64)> {
        let i = self.middle.len().checked_sub(1)?;
        Some((self.upper[i]?, self.middle[i]?, self.lower[i]?))
    }
}

pub fn bollinger(closes: &[f64], window: usize, k: f64) -> BollingerBands {
    let n = closes.len();
    let mut bands = BollingerBands {
        upper:  vec![None; n],
        middle: vec![None; n],
        lower:  vec![None; n],
    };
    if window == 0 || n < window {
        return bands;
    }

    for i in (window - 1)..n {
        let tail = &closes[i + 1 - window..=i];
        let middle = tail.iter().mean();
        let std = tail.iter().population_std_dev();
        bands.middle[i] = Some(middle);
        bands.upper[i] = Some(middle + k * std);
        bands.lower[i] = Some(middle - k * std);
    }
    bands
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_prices_collapse_the_bands() {
        let bands = bollinger(&[10.0; 25], 20, 2.0);
        let (upper, middle, lower) = bands.latest().unwrap();
        assert!((middle - 10.0).abs() < 1e-12);
        assert!((upper - 10.0).abs() < 1e-12);
        assert!((lower - 10.0).abs() < 1e-12);
        assert!(bands.middle[18].is_none());
    }

    #[test]
    fn bands_use_population_std() {
        // window [1,2,3,4]: mean 2.5, population std = sqrt(1.25)
        let bands = bollinger(&[1.0, 2.0, 3.0, 4.0], 4, 2.0);
        let (upper, middle, lower) = bands.latest().unwrap();
        let sd = 1.25f64.sqrt();
        assert!((middle - 2.5).abs() < 1e-12);
        assert!((upper - (2.5 + 2.0 * sd)).abs() < 1e-12);
        assert!((lower - (2.5 - 2.0 * sd)).abs() < 1e-12);
    }
}
