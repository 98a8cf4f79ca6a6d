//! Temperature band tracking for threshold alerts.

use super::runtime_config::Thresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempBand {
    Normal,
    High,
    Low,
}

impl TempBand {
    pub fn classify(temp_c: f32, t: &Thresholds) -> Self {
        if temp_c > t.temp_high {
            Self::High
        } else if temp_c < t.temp_low {
            Self::Low
        } else {
            Self::Normal
        }
    }
}

/// Remembers the last band and reports only transitions.
#[derive(Debug)]
pub struct ThresholdMonitor {
    band: TempBand,
}

impl Default for ThresholdMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ThresholdMonitor {
    pub fn new() -> Self {
        Self {
            band: TempBand::Normal,
        }
    }

    /// Returns the new band if `temp_c` moved the monitor into a different
    /// one.  `None` temperatures never change the band.
    pub fn update(&mut self, temp_c: Option<f32>, t: &Thresholds) -> Option<TempBand> {
        let band = TempBand::classify(temp_c?, t);
        if band == self.band {
            return None;
        }
        self.band = band;
        Some(band)
    }

    pub fn band(&self) -> TempBand {
        self.band
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_only_edges() {
        let t = Thresholds::default();
        let mut m = ThresholdMonitor::new();
        assert_eq!(m.update(Some(20.0), &t), None);
        assert_eq!(m.update(Some(31.0), &t), Some(TempBand::High));
        assert_eq!(m.update(Some(32.0), &t), None);
        assert_eq!(m.update(None, &t), None);
        assert_eq!(m.band(), TempBand::High);
        assert_eq!(m.update(Some(10.0), &t), Some(TempBand::Low));
        assert_eq!(m.update(Some(15.0), &t), Some(TempBand::Normal));
    }
}
