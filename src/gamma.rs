use crate::error::{StripError, StripResult};

/// 256-entry gamma correction lookup, built once at startup
#[derive(Debug, Clone)]
pub struct GammaTable {
    exponent: f64,
    table: [u8; 256],
}

impl GammaTable {
    /// Build the table: `table[i] = round(255 * (i / 255) ^ exponent)`
    pub fn new(exponent: f64) -> StripResult<Self> {
        if !exponent.is_finite() || exponent <= 0.0 {
            return Err(StripError::config(format!(
                "gamma exponent must be a positive number, got {}",
                exponent
            )));
        }

        let mut table = [0u8; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let corrected = (i as f64 / 255.0).powf(exponent) * 255.0;
            *entry = corrected.round().clamp(0.0, 255.0) as u8;
        }

        Ok(GammaTable { exponent, table })
    }

    pub fn exponent(&self) -> f64 {
        self.exponent
    }

    /// Look up the corrected output for a linear intensity
    pub fn correct(&self, value: u8) -> u8 {
        self.table[usize::from(value)]
    }

    #[allow(dead_code)]
    pub fn as_slice(&self) -> &[u8; 256] {
        &self.table
    }
}
