use std::fmt;
use std::ops::Mul;

use serde::{Deserialize, Serialize};

/// A whole-rupiah amount.
///
/// Sheet cells hold prices in many shapes (`150000`, `Rp 150.000`,
/// `150,000`). Rupiah has no minor unit in practice, so parsing keeps the
/// digits and drops everything else.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rupiah(pub u64);

impl Rupiah {
    pub const ZERO: Self = Self(0);

    /// Parse leniently: every non-digit is ignored, no digits means zero,
    /// overflow saturates.
    pub fn parse_lenient(text: &str) -> Self {
        let value = text
            .chars()
            .filter_map(|c| c.to_digit(10))
            .fold(0u64, |acc, d| acc.saturating_mul(10).saturating_add(u64::from(d)));
        Self(value)
    }

    pub fn amount(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Plain digits, as written to numeric columns.
    pub fn to_plain(&self) -> String {
        self.0.to_string()
    }

    /// Indonesian currency formatting: `Rp 150.000`.
    pub fn to_idr(&self) -> String {
        let digits = self.0.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(c);
        }
        format!("Rp {grouped}")
    }
}

impl Mul<u32> for Rupiah {
    type Output = Rupiah;

    fn mul(self, rhs: u32) -> Self::Output {
        Rupiah(self.0.saturating_mul(u64::from(rhs)))
    }
}

impl fmt::Display for Rupiah {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_idr())
    }
}
