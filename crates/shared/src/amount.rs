use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AmountError;

/// Base units per displayed STX.
pub const MICRO_UNITS_PER_STX: u64 = 1_000_000;

const FRACTIONAL_DIGITS: u32 = 6;

/// An amount in the ledger's base unit (micro-STX). Always positive for
/// agreements; the contract rejects zero amounts and so does draft
/// validation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct MicroStx(pub u64);

impl MicroStx {
    /// Renders back to the whole-unit display denomination, trimming
    /// trailing fractional zeros: 2_500_000 -> "2.5", 3_000_000 -> "3".
    pub fn display(self) -> String {
        let whole = self.0 / MICRO_UNITS_PER_STX;
        let frac = self.0 % MICRO_UNITS_PER_STX;
        if frac == 0 {
            return whole.to_string();
        }
        let frac = format!("{frac:06}");
        format!("{whole}.{}", frac.trim_end_matches('0'))
    }
}

impl fmt::Display for MicroStx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Parses a user-entered display amount ("2.5" STX) into base units
/// (2_500_000 micro-STX). Rejects empty, non-numeric, zero, negative, and
/// sub-micro-unit inputs before anything reaches the wallet boundary.
pub fn parse_display_amount(raw: &str) -> Result<MicroStx, AmountError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }
    if trimmed.starts_with('-') {
        return Err(AmountError::NotPositive);
    }

    let (whole, frac) = match trimmed.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (trimmed, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(AmountError::NotANumber);
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(AmountError::NotANumber);
    }
    if frac.len() > FRACTIONAL_DIGITS as usize {
        return Err(AmountError::TooPrecise);
    }

    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| AmountError::TooLarge)?
    };
    let frac_units: u64 = if frac.is_empty() {
        0
    } else {
        let scale = 10u64.pow(FRACTIONAL_DIGITS - frac.len() as u32);
        frac.parse::<u64>().map_err(|_| AmountError::NotANumber)? * scale
    };

    let micro = whole
        .checked_mul(MICRO_UNITS_PER_STX)
        .and_then(|base| base.checked_add(frac_units))
        .ok_or(AmountError::TooLarge)?;

    if micro == 0 {
        return Err(AmountError::NotPositive);
    }
    Ok(MicroStx(micro))
}
