// 3.0: interest model. piecewise-linear utilization -> borrow rate curve, plus compounding.
// 3.0 has the curve structs. 3.1 evaluation, 3.2 compounding, 3.3 apr/apy conversions.

use crate::fraction::Fraction;
use crate::types::{Slot, SLOTS_PER_YEAR};
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub utilization: Fraction,
    pub rate: Fraction,
}

impl CurvePoint {
    pub fn new(utilization: Fraction, rate: Fraction) -> Self {
        Self { utilization, rate }
    }

    pub fn from_decimals(utilization: Decimal, rate: Decimal) -> Self {
        Self::new(Fraction::from_decimal(utilization), Fraction::from_decimal(rate))
    }
}

/// Ascending curve terminated by exactly one point at utilization 1.0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowRateCurve {
    points: Vec<CurvePoint>,
}

impl BorrowRateCurve {
    pub fn new(points: Vec<CurvePoint>) -> Result<Self, CurveError> {
        if points.len() < 2 {
            return Err(CurveError::TooFewPoints(points.len()));
        }
        if points[0].utilization != Fraction::ZERO {
            return Err(CurveError::MustStartAtZero);
        }
        for pair in points.windows(2) {
            if pair[1].utilization <= pair[0].utilization {
                return Err(CurveError::NotAscending);
            }
            if pair[1].rate < pair[0].rate {
                return Err(CurveError::DecreasingRate);
            }
            if pair[0].utilization == Fraction::ONE {
                return Err(CurveError::MustEndAtOne);
            }
        }
        if points[points.len() - 1].utilization != Fraction::ONE {
            return Err(CurveError::MustEndAtOne);
        }
        Ok(Self { points })
    }

    /// Curve as the ledger stores it: (utilization_bps, borrow_rate_bps) pairs.
    pub fn from_bps(points: &[(u32, u32)]) -> Result<Self, CurveError> {
        let points = points
            .iter()
            .map(|(u, r)| CurvePoint::new(Fraction::from_bps(*u as u64), Fraction::from_bps(*r as u64)))
            .collect();
        Self::new(points)
    }

    /// Flat curve, handy for fixtures.
    pub fn flat(rate: Fraction) -> Self {
        Self {
            points: vec![
                CurvePoint::new(Fraction::ZERO, rate),
                CurvePoint::new(Fraction::ONE, rate),
            ],
        }
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    // 3.1: exact point match wins, otherwise interpolate the bracketing pair
    pub fn rate_at(&self, utilization: Fraction) -> Fraction {
        let utilization = utilization.min(Fraction::ONE);
        for pair in self.points.windows(2) {
            let (start, end) = (pair[0], pair[1]);
            if utilization == start.utilization {
                return start.rate;
            }
            if utilization < end.utilization {
                let slope_num = end.rate - start.rate;
                let slope_den = end.utilization - start.utilization;
                let offset = utilization - start.utilization;
                return start.rate + offset * slope_num / slope_den;
            }
        }
        // utilization == 1.0, the terminating point
        self.points[self.points.len() - 1].rate
    }
}

// zero-rate flat curve
impl Default for BorrowRateCurve {
    fn default() -> Self {
        Self::flat(Fraction::ZERO)
    }
}

// 3.2: index * (1 + rate / SLOTS_PER_YEAR) ^ elapsed
pub fn compound(index: Fraction, annual_rate: Fraction, elapsed_slots: Slot) -> Fraction {
    if elapsed_slots == 0 || annual_rate.is_zero() {
        return index;
    }
    let per_slot = annual_rate / Fraction::from_num(SLOTS_PER_YEAR);
    index * (Fraction::ONE + per_slot).pow(elapsed_slots)
}

/// Growth factor alone, `compound(1, rate, elapsed)`.
pub fn compounded_interest(annual_rate: Fraction, elapsed_slots: Slot) -> Fraction {
    compound(Fraction::ONE, annual_rate, elapsed_slots)
}

// 3.3: per-slot compounding of a yearly rate, for display.
// saturates at Decimal::MAX once the yearly growth leaves Decimal's range (apr ~66)
pub fn apr_to_apy(apr: Decimal) -> Decimal {
    if apr <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let slots = Decimal::from(SLOTS_PER_YEAR);
    match (Decimal::ONE + apr / slots).checked_powu(SLOTS_PER_YEAR) {
        Some(growth) => growth - Decimal::ONE,
        None => Decimal::MAX,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CurveError {
    #[error("Curve needs at least 2 points, got {0}")]
    TooFewPoints(usize),

    #[error("First curve point must be at utilization 0")]
    MustStartAtZero,

    #[error("Curve must terminate with exactly one point at utilization 1")]
    MustEndAtOne,

    #[error("Curve utilizations must be strictly ascending")]
    NotAscending,

    #[error("Curve rates must not decrease")]
    DecreasingRate,
}
