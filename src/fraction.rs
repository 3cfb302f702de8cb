// 2.0 fraction.rs: scaled-integer fixed point, bits / 2^60, the layout the ledger
// stores in every *_sf field. exchange rates, compounding and debt growth run here
// so they agree with the program. floor unless a method says otherwise, overflow
// saturates.

use primitive_types::U256;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul, Sub, SubAssign};

pub const FRACTION_BITS: u32 = 60;
const ONE_BITS: u128 = 1u128 << FRACTION_BITS;
const FRACTIONAL_MASK: u128 = ONE_BITS - 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rounding {
    Down,
    Up,
}

fn div_round(n: U256, d: U256, rounding: Rounding) -> U256 {
    let q = n / d;
    match rounding {
        Rounding::Down => q,
        Rounding::Up => {
            if (n % d).is_zero() {
                q
            } else {
                q + U256::one()
            }
        }
    }
}

fn narrow(value: U256) -> u128 {
    if value > U256::from(u128::MAX) {
        u128::MAX
    } else {
        value.low_u128()
    }
}

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fraction(u128);

impl Fraction {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(ONE_BITS);
    pub const MAX: Self = Self(u128::MAX);

    pub const fn from_bits(bits: u128) -> Self {
        Self(bits)
    }

    pub const fn to_bits(self) -> u128 {
        self.0
    }

    pub fn from_num(value: u64) -> Self {
        Self((value as u128) << FRACTION_BITS)
    }

    pub fn from_percent(pct: u64) -> Self {
        Self::from_ratio(pct as u128, 100)
    }

    pub fn from_bps(bps: u64) -> Self {
        Self::from_ratio(bps as u128, 10_000)
    }

    /// `num / den` floored. A zero denominator yields zero.
    pub fn from_ratio(num: u128, den: u128) -> Self {
        if den == 0 {
            return Self::ZERO;
        }
        let scaled = U256::from(num) * U256::from(ONE_BITS);
        Self(narrow(div_round(scaled, U256::from(den), Rounding::Down)))
    }

    /// Floors to the nearest representable value. Negative input clamps to zero.
    pub fn from_decimal(value: Decimal) -> Self {
        if value <= Decimal::ZERO {
            return Self::ZERO;
        }
        let int = value.trunc();
        let int_bits = match int.to_u128() {
            Some(v) if v <= (u128::MAX >> FRACTION_BITS) => v << FRACTION_BITS,
            _ => return Self::MAX,
        };
        let frac = value - int;
        let frac_bits = (frac * Decimal::from_i128_with_scale(ONE_BITS as i128, 0))
            .floor()
            .to_u128()
            .unwrap_or(0)
            .min(FRACTIONAL_MASK);
        Self(int_bits | frac_bits)
    }

    /// Display conversion. Keeps 28 significant digits.
    pub fn to_decimal(self) -> Decimal {
        let int = Decimal::from_i128_with_scale((self.0 >> FRACTION_BITS) as i128, 0);
        let frac_bits = self.0 & FRACTIONAL_MASK;
        if frac_bits == 0 {
            return int;
        }
        let frac = Decimal::from_i128_with_scale(frac_bits as i128, 0)
            / Decimal::from_i128_with_scale(ONE_BITS as i128, 0);
        int + frac
    }

    pub fn to_floor(self) -> u64 {
        let int = self.0 >> FRACTION_BITS;
        int.min(u64::MAX as u128) as u64
    }

    pub fn to_ceil(self) -> u64 {
        let int = self.0 >> FRACTION_BITS;
        let bumped = if self.0 & FRACTIONAL_MASK == 0 { int } else { int + 1 };
        bumped.min(u64::MAX as u128) as u64
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    pub fn checked_mul(self, rhs: Self) -> Option<Self> {
        let product = U256::from(self.0) * U256::from(rhs.0) / U256::from(ONE_BITS);
        if product > U256::from(u128::MAX) {
            None
        } else {
            Some(Self(product.low_u128()))
        }
    }

    pub fn checked_div(self, rhs: Self) -> Option<Self> {
        if rhs.0 == 0 {
            return None;
        }
        let quotient = U256::from(self.0) * U256::from(ONE_BITS) / U256::from(rhs.0);
        if quotient > U256::from(u128::MAX) {
            None
        } else {
            Some(Self(quotient.low_u128()))
        }
    }

    pub fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    /// Clamps at zero.
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    pub fn mul_rounded(self, rhs: Self, rounding: Rounding) -> Self {
        let product = U256::from(self.0) * U256::from(rhs.0);
        Self(narrow(div_round(product, U256::from(ONE_BITS), rounding)))
    }

    pub fn div_rounded(self, rhs: Self, rounding: Rounding) -> Self {
        if rhs.0 == 0 {
            return Self::ZERO;
        }
        let scaled = U256::from(self.0) * U256::from(ONE_BITS);
        Self(narrow(div_round(scaled, U256::from(rhs.0), rounding)))
    }

    /// Ratio helper for display paths where a zero denominator conventionally means zero.
    pub fn div_or_zero(self, rhs: Self) -> Self {
        self.div_rounded(rhs, Rounding::Down)
    }

    /// Integer power by squaring. Each step floors, like the ledger's own loop.
    pub fn pow(self, exp: u64) -> Self {
        let mut base = self;
        let mut acc = Self::ONE;
        let mut e = exp;
        while e > 0 {
            if e & 1 == 1 {
                acc = acc * base;
            }
            e >>= 1;
            if e > 0 {
                base = base * base;
            }
        }
        acc
    }

    pub fn min(self, other: Self) -> Self {
        if self <= other { self } else { other }
    }

    pub fn max(self, other: Self) -> Self {
        if self >= other { self } else { other }
    }
}

impl Add for Fraction {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        self.saturating_add(rhs)
    }
}

impl AddAssign for Fraction {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Fraction {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        self.saturating_sub(rhs)
    }
}

impl SubAssign for Fraction {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Mul for Fraction {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        self.mul_rounded(rhs, Rounding::Down)
    }
}

impl Div for Fraction {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        self.div_or_zero(rhs)
    }
}

impl Sum for Fraction {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, f| acc + f)
    }
}

impl<'a> Sum<&'a Fraction> for Fraction {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, f| acc + *f)
    }
}

impl From<u64> for Fraction {
    fn from(value: u64) -> Self {
        Self::from_num(value)
    }
}

impl fmt::Debug for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fraction({})", self.to_decimal())
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}
