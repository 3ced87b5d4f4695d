//! The five operator-facing inputs and their declared domains

use crate::schema::PartialInput;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use thiserror::Error;

pub const LIMIT_BAL_RANGE: RangeInclusive<f64> = 10_000.0..=1_000_000.0;
pub const AGE_RANGE: RangeInclusive<f64> = 18.0..=80.0;
pub const PAY_0_CODES: [i32; 7] = [-2, -1, 0, 1, 2, 3, 4];
pub const BILL_AMT1_RANGE: RangeInclusive<f64> = 0.0..=1_000_000.0;
pub const PAY_AMT1_RANGE: RangeInclusive<f64> = 0.0..=500_000.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("last payment delay code {0} is not one of -2..=4")]
    UnknownDelayCode(i32),
}

/// Customer details collected from the form
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FormInput {
    /// Credit limit
    pub limit_bal: f64,
    pub age: f64,
    /// Repayment status last month (-2 no consumption, -1 paid in full,
    /// 0 revolving, 1..=4 months of delay)
    pub pay_0: i32,
    /// Last bill amount
    pub bill_amt1: f64,
    /// Last payment amount
    pub pay_amt1: f64,
}

impl Default for FormInput {
    fn default() -> Self {
        Self {
            limit_bal: 200_000.0,
            age: 35.0,
            pay_0: 0,
            bill_amt1: 50_000.0,
            pay_amt1: 10_000.0,
        }
    }
}

fn check_range(
    field: &'static str,
    value: f64,
    range: &RangeInclusive<f64>,
) -> Result<(), FormError> {
    if value.is_finite() && range.contains(&value) {
        Ok(())
    } else {
        Err(FormError::OutOfRange {
            field,
            value,
            min: *range.start(),
            max: *range.end(),
        })
    }
}

impl FormInput {
    /// Enforce the per-field domains
    pub fn validate(&self) -> Result<(), FormError> {
        check_range("credit limit", self.limit_bal, &LIMIT_BAL_RANGE)?;
        check_range("age", self.age, &AGE_RANGE)?;
        if !PAY_0_CODES.contains(&self.pay_0) {
            return Err(FormError::UnknownDelayCode(self.pay_0));
        }
        check_range("last bill amount", self.bill_amt1, &BILL_AMT1_RANGE)?;
        check_range("last payment amount", self.pay_amt1, &PAY_AMT1_RANGE)?;
        Ok(())
    }

    /// Validated values keyed by schema field name
    pub fn to_partial(&self) -> Result<PartialInput, FormError> {
        self.validate()?;
        Ok(PartialInput::new()
            .with("LIMIT_BAL", self.limit_bal)
            .with("AGE", self.age)
            .with("PAY_0", f64::from(self.pay_0))
            .with("BILL_AMT1", self.bill_amt1)
            .with("PAY_AMT1", self.pay_amt1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let partial = FormInput::default().to_partial().unwrap();
        assert_eq!(partial.len(), 5);
        assert_eq!(partial.get("LIMIT_BAL"), Some(200_000.0));
        assert_eq!(partial.get("PAY_0"), Some(0.0));
    }

    #[test]
    fn out_of_domain_values_are_rejected() {
        let cases = [
            FormInput { limit_bal: 5_000.0, ..Default::default() },
            FormInput { age: 17.0, ..Default::default() },
            FormInput { age: 81.0, ..Default::default() },
            FormInput { pay_0: 5, ..Default::default() },
            FormInput { pay_0: -3, ..Default::default() },
            FormInput { bill_amt1: -1.0, ..Default::default() },
            FormInput { pay_amt1: 500_001.0, ..Default::default() },
            FormInput { limit_bal: f64::NAN, ..Default::default() },
        ];
        for case in cases {
            assert!(case.validate().is_err(), "{case:?}");
        }
    }

    #[test]
    fn errors_name_the_offending_field() {
        let err = FormInput { age: 17.0, ..Default::default() }
            .to_partial()
            .unwrap_err();
        assert_eq!(
            err,
            FormError::OutOfRange { field: "age", value: 17.0, min: 18.0, max: 80.0 }
        );
        assert_eq!(err.to_string(), "age must be between 18 and 80, got 17");

        let err = FormInput { pay_0: 7, ..Default::default() }.validate().unwrap_err();
        assert_eq!(err, FormError::UnknownDelayCode(7));
    }

    #[test]
    fn range_edges_are_inclusive() {
        let low = FormInput {
            limit_bal: 10_000.0,
            age: 18.0,
            pay_0: -2,
            bill_amt1: 0.0,
            pay_amt1: 0.0,
        };
        let high = FormInput {
            limit_bal: 1_000_000.0,
            age: 80.0,
            pay_0: 4,
            bill_amt1: 1_000_000.0,
            pay_amt1: 500_000.0,
        };
        assert!(low.validate().is_ok());
        assert!(high.validate().is_ok());
    }
}
