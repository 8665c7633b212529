// ===============================
// src/analytics.rs
// ===============================
//
// Bond cash-flow analytics: present value by semiannual discounting and the
// per-unit PV01 table for the Treasury universe (face 1000, 1 bp shift).
//
use ahash::AHashMap as HashMap;
use once_cell::sync::Lazy;

use crate::error::{PipelineError, Result};

const FACE_VALUE: f64 = 1000.0;
const FREQUENCY: u32 = 2;
const ONE_BP: f64 = 0.0001;

/// Present value of a fixed-coupon bond at a flat yield.
pub fn present_value(
    face_value: f64,
    coupon_rate: f64,
    yield_rate: f64,
    years_to_maturity: u32,
    frequency: u32,
) -> f64 {
    let coupon = face_value * coupon_rate / frequency as f64;
    let periods = years_to_maturity * frequency;
    let per_period = 1.0 + yield_rate / frequency as f64;

    let mut pv = 0.0;
    for t in 1..=periods {
        pv += coupon / per_period.powi(t as i32);
    }
    pv + face_value / per_period.powi(periods as i32)
}

/// PV01: price drop for a 1 bp parallel shift in yield.
pub fn pv01(
    face_value: f64,
    coupon_rate: f64,
    yield_rate: f64,
    years_to_maturity: u32,
    frequency: u32,
) -> f64 {
    present_value(face_value, coupon_rate, yield_rate, years_to_maturity, frequency)
        - present_value(
            face_value,
            coupon_rate,
            yield_rate + ONE_BP,
            years_to_maturity,
            frequency,
        )
}

// (coupon, yield, years) per CUSIP at the time the universe was snapped
static PV01_TABLE: Lazy<HashMap<String, f64>> = Lazy::new(|| {
    [
        ("91282CAV3", 0.04500, 0.0464, 2),
        ("91282CBL4", 0.04750, 0.0440, 3),
        ("91282CCB5", 0.04875, 0.0412, 5),
        ("91282CCS8", 0.05000, 0.0430, 7),
        ("91282CDH2", 0.05125, 0.0428, 10),
        ("912810TM0", 0.05250, 0.0461, 20),
        ("912810TL2", 0.05375, 0.0443, 30),
    ]
    .into_iter()
    .map(|(cusip, coupon, yld, years)| {
        (
            cusip.to_string(),
            pv01(FACE_VALUE, coupon, yld, years, FREQUENCY),
        )
    })
    .collect()
});

/// Per-unit PV01 for a CUSIP in the universe.
pub fn query_pv01(cusip: &str) -> Result<f64> {
    PV01_TABLE
        .get(cusip)
        .copied()
        .ok_or_else(|| PipelineError::UnknownProduct(cusip.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn par_bond_prices_at_face() {
        // coupon == yield discounts back to face value
        let pv = present_value(1000.0, 0.05, 0.05, 10, 2);
        assert_relative_eq!(pv, 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn pv01_is_positive_and_grows_with_maturity() {
        let short = pv01(1000.0, 0.045, 0.0464, 2, 2);
        let long = pv01(1000.0, 0.05375, 0.0443, 30, 2);
        assert!(short > 0.0);
        assert!(long > short);
    }

    #[test]
    fn table_covers_the_universe() {
        for bond in crate::products::bond_universe() {
            let value = query_pv01(&bond.cusip).unwrap();
            assert!(value > 0.0, "{} pv01 {value}", bond.cusip);
            // face 1000, 1 bp: sane bracket
            assert!(value < 5.0, "{} pv01 {value}", bond.cusip);
        }
    }

    #[test]
    fn unknown_cusip_is_an_error() {
        assert!(matches!(
            query_pv01("XXXXXXXXX"),
            Err(PipelineError::UnknownProduct(_))
        ));
    }
}
