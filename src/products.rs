// ===============================
// src/products.rs
// ===============================
//
// Static US Treasury universe: seven on-the-run notes/bonds keyed by CUSIP,
// plus the curve sectors used for bucketed risk.
//
use ahash::AHashMap as HashMap;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bond {
    pub cusip: String,
    pub ticker: String,
    pub coupon: f64,
    pub maturity: NaiveDate,
}

impl Bond {
    fn new(cusip: &str, ticker: &str, coupon: f64, maturity: (i32, u32, u32)) -> Self {
        let (y, m, d) = maturity;
        Self {
            cusip: cusip.to_string(),
            ticker: ticker.to_string(),
            coupon,
            // table dates are hardcoded and valid
            maturity: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
        }
    }

    pub fn product_id(&self) -> &str {
        &self.cusip
    }
}

static BOND_TABLE: Lazy<HashMap<String, Bond>> = Lazy::new(|| {
    [
        Bond::new("91282CAV3", "US2Y", 0.04500, (2026, 11, 30)),
        Bond::new("91282CBL4", "US3Y", 0.04750, (2027, 12, 15)),
        Bond::new("91282CCB5", "US5Y", 0.04875, (2029, 11, 30)),
        Bond::new("91282CCS8", "US7Y", 0.05000, (2031, 11, 30)),
        Bond::new("91282CDH2", "US10Y", 0.05125, (2034, 12, 15)),
        Bond::new("912810TM0", "US20Y", 0.05250, (2044, 12, 15)),
        Bond::new("912810TL2", "US30Y", 0.05375, (2054, 12, 15)),
    ]
    .into_iter()
    .map(|bond| (bond.cusip.clone(), bond))
    .collect()
});

/// Resolve a CUSIP against the static table.
pub fn query_product(cusip: &str) -> Result<Bond> {
    BOND_TABLE
        .get(cusip)
        .cloned()
        .ok_or_else(|| PipelineError::UnknownProduct(cusip.to_string()))
}

/// The full seven-bond universe in curve order.
pub fn bond_universe() -> Vec<Bond> {
    let mut bonds: Vec<Bond> = BOND_TABLE.values().cloned().collect();
    bonds.sort_by_key(|b| b.maturity);
    bonds
}

/// A named group of products for bucketed risk aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketedSector {
    pub name: String,
    pub products: Vec<Bond>,
}

impl BucketedSector {
    pub fn new(name: &str, products: Vec<Bond>) -> Self {
        Self {
            name: name.to_string(),
            products,
        }
    }
}

fn sector(name: &str, tickers: &[&str]) -> BucketedSector {
    let members = bond_universe()
        .into_iter()
        .filter(|b| tickers.contains(&b.ticker.as_str()))
        .collect();
    BucketedSector::new(name, members)
}

/// Canonical curve sectors over the universe.
pub fn curve_sectors() -> Vec<BucketedSector> {
    vec![
        sector("FrontEnd", &["US2Y", "US3Y"]),
        sector("Belly", &["US5Y", "US7Y", "US10Y"]),
        sector("LongEnd", &["US20Y", "US30Y"]),
    ]
}
