// ===============================
// src/risk.rs
// ===============================
//
// Risk stage: maintains PV01 exposure per product from position updates and
// aggregates it across named curve sectors on demand.
//
use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::analytics;
use crate::error::Result;
use crate::positions::Position;
use crate::products::{Bond, BucketedSector};
use crate::soa::{Service, ServiceCore, ServiceListener, SharedListener};

/// PV01 exposure: the product, its per-unit pv01 and the quantity the risk
/// is carried against. Generic so a sector aggregate can reuse the shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PV01<P> {
    pub product: P,
    pub pv01: f64,
    pub quantity: i64,
}

impl<P> PV01<P> {
    pub fn new(product: P, pv01: f64, quantity: i64) -> Self {
        Self {
            product,
            pv01,
            quantity,
        }
    }
}

#[derive(Default)]
pub struct RiskService {
    core: ServiceCore<String, PV01<Bond>>,
}

impl RiskService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a position update into the product's PV01 entry. The entry's
    /// quantity tracks the position's aggregate at all times: each trade's
    /// signed quantity lands here exactly once.
    pub fn add_position(&mut self, position: &Position) -> Result<()> {
        let cusip = position.product.cusip.clone();
        let pv01_value = analytics::query_pv01(&cusip)?;
        let quantity = position.aggregate_position();

        let entry = self.core.get_or_insert_with(cusip, || {
            PV01::new(position.product.clone(), pv01_value, 0)
        });
        entry.quantity = quantity;

        let snapshot = entry.clone();
        self.core.notify_add(&snapshot)
    }

    /// Total risk across a sector: value is the quantity-weighted sum of the
    /// member pv01s, quantity the summed member quantities. Products without
    /// an entry contribute nothing.
    pub fn bucketed_risk(&self, sector: &BucketedSector) -> PV01<BucketedSector> {
        let mut total_pv01 = 0.0;
        let mut total_quantity = 0;
        for product in &sector.products {
            if let Ok(entry) = self.core.get(&product.cusip) {
                total_pv01 += entry.pv01 * entry.quantity as f64;
                total_quantity += entry.quantity;
            }
        }
        PV01::new(sector.clone(), total_pv01, total_quantity)
    }
}

impl Service<String, PV01<Bond>> for RiskService {
    fn get_data(&self, key: &String) -> Result<&PV01<Bond>> {
        self.core.get(key)
    }

    fn on_message(&mut self, data: PV01<Bond>) -> Result<()> {
        self.core
            .insert(data.product.cusip.clone(), data.clone());
        self.core.notify_add(&data)
    }

    fn add_listener(&mut self, listener: SharedListener<PV01<Bond>>) {
        self.core.add_listener(listener);
    }

    fn listeners(&self) -> &[SharedListener<PV01<Bond>>] {
        self.core.listeners()
    }
}

/// Adapter: PositionService events into the risk service.
pub struct RiskListener {
    service: Rc<RefCell<RiskService>>,
}

impl RiskListener {
    pub fn new(service: Rc<RefCell<RiskService>>) -> Self {
        Self { service }
    }
}

impl ServiceListener<Position> for RiskListener {
    fn process_add(&self, data: &Position) -> Result<()> {
        self.service.borrow_mut().add_position(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::products;
    use approx::assert_relative_eq;

    fn position(cusip: &str, book_quantities: &[(&str, i64)]) -> Position {
        let mut position = Position::new(products::query_product(cusip).unwrap());
        for (book, quantity) in book_quantities {
            position.add_position(book, *quantity);
        }
        position
    }

    #[test]
    fn quantity_tracks_the_aggregate_position() {
        let mut service = RiskService::new();
        service
            .add_position(&position("91282CAV3", &[("TRSY1", 3_000_000)]))
            .unwrap();
        let entry = service.get_data(&"91282CAV3".to_string()).unwrap();
        assert_eq!(entry.quantity, 3_000_000);

        service
            .add_position(&position(
                "91282CAV3",
                &[("TRSY1", 3_000_000), ("TRSY2", -1_000_000)],
            ))
            .unwrap();
        let entry = service.get_data(&"91282CAV3".to_string()).unwrap();
        assert_eq!(entry.quantity, 2_000_000);
        assert_relative_eq!(
            entry.pv01,
            analytics::query_pv01("91282CAV3").unwrap(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn bucketed_risk_weights_by_quantity() {
        let mut service = RiskService::new();
        service
            .add_position(&position("91282CAV3", &[("TRSY1", 2_000_000)]))
            .unwrap();
        service
            .add_position(&position("91282CBL4", &[("TRSY2", 1_000_000)]))
            .unwrap();

        let sectors = products::curve_sectors();
        let front_end = &sectors[0];
        let risk = service.bucketed_risk(front_end);

        let expected = analytics::query_pv01("91282CAV3").unwrap() * 2_000_000.0
            + analytics::query_pv01("91282CBL4").unwrap() * 1_000_000.0;
        assert_relative_eq!(risk.pv01, expected, epsilon = 1e-6);
        assert_eq!(risk.quantity, 3_000_000);
        assert_eq!(risk.product.name, "FrontEnd");
    }

    #[test]
    fn bucketed_risk_skips_products_without_exposure() {
        let service = RiskService::new();
        let sectors = products::curve_sectors();
        let risk = service.bucketed_risk(&sectors[2]);
        assert_eq!(risk.pv01, 0.0);
        assert_eq!(risk.quantity, 0);
    }
}
