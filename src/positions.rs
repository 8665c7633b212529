// ===============================
// src/positions.rs (per-book inventory tracker)
// ===============================
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::products::Bond;
use crate::soa::{Service, ServiceCore, ServiceListener, SharedListener};
use crate::trades::Trade;

/// Signed inventory for one product across trading books. Books accumulate
/// and are never removed; the aggregate is the sum over all books.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub product: Bond,
    book_positions: BTreeMap<String, i64>,
}

impl Position {
    pub fn new(product: Bond) -> Self {
        Self {
            product,
            book_positions: BTreeMap::new(),
        }
    }

    pub fn position(&self, book: &str) -> i64 {
        self.book_positions.get(book).copied().unwrap_or(0)
    }

    pub fn aggregate_position(&self) -> i64 {
        self.book_positions.values().sum()
    }

    pub fn add_position(&mut self, book: &str, quantity: i64) {
        *self.book_positions.entry(book.to_string()).or_insert(0) += quantity;
    }

    /// Books in sorted order with their signed quantities.
    pub fn by_book(&self) -> impl Iterator<Item = (&str, i64)> {
        self.book_positions.iter().map(|(b, q)| (b.as_str(), *q))
    }
}

#[derive(Default)]
pub struct PositionService {
    core: ServiceCore<String, Position>,
}

impl PositionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one trade: buys add, sells subtract, per book.
    pub fn add_trade(&mut self, trade: &Trade) -> Result<()> {
        let signed_quantity = trade.side.sign() * trade.quantity;
        let position = self
            .core
            .get_or_insert_with(trade.product.cusip.clone(), || {
                Position::new(trade.product.clone())
            });
        position.add_position(&trade.book, signed_quantity);

        let snapshot = position.clone();
        self.core.notify_add(&snapshot)
    }
}

impl Service<String, Position> for PositionService {
    fn get_data(&self, key: &String) -> Result<&Position> {
        self.core.get(key)
    }

    fn on_message(&mut self, data: Position) -> Result<()> {
        self.core
            .insert(data.product.cusip.clone(), data.clone());
        self.core.notify_add(&data)
    }

    fn add_listener(&mut self, listener: SharedListener<Position>) {
        self.core.add_listener(listener);
    }

    fn listeners(&self) -> &[SharedListener<Position>] {
        self.core.listeners()
    }
}

/// Adapter: TradeBookingService events into the position service.
pub struct PositionListener {
    service: Rc<RefCell<PositionService>>,
}

impl PositionListener {
    pub fn new(service: Rc<RefCell<PositionService>>) -> Self {
        Self { service }
    }
}

impl ServiceListener<Trade> for PositionListener {
    fn process_add(&self, data: &Trade) -> Result<()> {
        self.service.borrow_mut().add_trade(data)
    }
}
