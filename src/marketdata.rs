// ===============================
// src/marketdata.rs
// ===============================
//
// Market data stage: maintains one order book per product from 5-level
// depth updates. Each inbound line appends ten orders to the product's
// stacks; the book is then aggregated (one order per distinct price, summed
// quantities) before it is stored and fanned out.
//
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::io::BufRead;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::fractional;
use crate::products::{self, Bond};
use crate::soa::{
    csv_fields, subscribe_lines, Connector, InboundConnector, Service, ServiceCore, SharedListener,
};

/// Depth levels per side on an inbound update.
pub const BOOK_DEPTH: usize = 5;

// prices on the wire sit on the 1/256 grid, so tick keys are exact
const PRICE_TICKS: f64 = 256.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PricingSide {
    Bid,
    Offer,
}

impl fmt::Display for PricingSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PricingSide::Bid => write!(f, "BID"),
            PricingSide::Offer => write!(f, "OFFER"),
        }
    }
}

/// A resting order: price, quantity and side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub price: f64,
    pub quantity: i64,
    pub side: PricingSide,
}

/// Best bid and offer view over a book.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BidOffer {
    pub bid: Order,
    pub offer: Order,
}

impl BidOffer {
    pub fn spread(&self) -> f64 {
        self.offer.price - self.bid.price
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    pub product: Bond,
    pub bid_stack: Vec<Order>,
    pub offer_stack: Vec<Order>,
}

impl OrderBook {
    pub fn new(product: Bond) -> Self {
        Self {
            product,
            bid_stack: Vec::new(),
            offer_stack: Vec::new(),
        }
    }

    /// Highest bid and lowest offer. An empty side means the book is in an
    /// unusable state and the pipeline must stop.
    pub fn best_bid_offer(&self) -> Result<BidOffer> {
        let bid = self
            .bid_stack
            .iter()
            .max_by(|a, b| a.price.total_cmp(&b.price))
            .copied()
            .ok_or_else(|| self.empty_side("bid"))?;
        let offer = self
            .offer_stack
            .iter()
            .min_by(|a, b| a.price.total_cmp(&b.price))
            .copied()
            .ok_or_else(|| self.empty_side("offer"))?;
        Ok(BidOffer { bid, offer })
    }

    fn empty_side(&self, side: &str) -> PipelineError {
        PipelineError::InvariantViolation(format!(
            "empty {side} stack for {}",
            self.product.cusip
        ))
    }

    /// Collapse each side to one order per distinct price, quantities
    /// summed, stacks sorted by price. Applying this twice is a no-op.
    pub fn aggregate_depth(&mut self) {
        self.bid_stack = aggregate(&self.bid_stack, PricingSide::Bid);
        self.offer_stack = aggregate(&self.offer_stack, PricingSide::Offer);
    }
}

fn aggregate(stack: &[Order], side: PricingSide) -> Vec<Order> {
    let mut by_price: BTreeMap<i64, i64> = BTreeMap::new();
    for order in stack {
        let ticks = (order.price * PRICE_TICKS).round() as i64;
        *by_price.entry(ticks).or_insert(0) += order.quantity;
    }
    by_price
        .into_iter()
        .map(|(ticks, quantity)| Order {
            price: ticks as f64 / PRICE_TICKS,
            quantity,
            side,
        })
        .collect()
}

#[derive(Default)]
pub struct MarketDataService {
    core: ServiceCore<String, OrderBook>,
}

impl MarketDataService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Best pair for a product currently in the store.
    pub fn best_bid_offer(&self, product_id: &str) -> Result<BidOffer> {
        self.core.get(&product_id.to_string())?.best_bid_offer()
    }
}

impl Service<String, OrderBook> for MarketDataService {
    fn get_data(&self, key: &String) -> Result<&OrderBook> {
        self.core.get(key)
    }

    fn on_message(&mut self, mut data: OrderBook) -> Result<()> {
        data.aggregate_depth();
        self.core
            .insert(data.product.cusip.clone(), data.clone());
        self.core.notify_add(&data)
    }

    fn add_listener(&mut self, listener: SharedListener<OrderBook>) {
        self.core.add_listener(listener);
    }

    fn listeners(&self) -> &[SharedListener<OrderBook>] {
        self.core.listeners()
    }
}

/// Inbound connector parsing 5-level depth updates into the service.
pub struct MarketDataConnector {
    service: Rc<RefCell<MarketDataService>>,
}

impl MarketDataConnector {
    pub fn new(service: Rc<RefCell<MarketDataService>>) -> Self {
        Self { service }
    }

    fn parse_quantity(field: &str) -> Result<i64> {
        field
            .parse()
            .map_err(|_| PipelineError::MalformedInput(format!("bad quantity {field:?}")))
    }

    fn parse(&self, line: &str) -> Result<OrderBook> {
        let fields = csv_fields(line, 2 + 4 * BOOK_DEPTH)?;
        let cusip = fields[1];

        // the update stacks onto whatever the book already holds
        let mut book = match self.service.borrow().get_data(&cusip.to_string()) {
            Ok(existing) => existing.clone(),
            Err(_) => OrderBook::new(products::query_product(cusip)?),
        };

        for level in 0..BOOK_DEPTH {
            book.bid_stack.push(Order {
                price: fractional::decode(fields[4 * level + 2])?,
                quantity: Self::parse_quantity(fields[4 * level + 3])?,
                side: PricingSide::Bid,
            });
            book.offer_stack.push(Order {
                price: fractional::decode(fields[4 * level + 4])?,
                quantity: Self::parse_quantity(fields[4 * level + 5])?,
                side: PricingSide::Offer,
            });
        }
        Ok(book)
    }
}

impl Connector<OrderBook> for MarketDataConnector {
    // inbound-only
    fn publish(&self, _data: &OrderBook) -> Result<()> {
        Ok(())
    }
}

impl InboundConnector for MarketDataConnector {
    fn subscribe(&self, input: &mut dyn BufRead) -> Result<()> {
        subscribe_lines(input, true, |line| {
            let book = self.parse(line)?;
            self.service.borrow_mut().on_message(book)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn order(price: f64, quantity: i64, side: PricingSide) -> Order {
        Order {
            price,
            quantity,
            side,
        }
    }

    fn book_with(bids: Vec<Order>, offers: Vec<Order>) -> OrderBook {
        let mut book = OrderBook::new(products::query_product("91282CAV3").unwrap());
        book.bid_stack = bids;
        book.offer_stack = offers;
        book
    }

    #[test]
    fn aggregation_collapses_equal_prices() {
        let mut book = book_with(
            vec![
                order(99.50, 1_000_000, PricingSide::Bid),
                order(99.50, 2_000_000, PricingSide::Bid),
                order(99.0, 500_000, PricingSide::Bid),
            ],
            vec![order(100.0, 750_000, PricingSide::Offer)],
        );
        book.aggregate_depth();

        assert_eq!(book.bid_stack.len(), 2);
        let top = book
            .bid_stack
            .iter()
            .find(|o| o.price == 99.50)
            .expect("aggregated level");
        assert_eq!(top.quantity, 3_000_000);
        assert_eq!(top.side, PricingSide::Bid);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let mut book = book_with(
            vec![
                order(99.50, 1_000_000, PricingSide::Bid),
                order(99.50, 2_000_000, PricingSide::Bid),
            ],
            vec![
                order(100.0, 750_000, PricingSide::Offer),
                order(100.25, 250_000, PricingSide::Offer),
            ],
        );
        book.aggregate_depth();
        let once = book.clone();
        book.aggregate_depth();
        assert_eq!(book.bid_stack, once.bid_stack);
        assert_eq!(book.offer_stack, once.offer_stack);
    }

    #[test]
    fn best_bid_offer_picks_extremes() {
        let book = book_with(
            vec![
                order(99.0, 1, PricingSide::Bid),
                order(99.75, 2, PricingSide::Bid),
            ],
            vec![
                order(100.5, 3, PricingSide::Offer),
                order(100.0, 4, PricingSide::Offer),
            ],
        );
        let best = book.best_bid_offer().unwrap();
        assert_eq!(best.bid.price, 99.75);
        assert_eq!(best.offer.price, 100.0);
        assert_eq!(best.spread(), 0.25);
    }

    #[test]
    fn empty_side_is_fatal() {
        let book = book_with(vec![], vec![order(100.0, 1, PricingSide::Offer)]);
        assert!(matches!(
            book.best_bid_offer(),
            Err(PipelineError::InvariantViolation(_))
        ));
    }

    #[test]
    fn subscription_builds_and_aggregates_books() {
        let service = Rc::new(RefCell::new(MarketDataService::new()));
        let connector = MarketDataConnector::new(service.clone());
        // two lines for the same product: stacks accumulate, levels collapse
        let line = "t,91282CAV3,99-316,1000000,100-002,1000000,99-312,2000000,100-006,2000000,99-306,3000000,100-012,3000000,99-302,4000000,100-016,4000000,99-296,5000000,100-022,5000000";
        let data = format!("header\n{line}\n{line}\n");
        connector.subscribe(&mut Cursor::new(data)).unwrap();

        let svc = service.borrow();
        let book = svc.get_data(&"91282CAV3".to_string()).unwrap();
        // same five price levels on both lines: still five entries, doubled sizes
        assert_eq!(book.bid_stack.len(), 5);
        assert_eq!(book.offer_stack.len(), 5);
        let best = svc.best_bid_offer("91282CAV3").unwrap();
        assert_eq!(best.bid.price, fractional::decode("99-316").unwrap());
        assert_eq!(best.bid.quantity, 2_000_000);
        assert_eq!(best.offer.price, fractional::decode("100-002").unwrap());
    }
}
