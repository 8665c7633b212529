// ===============================
// src/algo_execution.rs
// ===============================
//
// Algo execution stage: reacts to each aggregated order book by minting one
// ExecutionOrder through a pluggable factory. The default policy crosses the
// spread when the market is tight (<= 1/128), alternating sides per event,
// and otherwise joins the bid.
//
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::marketdata::{OrderBook, PricingSide};
use crate::products::Bond;
use crate::soa::{Service, ServiceCore, ServiceListener, SharedListener};

const TIGHT_SPREAD: f64 = 1.0 / 128.0;
const ORDER_ID_LEN: usize = 11;
const PARENT_ID_LEN: usize = 5;

const ID_CHARSET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Random alphanumeric identifier in the order-id alphabet.
pub fn random_id(length: usize) -> String {
    random_id_with(&mut rand::thread_rng(), length)
}

/// Same, but drawing from a caller-supplied generator (seeded data runs).
pub fn random_id_with<R: Rng>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| ID_CHARSET[rng.gen_range(0..ID_CHARSET.len())] as char)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Fok,
    Market,
    Limit,
    Stop,
    Ioc,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderType::Fok => "FOK",
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
            OrderType::Stop => "STOP",
            OrderType::Ioc => "IOC",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Market {
    Brokertec,
    Espeed,
    Cme,
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Market::Brokertec => "BROKERTEC",
            Market::Espeed => "ESPEED",
            Market::Cme => "CME",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOrder {
    pub product: Bond,
    pub side: PricingSide,
    pub order_id: String,
    pub order_type: OrderType,
    pub price: f64,
    pub visible_quantity: i64,
    pub hidden_quantity: i64,
    pub parent_order_id: String,
    pub is_child_order: bool,
}

/// Algo wrapper: an ExecutionOrder copy plus the target market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgoExecution {
    pub execution_order: ExecutionOrder,
    pub market: Market,
}

/// Policy seam for turning an order book into an execution order.
pub trait AlgoOrderFactory {
    fn create_execution_order(&self, order_book: &OrderBook, count: u64) -> Result<ExecutionOrder>;
}

/// Default spread-gate policy.
#[derive(Default)]
pub struct SimpleAlgoOrderFactory;

impl AlgoOrderFactory for SimpleAlgoOrderFactory {
    fn create_execution_order(&self, order_book: &OrderBook, count: u64) -> Result<ExecutionOrder> {
        let best = order_book.best_bid_offer()?;

        let (side, price, quantity) = if best.spread() <= TIGHT_SPREAD {
            if count % 2 == 0 {
                (PricingSide::Bid, best.offer.price, best.bid.quantity)
            } else {
                (PricingSide::Offer, best.bid.price, best.offer.quantity)
            }
        } else {
            (PricingSide::Bid, best.bid.price, best.bid.quantity)
        };

        Ok(ExecutionOrder {
            product: order_book.product.clone(),
            side,
            order_id: format!("Algo{}", random_id(ORDER_ID_LEN)),
            order_type: OrderType::Market,
            price,
            visible_quantity: quantity,
            hidden_quantity: 0,
            parent_order_id: format!("AlgoParent{}", random_id(PARENT_ID_LEN)),
            is_child_order: false,
        })
    }
}

pub struct AlgoExecutionService {
    core: ServiceCore<String, AlgoExecution>,
    factory: Box<dyn AlgoOrderFactory>,
    count: u64,
}

impl AlgoExecutionService {
    pub fn new(factory: Box<dyn AlgoOrderFactory>) -> Self {
        Self {
            core: ServiceCore::default(),
            factory,
            count: 0,
        }
    }

    /// Mint and publish the execution for one order-book event. The
    /// alternation counter advances once per event, before the next one.
    pub fn algo_execute_order(&mut self, order_book: &OrderBook) -> Result<()> {
        let execution_order = self
            .factory
            .create_execution_order(order_book, self.count)?;
        self.count += 1;

        let algo_execution = AlgoExecution {
            execution_order,
            market: Market::Brokertec,
        };
        self.core.insert(
            algo_execution.execution_order.product.cusip.clone(),
            algo_execution.clone(),
        );
        self.core.notify_add(&algo_execution)
    }
}

impl Service<String, AlgoExecution> for AlgoExecutionService {
    fn get_data(&self, key: &String) -> Result<&AlgoExecution> {
        self.core.get(key)
    }

    fn on_message(&mut self, data: AlgoExecution) -> Result<()> {
        // executions originate from order books, not from a connector
        self.core.insert(
            data.execution_order.product.cusip.clone(),
            data.clone(),
        );
        self.core.notify_add(&data)
    }

    fn add_listener(&mut self, listener: SharedListener<AlgoExecution>) {
        self.core.add_listener(listener);
    }

    fn listeners(&self) -> &[SharedListener<AlgoExecution>] {
        self.core.listeners()
    }
}

/// Adapter: MarketDataService events into the algo execution service.
pub struct AlgoExecutionListener {
    service: Rc<RefCell<AlgoExecutionService>>,
}

impl AlgoExecutionListener {
    pub fn new(service: Rc<RefCell<AlgoExecutionService>>) -> Self {
        Self { service }
    }
}

impl ServiceListener<OrderBook> for AlgoExecutionListener {
    fn process_add(&self, data: &OrderBook) -> Result<()> {
        self.service.borrow_mut().algo_execute_order(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fractional;
    use crate::marketdata::Order;
    use crate::products;

    fn book(bid: &str, bid_qty: i64, offer: &str, offer_qty: i64) -> OrderBook {
        let mut book = OrderBook::new(products::query_product("91282CAV3").unwrap());
        book.bid_stack.push(Order {
            price: fractional::decode(bid).unwrap(),
            quantity: bid_qty,
            side: PricingSide::Bid,
        });
        book.offer_stack.push(Order {
            price: fractional::decode(offer).unwrap(),
            quantity: offer_qty,
            side: PricingSide::Offer,
        });
        book
    }

    #[test]
    fn tight_spread_even_count_lifts_the_offer() {
        let factory = SimpleAlgoOrderFactory;
        // bid 99+31/32+7/256: spread 1/256 <= 1/128
        let order = factory
            .create_execution_order(&book("99-317", 3_000_000, "100-000", 4_000_000), 0)
            .unwrap();
        assert_eq!(order.side, PricingSide::Bid);
        assert_eq!(order.price, 100.0);
        assert_eq!(order.visible_quantity, 3_000_000);
        assert_eq!(order.hidden_quantity, 0);
        assert_eq!(order.order_type, OrderType::Market);
        assert!(!order.is_child_order);
    }

    #[test]
    fn tight_spread_odd_count_hits_the_bid() {
        let factory = SimpleAlgoOrderFactory;
        let order = factory
            .create_execution_order(&book("99-317", 3_000_000, "100-000", 4_000_000), 1)
            .unwrap();
        assert_eq!(order.side, PricingSide::Offer);
        assert_eq!(order.price, fractional::decode("99-317").unwrap());
        assert_eq!(order.visible_quantity, 4_000_000);
    }

    #[test]
    fn wide_spread_joins_the_bid() {
        let factory = SimpleAlgoOrderFactory;
        // spread 1/32 > 1/128
        let order = factory
            .create_execution_order(&book("99-300", 5_000_000, "99-310", 2_000_000), 0)
            .unwrap();
        assert_eq!(order.side, PricingSide::Bid);
        assert_eq!(order.price, fractional::decode("99-300").unwrap());
        assert_eq!(order.visible_quantity, 5_000_000);
    }

    #[test]
    fn order_ids_carry_the_algo_prefixes() {
        let factory = SimpleAlgoOrderFactory;
        let order = factory
            .create_execution_order(&book("99-300", 1, "99-310", 1), 0)
            .unwrap();
        assert_eq!(order.order_id.len(), 4 + 11);
        assert!(order.order_id.starts_with("Algo"));
        assert_eq!(order.parent_order_id.len(), 10 + 5);
        assert!(order.parent_order_id.starts_with("AlgoParent"));
    }

    #[test]
    fn service_alternates_sides_across_events() {
        let mut service = AlgoExecutionService::new(Box::new(SimpleAlgoOrderFactory));
        let tight = book("99-317", 3_000_000, "100-000", 4_000_000);
        let key = "91282CAV3".to_string();

        service.algo_execute_order(&tight).unwrap();
        let first = service.get_data(&key).unwrap().clone();
        assert_eq!(first.execution_order.side, PricingSide::Bid);
        assert_eq!(first.market, Market::Brokertec);

        service.algo_execute_order(&tight).unwrap();
        let second = service.get_data(&key).unwrap().clone();
        assert_eq!(second.execution_order.side, PricingSide::Offer);
    }
}
