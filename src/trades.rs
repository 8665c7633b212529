// ===============================
// src/trades.rs
// ===============================
//
// Trade booking stage. Trades arrive two ways: parsed from the trades file,
// or synthesised from execution orders by a listener that rotates bookings
// across the TRSY1..TRSY3 books.
//
use std::cell::{Cell, RefCell};
use std::fmt;
use std::io::BufRead;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::algo_execution::ExecutionOrder;
use crate::error::{PipelineError, Result};
use crate::fractional;
use crate::marketdata::PricingSide;
use crate::products::{self, Bond};
use crate::soa::{
    csv_fields, subscribe_lines, Connector, InboundConnector, Service, ServiceCore,
    ServiceListener, SharedListener,
};

const BOOK_COUNT: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn sign(&self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(PipelineError::MalformedInput(format!(
                "bad trade side {other:?}"
            ))),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub product: Bond,
    pub trade_id: String,
    pub price: f64,
    pub book: String,
    pub quantity: i64,
    pub side: Side,
}

#[derive(Default)]
pub struct TradeBookingService {
    core: ServiceCore<String, Trade>,
}

impl TradeBookingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Book a trade: store by trade id and fan out to the position listeners.
    pub fn book_trade(&mut self, trade: Trade) -> Result<()> {
        self.core.insert(trade.trade_id.clone(), trade.clone());
        self.core.notify_add(&trade)
    }
}

impl Service<String, Trade> for TradeBookingService {
    fn get_data(&self, key: &String) -> Result<&Trade> {
        self.core.get(key)
    }

    fn on_message(&mut self, data: Trade) -> Result<()> {
        self.book_trade(data)
    }

    fn add_listener(&mut self, listener: SharedListener<Trade>) {
        self.core.add_listener(listener);
    }

    fn listeners(&self) -> &[SharedListener<Trade>] {
        self.core.listeners()
    }
}

/// Inbound connector parsing the trades file into the service.
pub struct TradeBookingConnector {
    service: Rc<RefCell<TradeBookingService>>,
}

impl TradeBookingConnector {
    pub fn new(service: Rc<RefCell<TradeBookingService>>) -> Self {
        Self { service }
    }

    fn parse(line: &str) -> Result<Trade> {
        let fields = csv_fields(line, 6)?;
        let product = products::query_product(fields[0])?;
        let quantity: i64 = fields[4]
            .parse()
            .map_err(|_| PipelineError::MalformedInput(format!("bad quantity {:?}", fields[4])))?;
        Ok(Trade {
            product,
            trade_id: fields[1].to_string(),
            price: fractional::decode(fields[2])?,
            book: fields[3].to_string(),
            quantity,
            side: Side::parse(fields[5])?,
        })
    }
}

impl Connector<Trade> for TradeBookingConnector {
    // inbound-only
    fn publish(&self, _data: &Trade) -> Result<()> {
        Ok(())
    }
}

impl InboundConnector for TradeBookingConnector {
    fn subscribe(&self, input: &mut dyn BufRead) -> Result<()> {
        subscribe_lines(input, false, |line| {
            let trade = Self::parse(line)?;
            self.service.borrow_mut().on_message(trade)
        })
    }
}

/// Adapter: ExecutionService events synthesised into trades. The k-th order
/// books to TRSY{(k mod 3)+1}.
pub struct TradeBookingListener {
    service: Rc<RefCell<TradeBookingService>>,
    count: Cell<u64>,
}

impl TradeBookingListener {
    pub fn new(service: Rc<RefCell<TradeBookingService>>) -> Self {
        Self {
            service,
            count: Cell::new(0),
        }
    }
}

impl ServiceListener<ExecutionOrder> for TradeBookingListener {
    fn process_add(&self, order: &ExecutionOrder) -> Result<()> {
        let count = self.count.get();
        self.count.set(count + 1);

        let trade = Trade {
            product: order.product.clone(),
            trade_id: order.order_id.clone(),
            price: order.price,
            book: format!("TRSY{}", count % BOOK_COUNT + 1),
            quantity: order.visible_quantity + order.hidden_quantity,
            side: match order.side {
                PricingSide::Bid => Side::Buy,
                PricingSide::Offer => Side::Sell,
            },
        };
        self.service.borrow_mut().book_trade(trade)
    }
}
