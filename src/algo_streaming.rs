// ===============================
// src/algo_streaming.rs
// ===============================
//
// Algo streaming stage: turns each Price into a two-sided PriceStream.
// Quoted prices straddle the mid by half the spread; the visible size
// alternates 1mm/2mm per event with hidden size at twice the visible.
//
use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::marketdata::PricingSide;
use crate::pricing::Price;
use crate::products::Bond;
use crate::soa::{Service, ServiceCore, ServiceListener, SharedListener};

const BASE_VISIBLE_QTY: i64 = 1_000_000;
const HIDDEN_MULTIPLIER: i64 = 2;

/// One side of a streamed quote.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceStreamOrder {
    pub price: f64,
    pub visible_quantity: i64,
    pub hidden_quantity: i64,
    pub side: PricingSide,
}

/// Two-sided quote stream for a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceStream {
    pub product: Bond,
    pub bid_order: PriceStreamOrder,
    pub offer_order: PriceStreamOrder,
}

/// Algo wrapper around a PriceStream. Owns its own copy so the stream stays
/// valid for every downstream consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgoStream {
    pub price_stream: PriceStream,
}

impl AlgoStream {
    pub fn price_stream(&self) -> &PriceStream {
        &self.price_stream
    }
}

#[derive(Default)]
pub struct AlgoStreamingService {
    core: ServiceCore<String, AlgoStream>,
    count: u64,
}

impl AlgoStreamingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and publish the stream for a fresh price. The size alternation
    /// counter advances exactly once per call.
    pub fn publish_algo_stream(&mut self, price: &Price) -> Result<()> {
        let bid_price = price.mid - price.bid_offer_spread / 2.0;
        let offer_price = price.mid + price.bid_offer_spread / 2.0;

        let visible_quantity = if self.count % 2 == 0 {
            BASE_VISIBLE_QTY
        } else {
            2 * BASE_VISIBLE_QTY
        };
        let hidden_quantity = visible_quantity * HIDDEN_MULTIPLIER;
        self.count += 1;

        let stream = AlgoStream {
            price_stream: PriceStream {
                product: price.product.clone(),
                bid_order: PriceStreamOrder {
                    price: bid_price,
                    visible_quantity,
                    hidden_quantity,
                    side: PricingSide::Bid,
                },
                offer_order: PriceStreamOrder {
                    price: offer_price,
                    visible_quantity,
                    hidden_quantity,
                    side: PricingSide::Offer,
                },
            },
        };

        self.core
            .insert(price.product.cusip.clone(), stream.clone());
        self.core.notify_add(&stream)
    }
}

impl Service<String, AlgoStream> for AlgoStreamingService {
    fn get_data(&self, key: &String) -> Result<&AlgoStream> {
        self.core.get(key)
    }

    fn on_message(&mut self, data: AlgoStream) -> Result<()> {
        // streams originate from prices, not from a connector
        self.core
            .insert(data.price_stream.product.cusip.clone(), data.clone());
        self.core.notify_add(&data)
    }

    fn add_listener(&mut self, listener: SharedListener<AlgoStream>) {
        self.core.add_listener(listener);
    }

    fn listeners(&self) -> &[SharedListener<AlgoStream>] {
        self.core.listeners()
    }
}

/// Adapter: PricingService events into the algo streaming service.
pub struct AlgoStreamingListener {
    service: Rc<RefCell<AlgoStreamingService>>,
}

impl AlgoStreamingListener {
    pub fn new(service: Rc<RefCell<AlgoStreamingService>>) -> Self {
        Self { service }
    }
}

impl ServiceListener<Price> for AlgoStreamingListener {
    fn process_add(&self, data: &Price) -> Result<()> {
        self.service.borrow_mut().publish_algo_stream(data)
    }
}
