// ===============================
// src/pricing.rs
// ===============================
//
// Pricing stage: ingests `Timestamp,CUSIP,Bid,Ask,Spread` lines, derives the
// mid and the bid/offer spread from the fractional quotes, and fans the
// resulting Price out to the algo-streaming and GUI listeners.
//
use std::cell::RefCell;
use std::io::BufRead;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fractional;
use crate::products::{self, Bond};
use crate::soa::{
    csv_fields, subscribe_lines, Connector, InboundConnector, Service, ServiceCore, SharedListener,
};

/// Mid price and bid/offer spread for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub product: Bond,
    pub mid: f64,
    pub bid_offer_spread: f64,
}

#[derive(Default)]
pub struct PricingService {
    core: ServiceCore<String, Price>,
}

impl PricingService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Service<String, Price> for PricingService {
    fn get_data(&self, key: &String) -> Result<&Price> {
        self.core.get(key)
    }

    fn on_message(&mut self, data: Price) -> Result<()> {
        self.core
            .insert(data.product.cusip.clone(), data.clone());
        self.core.notify_add(&data)
    }

    fn add_listener(&mut self, listener: SharedListener<Price>) {
        self.core.add_listener(listener);
    }

    fn listeners(&self) -> &[SharedListener<Price>] {
        self.core.listeners()
    }
}

/// Inbound connector parsing the prices file into the service.
pub struct PricingConnector {
    service: Rc<RefCell<PricingService>>,
}

impl PricingConnector {
    pub fn new(service: Rc<RefCell<PricingService>>) -> Self {
        Self { service }
    }

    fn parse(line: &str) -> Result<Price> {
        let fields = csv_fields(line, 5)?;
        let product = products::query_product(fields[1])?;
        let bid = fractional::decode(fields[2])?;
        let ask = fractional::decode(fields[3])?;
        // the Spread column is advisory; the spread is re-derived from the quotes
        Ok(Price {
            product,
            mid: (bid + ask) / 2.0,
            bid_offer_spread: ask - bid,
        })
    }
}

impl Connector<Price> for PricingConnector {
    // inbound-only
    fn publish(&self, _data: &Price) -> Result<()> {
        Ok(())
    }
}

impl InboundConnector for PricingConnector {
    fn subscribe(&self, input: &mut dyn BufRead) -> Result<()> {
        subscribe_lines(input, true, |line| {
            let price = Self::parse(line)?;
            self.service.borrow_mut().on_message(price)
        })
    }
}
