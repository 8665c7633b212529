// ===============================
// src/streaming.rs
// ===============================
//
// Streaming stage: unwraps AlgoStream events, keeps the latest PriceStream
// per product, feeds the historical sink and publishes a readable rendition
// of each stream on the console connector.
//
use std::cell::RefCell;
use std::rc::Rc;

use tracing::info;

use crate::algo_streaming::{AlgoStream, PriceStream};
use crate::error::Result;
use crate::fractional;
use crate::soa::{Connector, Service, ServiceCore, ServiceListener, SharedListener};

/// Outbound console connector for price streams.
#[derive(Default)]
pub struct StreamingServiceConnector;

impl Connector<PriceStream> for StreamingServiceConnector {
    fn publish(&self, data: &PriceStream) -> Result<()> {
        info!(
            product = %data.product.cusip,
            bid = %fractional::encode(data.bid_order.price),
            bid_visible = data.bid_order.visible_quantity,
            bid_hidden = data.bid_order.hidden_quantity,
            offer = %fractional::encode(data.offer_order.price),
            offer_visible = data.offer_order.visible_quantity,
            offer_hidden = data.offer_order.hidden_quantity,
            "price stream"
        );
        Ok(())
    }
}

#[derive(Default)]
pub struct StreamingService {
    core: ServiceCore<String, PriceStream>,
    connector: StreamingServiceConnector,
}

impl StreamingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the unwrapped stream and notify the persistence listeners.
    pub fn add_price_stream(&mut self, algo_stream: &AlgoStream) -> Result<()> {
        let stream = algo_stream.price_stream().clone();
        self.core
            .insert(stream.product.cusip.clone(), stream.clone());
        self.core.notify_add(&stream)
    }

    pub fn publish_price(&self, stream: &PriceStream) -> Result<()> {
        self.connector.publish(stream)
    }
}

impl Service<String, PriceStream> for StreamingService {
    fn get_data(&self, key: &String) -> Result<&PriceStream> {
        self.core.get(key)
    }

    fn on_message(&mut self, data: PriceStream) -> Result<()> {
        self.core
            .insert(data.product.cusip.clone(), data.clone());
        self.core.notify_add(&data)
    }

    fn add_listener(&mut self, listener: SharedListener<PriceStream>) {
        self.core.add_listener(listener);
    }

    fn listeners(&self) -> &[SharedListener<PriceStream>] {
        self.core.listeners()
    }
}

/// Adapter: AlgoStreamingService events into the streaming service.
pub struct StreamingListener {
    service: Rc<RefCell<StreamingService>>,
}

impl StreamingListener {
    pub fn new(service: Rc<RefCell<StreamingService>>) -> Self {
        Self { service }
    }
}

impl ServiceListener<AlgoStream> for StreamingListener {
    fn process_add(&self, data: &AlgoStream) -> Result<()> {
        let mut service = self.service.borrow_mut();
        service.add_price_stream(data)?;
        service.publish_price(data.price_stream())
    }
}
