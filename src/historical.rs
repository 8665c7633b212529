// ===============================
// src/historical.rs
// ===============================
//
// Historical persistence sink. One service instance per record flavour;
// a listener adapter pushes entities in, the connector appends one
// timestamped line per event to the flavour's result file.
//
use std::cell::RefCell;
use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::Utc;

use crate::algo_execution::ExecutionOrder;
use crate::algo_streaming::PriceStream;
use crate::error::Result;
use crate::fractional;
use crate::inquiry::Inquiry;
use crate::positions::Position;
use crate::products::Bond;
use crate::risk::PV01;
use crate::soa::{Service, ServiceCore, ServiceListener, SharedListener};

/// Wall-clock timestamp with millisecond precision, as used in every sink.
pub fn timestamp_now() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/// An entity the sink knows how to persist.
pub trait HistoricalRecord: Clone {
    /// Store key for the persisted copy.
    fn persist_key(&self) -> String;
    /// Record body, without the timestamp column.
    fn format_line(&self) -> String;
}

impl HistoricalRecord for Position {
    fn persist_key(&self) -> String {
        self.product.cusip.clone()
    }

    fn format_line(&self) -> String {
        let mut line = self.product.cusip.clone();
        for (book, quantity) in self.by_book() {
            line.push_str(&format!(",{book},{quantity}"));
        }
        line
    }
}

impl HistoricalRecord for PV01<Bond> {
    fn persist_key(&self) -> String {
        self.product.cusip.clone()
    }

    fn format_line(&self) -> String {
        format!("{},{:.6},{}", self.product.cusip, self.pv01, self.quantity)
    }
}

impl HistoricalRecord for ExecutionOrder {
    fn persist_key(&self) -> String {
        self.order_id.clone()
    }

    fn format_line(&self) -> String {
        let side = match self.side {
            crate::marketdata::PricingSide::Bid => "Bid",
            crate::marketdata::PricingSide::Offer => "Ask",
        };
        format!(
            "{},{},{},{},{},{},{},{},{}",
            self.product.cusip,
            self.order_id,
            side,
            self.order_type,
            fractional::encode(self.price),
            self.visible_quantity,
            self.hidden_quantity,
            self.parent_order_id,
            if self.is_child_order { "True" } else { "False" }
        )
    }
}

impl HistoricalRecord for PriceStream {
    fn persist_key(&self) -> String {
        self.product.cusip.clone()
    }

    fn format_line(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{}",
            self.product.cusip,
            fractional::encode(self.bid_order.price),
            self.bid_order.visible_quantity,
            self.bid_order.hidden_quantity,
            self.bid_order.side,
            fractional::encode(self.offer_order.price),
            self.offer_order.visible_quantity,
            self.offer_order.hidden_quantity,
            self.offer_order.side
        )
    }
}

impl HistoricalRecord for Inquiry {
    fn persist_key(&self) -> String {
        self.inquiry_id.clone()
    }

    fn format_line(&self) -> String {
        format!(
            "{},{},{},{},{},{}",
            self.inquiry_id,
            self.product.cusip,
            self.side,
            self.quantity,
            fractional::encode(self.price),
            self.state
        )
    }
}

/// Appends one timestamped line per persisted record.
pub struct HistoricalDataConnector {
    path: PathBuf,
}

impl HistoricalDataConnector {
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { path })
    }

    fn append(&self, line: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{},{}", timestamp_now(), line)?;
        Ok(())
    }
}

pub struct HistoricalDataService<V: HistoricalRecord> {
    core: ServiceCore<String, V>,
    connector: HistoricalDataConnector,
}

impl<V: HistoricalRecord> HistoricalDataService<V> {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            core: ServiceCore::default(),
            connector: HistoricalDataConnector::new(path.as_ref().to_path_buf())?,
        })
    }

    /// Keep the latest copy per key and publish the record line.
    pub fn persist(&mut self, data: &V) -> Result<()> {
        self.core.insert(data.persist_key(), data.clone());
        self.connector.append(&data.format_line())
    }
}

impl<V: HistoricalRecord> Service<String, V> for HistoricalDataService<V> {
    fn get_data(&self, key: &String) -> Result<&V> {
        self.core.get(key)
    }

    fn on_message(&mut self, data: V) -> Result<()> {
        self.persist(&data)
    }

    fn add_listener(&mut self, listener: SharedListener<V>) {
        self.core.add_listener(listener);
    }

    fn listeners(&self) -> &[SharedListener<V>] {
        self.core.listeners()
    }
}

/// Adapter: any upstream service's events into a persistence instance.
pub struct HistoricalDataListener<V: HistoricalRecord> {
    service: Rc<RefCell<HistoricalDataService<V>>>,
}

impl<V: HistoricalRecord> HistoricalDataListener<V> {
    pub fn new(service: Rc<RefCell<HistoricalDataService<V>>>) -> Self {
        Self { service }
    }
}

impl<V: HistoricalRecord> ServiceListener<V> for HistoricalDataListener<V> {
    fn process_add(&self, data: &V) -> Result<()> {
        self.service.borrow_mut().persist(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::products;
    use tempfile::tempdir;

    #[test]
    fn persists_timestamped_lines_and_latest_copies() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("positions.txt");
        let service = Rc::new(RefCell::new(
            HistoricalDataService::<Position>::new(&path).unwrap(),
        ));
        let listener = HistoricalDataListener::new(service.clone());

        let mut position = Position::new(products::query_product("91282CAV3").unwrap());
        position.add_position("TRSY1", 3_000_000);
        listener.process_add(&position).unwrap();
        position.add_position("TRSY2", -1_000_000);
        listener.process_add(&position).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("91282CAV3,TRSY1,3000000"));
        assert!(lines[1].ends_with("91282CAV3,TRSY1,3000000,TRSY2,-1000000"));

        let stored = service.borrow();
        let latest = stored.get_data(&"91282CAV3".to_string()).unwrap();
        assert_eq!(latest.position("TRSY2"), -1_000_000);
    }

    #[test]
    fn execution_lines_render_all_columns() {
        use crate::algo_execution::{ExecutionOrder, OrderType};
        use crate::marketdata::PricingSide;

        let order = ExecutionOrder {
            product: products::query_product("91282CAV3").unwrap(),
            side: PricingSide::Bid,
            order_id: "AlgoXYZ".to_string(),
            order_type: OrderType::Market,
            price: 99.515625,
            visible_quantity: 1_000_000,
            hidden_quantity: 0,
            parent_order_id: "AlgoParentAB".to_string(),
            is_child_order: false,
        };
        assert_eq!(
            order.format_line(),
            "91282CAV3,AlgoXYZ,Bid,MARKET,99-16+,1000000,0,AlgoParentAB,False"
        );
    }
}
