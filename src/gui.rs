// ===============================
// src/gui.rs
// ===============================
//
// GUI price feed: a throttled sink on the pricing service. At most one
// price per throttle interval is appended to gui.txt.
//
use std::cell::RefCell;
use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::historical::timestamp_now;
use crate::pricing::Price;
use crate::soa::{Service, ServiceCore, ServiceListener, SharedListener};

pub const DEFAULT_THROTTLE_MS: u64 = 300;

pub struct GuiService {
    core: ServiceCore<String, Price>,
    path: PathBuf,
    throttle: Duration,
    window_start: Instant,
}

impl GuiService {
    pub fn new(path: impl AsRef<Path>, throttle: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            core: ServiceCore::default(),
            path,
            throttle,
            window_start: Instant::now(),
        })
    }

    /// Publish the price if the throttle window has elapsed; otherwise the
    /// update is silently absorbed.
    pub fn publish_throttled_price(&mut self, price: &Price) -> Result<()> {
        if self.window_start.elapsed() < self.throttle {
            return Ok(());
        }
        self.window_start = Instant::now();

        self.core
            .insert(price.product.cusip.clone(), price.clone());

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(
            file,
            "{},{},{:.6},{:.6}",
            timestamp_now(),
            price.product.cusip,
            price.mid,
            price.bid_offer_spread
        )?;
        Ok(())
    }
}

impl Service<String, Price> for GuiService {
    fn get_data(&self, key: &String) -> Result<&Price> {
        self.core.get(key)
    }

    fn on_message(&mut self, data: Price) -> Result<()> {
        self.publish_throttled_price(&data)
    }

    fn add_listener(&mut self, listener: SharedListener<Price>) {
        self.core.add_listener(listener);
    }

    fn listeners(&self) -> &[SharedListener<Price>] {
        self.core.listeners()
    }
}

/// Adapter: PricingService events into the GUI sink.
pub struct GuiListener {
    service: Rc<RefCell<GuiService>>,
}

impl GuiListener {
    pub fn new(service: Rc<RefCell<GuiService>>) -> Self {
        Self { service }
    }
}

impl ServiceListener<Price> for GuiListener {
    fn process_add(&self, data: &Price) -> Result<()> {
        self.service.borrow_mut().publish_throttled_price(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::products;
    use tempfile::tempdir;

    fn price(mid: f64) -> Price {
        Price {
            product: products::query_product("91282CAV3").unwrap(),
            mid,
            bid_offer_spread: 1.0 / 128.0,
        }
    }

    #[test]
    fn zero_throttle_publishes_every_price() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gui.txt");
        let mut service = GuiService::new(&path, Duration::ZERO).unwrap();

        service.publish_throttled_price(&price(100.0)).unwrap();
        service.publish_throttled_price(&price(100.5)).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.lines().next().unwrap().contains("91282CAV3"));
    }

    #[test]
    fn long_throttle_swallows_rapid_updates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gui.txt");
        let mut service = GuiService::new(&path, Duration::from_secs(3600)).unwrap();

        for k in 0..10 {
            service.publish_throttled_price(&price(99.0 + k as f64)).unwrap();
        }
        // window opened at construction and never elapsed
        assert!(!path.exists() || fs::read_to_string(&path).unwrap().is_empty());
    }
}
