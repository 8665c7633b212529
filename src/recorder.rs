// ===============================
// src/recorder.rs
// ===============================
//
// Optional JSONL event trace. When enabled, every notification of interest
// is appended as one JSON line for offline inspection. Off by default; the
// result-file sinks in historical.rs are unaffected.
//
// ENV: set `RECORD_FILE=/path/to/events.jsonl` to activate (see config.rs).
//
use std::cell::RefCell;
use std::fs;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::Path;
use std::rc::Rc;

use serde::Serialize;
use tracing::info;

use crate::algo_execution::ExecutionOrder;
use crate::algo_streaming::PriceStream;
use crate::error::Result;
use crate::inquiry::Inquiry;
use crate::positions::Position;
use crate::pricing::Price;
use crate::products::Bond;
use crate::risk::PV01;
use crate::soa::ServiceListener;
use crate::trades::Trade;

#[derive(Debug, Clone, Serialize)]
pub enum Event {
    Price(Price),
    Stream(PriceStream),
    Execution(ExecutionOrder),
    Trade(Trade),
    Position(Position),
    Risk(PV01<Bond>),
    Inquiry(Inquiry),
}

pub struct Recorder {
    writer: RefCell<BufWriter<File>>,
}

impl Recorder {
    pub fn create(path: impl AsRef<Path>) -> Result<Rc<Self>> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!(path = %path.display(), "event recorder started");
        Ok(Rc::new(Self {
            writer: RefCell::new(BufWriter::new(file)),
        }))
    }

    pub fn record(&self, event: &Event) -> Result<()> {
        let mut writer = self.writer.borrow_mut();
        serde_json::to_writer(&mut *writer, event)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        self.writer.borrow_mut().flush()?;
        Ok(())
    }

    /// Listener adapter that maps an entity into its trace event.
    pub fn listener<V, F>(self: &Rc<Self>, to_event: F) -> Rc<RecorderListener<V, F>>
    where
        F: Fn(&V) -> Event,
    {
        Rc::new(RecorderListener {
            recorder: self.clone(),
            to_event,
            _marker: PhantomData,
        })
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        let _ = self.writer.borrow_mut().flush();
    }
}

pub struct RecorderListener<V, F: Fn(&V) -> Event> {
    recorder: Rc<Recorder>,
    to_event: F,
    _marker: PhantomData<fn(&V)>,
}

impl<V, F: Fn(&V) -> Event> ServiceListener<V> for RecorderListener<V, F> {
    fn process_add(&self, data: &V) -> Result<()> {
        self.recorder.record(&(self.to_event)(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::products;
    use crate::trades::Side;
    use tempfile::tempdir;

    #[test]
    fn records_events_as_json_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let recorder = Recorder::create(&path).unwrap();

        let trade_listener = recorder.listener(|t: &Trade| Event::Trade(t.clone()));
        let trade = Trade {
            product: products::query_product("91282CAV3").unwrap(),
            trade_id: "T1".to_string(),
            price: 100.0,
            book: "TRSY1".to_string(),
            quantity: 3_000_000,
            side: Side::Buy,
        };
        trade_listener.process_add(&trade).unwrap();
        recorder.flush().unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["Trade"]["trade_id"], "T1");
        assert_eq!(value["Trade"]["quantity"], 3_000_000);
    }
}
