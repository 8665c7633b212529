// ===============================
// src/soa.rs
// ===============================
//
// Service-oriented core: the Service / Connector / Listener contract every
// pipeline stage implements, plus the shared keyed store. The whole graph is
// single-threaded and synchronous; services live in Rc<RefCell<_>> and
// listener adapters hold non-owning handles to the next service downstream.
// Propagation is the call stack: one inbound record runs depth-first through
// every listener before the next record is read.
//
use std::fmt::Display;
use std::hash::Hash;
use std::io::BufRead;
use std::rc::Rc;

use ahash::AHashMap as HashMap;
use tracing::warn;

use crate::error::{PipelineError, Result};

/// Callback surface a service notifies on data events. Most stages only act
/// on `process_add`; the remove/update hooks default to no-ops.
pub trait ServiceListener<V> {
    fn process_add(&self, data: &V) -> Result<()>;

    fn process_remove(&self, _data: &V) -> Result<()> {
        Ok(())
    }

    fn process_update(&self, _data: &V) -> Result<()> {
        Ok(())
    }
}

pub type SharedListener<V> = Rc<dyn ServiceListener<V>>;

/// A keyed service in the dataflow graph. `on_message` is the connector
/// entry point; it mutates the store and fans out to registered listeners.
pub trait Service<K, V> {
    fn get_data(&self, key: &K) -> Result<&V>;
    fn on_message(&mut self, data: V) -> Result<()>;
    fn add_listener(&mut self, listener: SharedListener<V>);
    fn listeners(&self) -> &[SharedListener<V>];
}

/// Outbound side of a connector.
pub trait Connector<V> {
    fn publish(&self, data: &V) -> Result<()>;
}

/// Inbound side: parse a record stream and drive the owning service.
pub trait InboundConnector {
    fn subscribe(&self, input: &mut dyn BufRead) -> Result<()>;
}

/// Keyed store plus listener registry shared by all services.
pub struct ServiceCore<K, V> {
    store: HashMap<K, V>,
    listeners: Vec<SharedListener<V>>,
}

impl<K, V> Default for ServiceCore<K, V> {
    fn default() -> Self {
        Self {
            store: HashMap::new(),
            listeners: Vec::new(),
        }
    }
}

impl<K: Eq + Hash + Display, V> ServiceCore<K, V> {
    pub fn get(&self, key: &K) -> Result<&V> {
        self.store
            .get(key)
            .ok_or_else(|| PipelineError::NotFound(key.to_string()))
    }

    /// Insert-or-overwrite: the latest entity for a key wins.
    pub fn insert(&mut self, key: K, value: V) {
        self.store.insert(key, value);
    }

    pub fn get_or_insert_with(&mut self, key: K, default: impl FnOnce() -> V) -> &mut V {
        self.store.entry(key).or_insert_with(default)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.store.remove(key)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn add_listener(&mut self, listener: SharedListener<V>) {
        self.listeners.push(listener);
    }

    pub fn listeners(&self) -> &[SharedListener<V>] {
        &self.listeners
    }

    /// Fan an add event out to every listener in registration order.
    pub fn notify_add(&self, data: &V) -> Result<()> {
        for listener in &self.listeners {
            listener.process_add(data)?;
        }
        Ok(())
    }
}

/// Drive a line-oriented subscription: feed each non-empty record to the
/// handler, dropping (and logging) records that fail with a recoverable
/// error. Anything else aborts the subscription.
pub fn subscribe_lines<F>(input: &mut dyn BufRead, skip_header: bool, mut handle: F) -> Result<()>
where
    F: FnMut(&str) -> Result<()>,
{
    let mut lines = input.lines();
    if skip_header {
        lines.next().transpose()?;
    }
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Err(err) = handle(&line) {
            if err.is_recoverable() {
                warn!(error = %err, record = %line, "record dropped");
            } else {
                return Err(err);
            }
        }
    }
    Ok(())
}

/// Split a record into exactly `expected` comma-separated fields.
pub fn csv_fields(line: &str, expected: usize) -> Result<Vec<&str>> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != expected {
        return Err(PipelineError::MalformedInput(format!(
            "expected {expected} fields, got {} in {line:?}",
            fields.len()
        )));
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io::Cursor;

    struct Sink {
        seen: RefCell<Vec<String>>,
    }

    impl ServiceListener<String> for Sink {
        fn process_add(&self, data: &String) -> Result<()> {
            self.seen.borrow_mut().push(data.clone());
            Ok(())
        }
    }

    #[test]
    fn store_overwrites_on_reinsert() {
        let mut core: ServiceCore<String, i64> = ServiceCore::default();
        core.insert("A".into(), 1);
        core.insert("A".into(), 2);
        assert_eq!(core.len(), 1);
        assert_eq!(*core.get(&"A".to_string()).unwrap(), 2);
    }

    #[test]
    fn missing_key_is_not_found() {
        let core: ServiceCore<String, i64> = ServiceCore::default();
        assert!(matches!(
            core.get(&"A".to_string()),
            Err(PipelineError::NotFound(_))
        ));
    }

    #[test]
    fn notify_respects_registration_order() {
        let mut core: ServiceCore<String, String> = ServiceCore::default();
        let first = Rc::new(Sink {
            seen: RefCell::new(Vec::new()),
        });
        let second = Rc::new(Sink {
            seen: RefCell::new(Vec::new()),
        });
        core.add_listener(first.clone());
        core.add_listener(second.clone());
        core.notify_add(&"x".to_string()).unwrap();
        assert_eq!(first.seen.borrow().as_slice(), ["x"]);
        assert_eq!(second.seen.borrow().as_slice(), ["x"]);
    }

    #[test]
    fn subscribe_drops_bad_records_and_continues() {
        let mut input = Cursor::new("header\nok\nbad\nok2\n");
        let mut seen = Vec::new();
        subscribe_lines(&mut input, true, |line| {
            if line == "bad" {
                return Err(PipelineError::MalformedInput("bad".into()));
            }
            seen.push(line.to_string());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, ["ok", "ok2"]);
    }

    #[test]
    fn subscribe_aborts_on_fatal_error() {
        let mut input = Cursor::new("a\nb\n");
        let result = subscribe_lines(&mut input, false, |line| {
            if line == "b" {
                return Err(PipelineError::InvariantViolation("broken".into()));
            }
            Ok(())
        });
        assert!(matches!(result, Err(PipelineError::InvariantViolation(_))));
    }

    #[test]
    fn csv_field_count_is_enforced() {
        assert!(csv_fields("a,b,c", 3).is_ok());
        assert!(matches!(
            csv_fields("a,b", 3),
            Err(PipelineError::MalformedInput(_))
        ));
    }
}
