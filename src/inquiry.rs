// ===============================
// src/inquiry.rs
// ===============================
//
// Inquiry stage: a self-driving quote machine. Freshly received inquiries
// are quoted back through the connector and re-enter `on_message` (bounded
// recursion, depth 2), finish as DONE, are notified once and then evicted.
// Rejected flavours stay in the store.
//
use std::cell::RefCell;
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
use crate::trades::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InquiryState {
    Received,
    Quoted,
    Done,
    Rejected,
    CustomerRejected,
}

impl InquiryState {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "RECEIVED" => Ok(InquiryState::Received),
            "QUOTED" => Ok(InquiryState::Quoted),
            "DONE" => Ok(InquiryState::Done),
            "REJECTED" => Ok(InquiryState::Rejected),
            "CUSTOMER_REJECTED" => Ok(InquiryState::CustomerRejected),
            other => Err(PipelineError::MalformedInput(format!(
                "bad inquiry state {other:?}"
            ))),
        }
    }
}

impl fmt::Display for InquiryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InquiryState::Received => "RECEIVED",
            InquiryState::Quoted => "QUOTED",
            InquiryState::Done => "DONE",
            InquiryState::Rejected => "REJECTED",
            InquiryState::CustomerRejected => "CUSTOMER_REJECTED",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inquiry {
    pub inquiry_id: String,
    pub product: Bond,
    pub side: Side,
    pub quantity: i64,
    pub price: f64,
    pub state: InquiryState,
}

#[derive(Default)]
pub struct InquiryService {
    core: ServiceCore<String, Inquiry>,
}

impl InquiryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quote an inquiry at a price and re-run the state machine.
    pub fn send_quote(&mut self, inquiry_id: &str, price: f64) -> Result<()> {
        let mut inquiry = self.core.get(&inquiry_id.to_string())?.clone();
        inquiry.price = price;
        inquiry.state = InquiryState::Quoted;
        self.on_message(inquiry)
    }

    /// Reject an inquiry and re-run the state machine.
    pub fn reject_inquiry(&mut self, inquiry_id: &str) -> Result<()> {
        let mut inquiry = self.core.get(&inquiry_id.to_string())?.clone();
        inquiry.state = InquiryState::Rejected;
        self.on_message(inquiry)
    }
}

impl Service<String, Inquiry> for InquiryService {
    fn get_data(&self, key: &String) -> Result<&Inquiry> {
        self.core.get(key)
    }

    fn on_message(&mut self, mut data: Inquiry) -> Result<()> {
        match data.state {
            // fresh inquiry: the connector answers with a quote, which
            // re-enters here in the QUOTED state
            InquiryState::Received => InquiryConnector::publish_back(self, data),
            InquiryState::Quoted => {
                data.state = InquiryState::Done;
                self.core.insert(data.inquiry_id.clone(), data.clone());
                self.core.notify_add(&data)?;
                self.core.remove(&data.inquiry_id);
                Ok(())
            }
            // terminal rejections stay in the store
            _ => {
                self.core.insert(data.inquiry_id.clone(), data.clone());
                self.core.notify_add(&data)
            }
        }
    }

    fn add_listener(&mut self, listener: SharedListener<Inquiry>) {
        self.core.add_listener(listener);
    }

    fn listeners(&self) -> &[SharedListener<Inquiry>] {
        self.core.listeners()
    }
}

/// Connector for the inquiry service. The inbound leg parses the inquiries
/// file; the outbound leg is the quote-back loop, an associated function so
/// the service can invoke it mid-`on_message` without aliasing itself.
pub struct InquiryConnector {
    service: Rc<RefCell<InquiryService>>,
}

impl InquiryConnector {
    pub fn new(service: Rc<RefCell<InquiryService>>) -> Self {
        Self { service }
    }

    /// Outbound leg: answer a fresh inquiry with a quote and feed the
    /// mutated inquiry straight back into the service. Takes the service
    /// directly so the quote loop works mid-`on_message`.
    pub fn publish_back(service: &mut InquiryService, mut data: Inquiry) -> Result<()> {
        if data.state == InquiryState::Received {
            data.state = InquiryState::Quoted;
            service.on_message(data)?;
        }
        Ok(())
    }

    fn parse(line: &str) -> Result<Inquiry> {
        let fields = csv_fields(line, 6)?;
        let product = products::query_product(fields[1])?;
        let quantity: i64 = fields[3]
            .parse()
            .map_err(|_| PipelineError::MalformedInput(format!("bad quantity {:?}", fields[3])))?;
        Ok(Inquiry {
            inquiry_id: fields[0].to_string(),
            product,
            side: Side::parse(fields[2])?,
            quantity,
            price: fractional::decode(fields[4])?,
            state: InquiryState::parse(fields[5])?,
        })
    }
}

impl Connector<Inquiry> for InquiryConnector {
    fn publish(&self, data: &Inquiry) -> Result<()> {
        InquiryConnector::publish_back(&mut self.service.borrow_mut(), data.clone())
    }
}

impl InboundConnector for InquiryConnector {
    fn subscribe(&self, input: &mut dyn BufRead) -> Result<()> {
        subscribe_lines(input, false, |line| {
            let inquiry = Self::parse(line)?;
            self.service.borrow_mut().on_message(inquiry)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soa::ServiceListener;
    use std::io::Cursor;

    struct StateTrace {
        states: RefCell<Vec<InquiryState>>,
    }

    impl ServiceListener<Inquiry> for StateTrace {
        fn process_add(&self, data: &Inquiry) -> Result<()> {
            self.states.borrow_mut().push(data.state);
            Ok(())
        }
    }

    fn traced_service() -> (Rc<RefCell<InquiryService>>, Rc<StateTrace>) {
        let service = Rc::new(RefCell::new(InquiryService::new()));
        let trace = Rc::new(StateTrace {
            states: RefCell::new(Vec::new()),
        });
        service.borrow_mut().add_listener(trace.clone());
        (service, trace)
    }

    #[test]
    fn received_inquiry_runs_to_done_and_is_evicted() {
        let (service, trace) = traced_service();
        let connector = InquiryConnector::new(service.clone());
        connector
            .subscribe(&mut Cursor::new(
                "INQ1,91282CAV3,BUY,1000000,100-000,RECEIVED\n",
            ))
            .unwrap();

        // emitted exactly once, in state DONE, then gone from the store
        assert_eq!(trace.states.borrow().as_slice(), [InquiryState::Done]);
        assert!(service
            .borrow()
            .get_data(&"INQ1".to_string())
            .is_err());
    }

    #[test]
    fn rejected_inquiries_remain_stored() {
        let (service, trace) = traced_service();
        let inquiry = Inquiry {
            inquiry_id: "INQ2".to_string(),
            product: products::query_product("91282CAV3").unwrap(),
            side: Side::Sell,
            quantity: 2_000_000,
            price: 100.0,
            state: InquiryState::Rejected,
        };
        service.borrow_mut().on_message(inquiry).unwrap();

        assert_eq!(trace.states.borrow().as_slice(), [InquiryState::Rejected]);
        assert_eq!(
            service
                .borrow()
                .get_data(&"INQ2".to_string())
                .unwrap()
                .state,
            InquiryState::Rejected
        );
    }

    #[test]
    fn send_quote_sets_price_and_finishes_the_inquiry() {
        let (service, trace) = traced_service();
        let inquiry = Inquiry {
            inquiry_id: "INQ3".to_string(),
            product: products::query_product("91282CBL4").unwrap(),
            side: Side::Buy,
            quantity: 1_000_000,
            price: 0.0,
            state: InquiryState::CustomerRejected,
        };
        service.borrow_mut().on_message(inquiry).unwrap();
        service.borrow_mut().send_quote("INQ3", 99.5).unwrap();

        let states = trace.states.borrow();
        assert_eq!(
            states.as_slice(),
            [InquiryState::CustomerRejected, InquiryState::Done]
        );
        // finished quote is evicted like any other DONE inquiry
        assert!(service.borrow().get_data(&"INQ3".to_string()).is_err());
    }

    #[test]
    fn unknown_state_is_malformed() {
        assert!(matches!(
            InquiryState::parse("PENDING"),
            Err(PipelineError::MalformedInput(_))
        ));
    }
}
