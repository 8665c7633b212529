// ===============================
// src/execution.rs
// ===============================
//
// Execution stage: books every algo execution order by order id, feeds the
// trade-booking and persistence listeners, then publishes the order with its
// market tag on the console connector.
//
use std::cell::RefCell;
use std::rc::Rc;

use tracing::info;

use crate::algo_execution::{AlgoExecution, ExecutionOrder, Market};
use crate::error::Result;
use crate::fractional;
use crate::soa::{Service, ServiceCore, ServiceListener, SharedListener};

/// Outbound console connector: renders an order against its target market.
#[derive(Default)]
pub struct ExecutionServiceConnector;

impl ExecutionServiceConnector {
    pub fn publish(&self, order: &ExecutionOrder, market: Market) -> Result<()> {
        info!(
            product = %order.product.cusip,
            order_id = %order.order_id,
            market = %market,
            side = %order.side,
            order_type = %order.order_type,
            price = %fractional::encode(order.price),
            visible = order.visible_quantity,
            hidden = order.hidden_quantity,
            child = order.is_child_order,
            "execution order"
        );
        Ok(())
    }
}

#[derive(Default)]
pub struct ExecutionService {
    core: ServiceCore<String, ExecutionOrder>,
    connector: ExecutionServiceConnector,
}

impl ExecutionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the wrapped order by order id and notify listeners.
    pub fn add_execution_order(&mut self, algo_execution: &AlgoExecution) -> Result<()> {
        let order = algo_execution.execution_order.clone();
        self.core.insert(order.order_id.clone(), order.clone());
        self.core.notify_add(&order)
    }

    pub fn execute_order(&self, order: &ExecutionOrder, market: Market) -> Result<()> {
        self.connector.publish(order, market)
    }
}

impl Service<String, ExecutionOrder> for ExecutionService {
    fn get_data(&self, key: &String) -> Result<&ExecutionOrder> {
        self.core.get(key)
    }

    fn on_message(&mut self, data: ExecutionOrder) -> Result<()> {
        self.core.insert(data.order_id.clone(), data.clone());
        self.core.notify_add(&data)
    }

    fn add_listener(&mut self, listener: SharedListener<ExecutionOrder>) {
        self.core.add_listener(listener);
    }

    fn listeners(&self) -> &[SharedListener<ExecutionOrder>] {
        self.core.listeners()
    }
}

/// Adapter: AlgoExecutionService events into the execution service.
pub struct ExecutionListener {
    service: Rc<RefCell<ExecutionService>>,
}

impl ExecutionListener {
    pub fn new(service: Rc<RefCell<ExecutionService>>) -> Self {
        Self { service }
    }
}

impl ServiceListener<AlgoExecution> for ExecutionListener {
    fn process_add(&self, data: &AlgoExecution) -> Result<()> {
        let mut service = self.service.borrow_mut();
        service.add_execution_order(data)?;
        service.execute_order(&data.execution_order, data.market)
    }
}
