// ===============================
// src/pipeline.rs
// ===============================
//
// Builds every service, wires the listener graph and drives the four inbound
// connectors in order. Wiring order fixes notification order: within a
// service, listeners fire in the order registered here.
//
use std::cell::RefCell;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use tracing::info;

use crate::algo_execution::{
    AlgoExecutionListener, AlgoExecutionService, ExecutionOrder, SimpleAlgoOrderFactory,
};
use crate::algo_streaming::{AlgoStreamingListener, AlgoStreamingService, PriceStream};
use crate::error::Result;
use crate::execution::{ExecutionListener, ExecutionService};
use crate::gui::{GuiListener, GuiService};
use crate::historical::{HistoricalDataListener, HistoricalDataService};
use crate::inquiry::{Inquiry, InquiryConnector, InquiryService};
use crate::marketdata::{MarketDataConnector, MarketDataService};
use crate::positions::{Position, PositionListener, PositionService};
use crate::pricing::{PricingConnector, PricingService};
use crate::products::Bond;
use crate::recorder::{Event, Recorder};
use crate::risk::{RiskListener, RiskService, PV01};
use crate::soa::{InboundConnector, Service};
use crate::streaming::{StreamingListener, StreamingService};
use crate::trades::{TradeBookingConnector, TradeBookingListener, TradeBookingService};

pub struct TradingPipeline {
    pub pricing: Rc<RefCell<PricingService>>,
    pub algo_streaming: Rc<RefCell<AlgoStreamingService>>,
    pub streaming: Rc<RefCell<StreamingService>>,
    pub market_data: Rc<RefCell<MarketDataService>>,
    pub algo_execution: Rc<RefCell<AlgoExecutionService>>,
    pub execution: Rc<RefCell<ExecutionService>>,
    pub trade_booking: Rc<RefCell<TradeBookingService>>,
    pub positions: Rc<RefCell<PositionService>>,
    pub risk: Rc<RefCell<RiskService>>,
    pub inquiries: Rc<RefCell<InquiryService>>,
    pub gui: Rc<RefCell<GuiService>>,

    pub historical_positions: Rc<RefCell<HistoricalDataService<Position>>>,
    pub historical_risk: Rc<RefCell<HistoricalDataService<PV01<Bond>>>>,
    pub historical_executions: Rc<RefCell<HistoricalDataService<ExecutionOrder>>>,
    pub historical_streaming: Rc<RefCell<HistoricalDataService<PriceStream>>>,
    pub historical_inquiries: Rc<RefCell<HistoricalDataService<Inquiry>>>,

    recorder: Option<Rc<Recorder>>,

    pricing_connector: PricingConnector,
    market_data_connector: MarketDataConnector,
    trade_connector: TradeBookingConnector,
    inquiry_connector: InquiryConnector,
}

impl TradingPipeline {
    pub fn new(
        result_dir: &Path,
        gui_throttle: Duration,
        record_file: Option<&Path>,
    ) -> Result<Self> {
        let pricing = Rc::new(RefCell::new(PricingService::new()));
        let algo_streaming = Rc::new(RefCell::new(AlgoStreamingService::new()));
        let streaming = Rc::new(RefCell::new(StreamingService::new()));
        let market_data = Rc::new(RefCell::new(MarketDataService::new()));
        let algo_execution = Rc::new(RefCell::new(AlgoExecutionService::new(Box::new(
            SimpleAlgoOrderFactory,
        ))));
        let execution = Rc::new(RefCell::new(ExecutionService::new()));
        let trade_booking = Rc::new(RefCell::new(TradeBookingService::new()));
        let positions = Rc::new(RefCell::new(PositionService::new()));
        let risk = Rc::new(RefCell::new(RiskService::new()));
        let inquiries = Rc::new(RefCell::new(InquiryService::new()));
        let gui = Rc::new(RefCell::new(GuiService::new(
            result_dir.join("gui.txt"),
            gui_throttle,
        )?));

        let historical_positions = Rc::new(RefCell::new(HistoricalDataService::new(
            result_dir.join("positions.txt"),
        )?));
        let historical_risk = Rc::new(RefCell::new(HistoricalDataService::new(
            result_dir.join("risk.txt"),
        )?));
        let historical_executions = Rc::new(RefCell::new(HistoricalDataService::new(
            result_dir.join("executions.txt"),
        )?));
        let historical_streaming = Rc::new(RefCell::new(HistoricalDataService::new(
            result_dir.join("streaming.txt"),
        )?));
        let historical_inquiries = Rc::new(RefCell::new(HistoricalDataService::new(
            result_dir.join("allinquiries.txt"),
        )?));

        // core graph, upstream to downstream
        pricing
            .borrow_mut()
            .add_listener(Rc::new(AlgoStreamingListener::new(algo_streaming.clone())));
        pricing
            .borrow_mut()
            .add_listener(Rc::new(GuiListener::new(gui.clone())));
        algo_streaming
            .borrow_mut()
            .add_listener(Rc::new(StreamingListener::new(streaming.clone())));
        market_data
            .borrow_mut()
            .add_listener(Rc::new(AlgoExecutionListener::new(algo_execution.clone())));
        algo_execution
            .borrow_mut()
            .add_listener(Rc::new(ExecutionListener::new(execution.clone())));
        execution
            .borrow_mut()
            .add_listener(Rc::new(TradeBookingListener::new(trade_booking.clone())));
        trade_booking
            .borrow_mut()
            .add_listener(Rc::new(PositionListener::new(positions.clone())));
        positions
            .borrow_mut()
            .add_listener(Rc::new(RiskListener::new(risk.clone())));

        // persistence fan-out
        positions
            .borrow_mut()
            .add_listener(Rc::new(HistoricalDataListener::new(
                historical_positions.clone(),
            )));
        execution
            .borrow_mut()
            .add_listener(Rc::new(HistoricalDataListener::new(
                historical_executions.clone(),
            )));
        streaming
            .borrow_mut()
            .add_listener(Rc::new(HistoricalDataListener::new(
                historical_streaming.clone(),
            )));
        risk.borrow_mut()
            .add_listener(Rc::new(HistoricalDataListener::new(
                historical_risk.clone(),
            )));
        inquiries
            .borrow_mut()
            .add_listener(Rc::new(HistoricalDataListener::new(
                historical_inquiries.clone(),
            )));

        // optional JSONL trace across the graph
        let recorder = match record_file {
            Some(path) => {
                let recorder = Recorder::create(path)?;
                pricing
                    .borrow_mut()
                    .add_listener(recorder.listener(|p: &crate::pricing::Price| {
                        Event::Price(p.clone())
                    }));
                streaming
                    .borrow_mut()
                    .add_listener(recorder.listener(|s: &PriceStream| Event::Stream(s.clone())));
                execution
                    .borrow_mut()
                    .add_listener(
                        recorder.listener(|o: &ExecutionOrder| Event::Execution(o.clone())),
                    );
                trade_booking
                    .borrow_mut()
                    .add_listener(recorder.listener(|t: &crate::trades::Trade| {
                        Event::Trade(t.clone())
                    }));
                positions
                    .borrow_mut()
                    .add_listener(recorder.listener(|p: &Position| Event::Position(p.clone())));
                risk.borrow_mut()
                    .add_listener(recorder.listener(|r: &PV01<Bond>| Event::Risk(r.clone())));
                inquiries
                    .borrow_mut()
                    .add_listener(recorder.listener(|i: &Inquiry| Event::Inquiry(i.clone())));
                Some(recorder)
            }
            None => None,
        };

        let pricing_connector = PricingConnector::new(pricing.clone());
        let market_data_connector = MarketDataConnector::new(market_data.clone());
        let trade_connector = TradeBookingConnector::new(trade_booking.clone());
        let inquiry_connector = InquiryConnector::new(inquiries.clone());

        Ok(Self {
            pricing,
            algo_streaming,
            streaming,
            market_data,
            algo_execution,
            execution,
            trade_booking,
            positions,
            risk,
            inquiries,
            gui,
            historical_positions,
            historical_risk,
            historical_executions,
            historical_streaming,
            historical_inquiries,
            recorder,
            pricing_connector,
            market_data_connector,
            trade_connector,
            inquiry_connector,
        })
    }

    pub fn subscribe_prices(&self, input: &mut dyn BufRead) -> Result<()> {
        self.pricing_connector.subscribe(input)
    }

    pub fn subscribe_market_data(&self, input: &mut dyn BufRead) -> Result<()> {
        self.market_data_connector.subscribe(input)
    }

    pub fn subscribe_trades(&self, input: &mut dyn BufRead) -> Result<()> {
        self.trade_connector.subscribe(input)
    }

    pub fn subscribe_inquiries(&self, input: &mut dyn BufRead) -> Result<()> {
        self.inquiry_connector.subscribe(input)
    }

    /// Drive the four input files through the graph, in pipeline order.
    pub fn run(
        &self,
        price_path: &Path,
        marketdata_path: &Path,
        trade_path: &Path,
        inquiry_path: &Path,
    ) -> Result<()> {
        info!("processing price data");
        self.subscribe_prices(&mut BufReader::new(File::open(price_path)?))?;

        info!("processing market data");
        self.subscribe_market_data(&mut BufReader::new(File::open(marketdata_path)?))?;

        info!("processing trade data");
        self.subscribe_trades(&mut BufReader::new(File::open(trade_path)?))?;

        info!("processing inquiry data");
        self.subscribe_inquiries(&mut BufReader::new(File::open(inquiry_path)?))?;

        if let Some(recorder) = &self.recorder {
            recorder.flush()?;
        }
        Ok(())
    }
}
