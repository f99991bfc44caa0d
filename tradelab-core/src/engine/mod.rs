//! Backtest engine: execution, brokers, accounting, clocks, recorders, simulator.

pub mod accounting;
pub mod broker;
pub mod clock;
pub mod execution;
pub mod recorder;
pub mod simulator;

pub use accounting::PortfolioManager;
pub use broker::{Broker, PaperBroker, SimulatedBroker};
pub use clock::{Clock, HistoricalClock, MultiSymbolClock, ScheduledClock};
pub use execution::{
    ExecutionError, ExecutionModel, FeeModel, FixedBpsSlippage, NoFees, NoSlippage,
    PercentageFee, RealisticExecution, SlippageModel, StandardExecution, TieredFee,
    VolumeBasedSlippage,
};
pub use recorder::{
    AuditTrail, EventRecorder, FinalState, MinimalRecorder, RecordSink, Recorder,
    RecorderSummary, RunMeta, StreamingRecorder,
};
pub use simulator::{EngineError, RunOutcome, RunStatus, Simulator, StopHandle};
