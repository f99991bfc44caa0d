//! Recorders: append-only audit sinks for bars, orders, fills, and equity.

use crate::domain::{Bar, EquityPoint, Fill, Order};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata captured at run start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: String,
    pub strategy: String,
    pub params: Value,
    pub universe: Vec<String>,
    pub initial_cash: f64,
}

/// Final portfolio state captured at run end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalState {
    pub equity: f64,
    pub cash: f64,
    pub total_pnl: f64,
    pub trades: usize,
}

/// Generic timestamped event in the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub ts: DateTime<Utc>,
    pub data: Value,
}

/// Counts and wall-clock bounds of a recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderSummary {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    /// `None` when bar recording was disabled.
    pub bars_recorded: Option<usize>,
    pub orders_submitted: usize,
    pub fills_executed: usize,
    pub equity_snapshots: usize,
    pub events_logged: usize,
    pub metadata: RunMeta,
}

/// Complete exported audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditTrail {
    pub summary: RecorderSummary,
    pub orders: Vec<Order>,
    pub fills: Vec<Fill>,
    pub equity_curve: Vec<EquityPoint>,
    pub events: Vec<EventRecord>,
}

/// Observes every event of a run. All hooks are append-only.
pub trait Recorder: Send {
    fn on_start(&mut self, meta: &RunMeta);

    /// No-op unless bar recording is enabled.
    fn on_bar(&mut self, _bar: &Bar) {}

    fn on_order(&mut self, order: &Order);

    fn on_fill(&mut self, fill: &Fill);

    fn on_equity_update(&mut self, _point: &EquityPoint) {}

    fn on_end(&mut self, final_state: &FinalState);

    fn summary(&self) -> RecorderSummary;
}

fn duration_between(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Option<f64> {
    match (start, end) {
        (Some(s), Some(e)) => Some((e - s).num_milliseconds() as f64 / 1_000.0),
        _ => None,
    }
}

/// Full in-memory audit trail.
///
/// Bar recording is opt-in; a long feed recorded bar-by-bar dominates
/// memory, so the default keeps only orders, fills, equity, and events.
pub struct EventRecorder {
    record_bars: bool,
    bars: Vec<Bar>,
    orders: Vec<Order>,
    fills: Vec<Fill>,
    equity_points: Vec<EquityPoint>,
    events: Vec<EventRecord>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    metadata: RunMeta,
}

impl EventRecorder {
    pub fn new(record_bars: bool) -> Self {
        Self {
            record_bars,
            bars: Vec::new(),
            orders: Vec::new(),
            fills: Vec::new(),
            equity_points: Vec::new(),
            events: Vec::new(),
            start_time: None,
            end_time: None,
            metadata: RunMeta::default(),
        }
    }

    fn record_event(&mut self, kind: &str, data: Value) {
        self.events.push(EventRecord {
            kind: kind.to_string(),
            ts: Utc::now(),
            data,
        });
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn equity_points(&self) -> &[EquityPoint] {
        &self.equity_points
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// Export the whole recording.
    pub fn export(&self) -> AuditTrail {
        AuditTrail {
            summary: self.summary(),
            orders: self.orders.clone(),
            fills: self.fills.clone(),
            equity_curve: self.equity_points.clone(),
            events: self.events.clone(),
        }
    }
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Recorder for EventRecorder {
    fn on_start(&mut self, meta: &RunMeta) {
        self.start_time = Some(Utc::now());
        self.metadata = meta.clone();
        let data = serde_json::to_value(meta).unwrap_or(Value::Null);
        self.record_event("backtest_start", data);
    }

    fn on_bar(&mut self, bar: &Bar) {
        if self.record_bars {
            self.bars.push(bar.clone());
        }
    }

    fn on_order(&mut self, order: &Order) {
        self.orders.push(order.clone());
        let data = serde_json::to_value(order).unwrap_or(Value::Null);
        self.record_event("order_submitted", data);
    }

    fn on_fill(&mut self, fill: &Fill) {
        self.fills.push(fill.clone());
        let data = serde_json::to_value(fill).unwrap_or(Value::Null);
        self.record_event("order_filled", data);
    }

    fn on_equity_update(&mut self, point: &EquityPoint) {
        self.equity_points.push(point.clone());
    }

    fn on_end(&mut self, final_state: &FinalState) {
        self.end_time = Some(Utc::now());
        let data = serde_json::to_value(final_state).unwrap_or(Value::Null);
        self.record_event("backtest_end", data);
    }

    fn summary(&self) -> RecorderSummary {
        RecorderSummary {
            start_time: self.start_time,
            end_time: self.end_time,
            duration_seconds: duration_between(self.start_time, self.end_time),
            bars_recorded: self.record_bars.then_some(self.bars.len()),
            orders_submitted: self.orders.len(),
            fills_executed: self.fills.len(),
            equity_snapshots: self.equity_points.len(),
            events_logged: self.events.len(),
            metadata: self.metadata.clone(),
        }
    }
}

/// External sink receiving one serialized record per call, keyed by kind.
pub trait RecordSink: Send {
    fn write(&mut self, kind: &str, record: &Value);
}

/// Recorder that forwards every order/fill/equity record to a sink while
/// keeping the full in-memory trail.
pub struct StreamingRecorder {
    inner: EventRecorder,
    sink: Box<dyn RecordSink>,
}

impl StreamingRecorder {
    pub fn new(sink: Box<dyn RecordSink>, record_bars: bool) -> Self {
        Self {
            inner: EventRecorder::new(record_bars),
            sink,
        }
    }

    pub fn export(&self) -> AuditTrail {
        self.inner.export()
    }
}

impl Recorder for StreamingRecorder {
    fn on_start(&mut self, meta: &RunMeta) {
        self.inner.on_start(meta);
    }

    fn on_bar(&mut self, bar: &Bar) {
        self.inner.on_bar(bar);
    }

    fn on_order(&mut self, order: &Order) {
        self.inner.on_order(order);
        let record = serde_json::to_value(order).unwrap_or(Value::Null);
        self.sink.write("orders", &record);
    }

    fn on_fill(&mut self, fill: &Fill) {
        self.inner.on_fill(fill);
        let record = serde_json::to_value(fill).unwrap_or(Value::Null);
        self.sink.write("fills", &record);
    }

    fn on_equity_update(&mut self, point: &EquityPoint) {
        self.inner.on_equity_update(point);
        let record = serde_json::to_value(point).unwrap_or(Value::Null);
        self.sink.write("equity", &record);
    }

    fn on_end(&mut self, final_state: &FinalState) {
        self.inner.on_end(final_state);
    }

    fn summary(&self) -> RecorderSummary {
        self.inner.summary()
    }
}

/// Counters only; for runs where the final numbers are all that matters.
#[derive(Debug, Default)]
pub struct MinimalRecorder {
    orders_count: usize,
    fills_count: usize,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    metadata: RunMeta,
}

impl MinimalRecorder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Recorder for MinimalRecorder {
    fn on_start(&mut self, meta: &RunMeta) {
        self.start_time = Some(Utc::now());
        self.metadata = meta.clone();
    }

    fn on_order(&mut self, _order: &Order) {
        self.orders_count += 1;
    }

    fn on_fill(&mut self, _fill: &Fill) {
        self.fills_count += 1;
    }

    fn on_end(&mut self, _final_state: &FinalState) {
        self.end_time = Some(Utc::now());
    }

    fn summary(&self) -> RecorderSummary {
        RecorderSummary {
            start_time: self.start_time,
            end_time: self.end_time,
            duration_seconds: duration_between(self.start_time, self.end_time),
            bars_recorded: None,
            orders_submitted: self.orders_count,
            fills_executed: self.fills_count,
            equity_snapshots: 0,
            events_logged: 0,
            metadata: self.metadata.clone(),
        }
    }
}
