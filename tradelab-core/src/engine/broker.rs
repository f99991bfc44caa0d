//! Brokers: order admission, pending queues, and per-bar matching.

use crate::domain::{Bar, Fill, Order, OrderId, OrderStatus, OrderType};
use crate::engine::execution::ExecutionModel;
use std::collections::HashMap;
use tracing::warn;

/// Broker interface between strategies and the (simulated) market.
pub trait Broker: Send {
    /// Submit an order. Returns false on rejection (duplicate id, invalid
    /// parameters); accepted orders are recorded as pending.
    fn submit(&mut self, order: Order) -> bool;

    /// Match pending orders against a new bar. Returns the fills produced,
    /// in pending-queue (insertion) order.
    fn process_bar(&mut self, bar: &Bar) -> Vec<Fill>;

    /// Look up any order ever accepted or rejected, by id.
    fn order(&self, id: OrderId) -> Option<&Order>;

    /// Pending orders, optionally filtered by symbol, in insertion order.
    fn pending_orders(&self, symbol: Option<&str>) -> Vec<&Order>;

    /// Cancel a pending order. False when unknown or no longer pending.
    fn cancel(&mut self, id: OrderId) -> bool;

    /// Every fill executed so far.
    fn fills(&self) -> &[Fill];
}

fn admissible(order: &Order) -> bool {
    if !(order.qty > 0.0) {
        return false;
    }
    if order.order_type == OrderType::Limit && order.limit_price.is_none() {
        return false;
    }
    match order.limit_price {
        Some(price) => price > 0.0,
        None => true,
    }
}

/// Zero-latency broker for backtesting.
///
/// Orders rest in a pending queue and are matched against each subsequent
/// bar of their symbol; the queue preserves submission order so matching is
/// deterministic.
pub struct SimulatedBroker {
    execution: Box<dyn ExecutionModel>,
    orders: HashMap<OrderId, Order>,
    pending: Vec<OrderId>,
    fills: Vec<Fill>,
}

impl SimulatedBroker {
    pub fn new(execution: Box<dyn ExecutionModel>) -> Self {
        Self {
            execution,
            orders: HashMap::new(),
            pending: Vec::new(),
            fills: Vec::new(),
        }
    }
}

impl Broker for SimulatedBroker {
    fn submit(&mut self, mut order: Order) -> bool {
        if self.orders.contains_key(&order.id) {
            warn!(order_id = %order.id, "duplicate order id rejected");
            return false;
        }
        if !admissible(&order) {
            order.status = OrderStatus::Rejected;
            warn!(order_id = %order.id, symbol = %order.symbol, "order rejected at admission");
            self.orders.insert(order.id, order);
            return false;
        }
        order.status = OrderStatus::Pending;
        self.pending.push(order.id);
        self.orders.insert(order.id, order);
        true
    }

    fn process_bar(&mut self, bar: &Bar) -> Vec<Fill> {
        let mut produced = Vec::new();
        let mut still_pending = Vec::with_capacity(self.pending.len());

        for id in std::mem::take(&mut self.pending) {
            let Some(order) = self.orders.get_mut(&id) else {
                continue;
            };
            if order.symbol != bar.symbol {
                still_pending.push(id);
                continue;
            }
            match self.execution.execute(bar, order) {
                Some(fill) => {
                    order.status = if fill.qty < order.qty {
                        OrderStatus::Partial
                    } else {
                        OrderStatus::Filled
                    };
                    self.fills.push(fill.clone());
                    produced.push(fill);
                }
                None => still_pending.push(id),
            }
        }

        self.pending = still_pending;
        produced
    }

    fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    fn pending_orders(&self, symbol: Option<&str>) -> Vec<&Order> {
        self.pending
            .iter()
            .filter_map(|id| self.orders.get(id))
            .filter(|order| symbol.map_or(true, |s| order.symbol == s))
            .collect()
    }

    fn cancel(&mut self, id: OrderId) -> bool {
        let Some(index) = self.pending.iter().position(|&p| p == id) else {
            return false;
        };
        self.pending.remove(index);
        if let Some(order) = self.orders.get_mut(&id) {
            order.status = OrderStatus::Cancelled;
        }
        true
    }

    fn fills(&self) -> &[Fill] {
        &self.fills
    }
}

/// Broker with a fixed bar delay before orders become eligible to match.
///
/// The delay counter decrements once per processed bar of the order's
/// symbol; matching is attempted once it reaches zero.
pub struct PaperBroker {
    execution: Box<dyn ExecutionModel>,
    delay_bars: u32,
    orders: HashMap<OrderId, Order>,
    pending: Vec<(OrderId, u32)>,
    fills: Vec<Fill>,
}

impl PaperBroker {
    pub fn new(execution: Box<dyn ExecutionModel>, delay_bars: u32) -> Self {
        Self {
            execution,
            delay_bars,
            orders: HashMap::new(),
            pending: Vec::new(),
            fills: Vec::new(),
        }
    }
}

impl Broker for PaperBroker {
    fn submit(&mut self, mut order: Order) -> bool {
        if self.orders.contains_key(&order.id) {
            warn!(order_id = %order.id, "duplicate order id rejected");
            return false;
        }
        if !admissible(&order) {
            order.status = OrderStatus::Rejected;
            warn!(order_id = %order.id, symbol = %order.symbol, "order rejected at admission");
            self.orders.insert(order.id, order);
            return false;
        }
        order.status = OrderStatus::Pending;
        self.pending.push((order.id, self.delay_bars));
        self.orders.insert(order.id, order);
        true
    }

    fn process_bar(&mut self, bar: &Bar) -> Vec<Fill> {
        let mut produced = Vec::new();
        let mut still_pending = Vec::with_capacity(self.pending.len());

        for (id, mut remaining) in std::mem::take(&mut self.pending) {
            let Some(order) = self.orders.get_mut(&id) else {
                continue;
            };
            if order.symbol != bar.symbol {
                still_pending.push((id, remaining));
                continue;
            }
            remaining = remaining.saturating_sub(1);
            if remaining > 0 {
                still_pending.push((id, remaining));
                continue;
            }
            match self.execution.execute(bar, order) {
                Some(fill) => {
                    order.status = if fill.qty < order.qty {
                        OrderStatus::Partial
                    } else {
                        OrderStatus::Filled
                    };
                    self.fills.push(fill.clone());
                    produced.push(fill);
                }
                None => still_pending.push((id, 0)),
            }
        }

        self.pending = still_pending;
        produced
    }

    fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    fn pending_orders(&self, symbol: Option<&str>) -> Vec<&Order> {
        self.pending
            .iter()
            .filter_map(|(id, _)| self.orders.get(id))
            .filter(|order| symbol.map_or(true, |s| order.symbol == s))
            .collect()
    }

    fn cancel(&mut self, id: OrderId) -> bool {
        let Some(index) = self.pending.iter().position(|&(p, _)| p == id) else {
            return false;
        };
        self.pending.remove(index);
        if let Some(order) = self.orders.get_mut(&id) {
            order.status = OrderStatus::Cancelled;
        }
        true
    }

    fn fills(&self) -> &[Fill] {
        &self.fills
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use crate::engine::execution::StandardExecution;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn bar(day: u32, close: f64) -> Bar {
        Bar::new(ts(day), "BTCUSDT", close, close + 1.0, close - 1.0, close, 1_000.0).unwrap()
    }

    fn broker() -> SimulatedBroker {
        SimulatedBroker::new(Box::new(StandardExecution::frictionless()))
    }

    fn market(id: u64, qty: f64) -> Order {
        Order::market(OrderId(id), ts(1), "BTCUSDT", Side::Buy, qty).unwrap()
    }

    #[test]
    fn submit_then_fill_on_next_bar() {
        let mut broker = broker();
        assert!(broker.submit(market(1, 2.0)));
        assert_eq!(broker.pending_orders(None).len(), 1);

        let fills = broker.process_bar(&bar(2, 100.0));
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].price, 100.0);
        assert_eq!(broker.order(OrderId(1)).unwrap().status, OrderStatus::Filled);
        assert!(broker.pending_orders(None).is_empty());
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut broker = broker();
        assert!(broker.submit(market(1, 1.0)));
        assert!(!broker.submit(market(1, 2.0)));
        assert_eq!(broker.pending_orders(None).len(), 1);
    }

    #[test]
    fn inadmissible_order_marked_rejected() {
        let mut broker = broker();
        // Bypass the validated constructor to model a corrupt order.
        let mut order = market(1, 1.0);
        order.qty = 0.0;
        assert!(!broker.submit(order));
        assert_eq!(broker.order(OrderId(1)).unwrap().status, OrderStatus::Rejected);
        assert!(broker.pending_orders(None).is_empty());
    }

    #[test]
    fn unmatched_symbol_stays_pending() {
        let mut broker = broker();
        broker.submit(market(1, 1.0));
        let other = Bar::new(ts(2), "ETHUSDT", 10.0, 11.0, 9.0, 10.0, 1.0).unwrap();
        assert!(broker.process_bar(&other).is_empty());
        assert_eq!(broker.pending_orders(Some("BTCUSDT")).len(), 1);
        assert!(broker.pending_orders(Some("ETHUSDT")).is_empty());
    }

    #[test]
    fn unreached_limit_stays_pending() {
        let mut broker = broker();
        let order =
            Order::limit(OrderId(1), ts(1), "BTCUSDT", Side::Buy, 1.0, 90.0).unwrap();
        broker.submit(order);
        assert!(broker.process_bar(&bar(2, 100.0)).is_empty());
        assert_eq!(broker.pending_orders(None).len(), 1);

        // Third bar dips to the limit.
        let dip = Bar::new(ts(3), "BTCUSDT", 95.0, 96.0, 90.0, 92.0, 1_000.0).unwrap();
        let fills = broker.process_bar(&dip);
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].price, 90.0);
    }

    #[test]
    fn matching_follows_insertion_order() {
        let mut broker = broker();
        broker.submit(market(1, 1.0));
        broker.submit(market(2, 1.0));
        broker.submit(market(3, 1.0));
        let fills = broker.process_bar(&bar(2, 100.0));
        let ids: Vec<u64> = fills.iter().map(|f| f.order_id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut broker = broker();
        broker.submit(market(1, 1.0));
        assert!(broker.cancel(OrderId(1)));
        assert_eq!(broker.order(OrderId(1)).unwrap().status, OrderStatus::Cancelled);
        assert!(!broker.cancel(OrderId(1)));
        assert!(broker.process_bar(&bar(2, 100.0)).is_empty());
    }

    #[test]
    fn cancel_unknown_order_fails() {
        let mut broker = broker();
        assert!(!broker.cancel(OrderId(99)));
    }

    #[test]
    fn fills_history_accumulates() {
        let mut broker = broker();
        broker.submit(market(1, 1.0));
        broker.process_bar(&bar(2, 100.0));
        broker.submit(market(2, 1.0));
        broker.process_bar(&bar(3, 101.0));
        assert_eq!(broker.fills().len(), 2);
    }

    // ── Paper broker ──

    #[test]
    fn paper_broker_delays_by_bars() {
        let mut broker = PaperBroker::new(Box::new(StandardExecution::frictionless()), 2);
        broker.submit(market(1, 1.0));

        assert!(broker.process_bar(&bar(2, 100.0)).is_empty());
        let fills = broker.process_bar(&bar(3, 101.0));
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].price, 101.0);
    }

    #[test]
    fn paper_broker_ignores_other_symbols_for_delay() {
        let mut broker = PaperBroker::new(Box::new(StandardExecution::frictionless()), 1);
        broker.submit(market(1, 1.0));
        let other = Bar::new(ts(2), "ETHUSDT", 10.0, 11.0, 9.0, 10.0, 1.0).unwrap();
        assert!(broker.process_bar(&other).is_empty());
        // Delay only counts down on matching symbols.
        let fills = broker.process_bar(&bar(3, 100.0));
        assert_eq!(fills.len(), 1);
    }

    #[test]
    fn paper_broker_zero_delay_fills_immediately() {
        let mut broker = PaperBroker::new(Box::new(StandardExecution::frictionless()), 0);
        broker.submit(market(1, 1.0));
        assert_eq!(broker.process_bar(&bar(2, 100.0)).len(), 1);
    }

    #[test]
    fn paper_broker_retries_unfillable_orders() {
        let mut broker = PaperBroker::new(Box::new(StandardExecution::frictionless()), 1);
        let order = Order::limit(OrderId(1), ts(1), "BTCUSDT", Side::Buy, 1.0, 90.0).unwrap();
        broker.submit(order);
        assert!(broker.process_bar(&bar(2, 100.0)).is_empty());
        let dip = Bar::new(ts(3), "BTCUSDT", 95.0, 96.0, 90.0, 92.0, 1_000.0).unwrap();
        assert_eq!(broker.process_bar(&dip).len(), 1);
    }
}
