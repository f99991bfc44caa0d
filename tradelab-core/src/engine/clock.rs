//! Clocks: produce bars in strict chronological order.

use crate::domain::{Bar, DomainError, Symbol};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

/// Drives a backtest forward one bar at a time.
pub trait Clock: Send {
    /// Next bar, or `None` when the feed is exhausted.
    fn tick(&mut self) -> Option<Bar>;

    /// Rewind to the initial state.
    fn reset(&mut self);
}

/// Replays a prebuilt chronological bar sequence.
pub struct HistoricalClock {
    bars: Vec<Bar>,
    cursor: usize,
}

impl HistoricalClock {
    pub fn new(bars: Vec<Bar>) -> Self {
        Self { bars, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

impl Clock for HistoricalClock {
    fn tick(&mut self) -> Option<Bar> {
        let bar = self.bars.get(self.cursor).cloned();
        if bar.is_some() {
            self.cursor += 1;
        }
        bar
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }
}

/// Callback generating a bar for a scheduled instant.
pub type BarGenerator = Box<dyn Fn(DateTime<Utc>) -> Bar + Send>;

/// Generates bars on a fixed interval over `[start, end)`.
pub struct ScheduledClock {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    interval: Duration,
    generator: BarGenerator,
    current: DateTime<Utc>,
}

impl ScheduledClock {
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: Duration,
        generator: BarGenerator,
    ) -> Result<Self, DomainError> {
        if start >= end {
            return Err(DomainError::InvalidParameter(
                "schedule start must be before end".into(),
            ));
        }
        if interval <= Duration::zero() {
            return Err(DomainError::InvalidParameter(
                "schedule interval must be positive".into(),
            ));
        }
        Ok(Self {
            start,
            end,
            interval,
            generator,
            current: start,
        })
    }
}

impl Clock for ScheduledClock {
    fn tick(&mut self) -> Option<Bar> {
        if self.current >= self.end {
            return None;
        }
        let bar = (self.generator)(self.current);
        self.current += self.interval;
        Some(bar)
    }

    fn reset(&mut self) {
        self.current = self.start;
    }
}

/// Interleaves per-symbol feeds in strict timestamp order.
///
/// Ties are broken by symbol order (the sources live in a `BTreeMap`), so
/// identical inputs always produce identical bar sequences.
pub struct MultiSymbolClock {
    sources: BTreeMap<Symbol, Box<dyn Clock>>,
    buffers: BTreeMap<Symbol, Option<Bar>>,
}

impl MultiSymbolClock {
    pub fn new(sources: BTreeMap<Symbol, Box<dyn Clock>>) -> Self {
        Self {
            sources,
            buffers: BTreeMap::new(),
        }
    }
}

impl Clock for MultiSymbolClock {
    fn tick(&mut self) -> Option<Bar> {
        // Refill any consumed buffer.
        for (symbol, source) in &mut self.sources {
            let slot = self.buffers.entry(symbol.clone()).or_insert(None);
            if slot.is_none() {
                *slot = source.tick();
            }
        }

        // Earliest timestamp wins; first symbol in order wins ties.
        let earliest = self
            .buffers
            .iter()
            .filter_map(|(symbol, slot)| slot.as_ref().map(|bar| (symbol.clone(), bar.ts)))
            .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)))?;

        self.buffers.get_mut(&earliest.0)?.take()
    }

    fn reset(&mut self) {
        for source in self.sources.values_mut() {
            source.reset();
        }
        self.buffers.clear();
    }
}
