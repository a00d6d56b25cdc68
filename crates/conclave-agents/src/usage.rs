//! Inference usage accounting.
//!
//! Every completed call is recorded as a [`UsageRecord`] with its token
//! counts and an estimated dollar cost. All monetary arithmetic uses
//! [`rust_decimal::Decimal`] -- no floating point. The log is bounded; old
//! records roll off, the running totals never do.

use std::collections::VecDeque;

use conclave_types::UsageRecord;
use rust_decimal::Decimal;

/// One million, the denominator for per-million-token pricing.
const ONE_MILLION: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Default number of retained records.
const DEFAULT_CAPACITY: usize = 1024;

/// Estimated cost of one call at the given per-million-token rates.
pub fn cost_of(
    prompt_tokens: u32,
    completion_tokens: u32,
    input_rate: Decimal,
    output_rate: Decimal,
) -> Decimal {
    let prompt_cost = Decimal::from(prompt_tokens)
        .checked_div(ONE_MILLION)
        .unwrap_or(Decimal::ZERO)
        .checked_mul(input_rate)
        .unwrap_or(Decimal::ZERO);
    let completion_cost = Decimal::from(completion_tokens)
        .checked_div(ONE_MILLION)
        .unwrap_or(Decimal::ZERO)
        .checked_mul(output_rate)
        .unwrap_or(Decimal::ZERO);
    prompt_cost
        .checked_add(completion_cost)
        .unwrap_or(Decimal::ZERO)
}

/// Bounded log of inference calls with running totals.
///
/// Totals accumulate for the lifetime of the log, including calls whose
/// records have rolled off and calls made for seats that have since been
/// handed back to a human.
#[derive(Debug)]
pub struct UsageLog {
    records: VecDeque<UsageRecord>,
    capacity: usize,
    totals: UsageTotals,
}

/// Aggregated usage across all recorded calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageTotals {
    /// Number of calls.
    pub calls: u64,
    /// Prompt tokens across all calls.
    pub prompt_tokens: u64,
    /// Completion tokens across all calls.
    pub completion_tokens: u64,
    /// Estimated dollar cost across all calls.
    pub cost: Decimal,
}

impl Default for UsageLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl UsageLog {
    /// Create a log retaining at most `capacity` records.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity: capacity.max(1),
            totals: UsageTotals::default(),
        }
    }

    /// Record one completed call.
    pub fn record(&mut self, record: UsageRecord) {
        self.totals.calls = self.totals.calls.saturating_add(1);
        self.totals.prompt_tokens = self
            .totals
            .prompt_tokens
            .saturating_add(u64::from(record.prompt_tokens));
        self.totals.completion_tokens = self
            .totals
            .completion_tokens
            .saturating_add(u64::from(record.completion_tokens));
        self.totals.cost = self
            .totals
            .cost
            .checked_add(record.cost)
            .unwrap_or(self.totals.cost);

        if self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// The retained records, oldest first.
    pub fn records(&self) -> impl Iterator<Item = &UsageRecord> {
        self.records.iter()
    }

    /// Lifetime totals, independent of retention.
    pub const fn totals(&self) -> UsageTotals {
        self.totals
    }
}
