//! Static per-model pricing, USD per million tokens.

use rust_decimal::Decimal;

use crate::api_types::TokenUsage;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelRates {
    /// USD per 1M input tokens.
    pub input: Decimal,
    /// USD per 1M output tokens.
    pub output: Decimal,
}

const fn rates(input_cents_e2: i64, output_cents_e2: i64) -> ModelRates {
    // Stored as Decimal with two fractional digits (e.g. 250 -> 2.50).
    ModelRates {
        input: Decimal::from_parts(input_cents_e2 as u32, 0, 0, false, 2),
        output: Decimal::from_parts(output_cents_e2 as u32, 0, 0, false, 2),
    }
}

const RATE_TABLE: &[(&str, ModelRates)] = &[
    ("gpt-4o", rates(250, 1000)),
    ("gpt-4o-mini", rates(15, 60)),
    ("gpt-4.1", rates(200, 800)),
    ("gpt-4.1-mini", rates(40, 160)),
    ("llama-3.1-8b-instant", rates(5, 8)),
    ("llama-3.3-70b-versatile", rates(59, 79)),
];

/// Fallback for unknown models: priced like the most expensive known one
/// so cost reports err on the high side.
const DEFAULT_RATES: ModelRates = rates(250, 1000);

pub fn rates_for(model: &str) -> ModelRates {
    RATE_TABLE
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, rates)| *rates)
        .unwrap_or(DEFAULT_RATES)
}

const TOKENS_PER_MILLION: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// `cost = (in · in_rate + out · out_rate) / 1e6`.
pub fn cost(model: &str, usage: TokenUsage) -> Decimal {
    let rates = rates_for(model);
    let input = Decimal::from(usage.input_tokens) * rates.input;
    let output = Decimal::from(usage.output_tokens) * rates.output;
    (input + output) / TOKENS_PER_MILLION
}

/// What the same usage would have cost on `top_model`, minus actual cost.
pub fn savings_vs(top_model: &str, actual_model: &str, usage: TokenUsage) -> Decimal {
    cost(top_model, usage) - cost(actual_model, usage)
}
