use ocmonitor_types::{InteractionRecord, ModelRef, PriceEntry, TokenUsage};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

const PER_MILLION: f64 = 1_000_000.0;

/// Cost of some usage. `Unpriced` means no usable price was known, which is
/// different from a zero cost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", content = "amount", rename_all = "snake_case")]
pub enum Cost {
    Priced(f64),
    Unpriced,
}

impl Cost {
    pub fn amount(&self) -> Option<f64> {
        match self {
            Cost::Priced(amount) => Some(*amount),
            Cost::Unpriced => None,
        }
    }

    pub fn is_priced(&self) -> bool {
        matches!(self, Cost::Priced(_))
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cost::Priced(amount) => write!(f, "${:.4}", amount),
            Cost::Unpriced => write!(f, "unpriced"),
        }
    }
}

/// Aggregate of many costs that remembers what could not be priced
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CostTotals {
    pub amount: f64,
    pub priced_interactions: usize,
    pub unpriced_interactions: usize,
    pub unpriced_models: BTreeSet<String>,
}

impl CostTotals {
    pub fn record(&mut self, model: Option<&ModelRef>, cost: Cost) {
        match cost {
            Cost::Priced(amount) => {
                self.amount += amount;
                self.priced_interactions += 1;
            }
            Cost::Unpriced => {
                self.unpriced_interactions += 1;
                self.unpriced_models.insert(
                    model
                        .map(ToString::to_string)
                        .unwrap_or_else(|| "unknown".to_string()),
                );
            }
        }
    }

    pub fn merge(&mut self, other: &CostTotals) {
        self.amount += other.amount;
        self.priced_interactions += other.priced_interactions;
        self.unpriced_interactions += other.unpriced_interactions;
        self.unpriced_models.extend(other.unpriced_models.iter().cloned());
    }

    /// True when every costed interaction had a price
    pub fn is_complete(&self) -> bool {
        self.unpriced_interactions == 0
    }
}

impl fmt::Display for CostTotals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.4}", self.amount)?;
        if !self.is_complete() {
            write!(
                f,
                " (incomplete: {} unpriced interaction(s) for {})",
                self.unpriced_interactions,
                self.unpriced_models.iter().cloned().collect::<Vec<_>>().join(", ")
            )?;
        }
        Ok(())
    }
}

/// Prices token usage against resolved price entries.
///
/// Only models with an entry appear in `prices`; a missing entry means the
/// price is unknown.
#[derive(Debug, Clone, Copy)]
pub struct CostCalculator<'a> {
    prices: &'a BTreeMap<ModelRef, PriceEntry>,
}

impl<'a> CostCalculator<'a> {
    pub fn new(prices: &'a BTreeMap<ModelRef, PriceEntry>) -> Self {
        Self { prices }
    }

    /// Cost of `tokens` under one entry. Needs both input and output prices;
    /// cache tokens use their own rate when present, else the input rate.
    pub fn cost(tokens: &TokenUsage, price: Option<&PriceEntry>) -> Cost {
        let Some(price) = price else {
            return Cost::Unpriced;
        };
        let (Some(input), Some(output)) = (price.fields.input_price, price.fields.output_price)
        else {
            return Cost::Unpriced;
        };
        let cache_read = price.fields.cache_read_price.unwrap_or(input);
        let cache_write = price.fields.cache_write_price.unwrap_or(input);

        let amount = (tokens.input as f64 * input
            + tokens.output as f64 * output
            + tokens.cache_read as f64 * cache_read
            + tokens.cache_write as f64 * cache_write)
            / PER_MILLION;
        Cost::Priced(amount)
    }

    pub fn price_for(&self, model: &ModelRef) -> Option<&'a PriceEntry> {
        self.prices.get(model)
    }

    /// None for interactions that consumed no tokens (user messages).
    pub fn interaction_cost(&self, record: &InteractionRecord) -> Option<Cost> {
        if record.tokens.is_zero() {
            return None;
        }
        let price = record.model.as_ref().and_then(|m| self.price_for(m));
        Some(Self::cost(&record.tokens, price))
    }

    pub fn totals<'r, I>(&self, records: I) -> CostTotals
    where
        I: IntoIterator<Item = &'r InteractionRecord>,
    {
        let mut totals = CostTotals::default();
        for record in records {
            if let Some(cost) = self.interaction_cost(record) {
                totals.record(record.model.as_ref(), cost);
            }
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ocmonitor_types::{PriceFields, PriceTier};

    fn entry(input: Option<f64>, output: Option<f64>) -> PriceEntry {
        let mut entry = PriceEntry::new("m");
        entry.fields = PriceFields {
            input_price: input,
            output_price: output,
            ..Default::default()
        };
        entry.provenance.insert(ocmonitor_types::PriceField::Input, PriceTier::User);
        entry
    }

    fn interaction(id: &str, model: Option<&str>, tokens: TokenUsage) -> InteractionRecord {
        InteractionRecord {
            id: id.to_string(),
            session_id: "ses_a".to_string(),
            role: "assistant".to_string(),
            model: model.map(ModelRef::bare),
            tokens,
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            completed_at: None,
        }
    }

    #[test]
    fn test_basic_cost() {
        let tokens = TokenUsage::new(1_000_000, 500_000, 0, 0);
        let cost = CostCalculator::cost(&tokens, Some(&entry(Some(3.0), Some(15.0))));
        assert_eq!(cost, Cost::Priced(3.0 + 7.5));
    }

    #[test]
    fn test_cache_tokens_default_to_input_rate() {
        let tokens = TokenUsage::new(0, 0, 1_000_000, 1_000_000);
        let mut price = entry(Some(2.0), Some(10.0));
        assert_eq!(CostCalculator::cost(&tokens, Some(&price)), Cost::Priced(4.0));

        price.fields.cache_read_price = Some(0.5);
        price.fields.cache_write_price = Some(1.0);
        assert_eq!(CostCalculator::cost(&tokens, Some(&price)), Cost::Priced(1.5));
    }

    #[test]
    fn test_missing_entry_or_price_is_unpriced() {
        let tokens = TokenUsage::new(10, 10, 0, 0);
        assert_eq!(CostCalculator::cost(&tokens, None), Cost::Unpriced);
        assert_eq!(
            CostCalculator::cost(&tokens, Some(&entry(Some(1.0), None))),
            Cost::Unpriced
        );
    }

    #[test]
    fn test_zero_price_is_free_not_unpriced() {
        let tokens = TokenUsage::new(10, 10, 0, 0);
        let cost = CostCalculator::cost(&tokens, Some(&entry(Some(0.0), Some(0.0))));
        assert_eq!(cost, Cost::Priced(0.0));
    }

    #[test]
    fn test_totals_flag_incomplete() {
        let mut prices = BTreeMap::new();
        prices.insert(ModelRef::bare("known"), entry(Some(1.0), Some(2.0)));
        let calc = CostCalculator::new(&prices);

        let records = vec![
            interaction("1", Some("known"), TokenUsage::new(1_000_000, 0, 0, 0)),
            interaction("2", Some("mystery"), TokenUsage::new(100, 100, 0, 0)),
            interaction("3", None, TokenUsage::default()),
        ];
        let totals = calc.totals(&records);

        assert_eq!(totals.amount, 1.0);
        assert_eq!(totals.priced_interactions, 1);
        assert_eq!(totals.unpriced_interactions, 1);
        assert!(totals.unpriced_models.contains("mystery"));
        assert!(!totals.is_complete());
        assert!(totals.to_string().contains("incomplete"));
    }

    #[test]
    fn test_all_unpriced_is_not_zero_complete() {
        let prices = BTreeMap::new();
        let calc = CostCalculator::new(&prices);
        let records = vec![interaction("1", Some("x"), TokenUsage::new(5, 5, 0, 0))];

        let totals = calc.totals(&records);
        assert_eq!(totals.amount, 0.0);
        assert!(!totals.is_complete());
    }

    #[test]
    fn test_merge_totals() {
        let mut a = CostTotals::default();
        a.record(None, Cost::Priced(1.0));
        let mut b = CostTotals::default();
        b.record(Some(&ModelRef::bare("x")), Cost::Unpriced);

        a.merge(&b);
        assert_eq!(a.amount, 1.0);
        assert_eq!(a.unpriced_interactions, 1);
        assert_eq!(a.unpriced_models.len(), 1);
    }
}
