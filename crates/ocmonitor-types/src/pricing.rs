use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Pricing source, ordered by precedence (User wins over Project wins over Remote)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTier {
    User,
    Project,
    Remote,
}

impl PriceTier {
    /// All tiers in precedence order
    pub const ALL: [PriceTier; 3] = [PriceTier::User, PriceTier::Project, PriceTier::Remote];
}

impl fmt::Display for PriceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PriceTier::User => "user",
            PriceTier::Project => "project",
            PriceTier::Remote => "remote",
        };
        write!(f, "{}", name)
    }
}

/// Individually mergeable price field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceField {
    Input,
    Output,
    CacheRead,
    CacheWrite,
    ContextWindow,
    SessionQuota,
}

/// Raw price fields as supplied by a single tier.
///
/// Prices are USD per million tokens. Every field is optional: a tier may
/// supply any subset. The serialized names are the cache-file names; the
/// aliases accept the camelCase `models.json` layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceFields {
    #[serde(default, alias = "input", skip_serializing_if = "Option::is_none")]
    pub input_price: Option<f64>,
    #[serde(default, alias = "output", skip_serializing_if = "Option::is_none")]
    pub output_price: Option<f64>,
    #[serde(default, alias = "cacheRead", skip_serializing_if = "Option::is_none")]
    pub cache_read_price: Option<f64>,
    #[serde(default, alias = "cacheWrite", skip_serializing_if = "Option::is_none")]
    pub cache_write_price: Option<f64>,
    #[serde(default, alias = "contextWindow", skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u64>,
    #[serde(default, alias = "sessionQuota", skip_serializing_if = "Option::is_none")]
    pub session_quota: Option<f64>,
}

impl PriceFields {
    pub fn is_empty(&self) -> bool {
        self.input_price.is_none()
            && self.output_price.is_none()
            && self.cache_read_price.is_none()
            && self.cache_write_price.is_none()
            && self.context_window.is_none()
            && self.session_quota.is_none()
    }

    pub fn has(&self, field: PriceField) -> bool {
        match field {
            PriceField::Input => self.input_price.is_some(),
            PriceField::Output => self.output_price.is_some(),
            PriceField::CacheRead => self.cache_read_price.is_some(),
            PriceField::CacheWrite => self.cache_write_price.is_some(),
            PriceField::ContextWindow => self.context_window.is_some(),
            PriceField::SessionQuota => self.session_quota.is_some(),
        }
    }
}

/// Resolved price for one model, merged across tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    /// The key the entry was resolved for (display form of the model)
    pub model: String,
    pub fields: PriceFields,
    /// Which tier supplied each populated field
    pub provenance: BTreeMap<PriceField, PriceTier>,
}

impl PriceEntry {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            fields: PriceFields::default(),
            provenance: BTreeMap::new(),
        }
    }

    /// Highest-precedence tier that contributed any field
    pub fn origin(&self) -> Option<PriceTier> {
        self.provenance.values().min().copied()
    }

    pub fn tier_of(&self, field: PriceField) -> Option<PriceTier> {
        self.provenance.get(&field).copied()
    }

    pub fn input_price_per_million(&self) -> Option<f64> {
        self.fields.input_price
    }

    pub fn output_price_per_million(&self) -> Option<f64> {
        self.fields.output_price
    }

    pub fn context_window(&self) -> Option<u64> {
        self.fields.context_window
    }
}
