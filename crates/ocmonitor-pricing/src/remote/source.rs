use ocmonitor_types::PriceFields;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::FetchError;
use crate::tiers::PriceTable;

/// Where remote prices come from
///
/// Responsibilities:
/// - Bounded-time fetch of the full price table
/// - Classify failures (timeout, HTTP status, transport, payload)
pub trait PriceSource {
    fn url(&self) -> &str;

    fn fetch(&self) -> Result<PriceTable, FetchError>;
}

/// models.dev over HTTPS
#[derive(Debug, Clone)]
pub struct HttpPriceSource {
    url: String,
    timeout: Duration,
}

impl HttpPriceSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout: timeout.max(Duration::from_secs(1)),
        }
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                url: self.url.clone(),
                seconds: self.timeout.as_secs(),
            }
        } else if let Some(status) = err.status() {
            FetchError::Http {
                url: self.url.clone(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Transport {
                url: self.url.clone(),
                reason: err.to_string(),
            }
        }
    }
}

impl PriceSource for HttpPriceSource {
    fn url(&self) -> &str {
        &self.url
    }

    fn fetch(&self) -> Result<PriceTable, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("ocmonitor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| self.classify(e))?;

        let response = client.get(&self.url).send().map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().map_err(|e| self.classify(e))?;
        let table = parse_models_dev(&bytes).map_err(|reason| FetchError::Parse {
            url: self.url.clone(),
            reason,
        })?;

        tracing::info!(url = %self.url, models = table.len(), "fetched remote pricing");
        Ok(table)
    }
}

#[derive(Debug, Deserialize)]
struct ProviderDoc {
    #[serde(default)]
    models: BTreeMap<String, ModelDoc>,
}

#[derive(Debug, Default, Deserialize)]
struct ModelDoc {
    #[serde(default)]
    cost: Option<CostDoc>,
    #[serde(default)]
    limit: Option<LimitDoc>,
}

#[derive(Debug, Default, Deserialize)]
struct CostDoc {
    input: Option<f64>,
    output: Option<f64>,
    cache_read: Option<f64>,
    cache_write: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct LimitDoc {
    context: Option<u64>,
}

impl ModelDoc {
    fn into_fields(self) -> PriceFields {
        let cost = self.cost.unwrap_or_default();
        PriceFields {
            input_price: cost.input,
            output_price: cost.output,
            cache_read_price: cost.cache_read,
            cache_write_price: cost.cache_write,
            context_window: self.limit.and_then(|l| l.context).filter(|c| *c > 0),
            session_quota: None,
        }
    }
}

/// Flatten a models.dev document into `provider/model` keys plus bare
/// `model` keys. For bare keys the first provider in name order wins.
/// Providers that do not have the expected shape are skipped.
pub fn parse_models_dev(bytes: &[u8]) -> Result<PriceTable, String> {
    let raw: BTreeMap<String, serde_json::Value> =
        serde_json::from_slice(bytes).map_err(|e| e.to_string())?;

    let mut table = PriceTable::new();
    for (provider, value) in raw {
        let doc: ProviderDoc = match serde_json::from_value(value) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::debug!(provider = %provider, error = %e, "skipping provider entry");
                continue;
            }
        };

        for (model, model_doc) in doc.models {
            let fields = model_doc.into_fields();
            if fields.is_empty() {
                continue;
            }
            table.insert(format!("{}/{}", provider, model), fields.clone());
            table.entry(model).or_insert(fields);
        }
    }
    Ok(table)
}
