use serde::{Deserialize, Serialize};
use std::fmt;

/// Model identity as recorded on an interaction.
///
/// Price tables are keyed either by the provider-qualified name
/// (`openrouter/z-ai/glm-4.5-air`) or by the bare model name
/// (`z-ai/glm-4.5-air`); `lookup_keys` yields them in that order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub model: String,
}

impl ModelRef {
    pub fn new(provider: Option<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.filter(|p| !p.is_empty()),
            model: model.into(),
        }
    }

    pub fn bare(model: impl Into<String>) -> Self {
        Self {
            provider: None,
            model: model.into(),
        }
    }

    /// `provider/model` when the provider is known
    pub fn qualified_key(&self) -> Option<String> {
        self.provider
            .as_ref()
            .map(|provider| format!("{}/{}", provider, self.model))
    }

    /// Keys to try against a price table, most specific first
    pub fn lookup_keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(2);
        if let Some(qualified) = self.qualified_key() {
            keys.push(qualified);
        }
        keys.push(self.model.clone());
        keys
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.provider {
            Some(provider) => write!(f, "{}/{}", provider, self.model),
            None => write!(f, "{}", self.model),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_keys_qualified_first() {
        let model = ModelRef::new(Some("openrouter".to_string()), "z-ai/glm-4.5-air");
        assert_eq!(
            model.lookup_keys(),
            vec![
                "openrouter/z-ai/glm-4.5-air".to_string(),
                "z-ai/glm-4.5-air".to_string()
            ]
        );
    }

    #[test]
    fn test_empty_provider_is_bare() {
        let model = ModelRef::new(Some(String::new()), "gpt-5");
        assert_eq!(model.provider, None);
        assert_eq!(model.lookup_keys(), vec!["gpt-5".to_string()]);
        assert_eq!(model.to_string(), "gpt-5");
    }
}
