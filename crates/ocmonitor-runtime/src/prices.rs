use ocmonitor_pricing::{
    PriceResolver, PriceSource, PriceTable, PricingConfig, RemoteFetcher, RemoteStatus,
    load_price_file,
};
use ocmonitor_types::{ModelRef, PriceEntry, PriceTier};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Prices resolved for one invocation
#[derive(Debug, Clone)]
pub struct PriceReport {
    pub resolver: PriceResolver,
    /// Only models some tier knows; absent models are unpriced
    pub prices: BTreeMap<ModelRef, PriceEntry>,
    pub remote: RemoteStatus,
    pub user_file: Option<PathBuf>,
    pub project_file: PathBuf,
}

impl PriceReport {
    pub fn context_window(&self, model: &ModelRef) -> Option<u64> {
        self.prices.get(model).and_then(|entry| entry.context_window())
    }

    /// Every key the local files mention, as bare model references
    pub fn local_models(&self) -> Vec<ModelRef> {
        [PriceTier::User, PriceTier::Project]
            .into_iter()
            .filter_map(|tier| self.resolver.tier(tier))
            .flat_map(|table| table.keys().cloned())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .map(ModelRef::bare)
            .collect()
    }
}

/// Resolve `models` against the user file, the project file (relative to
/// `project_dir`) and the remote tier over HTTP.
pub fn load_prices(
    config: &PricingConfig,
    project_dir: &Path,
    models: &[ModelRef],
    no_remote: bool,
) -> PriceReport {
    let fetcher = RemoteFetcher::from_config(config, no_remote);
    load_prices_with(config, project_dir, models, &fetcher)
}

/// Same as [`load_prices`] with a caller-supplied remote fetcher
pub fn load_prices_with<S: PriceSource>(
    config: &PricingConfig,
    project_dir: &Path,
    models: &[ModelRef],
    fetcher: &RemoteFetcher<S>,
) -> PriceReport {
    let user_file = config.user_file_path();
    let project_file = project_dir.join(&config.project_file);

    let user = user_file
        .as_deref()
        .map(load_price_file)
        .unwrap_or_else(PriceTable::new);
    let project = load_price_file(&project_file);

    let mut wanted: Vec<ModelRef> = models.to_vec();
    wanted.extend(
        user.keys()
            .chain(project.keys())
            .map(|key| ModelRef::bare(key.clone())),
    );
    let remote = fetcher.resolve(&wanted);
    if let Some(warning) = remote.status.warning() {
        tracing::warn!("{}", warning);
    }

    let resolver = PriceResolver::new()
        .with_tier(PriceTier::User, user)
        .with_tier(PriceTier::Project, project)
        .with_tier(PriceTier::Remote, remote.prices);
    let prices = resolver.resolve_all(models);

    tracing::debug!(
        requested = models.len(),
        priced = prices.len(),
        "resolved model prices"
    );

    PriceReport {
        resolver,
        prices,
        remote: remote.status,
        user_file,
        project_file,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_local_tiers_without_remote() {
        let temp = TempDir::new().unwrap();
        let user_file = temp.path().join("user.json");
        std::fs::write(&user_file, r#"{"gpt-5": {"input": 1.25, "output": 10}}"#).unwrap();
        std::fs::write(
            temp.path().join("models.json"),
            r#"{"gpt-5": {"input": 9, "contextWindow": 400000}, "local-llm": {"input": 0, "output": 0}}"#,
        )
        .unwrap();

        let config = PricingConfig {
            user_file: Some(user_file),
            ..Default::default()
        };
        let models = vec![
            ModelRef::new(Some("openai".to_string()), "gpt-5"),
            ModelRef::bare("mystery"),
        ];
        let report = load_prices(&config, temp.path(), &models, true);

        assert_eq!(report.remote, RemoteStatus::Disabled);
        assert_eq!(report.prices.len(), 1);
        let gpt = &report.prices[&models[0]];
        assert_eq!(gpt.fields.input_price, Some(1.25));
        assert_eq!(gpt.tier_of(ocmonitor_types::PriceField::Input), Some(PriceTier::User));
        assert_eq!(report.context_window(&models[0]), Some(400_000));
        assert_eq!(
            report.local_models(),
            vec![ModelRef::bare("gpt-5"), ModelRef::bare("local-llm")]
        );
    }
}
