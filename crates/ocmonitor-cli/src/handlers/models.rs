use anyhow::Result;
use ocmonitor_providers::{DataLoader, StorageAdapter};
use ocmonitor_runtime::{Config, load_prices};
use ocmonitor_types::ModelRef;
use std::collections::BTreeSet;
use std::path::Path;

use crate::args::SourceArgs;
use crate::format;

pub fn handle(config: &Config, cwd: &Path, source: &SourceArgs) -> Result<()> {
    let used = used_models(config, source);
    let models: Vec<ModelRef> = used.iter().cloned().collect();
    let report = load_prices(&config.pricing, cwd, &models, source.no_remote);

    // Models named only in local price files are listed too
    let mut prices = report.prices.clone();
    let local = report.local_models();
    prices.extend(report.resolver.resolve_all(local.iter().filter(|m| !used.contains(*m))));

    if prices.is_empty() && used.is_empty() {
        println!("No models found.");
    }

    for (model, entry) in &prices {
        let marker = if used.contains(model) { "*" } else { " " };
        println!("{} {}  {}", marker, model, format::price(entry));
    }
    for model in used.iter().filter(|m| !prices.contains_key(*m)) {
        println!("* {}  unpriced", model);
    }

    if !used.is_empty() {
        println!();
        println!("* = used in sessions");
    }
    if let Some(warning) = report.remote.warning() {
        println!("Note: {}", warning);
    }
    Ok(())
}

/// Models that appear in the active backend. A missing backend is not an
/// error here; prices from the files are still worth listing.
fn used_models(config: &Config, source: &SourceArgs) -> BTreeSet<ModelRef> {
    let loader = match config
        .source_paths()
        .map_err(anyhow::Error::from)
        .and_then(|paths| DataLoader::select(&paths, source.source).map_err(anyhow::Error::from))
    {
        Ok(loader) => loader,
        Err(e) => {
            tracing::warn!(error = %e, "no session source, listing configured prices only");
            return BTreeSet::new();
        }
    };

    let mut models = BTreeSet::new();
    let sessions = match loader.list_sessions() {
        Ok(sessions) => sessions,
        Err(e) => {
            tracing::warn!(error = %e, "cannot read sessions");
            return models;
        }
    };
    for session in &sessions.items {
        match loader.list_interactions(&session.id) {
            Ok(loaded) => models.extend(loaded.items.into_iter().filter_map(|r| r.model)),
            Err(e) => tracing::warn!(session = %session.id, error = %e, "cannot read interactions"),
        }
    }
    models
}
