use anyhow::{Result, bail};
use ocmonitor_runtime::{BackendStatus, Config, NO_SOURCE_MESSAGE, validate_setup};
use std::path::Path;

pub fn handle(config: &Config, cwd: &Path) -> Result<()> {
    let paths = config.source_paths()?;
    let report = validate_setup(&paths, &config.pricing, cwd);

    println!("Session backends:");
    for backend in &report.backends {
        print_backend(backend);
    }

    let pricing = &report.pricing;
    println!();
    println!("Pricing:");
    match &pricing.user_file {
        Some(path) => println!("  user file: {} ({})", path.display(), presence(pricing.user_file_exists)),
        None => println!("  user file: none"),
    }
    println!(
        "  project file: {} ({})",
        pricing.project_file.display(),
        presence(pricing.project_file_exists)
    );
    println!(
        "  remote: {}",
        if pricing.remote_enabled { "enabled" } else { "disabled" }
    );
    if let Some(path) = &pricing.cache_path {
        match &pricing.cache {
            Some(cache) => println!(
                "  cache: {} ({} models, fetched {}{})",
                path.display(),
                cache.models,
                cache.fetched_at.format("%Y-%m-%d %H:%M UTC"),
                if cache.stale { ", stale" } else { "" }
            ),
            None => println!("  cache: {} (empty)", path.display()),
        }
    }

    let problems = report.problems();
    if !problems.is_empty() {
        println!();
        for problem in &problems {
            println!("! {}", problem);
        }
    }

    if !report.is_valid() {
        bail!(NO_SOURCE_MESSAGE);
    }
    println!();
    println!("Setup OK");
    Ok(())
}

fn print_backend(backend: &BackendStatus) {
    let state = match (backend.available, backend.sessions, &backend.error) {
        (false, _, _) => "not found".to_string(),
        (true, Some(n), _) if backend.malformed > 0 => {
            format!("available, {} session(s), {} malformed", n, backend.malformed)
        }
        (true, Some(n), _) => format!("available, {} session(s)", n),
        (true, None, Some(error)) => format!("unreadable: {}", error),
        (true, None, None) => "available".to_string(),
    };
    println!("  {}: {} ({})", backend.kind, backend.location.display(), state);
}

fn presence(exists: bool) -> &'static str {
    if exists { "found" } else { "not found" }
}
