//! `confwatch`: print a layered configuration and follow its changes.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use confwatch::cli::Cli;
use confwatch::format::{change_header, changed_keys};
use confwatch::logging::{LogTarget, init_tracing};
use confwatch::provider::{ConfigurationProvider, ProviderOptions, RootConfigurationProvider};
use confwatch::reload::PeriodicalReloadStrategy;
use confwatch::source::{ConfigurationSource, FileConfigurationSource, FileSourceOptions};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

fn file_source(path: &Path, ignore_missing: bool, watch: bool) -> Arc<dyn ConfigurationSource> {
    let mut options = FileSourceOptions::new(path);
    options.ignore_missing_file = ignore_missing;
    options.reload_on_change = watch;
    Arc::new(FileConfigurationSource::new(options))
}

fn provider_options(cli: &Cli) -> ProviderOptions<Value> {
    let mut options = ProviderOptions::new(file_source(&cli.file, cli.ignore_missing, cli.watch));
    options.fallbacks = cli
        .fallbacks
        .iter()
        .map(|path| file_source(path, false, cli.watch))
        .collect();
    if let Some(user_config) = cli.user_config() {
        debug!(path = %user_config.display(), "Using user-level defaults");
        options.fallbacks.push(file_source(&user_config, true, cli.watch));
    }
    options.config_root_path = cli.root_path.clone();
    if let Some(interval) = cli.interval() {
        options
            .reload_strategies
            .push(Arc::new(PeriodicalReloadStrategy::new(interval)));
    }
    options
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&LogTarget::parse(&cli.log), cli.verbose)?;

    let provider = RootConfigurationProvider::<Value>::new(provider_options(&cli))
        .with_context(|| format!("Failed to load configuration from {}", cli.file.display()))?;
    println!("{}", cli.format.render(&provider.get())?);

    if cli.once {
        provider.close();
        return Ok(());
    }
    if !cli.watch && cli.interval().is_none() {
        warn!("Neither --watch nor --interval-ms given; configuration will not be reloaded");
    }

    let format = cli.format;
    provider.register_change_listener(Box::new(move |old: &Value, new: &Value| {
        println!("{}", change_header(&Local::now(), &changed_keys(old, new)));
        match format.render(new) {
            Ok(text) => println!("{text}"),
            Err(e) => warn!(error = %e, "Failed to render configuration"),
        }
    }));

    info!(file = %cli.file.display(), "Watching configuration; press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!("Shutting down");
    provider.close();
    Ok(())
}
