//! Runtime configuration provisioning.
//!
//! Configuration is read from layered [`source`]s, resolved and converted into
//! a typed value by a [`provider`], kept fresh by [`reload`] strategies, and
//! published to change listeners only when the value actually changes.
//!
//! ```no_run
//! use confwatch::provider::{ConfigurationProvider, ProviderOptions, RootConfigurationProvider};
//! use confwatch::reload::PeriodicalReloadStrategy;
//! use confwatch::source::FileConfigurationSource;
//! use serde::Deserialize;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[derive(Debug, PartialEq, Deserialize)]
//! struct Server {
//!     port: u16,
//! }
//!
//! let mut options = ProviderOptions::new(Arc::new(FileConfigurationSource::at("server.yaml")));
//! options.reload_strategies.push(Arc::new(PeriodicalReloadStrategy::new(Duration::from_secs(5))));
//! let provider = RootConfigurationProvider::<Server>::new(options)?;
//!
//! let port = provider.create_configuration_provider(|server: &Server| server.port);
//! port.register_change_listener(Box::new(|old, new| println!("port {old} -> {new}")));
//! # Ok::<(), confwatch::error::ConfigError>(())
//! ```

pub mod cli;
pub mod error;
pub mod ext;
pub mod format;
pub mod kv;
pub mod logging;
pub mod notifier;
pub mod provider;
pub mod reload;
pub mod source;
pub mod tree;
