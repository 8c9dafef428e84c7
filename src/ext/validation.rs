//! Validation of assembled configuration objects.

use super::ConfigurationExtension;
use crate::error::{ConfigError, Result};
use std::fmt;

const NAME: &str = "validation";

/// A single failed constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Dot-separated path of the offending field.
    pub field: String,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Constraints a configuration type checks about itself.
pub trait Validate {
    /// Every violated constraint; empty when valid.
    fn validate(&self) -> Vec<Violation>;
}

/// Rejects configuration objects that violate their [`Validate`] constraints.
///
/// A rejected reload leaves the previously cached configuration in place.
pub struct ValidationExtension;

impl<T: Validate> ConfigurationExtension<T> for ValidationExtension {
    fn after_config_assembly(&self, configuration: &T) -> Result<()> {
        let violations = configuration.validate();
        if violations.is_empty() {
            return Ok(());
        }

        let reason = violations
            .iter()
            .map(Violation::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(ConfigError::rejected(
            NAME,
            format!("invalid configuration: {reason}"),
        ))
    }

    fn name(&self) -> String {
        NAME.to_string()
    }
}
