//! Error taxonomy for configuration loading.
//!
//! Load-result errors (missing resources, bad conversions, rejected objects)
//! are returned to whoever triggered the load. Listener and reload-strategy
//! failures never surface here; they are caught and logged where they occur.

use thiserror::Error;

/// Errors produced while fetching, resolving, converting or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The backing resource does not exist and absence is not tolerated.
    #[error("missing required configuration resource at path: {path}")]
    MissingResource { path: String },

    /// The configured root path does not exist in the resolved tree.
    #[error("missing configuration root path: {path}")]
    MissingRootPath { path: String },

    /// Resource text could not be parsed into a configuration tree.
    #[error("failed to parse configuration from {origin}: {message}")]
    Parse { origin: String, message: String },

    /// A `${...}` reference points nowhere.
    #[error("unresolved configuration reference: ${{{reference}}}")]
    UnresolvedReference { reference: String },

    /// A `${...}` reference refers back to itself.
    #[error("circular configuration reference: ${{{reference}}}")]
    CircularReference { reference: String },

    /// The tree could not be mapped onto the target type.
    #[error("failed to convert configuration into {type_name}: {source}")]
    Conversion {
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// An extension hook vetoed the configuration.
    #[error("configuration rejected by extension '{extension}': {reason}")]
    ExtensionRejected { extension: String, reason: String },

    /// Reading the backing resource failed for a reason other than absence.
    #[error("failed to read configuration from {origin}: {source}")]
    Io {
        origin: String,
        #[source]
        source: std::io::Error,
    },

    /// A key-value store client failed.
    #[error("key-value store error: {message}")]
    Store { message: String },

    /// Wrapper for any failure inside the provider's load path.
    #[error("failed to create configuration object: {source}")]
    AssemblyFailed {
        #[source]
        source: Box<ConfigError>,
    },
}

impl ConfigError {
    pub fn missing_resource(path: impl Into<String>) -> Self {
        Self::MissingResource { path: path.into() }
    }

    pub fn parse(origin: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            origin: origin.into(),
            message: message.to_string(),
        }
    }

    pub fn rejected(extension: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExtensionRejected {
            extension: extension.into(),
            reason: reason.into(),
        }
    }

    pub fn store(message: impl ToString) -> Self {
        Self::Store {
            message: message.to_string(),
        }
    }

    /// Wrap an error raised while assembling a configuration object.
    ///
    /// Already-wrapped errors are returned as is.
    pub fn assembly(source: ConfigError) -> Self {
        match source {
            wrapped @ Self::AssemblyFailed { .. } => wrapped,
            other => Self::AssemblyFailed {
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, looking through `AssemblyFailed` wrappers.
    pub fn cause(&self) -> &ConfigError {
        match self {
            Self::AssemblyFailed { source } => source.cause(),
            other => other,
        }
    }

    /// Returns true if the root cause is a missing resource.
    pub fn is_missing_resource(&self) -> bool {
        matches!(self.cause(), Self::MissingResource { .. })
    }
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assembly_wraps_once() {
        let err = ConfigError::assembly(ConfigError::missing_resource("app.yaml"));
        let err = ConfigError::assembly(err);
        match &err {
            ConfigError::AssemblyFailed { source } => {
                assert!(matches!(**source, ConfigError::MissingResource { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_missing_resource());
    }

    #[test]
    fn test_display_messages() {
        let err = ConfigError::missing_resource("/etc/app.yaml");
        assert_eq!(
            err.to_string(),
            "missing required configuration resource at path: /etc/app.yaml"
        );

        let err = ConfigError::UnresolvedReference {
            reference: "db.host".to_string(),
        };
        assert_eq!(err.to_string(), "unresolved configuration reference: ${db.host}");
    }
}
