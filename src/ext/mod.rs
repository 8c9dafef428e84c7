//! Extension hooks around type conversion.
//!
//! Extensions are supplied explicitly by the caller and executed in ascending
//! priority order (lowest number first). A failing hook aborts the load that
//! triggered it.

mod validation;

pub use validation::{Validate, ValidationExtension, Violation};

use crate::error::Result;
use crate::tree::ConfigTree;
use std::sync::Arc;
use tracing::{debug, warn};

/// Priority given to extensions that do not override [`ConfigurationExtension::priority`].
pub const DEFAULT_PRIORITY: i32 = 100;

/// A hook invoked around the conversion of a tree into `T`.
pub trait ConfigurationExtension<T>: Send + Sync {
    /// Runs against the resolved tree before it is converted.
    fn before_type_conversion(&self, _tree: &ConfigTree, _type_name: &str) -> Result<()> {
        Ok(())
    }

    /// Runs against the freshly assembled configuration object.
    fn after_config_assembly(&self, _configuration: &T) -> Result<()> {
        Ok(())
    }

    /// Lower runs first.
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    fn name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }

    /// Release resources when the owning provider closes.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// The ordered extension list of one provider.
pub struct ConfigurationExtensions<T> {
    extensions: Vec<Arc<dyn ConfigurationExtension<T>>>,
}

impl<T> ConfigurationExtensions<T> {
    pub fn new(mut extensions: Vec<Arc<dyn ConfigurationExtension<T>>>) -> Self {
        extensions.sort_by_key(|extension| extension.priority());
        for extension in &extensions {
            debug!(
                extension = %extension.name(),
                priority = extension.priority(),
                "Adding configuration extension"
            );
        }
        Self { extensions }
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Names in execution order.
    pub fn names(&self) -> Vec<String> {
        self.extensions.iter().map(|e| e.name()).collect()
    }

    pub fn before_type_conversion(&self, tree: &ConfigTree, type_name: &str) -> Result<()> {
        self.extensions
            .iter()
            .try_for_each(|extension| extension.before_type_conversion(tree, type_name))
    }

    pub fn after_config_assembly(&self, configuration: &T) -> Result<()> {
        self.extensions
            .iter()
            .try_for_each(|extension| extension.after_config_assembly(configuration))
    }

    /// Close every extension; failures are logged, not returned.
    pub fn close_extensions(&self) {
        for extension in &self.extensions {
            if let Err(e) = extension.close() {
                warn!(
                    extension = %extension.name(),
                    error = %e,
                    "Unknown error thrown while closing extension"
                );
            }
        }
    }
}

impl<T> Default for ConfigurationExtensions<T> {
    fn default() -> Self {
        Self {
            extensions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::tree::ConfigFormat;
    use std::sync::Mutex;

    struct Recording {
        name: &'static str,
        priority: i32,
        reject: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ConfigurationExtension<u32> for Recording {
        fn before_type_conversion(&self, _tree: &ConfigTree, type_name: &str) -> Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:before:{}", self.name, type_name));
            Ok(())
        }

        fn after_config_assembly(&self, configuration: &u32) -> Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:after:{}", self.name, configuration));
            if self.reject {
                return Err(ConfigError::rejected(self.name, "rejected"));
            }
            Ok(())
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn name(&self) -> String {
            self.name.to_string()
        }

        fn close(&self) -> Result<()> {
            self.log.lock().unwrap().push(format!("{}:close", self.name));
            if self.reject {
                return Err(ConfigError::rejected(self.name, "close failed"));
            }
            Ok(())
        }
    }

    fn extension(
        name: &'static str,
        priority: i32,
        reject: bool,
        log: &Arc<Mutex<Vec<String>>>,
    ) -> Arc<dyn ConfigurationExtension<u32>> {
        Arc::new(Recording {
            name,
            priority,
            reject,
            log: Arc::clone(log),
        })
    }

    #[test]
    fn test_runs_in_priority_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let extensions = ConfigurationExtensions::new(vec![
            extension("late", 200, false, &log),
            extension("early", 10, false, &log),
            extension("default", DEFAULT_PRIORITY, false, &log),
        ]);
        assert_eq!(extensions.names(), vec!["early", "default", "late"]);

        extensions
            .before_type_conversion(&ConfigTree::empty(), "u32")
            .unwrap();
        extensions.after_config_assembly(&7).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "early:before:u32",
                "default:before:u32",
                "late:before:u32",
                "early:after:7",
                "default:after:7",
                "late:after:7",
            ]
        );
    }

    #[test]
    fn test_rejection_stops_remaining_hooks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let extensions = ConfigurationExtensions::new(vec![
            extension("validator", 1, true, &log),
            extension("audit", 2, false, &log),
        ]);

        let err = extensions.after_config_assembly(&3).unwrap_err();
        assert!(matches!(err, ConfigError::ExtensionRejected { ref extension, .. } if extension == "validator"));
        assert_eq!(*log.lock().unwrap(), vec!["validator:after:3"]);
    }

    #[test]
    fn test_close_failures_do_not_stop_others() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let extensions = ConfigurationExtensions::new(vec![
            extension("first", 1, true, &log),
            extension("second", 2, false, &log),
        ]);
        extensions.close_extensions();
        assert_eq!(*log.lock().unwrap(), vec!["first:close", "second:close"]);
    }

    #[test]
    fn test_default_hooks_accept() {
        struct Passive;
        impl ConfigurationExtension<u32> for Passive {}

        let extensions = ConfigurationExtensions::new(vec![Arc::new(Passive) as Arc<dyn ConfigurationExtension<u32>>]);
        let tree = ConfigTree::parse("a: 1", ConfigFormat::Yaml, "test").unwrap();
        assert!(extensions.before_type_conversion(&tree, "u32").is_ok());
        assert!(extensions.after_config_assembly(&1).is_ok());
        assert!(extensions.names()[0].ends_with("Passive"));
    }
}
