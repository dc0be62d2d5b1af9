//! From implementations for converting external error types into SweepError

use super::types::SweepError;

impl From<std::io::Error> for SweepError {
    fn from(err: std::io::Error) -> Self {
        SweepError::IoError(Box::new(err))
    }
}

impl From<toml::de::Error> for SweepError {
    fn from(err: toml::de::Error) -> Self {
        SweepError::ConfigurationError {
            component: "config file".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for SweepError {
    fn from(err: serde_yaml::Error) -> Self {
        SweepError::ConfigurationError {
            component: "inventory file".to_string(),
            message: err.to_string(),
        }
    }
}
