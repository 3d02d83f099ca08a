// wristhub — Error Types

use thiserror::Error;

use crate::power::Peripheral;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("poll interval {0} ms outside 10..=4000")]
    InvalidPollInterval(u32),

    #[error("settings could not be parsed: {0}")]
    Settings(#[source] serde_json::Error),

    /// Device stayed in its last commanded state after every retry failed.
    #[error("{device} driver failed: {source}")]
    Driver {
        device: Peripheral,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
