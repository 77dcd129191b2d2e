mod settings;

pub use settings::{ClientConfig, PollingConfig, Settings};
