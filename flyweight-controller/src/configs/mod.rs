mod settings;

pub use settings::{Controller, DeviceEntry, Gateway, Logger, Settings};
