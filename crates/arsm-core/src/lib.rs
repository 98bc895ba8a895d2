//! Pin addressing and sensor subscriptions for 433 MHz temperature/humidity
//! receivers.
//!
//! The crate sits between an application and an RF signal decoder. It resolves
//! user-supplied pin identifiers across numbering schemes and manages the
//! listeners that receive decoded readings.

pub mod config;
pub mod decoder;
pub mod error;
pub mod pins;
pub mod reading;
pub mod registry;
pub mod simulator;

pub use error::{Error, Result};

pub use config::MonitorConfig;
pub use decoder::{DecoderHandle, DynSignalDecoder, ReadingSink, SignalDecoder};
pub use pins::{
    convert_pin, BoardLayout, PinAddress, PinIdentifier, PinResolver, PinSystem, NO_MAPPING,
};
pub use reading::SensorReading;
pub use registry::{ListenerRegistry, SensorListener, SubscriptionId, SubscriptionInfo};
pub use simulator::SimulatedDecoder;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-exports commonly used types.
pub mod prelude {
    // Error handling
    pub use crate::error::{Error, Result};

    // Pin addressing
    pub use crate::pins::{
        convert_pin, BoardLayout, PinAddress, PinIdentifier, PinResolver, PinSystem, NO_MAPPING,
    };

    // Subscriptions
    pub use crate::decoder::{DecoderHandle, DynSignalDecoder, ReadingSink, SignalDecoder};
    pub use crate::reading::SensorReading;
    pub use crate::registry::{ListenerRegistry, SensorListener, SubscriptionId};
    pub use crate::simulator::SimulatedDecoder;

    pub use crate::config::{env_vars, MonitorConfig};
}
