//! Boundary to the RF signal decoder.
//!
//! The decoder demodulates raw 433 MHz transmissions into [`SensorReading`]s.
//! The registry only needs two things from it: start monitoring a channel with
//! a sink for its readings, and stop monitoring again.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::pins::PinAddress;
use crate::reading::SensorReading;

/// Sink the decoder calls once per decoded transmission.
///
/// Invoked from the decoder's own thread or task, never from inside
/// [`SignalDecoder::subscribe`].
pub type ReadingSink = Arc<dyn Fn(SensorReading) + Send + Sync>;

/// Handle for one active decoder subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DecoderHandle(pub u64);

impl fmt::Display for DecoderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decoder#{}", self.0)
    }
}

/// A source of decoded sensor readings.
pub trait SignalDecoder: Send + Sync {
    /// Start monitoring `channel`, delivering each reading to `sink`.
    ///
    /// Failures (hardware unavailable, access denied) are returned as-is; the
    /// caller does not retry.
    fn subscribe(&self, channel: PinAddress, sink: ReadingSink) -> Result<DecoderHandle>;

    /// Stop monitoring. Called at most once per handle.
    fn unsubscribe(&self, handle: DecoderHandle);
}

/// Shared decoder handle.
pub type DynSignalDecoder = Arc<dyn SignalDecoder>;
