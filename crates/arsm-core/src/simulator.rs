//! In-process signal decoder.
//!
//! `SimulatedDecoder` implements [`SignalDecoder`] without radio hardware.
//! Readings are pushed with [`emit`](SimulatedDecoder::emit), or generated on
//! a timer by [`spawn_periodic`](SimulatedDecoder::spawn_periodic) for three
//! sensors on channels A, B and C whose values drift slowly.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::decoder::{DecoderHandle, ReadingSink, SignalDecoder};
use crate::error::{Error, Result};
use crate::pins::PinAddress;
use crate::reading::SensorReading;

/// Default time between simulated transmissions.
pub const DEFAULT_MESSAGE_INTERVAL: Duration = Duration::from_secs(15);

const SENSOR_CHANNELS: [char; 3] = ['A', 'B', 'C'];
const BASE_HUMIDITY: [i32; 3] = [50, 40, 30];
const BASE_RAW_TEMP: [i32; 3] = [1020, 1120, 1220];

/// A fake decoder that delivers readings pushed by the caller.
#[derive(Default)]
pub struct SimulatedDecoder {
    next_handle: AtomicU64,
    sinks: Mutex<BTreeMap<DecoderHandle, (PinAddress, ReadingSink)>>,
    /// Readings captured for delivery later, with the sinks that were live
    /// when they were queued.
    pending: Mutex<Vec<(SensorReading, Vec<ReadingSink>)>>,
    shut_down: AtomicBool,
}

impl SimulatedDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `reading` to every sink monitoring `channel`. Returns the number
    /// of sinks called.
    pub fn emit(&self, channel: PinAddress, reading: SensorReading) -> usize {
        let sinks = self.sinks_for(channel);
        for sink in &sinks {
            sink(reading.clone());
        }
        sinks.len()
    }

    /// Capture `reading` for the sinks monitoring `channel` now, but deliver it
    /// only on [`flush`](Self::flush), even if they unsubscribe in between.
    pub fn queue(&self, channel: PinAddress, reading: SensorReading) {
        let sinks = self.sinks_for(channel);
        self.pending.lock().push((reading, sinks));
    }

    /// Deliver every queued reading. Returns the number of sink calls.
    pub fn flush(&self) -> usize {
        let pending = std::mem::take(&mut *self.pending.lock());
        let mut calls = 0;
        for (reading, sinks) in pending {
            for sink in sinks {
                sink(reading.clone());
                calls += 1;
            }
        }
        calls
    }

    /// Channels with at least one active subscription.
    pub fn monitored_channels(&self) -> Vec<PinAddress> {
        let mut channels: Vec<PinAddress> = Vec::new();
        for (channel, _) in self.sinks.lock().values() {
            if !channels.contains(channel) {
                channels.push(*channel);
            }
        }
        channels
    }

    /// Number of active subscriptions.
    pub fn active_count(&self) -> usize {
        self.sinks.lock().len()
    }

    /// Stop accepting subscriptions and end any periodic task.
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Emit a generated reading on every monitored channel each `interval`,
    /// rotating through the simulated sensors, until [`shutdown`](Self::shutdown).
    pub fn spawn_periodic(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let decoder = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut tick: u64 = 0;

            loop {
                ticker.tick().await;
                if decoder.is_shut_down() {
                    break;
                }

                let reading = simulated_reading(tick, Utc::now().timestamp());
                for channel in decoder.monitored_channels() {
                    decoder.emit(channel, reading.clone());
                }
                tick = tick.wrapping_add(1);
            }

            debug!(category = "simulator", ticks = tick, "Periodic transmitter stopped");
        })
    }

    // Sinks are cloned out so none is called with the lock held.
    fn sinks_for(&self, channel: PinAddress) -> Vec<ReadingSink> {
        self.sinks
            .lock()
            .values()
            .filter(|(monitored, _)| *monitored == channel)
            .map(|(_, sink)| Arc::clone(sink))
            .collect()
    }
}

impl SignalDecoder for SimulatedDecoder {
    fn subscribe(&self, channel: PinAddress, sink: ReadingSink) -> Result<DecoderHandle> {
        if self.is_shut_down() {
            return Err(Error::DecoderUnavailable("simulated decoder shut down".to_string()));
        }

        let handle = DecoderHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.sinks.lock().insert(handle, (channel, sink));
        info!(category = "simulator", channel = %channel, handle = %handle, "Simulated monitor started");
        Ok(handle)
    }

    fn unsubscribe(&self, handle: DecoderHandle) {
        if self.sinks.lock().remove(&handle).is_some() {
            info!(category = "simulator", handle = %handle, "Simulated monitor stopped");
        }
    }
}

/// Reading number `tick` of the simulated sensor rotation.
fn simulated_reading(tick: u64, collection_time: i64) -> SensorReading {
    let slot = (tick % SENSOR_CHANNELS.len() as u64) as usize;
    let round = (tick / SENSOR_CHANNELS.len() as u64) as i32;

    let humidity = BASE_HUMIDITY[slot] + round % 5 - 2;
    let raw_temp = BASE_RAW_TEMP[slot] + (round % 7) * 3 - 9;

    let mut reading = SensorReading::new(SENSOR_CHANNELS[slot], collection_time)
        .with_humidity(humidity)
        .with_raw_temp(raw_temp)
        .with_signal_quality(100)
        .with_valid_checksum(true)
        .with_repeats(1, 3);
    reading.misc_data1 = 0x0A00 | slot as i32;
    reading.misc_data2 = 0x44;
    reading.misc_data3 = 0x4;
    reading
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_sink(counter: &Arc<AtomicUsize>) -> ReadingSink {
        let counter = Arc::clone(counter);
        Arc::new(move |_: SensorReading| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_emit_reaches_matching_channel_only() {
        let decoder = SimulatedDecoder::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let misses = Arc::new(AtomicUsize::new(0));

        decoder.subscribe(PinAddress::gpio(27), counting_sink(&hits)).unwrap();
        decoder.subscribe(PinAddress::gpio(4), counting_sink(&misses)).unwrap();

        assert_eq!(decoder.emit(PinAddress::gpio(27), SensorReading::new('A', 0)), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(misses.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_queued_readings_outlive_unsubscribe() {
        let decoder = SimulatedDecoder::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let handle = decoder.subscribe(PinAddress::gpio(27), counting_sink(&hits)).unwrap();

        decoder.queue(PinAddress::gpio(27), SensorReading::new('B', 0));
        decoder.unsubscribe(handle);

        assert_eq!(decoder.emit(PinAddress::gpio(27), SensorReading::new('B', 1)), 0);
        assert_eq!(decoder.flush(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shutdown_rejects_subscriptions() {
        let decoder = SimulatedDecoder::new();
        decoder.shutdown();
        let hits = Arc::new(AtomicUsize::new(0));
        let result = decoder.subscribe(PinAddress::gpio(27), counting_sink(&hits));
        assert!(matches!(result, Err(Error::DecoderUnavailable(_))));
    }

    #[test]
    fn test_simulated_readings_rotate_channels() {
        let channels: Vec<char> = (0..4).map(|tick| simulated_reading(tick, 0).channel).collect();
        assert_eq!(channels, vec!['A', 'B', 'C', 'A']);

        let first = simulated_reading(0, 0);
        assert_eq!(first.humidity, Some(48));
        assert_eq!(first.raw_temp, Some(1011));
        assert!(first.valid_checksum);
        assert_eq!(first.repeats_captured, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_emits_until_shutdown() {
        let decoder = Arc::new(SimulatedDecoder::new());
        let hits = Arc::new(AtomicUsize::new(0));
        decoder.subscribe(PinAddress::gpio(27), counting_sink(&hits)).unwrap();

        let task = decoder.spawn_periodic(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(2500)).await;
        decoder.shutdown();
        tokio::time::sleep(Duration::from_secs(1)).await;
        task.await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }
}
