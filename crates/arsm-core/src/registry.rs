//! Sensor listener registry.
//!
//! The registry owns every active listener subscription and is the only
//! component that talks to the [`SignalDecoder`]. Listeners on the same
//! physical line share one decoder subscription: the first listener starts
//! monitoring, the last removal stops it.
//!
//! ```rust,no_run
//! use arsm_core::prelude::*;
//! use std::sync::Arc;
//!
//! # fn demo(decoder: Arc<dyn SignalDecoder>) -> arsm_core::Result<()> {
//! let registry = ListenerRegistry::new(decoder, PinResolver::default());
//!
//! let id = registry.add_sensor_data_listener("13p", |reading, _id| {
//!     println!("{}: {:?}", reading.channel, reading.temp_celsius);
//! })?;
//!
//! registry.remove_listener(id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Dispatch
//!
//! Readings are dispatched over a snapshot of the listeners taken when the
//! reading arrives, in registration order. A listener removed while the pass
//! is running (by itself or by an earlier listener) is skipped; a listener
//! added during the pass first sees the next reading.
//!
//! Each call runs under the subscription's gate. Removal closes the gate, so
//! once [`remove_listener`](ListenerRegistry::remove_listener) returns the
//! listener is not running and never runs again. The gate is reentrant: a
//! listener may remove itself. Listeners running on different threads must
//! not remove each other.

use parking_lot::{Mutex, ReentrantMutex};
use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

use crate::decoder::{DecoderHandle, DynSignalDecoder, ReadingSink};
use crate::error::Result;
use crate::pins::{PinAddress, PinIdentifier, PinResolver, PinSystem, NO_MAPPING};
use crate::reading::SensorReading;

/// Opaque handle identifying one listener subscription.
///
/// Identifiers increase monotonically and are never reused within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for SubscriptionId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Listener callback. Receives the reading and its own subscription id, so it
/// can remove itself.
pub type SensorListener = Arc<dyn Fn(&SensorReading, SubscriptionId) + Send + Sync>;

/// Snapshot of one active subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionInfo {
    pub id: SubscriptionId,
    /// Address as given at registration.
    pub address: PinAddress,
    /// Canonical channel the listener is attached to.
    pub channel: PinAddress,
}

/// Open while the subscription is active. Held for the duration of each call.
type Gate = Arc<ReentrantMutex<Cell<bool>>>;

struct Subscription {
    address: PinAddress,
    channel: PinAddress,
    listener: SensorListener,
    gate: Gate,
}

struct ChannelMonitor {
    handle: DecoderHandle,
    listeners: usize,
}

#[derive(Default)]
struct RegistryState {
    // Keyed by id, so iteration order is registration order.
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    channels: HashMap<PinAddress, ChannelMonitor>,
}

struct RegistryInner {
    decoder: DynSignalDecoder,
    resolver: PinResolver,
    next_id: AtomicU64,
    /// Held across decoder subscribe/unsubscribe so a channel is started or
    /// stopped by one caller at a time. Never held while listeners run.
    control: Mutex<()>,
    state: Mutex<RegistryState>,
}

impl RegistryInner {
    /// Listeners attached to `channel` see the same physical line no matter
    /// which scheme was used to name it.
    fn channel_key(&self, address: PinAddress) -> PinAddress {
        match self.resolver.convert_address(address, PinSystem::Gpio) {
            NO_MAPPING => address,
            gpio => PinAddress::gpio(gpio),
        }
    }

    fn dispatch(&self, channel: PinAddress, reading: &SensorReading) -> usize {
        let snapshot: Vec<(SubscriptionId, SensorListener, Gate)> = {
            let state = self.state.lock();
            state
                .subscriptions
                .iter()
                .filter(|(_, sub)| sub.channel == channel)
                .map(|(id, sub)| (*id, Arc::clone(&sub.listener), Arc::clone(&sub.gate)))
                .collect()
        };

        let mut delivered = 0;
        for (id, listener, gate) in snapshot {
            let open = gate.lock();
            if !open.get() {
                continue;
            }
            listener(reading, id);
            delivered += 1;
        }

        debug!(category = "registry", channel = %channel, reading_channel = %reading.channel, delivered, "Reading dispatched");
        delivered
    }
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        state.subscriptions.clear();
        for (channel, monitor) in state.channels.drain() {
            debug!(category = "registry", channel = %channel, handle = %monitor.handle, "Stopping monitor on drop");
            self.decoder.unsubscribe(monitor.handle);
        }
    }
}

/// Registry of sensor listeners in front of a signal decoder.
///
/// Cloning is cheap and every clone refers to the same registry. When the
/// last clone is dropped, every channel still being monitored is released.
/// Listeners that capture a clone keep the registry alive until they are
/// removed, so long-running programs should call
/// [`remove_all`](Self::remove_all) on shutdown.
#[derive(Clone)]
pub struct ListenerRegistry {
    inner: Arc<RegistryInner>,
}

impl ListenerRegistry {
    /// Create a registry that monitors channels through `decoder`.
    pub fn new(decoder: DynSignalDecoder, resolver: PinResolver) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                decoder,
                resolver,
                next_id: AtomicU64::new(1),
                control: Mutex::new(()),
                state: Mutex::new(RegistryState::default()),
            }),
        }
    }

    /// Resolver used for identifiers and channel canonicalization.
    pub fn resolver(&self) -> &PinResolver {
        &self.inner.resolver
    }

    /// Register `listener` for readings on `address`.
    ///
    /// Starts decoder monitoring if this is the first listener on the
    /// channel. A decoder failure is returned unchanged and nothing is
    /// registered.
    pub fn add_listener<F>(&self, address: PinAddress, listener: F) -> Result<SubscriptionId>
    where
        F: Fn(&SensorReading, SubscriptionId) + Send + Sync + 'static,
    {
        let inner = &self.inner;
        let channel = inner.channel_key(address);
        let _control = inner.control.lock();

        let monitored = inner.state.lock().channels.contains_key(&channel);
        let started = if monitored {
            None
        } else {
            let handle = inner.decoder.subscribe(channel, sink_for(inner, channel))?;
            info!(category = "registry", channel = %channel, handle = %handle, "Monitoring started");
            Some(handle)
        };

        let id = SubscriptionId(inner.next_id.fetch_add(1, Ordering::Relaxed));
        {
            let mut state = inner.state.lock();
            if let Some(handle) = started {
                state.channels.insert(channel, ChannelMonitor { handle, listeners: 0 });
            }
            if let Some(monitor) = state.channels.get_mut(&channel) {
                monitor.listeners += 1;
            }
            state.subscriptions.insert(
                id,
                Subscription {
                    address,
                    channel,
                    listener: Arc::new(listener),
                    gate: Arc::new(ReentrantMutex::new(Cell::new(true))),
                },
            );
        }

        info!(category = "registry", id = %id, pin = %address, channel = %channel, "Sensor listener added");
        Ok(id)
    }

    /// Resolve `pin` and register `listener` for it.
    ///
    /// Accepts bare ordinals (`27`) and tagged strings (`"13p"`, `"2w"`).
    pub fn add_sensor_data_listener<P, F>(&self, pin: P, listener: F) -> Result<SubscriptionId>
    where
        P: Into<PinIdentifier>,
        F: Fn(&SensorReading, SubscriptionId) + Send + Sync + 'static,
    {
        let address = self.inner.resolver.parse(&pin.into());
        self.add_listener(address, listener)
    }

    /// Remove a listener.
    ///
    /// Unknown or already removed ids are ignored. Safe to call from inside the
    /// listener being dispatched. If the listener is running on another thread,
    /// waits for that call to finish. Returns whether a subscription was removed.
    pub fn remove_listener(&self, id: SubscriptionId) -> bool {
        let Some(gate) = self.detach(id) else {
            return false;
        };
        gate.lock().set(false);
        true
    }

    // Gates are closed by the caller after the control lock is released, so a
    // running listener can still add or remove other listeners.
    fn detach(&self, id: SubscriptionId) -> Option<Gate> {
        let inner = &self.inner;
        let _control = inner.control.lock();

        let (gate, stopped) = {
            let mut state = inner.state.lock();
            let Some(sub) = state.subscriptions.remove(&id) else {
                debug!(category = "registry", id = %id, "Ignoring removal of unknown listener");
                return None;
            };

            let idle = match state.channels.get_mut(&sub.channel) {
                Some(monitor) => {
                    monitor.listeners = monitor.listeners.saturating_sub(1);
                    monitor.listeners == 0
                }
                None => false,
            };

            info!(category = "registry", id = %id, pin = %sub.address, "Sensor listener removed");
            let stopped = if idle {
                state
                    .channels
                    .remove(&sub.channel)
                    .map(|monitor| (sub.channel, monitor.handle))
            } else {
                None
            };
            (sub.gate, stopped)
        };

        if let Some((channel, handle)) = stopped {
            inner.decoder.unsubscribe(handle);
            info!(category = "registry", channel = %channel, handle = %handle, "Monitoring stopped");
        }
        Some(gate)
    }

    /// Remove every listener and stop all monitoring. Returns how many
    /// listeners were removed.
    pub fn remove_all(&self) -> usize {
        let gates = self.detach_all();
        for gate in &gates {
            gate.lock().set(false);
        }
        gates.len()
    }

    fn detach_all(&self) -> Vec<Gate> {
        let inner = &self.inner;
        let _control = inner.control.lock();

        let (gates, handles) = {
            let mut state = inner.state.lock();
            let gates: Vec<Gate> = std::mem::take(&mut state.subscriptions)
                .into_values()
                .map(|sub| sub.gate)
                .collect();
            let handles: Vec<DecoderHandle> =
                state.channels.drain().map(|(_, monitor)| monitor.handle).collect();
            (gates, handles)
        };

        for handle in &handles {
            inner.decoder.unsubscribe(*handle);
        }

        info!(category = "registry", listeners = gates.len(), channels = handles.len(), "All sensor listeners removed");
        gates
    }

    /// Deliver `reading` to every listener on the channel of `address`.
    ///
    /// Decoder subscriptions arrive here automatically; this is public for
    /// decoders that live in-process. Returns the number of listeners called.
    pub fn dispatch(&self, address: PinAddress, reading: &SensorReading) -> usize {
        let channel = self.inner.channel_key(address);
        self.inner.dispatch(channel, reading)
    }

    /// Number of active subscriptions.
    pub fn len(&self) -> usize {
        self.inner.state.lock().subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.inner.state.lock().subscriptions.contains_key(&id)
    }

    /// Number of channels currently monitored by the decoder.
    pub fn channel_count(&self) -> usize {
        self.inner.state.lock().channels.len()
    }

    /// Active subscriptions in registration order.
    pub fn subscriptions(&self) -> Vec<SubscriptionInfo> {
        self.inner
            .state
            .lock()
            .subscriptions
            .iter()
            .map(|(id, sub)| SubscriptionInfo {
                id: *id,
                address: sub.address,
                channel: sub.channel,
            })
            .collect()
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ListenerRegistry")
            .field("resolver", &self.inner.resolver)
            .field("subscriptions", &state.subscriptions.len())
            .field("channels", &state.channels.len())
            .finish()
    }
}

/// Sink handed to the decoder for `channel`. Holds the registry weakly so the
/// decoder never keeps it alive.
fn sink_for(inner: &Arc<RegistryInner>, channel: PinAddress) -> ReadingSink {
    let registry: Weak<RegistryInner> = Arc::downgrade(inner);
    Arc::new(move |reading: SensorReading| {
        if let Some(inner) = registry.upgrade() {
            inner.dispatch(channel, &reading);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::SignalDecoder;
    use crate::error::Error;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct RecordingDecoder {
        next: AtomicU64,
        active: Mutex<Vec<(DecoderHandle, PinAddress)>>,
        stopped: Mutex<Vec<DecoderHandle>>,
        fail: bool,
    }

    impl SignalDecoder for RecordingDecoder {
        fn subscribe(&self, channel: PinAddress, _sink: ReadingSink) -> Result<DecoderHandle> {
            if self.fail {
                return Err(Error::Decoder("no GPIO access".to_string()));
            }
            let handle = DecoderHandle(self.next.fetch_add(1, Ordering::Relaxed));
            self.active.lock().push((handle, channel));
            Ok(handle)
        }

        fn unsubscribe(&self, handle: DecoderHandle) {
            self.active.lock().retain(|(h, _)| *h != handle);
            self.stopped.lock().push(handle);
        }
    }

    fn registry() -> (Arc<RecordingDecoder>, ListenerRegistry) {
        let decoder = Arc::new(RecordingDecoder::default());
        let registry = ListenerRegistry::new(decoder.clone(), PinResolver::default());
        (decoder, registry)
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let (_decoder, registry) = registry();
        let a = registry.add_listener(PinAddress::gpio(27), |_, _| {}).unwrap();
        let b = registry.add_listener(PinAddress::gpio(27), |_, _| {}).unwrap();
        registry.remove_listener(a);
        let c = registry.add_listener(PinAddress::gpio(27), |_, _| {}).unwrap();

        assert!(a < b && b < c);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_channel_shared_across_schemes() {
        let (decoder, registry) = registry();
        let a = registry.add_listener(PinAddress::gpio(27), |_, _| {}).unwrap();
        let b = registry.add_sensor_data_listener("13p", |_, _| {}).unwrap();
        let c = registry.add_sensor_data_listener("2w", |_, _| {}).unwrap();

        assert_eq!(registry.channel_count(), 1);
        assert_eq!(decoder.active.lock().len(), 1);
        assert_eq!(decoder.active.lock()[0].1, PinAddress::gpio(27));

        registry.remove_listener(a);
        registry.remove_listener(b);
        assert!(decoder.stopped.lock().is_empty());

        registry.remove_listener(c);
        assert_eq!(decoder.stopped.lock().len(), 1);
        assert_eq!(registry.channel_count(), 0);
    }

    #[test]
    fn test_unmapped_address_keyed_as_given() {
        let (decoder, registry) = registry();
        registry.add_listener(PinAddress::new(7, PinSystem::Virtual), |_, _| {}).unwrap();
        assert_eq!(
            decoder.active.lock()[0].1,
            PinAddress::new(7, PinSystem::Virtual)
        );
    }

    #[test]
    fn test_decoder_failure_registers_nothing() {
        let decoder = Arc::new(RecordingDecoder {
            fail: true,
            ..Default::default()
        });
        let registry = ListenerRegistry::new(decoder, PinResolver::default());

        let result = registry.add_listener(PinAddress::gpio(4), |_, _| {});
        assert!(matches!(result, Err(Error::Decoder(_))));
        assert!(registry.is_empty());
        assert_eq!(registry.channel_count(), 0);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let (decoder, registry) = registry();
        let id = registry.add_listener(PinAddress::gpio(4), |_, _| {}).unwrap();

        assert!(!registry.remove_listener(SubscriptionId::from(999)));
        assert!(registry.remove_listener(id));
        assert!(!registry.remove_listener(id));
        assert_eq!(decoder.stopped.lock().len(), 1);
    }

    #[test]
    fn test_listener_removed_by_earlier_listener_is_skipped() {
        let (_decoder, registry) = registry();
        let second_calls = Arc::new(AtomicUsize::new(0));
        let victim = Arc::new(Mutex::new(None::<SubscriptionId>));

        let reg = registry.clone();
        let target = victim.clone();
        let first = registry
            .add_listener(PinAddress::gpio(17), move |_, _| {
                if let Some(id) = *target.lock() {
                    reg.remove_listener(id);
                }
            })
            .unwrap();

        let calls = second_calls.clone();
        let second = registry
            .add_listener(PinAddress::gpio(17), move |_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        *victim.lock() = Some(second);

        let delivered = registry.dispatch(PinAddress::gpio(17), &SensorReading::new('A', 0));
        assert_eq!(delivered, 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
        assert!(registry.contains(first));
        assert!(!registry.contains(second));

        registry.remove_all();
    }

    #[test]
    fn test_remove_all_stops_every_channel() {
        let (decoder, registry) = registry();
        registry.add_listener(PinAddress::gpio(4), |_, _| {}).unwrap();
        registry.add_listener(PinAddress::gpio(17), |_, _| {}).unwrap();
        registry.add_listener(PinAddress::gpio(17), |_, _| {}).unwrap();

        assert_eq!(registry.remove_all(), 3);
        assert!(registry.is_empty());
        assert!(decoder.active.lock().is_empty());
        assert_eq!(decoder.stopped.lock().len(), 2);
    }

    #[test]
    fn test_drop_releases_monitors() {
        let (decoder, registry) = registry();
        registry.add_listener(PinAddress::gpio(4), |_, _| {}).unwrap();
        registry.add_listener(PinAddress::phys(11), |_, _| {}).unwrap();

        drop(registry);
        assert!(decoder.active.lock().is_empty());
        assert_eq!(decoder.stopped.lock().len(), 2);
    }

    #[test]
    fn test_subscriptions_snapshot() {
        let (_decoder, registry) = registry();
        let id = registry.add_sensor_data_listener("13p", |_, _| {}).unwrap();

        let subs = registry.subscriptions();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].id, id);
        assert_eq!(subs[0].address, PinAddress::phys(13));
        assert_eq!(subs[0].channel, PinAddress::gpio(27));
    }
}
