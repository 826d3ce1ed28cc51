//! A connection to one control server.
//!
//! `Link` owns the transport, the output dispatcher and the read cache for one
//! host↔server connection. It is created on connect and discarded on
//! disconnect; nothing is process-global. Device specifics (request paths,
//! safe values) come from a [`Protocol`].

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::broadcast;

use crate::cache::{ReadCache, SensorValue};
use crate::config::ResolvedSettings;
use crate::dispatch::{OutputDispatcher, Submission};
use crate::error::{LinkError, LinkResult};
use crate::failure::{Failure, FailureOrigin, FailureReporter};
use crate::key::{DeviceId, OutputValue, QueryKey, TargetKey};
use crate::transport::{HttpTransport, RejectDisconnected, Transport};

const LOG_TARGET: &str = "robolink::link";

/// How one robot family maps keys and values onto request paths.
pub trait Protocol: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Whether this family has an actuator for `key` taking values shaped
    /// like `value`.
    fn accepts(&self, key: &TargetKey, value: &OutputValue) -> bool;

    /// Request path for sending `value` to `key`. Only called for accepted keys.
    fn output_path(&self, key: &TargetKey, value: &OutputValue) -> String;

    /// Request path for reading `key`, or `None` if this family lacks the sensor.
    fn query_path(&self, key: &QueryKey) -> Option<String>;

    /// Value that puts `key`'s actuator in a safe state on halt, if any.
    fn safe_value(&self, key: &TargetKey) -> Option<OutputValue>;
}

pub struct Link<P> {
    protocol: Arc<P>,
    transport: Arc<dyn Transport>,
    outputs: OutputDispatcher<TargetKey, OutputValue>,
    sensors: ReadCache<QueryKey>,
    failures: FailureReporter,
    runtime: Handle,
    default_device: DeviceId,
}

impl<P: Protocol> Link<P> {
    /// Connect over HTTP to the server named in `settings`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(settings: &ResolvedSettings, protocol: P) -> LinkResult<Self> {
        let transport = HttpTransport::new(&settings.base_url, settings.request_timeout)?;
        let link = Self::with_transport(settings, protocol, transport)?;
        log::info!(
            target: LOG_TARGET,
            "Connected {} link to {}",
            link.protocol.name(),
            settings.base_url
        );
        Ok(link)
    }

    /// Build a link over any transport. The "not connected" sentinel check is
    /// layered on top of `transport`.
    pub fn with_transport<T: Transport>(
        settings: &ResolvedSettings,
        protocol: P,
        transport: T,
    ) -> LinkResult<Self> {
        let runtime = Handle::try_current().map_err(|_| LinkError::NoRuntime)?;
        let transport: Arc<dyn Transport> = Arc::new(RejectDisconnected::new(
            transport,
            settings.disconnected_sentinel.clone(),
        ));
        let protocol = Arc::new(protocol);
        let failures = FailureReporter::new();

        let builder_protocol = Arc::clone(&protocol);
        let outputs = OutputDispatcher::new(
            runtime.clone(),
            Arc::clone(&transport),
            Arc::new(move |key: &TargetKey, value: &OutputValue| {
                builder_protocol.output_path(key, value)
            }),
            failures.clone(),
        );
        let sensors = ReadCache::new(
            runtime.clone(),
            Arc::clone(&transport),
            settings.cache_window,
            failures.clone(),
        );

        Ok(Self {
            protocol,
            transport,
            outputs,
            sensors,
            failures,
            runtime,
            default_device: settings.default_device.clone(),
        })
    }

    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    /// Device identity used when a caller does not name one.
    pub fn default_device(&self) -> &DeviceId {
        &self.default_device
    }

    /// Coalesced send of `value` to `key`'s actuator. Never waits on the device.
    pub fn submit(&self, key: TargetKey, value: OutputValue) -> LinkResult<Submission> {
        if !self.protocol.accepts(&key, &value) {
            return Err(LinkError::unsupported(format!(
                "{} has no actuator {} taking {}",
                self.protocol.name(),
                key,
                value
            )));
        }
        Ok(self.outputs.submit(key, value))
    }

    /// Cached read of `key`'s sensor.
    pub async fn read(&self, key: &QueryKey) -> LinkResult<SensorValue> {
        let Some(path) = self.protocol.query_path(key) else {
            return Err(LinkError::unsupported(format!(
                "{} has no sensor {}",
                self.protocol.name(),
                key
            )));
        };
        self.sensors.read(key, move |_| path).await
    }

    /// The live cached value for `key`, if any, without a transport call.
    pub fn peek(&self, key: &QueryKey) -> Option<SensorValue> {
        self.sensors.peek(key)
    }

    /// Send a one-shot command that is neither coalesced nor cached, and wait
    /// for the server's reply.
    pub async fn send_once(&self, path: &str) -> LinkResult<String> {
        let result = self.transport.perform(path).await;
        if let Err(err) = &result {
            self.failures
                .report(FailureOrigin::OneShot, path, err.clone());
        }
        result
    }

    /// Fire-and-forget variant of [`Link::send_once`].
    pub fn fire(&self, path: String) {
        let transport = Arc::clone(&self.transport);
        let failures = self.failures.clone();
        self.runtime.spawn(async move {
            if let Err(err) = transport.perform(&path).await {
                failures.report(FailureOrigin::OneShot, path, err);
            }
        });
    }

    /// Submit every known actuator's safe value (host stop signal).
    pub fn halt_all(&self) -> usize {
        let protocol = Arc::clone(&self.protocol);
        self.outputs.halt_all(|key| protocol.safe_value(key))
    }

    pub fn subscribe_failures(&self) -> broadcast::Receiver<Failure> {
        self.failures.subscribe()
    }

    pub fn outputs(&self) -> &OutputDispatcher<TargetKey, OutputValue> {
        &self.outputs
    }

    pub fn sensors(&self) -> &ReadCache<QueryKey> {
        &self.sensors
    }

    /// Resolve once no output send is outstanding.
    pub async fn idle(&self) {
        self.outputs.idle().await
    }

    /// Discard the link. Sends already started run to completion.
    pub fn disconnect(self) {
        log::info!(
            target: LOG_TARGET,
            "Disconnecting {} link ({} sends outstanding)",
            self.protocol.name(),
            self.outputs.in_flight()
        );
    }
}
