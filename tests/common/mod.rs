//! Common test utilities for rotation integration tests
//!
//! Provides an in-memory database fleet that implements `PasswordClient`,
//! an event recorder, a deterministic secret setter and store fixtures.

#![allow(dead_code, reason = "Not every test binary uses every helper")]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use password_rotation::prelude::*;
use password_rotation::provider::{ReplicaStatus, SecretValue, StoreError};

pub const SECRET_ID: &str = "prod/app/mysql";

/// A password change or verification seen by the fake fleet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCall {
    pub action: &'static str,
    pub hostname: String,
    pub from_password: String,
    pub to_password: String,
}

/// Databases keyed by hostname, each with one password
#[derive(Debug, Default)]
pub struct FakeFleet {
    passwords: Mutex<HashMap<String, String>>,
    /// Remaining failures per hostname; `u32::MAX` fails forever
    failures: Mutex<HashMap<String, u32>>,
    /// Hostnames where verification always fails
    verify_failures: Mutex<HashSet<String>>,
    calls: Mutex<Vec<ClientCall>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    delay: Duration,
}

impl FakeFleet {
    pub fn new(hosts: &[&str], password: &str) -> Self {
        Self {
            passwords: Mutex::new(
                hosts
                    .iter()
                    .map(|h| ((*h).to_string(), password.to_string()))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    /// Every call sleeps for `delay` so calls overlap
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// The next `count` changes on `hostname` fail
    pub fn fail(&self, hostname: &str, count: u32) {
        self.failures
            .lock()
            .unwrap()
            .insert(hostname.to_string(), count);
    }

    /// Every verification on `hostname` fails
    pub fn fail_verify(&self, hostname: &str) {
        self.verify_failures
            .lock()
            .unwrap()
            .insert(hostname.to_string());
    }

    pub fn password(&self, hostname: &str) -> Option<String> {
        self.passwords.lock().unwrap().get(hostname).cloned()
    }

    pub fn calls(&self) -> Vec<ClientCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, hostname: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.hostname == hostname)
            .count()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn should_fail(&self, hostname: &str) -> bool {
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(hostname) {
            Some(remaining) if *remaining > 0 => {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                true
            }
            _ => false,
        }
    }

    async fn enter(&self, action: &'static str, transition: &CredentialTransition) {
        self.calls.lock().unwrap().push(ClientCall {
            action,
            hostname: transition.current.hostname.clone(),
            from_password: transition.current.password.clone(),
            to_password: transition.new.password.clone(),
        });
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PasswordClient for FakeFleet {
    async fn change_password(
        &self,
        _cancel: &CancellationToken,
        transition: &CredentialTransition,
    ) -> Result<()> {
        self.enter("change", transition).await;
        let hostname = transition.current.hostname.as_str();
        if self.should_fail(hostname) {
            bail!("{hostname}: connection reset");
        }

        let mut passwords = self.passwords.lock().unwrap();
        let password = passwords
            .get_mut(hostname)
            .ok_or_else(|| anyhow!("{hostname}: unknown host"))?;
        if *password != transition.current.password {
            bail!("{hostname}: access denied for {}", transition.current.username);
        }
        password.clone_from(&transition.new.password);
        Ok(())
    }

    async fn verify_password(
        &self,
        _cancel: &CancellationToken,
        transition: &CredentialTransition,
    ) -> Result<()> {
        self.enter("verify", transition).await;
        let hostname = transition.new.hostname.as_str();
        if self.verify_failures.lock().unwrap().contains(hostname) {
            bail!("{hostname}: connection refused");
        }
        match self.password(hostname) {
            Some(password) if password == transition.new.password => Ok(()),
            Some(_) => bail!("{hostname}: access denied for {}", transition.new.username),
            None => bail!("{hostname}: unknown host"),
        }
    }
}

/// Records every rotation event
#[derive(Debug, Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<RotationEvent>>,
}

impl RecordingEvents {
    pub fn names(&self) -> Vec<EventName> {
        self.events.lock().unwrap().iter().map(|e| e.name).collect()
    }

    pub fn events(&self) -> Vec<RotationEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventReceiver for RecordingEvents {
    fn receive(&self, event: RotationEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Deterministic credential strategy: sets `password` to `p2` and `v` to `2`
#[derive(Debug, Default)]
pub struct VersionBump;

#[async_trait]
impl SecretSetter for VersionBump {
    async fn init(&self, _cancel: &CancellationToken, _payload: &Payload) -> Result<()> {
        Ok(())
    }

    async fn handler(&self, _cancel: &CancellationToken, payload: &Payload) -> Result<Payload> {
        Ok(payload.clone())
    }

    fn rotate(&self, secret: &mut SecretDocument) -> Result<()> {
        secret.insert("password", "p2");
        secret.insert("v", "2");
        Ok(())
    }

    fn credentials(&self, secret: &SecretDocument) -> (String, String) {
        (
            secret.get("username").unwrap_or_default().to_string(),
            secret.get("password").unwrap_or_default().to_string(),
        )
    }
}

/// In-memory store whose AWSPENDING removal can be made to fail
#[derive(Debug, Clone)]
pub struct FlakyStore {
    inner: InMemorySecretStore,
    fail_pending_removal: Arc<AtomicBool>,
}

impl FlakyStore {
    pub fn new(inner: InMemorySecretStore) -> Self {
        Self {
            inner,
            fail_pending_removal: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn fail_pending_removal(&self, fail: bool) {
        self.fail_pending_removal.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SecretStore for FlakyStore {
    async fn get_secret_value(
        &self,
        secret_id: &str,
        label: StagingLabel,
    ) -> Result<SecretValue, StoreError> {
        self.inner.get_secret_value(secret_id, label).await
    }

    async fn put_secret_value(
        &self,
        secret_id: &str,
        version_id: &str,
        secret_string: &str,
        labels: &[StagingLabel],
    ) -> Result<(), StoreError> {
        self.inner
            .put_secret_value(secret_id, version_id, secret_string, labels)
            .await
    }

    async fn update_version_stage(
        &self,
        secret_id: &str,
        label: StagingLabel,
        remove_from_version_id: Option<&str>,
        move_to_version_id: Option<&str>,
    ) -> Result<(), StoreError> {
        if label == StagingLabel::Pending
            && move_to_version_id.is_none()
            && self.fail_pending_removal.load(Ordering::SeqCst)
        {
            return Err(StoreError::Api {
                operation: "UpdateSecretVersionStage",
                secret_id: secret_id.to_string(),
                source: anyhow!("throttled"),
            });
        }
        self.inner
            .update_version_stage(secret_id, label, remove_from_version_id, move_to_version_id)
            .await
    }

    async fn replication_status(&self, secret_id: &str) -> Result<Vec<ReplicaStatus>, StoreError> {
        self.inner.replication_status(secret_id).await
    }
}

/// Rotation invocation payload
pub fn payload(step: Step, token: &str) -> Payload {
    [
        ("ClientRequestToken", token),
        ("SecretId", SECRET_ID),
        ("Step", step.as_str()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Store with `v1` current: `{"username":"foo","password":"p1","v":"1"}`
pub async fn store_with_current() -> InMemorySecretStore {
    let store = InMemorySecretStore::new();
    store
        .insert_version(
            SECRET_ID,
            "v1",
            r#"{"password":"p1","username":"foo","v":"1"}"#,
            &[StagingLabel::Current],
        )
        .await;
    store
}

/// Store with `v1` current and `v2` pending, the state after createSecret
pub async fn store_with_pending() -> InMemorySecretStore {
    let store = store_with_current().await;
    store
        .insert_version(
            SECRET_ID,
            "v2",
            r#"{"password":"p2","username":"foo","v":"2"}"#,
            &[StagingLabel::Pending],
        )
        .await;
    store
}

pub fn setter_config(parallel: usize, retry: u32) -> SetterConfig {
    SetterConfig {
        parallel,
        retry,
        retry_wait: Duration::from_millis(100),
    }
}

/// Fleet setter over `fleet` with one target per host
pub fn fleet_setter(
    fleet: &Arc<FakeFleet>,
    hosts: &[&str],
    config: SetterConfig,
) -> FleetPasswordSetter {
    FleetPasswordSetter::new(
        Arc::new(StaticDiscovery::from_addresses(hosts)),
        Arc::clone(fleet) as Arc<dyn PasswordClient>,
        config,
    )
}

/// Rotator wired to `store`, `fleet`, [`VersionBump`] and an event recorder
pub fn rotator(
    store: &InMemorySecretStore,
    fleet: &Arc<FakeFleet>,
    hosts: &[&str],
    setter: SetterConfig,
) -> (Rotator<FleetPasswordSetter>, Arc<RecordingEvents>) {
    rotator_with_store(Arc::new(store.clone()), fleet, hosts, setter)
}

pub fn rotator_with_store(
    store: Arc<dyn SecretStore>,
    fleet: &Arc<FakeFleet>,
    hosts: &[&str],
    setter: SetterConfig,
) -> (Rotator<FleetPasswordSetter>, Arc<RecordingEvents>) {
    let events = Arc::new(RecordingEvents::default());
    let rotator = Rotator::new(
        store,
        fleet_setter(fleet, hosts, setter),
        RotatorConfig::default(),
    )
    .with_secret_setter(Arc::new(VersionBump))
    .with_event_receiver(Arc::clone(&events) as Arc<dyn EventReceiver>);
    (rotator, events)
}

pub fn transition() -> CredentialTransition {
    CredentialTransition::new(Credential::new("foo", "p1"), Credential::new("foo", "p2"))
}
