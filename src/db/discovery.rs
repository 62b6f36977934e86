//! # Discovery
//!
//! Lists the database targets whose password is changed.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::rotation::Payload;

/// One candidate database endpoint
///
/// `address` is `None` while the endpoint is still being provisioned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredTarget {
    pub id: String,
    pub address: Option<String>,
    /// Free-form metadata (tags, engine, cluster), available to target filters
    pub attributes: BTreeMap<String, String>,
}

impl DiscoveredTarget {
    #[must_use]
    pub fn new(id: impl Into<String>, address: Option<&str>) -> Self {
        Self {
            id: id.into(),
            address: address.map(ToString::to_string),
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Source of database targets
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Return every candidate target. Called once per setter.
    async fn discover(
        &self,
        cancel: &CancellationToken,
        payload: &Payload,
    ) -> Result<Vec<DiscoveredTarget>>;
}

/// Fixed list of targets
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    targets: Vec<DiscoveredTarget>,
}

impl StaticDiscovery {
    #[must_use]
    pub fn new(targets: Vec<DiscoveredTarget>) -> Self {
        Self { targets }
    }

    /// Targets from plain addresses, using the address as id
    #[must_use]
    pub fn from_addresses<S: AsRef<str>>(addresses: &[S]) -> Self {
        Self::new(
            addresses
                .iter()
                .map(|a| DiscoveredTarget::new(a.as_ref(), Some(a.as_ref())))
                .collect(),
        )
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    async fn discover(
        &self,
        _cancel: &CancellationToken,
        _payload: &Payload,
    ) -> Result<Vec<DiscoveredTarget>> {
        Ok(self.targets.clone())
    }
}
