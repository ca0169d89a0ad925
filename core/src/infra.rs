//! Shared host → infrastructure map, written by discovery and read at record build time.

use crate::{HostId, InfraInfo};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Cloneable handle; every clone sees the same map.
#[derive(Debug, Clone, Default)]
pub struct InfraIndex {
    inner: Arc<Mutex<HashMap<HostId, InfraInfo>>>,
}

impl InfraIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<HostId, InfraInfo>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Later writes for the same host replace earlier ones.
    pub fn put(&self, host: HostId, info: InfraInfo) {
        self.lock().insert(host, info);
    }

    pub fn get(&self, host: &HostId) -> Option<InfraInfo> {
        self.lock().get(host).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
