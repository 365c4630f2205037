//! Local cache of ReplicaSet -> owning Deployment, fed by the ReplicaSet
//! watch stream. ReplicaSets are lookup-only: nothing ever reads the cache
//! as a primary identity source, only as the one extra hop workload
//! resolution needs (spec §4.2).

use std::collections::HashMap;
use std::sync::RwLock;

use crate::workload::ReplicaSetLookup;

#[derive(Default)]
pub struct ReplicaSetCache {
    /// `None` means "this ReplicaSet has no owning Deployment".
    deployment_owner: RwLock<HashMap<String, Option<String>>>,
}

impl ReplicaSetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, replica_set_name: &str, deployment_owner: Option<String>) {
        self.deployment_owner
            .write()
            .unwrap()
            .insert(replica_set_name.to_string(), deployment_owner);
    }

    pub fn remove(&self, replica_set_name: &str) {
        self.deployment_owner.write().unwrap().remove(replica_set_name);
    }
}

impl ReplicaSetLookup for ReplicaSetCache {
    fn deployment_owner(&self, replica_set_name: &str) -> Option<String> {
        self.deployment_owner
            .read()
            .unwrap()
            .get(replica_set_name)
            .cloned()
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_replica_set_resolves_to_no_owner() {
        let cache = ReplicaSetCache::new();
        assert_eq!(cache.deployment_owner("unknown-rs"), None);
    }

    #[test]
    fn records_and_clears_owner() {
        let cache = ReplicaSetCache::new();
        cache.record("frontend-abc12", Some("frontend".to_string()));
        assert_eq!(cache.deployment_owner("frontend-abc12"), Some("frontend".to_string()));
        cache.remove("frontend-abc12");
        assert_eq!(cache.deployment_owner("frontend-abc12"), None);
    }
}
