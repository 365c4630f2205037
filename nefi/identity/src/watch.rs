//! Sources the identity table from the orchestrator API: Pods and
//! EndpointSlices drive the table directly, ReplicaSets feed the
//! lookup-only owner cache (spec §4.2).

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::api::discovery::v1::EndpointSlice;
use kube::api::ListParams;
use kube::runtime::watcher::{self, Event as WatchEvent};
use kube::{Api, Client};
use nefi_core::Endpoint;
use nefi_task::Shutdown;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::error::IdentityError;
use crate::rs_cache::ReplicaSetCache;
use crate::table::IdentityTable;
use crate::workload::{resolve_workload, OwnerRef};

const SERVICE_LABEL: &str = "kubernetes.io/service-name";

pub struct IdentityCache {
    table: Arc<IdentityTable>,
    rs_cache: Arc<ReplicaSetCache>,
    pods: Api<Pod>,
    slices: Api<EndpointSlice>,
    replica_sets: Api<ReplicaSet>,
}

impl IdentityCache {
    /// Connects to the orchestrator API. `KUBECONFIG` empty/unset selects
    /// in-cluster discovery, matching the environment contract in spec §6.
    pub async fn connect() -> Result<Self, IdentityError> {
        let client = match std::env::var("KUBECONFIG").ok().filter(|p| !p.is_empty()) {
            Some(path) => {
                let kubeconfig = kube::config::Kubeconfig::read_from(&path)
                    .map_err(|e| IdentityError::Config(e.to_string()))?;
                let config = kube::Config::from_custom_kubeconfig(kubeconfig, &Default::default())
                    .await
                    .map_err(|e| IdentityError::Config(e.to_string()))?;
                Client::try_from(config).map_err(IdentityError::Kube)?
            }
            None => Client::try_default().await?,
        };
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: Client) -> Self {
        Self {
            table: Arc::new(IdentityTable::new()),
            rs_cache: Arc::new(ReplicaSetCache::new()),
            pods: Api::all(client.clone()),
            slices: Api::all(client.clone()),
            replica_sets: Api::all(client),
        }
    }

    pub fn table(&self) -> Arc<IdentityTable> {
        self.table.clone()
    }

    pub fn lookup(&self, ip: &str) -> Option<Endpoint> {
        self.table.lookup(ip)
    }

    /// Seeds the table from a full list of each resource, then streams
    /// add/update/delete events until `shutdown` fires. The caller is
    /// notified over `ready` as soon as the initial sync completes (or
    /// fails); a failure there is fatal to the agent's startup.
    pub async fn start(&self, shutdown: Shutdown, ready: oneshot::Sender<Result<(), IdentityError>>) {
        if let Err(e) = self.initial_sync().await {
            warn!(error = %e, "identity: initial sync failed");
            let _ = ready.send(Err(e));
            return;
        }
        info!("identity: initial sync complete");
        let _ = ready.send(Ok(()));

        let pods = watcher::watcher(self.pods.clone(), watcher::Config::default());
        let slices = watcher::watcher(self.slices.clone(), watcher::Config::default());
        let replica_sets = watcher::watcher(self.replica_sets.clone(), watcher::Config::default());

        tokio::pin!(pods, slices, replica_sets);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("identity: shutting down watch loop");
                    return;
                }
                Some(event) = pods.next() => {
                    match event {
                        Ok(event) => self.apply_pod_event(event),
                        Err(e) => warn!(error = %e, "identity: pod watch error"),
                    }
                }
                Some(event) = slices.next() => {
                    match event {
                        Ok(event) => self.apply_slice_event(event),
                        Err(e) => warn!(error = %e, "identity: endpointslice watch error"),
                    }
                }
                Some(event) = replica_sets.next() => {
                    match event {
                        Ok(event) => self.apply_replica_set_event(event),
                        Err(e) => warn!(error = %e, "identity: replicaset watch error"),
                    }
                }
                else => return,
            }
        }
    }

    async fn initial_sync(&self) -> Result<(), IdentityError> {
        let pods = self
            .pods
            .list(&ListParams::default())
            .await
            .map_err(|e| IdentityError::InitialSyncFailed { resource: "pods", source: e })?;
        for pod in pods.items {
            self.index_pod(&pod);
        }

        let replica_sets = self
            .replica_sets
            .list(&ListParams::default())
            .await
            .map_err(|e| IdentityError::InitialSyncFailed { resource: "replicasets", source: e })?;
        for rs in replica_sets.items {
            self.index_replica_set(&rs);
        }

        let slices = self
            .slices
            .list(&ListParams::default())
            .await
            .map_err(|e| IdentityError::InitialSyncFailed { resource: "endpointslices", source: e })?;
        for slice in slices.items {
            self.index_slice(&slice);
        }

        Ok(())
    }

    fn apply_pod_event(&self, event: WatchEvent<Pod>) {
        match event {
            WatchEvent::Apply(pod) => self.index_pod(&pod),
            WatchEvent::Delete(pod) => {
                for ip in pod_ips(&pod) {
                    self.table.remove_ip(&ip);
                }
            }
            WatchEvent::Init | WatchEvent::InitApply(_) | WatchEvent::InitDone => {}
        }
    }

    fn apply_replica_set_event(&self, event: WatchEvent<ReplicaSet>) {
        match event {
            WatchEvent::Apply(rs) => self.index_replica_set(&rs),
            WatchEvent::Delete(rs) => {
                if let Some(name) = rs.metadata.name {
                    self.rs_cache.remove(&name);
                }
            }
            WatchEvent::Init | WatchEvent::InitApply(_) | WatchEvent::InitDone => {}
        }
    }

    fn apply_slice_event(&self, event: WatchEvent<EndpointSlice>) {
        match event {
            WatchEvent::Apply(slice) => self.index_slice(&slice),
            WatchEvent::Delete(slice) => self.deindex_slice(&slice),
            WatchEvent::Init | WatchEvent::InitApply(_) | WatchEvent::InitDone => {}
        }
    }

    fn index_pod(&self, pod: &Pod) {
        let Some(name) = pod.metadata.name.clone() else { return };
        let Some(namespace) = pod.metadata.namespace.clone() else { return };
        let owner = pod
            .metadata
            .owner_references
            .as_ref()
            .and_then(|refs| refs.first())
            .map(|r| OwnerRef { kind: r.kind.clone(), name: r.name.clone() });
        let workload = resolve_workload(&name, owner.as_ref(), self.rs_cache.as_ref());

        for ip in pod_ips(pod) {
            self.table
                .upsert_pod_ip(&ip, &namespace, &name, &workload.name, &workload.kind, 0);
        }
    }

    fn index_replica_set(&self, rs: &ReplicaSet) {
        let Some(name) = rs.metadata.name.clone() else { return };
        let deployment = rs
            .metadata
            .owner_references
            .as_ref()
            .and_then(|refs| refs.iter().find(|r| r.kind == "Deployment"))
            .map(|r| r.name.clone());
        self.rs_cache.record(&name, deployment);
    }

    fn index_slice(&self, slice: &EndpointSlice) {
        let Some(namespace) = slice.metadata.namespace.clone() else { return };
        let Some(service) = slice
            .metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(SERVICE_LABEL))
            .cloned()
        else {
            return;
        };
        for endpoint in &slice.endpoints {
            if let Some(target) = &endpoint.target_ref {
                if target.kind.as_deref() == Some("Pod") {
                    if let Some(pod_name) = &target.name {
                        self.table.record_pod_service(&namespace, pod_name, &service);
                    }
                }
            }
        }
    }

    fn deindex_slice(&self, slice: &EndpointSlice) {
        let Some(namespace) = slice.metadata.namespace.clone() else { return };
        for endpoint in &slice.endpoints {
            if let Some(target) = &endpoint.target_ref {
                if target.kind.as_deref() == Some("Pod") {
                    if let Some(pod_name) = &target.name {
                        self.table.clear_pod_service(&namespace, pod_name);
                    }
                }
            }
        }
    }
}

fn pod_ips(pod: &Pod) -> Vec<String> {
    let mut ips = HashMap::new();
    if let Some(status) = &pod.status {
        if let Some(ip) = &status.pod_ip {
            ips.insert(ip.clone(), ());
        }
        if let Some(extra) = &status.pod_ips {
            for ip in extra {
                ips.insert(ip.ip.clone(), ());
            }
        }
    }
    ips.into_keys().collect()
}
