use serde::{Deserialize, Serialize};

/// A network peer, optionally resolved to a workload identity.
///
/// The five identity fields start `None` and are filled in by the identity
/// cache as it learns about the cluster; they are never guessed from the
/// address alone.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Endpoint {
    pub ip: String,
    pub port: u16,
    pub pod: Option<String>,
    pub namespace: Option<String>,
    pub workload: Option<String>,
    pub workload_kind: Option<String>,
    pub service: Option<String>,
}

impl Endpoint {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
            ..Default::default()
        }
    }

    /// Applies identity fields resolved by the identity cache, leaving the
    /// address untouched.
    pub fn with_identity(mut self, identity: &Endpoint) -> Self {
        self.pod = identity.pod.clone();
        self.namespace = identity.namespace.clone();
        self.workload = identity.workload.clone();
        self.workload_kind = identity.workload_kind.clone();
        self.service = identity.service.clone();
        self
    }

    pub fn service_name(&self) -> Option<&str> {
        self.service.as_deref().filter(|s| !s.is_empty())
    }
}
