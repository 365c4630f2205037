//! Workload resolution from a pod's owner reference chain (spec §4.2).

/// A minimal view of a Kubernetes `OwnerReference`, decoupled from the
/// `k8s-openapi` type so this module stays unit-testable without a
/// cluster.
#[derive(Debug, Clone)]
pub struct OwnerRef {
    pub kind: String,
    pub name: String,
}

/// The answer to "what owns this pod": a workload name and its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workload {
    pub name: String,
    pub kind: String,
}

/// Looks up a ReplicaSet's own owning Deployment, if any. Implemented
/// against the live cluster by [`crate::watch`]; a fake is used in tests.
pub trait ReplicaSetLookup {
    fn deployment_owner(&self, replica_set_name: &str) -> Option<String>;
}

/// Resolves the workload that owns `pod_name`, applying the fallback chain
/// from spec §4.2.
pub fn resolve_workload(
    pod_name: &str,
    owner: Option<&OwnerRef>,
    rs_lookup: &dyn ReplicaSetLookup,
) -> Workload {
    let owner = match owner {
        None => {
            return Workload {
                name: pod_name.to_string(),
                kind: "Pod".to_string(),
            }
        }
        Some(owner) => owner,
    };

    match owner.kind.as_str() {
        "ReplicaSet" => match rs_lookup.deployment_owner(&owner.name) {
            Some(deployment) => Workload {
                name: deployment,
                kind: "Deployment".to_string(),
            },
            None => Workload {
                name: strip_hash_suffix(&owner.name),
                kind: "ReplicaSet".to_string(),
            },
        },
        "StatefulSet" | "DaemonSet" | "Job" => Workload {
            name: owner.name.clone(),
            kind: owner.kind.clone(),
        },
        other => Workload {
            name: owner.name.clone(),
            kind: other.to_string(),
        },
    }
}

/// Strips a trailing hash suffix from a ReplicaSet name: the last
/// `-`-delimited token, if it is alphanumeric and 5-16 characters long.
pub fn strip_hash_suffix(name: &str) -> String {
    match name.rsplit_once('-') {
        Some((prefix, suffix))
            if (5..=16).contains(&suffix.len()) && suffix.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            prefix.to_string()
        }
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoDeployment;
    impl ReplicaSetLookup for NoDeployment {
        fn deployment_owner(&self, _replica_set_name: &str) -> Option<String> {
            None
        }
    }

    struct WithDeployment(&'static str);
    impl ReplicaSetLookup for WithDeployment {
        fn deployment_owner(&self, _replica_set_name: &str) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    #[test]
    fn no_owner_resolves_to_pod_itself() {
        let w = resolve_workload("standalone-pod", None, &NoDeployment);
        assert_eq!(w, Workload { name: "standalone-pod".into(), kind: "Pod".into() });
    }

    #[test]
    fn replica_set_with_deployment_owner_resolves_to_deployment() {
        let owner = OwnerRef { kind: "ReplicaSet".into(), name: "frontend-7d8f9c6b5".into() };
        let w = resolve_workload("p1", Some(&owner), &WithDeployment("frontend"));
        assert_eq!(w, Workload { name: "frontend".into(), kind: "Deployment".into() });
    }

    #[test]
    fn replica_set_without_deployment_owner_strips_hash_suffix() {
        let owner = OwnerRef { kind: "ReplicaSet".into(), name: "p1-rs-abc12".into() };
        let w = resolve_workload("p1", Some(&owner), &NoDeployment);
        assert_eq!(w, Workload { name: "p1-rs".into(), kind: "ReplicaSet".into() });
    }

    #[test]
    fn replica_set_name_without_qualifying_suffix_is_kept_whole() {
        let owner = OwnerRef { kind: "ReplicaSet".into(), name: "abc".into() };
        let w = resolve_workload("p1", Some(&owner), &NoDeployment);
        assert_eq!(w, Workload { name: "abc".into(), kind: "ReplicaSet".into() });
    }

    #[test]
    fn stateful_set_owner_passes_through() {
        let owner = OwnerRef { kind: "StatefulSet".into(), name: "db".into() };
        let w = resolve_workload("db-0", Some(&owner), &NoDeployment);
        assert_eq!(w, Workload { name: "db".into(), kind: "StatefulSet".into() });
    }

    #[test]
    fn unknown_owner_kind_passes_through_verbatim() {
        let owner = OwnerRef { kind: "CronJob".into(), name: "nightly".into() };
        let w = resolve_workload("nightly-123", Some(&owner), &NoDeployment);
        assert_eq!(w, Workload { name: "nightly".into(), kind: "CronJob".into() });
    }

    #[test]
    fn scenario_c_identity_enrichment_workload_resolution() {
        let owner = OwnerRef { kind: "ReplicaSet".into(), name: "p1-rs-abc12".into() };
        let w = resolve_workload("p1", Some(&owner), &WithDeployment("frontend"));
        assert_eq!(w, Workload { name: "frontend".into(), kind: "Deployment".into() });
    }
}
