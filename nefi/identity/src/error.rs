use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("kubernetes client error: {0}")]
    Kube(#[from] kube::Error),

    #[error("initial sync of {resource} did not complete: {source}")]
    InitialSyncFailed {
        resource: &'static str,
        #[source]
        source: kube::Error,
    },

    #[error("failed to load kubeconfig: {0}")]
    Config(String),
}
