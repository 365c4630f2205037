use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Decode(#[from] nefi_core::Error),

    #[error("failed to load probe object {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: aya::EbpfError,
    },

    #[error("no probe objects could be loaded from {0}")]
    NoneLoaded(String),

    #[error("no ring buffer could be opened")]
    NoRingBuffersOpened,
}
