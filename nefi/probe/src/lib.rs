//! The probe loader (spec §4.1): attaches compiled probe objects to kernel
//! hooks, decodes their ring-buffer records, and publishes typed events.

pub mod attachment;
pub mod decode;
pub mod error;
pub mod loader;

pub use attachment::{Attachment, HookKind, PortSource, RecordKind, ATTACHMENTS};
pub use error::ProbeError;
pub use loader::{Counters, ProbeLoader, MIN_CHANNEL_CAPACITY};
