//! The stable binary contract shared between the probe, the agent and the
//! collector: kernel record layouts (§6) on one side, the tonic-generated
//! `StreamEvents` RPC contract on the other.

pub mod convert;
pub mod kernel;

pub mod proto {
    tonic::include_proto!("nefi.v1");
}

pub use convert::{build_batch, connection_from_proto, decode_batch, request_from_proto};
