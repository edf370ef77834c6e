#![doc = include_str!("../README.md")]

mod client;
mod common;
pub use client::*;
pub use common::*;
// Public re-export so downstream crates can access `idalloc` via
// `idalloc_tonic_core::idalloc`
pub use idalloc;

/// Generated protobuf messages and gRPC service bindings.
pub mod proto {
    tonic::include_proto!("idalloc");

    /// Encoded descriptor set for gRPC reflection.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("idalloc_descriptor");
}
