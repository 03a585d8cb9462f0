//! # API Shared
//!
//! Shared definitions for the Carelink APIs.
//!
//! Contains:
//! - Protobuf-generated types (`pb` module) for health, identity challenges and matching
//! - REST request/response bodies ([`dto`]) and core-to-wire conversions ([`convert`])
//! - Authentication helpers usable by both gRPC and REST
//! - Environment-driven service wiring for the binaries ([`bootstrap`])
//!
//! Used by `api-grpc` and `api-rest`.

// The generated code is placed into OUT_DIR at build time by the build script.
pub mod pb {
    tonic::include_proto!("care.v1");
}

pub mod auth;
pub mod bootstrap;
pub mod convert;
pub mod dto;
pub mod health;

pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("proto_descriptor");

pub use health::HealthService;
pub use pb::*;
