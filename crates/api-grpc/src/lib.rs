//! # API gRPC
//!
//! gRPC server implementation for Carelink.
//!
//! Handles:
//! - the `care.v1.Care` service backed by `carelink-core`
//! - `x-api-key` authentication via an interceptor
//! - mapping core errors to `tonic::Status`
//!
//! Uses `api-shared` for the generated protobuf types and conversions.

#![warn(rust_2018_idioms)]

pub use service::{auth_interceptor, pb, to_status, CareService};

pub mod service;
