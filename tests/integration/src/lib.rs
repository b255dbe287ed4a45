//! End-to-end tests over real sockets
//!
//! Every role runs as its own axum server on an ephemeral loopback port:
//! - leaf sensors → leader gather
//! - router → leader with candidate fallback
//! - backend → router with session persistence
//! - shared-key rejection and strict resolution at each hop

pub mod test_utils;

#[cfg(test)]
mod mesh_path_tests;

#[cfg(test)]
mod resolution_tests;
