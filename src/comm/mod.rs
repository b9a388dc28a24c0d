//! Communication backends and the blocking collective primitives built on
//! them.
//!
//! The point-to-point facade ([`communicator`]) is non-blocking with waitable
//! handles; the collective layer ([`collective`]) composes it into blocking
//! synchronization barriers. Wire payloads are fixed little-endian records
//! ([`wire`]).

pub mod collective;
pub mod communicator;
pub mod wire;
