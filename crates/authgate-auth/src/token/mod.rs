//! Token generation, verification, and lifecycle management.
//!
//! - [`codec`] - stateless HS256 signing/verification of the two token kinds
//! - [`revocation`] - signature denylist and per-subject watermarks
//! - [`service`] - pair issuance, rotation, logout, revoke-all

pub mod codec;
pub mod revocation;
pub mod service;

pub use codec::{Claims, TokenCodec, TokenKind};
pub use revocation::{RevocationReason, RevocationStore};
pub use service::{TokenPair, TokenService, TokenSubject};
