//! `agrolog-auth`: bearer-token authentication boundary.
//!
//! Decoding and claim validation only; this crate knows nothing about HTTP or storage.

pub mod claims;
pub mod jwt;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
