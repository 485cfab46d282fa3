//! Session token authentication.
//!
//! Tokens are issued by the sub-application's own login flow; this crate only
//! reads them. See [`verifier`].

pub mod verifier;

pub use verifier::{Claims, JwtVerifier, TokenVerifier, VerifyError};
