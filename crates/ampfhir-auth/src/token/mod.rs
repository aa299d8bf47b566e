//! Bearer token handling.
//!
//! This module turns an `Authorization` header into [`Claims`]: whether the
//! caller is an administrator and which organizations it acts for.

pub mod claims;

pub use claims::{BearerClaimsExtractor, Claims, ClaimsExtractor};
