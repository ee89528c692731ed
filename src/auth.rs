//! Bearer credential model and the cache that keeps it fresh.

pub mod credential;
pub mod grant;
pub mod secret;
pub mod token_cache;

pub use credential::*;
pub use grant::*;
pub use secret::*;
pub use token_cache::*;
