//! Async primitives shared by the cache, combinators, and router.
//!
//! - [`timeout`]: deadline wrapping with a distinguishable timeout error
//! - [`lazy`]: a zero-argument async producer that runs once and is shared
//!   by every requester

pub mod lazy;
pub mod timeout;

pub use lazy::LazyTask;
pub use timeout::{shave, with_timeout, TimeoutError};
