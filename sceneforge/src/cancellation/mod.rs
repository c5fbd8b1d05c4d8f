//! Cooperative cancellation for abandoned runs.

mod token;

pub use token::CancelToken;
