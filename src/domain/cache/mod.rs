//! Cache domain - byte-oriented cache client abstraction

mod client;
mod key;

pub use client::CacheClient;
pub use key::KeySpace;

#[cfg(test)]
pub use client::mock::MockCache;
