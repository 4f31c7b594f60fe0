#![deny(clippy::await_holding_refcell_ref)]

pub mod client;
pub mod common;
pub mod platform;
pub mod workflow;

#[cfg(test)]
pub(crate) mod tests;

pub type Error = crate::common::error::AutosegError;
pub type Result<T> = std::result::Result<T, Error>;

pub type Map<K, V> = std::collections::BTreeMap<K, V>;

pub const AUTOSEG_VERSION: &str = {
    match option_env!("AUTOSEG_BUILD_VERSION") {
        Some(version) => version,
        None => const_format::concatcp!(env!("CARGO_PKG_VERSION"), "-dev"),
    }
};
