#![cfg_attr(not(test), no_std)]
#![cfg_attr(feature = "strict", deny(warnings))]

pub mod buffer;
pub(crate) mod commands;
pub(crate) mod digest;
pub mod dispatch;
pub mod driver;
#[cfg(feature = "examples")]
pub mod example;
pub mod link;
pub mod responses;
pub mod stack;
pub mod urc;
pub mod wifi;

#[cfg(test)]
mod tests;
