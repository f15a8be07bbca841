//! Keeps a "saved" heart next to every visible track of a music web player,
//! in step with the user's remote library.
//!
//! Everything outside [`web`] is platform-agnostic and runs natively in
//! tests; [`web`] wires it to the page and the WebExtension APIs.

pub mod cache;
pub mod client;
pub mod config;
pub mod credentials;
pub mod debounce;
pub mod dom;
pub mod error;
pub mod reconciler;
pub mod relay;
pub mod toggle;
pub mod track;

#[cfg(target_arch = "wasm32")]
pub mod web;

#[cfg(test)]
mod testing;

pub use error::{Result, SyncError};
