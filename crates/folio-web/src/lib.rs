#![forbid(unsafe_code)]

//! `folio-web` runs the portfolio page's interactive pieces in a browser.
//!
//! Design goals:
//! - **Host-driven I/O**: the embedder pushes observer and media-query events.
//! - **Deterministic time**: the embedder advances a monotonic clock explicitly.
//! - **No blocking / no threads**: suitable for `wasm32-unknown-unknown`.
//!
//! [`PortfolioHost`] is plain Rust and fully testable natively. On `wasm32`
//! the `FolioWeb` type wraps it with a `wasm-bindgen` API over
//! `localStorage`, `matchMedia` and `IntersectionObserver`.

pub mod host;

#[cfg(target_arch = "wasm32")]
mod wasm;

pub use host::{HostConfig, HostError, HostEvent, PortfolioHost, PresentationSnapshot, StepResult};

#[cfg(target_arch = "wasm32")]
pub use wasm::{FolioWeb, LocalStorage};
