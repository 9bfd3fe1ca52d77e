//! Dispatcher facade: configuration in, ordered per-item results out.
//!
//! Implementation details are split into submodules under `src/client/`.

pub mod builder;
pub mod core;

pub use builder::ChatDispatcherBuilder;
pub use core::ChatDispatcher;
