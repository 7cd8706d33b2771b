//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (`core-waveform`, `core-runtime`, `bridge-desktop`).
//! Host applications can depend on `waveform-workspace` and enable the
//! documented features without needing to wire each crate individually.

pub use core_waveform as waveform;

#[cfg(any(feature = "logging", feature = "desktop-shims"))]
pub use core_runtime as runtime;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop as desktop;
