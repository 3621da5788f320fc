//! Top-level facade crate for reqmon.
//!
//! Re-exports the core metric types and the axum integration so users can depend on a single crate.

pub mod core {
    pub use reqmon_core::*;
}

pub mod axum {
    pub use reqmon_axum::*;
}
