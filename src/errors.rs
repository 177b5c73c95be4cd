//! Error Types
//!
//! Recoverable store errors. Structural programmer errors (looking up a
//! surface that was never registered via `get_surface_at`) abort with a
//! panic instead, carrying the faulting address; see the method docs.

use thiserror::Error;

/// The error type for surface store operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// The address is referenced by a bound render-target slot and cannot
    /// be invalidated until the next bind-set update releases it.
    #[error("surface at 0x{address:08X} is bound to a render target slot")]
    AddressBound {
        /// Guest base address of the surface.
        address: u32,
    },

    /// No surface of the requested type is registered at the address.
    #[error("no surface registered at 0x{address:08X} (depth: {is_depth})")]
    NoSurface {
        /// Guest base address that was looked up.
        address: u32,
        /// Whether the depth map was searched.
        is_depth: bool,
    },
}

/// Alias for `Result<T, StoreError>`.
pub type Result<T> = std::result::Result<T, StoreError>;
