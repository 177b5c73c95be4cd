//! Bound-Target Readback
//!
//! Convenience drivers that read back the currently bound targets using the
//! format and clip dimensions recorded at the last bind-set update. One-off
//! downloads of arbitrary surfaces go through the free functions in
//! [`crate::readback`].

use crate::backend::SurfaceBackend;
use crate::readback::{download_color_surface, download_depth_surface, download_stencil_surface};

use super::SurfaceStore;

impl<B: SurfaceBackend> SurfaceStore<B> {
    /// Read back the color surface bound to `slot`, packed for guest
    /// memory. Empty when the slot is unbound or the map fails.
    pub fn read_back_color_target(
        &mut self,
        backend: &mut B,
        ctx: &mut B::CommandContext,
        slot: usize,
    ) -> Vec<u8> {
        let Some(handle) = self.bound_color[slot].handle else {
            return Vec::new();
        };
        download_color_surface(
            backend,
            ctx,
            handle,
            self.bound_color_format,
            self.clip_width,
            self.clip_height,
        )
    }

    /// Read back the depth plane of the bound depth surface, packed.
    pub fn read_back_depth_target(
        &mut self,
        backend: &mut B,
        ctx: &mut B::CommandContext,
    ) -> Vec<u8> {
        let Some(handle) = self.bound_depth.handle else {
            return Vec::new();
        };
        download_depth_surface(
            backend,
            ctx,
            handle,
            self.bound_depth_format,
            self.clip_width,
            self.clip_height,
        )
    }

    /// Read back the stencil plane of the bound depth surface. Empty when
    /// no depth target is bound or its format carries no stencil.
    pub fn read_back_stencil_target(
        &mut self,
        backend: &mut B,
        ctx: &mut B::CommandContext,
    ) -> Vec<u8> {
        let Some(handle) = self.bound_depth.handle else {
            return Vec::new();
        };
        if !self.bound_depth_format.has_stencil() {
            return Vec::new();
        }
        download_stencil_surface(backend, ctx, handle, self.clip_width, self.clip_height)
    }
}
