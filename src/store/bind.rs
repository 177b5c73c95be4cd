//! Bind Engine
//!
//! The bind/rebind protocol: given a guest address and a surface shape,
//! hand back a host surface. That is the one already registered there if it
//! still fits, a recycled one from the invalidated pool if a displaced
//! storage matches, or a freshly created one. Displaced surfaces become a
//! bit source so the backend can preserve guest-visible contents across
//! reallocation.
//!
//! The color and depth paths are deliberately parallel rather than factored
//! through one generic body: they consult different shape predicates, and
//! on the pool-reuse branch the color path prepares the surface for drawing
//! *before* invalidating its contents while the depth path does the
//! opposite. Backends may depend on that ordering.

use crate::backend::SurfaceBackend;
use crate::descriptor::SurfaceDescriptor;
use crate::format::{
    AntialiasMode, ColorFormat, DepthFormat, MrtLayout, SurfaceFormat, rtt_indexes,
};

use super::{BoundSlot, StoredSurface, SurfaceStore, next_shared_tag};

impl<B: SurfaceBackend> SurfaceStore<B> {
    /// Bind `address` as a color render target with the given shape.
    ///
    /// Returns the handle of the surface now registered at `address`. The
    /// storage stays owned by the registry; record the handle in a bound
    /// slot via [`prepare_render_target`](Self::prepare_render_target).
    pub fn bind_address_as_color(
        &mut self,
        backend: &mut B,
        ctx: &mut B::CommandContext,
        address: u32,
        format: ColorFormat,
        antialias: AntialiasMode,
        width: u32,
        height: u32,
        pitch: u32,
    ) -> B::SurfaceHandle {
        // A depth surface occupying this address loses it; keep its handle
        // around as a possible bit source for format conversion.
        let mut convert_surface: Option<(B::SurfaceHandle, u32)> = None;
        if let Some(stored) = self.depth_map.remove(&address) {
            backend.notify_surface_invalidated(&stored.storage);
            convert_surface = Some((B::get(&stored.storage), stored.desc.rsx_pitch()));
            self.invalidated_resources.push_back(stored);
        }

        let mut old_surface: Option<StoredSurface<B>> = None;
        if let Some(stored) = self.color_map.get_mut(&address) {
            if backend.rtt_has_format_width_height(&stored.storage, format, width, height, false) {
                let handle = B::get(&stored.storage);
                backend.prepare_rtt_for_drawing(ctx, handle);
                if backend.surface_is_pitch_compatible(&stored.storage, pitch) {
                    backend.notify_surface_persist(&stored.storage);
                } else {
                    backend.invalidate_surface_contents(ctx, handle, None, address, pitch);
                    stored.desc.info = backend.get_surface_info(handle);
                    stored.desc.queue_tag(address);
                    stored.desc.old_contents = None;
                }
                stored.desc.write_aa_mode = antialias;
                return handle;
            }
            // Shape mismatch: displace, but keep the storage at hand; it
            // may still slot back into the pool or seed the new surface.
            old_surface = self.color_map.remove(&address);
        }

        let aa_factor = antialias.sample_scale_y();
        self.color_range
            .expand(address, address + pitch * height * aa_factor);

        let contents_to_copy = old_surface
            .as_ref()
            .map(|stored| (B::get(&stored.storage), stored.desc.rsx_pitch()))
            .or(convert_surface);
        let source_handle = contents_to_copy.map(|(handle, _)| handle);

        let mut reused: Option<StoredSurface<B>> = None;
        for index in 0..self.invalidated_resources.len() {
            let candidate = &self.invalidated_resources[index];
            if backend.rtt_has_format_width_height(&candidate.storage, format, width, height, true)
            {
                let stored = match old_surface.take() {
                    // Swap the displaced surface into the vacated slot so
                    // the queue keeps its length.
                    Some(displaced) => {
                        std::mem::replace(&mut self.invalidated_resources[index], displaced)
                    }
                    None => self
                        .invalidated_resources
                        .remove(index)
                        .expect("reuse scan index is in bounds"),
                };
                reused = Some(stored);
                break;
            }
        }

        let installed = if let Some(mut stored) = reused {
            let handle = B::get(&stored.storage);
            backend.prepare_rtt_for_drawing(ctx, handle);
            backend.invalidate_surface_contents(ctx, handle, source_handle, address, pitch);
            stored.desc =
                SurfaceDescriptor::new(address, backend.get_surface_info(handle), antialias);
            if let Some((source, source_pitch)) = contents_to_copy {
                stored.desc.set_old_contents(Some(source), source_pitch);
            }
            stored
        } else {
            if let Some(displaced) = old_surface.take() {
                self.invalidated_resources.push_back(displaced);
            }
            log::debug!(
                "creating color surface at 0x{address:08X} ({width}x{height}, pitch {pitch})"
            );
            let storage = backend.create_new_surface(
                ctx,
                address,
                SurfaceFormat::Color(format),
                width,
                height,
                pitch,
                antialias,
                source_handle,
            );
            let handle = B::get(&storage);
            let mut desc =
                SurfaceDescriptor::new(address, backend.get_surface_info(handle), antialias);
            if let Some((source, source_pitch)) = contents_to_copy {
                desc.set_old_contents(Some(source), source_pitch);
            }
            StoredSurface { storage, desc }
        };

        let handle = B::get(&installed.storage);
        self.color_map.insert(address, installed);
        self.enforce_pool_cap();
        handle
    }

    /// Bind `address` as the depth/stencil target with the given shape.
    ///
    /// Mirror of [`bind_address_as_color`](Self::bind_address_as_color)
    /// with the reuse-branch ordering inverted; see the module docs.
    pub fn bind_address_as_depth(
        &mut self,
        backend: &mut B,
        ctx: &mut B::CommandContext,
        address: u32,
        format: DepthFormat,
        antialias: AntialiasMode,
        width: u32,
        height: u32,
        pitch: u32,
    ) -> B::SurfaceHandle {
        let mut convert_surface: Option<(B::SurfaceHandle, u32)> = None;
        if let Some(stored) = self.color_map.remove(&address) {
            backend.notify_surface_invalidated(&stored.storage);
            convert_surface = Some((B::get(&stored.storage), stored.desc.rsx_pitch()));
            self.invalidated_resources.push_back(stored);
        }

        let mut old_surface: Option<StoredSurface<B>> = None;
        if let Some(stored) = self.depth_map.get_mut(&address) {
            if backend.ds_has_format_width_height(&stored.storage, format, width, height, false) {
                let handle = B::get(&stored.storage);
                backend.prepare_ds_for_drawing(ctx, handle);
                if backend.surface_is_pitch_compatible(&stored.storage, pitch) {
                    backend.notify_surface_persist(&stored.storage);
                } else {
                    backend.invalidate_surface_contents(ctx, handle, None, address, pitch);
                    stored.desc.info = backend.get_surface_info(handle);
                    stored.desc.queue_tag(address);
                    stored.desc.old_contents = None;
                }
                stored.desc.write_aa_mode = antialias;
                return handle;
            }
            old_surface = self.depth_map.remove(&address);
        }

        let aa_factor = antialias.sample_scale_y();
        self.depth_range
            .expand(address, address + pitch * height * aa_factor);

        let contents_to_copy = old_surface
            .as_ref()
            .map(|stored| (B::get(&stored.storage), stored.desc.rsx_pitch()))
            .or(convert_surface);
        let source_handle = contents_to_copy.map(|(handle, _)| handle);

        let mut reused: Option<StoredSurface<B>> = None;
        for index in 0..self.invalidated_resources.len() {
            let candidate = &self.invalidated_resources[index];
            if backend.ds_has_format_width_height(&candidate.storage, format, width, height, true) {
                let stored = match old_surface.take() {
                    Some(displaced) => {
                        std::mem::replace(&mut self.invalidated_resources[index], displaced)
                    }
                    None => self
                        .invalidated_resources
                        .remove(index)
                        .expect("reuse scan index is in bounds"),
                };
                reused = Some(stored);
                break;
            }
        }

        let installed = if let Some(mut stored) = reused {
            let handle = B::get(&stored.storage);
            backend.invalidate_surface_contents(ctx, handle, source_handle, address, pitch);
            backend.prepare_ds_for_drawing(ctx, handle);
            stored.desc =
                SurfaceDescriptor::new(address, backend.get_surface_info(handle), antialias);
            if let Some((source, source_pitch)) = contents_to_copy {
                stored.desc.set_old_contents(Some(source), source_pitch);
            }
            stored
        } else {
            if let Some(displaced) = old_surface.take() {
                self.invalidated_resources.push_back(displaced);
            }
            log::debug!(
                "creating depth surface at 0x{address:08X} ({width}x{height}, pitch {pitch})"
            );
            let storage = backend.create_new_surface(
                ctx,
                address,
                SurfaceFormat::Depth(format),
                width,
                height,
                pitch,
                antialias,
                source_handle,
            );
            let handle = B::get(&storage);
            let mut desc =
                SurfaceDescriptor::new(address, backend.get_surface_info(handle), antialias);
            if let Some((source, source_pitch)) = contents_to_copy {
                desc.set_old_contents(Some(source), source_pitch);
            }
            StoredSurface { storage, desc }
        };

        let handle = B::get(&installed.storage);
        self.depth_map.insert(address, installed);
        self.enforce_pool_cap();
        handle
    }

    /// Update the bound render-target set for the next draw batch.
    ///
    /// Previously bound surfaces are transitioned to sampleable and their
    /// slots released, then every slot activated by `mrt_layout` (and the
    /// depth slot, when `depth_address` is nonzero) is rebound through the
    /// bind protocol. Color slots bind in the layout's order; depth binds
    /// last.
    pub fn prepare_render_target(
        &mut self,
        backend: &mut B,
        ctx: &mut B::CommandContext,
        color_format: ColorFormat,
        depth_format: DepthFormat,
        clip_width: u32,
        clip_height: u32,
        mrt_layout: MrtLayout,
        antialias: AntialiasMode,
        color_addresses: [u32; super::COLOR_TARGET_SLOTS],
        color_pitches: [u32; super::COLOR_TARGET_SLOTS],
        depth_address: u32,
        depth_pitch: u32,
    ) {
        self.cache_tag = next_shared_tag();
        self.memory_tree.clear();
        self.bound_color_format = color_format;
        self.bound_depth_format = depth_format;
        self.clip_width = clip_width;
        self.clip_height = clip_height;

        for slot in &mut self.bound_color {
            if let Some(handle) = slot.handle.take() {
                backend.prepare_rtt_for_sampling(ctx, handle);
            }
            slot.address = 0;
        }

        for index in rtt_indexes(mrt_layout) {
            let address = color_addresses[index];
            if address == 0 {
                continue;
            }
            let handle = self.bind_address_as_color(
                backend,
                ctx,
                address,
                color_format,
                antialias,
                clip_width,
                clip_height,
                color_pitches[index],
            );
            self.bound_color[index] = BoundSlot {
                address,
                handle: Some(handle),
            };
        }

        if let Some(handle) = self.bound_depth.handle.take() {
            backend.prepare_ds_for_sampling(ctx, handle);
        }
        self.bound_depth.address = 0;

        if depth_address == 0 {
            return;
        }
        let handle = self.bind_address_as_depth(
            backend,
            ctx,
            depth_address,
            depth_format,
            antialias,
            clip_width,
            clip_height,
            depth_pitch,
        );
        self.bound_depth = BoundSlot {
            address: depth_address,
            handle: Some(handle),
        };
    }
}
