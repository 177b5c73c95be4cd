//! Overlap Engine
//!
//! Answers "which stored surfaces intersect this guest memory region, and
//! where do they land in pixel space?". Used when the renderer wants to
//! sample a texture whose bytes may live in a render target instead of
//! plain guest memory.
//!
//! Candidates that fail their memory fingerprint are pruned into the
//! invalidated pool as a side effect: their guest memory was overwritten
//! behind the store's back, so the host copy no longer represents it.

use rustc_hash::FxHashMap;

use crate::backend::SurfaceBackend;
use crate::memory::GuestMemory;

use super::{StoredSurface, SurfaceStore, next_shared_tag};

/// A stored surface projected into the coordinate space of a requested
/// texture region.
///
/// `src_*` are pixel coordinates on the surface, `dst_*` pixel coordinates
/// on the requested region; `width`/`height` are the transferable extent in
/// surface pixels. `is_clipped` marks overlaps that do not fit whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceOverlap<H> {
    pub handle: H,
    /// Guest base address of the overlapping surface.
    pub base_address: u32,
    pub is_depth: bool,
    pub src_x: u32,
    pub src_y: u32,
    pub dst_x: u32,
    pub dst_y: u32,
    pub width: u32,
    pub height: u32,
    pub is_clipped: bool,
    /// Recency stamp of the surface; results are ordered by it.
    pub last_use_tag: u64,
}

impl<B: SurfaceBackend> SurfaceStore<B> {
    /// Collect every stored surface overlapping the guest region
    /// `[address, address + pitch * height)`, projected into the region's
    /// pixel space.
    ///
    /// Results are ordered oldest-draw first (ties: smaller overlap first),
    /// so a caller compositing them in sequence ends with the most recent
    /// bits on top. Surfaces whose fingerprint no longer matches guest
    /// memory are displaced into the invalidated pool and omitted.
    pub fn get_merged_texture_memory_region(
        &mut self,
        backend: &mut B,
        ctx: &mut B::CommandContext,
        mem: &(impl GuestMemory + ?Sized),
        address: u32,
        required_width: u32,
        required_height: u32,
        required_pitch: u32,
    ) -> Vec<SurfaceOverlap<B::SurfaceHandle>> {
        let limit = address + required_pitch * required_height;
        let mut result = Vec::new();
        let mut dirty: Vec<(u32, bool)> = Vec::new();

        if self.color_range.overlaps(address, limit) {
            scan_map_overlaps(
                &self.color_map,
                false,
                backend,
                ctx,
                mem,
                address,
                required_width,
                required_height,
                required_pitch,
                limit,
                &mut result,
                &mut dirty,
            );
        }
        if self.depth_range.overlaps(address, limit) {
            scan_map_overlaps(
                &self.depth_map,
                true,
                backend,
                ctx,
                mem,
                address,
                required_width,
                required_height,
                required_pitch,
                limit,
                &mut result,
                &mut dirty,
            );
        }

        // Stale candidates lost their backing memory to a guest CPU write;
        // displace them so the next bind starts from fresh bits.
        if !dirty.is_empty() {
            for (stale_address, is_depth) in dirty {
                if self.move_to_invalidated(backend, stale_address, is_depth) {
                    self.cache_tag = next_shared_tag();
                }
            }
            self.enforce_pool_cap();
        }

        if result.len() >= 2 {
            result.sort_by_key(|overlap| {
                (
                    overlap.last_use_tag,
                    u64::from(overlap.width) * u64::from(overlap.height),
                )
            });
        }
        result
    }
}

/// Scan one registry map for overlap candidates.
fn scan_map_overlaps<B: SurfaceBackend>(
    map: &FxHashMap<u32, StoredSurface<B>>,
    is_depth: bool,
    backend: &mut B,
    ctx: &mut B::CommandContext,
    mem: &(impl GuestMemory + ?Sized),
    address: u32,
    required_width: u32,
    required_height: u32,
    required_pitch: u32,
    limit: u32,
    result: &mut Vec<SurfaceOverlap<B::SurfaceHandle>>,
    dirty: &mut Vec<(u32, bool)>,
) {
    for (&base_address, stored) in map {
        let desc = &stored.desc;
        let scale_x = desc.read_aa_mode.sample_scale_x();
        let scale_y = desc.read_aa_mode.sample_scale_y();
        let surface_pitch = desc.rsx_pitch();
        let surface_height = desc.surface_height();

        if base_address >= limit
            || base_address + surface_pitch * surface_height * scale_y <= address
        {
            continue;
        }

        // A single-row request can be served regardless of pitch; taller
        // requests must agree with the candidate row stride.
        if required_height > 1
            && !backend.surface_is_pitch_compatible(&stored.storage, required_pitch)
        {
            continue;
        }

        let handle = B::get(&stored.storage);
        backend.surface_read_barrier(ctx, handle);
        if !desc.test(mem) {
            dirty.push((base_address, is_depth));
            continue;
        }

        let bpp = desc.bpp();
        let overlap = if base_address < address {
            // The requested region starts inside the candidate.
            let int_required_width = required_width / scale_x;
            let int_required_height = required_height / scale_y;
            let offset = address - base_address;
            let src_y = (offset / required_pitch) / scale_y;
            let src_x = ((offset % required_pitch) / bpp) / scale_x;
            let width = int_required_width.min(desc.surface_width().saturating_sub(src_x));
            let height = int_required_height.min(surface_height.saturating_sub(src_y));
            SurfaceOverlap {
                handle,
                base_address,
                is_depth,
                src_x,
                src_y,
                dst_x: 0,
                dst_y: 0,
                width,
                height,
                is_clipped: width < int_required_width || height < int_required_height,
                last_use_tag: desc.last_use_tag,
            }
        } else {
            // The candidate starts at or inside the requested region.
            let int_surface_width = desc.surface_width() * scale_x;
            let int_surface_height = surface_height * scale_y;
            let offset = base_address - address;
            let dst_y = offset / required_pitch;
            let dst_x = (offset % required_pitch) / bpp;
            let width = int_surface_width.min(required_width.saturating_sub(dst_x));
            let height = int_surface_height.min(required_height.saturating_sub(dst_y));
            let is_clipped = width < required_width || height < required_height;
            SurfaceOverlap {
                handle,
                base_address,
                is_depth,
                src_x: 0,
                src_y: 0,
                dst_x,
                dst_y,
                width: width / scale_x,
                height: height / scale_y,
                is_clipped,
                last_use_tag: desc.last_use_tag,
            }
        };
        result.push(overlap);
    }
}
