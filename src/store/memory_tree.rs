//! Memory Tree
//!
//! Pre-frame containment pass: for each bound surface, find every other
//! stored surface that lies wholly inside its guest memory footprint. When
//! a draw writes a bound surface, the contained surfaces' host copies stop
//! representing their guest memory, so [`SurfaceStore::on_write`] walks the
//! tree and marks them dirty.
//!
//! The tree is rebuilt lazily: `cache_tag` advances on every structural
//! change, `memory_tag` remembers which generation the tree reflects, and
//! `write_tag` which generation was last propagated. A write between two
//! structural changes reuses the tree as-is.

use crate::backend::SurfaceBackend;
use crate::memory::GuestMemory;

use super::{COLOR_TARGET_SLOTS, SurfaceStore};

/// One surface contained in a bound surface's memory footprint.
///
/// `offset_x`/`offset_y` locate the contained surface in the bound
/// surface's pixel space; `width`/`height` are the contained surface's own
/// pixel extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryTreeRecord {
    /// Guest base address of the contained surface.
    pub address: u32,
    pub is_depth: bool,
    pub offset_x: u32,
    pub offset_y: u32,
    pub width: u32,
    pub height: u32,
}

/// All containment records for one bound surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryTreeBlock {
    /// Guest base address of the bound surface.
    pub memory_address: u32,
    /// One past the last byte of the bound surface's footprint.
    pub memory_end: u32,
    pub records: Vec<MemoryTreeRecord>,
}

impl<B: SurfaceBackend> SurfaceStore<B> {
    /// Rebuild the containment records for every currently bound surface.
    ///
    /// Only surfaces that fit wholly inside the bound footprint are
    /// recorded: a row of the contained surface may not straddle the bound
    /// surface's row stride, and its last row must end inside the
    /// footprint. Partial containment is left to the overlap engine.
    pub fn generate_render_target_memory_tree(&mut self) {
        let mut tree = Vec::new();

        let mut bound: [(u32, bool); COLOR_TARGET_SLOTS + 1] = [(0, false); COLOR_TARGET_SLOTS + 1];
        for (slot, entry) in self.bound_color.iter().zip(bound.iter_mut()) {
            *entry = (slot.address, false);
        }
        bound[COLOR_TARGET_SLOTS] = (self.bound_depth.address, true);

        for (bound_address, bound_is_depth) in bound {
            if bound_address == 0 {
                continue;
            }
            let map = if bound_is_depth {
                &self.depth_map
            } else {
                &self.color_map
            };
            let Some(stored) = map.get(&bound_address) else {
                continue;
            };
            let bound_pitch = stored.desc.rsx_pitch();
            let bound_bpp = stored.desc.bpp();
            let memory_end = bound_address + bound_pitch * stored.desc.surface_height();

            let mut records = Vec::new();
            for (candidates, is_depth) in [(&self.color_map, false), (&self.depth_map, true)] {
                for (&address, candidate) in candidates {
                    if address <= bound_address || address >= memory_end {
                        continue;
                    }
                    let offset = address - bound_address;
                    let offset_y = offset / bound_pitch;
                    let offset_x = (offset % bound_pitch) / bound_bpp;
                    let candidate_width = candidate.desc.surface_width();
                    let candidate_height = candidate.desc.surface_height();
                    let fits_w = (offset % bound_pitch) + candidate.desc.bpp() * candidate_width
                        <= bound_pitch;
                    let fits_h =
                        (offset_y + candidate_height) * bound_pitch <= memory_end - bound_address;
                    if fits_w && fits_h {
                        records.push(MemoryTreeRecord {
                            address,
                            is_depth,
                            offset_x,
                            offset_y,
                            width: candidate_width,
                            height: candidate_height,
                        });
                    }
                }
            }

            if !records.is_empty() {
                tree.push(MemoryTreeBlock {
                    memory_address: bound_address,
                    memory_end,
                    records,
                });
            }
        }

        self.memory_tree = tree;
    }

    /// Record a draw into the bound surfaces.
    ///
    /// `address == 0` means "all bound surfaces"; a nonzero address
    /// restricts propagation and fingerprint refresh to the bound surface
    /// at that address. Surfaces contained in a written footprint are
    /// marked dirty; the written surfaces themselves refresh their
    /// fingerprints and recency tags.
    pub fn on_write(&mut self, mem: &(impl GuestMemory + ?Sized), address: u32) {
        if address == 0 {
            if self.write_tag == self.cache_tag {
                return;
            }
            self.write_tag = self.cache_tag;
        }

        if self.memory_tag != self.cache_tag {
            self.generate_render_target_memory_tree();
            self.memory_tag = self.cache_tag;
        }

        // The tree is detached while marking so the registry maps can be
        // mutated; records hold plain addresses, not references.
        let tree = std::mem::take(&mut self.memory_tree);
        for block in &tree {
            if address != 0 && block.memory_address != address {
                continue;
            }
            for record in &block.records {
                let map = if record.is_depth {
                    &mut self.depth_map
                } else {
                    &mut self.color_map
                };
                if let Some(stored) = map.get_mut(&record.address) {
                    stored.desc.dirty = true;
                }
            }
        }
        self.memory_tree = tree;

        let write_tag = self.write_tag;
        for index in 0..COLOR_TARGET_SLOTS {
            let slot_address = self.bound_color[index].address;
            if slot_address == 0 || (address != 0 && slot_address != address) {
                continue;
            }
            if let Some(stored) = self.color_map.get_mut(&slot_address) {
                stored.desc.on_write(mem, write_tag);
            }
        }

        let depth_address = self.bound_depth.address;
        if depth_address != 0 && (address == 0 || depth_address == address) {
            if let Some(stored) = self.depth_map.get_mut(&depth_address) {
                stored.desc.on_write(mem, write_tag);
            }
        }
    }
}
