//! Surface Store
//!
//! The registry at the heart of the crate: two address-indexed maps (color
//! and depth), the bound render-target slots, the invalidated-surface reuse
//! pool, and the range trackers that gate overlap queries.
//!
//! The store's operations are split across files by concern:
//! - `bind.rs`: the bind/rebind protocol and the bind-set update
//! - `overlap.rs`: projecting stored surfaces onto requested texture regions
//! - `memory_tree.rs`: dirty-flag propagation when bound surfaces are drawn
//!
//! # Ownership
//!
//! A host surface storage is owned by exactly one of: a registry map slot,
//! an invalidated-pool slot, or a transient local inside the bind protocol.
//! Bound slots hold `(address, handle)` pairs: non-owning borrows that are
//! re-resolved through the maps, and that stay usable as long as the
//! storage exists anywhere in the store.
//!
//! The store is single-threaded cooperative: the owning renderer serializes
//! all calls, and every operation runs to completion.

mod bind;
mod memory_tree;
mod overlap;
mod readback;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;

use crate::backend::SurfaceBackend;
use crate::descriptor::SurfaceDescriptor;
use crate::errors::{Result, StoreError};
use crate::format::{ColorFormat, DepthFormat};
use crate::settings::StoreSettings;

pub use memory_tree::{MemoryTreeBlock, MemoryTreeRecord};
pub use overlap::SurfaceOverlap;

/// Global stamp generator shared by every store in the process.
static NEXT_SHARED_TAG: AtomicU64 = AtomicU64::new(1);

/// Draw a fresh monotonic stamp. Stamps order cache generations and draw
/// recency; zero is reserved as "never".
pub(crate) fn next_shared_tag() -> u64 {
    NEXT_SHARED_TAG.fetch_add(1, Ordering::Relaxed)
}

/// Number of color render target slots.
pub const COLOR_TARGET_SLOTS: usize = 4;

/// Half-open `[min, max)` interval of guest addresses covered by one of the
/// registry maps. Only ever expands; emptiness short-circuits overlap scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    min: u32,
    max: u32,
}

impl AddressRange {
    const EMPTY: Self = Self { min: u32::MAX, max: 0 };

    #[must_use]
    #[inline]
    pub fn is_empty(self) -> bool {
        self.min >= self.max
    }

    #[inline]
    pub(crate) fn expand(&mut self, start: u32, end: u32) {
        self.min = self.min.min(start);
        self.max = self.max.max(end);
    }

    /// Whether `[start, end)` intersects the tracked interval.
    #[must_use]
    #[inline]
    pub fn overlaps(self, start: u32, end: u32) -> bool {
        !self.is_empty() && start < self.max && end > self.min
    }
}

impl Default for AddressRange {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// A registered surface: the backend storage plus the store's metadata.
pub struct StoredSurface<B: SurfaceBackend> {
    pub storage: B::SurfaceStorage,
    pub desc: SurfaceDescriptor<B::SurfaceHandle>,
}

impl<B: SurfaceBackend> StoredSurface<B> {
    /// Borrow the backend handle for this surface.
    #[must_use]
    #[inline]
    pub fn handle(&self) -> B::SurfaceHandle {
        B::get(&self.storage)
    }
}

/// One bound render-target slot: `address == 0` means unbound.
#[derive(Debug, Clone, Copy)]
struct BoundSlot<H> {
    address: u32,
    handle: Option<H>,
}

impl<H> Default for BoundSlot<H> {
    fn default() -> Self {
        Self {
            address: 0,
            handle: None,
        }
    }
}

/// Address-keyed cache of render surfaces over a host backend `B`.
pub struct SurfaceStore<B: SurfaceBackend> {
    settings: StoreSettings,

    color_map: FxHashMap<u32, StoredSurface<B>>,
    depth_map: FxHashMap<u32, StoredSurface<B>>,
    invalidated_resources: VecDeque<StoredSurface<B>>,

    bound_color: [BoundSlot<B::SurfaceHandle>; COLOR_TARGET_SLOTS],
    bound_depth: BoundSlot<B::SurfaceHandle>,

    color_range: AddressRange,
    depth_range: AddressRange,

    // Cache-generation stamps. `cache_tag` advances whenever the memory
    // structure changes; `memory_tag` remembers the generation the memory
    // tree was built for; `write_tag` the generation last propagated.
    cache_tag: u64,
    write_tag: u64,
    memory_tag: u64,
    memory_tree: Vec<MemoryTreeBlock>,

    // Bound-set parameters recorded for readback.
    bound_color_format: ColorFormat,
    bound_depth_format: DepthFormat,
    clip_width: u32,
    clip_height: u32,
}

impl<B: SurfaceBackend> Default for SurfaceStore<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: SurfaceBackend> SurfaceStore<B> {
    /// Creates an empty store with default [`StoreSettings`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(StoreSettings::default())
    }

    /// Creates an empty store with explicit settings.
    #[must_use]
    pub fn with_settings(settings: StoreSettings) -> Self {
        Self {
            settings,
            color_map: FxHashMap::default(),
            depth_map: FxHashMap::default(),
            invalidated_resources: VecDeque::new(),
            bound_color: [BoundSlot::default(); COLOR_TARGET_SLOTS],
            bound_depth: BoundSlot::default(),
            color_range: AddressRange::EMPTY,
            depth_range: AddressRange::EMPTY,
            cache_tag: next_shared_tag(),
            write_tag: 0,
            memory_tag: 0,
            memory_tree: Vec::new(),
            bound_color_format: ColorFormat::A8R8G8B8,
            bound_depth_format: DepthFormat::Z24S8,
            clip_width: 0,
            clip_height: 0,
        }
    }

    // ── Lookup ─────────────────────────────────────────────────────────────

    /// The color surface registered at `address`, if any.
    #[must_use]
    pub fn color_surface(&self, address: u32) -> Option<&StoredSurface<B>> {
        self.color_map.get(&address)
    }

    /// The depth surface registered at `address`, if any.
    #[must_use]
    pub fn depth_surface(&self, address: u32) -> Option<&StoredSurface<B>> {
        self.depth_map.get(&address)
    }

    /// Mutable access to the color surface at `address`.
    pub fn color_surface_mut(&mut self, address: u32) -> Option<&mut StoredSurface<B>> {
        self.color_map.get_mut(&address)
    }

    /// Mutable access to the depth surface at `address`.
    pub fn depth_surface_mut(&mut self, address: u32) -> Option<&mut StoredSurface<B>> {
        self.depth_map.get_mut(&address)
    }

    /// The surface registered at `address`, searching color then depth.
    ///
    /// # Panics
    ///
    /// Panics if no surface lives at `address`. A miss here is a programmer
    /// error in the caller's address bookkeeping, not a recoverable state.
    #[must_use]
    pub fn get_surface_at(&self, address: u32) -> &StoredSurface<B> {
        self.color_map
            .get(&address)
            .or_else(|| self.depth_map.get(&address))
            .unwrap_or_else(|| panic!("no surface exists at address 0x{address:08X}"))
    }

    /// Number of registered color surfaces.
    #[must_use]
    pub fn color_surface_count(&self) -> usize {
        self.color_map.len()
    }

    /// Number of registered depth surfaces.
    #[must_use]
    pub fn depth_surface_count(&self) -> usize {
        self.depth_map.len()
    }

    /// Number of displaced surfaces waiting in the reuse pool.
    #[must_use]
    pub fn invalidated_count(&self) -> usize {
        self.invalidated_resources.len()
    }

    /// Address bound to color slot `index` (0 when unbound).
    #[must_use]
    pub fn bound_color_address(&self, index: usize) -> u32 {
        self.bound_color[index].address
    }

    /// Handle bound to color slot `index`.
    #[must_use]
    pub fn bound_color_handle(&self, index: usize) -> Option<B::SurfaceHandle> {
        self.bound_color[index].handle
    }

    /// Address bound to the depth slot (0 when unbound).
    #[must_use]
    pub fn bound_depth_address(&self) -> u32 {
        self.bound_depth.address
    }

    /// Handle bound to the depth slot.
    #[must_use]
    pub fn bound_depth_handle(&self) -> Option<B::SurfaceHandle> {
        self.bound_depth.handle
    }

    /// Tracked address interval of the color map.
    #[must_use]
    pub fn color_range(&self) -> AddressRange {
        self.color_range
    }

    /// Tracked address interval of the depth map.
    #[must_use]
    pub fn depth_range(&self) -> AddressRange {
        self.depth_range
    }

    /// The containment records computed by the last memory-tree pass.
    #[must_use]
    pub fn memory_tree(&self) -> &[MemoryTreeBlock] {
        &self.memory_tree
    }

    // ── Invalidation ───────────────────────────────────────────────────────

    /// Displace the surface behind `handle` into the invalidated pool.
    ///
    /// The corresponding map is scanned linearly; an unknown handle is a
    /// silent no-op.
    pub fn invalidate_single_surface(
        &mut self,
        backend: &mut B,
        handle: B::SurfaceHandle,
        is_depth: bool,
    ) {
        let map = if is_depth { &self.depth_map } else { &self.color_map };
        let address = map
            .iter()
            .find(|(_, stored)| B::get(&stored.storage) == handle)
            .map(|(address, _)| *address);
        if let Some(address) = address {
            self.move_to_invalidated(backend, address, is_depth);
            self.cache_tag = next_shared_tag();
        }
    }

    /// Displace the surface registered at `address` into the invalidated
    /// pool.
    ///
    /// Refused while the address is referenced by a bound slot: the next
    /// bind-set update must release it first.
    pub fn invalidate_surface_address(
        &mut self,
        backend: &mut B,
        address: u32,
        is_depth: bool,
    ) -> Result<()> {
        if self.address_is_bound(address, is_depth) {
            log::error!(
                "cannot invalidate surface at 0x{address:08X}: currently bound as a render target"
            );
            return Err(StoreError::AddressBound { address });
        }
        if !self.move_to_invalidated(backend, address, is_depth) {
            return Err(StoreError::NoSurface { address, is_depth });
        }
        self.cache_tag = next_shared_tag();
        Ok(())
    }

    /// Record that surface memory layout changed outside the store's view,
    /// forcing a memory-tree rebuild at the next write propagation.
    pub fn notify_memory_structure_changed(&mut self) {
        self.cache_tag = next_shared_tag();
    }

    // ── Internals shared by the operation modules ──────────────────────────

    /// Whether `address` is referenced by a bound slot of the given type.
    fn address_is_bound(&self, address: u32, is_depth: bool) -> bool {
        if address == 0 {
            return false;
        }
        if is_depth {
            self.bound_depth.address == address
        } else {
            self.bound_color.iter().any(|slot| slot.address == address)
        }
    }

    /// Move the surface at `address` from its map into the invalidated
    /// pool, notifying the backend. Returns false when the map has no entry.
    fn move_to_invalidated(&mut self, backend: &mut B, address: u32, is_depth: bool) -> bool {
        let map = if is_depth {
            &mut self.depth_map
        } else {
            &mut self.color_map
        };
        let Some(stored) = map.remove(&address) else {
            return false;
        };
        log::debug!(
            "displacing {} surface at 0x{address:08X} into the invalidated pool",
            if is_depth { "depth" } else { "color" }
        );
        backend.notify_surface_invalidated(&stored.storage);
        self.invalidated_resources.push_back(stored);
        true
    }

    /// Drop the oldest pooled surfaces beyond the configured cap. Called
    /// after the bind protocol, never before its reuse scan.
    fn enforce_pool_cap(&mut self) {
        while self.invalidated_resources.len() > self.settings.max_invalidated_surfaces {
            self.invalidated_resources.pop_front();
        }
    }
}
