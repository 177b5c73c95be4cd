//! Surface Descriptor
//!
//! Per-surface metadata tracked alongside the backend storage: recency tag,
//! antialias modes, the guest-memory fingerprint, the dirty flag, and the
//! optional predecessor whose bits seed the surface before first use.
//!
//! # Memory fingerprint
//!
//! Staleness against guest CPU writes is detected by sampling up to five
//! 8-byte words in an X pattern over the surface footprint: top-left,
//! top-right, bottom-left, bottom-right, centroid. The surface is
//! *consistent* iff every armed sample still matches guest memory. An
//! unrelated write rarely lands on all five words, so false-clean results
//! stay improbable; false-dirty results merely waste a reupload.

use crate::backend::SurfaceInfo;
use crate::format::AntialiasMode;
use crate::memory::GuestMemory;

/// Maximum number of fingerprint samples per surface.
pub const MEMORY_TAG_SAMPLE_COUNT: usize = 5;

/// One fingerprint sample: a guest address and the 8-byte word last
/// observed there. `address == 0` past the first slot terminates the array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryTagSample {
    pub address: u32,
    pub value: u64,
}

/// Metadata the store tracks for every registered surface.
///
/// `H` is the backend's copyable surface handle type.
#[derive(Debug, Clone)]
pub struct SurfaceDescriptor<H> {
    /// Guest base address the surface is currently registered at.
    pub base_address: u32,
    /// Monotonic stamp of the last draw that wrote this surface. Recency
    /// key for overlap-result ordering.
    pub last_use_tag: u64,
    /// The X-pattern fingerprint; see module docs.
    pub memory_tag_samples: [MemoryTagSample; MEMORY_TAG_SAMPLE_COUNT],
    /// True iff a dependent memory region may have been externally
    /// modified since the last write.
    pub dirty: bool,
    /// Predecessor surface whose bits should be blitted in before first
    /// use. Cleared on any write.
    pub old_contents: Option<H>,
    /// Antialias mode in effect for the most recent sampling.
    pub read_aa_mode: AntialiasMode,
    /// Antialias mode in effect for the most recent drawing.
    pub write_aa_mode: AntialiasMode,
    /// Opaque guest tile-table slot; carried for the embedder, never
    /// interpreted.
    pub tile: Option<u32>,
    /// Cached geometry of the backend surface.
    pub info: SurfaceInfo,
}

impl<H: Copy> SurfaceDescriptor<H> {
    /// Create a descriptor for a surface installed at `base_address` and
    /// arm its fingerprint there.
    #[must_use]
    pub fn new(base_address: u32, info: SurfaceInfo, write_aa_mode: AntialiasMode) -> Self {
        let mut desc = Self {
            base_address,
            last_use_tag: 0,
            memory_tag_samples: [MemoryTagSample::default(); MEMORY_TAG_SAMPLE_COUNT],
            dirty: false,
            old_contents: None,
            read_aa_mode: write_aa_mode,
            write_aa_mode,
            tile: None,
            info,
        };
        desc.queue_tag(base_address);
        desc
    }

    // ── Geometry accessors ─────────────────────────────────────────────────

    #[must_use]
    #[inline]
    pub fn surface_width(&self) -> u32 {
        self.info.surface_width
    }

    #[must_use]
    #[inline]
    pub fn surface_height(&self) -> u32 {
        self.info.surface_height
    }

    #[must_use]
    #[inline]
    pub fn native_pitch(&self) -> u32 {
        self.info.native_pitch
    }

    #[must_use]
    #[inline]
    pub fn rsx_pitch(&self) -> u32 {
        self.info.rsx_pitch
    }

    #[must_use]
    #[inline]
    pub fn bpp(&self) -> u32 {
        self.info.bpp
    }

    /// Bytes of guest memory covered by the surface.
    #[must_use]
    #[inline]
    pub fn memory_footprint(&self) -> u32 {
        self.info.rsx_pitch * self.info.surface_height
    }

    // ── Fingerprint protocol ───────────────────────────────────────────────

    /// Arm the X-pattern sample addresses for a surface based at `base`.
    ///
    /// Only the `.address` fields are filled in; `.value` fields are
    /// cleared and must be captured later by [`sync_tag`](Self::sync_tag).
    /// Surfaces narrower than two sample words arm a single sample;
    /// single-row surfaces arm at most two.
    pub fn queue_tag(&mut self, base: u32) {
        self.base_address = base;
        self.memory_tag_samples = [MemoryTagSample::default(); MEMORY_TAG_SAMPLE_COUNT];

        let samples = &mut self.memory_tag_samples;
        samples[0].address = base;

        let native_pitch = self.info.native_pitch;
        if native_pitch < 16 {
            return;
        }
        samples[1].address = base + native_pitch - 8;

        let height = self.info.surface_height;
        if height <= 1 {
            return;
        }
        let rsx_pitch = self.info.rsx_pitch;
        samples[2].address = base + (height - 1) * rsx_pitch;
        samples[3].address = base + (height - 1) * rsx_pitch + native_pitch - 8;
        samples[4].address = base + (height / 2) * rsx_pitch + native_pitch / 2;
    }

    /// Snapshot the current guest memory word for every armed sample.
    pub fn sync_tag(&mut self, mem: &(impl GuestMemory + ?Sized)) {
        for (index, sample) in self.memory_tag_samples.iter_mut().enumerate() {
            if index > 0 && sample.address == 0 {
                break;
            }
            sample.value = mem.read_qword(sample.address);
        }
    }

    /// Whether every armed sample still matches guest memory.
    ///
    /// A dirty surface still runs the comparison, but callers should have
    /// acted on [`dirty`](Self::dirty) before sampling; a warning is
    /// emitted to flag the missed barrier.
    #[must_use]
    pub fn test(&self, mem: &(impl GuestMemory + ?Sized)) -> bool {
        if self.dirty {
            log::warn!(
                "surface at 0x{:08X} tested while dirty; contents may be stale",
                self.base_address
            );
        }
        for (index, sample) in self.memory_tag_samples.iter().enumerate() {
            if index > 0 && sample.address == 0 {
                break;
            }
            if mem.read_qword(sample.address) != sample.value {
                return false;
            }
        }
        true
    }

    /// Record a draw into the surface.
    ///
    /// Updates the recency tag (when `tag` is nonzero), refreshes the
    /// fingerprint from guest memory, promotes the write AA mode to the
    /// read mode, and clears both `dirty` and `old_contents`.
    pub fn on_write(&mut self, mem: &(impl GuestMemory + ?Sized), tag: u64) {
        if tag != 0 {
            self.last_use_tag = tag;
        }
        self.sync_tag(mem);
        self.read_aa_mode = self.write_aa_mode;
        self.dirty = false;
        self.old_contents = None;
    }

    /// Record the transition from draw target to sampleable: sampling sees
    /// the mode the surface was last drawn with, and the next draw starts
    /// from 1x.
    pub fn save_aa_mode(&mut self) {
        self.read_aa_mode = self.write_aa_mode;
        self.write_aa_mode = AntialiasMode::Center1Sample;
    }

    /// Adopt `other` as the predecessor bit-source, provided its guest
    /// pitch matches ours; mismatched pitch means incompatible content and
    /// clears the link instead.
    pub fn set_old_contents(&mut self, other: Option<H>, source_rsx_pitch: u32) {
        self.old_contents = match other {
            Some(handle) if source_rsx_pitch == self.info.rsx_pitch => Some(handle),
            _ => None,
        };
    }
}
