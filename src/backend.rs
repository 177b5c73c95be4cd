//! Backend Capability Trait
//!
//! The store is polymorphic over the host graphics API through
//! [`SurfaceBackend`]. A backend owns the concrete allocation, state
//! transitions, and download plumbing; the store only decides *which*
//! surface is asked to do *what*, and *when*.
//!
//! # Handle validity
//!
//! `SurfaceHandle` is a copyable borrow token for a `SurfaceStorage`. A
//! handle must stay usable for as long as its storage exists, wherever the
//! store moves that storage (registry map, invalidated pool, or a transient
//! local during a bind). Backends that hand out indices or reference-counted
//! pointers satisfy this naturally.

use crate::format::{ColorFormat, DepthFormat, SurfaceFormat, AntialiasMode};

/// Geometry of a host surface, as the store caches it per descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfaceInfo {
    /// Width in surface pixels (not AA samples).
    pub surface_width: u32,
    /// Height in surface pixels.
    pub surface_height: u32,
    /// Host-side row stride in bytes.
    pub native_pitch: u32,
    /// Row stride as the guest programmed it; may exceed `native_pitch`.
    pub rsx_pitch: u32,
    /// Bytes per pixel of the surface format.
    pub bpp: u32,
}

/// Host graphics backend capability set.
pub trait SurfaceBackend {
    /// Owned host surface resource.
    type SurfaceStorage;
    /// Copyable borrow token for a `SurfaceStorage`; see module docs.
    type SurfaceHandle: Copy + PartialEq;
    /// Command recording context threaded through state transitions.
    type CommandContext;
    /// In-flight readback object returned by the download entry points.
    type DownloadObject;

    /// Borrow the handle out of a storage.
    fn get(storage: &Self::SurfaceStorage) -> Self::SurfaceHandle;

    /// Allocate a fresh host surface. `prior_contents`, when present, is a
    /// displaced surface whose bits the backend may blit in before first
    /// use; no format conversion is prescribed.
    fn create_new_surface(
        &mut self,
        ctx: &mut Self::CommandContext,
        address: u32,
        format: SurfaceFormat,
        width: u32,
        height: u32,
        pitch: u32,
        antialias: AntialiasMode,
        prior_contents: Option<Self::SurfaceHandle>,
    ) -> Self::SurfaceStorage;

    /// Whether a color storage matches the requested shape. `lenient`
    /// permits a looser match (size round-up) during invalidated-pool reuse.
    fn rtt_has_format_width_height(
        &self,
        storage: &Self::SurfaceStorage,
        format: ColorFormat,
        width: u32,
        height: u32,
        lenient: bool,
    ) -> bool;

    /// Depth analogue of [`rtt_has_format_width_height`](Self::rtt_has_format_width_height).
    fn ds_has_format_width_height(
        &self,
        storage: &Self::SurfaceStorage,
        format: DepthFormat,
        width: u32,
        height: u32,
        lenient: bool,
    ) -> bool;

    /// Whether the storage can serve a view with the given guest pitch.
    fn surface_is_pitch_compatible(&self, storage: &Self::SurfaceStorage, pitch: u32) -> bool;

    /// Transition a color surface into a drawable state.
    fn prepare_rtt_for_drawing(&mut self, ctx: &mut Self::CommandContext, handle: Self::SurfaceHandle);
    /// Transition a color surface into a sampleable state.
    fn prepare_rtt_for_sampling(&mut self, ctx: &mut Self::CommandContext, handle: Self::SurfaceHandle);
    /// Transition a depth surface into a drawable state.
    fn prepare_ds_for_drawing(&mut self, ctx: &mut Self::CommandContext, handle: Self::SurfaceHandle);
    /// Transition a depth surface into a sampleable state.
    fn prepare_ds_for_sampling(&mut self, ctx: &mut Self::CommandContext, handle: Self::SurfaceHandle);

    /// Bookkeeping hook: the storage lost its registration, either to a
    /// surface of the opposite type claiming its address or to explicit
    /// invalidation.
    fn notify_surface_invalidated(&mut self, storage: &Self::SurfaceStorage);
    /// Bookkeeping hook: the storage was re-bound unchanged.
    fn notify_surface_persist(&mut self, storage: &Self::SurfaceStorage);

    /// Declare the surface's current bits garbage, optionally seeding them
    /// from `source`, and rebase the surface at `address` with `pitch`.
    fn invalidate_surface_contents(
        &mut self,
        ctx: &mut Self::CommandContext,
        handle: Self::SurfaceHandle,
        source: Option<Self::SurfaceHandle>,
        address: u32,
        pitch: u32,
    );

    /// Geometry of the surface behind `handle`.
    fn get_surface_info(&self, handle: Self::SurfaceHandle) -> SurfaceInfo;

    /// Make pending host GPU writes to the surface visible to subsequent
    /// fingerprint reads.
    fn surface_read_barrier(&mut self, ctx: &mut Self::CommandContext, handle: Self::SurfaceHandle);

    /// Start a color readback. The returned object is later mapped.
    fn issue_download_command(
        &mut self,
        ctx: &mut Self::CommandContext,
        handle: Self::SurfaceHandle,
        format: ColorFormat,
        width: u32,
        height: u32,
    ) -> Self::DownloadObject;

    /// Start a depth-plane readback.
    fn issue_depth_download_command(
        &mut self,
        ctx: &mut Self::CommandContext,
        handle: Self::SurfaceHandle,
        format: DepthFormat,
        width: u32,
        height: u32,
    ) -> Self::DownloadObject;

    /// Start a stencil-plane readback. Rows are delivered at a 256-aligned
    /// stride.
    fn issue_stencil_download_command(
        &mut self,
        ctx: &mut Self::CommandContext,
        handle: Self::SurfaceHandle,
        width: u32,
        height: u32,
    ) -> Self::DownloadObject;

    /// Map a finished download. `None` signals a failed map; the store
    /// turns that into an empty output vector.
    fn map_downloaded_buffer<'a>(&mut self, object: &'a mut Self::DownloadObject)
    -> Option<&'a [u8]>;

    /// Release a mapping established by
    /// [`map_downloaded_buffer`](Self::map_downloaded_buffer).
    fn unmap_downloaded_buffer(&mut self, object: &mut Self::DownloadObject);
}
