//! Readback Pack
//!
//! Turns a pitched host download into the tightly packed, guest-endian byte
//! layout the emulated program expects to find in memory. The host delivers
//! rows padded to [`DOWNLOAD_PITCH_ALIGNMENT`](crate::format::DOWNLOAD_PITCH_ALIGNMENT)
//! and in host byte order; the guest wants packed rows and, for 16- and
//! 32-bit elements, big-endian words.
//!
//! A failed buffer map yields an empty vector; the backend surfaces the
//! underlying error through its own channels.

use crate::backend::SurfaceBackend;
use crate::format::{ColorFormat, DOWNLOAD_PITCH_ALIGNMENT, DepthFormat};

/// How the elements of a row are rewritten while packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackMode {
    /// Plain byte copy (8-bit elements, and the 64/128-bit gather formats,
    /// which so far need no swap).
    Copy,
    /// Byte-swap every 16-bit element into guest endianness.
    Swap16,
    /// Byte-swap every 32-bit element into guest endianness.
    Swap32,
}

/// Pack mode for a color format's readback.
#[must_use]
pub fn color_pack_mode(format: ColorFormat) -> PackMode {
    match format {
        ColorFormat::B8 | ColorFormat::W16Z16Y16X16 | ColorFormat::W32Z32Y32X32 => PackMode::Copy,
        ColorFormat::G8B8
        | ColorFormat::R5G6B5
        | ColorFormat::X1R5G5B5Z1R5G5B5
        | ColorFormat::X1R5G5B5O1R5G5B5 => PackMode::Swap16,
        ColorFormat::A8B8G8R8
        | ColorFormat::A8R8G8B8
        | ColorFormat::X8B8G8R8O8B8G8R8
        | ColorFormat::X8B8G8R8Z8B8G8R8
        | ColorFormat::X8R8G8B8O8R8G8B8
        | ColorFormat::X8R8G8B8Z8R8G8B8
        | ColorFormat::X32 => PackMode::Swap32,
    }
}

/// Copy `height` rows of `dst_pitch` payload bytes out of a buffer whose
/// rows are `src_pitch` apart, applying the element rewrite.
///
/// A source buffer shorter than the requested extent truncates the output
/// at the last complete row.
#[must_use]
pub fn repack_rows(
    src: &[u8],
    src_pitch: u32,
    dst_pitch: u32,
    height: u32,
    mode: PackMode,
) -> Vec<u8> {
    let src_pitch = src_pitch as usize;
    let dst_pitch = dst_pitch as usize;
    let mut packed = Vec::with_capacity(dst_pitch * height as usize);

    for row in 0..height as usize {
        let start = row * src_pitch;
        let Some(src_row) = src.get(start..start + dst_pitch) else {
            break;
        };
        match mode {
            PackMode::Copy => packed.extend_from_slice(src_row),
            PackMode::Swap16 => {
                for element in src_row.chunks_exact(2) {
                    packed.extend_from_slice(&[element[1], element[0]]);
                }
            }
            PackMode::Swap32 => {
                for element in src_row.chunks_exact(4) {
                    packed.extend_from_slice(&[element[3], element[2], element[1], element[0]]);
                }
            }
        }
    }
    packed
}

/// Row stride the host uses for a depth download.
#[must_use]
pub fn depth_aligned_pitch(format: DepthFormat, width: u32) -> u32 {
    (width * format.bytes_per_pixel() + DOWNLOAD_PITCH_ALIGNMENT - 1)
        & !(DOWNLOAD_PITCH_ALIGNMENT - 1)
}

/// Row stride the host uses for a stencil download (one byte per pixel).
#[must_use]
pub fn stencil_aligned_pitch(width: u32) -> u32 {
    (width + DOWNLOAD_PITCH_ALIGNMENT - 1) & !(DOWNLOAD_PITCH_ALIGNMENT - 1)
}

/// Download a color surface and pack it for guest-visible memory.
pub fn download_color_surface<B: SurfaceBackend>(
    backend: &mut B,
    ctx: &mut B::CommandContext,
    handle: B::SurfaceHandle,
    format: ColorFormat,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let mut object = backend.issue_download_command(ctx, handle, format, width, height);
    let packed = match backend.map_downloaded_buffer(&mut object) {
        Some(bytes) => repack_rows(
            bytes,
            format.aligned_pitch(width),
            format.packed_pitch(width),
            height,
            color_pack_mode(format),
        ),
        None => Vec::new(),
    };
    backend.unmap_downloaded_buffer(&mut object);
    packed
}

/// Download the depth plane of a depth/stencil surface, packed.
pub fn download_depth_surface<B: SurfaceBackend>(
    backend: &mut B,
    ctx: &mut B::CommandContext,
    handle: B::SurfaceHandle,
    format: DepthFormat,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let mut object = backend.issue_depth_download_command(ctx, handle, format, width, height);
    let packed = match backend.map_downloaded_buffer(&mut object) {
        Some(bytes) => repack_rows(
            bytes,
            depth_aligned_pitch(format, width),
            width * format.bytes_per_pixel(),
            height,
            PackMode::Copy,
        ),
        None => Vec::new(),
    };
    backend.unmap_downloaded_buffer(&mut object);
    packed
}

/// Download the stencil plane of a depth/stencil surface, packed.
pub fn download_stencil_surface<B: SurfaceBackend>(
    backend: &mut B,
    ctx: &mut B::CommandContext,
    handle: B::SurfaceHandle,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let mut object = backend.issue_stencil_download_command(ctx, handle, width, height);
    let packed = match backend.map_downloaded_buffer(&mut object) {
        Some(bytes) => repack_rows(
            bytes,
            stencil_aligned_pitch(width),
            width,
            height,
            PackMode::Copy,
        ),
        None => Vec::new(),
    };
    backend.unmap_downloaded_buffer(&mut object);
    packed
}
