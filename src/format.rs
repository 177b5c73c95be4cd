//! Surface Format Metadata
//!
//! Register-level enums for the guest GPU's render surface state and the
//! pixel-format tables derived from them:
//!
//! - `ColorFormat` / `DepthFormat`: surface formats as the guest encodes them
//! - `AntialiasMode`: sample layout, with the 1x/2x coordinate scale factors
//! - `MrtLayout`: which of the four color render target slots are enabled
//! - bytes-per-pixel, download (aligned) and packed pitch tables

use smallvec::SmallVec;

/// Rows of a downloaded surface are padded to this boundary by the host.
pub const DOWNLOAD_PITCH_ALIGNMENT: u32 = 256;

/// Color render target format, as written to the guest surface registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorFormat {
    X1R5G5B5Z1R5G5B5,
    X1R5G5B5O1R5G5B5,
    R5G6B5,
    X8R8G8B8Z8R8G8B8,
    X8R8G8B8O8R8G8B8,
    A8R8G8B8,
    B8,
    G8B8,
    W16Z16Y16X16,
    W32Z32Y32X32,
    X32,
    X8B8G8R8Z8B8G8R8,
    X8B8G8R8O8B8G8R8,
    A8B8G8R8,
}

impl ColorFormat {
    /// Bytes per pixel of the format.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::B8 => 1,
            Self::X1R5G5B5Z1R5G5B5
            | Self::X1R5G5B5O1R5G5B5
            | Self::R5G6B5
            | Self::G8B8 => 2,
            Self::X8R8G8B8Z8R8G8B8
            | Self::X8R8G8B8O8R8G8B8
            | Self::A8R8G8B8
            | Self::X32
            | Self::X8B8G8R8Z8B8G8R8
            | Self::X8B8G8R8O8B8G8R8
            | Self::A8B8G8R8 => 4,
            Self::W16Z16Y16X16 => 8,
            Self::W32Z32Y32X32 => 16,
        }
    }

    /// Row stride of a host download of `width` pixels, padded to the
    /// host's row alignment.
    #[must_use]
    pub const fn aligned_pitch(self, width: u32) -> u32 {
        (width * self.bytes_per_pixel() + DOWNLOAD_PITCH_ALIGNMENT - 1)
            & !(DOWNLOAD_PITCH_ALIGNMENT - 1)
    }

    /// Row stride of a tightly packed row of `width` pixels.
    #[must_use]
    pub const fn packed_pitch(self, width: u32) -> u32 {
        width * self.bytes_per_pixel()
    }
}

/// Depth/stencil render target format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthFormat {
    Z16,
    Z24S8,
}

impl DepthFormat {
    /// Bytes per pixel of the depth plane.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Z16 => 2,
            Self::Z24S8 => 4,
        }
    }

    /// Whether the format carries a stencil plane.
    #[must_use]
    pub const fn has_stencil(self) -> bool {
        matches!(self, Self::Z24S8)
    }
}

/// Either kind of surface format. Passed to backend surface creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceFormat {
    Color(ColorFormat),
    Depth(DepthFormat),
}

impl SurfaceFormat {
    /// Bytes per pixel, regardless of surface kind.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Color(f) => f.bytes_per_pixel(),
            Self::Depth(f) => f.bytes_per_pixel(),
        }
    }
}

/// Antialiasing sample layout of a render surface.
///
/// Modes above [`Center1Sample`](Self::Center1Sample) double the horizontal
/// memory footprint; modes above
/// [`DiagonalCentered2Samples`](Self::DiagonalCentered2Samples) also double
/// the vertical footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum AntialiasMode {
    #[default]
    Center1Sample,
    DiagonalCentered2Samples,
    SquareCentered4Samples,
    SquareRotated4Samples,
}

impl AntialiasMode {
    /// Horizontal scale between surface pixels and guest memory samples.
    #[must_use]
    #[inline]
    pub const fn sample_scale_x(self) -> u32 {
        match self {
            Self::Center1Sample => 1,
            _ => 2,
        }
    }

    /// Vertical scale between surface pixels and guest memory samples.
    #[must_use]
    #[inline]
    pub const fn sample_scale_y(self) -> u32 {
        match self {
            Self::Center1Sample | Self::DiagonalCentered2Samples => 1,
            _ => 2,
        }
    }
}

/// Enabled subset of the four color render target slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MrtLayout {
    #[default]
    None,
    Surface0,
    Surface1,
    Surfaces01,
    Surfaces012,
    Surfaces0123,
}

/// Slot indices active for an MRT layout, in bind order.
#[must_use]
pub fn rtt_indexes(layout: MrtLayout) -> SmallVec<[usize; 4]> {
    match layout {
        MrtLayout::None => SmallVec::new(),
        MrtLayout::Surface0 => SmallVec::from_slice(&[0]),
        MrtLayout::Surface1 => SmallVec::from_slice(&[1]),
        MrtLayout::Surfaces01 => SmallVec::from_slice(&[0, 1]),
        MrtLayout::Surfaces012 => SmallVec::from_slice(&[0, 1, 2]),
        MrtLayout::Surfaces0123 => SmallVec::from_slice(&[0, 1, 2, 3]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_per_pixel_follows_element_width() {
        assert_eq!(ColorFormat::B8.bytes_per_pixel(), 1);
        assert_eq!(ColorFormat::R5G6B5.bytes_per_pixel(), 2);
        assert_eq!(ColorFormat::A8R8G8B8.bytes_per_pixel(), 4);
        assert_eq!(ColorFormat::W16Z16Y16X16.bytes_per_pixel(), 8);
        assert_eq!(ColorFormat::W32Z32Y32X32.bytes_per_pixel(), 16);
        assert_eq!(DepthFormat::Z16.bytes_per_pixel(), 2);
        assert_eq!(DepthFormat::Z24S8.bytes_per_pixel(), 4);
    }

    #[test]
    fn aligned_pitch_rounds_up_to_256() {
        assert_eq!(ColorFormat::A8R8G8B8.aligned_pitch(640), 2560);
        assert_eq!(ColorFormat::A8R8G8B8.aligned_pitch(100), 512);
        assert_eq!(ColorFormat::B8.aligned_pitch(1), 256);
        assert_eq!(ColorFormat::R5G6B5.packed_pitch(100), 200);
    }

    #[test]
    fn sample_scales_split_at_two_samples() {
        assert_eq!(AntialiasMode::Center1Sample.sample_scale_x(), 1);
        assert_eq!(AntialiasMode::Center1Sample.sample_scale_y(), 1);
        assert_eq!(AntialiasMode::DiagonalCentered2Samples.sample_scale_x(), 2);
        assert_eq!(AntialiasMode::DiagonalCentered2Samples.sample_scale_y(), 1);
        assert_eq!(AntialiasMode::SquareCentered4Samples.sample_scale_x(), 2);
        assert_eq!(AntialiasMode::SquareCentered4Samples.sample_scale_y(), 2);
        assert_eq!(AntialiasMode::SquareRotated4Samples.sample_scale_y(), 2);
    }

    #[test]
    fn rtt_indexes_match_layout() {
        assert!(rtt_indexes(MrtLayout::None).is_empty());
        assert_eq!(rtt_indexes(MrtLayout::Surface1).as_slice(), &[1]);
        assert_eq!(rtt_indexes(MrtLayout::Surfaces0123).as_slice(), &[0, 1, 2, 3]);
    }
}
