//! Bound-Target Readback Tests
//!
//! Covers:
//! - color readback repacking the pitched download and swapping 32-bit
//!   elements into guest endianness
//! - depth and stencil readback strides
//! - unbound slots and failed maps yielding empty output

mod common;

use common::Harness;
use rsx_surface_store::{AntialiasMode, ColorFormat, DepthFormat, MrtLayout};

/// Bind a 4x2 color target and a 4x2 depth target.
fn bind_small_targets(h: &mut Harness, depth_format: DepthFormat) {
    h.store.prepare_render_target(
        &mut h.backend,
        &mut h.ctx,
        ColorFormat::A8R8G8B8,
        depth_format,
        4,
        2,
        MrtLayout::Surface0,
        AntialiasMode::Center1Sample,
        [0x0100_0000, 0, 0, 0],
        [16, 0, 0, 0],
        0x0200_0000,
        16,
    );
}

#[test]
fn color_readback_packs_and_swaps_rows() {
    let mut h = Harness::new();
    bind_small_targets(&mut h, DepthFormat::Z24S8);
    let handle = h.store.bound_color_handle(0).expect("slot 0 bound");

    // Two rows at the 256-aligned download stride, 16 payload bytes each.
    let mut download = vec![0u8; 512];
    for (index, byte) in download[0..16].iter_mut().enumerate() {
        *byte = index as u8;
    }
    for (index, byte) in download[256..272].iter_mut().enumerate() {
        *byte = 0x10 + index as u8;
    }
    h.backend.download_data.insert(handle.0, download);

    let packed = h.store.read_back_color_target(&mut h.backend, &mut h.ctx, 0);

    // 4 pixels x 2 rows x 4 bytes, each 32-bit element byte-swapped.
    assert_eq!(
        packed,
        vec![
            3, 2, 1, 0, 7, 6, 5, 4, 11, 10, 9, 8, 15, 14, 13, 12, //
            0x13, 0x12, 0x11, 0x10, 0x17, 0x16, 0x15, 0x14, //
            0x1B, 0x1A, 0x19, 0x18, 0x1F, 0x1E, 0x1D, 0x1C,
        ]
    );
}

#[test]
fn depth_readback_packs_depth_elements() {
    let mut h = Harness::new();
    bind_small_targets(&mut h, DepthFormat::Z16);
    let handle = h.store.bound_depth_handle().expect("depth bound");

    let mut download = vec![0u8; 512];
    download[0..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
    download[256..264].copy_from_slice(&[9, 10, 11, 12, 13, 14, 15, 16]);
    h.backend.download_data.insert(handle.0, download);

    let packed = h.store.read_back_depth_target(&mut h.backend, &mut h.ctx);
    assert_eq!(
        packed,
        vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]
    );
}

#[test]
fn stencil_readback_uses_byte_rows() {
    let mut h = Harness::new();
    bind_small_targets(&mut h, DepthFormat::Z24S8);
    let handle = h.store.bound_depth_handle().expect("depth bound");

    let mut download = vec![0u8; 512];
    download[0..4].copy_from_slice(&[0xA0, 0xA1, 0xA2, 0xA3]);
    download[256..260].copy_from_slice(&[0xB0, 0xB1, 0xB2, 0xB3]);
    h.backend.download_data.insert(handle.0, download);

    let packed = h.store.read_back_stencil_target(&mut h.backend, &mut h.ctx);
    assert_eq!(packed, vec![0xA0, 0xA1, 0xA2, 0xA3, 0xB0, 0xB1, 0xB2, 0xB3]);
}

#[test]
fn stencil_readback_of_z16_target_is_empty() {
    let mut h = Harness::new();
    bind_small_targets(&mut h, DepthFormat::Z16);
    let packed = h.store.read_back_stencil_target(&mut h.backend, &mut h.ctx);
    assert!(packed.is_empty(), "z16 carries no stencil plane");
}

#[test]
fn unbound_slot_reads_back_empty() {
    let mut h = Harness::new();
    bind_small_targets(&mut h, DepthFormat::Z24S8);
    let packed = h.store.read_back_color_target(&mut h.backend, &mut h.ctx, 1);
    assert!(packed.is_empty());
}

#[test]
fn failed_map_reads_back_empty() {
    let mut h = Harness::new();
    bind_small_targets(&mut h, DepthFormat::Z24S8);
    h.backend.fail_map = true;
    let packed = h.store.read_back_color_target(&mut h.backend, &mut h.ctx, 0);
    assert!(packed.is_empty());
}
