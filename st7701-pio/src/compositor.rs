//! Producer-side frame copies into the live scanout buffer.
//!
//! The RGB565 path races the beam: it chases the line pointer the
//! interrupt layer republishes and never writes at or ahead of it. The
//! palette path is gated on vsync instead, because palette entries must
//! not change mid-scan.

use core::sync::atomic::Ordering;

use st7701_core::{
    LINE_DONE, PanelGeometry, Region, composite_run, copy_region, update_racing_beam,
};

use crate::scanout::SCANOUT;

/// Pixel index of the scan position within the live buffer, or `None`
/// while the chain is parked between frames. `bytes_per_pixel` is 2 for
/// RGB565 and 1 for indexed.
fn scan_pixel(base: u32, bytes_per_pixel: u32) -> Option<usize> {
    let addr = SCANOUT.next_line_addr.load(Ordering::Acquire);
    if addr == LINE_DONE {
        None
    } else {
        // A pointer into a just-retired buffer wraps to a huge offset,
        // which the boundary computation clamps to "whole frame".
        Some((addr.wrapping_sub(base) / bytes_per_pixel) as usize)
    }
}

pub(crate) fn update_rgb565(geometry: &PanelGeometry, pixels: &[u16], layers: usize) {
    let base = SCANOUT.framebuffer.load(Ordering::Acquire);
    if pixels.as_ptr() as u32 == base {
        return;
    }
    let dst = unsafe { core::slice::from_raw_parts_mut(base as *mut u16, geometry.pixels()) };
    update_racing_beam(dst, pixels, layers, geometry.width as usize, || {
        scan_pixel(base, 2)
    });
}

/// Palette-mode copy. The caller has already waited for vsync and updated
/// the palette table; the whole index buffer is composited in one pass.
pub(crate) fn update_indexed(geometry: &PanelGeometry, pixels: &[u8], layers: usize) {
    let base = SCANOUT.framebuffer.load(Ordering::Acquire);
    let len = geometry.pixels();
    let dst = unsafe { core::slice::from_raw_parts_mut(base as *mut u8, len) };
    composite_run(dst, pixels, layers, 0, len);
}

pub(crate) fn partial_update_rgb565(geometry: &PanelGeometry, pixels: &[u16], region: Region) {
    let base = SCANOUT.framebuffer.load(Ordering::Acquire);
    let dst = unsafe { core::slice::from_raw_parts_mut(base as *mut u16, geometry.pixels()) };
    copy_region(dst, pixels, geometry.width as usize, region);
}

pub(crate) fn partial_update_indexed(geometry: &PanelGeometry, pixels: &[u8], region: Region) {
    let base = SCANOUT.framebuffer.load(Ordering::Acquire);
    let dst = unsafe { core::slice::from_raw_parts_mut(base as *mut u8, geometry.pixels()) };
    copy_region(dst, pixels, geometry.width as usize, region);
}
