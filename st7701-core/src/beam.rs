//! Tear-avoiding frame copies: race the beam instead of double buffering.
//!
//! The scanout hardware continuously republishes the address of the next
//! line it will fetch. A producer may safely overwrite anything more than
//! one full line behind that address; the copy loop chases the scan
//! position down the buffer and backs off whenever it catches up.

use embedded_graphics::pixelcolor::Rgb888;

use crate::geometry::Region;

/// A read-only pixel source handed to `update`/`partial_update`.
///
/// Layer planes are stored contiguously, bottom layer first, each plane
/// `width * height` pixels.
pub enum FrameSource<'a> {
    /// Native RGB565 pixels.
    Rgb565 { pixels: &'a [u16], layers: usize },
    /// 8-bit palette indices plus the palette they refer to.
    Indexed {
        pixels: &'a [u8],
        palette: &'a [Rgb888; 256],
        layers: usize,
    },
}

impl FrameSource<'_> {
    pub fn layers(&self) -> usize {
        match self {
            FrameSource::Rgb565 { layers, .. } => *layers,
            FrameSource::Indexed { layers, .. } => *layers,
        }
    }
}

/// One past the last pixel index that may be written without touching the
/// region the hardware is about to scan out.
///
/// `scan_pixel` is the pixel index of the published line pointer, `None`
/// when the pointer is parked at the end-of-frame sentinel. A pointer at
/// the buffer start means the frame has not begun, so the whole buffer is
/// writable. A boundary behind the cursor means the beam has already
/// passed everything left to write.
pub fn safe_limit(
    scan_pixel: Option<usize>,
    cursor: usize,
    width: usize,
    frame_len: usize,
) -> usize {
    let boundary = match scan_pixel {
        None | Some(0) => frame_len,
        // Stay one full line behind the fetch position.
        Some(p) => p.saturating_sub(width),
    };
    use core::cmp::Ordering;
    match boundary.cmp(&cursor) {
        Ordering::Less => frame_len,
        Ordering::Equal => cursor,
        Ordering::Greater => boundary.min(frame_len),
    }
}

/// Copy `src[from..to]` into `dst[from..to]`, flattening layers.
///
/// With one layer this is a straight block copy. With more, the topmost
/// non-zero pixel wins and zero falls through to the layer below; the
/// bottom layer's value is used even when zero.
pub fn composite_run<T>(dst: &mut [T], src: &[T], layers: usize, from: usize, to: usize)
where
    T: Copy + Default + PartialEq,
{
    if layers <= 1 {
        dst[from..to].copy_from_slice(&src[from..to]);
        return;
    }
    let plane = dst.len();
    let transparent = T::default();
    for i in from..to {
        let mut value = src[i];
        for layer in (1..layers).rev() {
            let v = src[layer * plane + i];
            if v != transparent {
                value = v;
                break;
            }
        }
        dst[i] = value;
    }
}

/// Copy a full frame into `dst` without ever writing at or ahead of the
/// advancing scan position reported by `scan_pixel`.
///
/// Loops until the whole frame is copied; when the cursor catches up to
/// the safe boundary it simply polls the scan position again, so the
/// worst case is waiting out the remainder of one scanout pass.
pub fn update_racing_beam<T, F>(
    dst: &mut [T],
    src: &[T],
    layers: usize,
    width: usize,
    mut scan_pixel: F,
) where
    T: Copy + Default + PartialEq,
    F: FnMut() -> Option<usize>,
{
    let frame_len = dst.len();
    let mut cursor = 0;
    while cursor < frame_len {
        let limit = safe_limit(scan_pixel(), cursor, width, frame_len);
        if limit > cursor {
            composite_run(dst, src, layers, cursor, limit);
            cursor = limit;
        }
    }
}

/// Row-by-row rectangular copy for partial updates. Single layer only;
/// the caller guarantees the region is clear of the scan position.
pub fn copy_region<T: Copy>(dst: &mut [T], src: &[T], stride: usize, region: Region) {
    let (x, w) = (region.x as usize, region.w as usize);
    for y in region.y as usize..region.y as usize + region.h as usize {
        let start = y * stride + x;
        dst[start..start + w].copy_from_slice(&src[start..start + w]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_frame_safe_between_frames() {
        assert_eq!(safe_limit(None, 0, 4, 16), 16);
        assert_eq!(safe_limit(Some(0), 0, 4, 16), 16);
    }

    #[test]
    fn boundary_trails_scan_by_one_line() {
        // Scan fetching row 2 of a 4-wide buffer: rows 0..1 writable.
        assert_eq!(safe_limit(Some(8), 0, 4, 16), 4);
    }

    #[test]
    fn caught_up_cursor_makes_no_progress() {
        assert_eq!(safe_limit(Some(8), 4, 4, 16), 4);
    }

    #[test]
    fn beam_passed_cursor_frees_the_rest() {
        assert_eq!(safe_limit(Some(4), 6, 4, 16), 16);
    }

    #[test]
    fn stale_pointer_from_another_buffer_clamps() {
        // A pointer far outside the buffer must never unlock more than
        // the frame itself.
        assert_eq!(safe_limit(Some(1 << 20), 0, 4, 16), 16);
    }

    #[test]
    fn copy_never_writes_at_or_ahead_of_scan() {
        const W: usize = 8;
        const H: usize = 32;
        const LEN: usize = W * H;
        let src: Vec<u16> = (0..LEN as u16).map(|i| i.wrapping_add(1)).collect();
        let mut dst = vec![0u16; LEN];

        // Step the copy loop by hand against a beam advancing one line
        // per poll and wrapping through the end-of-frame sentinel, so
        // every write window can be checked against the scan position.
        let mut scan_row = 1usize;
        let mut cursor = 0usize;
        let mut steps = 0usize;
        while cursor < LEN {
            let scan = if scan_row >= H { None } else { Some(scan_row * W) };
            let limit = safe_limit(scan, cursor, W, LEN);
            if let Some(p) = scan {
                // While the cursor trails the safe boundary, any write
                // window must stay a full line behind the fetch position.
                if limit > cursor && cursor < p - W {
                    assert!(limit <= p - W, "write window reached the beam");
                }
            }
            if limit > cursor {
                composite_run(&mut dst, &src, 1, cursor, limit);
                cursor = limit;
            }
            scan_row = (scan_row + 1) % (H + 4);
            steps += 1;
            assert!(steps < 10_000, "copy loop failed to make progress");
        }
        assert_eq!(dst, src);
        assert!(steps > 1);
    }

    #[test]
    fn racing_copy_completes_against_live_pointer() {
        const W: usize = 4;
        const H: usize = 8;
        let src: [u16; W * H] = core::array::from_fn(|i| i as u16 + 100);
        let mut dst = [0u16; W * H];
        let mut scan_row = 0usize;
        update_racing_beam(&mut dst, &src, 1, W, || {
            scan_row = (scan_row + 1) % (H + 2);
            (scan_row < H).then_some(scan_row * W)
        });
        assert_eq!(dst, src);
    }

    #[test]
    fn beam_race_respects_limit_at_every_step() {
        // Drive safe_limit directly across a frame of scan positions and
        // check the invariant boundary <= scan - width whenever the scan
        // is ahead of the cursor.
        const W: usize = 16;
        const LEN: usize = 16 * W;
        for scan_row in 1..16 {
            for cursor in 0..LEN {
                let limit = safe_limit(Some(scan_row * W), cursor, W, LEN);
                if limit > cursor && cursor < (scan_row - 1) * W {
                    assert!(limit <= (scan_row - 1) * W);
                }
            }
        }
    }

    #[test]
    fn top_layer_wins_zero_falls_through() {
        let src = [
            1, 0, 3, 0, // bottom layer
            0, 0, 9, 7, // top layer
        ];
        let mut dst = [0u16; 4];
        composite_run(&mut dst, &src, 2, 0, 4);
        assert_eq!(dst, [1, 0, 9, 7]);
    }

    #[test]
    fn three_layers_resolve_topmost_nonzero() {
        let src = [
            1, 1, 1, // bottom
            0, 2, 0, // middle
            0, 0, 3, // top
        ];
        let mut dst = [0u8; 3];
        composite_run(&mut dst, &src, 3, 0, 3);
        assert_eq!(dst, [1, 2, 3]);
    }

    #[test]
    fn region_copy_leaves_surroundings_alone() {
        let mut dst = [0u8; 16]; // 4x4
        let src: [u8; 16] = core::array::from_fn(|i| i as u8 + 1);
        copy_region(
            &mut dst,
            &src,
            4,
            Region {
                x: 1,
                y: 1,
                w: 2,
                h: 2,
            },
        );
        #[rustfmt::skip]
        assert_eq!(dst, [
            0, 0,  0,  0,
            0, 6,  7,  0,
            0, 10, 11, 0,
            0, 0,  0,  0,
        ]);
    }
}
