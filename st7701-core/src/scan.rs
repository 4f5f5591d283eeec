//! Scan-row address math for the line pointer republished on every
//! end-of-line interrupt.

/// Sentinel line pointer: no further line fetch until the next frame.
pub const LINE_DONE: u32 = 0;

/// Address of the buffer row feeding the pump for `display_row`, or
/// [`LINE_DONE`] once the frame's last line has been queued.
///
/// `row_shift` doubles scan lines for half-resolution geometries:
/// physical rows 2n and 2n+1 both fetch logical row n.
pub fn line_address(
    base: u32,
    bytes_per_row: u32,
    display_row: u32,
    row_shift: u32,
    display_lines: u32,
) -> u32 {
    if display_row >= display_lines {
        LINE_DONE
    } else {
        base + bytes_per_row * (display_row >> row_shift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: u32 = 0x2000_0000;

    #[test]
    fn every_row_maps_to_its_line_start() {
        // Full-res RGB565: 480 pixels * 2 bytes per row.
        for row in 0..480 {
            assert_eq!(
                line_address(BASE, 960, row, 0, 480),
                BASE + 960 * row,
                "row {row}"
            );
        }
    }

    #[test]
    fn sentinel_past_last_row() {
        assert_eq!(line_address(BASE, 960, 480, 0, 480), LINE_DONE);
        assert_eq!(line_address(BASE, 960, 500, 0, 480), LINE_DONE);
    }

    #[test]
    fn half_res_fetches_each_logical_row_twice() {
        // 240x240 RGB565: 480 bytes per logical row, 480 physical lines.
        assert_eq!(line_address(BASE, 480, 0, 1, 480), BASE);
        assert_eq!(line_address(BASE, 480, 1, 1, 480), BASE);
        assert_eq!(line_address(BASE, 480, 2, 1, 480), BASE + 480);
        assert_eq!(line_address(BASE, 480, 479, 1, 480), BASE + 480 * 239);
        assert_eq!(line_address(BASE, 480, 480, 1, 480), LINE_DONE);
    }

    #[test]
    fn indexed_rows_are_one_byte_per_pixel() {
        assert_eq!(line_address(BASE, 480, 7, 0, 480), BASE + 480 * 7);
    }
}
