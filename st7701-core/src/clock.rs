//! Clock divider derivation for the timing and pump state machines.

/// Fastest the timing state machine may run. Above this the panel's dot
/// clock input is out of spec.
pub const MAX_PIO_CLOCK_HZ: u32 = 34_000_000;

/// Integer clock dividers for the scanout state machines.
///
/// The timing generator counts whole dot clocks, so it runs at the dot
/// clock rate. The pixel pump emits two pixels per FIFO word and must keep
/// pace with the dot clock, so for a full-width panel it runs at twice the
/// timing rate (half the divider); at half horizontal resolution each
/// pixel covers two dot clocks and both machines share one divider.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScanClocks {
    pub timing_divider: u32,
    pub pump_divider: u32,
}

impl ScanClocks {
    pub fn derive(sys_hz: u32, width: u16, palette: bool) -> Self {
        let mut divider = sys_hz.div_ceil(MAX_PIO_CLOCK_HZ);
        if palette && width == 480 {
            // The palette lookup path adds a fetch per pixel; the dot
            // clock has to slow down to cover it.
            if divider < 8 {
                divider = 8;
            }
        }
        if width == 480 {
            // The pump runs at divider / 2, which must stay integral.
            divider += divider & 1;
            Self {
                timing_divider: divider,
                pump_divider: divider / 2,
            }
        } else {
            Self {
                timing_divider: divider,
                pump_divider: divider,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_width_rgb565_at_150mhz() {
        // ceil(150 / 34) = 5, rounded to 6 so the pump divider is whole.
        let clocks = ScanClocks::derive(150_000_000, 480, false);
        assert_eq!(clocks.timing_divider, 6);
        assert_eq!(clocks.pump_divider, 3);
    }

    #[test]
    fn full_width_palette_floors_at_eight() {
        let clocks = ScanClocks::derive(150_000_000, 480, true);
        assert_eq!(clocks.timing_divider, 8);
        assert_eq!(clocks.pump_divider, 4);
    }

    #[test]
    fn half_width_shares_one_divider() {
        let clocks = ScanClocks::derive(150_000_000, 240, false);
        assert_eq!(clocks.timing_divider, 5);
        assert_eq!(clocks.pump_divider, 5);
    }

    #[test]
    fn timing_clock_never_exceeds_the_panel_limit() {
        for sys in [125_000_000u32, 133_000_000, 150_000_000, 200_000_000] {
            for (width, palette) in [(480, false), (480, true), (240, false), (240, true)] {
                let clocks = ScanClocks::derive(sys, width, palette);
                assert!(sys / clocks.timing_divider <= MAX_PIO_CLOCK_HZ);
            }
        }
    }
}
