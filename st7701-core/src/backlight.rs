//! Backlight brightness to PWM duty mapping.

/// PWM wrap value for the backlight slice.
pub const BACKLIGHT_PWM_TOP: u16 = 6200;

/// Map an 8-bit brightness onto the backlight PWM compare value.
///
/// The panel's LED driver has a dead zone at the bottom of its range and a
/// perceptually non-linear response, so anything non-zero starts above the
/// dead zone and rises on a square-law curve. 0 is fully off and 255 is
/// pinned to the wrap value so the pin sits solidly high.
pub fn duty_for_brightness(brightness: u8) -> u16 {
    match brightness {
        0 => 0,
        255 => BACKLIGHT_PWM_TOP,
        b => {
            let b = b as u32;
            (181 + (b * b) / 85) as u16
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_pin_to_off_and_full() {
        assert_eq!(duty_for_brightness(0), 0);
        assert_eq!(duty_for_brightness(255), BACKLIGHT_PWM_TOP);
    }

    #[test]
    fn midpoint_on_the_gamma_curve() {
        assert_eq!(duty_for_brightness(128), 373);
    }

    #[test]
    fn curve_is_monotonic_and_clears_the_dead_zone() {
        let mut prev = 0;
        for b in 1..=255u8 {
            let duty = duty_for_brightness(b);
            assert!(duty >= 181, "brightness {b} fell into the dead zone");
            assert!(duty >= prev, "brightness {b} not monotonic");
            assert!(duty <= BACKLIGHT_PWM_TOP);
            prev = duty;
        }
    }
}
