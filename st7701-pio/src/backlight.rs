//! Backlight PWM wrapper.

use embassy_rp::pwm::{Config as PwmConfig, Pwm};
use st7701_core::{BACKLIGHT_PWM_TOP, duty_for_brightness};

pub(crate) struct Backlight<'d> {
    pwm: Pwm<'d>,
    cfg: PwmConfig,
}

impl<'d> Backlight<'d> {
    /// Takes an already-constructed PWM output so the driver does not care
    /// which slice or channel the backlight pin lands on.
    pub(crate) fn new(pwm: Pwm<'d>) -> Self {
        let mut cfg = PwmConfig::default();
        cfg.top = BACKLIGHT_PWM_TOP;
        cfg.compare_a = 0;
        cfg.compare_b = 0;
        let mut bl = Self { pwm, cfg };
        bl.set(0);
        bl
    }

    pub(crate) fn set(&mut self, brightness: u8) {
        let duty = duty_for_brightness(brightness);
        // Only one of the two compare units is wired to the pin; setting
        // both keeps this slice-agnostic.
        self.cfg.compare_a = duty;
        self.cfg.compare_b = duty;
        self.pwm.set_config(&self.cfg);
    }
}
