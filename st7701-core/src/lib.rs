//! Hardware-independent logic for driving an ST7701 parallel RGB panel.
//!
//! Everything in this crate is pure state-machine and arithmetic code: the
//! timing-generator phase machine and its FIFO word encoding, the scan-row
//! address math, the race-the-beam copy boundary, layer compositing, the
//! palette word encoding, the backlight curve and the PIO clock derivation.
//! The `st7701-pio` crate wires these into PIO/DMA/interrupts on an RP2350.

#![cfg_attr(not(test), no_std)]

mod backlight;
mod beam;
mod clock;
mod geometry;
mod palette;
mod scan;
mod timing;
mod vsync;

pub use backlight::{BACKLIGHT_PWM_TOP, duty_for_brightness};
pub use beam::{FrameSource, composite_run, copy_region, safe_limit, update_racing_beam};
pub use clock::{MAX_PIO_CLOCK_HZ, ScanClocks};
pub use geometry::{PanelGeometry, Region, Rotation};
pub use palette::{PALETTE_ENTRIES, Palette, encode_rgb, encode_rgb888};
pub use scan::{LINE_DONE, line_address};
pub use timing::{TimingConfig, TimingState};
pub use vsync::VsyncFlag;
