//! ST7701 parallel RGB panel driver for RP2350, built on PIO1 and a
//! self-reloading DMA chain.
//!
//! Three state machines run the panel: a timing generator producing the
//! sync waveforms and dot clock from words an interrupt keeps feeding it,
//! a pixel pump clocking line data onto the parallel bus, and (in indexed
//! mode) a palette lookup that turns framebuffer bytes into table
//! addresses for the DMA chain to fetch. A fourth state machine provides
//! the 9-bit serial command link used during bring-up.
//!
//! Both PIO1 interrupt vectors must be bound before constructing the
//! driver, with the scanout handler ahead of embassy's own:
//!
//! ```ignore
//! use embassy_rp::peripherals::PIO1;
//! use embassy_rp::pio::InterruptHandler;
//! use st7701_pio::{ScanoutInterruptHandler, TimingInterruptHandler};
//!
//! embassy_rp::bind_interrupts!(struct Irqs {
//!     PIO1_IRQ_0 => ScanoutInterruptHandler, InterruptHandler<PIO1>;
//!     PIO1_IRQ_1 => TimingInterruptHandler;
//! });
//! ```

#![no_std]

mod backlight;
mod command;
mod compositor;
mod dma;
mod driver;
mod pump;
mod scanout;
mod timing;

pub use driver::St7701;
pub use scanout::{
    FullFrameScan, ScanContext, ScanStrategy, ScanoutInterruptHandler, TimingInterruptHandler,
    set_scan_strategy,
};
pub use st7701_core::{FrameSource, Palette, PanelGeometry, Region, Rotation};
