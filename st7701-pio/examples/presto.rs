//! Scrolling colour bands on a Pimoroni Presto (480x480 RGB565).

#![no_std]
#![no_main]

use defmt::info;
use embassy_executor::Spawner;
use embassy_rp::peripherals::PIO1;
use embassy_rp::pio::{InterruptHandler, Pio};
use embassy_rp::pwm::Pwm;
use embassy_rp::{bind_interrupts, pwm};
use embassy_time::Timer;
use st7701_pio::{FrameSource, PanelGeometry, Rotation, ScanoutInterruptHandler, St7701, TimingInterruptHandler};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

const WIDTH: usize = 480;
const HEIGHT: usize = 480;

static SCANOUT_BUFFER: StaticCell<[u16; WIDTH * HEIGHT]> = StaticCell::new();
static FRAME: StaticCell<[u16; WIDTH * HEIGHT]> = StaticCell::new();

bind_interrupts!(struct Irqs {
    PIO1_IRQ_0 => ScanoutInterruptHandler, InterruptHandler<PIO1>;
    PIO1_IRQ_1 => TimingInterruptHandler;
});

fn band_colour(band: usize) -> u16 {
    // A few saturated RGB565 colours.
    [0xF800, 0x07E0, 0x001F, 0xFFE0, 0xF81F, 0x07FF][band % 6]
}

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let p = embassy_rp::init(Default::default());

    let scanout = SCANOUT_BUFFER.init([0; WIDTH * HEIGHT]);
    let frame = FRAME.init([0; WIDTH * HEIGHT]);

    let geometry = PanelGeometry::new(480, 480, Rotation::Deg0).unwrap();
    let backlight = Pwm::new_output_b(p.PWM_SLICE10, p.PIN_45, pwm::Config::default());

    let mut display = St7701::new_rgb565(
        Pio::new(p.PIO1, Irqs),
        Irqs,
        geometry,
        scanout.as_mut_ptr(),
        p.PIN_1,
        p.PIN_2,
        p.PIN_3,
        p.PIN_4,
        p.PIN_5,
        p.PIN_6,
        p.PIN_7,
        p.PIN_8,
        p.PIN_9,
        p.PIN_10,
        p.PIN_11,
        p.PIN_12,
        p.PIN_13,
        p.PIN_14,
        p.PIN_15,
        p.PIN_16,
        p.PIN_17,
        p.PIN_18,
        p.PIN_19,
        p.PIN_20,
        p.PIN_21,
        p.PIN_22,
        p.PIN_26,
        p.PIN_27,
        p.PIN_28,
        p.DMA_CH0,
        p.DMA_CH1,
        backlight,
    );

    display.init().await;
    info!("panel up");

    let mut offset = 0usize;
    loop {
        for y in 0..HEIGHT {
            let colour = band_colour((y + offset) / 40);
            frame[y * WIDTH..(y + 1) * WIDTH].fill(colour);
        }
        display.update(&FrameSource::Rgb565 {
            pixels: frame,
            layers: 1,
        });
        offset = (offset + 1) % (HEIGHT * 6);
        Timer::after_millis(16).await;
    }
}
