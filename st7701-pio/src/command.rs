//! ST7701S command link: a 9-bit serial write-only port on one state
//! machine, plus the panel bring-up sequence.
//!
//! The controller's 3-line serial interface prefixes every byte with a
//! D/CX bit, low for commands and high for parameters, which rules out the
//! 8-bit SPI block. The program shifts 9-bit frames MSB-first with the
//! clock side-set; chip select is an ordinary GPIO toggled around each
//! command.

use embassy_rp::gpio::Output;
use embassy_rp::pac;
use embassy_rp::peripherals::PIO1;
use embassy_rp::pio::{
    Common, Config as PioConfig, Direction, FifoJoin, Pin, ShiftDirection, StateMachine,
};
use embassy_time::Timer;
use fixed::FixedU32;
use st7701_core::Rotation;

use crate::scanout::COMMAND_SM;

const SERIAL_BAUD: u32 = 8_000_000;

// Command1 registers.
mod cmd {
    pub const SWRESET: u8 = 0x01; // Software reset
    pub const INVON: u8 = 0x21; // Display inversion on
    pub const DISPON: u8 = 0x29; // Display on
    pub const MADCTL: u8 = 0x36; // Display data access control
    pub const COLMOD: u8 = 0x3A; // Interface pixel format
    pub const SLPOUT: u8 = 0x11; // Sleep out
    pub const CND2BKXSEL: u8 = 0xFF; // Command2 bank select
}

// Command2 BK0 registers.
mod bk0 {
    pub const PVGAMCTRL: u8 = 0xB0; // Positive voltage gamma control
    pub const NVGAMCTRL: u8 = 0xB1; // Negative voltage gamma control
    pub const LNESET: u8 = 0xC0; // Display line setting
    pub const PORCTRL: u8 = 0xC1; // Porch control
    pub const INVSET: u8 = 0xC2; // Inversion selection & frame rate
    pub const RGBCTRL: u8 = 0xC3; // RGB control
    pub const SDIR: u8 = 0xC7; // X-direction control
    pub const COLCTRL: u8 = 0xCD; // Colour control
}

// Command2 BK1 registers.
mod bk1 {
    pub const VHRS: u8 = 0xB0; // Vop amplitude
    pub const VCOMS: u8 = 0xB1; // VCOM amplitude
    pub const VGHSS: u8 = 0xB2; // VGH voltage
    pub const TESTCMD: u8 = 0xB3;
    pub const VGLS: u8 = 0xB5; // VGL voltage
    pub const PWCTRL1: u8 = 0xB7; // Power control 1
    pub const PWCTRL2: u8 = 0xB8; // Power control 2
    pub const PDR1: u8 = 0xC1; // Source pre-drive timing 1
    pub const PDR2: u8 = 0xC2; // Source pre-drive timing 2
}

const BKX_DISABLE: &[u8] = &[0x77, 0x01, 0x00, 0x00, 0x00];
const BK0_ENABLE: &[u8] = &[0x77, 0x01, 0x00, 0x00, 0x10];
const BK1_ENABLE: &[u8] = &[0x77, 0x01, 0x00, 0x00, 0x11];
const BK3_ENABLE: &[u8] = &[0x77, 0x01, 0x00, 0x00, 0x13];

pub(crate) struct CommandPort<'d> {
    cs: Output<'d>,
    _sm: StateMachine<'d, PIO1, 3>,
}

impl<'d> CommandPort<'d> {
    pub(crate) fn new(
        common: &mut Common<'d, PIO1>,
        mut sm: StateMachine<'d, PIO1, 3>,
        sck: &Pin<'d, PIO1>,
        dat: &Pin<'d, PIO1>,
        cs: Output<'d>,
        sys_hz: u32,
    ) -> Self {
        let port_prog = pio::pio_asm!(
            ".side_set 1",
            ".wrap_target",
            "out pins, 1   side 0",
            "nop           side 1",
            ".wrap",
        );

        let cfg = {
            let mut cfg = PioConfig::default();
            cfg.use_program(&common.load_program(&port_prog.program), &[&sck]);
            cfg.set_out_pins(&[&dat]);
            // Two machine cycles per bit.
            cfg.clock_divider = FixedU32::from_num(sys_hz.div_ceil(2 * SERIAL_BAUD));
            cfg.shift_out.direction = ShiftDirection::Left;
            cfg.shift_out.auto_fill = true;
            cfg.shift_out.threshold = 9;
            cfg.fifo_join = FifoJoin::TxOnly;
            cfg
        };

        sm.set_config(&cfg);
        sm.set_pin_dirs(Direction::Out, &[&dat, &sck]);
        sm.set_enable(true);

        Self { cs, _sm: sm }
    }

    /// Send a command byte followed by its parameter bytes.
    pub(crate) fn command(&mut self, command: u8, data: &[u8]) {
        self.cs.set_low();
        self.push_frame(false, command);
        for &byte in data {
            self.push_frame(true, byte);
        }
        self.drain();
        self.cs.set_high();
    }

    fn push_frame(&mut self, dcx_data: bool, byte: u8) {
        let frame = ((dcx_data as u32) << 8) | byte as u32;
        let pio = pac::PIO1;
        while pio.fstat().read().txfull() & (1 << COMMAND_SM as u8) != 0 {}
        // Left-justified so the D/CX bit shifts out first.
        pio.txf(COMMAND_SM).write_value(frame << 23);
    }

    /// Wait until the shifter has run dry before releasing chip select.
    fn drain(&mut self) {
        let pio = pac::PIO1;
        pio.fdebug().write(|w| w.set_txstall(1 << COMMAND_SM));
        while pio.fdebug().read().txstall() & (1 << COMMAND_SM as u8) == 0 {}
    }
}

/// Full panel bring-up, ported from the vendor init for the Presto's
/// TL040WVS03 glass. The 0xE0..0xED block is not documented in the
/// ST7701S datasheet; the panel stays dark without it.
pub(crate) async fn panel_bring_up(port: &mut CommandPort<'_>, rotation: Rotation) {
    port.command(cmd::SWRESET, &[]);
    Timer::after_millis(150).await;

    port.command(cmd::CND2BKXSEL, BK0_ENABLE);
    port.command(bk0::LNESET, &[0x3B, 0x00]); // (59 + 1) * 8 = 480 lines
    port.command(bk0::PORCTRL, &[0x0D, 0x02]); // 13 VBP, 2 VFP
    port.command(bk0::INVSET, &[0x31, 0x01]);
    port.command(bk0::COLCTRL, &[0x08]); // LED polarity reversed
    port.command(
        bk0::PVGAMCTRL,
        &[
            0x00, 0x11, 0x18, 0x0E, 0x11, 0x06, 0x07, 0x08, 0x07, 0x22, 0x04, 0x12, 0x0F, 0xAA,
            0x31, 0x18,
        ],
    );
    port.command(
        bk0::NVGAMCTRL,
        &[
            0x00, 0x11, 0x19, 0x0E, 0x12, 0x07, 0x08, 0x08, 0x08, 0x22, 0x04, 0x11, 0x11, 0xA9,
            0x32, 0x18,
        ],
    );
    port.command(bk0::RGBCTRL, &[0x80, 0x2E, 0x0E]); // HV mode, H/V back porch + sync

    port.command(cmd::CND2BKXSEL, BK1_ENABLE);
    port.command(bk1::VHRS, &[0x60]); // 4.7375 V
    port.command(bk1::VCOMS, &[0x32]); // 0.725 V
    port.command(bk1::VGHSS, &[0x07]); // 15 V
    port.command(bk1::TESTCMD, &[0x80]);
    port.command(bk1::VGLS, &[0x49]); // -10.17 V
    port.command(bk1::PWCTRL1, &[0x85]); // Middle/min/min bias
    port.command(bk1::PWCTRL2, &[0x21]); // 6.6 / -4.6
    port.command(bk1::PDR1, &[0x78]); // 1.6 us
    port.command(bk1::PDR2, &[0x78]); // 6.4 us

    port.command(0xE0, &[0x00, 0x1B, 0x02]);
    port.command(
        0xE1,
        &[
            0x08, 0xA0, 0x00, 0x00, 0x07, 0xA0, 0x00, 0x00, 0x00, 0x44, 0x44,
        ],
    );
    port.command(
        0xE2,
        &[
            0x11, 0x11, 0x44, 0x44, 0xED, 0xA0, 0x00, 0x00, 0xEC, 0xA0, 0x00, 0x00,
        ],
    );
    port.command(0xE3, &[0x00, 0x00, 0x11, 0x11]);
    port.command(0xE4, &[0x44, 0x44]);
    port.command(
        0xE5,
        &[
            0x0A, 0xE9, 0xD8, 0xA0, 0x0C, 0xEB, 0xD8, 0xA0, 0x0E, 0xED, 0xD8, 0xA0, 0x10, 0xEF,
            0xD8, 0xA0,
        ],
    );
    port.command(0xE6, &[0x00, 0x00, 0x11, 0x11]);
    port.command(0xE7, &[0x44, 0x44]);
    port.command(
        0xE8,
        &[
            0x09, 0xE8, 0xD8, 0xA0, 0x0B, 0xEA, 0xD8, 0xA0, 0x0D, 0xEC, 0xD8, 0xA0, 0x0F, 0xEE,
            0xD8, 0xA0,
        ],
    );
    port.command(0xEB, &[0x02, 0x00, 0xE4, 0xE4, 0x88, 0x00, 0x40]);
    port.command(0xEC, &[0x3C, 0x00]);
    port.command(
        0xED,
        &[
            0xAB, 0x89, 0x76, 0x54, 0x02, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x20, 0x45, 0x67,
            0x98, 0xBA,
        ],
    );
    port.command(cmd::MADCTL, &[0x00]);

    port.command(cmd::CND2BKXSEL, BK3_ENABLE);
    port.command(0xE5, &[0xE4]);

    port.command(cmd::CND2BKXSEL, BKX_DISABLE);
    port.command(cmd::COLMOD, &[0x66]); // 18 bits per pixel

    set_rotation(port, rotation);

    port.command(cmd::INVON, &[]);
    Timer::after_millis(1).await;
    port.command(cmd::SLPOUT, &[]);
    Timer::after_millis(120).await;
    port.command(cmd::DISPON, &[]);
    Timer::after_millis(50).await;
}

/// Apply a rotation by mirroring both axes. Only 0 and 180 degrees exist
/// on this interface; anything else is reported and ignored.
pub(crate) fn set_rotation(port: &mut CommandPort<'_>, rotation: Rotation) {
    let (madctl, sdir) = match rotation {
        Rotation::Deg0 => (0x00, 0x00),
        Rotation::Deg180 => (0x10, 0x04), // Mirror Y, mirror X
        _ => {
            defmt::warn!("rotation not supported, leaving panel orientation unchanged");
            return;
        }
    };
    port.command(cmd::MADCTL, &[madctl]);
    port.command(cmd::CND2BKXSEL, BK0_ENABLE);
    port.command(bk0::SDIR, &[sdir]);
    port.command(cmd::CND2BKXSEL, BKX_DISABLE);
}
