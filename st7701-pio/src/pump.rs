//! Pixel pump and palette lookup state machines.
//!
//! Both pump programs sit at offset 0 so the frame-transition reset can
//! jump them back to their entry point. Each waits for PIO irq flag 4,
//! raised by the timing stream during the back porch of every display
//! line, then clocks out one line's worth of pixels with the data-enable
//! pin side-set high. The loop count comes from Y, preloaded over the TX
//! FIFO before the machine starts.

use embassy_rp::pac;
use embassy_rp::peripherals::PIO1;
use embassy_rp::pio::{
    Common, Config as PioConfig, Direction, FifoJoin, Pin, ShiftDirection, StateMachine,
};
use fixed::FixedU32;
use pio::{InstructionOperands, OutDestination};

use crate::scanout::{PALETTE_SM, PUMP_SM};

fn preload_y(sm_index: usize, value: u32) {
    // Push first so the exec'd `out` cannot stall with the value missing.
    pac::PIO1.txf(sm_index).write_value(value);
    pac::PIO1.sm(sm_index).instr().write(|w| {
        w.set_instr(
            InstructionOperands::OUT {
                destination: OutDestination::Y,
                bit_count: 32,
            }
            .encode(),
        )
    });
}

/// RGB565 pump: two pixels per FIFO word, straight onto 16 data pins.
/// One pixel lasts four machine cycles, matching one dot clock when the
/// pump runs at double the timing rate.
pub(crate) fn setup_pump_rgb565<'a>(
    common: &mut Common<'a, PIO1>,
    sm: &mut StateMachine<'a, PIO1, 0>,
    de: &Pin<'a, PIO1>,
    data: &[&Pin<'a, PIO1>],
    divider: u32,
    width: u16,
) {
    let pump_prog = pio::pio_asm!(
        ".origin 0",
        ".side_set 1",
        ".wrap_target",
        "mov x, y         side 0",
        "wait 1 irq 4     side 0",
        "pixels:",
        "out pins, 16     side 1 [3]",
        "out pins, 16     side 1 [2]",
        "jmp x-- pixels   side 1",
        ".wrap",
    );

    let cfg = {
        let mut cfg = PioConfig::default();
        cfg.use_program(&common.load_program(&pump_prog.program), &[&de]);
        cfg.set_out_pins(data);
        cfg.clock_divider = FixedU32::from_num(divider);
        cfg.shift_out.direction = ShiftDirection::Right;
        cfg.shift_out.auto_fill = true;
        cfg.fifo_join = FifoJoin::TxOnly;
        cfg
    };

    sm.set_config(&cfg);
    sm.set_pin_dirs(Direction::Out, data);
    sm.set_pin_dirs(Direction::Out, &[&de]);
    preload_y(PUMP_SM, (width as u32 >> 1) - 1);
    sm.set_enable(true);
}

/// Palette-mode pump: one pre-encoded 32-bit palette word per pixel,
/// bit-reversed onto 18 data pins. `mov pins, ::osr` does not consume the
/// OSR, so each pixel is followed by an `out null` to pull the next word.
pub(crate) fn setup_pump_18bpp<'a>(
    common: &mut Common<'a, PIO1>,
    sm: &mut StateMachine<'a, PIO1, 0>,
    de: &Pin<'a, PIO1>,
    data: &[&Pin<'a, PIO1>],
    divider: u32,
    width: u16,
) {
    let pump_prog = pio::pio_asm!(
        ".origin 0",
        ".side_set 1",
        ".wrap_target",
        "mov x, y          side 0",
        "wait 1 irq 4      side 0",
        "pixels:",
        "mov pins, ::osr   side 1 [2]",
        "out null, 32      side 1",
        "mov pins, ::osr   side 1 [1]",
        "out null, 32      side 1",
        "jmp x-- pixels    side 1",
        ".wrap",
    );

    let cfg = {
        let mut cfg = PioConfig::default();
        cfg.use_program(&common.load_program(&pump_prog.program), &[&de]);
        cfg.set_out_pins(data);
        cfg.clock_divider = FixedU32::from_num(divider);
        cfg.shift_out.direction = ShiftDirection::Right;
        cfg.shift_out.auto_fill = true;
        cfg.fifo_join = FifoJoin::TxOnly;
        cfg
    };

    sm.set_config(&cfg);
    sm.set_pin_dirs(Direction::Out, data);
    sm.set_pin_dirs(Direction::Out, &[&de]);
    preload_y(PUMP_SM, (width as u32 >> 1) - 1);
    sm.set_enable(true);
}

/// Palette lookup: turns each 8-bit framebuffer index into the address of
/// its palette entry. X is preloaded with the table base shifted down by
/// its 1 KiB alignment; the right-shifting input with a 30-bit autopush
/// threshold reassembles `base | index << 2` for the fetch channel.
pub(crate) fn setup_palette_state_machine<'a>(
    common: &mut Common<'a, PIO1>,
    sm: &mut StateMachine<'a, PIO1, 2>,
    palette_base: u32,
) {
    let palette_prog = pio::pio_asm!(
        ".wrap_target",
        "out y, 8",
        "in y, 8",
        "in x, 22",
        ".wrap",
    );

    let cfg = {
        let mut cfg = PioConfig::default();
        cfg.use_program(&common.load_program(&palette_prog.program), &[]);
        cfg.shift_out.direction = ShiftDirection::Left;
        cfg.shift_out.auto_fill = true;
        cfg.shift_in.direction = ShiftDirection::Right;
        cfg.shift_in.auto_fill = true;
        cfg.shift_in.threshold = 30;
        cfg
    };

    sm.set_config(&cfg);
    pac::PIO1.txf(PALETTE_SM).write_value(palette_base >> 10);
    pac::PIO1.sm(PALETTE_SM).instr().write(|w| {
        w.set_instr(
            InstructionOperands::OUT {
                destination: OutDestination::X,
                bit_count: 32,
            }
            .encode(),
        )
    });
    sm.set_enable(true);
}
