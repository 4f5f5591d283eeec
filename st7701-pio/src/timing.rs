//! Timing state machine: sync pin waveforms and the dot clock.
//!
//! The program consumes one 32-bit word per timing phase. The top two bits
//! drive VSYNC and HSYNC, the next 14 are a delay count in dot clocks, and
//! the low 16 are executed in place, which is how the timing stream raises
//! the pump-arm and end-of-line PIO irq flags. The dot clock is side-set
//! and toggles on every instruction, so one dot lasts two machine cycles.

use embassy_rp::peripherals::PIO1;
use embassy_rp::pio::{
    Common, Config as PioConfig, Direction, FifoJoin, Pin, ShiftDirection, StateMachine,
};
use fixed::FixedU32;

pub(crate) fn setup_timing_state_machine<'a>(
    common: &mut Common<'a, PIO1>,
    sm: &mut StateMachine<'a, PIO1, 1>,
    hsync: &Pin<'a, PIO1>,
    vsync: &Pin<'a, PIO1>,
    dot_clk: &Pin<'a, PIO1>,
    divider: u32,
) {
    let timing_prog = pio::pio_asm!(
        ".side_set 1",
        ".wrap_target",
        "out pins, 2     side 0",
        "out x, 14       side 1",
        "out exec, 16    side 0", // the exec'd instruction carries side 1
        "delay:",
        "nop             side 0",
        "jmp x-- delay   side 1",
        ".wrap",
    );

    let cfg = {
        let mut cfg = PioConfig::default();
        cfg.use_program(&common.load_program(&timing_prog.program), &[&dot_clk]);
        cfg.set_out_pins(&[&hsync, &vsync]);
        cfg.clock_divider = FixedU32::from_num(divider);
        cfg.shift_out.direction = ShiftDirection::Left;
        cfg.shift_out.auto_fill = true;
        cfg.fifo_join = FifoJoin::TxOnly;
        cfg
    };

    sm.set_config(&cfg);
    sm.set_pin_dirs(Direction::Out, &[&hsync, &vsync, &dot_clk]);
    sm.set_enable(true);
}
