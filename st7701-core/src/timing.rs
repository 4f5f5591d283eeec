//! The timing generator's per-line phase machine.
//!
//! The timing state machine executes words fed to it by an interrupt that
//! fires whenever its TX FIFO is not full. Each word packs the sync pin
//! levels, a dot-clock wait count and a 16-bit PIO instruction that the
//! state machine executes in place:
//!
//! ```text
//! 31      30      29..16        15..0
//! VSYNC   HSYNC   wait count    exec instruction
//! ```
//!
//! Four words describe one timing line (front porch, HSYNC pulse, back
//! porch, display window). The exec slot either does nothing or raises a
//! PIO irq flag: flag 4 arms the pixel pump for the upcoming line, flags 0
//! and 1 are routed to the CPU as the line-done and frame-done interrupts.

const VSYNC_HIGH: u32 = 0x8000_0000;
const HSYNC_HIGH: u32 = 0x4000_0000;

/// `mov y, y` with the side-set bit: a do-nothing exec slot.
const EXEC_NOP: u32 = 0xB042;
/// `irq set 4`: arms the pixel pump for the next display line.
const EXEC_ARM_PUMP: u32 = 0xD004;
/// `irq set 0`: end-of-line interrupt, queue the next line's DMA.
const EXEC_LINE_DONE: u32 = 0xD000;
/// `irq set 1`: end-of-frame interrupt, restart scanout from the top.
const EXEC_FRAME_DONE: u32 = 0xD001;

/// Vertical and horizontal timing in dot clocks / lines.
///
/// The vertical values are cumulative: a timing row is inside the VSYNC
/// pulse while `row < v_pulse`, inside the active window while
/// `v_back <= row < v_display`, and the frame wraps at `v_front`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimingConfig {
    pub v_pulse: u16,
    pub v_back: u16,
    pub v_display: u16,
    pub v_front: u16,
    pub h_front: u16,
    pub h_pulse: u16,
    pub h_back: u16,
    pub h_display: u16,
}

impl TimingConfig {
    /// Timing for a panel with the given native line count. The porch
    /// widths are fixed properties of the ST7701 bring-up settings.
    pub const fn for_panel(display_lines: u16) -> Self {
        let v_pulse = 8;
        let v_back = 5 + v_pulse;
        let v_display = display_lines + v_back;
        Self {
            v_pulse,
            v_back,
            v_display,
            v_front: 5 + v_display,
            h_front: 4,
            h_pulse: 16,
            h_back: 30,
            h_display: 480,
        }
    }
}

/// Phase position within the vertical timing cycle.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TimingState {
    row: u16,
    phase: u8,
}

impl TimingState {
    pub const fn new() -> Self {
        Self { row: 0, phase: 0 }
    }

    pub fn row(&self) -> u16 {
        self.row
    }

    pub fn phase(&self) -> u8 {
        self.phase
    }

    /// Encode the next FIFO word and advance the phase machine.
    ///
    /// Advances one phase per call; the row advances only after the
    /// display phase and wraps at `v_front`. Runs in the timing interrupt,
    /// so it must stay allocation-free and branch-light.
    pub fn next_word(&mut self, cfg: &TimingConfig) -> u32 {
        // The three setup instructions in the timing program eat into the
        // wait budget, hence the -3 on every count.
        let vsync = if self.row >= cfg.v_pulse { VSYNC_HIGH } else { 0 };
        let word = match self.phase {
            0 => HSYNC_HIGH | EXEC_NOP | vsync | wait(cfg.h_front),
            1 => EXEC_NOP | vsync | wait(cfg.h_pulse),
            2 => {
                // Back porch: arm the pump if this row is in the display
                // window.
                let exec = if self.row >= cfg.v_back && self.row < cfg.v_display {
                    EXEC_ARM_PUMP
                } else {
                    EXEC_NOP
                };
                HSYNC_HIGH | exec | vsync | wait(cfg.h_back)
            }
            _ => {
                // Display window: raise the frame trigger on the last
                // active row, the line trigger while lines remain.
                let exec = if self.row == cfg.v_display {
                    EXEC_FRAME_DONE
                } else if self.row >= cfg.v_back - 1 && self.row < cfg.v_display {
                    EXEC_LINE_DONE
                } else {
                    EXEC_NOP
                };
                self.row += 1;
                if self.row >= cfg.v_front {
                    self.row = 0;
                }
                HSYNC_HIGH | exec | vsync | wait(cfg.h_display)
            }
        };
        self.phase = (self.phase + 1) & 3;
        word
    }
}

fn wait(cycles: u16) -> u32 {
    ((cycles - 3) as u32) << 16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> TimingConfig {
        TimingConfig::for_panel(480)
    }

    fn exec(word: u32) -> u32 {
        word & 0xFFFF
    }

    #[test]
    fn panel_timing_totals() {
        let c = cfg();
        assert_eq!(c.v_back, 13);
        assert_eq!(c.v_display, 493);
        assert_eq!(c.v_front, 498);
    }

    #[test]
    fn first_word_is_front_porch_in_vsync_pulse() {
        let mut st = TimingState::new();
        // HSYNC high, VSYNC low (inside the pulse), wait 4-3, nop.
        assert_eq!(st.next_word(&cfg()), 0x4001_B042);
    }

    #[test]
    fn phases_cycle_and_row_advances_on_display_phase() {
        let c = cfg();
        let mut st = TimingState::new();
        for row in 0..c.v_front {
            for phase in 0..4 {
                assert_eq!(st.phase(), phase);
                assert_eq!(st.row(), row);
                st.next_word(&c);
            }
        }
        // One full vertical cycle wraps back to the origin.
        assert_eq!(st, TimingState::new());
    }

    #[test]
    fn vsync_released_outside_pulse() {
        let c = cfg();
        let mut st = TimingState::new();
        for _ in 0..c.v_front {
            for _ in 0..4 {
                let row = st.row();
                let word = st.next_word(&c);
                assert_eq!(word & 0x8000_0000 != 0, row >= c.v_pulse, "row {row}");
            }
        }
    }

    #[test]
    fn frame_trigger_fires_exactly_once_per_cycle() {
        let c = cfg();
        let mut st = TimingState::new();
        let mut frames = 0;
        for _ in 0..c.v_front {
            for _ in 0..4 {
                let row = st.row();
                let phase = st.phase();
                if exec(st.next_word(&c)) == EXEC_FRAME_DONE {
                    frames += 1;
                    assert_eq!((row, phase), (c.v_display, 3));
                }
            }
        }
        assert_eq!(frames, 1);
    }

    #[test]
    fn pump_armed_once_per_display_line() {
        let c = cfg();
        let mut st = TimingState::new();
        let mut armed = 0;
        for _ in 0..c.v_front * 4 {
            if exec(st.next_word(&c)) == EXEC_ARM_PUMP {
                armed += 1;
            }
        }
        assert_eq!(armed, 480);
    }

    #[test]
    fn line_trigger_covers_display_window() {
        let c = cfg();
        let mut st = TimingState::new();
        let mut lines = 0;
        for _ in 0..c.v_front * 4 {
            let row = st.row();
            if exec(st.next_word(&c)) == EXEC_LINE_DONE {
                assert!(row >= c.v_back - 1 && row < c.v_display);
                lines += 1;
            }
        }
        // One trigger per active line plus the lead-in row before the
        // first display line.
        assert_eq!(lines, 481);
    }

    #[test]
    fn hsync_low_only_during_pulse_phase() {
        let c = cfg();
        let mut st = TimingState::new();
        for _ in 0..c.v_front {
            for phase in 0..4 {
                let word = st.next_word(&c);
                assert_eq!(word & HSYNC_HIGH == 0, phase == 1);
            }
        }
    }
}
