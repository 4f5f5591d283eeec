//! Interrupt layer: the timing FIFO feeder and the end-of-line dispatch.
//!
//! Hardware interrupt vectors carry no context pointer, so everything the
//! handlers touch lives in the [`SCANOUT`] static. The driver writes the
//! configuration once during bring-up, then flips `active`; the handlers
//! bail out until then and after teardown.

use core::cell::{Cell, UnsafeCell};
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_rp::interrupt::typelevel::{self, Handler};
use embassy_rp::pac;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use pio::{
    InstructionOperands, JmpCondition, MovDestination, MovOperation, MovSource, OutDestination,
};
use st7701_core::{LINE_DONE, TimingConfig, TimingState, VsyncFlag, line_address};

pub(crate) const PUMP_SM: usize = 0;
pub(crate) const TIMING_SM: usize = 1;
pub(crate) const PALETTE_SM: usize = 2;
pub(crate) const COMMAND_SM: usize = 3;

/// Hardware wiring the handlers need, written once before `active` is set.
#[derive(Copy, Clone)]
pub(crate) struct ScanConfig {
    pub bytes_per_row: u32,
    pub row_shift: u32,
    pub display_lines: u32,
    /// Channel whose read address is reloaded with each line pointer.
    pub data_chan: u8,
}

impl ScanConfig {
    const fn empty() -> Self {
        Self {
            bytes_per_row: 0,
            row_shift: 0,
            display_lines: 0,
            data_chan: 0,
        }
    }
}

pub(crate) struct ScanShared {
    active: AtomicBool,
    config: UnsafeCell<ScanConfig>,
    timing: UnsafeCell<(TimingState, TimingConfig)>,
    display_row: AtomicU32,
    /// Address of the next line the data channel will fetch; the loop DMA
    /// channel reads this variable directly.
    pub(crate) next_line_addr: AtomicU32,
    pub(crate) framebuffer: AtomicU32,
    /// Single-slot mailbox, consumed at the next frame transition.
    pub(crate) pending_framebuffer: AtomicU32,
    pub(crate) vsync: VsyncFlag,
    pub(crate) frame_done: Signal<CriticalSectionRawMutex, ()>,
    strategy: Mutex<CriticalSectionRawMutex, Cell<&'static dyn ScanStrategy>>,
}

// The UnsafeCells are written by the driver strictly before `active` is
// released, and read only from the PIO1 interrupt handlers afterwards.
unsafe impl Sync for ScanShared {}

pub(crate) static SCANOUT: ScanShared = ScanShared {
    active: AtomicBool::new(false),
    config: UnsafeCell::new(ScanConfig::empty()),
    timing: UnsafeCell::new((TimingState::new(), TimingConfig::for_panel(480))),
    display_row: AtomicU32::new(0),
    next_line_addr: AtomicU32::new(LINE_DONE),
    framebuffer: AtomicU32::new(0),
    pending_framebuffer: AtomicU32::new(0),
    vsync: VsyncFlag::new(),
    frame_done: Signal::new(),
    strategy: Mutex::new(Cell::new(&FullFrameScan)),
};

impl ScanShared {
    /// Publish the scanout configuration and let the handlers run.
    ///
    /// Must not be called while a previous configuration is still active.
    pub(crate) fn activate(&self, config: ScanConfig, timing: TimingConfig, framebuffer: u32) {
        unsafe {
            *self.config.get() = config;
            *self.timing.get() = (TimingState::new(), timing);
        }
        self.display_row.store(0, Ordering::Relaxed);
        self.next_line_addr.store(LINE_DONE, Ordering::Relaxed);
        self.framebuffer.store(framebuffer, Ordering::Relaxed);
        self.pending_framebuffer.store(0, Ordering::Relaxed);
        self.active.store(true, Ordering::Release);
    }

    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
        self.next_line_addr.store(LINE_DONE, Ordering::Release);
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Access to the scanout state handed to a [`ScanStrategy`]. Only the
/// interrupt layer can construct one, so strategy methods always run in
/// interrupt context with the configuration frozen.
pub struct ScanContext {
    _private: (),
}

impl ScanContext {
    fn config(&self) -> &ScanConfig {
        unsafe { &*SCANOUT.config.get() }
    }

    /// Base address of the buffer currently being scanned out.
    pub fn frame_base(&self) -> u32 {
        SCANOUT.framebuffer.load(Ordering::Relaxed)
    }

    pub fn display_row(&self) -> u32 {
        SCANOUT.display_row.load(Ordering::Relaxed)
    }

    /// Step to the next display row and return it.
    pub fn advance_row(&self) -> u32 {
        let row = SCANOUT.display_row.load(Ordering::Relaxed) + 1;
        SCANOUT.display_row.store(row, Ordering::Relaxed);
        row
    }

    pub fn bytes_per_row(&self) -> u32 {
        self.config().bytes_per_row
    }

    pub fn row_shift(&self) -> u32 {
        self.config().row_shift
    }

    pub fn display_lines(&self) -> u32 {
        self.config().display_lines
    }

    /// Publish the source address for the next line fetch. The loop DMA
    /// channel picks this up after the in-flight line completes.
    pub fn publish_line(&self, addr: u32) {
        SCANOUT.next_line_addr.store(addr, Ordering::Release);
    }

    /// Reload and trigger the data channel, starting the first line of a
    /// frame immediately.
    pub fn trigger_frame(&self, addr: u32) {
        let chan = self.config().data_chan as usize;
        pac::DMA.ch(chan).al3_read_addr_trig().write_value(addr);
    }
}

/// Per-line and per-frame transfer policy, dispatched from the end-of-line
/// interrupt. [`FullFrameScan`] scans a whole resident framebuffer; a
/// reduced-memory ring strategy can be swapped in with
/// [`set_scan_strategy`].
pub trait ScanStrategy: Sync {
    /// Queue the source address for the line after the one in flight.
    fn start_line_xfer(&self, ctx: &ScanContext);
    /// Restart the transfer chain from the top of the frame.
    fn start_frame_xfer(&self, ctx: &ScanContext);
}

/// Default strategy: every line comes straight out of one full-size
/// framebuffer.
pub struct FullFrameScan;

impl ScanStrategy for FullFrameScan {
    fn start_line_xfer(&self, ctx: &ScanContext) {
        let row = ctx.advance_row();
        let addr = line_address(
            ctx.frame_base(),
            ctx.bytes_per_row(),
            row,
            ctx.row_shift(),
            ctx.display_lines(),
        );
        ctx.publish_line(addr);
    }

    fn start_frame_xfer(&self, ctx: &ScanContext) {
        let base = ctx.frame_base();
        ctx.publish_line(base);
        ctx.trigger_frame(base);
    }
}

/// Replace the transfer policy. Takes effect from the next end-of-line
/// interrupt.
pub fn set_scan_strategy(strategy: &'static dyn ScanStrategy) {
    SCANOUT.strategy.lock(|s| s.set(strategy));
}

/// Feeds the timing state machine. Bound to `PIO1_IRQ_1`, which fires
/// whenever the timing TX FIFO has room.
pub struct TimingInterruptHandler;

impl Handler<typelevel::PIO1_IRQ_1> for TimingInterruptHandler {
    unsafe fn on_interrupt() {
        if !SCANOUT.is_active() {
            return;
        }
        let pio = pac::PIO1;
        // Sole accessor of the timing state once `active` is set.
        let (state, cfg) = unsafe { &mut *SCANOUT.timing.get() };
        while pio.fstat().read().txfull() & (1 << TIMING_SM as u8) == 0 {
            pio.txf(TIMING_SM).write_value(state.next_word(cfg));
        }
    }
}

/// End-of-line dispatch. Bound to `PIO1_IRQ_0` ahead of embassy's own PIO
/// handler; PIO irq flag 1 marks a frame boundary, flag 0 a line boundary.
pub struct ScanoutInterruptHandler;

impl Handler<typelevel::PIO1_IRQ_0> for ScanoutInterruptHandler {
    unsafe fn on_interrupt() {
        if !SCANOUT.is_active() {
            return;
        }
        let pio = pac::PIO1;
        let flags = pio.irq().read().irq();
        if flags & 0x2 != 0 {
            frame_transition();
        } else if flags & 0x1 != 0 {
            line_transition();
        }
        // Embassy's shared handler masks whatever INTS bits it sees; keep
        // the scanout sources armed.
        pio.irqs(0).inte().write_set(|w| {
            w.set_sm0(true);
            w.set_sm1(true);
        });
    }
}

fn line_transition() {
    pac::PIO1.irq().write(|w| w.set_irq(0x1));
    let ctx = ScanContext { _private: () };
    SCANOUT.strategy.lock(|s| s.get()).start_line_xfer(&ctx);
}

/// Reset the transfer chain for a new frame. The pump state machine is
/// rewound to its entry point so a short previous frame (or startup) can
/// never leave it mid-line.
fn frame_transition() {
    let pio = pac::PIO1;
    pio.irq().write(|w| w.set_irq(0x2));

    let pending = SCANOUT.pending_framebuffer.swap(0, Ordering::AcqRel);
    if pending != 0 {
        SCANOUT.framebuffer.store(pending, Ordering::Release);
    }

    let chan = unsafe { (*SCANOUT.config.get()).data_chan };

    SCANOUT.next_line_addr.store(LINE_DONE, Ordering::Release);
    abort_channel(chan);
    reset_pump();
    SCANOUT.display_row.store(0, Ordering::Relaxed);

    let ctx = ScanContext { _private: () };
    SCANOUT.strategy.lock(|s| s.get()).start_frame_xfer(&ctx);

    SCANOUT.vsync.complete();
    cortex_m::asm::sev();
    SCANOUT.frame_done.signal(());
}

pub(crate) fn abort_channel(chan: u8) {
    pac::DMA.chan_abort().write(|w| w.set_chan_abort(1 << chan));
    while pac::DMA.ch(chan as usize).ctrl_trig().read().busy() {}
}

/// Drain the pump and park it on its entry instruction.
fn reset_pump() {
    let pio = pac::PIO1;
    pio.ctrl()
        .modify(|w| w.set_sm_enable(w.sm_enable() & !(1 << PUMP_SM)));
    clear_fifos(PUMP_SM);
    exec_blocking(
        PUMP_SM,
        InstructionOperands::MOV {
            destination: MovDestination::OSR,
            op: MovOperation::None,
            source: MovSource::NULL,
        }
        .encode(),
    );
    exec_blocking(
        PUMP_SM,
        InstructionOperands::OUT {
            destination: OutDestination::NULL,
            bit_count: 32,
        }
        .encode(),
    );
    // The pump programs are loaded at offset 0.
    exec_blocking(
        PUMP_SM,
        InstructionOperands::JMP {
            condition: JmpCondition::Always,
            address: 0,
        }
        .encode(),
    );
    pio.ctrl()
        .modify(|w| w.set_sm_enable(w.sm_enable() | (1 << PUMP_SM)));
}

/// Toggling the RX join bit twice flushes both FIFOs.
pub(crate) fn clear_fifos(sm: usize) {
    let shiftctrl = pac::PIO1.sm(sm).shiftctrl();
    shiftctrl.modify(|w| w.set_fjoin_rx(!w.fjoin_rx()));
    shiftctrl.modify(|w| w.set_fjoin_rx(!w.fjoin_rx()));
}

fn exec_blocking(sm: usize, instr: u16) {
    let pio = pac::PIO1;
    pio.sm(sm).instr().write(|w| w.set_instr(instr));
    while pio.sm(sm).execctrl().read().exec_stalled() {}
}
