//! The ST7701 driver: construction, bring-up, frame updates, teardown.

use embassy_rp::dma::{AnyChannel, Channel};
use embassy_rp::gpio::{Level, Output, Pin as GpioPin};
use embassy_rp::interrupt::typelevel::Binding;
use embassy_rp::interrupt::{InterruptExt, Priority};
use embassy_rp::pac;
use embassy_rp::pac::dma::vals::TreqSel;
use embassy_rp::peripherals::PIO1;
use embassy_rp::pio::{Common, Pio, PioPin, StateMachine};
use embassy_rp::pwm::Pwm;
use embassy_rp::{Peripheral, PeripheralRef, interrupt};
use embassy_time::Timer;
use embedded_graphics::pixelcolor::Rgb888;
use st7701_core::{FrameSource, Palette, PanelGeometry, Region, ScanClocks, TimingConfig};

use crate::backlight::Backlight;
use crate::command::{self, CommandPort, panel_bring_up};
use crate::compositor;
use crate::dma;
use crate::pump::{setup_palette_state_machine, setup_pump_18bpp, setup_pump_rgb565};
use crate::scanout::{
    PALETTE_SM, PUMP_SM, SCANOUT, ScanConfig, ScanoutInterruptHandler, TIMING_SM,
    TimingInterruptHandler, clear_fifos,
};
use crate::timing::setup_timing_state_machine;

enum Mode {
    Rgb565,
    Indexed { palette: &'static Palette },
}

struct ScanChannels<'d> {
    data: PeripheralRef<'d, AnyChannel>,
    line_loop: PeripheralRef<'d, AnyChannel>,
    /// Palette mode only: the entry-address channel and the RX fetch
    /// channel that drives it.
    palette: Option<(PeripheralRef<'d, AnyChannel>, PeripheralRef<'d, AnyChannel>)>,
}

/// Driver for an ST7701-based parallel RGB panel scanned out by PIO1 and
/// a self-reloading DMA chain.
///
/// Construction wires up the state machines and channels; [`init`] runs
/// the panel bring-up and starts scanout. Exactly one driver can be live
/// at a time, which falls out of owning the PIO1 and DMA peripherals.
///
/// [`init`]: St7701::init
pub struct St7701<'d> {
    geometry: PanelGeometry,
    mode: Mode,
    framebuffer_base: u32,
    common: Common<'d, PIO1>,
    pump_sm: StateMachine<'d, PIO1, 0>,
    timing_sm: StateMachine<'d, PIO1, 1>,
    palette_sm: StateMachine<'d, PIO1, 2>,
    command: CommandPort<'d>,
    backlight: Backlight<'d>,
    channels: ScanChannels<'d>,
    /// RGB565 mode drives 16 data pins; the top two stay held low.
    _unused_data: Option<[Output<'d>; 2]>,
}

impl<'d> St7701<'d> {
    /// Direct-colour driver: the framebuffer holds native RGB565 pixels.
    #[allow(clippy::too_many_arguments)]
    pub fn new_rgb565(
        pio: Pio<'d, PIO1>,
        _irqs: impl Binding<interrupt::typelevel::PIO1_IRQ_0, ScanoutInterruptHandler>
        + Binding<interrupt::typelevel::PIO1_IRQ_1, TimingInterruptHandler>,
        geometry: PanelGeometry,
        framebuffer: *mut u16,
        d0: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d1: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d2: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d3: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d4: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d5: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d6: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d7: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d8: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d9: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d10: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d11: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d12: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d13: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d14: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d15: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d16: impl Peripheral<P = impl GpioPin> + 'd,
        d17: impl Peripheral<P = impl GpioPin> + 'd,
        hsync: impl Peripheral<P = impl PioPin + 'd> + 'd,
        vsync: impl Peripheral<P = impl PioPin + 'd> + 'd,
        de: impl Peripheral<P = impl PioPin + 'd> + 'd,
        dot_clk: impl Peripheral<P = impl PioPin + 'd> + 'd,
        sck: impl Peripheral<P = impl PioPin + 'd> + 'd,
        dat: impl Peripheral<P = impl PioPin + 'd> + 'd,
        cs: impl Peripheral<P = impl GpioPin> + 'd,
        data_channel: impl Peripheral<P = impl Channel> + 'd,
        loop_channel: impl Peripheral<P = impl Channel> + 'd,
        backlight: Pwm<'d>,
    ) -> Self {
        let Pio {
            mut common,
            mut sm0,
            mut sm1,
            sm2,
            sm3,
            ..
        } = pio;

        let sys_hz = embassy_rp::clocks::clk_sys_freq();
        let clocks = ScanClocks::derive(sys_hz, geometry.width, false);

        let data = [
            common.make_pio_pin(d0),
            common.make_pio_pin(d1),
            common.make_pio_pin(d2),
            common.make_pio_pin(d3),
            common.make_pio_pin(d4),
            common.make_pio_pin(d5),
            common.make_pio_pin(d6),
            common.make_pio_pin(d7),
            common.make_pio_pin(d8),
            common.make_pio_pin(d9),
            common.make_pio_pin(d10),
            common.make_pio_pin(d11),
            common.make_pio_pin(d12),
            common.make_pio_pin(d13),
            common.make_pio_pin(d14),
            common.make_pio_pin(d15),
        ];
        let de = common.make_pio_pin(de);
        let data_refs: [&_; 16] = core::array::from_fn(|i| &data[i]);
        setup_pump_rgb565(
            &mut common,
            &mut sm0,
            &de,
            &data_refs,
            clocks.pump_divider,
            geometry.width,
        );

        let hsync = common.make_pio_pin(hsync);
        let vsync = common.make_pio_pin(vsync);
        let dot_clk = common.make_pio_pin(dot_clk);
        setup_timing_state_machine(
            &mut common,
            &mut sm1,
            &hsync,
            &vsync,
            &dot_clk,
            clocks.timing_divider,
        );

        let sck = common.make_pio_pin(sck);
        let dat = common.make_pio_pin(dat);
        let command = CommandPort::new(
            &mut common,
            sm3,
            &sck,
            &dat,
            Output::new(cs, Level::High),
            sys_hz,
        );

        let mut data_channel: PeripheralRef<'d, AnyChannel> =
            data_channel.into_ref().map_into();
        let mut loop_channel: PeripheralRef<'d, AnyChannel> =
            loop_channel.into_ref().map_into();
        dma::setup_data_channel(
            data_channel.reborrow(),
            loop_channel.reborrow(),
            TreqSel::PIO1_TX0,
            &pac::PIO1.txf(PUMP_SM),
            (geometry.width as u32) >> 1,
        );
        dma::setup_loop_channel(loop_channel.reborrow(), data_channel.reborrow());

        St7701 {
            geometry,
            mode: Mode::Rgb565,
            framebuffer_base: framebuffer as u32,
            common,
            pump_sm: sm0,
            timing_sm: sm1,
            palette_sm: sm2,
            command,
            backlight: Backlight::new(backlight),
            channels: ScanChannels {
                data: data_channel,
                line_loop: loop_channel,
                palette: None,
            },
            _unused_data: Some([Output::new(d16, Level::Low), Output::new(d17, Level::Low)]),
        }
    }

    /// Indexed-colour driver: the framebuffer holds 8-bit indices into a
    /// 256-entry palette, decoded to 18-bit colour on the fly.
    #[allow(clippy::too_many_arguments)]
    pub fn new_palette(
        pio: Pio<'d, PIO1>,
        _irqs: impl Binding<interrupt::typelevel::PIO1_IRQ_0, ScanoutInterruptHandler>
        + Binding<interrupt::typelevel::PIO1_IRQ_1, TimingInterruptHandler>,
        geometry: PanelGeometry,
        framebuffer: *mut u8,
        palette: &'static Palette,
        d0: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d1: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d2: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d3: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d4: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d5: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d6: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d7: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d8: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d9: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d10: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d11: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d12: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d13: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d14: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d15: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d16: impl Peripheral<P = impl PioPin + 'd> + 'd,
        d17: impl Peripheral<P = impl PioPin + 'd> + 'd,
        hsync: impl Peripheral<P = impl PioPin + 'd> + 'd,
        vsync: impl Peripheral<P = impl PioPin + 'd> + 'd,
        de: impl Peripheral<P = impl PioPin + 'd> + 'd,
        dot_clk: impl Peripheral<P = impl PioPin + 'd> + 'd,
        sck: impl Peripheral<P = impl PioPin + 'd> + 'd,
        dat: impl Peripheral<P = impl PioPin + 'd> + 'd,
        cs: impl Peripheral<P = impl GpioPin> + 'd,
        data_channel: impl Peripheral<P = impl Channel> + 'd,
        loop_channel: impl Peripheral<P = impl Channel> + 'd,
        addr_channel: impl Peripheral<P = impl Channel> + 'd,
        fetch_channel: impl Peripheral<P = impl Channel> + 'd,
        backlight: Pwm<'d>,
    ) -> Self {
        let Pio {
            mut common,
            mut sm0,
            mut sm1,
            mut sm2,
            sm3,
            ..
        } = pio;

        let sys_hz = embassy_rp::clocks::clk_sys_freq();
        let clocks = ScanClocks::derive(sys_hz, geometry.width, true);

        let data = [
            common.make_pio_pin(d0),
            common.make_pio_pin(d1),
            common.make_pio_pin(d2),
            common.make_pio_pin(d3),
            common.make_pio_pin(d4),
            common.make_pio_pin(d5),
            common.make_pio_pin(d6),
            common.make_pio_pin(d7),
            common.make_pio_pin(d8),
            common.make_pio_pin(d9),
            common.make_pio_pin(d10),
            common.make_pio_pin(d11),
            common.make_pio_pin(d12),
            common.make_pio_pin(d13),
            common.make_pio_pin(d14),
            common.make_pio_pin(d15),
            common.make_pio_pin(d16),
            common.make_pio_pin(d17),
        ];
        let de = common.make_pio_pin(de);
        let data_refs: [&_; 18] = core::array::from_fn(|i| &data[i]);
        setup_pump_18bpp(
            &mut common,
            &mut sm0,
            &de,
            &data_refs,
            clocks.pump_divider,
            geometry.width,
        );

        let hsync = common.make_pio_pin(hsync);
        let vsync = common.make_pio_pin(vsync);
        let dot_clk = common.make_pio_pin(dot_clk);
        setup_timing_state_machine(
            &mut common,
            &mut sm1,
            &hsync,
            &vsync,
            &dot_clk,
            clocks.timing_divider,
        );

        setup_palette_state_machine(&mut common, &mut sm2, palette.as_ptr() as u32);

        let sck = common.make_pio_pin(sck);
        let dat = common.make_pio_pin(dat);
        let command = CommandPort::new(
            &mut common,
            sm3,
            &sck,
            &dat,
            Output::new(cs, Level::High),
            sys_hz,
        );

        let mut data_channel: PeripheralRef<'d, AnyChannel> =
            data_channel.into_ref().map_into();
        let mut loop_channel: PeripheralRef<'d, AnyChannel> =
            loop_channel.into_ref().map_into();
        let mut addr_channel: PeripheralRef<'d, AnyChannel> =
            addr_channel.into_ref().map_into();
        let mut fetch_channel: PeripheralRef<'d, AnyChannel> =
            fetch_channel.into_ref().map_into();

        // Indices flow to the lookup machine; four per word.
        dma::setup_data_channel(
            data_channel.reborrow(),
            loop_channel.reborrow(),
            TreqSel::PIO1_TX2,
            &pac::PIO1.txf(PALETTE_SM),
            (geometry.width as u32) >> 2,
        );
        dma::setup_loop_channel(loop_channel.reborrow(), data_channel.reborrow());
        dma::setup_palette_address_channel(
            addr_channel.reborrow(),
            fetch_channel.reborrow(),
            TreqSel::PIO1_TX0,
            &pac::PIO1.txf(PUMP_SM),
        );
        dma::setup_palette_fetch_channel(
            fetch_channel.reborrow(),
            addr_channel.reborrow(),
            TreqSel::PIO1_RX2,
            &pac::PIO1.rxf(PALETTE_SM),
        );

        St7701 {
            geometry,
            mode: Mode::Indexed { palette },
            framebuffer_base: framebuffer as u32,
            common,
            pump_sm: sm0,
            timing_sm: sm1,
            palette_sm: sm2,
            command,
            backlight: Backlight::new(backlight),
            channels: ScanChannels {
                data: data_channel,
                line_loop: loop_channel,
                palette: Some((addr_channel, fetch_channel)),
            },
            _unused_data: None,
        }
    }

    /// Bring the panel up and start scanout.
    ///
    /// Runs the controller init sequence over the command port, publishes
    /// the scanout configuration to the interrupt layer and arms both PIO
    /// interrupts. The first frame starts at the next frame boundary the
    /// timing stream produces.
    pub async fn init(&mut self) {
        defmt::info!(
            "bringing up {}x{} panel",
            self.geometry.width,
            self.geometry.height
        );
        self.backlight.set(0);
        panel_bring_up(&mut self.command, self.geometry.rotation).await;

        let bytes_per_row = match self.mode {
            Mode::Rgb565 => self.geometry.width as u32 * 2,
            Mode::Indexed { .. } => self.geometry.width as u32,
        };
        SCANOUT.activate(
            ScanConfig {
                bytes_per_row,
                row_shift: self.geometry.row_shift(),
                display_lines: self.geometry.display_lines(),
                data_chan: self.channels.data.number(),
            },
            TimingConfig::for_panel(self.geometry.display_lines() as u16),
            self.framebuffer_base,
        );

        interrupt::PIO1_IRQ_0.set_priority(Priority::P1);
        interrupt::PIO1_IRQ_1.set_priority(Priority::P1);
        pac::PIO1.irqs(0).inte().write_set(|w| {
            w.set_sm0(true);
            w.set_sm1(true);
        });
        pac::PIO1.irqs(1).inte().write_set(|w| w.set_sm1_txnfull(true));
        unsafe { interrupt::PIO1_IRQ_1.enable() };

        // Let the first frames scan out before showing anything.
        Timer::after_millis(50).await;
        self.backlight.set(255);
        defmt::info!("scanout running");
    }

    /// Copy a rendered frame into the scanout buffer without tearing.
    ///
    /// RGB565 sources race the beam and return once the whole frame is
    /// copied. Indexed sources first block for vsync so the palette can
    /// be retuned safely. A source that does not match the display mode
    /// is rejected with a warning.
    pub fn update(&mut self, source: &FrameSource<'_>) {
        match (&self.mode, source) {
            (Mode::Rgb565, FrameSource::Rgb565 { pixels, layers }) => {
                defmt::assert!(pixels.len() == layers * self.geometry.pixels());
                compositor::update_rgb565(&self.geometry, pixels, *layers);
            }
            (
                Mode::Indexed { palette },
                FrameSource::Indexed {
                    pixels,
                    palette: colours,
                    layers,
                },
            ) => {
                defmt::assert!(pixels.len() == layers * self.geometry.pixels());
                self.wait_for_vsync();
                for (entry, colour) in colours.iter().enumerate() {
                    palette.set(entry as u8, *colour);
                }
                compositor::update_indexed(&self.geometry, pixels, *layers);
            }
            _ => defmt::warn!("frame source does not match the display mode"),
        }
    }

    /// Copy one rectangle of a single-layer source into the scanout
    /// buffer. The caller keeps the region away from the scan position.
    pub fn partial_update(&mut self, source: &FrameSource<'_>, region: Region) {
        match (&self.mode, source) {
            (Mode::Rgb565, FrameSource::Rgb565 { pixels, layers: 1 }) => {
                defmt::assert!(pixels.len() == self.geometry.pixels());
                compositor::partial_update_rgb565(&self.geometry, pixels, region);
            }
            (Mode::Indexed { .. }, FrameSource::Indexed { pixels, layers: 1, .. }) => {
                defmt::assert!(pixels.len() == self.geometry.pixels());
                compositor::partial_update_indexed(&self.geometry, pixels, region);
            }
            _ => defmt::warn!("partial update needs a single-layer source in the display mode"),
        }
    }

    pub fn set_backlight(&mut self, brightness: u8) {
        self.backlight.set(brightness);
    }

    /// Retune one palette entry. No-op in RGB565 mode. Call between
    /// [`wait_for_vsync`] and the next frame to avoid mid-scan shifts.
    ///
    /// [`wait_for_vsync`]: St7701::wait_for_vsync
    pub fn set_palette_colour(&mut self, entry: u8, colour: Rgb888) {
        if let Mode::Indexed { palette } = &self.mode {
            palette.set(entry, colour);
        }
    }

    /// Publish a new RGB565 framebuffer; the frame transition swaps it in.
    pub fn set_framebuffer(&mut self, buffer: *mut u16) {
        debug_assert!(matches!(self.mode, Mode::Rgb565));
        self.publish_framebuffer(buffer as u32);
    }

    /// Publish a new index framebuffer; the frame transition swaps it in.
    pub fn set_framebuffer_indexed(&mut self, buffer: *mut u8) {
        debug_assert!(matches!(self.mode, Mode::Indexed { .. }));
        self.publish_framebuffer(buffer as u32);
    }

    fn publish_framebuffer(&mut self, base: u32) {
        self.framebuffer_base = base;
        SCANOUT
            .pending_framebuffer
            .store(base, core::sync::atomic::Ordering::Release);
    }

    /// Block until the next frame transition. Returns immediately if
    /// scanout is not running.
    pub fn wait_for_vsync(&self) {
        if !SCANOUT.is_active() {
            return;
        }
        SCANOUT.vsync.arm();
        while SCANOUT.vsync.is_waiting() {
            cortex_m::asm::wfe();
        }
    }

    /// Async counterpart of [`wait_for_vsync`], for executor tasks that
    /// must not stall their peers.
    ///
    /// [`wait_for_vsync`]: St7701::wait_for_vsync
    pub async fn vsync(&self) {
        SCANOUT.frame_done.reset();
        SCANOUT.frame_done.wait().await;
    }

    /// Reapply the panel orientation. Unsupported angles warn and leave
    /// the panel unchanged.
    pub fn set_rotation(&mut self, rotation: st7701_core::Rotation) {
        command::set_rotation(&mut self.command, rotation);
    }

    /// Stop scanout and quiesce the hardware. Idempotent, and safe to
    /// call without a prior [`init`].
    ///
    /// [`init`]: St7701::init
    pub fn teardown(&mut self) {
        pac::PIO1.irqs(1).inte().write_clear(|w| w.set_sm1_txnfull(true));
        pac::PIO1.irqs(0).inte().write_clear(|w| {
            w.set_sm0(true);
            w.set_sm1(true);
        });
        interrupt::PIO1_IRQ_1.disable();
        SCANOUT.deactivate();

        let mut chans = [0u8; 4];
        let mut n = 0;
        chans[n] = self.channels.data.number();
        n += 1;
        chans[n] = self.channels.line_loop.number();
        n += 1;
        if let Some((addr, fetch)) = &self.channels.palette {
            chans[n] = addr.number();
            chans[n + 1] = fetch.number();
            n += 2;
        }
        // A chained retrigger can land between abort and check, so keep
        // aborting until the chain stays quiet.
        loop {
            SCANOUT
                .next_line_addr
                .store(st7701_core::LINE_DONE, core::sync::atomic::Ordering::Release);
            dma::abort_channels(&chans[..n]);
            cortex_m::asm::delay(1_000);
            let busy = chans[..n]
                .iter()
                .any(|&ch| pac::DMA.ch(ch as usize).ctrl_trig().read().busy());
            if !busy {
                break;
            }
        }

        self.pump_sm.set_enable(false);
        clear_fifos(PUMP_SM);
        self.timing_sm.set_enable(false);
        clear_fifos(TIMING_SM);
        if matches!(self.mode, Mode::Indexed { .. }) {
            self.palette_sm.set_enable(false);
            clear_fifos(PALETTE_SM);
        }
        defmt::info!("scanout stopped");
    }
}

impl Drop for St7701<'_> {
    fn drop(&mut self) {
        self.teardown();
    }
}
