//! DMA plumbing between framebuffer memory and the PIO FIFOs.
//!
//! Direct RGB565 uses two channels: the data channel streams one line into
//! the pump FIFO and chains to a loop channel, which copies the line
//! pointer republished by the end-of-line interrupt into the data
//! channel's read-address trigger. A zero pointer retriggers with a zero
//! transfer, parking the chain until the frame transition kicks it again.
//!
//! Palette mode adds a second pair: the data channel feeds indices to the
//! lookup state machine instead, while a fetch channel moves each entry
//! address the lookup produces into an address channel that reads the
//! palette word straight into the pump FIFO.

use embassy_rp::PeripheralRef;
use embassy_rp::dma::Channel;
use embassy_rp::pac;
use embassy_rp::pac::common::{RW, Reg};
use embassy_rp::pac::dma::regs::CtrlTrig;
use embassy_rp::pac::dma::vals::{DataSize, TreqSel};

use crate::scanout::SCANOUT;

/// Line data channel: framebuffer words into a PIO TX FIFO. The byte swap
/// puts the leftmost pixel in the bits the pump shifts out first.
pub(crate) fn setup_data_channel<C: Channel, L: Channel>(
    data_channel: PeripheralRef<'_, C>,
    loop_channel: PeripheralRef<'_, L>,
    treq: TreqSel,
    fifo: &Reg<u32, RW>,
    words_per_line: u32,
) {
    data_channel.regs().al1_ctrl().write(|c| {
        let mut t = CtrlTrig(*c);
        t.set_incr_read(true);
        t.set_incr_write(false);
        t.set_data_size(DataSize::SIZE_WORD);
        t.set_treq_sel(treq);
        t.set_bswap(true);
        t.set_irq_quiet(true);
        t.set_chain_to(loop_channel.number());
        t.set_en(true);
        *c = t.0;
    });

    data_channel
        .regs()
        .trans_count()
        .write(|c| c.0 = words_per_line);
    data_channel
        .regs()
        .write_addr()
        .write(|c| *c = fifo.as_ptr() as u32);
}

/// Loop channel: one word from the shared line pointer into the data
/// channel's read-address trigger. Left unchained; the write it performs
/// is itself the retrigger.
pub(crate) fn setup_loop_channel<L: Channel, C: Channel>(
    loop_channel: PeripheralRef<'_, L>,
    data_channel: PeripheralRef<'_, C>,
) {
    loop_channel.regs().al1_ctrl().write(|c| {
        let mut t = CtrlTrig(*c);
        t.set_incr_read(false);
        t.set_incr_write(false);
        t.set_data_size(DataSize::SIZE_WORD);
        t.set_treq_sel(TreqSel::PERMANENT);
        t.set_irq_quiet(true);
        // Self-chain disables chaining.
        t.set_chain_to(loop_channel.number());
        t.set_en(true);
        *c = t.0;
    });

    loop_channel
        .regs()
        .read_addr()
        .write(|c| *c = core::ptr::addr_of!(SCANOUT.next_line_addr) as u32);
    loop_channel.regs().trans_count().write(|c| c.0 = 1);
    loop_channel
        .regs()
        .write_addr()
        .write(|c| *c = data_channel.regs().al3_read_addr_trig().as_ptr() as u32);
}

/// Address channel: one palette word from wherever the fetch channel
/// pointed it, into the pump FIFO.
pub(crate) fn setup_palette_address_channel<A: Channel, F: Channel>(
    addr_channel: PeripheralRef<'_, A>,
    fetch_channel: PeripheralRef<'_, F>,
    pump_treq: TreqSel,
    pump_fifo: &Reg<u32, RW>,
) {
    addr_channel.regs().al1_ctrl().write(|c| {
        let mut t = CtrlTrig(*c);
        t.set_incr_read(false);
        t.set_incr_write(false);
        t.set_data_size(DataSize::SIZE_WORD);
        t.set_treq_sel(pump_treq);
        t.set_irq_quiet(true);
        t.set_chain_to(fetch_channel.number());
        t.set_en(true);
        *c = t.0;
    });

    addr_channel.regs().trans_count().write(|c| c.0 = 1);
    addr_channel
        .regs()
        .write_addr()
        .write(|c| *c = pump_fifo.as_ptr() as u32);
}

/// Fetch channel: pulls entry addresses out of the lookup RX FIFO and
/// lands each one in the address channel's read-address trigger. Triggered
/// here; its RX dreq keeps it paced to the lookup state machine.
pub(crate) fn setup_palette_fetch_channel<F: Channel, A: Channel>(
    fetch_channel: PeripheralRef<'_, F>,
    addr_channel: PeripheralRef<'_, A>,
    lookup_rx_treq: TreqSel,
    lookup_rx_fifo: &Reg<u32, RW>,
) {
    fetch_channel.regs().al1_ctrl().write(|c| {
        let mut t = CtrlTrig(*c);
        t.set_incr_read(false);
        t.set_incr_write(false);
        t.set_data_size(DataSize::SIZE_WORD);
        t.set_treq_sel(lookup_rx_treq);
        t.set_irq_quiet(true);
        t.set_chain_to(fetch_channel.number());
        t.set_en(true);
        *c = t.0;
    });

    fetch_channel
        .regs()
        .read_addr()
        .write(|c| *c = lookup_rx_fifo.as_ptr() as u32);
    fetch_channel.regs().trans_count().write(|c| c.0 = 1);
    fetch_channel
        .regs()
        .al2_write_addr_trig()
        .write(|c| *c = addr_channel.regs().al3_read_addr_trig().as_ptr() as u32);
}

/// Stop a channel chain dead: abort every member and wait each one out.
pub(crate) fn abort_channels(channels: &[u8]) {
    let mut mask = 0u16;
    for &ch in channels {
        mask |= 1 << ch;
    }
    pac::DMA.chan_abort().write(|w| w.set_chan_abort(mask));
    for &ch in channels {
        while pac::DMA.ch(ch as usize).ctrl_trig().read().busy() {}
    }
}
