//! Fault detection and escalation.
//!
//! The handler is the only writer of the error counters and of the fault
//! generation. Control operations observe both without taking the control
//! lock, so every shared value here is an atomic.

use core::sync::atomic::{AtomicU32, Ordering};

use bitflags::bitflags;

use crate::{
    SdFec,
    config::FecState,
    registers::{consts::*, int::IrqClass},
};

/// Outcome of one pass through [`SdFec::handle_irq`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqReturn {
    /// No error bit was set; the interrupt belongs to someone else.
    None,
    Handled,
}

bitflags! {
    /// Readiness mask reported by [`SdFec::poll`], numerically identical to
    /// the `POLL*` bits a character-device shell hands to userspace.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PollFlags: u32 {
        const READABLE = 0x0001;
        const PRIORITY = 0x0002;
        const ERROR = 0x0008;
        const READ_NORMAL = 0x0040;
    }
}

/// Snapshot of the three error counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FecStats {
    pub isr_err_count: u32,
    pub cecc_count: u32,
    pub uecc_count: u32,
}

#[derive(Debug, Default)]
pub(crate) struct ErrorCounters {
    isr_err: AtomicU32,
    cecc: AtomicU32,
    uecc: AtomicU32,
}

impl ErrorCounters {
    pub(crate) const fn new() -> Self {
        Self {
            isr_err: AtomicU32::new(0),
            cecc: AtomicU32::new(0),
            uecc: AtomicU32::new(0),
        }
    }

    /// Add `bits.count_ones()` and return the new total. Wraps on overflow.
    fn bump(counter: &AtomicU32, bits: u32) -> u32 {
        let events = bits.count_ones();
        counter.fetch_add(events, Ordering::AcqRel).wrapping_add(events)
    }

    pub(crate) fn snapshot(&self) -> FecStats {
        FecStats {
            isr_err_count: self.isr_err.load(Ordering::Acquire),
            cecc_count: self.cecc.load(Ordering::Acquire),
            uecc_count: self.uecc.load(Ordering::Acquire),
        }
    }

    pub(crate) fn clear(&self) {
        self.isr_err.store(0, Ordering::Release);
        self.cecc.store(0, Ordering::Release);
        self.uecc.store(0, Ordering::Release);
    }
}

/// Single-writer broadcast of fatal faults.
///
/// Every fatal event bumps a generation number; a waiter remembers the
/// generation it subscribed at and is released once it moves.
#[derive(Debug, Default)]
pub(crate) struct FaultNotifier {
    generation: AtomicU32,
}

impl FaultNotifier {
    pub(crate) const fn new() -> Self {
        Self {
            generation: AtomicU32::new(0),
        }
    }

    fn publish(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    fn current(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }
}

/// Handle for parking until the device reports a fatal fault.
pub struct FaultWaiter<'a> {
    notifier: &'a FaultNotifier,
    seen: u32,
}

impl FaultWaiter<'_> {
    /// True once a fatal fault was published after this waiter subscribed.
    pub fn is_signalled(&self) -> bool {
        self.notifier.current() != self.seen
    }

    /// Block until the next fatal fault. Consumes the notification.
    pub fn wait(&mut self) {
        while !self.is_signalled() {
            core::hint::spin_loop();
        }
        self.seen = self.notifier.current();
    }

    /// Bounded variant of [`FaultWaiter::wait`]; gives up after `spins`
    /// polls and reports whether a fault arrived.
    pub fn wait_for(&mut self, spins: usize) -> bool {
        for _ in 0..spins {
            if self.is_signalled() {
                self.seen = self.notifier.current();
                return true;
            }
            core::hint::spin_loop();
        }
        false
    }
}

impl SdFec {
    /// Service one interrupt from the core.
    ///
    /// Both interrupt classes are masked for the duration of the handler and
    /// unmasked again on every path, including after a fatal fault.
    pub fn handle_irq(&self) -> IrqReturn {
        let id = self.fec_id;
        self.mask_all(false);

        let ecc_err = self.regs.ecc_errors();
        let isr_err = self.regs.status_errors();

        let mut fatal = false;
        let ret = if ecc_err & ECC_ISR_MBE != 0 {
            self.log_ecc_errors(id, ecc_err);
            self.reset_required();
            fatal = true;
            IrqReturn::Handled
        } else if isr_err != 0 {
            self.log_isr_errors(id, isr_err);
            self.reset_required();
            fatal = true;
            IrqReturn::Handled
        } else if ecc_err & ECC_ISR_SBE != 0 {
            self.log_ecc_errors(id, ecc_err);
            IrqReturn::Handled
        } else {
            IrqReturn::None
        };

        if fatal {
            self.faults.publish();
        }

        self.mask_all(true);
        ret
    }

    fn mask_all(&self, enable: bool) {
        for class in [IrqClass::Status, IrqClass::Ecc] {
            if let Err(e) = self.regs.set_irq_enabled(class, enable) {
                error!("SDFEC{}: {class:?} irq toggle failed in handler: {e}", self.fec_id);
            }
        }
    }

    fn log_ecc_errors(&self, id: u32, ecc_err: u32) {
        let uecc = ErrorCounters::bump(&self.stats.uecc, ecc_err & ECC_ISR_MBE);
        let cecc = ErrorCounters::bump(&self.stats.cecc, ecc_err & ECC_ISR_SBE);

        if ecc_err & ECC_ISR_MBE != 0 {
            if uecc < ERROR_LOG_THRESHOLD {
                error!("Multi-bit error on SDFEC{id}. Needs reset");
            }
        } else if cecc < ERROR_LOG_THRESHOLD {
            error!("Correctable ECC error on SDFEC{id}");
        }
        self.regs.clear_ecc_status();
    }

    fn log_isr_errors(&self, id: u32, isr_err: u32) {
        let count = ErrorCounters::bump(&self.stats.isr_err, isr_err);
        if count < ERROR_LOG_THRESHOLD {
            error!("SDFEC{id}: Tlast, DIN_WORDS or DOUT_WORDS not correct");
        }
        self.regs.clear_status();
    }

    fn reset_required(&self) {
        self.state.set(FecState::NeedsReset);
    }

    /// Subscribe to fatal fault notifications published from now on.
    pub fn subscribe_faults(&self) -> FaultWaiter<'_> {
        FaultWaiter {
            notifier: &self.faults,
            seen: self.faults.current(),
        }
    }

    /// Readiness mask for a poll-style caller.
    pub fn poll(&self) -> PollFlags {
        if self.state.is_needs_reset() {
            PollFlags::READABLE | PollFlags::READ_NORMAL
        } else {
            PollFlags::PRIORITY | PollFlags::ERROR
        }
    }

    pub fn get_stats(&self) -> FecStats {
        self.stats.snapshot()
    }

    pub fn clear_stats(&self) {
        self.stats.clear();
    }
}
