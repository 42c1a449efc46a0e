//! Driver core for the Xilinx SD-FEC soft-decision LDPC/Turbo accelerator.
//!
//! The crate owns the register window of one or more SD-FEC instances and
//! exposes the control surface a character-device shell needs: lifecycle
//! control, LDPC code and turbo programming, interrupt servicing and the
//! command dispatch gate. Mapping the registers, routing the interrupt line
//! and creating device nodes are left to the platform layer.

#![cfg_attr(not(test), no_std)]

extern crate alloc;
#[macro_use]
extern crate log;

use core::{
    ops::Deref,
    ptr::NonNull,
    sync::atomic::{AtomicBool, Ordering},
};

mod config;
mod err;
mod ioctrl;
mod irq;
mod ldpc;
mod protect;
mod registers;
mod registry;
mod state;
mod table;
#[cfg(test)]
mod testing;

pub use config::*;
pub use err::*;
pub use ioctrl::*;
pub use irq::{FaultWaiter, FecStats, IrqReturn, PollFlags};
pub use ldpc::LdpcParams;
pub use registers::{
    consts::REGISTER_SPACE_SIZE,
    ldpc::{CodeReg0, CodeReg1, CodeReg2, CodeReg3, MAX_CODE_ID},
};
pub use registry::{FecRegistry, MAX_DEVICES};
use spin::Mutex;
pub use table::TableKind;
use tock_registers::interfaces::Readable;

use crate::{
    irq::{ErrorCounters, FaultNotifier},
    protect::WriteProtect,
    registers::{
        FecRegisters,
        consts::*,
        ctrl::{self, ACTIVE},
        int::IrqClass,
    },
    state::StateCell,
};

/// Identity, lifecycle state and activity bit of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FecStatus {
    pub fec_id: u32,
    pub state: FecState,
    pub activity: bool,
}

/// Interrupt classes to unmask. A `false` entry leaves that class untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FecIrq {
    pub enable_isr: bool,
    pub enable_ecc_isr: bool,
}

struct Control {
    config: FecConfig,
    protect: WriteProtect,
}

/// One SD-FEC instance.
pub struct SdFec {
    fec_id: u32,
    regs: FecRegisters,
    control: Mutex<Control>,
    state: StateCell,
    stats: ErrorCounters,
    faults: FaultNotifier,
    session: AtomicBool,
}

impl SdFec {
    /// Creates a device over an already mapped register window.
    ///
    /// Nothing is written to hardware until [`SdFec::probe`].
    ///
    /// # Safety
    ///
    /// `base` must be the 4-byte aligned mapping of the SD-FEC register file,
    /// at least `size` bytes long, valid for the lifetime of the device and
    /// not accessed through any other alias.
    pub unsafe fn new(base: NonNull<u8>, size: usize, config: FecConfig) -> FecResult<Self> {
        let regs = unsafe { FecRegisters::new(base, size)? };
        Ok(Self {
            fec_id: config.fec_id,
            regs,
            control: Mutex::new(Control {
                config,
                protect: WriteProtect::default(),
            }),
            state: StateCell::new(FecState::Init),
            stats: ErrorCounters::new(),
            faults: FaultNotifier::new(),
            session: AtomicBool::new(false),
        })
    }

    /// Align the code and stream-format registers with the configuration.
    pub fn probe(&self) -> FecResult<()> {
        let ctl = self.control.lock();
        self.program_code(&ctl)?;
        self.program_axis(&ctl)?;
        info!("SDFEC{} probe successful", self.fec_id);
        Ok(())
    }

    pub fn fec_id(&self) -> u32 {
        self.fec_id
    }

    pub fn state(&self) -> FecState {
        self.state.get()
    }

    /// Acquire the single control session.
    pub fn open(&self) -> FecResult<FecSession<'_>> {
        if self
            .session
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("SDFEC{} already open", self.fec_id());
            return Err(FecError::ResourceBusy);
        }
        Ok(FecSession { dev: self })
    }

    pub fn is_open(&self) -> bool {
        self.session.load(Ordering::Acquire)
    }

    pub fn start(&self) -> FecResult<()> {
        self.state.ensure_operational()?;
        let mut ctl = self.control.lock();
        let id = self.fec_id;

        let Some(code) = ctl.config.code.register_value() else {
            error!("Set code before start for SDFEC{id}");
            return Err(FecError::InvalidArgument("code family not set"));
        };
        let hw_code = self.regs.fec_code.read(ctrl::FEC_CODE::LDPC);
        if hw_code != code {
            error!("SDFEC{id} HW code does not match driver code, reg {hw_code}, code {code}");
            return Err(FecError::InvalidArgument("hardware code does not match configuration"));
        }
        if ctl.config.order == FecOrder::Invalid {
            error!("Set order before starting SDFEC{id}");
            return Err(FecError::InvalidArgument("order not set"));
        }
        if self.state.get() == FecState::Started {
            error!("SDFEC{id} already started");
            return Err(FecError::PermissionDenied("device already started"));
        }

        ctl.protect
            .write(self.regs.window(), OFFSET_AXIS_ENABLE, AXIS_ENABLE_MASK)?;
        ctl.protect.set(self.regs.window(), true)?;
        self.state.advance(FecState::Started)?;
        info!("SDFEC{id} started");
        Ok(())
    }

    pub fn stop(&self) -> FecResult<()> {
        self.state.ensure_operational()?;
        let mut ctl = self.control.lock();
        let id = self.fec_id;

        if self.state.get() != FecState::Started {
            warn!("SDFEC{id} not started correctly");
        }
        ctl.protect.set(self.regs.window(), false)?;
        let enable = self.regs.window().read(OFFSET_AXIS_ENABLE)? & !AXIS_ENABLE_MASK;
        ctl.protect.write(self.regs.window(), OFFSET_AXIS_ENABLE, enable)?;
        self.state.advance(FecState::Stopped)?;
        info!("SDFEC{id} stopped");
        Ok(())
    }

    /// Return to `Init`: forget the order, drop write protection and realign
    /// the code and stream registers. This is the only way out of
    /// `NeedsReset`.
    pub fn set_default_config(&self) -> FecResult<()> {
        let mut ctl = self.control.lock();
        self.state.set(FecState::Init);
        ctl.config.order = FecOrder::Invalid;
        ctl.protect.set(self.regs.window(), false)?;
        self.program_code(&ctl)?;
        self.program_axis(&ctl)?;
        info!("SDFEC{} reset to default configuration", self.fec_id);
        Ok(())
    }

    pub fn get_status(&self) -> FecStatus {
        FecStatus {
            fec_id: self.fec_id(),
            state: self.state.get(),
            activity: self.regs.active.is_set(ACTIVE::IS_ACTIVE),
        }
    }

    pub fn get_config(&self) -> FecResult<FecConfig> {
        self.state.ensure_operational()?;
        Ok(self.control.lock().config.clone())
    }

    pub fn is_active(&self) -> FecResult<bool> {
        self.state.ensure_operational()?;
        Ok(self.regs.active.is_set(ACTIVE::IS_ACTIVE))
    }

    pub fn set_irq(&self, irq: FecIrq) -> FecResult<()> {
        self.state.ensure_operational()?;
        let _ctl = self.control.lock();
        if irq.enable_isr {
            self.regs.set_irq_enabled(IrqClass::Status, true)?;
        }
        if irq.enable_ecc_isr {
            self.regs.set_irq_enabled(IrqClass::Ecc, true)?;
        }
        Ok(())
    }

    pub fn set_turbo(&self, turbo: &FecTurbo) -> FecResult<()> {
        self.state.ensure_operational()?;
        let mut ctl = self.control.lock();
        let id = self.fec_id;
        if ctl.config.code == FecCode::Ldpc {
            error!("Unable to write Turbo to SDFEC{id}, configured for LDPC");
            return Err(FecError::InvalidArgument("device configured for LDPC"));
        }
        let word = ctrl::turbo_value(turbo, ctl.config.field_policy)?;

        self.unprotected(&mut ctl, |dev, ctl| {
            dev.adopt_code(ctl, FecCode::Turbo)?;
            dev.state.ensure_operational()?;
            ctl.protect.write(dev.regs.window(), OFFSET_TURBO, word)
        })
    }

    pub fn get_turbo(&self) -> FecResult<FecTurbo> {
        self.state.ensure_operational()?;
        let ctl = self.control.lock();
        if ctl.config.code == FecCode::Ldpc {
            error!("SDFEC{} is configured for LDPC", self.fec_id);
            return Err(FecError::InvalidArgument("device configured for LDPC"));
        }
        Ok(ctrl::turbo_from_value(self.regs.turbo.get()))
    }

    pub fn set_order(&self, order: FecOrder) -> FecResult<()> {
        self.state.ensure_operational()?;
        let mut ctl = self.control.lock();
        let id = self.fec_id;
        if order == FecOrder::Invalid {
            error!("Invalid order value {order:?} for SDFEC{id}");
            return Err(FecError::InvalidArgument("invalid order"));
        }
        if self.state.get() == FecState::Started {
            error!("Attempting to set order while started for SDFEC{id}");
            return Err(FecError::PermissionDenied("device started"));
        }
        ctl.protect
            .write(self.regs.window(), OFFSET_ORDER, order as u32 - 1)?;
        ctl.config.order = order;
        Ok(())
    }

    pub fn set_bypass(&self, bypass: bool) -> FecResult<()> {
        self.state.ensure_operational()?;
        let ctl = self.control.lock();
        if self.state.get() == FecState::Started {
            error!(
                "Attempting to set bypass while started for SDFEC{}",
                self.fec_id
            );
            return Err(FecError::PermissionDenied("device started"));
        }
        ctl.protect
            .write(self.regs.window(), OFFSET_BYPASS, bypass as u32)
    }

    /// Run `f` with write protection lowered, raising it again afterwards if
    /// the device is still running.
    fn unprotected<R>(
        &self,
        ctl: &mut Control,
        f: impl FnOnce(&Self, &mut Control) -> FecResult<R>,
    ) -> FecResult<R> {
        let relock = ctl.protect.is_enabled();
        if relock {
            ctl.protect.set(self.regs.window(), false)?;
        }
        let ret = f(self, ctl);
        if relock && self.state.get() == FecState::Started {
            let raised = ctl.protect.set(self.regs.window(), true);
            if let Err(e) = raised {
                error!("SDFEC{}: failed to raise write protection: {e}", self.fec_id);
                return ret.and(Err(e));
            }
        }
        ret
    }

    /// Take on `code` if the device has no code family yet.
    fn adopt_code(&self, ctl: &mut Control, code: FecCode) -> FecResult<()> {
        if ctl.config.code == FecCode::Invalid {
            ctl.config.code = code;
            self.program_code(ctl)?;
            info!("SDFEC{} adopted {code:?}", self.fec_id);
        }
        Ok(())
    }

    fn program_code(&self, ctl: &Control) -> FecResult<()> {
        match ctl.config.code.register_value() {
            Some(value) => ctl.protect.write(self.regs.window(), OFFSET_FEC_CODE, value),
            None => Ok(()),
        }
    }

    fn program_axis(&self, ctl: &Control) -> FecResult<()> {
        let cfg = &ctl.config;
        let value = ctrl::axis_width_value(
            cfg.din_width,
            cfg.din_word_include,
            cfg.dout_width,
            cfg.dout_word_include,
        );
        ctl.protect.write(self.regs.window(), OFFSET_AXIS_WIDTH, value)
    }
}

/// The control session of one device. Dropping it releases the device for
/// the next [`SdFec::open`].
pub struct FecSession<'a> {
    dev: &'a SdFec,
}

impl Deref for FecSession<'_> {
    type Target = SdFec;

    fn deref(&self) -> &Self::Target {
        self.dev
    }
}

impl Drop for FecSession<'_> {
    fn drop(&mut self) {
        self.dev.session.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeMmio;

    fn ldpc_device(mmio: &FakeMmio) -> SdFec {
        let config = FecConfig::new(FecCode::Ldpc);
        let dev = unsafe { SdFec::new(mmio.base(), REGISTER_SPACE_SIZE, config).unwrap() };
        dev.probe().unwrap();
        dev
    }

    #[test]
    fn probe_programs_code_and_streams() {
        let mmio = FakeMmio::new();
        let config = FecConfig::new(FecCode::Ldpc)
            .with_din(AxisWidth::W2x128b, AxisWordInclude::PerAxiTransaction);
        let dev = unsafe { SdFec::new(mmio.base(), REGISTER_SPACE_SIZE, config).unwrap() };
        dev.probe().unwrap();
        assert_eq!(mmio.peek(OFFSET_FEC_CODE), 1);
        assert_eq!(mmio.peek(OFFSET_AXIS_WIDTH), 0b101);
    }

    #[test]
    fn start_requires_code_and_order() {
        let mmio = FakeMmio::new();
        let dev = unsafe {
            SdFec::new(mmio.base(), REGISTER_SPACE_SIZE, FecConfig::default()).unwrap()
        };
        dev.set_order(FecOrder::Maintain).unwrap();
        assert_eq!(
            dev.start().unwrap_err(),
            FecError::InvalidArgument("code family not set")
        );

        let mmio = FakeMmio::new();
        let dev = ldpc_device(&mmio);
        assert_eq!(dev.start().unwrap_err(), FecError::InvalidArgument("order not set"));
        assert_eq!(dev.state(), FecState::Init);
    }

    #[test]
    fn start_refuses_mismatched_hardware_code() {
        let mmio = FakeMmio::new();
        let dev = ldpc_device(&mmio);
        dev.set_order(FecOrder::Maintain).unwrap();
        mmio.poke(OFFSET_FEC_CODE, 0);
        assert_eq!(dev.start().unwrap_err().kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn start_stop_toggle_streams_and_protection() {
        let mmio = FakeMmio::new();
        let dev = ldpc_device(&mmio);
        dev.set_order(FecOrder::OutOfOrder).unwrap();
        assert_eq!(mmio.peek(OFFSET_ORDER), 1);

        dev.start().unwrap();
        assert_eq!(dev.state(), FecState::Started);
        assert_eq!(mmio.peek(OFFSET_AXIS_ENABLE), AXIS_ENABLE_MASK);
        assert_eq!(mmio.peek(OFFSET_AXI_WR_PROTECT), WRITE_PROTECT_ENABLE);
        assert_eq!(mmio.peek(OFFSET_CODE_WR_PROTECT), WRITE_PROTECT_ENABLE);

        assert_eq!(
            dev.set_order(FecOrder::Maintain).unwrap_err().kind(),
            ErrorKind::PermissionDenied
        );
        assert_eq!(dev.set_bypass(true).unwrap_err().kind(), ErrorKind::PermissionDenied);
        assert_eq!(mmio.peek(OFFSET_ORDER), 1);
        assert_eq!(mmio.peek(OFFSET_BYPASS), 0);

        dev.stop().unwrap();
        assert_eq!(dev.state(), FecState::Stopped);
        assert_eq!(mmio.peek(OFFSET_AXIS_ENABLE), 0);
        assert_eq!(mmio.peek(OFFSET_AXI_WR_PROTECT), WRITE_PROTECT_DISABLE);

        dev.set_bypass(true).unwrap();
        assert_eq!(mmio.peek(OFFSET_BYPASS), 1);
    }

    #[test]
    fn stop_without_start_still_stops() {
        let mmio = FakeMmio::new();
        let dev = ldpc_device(&mmio);
        mmio.poke(OFFSET_AXIS_ENABLE, 0x1ff);
        dev.stop().unwrap();
        assert_eq!(dev.state(), FecState::Stopped);
        assert_eq!(mmio.peek(OFFSET_AXIS_ENABLE), 0x1c0);
    }

    #[test]
    fn turbo_is_exclusive_with_ldpc() {
        let mmio = FakeMmio::new();
        let dev = ldpc_device(&mmio);
        let turbo = FecTurbo {
            alg: TurboAlg::MaxStar,
            scale: 3,
        };
        assert_eq!(dev.set_turbo(&turbo).unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert!(dev.get_turbo().is_err());
        assert_eq!(mmio.peek(OFFSET_TURBO), 0);
    }

    #[test]
    fn turbo_adopts_family_and_reads_back() {
        let mmio = FakeMmio::new();
        mmio.poke(OFFSET_FEC_CODE, 1);
        let dev = unsafe {
            SdFec::new(mmio.base(), REGISTER_SPACE_SIZE, FecConfig::default()).unwrap()
        };
        let turbo = FecTurbo {
            alg: TurboAlg::MaxStar,
            scale: 9,
        };
        dev.set_turbo(&turbo).unwrap();
        assert_eq!(dev.get_config().unwrap().code, FecCode::Turbo);
        assert_eq!(mmio.peek(OFFSET_FEC_CODE), 0);
        assert_eq!(mmio.peek(OFFSET_TURBO), 0x901);
        assert_eq!(dev.get_turbo().unwrap(), turbo);
    }

    #[test]
    fn programming_while_started_restores_protection() {
        let mmio = FakeMmio::new();
        mmio.poke(OFFSET_FEC_CODE, 0);
        let dev = unsafe {
            SdFec::new(mmio.base(), REGISTER_SPACE_SIZE, FecConfig::new(FecCode::Turbo)).unwrap()
        };
        dev.probe().unwrap();
        dev.set_order(FecOrder::Maintain).unwrap();
        dev.start().unwrap();

        let turbo = FecTurbo {
            alg: TurboAlg::MaxScale,
            scale: 4,
        };
        dev.set_turbo(&turbo).unwrap();
        assert_eq!(mmio.peek(OFFSET_TURBO), 0x400);
        assert_eq!(mmio.peek(OFFSET_AXI_WR_PROTECT), WRITE_PROTECT_ENABLE);
        assert_eq!(mmio.peek(OFFSET_CODE_WR_PROTECT), WRITE_PROTECT_ENABLE);
        assert_eq!(dev.state(), FecState::Started);
    }

    #[test]
    fn failed_unprotected_step_keeps_its_error() {
        let mmio = FakeMmio::new();
        let dev = ldpc_device(&mmio);
        dev.set_order(FecOrder::Maintain).unwrap();
        dev.start().unwrap();

        let mut ctl = dev.control.lock();
        let err = dev
            .unprotected(&mut ctl, |dev, ctl| {
                assert!(!ctl.protect.is_enabled());
                dev.regs.window().write(REGISTER_SPACE_SIZE, 0)
            })
            .unwrap_err();
        assert_eq!(err, FecError::HardwareFault("register offset outside mapped window"));
        assert!(ctl.protect.is_enabled());
        assert_eq!(mmio.peek(OFFSET_AXI_WR_PROTECT), WRITE_PROTECT_ENABLE);
    }

    #[test]
    fn fault_handler_runs_while_control_is_held() {
        let mmio = FakeMmio::new();
        let dev = ldpc_device(&mmio);
        mmio.poke(OFFSET_ECC_ISR, 0x800);

        let ctl = dev.control.lock();
        let ret = std::thread::scope(|s| s.spawn(|| dev.handle_irq()).join().unwrap());
        assert_eq!(ret, IrqReturn::Handled);
        assert_eq!(dev.state(), FecState::NeedsReset);
        assert_eq!(dev.get_status().fec_id, 0);
        drop(ctl);
    }

    #[test]
    fn set_irq_verifies_mask() {
        let mmio = FakeMmio::new();
        let dev = ldpc_device(&mmio);
        dev.set_irq(FecIrq {
            enable_isr: true,
            enable_ecc_isr: true,
        })
        .unwrap();
        assert_eq!(mmio.peek(OFFSET_IER), ISR_MASK);
        assert_eq!(mmio.peek(OFFSET_ECC_IER), ECC_ISR_MASK);

        mmio.poke(OFFSET_ECC_IMR, 0x1);
        let err = dev
            .set_irq(FecIrq {
                enable_isr: false,
                enable_ecc_isr: true,
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HardwareFault);
    }

    #[test]
    fn status_reports_activity() {
        let mmio = FakeMmio::new();
        let dev = ldpc_device(&mmio);
        assert!(!dev.get_status().activity);
        mmio.poke(OFFSET_ACTIVE, 1);
        let status = dev.get_status();
        assert!(status.activity);
        assert_eq!(status.state, FecState::Init);
        assert!(dev.is_active().unwrap());
    }

    #[test]
    fn single_session() {
        let mmio = FakeMmio::new();
        let dev = ldpc_device(&mmio);
        let session = dev.open().unwrap();
        assert_eq!(dev.open().err(), Some(FecError::ResourceBusy));
        drop(session);
        assert!(dev.open().is_ok());
    }

    #[test]
    fn fatal_interrupt_escalates_and_wakes() {
        let mmio = FakeMmio::new();
        let dev = ldpc_device(&mmio);
        let mut waiter = dev.subscribe_faults();
        assert_eq!(dev.poll(), PollFlags::PRIORITY | PollFlags::ERROR);

        mmio.poke(OFFSET_ECC_ISR, 0x1800 | 0x3);
        assert_eq!(dev.handle_irq(), IrqReturn::Handled);
        assert_eq!(dev.state(), FecState::NeedsReset);
        assert_eq!(
            dev.get_stats(),
            FecStats {
                isr_err_count: 0,
                cecc_count: 2,
                uecc_count: 2,
            }
        );
        assert_eq!(mmio.peek(OFFSET_ECC_ISR), 0);
        assert!(waiter.wait_for(1));
        assert_eq!(dev.poll(), PollFlags::READABLE | PollFlags::READ_NORMAL);
        assert_eq!(mmio.peek(OFFSET_IER), ISR_MASK);
        assert_eq!(mmio.peek(OFFSET_ECC_IER), ECC_ISR_MASK);

        assert_eq!(dev.start().unwrap_err().kind(), ErrorKind::PermissionDenied);
        dev.set_default_config().unwrap();
        assert_eq!(dev.state(), FecState::Init);
    }

    #[test]
    fn status_error_is_fatal_and_correctable_is_not() {
        let mmio = FakeMmio::new();
        let dev = ldpc_device(&mmio);

        mmio.poke(OFFSET_ECC_ISR, 0x5);
        assert_eq!(dev.handle_irq(), IrqReturn::Handled);
        assert_eq!(dev.state(), FecState::Init);
        assert_eq!(dev.get_stats().cecc_count, 2);

        assert_eq!(dev.handle_irq(), IrqReturn::None);

        mmio.poke(OFFSET_ISR, 0x21);
        assert_eq!(dev.handle_irq(), IrqReturn::Handled);
        assert_eq!(dev.state(), FecState::NeedsReset);
        assert_eq!(dev.get_stats().isr_err_count, 2);
        assert_eq!(mmio.peek(OFFSET_ISR), 0);

        dev.clear_stats();
        assert_eq!(dev.get_stats(), FecStats::default());
    }
}
