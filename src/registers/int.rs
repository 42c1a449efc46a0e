use tock_registers::{
    interfaces::{Readable, Writeable},
    register_bitfields,
};

use super::{CtrlRegs, consts::*};
use crate::err::{FecError, FecResult};

register_bitfields! {u32,
    pub ISR [
        // TLAST, DIN_WORDS and DOUT_WORDS framing errors.
        ERRORS OFFSET(0) NUMBITS(6) []
    ],

    pub ECC_ISR [
        // Correctable single-bit memory errors.
        SBE OFFSET(0) NUMBITS(11) [],
        // Uncorrectable multi-bit memory errors.
        MBE OFFSET(11) NUMBITS(11) []
    ]
}

/// The two independently maskable interrupt classes of the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqClass {
    Status,
    Ecc,
}

impl IrqClass {
    pub const fn mask(self) -> u32 {
        match self {
            IrqClass::Status => ISR_MASK,
            IrqClass::Ecc => ECC_ISR_MASK,
        }
    }
}

impl CtrlRegs {
    /// Unmask or mask one interrupt class and confirm the change through the
    /// matching mask register.
    pub fn set_irq_enabled(&self, class: IrqClass, enable: bool) -> FecResult<()> {
        let mask = class.mask();
        let mask_read = match (class, enable) {
            (IrqClass::Status, true) => {
                self.ier.set(mask);
                self.imr.get()
            }
            (IrqClass::Status, false) => {
                self.idr.set(mask);
                self.imr.get()
            }
            (IrqClass::Ecc, true) => {
                self.ecc_ier.set(mask);
                self.ecc_imr.get()
            }
            (IrqClass::Ecc, false) => {
                self.ecc_idr.set(mask);
                self.ecc_imr.get()
            }
        };

        let confirmed = if enable {
            mask_read & mask == 0
        } else {
            mask_read & mask == mask
        };
        if !confirmed {
            error!(
                "{} {class:?} irq failed, mask register reads {mask_read:#x}",
                if enable { "Enabling" } else { "Disabling" }
            );
            return Err(FecError::HardwareFault("interrupt mask verification failed"));
        }
        Ok(())
    }

    /// Read the general interrupt status, limited to the error bits.
    pub fn status_errors(&self) -> u32 {
        self.isr.get() & ISR_MASK
    }

    /// Read the ECC interrupt status, limited to the SBE and MBE bits.
    pub fn ecc_errors(&self) -> u32 {
        self.ecc_isr.get() & ECC_ISR_MASK
    }

    pub fn clear_status(&self) {
        self.isr.set(0);
    }

    pub fn clear_ecc_status(&self) {
        self.ecc_isr.set(0);
    }
}
