//! Write-protection gate.
//!
//! The core has two protect registers: one guarding the code/instruction
//! path and one at the AXI interconnect. Both are mirrored by a software flag
//! that every protected write consults before touching hardware.

use crate::{
    err::{FecError, FecResult},
    registers::{RegisterWindow, consts::*},
};

#[derive(Debug, Default)]
pub struct WriteProtect {
    enabled: bool,
}

impl WriteProtect {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Raise or lower protection.
    ///
    /// Raising programs the code gate before the interconnect gate and only
    /// then sets the flag. Lowering clears the flag, then the interconnect
    /// gate, and relaxes the code gate last.
    pub fn set(&mut self, regs: &RegisterWindow, enable: bool) -> FecResult<()> {
        if enable {
            if self.enabled {
                return Ok(());
            }
            regs.write(OFFSET_CODE_WR_PROTECT, WRITE_PROTECT_ENABLE)?;
            regs.write(OFFSET_AXI_WR_PROTECT, WRITE_PROTECT_ENABLE)?;
            self.enabled = true;
        } else {
            self.enabled = false;
            regs.write(OFFSET_AXI_WR_PROTECT, WRITE_PROTECT_DISABLE)?;
            regs.write(OFFSET_CODE_WR_PROTECT, WRITE_PROTECT_DISABLE)?;
        }
        Ok(())
    }

    /// Fail with `PermissionDenied` while protection is raised.
    pub fn check(&self) -> FecResult<()> {
        if self.enabled {
            error!("SDFEC in write protect");
            return Err(FecError::PermissionDenied("write protection enabled"));
        }
        Ok(())
    }

    /// Write a protected register. Nothing reaches hardware while protection
    /// is raised.
    pub fn write(&self, regs: &RegisterWindow, offset: usize, value: u32) -> FecResult<()> {
        self.check()?;
        regs.write(offset, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeMmio;

    #[test]
    fn protected_write_is_dropped() {
        let mmio = FakeMmio::new();
        let regs = mmio.window();
        let mut gate = WriteProtect::default();

        gate.write(&regs, OFFSET_ORDER, 1).unwrap();
        gate.set(&regs, true).unwrap();
        assert_eq!(mmio.peek(OFFSET_CODE_WR_PROTECT), WRITE_PROTECT_ENABLE);
        assert_eq!(mmio.peek(OFFSET_AXI_WR_PROTECT), WRITE_PROTECT_ENABLE);

        let before = mmio.peek(OFFSET_ORDER);
        let err = gate.write(&regs, OFFSET_ORDER, 0).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::PermissionDenied);
        assert_eq!(mmio.peek(OFFSET_ORDER), before);
    }

    #[test]
    fn lowering_clears_both_gates() {
        let mmio = FakeMmio::new();
        let regs = mmio.window();
        let mut gate = WriteProtect::default();

        gate.set(&regs, true).unwrap();
        gate.set(&regs, false).unwrap();
        assert!(!gate.is_enabled());
        assert_eq!(mmio.peek(OFFSET_CODE_WR_PROTECT), WRITE_PROTECT_DISABLE);
        assert_eq!(mmio.peek(OFFSET_AXI_WR_PROTECT), WRITE_PROTECT_DISABLE);
        gate.write(&regs, OFFSET_BYPASS, 1).unwrap();
        assert_eq!(mmio.peek(OFFSET_BYPASS), 1);
    }
}
