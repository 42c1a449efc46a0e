//! Bitfield codec for the four registers that make up one LDPC code
//! descriptor.
//!
//! Encoding never touches hardware: it validates every field against its
//! bitfield width according to the configured [`FieldPolicy`] and produces the
//! word to program. Decoding is the exact inverse.

use tock_registers::{LocalRegisterCopy, register_bitfields};

use super::{consts::*, pack};
use crate::{
    config::FieldPolicy,
    err::{FecError, FecResult},
};

register_bitfields! {u32,
    pub LDPC_CODE_REG0 [
        N OFFSET(0) NUMBITS(16) [],
        K OFFSET(16) NUMBITS(15) []
    ],

    pub LDPC_CODE_REG1 [
        PSIZE OFFSET(0) NUMBITS(9) [],
        NO_PACKING OFFSET(10) NUMBITS(1) [],
        NM OFFSET(11) NUMBITS(9) []
    ],

    pub LDPC_CODE_REG2 [
        NLAYERS OFFSET(0) NUMBITS(9) [],
        NMQC OFFSET(9) NUMBITS(11) [],
        NORM_TYPE OFFSET(20) NUMBITS(1) [],
        SPECIAL_QC OFFSET(21) NUMBITS(1) [],
        NO_FINAL_PARITY OFFSET(22) NUMBITS(1) [],
        MAX_SCHEDULE OFFSET(23) NUMBITS(2) []
    ],

    pub LDPC_CODE_REG3 [
        SC_OFF OFFSET(0) NUMBITS(8) [],
        LA_OFF OFFSET(8) NUMBITS(8) [],
        QC_OFF OFFSET(16) NUMBITS(8) []
    ]
}

/// One of the four registers of a code descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeRegister {
    Reg0,
    Reg1,
    Reg2,
    Reg3,
}

impl CodeRegister {
    pub const ALL: [CodeRegister; 4] = [
        CodeRegister::Reg0,
        CodeRegister::Reg1,
        CodeRegister::Reg2,
        CodeRegister::Reg3,
    ];

    const fn bounds(self) -> (usize, usize) {
        match self {
            CodeRegister::Reg0 => (LDPC_CODE_REG0_BASE, LDPC_CODE_REG0_HIGH),
            CodeRegister::Reg1 => (LDPC_CODE_REG1_BASE, LDPC_CODE_REG1_HIGH),
            CodeRegister::Reg2 => (LDPC_CODE_REG2_BASE, LDPC_CODE_REG2_HIGH),
            CodeRegister::Reg3 => (LDPC_CODE_REG3_BASE, LDPC_CODE_REG3_HIGH),
        }
    }

    /// Register offset of this word for `code_id`, refused when it would land
    /// past the documented top of the code bank.
    pub fn offset(self, code_id: u32) -> FecResult<usize> {
        let (base, high) = self.bounds();
        let addr = (code_id as usize)
            .checked_mul(LDPC_REG_JUMP)
            .and_then(|jump| jump.checked_add(base));
        match addr {
            Some(addr) if addr <= high => Ok(addr),
            _ => {
                error!("Accessing outside of LDPC {self:?} space for code_id {code_id}");
                Err(FecError::InvalidArgument("code_id outside LDPC code register bank"))
            }
        }
    }
}

/// Highest code id whose descriptor fits in the code register bank.
pub const MAX_CODE_ID: u32 = ((LDPC_CODE_REG0_HIGH - LDPC_CODE_REG0_BASE) / LDPC_REG_JUMP) as u32;

/// Block length and information length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodeReg0 {
    pub n: u32,
    pub k: u32,
}

impl CodeReg0 {
    pub fn encode(&self, policy: FieldPolicy) -> FecResult<u32> {
        use LDPC_CODE_REG0::*;
        let mut reg = LocalRegisterCopy::new(0);
        pack(&mut reg, N, self.n, "N", policy)?;
        pack(&mut reg, K, self.k, "K", policy)?;
        Ok(reg.get())
    }

    pub fn decode(word: u32) -> Self {
        use LDPC_CODE_REG0::*;
        let reg = LocalRegisterCopy::<u32, Register>::new(word);
        Self {
            n: reg.read(N),
            k: reg.read(K),
        }
    }
}

/// Circulant size, packing mode and sub-matrix count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodeReg1 {
    pub psize: u32,
    pub no_packing: bool,
    pub nm: u32,
}

impl CodeReg1 {
    pub fn encode(&self, policy: FieldPolicy) -> FecResult<u32> {
        use LDPC_CODE_REG1::*;
        let mut reg = LocalRegisterCopy::new(0);
        pack(&mut reg, PSIZE, self.psize, "PSIZE", policy)?;
        pack(&mut reg, NO_PACKING, self.no_packing as u32, "NO_PACKING", policy)?;
        pack(&mut reg, NM, self.nm, "NM", policy)?;
        Ok(reg.get())
    }

    pub fn decode(word: u32) -> Self {
        use LDPC_CODE_REG1::*;
        let reg = LocalRegisterCopy::<u32, Register>::new(word);
        Self {
            psize: reg.read(PSIZE),
            no_packing: reg.is_set(NO_PACKING),
            nm: reg.read(NM),
        }
    }
}

/// Layer count, QC count and decode schedule flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodeReg2 {
    pub nlayers: u32,
    pub nmqc: u32,
    pub norm_type: bool,
    pub special_qc: bool,
    pub no_final_parity: bool,
    pub max_schedule: u32,
}

impl CodeReg2 {
    pub fn encode(&self, policy: FieldPolicy) -> FecResult<u32> {
        use LDPC_CODE_REG2::*;
        let mut reg = LocalRegisterCopy::new(0);
        pack(&mut reg, NLAYERS, self.nlayers, "NLAYERS", policy)?;
        pack(&mut reg, NMQC, self.nmqc, "NMQC", policy)?;
        pack(&mut reg, NORM_TYPE, self.norm_type as u32, "NORM_TYPE", policy)?;
        pack(&mut reg, SPECIAL_QC, self.special_qc as u32, "SPECIAL_QC", policy)?;
        pack(
            &mut reg,
            NO_FINAL_PARITY,
            self.no_final_parity as u32,
            "NO_FINAL_PARITY",
            policy,
        )?;
        pack(&mut reg, MAX_SCHEDULE, self.max_schedule, "MAX_SCHEDULE", policy)?;
        Ok(reg.get())
    }

    pub fn decode(word: u32) -> Self {
        use LDPC_CODE_REG2::*;
        let reg = LocalRegisterCopy::<u32, Register>::new(word);
        Self {
            nlayers: reg.read(NLAYERS),
            nmqc: reg.read(NMQC),
            norm_type: reg.is_set(NORM_TYPE),
            special_qc: reg.is_set(SPECIAL_QC),
            no_final_parity: reg.is_set(NO_FINAL_PARITY),
            max_schedule: reg.read(MAX_SCHEDULE),
        }
    }
}

/// Offsets of this code's slices in the three shared tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodeReg3 {
    pub sc_off: u32,
    pub la_off: u32,
    pub qc_off: u32,
}

impl CodeReg3 {
    pub fn encode(&self, policy: FieldPolicy) -> FecResult<u32> {
        use LDPC_CODE_REG3::*;
        let mut reg = LocalRegisterCopy::new(0);
        pack(&mut reg, SC_OFF, self.sc_off, "SC_OFF", policy)?;
        pack(&mut reg, LA_OFF, self.la_off, "LA_OFF", policy)?;
        pack(&mut reg, QC_OFF, self.qc_off, "QC_OFF", policy)?;
        Ok(reg.get())
    }

    pub fn decode(word: u32) -> Self {
        use LDPC_CODE_REG3::*;
        let reg = LocalRegisterCopy::<u32, Register>::new(word);
        Self {
            sc_off: reg.read(SC_OFF),
            la_off: reg.read(LA_OFF),
            qc_off: reg.read(QC_OFF),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reg0_matches_hardware_layout() {
        let word = CodeReg0 { n: 64800, k: 32400 }
            .encode(FieldPolicy::Strict)
            .unwrap();
        assert_eq!(word, (32400 << 16) | 64800);
        assert_eq!(CodeReg0::decode(word), CodeReg0 { n: 64800, k: 32400 });
    }

    #[test]
    fn reg1_and_reg2_flags_land_on_their_bits() {
        let reg1 = CodeReg1 {
            psize: 0x1ff,
            no_packing: true,
            nm: 3,
        };
        let word = reg1.encode(FieldPolicy::Strict).unwrap();
        assert_eq!(word, 0x1ff | (1 << 10) | (3 << 11));
        assert_eq!(CodeReg1::decode(word), reg1);

        let reg2 = CodeReg2 {
            nlayers: 4,
            nmqc: 0x7ff,
            norm_type: true,
            special_qc: false,
            no_final_parity: true,
            max_schedule: 2,
        };
        let word = reg2.encode(FieldPolicy::Strict).unwrap();
        assert_eq!(word, 4 | (0x7ff << 9) | (1 << 20) | (1 << 22) | (2 << 23));
        assert_eq!(CodeReg2::decode(word), reg2);
    }

    #[test]
    fn strict_policy_rejects_wide_fields() {
        let err = CodeReg0 { n: 0x1_0000, k: 1 }
            .encode(FieldPolicy::Strict)
            .unwrap_err();
        assert_eq!(err, FecError::InvalidArgument("N"));

        let err = CodeReg2 {
            max_schedule: 4,
            ..Default::default()
        }
        .encode(FieldPolicy::Strict)
        .unwrap_err();
        assert_eq!(err, FecError::InvalidArgument("MAX_SCHEDULE"));

        let err = CodeReg3 {
            sc_off: 0,
            la_off: 0,
            qc_off: 0x100,
        }
        .encode(FieldPolicy::Strict)
        .unwrap_err();
        assert_eq!(err, FecError::InvalidArgument("QC_OFF"));
    }

    #[test]
    fn lenient_policy_masks_wide_fields() {
        let word = CodeReg0 {
            n: 0x1_0005,
            k: 0x8001,
        }
        .encode(FieldPolicy::Lenient)
        .unwrap();
        assert_eq!(CodeReg0::decode(word), CodeReg0 { n: 5, k: 1 });
    }

    #[test]
    fn code_bank_addresses() {
        assert_eq!(CodeRegister::Reg0.offset(0), Ok(0x2000));
        assert_eq!(CodeRegister::Reg3.offset(3), Ok(0x203c));
        assert_eq!(CodeRegister::Reg0.offset(MAX_CODE_ID), Ok(0x21f0));
        for reg in CodeRegister::ALL {
            assert!(reg.offset(MAX_CODE_ID + 1).is_err());
        }
        assert!(CodeRegister::Reg1.offset(u32::MAX).is_err());
    }
}
