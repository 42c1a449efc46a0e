use tock_registers::{
    LocalRegisterCopy, register_bitfields, register_structs,
    registers::{ReadOnly, ReadWrite, WriteOnly},
};

use crate::{
    config::{AxisWidth, AxisWordInclude, FecTurbo, FieldPolicy, TurboAlg},
    err::FecResult,
};

use super::{
    consts::*,
    int::{ECC_ISR, ISR},
    pack,
};

register_structs! {
    /// Control and status block at the bottom of the register map.
    pub CtrlRegs {
        (0x0000 => pub axi_wr_protect: ReadWrite<u32>),
        (0x0004 => pub code_wr_protect: ReadWrite<u32>),
        (0x0008 => pub active: ReadOnly<u32, ACTIVE::Register>),
        (0x000C => pub axis_width: ReadWrite<u32, AXIS_WIDTH::Register>),
        (0x0010 => pub axis_enable: ReadWrite<u32, AXIS_ENABLE::Register>),
        (0x0014 => pub fec_code: ReadWrite<u32, FEC_CODE::Register>),
        (0x0018 => pub order: ReadWrite<u32>),
        (0x001C => pub isr: ReadWrite<u32, ISR::Register>),
        (0x0020 => pub ier: WriteOnly<u32, ISR::Register>),
        (0x0024 => pub idr: WriteOnly<u32, ISR::Register>),
        (0x0028 => pub imr: ReadOnly<u32, ISR::Register>),
        (0x002C => pub ecc_isr: ReadWrite<u32, ECC_ISR::Register>),
        (0x0030 => pub ecc_ier: WriteOnly<u32, ECC_ISR::Register>),
        (0x0034 => pub ecc_idr: WriteOnly<u32, ECC_ISR::Register>),
        (0x0038 => pub ecc_imr: ReadOnly<u32, ECC_ISR::Register>),
        (0x003C => pub bypass: ReadWrite<u32>),
        (0x0040 => _reserved0),
        (0x0100 => pub turbo: ReadWrite<u32, TURBO::Register>),
        (0x0104 => @END),
    }
}

// Raw window accesses and the typed block address the same registers.
const _: () = {
    use core::mem::offset_of;
    assert!(offset_of!(CtrlRegs, axi_wr_protect) == OFFSET_AXI_WR_PROTECT);
    assert!(offset_of!(CtrlRegs, code_wr_protect) == OFFSET_CODE_WR_PROTECT);
    assert!(offset_of!(CtrlRegs, active) == OFFSET_ACTIVE);
    assert!(offset_of!(CtrlRegs, axis_width) == OFFSET_AXIS_WIDTH);
    assert!(offset_of!(CtrlRegs, axis_enable) == OFFSET_AXIS_ENABLE);
    assert!(offset_of!(CtrlRegs, fec_code) == OFFSET_FEC_CODE);
    assert!(offset_of!(CtrlRegs, order) == OFFSET_ORDER);
    assert!(offset_of!(CtrlRegs, isr) == OFFSET_ISR);
    assert!(offset_of!(CtrlRegs, ier) == OFFSET_IER);
    assert!(offset_of!(CtrlRegs, idr) == OFFSET_IDR);
    assert!(offset_of!(CtrlRegs, imr) == OFFSET_IMR);
    assert!(offset_of!(CtrlRegs, ecc_isr) == OFFSET_ECC_ISR);
    assert!(offset_of!(CtrlRegs, ecc_ier) == OFFSET_ECC_IER);
    assert!(offset_of!(CtrlRegs, ecc_idr) == OFFSET_ECC_IDR);
    assert!(offset_of!(CtrlRegs, ecc_imr) == OFFSET_ECC_IMR);
    assert!(offset_of!(CtrlRegs, bypass) == OFFSET_BYPASS);
    assert!(offset_of!(CtrlRegs, turbo) == OFFSET_TURBO);
};

register_bitfields! {u32,
    pub ACTIVE [
        IS_ACTIVE OFFSET(0) NUMBITS(1) []
    ],

    pub AXIS_WIDTH [
        DIN_WIDTH OFFSET(0) NUMBITS(2) [],
        DIN_WORDS OFFSET(2) NUMBITS(1) [],
        DOUT_WIDTH OFFSET(3) NUMBITS(2) [],
        DOUT_WORDS OFFSET(5) NUMBITS(1) []
    ],

    pub AXIS_ENABLE [
        ALL OFFSET(0) NUMBITS(6) []
    ],

    pub FEC_CODE [
        LDPC OFFSET(0) NUMBITS(1) []
    ],

    pub TURBO [
        ALG OFFSET(0) NUMBITS(1) [],
        SCALE OFFSET(8) NUMBITS(4) []
    ]
}

/// Compose the `AXIS_WIDTH` register from the stream configuration.
pub fn axis_width_value(
    din_width: AxisWidth,
    din_words: AxisWordInclude,
    dout_width: AxisWidth,
    dout_words: AxisWordInclude,
) -> u32 {
    let mut reg = LocalRegisterCopy::<u32, AXIS_WIDTH::Register>::new(0);
    reg.modify(
        AXIS_WIDTH::DIN_WIDTH.val(din_width.field_value())
            + AXIS_WIDTH::DIN_WORDS.val(din_words.field_value())
            + AXIS_WIDTH::DOUT_WIDTH.val(dout_width.field_value())
            + AXIS_WIDTH::DOUT_WORDS.val(dout_words.field_value()),
    );
    reg.get()
}

/// Compose the `TURBO` register.
pub fn turbo_value(turbo: &FecTurbo, policy: FieldPolicy) -> FecResult<u32> {
    let mut reg = LocalRegisterCopy::<u32, TURBO::Register>::new(0);
    reg.modify(TURBO::ALG.val(turbo.alg as u32));
    pack(&mut reg, TURBO::SCALE, turbo.scale, "SCALE", policy)?;
    Ok(reg.get())
}

pub fn turbo_from_value(word: u32) -> FecTurbo {
    let reg = LocalRegisterCopy::<u32, TURBO::Register>::new(word);
    FecTurbo {
        alg: if reg.is_set(TURBO::ALG) {
            TurboAlg::MaxStar
        } else {
            TurboAlg::MaxScale
        },
        scale: reg.read(TURBO::SCALE),
    }
}
