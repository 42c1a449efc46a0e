//! LDPC code descriptor programming.
//!
//! A descriptor is four code registers plus three table slices. The whole
//! request is validated before the first hardware write. Once writing has
//! begun a fault escalation aborts the remaining steps; whatever reached
//! hardware stays there, since the device has to be reset anyway.

use alloc::vec::Vec;

use crate::{
    Control, SdFec,
    config::FecCode,
    err::{FecError, FecResult},
    registers::ldpc::{CodeReg0, CodeReg1, CodeReg2, CodeReg3, CodeRegister},
    table::{TableKind, read_table, write_table},
};

/// One LDPC code and its table payloads.
///
/// `sc_table` and `la_table` hold one entry per layer and must both be
/// `nlayers` long. `qc_table` holds `nqc` entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LdpcParams {
    pub code_id: u32,
    pub n: u32,
    pub k: u32,
    pub psize: u32,
    pub no_packing: bool,
    pub nm: u32,
    pub nlayers: u32,
    pub nmqc: u32,
    pub norm_type: bool,
    pub special_qc: bool,
    pub no_final_parity: bool,
    pub max_schedule: u32,
    pub sc_off: u32,
    pub la_off: u32,
    pub qc_off: u32,
    pub sc_table: Vec<u32>,
    pub la_table: Vec<u32>,
    pub qc_table: Vec<u32>,
}

impl LdpcParams {
    pub fn nqc(&self) -> u32 {
        self.qc_table.len() as u32
    }

    pub fn reg0(&self) -> CodeReg0 {
        CodeReg0 {
            n: self.n,
            k: self.k,
        }
    }

    pub fn reg1(&self) -> CodeReg1 {
        CodeReg1 {
            psize: self.psize,
            no_packing: self.no_packing,
            nm: self.nm,
        }
    }

    pub fn reg2(&self) -> CodeReg2 {
        CodeReg2 {
            nlayers: self.nlayers,
            nmqc: self.nmqc,
            norm_type: self.norm_type,
            special_qc: self.special_qc,
            no_final_parity: self.no_final_parity,
            max_schedule: self.max_schedule,
        }
    }

    pub fn reg3(&self) -> CodeReg3 {
        CodeReg3 {
            sc_off: self.sc_off,
            la_off: self.la_off,
            qc_off: self.qc_off,
        }
    }

    fn from_regs(code_id: u32, reg0: CodeReg0, reg1: CodeReg1, reg2: CodeReg2, reg3: CodeReg3) -> Self {
        Self {
            code_id,
            n: reg0.n,
            k: reg0.k,
            psize: reg1.psize,
            no_packing: reg1.no_packing,
            nm: reg1.nm,
            nlayers: reg2.nlayers,
            nmqc: reg2.nmqc,
            norm_type: reg2.norm_type,
            special_qc: reg2.special_qc,
            no_final_parity: reg2.no_final_parity,
            max_schedule: reg2.max_schedule,
            sc_off: reg3.sc_off,
            la_off: reg3.la_off,
            qc_off: reg3.qc_off,
            ..Default::default()
        }
    }

    fn check_payloads(&self) -> FecResult<()> {
        let nlayers = self.nlayers as usize;
        if self.sc_table.len() != nlayers || self.la_table.len() != nlayers {
            error!(
                "Code {}: nlayers {} but SC table holds {} and LA table {} entries",
                self.code_id,
                self.nlayers,
                self.sc_table.len(),
                self.la_table.len()
            );
            return Err(FecError::InvalidArgument("table payload does not match nlayers"));
        }
        Ok(())
    }
}

/// Table slices of one code as `(table, first word, words)`, each checked
/// against its table. The SC slice starts at `sc_off` words, the LA and QC
/// slices at four times their offsets.
fn table_slices(reg3: &CodeReg3, nlayers: u32, nqc: u32) -> FecResult<[(TableKind, u32, u32); 3]> {
    let slices = [
        (TableKind::SharedScale, reg3.sc_off, nlayers),
        (TableKind::LayerAddress, reg3.la_off.saturating_mul(4), nlayers),
        (TableKind::QuantizationCode, reg3.qc_off.saturating_mul(4), nqc),
    ];
    for (kind, offset, len) in slices {
        kind.window(offset, len)?;
    }
    Ok(slices)
}

fn register_offsets(code_id: u32) -> FecResult<[usize; 4]> {
    let mut offsets = [0; 4];
    for (slot, reg) in offsets.iter_mut().zip(CodeRegister::ALL) {
        *slot = reg.offset(code_id)?;
    }
    Ok(offsets)
}

impl SdFec {
    /// Program one LDPC code.
    ///
    /// Fails before touching hardware on a Turbo device, an out-of-range
    /// `code_id`, a field that does not fit (under the strict field policy)
    /// or a table slice that overruns its table. A device without a code
    /// family takes on LDPC. If a fatal fault arrives while the registers and
    /// tables are being written the call returns `PermissionDenied` and the
    /// code is left partially programmed.
    pub fn add_ldpc_code(&self, params: &LdpcParams) -> FecResult<()> {
        self.state.ensure_operational()?;
        let mut ctl = self.control.lock();
        let id = self.fec_id;
        if ctl.config.code == FecCode::Turbo {
            error!("Unable to write LDPC to SDFEC{id}, configured for Turbo");
            return Err(FecError::InvalidArgument("device configured for Turbo"));
        }

        let policy = ctl.config.field_policy;
        let offsets = register_offsets(params.code_id)?;
        let words = [
            params.reg0().encode(policy)?,
            params.reg1().encode(policy)?,
            params.reg2().encode(policy)?,
            params.reg3().encode(policy)?,
        ];
        params.check_payloads()?;
        let slices = table_slices(&params.reg3(), params.nlayers, params.nqc())?;
        let payloads: [&[u32]; 3] = [&params.sc_table, &params.la_table, &params.qc_table];

        self.unprotected(&mut ctl, |dev, ctl| {
            dev.adopt_code(ctl, FecCode::Ldpc)?;
            dev.program_registers(ctl, &offsets, &words)?;
            dev.program_tables(ctl, &slices, &payloads)
        })?;
        debug!("SDFEC{id}: LDPC code {} programmed", params.code_id);
        Ok(())
    }

    fn program_registers(&self, ctl: &Control, offsets: &[usize; 4], words: &[u32; 4]) -> FecResult<()> {
        let regs = self.regs.window();
        for (&offset, &word) in offsets.iter().zip(words) {
            self.state.ensure_operational()?;
            ctl.protect.write(regs, offset, word)?;
        }
        Ok(())
    }

    fn program_tables(
        &self,
        ctl: &Control,
        slices: &[(TableKind, u32, u32); 3],
        payloads: &[&[u32]; 3],
    ) -> FecResult<()> {
        let regs = self.regs.window();
        for (&(kind, offset, _), payload) in slices.iter().zip(payloads) {
            self.state.ensure_operational()?;
            write_table(&ctl.protect, regs, kind, offset, payload)?;
        }
        Ok(())
    }

    /// Read back LDPC code `code_id`.
    ///
    /// `nlayers` comes from the code registers. The QC table length is not
    /// held in hardware, so the caller passes the `nqc` it programmed.
    pub fn get_ldpc_code(&self, code_id: u32, nqc: u32) -> FecResult<LdpcParams> {
        self.state.ensure_operational()?;
        let ctl = self.control.lock();
        if ctl.config.code == FecCode::Turbo {
            error!("SDFEC{} is configured for Turbo", self.fec_id);
            return Err(FecError::InvalidArgument("device configured for Turbo"));
        }

        let regs = self.regs.window();
        let [o0, o1, o2, o3] = register_offsets(code_id)?;
        let reg0 = CodeReg0::decode(regs.read(o0)?);
        let reg1 = CodeReg1::decode(regs.read(o1)?);
        let reg2 = CodeReg2::decode(regs.read(o2)?);
        let reg3 = CodeReg3::decode(regs.read(o3)?);

        let [sc, la, qc] = table_slices(&reg3, reg2.nlayers, nqc)?;
        let mut params = LdpcParams::from_regs(code_id, reg0, reg1, reg2, reg3);
        params.sc_table = read_table(regs, sc.0, sc.1, sc.2)?;
        params.la_table = read_table(regs, la.0, la.1, la.2)?;
        params.qc_table = read_table(regs, qc.0, qc.1, qc.2)?;
        Ok(params)
    }
}
