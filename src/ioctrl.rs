//! Userspace command surface.
//!
//! The structs below mirror the `xsdfec_*` structures a character-device
//! shell exchanges with userspace. Every field is a `u32` so the layouts
//! carry no padding and no `bool` validity rules; they are copied in and out
//! of caller buffers with `zerocopy`.

use alloc::boxed::Box;

use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use crate::{
    FecIrq, FecSession, FecStatus,
    config::{FecConfig, FecOrder, FecTurbo, TurboAlg},
    err::{FecError, FecResult},
    irq::FecStats,
    ldpc::LdpcParams,
    table::TableKind,
};

/// Entries of the shared-scale table carried by [`XsdfecLdpcParams`].
pub const XSDFEC_SC_TABLE_DEPTH: usize = TableKind::SharedScale.capacity();
/// Entries of the layer-address table carried by [`XsdfecLdpcParams`].
pub const XSDFEC_LA_TABLE_DEPTH: usize = TableKind::LayerAddress.capacity();
/// Entries of the quantization-code table carried by [`XsdfecLdpcParams`].
pub const XSDFEC_QC_TABLE_DEPTH: usize = TableKind::QuantizationCode.capacity();

/// Device status.
///
/// Corresponds to C struct `xsdfec_status`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct XsdfecStatus {
    pub fec_id: u32,
    pub state: u32,
    /// Non-zero while the core is processing a block.
    pub activity: u32,
}

impl From<FecStatus> for XsdfecStatus {
    fn from(status: FecStatus) -> Self {
        Self {
            fec_id: status.fec_id,
            state: status.state as u32,
            activity: status.activity as u32,
        }
    }
}

/// Active configuration.
///
/// Corresponds to C struct `xsdfec_config`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct XsdfecConfig {
    pub fec_id: u32,
    pub code: u32,
    pub order: u32,
    pub din_width: u32,
    pub din_word_include: u32,
    pub dout_width: u32,
    pub dout_word_include: u32,
}

impl From<&FecConfig> for XsdfecConfig {
    fn from(config: &FecConfig) -> Self {
        Self {
            fec_id: config.fec_id,
            code: config.code as u32,
            order: config.order as u32,
            din_width: config.din_width as u32,
            din_word_include: config.din_word_include as u32,
            dout_width: config.dout_width as u32,
            dout_word_include: config.dout_word_include as u32,
        }
    }
}

/// Corresponds to C struct `xsdfec_irq`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct XsdfecIrq {
    pub enable_isr: u32,
    pub enable_ecc_isr: u32,
}

impl From<XsdfecIrq> for FecIrq {
    fn from(irq: XsdfecIrq) -> Self {
        Self {
            enable_isr: irq.enable_isr != 0,
            enable_ecc_isr: irq.enable_ecc_isr != 0,
        }
    }
}

/// Corresponds to C struct `xsdfec_turbo`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct XsdfecTurbo {
    pub alg: u32,
    pub scale: u32,
}

impl TryFrom<XsdfecTurbo> for FecTurbo {
    type Error = FecError;

    fn try_from(turbo: XsdfecTurbo) -> Result<Self, Self::Error> {
        Ok(Self {
            alg: TurboAlg::try_from(turbo.alg)?,
            scale: turbo.scale,
        })
    }
}

impl From<FecTurbo> for XsdfecTurbo {
    fn from(turbo: FecTurbo) -> Self {
        Self {
            alg: turbo.alg as u32,
            scale: turbo.scale,
        }
    }
}

/// Corresponds to C struct `xsdfec_stats`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct XsdfecStats {
    pub isr_err_count: u32,
    pub cecc_count: u32,
    pub uecc_count: u32,
}

impl From<FecStats> for XsdfecStats {
    fn from(stats: FecStats) -> Self {
        Self {
            isr_err_count: stats.isr_err_count,
            cecc_count: stats.cecc_count,
            uecc_count: stats.uecc_count,
        }
    }
}

/// LDPC code parameters with room for the largest table slices.
///
/// Corresponds to C struct `xsdfec_ldpc_params`. For a read back the caller
/// fills in `code_id` and `nqc`; everything else is returned.
#[repr(C)]
#[derive(Debug, Clone, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct XsdfecLdpcParams {
    pub n: u32,
    pub k: u32,
    pub psize: u32,
    pub nlayers: u32,
    pub nqc: u32,
    pub nmqc: u32,
    pub nm: u32,
    pub norm_type: u32,
    pub no_packing: u32,
    pub special_qc: u32,
    pub no_final_parity: u32,
    pub max_schedule: u32,
    pub sc_off: u32,
    pub la_off: u32,
    pub qc_off: u32,
    pub sc_table: [u32; XSDFEC_SC_TABLE_DEPTH],
    pub la_table: [u32; XSDFEC_LA_TABLE_DEPTH],
    pub qc_table: [u32; XSDFEC_QC_TABLE_DEPTH],
    pub code_id: u32,
}

fn flag(value: u32, name: &'static str) -> FecResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        _ => {
            error!("{name} must be 0 or 1, got {value}");
            Err(FecError::InvalidArgument(name))
        }
    }
}

fn table_prefix<'a>(table: &'a [u32], len: u32, name: &'static str) -> FecResult<&'a [u32]> {
    table.get(..len as usize).ok_or_else(|| {
        error!("{name} of {len} exceeds the {} entries the request carries", table.len());
        FecError::InvalidArgument(name)
    })
}

impl XsdfecLdpcParams {
    /// A zeroed request on the heap; the struct is too large for a kernel
    /// stack.
    pub fn new_boxed() -> FecResult<Box<Self>> {
        Self::new_box_zeroed().map_err(|_| {
            error!("Unable to allocate LDPC parameter block");
            FecError::IoFailure
        })
    }

    pub fn to_params(&self) -> FecResult<LdpcParams> {
        Ok(LdpcParams {
            code_id: self.code_id,
            n: self.n,
            k: self.k,
            psize: self.psize,
            no_packing: flag(self.no_packing, "no_packing")?,
            nm: self.nm,
            nlayers: self.nlayers,
            nmqc: self.nmqc,
            norm_type: flag(self.norm_type, "norm_type")?,
            special_qc: flag(self.special_qc, "special_qc")?,
            no_final_parity: flag(self.no_final_parity, "no_final_parity")?,
            max_schedule: self.max_schedule,
            sc_off: self.sc_off,
            la_off: self.la_off,
            qc_off: self.qc_off,
            sc_table: table_prefix(&self.sc_table, self.nlayers, "nlayers")?.to_vec(),
            la_table: table_prefix(&self.la_table, self.nlayers, "nlayers")?.to_vec(),
            qc_table: table_prefix(&self.qc_table, self.nqc, "nqc")?.to_vec(),
        })
    }

    /// Overwrite every field with `params`. Table entries past the slices
    /// are left as they were.
    pub fn fill_from(&mut self, params: &LdpcParams) -> FecResult<()> {
        let sc = self
            .sc_table
            .get_mut(..params.sc_table.len())
            .ok_or(FecError::InvalidArgument("nlayers"))?;
        sc.copy_from_slice(&params.sc_table);
        let la = self
            .la_table
            .get_mut(..params.la_table.len())
            .ok_or(FecError::InvalidArgument("nlayers"))?;
        la.copy_from_slice(&params.la_table);
        let qc = self
            .qc_table
            .get_mut(..params.qc_table.len())
            .ok_or(FecError::InvalidArgument("nqc"))?;
        qc.copy_from_slice(&params.qc_table);

        self.code_id = params.code_id;
        self.n = params.n;
        self.k = params.k;
        self.psize = params.psize;
        self.no_packing = params.no_packing as u32;
        self.nm = params.nm;
        self.nlayers = params.nlayers;
        self.nqc = params.nqc();
        self.nmqc = params.nmqc;
        self.norm_type = params.norm_type as u32;
        self.special_qc = params.special_qc as u32;
        self.no_final_parity = params.no_final_parity as u32;
        self.max_schedule = params.max_schedule;
        self.sc_off = params.sc_off;
        self.la_off = params.la_off;
        self.qc_off = params.qc_off;
        Ok(())
    }
}

const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = 8;
const IOC_SIZESHIFT: u32 = 16;
const IOC_DIRSHIFT: u32 = 30;
const IOC_SIZEMASK: u32 = (1 << 14) - 1;

pub const IOC_NONE: u32 = 0;
pub const IOC_WRITE: u32 = 1;
pub const IOC_READ: u32 = 2;

/// Command type byte of every SD-FEC command.
pub const XSDFEC_MAGIC: u8 = b'f';

/// Encode a Linux-style command word. Sizes beyond the 14-bit field are
/// truncated; the payload itself is checked against the full ABI size.
pub const fn ioc(dir: u32, nr: u32, size: usize) -> u32 {
    (dir << IOC_DIRSHIFT)
        | ((size as u32 & IOC_SIZEMASK) << IOC_SIZESHIFT)
        | ((XSDFEC_MAGIC as u32) << IOC_TYPESHIFT)
        | (nr << IOC_NRSHIFT)
}

pub const fn ioc_type(cmd: u32) -> u8 {
    (cmd >> IOC_TYPESHIFT) as u8
}

/// Control commands, numbered as userspace numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FecCommand {
    StartDev = 0,
    StopDev = 1,
    GetStatus = 2,
    SetIrq = 3,
    SetTurbo = 4,
    AddLdpcCodeParams = 5,
    GetConfig = 6,
    GetTurbo = 7,
    SetOrder = 8,
    SetBypass = 9,
    IsActive = 10,
    ClearStats = 11,
    GetStats = 12,
    SetDefaultConfig = 13,
    GetLdpcCodeParams = 14,
}

impl FecCommand {
    pub const ALL: [FecCommand; 15] = [
        FecCommand::StartDev,
        FecCommand::StopDev,
        FecCommand::GetStatus,
        FecCommand::SetIrq,
        FecCommand::SetTurbo,
        FecCommand::AddLdpcCodeParams,
        FecCommand::GetConfig,
        FecCommand::GetTurbo,
        FecCommand::SetOrder,
        FecCommand::SetBypass,
        FecCommand::IsActive,
        FecCommand::ClearStats,
        FecCommand::GetStats,
        FecCommand::SetDefaultConfig,
        FecCommand::GetLdpcCodeParams,
    ];

    pub const fn direction(self) -> u32 {
        match self {
            FecCommand::StartDev
            | FecCommand::StopDev
            | FecCommand::ClearStats
            | FecCommand::SetDefaultConfig => IOC_NONE,
            FecCommand::SetIrq
            | FecCommand::SetTurbo
            | FecCommand::AddLdpcCodeParams
            | FecCommand::SetOrder
            | FecCommand::SetBypass => IOC_WRITE,
            FecCommand::GetStatus
            | FecCommand::GetConfig
            | FecCommand::GetTurbo
            | FecCommand::IsActive
            | FecCommand::GetStats => IOC_READ,
            FecCommand::GetLdpcCodeParams => IOC_READ | IOC_WRITE,
        }
    }

    /// Exact payload length in bytes.
    pub const fn payload_size(self) -> usize {
        use core::mem::size_of;
        match self {
            FecCommand::StartDev
            | FecCommand::StopDev
            | FecCommand::ClearStats
            | FecCommand::SetDefaultConfig => 0,
            FecCommand::GetStatus => size_of::<XsdfecStatus>(),
            FecCommand::SetIrq => size_of::<XsdfecIrq>(),
            FecCommand::SetTurbo | FecCommand::GetTurbo => size_of::<XsdfecTurbo>(),
            FecCommand::AddLdpcCodeParams | FecCommand::GetLdpcCodeParams => {
                size_of::<XsdfecLdpcParams>()
            }
            FecCommand::GetConfig => size_of::<XsdfecConfig>(),
            FecCommand::SetOrder | FecCommand::SetBypass | FecCommand::IsActive => {
                size_of::<u32>()
            }
            FecCommand::GetStats => size_of::<XsdfecStats>(),
        }
    }

    pub const fn code(self) -> u32 {
        ioc(self.direction(), self as u32, self.payload_size())
    }

    pub fn from_code(cmd: u32) -> FecResult<Self> {
        Self::ALL
            .into_iter()
            .find(|command| command.code() == cmd)
            .ok_or(FecError::UnknownCommand(cmd))
    }

    /// Commands still served while the device needs reset.
    pub const fn allowed_when_needs_reset(self) -> bool {
        matches!(
            self,
            FecCommand::SetDefaultConfig
                | FecCommand::GetStatus
                | FecCommand::GetStats
                | FecCommand::ClearStats
        )
    }
}

pub const XSDFEC_START_DEV: u32 = FecCommand::StartDev.code();
pub const XSDFEC_STOP_DEV: u32 = FecCommand::StopDev.code();
pub const XSDFEC_GET_STATUS: u32 = FecCommand::GetStatus.code();
pub const XSDFEC_SET_IRQ: u32 = FecCommand::SetIrq.code();
pub const XSDFEC_SET_TURBO: u32 = FecCommand::SetTurbo.code();
pub const XSDFEC_ADD_LDPC_CODE_PARAMS: u32 = FecCommand::AddLdpcCodeParams.code();
pub const XSDFEC_GET_CONFIG: u32 = FecCommand::GetConfig.code();
pub const XSDFEC_GET_TURBO: u32 = FecCommand::GetTurbo.code();
pub const XSDFEC_SET_ORDER: u32 = FecCommand::SetOrder.code();
pub const XSDFEC_SET_BYPASS: u32 = FecCommand::SetBypass.code();
pub const XSDFEC_IS_ACTIVE: u32 = FecCommand::IsActive.code();
pub const XSDFEC_CLEAR_STATS: u32 = FecCommand::ClearStats.code();
pub const XSDFEC_GET_STATS: u32 = FecCommand::GetStats.code();
pub const XSDFEC_SET_DEFAULT_CONFIG: u32 = FecCommand::SetDefaultConfig.code();
pub const XSDFEC_GET_LDPC_CODE_PARAMS: u32 = FecCommand::GetLdpcCodeParams.code();

fn copy_in<T: FromBytes>(buf: &[u8]) -> FecResult<T> {
    T::read_from_bytes(buf).map_err(|_| FecError::IoFailure)
}

fn copy_out<T: IntoBytes + Immutable>(buf: &mut [u8], value: &T) -> FecResult<()> {
    let bytes = value.as_bytes();
    if buf.len() != bytes.len() {
        return Err(FecError::IoFailure);
    }
    buf.copy_from_slice(bytes);
    Ok(())
}

impl FecSession<'_> {
    /// Execute one command word against the device.
    ///
    /// `arg` is the caller's payload buffer. It is required for every command
    /// that carries data and must be exactly the size of that command's
    /// structure. Results of read commands are written back into it.
    pub fn ioctl(&self, cmd: u32, arg: Option<&mut [u8]>) -> FecResult<()> {
        let id = self.fec_id();

        if self.state.is_needs_reset()
            && !FecCommand::ALL
                .iter()
                .any(|c| c.allowed_when_needs_reset() && c.code() == cmd)
        {
            error!("SDFEC{id} in failed state. Reset Required");
            return Err(FecError::PermissionDenied("device needs reset"));
        }

        if ioc_type(cmd) != XSDFEC_MAGIC {
            error!("Not a xilinx sdfec ioctl");
            return Err(FecError::UnknownCommand(cmd));
        }
        let command = FecCommand::from_code(cmd).inspect_err(|_| {
            error!("Undefined SDFEC IOCTL {cmd:#x}");
        })?;

        let arg = if command.direction() == IOC_NONE {
            None
        } else {
            let Some(buf) = arg else {
                error!("xilinx sdfec ioctl argument is NULL Pointer");
                return Err(FecError::InvalidArgument("missing ioctl argument"));
            };
            if buf.len() != command.payload_size() {
                error!(
                    "Invalid xilinx sdfec ioctl argument: {} bytes, {command:?} takes {}",
                    buf.len(),
                    command.payload_size()
                );
                return Err(FecError::IoFailure);
            }
            Some(buf)
        };

        self.dispatch(command, arg).inspect_err(|e| {
            debug!("SDFEC{id}: {command:?} failed: {e}");
        })
    }

    fn dispatch(&self, command: FecCommand, arg: Option<&mut [u8]>) -> FecResult<()> {
        let buf = || arg.ok_or(FecError::InvalidArgument("missing ioctl argument"));

        match command {
            FecCommand::StartDev => self.start(),
            FecCommand::StopDev => self.stop(),
            FecCommand::ClearStats => {
                self.clear_stats();
                Ok(())
            }
            FecCommand::GetStats => copy_out(buf()?, &XsdfecStats::from(self.get_stats())),
            FecCommand::GetStatus => copy_out(buf()?, &XsdfecStatus::from(self.get_status())),
            FecCommand::GetConfig => copy_out(buf()?, &XsdfecConfig::from(&self.get_config()?)),
            FecCommand::SetDefaultConfig => self.set_default_config(),
            FecCommand::SetIrq => {
                let irq: XsdfecIrq = copy_in(buf()?)?;
                self.set_irq(irq.into())
            }
            FecCommand::SetTurbo => {
                let turbo: XsdfecTurbo = copy_in(buf()?)?;
                self.set_turbo(&turbo.try_into()?)
            }
            FecCommand::GetTurbo => copy_out(buf()?, &XsdfecTurbo::from(self.get_turbo()?)),
            FecCommand::AddLdpcCodeParams => {
                let mut abi = XsdfecLdpcParams::new_boxed()?;
                abi.as_mut_bytes().copy_from_slice(buf()?);
                self.add_ldpc_code(&abi.to_params()?)
            }
            FecCommand::GetLdpcCodeParams => {
                let buf = buf()?;
                let mut abi = XsdfecLdpcParams::new_boxed()?;
                abi.as_mut_bytes().copy_from_slice(buf);
                if abi.nqc as usize > XSDFEC_QC_TABLE_DEPTH {
                    error!("nqc of {} exceeds the QC table", abi.nqc);
                    return Err(FecError::InvalidArgument("nqc"));
                }
                let params = self.get_ldpc_code(abi.code_id, abi.nqc)?;
                abi.fill_from(&params)?;
                copy_out(buf, &*abi)
            }
            FecCommand::SetOrder => {
                let order: u32 = copy_in(buf()?)?;
                self.set_order(FecOrder::try_from(order)?)
            }
            FecCommand::SetBypass => {
                let bypass: u32 = copy_in(buf()?)?;
                if bypass > 1 {
                    error!("Invalid bypass value {bypass} for SDFEC{}", self.fec_id());
                    return Err(FecError::InvalidArgument("bypass must be 0 or 1"));
                }
                self.set_bypass(bypass == 1)
            }
            FecCommand::IsActive => copy_out(buf()?, &(self.is_active()? as u32)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_words_follow_linux_encoding() {
        assert_eq!(XSDFEC_START_DEV, 0x6600);
        assert_eq!(XSDFEC_STOP_DEV, 0x6601);
        assert_eq!(XSDFEC_GET_STATUS, 0x800c_6602);
        assert_eq!(XSDFEC_SET_IRQ, 0x4008_6603);
        assert_eq!(XSDFEC_SET_ORDER, 0x4004_6608);
        assert_eq!(XSDFEC_GET_STATS, 0x800c_660c);
        assert_eq!(XSDFEC_GET_CONFIG, 0x801c_6606);
        assert_eq!(ioc_type(XSDFEC_GET_LDPC_CODE_PARAMS), b'f');
        assert_eq!(XSDFEC_GET_LDPC_CODE_PARAMS >> 30, IOC_READ | IOC_WRITE);
    }

    #[test]
    fn every_command_decodes_to_itself() {
        for command in FecCommand::ALL {
            assert_eq!(FecCommand::from_code(command.code()), Ok(command));
        }
        assert_eq!(
            FecCommand::from_code(0x6620),
            Err(FecError::UnknownCommand(0x6620))
        );
        assert!(FecCommand::from_code(XSDFEC_GET_STATUS & !(0xff << 16)).is_err());
    }

    #[test]
    fn ldpc_block_layout() {
        assert_eq!(XSDFEC_SC_TABLE_DEPTH, 255);
        assert_eq!(XSDFEC_LA_TABLE_DEPTH, 1023);
        assert_eq!(XSDFEC_QC_TABLE_DEPTH, 8191);
        assert_eq!(
            core::mem::size_of::<XsdfecLdpcParams>(),
            (15 + 255 + 1023 + 8191 + 1) * 4
        );
    }

    #[test]
    fn ldpc_block_converts_both_ways() {
        let mut abi = XsdfecLdpcParams::new_boxed().unwrap();
        abi.code_id = 7;
        abi.n = 1000;
        abi.nlayers = 2;
        abi.nqc = 3;
        abi.norm_type = 1;
        abi.sc_table[..2].copy_from_slice(&[5, 6]);
        abi.la_table[..2].copy_from_slice(&[7, 8]);
        abi.qc_table[..3].copy_from_slice(&[9, 10, 11]);

        let params = abi.to_params().unwrap();
        assert_eq!(params.nqc(), 3);
        assert!(params.norm_type);
        assert_eq!(params.la_table, [7, 8]);

        let mut back = XsdfecLdpcParams::new_boxed().unwrap();
        back.fill_from(&params).unwrap();
        assert_eq!(*back, *abi);

        abi.special_qc = 2;
        assert_eq!(abi.to_params(), Err(FecError::InvalidArgument("special_qc")));
        abi.special_qc = 0;
        abi.nlayers = 256;
        assert_eq!(abi.to_params(), Err(FecError::InvalidArgument("nlayers")));
    }
}
