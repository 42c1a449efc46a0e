//! Raw offsets and constants that mirror the SD-FEC register map.

/// Offset of the AXI interconnect write-protect register.
pub const OFFSET_AXI_WR_PROTECT: usize = 0x0_0000;
/// Offset of the code/instruction write-protect register.
pub const OFFSET_CODE_WR_PROTECT: usize = 0x0_0004;
/// Offset of the activity register.
pub const OFFSET_ACTIVE: usize = 0x0_0008;
/// Offset of the AXI-stream width/word-include register.
pub const OFFSET_AXIS_WIDTH: usize = 0x0_000C;
/// Offset of the AXI-stream enable register.
pub const OFFSET_AXIS_ENABLE: usize = 0x0_0010;
/// Offset of the code family register.
pub const OFFSET_FEC_CODE: usize = 0x0_0014;
/// Offset of the output order register.
pub const OFFSET_ORDER: usize = 0x0_0018;
/// Offset of the interrupt status register.
pub const OFFSET_ISR: usize = 0x0_001C;
/// Offset of the write-only interrupt enable register.
pub const OFFSET_IER: usize = 0x0_0020;
/// Offset of the write-only interrupt disable register.
pub const OFFSET_IDR: usize = 0x0_0024;
/// Offset of the read-only interrupt mask register.
pub const OFFSET_IMR: usize = 0x0_0028;
/// Offset of the ECC interrupt status register.
pub const OFFSET_ECC_ISR: usize = 0x0_002C;
/// Offset of the write-only ECC interrupt enable register.
pub const OFFSET_ECC_IER: usize = 0x0_0030;
/// Offset of the write-only ECC interrupt disable register.
pub const OFFSET_ECC_IDR: usize = 0x0_0034;
/// Offset of the read-only ECC interrupt mask register.
pub const OFFSET_ECC_IMR: usize = 0x0_0038;
/// Offset of the bypass register.
pub const OFFSET_BYPASS: usize = 0x0_003C;
/// Offset of the turbo parameter register.
pub const OFFSET_TURBO: usize = 0x0_0100;

/// Distance between two consecutive code descriptors in the LDPC code bank.
pub const LDPC_REG_JUMP: usize = 0x10;
/// First LDPC code register (N, K).
pub const LDPC_CODE_REG0_BASE: usize = 0x0_2000;
pub const LDPC_CODE_REG0_HIGH: usize = 0x0_21FC;
/// Second LDPC code register (PSIZE, NO_PACKING, NM).
pub const LDPC_CODE_REG1_BASE: usize = 0x0_2004;
pub const LDPC_CODE_REG1_HIGH: usize = 0x0_2200;
/// Third LDPC code register (NLAYERS, NMQC and the decode flags).
pub const LDPC_CODE_REG2_BASE: usize = 0x0_2008;
pub const LDPC_CODE_REG2_HIGH: usize = 0x0_2204;
/// Fourth LDPC code register (table offsets).
pub const LDPC_CODE_REG3_BASE: usize = 0x0_200C;
pub const LDPC_CODE_REG3_HIGH: usize = 0x0_2208;

/// Shared-scale table window.
pub const LDPC_SC_TABLE_BASE: usize = 0x1_0000;
pub const SC_TABLE_DEPTH: u32 = 0x3FC;
/// Layer-address table window.
pub const LDPC_LA_TABLE_BASE: usize = 0x1_8000;
pub const LA_TABLE_DEPTH: u32 = 0xFFC;
/// Quantization-code table window.
pub const LDPC_QC_TABLE_BASE: usize = 0x2_0000;
pub const QC_TABLE_DEPTH: u32 = 0x7FFC;
/// Byte stride between two table entries.
pub const REG_WIDTH_JUMP: u32 = 4;

/// Bytes spanned by the whole register map.
pub const REGISTER_SPACE_SIZE: usize = 0x2_8000;

/// Value written to a protect register to block writes.
pub const WRITE_PROTECT_ENABLE: u32 = 1;
/// Value written to a protect register to allow writes.
pub const WRITE_PROTECT_DISABLE: u32 = 0;

/// All AXI-stream enable bits.
pub const AXIS_ENABLE_MASK: u32 = 0x3F;
/// Interrupt status bits (TLAST, DIN_WORDS, DOUT_WORDS errors).
pub const ISR_MASK: u32 = 0x3F;
/// Single-bit (correctable) ECC error bits.
pub const ECC_ISR_SBE: u32 = 0x7FF;
/// Multi-bit (uncorrectable) ECC error bits.
pub const ECC_ISR_MBE: u32 = 0x3F_F800;
/// Every ECC interrupt source.
pub const ECC_ISR_MASK: u32 = ECC_ISR_SBE | ECC_ISR_MBE;

/// Counters above this value stop producing error logs.
pub const ERROR_LOG_THRESHOLD: u32 = 100;
