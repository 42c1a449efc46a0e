//! SD-FEC core configuration translated from the C `struct xsdfec_config`.
//!
//! The enum discriminants are the values the userspace ABI carries, so they
//! must not be renumbered.

use crate::err::FecError;

/// Code family the core is built for.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum FecCode {
    #[default]
    Invalid = 0,
    Turbo = 1,
    Ldpc = 2,
}

impl FecCode {
    /// Value held by the `FEC_CODE` register for this family.
    pub const fn register_value(self) -> Option<u32> {
        match self {
            FecCode::Invalid => None,
            FecCode::Turbo => Some(0),
            FecCode::Ldpc => Some(1),
        }
    }
}

/// Output ordering of decoded blocks.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum FecOrder {
    #[default]
    Invalid = 0,
    Maintain = 1,
    OutOfOrder = 2,
}

/// Width class of an AXI4-Stream data port.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AxisWidth {
    #[default]
    W1x128b = 1,
    W2x128b = 2,
    W4x128b = 4,
}

impl AxisWidth {
    pub(crate) const fn field_value(self) -> u32 {
        match self {
            AxisWidth::W1x128b => 0,
            AxisWidth::W2x128b => 1,
            AxisWidth::W4x128b => 2,
        }
    }
}

/// How the DIN_WORDS / DOUT_WORDS side-band values are supplied.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AxisWordInclude {
    #[default]
    FixedValue = 0,
    InBlock = 1,
    PerAxiTransaction = 2,
}

impl AxisWordInclude {
    pub(crate) const fn field_value(self) -> u32 {
        match self {
            AxisWordInclude::FixedValue | AxisWordInclude::InBlock => 0,
            AxisWordInclude::PerAxiTransaction => 1,
        }
    }
}

/// Turbo decoding algorithm.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TurboAlg {
    #[default]
    MaxScale = 0,
    MaxStar = 1,
}

/// Turbo decoder parameters held by the `TURBO` register.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FecTurbo {
    pub alg: TurboAlg,
    /// Extrinsic scale factor, four bits wide.
    pub scale: u32,
}

/// Lifecycle state of one device instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum FecState {
    Init = 0,
    Started = 1,
    Stopped = 2,
    NeedsReset = 3,
}

macro_rules! abi_enum_try_from {
    ($ty:ty, $what:literal, [$($variant:path),+ $(,)?]) => {
        impl TryFrom<u32> for $ty {
            type Error = FecError;

            fn try_from(value: u32) -> Result<Self, Self::Error> {
                $(
                    if value == $variant as u32 {
                        return Ok($variant);
                    }
                )+
                Err(FecError::InvalidArgument($what))
            }
        }
    };
}

abi_enum_try_from!(FecCode, "unknown code family", [FecCode::Invalid, FecCode::Turbo, FecCode::Ldpc]);
abi_enum_try_from!(FecOrder, "unknown order", [FecOrder::Invalid, FecOrder::Maintain, FecOrder::OutOfOrder]);
abi_enum_try_from!(AxisWidth, "unknown AXIS width", [AxisWidth::W1x128b, AxisWidth::W2x128b, AxisWidth::W4x128b]);
abi_enum_try_from!(
    AxisWordInclude,
    "unknown AXIS word include mode",
    [
        AxisWordInclude::FixedValue,
        AxisWordInclude::InBlock,
        AxisWordInclude::PerAxiTransaction
    ]
);
abi_enum_try_from!(TurboAlg, "unknown turbo algorithm", [TurboAlg::MaxScale, TurboAlg::MaxStar]);
abi_enum_try_from!(
    FecState,
    "unknown device state",
    [FecState::Init, FecState::Started, FecState::Stopped, FecState::NeedsReset]
);

/// What the register codec does with a field wider than its bitfield.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FieldPolicy {
    /// Refuse the request with `InvalidArgument` before any register access.
    #[default]
    Strict,
    /// Log the overflow and program the value masked to the field width, the
    /// way earlier hardware revisions tolerated it.
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FecConfig {
    pub fec_id: u32,
    pub code: FecCode,
    pub order: FecOrder,
    pub din_width: AxisWidth,
    pub din_word_include: AxisWordInclude,
    pub dout_width: AxisWidth,
    pub dout_word_include: AxisWordInclude,
    pub field_policy: FieldPolicy,
}

impl FecConfig {
    pub fn new(code: FecCode) -> Self {
        Self {
            fec_id: 0,
            code,
            order: FecOrder::Invalid,
            din_width: AxisWidth::default(),
            din_word_include: AxisWordInclude::default(),
            dout_width: AxisWidth::default(),
            dout_word_include: AxisWordInclude::default(),
            field_policy: FieldPolicy::default(),
        }
    }

    pub fn with_din(mut self, width: AxisWidth, words: AxisWordInclude) -> Self {
        self.din_width = width;
        self.din_word_include = words;
        self
    }

    pub fn with_dout(mut self, width: AxisWidth, words: AxisWordInclude) -> Self {
        self.dout_width = width;
        self.dout_word_include = words;
        self
    }

    pub fn with_policy(mut self, policy: FieldPolicy) -> Self {
        self.field_policy = policy;
        self
    }
}

impl Default for FecConfig {
    fn default() -> Self {
        Self::new(FecCode::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abi_values_parse_back() {
        assert_eq!(FecCode::try_from(2), Ok(FecCode::Ldpc));
        assert_eq!(FecOrder::try_from(1), Ok(FecOrder::Maintain));
        assert_eq!(AxisWidth::try_from(4), Ok(AxisWidth::W4x128b));
        assert!(AxisWidth::try_from(3).is_err());
        assert!(AxisWordInclude::try_from(3).is_err());
        assert_eq!(FecState::try_from(3), Ok(FecState::NeedsReset));
        assert_eq!(TurboAlg::try_from(1), Ok(TurboAlg::MaxStar));
        assert!(TurboAlg::try_from(2).is_err());
    }

    #[test]
    fn stream_fields_translate() {
        assert_eq!(AxisWidth::W4x128b.field_value(), 2);
        assert_eq!(AxisWordInclude::InBlock.field_value(), 0);
        assert_eq!(AxisWordInclude::PerAxiTransaction.field_value(), 1);
        assert_eq!(FecCode::Ldpc.register_value(), Some(1));
        assert_eq!(FecCode::Invalid.register_value(), None);
    }
}
