use crate::table::TableKind;

/// Broad classification of a [`FecError`], independent of the detail carried
/// by the individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    PermissionDenied,
    HardwareFault,
    ResourceBusy,
    IoFailure,
    NotSupported,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FecError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("{table:?} table access of {len} words at offset {offset} exceeds depth {depth:#x}")]
    TableBounds {
        table: TableKind,
        offset: u32,
        len: u32,
        depth: u32,
    },
    #[error("permission denied: {0}")]
    PermissionDenied(&'static str),
    #[error("hardware fault: {0}")]
    HardwareFault(&'static str),
    #[error("device busy")]
    ResourceBusy,
    #[error("payload copy across the control boundary failed")]
    IoFailure,
    #[error("not an SD-FEC command: {0:#x}")]
    UnknownCommand(u32),
}

pub type FecResult<T> = Result<T, FecError>;

impl FecError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FecError::InvalidArgument(_) | FecError::TableBounds { .. } => {
                ErrorKind::InvalidArgument
            }
            FecError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            FecError::HardwareFault(_) => ErrorKind::HardwareFault,
            FecError::ResourceBusy => ErrorKind::ResourceBusy,
            FecError::IoFailure => ErrorKind::IoFailure,
            FecError::UnknownCommand(_) => ErrorKind::NotSupported,
        }
    }

    /// Negative errno a character-device shell should hand back to userspace.
    pub fn errno(&self) -> i32 {
        const EPERM: i32 = 1;
        const EIO: i32 = 5;
        const EFAULT: i32 = 14;
        const EBUSY: i32 = 16;
        const EINVAL: i32 = 22;
        const ENOTTY: i32 = 25;

        -match self.kind() {
            ErrorKind::InvalidArgument => EINVAL,
            ErrorKind::PermissionDenied => EPERM,
            ErrorKind::HardwareFault => EIO,
            ErrorKind::ResourceBusy => EBUSY,
            ErrorKind::IoFailure => EFAULT,
            ErrorKind::NotSupported => ENOTTY,
        }
    }
}
