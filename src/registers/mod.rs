//! Memory-mapped register definitions for the SD-FEC core.
//!
//! The control block at the bottom of the map is described with
//! [`tock_registers`] so the driver can use typed accessors for it. The LDPC
//! code bank and the three tables are addressed by computed offsets and go
//! through the bounds-checked [`RegisterWindow`] accessors instead.

use core::{ops::Deref, ptr::NonNull};

use tock_registers::{LocalRegisterCopy, RegisterLongName, fields::Field};

use crate::{
    config::FieldPolicy,
    err::{FecError, FecResult},
};

pub mod consts;
pub mod ctrl;
pub mod int;
pub mod ldpc;

pub use ctrl::CtrlRegs;

/// Place `value` into `field` of `reg`, applying `policy` when it does not fit.
pub(crate) fn pack<R: RegisterLongName>(
    reg: &mut LocalRegisterCopy<u32, R>,
    field: Field<u32, R>,
    value: u32,
    name: &'static str,
    policy: FieldPolicy,
) -> FecResult<()> {
    if value & !field.mask != 0 {
        match policy {
            FieldPolicy::Strict => {
                error!("{name} value {value:#x} is beyond {} bits", field.mask.count_ones());
                return Err(FecError::InvalidArgument(name));
            }
            FieldPolicy::Lenient => {
                warn!(
                    "{name} value {value:#x} is beyond {} bits, programming {:#x}",
                    field.mask.count_ones(),
                    value & field.mask
                );
            }
        }
    }
    reg.modify(field.val(value));
    Ok(())
}

/// A mapped register window of known size.
///
/// Every access is a volatile 32-bit load or store and is checked against the
/// mapped size before the pointer is formed.
pub struct RegisterWindow {
    base: NonNull<u8>,
    size: usize,
}

unsafe impl Send for RegisterWindow {}
unsafe impl Sync for RegisterWindow {}

impl RegisterWindow {
    /// Wrap an already mapped register window.
    ///
    /// # Safety
    ///
    /// `base` must be a 4-byte aligned mapping of at least `size` bytes that
    /// stays valid and is not accessed through other aliases for the lifetime
    /// of the returned window.
    pub const unsafe fn new(base: NonNull<u8>, size: usize) -> Self {
        Self { base, size }
    }

    fn check(&self, offset: usize) -> FecResult<()> {
        if offset % 4 != 0 || offset.checked_add(4).is_none_or(|end| end > self.size) {
            error!("Register access at {offset:#x} outside window of {:#x} bytes", self.size);
            return Err(FecError::HardwareFault("register offset outside mapped window"));
        }
        Ok(())
    }

    pub fn read(&self, offset: usize) -> FecResult<u32> {
        self.check(offset)?;
        let value = unsafe { self.base.as_ptr().add(offset).cast::<u32>().read_volatile() };
        debug!("Read value = {value:#x} from offset {offset:#x}");
        Ok(value)
    }

    pub fn write(&self, offset: usize, value: u32) -> FecResult<()> {
        self.check(offset)?;
        debug!("Writing {value:#x} to offset {offset:#x}");
        unsafe { self.base.as_ptr().add(offset).cast::<u32>().write_volatile(value) };
        Ok(())
    }
}

/// Top-level view of the SD-FEC register file.
///
/// Dereferences to the typed control block; raw offset access is available
/// through [`FecRegisters::window`].
pub struct FecRegisters {
    window: RegisterWindow,
}

impl FecRegisters {
    /// Create a facade over the SD-FEC MMIO region.
    ///
    /// # Safety
    ///
    /// Same contract as [`RegisterWindow::new`].
    pub unsafe fn new(base: NonNull<u8>, size: usize) -> FecResult<Self> {
        if size < core::mem::size_of::<CtrlRegs>() {
            error!("Register window of {size:#x} bytes cannot hold the control block");
            return Err(FecError::HardwareFault("register window smaller than control block"));
        }
        Ok(Self {
            window: unsafe { RegisterWindow::new(base, size) },
        })
    }

    pub fn window(&self) -> &RegisterWindow {
        &self.window
    }
}

impl Deref for FecRegisters {
    type Target = CtrlRegs;

    fn deref(&self) -> &Self::Target {
        unsafe { self.window.base.cast::<CtrlRegs>().as_ref() }
    }
}
