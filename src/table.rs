//! Bounds-checked access to the three LDPC code tables.
//!
//! Each table is a fixed window of 32-bit words. A request is checked against
//! the table depth as a whole before the first word is touched, so a request
//! that would overrun the table performs no hardware access at all.

use alloc::vec::Vec;

use crate::{
    err::{FecError, FecResult},
    protect::WriteProtect,
    registers::{RegisterWindow, consts::*},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    /// Shared-scale (SC) table, one entry per layer.
    SharedScale,
    /// Layer-address (LA) table, one entry per layer.
    LayerAddress,
    /// Quantization-code (QC) table, one entry per QC.
    QuantizationCode,
}

impl TableKind {
    pub const fn base(self) -> usize {
        match self {
            TableKind::SharedScale => LDPC_SC_TABLE_BASE,
            TableKind::LayerAddress => LDPC_LA_TABLE_BASE,
            TableKind::QuantizationCode => LDPC_QC_TABLE_BASE,
        }
    }

    /// Table depth in bytes.
    pub const fn depth(self) -> u32 {
        match self {
            TableKind::SharedScale => SC_TABLE_DEPTH,
            TableKind::LayerAddress => LA_TABLE_DEPTH,
            TableKind::QuantizationCode => QC_TABLE_DEPTH,
        }
    }

    /// Number of words the table holds.
    pub const fn capacity(self) -> usize {
        (self.depth() / REG_WIDTH_JUMP) as usize
    }

    /// Validate a window of `len` words starting at word `offset`.
    pub fn window(self, offset: u32, len: u32) -> FecResult<TableWindow> {
        let reach = (offset as u64 + len as u64) * REG_WIDTH_JUMP as u64;
        if reach > self.depth() as u64 {
            error!("Access will exceed {self:?} table length");
            return Err(FecError::TableBounds {
                table: self,
                offset,
                len,
                depth: self.depth(),
            });
        }
        Ok(TableWindow {
            kind: self,
            offset,
            len,
        })
    }
}

/// A table window already known to fit inside its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableWindow {
    kind: TableKind,
    offset: u32,
    len: u32,
}

impl TableWindow {
    fn addresses(&self) -> impl Iterator<Item = usize> {
        let base = self.kind.base();
        (self.offset..self.offset + self.len)
            .map(move |word| base + (word * REG_WIDTH_JUMP) as usize)
    }

    /// Program `values` into the window. `values` must be exactly as long as
    /// the window.
    pub fn write(&self, gate: &WriteProtect, regs: &RegisterWindow, values: &[u32]) -> FecResult<()> {
        if values.len() != self.len as usize {
            error!(
                "{:?} table payload holds {} words, window expects {}",
                self.kind,
                values.len(),
                self.len
            );
            return Err(FecError::InvalidArgument("table payload length mismatch"));
        }
        gate.check()?;
        for (addr, &value) in self.addresses().zip(values) {
            gate.write(regs, addr, value)?;
        }
        Ok(())
    }

    pub fn read(&self, regs: &RegisterWindow) -> FecResult<Vec<u32>> {
        self.addresses().map(|addr| regs.read(addr)).collect()
    }
}

/// Write `values` into `kind` starting at word `offset`.
pub fn write_table(
    gate: &WriteProtect,
    regs: &RegisterWindow,
    kind: TableKind,
    offset: u32,
    values: &[u32],
) -> FecResult<()> {
    let len = u32::try_from(values.len())
        .map_err(|_| FecError::InvalidArgument("table payload too long"))?;
    kind.window(offset, len)?.write(gate, regs, values)
}

/// Read `len` words of `kind` starting at word `offset`.
pub fn read_table(regs: &RegisterWindow, kind: TableKind, offset: u32, len: u32) -> FecResult<Vec<u32>> {
    kind.window(offset, len)?.read(regs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeMmio;
    use alloc::vec;

    #[test]
    fn write_then_read_same_window() {
        let mmio = FakeMmio::new();
        let regs = mmio.window();
        let gate = WriteProtect::default();

        let values = [0x11, 0x22, 0x33];
        write_table(&gate, &regs, TableKind::LayerAddress, 8, &values).unwrap();
        assert_eq!(mmio.peek(LDPC_LA_TABLE_BASE + 8 * 4), 0x11);
        assert_eq!(mmio.peek(LDPC_LA_TABLE_BASE + 10 * 4), 0x33);
        assert_eq!(
            read_table(&regs, TableKind::LayerAddress, 8, 3).unwrap(),
            vec![0x11, 0x22, 0x33]
        );
    }

    #[test]
    fn overrun_touches_nothing() {
        let mmio = FakeMmio::new();
        let regs = mmio.window();
        let gate = WriteProtect::default();

        for kind in [
            TableKind::SharedScale,
            TableKind::LayerAddress,
            TableKind::QuantizationCode,
        ] {
            let capacity = kind.capacity() as u32;
            let values = vec![0xdead_beef; 2];
            let err = write_table(&gate, &regs, kind, capacity - 1, &values).unwrap_err();
            assert!(matches!(err, FecError::TableBounds { table, .. } if table == kind));
            assert_eq!(mmio.peek(kind.base() + (capacity as usize - 1) * 4), 0);
            assert!(read_table(&regs, kind, capacity, 1).is_err());
            assert!(read_table(&regs, kind, 0, capacity).is_ok());
        }
    }

    #[test]
    fn huge_offsets_do_not_wrap() {
        assert!(TableKind::QuantizationCode.window(u32::MAX, 2).is_err());
    }

    #[test]
    fn protected_table_write_is_refused_up_front() {
        let mmio = FakeMmio::new();
        let regs = mmio.window();
        let mut gate = WriteProtect::default();
        gate.set(&regs, true).unwrap();

        let err = write_table(&gate, &regs, TableKind::SharedScale, 0, &[7, 7]).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::PermissionDenied);
        assert_eq!(mmio.peek(LDPC_SC_TABLE_BASE), 0);
    }
}
