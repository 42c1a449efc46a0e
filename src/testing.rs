//! Heap-backed stand-in for the SD-FEC register map used by unit tests.

use alloc::{boxed::Box, vec};
use core::ptr::NonNull;

use crate::registers::{RegisterWindow, consts::REGISTER_SPACE_SIZE};

pub(crate) struct FakeMmio {
    base: NonNull<u32>,
    words: usize,
}

impl FakeMmio {
    pub(crate) fn new() -> Self {
        let words = REGISTER_SPACE_SIZE / 4;
        let mem: Box<[u32]> = vec![0u32; words].into_boxed_slice();
        let base = NonNull::new(Box::into_raw(mem).cast::<u32>()).unwrap();
        Self { base, words }
    }

    pub(crate) fn base(&self) -> NonNull<u8> {
        self.base.cast()
    }

    pub(crate) fn window(&self) -> RegisterWindow {
        unsafe { RegisterWindow::new(self.base(), self.words * 4) }
    }

    pub(crate) fn peek(&self, offset: usize) -> u32 {
        assert!(offset / 4 < self.words);
        unsafe { self.base.as_ptr().add(offset / 4).read_volatile() }
    }

    pub(crate) fn poke(&self, offset: usize, value: u32) {
        assert!(offset / 4 < self.words);
        unsafe { self.base.as_ptr().add(offset / 4).write_volatile(value) }
    }
}

impl Drop for FakeMmio {
    fn drop(&mut self) {
        let slice = core::ptr::slice_from_raw_parts_mut(self.base.as_ptr(), self.words);
        drop(unsafe { Box::from_raw(slice) });
    }
}
