//! Explicit registry of attached SD-FEC instances.

use alloc::{collections::BTreeMap, sync::Arc, vec::Vec};
use core::ptr::NonNull;

use spin::Mutex;

use crate::{
    SdFec,
    config::FecConfig,
    err::{FecError, FecResult},
};

/// Most instances one registry hands out ids for.
pub const MAX_DEVICES: usize = 256;

struct Inner {
    devices: BTreeMap<u32, Arc<SdFec>>,
    next_id: u32,
}

/// Owns every attached device and assigns their `fec_id`s.
pub struct FecRegistry {
    inner: Mutex<Inner>,
}

impl FecRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                devices: BTreeMap::new(),
                next_id: 0,
            }),
        }
    }

    /// Attach a device: assign the next id, bring the hardware in line with
    /// `config` and keep the instance.
    ///
    /// # Safety
    ///
    /// Same contract as [`SdFec::new`].
    pub unsafe fn attach(
        &self,
        base: NonNull<u8>,
        size: usize,
        mut config: FecConfig,
    ) -> FecResult<Arc<SdFec>> {
        let mut inner = self.inner.lock();
        if inner.devices.len() >= MAX_DEVICES {
            error!("SDFEC registry full ({MAX_DEVICES} devices)");
            return Err(FecError::ResourceBusy);
        }
        let id = inner.next_id;
        config.fec_id = id;

        let dev = Arc::new(unsafe { SdFec::new(base, size, config)? });
        dev.probe()?;
        inner.devices.insert(id, dev.clone());
        inner.next_id = id.wrapping_add(1);
        info!("SDFEC{id} attached");
        Ok(dev)
    }

    pub fn get(&self, fec_id: u32) -> Option<Arc<SdFec>> {
        self.inner.lock().devices.get(&fec_id).cloned()
    }

    pub fn ids(&self) -> Vec<u32> {
        self.inner.lock().devices.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove a device. Refused while its control session is open.
    pub fn detach(&self, fec_id: u32) -> FecResult<Arc<SdFec>> {
        let mut inner = self.inner.lock();
        let Some(dev) = inner.devices.get(&fec_id) else {
            error!("No SDFEC{fec_id} to detach");
            return Err(FecError::InvalidArgument("unknown fec_id"));
        };
        if dev.is_open() {
            error!("SDFEC{fec_id} is open, refusing to detach");
            return Err(FecError::ResourceBusy);
        }
        let dev = inner
            .devices
            .remove(&fec_id)
            .ok_or(FecError::InvalidArgument("unknown fec_id"))?;
        info!("SDFEC{fec_id} detached");
        Ok(dev)
    }

    /// Drop every device the registry still holds.
    pub fn teardown(self) {
        let inner = self.inner.into_inner();
        for id in inner.devices.keys() {
            debug!("Releasing SDFEC{id}");
        }
        info!("SDFEC registry torn down, {} devices released", inner.devices.len());
    }
}

impl Default for FecRegistry {
    fn default() -> Self {
        Self::new()
    }
}
