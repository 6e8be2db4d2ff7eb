use {
    crate::SoftBackend,
    parking_lot::{Condvar, Mutex, MutexGuard},
    sluice_core::{
        Deadline, DeviceLost, ExternalError, ExternalHandle, ExternalHandleKind,
        InvalidExternalHandle, OutOfMemory, SyncobjDevice, WaitMode, WaitStatus,
    },
    std::{collections::HashMap, time::Instant},
};

/// Handle of emulated syncobj.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SoftSyncobj(pub u32);

#[derive(Clone, Copy, Debug, Default)]
struct Payload {
    signaled: bool,

    /// Last signaled timeline point.
    value: u64,

    /// Highest timeline point some submitted work will signal.
    available: u64,
}

#[derive(Clone, Copy, Debug)]
enum Export {
    Opaque(usize),
    SyncFile(bool),
}

#[derive(Debug, Default)]
struct State {
    next_handle: u32,
    next_export: i64,
    handles: HashMap<SoftSyncobj, usize>,
    payloads: Vec<Payload>,
    exports: HashMap<i64, Export>,
    fail_allocations: bool,
}

impl State {
    fn payload(&self, syncobj: SoftSyncobj) -> Result<&Payload, DeviceLost> {
        self.handles
            .get(&syncobj)
            .map(|&index| &self.payloads[index])
            .ok_or(DeviceLost)
    }

    fn payload_mut(&mut self, syncobj: SoftSyncobj) -> Result<&mut Payload, DeviceLost> {
        match self.handles.get(&syncobj) {
            Some(&index) => Ok(&mut self.payloads[index]),
            None => Err(DeviceLost),
        }
    }

    fn insert(&mut self, payload: usize) -> SoftSyncobj {
        let handle = SoftSyncobj(self.next_handle);
        self.next_handle += 1;
        self.handles.insert(handle, payload);
        handle
    }

    fn check<F>(&self, syncobjs: &[SoftSyncobj], mode: WaitMode, f: F) -> Result<bool, DeviceLost>
    where
        F: Fn(&Payload) -> bool,
    {
        let mut all = true;
        let mut any = false;
        for &syncobj in syncobjs {
            let ready = f(self.payload(syncobj)?);
            all &= ready;
            any |= ready;
        }
        Ok(match mode {
            WaitMode::All => all,
            WaitMode::Any => any || syncobjs.is_empty(),
        })
    }
}

/// Host emulation of kernel syncobjs.
///
/// Binary and timeline payloads share one object like they do in the kernel.
/// Imported opaque handles share payload with the exported object.
#[derive(Debug, Default)]
pub struct SoftSyncobjs {
    state: Mutex<State>,
    condvar: Condvar,
}

impl SoftSyncobjs {
    /// Create empty syncobj table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make following syncobj creations fail.
    pub fn set_fail_allocations(&self, fail: bool) {
        self.state.lock().fail_allocations = fail;
    }

    /// Number of syncobjs not destroyed yet.
    pub fn alive(&self) -> usize {
        self.state.lock().handles.len()
    }

    /// Check binary payload. Destroyed syncobjs are never signaled.
    pub fn is_signaled(&self, syncobj: SoftSyncobj) -> bool {
        self.state
            .lock()
            .payload(syncobj)
            .map_or(false, |payload| payload.signaled)
    }

    /// Mark timeline point as having work submitted without signaling it.
    pub fn make_available(&self, syncobj: SoftSyncobj, value: u64) -> Result<(), DeviceLost> {
        let mut state = self.state.lock();
        let payload = state.payload_mut(syncobj)?;
        payload.available = payload.available.max(value);
        self.condvar.notify_all();
        Ok(())
    }

    fn wait<F>(
        &self,
        syncobjs: &[SoftSyncobj],
        mode: WaitMode,
        deadline: Deadline,
        f: F,
    ) -> Result<WaitStatus, DeviceLost>
    where
        F: Fn(&Payload) -> bool,
    {
        let mut state: MutexGuard<'_, State> = self.state.lock();
        loop {
            if state.check(syncobjs, mode, &f)? {
                return Ok(WaitStatus::Signaled);
            }

            match deadline {
                Deadline::Never => self.condvar.wait(&mut state),
                Deadline::At(instant) => {
                    if Instant::now() >= instant {
                        return Ok(WaitStatus::Timeout);
                    }
                    let _ = self.condvar.wait_until(&mut state, instant);
                }
            }
        }
    }
}

impl SyncobjDevice<SoftBackend> for SoftSyncobjs {
    fn create_syncobj(&self, signaled: bool) -> Result<SoftSyncobj, OutOfMemory> {
        let mut state = self.state.lock();
        if state.fail_allocations {
            return Err(OutOfMemory::Host);
        }
        state.payloads.push(Payload {
            signaled,
            ..Payload::default()
        });
        let index = state.payloads.len() - 1;
        Ok(state.insert(index))
    }

    fn destroy_syncobj(&self, syncobj: SoftSyncobj) {
        if self.state.lock().handles.remove(&syncobj).is_none() {
            log::warn!("Destroying unknown syncobj {:?}", syncobj);
        }
    }

    fn reset_syncobjs(&self, syncobjs: &[SoftSyncobj]) -> Result<(), DeviceLost> {
        let mut state = self.state.lock();
        for &syncobj in syncobjs {
            state.payload_mut(syncobj)?.signaled = false;
        }
        Ok(())
    }

    fn signal_syncobjs(&self, syncobjs: &[SoftSyncobj]) -> Result<(), DeviceLost> {
        let mut state = self.state.lock();
        for &syncobj in syncobjs {
            state.payload_mut(syncobj)?.signaled = true;
        }
        self.condvar.notify_all();
        Ok(())
    }

    fn wait_syncobjs(
        &self,
        syncobjs: &[SoftSyncobj],
        mode: WaitMode,
        deadline: Deadline,
    ) -> Result<WaitStatus, DeviceLost> {
        self.wait(syncobjs, mode, deadline, |payload| payload.signaled)
    }

    fn timeline_signal(&self, points: &[(SoftSyncobj, u64)]) -> Result<(), DeviceLost> {
        let mut state = self.state.lock();
        for &(syncobj, value) in points {
            let payload = state.payload_mut(syncobj)?;
            payload.value = payload.value.max(value);
            payload.available = payload.available.max(value);
        }
        self.condvar.notify_all();
        Ok(())
    }

    fn timeline_query(&self, syncobj: SoftSyncobj) -> Result<u64, DeviceLost> {
        self.state.lock().payload(syncobj).map(|payload| payload.value)
    }

    fn timeline_wait(
        &self,
        points: &[(SoftSyncobj, u64)],
        mode: WaitMode,
        available_only: bool,
        deadline: Deadline,
    ) -> Result<WaitStatus, DeviceLost> {
        let mut state = self.state.lock();
        loop {
            let mut all = true;
            let mut any = false;
            for &(syncobj, value) in points {
                let payload = state.payload(syncobj)?;
                let ready =
                    payload.value >= value || (available_only && payload.available >= value);
                all &= ready;
                any |= ready;
            }
            let done = match mode {
                WaitMode::All => all,
                WaitMode::Any => any || points.is_empty(),
            };
            if done {
                return Ok(WaitStatus::Signaled);
            }

            match deadline {
                Deadline::Never => self.condvar.wait(&mut state),
                Deadline::At(instant) => {
                    if Instant::now() >= instant {
                        return Ok(WaitStatus::Timeout);
                    }
                    let _ = self.condvar.wait_until(&mut state, instant);
                }
            }
        }
    }

    fn export_syncobj(
        &self,
        syncobj: SoftSyncobj,
        kind: ExternalHandleKind,
    ) -> Result<ExternalHandle, ExternalError> {
        let mut state = self.state.lock();
        let index = *state.handles.get(&syncobj).ok_or(InvalidExternalHandle)?;
        let export = match kind {
            ExternalHandleKind::OpaqueFd => Export::Opaque(index),
            ExternalHandleKind::SyncFile => Export::SyncFile(state.payloads[index].signaled),
        };

        let raw = state.next_export;
        state.next_export += 1;
        state.exports.insert(raw, export);
        Ok(ExternalHandle { kind, raw })
    }

    fn import_syncobj(&self, handle: ExternalHandle) -> Result<SoftSyncobj, ExternalError> {
        let mut state = self.state.lock();
        if state.fail_allocations {
            return Err(OutOfMemory::Host.into());
        }

        let export = state.exports.get(&handle.raw).copied();
        let index = match (handle.kind, export) {
            (ExternalHandleKind::OpaqueFd, Some(Export::Opaque(index))) => index,
            (ExternalHandleKind::SyncFile, Some(Export::SyncFile(signaled))) => {
                state.payloads.push(Payload {
                    signaled,
                    ..Payload::default()
                });
                state.payloads.len() - 1
            }
            _ => return Err(InvalidExternalHandle.into()),
        };

        Ok(state.insert(index))
    }
}
