//! Device id allows checking if any synchronization object or queue belongs to a specific
//! device. Objects from different devices must never meet in one submission.

#[cfg(not(feature = "no-slow-safety-checks"))]
fn new_device_id() -> DeviceId {
    static DEVICE_ID: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

    let id = DEVICE_ID.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    assert!(
        id < usize::max_value() && (id as u32) < u32::max_value(),
        "Too many devices created"
    );

    if id == 0 {
        // Warn once.
        log::info!("Slow safety checks are enabled! You can disable them in production by enabling the 'no-slow-safety-checks' feature!");
    }

    DeviceId { id: id as u32 }
}

#[cfg(feature = "no-slow-safety-checks")]
fn new_device_id() -> DeviceId {
    DeviceId {}
}

/// Id of the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeviceId {
    /// Unique id.
    #[cfg(not(feature = "no-slow-safety-checks"))]
    pub id: u32,
}

impl DeviceId {
    /// Create new device id.
    pub fn new() -> Self {
        new_device_id()
    }
}

/// Implement ownership checks for a type that stores the id of its device.
///
/// `device_owned!(Fence<B>)` expects a `device: DeviceId` field.
/// `device_owned!(Queue<B> @ |q: &Self| q.shared.device)` takes an accessor instead.
#[macro_export]
macro_rules! device_owned {
    ($type:ident<B $(, $arg:ident)*> @ $getter:expr) => {
        #[allow(unused)]
        impl<B $(, $arg)*> $type<B $(, $arg)*>
        where
            B: $crate::Backend,
        {
            /// Get id of the device that owns this object.
            pub fn device_id(&self) -> $crate::DeviceId {
                ($getter)(self)
            }

            /// Assert that this object is owned by the specified device.
            pub fn assert_device_owner(&self, device: $crate::DeviceId) {
                $crate::sluice_slow_assert_eq!(
                    self.device_id(),
                    device,
                    "Object is not owned by the specified device"
                );
            }
        }
    };

    ($type:ident<B $(, $arg:ident)*>) => {
        $crate::device_owned!($type<B $(, $arg)*> @ |s: &Self| s.device);
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(feature = "no-slow-safety-checks"))]
    fn device_ids_are_unique() {
        let a = DeviceId::new();
        let b = DeviceId::new();
        assert_ne!(a, b);
    }
}
