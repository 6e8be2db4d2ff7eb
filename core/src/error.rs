//! Error types shared by every sluice crate.

/// Out of memory error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Fail)]
pub enum OutOfMemory {
    /// Host memory exhausted.
    #[fail(display = "Out of host memory")]
    Host,

    /// Device memory exhausted.
    #[fail(display = "Out of device memory")]
    Device,
}

/// Error that can be returned by some functions
/// indicating that logical device is lost.
/// Methods on objects created from the device will likely result in this error again.
/// Once lost the device never recovers, user should free all objects created from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Fail)]
#[fail(display = "Device lost. Re-initialization required")]
pub struct DeviceLost;

/// External handle doesn't refer to a valid synchronization object
/// or has the wrong kind for the operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Fail)]
#[fail(display = "Invalid external handle")]
pub struct InvalidExternalHandle;

/// Error that can occur when work is submitted to a queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Fail)]
pub enum SubmitError {
    /// Submission could not be accepted. Nothing was enqueued.
    #[fail(display = "{}", _0)]
    OutOfMemory(OutOfMemory),

    /// Device is lost.
    #[fail(display = "{}", _0)]
    DeviceLost(DeviceLost),
}

impl From<OutOfMemory> for SubmitError {
    fn from(error: OutOfMemory) -> Self {
        SubmitError::OutOfMemory(error)
    }
}

impl From<DeviceLost> for SubmitError {
    fn from(error: DeviceLost) -> Self {
        SubmitError::DeviceLost(error)
    }
}

/// Error that can occur when synchronization object is imported or exported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Fail)]
pub enum ExternalError {
    /// Handle is not valid for the operation.
    #[fail(display = "{}", _0)]
    InvalidExternalHandle(InvalidExternalHandle),

    /// Failed to allocate resources for the imported object.
    #[fail(display = "{}", _0)]
    OutOfMemory(OutOfMemory),

    /// Device is lost.
    #[fail(display = "{}", _0)]
    DeviceLost(DeviceLost),
}

impl From<InvalidExternalHandle> for ExternalError {
    fn from(error: InvalidExternalHandle) -> Self {
        ExternalError::InvalidExternalHandle(error)
    }
}

impl From<OutOfMemory> for ExternalError {
    fn from(error: OutOfMemory) -> Self {
        ExternalError::OutOfMemory(error)
    }
}

impl From<DeviceLost> for ExternalError {
    fn from(error: DeviceLost) -> Self {
        ExternalError::DeviceLost(error)
    }
}

impl From<SubmitError> for ExternalError {
    fn from(error: SubmitError) -> Self {
        match error {
            SubmitError::OutOfMemory(error) => ExternalError::OutOfMemory(error),
            SubmitError::DeviceLost(error) => ExternalError::DeviceLost(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_lost_message() {
        assert_eq!(
            SubmitError::from(DeviceLost).to_string(),
            "Device lost. Re-initialization required"
        );
    }

    #[test]
    fn submit_error_converts_into_external() {
        let error: ExternalError = SubmitError::from(OutOfMemory::Host).into();
        assert_eq!(error, ExternalError::OutOfMemory(OutOfMemory::Host));
    }
}
