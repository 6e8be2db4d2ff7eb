//! Run-time safety checks that are too slow for release builds.
//! The `no-slow-safety-checks` feature compiles them out.

/// `assert!` that exists only if `"no-slow-safety-checks"` feature is not enabled.
#[cfg(not(feature = "no-slow-safety-checks"))]
#[macro_export]
macro_rules! sluice_slow_assert {
    ($($arg:tt)*) => {
        assert!($($arg)*);
    }
}

/// `assert_eq!` that exists only if `"no-slow-safety-checks"` feature is not enabled.
#[cfg(not(feature = "no-slow-safety-checks"))]
#[macro_export]
macro_rules! sluice_slow_assert_eq {
    ($($arg:tt)*) => {
        assert_eq!($($arg)*);
    }
}

/// Compiled out by `"no-slow-safety-checks"`.
#[cfg(feature = "no-slow-safety-checks")]
#[macro_export]
macro_rules! sluice_slow_assert {
    ($($arg:tt)*) => {};
}

/// Compiled out by `"no-slow-safety-checks"`.
#[cfg(feature = "no-slow-safety-checks")]
#[macro_export]
macro_rules! sluice_slow_assert_eq {
    ($($arg:tt)*) => {};
}
