// Logging shims, a no-op unless the `log` feature is enabled.

macro_rules! trace {
    ($($arg:tt)+) => {
        #[cfg(feature = "log")]
        log::trace!($($arg)+);
    };
}

macro_rules! debug {
    ($($arg:tt)+) => {
        #[cfg(feature = "log")]
        log::debug!($($arg)+);
    };
}
