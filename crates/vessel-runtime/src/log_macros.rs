/// Domain-aware logging macros.
///
/// Each macro injects a `domain` field automatically so callers never need to
/// remember the string literal. The domain value is one of: `sys`, `conn`,
/// `pipe`, `res`, `conf`.
///
/// ```ignore
/// vn_info!(sys, records = 1, rules = 2, "engine bootstrap complete");
/// vn_warn!(pipe, error = %e, "notification render error");
/// vn_debug!(conn, broker = %broker, "consumer connected");
/// ```
///
/// The domain identifier is a bare identifier, not a string — the macro
/// converts it via `stringify!`.
#[doc(hidden)]
macro_rules! vn_log {
    ($level:ident, $domain:ident, $($field:tt)*) => {
        tracing::$level!(domain = stringify!($domain), $($field)*)
    };
}

macro_rules! vn_error {
    ($domain:ident, $($rest:tt)*) => {
        vn_log!(error, $domain, $($rest)*)
    };
}

macro_rules! vn_warn {
    ($domain:ident, $($rest:tt)*) => {
        vn_log!(warn, $domain, $($rest)*)
    };
}

macro_rules! vn_info {
    ($domain:ident, $($rest:tt)*) => {
        vn_log!(info, $domain, $($rest)*)
    };
}

macro_rules! vn_debug {
    ($domain:ident, $($rest:tt)*) => {
        vn_log!(debug, $domain, $($rest)*)
    };
}

#[allow(unused_macros)]
macro_rules! vn_trace {
    ($domain:ident, $($rest:tt)*) => {
        vn_log!(trace, $domain, $($rest)*)
    };
}
