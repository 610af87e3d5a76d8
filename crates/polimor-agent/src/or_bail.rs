/// Exit-with-logged-error helper for fatal paths (`ConfigError`,
/// `ConnectError`, `NotFound`, `PublishError`, `EncodeError` per the error
/// propagation policy): logs the error with structured context, then exits
/// non-zero rather than panicking or unwinding.
pub trait OrBail<T> {
    fn or_bail(self, message: &str) -> T;
}

impl<T, E> OrBail<T> for Result<T, E>
where
    E: std::fmt::Display + std::fmt::Debug,
{
    fn or_bail(self, message: &str) -> T {
        match self {
            Ok(t) => t,
            Err(e) => {
                tracing::debug!(error_details = ?e, message);
                tracing::error!(error = %e, message);
                std::process::exit(1);
            }
        }
    }
}
