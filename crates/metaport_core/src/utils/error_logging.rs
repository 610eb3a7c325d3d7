//! Error formatting helpers for logs and recorded failures

/// Log an error with miette's formatting
///
/// Debug formatting of a miette diagnostic carries its code and help text.
#[macro_export]
macro_rules! log_error {
    ($err:expr) => {{
        let err = &$err;
        tracing::error!("{:?}", err);
    }};
    ($msg:expr, $err:expr) => {{
        let err = &$err;
        tracing::error!("{}: {:?}", $msg, err);
    }};
}

/// An error and every cause below it on one line, separated by `: `
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        let text = cause.to_string();
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        current = cause.source();
    }
    message
}
