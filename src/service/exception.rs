//! Boundary transformation of internal failures into the wire-error shape.
//!
//! Handlers fail with [`PlugwireError`]; clients receive exactly one stable
//! shape, [`WireError`]. [`transform`] maps between the two, and [`guard`]
//! wraps a whole handler so that panics are caught and converted too. An
//! error that is already wire-shaped passes through unmodified so nested
//! transformation never double-wraps.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::{PlugwireError, Result};
use crate::wire::{LocalizedMessage, StatusCode, WireError};

/// Transform an internal error into the wire shape.
///
/// Already-remote errors pass through untouched. Everything else is logged
/// with its backtrace, mapped to a status code, and carries the original
/// message both in `message` (with backtrace text appended) and as a
/// structured localized detail.
pub fn transform(err: PlugwireError) -> WireError {
    let err = match err {
        PlugwireError::Remote(wire) => return wire,
        other => other,
    };

    let code = match &err {
        PlugwireError::NotFound(_) => StatusCode::NotFound,
        PlugwireError::Conversion(_) | PlugwireError::MissingMetadata(_) => {
            StatusCode::InvalidArgument
        }
        _ => StatusCode::Unknown,
    };

    let message = err.to_string();
    let backtrace = std::backtrace::Backtrace::force_capture();
    tracing::error!(%err, ?code, "handler failed; transforming to wire error");

    WireError {
        code,
        message: format!("{message}\n{backtrace}"),
        details: vec![LocalizedMessage::en(message)],
    }
}

/// Run a handler body, converting any failure into a [`WireError`].
///
/// Catches panics as well as `Err` returns. The RPC framework serializes the
/// returned error; nothing else ever escapes a handler.
pub fn guard<R, F>(f: F) -> std::result::Result<R, WireError>
where
    F: FnOnce() -> Result<R>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(transform(err)),
        Err(panic) => {
            let message = panic_message(&panic);
            tracing::error!(%message, "handler panicked");
            Err(WireError::unknown(format!("handler panicked: {message}")))
        }
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_passes_through() {
        let original = WireError {
            code: StatusCode::Internal,
            message: "remote side failed".to_string(),
            details: vec![LocalizedMessage::en("remote side failed")],
        };
        let out = transform(PlugwireError::Remote(original.clone()));
        assert_eq!(out, original);
    }

    #[test]
    fn test_not_found_maps_to_not_found_code() {
        let out = transform(PlugwireError::NotFound("guestLinux/mount".to_string()));
        assert_eq!(out.code, StatusCode::NotFound);
        assert!(out.message.contains("guestLinux/mount"));
        assert_eq!(out.localized(), Some("not found: guestLinux/mount"));
    }

    #[test]
    fn test_conversion_maps_to_invalid_argument() {
        let out = transform(PlugwireError::Conversion("no Int candidate".to_string()));
        assert_eq!(out.code, StatusCode::InvalidArgument);
    }

    #[test]
    fn test_message_carries_backtrace_text() {
        let out = transform(PlugwireError::Transport("pipe gone".to_string()));
        assert_eq!(out.code, StatusCode::Unknown);
        // message is the display text plus captured backtrace on later lines
        let mut lines = out.message.lines();
        assert_eq!(lines.next(), Some("transport error: pipe gone"));
        assert!(lines.next().is_some());
        // the localized detail stays clean
        assert_eq!(out.localized(), Some("transport error: pipe gone"));
    }

    #[test]
    fn test_guard_passes_ok_through() {
        let got: std::result::Result<i32, WireError> = guard(|| Ok(7));
        assert_eq!(got.unwrap(), 7);
    }

    #[test]
    fn test_guard_transforms_err() {
        let got: std::result::Result<(), WireError> =
            guard(|| Err(PlugwireError::NotFound("nope".to_string())));
        assert_eq!(got.unwrap_err().code, StatusCode::NotFound);
    }

    #[test]
    fn test_guard_catches_panics() {
        let got: std::result::Result<(), WireError> = guard(|| panic!("sliced wrong"));
        let err = got.unwrap_err();
        assert_eq!(err.code, StatusCode::Unknown);
        assert!(err.message.contains("sliced wrong"));
    }
}
