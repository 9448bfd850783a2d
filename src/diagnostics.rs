//! Structured diagnostic events.
//!
//! The key manager and the middleware never log directly. They describe what
//! happened as a [`DiagnosticEvent`] and hand it to an injected
//! [`DiagnosticSink`]. The default sink forwards to `tracing`.

use std::sync::Arc;

use crate::api_auth::error::ErrorKind;

#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent<'a> {
    CacheHit { app_id: &'a str },
    CacheMiss { app_id: &'a str },
    CacheStale { app_id: &'a str, age_ms: i64 },
    CacheCleared { entries: usize },
    StoreRead { app_id: &'a str, found: bool },
    StoreFailure { app_id: &'a str, detail: String },
    AppSaved { app_id: &'a str, keys: usize },
    KeyRejected { app_id: &'a str, key_id: &'a str, reason: &'static str },
    RequestSkipped { path: &'a str },
    RequestRejected { path: &'a str, code: ErrorKind, detail: String },
    RequestVerified { path: &'a str, app_id: &'a str, key_id: &'a str },
}

impl DiagnosticEvent<'_> {
    /// Verbose events are only emitted when `debug` is on.
    pub fn is_verbose(&self) -> bool {
        !matches!(
            self,
            Self::StoreFailure { .. } | Self::RequestRejected { .. } | Self::KeyRejected { .. }
        )
    }
}

/// Destination for diagnostic events.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, event: &DiagnosticEvent<'_>);
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, event: &DiagnosticEvent<'_>) {
        match event {
            DiagnosticEvent::CacheHit { app_id } => {
                tracing::debug!(app_id, "[key_manager] cache hit")
            }
            DiagnosticEvent::CacheMiss { app_id } => {
                tracing::debug!(app_id, "[key_manager] cache miss")
            }
            DiagnosticEvent::CacheStale { app_id, age_ms } => {
                tracing::debug!(app_id, age_ms, "[key_manager] cache entry expired")
            }
            DiagnosticEvent::CacheCleared { entries } => {
                tracing::debug!(entries, "[key_manager] cache cleared")
            }
            DiagnosticEvent::StoreRead { app_id, found } => {
                tracing::debug!(app_id, found, "[key_manager] store read")
            }
            DiagnosticEvent::StoreFailure { app_id, detail } => {
                tracing::warn!(app_id, detail = %detail, "[key_manager] store failure")
            }
            DiagnosticEvent::AppSaved { app_id, keys } => {
                tracing::debug!(app_id, keys, "[key_manager] app saved")
            }
            DiagnosticEvent::KeyRejected {
                app_id,
                key_id,
                reason,
            } => tracing::warn!(app_id, key_id, reason, "[key_manager] key rejected"),
            DiagnosticEvent::RequestSkipped { path } => {
                tracing::debug!(path, "[signature_auth] skip path")
            }
            DiagnosticEvent::RequestRejected { path, code, detail } => tracing::warn!(
                path,
                code = code.name(),
                detail = %detail,
                "[signature_auth] request rejected"
            ),
            DiagnosticEvent::RequestVerified {
                path,
                app_id,
                key_id,
            } => tracing::debug!(path, app_id, key_id, "[signature_auth] request verified"),
        }
    }
}

/// Sink plus the verbosity gate, cloned into each component.
#[derive(Clone)]
pub struct Diagnostics {
    sink: Arc<dyn DiagnosticSink>,
    debug: bool,
}

impl Diagnostics {
    pub fn new(sink: Arc<dyn DiagnosticSink>, debug: bool) -> Self {
        Self { sink, debug }
    }

    pub fn tracing(debug: bool) -> Self {
        Self::new(Arc::new(TracingSink), debug)
    }

    pub fn emit(&self, event: DiagnosticEvent<'_>) {
        if self.debug || !event.is_verbose() {
            self.sink.emit(&event);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records the `Debug` rendering of each event.
    #[derive(Default)]
    pub struct RecordingSink {
        pub events: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        pub fn snapshot(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl DiagnosticSink for RecordingSink {
        fn emit(&self, event: &DiagnosticEvent<'_>) {
            self.events.lock().unwrap().push(format!("{:?}", event));
        }
    }
}
