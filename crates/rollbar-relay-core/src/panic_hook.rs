//! Panic reporting.
//!
//! Panics are Rust's uncaught exceptions. [`PanicHook`] chains onto the
//! process panic hook, reports every panic as a critical error and, when
//! configured to, exits the process once the client has flushed.
//!
//! The process hook runs for every panic, before any unwinding. Panics
//! later recovered by `catch_unwind` or by an async runtime (a panicking
//! tokio task) are reported too, and with `exit_on_uncaught` they end the
//! process.
//!
//! A hook is never taken back out of the chain. Uninstalling deactivates
//! it in place so that hooks installed after it keep running.

use crate::client::{log_callback, ReportClient};
use crate::event::ClassifiedEvent;
use crate::level::Level;
use crate::payload::{Payload, ReportedError};
use serde_json::json;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// An installed panic hook. Owned by the relay that installed it.
pub struct PanicHook {
    active: Arc<AtomicBool>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

impl PanicHook {
    /// Install the hook, chaining whichever hook was set before.
    ///
    /// The hook sees every panic in the process, including ones that are
    /// caught afterwards. With `exit_on_uncaught` any such panic exits.
    pub fn install(client: Arc<dyn ReportClient>, exit_on_uncaught: bool) -> Self {
        let previous = std::panic::take_hook();
        let active = Arc::new(AtomicBool::new(true));

        let flag = active.clone();
        std::panic::set_hook(Box::new(move |info| {
            if flag.load(Ordering::SeqCst) {
                let location = info
                    .location()
                    .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()));
                let thread = std::thread::current().name().map(str::to_string);

                let mut err = ReportedError::new(panic_message(info.payload())).with_data(json!({
                    "location": location,
                    "thread": thread,
                }));
                err.error_type = Some("panic".to_string());

                client.report(
                    ClassifiedEvent::error(Payload::Error(err), None).with_level(Level::Critical),
                    log_callback(),
                );
            }

            previous(info);

            if exit_on_uncaught && flag.load(Ordering::SeqCst) {
                client.shutdown();
                std::process::exit(1);
            }
        }));

        tracing::debug!(exit_on_uncaught, "Installed panic hook");

        Self { active }
    }

    /// Whether panics are currently reported
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Stop reporting panics.
    ///
    /// The hook stays in the chain and only forwards to the one it
    /// replaced. Safe to call more than once.
    pub fn uninstall(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            tracing::debug!("Deactivated panic hook");
        }
    }
}

impl Drop for PanicHook {
    fn drop(&mut self) {
        self.uninstall();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ReportCallback;
    use serial_test::serial;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<ClassifiedEvent>>,
    }

    impl ReportClient for Recorder {
        fn report(&self, event: ClassifiedEvent, _callback: ReportCallback) {
            self.events.lock().unwrap().push(event);
        }

        fn is_enabled(&self) -> bool {
            true
        }
    }

    #[test]
    #[serial]
    fn test_reports_panic_as_critical() {
        let recorder = Arc::new(Recorder::default());
        let hook = PanicHook::install(recorder.clone(), false);

        let result = std::panic::catch_unwind(|| panic!("worker exploded"));
        assert!(result.is_err());

        hook.uninstall();
        let events = recorder.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].level, Level::Critical);
        let err = events[0].payload.as_error().unwrap();
        assert_eq!(err.message, "worker exploded");
        assert_eq!(err.error_type.as_deref(), Some("panic"));
        assert!(err.data.as_ref().unwrap()["location"].is_string());
    }

    #[test]
    #[serial]
    fn test_uninstalled_hook_stops_reporting() {
        let recorder = Arc::new(Recorder::default());
        let hook = PanicHook::install(recorder.clone(), false);
        hook.uninstall();
        hook.uninstall();
        assert!(!hook.is_active());

        let _ = std::panic::catch_unwind(|| panic!("after uninstall"));

        assert!(recorder.events.lock().unwrap().is_empty());
    }

    #[test]
    #[serial]
    fn test_uninstalling_earlier_hook_keeps_later_one() {
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        let first_hook = PanicHook::install(first.clone(), false);
        let second_hook = PanicHook::install(second.clone(), false);

        first_hook.uninstall();
        assert!(second_hook.is_active());
        let _ = std::panic::catch_unwind(|| panic!("second still listening"));

        assert!(first.events.lock().unwrap().is_empty());
        assert_eq!(second.events.lock().unwrap().len(), 1);

        second_hook.uninstall();
        let _ = std::panic::catch_unwind(|| panic!("nobody listening"));
        assert_eq!(second.events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_panic_message_formats() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(7u8);

        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "Box<dyn Any>");
    }
}
