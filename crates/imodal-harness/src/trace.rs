use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::Subscriber;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

/// What a [`TraceCapture`] saw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedTrace {
    /// Names of spans created, in order.
    pub spans: Vec<String>,
    /// `message` field of every event, in order.
    pub messages: Vec<String>,
}

impl CapturedTrace {
    #[must_use]
    pub fn saw_span(&self, name: &str) -> bool {
        self.spans.iter().any(|s| s == name)
    }

    #[must_use]
    pub fn saw_message(&self, message: &str) -> bool {
        self.messages.iter().any(|m| m == message)
    }
}

/// Thread-local subscriber recording spans and event messages.
///
/// ```ignore
/// let capture = TraceCapture::install();
/// run_the_code();
/// assert!(capture.snapshot().saw_span("imodal.visit"));
/// ```
pub struct TraceCapture {
    state: Arc<Mutex<CapturedTrace>>,
    _guard: DefaultGuard,
}

impl std::fmt::Debug for TraceCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceCapture")
            .field("state", &*self.lock())
            .finish_non_exhaustive()
    }
}

impl TraceCapture {
    /// Install as the default subscriber for the current thread until the
    /// capture is dropped.
    #[must_use]
    pub fn install() -> Self {
        let state = Arc::new(Mutex::new(CapturedTrace::default()));
        let subscriber = tracing_subscriber::registry().with(CaptureLayer {
            state: Arc::clone(&state),
        });
        let guard = tracing::subscriber::set_default(subscriber);
        tracing::callsite::rebuild_interest_cache();
        Self { state, _guard: guard }
    }

    #[must_use]
    pub fn snapshot(&self) -> CapturedTrace {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, CapturedTrace> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct CaptureLayer {
    state: Arc<Mutex<CapturedTrace>>,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_new_span(&self, attrs: &tracing::span::Attributes<'_>, _id: &tracing::Id, _ctx: Context<'_, S>) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .spans
            .push(attrs.metadata().name().to_string());
    }

    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        struct MessageVisitor {
            message: Option<String>,
        }
        impl tracing::field::Visit for MessageVisitor {
            fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                if field.name() == "message" {
                    self.message = Some(value.to_owned());
                }
            }

            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" {
                    self.message = Some(format!("{value:?}").trim_matches('"').to_owned());
                }
            }
        }

        let mut visitor = MessageVisitor { message: None };
        event.record(&mut visitor);
        if let Some(message) = visitor.message {
            self.state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .messages
                .push(message);
        }
    }
}
