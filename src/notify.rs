//! Warning emission: resolution, field merging, rendering, and delivery.
//!
//! Every deprecated surface in this crate funnels its notices through
//! [`DeprecationNotifier::emit`], so sinks and metrics see a uniform stream.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::warn;

use crate::error::DeprecationError;
use crate::kind::{DeprecationKind, WarningClassRef, DEFAULT_STACK_DEPTH};
use crate::message::{self, MessageSpec};
use crate::metrics::NoticeMetrics;

const MODULE_DEPRECATED_IMMINENT: &str = "`%(module_name)s` is deprecated and will be removed in \
     %(product)s %(version)s.";
const MODULE_DEPRECATED_PENDING: &str = "`%(module_name)s` is scheduled to be deprecated in a \
     future version of %(product)s.";
const MODULE_MOVED_IMMINENT: &str = "`%(old_module_name)s` is deprecated and will be removed in \
     %(product)s %(version)s. Import `%(new_module_name)s` instead.";
const MODULE_MOVED_PENDING: &str = "`%(old_module_name)s` is scheduled to be deprecated in a \
     future version of %(product)s. To prepare, import `%(new_module_name)s` instead.";

/// A fully rendered warning, as handed to the notification channel.
#[derive(Debug, Clone, Serialize)]
pub struct EmittedWarning {
    /// Severity of the notice
    pub kind: DeprecationKind,

    /// Product the warning class belongs to
    pub product: String,

    /// Removal version, when the class carries one
    pub version: Option<String>,

    /// Rendered message text
    pub message: String,

    /// Stack frames to skip so a report points at the consumer call site
    pub stack_depth: usize,
}

/// The channel deprecation notices are delivered to.
pub trait WarningSink: Send + Sync {
    /// Deliver one rendered warning.
    fn deliver(&self, warning: &EmittedWarning);
}

/// Default sink: a structured `tracing` event at WARN level.
#[derive(Debug, Default)]
pub struct TracingSink;

impl WarningSink for TracingSink {
    fn deliver(&self, warning: &EmittedWarning) {
        warn!(
            kind = %warning.kind,
            product = %warning.product,
            version = ?warning.version,
            stack_depth = warning.stack_depth,
            "{}",
            warning.message
        );
    }
}

/// Sink that records every warning, for consumer test suites.
#[derive(Debug, Default)]
pub struct CaptureSink {
    captured: Mutex<Vec<EmittedWarning>>,
}

impl CaptureSink {
    /// Take all captured warnings, leaving the sink empty.
    pub fn drain(&self) -> Vec<EmittedWarning> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of warnings captured so far.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no warnings have been captured.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<EmittedWarning>> {
        self.captured.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WarningSink for CaptureSink {
    fn deliver(&self, warning: &EmittedWarning) {
        self.lock().push(warning.clone());
    }
}

/// Per-notice knobs shared by every deprecated surface.
#[derive(Debug, Clone)]
pub struct NoticeOptions {
    /// Custom message used instead of the default template pair
    pub message: Option<String>,

    /// Stack depth as seen from the consumer-facing call
    pub stack_depth: usize,
}

impl Default for NoticeOptions {
    fn default() -> Self {
        Self {
            message: None,
            stack_depth: DEFAULT_STACK_DEPTH,
        }
    }
}

impl NoticeOptions {
    /// Replace the default template pair with a custom message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Set the stack depth reported to the sink.
    pub fn stack_depth(mut self, depth: usize) -> Self {
        self.stack_depth = depth;
        self
    }
}

/// Central emission gateway.
///
/// Cheap to clone; clones share the sink and metrics.
#[derive(Clone)]
pub struct DeprecationNotifier {
    sink: Arc<dyn WarningSink>,
    metrics: Option<Arc<NoticeMetrics>>,
}

impl Default for DeprecationNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl DeprecationNotifier {
    /// Notifier delivering to the default tracing sink.
    pub fn new() -> Self {
        Self::with_sink(Arc::new(TracingSink))
    }

    /// Notifier delivering to a custom sink.
    pub fn with_sink(sink: Arc<dyn WarningSink>) -> Self {
        Self {
            sink,
            metrics: None,
        }
    }

    /// Attach a metrics collector.
    pub fn with_metrics(mut self, metrics: Arc<NoticeMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The attached metrics collector, if any.
    pub fn metrics(&self) -> Option<&NoticeMetrics> {
        self.metrics.as_deref()
    }

    /// Emit one deprecation notice.
    ///
    /// Resolves the class reference, validates it, merges the class fields
    /// into `fields` (class product and version win over caller entries),
    /// renders the kind-appropriate template, and delivers the result. The
    /// reported depth is `stack_depth` plus one for this gateway.
    pub fn emit(
        &self,
        class_ref: &WarningClassRef,
        spec: &MessageSpec,
        fields: HashMap<String, String>,
        stack_depth: usize,
    ) -> Result<(), DeprecationError> {
        self.emit_surface("direct", class_ref, spec, fields, stack_depth)
    }

    pub(crate) fn emit_surface(
        &self,
        surface: &'static str,
        class_ref: &WarningClassRef,
        spec: &MessageSpec,
        mut fields: HashMap<String, String>,
        stack_depth: usize,
    ) -> Result<(), DeprecationError> {
        let class = class_ref.resolve();
        if let Err(err) = class.validate() {
            self.record_failure(surface, &err);
            return Err(err);
        }

        fields.insert("product".to_string(), class.product.clone());
        if let Some(version) = &class.version {
            fields.insert("version".to_string(), version.clone());
        }

        let rendered = match message::render(class.kind, spec, &fields) {
            Ok(rendered) => rendered,
            Err(err) => {
                self.record_failure(surface, &err);
                return Err(err);
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_notice(class.kind.as_str(), &class.product, surface);
        }

        self.sink.deliver(&EmittedWarning {
            kind: class.kind,
            product: class.product,
            version: class.version,
            message: rendered,
            stack_depth: stack_depth + 1,
        });
        Ok(())
    }

    fn record_failure(&self, surface: &str, err: &DeprecationError) {
        if let Some(metrics) = &self.metrics {
            metrics.record_failure(surface, err.label());
        }
    }

    /// Mark a module as deprecated.
    ///
    /// Call this from the module's initialization path so consumers are told
    /// on first use.
    pub fn module_deprecated(
        &self,
        class_ref: &WarningClassRef,
        module_name: &str,
        opts: NoticeOptions,
    ) -> Result<(), DeprecationError> {
        let spec = MessageSpec::new(MODULE_DEPRECATED_IMMINENT, MODULE_DEPRECATED_PENDING)
            .with_override(opts.message);
        self.emit_surface(
            "module",
            class_ref,
            &spec,
            message::field_map(&[("module_name", module_name)]),
            // Factor in this helper.
            opts.stack_depth + 1,
        )
    }

    /// Mark a module as moved to a new location.
    pub fn module_moved(
        &self,
        class_ref: &WarningClassRef,
        old_module_name: &str,
        new_module_name: &str,
        opts: NoticeOptions,
    ) -> Result<(), DeprecationError> {
        let spec = MessageSpec::new(MODULE_MOVED_IMMINENT, MODULE_MOVED_PENDING)
            .with_override(opts.message);
        self.emit_surface(
            "module",
            class_ref,
            &spec,
            message::field_map(&[
                ("old_module_name", old_module_name),
                ("new_module_name", new_module_name),
            ]),
            // Factor in this helper.
            opts.stack_depth + 1,
        )
    }
}
