//! Deprecated and moved function wrappers.

use crate::error::DeprecationError;
use crate::kind::WarningClassRef;
use crate::message::{self, MessageSpec};
use crate::notify::{DeprecationNotifier, NoticeOptions};

const DEPRECATED_IMMINENT: &str = "`%(func_name)s` is deprecated and will be removed in \
     %(product)s %(version)s.";
const DEPRECATED_PENDING: &str = "`%(func_name)s` is scheduled to be deprecated in a future \
     version of %(product)s.";
const MOVED_IMMINENT: &str = "`%(func_name)s` has moved to `%(new_name)s`. The old function is \
     deprecated and will be removed in %(product)s %(version)s.";
const MOVED_PENDING: &str = "`%(func_name)s` has moved to `%(new_name)s`. The old function is \
     scheduled to be deprecated in a future version of %(product)s.";

/// A wrapped callable that announces its deprecation on every call.
pub struct FunctionGuard<F> {
    notifier: DeprecationNotifier,
    class_ref: WarningClassRef,
    func_name: String,
    new_name: Option<String>,
    opts: NoticeOptions,
    inner: F,
}

impl<F> FunctionGuard<F> {
    /// Wrap `inner` so every call warns against using it.
    pub fn deprecated(
        notifier: DeprecationNotifier,
        class_ref: WarningClassRef,
        func_name: impl Into<String>,
        opts: NoticeOptions,
        inner: F,
    ) -> Self {
        Self {
            notifier,
            class_ref,
            func_name: func_name.into(),
            new_name: None,
            opts,
            inner,
        }
    }

    /// Wrap `inner` so every call points consumers at `new_target`.
    ///
    /// A bare target name gets `()` appended for display; pass a name that
    /// already carries parentheses to keep it as-is.
    pub fn moved(
        notifier: DeprecationNotifier,
        class_ref: WarningClassRef,
        func_name: impl Into<String>,
        new_target: impl Into<String>,
        opts: NoticeOptions,
        inner: F,
    ) -> Self {
        Self {
            notifier,
            class_ref,
            func_name: func_name.into(),
            new_name: Some(display_target(new_target.into())),
            opts,
            inner,
        }
    }

    /// The wrapped callable's display name.
    pub fn func_name(&self) -> &str {
        &self.func_name
    }

    /// The replacement's display name, for moved functions.
    pub fn new_name(&self) -> Option<&str> {
        self.new_name.as_deref()
    }

    /// Invoke the wrapped callable, emitting the notice first.
    ///
    /// The return value is the callable's own; a notice that fails to render
    /// surfaces before `inner` runs.
    pub fn call<A, R>(&self, args: A) -> Result<R, DeprecationError>
    where
        F: Fn(A) -> R,
    {
        let (spec, fields) = match &self.new_name {
            Some(new_name) => (
                MessageSpec::new(MOVED_IMMINENT, MOVED_PENDING),
                message::field_map(&[
                    ("func_name", self.func_name.as_str()),
                    ("new_name", new_name.as_str()),
                ]),
            ),
            None => (
                MessageSpec::new(DEPRECATED_IMMINENT, DEPRECATED_PENDING),
                message::field_map(&[("func_name", self.func_name.as_str())]),
            ),
        };
        let spec = spec.with_override(self.opts.message.clone());

        self.notifier.emit_surface(
            "function",
            &self.class_ref,
            &spec,
            fields,
            self.opts.stack_depth,
        )?;

        Ok((self.inner)(args))
    }
}

fn display_target(name: String) -> String {
    if name.ends_with("()") {
        name
    } else {
        format!("{name}()")
    }
}
