//! Lazily-resolved values that warn on first observation.
//!
//! Wrapping a deprecated argument value in a [`LazyValue`] defers its notice
//! until a consumer actually looks at the value, so callers handing it
//! onward (into a callback payload, a settings map) stay silent.

use std::cmp::Ordering;
use std::sync::{Mutex, PoisonError};

use serde_json::{Number, Value};

use crate::error::DeprecationError;
use crate::kind::{WarningClassRef, DEFAULT_STACK_DEPTH};
use crate::message::{self, MessageSpec};
use crate::notify::DeprecationNotifier;

const ARG_IMMINENT: &str = "`%(old_name)s` for `%(owner_name)s` has been deprecated and will be \
     removed in %(product)s %(version)s.";
const ARG_PENDING: &str = "`%(old_name)s` for `%(owner_name)s` is scheduled to be deprecated in \
     a future version of %(product)s.";
const ARG_RENAMED_IMMINENT: &str = "`%(old_name)s` for `%(owner_name)s` has been deprecated and \
     will be removed in %(product)s %(version)s. Use `%(new_name)s` instead.";
const ARG_RENAMED_PENDING: &str = "`%(old_name)s` for `%(owner_name)s` is scheduled to be \
     deprecated in a future version of %(product)s. To prepare, use `%(new_name)s` instead.";

type Producer = Box<dyn FnOnce() -> Result<Value, DeprecationError> + Send>;

enum LazyState {
    Unresolved(Producer),
    Resolving,
    Resolved(Value),
    Failed(DeprecationError),
}

/// Describes the deprecated argument a [`LazyValue`] stands in for.
#[derive(Debug, Clone)]
pub struct ArgumentNotice {
    /// Name of the callable or structure owning the argument
    pub owner_name: String,

    /// The deprecated argument or key name
    pub old_name: String,

    /// Replacement name, when one exists
    pub new_name: Option<String>,

    /// Custom message used instead of the default template pair
    pub message: Option<String>,

    /// Stack depth as seen from the consumer-facing call
    pub stack_depth: usize,
}

impl ArgumentNotice {
    /// Describe `old_name` as deprecated on `owner_name`.
    pub fn new(owner_name: impl Into<String>, old_name: impl Into<String>) -> Self {
        Self {
            owner_name: owner_name.into(),
            old_name: old_name.into(),
            new_name: None,
            message: None,
            stack_depth: DEFAULT_STACK_DEPTH,
        }
    }

    /// Name the replacement argument.
    pub fn new_name(mut self, name: impl Into<String>) -> Self {
        self.new_name = Some(name.into());
        self
    }

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

/// A value that materializes, at most once, on first observation.
///
/// Every capability below forces resolution first; the producer's warning
/// (or error) therefore fires at the first observation point, not where the
/// value was wrapped.
pub struct LazyValue {
    state: Mutex<LazyState>,
}

impl LazyValue {
    /// Wrap `producer`; it runs on first observation only.
    pub fn new<F>(producer: F) -> Self
    where
        F: FnOnce() -> Result<Value, DeprecationError> + Send + 'static,
    {
        Self {
            state: Mutex::new(LazyState::Unresolved(Box::new(producer))),
        }
    }

    /// Wrap an already-resolved value. No warning is attached.
    pub fn resolved(value: Value) -> Self {
        Self {
            state: Mutex::new(LazyState::Resolved(value)),
        }
    }

    /// Wrap a deprecated argument value: the first observation emits the
    /// notice described by `notice`, then yields `value`.
    pub fn for_argument(
        notifier: DeprecationNotifier,
        class_ref: WarningClassRef,
        notice: ArgumentNotice,
        value: Value,
    ) -> Self {
        Self::new(move || {
            let (imminent, pending) = if notice.new_name.is_some() {
                (ARG_RENAMED_IMMINENT, ARG_RENAMED_PENDING)
            } else {
                (ARG_IMMINENT, ARG_PENDING)
            };
            let spec = MessageSpec::new(imminent, pending).with_override(notice.message.clone());

            let mut fields = message::field_map(&[
                ("old_name", notice.old_name.as_str()),
                ("owner_name", notice.owner_name.as_str()),
            ]);
            if let Some(new_name) = &notice.new_name {
                fields.insert("new_name".to_string(), new_name.clone());
            }

            notifier.emit_surface(
                "argument",
                &class_ref,
                &spec,
                fields,
                // Factor in the producer and the observing capability.
                notice.stack_depth + 2,
            )?;
            Ok(value)
        })
    }

    /// Whether the producer has already run successfully.
    pub fn is_resolved(&self) -> bool {
        matches!(&*self.lock(), LazyState::Resolved(_))
    }

    /// Force resolution and return the value.
    ///
    /// The producer runs outside the state lock; a producer that observes
    /// this same value again is rejected with an invalid-state error instead
    /// of deadlocking. A failed producer is not retried: the recorded error
    /// replays on every later observation.
    pub fn force(&self) -> Result<Value, DeprecationError> {
        let producer = {
            let mut state = self.lock();
            match &*state {
                LazyState::Resolved(value) => return Ok(value.clone()),
                LazyState::Failed(err) => return Err(err.clone()),
                LazyState::Resolving => {
                    return Err(DeprecationError::InvalidState(
                        "lazy value observed while its producer is still running".to_string(),
                    ))
                }
                LazyState::Unresolved(_) => {}
            }
            match std::mem::replace(&mut *state, LazyState::Resolving) {
                LazyState::Unresolved(producer) => producer,
                _ => unreachable!("state checked under the same lock"),
            }
        };

        let result = producer();
        let mut state = self.lock();
        match result {
            Ok(value) => {
                *state = LazyState::Resolved(value.clone());
                Ok(value)
            }
            Err(err) => {
                *state = LazyState::Failed(err.clone());
                Err(err)
            }
        }
    }

    /// Equality against a plain value.
    pub fn eq_value(&self, other: &Value) -> Result<bool, DeprecationError> {
        Ok(self.force()? == *other)
    }

    /// Ordering against a plain value.
    ///
    /// Numbers compare numerically and strings lexicographically; any other
    /// combination has no defined order and yields `None`.
    pub fn partial_cmp_value(&self, other: &Value) -> Result<Option<Ordering>, DeprecationError> {
        let value = self.force()?;
        Ok(match (&value, other) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        })
    }

    /// Truthiness, following the conventions of dynamic settings values:
    /// null and zero are false, empty strings and collections are false.
    pub fn is_truthy(&self) -> Result<bool, DeprecationError> {
        Ok(match self.force()? {
            Value::Null => false,
            Value::Bool(b) => b,
            Value::Number(n) => n.as_f64() != Some(0.0),
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
        })
    }

    /// Iterate the resolved collection: array items, or object keys.
    pub fn iter_items(&self) -> Result<std::vec::IntoIter<Value>, DeprecationError> {
        match self.force()? {
            Value::Array(items) => Ok(items.into_iter()),
            Value::Object(map) => Ok(map
                .keys()
                .cloned()
                .map(Value::String)
                .collect::<Vec<_>>()
                .into_iter()),
            other => Err(DeprecationError::UnsupportedOperation {
                op: "iterate",
                detail: format!("{other} is not a collection"),
            }),
        }
    }

    /// Render the resolved value as text. Strings render bare; everything
    /// else uses its JSON form.
    pub fn to_text(&self) -> Result<String, DeprecationError> {
        Ok(match self.force()? {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    /// Add `other` to the resolved value. Numbers add; strings concatenate.
    pub fn add(&self, other: &Value) -> Result<Value, DeprecationError> {
        let value = self.force()?;
        if let (Value::String(a), Value::String(b)) = (&value, other) {
            return Ok(Value::String(format!("{a}{b}")));
        }
        numeric_op("add", &value, other, i64::checked_add, |a, b| a + b)
    }

    /// Subtract `other` from the resolved value.
    pub fn sub(&self, other: &Value) -> Result<Value, DeprecationError> {
        numeric_op("subtract", &self.force()?, other, i64::checked_sub, |a, b| {
            a - b
        })
    }

    /// Multiply the resolved value by `other`.
    pub fn mul(&self, other: &Value) -> Result<Value, DeprecationError> {
        numeric_op("multiply", &self.force()?, other, i64::checked_mul, |a, b| {
            a * b
        })
    }

    /// Divide the resolved value by `other`. Division always yields a float.
    pub fn div(&self, other: &Value) -> Result<Value, DeprecationError> {
        numeric_op("divide", &self.force()?, other, |_, _| None, |a, b| a / b)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LazyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Integer path when both operands are i64 (overflow falls through), float
/// path otherwise. Non-numeric operands and non-finite results are errors.
fn numeric_op(
    op: &'static str,
    lhs: &Value,
    rhs: &Value,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
) -> Result<Value, DeprecationError> {
    if let (Some(a), Some(b)) = (lhs.as_i64(), rhs.as_i64()) {
        if let Some(n) = int_op(a, b) {
            return Ok(Value::from(n));
        }
    }
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => Number::from_f64(float_op(a, b))
            .map(Value::Number)
            .ok_or_else(|| DeprecationError::UnsupportedOperation {
                op,
                detail: "result is not a finite number".to_string(),
            }),
        _ => Err(DeprecationError::UnsupportedOperation {
            op,
            detail: format!("cannot {op} {lhs} and {rhs}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::WarningClass;
    use crate::notify::CaptureSink;
    use serde_json::json;
    use std::sync::Arc;

    fn capture() -> (DeprecationNotifier, Arc<CaptureSink>) {
        let sink = Arc::new(CaptureSink::default());
        (DeprecationNotifier::with_sink(sink.clone()), sink)
    }

    fn wrapped(value: Value) -> (LazyValue, Arc<CaptureSink>) {
        let (notifier, sink) = capture();
        let class_ref = WarningClass::imminent("MyProduct", "1.0").unwrap().into();
        let lazy = LazyValue::for_argument(
            notifier,
            class_ref,
            ArgumentNotice::new("my_signal()", "old_arg"),
            value,
        );
        (lazy, sink)
    }

    #[test]
    fn test_construction_does_not_warn() {
        let (lazy, sink) = wrapped(json!(123));
        assert!(sink.is_empty());
        assert!(!lazy.is_resolved());
    }

    #[test]
    fn test_warns_once_at_first_observation() {
        let (lazy, sink) = wrapped(json!(123));

        assert_eq!(lazy.add(&json!(1)).unwrap(), json!(124));
        assert_eq!(sink.len(), 1);

        // Later observations reuse the resolved value silently.
        assert!(lazy.eq_value(&json!(123)).unwrap());
        assert_eq!(lazy.to_text().unwrap(), "123");
        assert_eq!(sink.len(), 1);

        let warnings = sink.drain();
        assert_eq!(
            warnings[0].message,
            "`old_arg` for `my_signal()` has been deprecated and will be removed in \
             MyProduct 1.0."
        );
        // Producer and capability frames plus the gateway frame.
        assert_eq!(warnings[0].stack_depth, DEFAULT_STACK_DEPTH + 3);
    }

    #[test]
    fn test_renamed_argument_wording() {
        let (notifier, sink) = capture();
        let class_ref = WarningClass::pending("MyProduct").unwrap().into();
        let lazy = LazyValue::for_argument(
            notifier,
            class_ref,
            ArgumentNotice::new("my_signal()", "old_arg").new_name("new_arg"),
            json!(true),
        );

        assert!(lazy.is_truthy().unwrap());
        assert_eq!(
            sink.drain()[0].message,
            "`old_arg` for `my_signal()` is scheduled to be deprecated in a future version of \
             MyProduct. To prepare, use `new_arg` instead."
        );
    }

    #[test]
    fn test_custom_message() {
        let (notifier, sink) = capture();
        let class_ref = WarningClass::pending("MyProduct").unwrap().into();
        let lazy = LazyValue::for_argument(
            notifier,
            class_ref,
            ArgumentNotice::new("my_signal()", "old_arg").message("`old_arg` is on its way out"),
            json!("x"),
        );

        lazy.force().unwrap();
        assert_eq!(sink.drain()[0].message, "`old_arg` is on its way out");
    }

    #[test]
    fn test_equality_and_ordering() {
        let (lazy, _sink) = wrapped(json!(10));
        assert!(lazy.eq_value(&json!(10)).unwrap());
        assert!(!lazy.eq_value(&json!(11)).unwrap());
        assert_eq!(
            lazy.partial_cmp_value(&json!(12)).unwrap(),
            Some(Ordering::Less)
        );
        assert_eq!(lazy.partial_cmp_value(&json!("12")).unwrap(), None);

        let (lazy, _sink) = wrapped(json!("beta"));
        assert_eq!(
            lazy.partial_cmp_value(&json!("alpha")).unwrap(),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn test_truthiness_conventions() {
        for (value, expected) in [
            (json!(null), false),
            (json!(0), false),
            (json!(2), true),
            (json!(""), false),
            (json!("x"), true),
            (json!([]), false),
            (json!([1]), true),
            (json!({}), false),
        ] {
            let (lazy, _sink) = wrapped(value.clone());
            assert_eq!(lazy.is_truthy().unwrap(), expected, "value: {value}");
        }
    }

    #[test]
    fn test_iteration() {
        let (lazy, sink) = wrapped(json!([1, 2, 3]));
        let items: Vec<Value> = lazy.iter_items().unwrap().collect();
        assert_eq!(items, vec![json!(1), json!(2), json!(3)]);
        assert_eq!(sink.len(), 1);

        let (lazy, _sink) = wrapped(json!({"a": 1, "b": 2}));
        let keys: Vec<Value> = lazy.iter_items().unwrap().collect();
        assert_eq!(keys, vec![json!("a"), json!("b")]);

        let (lazy, _sink) = wrapped(json!(42));
        let err = lazy.iter_items().unwrap_err();
        assert!(matches!(
            err,
            DeprecationError::UnsupportedOperation { op: "iterate", .. }
        ));
    }

    #[test]
    fn test_arithmetic() {
        let (lazy, _sink) = wrapped(json!(10));
        assert_eq!(lazy.sub(&json!(4)).unwrap(), json!(6));
        assert_eq!(lazy.mul(&json!(3)).unwrap(), json!(30));
        assert_eq!(lazy.div(&json!(4)).unwrap(), json!(2.5));

        let (lazy, _sink) = wrapped(json!("abc"));
        assert_eq!(lazy.add(&json!("def")).unwrap(), json!("abcdef"));

        let err = lazy.mul(&json!(2)).unwrap_err();
        assert!(matches!(
            err,
            DeprecationError::UnsupportedOperation { op: "multiply", .. }
        ));

        let (lazy, _sink) = wrapped(json!(1));
        let err = lazy.div(&json!(0)).unwrap_err();
        assert!(matches!(
            err,
            DeprecationError::UnsupportedOperation { op: "divide", .. }
        ));
    }

    #[test]
    fn test_failed_producer_replays_error() {
        let lazy = LazyValue::new(|| {
            Err(DeprecationError::Configuration(
                "broken producer".to_string(),
            ))
        });

        assert!(matches!(
            lazy.force().unwrap_err(),
            DeprecationError::Configuration(_)
        ));
        // The error is recorded, not retried.
        assert!(matches!(
            lazy.to_text().unwrap_err(),
            DeprecationError::Configuration(_)
        ));
        assert!(!lazy.is_resolved());
    }

    #[test]
    fn test_reentrant_observation_is_rejected() {
        use std::sync::OnceLock;

        static SLOT: OnceLock<Arc<LazyValue>> = OnceLock::new();

        let lazy = Arc::new(LazyValue::new(|| {
            if let Some(inner) = SLOT.get() {
                inner.force()?;
            }
            Ok(json!(1))
        }));
        SLOT.set(lazy.clone()).ok();

        let err = lazy.force().unwrap_err();
        assert!(matches!(err, DeprecationError::InvalidState(_)));
    }

    #[test]
    fn test_resolved_constructor_skips_producer() {
        let lazy = LazyValue::resolved(json!(7));
        assert!(lazy.is_resolved());
        assert_eq!(lazy.force().unwrap(), json!(7));
    }
}
