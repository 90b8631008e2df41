//! Positional-to-keyword argument migration.
//!
//! Callables migrating parameters to keyword-only form keep accepting legacy
//! positional calls through [`KeywordGuard`]: offending call sites are
//! rewritten into keyword form and warned about, then forwarded unchanged.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::DeprecationError;
use crate::kind::WarningClassRef;
use crate::message::{self, MessageSpec};
use crate::notify::{DeprecationNotifier, NoticeOptions};

const MOVED_ONE_IMMINENT: &str = "Positional argument %(pos_args)s must be passed as a keyword \
     argument when calling `%(func_name)s`. Passing as a positional argument will be required \
     in %(product)s %(version)s.";
const MOVED_ONE_PENDING: &str = "Positional argument %(pos_args)s should be passed as a keyword \
     argument when calling `%(func_name)s`. Passing as a positional argument is scheduled to be \
     deprecated in a future version of %(product)s.";
const MOVED_MANY_IMMINENT: &str = "Positional arguments %(pos_args)s must be passed as keyword \
     arguments when calling `%(func_name)s`. Passing as positional arguments will be required \
     in %(product)s %(version)s.";
const MOVED_MANY_PENDING: &str = "Positional arguments %(pos_args)s should be passed as keyword \
     arguments when calling `%(func_name)s`. Passing as positional arguments is scheduled to be \
     deprecated in a future version of %(product)s.";

/// How a declared parameter binds at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Fills from position or from a keyword
    Positional,
    /// Must be supplied by keyword
    KeywordOnly,
    /// Catch-all for extra positional values
    VariadicPositional,
    /// Catch-all for extra keyword values
    VariadicKeyword,
}

/// One declared parameter.
#[derive(Debug, Clone)]
pub struct Param {
    /// Parameter name, as shown in notices
    pub name: String,

    /// Binding behavior
    pub kind: ParamKind,
}

impl Param {
    /// A positional-or-keyword parameter.
    pub fn positional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Positional,
        }
    }

    /// A keyword-only parameter.
    pub fn keyword_only(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::KeywordOnly,
        }
    }

    /// A variadic positional catch-all.
    pub fn variadic_positional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::VariadicPositional,
        }
    }

    /// A variadic keyword catch-all.
    pub fn variadic_keyword(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::VariadicKeyword,
        }
    }
}

/// A callable's declared parameters, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    params: Vec<Param>,
}

impl Signature {
    /// Declare a signature from an ordered parameter list.
    pub fn new(params: Vec<Param>) -> Self {
        Self { params }
    }

    /// The declared parameters.
    pub fn params(&self) -> &[Param] {
        &self.params
    }
}

/// The migration-relevant shape of a signature: named parameters in
/// declaration order (variadics excluded) and the index of the first
/// keyword-only parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureShape {
    param_names: Vec<String>,
    first_keyword_only: usize,
}

impl SignatureShape {
    /// Compute the shape of `signature`.
    ///
    /// Fails when no keyword-only parameter is declared; a guard over such a
    /// signature would have nothing to migrate.
    pub fn of(signature: &Signature) -> Result<Self, DeprecationError> {
        let mut param_names = Vec::new();
        let mut first_keyword_only = None;

        // Variadics never participate in the positional walk.
        for param in signature.params() {
            match param.kind {
                ParamKind::VariadicPositional | ParamKind::VariadicKeyword => continue,
                ParamKind::KeywordOnly => {
                    if first_keyword_only.is_none() {
                        first_keyword_only = Some(param_names.len());
                    }
                    param_names.push(param.name.clone());
                }
                ParamKind::Positional => param_names.push(param.name.clone()),
            }
        }

        let first_keyword_only = first_keyword_only.ok_or_else(|| {
            DeprecationError::Shape(
                "keyword-argument migration requires at least one keyword-only parameter"
                    .to_string(),
            )
        })?;

        Ok(Self {
            param_names,
            first_keyword_only,
        })
    }

    /// Named parameters in declaration order.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Index of the first keyword-only parameter within `param_names`.
    pub fn first_keyword_only(&self) -> usize {
        self.first_keyword_only
    }
}

/// Stable identity for a wrapped callable, keying the shape cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallableId(u64);

impl CallableId {
    /// Allocate a fresh process-unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Positional and keyword arguments crossing a dynamic call boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct CallArguments<V> {
    /// Values bound by position
    pub positional: Vec<V>,

    /// Values bound by name
    pub keyword: HashMap<String, V>,
}

impl<V> Default for CallArguments<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> CallArguments<V> {
    /// An empty argument set.
    pub fn new() -> Self {
        Self {
            positional: Vec::new(),
            keyword: HashMap::new(),
        }
    }

    /// Arguments bound entirely by position.
    pub fn from_positional(positional: Vec<V>) -> Self {
        Self {
            positional,
            keyword: HashMap::new(),
        }
    }

    /// Add one keyword argument.
    pub fn with_keyword(mut self, name: impl Into<String>, value: V) -> Self {
        self.keyword.insert(name.into(), value);
        self
    }
}

/// Outcome of a call-site rewrite.
#[derive(Debug, Clone, PartialEq)]
pub struct Rewritten<V> {
    /// The arguments to forward to the wrapped callable
    pub arguments: CallArguments<V>,

    /// Names moved from positional to keyword form, in declaration order
    pub moved: Vec<String>,
}

/// Rewrite `arguments` against `shape`.
///
/// Positional values overflowing into keyword-only territory are rebound to
/// their declared names; slots already satisfied by a keyword are skipped;
/// positional values beyond the named parameters are left positional for a
/// variadic catch-all. Calls supplying at most `first_keyword_only`
/// positional values come back untouched with an empty `moved` list.
pub fn rewrite<V>(shape: &SignatureShape, arguments: CallArguments<V>) -> Rewritten<V> {
    if arguments.positional.len() <= shape.first_keyword_only() {
        return Rewritten {
            arguments,
            moved: Vec::new(),
        };
    }

    let CallArguments {
        positional,
        keyword,
    } = arguments;

    let mut new_positional = Vec::with_capacity(shape.first_keyword_only());
    let mut new_keyword = keyword;
    let mut moved = Vec::new();
    let mut remaining = positional.into_iter();
    let mut consumed = 0;

    for name in shape.param_names() {
        if new_keyword.contains_key(name) {
            // Slot already satisfied by a keyword argument.
            continue;
        }
        let Some(value) = remaining.next() else { break };
        if consumed < shape.first_keyword_only() {
            new_positional.push(value);
        } else {
            new_keyword.insert(name.clone(), value);
            moved.push(name.clone());
        }
        consumed += 1;
    }

    // Anything left belongs to a variadic positional parameter.
    new_positional.extend(remaining);

    Rewritten {
        arguments: CallArguments {
            positional: new_positional,
            keyword: new_keyword,
        },
        moved,
    }
}

/// Signature cache plus the notice plumbing for call-site rewrites.
pub struct ArgumentMigrationEngine {
    notifier: DeprecationNotifier,
    shapes: Mutex<HashMap<CallableId, Arc<SignatureShape>>>,
}

impl ArgumentMigrationEngine {
    /// Engine emitting through `notifier`.
    pub fn new(notifier: DeprecationNotifier) -> Self {
        Self {
            notifier,
            shapes: Mutex::new(HashMap::new()),
        }
    }

    /// Compute or fetch the cached shape for `id`.
    ///
    /// The first call inspects `signature`; later calls return the cached
    /// shape without re-inspection. Shapes are deterministic, so a racing
    /// double-compute is harmless and the cache is never invalidated.
    pub fn prepare(
        &self,
        id: CallableId,
        signature: &Signature,
    ) -> Result<Arc<SignatureShape>, DeprecationError> {
        if let Some(shape) = self.lock().get(&id) {
            return Ok(Arc::clone(shape));
        }

        let shape = Arc::new(SignatureShape::of(signature)?);
        Ok(Arc::clone(
            self.lock().entry(id).or_insert(shape),
        ))
    }

    /// Wrap `inner` so legacy positional call sites keep working while being
    /// warned toward keyword form.
    ///
    /// The signature is inspected here, so a shape with no keyword-only
    /// parameters fails at wrap time rather than on first call.
    pub fn guard<F>(
        &self,
        class_ref: WarningClassRef,
        func_name: impl Into<String>,
        signature: Signature,
        opts: NoticeOptions,
        inner: F,
    ) -> Result<KeywordGuard<F>, DeprecationError> {
        let id = CallableId::next();
        let shape = self.prepare(id, &signature)?;
        Ok(KeywordGuard {
            notifier: self.notifier.clone(),
            id,
            shape,
            class_ref,
            func_name: func_name.into(),
            opts,
            inner,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CallableId, Arc<SignatureShape>>> {
        self.shapes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A wrapped callable whose positional call sites are being migrated to
/// keyword form.
pub struct KeywordGuard<F> {
    notifier: DeprecationNotifier,
    id: CallableId,
    shape: Arc<SignatureShape>,
    class_ref: WarningClassRef,
    func_name: String,
    opts: NoticeOptions,
    inner: F,
}

impl<F> std::fmt::Debug for KeywordGuard<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordGuard")
            .field("id", &self.id)
            .field("shape", &self.shape)
            .field("class_ref", &self.class_ref)
            .field("func_name", &self.func_name)
            .field("opts", &self.opts)
            .finish_non_exhaustive()
    }
}

impl<F> KeywordGuard<F> {
    /// Cache identity of the wrapped callable.
    pub fn id(&self) -> CallableId {
        self.id
    }

    /// The wrapped callable's display name.
    pub fn func_name(&self) -> &str {
        &self.func_name
    }

    /// The cached signature shape.
    pub fn shape(&self) -> &SignatureShape {
        &self.shape
    }

    /// Invoke the wrapped callable.
    ///
    /// Arguments are rewritten first; when any value crossed from positional
    /// to keyword form, one notice names every moved parameter before the
    /// call is forwarded. The return value is the callable's own.
    pub fn call<V, R>(&self, arguments: CallArguments<V>) -> Result<R, DeprecationError>
    where
        F: Fn(CallArguments<V>) -> R,
    {
        let rewritten = rewrite(&self.shape, arguments);

        if !rewritten.moved.is_empty() {
            let pos_args = rewritten
                .moved
                .iter()
                .map(|name| format!("`{name}`"))
                .collect::<Vec<_>>()
                .join(", ");
            let (imminent, pending) = if rewritten.moved.len() == 1 {
                (MOVED_ONE_IMMINENT, MOVED_ONE_PENDING)
            } else {
                (MOVED_MANY_IMMINENT, MOVED_MANY_PENDING)
            };
            let spec =
                MessageSpec::new(imminent, pending).with_override(self.opts.message.clone());
            self.notifier.emit_surface(
                "keyword_migration",
                &self.class_ref,
                &spec,
                message::field_map(&[
                    ("func_name", self.func_name.as_str()),
                    ("pos_args", pos_args.as_str()),
                ]),
                // Factor in this wrapper.
                self.opts.stack_depth + 1,
            )?;
        }

        Ok((self.inner)(rewritten.arguments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{WarningClass, DEFAULT_STACK_DEPTH};
    use crate::notify::CaptureSink;

    fn abc_signature() -> Signature {
        // Mirrors a callable declared as (a, *, b, c=1).
        Signature::new(vec![
            Param::positional("a"),
            Param::keyword_only("b"),
            Param::keyword_only("c"),
        ])
    }

    fn capture_engine() -> (ArgumentMigrationEngine, Arc<CaptureSink>) {
        let sink = Arc::new(CaptureSink::default());
        let notifier = DeprecationNotifier::with_sink(sink.clone());
        (ArgumentMigrationEngine::new(notifier), sink)
    }

    fn imminent_ref() -> WarningClassRef {
        WarningClass::imminent("MyProduct", "2.0").unwrap().into()
    }

    #[test]
    fn test_shape_of_signature() {
        let shape = SignatureShape::of(&abc_signature()).unwrap();
        assert_eq!(shape.param_names(), ["a", "b", "c"]);
        assert_eq!(shape.first_keyword_only(), 1);
    }

    #[test]
    fn test_shape_skips_variadics() {
        let signature = Signature::new(vec![
            Param::positional("a"),
            Param::variadic_positional("args"),
            Param::keyword_only("b"),
            Param::variadic_keyword("kwargs"),
        ]);
        let shape = SignatureShape::of(&signature).unwrap();
        assert_eq!(shape.param_names(), ["a", "b"]);
        assert_eq!(shape.first_keyword_only(), 1);
    }

    #[test]
    fn test_shape_requires_keyword_only_param() {
        let signature = Signature::new(vec![Param::positional("a"), Param::positional("b")]);
        let err = SignatureShape::of(&signature).unwrap_err();
        assert!(matches!(err, DeprecationError::Shape(_)));
    }

    #[test]
    fn test_rewrite_moves_overflow_to_keywords() {
        let shape = SignatureShape::of(&abc_signature()).unwrap();
        let result = rewrite(&shape, CallArguments::from_positional(vec![1, 2, 3]));

        assert_eq!(result.arguments.positional, vec![1]);
        assert_eq!(result.arguments.keyword.get("b"), Some(&2));
        assert_eq!(result.arguments.keyword.get("c"), Some(&3));
        assert_eq!(result.moved, ["b", "c"]);
    }

    #[test]
    fn test_rewrite_skips_slots_satisfied_by_keyword() {
        let shape = SignatureShape::of(&abc_signature()).unwrap();
        let arguments = CallArguments::from_positional(vec![1, 2]).with_keyword("c", 3);
        let result = rewrite(&shape, arguments);

        assert_eq!(result.arguments.positional, vec![1]);
        assert_eq!(result.arguments.keyword.get("b"), Some(&2));
        assert_eq!(result.arguments.keyword.get("c"), Some(&3));
        assert_eq!(result.moved, ["b"]);
    }

    #[test]
    fn test_rewrite_within_boundary_is_untouched() {
        let shape = SignatureShape::of(&abc_signature()).unwrap();
        let arguments = CallArguments::from_positional(vec![1])
            .with_keyword("b", 2)
            .with_keyword("c", 3);
        let result = rewrite(&shape, arguments.clone());

        assert_eq!(result.arguments, arguments);
        assert!(result.moved.is_empty());
    }

    #[test]
    fn test_rewrite_leaves_variadic_tail_positional() {
        // (a, *rest, b): overflow past the named slots stays positional.
        let signature = Signature::new(vec![
            Param::positional("a"),
            Param::variadic_positional("rest"),
            Param::keyword_only("b"),
        ]);
        let shape = SignatureShape::of(&signature).unwrap();

        let result = rewrite(&shape, CallArguments::from_positional(vec![1, 2, 3, 4]));
        assert_eq!(result.arguments.positional, vec![1, 3, 4]);
        assert_eq!(result.arguments.keyword.get("b"), Some(&2));
        assert_eq!(result.moved, ["b"]);

        // With `b` already a keyword, nothing moves and the tail is intact.
        let arguments = CallArguments::from_positional(vec![1, 2, 3]).with_keyword("b", 9);
        let result = rewrite(&shape, arguments);
        assert_eq!(result.arguments.positional, vec![1, 2, 3]);
        assert!(result.moved.is_empty());
    }

    #[test]
    fn test_prepare_caches_shape_per_callable() {
        let (engine, _sink) = capture_engine();
        let id = CallableId::next();

        let first = engine.prepare(id, &abc_signature()).unwrap();
        // A differing signature for the same id is ignored: the cache wins.
        let second = engine
            .prepare(id, &Signature::new(vec![Param::keyword_only("z")]))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let other = engine.prepare(CallableId::next(), &abc_signature()).unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(*first, *other);
    }

    #[test]
    fn test_guard_rejects_shape_without_keyword_only() {
        let (engine, _sink) = capture_engine();
        let signature = Signature::new(vec![Param::positional("a")]);
        let err = engine
            .guard(
                imminent_ref(),
                "my_func()",
                signature,
                NoticeOptions::default(),
                |args: CallArguments<i64>| args.positional.len(),
            )
            .unwrap_err();
        assert!(matches!(err, DeprecationError::Shape(_)));
    }

    #[test]
    fn test_guard_warns_and_preserves_result() {
        let (engine, sink) = capture_engine();
        let guard = engine
            .guard(
                imminent_ref(),
                "my_func()",
                abc_signature(),
                NoticeOptions::default(),
                |args: CallArguments<i64>| {
                    let a = args.positional[0];
                    let b = args.keyword["b"];
                    let c = args.keyword.get("c").copied().unwrap_or(1);
                    a + b + c
                },
            )
            .unwrap();

        // Legacy call: my_func(1, 2, c=3).
        let arguments = CallArguments::from_positional(vec![1, 2]).with_keyword("c", 3);
        assert_eq!(guard.call(arguments).unwrap(), 6);

        let warnings = sink.drain();
        assert_eq!(warnings.len(), 1);
        assert_eq!(
            warnings[0].message,
            "Positional argument `b` must be passed as a keyword argument when calling \
             `my_func()`. Passing as a positional argument will be required in MyProduct 2.0."
        );
        // Wrapper frame plus gateway frame.
        assert_eq!(warnings[0].stack_depth, DEFAULT_STACK_DEPTH + 2);
    }

    #[test]
    fn test_guard_is_silent_for_keyword_calls() {
        let (engine, sink) = capture_engine();
        let guard = engine
            .guard(
                imminent_ref(),
                "my_func()",
                abc_signature(),
                NoticeOptions::default(),
                |args: CallArguments<i64>| {
                    args.positional[0] + args.keyword["b"] + args.keyword["c"]
                },
            )
            .unwrap();

        let arguments = CallArguments::from_positional(vec![1])
            .with_keyword("b", 2)
            .with_keyword("c", 3);
        assert_eq!(guard.call(arguments).unwrap(), 6);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_guard_names_every_moved_parameter() {
        let (engine, sink) = capture_engine();
        let guard = engine
            .guard(
                imminent_ref(),
                "my_func()",
                abc_signature(),
                NoticeOptions::default(),
                |_: CallArguments<i64>| (),
            )
            .unwrap();

        guard
            .call(CallArguments::from_positional(vec![1, 2, 3]))
            .unwrap();

        let warnings = sink.drain();
        assert!(warnings[0]
            .message
            .starts_with("Positional arguments `b`, `c` must be passed as keyword arguments"));
    }

    #[test]
    fn test_guard_pending_wording() {
        let (engine, sink) = capture_engine();
        let pending: WarningClassRef = WarningClass::pending("MyProduct").unwrap().into();
        let guard = engine
            .guard(
                pending,
                "my_func()",
                abc_signature(),
                NoticeOptions::default(),
                |_: CallArguments<i64>| (),
            )
            .unwrap();

        guard
            .call(CallArguments::from_positional(vec![1, 2]))
            .unwrap();

        let warnings = sink.drain();
        assert_eq!(
            warnings[0].message,
            "Positional argument `b` should be passed as a keyword argument when calling \
             `my_func()`. Passing as a positional argument is scheduled to be deprecated in a \
             future version of MyProduct."
        );
    }

    #[test]
    fn test_guard_custom_message() {
        let (engine, sink) = capture_engine();
        let guard = engine
            .guard(
                imminent_ref(),
                "my_func()",
                abc_signature(),
                NoticeOptions::default().message("use keywords for `%(func_name)s`"),
                |_: CallArguments<i64>| (),
            )
            .unwrap();

        guard
            .call(CallArguments::from_positional(vec![1, 2]))
            .unwrap();
        assert_eq!(sink.drain()[0].message, "use keywords for `my_func()`");
    }

    #[test]
    fn test_guard_exposes_wrapped_state() {
        let (engine, _sink) = capture_engine();
        let guard = engine
            .guard(
                imminent_ref(),
                "my_func()",
                abc_signature(),
                NoticeOptions::default(),
                |_: CallArguments<i64>| (),
            )
            .unwrap();

        assert_eq!(guard.func_name(), "my_func()");
        assert_eq!(guard.shape().first_keyword_only(), 1);
    }
}
