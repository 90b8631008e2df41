//! Caretaker
//!
//! Deprecation lifecycle management for library APIs: standardized notices
//! for functions, arguments, classes, and modules, with keyword-argument
//! migration and one declarative manifest per deprecation cycle.
//!
//! # Features
//!
//! - **Warning Classes**: one descriptor per deprecation boundary (kind,
//!   product, removal version)
//! - **Function Guards**: wrap deprecated or moved callables so every call
//!   notifies consumers
//! - **Keyword Migration**: rewrite legacy positional call sites onto
//!   keyword-only parameters, warning as they go
//! - **Lazy Argument Values**: values that warn on first observation, not
//!   when handed over
//! - **Class Lifecycles**: tracked families where direct subclasses are
//!   warned once and deeper descendants stay silent
//! - **Usage Tracking**: Prometheus metrics for notices by kind, product,
//!   and surface
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use caretaker::{CaptureSink, DeprecationNotifier, FunctionGuard, NoticeOptions, WarningClass};
//!
//! let sink = Arc::new(CaptureSink::default());
//! let notifier = DeprecationNotifier::with_sink(sink.clone());
//! let class = WarningClass::imminent("MyProduct", "2.0").unwrap();
//!
//! let old_add = FunctionGuard::deprecated(
//!     notifier,
//!     class.into(),
//!     "old_add()",
//!     NoticeOptions::default(),
//!     |(a, b): (i32, i32)| a + b,
//! );
//!
//! // The call still works; the notice lands in the sink.
//! assert_eq!(old_add.call((1, 2)).unwrap(), 3);
//! assert_eq!(sink.drain().len(), 1);
//! ```
//!
//! # Example Manifest
//!
//! ```yaml
//! product: Acme SDK
//! classes:
//!   - id: removed-in-3-0
//!     kind: imminent
//!     version: "3.0"
//!   - id: planned-removal
//!     kind: pending
//! ```

pub mod arguments;
pub mod classes;
pub mod error;
pub mod functions;
pub mod kind;
pub mod lazy;
pub mod manifest;
pub mod message;
pub mod metrics;
pub mod notify;

pub use arguments::{
    ArgumentMigrationEngine, CallArguments, CallableId, KeywordGuard, Param, ParamKind,
    Rewritten, Signature, SignatureShape,
};
pub use classes::{ClassDecl, ClassRegistry, FamilyVariant, LifecycleRole, RootTag};
pub use error::DeprecationError;
pub use functions::FunctionGuard;
pub use kind::{DeprecationKind, WarningClass, WarningClassRef, DEFAULT_STACK_DEPTH};
pub use lazy::{ArgumentNotice, LazyValue};
pub use manifest::{ClassEntry, DeprecationManifest};
pub use message::MessageSpec;
pub use metrics::NoticeMetrics;
pub use notify::{
    CaptureSink, DeprecationNotifier, EmittedWarning, NoticeOptions, TracingSink, WarningSink,
};
