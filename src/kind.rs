//! Warning-kind taxonomy and warning-class descriptors.
//!
//! A warning class names one deprecation boundary of one product, e.g.
//! "removed in MyProduct 2.0" or "pending removal from MyProduct".

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::DeprecationError;

/// Default number of stack frames between the warning machinery and the
/// consumer call site being reported.
pub const DEFAULT_STACK_DEPTH: usize = 2;

/// The two severities a deprecation notice can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeprecationKind {
    /// Scheduled for removal at a known product version.
    Imminent,
    /// Obsolete and expected to be deprecated, with no version settled yet.
    Pending,
}

impl DeprecationKind {
    /// Stable lowercase name, as used in manifests and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeprecationKind::Imminent => "imminent",
            DeprecationKind::Pending => "pending",
        }
    }
}

impl fmt::Display for DeprecationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeprecationKind {
    type Err = DeprecationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "imminent" => Ok(DeprecationKind::Imminent),
            "pending" => Ok(DeprecationKind::Pending),
            other => Err(DeprecationError::IncompatibleKind {
                given: other.to_string(),
            }),
        }
    }
}

/// A deprecation warning class: kind, owning product, and (for imminent
/// classes) the version that removes the deprecated surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningClass {
    /// Severity of every notice emitted under this class
    pub kind: DeprecationKind,

    /// Product name shown in rendered messages
    pub product: String,

    /// Removal version; required for imminent classes
    #[serde(default)]
    pub version: Option<String>,
}

impl WarningClass {
    /// Build a validated warning class.
    pub fn new(
        kind: DeprecationKind,
        product: impl Into<String>,
        version: Option<String>,
    ) -> Result<Self, DeprecationError> {
        let class = Self {
            kind,
            product: product.into(),
            version,
        };
        class.validate()?;
        Ok(class)
    }

    /// Build an imminent class: removal is scheduled for `version`.
    pub fn imminent(
        product: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self, DeprecationError> {
        Self::new(DeprecationKind::Imminent, product, Some(version.into()))
    }

    /// Build a pending class: deprecation is expected but unscheduled.
    pub fn pending(product: impl Into<String>) -> Result<Self, DeprecationError> {
        Self::new(DeprecationKind::Pending, product, None)
    }

    /// Validate the descriptor.
    pub fn validate(&self) -> Result<(), DeprecationError> {
        if self.product.is_empty() {
            return Err(DeprecationError::Configuration(
                "warning class product cannot be empty".to_string(),
            ));
        }
        if self.kind == DeprecationKind::Imminent
            && self.version.as_deref().map_or(true, str::is_empty)
        {
            return Err(DeprecationError::Configuration(format!(
                "imminent warning class for {} must carry a removal version",
                self.product
            )));
        }
        Ok(())
    }
}

/// A warning class, either supplied directly or produced on demand.
///
/// Deferred references let a warning class live in a registry that is not
/// fully populated when the consuming surface is declared; the producer runs
/// once per emission.
#[derive(Clone)]
pub enum WarningClassRef {
    /// A concrete class, resolved at declaration time.
    Immediate(WarningClass),
    /// A producer invoked at each emission.
    Deferred(Arc<dyn Fn() -> WarningClass + Send + Sync>),
}

impl WarningClassRef {
    /// Wrap a producer that yields the class at emission time.
    pub fn deferred<F>(producer: F) -> Self
    where
        F: Fn() -> WarningClass + Send + Sync + 'static,
    {
        WarningClassRef::Deferred(Arc::new(producer))
    }

    /// Resolve to a concrete class.
    pub fn resolve(&self) -> WarningClass {
        match self {
            WarningClassRef::Immediate(class) => class.clone(),
            WarningClassRef::Deferred(producer) => producer(),
        }
    }
}

impl From<WarningClass> for WarningClassRef {
    fn from(class: WarningClass) -> Self {
        WarningClassRef::Immediate(class)
    }
}

impl fmt::Debug for WarningClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningClassRef::Immediate(class) => f.debug_tuple("Immediate").field(class).finish(),
            WarningClassRef::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}
