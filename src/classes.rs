//! Class-lifecycle tracking for deprecated type families.
//!
//! A host type system routes its class declarations and instantiations
//! through a [`ClassRegistry`]. A class declaring a [`RootTag`] roots a
//! deprecated family; classes directly subclassing a root are warned once at
//! declaration time, deeper descendants join the family silently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::error::DeprecationError;
use crate::kind::{WarningClassRef, DEFAULT_STACK_DEPTH};
use crate::message::{self, MessageSpec};
use crate::notify::DeprecationNotifier;

const SUBCLASS_IMMINENT: &str = "`%(subclass_name)s` subclasses `%(class_name)s`, which is \
     deprecated and will be removed in %(product)s %(version)s.";
const SUBCLASS_PENDING: &str = "`%(subclass_name)s` subclasses `%(class_name)s`, which is \
     scheduled to be deprecated in a future version of %(product)s.";
const INIT_IMMINENT: &str = "`%(class_name)s` is deprecated and will be removed in %(product)s \
     %(version)s.";
const INIT_PENDING: &str = "`%(class_name)s` is scheduled to be deprecated in a future version \
     of %(product)s.";

const MOVED_SUBCLASS_IMMINENT: &str = "`%(subclass_name)s` subclasses `%(old_class_name)s`, \
     which is deprecated and will be removed in %(product)s %(version)s. You will need to \
     subclass `%(new_class_name)s` instead.";
const MOVED_SUBCLASS_PENDING: &str = "`%(subclass_name)s` subclasses `%(old_class_name)s`, \
     which is scheduled to be deprecated in a future version of %(product)s. To prepare, \
     subclass `%(new_class_name)s` instead.";
const MOVED_INIT_IMMINENT: &str = "`%(old_class_name)s` is deprecated and will be removed in \
     %(product)s %(version)s. You will need to use %(new_class_name)s instead.";
const MOVED_INIT_PENDING: &str = "`%(old_class_name)s` is scheduled to be deprecated in a \
     future version of %(product)s. To prepare, use %(new_class_name)s instead.";

/// Which story a deprecated family tells its consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyVariant {
    /// The root class is going away
    Deprecated,
    /// The root class has a designated replacement
    Moved,
}

/// Role a declared class plays within a deprecated family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleRole {
    /// Declared the family; instantiation warns
    Rooted,
    /// Direct subclass of a root; warned once at declaration
    Notified,
    /// Deeper descendant; tracked but never warned
    Silent,
}

/// Declaration-time configuration a class supplies to root a family.
#[derive(Debug, Clone)]
pub struct RootTag {
    /// Warning class for every notice in the family; must be supplied
    pub warning_class: Option<WarningClassRef>,

    /// The story the family tells
    pub variant: FamilyVariant,

    /// Custom message for direct-subclass notices
    pub subclass_message: Option<String>,

    /// Custom message for instantiation notices
    pub init_message: Option<String>,

    /// Replacement class name for moved families; defaults to the root's
    /// last immediate parent
    pub target_class: Option<String>,
}

impl RootTag {
    /// Root a family whose classes are going away.
    pub fn deprecated(warning_class: WarningClassRef) -> Self {
        Self {
            warning_class: Some(warning_class),
            variant: FamilyVariant::Deprecated,
            subclass_message: None,
            init_message: None,
            target_class: None,
        }
    }

    /// Root a family whose classes moved to a replacement.
    pub fn moved(warning_class: WarningClassRef) -> Self {
        Self {
            variant: FamilyVariant::Moved,
            ..Self::deprecated(warning_class)
        }
    }

    /// Custom message for direct-subclass notices.
    pub fn subclass_message(mut self, message: impl Into<String>) -> Self {
        self.subclass_message = Some(message.into());
        self
    }

    /// Custom message for instantiation notices.
    pub fn init_message(mut self, message: impl Into<String>) -> Self {
        self.init_message = Some(message.into());
        self
    }

    /// Name the replacement class explicitly.
    pub fn target_class(mut self, name: impl Into<String>) -> Self {
        self.target_class = Some(name.into());
        self
    }
}

/// One class declaration passing through the registry.
#[derive(Debug, Clone)]
pub struct ClassDecl {
    /// Display name of the class being declared
    pub name: String,

    /// Immediate parent names, in declaration order
    pub parents: Vec<String>,

    /// Present when this class roots a deprecated family
    pub root: Option<RootTag>,

    /// Opt out of the direct-subclass notice for this class
    pub skip_subclass_warning: bool,
}

impl ClassDecl {
    /// Declare a class with no parents.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parents: Vec::new(),
            root: None,
            skip_subclass_warning: false,
        }
    }

    /// Append an immediate parent.
    pub fn with_parent(mut self, name: impl Into<String>) -> Self {
        self.parents.push(name.into());
        self
    }

    /// Root a deprecated family at this class.
    pub fn rooted(mut self, tag: RootTag) -> Self {
        self.root = Some(tag);
        self
    }

    /// Suppress the direct-subclass notice.
    pub fn skip_warning(mut self) -> Self {
        self.skip_subclass_warning = true;
        self
    }
}

enum FamilyStory {
    Deprecated,
    Moved { target_class: String },
}

/// Shared state of one deprecated family, established at its root.
struct FamilyState {
    base_class: String,
    class_ref: WarningClassRef,
    story: FamilyStory,
    subclass_message: Option<String>,
    init_message: Option<String>,
}

struct Membership {
    role: LifecycleRole,
    family: Arc<FamilyState>,
}

struct ClassRecord {
    membership: Option<Membership>,
}

/// Tracks declared classes and their deprecated-family memberships.
pub struct ClassRegistry {
    notifier: DeprecationNotifier,
    classes: Mutex<HashMap<String, ClassRecord>>,
}

impl ClassRegistry {
    /// Registry emitting through `notifier`.
    pub fn new(notifier: DeprecationNotifier) -> Self {
        Self {
            notifier,
            classes: Mutex::new(HashMap::new()),
        }
    }

    /// Run one class declaration through the lifecycle pipeline.
    ///
    /// Rooting declarations are validated and recorded. A declaration whose
    /// direct parent is a family root is warned about (unless it opts out)
    /// and recorded as notified; deeper descendants are recorded silently.
    /// A declaration that fails here leaves no record behind.
    pub fn declare(&self, decl: ClassDecl) -> Result<(), DeprecationError> {
        let ClassDecl {
            name,
            parents,
            root,
            skip_subclass_warning,
        } = decl;

        let membership = {
            let classes = self.lock();
            if classes.contains_key(&name) {
                return Err(DeprecationError::InvalidState(format!(
                    "class `{name}` is already declared"
                )));
            }

            if let Some(tag) = root {
                // A root may not also descend from an existing family.
                if let Some(parent) = parents
                    .iter()
                    .find(|p| classes.get(*p).is_some_and(|r| r.membership.is_some()))
                {
                    return Err(DeprecationError::Configuration(format!(
                        "`{name}` cannot root a deprecated family: it already descends from \
                         one through `{parent}`"
                    )));
                }

                let class_ref = tag.warning_class.ok_or_else(|| {
                    DeprecationError::Configuration(format!(
                        "a warning class must be supplied when declaring `{name}` as deprecated"
                    ))
                })?;

                let story = match tag.variant {
                    FamilyVariant::Deprecated => FamilyStory::Deprecated,
                    FamilyVariant::Moved => {
                        let target_class = tag
                            .target_class
                            .or_else(|| parents.last().cloned())
                            .ok_or_else(|| {
                                DeprecationError::Configuration(format!(
                                    "moved class `{name}` needs a target class or at least \
                                     one parent to point consumers at"
                                ))
                            })?;
                        FamilyStory::Moved { target_class }
                    }
                };

                debug!(class = %name, "class roots a deprecated family");
                if let Some(metrics) = self.notifier.metrics() {
                    metrics.record_family_tracked();
                }

                Some(Membership {
                    role: LifecycleRole::Rooted,
                    family: Arc::new(FamilyState {
                        base_class: name.clone(),
                        class_ref,
                        story,
                        subclass_message: tag.subclass_message,
                        init_message: tag.init_message,
                    }),
                })
            } else {
                // First rooted parent wins; otherwise the class silently
                // follows the first family found among its parents.
                let first_family = |pred: fn(LifecycleRole) -> bool| {
                    parents.iter().find_map(|p| {
                        classes
                            .get(p)
                            .and_then(|r| r.membership.as_ref())
                            .filter(|m| pred(m.role))
                            .map(|m| Arc::clone(&m.family))
                    })
                };

                if let Some(family) = first_family(|role| role == LifecycleRole::Rooted) {
                    Some(Membership {
                        role: LifecycleRole::Notified,
                        family,
                    })
                } else {
                    first_family(|_| true).map(|family| Membership {
                        role: LifecycleRole::Silent,
                        family,
                    })
                }
            }
        };

        // Emit outside the lock: a deferred warning-class producer may call
        // back into this registry.
        if let Some(m) = &membership {
            if m.role == LifecycleRole::Notified && !skip_subclass_warning {
                self.emit_subclass_notice(&m.family, &name)?;
            }
            if m.role == LifecycleRole::Silent {
                debug!(class = %name, base = %m.family.base_class,
                       "descendant joins deprecated family silently");
            }
        }

        self.lock().insert(name, ClassRecord { membership });
        Ok(())
    }

    /// Hook for the construction pipeline: `name` was just instantiated.
    ///
    /// Only instantiating a family root warns; subclasses construct quietly.
    /// Unknown names are ignored.
    pub fn instantiated(&self, name: &str) -> Result<(), DeprecationError> {
        let family = {
            let classes = self.lock();
            match classes.get(name).and_then(|r| r.membership.as_ref()) {
                Some(m) if m.role == LifecycleRole::Rooted => Arc::clone(&m.family),
                _ => return Ok(()),
            }
        };

        let (spec, fields) = match &family.story {
            FamilyStory::Deprecated => (
                MessageSpec::new(INIT_IMMINENT, INIT_PENDING),
                message::field_map(&[("class_name", family.base_class.as_str())]),
            ),
            FamilyStory::Moved { target_class } => (
                MessageSpec::new(MOVED_INIT_IMMINENT, MOVED_INIT_PENDING),
                message::field_map(&[
                    ("old_class_name", family.base_class.as_str()),
                    ("new_class_name", target_class.as_str()),
                ]),
            ),
        };
        let spec = spec.with_override(family.init_message.clone());

        self.notifier.emit_surface(
            "init",
            &family.class_ref,
            &spec,
            fields,
            DEFAULT_STACK_DEPTH,
        )
    }

    /// The family role of `name`, if it belongs to one.
    pub fn role(&self, name: &str) -> Option<LifecycleRole> {
        self.lock()
            .get(name)
            .and_then(|r| r.membership.as_ref())
            .map(|m| m.role)
    }

    /// Whether `name` has passed through [`declare`](Self::declare).
    pub fn is_declared(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    fn emit_subclass_notice(
        &self,
        family: &FamilyState,
        subclass_name: &str,
    ) -> Result<(), DeprecationError> {
        let (spec, fields) = match &family.story {
            FamilyStory::Deprecated => (
                MessageSpec::new(SUBCLASS_IMMINENT, SUBCLASS_PENDING),
                message::field_map(&[
                    ("class_name", family.base_class.as_str()),
                    ("subclass_name", subclass_name),
                ]),
            ),
            FamilyStory::Moved { target_class } => (
                MessageSpec::new(MOVED_SUBCLASS_IMMINENT, MOVED_SUBCLASS_PENDING),
                message::field_map(&[
                    ("old_class_name", family.base_class.as_str()),
                    ("new_class_name", target_class.as_str()),
                    ("subclass_name", subclass_name),
                ]),
            ),
        };
        let spec = spec.with_override(family.subclass_message.clone());

        self.notifier.emit_surface(
            "subclass",
            &family.class_ref,
            &spec,
            fields,
            DEFAULT_STACK_DEPTH,
        )
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ClassRecord>> {
        self.classes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
