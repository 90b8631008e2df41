//! Message templates and `%(name)s` interpolation.
//!
//! Every notice surface ships a template pair, one per warning kind. Callers
//! may override the pair with a single verbatim message.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::DeprecationError;
use crate::kind::DeprecationKind;

/// A template pair plus an optional caller override.
#[derive(Debug, Clone)]
pub struct MessageSpec {
    /// Template used for imminent notices
    pub imminent: String,

    /// Template used for pending notices
    pub pending: String,

    /// Caller-supplied message, used verbatim for either kind
    pub override_message: Option<String>,
}

impl MessageSpec {
    /// Build a spec from a template pair.
    pub fn new(imminent: impl Into<String>, pending: impl Into<String>) -> Self {
        Self {
            imminent: imminent.into(),
            pending: pending.into(),
            override_message: None,
        }
    }

    /// Attach a caller override; `None` leaves the templates in charge.
    pub fn with_override(mut self, message: Option<String>) -> Self {
        self.override_message = message;
        self
    }

    /// Select the text to render for `kind`. The override wins outright.
    pub fn template_for(&self, kind: DeprecationKind) -> &str {
        if let Some(message) = &self.override_message {
            return message;
        }
        match kind {
            DeprecationKind::Imminent => &self.imminent,
            DeprecationKind::Pending => &self.pending,
        }
    }
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"%%|%\((?P<name>[A-Za-z_][A-Za-z0-9_]*)\)s").expect("placeholder regex")
    })
}

/// Render the template selected by `kind` against `fields`.
pub fn render(
    kind: DeprecationKind,
    spec: &MessageSpec,
    fields: &HashMap<String, String>,
) -> Result<String, DeprecationError> {
    interpolate(spec.template_for(kind), fields)
}

/// Substitute `%(name)s` placeholders in `template` from `fields`.
///
/// `%%` renders as a literal percent sign; any other text passes through
/// untouched. A placeholder with no matching field is a configuration error
/// naming every missing field at once.
pub fn interpolate(
    template: &str,
    fields: &HashMap<String, String>,
) -> Result<String, DeprecationError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    let mut missing: Vec<&str> = Vec::new();

    for caps in placeholder_re().captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&template[last..whole.start()]);
        last = whole.end();

        if whole.as_str() == "%%" {
            out.push('%');
        } else if let Some(name) = caps.name("name") {
            match fields.get(name.as_str()) {
                Some(value) => out.push_str(value),
                None => missing.push(name.as_str()),
            }
        }
    }
    out.push_str(&template[last..]);

    if !missing.is_empty() {
        let names = missing
            .iter()
            .map(|name| format!("`{name}`"))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(DeprecationError::Configuration(format!(
            "message template {template:?} references missing field(s) {names}"
        )));
    }
    Ok(out)
}

/// Build an owned field map from borrowed pairs.
pub(crate) fn field_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}
