//! Sparse attachment options and the resolved, immutable policy.

use crate::error::RecentError;
use crate::guard::ConcurrencyGuard;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, LazyLock};

/// Default entry field name.
pub const DEFAULT_NAME: &str = "view";
/// Default timestamp field name.
pub const DEFAULT_TIMESTAMP_FIELD: &str = "date";
/// Default number of entries kept.
pub const DEFAULT_CAPACITY: i64 = 10;
/// Upper bound for optimistic retries.
pub const MAX_RETRIES_LIMIT: u32 = 32;

const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

static IDENTIFIER: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(IDENTIFIER_PATTERN));

/// Equality predicate deciding whether a candidate refreshes an existing entry.
pub type CompareFn<V> = Arc<dyn Fn(&V, &V) -> bool + Send + Sync>;

/// Style used to derive the list field and operation names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingStyle {
    /// `recentViews` / `addRecentView`.
    #[default]
    Camel,
    /// `recent_views` / `add_recent_view`.
    Snake,
}

/// Sparse attachment configuration. Unset fields take defaults at resolve time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecentOptions {
    /// Entry field holding the recorded value; also drives derived names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Entry field holding the last-touched time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_field: Option<String>,
    /// Maximum entries retained.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i64>,
    /// Record equal values as separate entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_duplicates: Option<bool>,
    /// Explicit list field name on the parent record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_field: Option<String>,
    /// Explicit generated operation name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    /// Naming style for derived names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub naming: Option<NamingStyle>,
    /// Concurrency guard for read-modify-write cycles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<ConcurrencyGuard>,
}

impl RecentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn timestamp_field(mut self, field: impl Into<String>) -> Self {
        self.timestamp_field = Some(field.into());
        self
    }

    pub fn capacity(mut self, capacity: i64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn allow_duplicates(mut self, allow: bool) -> Self {
        self.allow_duplicates = Some(allow);
        self
    }

    pub fn list_field(mut self, field: impl Into<String>) -> Self {
        self.list_field = Some(field.into());
        self
    }

    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    pub fn naming(mut self, naming: NamingStyle) -> Self {
        self.naming = Some(naming);
        self
    }

    pub fn concurrency(mut self, guard: ConcurrencyGuard) -> Self {
        self.concurrency = Some(guard);
        self
    }

    /// Merge field by field: values set on `self` win, the rest come from `base`.
    pub fn overlay(&self, base: &RecentOptions) -> RecentOptions {
        RecentOptions {
            name: self.name.clone().or_else(|| base.name.clone()),
            timestamp_field: self
                .timestamp_field
                .clone()
                .or_else(|| base.timestamp_field.clone()),
            capacity: self.capacity.or(base.capacity),
            allow_duplicates: self.allow_duplicates.or(base.allow_duplicates),
            list_field: self.list_field.clone().or_else(|| base.list_field.clone()),
            operation_name: self
                .operation_name
                .clone()
                .or_else(|| base.operation_name.clone()),
            naming: self.naming.or(base.naming),
            concurrency: self.concurrency.or(base.concurrency),
        }
    }
}

/// Fully resolved configuration for one attachment.
pub struct RecentPolicy<V> {
    entry_field: String,
    timestamp_field: String,
    capacity: NonZeroUsize,
    allow_duplicates: bool,
    list_field: String,
    operation_name: String,
    label: String,
    guard: ConcurrencyGuard,
    compare: CompareFn<V>,
}

impl<V: PartialEq + 'static> RecentPolicy<V> {
    /// Resolve options using `==` as the compare predicate.
    pub fn resolve(options: &RecentOptions) -> Result<Self, RecentError> {
        Self::resolve_with(options, |candidate: &V, existing: &V| candidate == existing)
    }
}

impl<V> RecentPolicy<V> {
    /// Resolve options with a custom compare predicate.
    pub fn resolve_with<F>(options: &RecentOptions, compare: F) -> Result<Self, RecentError>
    where
        F: Fn(&V, &V) -> bool + Send + Sync + 'static,
    {
        let name = options.name.as_deref().unwrap_or(DEFAULT_NAME);
        let timestamp_field = options
            .timestamp_field
            .as_deref()
            .unwrap_or(DEFAULT_TIMESTAMP_FIELD);
        let naming = options.naming.unwrap_or_default();
        let plural = pluralize(name);
        let list_field = options
            .list_field
            .clone()
            .unwrap_or_else(|| derive_list_field(&plural, naming));
        let operation_name = options
            .operation_name
            .clone()
            .unwrap_or_else(|| derive_operation_name(name, naming));
        let guard = options.concurrency.unwrap_or_default();

        let identifier = IDENTIFIER
            .as_ref()
            .map_err(|err| RecentError::config(format!("identifier pattern: {err}")))?;
        for (option, value) in [
            ("name", name),
            ("timestamp_field", timestamp_field),
            ("list_field", list_field.as_str()),
            ("operation_name", operation_name.as_str()),
        ] {
            if !identifier.is_match(value) {
                return Err(RecentError::config(format!(
                    "{option} must be an identifier, got {value:?}"
                )));
            }
        }
        if name == timestamp_field {
            return Err(RecentError::config(format!(
                "name and timestamp_field must differ (both {name:?})"
            )));
        }

        let capacity = resolve_capacity(options.capacity.unwrap_or(DEFAULT_CAPACITY))?;
        if let ConcurrencyGuard::Optimistic { max_retries } = guard
            && max_retries > MAX_RETRIES_LIMIT
        {
            return Err(RecentError::config(format!(
                "max_retries must be at most {MAX_RETRIES_LIMIT}, got {max_retries}"
            )));
        }

        Ok(Self {
            entry_field: name.to_string(),
            timestamp_field: timestamp_field.to_string(),
            capacity,
            allow_duplicates: options.allow_duplicates.unwrap_or(false),
            list_field,
            operation_name,
            label: format!("recent {plural}"),
            guard,
            compare: Arc::new(compare),
        })
    }

    pub fn entry_field(&self) -> &str {
        &self.entry_field
    }

    pub fn timestamp_field(&self) -> &str {
        &self.timestamp_field
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    pub fn allow_duplicates(&self) -> bool {
        self.allow_duplicates
    }

    pub fn list_field(&self) -> &str {
        &self.list_field
    }

    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    /// Human-readable name, for logs only.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn guard(&self) -> ConcurrencyGuard {
        self.guard
    }

    /// Whether `candidate` refers to the same item as `existing`.
    pub fn matches(&self, candidate: &V, existing: &V) -> bool {
        (self.compare)(candidate, existing)
    }
}

impl<V> fmt::Debug for RecentPolicy<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecentPolicy")
            .field("entry_field", &self.entry_field)
            .field("timestamp_field", &self.timestamp_field)
            .field("capacity", &self.capacity)
            .field("allow_duplicates", &self.allow_duplicates)
            .field("list_field", &self.list_field)
            .field("operation_name", &self.operation_name)
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

fn resolve_capacity(capacity: i64) -> Result<NonZeroUsize, RecentError> {
    usize::try_from(capacity)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| RecentError::config(format!("capacity must be positive, got {capacity}")))
}

fn pluralize(name: &str) -> String {
    if name.ends_with('s') {
        name.to_string()
    } else {
        format!("{name}s")
    }
}

fn upper_first(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn derive_list_field(plural: &str, naming: NamingStyle) -> String {
    match naming {
        NamingStyle::Camel => format!("recent{}", upper_first(plural)),
        NamingStyle::Snake => format!("recent_{plural}"),
    }
}

fn derive_operation_name(name: &str, naming: NamingStyle) -> String {
    match naming {
        NamingStyle::Camel => format!("addRecent{}", upper_first(name)),
        NamingStyle::Snake => format!("add_recent_{name}"),
    }
}
