//! Record schema augmentation for recency attachments.

use crate::error::RecentError;
use crate::policy::RecentPolicy;
use chrono::DateTime;
use log::debug;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Type of a schema field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    /// RFC 3339 timestamp string.
    Timestamp,
    /// Opaque identifier, string or integer.
    Id,
    /// Embedded object with named fields.
    Object(BTreeMap<String, FieldDef>),
    Array(Box<FieldType>),
    /// Recency list declared by an attachment.
    RecentList {
        entry_field: String,
        entry_type: Box<FieldType>,
        timestamp_field: String,
    },
}

impl FieldType {
    /// Object type from `(name, field)` pairs.
    pub fn object<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldDef)>,
        K: Into<String>,
    {
        Self::Object(
            fields
                .into_iter()
                .map(|(name, def)| (name.into(), def))
                .collect(),
        )
    }

    /// Check `value` against this type, filling object field defaults.
    /// Null passes for every type.
    pub fn conform(&self, value: Value) -> Result<Value, String> {
        if value.is_null() {
            return Ok(value);
        }
        match self {
            Self::String => expect(value, Value::is_string, "string"),
            Self::Integer => expect(value, |v| v.is_i64() || v.is_u64(), "integer"),
            Self::Float => expect(value, Value::is_number, "number"),
            Self::Boolean => expect(value, Value::is_boolean, "boolean"),
            Self::Id => expect(
                value,
                |v| v.as_str().is_some_and(|id| !id.is_empty()) || v.is_i64() || v.is_u64(),
                "identifier",
            ),
            Self::Timestamp => expect(
                value,
                |v| {
                    v.as_str()
                        .is_some_and(|stamp| DateTime::parse_from_rfc3339(stamp).is_ok())
                },
                "RFC 3339 timestamp",
            ),
            Self::Array(items) | Self::RecentList { entry_type: items, .. } => {
                let values = match value {
                    Value::Array(values) => values,
                    other => return Err(format!("expected array, got {other}")),
                };
                if matches!(self, Self::RecentList { .. }) {
                    return Ok(Value::Array(values));
                }
                values
                    .into_iter()
                    .map(|item| items.conform(item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            Self::Object(fields) => {
                let mut object = match value {
                    Value::Object(object) => object,
                    other => return Err(format!("expected object, got {other}")),
                };
                for (name, def) in fields {
                    match object.remove(name) {
                        Some(field) => {
                            let field = def
                                .ty
                                .conform(field)
                                .map_err(|err| format!("{name}: {err}"))?;
                            object.insert(name.clone(), field);
                        }
                        None => {
                            if let Some(default) = &def.default {
                                object.insert(name.clone(), default.clone());
                            }
                        }
                    }
                }
                Ok(Value::Object(object))
            }
        }
    }
}

fn expect(value: Value, check: impl Fn(&Value) -> bool, kind: &str) -> Result<Value, String> {
    if check(&value) {
        Ok(value)
    } else {
        Err(format!("expected {kind}, got {value}"))
    }
}

/// Field definition: a type and an optional default value.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub ty: FieldType,
    pub default: Option<Value>,
}

impl FieldDef {
    pub fn new(ty: FieldType) -> Self {
        Self { ty, default: None }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Everything schema augmentation needs to know about one attachment.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentDeclaration {
    pub list_field: String,
    pub entry_field: String,
    pub entry_type: FieldType,
    pub timestamp_field: String,
    pub operation_name: String,
}

impl AttachmentDeclaration {
    pub fn from_policy<V>(policy: &RecentPolicy<V>, entry_type: FieldType) -> Self {
        Self {
            list_field: policy.list_field().to_string(),
            entry_field: policy.entry_field().to_string(),
            entry_type,
            timestamp_field: policy.timestamp_field().to_string(),
            operation_name: policy.operation_name().to_string(),
        }
    }
}

/// Effect of [`RecordSchema::augment`] on the field table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Augmentation {
    /// The list field was added.
    Added,
    /// A field with that name already existed and was left untouched.
    Existing,
}

/// Named fields of a record type plus the operations generated for it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSchema {
    fields: BTreeMap<String, FieldDef>,
    operations: BTreeMap<String, String>,
}

impl RecordSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field, builder style.
    pub fn with_field(mut self, name: impl Into<String>, def: FieldDef) -> Self {
        self.fields.insert(name.into(), def);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldDef)> {
        self.fields.iter().map(|(name, def)| (name.as_str(), def))
    }

    /// List field targeted by a generated operation.
    pub fn operation_target(&self, operation: &str) -> Option<&str> {
        self.operations.get(operation).map(String::as_str)
    }

    pub fn operations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.operations
            .iter()
            .map(|(operation, field)| (operation.as_str(), field.as_str()))
    }

    /// Default values of all fields that declare one.
    pub fn defaults(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .filter_map(|(name, def)| def.default.clone().map(|value| (name.clone(), value)))
            .collect()
    }

    /// Add the attachment's list field and register its operation.
    ///
    /// An existing field of the same name keeps its definition. Registering an
    /// operation name twice, or binding a list field that another attachment
    /// already owns, is an error.
    pub fn augment(
        &mut self,
        declaration: &AttachmentDeclaration,
    ) -> Result<Augmentation, RecentError> {
        if let FieldType::Object(fields) = &declaration.entry_type
            && fields.is_empty()
        {
            return Err(RecentError::config(format!(
                "entry type of {} declares no fields",
                declaration.list_field
            )));
        }
        if let Some(target) = self.operations.get(&declaration.operation_name) {
            return Err(RecentError::config(format!(
                "operation {} already bound to {target}",
                declaration.operation_name
            )));
        }
        if let Some((operation, _)) = self
            .operations
            .iter()
            .find(|(_, field)| **field == declaration.list_field)
        {
            return Err(RecentError::config(format!(
                "list field {} already bound to {operation}",
                declaration.list_field
            )));
        }

        let augmentation = if self.fields.contains_key(&declaration.list_field) {
            debug!(
                "schema already declares {}, keeping existing definition",
                declaration.list_field
            );
            Augmentation::Existing
        } else {
            let ty = FieldType::RecentList {
                entry_field: declaration.entry_field.clone(),
                entry_type: Box::new(declaration.entry_type.clone()),
                timestamp_field: declaration.timestamp_field.clone(),
            };
            self.fields.insert(
                declaration.list_field.clone(),
                FieldDef::new(ty).with_default(Value::Array(Vec::new())),
            );
            Augmentation::Added
        };
        self.operations.insert(
            declaration.operation_name.clone(),
            declaration.list_field.clone(),
        );
        Ok(augmentation)
    }
}
