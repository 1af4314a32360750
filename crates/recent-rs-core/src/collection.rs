//! Schemaless document collection with generated recency operations.

use crate::accessor::JsonListAccessor;
use crate::attachment::Attachment;
use crate::clock::{Clock, SystemClock};
use crate::error::RecentError;
use crate::model::{Document, RecordKey};
use crate::policy::{RecentOptions, RecentPolicy};
use crate::schema::{AttachmentDeclaration, Augmentation, FieldType, RecordSchema};
use crate::store::{AsyncRecordStore, RecordStore};
use log::info;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

struct BoundOperation {
    attachment: Attachment<Document, Value>,
    entry_type: FieldType,
}

/// A named document type: its schema plus one bound attachment per generated
/// operation.
pub struct DocumentCollection {
    name: String,
    schema: RecordSchema,
    operations: BTreeMap<String, BoundOperation>,
    clock: Arc<dyn Clock>,
}

impl DocumentCollection {
    pub fn new(name: impl Into<String>, schema: RecordSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            operations: BTreeMap::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source for current and future attachments.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        for bound in self.operations.values_mut() {
            bound.attachment = bound.attachment.clone().with_clock(clock.clone());
        }
        self.clock = clock;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// Attach a recency list whose entries hold values of `entry_type`,
    /// compared with `==`.
    pub fn attach(
        &mut self,
        options: &RecentOptions,
        entry_type: FieldType,
    ) -> Result<Augmentation, RecentError> {
        let policy = RecentPolicy::resolve(options)?;
        self.bind(policy, entry_type)
    }

    /// Attach a recency list with a custom compare predicate.
    pub fn attach_with<F>(
        &mut self,
        options: &RecentOptions,
        entry_type: FieldType,
        compare: F,
    ) -> Result<Augmentation, RecentError>
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        let policy = RecentPolicy::resolve_with(options, compare)?;
        self.bind(policy, entry_type)
    }

    fn bind(
        &mut self,
        policy: RecentPolicy<Value>,
        entry_type: FieldType,
    ) -> Result<Augmentation, RecentError> {
        let declaration = AttachmentDeclaration::from_policy(&policy, entry_type.clone());
        let augmentation = self.schema.augment(&declaration)?;
        info!(
            "attached {} to {} (field={}, operation={}, capacity={}, augmentation={:?})",
            policy.label(),
            self.name,
            policy.list_field(),
            policy.operation_name(),
            policy.capacity(),
            augmentation
        );
        let accessor = JsonListAccessor::from_policy(&policy);
        let attachment = Attachment::new(policy, accessor).with_clock(self.clock.clone());
        self.operations.insert(
            declaration.operation_name,
            BoundOperation {
                attachment,
                entry_type,
            },
        );
        Ok(augmentation)
    }

    pub fn has_operation(&self, operation: &str) -> bool {
        self.operations.contains_key(operation)
    }

    /// Attachment bound to a generated operation.
    pub fn attachment(&self, operation: &str) -> Option<&Attachment<Document, Value>> {
        self.operations.get(operation).map(|bound| &bound.attachment)
    }

    /// Fresh document with a generated key and all schema defaults filled in.
    pub fn new_document(&self) -> Document {
        self.new_document_with_key(RecordKey::generate())
    }

    pub fn new_document_with_key(&self, key: impl Into<RecordKey>) -> Document {
        let mut document = Document::new(key);
        document.fields = self.schema.defaults();
        document
    }

    /// Run `operation` on a live document and save it.
    pub fn call<S>(
        &self,
        store: &S,
        document: Document,
        operation: &str,
        value: Value,
    ) -> Result<Document, RecentError>
    where
        S: RecordStore<Document> + ?Sized,
    {
        let (bound, value) = self.prepare(operation, value)?;
        bound.attachment.record_recent(store, document, value)
    }

    /// Fetch the document by key, run `operation` and save it.
    pub fn call_by_key<S>(
        &self,
        store: &S,
        key: &RecordKey,
        operation: &str,
        value: Value,
    ) -> Result<Document, RecentError>
    where
        S: RecordStore<Document> + ?Sized,
    {
        let (bound, value) = self.prepare(operation, value)?;
        bound.attachment.record_recent_by_key(store, key, value)
    }

    pub async fn call_async<S>(
        &self,
        store: &S,
        document: Document,
        operation: &str,
        value: Value,
    ) -> Result<Document, RecentError>
    where
        S: AsyncRecordStore<Document> + ?Sized,
    {
        let (bound, value) = self.prepare(operation, value)?;
        bound
            .attachment
            .record_recent_async(store, document, value)
            .await
    }

    pub async fn call_by_key_async<S>(
        &self,
        store: &S,
        key: &RecordKey,
        operation: &str,
        value: Value,
    ) -> Result<Document, RecentError>
    where
        S: AsyncRecordStore<Document> + ?Sized,
    {
        let (bound, value) = self.prepare(operation, value)?;
        bound
            .attachment
            .record_recent_by_key_async(store, key, value)
            .await
    }

    fn prepare(
        &self,
        operation: &str,
        value: Value,
    ) -> Result<(&BoundOperation, Value), RecentError> {
        let bound = self
            .operations
            .get(operation)
            .ok_or_else(|| RecentError::UnknownOperation(operation.to_string()))?;
        let value = bound
            .entry_type
            .conform(value)
            .map_err(|err| RecentError::InvalidValue(format!("{operation}: {err}")))?;
        Ok((bound, value))
    }
}
