use crate::index::{self, ForeignKeys, IndexMaintainer, PartitionMap, Partitioner};
use crate::keys;
use crate::schema::{FieldDef, FieldKind, Schema, Value};
use crate::settings::IndexSettings;
use crate::store::KvStore;
use crate::AppError;
use chrono::{Local, NaiveDateTime, Timelike};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A schema bound to a store. Cheap to clone, every clone talks to the same store.
#[derive(Clone)]
pub struct Model {
    store: Arc<dyn KvStore>,
    schema: Arc<Schema>,
    settings: IndexSettings,
}

/// One instance of a model. Owned by the caller, nothing is cached behind it.
#[derive(Clone)]
pub struct Record {
    model: Model,
    values: BTreeMap<String, Value>,
}

/// Record hash as read back from the store, reserved fields split off.
struct Stored {
    values: BTreeMap<String, String>,
    foreign_keys: PartitionMap,
    indexes: PartitionMap,
    primary_position: Option<u64>,
}

impl Stored {
    fn parse(mut raw: BTreeMap<String, String>) -> Result<Self, AppError> {
        let foreign_keys = decode_map(raw.remove(keys::FOREIGN_KEYS_FIELD))?;
        let indexes = decode_map(raw.remove(keys::INDEXES_FIELD))?;
        let primary_position = match raw.remove(keys::PRIMARY_POSITION_FIELD) {
            Some(p) => Some(p.parse::<u64>().map_err(|_| AppError::system(format!("corrupted primary position {}", p)))?),
            None => None,
        };
        Ok(Stored { values: raw, foreign_keys, indexes, primary_position })
    }
}

fn decode_map(raw: Option<String>) -> Result<PartitionMap, AppError> {
    match raw {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Ok(PartitionMap::new()),
    }
}

fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

fn describe(params: &[(String, Value)]) -> String {
    params.iter().map(|(k, v)| format!("{}={}", k, v)).collect::<Vec<_>>().join(", ")
}

impl Model {
    pub fn new(store: Arc<dyn KvStore>, schema: Arc<Schema>, settings: IndexSettings) -> Self {
        Self { store, schema, settings }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn namespace(&self) -> &str {
        self.schema.namespace()
    }

    pub fn store(&self) -> &dyn KvStore {
        self.store.as_ref()
    }

    fn limit(&self) -> u64 {
        self.settings.big_key_limit
    }

    fn partitioner(&self) -> Partitioner<'_> {
        Partitioner::new(self.store.as_ref(), self.limit())
    }

    fn indexes(&self) -> IndexMaintainer<'_> {
        IndexMaintainer::new(self.store.as_ref(), &self.schema, self.limit())
    }

    fn foreign_keys(&self) -> ForeignKeys<'_> {
        ForeignKeys::new(self.store.as_ref(), &self.schema, self.limit())
    }

    /// Coerces `value` for `field`, foreign values must point at an existing record.
    fn check(&self, field: &FieldDef, value: Value) -> Result<Value, AppError> {
        if field.required && value.is_null() {
            return Err(AppError::ValueRequired(field.name.clone()));
        }
        let value = field.kind.coerce(value)?;
        if field.required && value.is_null() {
            return Err(AppError::ValueRequired(field.name.clone()));
        }
        if let (Some(target), Some(pk)) = (field.foreign_target(), value.as_str()) {
            if !self.store.exists(&keys::primary(target, pk))? {
                return Err(AppError::invalid(format!("{} {} does not exist", target, pk)));
            }
        }
        Ok(value)
    }

    /// Normalised storage form of a primary key given in any accepted input shape.
    fn primary_key_of(&self, value: impl Into<Value>) -> Result<String, AppError> {
        let field = self.schema.primary_field();
        field.kind.coerce(value.into())?.serialize().ok_or_else(|| AppError::invalid(format!("{} can not be null", field.name)))
    }

    /// Builds an unsaved record: defaults first, then `params` coerced field by field.
    pub fn create(&self, params: &[(&str, Value)]) -> Result<Record, AppError> {
        let mut values = BTreeMap::new();
        for field in self.schema.fields() {
            values.insert(field.name.clone(), field.initial_value());
        }
        for (name, value) in params {
            let field = self.schema.expect_field(name)?;
            values.insert(field.name.clone(), self.check(field, value.clone())?);
        }
        for field in self.schema.fields() {
            let supplied = params.iter().any(|(name, _)| *name == field.name);
            if field.required && !supplied && field.default.is_none() {
                return Err(AppError::ValueRequired(field.name.clone()));
            }
        }
        Ok(Record { model: self.clone(), values })
    }

    fn load_stored(&self, primary_key: &str) -> Result<Option<Stored>, AppError> {
        let raw = self.store.hash_get_all(&keys::primary(self.namespace(), primary_key))?;
        if raw.is_empty() {
            return Ok(None);
        }
        Stored::parse(raw).map(Some)
    }

    fn decode(&self, stored: &Stored) -> Result<Record, AppError> {
        let mut values = BTreeMap::new();
        for field in self.schema.fields() {
            let value = match stored.values.get(&field.name) {
                Some(raw) => field.kind.deserialize(raw).map_err(|e| AppError::system(format!("{}.{}: {}", self.namespace(), field.name, e)))?,
                None => Value::Null,
            };
            values.insert(field.name.clone(), value);
        }
        Ok(Record { model: self.clone(), values })
    }

    fn load(&self, primary_key: &str) -> Result<Option<Record>, AppError> {
        match self.load_stored(primary_key)? {
            Some(stored) => self.decode(&stored).map(Some),
            None => Ok(None),
        }
    }

    pub fn get_by_pk(&self, primary_key: impl Into<Value>) -> Result<Record, AppError> {
        let primary_key = self.primary_key_of(primary_key)?;
        self.load(&primary_key)?.ok_or_else(|| AppError::not_found(keys::primary(self.namespace(), &primary_key)))
    }

    /// Persists `record`, replacing whatever was stored under its primary key.
    fn save(&self, record: &mut Record) -> Result<String, AppError> {
        let namespace = self.namespace();
        let stamp = now();
        for field in self.schema.fields() {
            if let FieldKind::Datetime { auto_now_add, auto_now } = field.kind {
                let unset = record.values.get(&field.name).map_or(true, Value::is_null);
                if auto_now || (auto_now_add && unset) {
                    record.values.insert(field.name.clone(), Value::Datetime(stamp));
                }
            }
        }

        let pk_field = self.schema.primary_field();
        let primary_key = match record.primary_key() {
            Some(pk) => pk,
            None if pk_field.kind == FieldKind::Integer => {
                let id = self.store.increment(&keys::primary_incr(namespace))?;
                record.values.insert(pk_field.name.clone(), Value::Integer(id));
                id.to_string()
            }
            None => return Err(AppError::invalid(format!("{}.{} must be set before save", namespace, pk_field.name))),
        };

        let serialized: BTreeMap<String, String> =
            record.values.iter().filter_map(|(name, value)| value.serialize().map(|raw| (name.clone(), raw))).collect();
        self.foreign_keys().verify(&serialized)?;
        self.indexes().verify(&primary_key, &serialized)?;

        let key = keys::primary(namespace, &primary_key);
        if self.store.exists(&key)? {
            debug!("{} exists, deleting before overwrite", key);
            self.delete(&primary_key)?;
        }

        let foreign_keys = self.foreign_keys().save(&primary_key, &serialized)?;
        let indexes = match self.indexes().save(&primary_key, &serialized) {
            Ok(indexes) => indexes,
            Err(err) => {
                if matches!(err, AppError::DuplicatedValue(_)) {
                    self.foreign_keys().delete(&primary_key, &serialized, &foreign_keys)?;
                }
                return Err(err);
            }
        };
        let position = self.partitioner().record(namespace, keys::PRIMARY_REGISTRY, &keys::member(namespace, &primary_key))?;

        for (field, raw) in &serialized {
            self.store.hash_set(&key, field, raw)?;
        }
        self.store.hash_set(&key, keys::PRIMARY_POSITION_FIELD, &position.to_string())?;
        if !foreign_keys.is_empty() {
            self.store.hash_set(&key, keys::FOREIGN_KEYS_FIELD, &serde_json::to_string(&foreign_keys)?)?;
        }
        if !indexes.is_empty() {
            self.store.hash_set(&key, keys::INDEXES_FIELD, &serde_json::to_string(&indexes)?)?;
        }
        info!("saved {}", key);
        Ok(primary_key)
    }

    /// Deletes the stored record, tearing down from its stored state rather than any in-memory copy.
    pub fn delete(&self, primary_key: &str) -> Result<(), AppError> {
        let namespace = self.namespace();
        let key = keys::primary(namespace, primary_key);
        let stored = self.load_stored(primary_key)?.ok_or_else(|| AppError::not_found(key.clone()))?;
        self.foreign_keys().delete(primary_key, &stored.values, &stored.foreign_keys)?;
        self.indexes().delete(primary_key, &stored.values, &stored.indexes)?;
        if let Some(position) = stored.primary_position {
            self.partitioner().forget(namespace, keys::PRIMARY_REGISTRY, position, &keys::member(namespace, primary_key))?;
        }
        self.store.delete(&key)?;
        info!("deleted {}", key);
        Ok(())
    }

    fn coerce_params(&self, params: &[(&str, Value)]) -> Result<Vec<(String, Value)>, AppError> {
        params
            .iter()
            .map(|(name, value)| {
                let field = self.schema.expect_field(name)?;
                Ok((field.name.clone(), field.kind.coerce(value.clone())?))
            })
            .collect()
    }

    /// Every registered primary key, in bucket order.
    fn primary_keys(&self) -> Result<Vec<String>, AppError> {
        let namespace = self.namespace();
        let members = self.partitioner().members(namespace, keys::PRIMARY_REGISTRY)?;
        Ok(members.iter().filter_map(|m| keys::strip_member(namespace, m)).map(str::to_string).collect())
    }

    fn load_all(&self, primary_keys: Vec<String>) -> Result<Vec<Record>, AppError> {
        let mut records = Vec::with_capacity(primary_keys.len());
        for primary_key in primary_keys {
            match self.load(&primary_key)? {
                Some(record) => records.push(record),
                None => warn!("{} is indexed but not stored", keys::primary(self.namespace(), &primary_key)),
            }
        }
        Ok(records)
    }

    /// Records matching every parameter. Parameter order is irrelevant: the longest registered
    /// index over any ordering narrows the candidates, the rest are checked in memory.
    pub fn filter(&self, params: &[(&str, Value)]) -> Result<Vec<Record>, AppError> {
        let params = self.coerce_params(params)?;
        if params.is_empty() {
            return Err(AppError::not_found(format!("{} with no parameters", self.namespace())));
        }
        let wanted: BTreeMap<String, String> =
            params.iter().filter_map(|(name, value)| value.serialize().map(|raw| (name.clone(), raw))).collect();

        let pk_name = self.schema.primary_key();
        let candidates = match params.iter().find(|(name, _)| name == pk_name) {
            Some((_, pk)) => pk.serialize().into_iter().collect(),
            None => {
                let names: Vec<&str> = params.iter().map(|(name, _)| name.as_str()).collect();
                let tuple = self.schema.resolve_index(&names);
                if !tuple.is_empty() {
                    debug!("{} resolved to index {:?}", describe(&params), tuple);
                    self.indexes().lookup(&tuple, &wanted)?
                } else if self.settings.full_scan_fallback {
                    debug!("{} matches no index, scanning {}", describe(&params), self.namespace());
                    self.primary_keys()?
                } else {
                    return Err(AppError::not_found(format!("{} has no index for {}", self.namespace(), describe(&params))));
                }
            }
        };
        if candidates.is_empty() {
            return Err(AppError::not_found(format!("{} {}", self.namespace(), describe(&params))));
        }

        let records = self.load_all(candidates)?;
        Ok(records
            .into_iter()
            .filter(|record| params.iter().all(|(name, value)| record.values.get(name).and_then(Value::serialize) == value.serialize()))
            .collect())
    }

    /// Exactly one record matching `params`.
    pub fn get(&self, params: &[(&str, Value)]) -> Result<Record, AppError> {
        let mut records = self.filter(params)?;
        match records.len() {
            0 => Err(AppError::not_found(format!("{} {}", self.namespace(), describe(&self.coerce_params(params)?)))),
            1 => Ok(records.remove(0)),
            count => Err(AppError::GetMoreObjects { params: describe(&self.coerce_params(params)?), count }),
        }
    }

    pub fn all(&self) -> Result<Vec<Record>, AppError> {
        self.load_all(self.primary_keys()?)
    }

    /// Live records according to the primary registry.
    pub fn count(&self) -> Result<i64, AppError> {
        self.partitioner().count(self.namespace(), keys::PRIMARY_REGISTRY)
    }

    /// `(namespace, primary key)` of every saved record whose foreign field points at `primary_key`.
    pub fn dependents(&self, primary_key: impl Into<Value>) -> Result<Vec<(String, String)>, AppError> {
        let primary_key = self.primary_key_of(primary_key)?;
        index::dependents(self.store.as_ref(), self.limit(), self.namespace(), &primary_key)
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model").field("namespace", &self.namespace()).field("settings", &self.settings).finish()
    }
}

impl Record {
    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), AppError> {
        let field = self.model.schema.expect_field(name)?;
        let value = self.model.check(field, value.into())?;
        self.values.insert(field.name.clone(), value);
        Ok(())
    }

    /// Points foreign field `name` at a saved record of the field's target model.
    pub fn link(&mut self, name: &str, target: &Record) -> Result<(), AppError> {
        let field = self.model.schema.expect_field(name)?;
        match field.foreign_target() {
            Some(ns) if ns == target.model.namespace() => {}
            Some(ns) => return Err(AppError::invalid(format!("{} expects {}, got {}", name, ns, target.model.namespace()))),
            None => return Err(AppError::invalid(format!("{} is not a foreign field", name))),
        }
        let primary_key = target.primary_key().ok_or_else(|| AppError::invalid(format!("{} record is not saved", target.model.namespace())))?;
        self.set(name, primary_key)
    }

    /// Storage form of the primary key, `None` while unassigned.
    pub fn primary_key(&self) -> Option<String> {
        match self.values.get(self.model.schema.primary_key())? {
            Value::Null | Value::Integer(0) => None,
            value => value.serialize().filter(|pk| !pk.is_empty()),
        }
    }

    /// Saves and returns the primary key, allocating one for integer keys.
    pub fn save(&mut self) -> Result<String, AppError> {
        let model = self.model.clone();
        model.save(self)
    }

    pub fn delete(&self) -> Result<(), AppError> {
        let primary_key = self.primary_key().ok_or_else(|| AppError::not_found(format!("unsaved {} record", self.model.namespace())))?;
        self.model.delete(&primary_key)
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record").field("namespace", &self.model.namespace()).field("values", &self.values).finish()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.model.namespace() == other.model.namespace() && self.values == other.values
    }
}
