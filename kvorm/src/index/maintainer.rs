use crate::index::partition::Partitioner;
use crate::index::PartitionMap;
use crate::keys;
use crate::schema::Schema;
use crate::AppError;
use crate::store::KvStore;
use log::{debug, warn};
use std::collections::BTreeMap;

/// Keeps unique pointers and index buckets in step with record writes.
/// Works on serialized field values, the same strings that end up in the record hash.
pub struct IndexMaintainer<'a> {
    store: &'a dyn KvStore,
    schema: &'a Schema,
    partitioner: Partitioner<'a>,
}

/// `f1-v1-f2-v2` for `tuple`, `None` when one of its fields holds no value.
pub fn tuple_value(tuple: &[String], values: &BTreeMap<String, String>) -> Option<String> {
    let mut pairs = Vec::with_capacity(tuple.len());
    for field in tuple {
        pairs.push((field.as_str(), values.get(field)?.as_str()));
    }
    Some(keys::index_value(pairs))
}

impl<'a> IndexMaintainer<'a> {
    pub fn new(store: &'a dyn KvStore, schema: &'a Schema, limit: u64) -> Self {
        Self { store, schema, partitioner: Partitioner::new(store, limit) }
    }

    /// Fails with `DuplicatedValue` when a unique tuple of `values` is claimed by another record.
    /// Writes nothing.
    pub fn verify(&self, primary_key: &str, values: &BTreeMap<String, String>) -> Result<(), AppError> {
        let namespace = self.schema.namespace();
        for tuple in self.schema.unique_keys() {
            let Some(value) = tuple_value(tuple, values) else { continue };
            match self.store.get(&keys::unique(namespace, &value))? {
                Some(owner) if owner != primary_key => return Err(AppError::DuplicatedValue(tuple.clone())),
                _ => {}
            }
        }
        Ok(())
    }

    /// Claims every unique tuple, then records `primary_key` under every index value.
    /// On a unique collision the claims made here are released before `DuplicatedValue` is returned.
    pub fn save(&self, primary_key: &str, values: &BTreeMap<String, String>) -> Result<PartitionMap, AppError> {
        let namespace = self.schema.namespace();
        let mut claimed: Vec<String> = Vec::new();
        for tuple in self.schema.unique_keys() {
            let Some(value) = tuple_value(tuple, values) else { continue };
            let key = keys::unique(namespace, &value);
            if !self.store.set_if_absent(&key, primary_key)? && self.store.get(&key)?.as_deref() != Some(primary_key) {
                debug!("{} already claimed, releasing {} claims of {}", key, claimed.len(), primary_key);
                for key in &claimed {
                    self.store.delete(key)?;
                }
                return Err(AppError::DuplicatedValue(tuple.clone()));
            }
            claimed.push(key);
        }

        let member = keys::member(namespace, primary_key);
        let mut partitions = PartitionMap::new();
        for tuple in self.schema.indexes() {
            let Some(value) = tuple_value(tuple, values) else { continue };
            if partitions.contains_key(&value) {
                continue;
            }
            let partition = self.partitioner.record(namespace, &value, &member)?;
            partitions.insert(value, partition);
        }
        Ok(partitions)
    }

    /// Tears down what [`IndexMaintainer::save`] built, driven by the values and partition map read back from the store.
    pub fn delete(&self, primary_key: &str, values: &BTreeMap<String, String>, partitions: &PartitionMap) -> Result<(), AppError> {
        let namespace = self.schema.namespace();
        for tuple in self.schema.unique_keys() {
            let Some(value) = tuple_value(tuple, values) else { continue };
            let key = keys::unique(namespace, &value);
            match self.store.get(&key)? {
                Some(owner) if owner == primary_key => {
                    self.store.delete(&key)?;
                }
                Some(owner) => warn!("{} points at {} instead of {}, left in place", key, owner, primary_key),
                None => {}
            }
        }
        let member = keys::member(namespace, primary_key);
        for (value, partition) in partitions {
            self.partitioner.forget(namespace, value, *partition, &member)?;
        }
        Ok(())
    }

    /// Primary keys recorded under `tuple` for the given parameter values.
    /// Unique tuples are answered from their pointer when it exists.
    pub fn lookup(&self, tuple: &[String], params: &BTreeMap<String, String>) -> Result<Vec<String>, AppError> {
        let namespace = self.schema.namespace();
        let Some(value) = tuple_value(tuple, params) else { return Ok(Vec::new()) };
        if self.schema.is_unique_key(tuple) {
            if let Some(primary_key) = self.store.get(&keys::unique(namespace, &value))? {
                return Ok(vec![primary_key]);
            }
        }
        let members = self.partitioner.members(namespace, &value)?;
        Ok(members.iter().filter_map(|m| keys::strip_member(namespace, m)).map(str::to_string).collect())
    }
}
