use crate::index::partition::Partitioner;
use crate::index::PartitionMap;
use crate::keys;
use crate::schema::Schema;
use crate::store::KvStore;
use crate::AppError;
use std::collections::BTreeMap;

/// Back references from an owning record to the records its foreign fields point at.
/// They are recorded under `ref:{pk}` in the referenced namespace, so dependents of a record
/// can be listed without touching the owners. Nothing cascades.
pub struct ForeignKeys<'a> {
    store: &'a dyn KvStore,
    schema: &'a Schema,
    partitioner: Partitioner<'a>,
}

impl<'a> ForeignKeys<'a> {
    pub fn new(store: &'a dyn KvStore, schema: &'a Schema, limit: u64) -> Self {
        Self { store, schema, partitioner: Partitioner::new(store, limit) }
    }

    fn references<'v>(&self, values: &'v BTreeMap<String, String>) -> Vec<(&'a str, &'v str)> {
        self.schema
            .foreign_keys()
            .iter()
            .filter_map(|name| {
                let target = self.schema.field(name)?.foreign_target()?;
                Some((target, values.get(name)?.as_str()))
            })
            .collect()
    }

    /// Fails with `InvalidInput` when a referenced record does not exist.
    pub fn verify(&self, values: &BTreeMap<String, String>) -> Result<(), AppError> {
        for (target, referenced) in self.references(values) {
            if !self.store.exists(&keys::primary(target, referenced))? {
                return Err(AppError::invalid(format!("{} {} does not exist", target, referenced)));
            }
        }
        Ok(())
    }

    /// Checks every referenced record still exists, then records the back references.
    /// Returns marker -> partition for the record hash.
    pub fn save(&self, primary_key: &str, values: &BTreeMap<String, String>) -> Result<PartitionMap, AppError> {
        let namespace = self.schema.namespace();
        let member = keys::member(namespace, primary_key);
        let mut partitions = PartitionMap::new();
        for (target, referenced) in self.references(values) {
            if !self.store.exists(&keys::primary(target, referenced))? {
                self.delete(primary_key, values, &partitions)?;
                return Err(AppError::invalid(format!("{} {} referenced by {} does not exist", target, referenced, member)));
            }
            let marker = keys::foreign_marker(namespace, target, referenced);
            if partitions.contains_key(&marker) {
                continue;
            }
            let partition = self.partitioner.record(target, &keys::reference(referenced), &member)?;
            partitions.insert(marker, partition);
        }
        Ok(partitions)
    }

    /// Forgets the back references whose marker is still present in `partitions`.
    pub fn delete(&self, primary_key: &str, values: &BTreeMap<String, String>, partitions: &PartitionMap) -> Result<(), AppError> {
        let namespace = self.schema.namespace();
        let member = keys::member(namespace, primary_key);
        let mut forgotten = Vec::new();
        for (target, referenced) in self.references(values) {
            let marker = keys::foreign_marker(namespace, target, referenced);
            if forgotten.contains(&marker) {
                continue;
            }
            if let Some(partition) = partitions.get(&marker) {
                self.partitioner.forget(target, &keys::reference(referenced), *partition, &member)?;
                forgotten.push(marker);
            }
        }
        Ok(())
    }
}

/// `(namespace, primary key)` of every record referencing `primary_key` in `namespace`.
pub fn dependents(store: &dyn KvStore, limit: u64, namespace: &str, primary_key: &str) -> Result<Vec<(String, String)>, AppError> {
    let members = Partitioner::new(store, limit).members(namespace, &keys::reference(primary_key))?;
    Ok(members
        .iter()
        .filter_map(|m| keys::split_member(m))
        .map(|(ns, pk)| (ns.to_string(), pk.to_string()))
        .collect())
}

#[cfg(all(test, not(feature = "integration")))]
mod foreign_tests {
    use super::*;
    use crate::schema::FieldDef;
    use crate::store::MemoryStore;

    fn job() -> Schema {
        Schema::builder("job")
            .field(FieldDef::foreign("process", "process"))
            .field(FieldDef::foreign("fallback", "process"))
            .build()
            .unwrap()
    }

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn records_back_reference_under_referenced_namespace() {
        let store = MemoryStore::new();
        store.hash_set("process:primary:7", "id", "7").unwrap();
        let schema = job();
        let fks = ForeignKeys::new(&store, &schema, 10);
        let partitions = fks.save("1", &values(&[("process", "7")])).unwrap();
        assert_eq!(partitions.get("job:foreign:process:7"), Some(&1));
        assert!(store.hash_exists("process:index-bucket:ref:7:1", "job-1").unwrap());
        assert_eq!(dependents(&store, 10, "process", "7").unwrap(), vec![("job".to_string(), "1".to_string())]);

        fks.delete("1", &values(&[("process", "7")]), &partitions).unwrap();
        assert!(dependents(&store, 10, "process", "7").unwrap().is_empty());
    }

    #[test]
    fn two_fields_pointing_at_one_record_share_a_marker() {
        let store = MemoryStore::new();
        store.hash_set("process:primary:7", "id", "7").unwrap();
        let schema = job();
        let fks = ForeignKeys::new(&store, &schema, 10);
        let both = values(&[("process", "7"), ("fallback", "7")]);
        let partitions = fks.save("1", &both).unwrap();
        assert_eq!(partitions.len(), 1);
        fks.delete("1", &both, &partitions).unwrap();
        assert_eq!(store.get("process:index-count:ref:7").unwrap().as_deref(), Some("0"));
    }

    #[test]
    fn missing_target_is_invalid_and_unwinds() {
        let store = MemoryStore::new();
        store.hash_set("process:primary:7", "id", "7").unwrap();
        let schema = job();
        let fks = ForeignKeys::new(&store, &schema, 10);
        let err = fks.save("1", &values(&[("process", "7"), ("fallback", "8")])).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(dependents(&store, 10, "process", "7").unwrap().is_empty());
    }

    #[test]
    fn verify_reports_first_missing_target() {
        let store = MemoryStore::new();
        store.hash_set("process:primary:7", "id", "7").unwrap();
        let schema = job();
        let fks = ForeignKeys::new(&store, &schema, 10);
        assert!(fks.verify(&values(&[("process", "7")])).is_ok());
        assert!(matches!(fks.verify(&values(&[("process", "7"), ("fallback", "9")])), Err(AppError::InvalidInput(_))));
        assert!(store.scan("process:index-").unwrap().is_empty());
    }

    #[test]
    fn unset_foreign_fields_are_skipped() {
        let store = MemoryStore::new();
        let schema = job();
        let fks = ForeignKeys::new(&store, &schema, 10);
        assert!(fks.save("1", &BTreeMap::new()).unwrap().is_empty());
    }
}
