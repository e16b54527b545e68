use crate::keys;
use crate::store::{parse_counter, KvStore};
use crate::AppError;
use log::debug;

/// Shards the members of one index value over buckets of at most `limit` entries.
///
/// Per `(namespace, value)` three counters are kept: `position` only ever grows,
/// `count` tracks live members and `partition` is the bucket currently being filled.
/// A new bucket is opened whenever `position` starts a new block of `limit` entries.
/// The counters and the bucket write are separate store calls, so a crash in between
/// leaves a counter ahead of the buckets; readers tolerate that.
pub struct Partitioner<'s> {
    store: &'s dyn KvStore,
    limit: u64,
}

impl<'s> Partitioner<'s> {
    pub fn new(store: &'s dyn KvStore, limit: u64) -> Self {
        Self { store, limit: limit.max(1) }
    }

    /// Adds `member` under `value`, returning the partition it landed in.
    pub fn record(&self, namespace: &str, value: &str, member: &str) -> Result<u64, AppError> {
        let position = self.store.increment(&keys::index_position(namespace, value))?;
        self.store.increment(&keys::index_count(namespace, value))?;
        let partition_key = keys::index_partition(namespace, value);
        let opens_block = (position - 1).rem_euclid(self.limit as i64) == 0;
        let partition = if opens_block {
            self.store.increment(&partition_key)?
        } else {
            match self.store.get(&partition_key)? {
                Some(raw) => parse_counter(&partition_key, Some(&raw))?,
                // counter lost between calls, open a bucket rather than write into 0
                None => self.store.increment(&partition_key)?,
            }
        };
        let partition = to_partition(&partition_key, partition)?;
        self.store.hash_set(&keys::index_bucket(namespace, value, partition), member, "1")?;
        debug!("{} recorded under {}:{} in partition {}", member, namespace, value, partition);
        Ok(partition)
    }

    /// Removes `member` from the bucket it was recorded in.
    pub fn forget(&self, namespace: &str, value: &str, partition: u64, member: &str) -> Result<(), AppError> {
        self.store.decrement(&keys::index_count(namespace, value))?;
        self.store.hash_delete(&keys::index_bucket(namespace, value, partition), member)?;
        debug!("{} forgotten under {}:{} in partition {}", member, namespace, value, partition);
        Ok(())
    }

    /// Union of all buckets opened so far for `value`, in bucket order.
    pub fn members(&self, namespace: &str, value: &str) -> Result<Vec<String>, AppError> {
        let mut members = Vec::new();
        for partition in 1..=self.partition(namespace, value)? {
            members.extend(self.store.hash_get_all(&keys::index_bucket(namespace, value, partition))?.into_keys());
        }
        Ok(members)
    }

    pub fn count(&self, namespace: &str, value: &str) -> Result<i64, AppError> {
        let key = keys::index_count(namespace, value);
        parse_counter(&key, self.store.get(&key)?.as_deref())
    }

    /// Highest bucket opened for `value`, 0 when nothing was ever recorded.
    pub fn partition(&self, namespace: &str, value: &str) -> Result<u64, AppError> {
        let key = keys::index_partition(namespace, value);
        let raw = parse_counter(&key, self.store.get(&key)?.as_deref())?;
        to_partition(&key, raw)
    }
}

fn to_partition(key: &str, raw: i64) -> Result<u64, AppError> {
    u64::try_from(raw).map_err(|_| AppError::system(format!("negative partition {} at {}", raw, key)))
}
