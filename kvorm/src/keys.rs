//! Store key naming. Every key a model touches is derived here so the layout stays bit-exact
//! across backends: `{namespace}:{role}:{suffix}`.

pub const DELIMITER: char = ':';
pub const VALUE_DELIMITER: char = '-';

pub const DEFAULT_PRIMARY_KEY: &str = "id";

pub const FOREIGN_KEYS_FIELD: &str = "__foreign_keys__";
pub const INDEXES_FIELD: &str = "__indexes__";
pub const PRIMARY_POSITION_FIELD: &str = "__primary_position__";
pub const RESERVED_PREFIX: &str = "__";

/// Registry value under which every primary key of a model is recorded.
pub const PRIMARY_REGISTRY: &str = "primary:all";

pub fn primary(namespace: &str, primary_key: &str) -> String {
    format!("{namespace}:primary:{primary_key}")
}

pub fn primary_incr(namespace: &str) -> String {
    format!("{namespace}:primary-incr")
}

pub fn unique(namespace: &str, value: &str) -> String {
    format!("{namespace}:unique:{value}")
}

pub fn index_position(namespace: &str, value: &str) -> String {
    format!("{namespace}:index-position:{value}")
}

pub fn index_count(namespace: &str, value: &str) -> String {
    format!("{namespace}:index-count:{value}")
}

pub fn index_partition(namespace: &str, value: &str) -> String {
    format!("{namespace}:index-partition:{value}")
}

pub fn index_bucket(namespace: &str, value: &str, partition: u64) -> String {
    format!("{namespace}:index-bucket:{value}:{partition}")
}

/// Entry written into a partition bucket for one record.
pub fn member(namespace: &str, primary_key: &str) -> String {
    format!("{namespace}{VALUE_DELIMITER}{primary_key}")
}

/// Inverse of [`member`] for a known namespace.
pub fn strip_member<'a>(namespace: &str, member: &'a str) -> Option<&'a str> {
    member.strip_prefix(namespace)?.strip_prefix(VALUE_DELIMITER)
}

/// Splits a member written by any namespace. Namespaces never contain the value delimiter.
pub fn split_member(member: &str) -> Option<(&str, &str)> {
    member.split_once(VALUE_DELIMITER)
}

/// Registry value collecting back references to one referenced record.
pub fn reference(primary_key: &str) -> String {
    format!("ref:{primary_key}")
}

/// Key of the owner's persisted foreign-key partition map.
pub fn foreign_marker(owner_namespace: &str, referenced_namespace: &str, primary_key: &str) -> String {
    format!("{owner_namespace}:foreign:{referenced_namespace}:{primary_key}")
}

/// `f1-v1-f2-v2`: the value string of an index tuple.
pub fn index_value<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut out = String::new();
    for (field, value) in pairs {
        if !out.is_empty() {
            out.push(VALUE_DELIMITER);
        }
        out.push_str(field);
        out.push(VALUE_DELIMITER);
        out.push_str(value);
    }
    out
}

/// Namespaces and field names feed the key layout, so the delimiters are off limits.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(DELIMITER) && !name.contains(VALUE_DELIMITER)
}

#[cfg(all(test, not(feature = "integration")))]
mod keys_tests {
    use super::*;

    #[test]
    fn key_layout_is_stable() {
        assert_eq!(primary("process", "7"), "process:primary:7");
        assert_eq!(primary_incr("process"), "process:primary-incr");
        assert_eq!(unique("process", "name-a-version-1"), "process:unique:name-a-version-1");
        assert_eq!(index_position("process", "version-1"), "process:index-position:version-1");
        assert_eq!(index_count("process", "version-1"), "process:index-count:version-1");
        assert_eq!(index_partition("process", "version-1"), "process:index-partition:version-1");
        assert_eq!(index_bucket("process", "version-1", 2), "process:index-bucket:version-1:2");
        assert_eq!(foreign_marker("job", "process", "7"), "job:foreign:process:7");
    }

    #[test]
    fn index_value_joins_pairs() {
        assert_eq!(index_value([("name", "test-5"), ("version", "1")]), "name-test-5-version-1");
        assert_eq!(index_value([("version", "1")]), "version-1");
        assert_eq!(index_value(std::iter::empty()), "");
    }

    #[test]
    fn members_round_trip_through_namespace() {
        let m = member("process", "test-5");
        assert_eq!(m, "process-test-5");
        assert_eq!(strip_member("process", &m), Some("test-5"));
        assert_eq!(strip_member("job", &m), None);
        assert_eq!(split_member(&m), Some(("process", "test-5")));
    }

    #[test]
    fn registry_values_never_look_like_index_values() {
        // index values always put the value delimiter right after a field name
        assert!(!is_valid_name("primary:all"));
        assert!(!is_valid_name(&reference("3")));
        assert!(is_valid_name("created_at"));
        assert!(!is_valid_name("created-at"));
        assert!(!is_valid_name(""));
    }
}
