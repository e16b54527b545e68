mod common;

use common::{orms, process_schema};
use std::collections::BTreeSet;

#[test]
fn it_should_open_second_bucket_past_the_limit() {
    let limit = 3;
    for (backend, orm) in orms("kvorm_it_partition", limit) {
        let model = orm.model(process_schema());
        let mut pks = Vec::new();
        for i in 0..=limit {
            let mut process = model.create(&[("name", format!("big-{i}").into()), ("version", 7.into())]).unwrap();
            pks.push(process.save().unwrap());
        }

        let store = orm.store();
        assert_eq!(store.get("process:index-partition:version-7").unwrap().as_deref(), Some("2"), "{backend}");
        let first = store.hash_get_all("process:index-bucket:version-7:1").unwrap();
        let second = store.hash_get_all("process:index-bucket:version-7:2").unwrap();
        assert_eq!(first.len() as u64, limit, "{backend}");
        assert_eq!(second.len(), 1, "{backend}");

        let union: BTreeSet<String> = first.into_keys().chain(second.into_keys()).collect();
        let expected: BTreeSet<String> = pks.iter().map(|pk| format!("process-{pk}")).collect();
        assert_eq!(union, expected, "{backend}");
        assert_eq!(model.filter(&[("version", 7.into())]).unwrap().len(), pks.len(), "{backend}");
    }
}

#[test]
fn it_should_keep_finding_members_after_deletes() {
    for (backend, orm) in orms("kvorm_it_partition_delete", 2) {
        let model = orm.model(process_schema());
        let mut pks = Vec::new();
        for i in 0..5 {
            let mut process = model.create(&[("name", format!("p-{i}").into()), ("version", 1.into())]).unwrap();
            pks.push(process.save().unwrap());
        }
        model.delete(&pks[0]).unwrap();
        model.delete(&pks[3]).unwrap();

        let store = orm.store();
        assert_eq!(store.get("process:index-count:version-1").unwrap().as_deref(), Some("3"), "{backend}");
        assert_eq!(store.get("process:index-position:version-1").unwrap().as_deref(), Some("5"), "{backend}");

        let mut p = model.create(&[("name", "p-5".into()), ("version", 1.into())]).unwrap();
        p.save().unwrap();
        let mut found: Vec<String> = model.filter(&[("version", 1.into())]).unwrap().iter().filter_map(|r| r.primary_key()).collect();
        found.sort();
        assert_eq!(found, vec!["2", "3", "5", "6"], "{backend}");
    }
}
