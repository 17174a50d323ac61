//! Live-id accounting; kept in its own test binary because the registry is process-wide.

use remap_dispatcher::{ObjectId, active_object_id_count, make_new_object_id};

#[test]
fn dropping_ids_releases_them() {
    let baseline = active_object_id_count();
    {
        let a = make_new_object_id();
        let b = ObjectId::new();
        assert_ne!(a.value(), b.value());
        assert_eq!(active_object_id_count(), baseline + 2);
    }
    assert_eq!(active_object_id_count(), baseline);

    let c = ObjectId::new();
    let d = ObjectId::new();
    assert!(d.value().get() > c.value().get());
    assert_eq!(active_object_id_count(), baseline + 2);
    drop(c);
    assert_eq!(active_object_id_count(), baseline + 1);
}
