//! End-to-end scenarios against a full repository.

use std::sync::Arc;
use std::time::Duration;
use vellum_core::{
    AcquireOutcome, Clock, ContainerRef, CoreError, FieldContent, PublishStatus, SaveOptions,
    TranslateRequest, VersionNumber,
};
use vellum_testkit::prelude::*;

#[test]
fn saving_identical_content_keeps_one_version() {
    let t = TestRepository::new();
    let page = t.page("hello");

    t.acquire(page.id, ALICE).unwrap();
    for _ in 0..2 {
        let outcome = t
            .save(page.id, ALICE, &body("hello"), SaveOptions::major())
            .unwrap();
        assert!(outcome.version.is_none());
    }
    t.release(page.id, ALICE, SaveOptions::minor()).unwrap();

    let versions = t.versions(page.id).unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].number, VersionNumber::FIRST);
}

#[test]
fn major_save_then_unchanged_save() {
    let t = TestRepository::new();
    let page = t.page("hello");

    t.edit(&page, &body("changed"), true);
    assert_eq!(t.object(page.id).unwrap().current_version, Some(VersionNumber::new(2, 0)));

    t.edit(&page, &body("changed"), true);
    assert_eq!(t.object(page.id).unwrap().current_version, Some(VersionNumber::new(2, 0)));
    assert_eq!(t.versions(page.id).unwrap().len(), 2);
}

#[test]
fn expired_lock_is_taken_over_with_autosave() {
    let t = TestRepository::with_lock_timeout(Duration::from_secs(1));
    let page = t.page("hello");

    t.acquire(page.id, ALICE).unwrap();
    t.save(page.id, ALICE, &body("unsaved by alice"), SaveOptions::draft_only())
        .unwrap();
    assert!(matches!(
        t.acquire(page.id, BOB),
        Err(CoreError::LockConflict { .. })
    ));

    t.advance(Duration::from_millis(1_500));
    let outcome = t.acquire(page.id, BOB).unwrap();
    let AcquireOutcome::TakenOver {
        previous_owner,
        saved: Some(saved),
    } = outcome
    else {
        panic!("expected takeover with autosave, got {outcome:?}");
    };
    assert_eq!(previous_owner, ALICE);
    assert_eq!(saved.editor, ALICE);

    let versions = t.versions(page.id).unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[1].editor, ALICE);
    assert_eq!(t.lock_info(page.id).unwrap().unwrap().lock.owner, BOB);
}

#[test]
fn ten_concurrent_translations_yield_one_object() {
    let t = TestRepository::new();
    let page = t.page("hallo");
    let repo = Arc::new(t.repo);

    let config = StressConfig {
        threads: 10,
        operations_per_thread: 1,
    };
    let stress = stress_concurrent_translate(Arc::clone(&repo), page.id, "en", &config);
    assert_eq!(stress.result.successful_ops, 10);
    assert_eq!(stress.returned_ids.len(), 1);

    let again = repo
        .translate(&TranslateRequest::new(page.id, "en", ALICE))
        .unwrap();
    assert!(stress.returned_ids.contains(&again.id));
}

#[test]
fn restore_drops_field_group_with_deleted_definition() {
    let t = TestRepository::new();
    let page = t.create(with_gallery("one", "sunset"));
    let t1 = t.latest(page.id).unwrap().unwrap().timestamp;

    t.advance(Duration::from_secs(60));
    t.edit(&page, &body("two"), false);
    t.definitions.remove(GALLERY);

    t.advance(Duration::from_secs(60));
    t.restore_object(page.id, t1, ALICE).unwrap();

    let restored = t.object(page.id).unwrap();
    assert!(restored.draft.group("gallery").is_none());
    assert_eq!(
        restored.draft.group("body").unwrap().value("text"),
        Some(&FieldContent::text("one"))
    );
    assert_eq!(restored.global_id, page.global_id);
}

#[test]
fn published_content_is_frozen_but_location_is_live() {
    let t = TestRepository::new();
    let page = t.page("v1");
    t.edit(&page, &body("v2"), true);
    t.publish(page.id).unwrap();

    t.edit(&page, &body("v3"), true);
    assert_eq!(t.status(page.id).unwrap(), PublishStatus::Modified);
    t.move_to(page.id, ContainerRef::new(77)).unwrap();

    let rendition = t.render_for_publish(page.id).unwrap();
    assert_eq!(rendition.version, Some(VersionNumber::new(2, 0)));
    assert_eq!(
        rendition.content.group("body").unwrap().value("text"),
        Some(&FieldContent::text("v2"))
    );
    assert_eq!(rendition.container, ContainerRef::new(77));

    let preview = t.render_for_preview(page.id).unwrap();
    assert_eq!(preview.version, Some(VersionNumber::new(3, 0)));
}

#[test]
fn translated_variant_tracks_source_changes() {
    let t = TestRepository::new();
    let page = t.page("hallo");
    let english = t
        .translate(&TranslateRequest::new(page.id, "en", ALICE))
        .unwrap();
    assert!(t.in_sync(english.id).unwrap());

    t.advance(Duration::from_secs(5));
    t.edit(&page, &body("hallo welt"), false);
    assert!(!t.in_sync(english.id).unwrap());

    t.sync_content(english.id, BOB, None).unwrap();
    assert!(t.in_sync(english.id).unwrap());
    let synced = t.object(english.id).unwrap();
    assert_eq!(synced.global_id, english.global_id);
    assert_eq!(
        synced.draft.group("body").unwrap().value("text"),
        Some(&FieldContent::text("hallo welt"))
    );
}

#[test]
fn field_group_restore_touches_only_that_group() {
    let t = TestRepository::new();
    let page = t.create(with_gallery("one", "first"));
    let t1 = t.latest(page.id).unwrap().unwrap().timestamp;
    t.advance(Duration::from_secs(10));
    t.edit(&page, &with_gallery("two", "second"), false);

    let version = t.restore_field_group(page.id, "body", t1, ALICE).unwrap();
    assert_eq!(version.number, VersionNumber::new(1, 2));

    let object = t.object(page.id).unwrap();
    assert_eq!(
        object.draft.group("body").unwrap().value("text"),
        Some(&FieldContent::text("one"))
    );
    assert_eq!(
        object.draft.group("gallery").unwrap().value("caption"),
        Some(&FieldContent::text("second"))
    );
}

#[test]
fn lifecycle_from_create_to_purge() {
    let t = TestRepository::new();
    let page = t.page("temp");
    t.publish(page.id).unwrap();

    t.delete(page.id, ALICE).unwrap();
    assert!(matches!(
        t.render_for_publish(page.id),
        Err(CoreError::ObjectDeleted { .. })
    ));

    t.undelete(page.id).unwrap();
    assert_eq!(t.status(page.id).unwrap(), PublishStatus::Published);

    t.delete(page.id, ALICE).unwrap();
    assert_eq!(t.purge(page.id).unwrap(), 1);
    assert!(t.export().unwrap().objects.is_empty());
}

#[test]
fn verify_after_mixed_workload() {
    let t = TestRepository::new();
    let page = t.create(with_gallery("a", "b"));
    t.edit(&page, &body("c"), false);
    t.publish(page.id).unwrap();
    t.translate(&TranslateRequest::new(page.id, "fr", ALICE).shell_only())
        .unwrap();
    t.advance(Duration::from_secs(1));
    t.restore_object(page.id, t.clock.now(), ALICE)
        .unwrap();

    let report = t.verify().unwrap();
    assert!(report.is_clean(), "{:?}", report.issues);
    assert_eq!(report.objects, 2);
}
