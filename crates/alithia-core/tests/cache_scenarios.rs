//! End-to-end behaviour of the collection cache against the in-memory store.

use std::sync::Arc;

use alithia_core::auth::{Role, Viewer};
use alithia_core::cache::{highlight, ChangeLog, Filter, FilterSet, ViewState, CHANGELOG_COLLECTION};
use alithia_core::store::FailureKind;
use alithia_core::{CacheError, CollectionCache, CollectionSpec, Fields, MemoryStore, RecordId};
use serde_json::{json, Value};

fn fields(value: Value) -> Fields {
    value.as_object().cloned().unwrap()
}

async fn loaded_characters(store: &MemoryStore) -> CollectionCache<MemoryStore> {
    let mut cache = CollectionCache::new(store.clone(), CollectionSpec::characters());
    cache.load().await.unwrap();
    cache
}

fn ids(records: &[&alithia_core::Record]) -> Vec<String> {
    records.iter().map(|r| r.id.to_string()).collect()
}

fn assert_unique(cache: &CollectionCache<MemoryStore>) {
    let mut seen: Vec<&RecordId> = cache.items().iter().map(|r| &r.id).collect();
    let total = seen.len();
    seen.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    seen.dedup();
    assert_eq!(seen.len(), total, "duplicate ids in cache");
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn empty_collection_renders_empty_not_error() {
    let store = MemoryStore::new();
    let cache = loaded_characters(&store).await;

    assert!(cache.items().is_empty());
    assert_eq!(cache.view_state(), ViewState::Empty);
}

#[tokio::test]
async fn failed_load_renders_could_not_load() {
    let store = MemoryStore::new();
    store.set_offline(true);
    let mut cache = CollectionCache::new(store.clone(), CollectionSpec::characters());

    let err = cache.load().await.unwrap_err();
    assert!(matches!(err, CacheError::Load { .. }));
    assert!(cache.items().is_empty());
    assert!(matches!(cache.view_state(), ViewState::CouldNotLoad(_)));
    assert_ne!(cache.view_state(), ViewState::Empty);
}

#[tokio::test]
async fn create_update_search_delete_walkthrough() {
    let store = MemoryStore::new();
    let mut cache = loaded_characters(&store).await;
    cache.create(fields(json!({ "title": "Vess", "status": "alive" }))).await.unwrap();

    store.queue_id("abc123");
    let created = cache
        .create(fields(json!({ "title": "Thorne", "status": "alive" })))
        .await
        .unwrap();
    assert_eq!(created.id.as_str(), "abc123");
    assert_eq!(cache.items()[0].id.as_str(), "abc123");
    assert_eq!(cache.items()[0].text("title"), Some("Thorne"));
    assert_eq!(cache.items()[0].text("status"), Some("alive"));

    let id = RecordId::from("abc123");
    cache.update(&id, fields(json!({ "status": "deceased" }))).await.unwrap();
    let alive = cache.apply_filter(|r| r.text("status") == Some("alive"));
    assert_eq!(ids(&alive), vec![cache.items()[1].id.to_string()]);

    let hits = cache.search("thor");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.id, id);
    let title = hits[0].record.text("title").unwrap();
    assert_eq!(highlight(title, hits[0].spans("title"), "[", "]"), "[Thor]ne");

    let before = cache.counts("status").unwrap().total;
    cache.delete(&id).await.unwrap();
    assert!(cache.apply_filter(|_| true).iter().all(|r| r.id != id));
    assert!(cache.search("thor").is_empty());
    assert_eq!(cache.counts("status").unwrap().total, before - 1);
}

// ============================================================================
// Properties
// ============================================================================

#[tokio::test]
async fn ids_stay_unique_across_mixed_operations() {
    let store = MemoryStore::new();
    let mut cache = loaded_characters(&store).await;

    let mut created = Vec::new();
    for name in ["Thorne", "Vess", "Ilka", "Oren"] {
        created.push(cache.create(fields(json!({ "title": name }))).await.unwrap().id.clone());
        assert_unique(&cache);
    }
    cache.update(&created[1], fields(json!({ "status": "missing" }))).await.unwrap();
    cache.delete(&created[2]).await.unwrap();
    assert_unique(&cache);

    cache.load().await.unwrap();
    assert_unique(&cache);
    assert_eq!(cache.len(), 3);

    // A create echoed back by a reload is not doubled.
    cache.create(fields(json!({ "title": "Sable" }))).await.unwrap();
    cache.load().await.unwrap();
    assert_unique(&cache);
    assert_eq!(cache.len(), 4);
}

#[tokio::test]
async fn successful_create_is_exactly_the_written_fields() {
    let store = MemoryStore::new();
    let mut cache = loaded_characters(&store).await;
    cache.create(fields(json!({ "title": "Vess" }))).await.unwrap();

    let input = fields(json!({ "title": "Thorne", "status": "alive", "race": "Human" }));
    let record = cache.create(input.clone()).await.unwrap().clone();

    assert_eq!(record.fields, input);
    assert_eq!(cache.items()[0], record);
    assert_eq!(cache.items().iter().filter(|r| r.fields == input).count(), 1);
}

#[tokio::test]
async fn failed_update_leaves_cache_untouched() {
    let store = MemoryStore::new();
    let mut cache = loaded_characters(&store).await;
    for name in ["Thorne", "Vess", "Ilka"] {
        cache.create(fields(json!({ "title": name, "status": "alive" }))).await.unwrap();
    }
    let before = cache.items().to_vec();
    let target = before[1].id.clone();

    store.fail_next(FailureKind::Offline);
    let err = cache.update(&target, fields(json!({ "status": "deceased" }))).await.unwrap_err();
    assert_eq!(err.user_message(), "Failed to save. Check your connection and try again.");
    assert_eq!(cache.items(), before.as_slice());

    store.fail_next(FailureKind::PermissionDenied);
    assert!(cache.update(&target, fields(json!({ "status": "deceased" }))).await.is_err());
    assert_eq!(cache.items(), before.as_slice());
}

#[tokio::test]
async fn views_do_not_mutate_and_are_idempotent() {
    let store = MemoryStore::new();
    let mut cache = loaded_characters(&store).await;
    for (name, status) in [("Thorne", "alive"), ("Thora", "deceased"), ("Vess", "alive")] {
        cache.create(fields(json!({ "title": name, "status": status }))).await.unwrap();
    }
    let before = cache.items().to_vec();
    let alive = FilterSet::new().with(Filter::for_field(cache.spec(), "status", "alive"));

    let first = ids(&cache.filtered(&alive));
    let second = ids(&cache.filtered(&alive));
    assert_eq!(first, second);

    let first: Vec<_> = cache.search("tho").into_iter().map(|h| h.record.id.clone()).collect();
    let second: Vec<_> = cache.search("tho").into_iter().map(|h| h.record.id.clone()).collect();
    assert_eq!(first, second);

    assert_eq!(cache.items(), before.as_slice());
}

#[tokio::test]
async fn category_and_search_compose_in_either_order() {
    let store = MemoryStore::new();
    let mut cache = loaded_characters(&store).await;
    for (name, status) in [
        ("Thorne", "alive"),
        ("Thora", "deceased"),
        ("Vess", "alive"),
        ("Arthos", "alive"),
    ] {
        cache.create(fields(json!({ "title": name, "status": status }))).await.unwrap();
    }
    let spec = cache.spec().clone();
    let category = Filter::for_field(&spec, "status", "alive");

    // Category first, then search over the survivors.
    let by_category = {
        let mut survivors = cache.filtered(&FilterSet::new().with(category.clone()));
        survivors.retain(|r| Filter::Text("tho".to_string()).matches(r, &spec));
        ids(&survivors)
    };

    // Search first, then category over the hits.
    let by_search = {
        let hits: Vec<_> = cache
            .search("tho")
            .into_iter()
            .map(|h| h.record)
            .filter(|r| category.matches(r, &spec))
            .collect();
        ids(&hits)
    };

    assert_eq!(by_category, by_search);
    assert_eq!(by_search.len(), 2);

    // The cache's own filter state yields the same set.
    cache.set_filter(category);
    cache.set_filter(Filter::Text("tho".to_string()));
    assert_eq!(ids(&cache.visible()), by_search);
    let hits: Vec<_> = cache.search_visible("tho").into_iter().map(|h| h.record).collect();
    assert_eq!(ids(&hits), by_search);
}

#[tokio::test]
async fn deleted_record_disappears_from_every_view() {
    let store = MemoryStore::new();
    let mut cache = loaded_characters(&store).await;
    let mut last = None;
    for name in ["Thorne", "Thorvald", "Vess"] {
        last = Some(cache.create(fields(json!({ "title": name, "status": "alive" }))).await.unwrap().id.clone());
    }
    let gone = last.unwrap();
    let alive_before = cache.counts("status").unwrap().get("alive");

    cache.delete(&gone).await.unwrap();

    assert!(cache.get(&gone).is_none());
    assert!(cache.visible().iter().all(|r| r.id != gone));
    assert!(cache.search("v").iter().all(|h| h.record.id != gone));
    assert!(cache.search("vess").is_empty());
    let counts = cache.counts("status").unwrap();
    assert_eq!(counts.get("alive"), alive_before - 1);
    assert_eq!(counts.total, 2);
}

// ============================================================================
// Collaborators
// ============================================================================

#[tokio::test]
async fn counts_and_filters_agree_on_buckets() {
    let store = MemoryStore::new();
    let mut cache = CollectionCache::new(store.clone(), CollectionSpec::factions());
    cache.load().await.unwrap();
    for (name, kind) in [
        ("Iron Veil", "military"),
        ("Ashen Court", "religious"),
        ("Drift", "pirates"),
        ("Tollward", "military"),
    ] {
        cache.create(fields(json!({ "title": name, "type": kind }))).await.unwrap();
    }

    let counts = cache.counts("type").unwrap();
    assert_eq!(counts.get("military"), 2);
    assert_eq!(counts.get("other"), 1);
    for (bucket, count) in &counts.buckets {
        let filter = FilterSet::new().with(Filter::for_field(cache.spec(), "type", bucket));
        assert_eq!(cache.filtered(&filter).len(), *count, "bucket {}", bucket);
    }
}

#[tokio::test]
async fn keeper_edits_are_audited() {
    let store = MemoryStore::new();
    let keeper = Viewer::new("k1", "Keeper Ilsa", Role::Keeper);
    let log = Arc::new(ChangeLog::new(store.clone(), &keeper));
    let mut cache = loaded_characters(&store).await.with_changelog(log.clone());

    let mut input = fields(json!({ "title": "Thorne", "synopsis": "A ranger of the marches." }));
    input.extend(keeper.author_fields());
    cache.create(input).await.unwrap();
    log.flush().await;

    let entries = store.documents(CHANGELOG_COLLECTION);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].fields["summary"], "New character added: Thorne");
    assert_eq!(entries[0].fields["preview"], "A ranger of the marches.");
    assert_eq!(entries[0].fields["authorUid"], "k1");
    assert_eq!(cache.count_by_author("k1"), 1);
}

#[tokio::test]
async fn lore_and_updates_are_not_audited() {
    let store = MemoryStore::new();
    let keeper = Viewer::new("k1", "Keeper Ilsa", Role::Keeper);
    let log = Arc::new(ChangeLog::new(store.clone(), &keeper));

    let mut lore = CollectionCache::new(store.clone(), CollectionSpec::lore()).with_changelog(log.clone());
    lore.load().await.unwrap();
    let id = lore
        .create(fields(json!({ "title": "The Sundering", "content": "The sky broke." })))
        .await
        .unwrap()
        .id
        .clone();
    lore.update(&id, fields(json!({ "category": "history" }))).await.unwrap();

    let mut updates = CollectionCache::new(store.clone(), CollectionSpec::updates()).with_changelog(log.clone());
    updates.load().await.unwrap();
    updates.create(fields(json!({ "content": "Session 12 tonight" }))).await.unwrap();
    log.flush().await;

    assert!(store.documents(CHANGELOG_COLLECTION).is_empty());
    assert_eq!(store.documents("lore").len(), 1);
    assert_eq!(store.documents("updates").len(), 1);
}

#[tokio::test]
async fn reload_picks_up_writes_from_other_clients() {
    let store = MemoryStore::new();
    let mut cache = loaded_characters(&store).await;
    let mut other = loaded_characters(&store).await;

    other.create(fields(json!({ "title": "Vess" }))).await.unwrap();
    assert!(cache.is_empty());

    cache.load().await.unwrap();
    assert_eq!(cache.len(), 1);
    assert!(cache.loaded_at().is_some());
    assert_eq!(cache.age_display(), "just now");
}
