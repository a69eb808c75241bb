//! Response collection against scripted collaborators
//!
//! Covers idempotent re-runs, resuming after interruption, isolation of
//! per-record fetch failures, attachment handling and inline clustering.

mod common;

use common::{create_test_store, ScriptedResolver, ScriptedSource};
use consultatie::{
    add_components, CancellationToken, ClusterConfig, CollectError, Collector, ConsultationSlug, RecordStore,
    ResponseOptions, ResponseRecord,
};
use std::sync::Arc;

const SLUG: &str = "windpark-kust";

fn slug() -> ConsultationSlug {
    ConsultationSlug::new(SLUG)
}

fn response(id: &str, text: &str) -> ResponseRecord {
    ResponseRecord::new(SLUG, id, text)
}

fn five_responses() -> Vec<ResponseRecord> {
    vec![
        response("1", "Please reject this proposal entirely").with_author("A. de Vries"),
        response("2", "Please reject this proposal entirely."),
        response("3", "I support this regulation fully"),
        response("4", "The turbines will harm migrating birds along the coast"),
        response("5", "the turbines will harm migrating birds along the coast!"),
    ]
}

fn text_only() -> ResponseOptions {
    ResponseOptions {
        download_attachments: false,
        extract_attachment_text: false,
        cluster: ClusterConfig::new(3, 0.3).unwrap(),
        ..ResponseOptions::default()
    }
}

fn ids(records: &[ResponseRecord]) -> Vec<&str> {
    records.iter().map(|r| r.response_id.as_str()).collect()
}

#[tokio::test]
async fn stores_every_listed_response_in_listing_order() {
    let store = create_test_store();
    let source = Arc::new(ScriptedSource::new().with_responses(five_responses()));
    let collector = Collector::new(store.clone(), source, Arc::new(ScriptedResolver::new()));

    let report = collector.collect_responses(&slug(), &text_only()).await.unwrap();

    assert_eq!(report.listed, 5);
    assert_eq!(report.fetched, 5);
    assert_eq!(report.skipped, 0);
    assert!(report.listing_complete);
    let stored = store.load_responses(&slug()).unwrap();
    assert_eq!(ids(&stored), vec!["1", "2", "3", "4", "5"]);
}

#[tokio::test]
async fn second_run_changes_nothing() {
    let store = create_test_store();
    let source = Arc::new(ScriptedSource::new().with_responses(five_responses()));
    let collector = Collector::new(store.clone(), source.clone(), Arc::new(ScriptedResolver::new()));

    collector.collect_responses(&slug(), &text_only()).await.unwrap();
    let after_first = store.load_responses(&slug()).unwrap();

    let report = collector.collect_responses(&slug(), &text_only()).await.unwrap();
    let after_second = store.load_responses(&slug()).unwrap();

    assert_eq!(report.fetched, 0);
    assert_eq!(report.skipped, 5);
    assert_eq!(after_first, after_second);
    assert_eq!(source.fetched_keys().len(), 5);
}

#[tokio::test]
async fn interrupted_run_resumes_without_refetching() {
    let store = create_test_store();
    let token = CancellationToken::new();
    let first_source = Arc::new(
        ScriptedSource::new()
            .with_responses(five_responses())
            .cancelling_after(2, token.clone()),
    );
    let first = Collector::new(store.clone(), first_source, Arc::new(ScriptedResolver::new())).with_cancellation(token);

    let report = first.collect_responses(&slug(), &text_only()).await.unwrap();
    assert!(report.cancelled);
    assert_eq!(report.fetched, 2);
    assert_eq!(report.components, None);
    assert_eq!(store.count_responses(&slug()).unwrap(), 2);

    let second_source = Arc::new(
        ScriptedSource::new()
            .with_responses(five_responses())
            .guarded_by(store.clone()),
    );
    let second = Collector::new(store.clone(), second_source.clone(), Arc::new(ScriptedResolver::new()));
    let report = second.collect_responses(&slug(), &text_only()).await.unwrap();

    assert_eq!(second_source.refetch_attempts(), 0);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.fetched, 3);
    assert_eq!(ids(&store.load_responses(&slug()).unwrap()), vec!["1", "2", "3", "4", "5"]);
}

#[tokio::test]
async fn failed_fetch_is_skipped_and_retried_next_run() {
    let store = create_test_store();
    let source = Arc::new(
        ScriptedSource::new()
            .with_responses(five_responses())
            .failing_on("windpark-kust/3"),
    );
    let collector = Collector::new(store.clone(), source.clone(), Arc::new(ScriptedResolver::new()));

    let report = collector.collect_responses(&slug(), &text_only()).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.fetched, 4);
    assert_eq!(ids(&store.load_responses(&slug()).unwrap()), vec!["1", "2", "4", "5"]);

    source.heal("windpark-kust/3");
    let report = collector.collect_responses(&slug(), &text_only()).await.unwrap();
    assert_eq!(report.failed, 0);
    assert_eq!(report.fetched, 1);
    assert_eq!(store.count_responses(&slug()).unwrap(), 5);
}

#[tokio::test]
async fn failed_listing_page_ends_the_run() {
    let store = create_test_store();
    let source = Arc::new(
        ScriptedSource::new()
            .with_responses(five_responses())
            .with_page_size(2)
            .failing_listing_page(1),
    );
    let collector = Collector::new(store.clone(), source, Arc::new(ScriptedResolver::new()));

    let report = collector.collect_responses(&slug(), &text_only()).await.unwrap();

    assert!(!report.listing_complete);
    assert_eq!(report.fetched, 2);
    assert_eq!(store.count_responses(&slug()).unwrap(), 2);
}

#[tokio::test]
async fn author_names_are_dropped_unless_requested() {
    let store = create_test_store();
    let source = Arc::new(ScriptedSource::new().with_responses(five_responses()));
    let collector = Collector::new(store.clone(), source, Arc::new(ScriptedResolver::new()));
    collector.collect_responses(&slug(), &text_only()).await.unwrap();
    let stored = store.load_responses(&slug()).unwrap();
    assert!(stored.iter().all(|r| r.author_name.is_none()));

    let named_store = create_test_store();
    let source = Arc::new(ScriptedSource::new().with_responses(five_responses()));
    let collector = Collector::new(named_store.clone(), source, Arc::new(ScriptedResolver::new()));
    let options = ResponseOptions {
        include_author_name: true,
        ..text_only()
    };
    collector.collect_responses(&slug(), &options).await.unwrap();
    let stored = named_store.load_responses(&slug()).unwrap();
    assert_eq!(stored[0].author_name.as_deref(), Some("A. de Vries"));
}

#[tokio::test]
async fn components_assigned_after_collection() {
    let store = create_test_store();
    let source = Arc::new(ScriptedSource::new().with_responses(five_responses()));
    let collector = Collector::new(store.clone(), source, Arc::new(ScriptedResolver::new()));

    let report = collector.collect_responses(&slug(), &text_only()).await.unwrap();
    assert_eq!(report.components, Some(3));

    let stored = store.load_responses(&slug()).unwrap();
    let label = |id: &str| stored.iter().find(|r| r.response_id == id).unwrap().component;
    assert_eq!(label("1"), label("2"));
    assert_eq!(label("4"), label("5"));
    assert_ne!(label("1"), label("3"));
    assert_ne!(label("1"), label("4"));
    assert!(stored.iter().all(|r| r.component.is_some()));
}

#[tokio::test]
async fn clustering_can_be_deferred() {
    let store = create_test_store();
    let source = Arc::new(ScriptedSource::new().with_responses(five_responses()));
    let collector = Collector::new(store.clone(), source, Arc::new(ScriptedResolver::new()));
    let options = ResponseOptions {
        detect_components: false,
        ..text_only()
    };

    let report = collector.collect_responses(&slug(), &options).await.unwrap();
    assert_eq!(report.components, None);
    assert!(store.load_responses(&slug()).unwrap().iter().all(|r| r.component.is_none()));

    let config = ClusterConfig::new(3, 0.3).unwrap();
    let count = collector.recluster(&slug(), &config).unwrap();
    assert_eq!(count, 3);

    let stored = store.load_responses(&slug()).unwrap();
    let fresh = add_components(stored.clone(), &config);
    assert_eq!(stored, fresh);
}

#[tokio::test]
async fn attachments_are_saved_and_read() {
    let dir = tempfile::tempdir().unwrap();
    let first_url = "https://portal.test/windpark-kust/reactie/6/bestand/5521/brief.txt";
    let second_url = "https://portal.test/windpark-kust/reactie/7/bestand/5522/brief.txt";
    let letter = "we the undersigned ask the minister to withdraw the bill now";

    let store = create_test_store();
    let source = Arc::new(
        ScriptedSource::new()
            .with_response(response("6", "See attachment").with_attachment(first_url))
            .with_response(response("7", "Zie bijlage").with_attachment(second_url)),
    );
    let resolver = Arc::new(
        ScriptedResolver::new()
            .with_file(first_url, letter.as_bytes(), Some("text/plain"))
            .with_file(second_url, letter.as_bytes(), Some("text/plain; charset=utf-8")),
    );
    let collector =
        Collector::new(store.clone(), source, resolver.clone()).with_attachments_dir(dir.path().join("attachments"));
    let options = ResponseOptions {
        cluster: ClusterConfig::new(3, 0.3).unwrap(),
        ..ResponseOptions::default()
    };

    let report = collector.collect_responses(&slug(), &options).await.unwrap();
    assert_eq!(report.attachments_saved, 2);
    assert_eq!(resolver.downloads(), vec![first_url, second_url]);

    let stored = store.load_responses(&slug()).unwrap();
    assert_eq!(stored[0].text_attachment.as_deref(), Some(letter));

    let saved = dir.path().join("attachments").join("5521.txt");
    assert_eq!(
        stored[0].attachment_refs[0].local_path.as_deref(),
        Some(saved.display().to_string().as_str())
    );
    assert_eq!(std::fs::read_to_string(&saved).unwrap(), letter);

    // different response texts, same letter: the attachment carries the similarity
    assert_eq!(stored[0].component, stored[1].component);
}

#[tokio::test]
async fn present_attachment_files_are_reused() {
    let dir = tempfile::tempdir().unwrap();
    let url = "https://portal.test/windpark-kust/reactie/8/bestand/900/notitie.txt";
    std::fs::write(dir.path().join("900.txt"), "already on disk").unwrap();

    let store = create_test_store();
    let source = Arc::new(ScriptedSource::new().with_response(response("8", "zie bijlage").with_attachment(url)));
    let resolver = Arc::new(ScriptedResolver::new());
    let collector = Collector::new(store.clone(), source, resolver.clone()).with_attachments_dir(dir.path());

    let report = collector.collect_responses(&slug(), &ResponseOptions::default()).await.unwrap();

    assert!(resolver.downloads().is_empty());
    assert_eq!(report.attachment_failures, 0);
    let stored = store.load_responses(&slug()).unwrap();
    assert_eq!(stored[0].text_attachment.as_deref(), Some("already on disk"));
}

#[tokio::test]
async fn missing_attachment_does_not_lose_the_response() {
    let dir = tempfile::tempdir().unwrap();
    let store = create_test_store();
    let url = "https://portal.test/windpark-kust/reactie/9/bestand/404/weg.pdf";
    let source = Arc::new(ScriptedSource::new().with_response(response("9", "zie bijlage").with_attachment(url)));
    let collector =
        Collector::new(store.clone(), source, Arc::new(ScriptedResolver::new())).with_attachments_dir(dir.path());

    let report = collector.collect_responses(&slug(), &ResponseOptions::default()).await.unwrap();

    assert_eq!(report.attachment_failures, 1);
    assert_eq!(report.fetched, 1);
    let stored = store.load_responses(&slug()).unwrap();
    assert_eq!(stored[0].attachment_refs[0].local_path, None);
    assert_eq!(stored[0].text_attachment, None);
}

#[tokio::test]
async fn failed_attachment_is_retried_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let url = "https://portal.test/windpark-kust/reactie/10/bestand/610/brief.txt";
    let letter = "campaign letter text here";
    let store = create_test_store();
    let listed = || ScriptedSource::new().with_response(response("10", "zie bijlage").with_attachment(url));

    // first run: the attachment host is down
    let first = Collector::new(store.clone(), Arc::new(listed()), Arc::new(ScriptedResolver::new()))
        .with_attachments_dir(dir.path());
    let report = first.collect_responses(&slug(), &ResponseOptions::default()).await.unwrap();
    assert_eq!(report.attachment_failures, 1);
    assert_eq!(store.load_responses(&slug()).unwrap()[0].text_attachment, None);

    // second run: the response is not fetched again, only its attachment
    let source = Arc::new(listed().guarded_by(store.clone()));
    let resolver = Arc::new(ScriptedResolver::new().with_file(url, letter.as_bytes(), Some("text/plain")));
    let second = Collector::new(store.clone(), source.clone(), resolver.clone()).with_attachments_dir(dir.path());
    let report = second.collect_responses(&slug(), &ResponseOptions::default()).await.unwrap();

    assert_eq!(source.refetch_attempts(), 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.attachments_saved, 1);
    let stored = store.load_responses(&slug()).unwrap();
    assert_eq!(stored[0].text_attachment.as_deref(), Some(letter));
    assert!(stored[0].attachment_refs[0].local_path.is_some());

    // third run: nothing left to resolve
    second.collect_responses(&slug(), &ResponseOptions::default()).await.unwrap();
    assert_eq!(resolver.downloads().len(), 1);
}

#[tokio::test]
async fn downloading_without_a_directory_is_refused() {
    let store = create_test_store();
    let source = Arc::new(ScriptedSource::new().with_responses(five_responses()));
    let collector = Collector::new(store.clone(), source, Arc::new(ScriptedResolver::new()));

    let result = collector.collect_responses(&slug(), &ResponseOptions::default()).await;

    assert!(matches!(result, Err(CollectError::MissingDirectory("attachments"))));
    assert_eq!(store.count_responses(&slug()).unwrap(), 0);
}

#[tokio::test]
async fn opened_collector_saves_attachments_beside_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let url = "https://portal.test/windpark-kust/reactie/11/bestand/711/brief.txt";
    let source = Arc::new(ScriptedSource::new().with_response(response("11", "zie bijlage").with_attachment(url)));
    let resolver = Arc::new(ScriptedResolver::new().with_file(url, b"campaign letter text here", Some("text/plain")));
    let collector = Collector::open(dir.path().join("c.db"), source, resolver).unwrap();

    let report = collector.collect_responses(&slug(), &ResponseOptions::default()).await.unwrap();

    assert_eq!(report.attachments_saved, 1);
    let saved = dir.path().join("attachments").join("711.txt");
    assert_eq!(std::fs::read_to_string(&saved).unwrap(), "campaign letter text here");
    let stored = collector.store().load_responses(&slug()).unwrap();
    assert_eq!(
        stored[0].attachment_refs[0].local_path.as_deref(),
        Some(saved.display().to_string().as_str())
    );
}

#[tokio::test]
async fn reclustering_replaces_every_label() {
    let store = create_test_store();
    let source = Arc::new(ScriptedSource::new().with_responses(five_responses()));
    let collector = Collector::new(store.clone(), source, Arc::new(ScriptedResolver::new()));
    collector.collect_responses(&slug(), &text_only()).await.unwrap();

    // a stricter threshold splits every pair
    let strict = ClusterConfig::new(3, 1.0).unwrap();
    assert_eq!(collector.recluster(&slug(), &strict).unwrap(), 5);

    let stored = store.load_responses(&slug()).unwrap();
    assert_eq!(stored, add_components(stored.clone(), &strict));
}
