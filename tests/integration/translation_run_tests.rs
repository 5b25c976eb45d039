/*!
 * End-to-end translation runs over a local cache and the mock provider
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use sitelingo::cache::{CacheState, CacheStore, EntryStatus, FAILED_HASH, FlushOutcome};
use sitelingo::document::{CONTROL_SENTINEL, Document};
use sitelingo::file_utils::FileManager;
use sitelingo::orchestrator::{Orchestrator, TaskSource, TaskStatus};
use sitelingo::providers::mock::MockProvider;
use sitelingo::translation::PromptTemplate;

use crate::common::fixtures::{ABOUT_HTML, INDEX_HTML, SITEMAP_XML};
use crate::common::{
    create_temp_dir, create_test_file, local_orchestrator, local_store, mock_client, sample_documents, test_config,
};

#[tokio::test]
async fn test_run_withColdCache_shouldTranslateEveryPageOnce() {
    let dir = create_temp_dir().unwrap();
    let config = test_config(dir.path());
    let provider = MockProvider::working();

    let report = local_orchestrator(&config, &provider)
        .run(sample_documents(), None)
        .await
        .unwrap();

    assert_eq!(report.cache_state, CacheState::Cold);
    assert_eq!(provider.request_count(), 4);
    assert_eq!(report.summary.tasks, 4);
    assert_eq!(report.summary.translated, 4);
    assert_eq!(report.summary.cache_hits, 0);
    assert!(!report.has_failures());
    assert!(report.summary.usage.total_tokens() > 0);
    assert!(report.summary.estimated_cost > 0.0);

    // Document-major order
    let order: Vec<(&str, &str)> = report
        .outcomes
        .iter()
        .map(|o| (o.relative_path.as_str(), o.language.as_str()))
        .collect();
    assert_eq!(
        order,
        vec![
            ("index.html", "es"),
            ("index.html", "fr"),
            ("about.html", "es"),
            ("about.html", "fr"),
        ]
    );
}

#[tokio::test]
async fn test_run_shouldRenderLocalizedPage() {
    let dir = create_temp_dir().unwrap();
    let config = test_config(dir.path());
    let provider = MockProvider::working();

    let report = local_orchestrator(&config, &provider)
        .run(sample_documents(), None)
        .await
        .unwrap();
    let outcome = report.outcome("index.html", "es").unwrap();
    assert_eq!(outcome.status, TaskStatus::Done);
    let html = outcome.html.as_deref().unwrap();

    assert!(html.contains(r#"<html lang="es">"#));
    assert!(html.contains("<title>«es» Acme Home</title>"));
    assert!(html.contains(r#"content="«es» Tools for builders""#));
    assert!(html.contains("<p>«es» Hello <b>«es» world</b></p>"));
    assert!(html.contains(r#"var greeting = "do not translate";"#));
    assert!(!html.contains(CONTROL_SENTINEL));

    // Links
    assert!(html.contains(r#"href="https://example.com/es/about.html""#));
    assert!(html.contains(r#"href="/login""#));
    assert!(html.contains(r#"href="https://github.com/acme""#));
    assert!(html.contains(r##"href="#top""##));

    // Canonical and alternates
    assert!(html.contains(r#"<link rel="canonical" href="https://example.com/es/">"#));
    assert!(html.contains(r#"<meta property="og:url" content="https://example.com/es/">"#));
    assert!(html.contains(r#"hreflang="fr" href="https://example.com/fr/""#));
    assert!(html.contains(r#"hreflang="en" href="https://example.com/""#));
    assert!(html.contains(r#"hreflang="x-default" href="https://example.com/""#));
}

#[tokio::test]
async fn test_run_secondRun_shouldServeEverythingFromCache() {
    let dir = create_temp_dir().unwrap();
    let config = test_config(dir.path());
    let provider = MockProvider::working();

    let first = local_orchestrator(&config, &provider)
        .run(sample_documents(), None)
        .await
        .unwrap();
    let second = local_orchestrator(&config, &provider)
        .run(sample_documents(), None)
        .await
        .unwrap();

    assert_eq!(provider.request_count(), 4);
    assert_eq!(second.cache_state, CacheState::Warm);
    assert_eq!(second.summary.cache_hits, 4);
    assert_eq!(second.summary.translated, 0);
    assert!(second.outcomes.iter().all(|o| o.source == TaskSource::CacheHit));
    for (a, b) in first.pages().zip(second.pages()) {
        assert_eq!(a, b);
    }
}

#[tokio::test]
async fn test_run_withEditedPage_shouldOnlyRetranslateThatPage() {
    let dir = create_temp_dir().unwrap();
    let config = test_config(dir.path());
    let provider = MockProvider::working();

    local_orchestrator(&config, &provider)
        .run(sample_documents(), None)
        .await
        .unwrap();

    let edited = vec![
        Document::new("index.html", INDEX_HTML.replace("Welcome to Acme", "Welcome back")),
        Document::new("about.html", ABOUT_HTML),
    ];
    let report = local_orchestrator(&config, &provider).run(edited, None).await.unwrap();

    assert_eq!(provider.request_count(), 6);
    assert_eq!(report.summary.translated, 2);
    assert_eq!(report.summary.cache_hits, 2);
    assert_eq!(report.outcome("about.html", "fr").unwrap().source, TaskSource::CacheHit);
}

#[tokio::test]
async fn test_run_withChangedPrompt_shouldRetranslateEverything() {
    let dir = create_temp_dir().unwrap();
    let config = test_config(dir.path());
    let provider = MockProvider::working();

    local_orchestrator(&config, &provider)
        .run(sample_documents(), None)
        .await
        .unwrap();

    let template = PromptTemplate::new("Translate {brand} pages.\nTarget locale: {target_code}\nKeep {sentinel}.");
    let client = mock_client(&config, &provider).with_template(template);
    let report = Orchestrator::new(&config, client, local_store(&config))
        .unwrap()
        .run(sample_documents(), None)
        .await
        .unwrap();

    assert_eq!(provider.request_count(), 8);
    assert_eq!(report.summary.cache_hits, 0);
    assert_eq!(report.summary.translated, 4);
}

#[tokio::test]
async fn test_run_afterFailure_shouldRetryEvenWithoutExpiry() {
    for window in [0, 3600] {
        let dir = create_temp_dir().unwrap();
        let mut config = test_config(dir.path());
        config.cache.recheck_window_secs = window;

        let failing = MockProvider::failing();
        let report = local_orchestrator(&config, &failing)
            .run(sample_documents(), None)
            .await
            .unwrap();

        assert_eq!(report.summary.failed, 4);
        assert!(report.has_failures());
        let outcome = report.outcome("index.html", "es").unwrap();
        assert_eq!(outcome.source, TaskSource::Fallback);
        assert!(matches!(outcome.status, TaskStatus::TranslationFailed(_)));
        // The page still ships, in the source language
        assert!(outcome.html.as_deref().unwrap().contains("Welcome to Acme"));

        let store = local_store(&config);
        let meta = store
            .load_meta("es", &mock_client(&config, &failing).prompt_hash("es"))
            .unwrap();
        let entry = &meta.entries["index.html"];
        assert_eq!(entry.status, EntryStatus::Failed);
        assert_eq!(entry.content_hash, FAILED_HASH);

        let working = MockProvider::working();
        let retry = local_orchestrator(&config, &working)
            .run(sample_documents(), None)
            .await
            .unwrap();

        assert_eq!(working.request_count(), 4, "window {}", window);
        assert_eq!(retry.summary.translated, 4);
        assert!(!retry.has_failures());
    }
}

#[tokio::test]
async fn test_run_withAlteredSentinel_shouldFlagIntegrityAndKeepPage() {
    let dir = create_temp_dir().unwrap();
    let config = test_config(dir.path());
    let provider = MockProvider::drop_sentinel();

    let report = local_orchestrator(&config, &provider)
        .run(sample_documents(), None)
        .await
        .unwrap();

    assert_eq!(report.summary.integrity_failures, 4);
    let outcome = report.outcome("about.html", "fr").unwrap();
    assert!(matches!(outcome.status, TaskStatus::IntegrityFailed(_)));
    assert!(outcome.html.as_deref().unwrap().contains("«fr» We build tools."));

    // Failed entries are never reused
    let working = MockProvider::working();
    local_orchestrator(&config, &working)
        .run(sample_documents(), None)
        .await
        .unwrap();
    assert_eq!(working.request_count(), 4);
}

#[tokio::test]
async fn test_run_withEmptyResponse_shouldFallBackToSource() {
    let dir = create_temp_dir().unwrap();
    let config = test_config(dir.path());
    let provider = MockProvider::empty();

    let report = local_orchestrator(&config, &provider)
        .run(sample_documents(), None)
        .await
        .unwrap();

    assert_eq!(report.summary.failed, 4);
    assert!(report.pages().all(|(_, _, html)| !html.contains('«')));
}

#[tokio::test]
async fn test_run_withMissingArtifact_shouldRetranslateThatTask() {
    let dir = create_temp_dir().unwrap();
    let config = test_config(dir.path());
    let provider = MockProvider::working();

    local_orchestrator(&config, &provider)
        .run(sample_documents(), None)
        .await
        .unwrap();
    std::fs::remove_file(dir.path().join("es/pages/index.html")).unwrap();

    let report = local_orchestrator(&config, &provider)
        .run(sample_documents(), None)
        .await
        .unwrap();

    assert_eq!(provider.request_count(), 5);
    assert_eq!(report.outcome("index.html", "es").unwrap().source, TaskSource::Translated);
    assert_eq!(report.summary.cache_hits, 3);
    assert!(dir.path().join("es/pages/index.html").exists());
}

#[tokio::test]
async fn test_run_withRemovedPage_shouldSweepItsArtifactsOnPublish() {
    let dir = create_temp_dir().unwrap();
    let mut config = test_config(dir.path());
    config.cache.publish = true;
    let provider = MockProvider::working();

    let mut documents = sample_documents();
    documents.push(Document::new("a/b.html", "<html><body><p>Nested page</p></body></html>"));
    local_orchestrator(&config, &provider).run(documents, None).await.unwrap();
    assert!(dir.path().join("es/pages/a/b.html").exists());
    assert!(dir.path().join("fr/pages/a/b.html").exists());

    let report = local_orchestrator(&config, &provider)
        .run(sample_documents(), None)
        .await
        .unwrap();

    assert_eq!(report.flush, Some(FlushOutcome::Saved { swept: 2 }));
    assert!(!dir.path().join("es/pages/a/b.html").exists());
    assert!(!dir.path().join("fr/pages/a").exists());
    assert!(dir.path().join("es/pages/index.html").exists());

    let store = local_store(&config);
    let meta = store
        .load_meta("es", &mock_client(&config, &provider).prompt_hash("es"))
        .unwrap();
    assert!(!meta.entries.contains_key("a/b.html"));
    assert!(meta.entries.contains_key("index.html"));
    assert!(dir.path().join("README.md").exists());
}

#[tokio::test]
async fn test_run_shouldMergeAlternatesIntoOriginalsAndSitemap() {
    let dir = create_temp_dir().unwrap();
    let config = test_config(dir.path());
    let provider = MockProvider::working();

    let report = local_orchestrator(&config, &provider)
        .run(sample_documents(), Some(SITEMAP_XML.to_string()))
        .await
        .unwrap();

    let original = report
        .originals
        .iter()
        .find(|d| d.relative_path == "about.html")
        .unwrap();
    assert!(original.source.contains(r#"hreflang="es" href="https://example.com/es/about.html""#));
    assert!(original.source.contains("<p>We build tools.</p>"));

    let sitemap = report.sitemap.as_deref().unwrap();
    assert!(sitemap.contains("xmlns:xhtml"));
    assert!(sitemap.contains(r#"hreflang="fr" href="https://example.com/fr/about.html""#));
    assert!(sitemap.contains(r#"hreflang="x-default" href="https://example.com/""#));
}

#[tokio::test]
async fn test_run_shouldReportProgressPerBatch() {
    let dir = create_temp_dir().unwrap();
    let config = test_config(dir.path());
    let provider = MockProvider::working();
    let calls = Arc::new(AtomicUsize::new(0));
    let last = Arc::new(Mutex::new((0, 0)));

    let progress_calls = Arc::clone(&calls);
    let progress_last = Arc::clone(&last);
    let orchestrator = local_orchestrator(&config, &provider).with_progress(Arc::new(
        move |done: usize, total: usize| {
            progress_calls.fetch_add(1, Ordering::SeqCst);
            *progress_last.lock() = (done, total);
        },
    ));
    orchestrator.run(sample_documents(), None).await.unwrap();

    // Four tasks in batches of three
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(*last.lock(), (4, 4));
}

#[tokio::test]
async fn test_run_withRepeatedLanguage_shouldRunOneTaskPerLanguage() {
    let dir = create_temp_dir().unwrap();
    let mut config = test_config(dir.path());
    config.site.target_languages = vec!["es".to_string(), "ES".to_string(), "fr".to_string()];
    let provider = MockProvider::working();

    let orchestrator = local_orchestrator(&config, &provider);
    assert_eq!(orchestrator.languages(), ["es".to_string(), "fr".to_string()]);

    let report = orchestrator.run(sample_documents(), None).await.unwrap();
    assert_eq!(report.summary.tasks, 4);
    assert_eq!(provider.request_count(), 4);
}

#[tokio::test]
async fn test_run_withSlowProvider_shouldOverlapTasksOfOneBatch() {
    let dir = create_temp_dir().unwrap();
    let mut config = test_config(dir.path());
    config.orchestration.batch_size = 4;
    let provider = MockProvider::slow(300);

    let start = std::time::Instant::now();
    let report = local_orchestrator(&config, &provider)
        .run(sample_documents(), None)
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert_eq!(report.summary.translated, 4);
    assert!(report.outcomes.iter().all(|o| o.api_time >= Duration::from_millis(300)));
    // One-at-a-time calls would need at least 1.2s
    assert!(elapsed < Duration::from_millis(1100), "run took {:?}", elapsed);
}

#[tokio::test]
async fn test_writeReport_shouldPlacePagesUnderLanguageDirectories() {
    let dir = create_temp_dir().unwrap();
    let site = dir.path().join("site");
    create_test_file(&site, "index.html", INDEX_HTML).unwrap();
    create_test_file(&site, "about.html", ABOUT_HTML).unwrap();
    create_test_file(&site, "sitemap.xml", SITEMAP_XML).unwrap();
    let config = test_config(&dir.path().join("mirror"));
    let provider = MockProvider::working();

    let documents = FileManager::discover_documents(&site, &config.target_languages()).unwrap();
    let sitemap = FileManager::read_optional(site.join("sitemap.xml")).unwrap();
    let report = local_orchestrator(&config, &provider).run(documents, sitemap).await.unwrap();
    let written = FileManager::write_report(&site, &config.site.sitemap_path, &report).unwrap();

    assert_eq!(written.pages, 4);
    assert_eq!(written.originals, 2);
    assert!(written.sitemap);
    assert!(site.join("es/index.html").is_file());
    assert!(site.join("fr/about.html").is_file());
    let index = std::fs::read_to_string(site.join("index.html")).unwrap();
    assert!(index.contains(r#"hreflang="es""#));

    // Generated locale directories are not picked up as sources
    let rediscovered = FileManager::discover_documents(&site, &config.target_languages()).unwrap();
    assert_eq!(rediscovered.len(), 2);
}
