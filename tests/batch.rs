mod common;

use common::*;
use pricefetch::batch::{GroupOutcome, ItemGroup};
use pricefetch::error::Error;
use pricefetch::item::{Variant, WorkItem};
use pricefetch::queue::CancelHandle;
use pricefetch::CacheStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

async fn cache_with(keys: &[&str]) -> Arc<CacheStore> {
    let cache = Arc::new(CacheStore::in_memory());
    for key in keys {
        cache.put(key, &record_for(key)).await.unwrap();
    }
    cache
}

#[tokio::test(start_paused = true)]
async fn all_hits_complete_without_network() {
    let extractor = Arc::new(ScriptedExtractor::new());
    let orchestrator = orchestrator_with(extractor.clone(), cache_with(&["a", "b"]).await);
    let mut renderer = RecordingRenderer::default();
    let started = Instant::now();

    let results = orchestrator
        .run_batch(vec![item("a"), item("b")], &mut renderer, CancelHandle::new())
        .await
        .into_results()
        .expect("completed");

    assert_eq!(started.elapsed(), Duration::ZERO);
    assert!(extractor.calls().is_empty());
    assert_eq!(results.len(), 2);
    assert_eq!(renderer.rendered.len(), 2);
    assert_eq!(orchestrator.queue().get_metrics().cache_hits, 2);
}

#[tokio::test(start_paused = true)]
async fn hits_and_fetched_misses_are_merged() {
    let extractor = Arc::new(ScriptedExtractor::new());
    let orchestrator = orchestrator_with(extractor.clone(), cache_with(&["a"]).await);
    let mut renderer = RecordingRenderer::default();

    let results = orchestrator
        .run_batch(
            vec![item("a"), item("b"), WorkItem::unkeyed("none"), item("c")],
            &mut renderer,
            CancelHandle::new(),
        )
        .await
        .into_results()
        .unwrap();

    assert_eq!(extractor.calls(), vec!["b", "c"]);
    let mut keys: Vec<_> = results.keys().cloned().collect();
    keys.sort();
    assert_eq!(keys, vec!["a", "b", "c"]);

    // The cache hit renders first, before any fetch.
    assert_eq!(renderer.rendered[0].0, "a");

    let metrics = orchestrator.queue().get_metrics();
    assert_eq!(metrics.items_queued, 4);
    assert_eq!(metrics.cache_misses, 2);
    assert_eq!(metrics.items_skipped, 1);
}

#[tokio::test(start_paused = true)]
async fn three_misses_with_one_rate_limit() {
    let extractor = Arc::new(ScriptedExtractor::new());
    extractor.script("B", vec![Reply::Status(429)]);
    let orchestrator = orchestrator_with(extractor.clone(), Arc::new(CacheStore::in_memory()));

    let results = orchestrator
        .run_batch(
            vec![item("A"), item("B"), item("C")],
            &mut RecordingRenderer::default(),
            CancelHandle::new(),
        )
        .await
        .into_results()
        .unwrap();

    assert_eq!(extractor.calls(), vec!["A", "B", "C", "B"]);
    assert_eq!(results.len(), 3);
    assert_eq!(orchestrator.queue().get_metrics().current_delay_ms, 2000);
}

#[tokio::test(start_paused = true)]
async fn cancelled_batch_reports_nothing() {
    let extractor = Arc::new(ScriptedExtractor::new());
    let orchestrator = orchestrator_with(extractor.clone(), cache_with(&["a"]).await);

    let cancel = CancelHandle::new();
    extractor.cancel_during("b", cancel.clone());

    let outcome = orchestrator
        .run_batch(
            vec![item("a"), item("b"), item("c")],
            &mut RecordingRenderer::default(),
            cancel,
        )
        .await;

    assert!(outcome.is_cancelled());
    assert_eq!(extractor.calls(), vec!["b"]);
}

#[tokio::test(start_paused = true)]
async fn foil_and_regular_resolve_separately() {
    let extractor = Arc::new(ScriptedExtractor::new());
    let orchestrator = orchestrator_with(extractor.clone(), Arc::new(CacheStore::in_memory()));
    let link = Some("https://shop.example/Products/Bolt");

    let results = orchestrator
        .run_batch(
            vec![
                WorkItem::from_link("Bolt", link, Variant::Regular, ""),
                WorkItem::from_link("Bolt", link, Variant::Foil, ""),
            ],
            &mut RecordingRenderer::default(),
            CancelHandle::new(),
        )
        .await
        .into_results()
        .unwrap();

    assert_eq!(
        extractor.calls(),
        vec![
            "https://shop.example/Products/Bolt?isFoil=N",
            "https://shop.example/Products/Bolt?isFoil=Y"
        ]
    );
    assert_eq!(results.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn groups_are_summed_against_paid_totals() {
    let extractor = Arc::new(ScriptedExtractor::new());
    let orchestrator = orchestrator_with(extractor.clone(), cache_with(&["c"]).await);
    let mut renderer = RecordingRenderer::default();

    let groups = vec![
        ItemGroup {
            name: "seller-1".into(),
            paid_total: Some(5.0),
            items: vec![item("a").with_quantity(2), item("b")],
        },
        ItemGroup {
            name: "empty".into(),
            paid_total: None,
            items: Vec::new(),
        },
        ItemGroup {
            name: "seller-2".into(),
            paid_total: None,
            items: vec![item("c")],
        },
    ];

    let GroupOutcome::Completed { groups, total } = orchestrator
        .run_groups(groups, Some(10.0), &mut renderer, CancelHandle::new())
        .await
    else {
        panic!("run was not cancelled");
    };

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].estimated_average, 6.0);
    assert_eq!(groups[0].estimated_trend, 3.0);
    assert_eq!(groups[0].profit_average(), Some(1.0));
    assert_eq!(groups[0].profit_trend(), Some(-2.0));
    assert_eq!(groups[1].profit_average(), None);

    assert_eq!(total.item_count, 3);
    assert_eq!(total.estimated_average, 8.0);
    assert_eq!(total.profit_trend(), Some(-6.0));

    assert_eq!(renderer.summaries.len(), 3);
    assert_eq!(renderer.summaries[2], total);
    assert_eq!(extractor.calls(), vec!["a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn cancelling_one_group_cancels_the_run() {
    let extractor = Arc::new(ScriptedExtractor::new());
    let orchestrator = orchestrator_with(extractor.clone(), Arc::new(CacheStore::in_memory()));
    let cancel = CancelHandle::new();
    extractor.cancel_during("c", cancel.clone());

    let groups = vec![
        ItemGroup { name: "one".into(), paid_total: None, items: vec![item("a")] },
        ItemGroup { name: "two".into(), paid_total: None, items: vec![item("c"), item("d")] },
        ItemGroup { name: "three".into(), paid_total: None, items: vec![item("e")] },
    ];
    let mut renderer = RecordingRenderer::default();

    let outcome = orchestrator.run_groups(groups, None, &mut renderer, cancel).await;

    assert!(matches!(outcome, GroupOutcome::Cancelled));
    assert_eq!(extractor.calls(), vec!["a", "c"]);
    assert_eq!(renderer.summaries.len(), 1);
}

#[tokio::test]
async fn fetch_one_uses_and_fills_the_cache() {
    let extractor = Arc::new(ScriptedExtractor::new());
    let cache = Arc::new(CacheStore::in_memory());
    let orchestrator = orchestrator_with(extractor.clone(), cache.clone());
    let mut renderer = RecordingRenderer::default();

    let single = item("a").with_seller_price("1,00 €");
    let first = orchestrator.fetch_one(&single, &mut renderer).await.unwrap();
    let second = orchestrator.fetch_one(&single, &mut renderer).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.average_ratio(), 2.0);
    assert_eq!(extractor.calls(), vec!["a"]);
    assert!(cache.get("a").await.is_some());
    assert_eq!(renderer.rendered.len(), 2);
}

#[tokio::test]
async fn fetch_one_reports_errors() {
    let extractor = Arc::new(ScriptedExtractor::new());
    extractor.script("a", vec![Reply::Status(429)]);
    let orchestrator = orchestrator_with(extractor, Arc::new(CacheStore::in_memory()));
    let mut renderer = RecordingRenderer::default();

    let err = orchestrator.fetch_one(&item("a"), &mut renderer).await.unwrap_err();
    assert!(err.is_rate_limited());

    let err = orchestrator
        .fetch_one(&WorkItem::unkeyed("nothing"), &mut renderer)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Processing(_)));
    assert!(renderer.rendered.is_empty());
}
