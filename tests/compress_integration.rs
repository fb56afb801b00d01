//! End-to-end batch compression through the public entry points.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use common::{ScriptedCodecs, item, jpeg_input, state};
use image_compressor_lib::core::percent_saved;
use image_compressor_lib::{
    CompressionSettings,
    CompressorError,
    CompressorResult,
    FormatConverter,
    ImageItem,
    ItemStatus,
    OutputFormat,
    SourceFormat,
    compress_batch,
    compress_single,
};

fn settings(parallelism: usize) -> CompressionSettings {
    CompressionSettings::new(75, OutputFormat::Jpeg).with_parallelism(parallelism)
}

fn ignore(_: &ImageItem) {}

#[tokio::test]
async fn failed_item_does_not_affect_its_neighbours() {
    let codecs = ScriptedCodecs::new();
    let state = state(&codecs);
    let items = vec![item("a.png", "OK"), item("b.png", "CORRUPT"), item("c.png", "OK")];
    let ids: Vec<_> = items.iter().map(|i| i.id).collect();

    let items = compress_batch(&state, items, &settings(2), ignore).await.unwrap();

    assert_eq!(items.iter().map(|i| i.id).collect::<Vec<_>>(), ids);
    assert_eq!(items[0].status().name(), "done");
    assert_eq!(items[1].status().name(), "error");
    assert_eq!(items[2].status().name(), "done");

    let output = items[0].output().unwrap();
    assert_eq!(output.file_name, "a.jpg");
    assert_eq!(output.compressed_size, 500);
    assert_eq!(output.percent_saved, 50);
    assert!(items[1].error_message().unwrap().contains("corrupt data"));
}

#[tokio::test]
async fn never_more_contexts_busy_than_parallelism() {
    let codecs = ScriptedCodecs::new();
    let state = state(&codecs);
    let items: Vec<_> = (0..12).map(|i| item(&format!("{}.jpg", i), "SLOW")).collect();

    let items = compress_batch(&state, items, &settings(3), ignore).await.unwrap();

    assert!(items.iter().all(|i| i.status().name() == "done"));
    assert!(codecs.tracker.peak() <= 3, "peak was {}", codecs.tracker.peak());
    let stats = state.pool_stats().await.unwrap();
    assert_eq!(stats.size, 3);
    assert!(stats.peak_in_flight <= 3);
    assert_eq!((stats.queued, stats.in_flight), (0, 0));
}

#[tokio::test]
async fn every_item_reports_processing_then_terminal() {
    let codecs = ScriptedCodecs::new();
    let state = state(&codecs);
    let seen = Mutex::new(Vec::new());
    let items = vec![item("a.jpg", "OK"), item("b.jpg", "CORRUPT")];

    compress_batch(&state, items, &settings(1), |item: &ImageItem| {
        seen.lock().push((item.name.clone(), item.status().name()));
    })
    .await
    .unwrap();

    let seen = seen.into_inner();
    assert_eq!(
        seen,
        vec![
            ("a.jpg".to_string(), "processing"),
            ("a.jpg".to_string(), "done"),
            ("b.jpg".to_string(), "processing"),
            ("b.jpg".to_string(), "error"),
        ]
    );
}

#[tokio::test]
async fn later_item_can_finish_first_without_reordering_the_batch() {
    let codecs = ScriptedCodecs::new();
    let gate = Mutex::new(Some(codecs.stall_gate()));
    let state = state(&codecs);
    let items = vec![
        ImageItem::from_bytes("one.jpg", jpeg_input("OK", 1_000_000)),
        ImageItem::from_bytes("two.jpg", jpeg_input("STALL", 2_000_000)),
        ImageItem::from_bytes("three.jpg", jpeg_input("OK", 500_000)),
    ];
    let ids: Vec<_> = items.iter().map(|i| i.id).collect();
    let finished = Mutex::new(Vec::new());

    let items = compress_batch(&state, items, &settings(2), |item: &ImageItem| {
        if !item.status().is_terminal() {
            return;
        }
        finished.lock().push(item.name.clone());
        // two.jpg holds its context until three.jpg is through.
        if item.name == "three.jpg" {
            if let Some(gate) = gate.lock().take() {
                gate.send(()).unwrap();
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(finished.into_inner(), vec!["one.jpg", "three.jpg", "two.jpg"]);
    assert_eq!(items.iter().map(|i| i.id).collect::<Vec<_>>(), ids);

    let sizes: Vec<_> = items.iter().map(|i| (i.original_size, i.compressed_size())).collect();
    assert_eq!(
        sizes,
        vec![(1_000_000, Some(500_000)), (2_000_000, Some(1_000_000)), (500_000, Some(250_000))]
    );
    for item in &items {
        let output = item.output().unwrap();
        assert_eq!(output.percent_saved, percent_saved(item.original_size, output.compressed_size));
        assert_eq!(output.percent_saved, 50);
    }
}

#[tokio::test]
async fn item_resubmitted_while_marked_processing_still_settles() {
    let codecs = ScriptedCodecs::new();
    let state = state(&codecs);
    let mut stale = item("a.jpg", "OK");
    stale.mark_processing().unwrap();
    let items = vec![stale, item("b.jpg", "OK")];
    let settled = Mutex::new(Vec::new());

    let items = compress_batch(&state, items, &settings(2), |item: &ImageItem| {
        if item.status().is_terminal() {
            settled.lock().push(item.name.clone());
        }
    })
    .await
    .unwrap();

    assert!(items.iter().all(|i| i.status().is_terminal()));
    assert_eq!(items[0].status().name(), "done");
    assert_eq!(items[1].status().name(), "done");
    let mut settled = settled.into_inner();
    settled.sort();
    assert_eq!(settled, vec!["a.jpg", "b.jpg"]);
}

#[tokio::test]
async fn stalled_item_times_out_and_its_context_is_recycled() {
    let codecs = ScriptedCodecs::new();
    let gate = codecs.stall_gate();
    let state = state(&codecs).with_item_timeout(Duration::from_millis(200));

    let items = vec![item("stuck.jpg", "STALL"), item("fine.jpg", "OK")];
    let items = compress_batch(&state, items, &settings(2), ignore).await.unwrap();

    let message = items[0].error_message().unwrap();
    assert!(message.contains("timed out"), "{}", message);
    assert_eq!(items[1].status().name(), "done");
    assert_eq!(state.pool_stats().await.unwrap().abandoned, 1);

    gate.send(()).unwrap();
    let mut stats = state.pool_stats().await.unwrap();
    for _ in 0..100 {
        if stats.in_flight == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        stats = state.pool_stats().await.unwrap();
    }
    assert_eq!((stats.idle, stats.in_flight, stats.abandoned), (2, 0, 0));

    let items = vec![item("again.jpg", "OK"), item("more.jpg", "OK")];
    let items = compress_batch(&state, items, &settings(2), ignore).await.unwrap();
    assert!(items.iter().all(|i| i.status().name() == "done"));
}

#[tokio::test]
async fn retry_keeps_the_item_identity() {
    let codecs = ScriptedCodecs::new();
    let state = state(&codecs);

    let original = item("flaky.png", "FLAKY");
    let id = original.id;
    let failed = compress_single(&state, original, &settings(1), ignore).await.unwrap();
    assert_eq!(failed.status().name(), "error");

    let retried = compress_single(&state, failed, &settings(1), ignore).await.unwrap();
    assert_eq!(retried.id, id);
    assert_eq!(retried.status().name(), "done");

    // Re-compressing a finished item replaces its output.
    let webp = CompressionSettings::new(60, OutputFormat::WebP).with_parallelism(1);
    let again = compress_single(&state, retried, &webp, ignore).await.unwrap();
    assert_eq!(again.id, id);
    assert_eq!(again.output().unwrap().file_name, "flaky.webp");
}

#[tokio::test]
async fn codec_panic_is_reported_and_context_survives() {
    let codecs = ScriptedCodecs::new();
    let state = state(&codecs);
    let items = vec![item("boom.jpg", "PANIC"), item("after.jpg", "OK")];

    let items = compress_batch(&state, items, &settings(1), ignore).await.unwrap();

    assert!(items[0].error_message().unwrap().contains("panicked"));
    assert_eq!(items[1].status().name(), "done");
}

#[tokio::test]
async fn pool_start_failure_rejects_the_batch() {
    let codecs = ScriptedCodecs::broken();
    let state = state(&codecs);

    let err = compress_batch(&state, vec![item("a.jpg", "OK")], &settings(2), ignore)
        .await
        .unwrap_err();
    assert!(matches!(err, CompressorError::Init(ref msg) if msg.contains("failed to load")));
}

#[tokio::test]
async fn changing_parallelism_replaces_the_pool() {
    let codecs = ScriptedCodecs::new();
    let state = state(&codecs);

    compress_batch(&state, vec![item("a.jpg", "OK")], &settings(1), ignore).await.unwrap();
    assert_eq!(state.pool_stats().await.unwrap().size, 1);

    compress_batch(&state, vec![item("b.jpg", "OK")], &settings(4), ignore).await.unwrap();
    assert_eq!(state.pool_stats().await.unwrap().size, 4);

    // Requests above the device cap are clamped.
    compress_batch(&state, vec![item("c.jpg", "OK")], &settings(64), ignore).await.unwrap();
    assert_eq!(state.pool_stats().await.unwrap().size, 7);

    state.shutdown().await;
    assert!(state.pool_stats().await.is_none());
}

#[tokio::test]
async fn unknown_input_is_a_preprocessing_error() {
    let codecs = ScriptedCodecs::new();
    let state = state(&codecs);
    let items = vec![ImageItem::from_bytes("notes.txt", b"plain text".to_vec())];

    let items = compress_batch(&state, items, &settings(1), ignore).await.unwrap();

    assert!(items[0].error_message().unwrap().starts_with("Preprocessing failed"));
    assert_eq!(codecs.tracker.decodes(), 0);
}

struct HeicToJpeg;

#[async_trait]
impl FormatConverter for HeicToJpeg {
    async fn convert(&self, bytes: Vec<u8>, from: SourceFormat) -> CompressorResult<(Vec<u8>, SourceFormat)> {
        assert_eq!(from, SourceFormat::Heic);
        Ok((jpeg_input("OK", bytes.len()), SourceFormat::Jpeg))
    }
}

#[tokio::test]
async fn heic_is_converted_before_submission() {
    let codecs = ScriptedCodecs::new();
    let state = state(&codecs).with_converter(Arc::new(HeicToJpeg));

    let mut heic = vec![0, 0, 0, 24];
    heic.extend_from_slice(b"ftypheic");
    heic.resize(800, 0);
    let items = vec![ImageItem::from_bytes("IMG_0001.HEIC", heic)];

    let items = compress_batch(&state, items, &settings(1), ignore).await.unwrap();

    let output = items[0].output().unwrap();
    assert_eq!(output.file_name, "IMG_0001.jpg");
    assert_eq!(output.percent_saved, 50);
}

#[tokio::test]
async fn file_backed_items_are_read_from_disk() {
    let codecs = ScriptedCodecs::new();
    let state = state(&codecs);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.jpg");
    std::fs::write(&path, jpeg_input("OK", 2000)).unwrap();

    let item = ImageItem::from_path(&path).await.unwrap();
    assert_eq!(item.original_size, 2000);

    let item = compress_single(&state, item, &settings(1), ignore).await.unwrap();
    assert_eq!(item.compressed_size(), Some(1000));
    assert!(matches!(item.status(), ItemStatus::Done(_)));
}
