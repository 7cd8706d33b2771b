//! End-to-end engine tests.
//!
//! These tests verify the public session API over every source kind:
//! - exact ranges match values decoded straight from the file
//! - composed chunk lists keep caller order and skip bad indices
//! - corrupt headers fail `open` with the matching format error
//! - closing mid-load cancels waiters and closes the source
//! - local files and HTTP range sources behave like memory

mod common;

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use common::{InstrumentedSource, TestFile};
use core_waveform::{
    ByteSource, FormatError, MemorySource, SessionConfig, SourceKind, SourceLocation,
    WaveformEngine, WaveformError,
};
use mockall::mock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn small_config() -> SessionConfig {
    SessionConfig::default()
        .with_chunk_samples(100)
        .with_max_cached_chunks(4)
        .with_auto_prefetch(0)
}

// ============================================================================
// Exact ranges
// ============================================================================

#[tokio::test]
async fn test_exact_range_across_default_chunk_boundary() {
    let file = TestFile::new(10_000, 1_048_576);
    let engine = WaveformEngine::new();
    let token = CancellationToken::new();

    let header = engine
        .open(
            Arc::new(MemorySource::new(file.bytes.clone())),
            SessionConfig::default(),
        )
        .await
        .unwrap();

    assert_eq!(header.sample_rate_hz, 10_000);
    assert_eq!(header.sample_count, 1_048_576);
    assert_eq!(header.duration().as_millis(), 104_857);
    assert_eq!(engine.cache_info().unwrap().chunk_count, 4);

    let window = engine.get_exact_range(262_000, 262_300, &token).await.unwrap();
    assert_eq!(window.len(), 300);
    assert_eq!(window, file.oracle(262_000, 262_300));
    assert_eq!(window.as_slice(), &file.samples[262_000..262_300]);

    let again = engine.get_exact_range(262_000, 262_300, &token).await.unwrap();
    assert_eq!(again, window);

    engine.close().await;
}

#[tokio::test]
async fn test_exact_ranges_match_oracle() {
    let file = TestFile::new(2_000, 1_234);
    let engine = WaveformEngine::new();
    let token = CancellationToken::new();
    engine
        .open(Arc::new(MemorySource::new(file.bytes.clone())), small_config())
        .await
        .unwrap();

    for (start, end) in [(0, 1), (99, 101), (0, 1_234), (350, 777), (1_200, 1_234)] {
        let values = engine.get_exact_range(start, end, &token).await.unwrap();
        assert_eq!(values, file.oracle(start as usize, end as usize), "range {start}..{end}");
    }

    let clamped = engine.get_exact_range(1_230, 9_999, &token).await.unwrap();
    assert_eq!(clamped, file.oracle(1_230, 1_234));
    assert!(engine.get_exact_range(500, 500, &token).await.unwrap().is_empty());
    assert!(engine.get_exact_range(5_000, 6_000, &token).await.unwrap().is_empty());

    assert!(engine.cache_info().unwrap().cached_chunks <= 4);
}

// ============================================================================
// Chunk composition
// ============================================================================

#[tokio::test]
async fn test_compose_keeps_caller_order() {
    let file = TestFile::new(1_000, 1_000);
    let source = Arc::new(InstrumentedSource::new(file.bytes.clone()));
    source.finish_in_reverse_order();

    let engine = WaveformEngine::new();
    let token = CancellationToken::new();
    engine.open(source, small_config()).await.unwrap();

    let composed = engine.compose_chunks(&[2, 5, 7], &token).await.unwrap();
    let mut expected = file.oracle(200, 300);
    expected.extend(file.oracle(500, 600));
    expected.extend(file.oracle(700, 800));
    assert_eq!(composed, expected);

    let reversed = engine.compose_chunks(&[7, 2], &token).await.unwrap();
    let mut expected = file.oracle(700, 800);
    expected.extend(file.oracle(200, 300));
    assert_eq!(reversed, expected);

    let filtered = engine.compose_chunks(&[-1, 3, 999], &token).await.unwrap();
    assert_eq!(filtered, file.oracle(300, 400));
}

#[tokio::test]
async fn test_prefetch_then_reads_hit() {
    let file = TestFile::new(1_000, 1_000);
    let source = Arc::new(InstrumentedSource::new(file.bytes.clone()));
    let engine = WaveformEngine::new();
    let token = CancellationToken::new();
    engine
        .open(Arc::clone(&source) as Arc<dyn ByteSource>, small_config())
        .await
        .unwrap();

    let warmed = engine.prefetch_range(410, 480, 1, &token).await.unwrap();
    assert_eq!(warmed, 3);
    assert_eq!(source.read_count(), 3);

    engine.get_exact_range(300, 600, &token).await.unwrap();
    assert_eq!(source.read_count(), 3);

    let stats = engine.cache_stats().unwrap();
    assert_eq!(stats.misses, 3);
    assert_eq!(stats.hits, 3);
}

#[tokio::test]
async fn test_neighbor_prefetch_failures_are_swallowed() {
    let file = TestFile::new(1_000, 1_000);
    let source = Arc::new(InstrumentedSource::new(file.bytes.clone()));
    let engine = WaveformEngine::new();
    let token = CancellationToken::new();
    engine
        .open(
            Arc::clone(&source) as Arc<dyn ByteSource>,
            small_config().with_auto_prefetch(1),
        )
        .await
        .unwrap();

    // Warm chunk 4 without triggering neighbour prefetch
    engine.prefetch_range(410, 420, 0, &token).await.unwrap();
    source.fail_next_reads(2);

    let values = engine.get_exact_range(410, 420, &token).await.unwrap();
    assert_eq!(values, file.oracle(410, 420));

    for _ in 0..200 {
        if engine.cache_stats().unwrap().failed_loads == 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert_eq!(engine.cache_stats().unwrap().failed_loads, 2);
    assert_eq!(source.read_count(), 3);
    assert_eq!(engine.cached_chunk_indices().unwrap(), vec![4]);
    assert_eq!(engine.cache_info().unwrap().in_flight_chunks, 0);

    let retried = engine.get_chunk(3, &token).await.unwrap();
    assert_eq!(retried.samples(), file.oracle(300, 400).as_slice());
    let retried = engine.get_chunk(5, &token).await.unwrap();
    assert_eq!(retried.samples(), file.oracle(500, 600).as_slice());
    assert_eq!(source.read_count(), 5);
}

// ============================================================================
// Header validation
// ============================================================================

async fn open_bytes(bytes: Vec<u8>) -> Result<(), WaveformError> {
    WaveformEngine::new()
        .open(Arc::new(MemorySource::new(bytes)), small_config())
        .await
        .map(|_| ())
}

#[tokio::test]
async fn test_corrupt_headers_fail_open() {
    let file = TestFile::new(1_000, 64);
    let good = file.bytes.to_vec();

    let mut bad_magic = good.clone();
    bad_magic[0..4].copy_from_slice(b"RIFF");
    assert!(matches!(
        open_bytes(bad_magic).await,
        Err(WaveformError::InvalidFormat(FormatError::BadMagic { .. }))
    ));

    let mut bad_version = good.clone();
    bad_version[4..6].copy_from_slice(&2u16.to_le_bytes());
    assert!(matches!(
        open_bytes(bad_version).await,
        Err(WaveformError::InvalidFormat(FormatError::UnsupportedVersion { found: 2, .. }))
    ));

    let mut zero_rate = good.clone();
    zero_rate[8..12].copy_from_slice(&0u32.to_le_bytes());
    assert!(matches!(
        open_bytes(zero_rate).await,
        Err(WaveformError::InvalidFormat(FormatError::InvalidSampleRate(0)))
    ));

    let mut padded = good.clone();
    padded.extend_from_slice(&[0; 4]);
    assert!(matches!(
        open_bytes(padded).await,
        Err(WaveformError::InvalidFormat(FormatError::SizeMismatch { .. }))
    ));

    assert!(matches!(
        open_bytes(good[..12].to_vec()).await,
        Err(WaveformError::InvalidFormat(FormatError::Truncated { needed: 20, actual: 12 }))
    ));

    assert!(open_bytes(good).await.is_ok());
}

#[tokio::test]
async fn test_empty_payload_opens() {
    let file = TestFile::new(48_000, 0);
    let engine = WaveformEngine::new();
    let token = CancellationToken::new();

    let header = engine
        .open(Arc::new(MemorySource::new(file.bytes.clone())), small_config())
        .await
        .unwrap();

    assert_eq!(header.sample_count, 0);
    assert_eq!(engine.cache_info().unwrap().chunk_count, 0);
    assert!(engine.get_exact_range(0, 100, &token).await.unwrap().is_empty());
    assert!(engine.compose_chunks(&[0, 1], &token).await.unwrap().is_empty());
    assert_eq!(engine.prefetch_range(0, 100, 2, &token).await.unwrap(), 0);
}

// ============================================================================
// Session lifecycle
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_close_mid_load_fails_waiters_and_closes_source() {
    let file = TestFile::new(1_000, 400);
    let source = Arc::new(InstrumentedSource::gated(file.bytes.clone()));
    let engine = Arc::new(WaveformEngine::new());
    engine
        .open(Arc::clone(&source) as Arc<dyn ByteSource>, small_config())
        .await
        .unwrap();

    let pending = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine
                .get_exact_range(150, 250, &CancellationToken::new())
                .await
        })
    };
    source.wait_for_reads(1).await;

    engine.close().await;
    source.release();

    assert!(matches!(pending.await.unwrap(), Err(WaveformError::SessionClosed)));
    assert!(source.closed.load(std::sync::atomic::Ordering::SeqCst));
    assert!(!engine.is_open());
}

#[tokio::test]
async fn test_reopen_replaces_session() {
    let first = TestFile::new(1_000, 300);
    let second = TestFile::new(2_000, 500);
    let first_source = Arc::new(InstrumentedSource::new(first.bytes.clone()));

    let engine = WaveformEngine::new();
    let token = CancellationToken::new();
    engine
        .open(Arc::clone(&first_source) as Arc<dyn ByteSource>, small_config())
        .await
        .unwrap();
    engine.get_exact_range(0, 10, &token).await.unwrap();

    let header = engine
        .open(Arc::new(MemorySource::new(second.bytes.clone())), small_config())
        .await
        .unwrap();

    assert!(first_source.closed.load(std::sync::atomic::Ordering::SeqCst));
    assert_eq!(header.sample_rate_hz, 2_000);
    assert_eq!(engine.cache_info().unwrap().cached_chunks, 0);
    assert_eq!(
        engine.get_exact_range(400, 410, &token).await.unwrap(),
        second.oracle(400, 410)
    );
}

#[tokio::test]
async fn test_cancelled_token_rejects_reads() {
    let file = TestFile::new(1_000, 300);
    let engine = WaveformEngine::new();
    engine
        .open(Arc::new(MemorySource::new(file.bytes.clone())), small_config())
        .await
        .unwrap();

    let token = CancellationToken::new();
    token.cancel();

    assert!(matches!(
        engine.get_exact_range(0, 10, &token).await,
        Err(WaveformError::Cancelled)
    ));
    assert!(matches!(
        engine.compose_chunks(&[0], &token).await,
        Err(WaveformError::Cancelled)
    ));
    assert!(matches!(
        engine.prefetch_range(0, 10, 0, &token).await,
        Err(WaveformError::Cancelled)
    ));
    assert_eq!(engine.cache_info().unwrap().cached_chunks, 0);
}

// ============================================================================
// Local file source
// ============================================================================

#[tokio::test]
async fn test_local_file_end_to_end() {
    let file = TestFile::new(44_100, 2_500);
    let path = std::env::temp_dir().join(format!(
        "core-waveform-engine-{}.wvfm",
        std::process::id()
    ));
    tokio::fs::write(&path, &file.bytes).await.unwrap();

    let engine = WaveformEngine::new();
    let token = CancellationToken::new();
    let header = engine
        .open_location(SourceLocation::file(&path), None, small_config())
        .await
        .unwrap();

    assert_eq!(header.file_size_bytes, file.bytes.len() as u64);
    assert_eq!(
        engine.get_exact_range(1_950, 2_050, &token).await.unwrap(),
        file.oracle(1_950, 2_050)
    );

    let preview = engine.preview(10, &token).await.unwrap();
    assert_eq!(preview.len(), 10);
    assert_eq!(preview.sample_rate_hz, 44_100);

    engine.close().await;
    tokio::fs::remove_file(&path).await.unwrap();
}

#[tokio::test]
async fn test_missing_file_is_source_unavailable() {
    let engine = WaveformEngine::new();
    let result = engine
        .open_location(
            SourceLocation::file("/nonexistent/dir/missing.wvfm"),
            None,
            small_config(),
        )
        .await;

    assert!(matches!(result, Err(WaveformError::SourceUnavailable(_))));
    assert!(!engine.is_open());
}

// ============================================================================
// HTTP range source
// ============================================================================

mock! {
    RangeServer {}

    #[async_trait]
    impl HttpClient for RangeServer {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        async fn execute_with_retry(
            &self,
            request: HttpRequest,
            policy: RetryPolicy,
        ) -> BridgeResult<HttpResponse>;
    }
}

/// Serve `data` the way a range-capable static file server would.
fn serve_ranges(data: bytes::Bytes, request: &HttpRequest) -> HttpResponse {
    let total = data.len();
    let mut headers = HashMap::new();

    if request.method == HttpMethod::Head {
        headers.insert("Content-Length".to_string(), total.to_string());
        return HttpResponse {
            status: 200,
            headers,
            body: bytes::Bytes::new(),
        };
    }

    let range = request
        .headers
        .get("Range")
        .and_then(|value| value.strip_prefix("bytes="))
        .and_then(|span| span.split_once('-'))
        .and_then(|(first, last)| Some((first.parse::<usize>().ok()?, last.parse::<usize>().ok()?)));

    match range {
        Some((first, last)) if first < total => {
            let last = last.min(total - 1);
            headers.insert(
                "Content-Range".to_string(),
                format!("bytes {}-{}/{}", first, last, total),
            );
            HttpResponse {
                status: 206,
                headers,
                body: data.slice(first..last + 1),
            }
        }
        _ => HttpResponse {
            status: 416,
            headers,
            body: bytes::Bytes::new(),
        },
    }
}

#[tokio::test]
async fn test_http_range_end_to_end() {
    let file = TestFile::new(8_000, 1_000);
    let data = file.bytes.clone();

    let mut server = MockRangeServer::new();
    server
        .expect_execute()
        .returning(move |request| Ok(serve_ranges(data.clone(), &request)));

    let engine = WaveformEngine::new();
    let token = CancellationToken::new();
    let location = SourceLocation::http("https://cdn.example.com/run.wvfm")
        .with_header("Authorization", "Bearer test-token");
    assert_eq!(location.kind(), SourceKind::HttpRange);

    let header = engine
        .open_location(location, Some(Arc::new(server)), small_config())
        .await
        .unwrap();
    assert_eq!(header.sample_count, 1_000);

    assert_eq!(
        engine.get_exact_range(250, 420, &token).await.unwrap(),
        file.oracle(250, 420)
    );

    let composed = engine.compose_chunks(&[9, 0], &token).await.unwrap();
    let mut expected = file.oracle(900, 1_000);
    expected.extend(file.oracle(0, 100));
    assert_eq!(composed, expected);
}

#[tokio::test]
async fn test_http_server_ignoring_ranges_is_rejected() {
    let file = TestFile::new(8_000, 200);
    let data = file.bytes.clone();

    let mut server = MockRangeServer::new();
    server.expect_execute().returning(move |request| {
        let mut headers = HashMap::new();
        headers.insert("Content-Length".to_string(), data.len().to_string());
        let body = if request.method == HttpMethod::Head {
            bytes::Bytes::new()
        } else {
            data.clone()
        };
        Ok(HttpResponse {
            status: 200,
            headers,
            body,
        })
    });

    let result = WaveformEngine::new()
        .open_location(
            SourceLocation::http("https://plain.example.com/run.wvfm"),
            Some(Arc::new(server)),
            small_config(),
        )
        .await;

    assert!(matches!(result, Err(WaveformError::RangeUnsupported(_))));
}

#[tokio::test]
async fn test_http_location_requires_client() {
    let result = WaveformEngine::new()
        .open_location(
            SourceLocation::http("https://cdn.example.com/run.wvfm"),
            None,
            small_config(),
        )
        .await;

    assert!(matches!(result, Err(WaveformError::InvalidConfig(_))));
}
