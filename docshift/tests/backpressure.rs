#![cfg(feature = "test-utils")]

use docshift::test_utils::sink::ThrottledSink;
use docshift::test_utils::source::ChunkedSource;
use docshift::transform::{clear_identifiers, csv_to_json};
use docshift_config::shared::{IndentConfig, WriterConfig};
use docshift_telemetry::tracing::init_test_tracing;
use serde_json::Value;

/// A sink that is full after every write.
fn always_full() -> WriterConfig {
    WriterConfig {
        indent: IndentConfig::Spaces(2),
        high_water_mark: 1,
    }
}

#[tokio::test]
async fn source_is_not_read_while_the_sink_is_behind() {
    init_test_tracing();

    let sink = ThrottledSink::new().with_max_chunk(5);
    let mut chunks = vec!["[".to_owned()];
    for n in 0..20 {
        let separator = if n == 0 { "" } else { "," };
        chunks.push(format!("{separator}{{\"_id\": \"{n}\", \"n\": {n}}}"));
    }
    chunks.push("]".to_owned());

    let source = ChunkedSource::new(chunks).observing(sink.clone());
    let observations = source.observations();

    let summary = clear_identifiers(source, sink.clone(), "memory", &always_full())
        .await
        .unwrap();
    assert_eq!(summary.documents, 20);

    let output = sink.contents_string();
    let observations = observations.lock().unwrap().clone();

    // One read per chunk plus the final end-of-source read.
    assert_eq!(observations.len(), 23);

    // Chunk `k` carries document `k - 1`; before each read the sink holds every earlier
    // document completely.
    assert_eq!(observations[1], 1);
    for (read, received) in observations.iter().enumerate().take(22).skip(2) {
        let prefix = &output[..*received];
        assert!(
            prefix.ends_with('}'),
            "read {read} happened with a partially written document: {prefix:?}"
        );
        assert_eq!(prefix.matches("\"n\"").count(), read - 1);
    }
    assert_eq!(observations[22], observations[21]);

    let parsed: Value = serde_json::from_str(&output).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 20);
}

#[tokio::test]
async fn csv_rows_wait_for_the_sink_too() {
    init_test_tracing();

    let sink = ThrottledSink::new().with_max_chunk(3);
    let mut chunks = vec!["name,n\n".to_owned()];
    for n in 0..50 {
        chunks.push(format!("row,{n}\n"));
    }

    let summary = csv_to_json(ChunkedSource::new(chunks), sink.clone(), "memory", &always_full())
        .await
        .unwrap();

    assert_eq!(summary.documents, 50);
    assert!(sink.is_shut_down());

    let parsed: Value = serde_json::from_str(&sink.contents_string()).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 50);
}
