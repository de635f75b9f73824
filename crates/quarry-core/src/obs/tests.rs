use crate::obs::sink::{CollectingSink, DiagnosticEvent, DiagnosticSink, TracingSink};

fn event() -> DiagnosticEvent {
    DiagnosticEvent::UnoptimizedPopulate {
        model: "pet".to_string(),
        attribute: "tags".to_string(),
        skip: 0,
        limit: 10,
        custom_sort: false,
    }
}

#[test]
fn collecting_sink_drains_in_order() {
    let sink = CollectingSink::new();
    sink.record(event());
    sink.record(event());

    assert_eq!(sink.take(), vec![event(), event()]);
    assert!(sink.take().is_empty());
}

#[test]
fn tracing_sink_accepts_events_without_subscriber() {
    TracingSink.record(event());
}

#[test]
fn event_display_names_the_association() {
    let rendered = event().to_string();

    assert!(rendered.contains("'tags'"));
    assert!(rendered.contains("'pet'"));
}
