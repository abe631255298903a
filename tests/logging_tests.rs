use std::sync::Arc;

use pagelens::dom::{Document, NodeId};
use pagelens::setup_logging;

#[test]
fn logging_survives_a_second_setup() {
    setup_logging();
    setup_logging();
    tracing::info!("still logging after a second setup");
}

#[test]
fn document_logging_works_once_set_up() {
    setup_logging();
    let doc = Document::from_html("<body><p>x</p></body>", None);
    let p = doc.query_selector("p").unwrap();
    doc.remove(p);
    // listeners on removed nodes are dropped with a debug line, not an error
    doc.add_event_listener(p, "click", Arc::new(|_: &Document, _: NodeId| {}));
    assert_eq!(doc.listener_count(), 0);
}
