//! Expected-condition tests against a scripted page

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::cdp::{CdpClient, MockCdpClient, MockReply};
use crate::runtime::{scripts, EvaluationRequest, RemoteValue, Timeouts};
use crate::session::Driver;
use crate::wait::{ExpectedConditions, Wait};
use crate::Error;

fn returns(result: Value) -> MockReply {
    MockReply::Result(json!({ "result": result }))
}

/// A page where `div#late` shows up on the `appears_on`-th query and is
/// hidden until its class flips to "ready"
fn late_page(appears_on: u32) -> Arc<MockCdpClient> {
    let mock = Arc::new(MockCdpClient::new());
    mock.on_result(
        "Runtime.evaluate",
        json!({ "result": { "type": "object", "className": "Window", "objectId": "global" } }),
    );

    let queries = Arc::new(AtomicU32::new(0));
    mock.on("Runtime.callFunctionOn", move |params| {
        let declaration = params["functionDeclaration"].as_str().unwrap_or_default();

        if declaration == scripts::QUERY_SELECTOR_SCRIPT {
            let n = queries.fetch_add(1, Ordering::SeqCst) + 1;
            return if n >= appears_on {
                returns(json!({ "type": "object", "subtype": "node", "className": "HTMLDivElement", "objectId": "late" }))
            } else {
                returns(json!({ "type": "object", "subtype": "null", "value": null }))
            };
        }
        if declaration == scripts::QUERY_SELECTOR_ALL_SCRIPT {
            return returns(json!({ "type": "object", "subtype": "array", "className": "Array", "objectId": "list" }));
        }
        if declaration == scripts::IS_VISIBLE_SCRIPT {
            return returns(json!({ "type": "boolean", "value": true }));
        }
        if declaration == scripts::GET_ATTRIBUTE_SCRIPT {
            return returns(json!({ "type": "string", "value": "ready" }));
        }
        if declaration == scripts::DOCUMENT_TITLE_SCRIPT {
            return returns(json!({ "type": "string", "value": "Fixture" }));
        }
        if declaration == scripts::DOCUMENT_URL_SCRIPT {
            return returns(json!({ "type": "string", "value": "http://localhost/done.html" }));
        }
        returns(json!({ "type": "number", "value": 0 }))
    });

    mock.on_result("Runtime.getProperties", json!({ "result": [] }));
    mock
}

async fn driver_for(mock: &Arc<MockCdpClient>) -> Driver {
    let client: Arc<dyn CdpClient> = mock.clone();
    Driver::new(client, Timeouts::default()).await.unwrap()
}

fn quick() -> Wait {
    Wait::new(Duration::from_secs(2)).with_interval(Duration::from_millis(100))
}

#[tokio::test(start_paused = true)]
async fn test_element_located_after_a_few_polls() {
    let mock = late_page(3);
    let driver = driver_for(&mock).await;

    let node = quick()
        .for_condition(&driver, ExpectedConditions::element_located("div#late"))
        .await
        .unwrap();
    assert_eq!(node.object().id.as_str(), "late");
}

#[tokio::test(start_paused = true)]
async fn test_element_located_times_out_with_description() {
    let mock = late_page(u32::MAX);
    let driver = driver_for(&mock).await;

    let err = Wait::new(Duration::from_millis(350))
        .for_condition(&driver, ExpectedConditions::element_located("div#late"))
        .await
        .unwrap_err();

    match err {
        Error::WaitTimeout { message, last_error, .. } => {
            assert_eq!(message, "element div#late");
            assert!(last_error.is_none());
        }
        other => panic!("expected wait timeout, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_empty_list_keeps_polling() {
    let mock = late_page(1);
    let driver = driver_for(&mock).await;

    let err = Wait::new(Duration::from_millis(250))
        .for_condition(&driver, ExpectedConditions::elements_located("li"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::WaitTimeout { .. }));
    assert!(mock.call_count("Runtime.getProperties") >= 2);
}

#[tokio::test(start_paused = true)]
async fn test_visible_and_attribute_conditions() {
    let mock = late_page(1);
    let driver = driver_for(&mock).await;

    let visible = quick()
        .for_condition(&driver, ExpectedConditions::element_visible("div#late"))
        .await
        .unwrap();
    assert_eq!(visible.object().id.as_str(), "late");

    quick()
        .for_condition(&driver, ExpectedConditions::attribute_is("div#late", "class", "ready"))
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_title_and_url_conditions() {
    let mock = late_page(1);
    let driver = driver_for(&mock).await;

    quick()
        .for_condition(&driver, ExpectedConditions::title_is("Fixture"))
        .await
        .unwrap();

    let url = quick()
        .for_condition(&driver, ExpectedConditions::url_contains("done"))
        .await
        .unwrap();
    assert_eq!(url, "http://localhost/done.html");

    let err = Wait::new(Duration::from_millis(200))
        .for_condition(&driver, ExpectedConditions::title_is("Other"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("title \"Other\""));
}

#[tokio::test(start_paused = true)]
async fn test_script_truthy_records_script_errors() {
    let mock = late_page(1);
    mock.on("Runtime.callFunctionOn", |_| {
        MockReply::Result(json!({
            "result": { "type": "object", "subtype": "error" },
            "exceptionDetails": {
                "text": "Uncaught",
                "exception": { "type": "object", "subtype": "error", "description": "Error: not yet\n    at <anonymous>:1:7" }
            }
        }))
    });
    let driver = driver_for(&mock).await;

    let err = Wait::new(Duration::from_millis(300))
        .for_condition(
            &driver,
            ExpectedConditions::script_truthy(EvaluationRequest::new("throw new Error('not yet')")),
        )
        .await
        .unwrap_err();

    match err {
        Error::WaitTimeout { last_error, .. } => {
            assert!(matches!(last_error.as_deref(), Some(Error::ScriptRuntime { message, .. }) if message == "Error: not yet"));
        }
        other => panic!("expected wait timeout, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_script_truthy_yields_value() {
    let mock = late_page(1);
    let polls = Arc::new(AtomicU32::new(0));
    let counter = polls.clone();
    mock.on("Runtime.callFunctionOn", move |_| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        returns(json!({ "type": "number", "value": n }))
    });
    let driver = driver_for(&mock).await;

    let value = quick()
        .for_condition(&driver, ExpectedConditions::script_truthy("return window.counter"))
        .await
        .unwrap();
    assert_eq!(value.as_value(), Some(&RemoteValue::Number(1.0)));
    assert_eq!(polls.load(Ordering::SeqCst), 2);
}
