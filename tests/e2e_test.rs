//! End-to-end tests against a real Chrome
//!
//! Each test launches its own headless browser. Tests return early when no
//! Chrome executable can be located.

mod common;

use common::{chrome_options, data_url, CLICKABLE_HTML, FORM_HTML, NESTED_DIVS_HTML};
use oxide_driver::{ChromeService, Driver, Error, EvaluationRequest, ExpectedConditions, RemoteValue, Result, Wait};
use std::future::Future;
use std::time::Duration;

/// Run `f` against a fresh browser, or skip when Chrome is not installed
async fn with_driver<F, Fut>(f: F)
where
    F: FnOnce(Driver) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let Some(options) = chrome_options() else {
        eprintln!("skipping: no Chrome executable found");
        return;
    };
    ChromeService::run(options, f).await.unwrap();
}

#[tokio::test]
async fn test_query_nested_elements() {
    with_driver(|driver| async move {
        driver.set_content(NESTED_DIVS_HTML).await?;

        let divs = driver.query_selector_all("div").await?;
        assert!(divs.len() > 1);

        let outer = driver.query_selector("div#outer").await?;
        assert_eq!(outer.get_attribute("class").await?.as_deref(), Some("outer"));

        let attributes = outer.get_attributes().await?;
        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes["id"], "outer");
        assert_eq!(attributes["class"], "outer");

        let inner = outer.query_selector("div#inner").await?;
        assert_eq!(inner.get_attribute("class").await?.as_deref(), Some("inner"));
        assert!(!outer.query_selector_all("div").await?.is_empty());

        let err = driver.query_selector("span.missing").await.unwrap_err();
        assert!(err.is_not_found());
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_click_and_send_keys() {
    with_driver(|driver| async move {
        driver.navigate(&data_url(CLICKABLE_HTML)).await?;
        driver.query_selector("div#inner").await?.click().await?;
        driver.query_selector("div#innerClick").await?;

        driver.navigate(&data_url(FORM_HTML)).await?;
        let input = driver.query_selector("input#name").await?;
        input.send_keys("naru").await?;
        assert_eq!(input.get_property("value").await?, RemoteValue::String("naru".to_string()));

        let hidden = driver.query_selector("div#hidden").await?;
        assert!(!hidden.is_visible().await?);
        assert!(matches!(hidden.click().await, Err(Error::ElementNotInteractable(_))));
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_evaluate_return_values() {
    with_driver(|driver| async move {
        driver.set_content(NESTED_DIVS_HTML).await?;

        let value = |e: oxide_driver::Evaluated| e.into_value();
        assert_eq!(value(driver.evaluate("function () { return 1 }").await?), RemoteValue::Number(1.0));
        assert_eq!(value(driver.evaluate("return 1").await?), RemoteValue::Number(1.0));
        assert_eq!(value(driver.evaluate("return true").await?), RemoteValue::Bool(true));
        assert_eq!(value(driver.evaluate("return 'foo'").await?), RemoteValue::String("foo".to_string()));
        assert_eq!(value(driver.evaluate("return null;").await?), RemoteValue::Null);
        assert_eq!(value(driver.evaluate("return undefined;").await?), RemoteValue::Undefined);
        assert!(value(driver.evaluate("return new Date();").await?).as_date().is_some());

        let date = value(driver.evaluate("return new Date(1580806800123)").await?);
        assert_eq!(date.as_date().map(|d| d.timestamp_millis()), Some(1580806800123));

        let outer = driver.query_selector("div#outer").await?;
        let class = driver
            .evaluate(EvaluationRequest::new("n => n.getAttribute('class')").arg(outer))
            .await?;
        assert_eq!(value(class), RemoteValue::String("outer".to_string()));

        let echoed = driver
            .evaluate(EvaluationRequest::new("function (name) { return name }").arg("jesg"))
            .await?;
        assert_eq!(value(echoed), RemoteValue::String("jesg".to_string()));

        let document = driver.evaluate("return document").await?;
        assert!(document.is_node());
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_node_receiver_and_node_argument() {
    with_driver(|driver| async move {
        driver.set_content(NESTED_DIVS_HTML).await?;
        let inner = driver.query_selector("div#inner").await?;

        let own = inner.evaluate("function () { return this.getAttribute('class') }").await?;
        assert_eq!(own.into_value(), RemoteValue::String("inner".to_string()));

        let passed = driver
            .evaluate(EvaluationRequest::new("function (node) { return node.getAttribute('class') }").arg(&inner))
            .await?;
        assert_eq!(passed.into_value(), RemoteValue::String("inner".to_string()));

        let later = inner
            .evaluate_async("function () { setTimeout(function () { resolve(1) }, 10) }")
            .await?;
        assert_eq!(later.into_value(), RemoteValue::Number(1.0));
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_state_persists_and_exceptions_do_not_wedge() {
    with_driver(|driver| async move {
        driver.set_content(NESTED_DIVS_HTML).await?;

        driver.evaluate("function () { document.alerts = [] }").await?;
        driver.evaluate("function () { document.alerts.push('hello') }").await?;
        let shifted = driver.evaluate("function () { return document.alerts.shift() }").await?;
        assert_eq!(shifted.into_value(), RemoteValue::String("hello".to_string()));

        let err = driver.evaluate("function () { throw new Error('bang!') }").await.unwrap_err();
        assert!(matches!(err, Error::ScriptRuntime { ref message, .. } if message.contains("bang!")));

        let err = driver
            .evaluate_async("function () { throw new Error('bang!') }")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ScriptRuntime { .. }));

        let err = driver
            .evaluate_async(
                EvaluationRequest::new("async function () { throw new Error('bang async') }")
                    .timeout(Duration::from_secs(5)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ScriptRuntime { ref message, .. } if message.contains("bang async")));

        assert_eq!(driver.evaluate("return 2").await?.into_value(), RemoteValue::Number(2.0));
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_async_evaluation_times_out() {
    with_driver(|driver| async move {
        driver.set_content(NESTED_DIVS_HTML).await?;

        let err = driver
            .evaluate_async(EvaluationRequest::new("function () {}").timeout(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ScriptTimeout(limit) if limit == Duration::from_secs(1)));

        let resolved = driver.evaluate_async("function () { resolve(1) }").await?;
        assert_eq!(resolved.into_value(), RemoteValue::Number(1.0));
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_navigation_invalidates_nodes() {
    with_driver(|driver| async move {
        driver.set_content(NESTED_DIVS_HTML).await?;
        let outer = driver.query_selector("div#outer").await?;

        driver.navigate(&data_url(FORM_HTML)).await?;
        assert!(outer.is_stale());
        assert!(matches!(outer.get_attribute("class").await, Err(Error::StaleReference(_))));
        assert_eq!(driver.title().await?, "Form");
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_wait_for_late_element() {
    with_driver(|driver| async move {
        driver.set_content(NESTED_DIVS_HTML).await?;
        driver
            .evaluate(
                "function () { setTimeout(function () { \
                 const d = document.createElement('div'); d.id = 'late'; d.textContent = 'late'; \
                 document.body.appendChild(d); }, 300) }",
            )
            .await?;

        let wait = Wait::new(Duration::from_secs(5)).with_interval(Duration::from_millis(50));
        let late = wait
            .for_condition(&driver, ExpectedConditions::element_visible("div#late"))
            .await?;
        assert_eq!(late.text().await?, "late");

        let err = Wait::new(Duration::from_millis(300))
            .for_condition(&driver, ExpectedConditions::element_located("div#never"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WaitTimeout { .. }));
        Ok(())
    })
    .await;
}
