//! Element proxy
//!
//! A [`Node`] wraps a remote reference to a DOM element. Every operation is
//! routed through the execution bridge with the element as the receiver, or
//! through the DOM/Input domains keyed by its object id.

use crate::cdp::types::GetBoxModelResponse;
use crate::runtime::{
    scripts, Argument, EvaluationRequest, ExecutionBridge, ExecutionReceiver, FunctionSource, ObjectRef,
    RemoteValue, RetainedRef,
};
use crate::{Error, Result};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Element bounding box in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Box around a quad `[x1, y1, x2, y2, x3, y3, x4, y4]`
    fn from_quad(quad: &[f64]) -> Option<Self> {
        if quad.len() < 8 {
            return None;
        }

        let xs = [quad[0], quad[2], quad[4], quad[6]];
        let ys = [quad[1], quad[3], quad[5], quad[7]];
        let min_x = xs.iter().copied().fold(f64::INFINITY, f64::min);
        let max_x = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min_y = ys.iter().copied().fold(f64::INFINITY, f64::min);
        let max_y = ys.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        })
    }

    /// Centre point
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Shared handle; the remote object is released when the last clone drops
#[derive(Debug)]
struct NodeHandle {
    object: ObjectRef,
    bridge: Arc<ExecutionBridge>,
    released: AtomicBool,
}

impl Drop for NodeHandle {
    fn drop(&mut self) {
        if self.released.load(Ordering::SeqCst) || !self.bridge.contexts().is_current(&self.object) {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let bridge = Arc::clone(&self.bridge);
        let object = self.object.clone();
        runtime.spawn(async move {
            if let Err(e) = bridge.release(&object).await {
                debug!("Failed to release {}: {}", object.id, e);
            }
        });
    }
}

/// Handle to an in-page DOM element
#[derive(Debug, Clone)]
pub struct Node {
    inner: Arc<NodeHandle>,
}

/// Result of an evaluation: a DOM node comes back as a [`Node`]
#[derive(Debug, Clone)]
pub enum Evaluated {
    Value(RemoteValue),
    Node(Node),
}

impl Evaluated {
    pub(crate) fn wrap(value: RemoteValue, bridge: &Arc<ExecutionBridge>) -> Self {
        match value {
            RemoteValue::Object(obj) if obj.is_node() => Evaluated::Node(Node::new(obj, Arc::clone(bridge))),
            other => Evaluated::Value(other),
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Evaluated::Node(_))
    }

    pub fn as_value(&self) -> Option<&RemoteValue> {
        match self {
            Evaluated::Value(value) => Some(value),
            Evaluated::Node(_) => None,
        }
    }

    pub fn into_node(self) -> Option<Node> {
        match self {
            Evaluated::Node(node) => Some(node),
            Evaluated::Value(_) => None,
        }
    }

    /// Plain value; a node becomes its object reference
    ///
    /// The reference is handed over to the caller: dropping the node no longer
    /// releases it, it lives until the object group is released.
    pub fn into_value(self) -> RemoteValue {
        match self {
            Evaluated::Value(value) => value,
            Evaluated::Node(node) => node.into_object(),
        }
    }
}

impl From<&Node> for Argument {
    fn from(node: &Node) -> Self {
        node.retained()
    }
}

impl From<Node> for Argument {
    fn from(node: Node) -> Self {
        node.retained()
    }
}

/// Layout failures (no box, not rendered) mean the element cannot take input
fn layout_error(err: Error) -> Error {
    match err {
        Error::Cdp { message, .. } => Error::not_interactable(message),
        other => other,
    }
}

fn script(source: &str) -> EvaluationRequest {
    EvaluationRequest::new(FunctionSource::Declaration(source.to_string()))
}

/// First element matching `selector` under the receiver
pub(crate) async fn query_one(
    bridge: &Arc<ExecutionBridge>,
    receiver: ExecutionReceiver,
    selector: &str,
) -> Result<Node> {
    let found = bridge
        .evaluate(script(scripts::QUERY_SELECTOR_SCRIPT).arg(selector).on(receiver))
        .await?;

    match found {
        RemoteValue::Object(obj) if obj.is_node() => Ok(Node::new(obj, Arc::clone(bridge))),
        RemoteValue::Null | RemoteValue::Undefined => Err(Error::not_found(selector)),
        other => Err(Error::protocol(format!(
            "querySelector({}) returned {}",
            selector,
            other.type_name()
        ))),
    }
}

/// All elements matching `selector` under the receiver, in document order
pub(crate) async fn query_all(
    bridge: &Arc<ExecutionBridge>,
    receiver: ExecutionReceiver,
    selector: &str,
) -> Result<Vec<Node>> {
    let found = bridge
        .evaluate(script(scripts::QUERY_SELECTOR_ALL_SCRIPT).arg(selector).on(receiver))
        .await?;

    let array = match found {
        RemoteValue::Object(obj) if obj.is_array() => obj,
        other => {
            return Err(Error::protocol(format!(
                "querySelectorAll({}) returned {}",
                selector,
                other.type_name()
            )))
        }
    };

    let elements = bridge.array_elements(&array).await;
    if let Err(e) = bridge.release(&array).await {
        debug!("Failed to release result array: {}", e);
    }

    Ok(elements?
        .into_iter()
        .filter_map(|value| match value {
            RemoteValue::Object(obj) if obj.is_node() => Some(Node::new(obj, Arc::clone(bridge))),
            _ => None,
        })
        .collect())
}

impl Node {
    pub(crate) fn new(object: ObjectRef, bridge: Arc<ExecutionBridge>) -> Self {
        Self {
            inner: Arc::new(NodeHandle {
                object,
                bridge,
                released: AtomicBool::new(false),
            }),
        }
    }

    /// Underlying remote reference
    pub fn object(&self) -> &ObjectRef {
        &self.inner.object
    }

    /// Short description from the browser, e.g. `div#outer.outer`
    pub fn description(&self) -> Option<&str> {
        self.inner.object.description.as_deref()
    }

    /// Whether the element's document has been replaced
    pub fn is_stale(&self) -> bool {
        !self.inner.bridge.contexts().is_current(&self.inner.object)
    }

    fn bridge(&self) -> &Arc<ExecutionBridge> {
        &self.inner.bridge
    }

    /// Argument that holds this node alive until the call is done with it
    fn retained(&self) -> Argument {
        let owner: Arc<NodeHandle> = Arc::clone(&self.inner);
        Argument::Retained(RetainedRef::new(self.inner.object.clone(), owner))
    }

    /// Give up ownership of the remote object without releasing it
    fn into_object(self) -> RemoteValue {
        self.inner.released.store(true, Ordering::SeqCst);
        RemoteValue::Object(self.inner.object.clone())
    }

    fn receiver(&self) -> ExecutionReceiver {
        ExecutionReceiver::Node(self.inner.object.clone())
    }

    async fn run(&self, source: &str, args: Vec<Argument>) -> Result<RemoteValue> {
        self.bridge()
            .evaluate(script(source).args(args).on(self.receiver()))
            .await
    }

    pub async fn query_selector(&self, selector: &str) -> Result<Node> {
        query_one(self.bridge(), self.receiver(), selector).await
    }

    pub async fn query_selector_all(&self, selector: &str) -> Result<Vec<Node>> {
        query_all(self.bridge(), self.receiver(), selector).await
    }

    /// Attribute value, `None` when absent
    pub async fn get_attribute(&self, name: &str) -> Result<Option<String>> {
        match self.run(scripts::GET_ATTRIBUTE_SCRIPT, vec![name.into()]).await? {
            RemoteValue::String(value) => Ok(Some(value)),
            RemoteValue::Null | RemoteValue::Undefined => Ok(None),
            other => Err(Error::protocol(format!(
                "getAttribute({}) returned {}",
                name,
                other.type_name()
            ))),
        }
    }

    /// Snapshot of every attribute
    pub async fn get_attributes(&self) -> Result<HashMap<String, String>> {
        match self.run(scripts::GET_ATTRIBUTES_SCRIPT, Vec::new()).await? {
            RemoteValue::String(json) => Ok(serde_json::from_str(&json)?),
            other => Err(Error::protocol(format!(
                "attribute snapshot returned {}",
                other.type_name()
            ))),
        }
    }

    /// Current value of a JavaScript property, e.g. `value` or `checked`
    pub async fn get_property(&self, name: &str) -> Result<RemoteValue> {
        self.run(scripts::GET_PROPERTY_SCRIPT, vec![name.into()]).await
    }

    pub async fn scroll_into_view(&self) -> Result<()> {
        self.bridge()
            .call_dom(self.object(), "DOM.scrollIntoViewIfNeeded", json!({}))
            .await
            .map_err(layout_error)?;
        Ok(())
    }

    /// Content box of the element
    pub async fn bounding_box(&self) -> Result<BoundingBox> {
        let result = self
            .bridge()
            .call_dom(self.object(), "DOM.getBoxModel", json!({}))
            .await
            .map_err(layout_error)?;

        let response: GetBoxModelResponse = serde_json::from_value(result)?;
        BoundingBox::from_quad(&response.model.content)
            .filter(|bbox| bbox.width > 0.0 && bbox.height > 0.0)
            .ok_or_else(|| {
                Error::not_interactable(format!(
                    "{} has no visible box",
                    self.description().unwrap_or("element")
                ))
            })
    }

    /// Scroll into view and click the centre of the element
    pub async fn click(&self) -> Result<()> {
        self.scroll_into_view().await?;
        let (x, y) = self.bounding_box().await?.center();
        debug!("Clicking {} at ({}, {})", self.description().unwrap_or("element"), x, y);

        let client = self.bridge().client();
        client
            .call_method("Input.dispatchMouseEvent", json!({ "type": "mouseMoved", "x": x, "y": y }))
            .await?;

        for event in ["mousePressed", "mouseReleased"] {
            client
                .call_method(
                    "Input.dispatchMouseEvent",
                    json!({
                        "type": event,
                        "x": x,
                        "y": y,
                        "button": "left",
                        "clickCount": 1,
                    }),
                )
                .await?;
        }

        Ok(())
    }

    pub async fn focus(&self) -> Result<()> {
        self.bridge()
            .call_dom(self.object(), "DOM.focus", json!({}))
            .await
            .map_err(|e| match e {
                Error::Cdp { message, .. } => Error::not_interactable(message),
                other => other,
            })?;
        Ok(())
    }

    /// Focus the element and type `text` one key press per character
    pub async fn send_keys(&self, text: &str) -> Result<()> {
        self.focus().await?;

        let client = self.bridge().client();
        for ch in text.chars() {
            let (key, typed) = match ch {
                '\n' | '\r' => ("Enter".to_string(), "\r".to_string()),
                '\t' => ("Tab".to_string(), "\t".to_string()),
                other => (other.to_string(), other.to_string()),
            };

            client
                .call_method(
                    "Input.dispatchKeyEvent",
                    json!({ "type": "keyDown", "key": key, "text": typed, "unmodifiedText": typed }),
                )
                .await?;
            client
                .call_method("Input.dispatchKeyEvent", json!({ "type": "keyUp", "key": key }))
                .await?;
        }

        Ok(())
    }

    pub async fn is_visible(&self) -> Result<bool> {
        Ok(self.run(scripts::IS_VISIBLE_SCRIPT, Vec::new()).await?.is_truthy())
    }

    /// Rendered text of the element
    pub async fn text(&self) -> Result<String> {
        Ok(self
            .run(scripts::TEXT_SCRIPT, Vec::new())
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    /// Evaluate with `this` bound to the element
    pub async fn evaluate<R: Into<EvaluationRequest>>(&self, request: R) -> Result<Evaluated> {
        let value = self.bridge().evaluate(request.into().on(self.receiver())).await?;
        Ok(Evaluated::wrap(value, self.bridge()))
    }

    /// Async evaluation with `this` bound to the element
    pub async fn evaluate_async<R: Into<EvaluationRequest>>(&self, request: R) -> Result<Evaluated> {
        let value = self
            .bridge()
            .evaluate_async(request.into().on(self.receiver()))
            .await?;
        Ok(Evaluated::wrap(value, self.bridge()))
    }

    /// Release the remote object now instead of on drop
    pub async fn release(&self) -> Result<()> {
        if self.inner.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.bridge().release(self.object()).await
    }
}
