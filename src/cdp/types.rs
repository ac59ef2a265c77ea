//! CDP (Chrome DevTools Protocol) type definitions
//!
//! This module defines the core data structures for CDP communication.

use serde::{Deserialize, Serialize};

/// CDP JSON-RPC request
#[derive(Debug, Clone, Serialize)]
pub struct CdpRequest {
    /// Request ID
    pub id: u64,
    /// Method name (e.g., "Page.navigate")
    pub method: String,
    /// Method parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Session ID for multi-session targets
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// CDP JSON-RPC notification (event)
#[derive(Debug, Clone, Deserialize)]
pub struct CdpNotification {
    /// Event method (e.g., "Page.loadEventFired")
    pub method: String,
    /// Event parameters
    #[serde(default)]
    pub params: serde_json::Value,
    /// Session ID for multi-session targets
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<String>,
}

/// CDP JSON-RPC response
#[derive(Debug, Clone, Deserialize)]
pub struct CdpRpcResponse {
    /// Response ID (matches request ID)
    pub id: u64,
    /// Response result
    #[serde(default)]
    pub result: serde_json::Value,
    /// Error if any
    #[serde(default)]
    pub error: Option<CdpErrorDetail>,
}

/// CDP error detail
#[derive(Debug, Clone, Deserialize)]
pub struct CdpErrorDetail {
    /// Error code
    pub code: i64,
    /// Error message
    pub message: String,
    /// Additional error data
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Page navigation parameters
#[derive(Debug, Clone, Serialize)]
pub struct NavigateParams {
    /// URL to navigate to
    pub url: String,
    /// Referrer URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    /// Transition type
    #[serde(rename = "transitionType", skip_serializing_if = "Option::is_none")]
    pub transition_type: Option<String>,
}

/// Page navigation response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateResponse {
    /// Frame that navigated
    pub frame_id: String,
    /// Loader ID, absent for same-document navigation
    #[serde(default)]
    pub loader_id: Option<String>,
    /// Set when the navigation failed
    #[serde(default)]
    pub error_text: Option<String>,
}

/// JavaScript evaluation parameters
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateParams {
    /// JavaScript expression to evaluate
    pub expression: String,
    /// Whether to await promise
    #[serde(skip_serializing_if = "Option::is_none")]
    pub await_promise: Option<bool>,
    /// Whether to return as value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_by_value: Option<bool>,
    /// Object group for the result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_group: Option<String>,
}

/// Parameters for `Runtime.callFunctionOn`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFunctionOnParams {
    /// Function source, e.g. `function (a) { return a }`
    pub function_declaration: String,
    /// Object the function is called on (`this`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    /// Positional arguments
    pub arguments: Vec<CallArgument>,
    /// Await a returned promise before responding
    pub await_promise: bool,
    /// Return primitives and JSON by value instead of a handle
    pub return_by_value: bool,
    /// Treat the call as initiated by a user gesture
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_gesture: Option<bool>,
    /// Object group for the result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_group: Option<String>,
}

/// One argument of `Runtime.callFunctionOn`
///
/// All fields absent means `undefined`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallArgument {
    /// Primitive value or serializable JSON
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Primitive value which can not be JSON-stringified
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unserializable_value: Option<String>,
    /// Remote object handle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
}

/// Remote object (result of JavaScript evaluation)
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    /// Object type
    #[serde(default)]
    pub r#type: String,
    /// Object subtype
    #[serde(default)]
    pub subtype: Option<String>,
    /// Object class name
    #[serde(default)]
    pub class_name: Option<String>,
    /// Object value
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    /// Unserializable value
    #[serde(default)]
    pub unserializable_value: Option<String>,
    /// Object description
    #[serde(default)]
    pub description: Option<String>,
    /// Handle for non-primitive values
    #[serde(default)]
    pub object_id: Option<String>,
}

/// Exception details
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    /// Exception ID
    #[serde(default)]
    pub exception_id: i64,
    /// Exception text
    #[serde(default)]
    pub text: Option<String>,
    /// Line number
    #[serde(default)]
    pub line_number: i64,
    /// Column number
    #[serde(default)]
    pub column_number: i64,
    /// Exception object
    #[serde(default)]
    pub exception: Option<RemoteObject>,
}

/// Response of `Runtime.evaluate` and `Runtime.callFunctionOn`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
    /// Evaluation result
    #[serde(default)]
    pub result: RemoteObject,
    /// Exception details if evaluation failed
    #[serde(default)]
    pub exception_details: Option<ExceptionDetails>,
}

/// Response of `Runtime.getProperties`
#[derive(Debug, Clone, Deserialize)]
pub struct GetPropertiesResponse {
    /// Object properties
    #[serde(default)]
    pub result: Vec<PropertyDescriptor>,
}

/// Single property of a remote object
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    /// Property name
    pub name: String,
    /// Property value, absent for accessors
    #[serde(default)]
    pub value: Option<RemoteObject>,
    /// Whether the property is enumerable
    #[serde(default)]
    pub enumerable: bool,
}

/// Response of `Page.getFrameTree`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetFrameTreeResponse {
    /// Root of the frame tree
    pub frame_tree: FrameTree,
}

/// Frame tree node
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameTree {
    /// The frame
    pub frame: Frame,
}

/// Frame information
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    /// Frame ID
    pub id: String,
    /// Document URL
    #[serde(default)]
    pub url: String,
}

/// Response of `DOM.getBoxModel`
#[derive(Debug, Clone, Deserialize)]
pub struct GetBoxModelResponse {
    /// Box model
    pub model: BoxModel,
}

/// Element box model, quads are `[x1, y1, x2, y2, x3, y3, x4, y4]`
#[derive(Debug, Clone, Deserialize)]
pub struct BoxModel {
    /// Content box
    pub content: Vec<f64>,
    /// Node width
    #[serde(default)]
    pub width: f64,
    /// Node height
    #[serde(default)]
    pub height: f64,
}
