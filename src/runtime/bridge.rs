//! Execution bridge
//!
//! Runs host-supplied functions in the page through `Runtime.callFunctionOn`,
//! bound either to the global object or to an element, and turns the outcome
//! into a [`RemoteValue`] or a typed error.

use super::codec::{self, Argument, ObjectRef, RemoteValue};
use super::context::ContextTracker;
use super::scripts;
use crate::cdp::types::{
    CallArgument, CallFunctionOnParams, EvaluateParams, EvaluateResponse, ExceptionDetails,
    GetPropertiesResponse, RemoteObject,
};
use crate::cdp::CdpClient;
use crate::{Error, Result};
use serde_json::Value;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

/// Object group every result handle is created in
pub const OBJECT_GROUP: &str = "oxide-driver";

const STALE_MESSAGES: [&str; 3] = [
    "Could not find object with given id",
    "Cannot find context with specified id",
    "Execution context was destroyed",
];

/// Driver timeouts, read at call time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Default bound for `evaluate` / `evaluate_async`
    pub script: Duration,
    /// Bound for waiting on the load event after `navigate`
    pub navigation: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            script: Duration::from_millis(30_000),
            navigation: Duration::from_millis(30_000),
        }
    }
}

/// Source of an evaluated function
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionSource {
    /// A complete declaration: `function (a) { .. }`, `a => ..`, `async function () { .. }`
    Declaration(String),
    /// Statements only, e.g. `return 1`
    Body(String),
}

impl FunctionSource {
    /// Declaration to send; bodies get the parameters matching the call style
    pub fn to_declaration(&self, is_async: bool) -> String {
        match self {
            FunctionSource::Declaration(source) => source.clone(),
            FunctionSource::Body(body) if is_async => format!("function (resolve, reject) {{\n{}\n}}", body),
            FunctionSource::Body(body) => format!("function () {{\n{}\n}}", body),
        }
    }

    /// `keyword` as a whole word, not the prefix of an identifier
    fn starts_with_keyword(source: &str, keyword: &str) -> bool {
        source
            .strip_prefix(keyword)
            .and_then(|rest| rest.chars().next())
            .map_or(false, |c| c.is_whitespace() || c == '(' || c == '*')
    }

    fn looks_like_declaration(source: &str) -> bool {
        let source = source.trim_start();
        if Self::starts_with_keyword(source, "function") || Self::starts_with_keyword(source, "async") {
            return true;
        }

        // Arrow functions: `(a, b) => ..` or `a => ..`
        match source.find("=>") {
            Some(pos) => {
                let head = source[..pos].trim();
                (head.starts_with('(') && head.ends_with(')'))
                    || (!head.is_empty()
                        && head.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$'))
            }
            None => false,
        }
    }
}

impl From<&str> for FunctionSource {
    fn from(source: &str) -> Self {
        if Self::looks_like_declaration(source) {
            FunctionSource::Declaration(source.to_string())
        } else {
            FunctionSource::Body(source.to_string())
        }
    }
}

impl From<String> for FunctionSource {
    fn from(source: String) -> Self {
        FunctionSource::from(source.as_str())
    }
}

/// What `this` is bound to during an evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionReceiver {
    /// The page's global object
    Page,
    /// A specific in-page object
    Node(ObjectRef),
}

/// One evaluation: function, arguments, receiver and optional timeout override
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRequest {
    pub function: FunctionSource,
    pub args: Vec<Argument>,
    pub receiver: ExecutionReceiver,
    pub timeout: Option<Duration>,
}

impl EvaluationRequest {
    pub fn new<F: Into<FunctionSource>>(function: F) -> Self {
        Self {
            function: function.into(),
            args: Vec::new(),
            receiver: ExecutionReceiver::Page,
            timeout: None,
        }
    }

    /// Append one argument
    pub fn arg<A: Into<Argument>>(mut self, arg: A) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Argument>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Override the driver's script timeout for this call
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Bind `this` to the given receiver
    pub fn on(mut self, receiver: ExecutionReceiver) -> Self {
        self.receiver = receiver;
        self
    }
}

impl From<&str> for EvaluationRequest {
    fn from(source: &str) -> Self {
        EvaluationRequest::new(source)
    }
}

impl From<FunctionSource> for EvaluationRequest {
    fn from(function: FunctionSource) -> Self {
        EvaluationRequest::new(function)
    }
}

fn quote(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}

fn build_declaration(function: &FunctionSource, token: Option<&str>, revive: &[usize]) -> String {
    let mut declaration = function.to_declaration(token.is_some());

    if let Some(token) = token {
        declaration = scripts::ASYNC_WRAPPER_TEMPLATE
            .replace("__TOKEN__", &quote(token))
            .replace("__FUNCTION__", &declaration);
    }

    if !revive.is_empty() {
        let indices: Vec<String> = revive.iter().map(usize::to_string).collect();
        declaration = scripts::REVIVE_DATES_TEMPLATE
            .replace("__INDICES__", &format!("[{}]", indices.join(", ")))
            .replace("__FUNCTION__", &declaration);
    }

    declaration
}

/// Map "object is gone" protocol errors to `StaleReference`
fn map_stale(err: Error) -> Error {
    match err {
        Error::Cdp { message, .. } if STALE_MESSAGES.iter().any(|m| message.contains(m)) => {
            Error::stale(message)
        }
        other => other,
    }
}

fn script_error(details: &ExceptionDetails) -> Error {
    let description = details.exception.as_ref().and_then(|exception| {
        exception.description.clone().or_else(|| {
            exception.value.as_ref().map(|value| match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
        })
    });

    match description {
        Some(description) => {
            let message = description.lines().next().unwrap_or_default().to_string();
            Error::script_runtime(message, Some(description))
        }
        None => Error::script_runtime(
            details.text.clone().unwrap_or_else(|| "Uncaught exception".to_string()),
            None,
        ),
    }
}

/// Evaluates functions in the page on behalf of a driver and its nodes
#[derive(Debug)]
pub struct ExecutionBridge {
    client: Arc<dyn CdpClient>,
    contexts: Arc<ContextTracker>,
    timeouts: RwLock<Timeouts>,
}

impl ExecutionBridge {
    pub fn new(client: Arc<dyn CdpClient>, timeouts: Timeouts) -> Self {
        Self {
            client,
            contexts: Arc::new(ContextTracker::new()),
            timeouts: RwLock::new(timeouts),
        }
    }

    pub fn client(&self) -> &Arc<dyn CdpClient> {
        &self.client
    }

    pub fn contexts(&self) -> &Arc<ContextTracker> {
        &self.contexts
    }

    pub fn timeouts(&self) -> Timeouts {
        *self.timeouts.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_timeouts(&self, timeouts: Timeouts) {
        *self.timeouts.write().unwrap_or_else(|e| e.into_inner()) = timeouts;
    }

    pub fn set_script_timeout(&self, script: Duration) {
        self.timeouts.write().unwrap_or_else(|e| e.into_inner()).script = script;
    }

    /// Call a function and return what it returns
    pub async fn evaluate(&self, request: EvaluationRequest) -> Result<RemoteValue> {
        self.run(request, false).await
    }

    /// Call a function with `(resolve, reject, ...args)` and wait for it to settle
    pub async fn evaluate_async(&self, request: EvaluationRequest) -> Result<RemoteValue> {
        self.run(request, true).await
    }

    async fn run(&self, request: EvaluationRequest, is_async: bool) -> Result<RemoteValue> {
        let limit = request.timeout.unwrap_or_else(|| self.timeouts().script);

        let mut arguments = Vec::with_capacity(request.args.len());
        let mut revive = Vec::new();
        for (index, arg) in request.args.iter().enumerate() {
            if let Some(obj) = arg.reference() {
                self.contexts.check(obj)?;
            }
            let encoded = codec::encode(arg)?;
            if encoded.revive_date {
                revive.push(index);
            }
            arguments.push(encoded.argument);
        }

        let token = is_async.then(|| uuid::Uuid::new_v4().to_string());
        let declaration = build_declaration(&request.function, token.as_deref(), &revive);

        debug!(
            "Evaluating {} function (timeout {:?}, {} args)",
            if is_async { "async" } else { "sync" },
            limit,
            arguments.len()
        );

        let call = self.call_on_receiver(&request.receiver, &declaration, arguments, is_async);
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Script did not settle within {:?}", limit);
                if let Some(token) = token {
                    self.spawn_cancel(token);
                }
                Err(Error::ScriptTimeout(limit))
            }
        }
    }

    async fn call_on_receiver(
        &self,
        receiver: &ExecutionReceiver,
        declaration: &str,
        arguments: Vec<CallArgument>,
        await_promise: bool,
    ) -> Result<RemoteValue> {
        match receiver {
            ExecutionReceiver::Node(obj) => {
                self.contexts.check(obj)?;
                self.call_function_on(obj, declaration, arguments, await_promise).await
            }
            ExecutionReceiver::Page => {
                let global = self.global_object().await?;
                match self
                    .call_function_on(&global, declaration, arguments.clone(), await_promise)
                    .await
                {
                    // The cached global belonged to a context the page already discarded
                    Err(Error::StaleReference(_)) => {
                        debug!("Global object went away, fetching it again");
                        self.contexts.forget_global();
                        let global = self.global_object().await?;
                        self.call_function_on(&global, declaration, arguments, await_promise)
                            .await
                    }
                    other => other,
                }
            }
        }
    }

    async fn call_function_on(
        &self,
        target: &ObjectRef,
        declaration: &str,
        arguments: Vec<CallArgument>,
        await_promise: bool,
    ) -> Result<RemoteValue> {
        let generation = self.contexts.generation();
        let params = CallFunctionOnParams {
            function_declaration: declaration.to_string(),
            object_id: Some(target.id.as_str().to_string()),
            arguments,
            await_promise,
            return_by_value: false,
            user_gesture: Some(true),
            object_group: Some(OBJECT_GROUP.to_string()),
        };

        let result = self
            .client
            .call_method("Runtime.callFunctionOn", serde_json::to_value(params)?)
            .await
            .map_err(map_stale)?;

        let response: EvaluateResponse = serde_json::from_value(result)?;
        if let Some(details) = response.exception_details {
            return Err(script_error(&details));
        }

        self.decode(&response.result, generation).await
    }

    /// Decode a result handle; dates are read back at millisecond precision
    async fn decode(&self, obj: &RemoteObject, generation: u64) -> Result<RemoteValue> {
        match (obj.subtype.as_deref(), obj.object_id.as_deref()) {
            (Some("date"), Some(id)) if obj.value.is_none() => {
                let date = ObjectRef::new(id, generation);
                let exact = self.date_millis(&date).await;
                if let Err(e) = self.release(&date).await {
                    debug!("Failed to release date {}: {}", id, e);
                }
                exact
            }
            _ => codec::decode(obj, generation),
        }
    }

    async fn date_millis(&self, date: &ObjectRef) -> Result<RemoteValue> {
        let params = CallFunctionOnParams {
            function_declaration: scripts::DATE_MILLIS_SCRIPT.to_string(),
            object_id: Some(date.id.as_str().to_string()),
            arguments: Vec::new(),
            await_promise: false,
            return_by_value: true,
            user_gesture: None,
            object_group: None,
        };

        let result = self
            .client
            .call_method("Runtime.callFunctionOn", serde_json::to_value(params)?)
            .await
            .map_err(map_stale)?;

        let response: EvaluateResponse = serde_json::from_value(result)?;
        if let Some(details) = response.exception_details {
            return Err(script_error(&details));
        }

        match codec::decode(&response.result, date.generation)? {
            RemoteValue::Number(millis) => codec::date_from_millis(millis),
            other => Err(Error::protocol(format!("Date.getTime() returned {}", other.type_name()))),
        }
    }

    /// Global object of the current context, fetched once per generation
    async fn global_object(&self) -> Result<ObjectRef> {
        if let Some(global) = self.contexts.cached_global() {
            return Ok(global);
        }

        let generation = self.contexts.generation();
        let params = EvaluateParams {
            expression: scripts::GLOBAL_OBJECT_EXPRESSION.to_string(),
            await_promise: None,
            return_by_value: Some(false),
            object_group: Some(OBJECT_GROUP.to_string()),
        };

        let result = self
            .client
            .call_method("Runtime.evaluate", serde_json::to_value(params)?)
            .await
            .map_err(map_stale)?;

        let response: EvaluateResponse = serde_json::from_value(result)?;
        if let Some(details) = response.exception_details {
            return Err(script_error(&details));
        }

        match codec::decode(&response.result, generation)? {
            RemoteValue::Object(global) => {
                self.contexts.cache_global(global.clone());
                Ok(global)
            }
            other => Err(Error::protocol(format!(
                "Global object evaluated to {}",
                other.type_name()
            ))),
        }
    }

    /// Reject a stranded async evaluation through its registry token
    fn spawn_cancel(&self, token: String) {
        let params = EvaluateParams {
            expression: scripts::CANCEL_ASYNC_TEMPLATE.replace("__TOKEN__", &quote(&token)),
            await_promise: None,
            return_by_value: Some(true),
            object_group: None,
        };
        let params = match serde_json::to_value(params) {
            Ok(params) => params,
            Err(e) => {
                warn!("Failed to build cancellation for {}: {}", token, e);
                return;
            }
        };

        let client = Arc::clone(&self.client);
        tokio::spawn(async move {
            if let Err(e) = client.call_method("Runtime.evaluate", params).await {
                debug!("Cancellation of {} failed: {}", token, e);
            }
        });
    }

    /// Own properties of an object that can be decoded, in protocol order
    pub async fn properties(&self, obj: &ObjectRef) -> Result<Vec<(String, RemoteValue)>> {
        self.contexts.check(obj)?;
        let generation = self.contexts.generation();

        let result = self
            .client
            .call_method(
                "Runtime.getProperties",
                serde_json::json!({ "objectId": obj.id.as_str(), "ownProperties": true }),
            )
            .await
            .map_err(map_stale)?;

        let response: GetPropertiesResponse = serde_json::from_value(result)?;
        let mut properties = Vec::with_capacity(response.result.len());
        for property in response.result {
            let Some(value) = property.value else { continue };
            match self.decode(&value, generation).await {
                Ok(decoded) => properties.push((property.name, decoded)),
                Err(e) => debug!("Skipping property {}: {}", property.name, e),
            }
        }

        Ok(properties)
    }

    /// Elements of a remote array in index order
    pub async fn array_elements(&self, array: &ObjectRef) -> Result<Vec<RemoteValue>> {
        let mut indexed: Vec<(usize, RemoteValue)> = self
            .properties(array)
            .await?
            .into_iter()
            .filter_map(|(name, value)| name.parse::<usize>().ok().map(|index| (index, value)))
            .collect();
        indexed.sort_by_key(|(index, _)| *index);

        Ok(indexed.into_iter().map(|(_, value)| value).collect())
    }

    /// Release one remote object
    pub async fn release(&self, obj: &ObjectRef) -> Result<()> {
        self.client
            .call_method(
                "Runtime.releaseObject",
                serde_json::json!({ "objectId": obj.id.as_str() }),
            )
            .await
            .map_err(map_stale)?;
        Ok(())
    }

    /// Release every handle this bridge has produced
    pub async fn release_all(&self) -> Result<()> {
        self.contexts.forget_global();
        self.client
            .call_method(
                "Runtime.releaseObjectGroup",
                serde_json::json!({ "objectGroup": OBJECT_GROUP }),
            )
            .await?;
        Ok(())
    }

    /// Issue a DOM or Input domain command keyed by the object's id
    pub async fn call_dom(&self, obj: &ObjectRef, method: &str, params: Value) -> Result<Value> {
        self.contexts.check(obj)?;

        let mut params = match params {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            other => return Err(Error::internal(format!("{} params must be an object, got {}", method, other))),
        };
        params.insert("objectId".to_string(), Value::String(obj.id.as_str().to_string()));

        self.client
            .call_method(method, Value::Object(params))
            .await
            .map_err(map_stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_source_detection() {
        for declaration in [
            "function (name) { return name }",
            "function(){}",
            "async function () { return 1 }",
            "(a, b) => a + b",
            "n => n.getAttribute('class')",
            "  async () => 1",
            "async x => x",
            "function* ids() { yield 1 }",
        ] {
            assert!(
                matches!(FunctionSource::from(declaration), FunctionSource::Declaration(_)),
                "{}",
                declaration
            );
        }

        for body in [
            "return 1",
            "return document",
            "resolve(1)",
            "const f = x => x; return f(2)",
            "functionCount = 2; return functionCount",
            "asyncDone = true; return asyncDone",
        ] {
            assert!(matches!(FunctionSource::from(body), FunctionSource::Body(_)), "{}", body);
        }
    }

    #[test]
    fn test_body_parameters_follow_call_style() {
        let body = FunctionSource::from("resolve(1)");
        assert!(body.to_declaration(true).starts_with("function (resolve, reject)"));
        assert!(body.to_declaration(false).starts_with("function ()"));
    }

    #[test]
    fn test_async_wrapper_binds_token_and_function() {
        let declaration = build_declaration(&FunctionSource::from("resolve(__TOKEN__)"), Some("abc"), &[]);
        assert!(declaration.contains("const token = \"abc\";"));
        // user code is inserted verbatim, placeholders inside it are left alone
        assert!(declaration.contains("resolve(__TOKEN__)"));
        assert!(declaration.contains("(resolve, reject, ...args)"));
        // a returned promise that rejects settles the wrapper
        assert!(declaration.contains("result.then(undefined, reject)"));
    }

    #[test]
    fn test_date_revival_wraps_outermost() {
        let declaration = build_declaration(&FunctionSource::from("d => d.getFullYear()"), Some("t"), &[0, 2]);
        assert!(declaration.starts_with("function (...args) {\n    for (const i of [0, 2])"));
        assert!(declaration.contains("registry.set(token, reject)"));
    }

    #[test]
    fn test_stale_mapping() {
        let err = map_stale(Error::cdp(-32000, "Could not find object with given id"));
        assert!(matches!(err, Error::StaleReference(_)));

        let err = map_stale(Error::cdp(-32000, "Cannot find default execution context"));
        assert!(matches!(err, Error::Cdp { .. }));
    }
}
