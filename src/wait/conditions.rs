//! Expected conditions
//!
//! Ready-made predicates for [`Wait::for_condition`](super::Wait::for_condition).
//! A condition answers `None` while the page is not there yet; a missing
//! element counts as "not yet", any other failure is handed to the poller.

use crate::runtime::{EvaluationRequest, RemoteValue};
use crate::session::{Driver, Evaluated, Node};
use crate::{Error, Result};
use async_trait::async_trait;

/// A predicate over the page that eventually produces a value
#[async_trait]
pub trait Condition: Send + Sync {
    type Output: Send;

    /// One poll: `Some` once satisfied
    async fn check(&self, driver: &Driver) -> Result<Option<Self::Output>>;

    /// What is being waited for, used in timeout messages
    fn description(&self) -> String;
}

/// Treat `NotFound` as an unmet condition
fn found<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(Error::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Factory for the common conditions
pub struct ExpectedConditions;

impl ExpectedConditions {
    pub fn element_located(selector: &str) -> ElementLocated {
        ElementLocated {
            selector: selector.to_string(),
        }
    }

    pub fn elements_located(selector: &str) -> ElementsLocated {
        ElementsLocated {
            selector: selector.to_string(),
        }
    }

    pub fn element_visible(selector: &str) -> ElementVisible {
        ElementVisible {
            selector: selector.to_string(),
        }
    }

    pub fn attribute_is(selector: &str, name: &str, value: &str) -> AttributeIs {
        AttributeIs {
            selector: selector.to_string(),
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    pub fn title_is(title: &str) -> TitleIs {
        TitleIs {
            title: title.to_string(),
        }
    }

    pub fn url_contains(fragment: &str) -> UrlContains {
        UrlContains {
            fragment: fragment.to_string(),
        }
    }

    /// Satisfied once the evaluation result is truthy; yields that result
    pub fn script_truthy<R: Into<EvaluationRequest>>(request: R) -> ScriptTruthy {
        ScriptTruthy {
            request: request.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ElementLocated {
    selector: String,
}

#[async_trait]
impl Condition for ElementLocated {
    type Output = Node;

    async fn check(&self, driver: &Driver) -> Result<Option<Node>> {
        found(driver.query_selector(&self.selector).await)
    }

    fn description(&self) -> String {
        format!("element {}", self.selector)
    }
}

#[derive(Debug, Clone)]
pub struct ElementsLocated {
    selector: String,
}

#[async_trait]
impl Condition for ElementsLocated {
    type Output = Vec<Node>;

    async fn check(&self, driver: &Driver) -> Result<Option<Vec<Node>>> {
        let nodes = driver.query_selector_all(&self.selector).await?;
        Ok((!nodes.is_empty()).then_some(nodes))
    }

    fn description(&self) -> String {
        format!("at least one element {}", self.selector)
    }
}

#[derive(Debug, Clone)]
pub struct ElementVisible {
    selector: String,
}

#[async_trait]
impl Condition for ElementVisible {
    type Output = Node;

    async fn check(&self, driver: &Driver) -> Result<Option<Node>> {
        let Some(node) = found(driver.query_selector(&self.selector).await)? else {
            return Ok(None);
        };
        Ok(node.is_visible().await?.then_some(node))
    }

    fn description(&self) -> String {
        format!("visible element {}", self.selector)
    }
}

#[derive(Debug, Clone)]
pub struct AttributeIs {
    selector: String,
    name: String,
    value: String,
}

#[async_trait]
impl Condition for AttributeIs {
    type Output = Node;

    async fn check(&self, driver: &Driver) -> Result<Option<Node>> {
        let Some(node) = found(driver.query_selector(&self.selector).await)? else {
            return Ok(None);
        };
        let current = node.get_attribute(&self.name).await?;
        Ok((current.as_deref() == Some(self.value.as_str())).then_some(node))
    }

    fn description(&self) -> String {
        format!("{}[{}=\"{}\"]", self.selector, self.name, self.value)
    }
}

#[derive(Debug, Clone)]
pub struct TitleIs {
    title: String,
}

#[async_trait]
impl Condition for TitleIs {
    type Output = ();

    async fn check(&self, driver: &Driver) -> Result<Option<()>> {
        Ok((driver.title().await? == self.title).then_some(()))
    }

    fn description(&self) -> String {
        format!("title \"{}\"", self.title)
    }
}

#[derive(Debug, Clone)]
pub struct UrlContains {
    fragment: String,
}

#[async_trait]
impl Condition for UrlContains {
    type Output = String;

    async fn check(&self, driver: &Driver) -> Result<Option<String>> {
        let url = driver.url().await?;
        Ok(url.contains(&self.fragment).then_some(url))
    }

    fn description(&self) -> String {
        format!("url containing \"{}\"", self.fragment)
    }
}

#[derive(Debug, Clone)]
pub struct ScriptTruthy {
    request: EvaluationRequest,
}

#[async_trait]
impl Condition for ScriptTruthy {
    type Output = Evaluated;

    async fn check(&self, driver: &Driver) -> Result<Option<Evaluated>> {
        let evaluated = driver.evaluate(self.request.clone()).await?;
        let truthy = evaluated.as_value().map_or(true, RemoteValue::is_truthy);
        Ok(truthy.then_some(evaluated))
    }

    fn description(&self) -> String {
        "script to return a truthy value".to_string()
    }
}
