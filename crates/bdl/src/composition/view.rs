//! The elaborated object graph of one target.

use std::rc::Rc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::resolver::Resolved;

/// Parameters by name, as JSON values.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

pub(crate) fn parameters(resolved: &Resolved) -> Parameters {
    resolved
        .parameters()
        .iter()
        .map(|parameter| (parameter.name().to_string(), parameter.to_json()))
        .collect()
}

/// An instance of the registry.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryEntry {
    symbol: String,
    parameters: Parameters,
    executor: Option<String>,
    deps: Vec<String>,
    init: Vec<String>,
    intra: Vec<String>,
    shutdown: Vec<String>,
    #[serde(skip)]
    expression: Rc<Resolved>,
}

impl RegistryEntry {
    pub(crate) fn new(expression: Rc<Resolved>) -> Self {
        Self {
            symbol: expression.symbol().unwrap_or_default().to_string(),
            parameters: parameters(&expression),
            executor: None,
            deps: Vec::new(),
            init: Vec::new(),
            intra: Vec::new(),
            shutdown: Vec::new(),
            expression,
        }
    }

    /// The instantiated type, as written.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn executor(&self) -> Option<&str> {
        self.executor.as_deref()
    }

    /// Instances that must exist before this one.
    pub fn deps(&self) -> &[String] {
        &self.deps
    }

    /// Methods to call when the instance starts, in order.
    pub fn init(&self) -> &[String] {
        &self.init
    }

    /// Calls performed on the instance by the composition.
    pub fn intra(&self) -> &[String] {
        &self.intra
    }

    /// Methods to call when the instance stops, in order.
    pub fn shutdown(&self) -> &[String] {
        &self.shutdown
    }

    pub fn expression(&self) -> &Resolved {
        &self.expression
    }

    pub(crate) fn set_executor(&mut self, executor: Option<String>) {
        self.executor = executor;
    }

    pub(crate) fn set_deps(&mut self, deps: Vec<String>) {
        self.deps = deps;
    }

    pub(crate) fn set_lifecycle(&mut self, init: Vec<String>, shutdown: Vec<String>) {
        self.init = init;
        self.shutdown = shutdown;
    }

    pub(crate) fn push_intra(&mut self, call: String) {
        if !self.intra.contains(&call) {
            self.intra.push(call);
        }
    }
}

/// A method call on an instance.
#[derive(Debug, Clone, Serialize)]
pub struct Call {
    id: String,
    instance: String,
    method: String,
    executor: Option<String>,
    parameters: Parameters,
    #[serde(skip)]
    expression: Rc<Resolved>,
}

impl Call {
    pub(crate) fn new(instance: String, method: String, expression: Rc<Resolved>) -> Self {
        let name = method.rsplit('.').next().unwrap_or(&method);
        Self {
            id: format!("{instance}.{name}"),
            instance,
            parameters: parameters(&expression),
            method,
            executor: None,
            expression,
        }
    }

    /// `instance.method`.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// FQN of the declared method.
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn executor(&self) -> Option<&str> {
        self.executor.as_deref()
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn expression(&self) -> &Resolved {
        &self.expression
    }

    pub(crate) fn set_executor(&mut self, executor: Option<String>) {
        self.executor = executor;
    }
}

/// A wire from a source member to a sink member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Connection {
    pub source: String,
    pub sink: String,
    #[serde(rename = "type")]
    pub type_fqn: String,
}

/// Everything a target instantiates, in dependency order.
#[derive(Debug, Clone, Serialize)]
pub struct CompositionView {
    pub(crate) target: String,
    pub(crate) registry: IndexMap<String, RegistryEntry>,
    pub(crate) workloads: Vec<Call>,
    pub(crate) services: Vec<Call>,
    pub(crate) connections: Vec<Connection>,
    pub(crate) executors: Vec<String>,
    pub(crate) init: Vec<String>,
    pub(crate) shutdown: Vec<String>,
}

impl CompositionView {
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn registry(&self) -> impl Iterator<Item = (&str, &RegistryEntry)> {
        self.registry.iter().map(|(fqn, entry)| (fqn.as_str(), entry))
    }

    pub fn entry(&self, fqn: &str) -> Option<&RegistryEntry> {
        self.registry.get(fqn)
    }

    /// Calls written at the top level of a composition block.
    pub fn workloads(&self) -> &[Call] {
        &self.workloads
    }

    /// Calls contributed by the compositions of instantiated components.
    pub fn services(&self) -> &[Call] {
        &self.services
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn executors(&self) -> &[String] {
        &self.executors
    }

    pub fn init(&self) -> &[String] {
        &self.init
    }

    pub fn shutdown(&self) -> &[String] {
        &self.shutdown
    }

    /// Pretty JSON, as consumed by generators.
    ///
    /// # Errors
    ///
    /// Fails only if serialization itself fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
