//! Capabilities: named, schema-described functions an agent may invoke.
//!
//! A [`CapabilityDescriptor`] is built from a plain function (async or sync)
//! through [`CapabilityBuilder`]. The builder derives the JSON parameter
//! schema from the declared Rust types, so the model sees
//! `{"type": "object", "properties": {...}, "required": [...]}` without
//! anyone writing the schema by hand.
//!
//! Whether a capability needs an [`ActionContext`] is declared explicitly by
//! the author: [`CapabilityBuilder::handler`] registers a context-free body,
//! [`CapabilityBuilder::contextual`] a context-aware one.

use std::any::TypeId;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::ActionContext;
use crate::error::{CapabilityError, RegistryError};

/// What a capability body returns.
pub type CapabilityResult = Result<Value, CapabilityError>;

const DEFAULT_DESCRIPTION: &str = "No description provided.";

/// JSON schema type of a single parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    /// Map a Rust type onto a schema type. Types with no obvious JSON
    /// counterpart fall back to `string`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        let id = TypeId::of::<T>();
        let integers = [
            TypeId::of::<i8>(),
            TypeId::of::<i16>(),
            TypeId::of::<i32>(),
            TypeId::of::<i64>(),
            TypeId::of::<i128>(),
            TypeId::of::<isize>(),
            TypeId::of::<u8>(),
            TypeId::of::<u16>(),
            TypeId::of::<u32>(),
            TypeId::of::<u64>(),
            TypeId::of::<u128>(),
            TypeId::of::<usize>(),
        ];
        if integers.contains(&id) {
            return Self::Integer;
        }
        if id == TypeId::of::<f32>() || id == TypeId::of::<f64>() {
            return Self::Number;
        }
        if id == TypeId::of::<bool>() {
            return Self::Boolean;
        }
        if id == TypeId::of::<Map<String, Value>>() {
            return Self::Object;
        }

        let name = std::any::type_name::<T>();
        const ARRAYS: [&str; 5] = [
            "alloc::vec::Vec<",
            "std::collections::hash::set::HashSet<",
            "alloc::collections::btree::set::BTreeSet<",
            "alloc::collections::vec_deque::VecDeque<",
            "[",
        ];
        const OBJECTS: [&str; 2] = [
            "std::collections::hash::map::HashMap<",
            "alloc::collections::btree::map::BTreeMap<",
        ];
        let bare = name.trim_start_matches('&');
        if ARRAYS.iter().any(|p| bare.starts_with(p)) {
            Self::Array
        } else if OBJECTS.iter().any(|p| bare.starts_with(p)) {
            Self::Object
        } else {
            Self::String
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

/// One parameter of a capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Named arguments supplied by the model for one invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(Map<String, Value>);

impl Arguments {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Accept a JSON object; `null` counts as "no arguments".
    pub fn from_value(value: Value) -> Result<Self, CapabilityError> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(map) => Ok(Self(map)),
            other => Err(CapabilityError::InvalidArguments(format!(
                "arguments must be a JSON object, got {other}"
            ))),
        }
    }

    /// Decode a parameter that must be present.
    pub fn required<T: DeserializeOwned>(&self, name: &str) -> Result<T, CapabilityError> {
        let value = self.0.get(name).ok_or_else(|| {
            CapabilityError::InvalidArguments(format!("missing required parameter '{name}'"))
        })?;
        serde_json::from_value(value.clone()).map_err(|e| {
            CapabilityError::InvalidArguments(format!("parameter '{name}': {e}"))
        })
    }

    /// Decode a parameter that may be absent or `null`.
    pub fn optional<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, CapabilityError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
                CapabilityError::InvalidArguments(format!("parameter '{name}': {e}"))
            }),
        }
    }

    /// Decode a parameter, falling back to `default` when absent.
    pub fn get_or<T: DeserializeOwned>(&self, name: &str, default: T) -> Result<T, CapabilityError> {
        Ok(self.optional(name)?.unwrap_or(default))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// A capability body that needs nothing beyond its arguments.
#[async_trait]
pub trait Capability: Send + Sync {
    async fn call(&self, args: Arguments) -> CapabilityResult;
}

/// A capability body that also receives the per-invocation [`ActionContext`].
#[async_trait]
pub trait ContextualCapability: Send + Sync {
    async fn call(&self, args: Arguments, ctx: &ActionContext<'_>) -> CapabilityResult;
}

/// Adapter turning an async closure into a [`Capability`].
pub struct FnCapability<F>(F);

#[async_trait]
impl<F, Fut> Capability for FnCapability<F>
where
    F: Fn(Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CapabilityResult> + Send + 'static,
{
    async fn call(&self, args: Arguments) -> CapabilityResult {
        (self.0)(args).await
    }
}

/// Adapter turning a synchronous closure returning any serializable value
/// into a [`Capability`].
pub struct SyncFnCapability<F>(F);

#[async_trait]
impl<F, R> Capability for SyncFnCapability<F>
where
    F: Fn(Arguments) -> Result<R, CapabilityError> + Send + Sync + 'static,
    R: Serialize + 'static,
{
    async fn call(&self, args: Arguments) -> CapabilityResult {
        let output = (self.0)(args)?;
        serde_json::to_value(output)
            .map_err(|e| CapabilityError::failed(format!("result is not serializable: {e}")))
    }
}

/// How a capability body is invoked.
#[derive(Clone)]
pub enum Handler {
    ContextFree(Arc<dyn Capability>),
    ContextAware(Arc<dyn ContextualCapability>),
}

/// Whether the environment has to supply an [`ActionContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextMode {
    ContextFree,
    ContextAware,
}

/// Metadata plus the callable for one capability.
#[derive(Clone)]
pub struct CapabilityDescriptor {
    name: String,
    description: String,
    params: Vec<ParamSpec>,
    parameters: Value,
    derived_schema: bool,
    terminal: bool,
    handler: Handler,
}

impl CapabilityDescriptor {
    pub fn builder(name: impl Into<String>) -> CapabilityBuilder {
        CapabilityBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The full JSON parameter schema sent to the model.
    pub fn parameters(&self) -> &Value {
        &self.parameters
    }

    /// Declared parameters. Empty when the schema was overridden.
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn required_params(&self) -> Vec<&str> {
        self.params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    pub fn context_mode(&self) -> ContextMode {
        match self.handler {
            Handler::ContextFree(_) => ContextMode::ContextFree,
            Handler::ContextAware(_) => ContextMode::ContextAware,
        }
    }

    pub fn accepts_context(&self) -> bool {
        self.context_mode() == ContextMode::ContextAware
    }

    /// Check supplied arguments against the declared parameters.
    ///
    /// Overridden schemas are passed through unchecked.
    pub fn validate(&self, args: &Arguments) -> Result<(), CapabilityError> {
        if !self.derived_schema {
            return Ok(());
        }
        if let Some(missing) = self
            .params
            .iter()
            .find(|p| p.required && !args.contains(&p.name))
        {
            return Err(CapabilityError::InvalidArguments(format!(
                "{}() missing required parameter '{}'",
                self.name, missing.name
            )));
        }
        if let Some(unexpected) = args
            .keys()
            .find(|k| !self.params.iter().any(|p| p.name == *k))
        {
            return Err(CapabilityError::InvalidArguments(format!(
                "{}() got an unexpected parameter '{}'",
                self.name, unexpected
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for CapabilityDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .field("terminal", &self.terminal)
            .field("context_mode", &self.context_mode())
            .finish()
    }
}

/// Builds a [`CapabilityDescriptor`] from a function and its declared parameters.
pub struct CapabilityBuilder {
    name: String,
    description: Option<String>,
    params: Vec<ParamSpec>,
    parameters_override: Option<Value>,
    terminal: bool,
    handler: Option<Handler>,
}

impl CapabilityBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            params: Vec::new(),
            parameters_override: None,
            terminal: false,
            handler: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare a parameter without a default value.
    pub fn param<T: ?Sized + 'static>(self, name: impl Into<String>) -> Self {
        self.push_param(name.into(), ParamType::of::<T>(), true)
    }

    /// Declare a parameter that has a default value.
    pub fn optional_param<T: ?Sized + 'static>(self, name: impl Into<String>) -> Self {
        self.push_param(name.into(), ParamType::of::<T>(), false)
    }

    /// Attach a description to an already declared parameter.
    pub fn describe_param(mut self, name: &str, description: impl Into<String>) -> Self {
        if let Some(p) = self.params.iter_mut().find(|p| p.name == name) {
            p.description = Some(description.into());
        }
        self
    }

    /// Replace the derived schema with a hand-written one.
    pub fn parameters_override(mut self, schema: Value) -> Self {
        self.parameters_override = Some(schema);
        self
    }

    /// Invoking this capability ends the decision loop.
    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }

    /// Use a context-free body.
    pub fn handler(mut self, capability: impl Capability + 'static) -> Self {
        self.handler = Some(Handler::ContextFree(Arc::new(capability)));
        self
    }

    /// Use a context-free async closure.
    pub fn handler_fn<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CapabilityResult> + Send + 'static,
    {
        self.handler(FnCapability(f))
    }

    /// Use a context-free synchronous closure.
    pub fn sync_fn<F, R>(self, f: F) -> Self
    where
        F: Fn(Arguments) -> Result<R, CapabilityError> + Send + Sync + 'static,
        R: Serialize + 'static,
    {
        self.handler(SyncFnCapability(f))
    }

    /// Use a context-aware body.
    pub fn contextual(mut self, capability: impl ContextualCapability + 'static) -> Self {
        self.handler = Some(Handler::ContextAware(Arc::new(capability)));
        self
    }

    pub fn build(self) -> Result<CapabilityDescriptor, RegistryError> {
        let handler = self
            .handler
            .ok_or_else(|| RegistryError::MissingHandler(self.name.clone()))?;

        let derived_schema = self.parameters_override.is_none();
        let parameters = self
            .parameters_override
            .unwrap_or_else(|| derive_schema(&self.params));

        Ok(CapabilityDescriptor {
            name: self.name,
            description: self
                .description
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            params: if derived_schema { self.params } else { Vec::new() },
            parameters,
            derived_schema,
            terminal: self.terminal,
            handler,
        })
    }

    fn push_param(mut self, name: String, ty: ParamType, required: bool) -> Self {
        self.params.retain(|p| p.name != name);
        self.params.push(ParamSpec {
            name,
            ty,
            required,
            description: None,
        });
        self
    }
}

fn derive_schema(params: &[ParamSpec]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for p in params {
        let mut prop = Map::new();
        prop.insert("type".into(), Value::String(p.ty.as_str().into()));
        if let Some(desc) = &p.description {
            prop.insert("description".into(), Value::String(desc.clone()));
        }
        properties.insert(p.name.clone(), Value::Object(prop));
        if p.required {
            required.push(Value::String(p.name.clone()));
        }
    }
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}
