//! Native function toolkit.
//!
//! Wraps plain Rust functions as model-callable tools. The generated schema
//! is strict-mode friendly: every parameter is required and
//! `additionalProperties` is false, so parameters with a default are
//! advertised as nullable and filled in after deserialization instead of
//! being omitted from `required`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dendrite_core::error::{Error, Result};
use dendrite_core::message::ToolCall;
use dendrite_core::provider::ToolSchema;
use dendrite_core::toolkit::{ToolContext, ToolResult, Toolkit};
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use tracing::debug;

/// One declared parameter of a native function.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,

    /// JSON Schema for the value (e.g. `{"type": "integer"}`)
    pub schema: Value,

    pub description: Option<String>,

    /// When set, the parameter is optional: the model may pass null or the
    /// value may be absent, and this default is substituted before invoke.
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
            description: None,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, schema: Value, default: Value) -> Self {
        Self {
            name: name.into(),
            schema,
            description: None,
            default: Some(default),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A Rust function exposed to the model.
#[async_trait]
pub trait NativeFunction: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn params(&self) -> Vec<ParamSpec>;

    /// Execute with fully validated, default-filled arguments.
    async fn invoke(&self, args: Map<String, Value>) -> Result<Value>;
}

/// A [`NativeFunction`] built from a closure.
pub struct FnTool {
    name: String,
    description: String,
    params: Vec<ParamSpec>,
    handler: Box<dyn Fn(Map<String, Value>) -> BoxFuture<'static, Result<Value>> + Send + Sync>,
}

impl FnTool {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        params: Vec<ParamSpec>,
        handler: F,
    ) -> Self
    where
        F: Fn(Map<String, Value>) -> BoxFuture<'static, Result<Value>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            params,
            handler: Box::new(handler),
        }
    }
}

#[async_trait]
impl NativeFunction for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn params(&self) -> Vec<ParamSpec> {
        self.params.clone()
    }

    async fn invoke(&self, args: Map<String, Value>) -> Result<Value> {
        (self.handler)(args).await
    }
}

/// A toolkit of native functions with explicit, name-based dispatch.
#[derive(Default)]
pub struct FunctionToolkit {
    functions: BTreeMap<String, Arc<dyn NativeFunction>>,
}

impl FunctionToolkit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_function(mut self, function: Arc<dyn NativeFunction>) -> Self {
        self.functions
            .insert(function.name().to_string(), function);
        self
    }

    fn schema_for(function: &dyn NativeFunction) -> ToolSchema {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in function.params() {
            let mut schema = if param.default.is_some() {
                // Nullable instead of omitted from `required`, per strict mode.
                serde_json::json!({"anyOf": [param.schema, {"type": "null"}]})
            } else {
                param.schema
            };
            if let Some(description) = param.description {
                schema["description"] = Value::String(description);
            }
            properties.insert(param.name.clone(), schema);
            required.push(Value::String(param.name));
        }

        ToolSchema {
            name: function.name().to_string(),
            description: function.description().to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": required,
                "additionalProperties": false,
            }),
            strict: true,
        }
    }

    /// Parse, validate, and default-fill one call's arguments.
    fn parse_args(function: &dyn NativeFunction, raw: &str) -> Result<Map<String, Value>> {
        let mut args: Map<String, Value> = serde_json::from_str(raw).map_err(|e| {
            Error::MalformedOutput(format!(
                "Arguments for {} are not a JSON object: {e}",
                function.name()
            ))
        })?;

        let params = function.params();

        if let Some(unknown) = args.keys().find(|k| !params.iter().any(|p| &p.name == *k)) {
            return Err(Error::MalformedOutput(format!(
                "Unknown argument {unknown:?} for {}",
                function.name()
            )));
        }

        for param in params {
            let missing = matches!(args.get(&param.name), None | Some(Value::Null));
            if missing {
                match param.default {
                    Some(default) => {
                        args.insert(param.name, default);
                    }
                    None => {
                        return Err(Error::MalformedOutput(format!(
                            "Missing argument {:?} for {}",
                            param.name,
                            function.name()
                        )));
                    }
                }
            }
        }

        Ok(args)
    }

    /// Render a function's return value as tool-result text.
    fn render(value: Value) -> Result<String> {
        match value {
            Value::String(s) => Ok(s),
            other => Ok(serde_json::to_string(&other)?),
        }
    }
}

#[async_trait]
impl Toolkit for FunctionToolkit {
    async fn tools(&self) -> Result<Vec<ToolSchema>> {
        Ok(self
            .functions
            .values()
            .map(|f| Self::schema_for(f.as_ref()))
            .collect())
    }

    async fn handle_tool_calls(
        &self,
        calls: &[ToolCall],
        _ctx: &ToolContext,
    ) -> Result<Vec<ToolResult>> {
        let mut results = Vec::new();
        for call in calls {
            let Some(function) = self.functions.get(&call.name) else {
                continue; // not ours
            };
            debug!(tool = %call.name, "Invoking native function");
            let args = Self::parse_args(function.as_ref(), &call.arguments)?;
            let value = function.invoke(args).await?;
            results.push(ToolResult::new(call.id.clone(), Self::render(value)?));
        }
        Ok(results)
    }
}
