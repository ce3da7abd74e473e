//! Typed callables exported by skills.
//!
//! A [`Callable`] pairs a declared [`CallableSignature`] (ordered parameters
//! with type and required flag) with an invocation contract
//! ([`SkillFunction`]). Lookup is always by name with an explicit "not
//! found" result; there is no open-ended dispatch.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use conduit_llm::LlmToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CallError, CallResult};

/// JSON type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// UTF-8 string.
    #[default]
    String,
    /// Whole number.
    Integer,
    /// Any JSON number.
    Number,
    /// `true` / `false`.
    Boolean,
    /// JSON object.
    Object,
    /// JSON array.
    Array,
}

impl ParamType {
    /// JSON-schema type name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type", default)]
    pub param_type: ParamType,
    /// Whether the caller must supply it.
    #[serde(default = "default_required")]
    pub required: bool,
    /// Description shown to the model.
    #[serde(default)]
    pub description: String,
}

fn default_required() -> bool {
    true
}

impl ParamSpec {
    /// A required parameter.
    pub fn required(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: true,
            description: String::new(),
        }
    }

    /// An optional parameter.
    pub fn optional(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type)
        }
    }

    /// Set description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Name, description and ordered parameters of a callable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallableSignature {
    /// Callable name (unique within the exposed set).
    pub name: String,
    /// Description shown to the model.
    pub description: String,
    /// Ordered parameter list.
    pub params: Vec<ParamSpec>,
}

impl CallableSignature {
    /// Create a signature with no parameters.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    /// Append a parameter.
    #[must_use]
    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// JSON schema of the parameters object.
    #[must_use]
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for p in &self.params {
            let mut prop = Map::new();
            prop.insert("type".into(), Value::from(p.param_type.as_str()));
            if !p.description.is_empty() {
                prop.insert("description".into(), Value::from(p.description.as_str()));
            }
            properties.insert(p.name.clone(), Value::Object(prop));
        }
        let required: Vec<Value> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| Value::from(p.name.as_str()))
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Tool definition offered to the model.
    #[must_use]
    pub fn definition(&self) -> LlmToolDefinition {
        LlmToolDefinition::new(&self.name)
            .with_description(&self.description)
            .with_schema(self.input_schema())
    }

    /// Check `args` against the declared parameters.
    ///
    /// `null` is treated as an empty argument object. Unknown keys are
    /// tolerated; required keys must be present and non-null.
    ///
    /// # Errors
    ///
    /// [`CallError::MissingArgument`] for the first absent required
    /// parameter, [`CallError::InvalidArguments`] when `args` is not an
    /// object or a value has the wrong type.
    pub fn validate(&self, args: &Value) -> CallResult<()> {
        let empty = Map::new();
        let obj = match args {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(CallError::InvalidArguments {
                    callable: self.name.clone(),
                    reason: format!("expected an object, got {}", json_kind(other)),
                });
            },
        };

        for p in &self.params {
            match obj.get(&p.name) {
                None | Some(Value::Null) if p.required => {
                    return Err(CallError::MissingArgument {
                        callable: self.name.clone(),
                        argument: p.name.clone(),
                    });
                },
                None | Some(Value::Null) => {},
                Some(v) if !p.param_type.accepts(v) => {
                    return Err(CallError::InvalidArguments {
                        callable: self.name.clone(),
                        reason: format!(
                            "'{}' must be {}, got {}",
                            p.name,
                            p.param_type.as_str(),
                            json_kind(v)
                        ),
                    });
                },
                Some(_) => {},
            }
        }
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Invocation contract for a callable.
#[async_trait]
pub trait SkillFunction: Send + Sync {
    /// Execute with already-validated arguments.
    async fn invoke(&self, args: Value) -> CallResult<Value>;
}

/// Adapter turning an async closure into a [`SkillFunction`].
pub struct FnFunction<F>(F);

impl<F> FnFunction<F> {
    /// Wrap `f`.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> SkillFunction for FnFunction<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CallResult<Value>> + Send + 'static,
{
    async fn invoke(&self, args: Value) -> CallResult<Value> {
        (self.0)(args).await
    }
}

/// A callable: signature plus invoker.
#[derive(Clone)]
pub struct Callable {
    /// Declared signature.
    pub signature: CallableSignature,
    invoker: Arc<dyn SkillFunction>,
}

impl Callable {
    /// Pair a signature with an invoker.
    pub fn new(signature: CallableSignature, invoker: Arc<dyn SkillFunction>) -> Self {
        Self { signature, invoker }
    }

    /// Callable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.signature.name
    }

    /// Validate `args` and run the callable.
    ///
    /// # Errors
    ///
    /// Returns a [`CallError`] if validation or execution fails.
    pub async fn call(&self, args: Value) -> CallResult<Value> {
        self.signature.validate(&args)?;
        let args = if args.is_null() {
            Value::Object(Map::new())
        } else {
            args
        };
        self.invoker.invoke(args).await
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Host-registered handlers that binding sources can reference with
/// `native = "<key>"`.
#[derive(Clone, Default)]
pub struct NativeBindings {
    handlers: HashMap<String, Arc<dyn SkillFunction>>,
}

impl NativeBindings {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under `key`, replacing any previous one.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, handler: Arc<dyn SkillFunction>) -> Self {
        self.handlers.insert(key.into(), handler);
        self
    }

    /// Register an async closure under `key`.
    #[must_use]
    pub fn with_fn<F, Fut>(self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallResult<Value>> + Send + 'static,
    {
        self.with(key, Arc::new(FnFunction(f)))
    }

    /// Resolve a handler key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<dyn SkillFunction>> {
        self.handlers.get(key).cloned()
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for NativeBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.handlers.keys().collect();
        keys.sort();
        f.debug_struct("NativeBindings").field("keys", &keys).finish()
    }
}

/// Render a callable's output for the model.
#[must_use]
pub fn render_output(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}
