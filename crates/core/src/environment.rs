//! Environment: executes a resolved capability and wraps whatever happens
//! in a uniform result envelope.
//!
//! Nothing raised by a capability escapes from here: invalid arguments,
//! returned errors and panics all become [`ExecutionOutcome::Failed`].

use std::panic::AssertUnwindSafe;
use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use futures::FutureExt;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use tracing::{debug, warn};

use crate::capability::{Arguments, CapabilityDescriptor, Handler};
use crate::context::ActionContext;
use crate::error::CapabilityError;

/// Result envelope recorded in memory after every dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Executed {
        result: Value,
        timestamp: DateTime<Utc>,
    },
    Failed {
        error: String,
        kind: String,
        diagnostic: String,
        timestamp: DateTime<Utc>,
    },
}

impl ExecutionOutcome {
    pub fn executed(result: Value) -> Self {
        Self::Executed {
            result,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(
        kind: impl Into<String>,
        error: impl Into<String>,
        diagnostic: impl Into<String>,
    ) -> Self {
        Self::Failed {
            error: error.into(),
            kind: kind.into(),
            diagnostic: diagnostic.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_executed(&self) -> bool {
        matches!(self, Self::Executed { .. })
    }

    pub fn result(&self) -> Option<&Value> {
        match self {
            Self::Executed { result, .. } => Some(result),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Executed { .. } => None,
            Self::Failed { error, .. } => Some(error),
        }
    }

    /// Compact JSON form stored in environment-type memory entries.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"tool_executed": false, "error": "unserializable envelope: {e}"}}"#)
        })
    }
}

impl Serialize for ExecutionOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Executed { result, timestamp } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("tool_executed", &true)?;
                map.serialize_entry("result", result)?;
                map.serialize_entry(
                    "timestamp",
                    &timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
                )?;
                map.end()
            }
            Self::Failed {
                error,
                kind,
                diagnostic,
                timestamp,
            } => {
                let mut map = serializer.serialize_map(Some(5))?;
                map.serialize_entry("tool_executed", &false)?;
                map.serialize_entry("error", error)?;
                map.serialize_entry("kind", kind)?;
                map.serialize_entry("diagnostic", diagnostic)?;
                map.serialize_entry(
                    "timestamp",
                    &timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
                )?;
                map.end()
            }
        }
    }
}

/// Executes capabilities on behalf of the decision loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct Environment;

impl Environment {
    pub fn new() -> Self {
        Self
    }

    /// Execute `descriptor` with `args`. The context is only handed to
    /// context-aware capabilities.
    pub async fn execute(
        &self,
        descriptor: &CapabilityDescriptor,
        args: Value,
        ctx: &ActionContext<'_>,
    ) -> ExecutionOutcome {
        let name = descriptor.name();
        let args = match Arguments::from_value(args)
            .and_then(|a| descriptor.validate(&a).map(|()| a))
        {
            Ok(args) => args,
            Err(e) => return Self::failure(name, e),
        };

        let start = Instant::now();
        let call = match descriptor.handler() {
            Handler::ContextFree(body) => body.call(args),
            Handler::ContextAware(body) => body.call(args, ctx),
        };
        let outcome = match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(result)) => ExecutionOutcome::executed(result),
            Ok(Err(e)) => Self::failure(name, e),
            Err(panic) => Self::failure(name, CapabilityError::Panicked(panic_message(&*panic))),
        };

        debug!(
            capability = %name,
            executed = outcome.is_executed(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Capability executed"
        );
        outcome
    }

    fn failure(name: &str, err: CapabilityError) -> ExecutionOutcome {
        warn!(capability = %name, error = %err, "Capability failed");
        ExecutionOutcome::failed(
            err.kind(),
            err.to_string(),
            format!("capability '{name}' raised {err:?}"),
        )
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{CapabilityBuilder, CapabilityResult, ContextualCapability};
    use crate::context::ContextProperties;
    use async_trait::async_trait;
    use serde_json::json;

    fn double() -> CapabilityDescriptor {
        CapabilityBuilder::new("double")
            .param::<i64>("x")
            .sync_fn(|args| Ok(args.required::<i64>("x")? * 2))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn successful_execution_is_wrapped() {
        let props = ContextProperties::new();
        let ctx = ActionContext::new(&props);
        let outcome = Environment::new()
            .execute(&double(), json!({"x": 4}), &ctx)
            .await;
        assert_eq!(outcome.result(), Some(&json!(8)));

        let json: Value = serde_json::from_str(&outcome.to_json_string()).unwrap();
        assert_eq!(json["tool_executed"], true);
        assert_eq!(json["result"], 8);
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn returned_error_becomes_failure_envelope() {
        let failing = CapabilityBuilder::new("read_txt_file")
            .param::<String>("filename")
            .sync_fn(|args| -> Result<String, CapabilityError> {
                let name: String = args.required("filename")?;
                Err(CapabilityError::failed(format!("File not found: {name}")))
            })
            .build()
            .unwrap();
        let props = ContextProperties::new();
        let ctx = ActionContext::new(&props);

        let outcome = Environment::new()
            .execute(&failing, json!({"filename": "a.txt"}), &ctx)
            .await;
        assert!(!outcome.is_executed());
        assert_eq!(outcome.error(), Some("File not found: a.txt"));

        let json: Value = serde_json::from_str(&outcome.to_json_string()).unwrap();
        assert_eq!(json["tool_executed"], false);
        assert_eq!(json["kind"], "execution_failed");
        assert!(json["diagnostic"].as_str().unwrap().contains("read_txt_file"));
    }

    #[tokio::test]
    async fn missing_argument_is_reported_not_raised() {
        let props = ContextProperties::new();
        let ctx = ActionContext::new(&props);
        let outcome = Environment::new().execute(&double(), json!({}), &ctx).await;
        let ExecutionOutcome::Failed { kind, error, .. } = outcome else {
            panic!("expected failure");
        };
        assert_eq!(kind, "invalid_arguments");
        assert!(error.contains("'x'"));
    }

    #[tokio::test]
    async fn non_object_arguments_are_rejected() {
        let props = ContextProperties::new();
        let ctx = ActionContext::new(&props);
        let outcome = Environment::new().execute(&double(), json!("4"), &ctx).await;
        assert!(!outcome.is_executed());
    }

    #[tokio::test]
    async fn panics_are_caught() {
        let exploding = CapabilityBuilder::new("explode")
            .sync_fn(|_args| -> Result<(), CapabilityError> { panic!("kaboom") })
            .build()
            .unwrap();
        let props = ContextProperties::new();
        let ctx = ActionContext::new(&props);
        let outcome = Environment::new().execute(&exploding, json!({}), &ctx).await;
        let ExecutionOutcome::Failed { kind, error, .. } = outcome else {
            panic!("expected failure");
        };
        assert_eq!(kind, "panicked");
        assert!(error.contains("kaboom"));
    }

    #[tokio::test]
    async fn context_aware_capability_receives_context() {
        struct ReadProperty;

        #[async_trait]
        impl ContextualCapability for ReadProperty {
            async fn call(&self, _args: Arguments, ctx: &ActionContext<'_>) -> CapabilityResult {
                Ok(ctx.get_or("region", json!("unknown")))
            }
        }

        let cap = CapabilityBuilder::new("region")
            .contextual(ReadProperty)
            .build()
            .unwrap();
        let props = ContextProperties::new().with_property("region", json!("eu-west"));
        let ctx = ActionContext::new(&props);
        let outcome = Environment::new().execute(&cap, Value::Null, &ctx).await;
        assert_eq!(outcome.result(), Some(&json!("eu-west")));
    }
}
