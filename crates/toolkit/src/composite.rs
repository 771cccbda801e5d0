//! Several toolkits presented as one.

use std::sync::Arc;

use async_trait::async_trait;
use dendrite_core::error::Result;
use dendrite_core::message::ToolCall;
use dendrite_core::provider::ToolSchema;
use dendrite_core::toolkit::{ToolContext, ToolResult, Toolkit};

/// Concatenates member toolkits.
///
/// Schemas are advertised in member order; each call is offered to every
/// member and the results are unioned, also in member order. Members are
/// expected to carry disjoint tool names, since each skips names it does
/// not recognize.
#[derive(Default)]
pub struct CompositeToolkit {
    members: Vec<Arc<dyn Toolkit>>,
}

impl CompositeToolkit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member(mut self, member: Arc<dyn Toolkit>) -> Self {
        self.members.push(member);
        self
    }
}

#[async_trait]
impl Toolkit for CompositeToolkit {
    async fn tools(&self) -> Result<Vec<ToolSchema>> {
        let mut tools = Vec::new();
        for member in &self.members {
            tools.extend(member.tools().await?);
        }
        Ok(tools)
    }

    async fn handle_tool_calls(
        &self,
        calls: &[ToolCall],
        ctx: &ToolContext,
    ) -> Result<Vec<ToolResult>> {
        let mut results = Vec::new();
        for member in &self.members {
            results.extend(member.handle_tool_calls(calls, ctx).await?);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{FnTool, FunctionToolkit, ParamSpec};
    use futures::FutureExt;
    use serde_json::Value;

    fn constant_tool(name: &str, answer: &'static str) -> Arc<dyn Toolkit> {
        Arc::new(
            FunctionToolkit::new().with_function(Arc::new(FnTool::new(
                name,
                "Returns a constant",
                Vec::<ParamSpec>::new(),
                move |_args| async move { Ok(Value::from(answer)) }.boxed(),
            ))),
        )
    }

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: "{}".into(),
        }
    }

    #[tokio::test]
    async fn tools_concatenate_in_member_order() {
        let composite = CompositeToolkit::new()
            .with_member(constant_tool("alpha", "a"))
            .with_member(constant_tool("beta", "b"));

        let tools = composite.tools().await.unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "alpha");
        assert_eq!(tools[1].name, "beta");
    }

    #[tokio::test]
    async fn each_call_is_handled_by_its_owner() {
        let composite = CompositeToolkit::new()
            .with_member(constant_tool("alpha", "a"))
            .with_member(constant_tool("beta", "b"));
        let ctx = ToolContext::new("Helper", 4);

        let results = composite
            .handle_tool_calls(&[call("c1", "beta"), call("c2", "alpha")], &ctx)
            .await
            .unwrap();

        // Member order, not call order.
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].tool_call_id, "c2");
        assert_eq!(results[0].content, "a");
        assert_eq!(results[1].tool_call_id, "c1");
        assert_eq!(results[1].content, "b");
    }

    #[tokio::test]
    async fn unclaimed_calls_yield_no_results() {
        let composite = CompositeToolkit::new().with_member(constant_tool("alpha", "a"));
        let ctx = ToolContext::new("Helper", 4);

        let results = composite
            .handle_tool_calls(&[call("c1", "gamma")], &ctx)
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
