//! Assistant-to-assistant delegation.
//!
//! Advertises a single `delegate_task` tool. When the model calls it, the
//! named peer assistant runs on its own chat (created or continued by id),
//! an analysis pass condenses the resulting transcript, and the caller gets
//! back a JSON `TaskResponse` with the chat id for follow-ups.
//!
//! Recursion is bounded: every nested run spends one unit of the chat's
//! delegation budget, and a call arriving with an empty budget is refused.

use std::sync::Arc;

use async_trait::async_trait;
use dendrite_agent::{Runner, TaskAnalysis, TaskAnalyzer};
use dendrite_core::assistant::AssistantRegistry;
use dendrite_core::chat::Chat;
use dendrite_core::error::{Error, Result, ToolkitError};
use dendrite_core::message::{ChatState, Message, ToolCall};
use dendrite_core::provider::{Provider, ToolSchema};
use dendrite_core::store::ChatStore;
use dendrite_core::toolkit::{ToolContext, ToolResult, Toolkit};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Name of the delegation tool as the model sees it.
pub const DELEGATE_TOOL_NAME: &str = "delegate_task";

#[derive(Debug, Deserialize)]
struct DelegateTask {
    assistant: String,
    task: String,
    /// Chat id from a previous delegation, to continue that conversation
    #[serde(default)]
    id: Option<String>,
}

/// What the calling model receives back, as canonical JSON.
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    /// Chat id to pass back for follow-up tasks
    pub id: String,
    pub analysis: TaskAnalysis,
}

/// Toolkit that delegates tasks to registered peer assistants.
pub struct DelegationToolkit {
    registry: AssistantRegistry,
    store: Arc<dyn ChatStore>,
    provider: Arc<dyn Provider>,
    analyzer_model: String,
}

impl DelegationToolkit {
    pub fn new(
        registry: AssistantRegistry,
        store: Arc<dyn ChatStore>,
        provider: Arc<dyn Provider>,
        analyzer_model: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            store,
            provider,
            analyzer_model: analyzer_model.into(),
        }
    }

    fn schema(&self) -> ToolSchema {
        let names = self.registry.names();
        let roster = self
            .registry
            .descriptions()
            .into_iter()
            .map(|(name, description)| format!("- {name}: {description}"))
            .collect::<Vec<_>>()
            .join("\n");

        ToolSchema {
            name: DELEGATE_TOOL_NAME.into(),
            description: format!(
                "Delegate a task to another assistant and get back a status report. \
                 Pass the returned id to continue the same delegated conversation.\n\
                 Available assistants:\n{roster}"
            ),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "assistant": {"type": "string", "enum": names},
                    "task": {"type": "string"},
                    "id": {"type": ["string", "null"]},
                },
                "required": ["assistant", "task", "id"],
                "additionalProperties": false,
            }),
            strict: true,
        }
    }

    async fn delegate(&self, args: DelegateTask, ctx: &ToolContext) -> Result<TaskResponse> {
        if ctx.delegation_depth == 0 {
            return Err(Error::Toolkit(ToolkitError::DelegationDepthExceeded(
                args.assistant,
            )));
        }

        let peer = self.registry.get(&args.assistant)?;

        // Continue the prior delegated chat when an id is passed.
        let state = match &args.id {
            Some(id) => self
                .store
                .load(id)
                .await?
                .unwrap_or_else(|| ChatState::with_assistant(id.clone(), peer.name())),
            None => {
                let mut state = ChatState::new();
                state.assistant = Some(peer.name().to_string());
                state
            }
        };
        let chat_id = state.id.clone();

        info!(
            caller = %ctx.caller,
            peer = %peer.name(),
            chat_id = %chat_id,
            depth = ctx.delegation_depth,
            "Delegating task"
        );

        let chat = Chat::new(state)
            .with_store(self.store.clone())
            .with_delegation_depth(ctx.delegation_depth - 1);
        let mut runner = Runner::new(peer, chat);

        let transcript = runner
            .run_message(Message::user_named(ctx.caller.clone(), args.task))
            .await?;

        let analyzer = TaskAnalyzer::new(self.provider.clone(), &self.analyzer_model);
        let analysis = analyzer.analyze(&transcript).await?;
        debug!(chat_id = %chat_id, status = ?analysis.status, "Delegated task analyzed");

        Ok(TaskResponse {
            id: chat_id,
            analysis,
        })
    }
}

#[async_trait]
impl Toolkit for DelegationToolkit {
    async fn tools(&self) -> Result<Vec<ToolSchema>> {
        Ok(vec![self.schema()])
    }

    async fn handle_tool_calls(
        &self,
        calls: &[ToolCall],
        ctx: &ToolContext,
    ) -> Result<Vec<ToolResult>> {
        let mut results = Vec::new();
        for call in calls {
            if call.name != DELEGATE_TOOL_NAME {
                continue; // not ours
            }
            let args: DelegateTask = serde_json::from_str(&call.arguments).map_err(|e| {
                Error::MalformedOutput(format!("Bad {DELEGATE_TOOL_NAME} arguments: {e}"))
            })?;
            let response = self.delegate(args, ctx).await?;
            results.push(ToolResult::new(
                call.id.clone(),
                serde_json::to_string(&response)?,
            ));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dendrite_core::assistant::Assistant;
    use dendrite_core::error::ProviderError;
    use dendrite_core::message::Role;
    use dendrite_core::provider::{CompletionDelta, CompletionRequest, FinishReason};
    use dendrite_core::store::MemoryChatStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    /// Replays one scripted text reply per request.
    struct ScriptedProvider {
        replies: Vec<String>,
        next: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<&str>) -> Arc<Self> {
            Arc::new(Self {
                replies: replies.into_iter().map(String::from).collect(),
                next: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn stream(
            &self,
            _request: CompletionRequest,
        ) -> std::result::Result<
            mpsc::Receiver<std::result::Result<CompletionDelta, ProviderError>>,
            ProviderError,
        > {
            let index = self.next.fetch_add(1, Ordering::SeqCst);
            let reply = self
                .replies
                .get(index)
                .cloned()
                .ok_or_else(|| ProviderError::NotConfigured("script exhausted".into()))?;

            let (tx, rx) = mpsc::channel(8);
            tokio::spawn(async move {
                let _ = tx
                    .send(Ok(CompletionDelta {
                        role: Some(Role::Assistant),
                        content: Some(reply),
                        ..Default::default()
                    }))
                    .await;
                let _ = tx
                    .send(Ok(CompletionDelta {
                        finish: Some(FinishReason::Stop),
                        ..Default::default()
                    }))
                    .await;
            });
            Ok(rx)
        }
    }

    /// A peer that answers every task with a fixed string.
    struct FixedPeer;

    #[async_trait]
    impl Assistant for FixedPeer {
        fn name(&self) -> &str {
            "Mathematician"
        }

        fn description(&self) -> Option<&str> {
            Some("Does arithmetic")
        }

        async fn run(&self, chat: &mut Chat) -> Result<()> {
            chat.announce_message(Message::assistant("Mathematician", "The answer is 7."))
                .await
        }
    }

    fn toolkit_with(provider: Arc<ScriptedProvider>, store: Arc<MemoryChatStore>) -> DelegationToolkit {
        let mut registry = AssistantRegistry::new();
        registry.register(Arc::new(FixedPeer)).unwrap();
        DelegationToolkit::new(registry, store, provider, "mock-model")
    }

    fn delegate_call(arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: DELEGATE_TOOL_NAME.into(),
            arguments: arguments.into(),
        }
    }

    #[tokio::test]
    async fn schema_lists_registered_assistants() {
        let provider = ScriptedProvider::new(vec![]);
        let toolkit = toolkit_with(provider, MemoryChatStore::shared());

        let tools = toolkit.tools().await.unwrap();
        assert_eq!(tools[0].name, DELEGATE_TOOL_NAME);
        assert_eq!(
            tools[0].parameters["properties"]["assistant"]["enum"],
            serde_json::json!(["Mathematician"])
        );
        assert!(tools[0].description.contains("Does arithmetic"));
    }

    #[tokio::test]
    async fn delegation_runs_peer_and_reports_analysis() {
        // One scripted reply: the analyzer's verdict.
        let provider = ScriptedProvider::new(vec![r#"{"status":"completed","result":"7"}"#]);
        let store = MemoryChatStore::shared();
        let toolkit = toolkit_with(provider, store.clone());

        let ctx = ToolContext::new("Coordinator", 4);
        let results = toolkit
            .handle_tool_calls(
                &[delegate_call(
                    r#"{"assistant":"Mathematician","task":"What is 3+4?","id":null}"#,
                )],
                &ctx,
            )
            .await
            .unwrap();

        let response: serde_json::Value = serde_json::from_str(&results[0].content).unwrap();
        assert_eq!(response["analysis"]["status"], "completed");
        assert_eq!(response["analysis"]["result"], "7");

        // The delegated chat was persisted with both turn messages, and the
        // task message is attributed to the caller.
        let chat_id = response["id"].as_str().unwrap();
        let state = store.load(chat_id).await.unwrap().unwrap();
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].name.as_deref(), Some("Coordinator"));
    }

    #[tokio::test]
    async fn follow_up_continues_the_same_chat() {
        let provider = ScriptedProvider::new(vec![
            r#"{"status":"completed","result":"7"}"#,
            r#"{"status":"completed","result":"14"}"#,
        ]);
        let store = MemoryChatStore::shared();
        let toolkit = toolkit_with(provider, store.clone());
        let ctx = ToolContext::new("Coordinator", 4);

        let first = toolkit
            .handle_tool_calls(
                &[delegate_call(
                    r#"{"assistant":"Mathematician","task":"What is 3+4?","id":null}"#,
                )],
                &ctx,
            )
            .await
            .unwrap();
        let first: serde_json::Value = serde_json::from_str(&first[0].content).unwrap();
        let chat_id = first["id"].as_str().unwrap().to_string();

        let follow_up = format!(
            r#"{{"assistant":"Mathematician","task":"Now double it","id":"{chat_id}"}}"#
        );
        let second = toolkit
            .handle_tool_calls(&[delegate_call(&follow_up)], &ctx)
            .await
            .unwrap();
        let second: serde_json::Value = serde_json::from_str(&second[0].content).unwrap();
        assert_eq!(second["id"].as_str().unwrap(), chat_id);

        // Both turns accumulated in one chat.
        let state = store.load(&chat_id).await.unwrap().unwrap();
        assert_eq!(state.messages.len(), 4);
    }

    #[tokio::test]
    async fn exhausted_budget_refuses_to_recurse() {
        let provider = ScriptedProvider::new(vec![]);
        let toolkit = toolkit_with(provider, MemoryChatStore::shared());

        let ctx = ToolContext::new("Coordinator", 0);
        let err = toolkit
            .handle_tool_calls(
                &[delegate_call(
                    r#"{"assistant":"Mathematician","task":"anything","id":null}"#,
                )],
                &ctx,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Toolkit(ToolkitError::DelegationDepthExceeded(_))
        ));
    }

    #[tokio::test]
    async fn unknown_assistant_is_an_error() {
        let provider = ScriptedProvider::new(vec![]);
        let toolkit = toolkit_with(provider, MemoryChatStore::shared());

        let ctx = ToolContext::new("Coordinator", 4);
        let err = toolkit
            .handle_tool_calls(
                &[delegate_call(r#"{"assistant":"Nobody","task":"x","id":null}"#)],
                &ctx,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownAssistant(_)));
    }

    #[tokio::test]
    async fn malformed_arguments_are_rejected() {
        let provider = ScriptedProvider::new(vec![]);
        let toolkit = toolkit_with(provider, MemoryChatStore::shared());

        let ctx = ToolContext::new("Coordinator", 4);
        let err = toolkit
            .handle_tool_calls(&[delegate_call(r#"{"task_only": true}"#)], &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedOutput(_)));
    }

    #[tokio::test]
    async fn foreign_tool_names_are_skipped() {
        let provider = ScriptedProvider::new(vec![]);
        let toolkit = toolkit_with(provider, MemoryChatStore::shared());

        let ctx = ToolContext::new("Coordinator", 4);
        let results = toolkit
            .handle_tool_calls(
                &[ToolCall {
                    id: "call_1".into(),
                    name: "add".into(),
                    arguments: "{}".into(),
                }],
                &ctx,
            )
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
