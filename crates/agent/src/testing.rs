//! Shared test doubles for the agent crate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use dendrite_core::error::ProviderError;
use dendrite_core::message::Role;
use dendrite_core::provider::{
    CompletionDelta, CompletionRequest, FinishReason, Provider, ToolCallDelta,
};
use tokio::sync::mpsc;

/// A provider that replays scripted delta streams, one script per request,
/// and records every request it receives.
pub struct MockProvider {
    scripts: Vec<Vec<CompletionDelta>>,
    next: AtomicUsize,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl MockProvider {
    pub fn new(scripts: Vec<Vec<CompletionDelta>>) -> Self {
        Self {
            scripts,
            next: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn request_count(&self) -> usize {
        self.next.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn stream(
        &self,
        request: CompletionRequest,
    ) -> Result<mpsc::Receiver<Result<CompletionDelta, ProviderError>>, ProviderError> {
        let index = self.next.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .expect("mock lock poisoned")
            .push(request);

        let script = self
            .scripts
            .get(index)
            .cloned()
            .ok_or_else(|| ProviderError::NotConfigured("mock script exhausted".into()))?;

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            for delta in script {
                if tx.send(Ok(delta)).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }
}

/// A scripted reply streamed as word-sized content chunks ending in `stop`.
pub fn text_reply(text: &str) -> Vec<CompletionDelta> {
    let mut deltas = vec![CompletionDelta {
        role: Some(Role::Assistant),
        ..Default::default()
    }];
    deltas.extend(text.split_inclusive(' ').map(|chunk| CompletionDelta {
        content: Some(chunk.to_string()),
        ..Default::default()
    }));
    deltas.push(CompletionDelta {
        finish: Some(FinishReason::Stop),
        ..Default::default()
    });
    deltas
}

/// A scripted reply requesting one tool call, arguments split in two.
pub fn tool_call_reply(id: &str, name: &str, arguments: &str) -> Vec<CompletionDelta> {
    let (head, tail) = arguments.split_at(arguments.len() / 2);
    vec![
        CompletionDelta {
            role: Some(Role::Assistant),
            tool_call: Some(ToolCallDelta {
                index: 0,
                id: Some(id.into()),
                name: Some(name.into()),
                arguments: None,
            }),
            ..Default::default()
        },
        CompletionDelta {
            tool_call: Some(ToolCallDelta {
                index: 0,
                id: None,
                name: None,
                arguments: Some(head.into()),
            }),
            ..Default::default()
        },
        CompletionDelta {
            tool_call: Some(ToolCallDelta {
                index: 0,
                id: None,
                name: None,
                arguments: Some(tail.into()),
            }),
            ..Default::default()
        },
        CompletionDelta {
            finish: Some(FinishReason::ToolCalls),
            ..Default::default()
        },
    ]
}
