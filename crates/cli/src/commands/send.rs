//! `dendrite send` — one user turn, streamed to the terminal.

use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context};
use dendrite_agent::{update_title, Agent, Runner};
use dendrite_config::AppConfig;
use dendrite_core::channel::{ChatChannel, Subscription};
use dendrite_core::chat::Chat;
use dendrite_core::error::ToolkitError;
use dendrite_core::event::{ChatEvent, EventField};
use dendrite_core::message::{ChatState, Role};
use dendrite_core::store::{ChatStore, FsChatStore};
use dendrite_core::toolkit::Toolkit;
use dendrite_providers::OpenAiCompatProvider;
use dendrite_toolkit::{FnTool, FunctionToolkit, ParamSpec};
use futures::FutureExt;

const ASSISTANT_NAME: &str = "Dendrite";

const SYSTEM_PROMPT: &str = "You are Dendrite, a concise and capable assistant. \
Answer directly; use tools when they are available and helpful.";

pub async fn run(message: String, chat_id: Option<String>) -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;

    let Some(api_key) = config.api_key.clone() else {
        eprintln!("No API key configured.");
        eprintln!();
        eprintln!("Set DENDRITE_API_KEY or OPENAI_API_KEY, or add api_key to:");
        eprintln!(
            "  {}",
            AppConfig::config_dir().join("config.toml").display()
        );
        bail!("No API key found");
    };

    let provider = Arc::new(
        OpenAiCompatProvider::new("openai-compat", &config.api_base, api_key)
            .context("Failed to build provider")?,
    );
    let store: Arc<dyn ChatStore> = Arc::new(FsChatStore::new(config.chats_dir.clone()));
    let channel = ChatChannel::new();

    // Load or create the chat.
    let state = match &chat_id {
        Some(id) => store
            .load(id)
            .await
            .context("Failed to load chat")?
            .with_context(|| format!("No chat with id {id}"))?,
        None => {
            let mut state = ChatState::new();
            state.assistant = Some(ASSISTANT_NAME.into());
            state
        }
    };
    let chat_id = state.id.clone();

    let mut agent = Agent::new(
        provider.clone(),
        ASSISTANT_NAME,
        &config.default_model,
        SYSTEM_PROMPT,
    )
    .with_toolkit(builtin_toolkit())
    .with_temperature(config.temperature)
    .with_max_turns(config.max_turns);
    if let Some(max_tokens) = config.max_tokens {
        agent = agent.with_max_tokens(max_tokens);
    }

    let chat = Chat::new(state)
        .with_store(store.clone())
        .with_channel(channel.clone())
        .with_delegation_depth(config.delegation_depth);

    let mut sub = channel.subscribe(&chat_id);
    let mut runner = Runner::new(Arc::new(agent), chat);

    // Stream events to the terminal while the turn runs.
    let mut turn = tokio::spawn(async move { runner.run(message).await });
    let result = loop {
        tokio::select! {
            event = sub.recv() => {
                if let Some(event) = event {
                    print_event(&event);
                }
            }
            joined = &mut turn => {
                break joined.context("Turn task panicked")?;
            }
        }
    };
    drain(&mut sub);
    result.context("Turn failed")?;

    // Derive a title in the same style a server would, in the background.
    update_title(
        provider,
        config.analyzer_model(),
        store,
        &channel,
        &chat_id,
    )
    .await
    .context("Failed to update title")?;

    println!();
    println!("chat: {chat_id}");
    Ok(())
}

fn print_event(event: &ChatEvent) {
    match event {
        ChatEvent::BeginMessage {
            role: Role::Tool,
            name,
            ..
        } => {
            println!();
            println!("[{}]", name.as_deref().unwrap_or("tool"));
        }
        ChatEvent::AddChunk {
            field: EventField::Content,
            chunk,
        } => {
            print!("{chunk}");
            let _ = std::io::stdout().flush();
        }
        ChatEvent::AddChunk {
            field: EventField::ToolCallName,
            chunk,
        } => {
            print!(" -> {chunk}");
            let _ = std::io::stdout().flush();
        }
        ChatEvent::EndMessage => println!(),
        _ => {}
    }
}

fn drain(sub: &mut Subscription) {
    while let Some(event) = sub.try_recv() {
        print_event(&event);
    }
}

/// Tools every chat gets, model-independent.
fn builtin_toolkit() -> Arc<dyn Toolkit> {
    Arc::new(FunctionToolkit::new().with_function(Arc::new(FnTool::new(
        "current_time",
        "Current date and time, optionally in a fixed UTC offset",
        vec![ParamSpec::optional(
            "utc_offset_hours",
            serde_json::json!({"type": "integer"}),
            serde_json::Value::from(0),
        )
        .with_description("Hours east of UTC")],
        |args| {
            async move {
                let offset = args["utc_offset_hours"].as_i64().unwrap_or(0);
                // Real-world offsets top out at UTC+14; anything wilder is
                // a bad argument, and huge values would overflow Duration.
                if !(-14..=14).contains(&offset) {
                    return Err(ToolkitError::ExecutionFailed {
                        tool_name: "current_time".into(),
                        reason: format!("utc_offset_hours must be within -14..=14, got {offset}"),
                    }
                    .into());
                }
                let when = chrono::Utc::now() + chrono::Duration::hours(offset);
                Ok(serde_json::Value::from(
                    when.format("%Y-%m-%d %H:%M:%S").to_string(),
                ))
            }
            .boxed()
        },
    ))))
}
