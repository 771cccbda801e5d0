//! `dendrite chats` — list stored chats.

use anyhow::Context;
use dendrite_config::AppConfig;
use dendrite_core::store::{ChatStore, FsChatStore};

pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;
    let store = FsChatStore::new(config.chats_dir.clone());

    let mut ids = store.list_ids().await.context("Failed to list chats")?;
    if ids.is_empty() {
        println!("No chats yet. Start one with `dendrite send \"...\"`.");
        return Ok(());
    }
    ids.sort();

    let mut chats = Vec::new();
    for id in ids {
        if let Some(state) = store.load(&id).await? {
            chats.push(state);
        }
    }
    // Most recently touched first.
    chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    for chat in chats {
        println!(
            "{}  {:>3} msgs  {}  {}",
            chat.updated_at.format("%Y-%m-%d %H:%M"),
            chat.messages.len(),
            chat.id,
            chat.title.as_deref().unwrap_or("(untitled)"),
        );
    }
    Ok(())
}
