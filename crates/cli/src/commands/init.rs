//! `dendrite init` — write a default config file.

use anyhow::Context;
use dendrite_config::AppConfig;

pub async fn run() -> anyhow::Result<()> {
    let dir = AppConfig::config_dir();
    let path = dir.join("config.toml");

    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }

    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("creating {}", dir.display()))?;
    tokio::fs::write(&path, AppConfig::default_toml())
        .await
        .with_context(|| format!("writing {}", path.display()))?;

    println!("Wrote default config to {}", path.display());
    println!("Set DENDRITE_API_KEY (or add api_key to the file) before sending messages.");
    Ok(())
}
