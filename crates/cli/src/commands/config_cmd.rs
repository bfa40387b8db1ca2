//! `ironloop config`: Configuration management commands.

use std::path::PathBuf;

use ironloop_config::RuntimeConfig;

pub async fn validate(path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = path.unwrap_or_else(RuntimeConfig::default_path);
    println!("🔍 Validating {}...", path.display());

    let config = match RuntimeConfig::load(Some(path.as_path())) {
        Ok(config) => config,
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   ✅ Config parsed successfully");

    let warnings = config.warnings();
    if warnings.is_empty() {
        println!("   ✅ All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   ⚠️  {w}");
        }
    }

    println!();
    println!("   Agent:          {}", config.agent.name);
    println!("   Max iterations: {}", config.runtime.max_iterations);
    println!("   Tool timeout:   {}s", config.runtime.tool_timeout_secs);
    match config.budget.token_budget {
        Some(limit) => println!("   Token budget:   {limit} ({})", config.budget.strategy),
        None => println!("   Token budget:   none"),
    }
    println!("   Compaction:     {:?}", config.compaction.strategy);
    println!("   Processors:     {}", config.processors.len());

    Ok(())
}

pub async fn show(path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = RuntimeConfig::load(path.as_deref()).map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn init(path: Option<PathBuf>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = path.unwrap_or_else(RuntimeConfig::default_path);
    if path.exists() && !force {
        return Err(format!("{} already exists (use --force to overwrite)", path.display()).into());
    }

    std::fs::write(&path, RuntimeConfig::default_toml())?;
    println!("✅ Wrote default configuration to {}", path.display());
    Ok(())
}
