//! `mindscope doctor` — Diagnose system health.

use mindscope_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 MindScope Doctor — System Diagnostics");
    println!("========================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  ✅ Config file found");
    } else {
        println!("  ⚠️  No config file — using defaults (run `mindscope onboard`)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config before running further checks.");
            return Ok(());
        }
    };

    if config.has_api_key() {
        println!("  ✅ API key configured");
    } else {
        println!("  ⚠️  No API key — set GEMINI_API_KEY or add api_key to config.toml");
        println!("     Replies will use the built-in fallback text.");
        issues += 1;
    }

    let chain = mindscope_providers::dialogue_chain(&config);
    if chain.is_empty() {
        println!("  ❌ No dialogue provider could be built");
        issues += 1;
    }
    let mut reachable = 0;
    for (i, provider) in chain.iter().enumerate() {
        let role = if i == 0 { "primary" } else { "fallback" };
        match provider.health_check().await {
            Ok(true) => {
                println!("  ✅ Dialogue backend reachable: {} ({role})", provider.name());
                reachable += 1;
            }
            Ok(false) => println!("  ⚠️  Dialogue backend unhealthy: {} ({role})", provider.name()),
            Err(e) => println!("  ❌ Dialogue backend error: {} ({role}): {e}", provider.name()),
        }
    }
    if !chain.is_empty() && reachable == 0 {
        println!("     Replies will use the built-in fallback text.");
        issues += 1;
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
