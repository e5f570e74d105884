//! `mindscope status` — Show the effective configuration.

use mindscope_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;

    println!("🧠 MindScope Status");
    println!("===================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Provider:     {}", config.default_provider);
    println!("  Model:        {}", config.default_model);
    println!("  Temperature:  {}", config.default_temperature);
    if config.fallback_providers.is_empty() {
        println!("  Fallbacks:    none");
    } else {
        println!("  Fallbacks:    {}", config.fallback_providers.join(", "));
    }
    println!("  Timeout:      {}s", config.dialogue.timeout_secs);
    println!(
        "  Fusion:       text {} / image {} / audio {}",
        config.fusion.text_weight, config.fusion.image_weight, config.fusion.audio_weight
    );
    println!(
        "  Sessions:     capacity {}, ttl {}s",
        config.sessions.capacity, config.sessions.ttl_secs
    );

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `mindscope onboard` first");
    }

    Ok(())
}
