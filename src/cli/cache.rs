//! Cache command - registry reports and maintenance

use clap::Subcommand;

use crate::infrastructure::cache::CacheRegistry;

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum CacheAction {
    /// Per-class statistics with totals
    Stats,

    /// Per-class health; exits non-zero if any class is unhealthy
    Health,

    /// Purge expired entries from every class
    Cleanup,

    /// Remove every entry from every class
    Clear,
}

/// Run a cache action and print its JSON report
pub async fn run(action: CacheAction) -> anyhow::Result<()> {
    let (config, _) = super::bootstrap();
    let registry = CacheRegistry::new(config.cache.registry_config())?;

    match action {
        CacheAction::Stats => {
            let stats = registry.stats().await;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        CacheAction::Health => {
            let health = registry.health_check().await;
            println!("{}", serde_json::to_string_pretty(&health)?);

            if !health.healthy {
                anyhow::bail!("One or more cache classes are unhealthy");
            }
        }
        CacheAction::Cleanup => {
            let report = registry.cleanup_expired().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        CacheAction::Clear => {
            registry.clear_all().await?;
            println!("{{\"cleared\": true}}");
        }
    }

    Ok(())
}
