//! Scene file utility
//!
//! ```text
//! scene_tool stats level.json
//! scene_tool --config engine.toml normalize level.json level.clean.json
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use render_engine::config::{Config, EngineConfig};
use render_engine::ecs::ComponentType;
use render_engine::foundation::logging;
use render_engine::scene::{ComponentCounts, Scene, SceneDocument};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Engine configuration file (.toml or .ron)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set, overriding the configuration
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Prints entity and per-type component counts
    Stats {
        /// Scene document to inspect
        scene: PathBuf,
    },
    /// Loads a scene and saves it again, dropping malformed components
    Normalize {
        /// Scene document to read
        input: PathBuf,
        /// Where to write the cleaned document
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = engine_config(&cli)?;
    logging::init(&config.log_level);

    match cli.command {
        CliCommand::Stats { scene } => stats(&scene),
        CliCommand::Normalize { input, output } => normalize(&input, &output, &config),
    }
}

/// Configuration file or tool defaults, with the command line level on top
fn engine_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let config = EngineConfig::load_from_file(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            config.validate()?;
            config
        }
        None => EngineConfig {
            log_level: "warn".to_string(),
            ..EngineConfig::default()
        },
    };
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    Ok(config)
}

fn stats(path: &Path) -> anyhow::Result<()> {
    let document =
        SceneDocument::load(path).with_context(|| format!("failed to read scene {}", path.display()))?;
    let counts = document.component_counts();
    print!("{}", format_stats(&document.name, &counts));
    Ok(())
}

fn normalize(input: &Path, output: &Path, config: &EngineConfig) -> anyhow::Result<()> {
    let mut scene = Scene::from_config("Untitled", config);
    let skipped = scene
        .load_json(input)
        .with_context(|| format!("failed to load scene {}", input.display()))?;
    scene
        .save_json(output)
        .with_context(|| format!("failed to write scene {}", output.display()))?;

    log::info!("Normalized {} into {}", input.display(), output.display());
    println!(
        "{}: {} entities written, {} components dropped",
        scene.name(),
        scene.len(),
        skipped
    );
    Ok(())
}

fn format_stats(name: &str, counts: &ComponentCounts) -> String {
    let mut out = format!("scene: {}\nentities: {}\n", name, counts.entities);
    for ty in ComponentType::ALL {
        let count = counts.by_type.get(&ty).copied().unwrap_or(0);
        out.push_str(&format!("  {:<14}{}\n", ty.name(), count));
    }
    if counts.unknown > 0 {
        out.push_str(&format!("  {:<14}{}\n", "unknown", counts.unknown));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_log_level_comes_from_config_unless_given() {
        let path = std::env::temp_dir().join(format!("scene_tool_{}_engine.toml", std::process::id()));
        std::fs::write(&path, "log_level = \"debug\"\nmsaa_samples = 2\n").unwrap();
        let config_arg = path.to_str().unwrap();

        let cli = Cli::try_parse_from(["scene_tool", "--config", config_arg, "stats", "a.json"]).unwrap();
        let config = engine_config(&cli).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.msaa_samples, 2);

        let cli = Cli::try_parse_from(["scene_tool", "--config", config_arg, "--log-level", "trace", "stats", "a.json"])
            .unwrap();
        assert_eq!(engine_config(&cli).unwrap().log_level, "trace");
        std::fs::remove_file(&path).ok();

        let cli = Cli::try_parse_from(["scene_tool", "stats", "a.json"]).unwrap();
        assert_eq!(engine_config(&cli).unwrap().log_level, "warn");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let path = std::env::temp_dir().join(format!("scene_tool_{}_bad.toml", std::process::id()));
        std::fs::write(&path, "msaa_samples = 3\n").unwrap();
        let cli = Cli::try_parse_from(["scene_tool", "--config", path.to_str().unwrap(), "stats", "a.json"]).unwrap();
        assert!(engine_config(&cli).is_err());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_stats_lists_every_type() {
        let mut counts = ComponentCounts { entities: 3, ..ComponentCounts::default() };
        counts.by_type.insert(ComponentType::Transform, 2);
        let text = format_stats("level", &counts);

        assert!(text.starts_with("scene: level\nentities: 3\n"));
        assert_eq!(text.lines().count(), 2 + ComponentType::COUNT);
        assert!(text.contains(&format!("  {:<14}2", ComponentType::Transform.name())));
        assert!(!text.contains("unknown"));
    }
}
