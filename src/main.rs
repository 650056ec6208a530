use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;

use hip_patcher::patch_format::{AssetOp, FileOp};
use hip_patcher::{apply, create, util, HipCodec, LogObserver, Patch, PatchSummary, PatcherConfig};

#[derive(Parser)]
#[command(name = "hip-patcher", about = "Patch creator and applier for HIP/HOP game data")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a patch by comparing original and modded game roots
    Create {
        /// Root folder of the original (un-modded) game
        #[arg(long)]
        old: PathBuf,
        /// Root folder of the modded game
        #[arg(long)]
        new: PathBuf,
        /// Output path for the patch file
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Apply a patch to a game root
    Apply {
        /// Root folder of the game to patch
        #[arg(long)]
        target: PathBuf,
        /// Path to the patch file
        #[arg(long, short)]
        patch: PathBuf,
        /// Where to save the uninstall patch
        #[arg(long, short)]
        uninstall: Option<PathBuf>,
    },
    /// List the operations a patch contains
    Inspect {
        /// Path to the patch file
        #[arg(long, short)]
        patch: PathBuf,
        /// Show a BLAKE3 digest of every payload
        #[arg(long)]
        digests: bool,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PatcherConfig> {
    match path {
        Some(path) => PatcherConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None => Ok(PatcherConfig::default()),
    }
}

fn print_summary(summary: &PatchSummary) {
    println!("  Files added: {}", summary.files_added);
    println!("  Files modified: {}", summary.files_modified);
    println!("  Files deleted: {}", summary.files_deleted);
    println!("  Archives modified: {}", summary.archives_modified);
    println!(
        "  Assets added/modified/deleted: {}/{}/{}",
        summary.assets_added, summary.assets_modified, summary.assets_deleted
    );
}

fn digest_suffix(data: Option<&[u8]>, digests: bool) -> String {
    match data {
        Some(data) if digests => format!(
            "  ({} bytes, blake3 {})",
            data.len(),
            util::short_hex(&util::hash_bytes(data), 8)
        ),
        _ => String::new(),
    }
}

fn print_patch(patch: &Patch, digests: bool) {
    if patch.is_uninstall {
        println!("Uninstall patch");
    }
    for op in patch.file_ops() {
        let data = match op {
            FileOp::Added(f) | FileOp::Modified(f) => Some(f.data.as_slice()),
            FileOp::Deleted(_) => None,
        };
        println!("{} {}{}", op.kind(), op.path(), digest_suffix(data, digests));
    }
    for archive in &patch.archives {
        println!("MODIFY {}", archive.path);
        for asset in archive.ops() {
            let layer = match asset {
                AssetOp::Added(a) | AssetOp::Modified(a) => a.layer,
                AssetOp::Deleted(d) => d.layer,
            };
            println!(
                "    {} {} [{:08X}] layer {}{}",
                asset.kind(),
                asset.name(),
                asset.id(),
                layer,
                digest_suffix(asset.data(), digests)
            );
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG, when set, still takes precedence over the flags.
    let level = match (cli.verbose, cli.quiet) {
        (0, true) => "error",
        (0, false) => "warn",
        (1, _) => "info",
        (2, _) => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Create { old, new, output } => {
            println!("Creating patch...");
            println!("  Original: {}", old.display());
            println!("  Modded: {}", new.display());
            println!("  Output: {}", output.display());

            let start = Instant::now();
            let out = output.clone();
            // The diff itself is a sequential walk; keep it off the async runtime.
            let summary = tokio::task::spawn_blocking(move || {
                create::create_patch(&old, &new, &out, &HipCodec, &config, &mut LogObserver)
            })
            .await?
            .with_context(|| format!("Failed to create patch: {}", output.display()))?;
            let elapsed = start.elapsed();

            println!("\nPatch created successfully!");
            print_summary(&summary);
            println!("  Time elapsed: {:.3}s", elapsed.as_secs_f64());
        }
        Commands::Apply {
            target,
            patch,
            uninstall,
        } => {
            println!("Applying patch...");
            println!("  Target: {}", target.display());
            println!("  Patch: {}", patch.display());
            if let Some(path) = &uninstall {
                println!("  Uninstall patch: {}", path.display());
            }

            let start = Instant::now();
            let patch_path = patch.clone();
            let summary = tokio::task::spawn_blocking(move || {
                apply::apply_patch(
                    &target,
                    &patch_path,
                    uninstall.as_deref(),
                    &HipCodec,
                    &config,
                    &mut LogObserver,
                )
            })
            .await?
            .with_context(|| format!("Failed to apply patch: {}", patch.display()))?;
            let elapsed = start.elapsed();

            println!("\nPatch applied successfully!");
            print_summary(&summary);
            println!("  Time elapsed: {:.3}s", elapsed.as_secs_f64());
        }
        Commands::Inspect { patch, digests } => {
            let loaded = Patch::load(&patch)
                .with_context(|| format!("Failed to read patch: {}", patch.display()))?;
            print_patch(&loaded, digests);
            println!();
            print_summary(&loaded.summary());
        }
    }

    Ok(())
}
