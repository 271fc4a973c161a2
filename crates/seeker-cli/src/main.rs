//! Command-line front end for the Seeker scan engine.
//!
//! Exit codes: 0 on success, 2 on invalid arguments (clap's default),
//! 3 when the scan job ends in the failed state.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use seeker_addons::FaceRestoreClient;
use seeker_core::{AppConfig, JobId, ResultStatus, Username};
use seeker_jobs::{JobManager, JobState, JobView};
use seeker_registry::{ProviderLoader, ProviderRegistry};
use seeker_scanner::drivers::default_drivers;
use seeker_scanner::ScanEngine;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const EXIT_JOB_FAILED: i32 = 3;

#[derive(Parser, Debug)]
#[command(name = "seeker", about = "Username presence scanner", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan a username across providers
    Scan {
        /// Username to search
        username: String,

        /// Specific providers to search (default: all)
        #[arg(long, num_args = 1..)]
        providers: Vec<String>,

        /// Provider document to load
        #[arg(long, default_value = "providers.yaml")]
        providers_file: PathBuf,

        /// Directory of extra provider packs
        #[arg(long)]
        providers_dir: Option<PathBuf>,

        /// Emit the final job as JSON instead of text
        #[arg(long)]
        json: bool,

        /// Reference images for face matching
        #[arg(long, num_args = 1..)]
        face_match: Vec<PathBuf>,
    },

    /// List registered providers
    Providers {
        /// Provider document to load
        #[arg(long, default_value = "providers.yaml")]
        providers_file: PathBuf,
    },

    /// Print reverse-image search links for an image URL
    ReverseImage {
        /// Publicly reachable image URL
        image_url: String,
    },

    /// Restore a face image through the configured external service
    RestoreFace {
        /// Input image path
        input: PathBuf,

        /// Output image path
        output: PathBuf,

        /// Restoration fidelity, 0 to 1
        #[arg(long, default_value_t = 0.5)]
        fidelity: f32,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

fn build_registry(
    providers_file: &PathBuf,
    providers_dir: Option<&PathBuf>,
    code_names: Vec<String>,
) -> Result<Arc<ProviderRegistry>> {
    let mut loader = ProviderLoader::new(providers_file);
    if let Some(dir) = providers_dir {
        loader = loader.with_pack_dir(dir);
    }
    let registry = ProviderRegistry::load_from(&loader, code_names)
        .context("loading provider registry")?;
    Ok(Arc::new(registry))
}

fn status_mark(status: ResultStatus) -> &'static str {
    match status {
        ResultStatus::Found => "+",
        ResultStatus::NotFound => "-",
        ResultStatus::Error => "?",
        ResultStatus::Unknown | ResultStatus::Blocked => "~",
    }
}

fn print_text(view: &JobView) {
    for r in &view.results {
        let mut extra: Vec<String> = Vec::new();
        let profile = &r.profile;
        if let Some(name) = &profile.display_name {
            extra.push(name.clone());
        }
        if let Some(followers) = profile.followers {
            extra.push(format!("followers={followers}"));
        }
        if let Some(following) = profile.following {
            extra.push(format!("following={following}"));
        }
        if let Some(created) = &profile.created_at {
            extra.push(format!("created={created}"));
        }
        if let Some(cluster) = profile.avatar_cluster_id {
            extra.push(format!("avatar_cluster={cluster}"));
        }
        if let Some(fm) = &profile.face_match {
            if fm.matched {
                extra.push("FACE MATCH".to_string());
            } else if let Some(reason) = &fm.reason {
                extra.push(format!("no face match ({reason})"));
            }
        }

        let msg = match &r.error {
            Some(err) => err.clone(),
            None => {
                let prefix = if extra.is_empty() {
                    String::new()
                } else {
                    format!("{} | ", extra.join(" | "))
                };
                format!("{prefix}{}", r.url)
            }
        };

        println!(
            "{:14} [{}] {:10} {}",
            r.provider,
            status_mark(r.status),
            r.status,
            msg
        );
    }

    println!(
        "\n{} providers, {} found, {} other",
        view.providers_count, view.found_count, view.failed_count
    );
}

async fn poll_to_completion(manager: &JobManager, job_id: &JobId) -> Result<JobView> {
    loop {
        let view = manager.get(job_id, Some(0)).context("polling job")?;
        if view.state.is_terminal() {
            return manager.get(job_id, None).context("reading final job");
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

async fn run_scan(
    username: String,
    providers: Vec<String>,
    providers_file: PathBuf,
    providers_dir: Option<PathBuf>,
    json: bool,
    face_match: Vec<PathBuf>,
) -> Result<i32> {
    let username = match Username::new(username) {
        Ok(u) => u,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(2);
        }
    };

    let config = AppConfig::load_with_env().context("loading configuration")?;

    let hibp_key = std::env::var("SEEKER_HIBP_API_KEY").ok();
    let drivers = default_drivers(hibp_key);
    let code_names = drivers.iter().map(|d| d.name().to_string()).collect();

    let registry = build_registry(&providers_file, providers_dir.as_ref(), code_names)?;

    let engine = Arc::new(
        ScanEngine::new(&config, registry, drivers).context("building scan engine")?,
    );
    let manager = JobManager::new(engine, config);

    let mut references = Vec::new();
    for path in &face_match {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading reference image {}", path.display()))?;
        references.push(bytes);
    }

    let subset = if providers.is_empty() {
        None
    } else {
        Some(providers)
    };

    let job_id = manager.submit(username, subset, references);
    let view = poll_to_completion(&manager, &job_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_text(&view);
    }

    if view.state == JobState::Failed {
        if let Some(error) = &view.error {
            eprintln!("scan failed: {error}");
        }
        return Ok(EXIT_JOB_FAILED);
    }

    Ok(0)
}

fn list_providers(providers_file: &PathBuf) -> Result<()> {
    let drivers = default_drivers(None);
    let code_names: Vec<String> = drivers.iter().map(|d| d.name().to_string()).collect();
    let registry = build_registry(providers_file, None, code_names)?;

    for entry in registry.snapshot().entries() {
        let kind = match entry.kind() {
            seeker_registry::ProviderKind::Code => "code",
            seeker_registry::ProviderKind::Data(_) => "yaml",
        };
        println!("{:14} ({kind})", entry.name());
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match cli.command {
        Command::Scan {
            username,
            providers,
            providers_file,
            providers_dir,
            json,
            face_match,
        } => {
            run_scan(
                username,
                providers,
                providers_file,
                providers_dir,
                json,
                face_match,
            )
            .await?
        }
        Command::Providers { providers_file } => {
            list_providers(&providers_file)?;
            0
        }
        Command::ReverseImage { image_url } => {
            for link in seeker_addons::reverse_image_links(&image_url) {
                println!("{:20} {}", link.name, link.url);
            }
            0
        }
        Command::RestoreFace {
            input,
            output,
            fidelity,
        } => {
            let config = AppConfig::load_with_env().context("loading configuration")?;
            let Some(client) = FaceRestoreClient::from_config(&config.face_restore) else {
                eprintln!("error: no face_restore.url configured");
                std::process::exit(2);
            };

            let bytes = std::fs::read(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let restored = client
                .restore(&bytes, fidelity)
                .await
                .context("face restoration service unavailable")?;
            std::fs::write(&output, restored)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("restored image written to {}", output.display());
            0
        }
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
