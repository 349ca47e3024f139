//! TrotoTrack CLI - submit sidewalk photos for classification
//!
//! This binary provides the scan flow of the mobile app for terminals:
//! - Store a session token
//! - Pick or "capture" a photo, crop it, and submit it for classification
//! - Show the resolved endpoint configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use trototrack_core::screen::{CropRect, FileImageCapture, ScanScreen, ScreenCallback, ScreenEvent};
use trototrack_core::{api, auth, scan};

#[derive(Parser)]
#[command(name = "trototrack")]
#[command(author = "TrotoTrack Team")]
#[command(version)]
#[command(about = "Classify sidewalk photos with the TrotoTrack service")]
#[command(long_about = "
TrotoTrack CLI submits a photo of a sidewalk section to the TrotoTrack
classification service and prints the returned label and description.

Quick start:
  1. Store a session token:  trototrack login --token <TOKEN>
  2. Scan a photo:           trototrack scan --image sidewalk.jpg --crop 0,200,1024,600
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Read settings from this file instead of the default config path
    #[arg(long = "config", global = true, value_name = "PATH")]
    pub config_file: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Crop a photo and submit it for classification
    Scan {
        /// Photo to submit
        #[arg(short, long)]
        image: PathBuf,

        /// Treat the photo as a fresh camera capture (copied into the capture directory)
        #[arg(long)]
        camera: bool,

        /// Region to keep, as X,Y,WIDTH,HEIGHT in pixels
        #[arg(long)]
        crop: Option<CropRect>,

        /// Use this token instead of the stored session
        #[arg(long)]
        token: Option<String>,
    },

    /// Store a session token for authorized requests
    Login {
        /// Bearer token issued by the TrotoTrack service
        #[arg(long)]
        token: String,

        /// Account email (shown in status output)
        #[arg(long)]
        email: Option<String>,

        /// Seconds until the token expires
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
        expires_in: Option<i64>,
    },

    /// Remove the stored session token
    #[command(alias = "signout")]
    Logout,

    /// Show session status
    Status,

    /// Show configuration paths and settings
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("trototrack={},trototrack_core={}", log_level, log_level).into()
            }),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Scan {
            image,
            camera,
            crop,
            token,
        } => cmd_scan(&cli, image, *camera, *crop, token.clone()).await,
        Commands::Login {
            token,
            email,
            expires_in,
        } => cmd_login(&cli, token, email.clone(), *expires_in).await,
        Commands::Logout => cmd_logout(&cli).await,
        Commands::Status => cmd_status(&cli).await,
        Commands::Config => cmd_config(&cli).await,
    }
}

fn endpoint_config(cli: &Cli) -> api::ApiEndpointConfig {
    match &cli.config_file {
        Some(path) => api::load_api_config_from(path),
        None => api::load_api_config(),
    }
}

fn capture_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("trototrack")
        .join("captures")
}

fn print_event(event: &ScreenEvent) {
    match event {
        ScreenEvent::CropGuidance { message } => println!("{}", message),
        ScreenEvent::ImageShown { image } => println!("Image: {}", image.display()),
        ScreenEvent::Progress { visible: true } => println!("Scanning..."),
        ScreenEvent::Progress { visible: false } => {}
        ScreenEvent::Toast { message } => println!("{}", message),
        ScreenEvent::ShowResult {
            label, description, ..
        } => {
            println!();
            println!("Label:       {}", label.as_deref().unwrap_or("-"));
            println!("Description: {}", description.as_deref().unwrap_or("-"));
        }
    }
}

async fn cmd_scan(
    cli: &Cli,
    image: &Path,
    camera: bool,
    crop: Option<CropRect>,
    token: Option<String>,
) -> Result<()> {
    let config = endpoint_config(cli);
    let transport =
        api::HttpScanTransport::from_config(&config).context("Failed to build HTTP client")?;

    let tokens: Arc<dyn auth::TokenSource> = match token {
        Some(t) => Arc::new(auth::StaticToken::new(Some(t))),
        None => Arc::new(auth::StoredCredentials),
    };
    let pipeline = scan::ScanPipeline::new(transport, tokens).with_token_wait(config.token_wait);

    let on_event: ScreenCallback = match cli.format {
        OutputFormat::Text => Box::new(|event: ScreenEvent| print_event(&event)),
        OutputFormat::Json => Box::new(|event: ScreenEvent| tracing::debug!("{:?}", event)),
    };

    let capture = FileImageCapture::new(image, capture_dir()).with_crop(crop);
    let mut screen = ScanScreen::new(capture, pipeline, on_event);

    if camera {
        screen.start_camera().await;
    } else {
        screen.start_gallery().await;
    }

    let terminal = screen.submit().await;

    if let OutputFormat::Json = cli.format {
        let image = screen.current_image().map(|i| i.path().display().to_string());
        let output = match &terminal {
            Some(scan::OperationState::Success(body)) => serde_json::json!({
                "status": "success",
                "image": image,
                "label": body.label(),
                "description": body.description(),
            }),
            Some(scan::OperationState::Error(message)) => serde_json::json!({
                "status": "error",
                "image": image,
                "error": scan::display_error_message(message),
                "raw_error": message,
            }),
            _ => serde_json::json!({
                "status": "error",
                "error": trototrack_core::screen::NO_IMAGE_MESSAGE,
            }),
        };
        println!("{}", output);
    }

    match terminal {
        Some(scan::OperationState::Success(_)) => Ok(()),
        _ => anyhow::bail!("Scan failed"),
    }
}

async fn cmd_login(
    cli: &Cli,
    token: &str,
    email: Option<String>,
    expires_in: Option<i64>,
) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        anyhow::bail!("Token must not be empty");
    }

    let creds = auth::Credentials {
        access_token: token.to_string(),
        user_email: email,
        expires_at: expires_in.map(expiry_from_now).transpose()?,
    };
    auth::save_credentials(&creds).await?;

    match cli.format {
        OutputFormat::Text => {
            println!(
                "Signed in{}",
                creds
                    .user_email
                    .as_deref()
                    .map(|e| format!(" as {}", e))
                    .unwrap_or_default()
            );
            if let Some(expires_at) = creds.expires_at {
                println!("Token expires at {}", expires_at.to_rfc3339());
            }
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "status": "signed_in",
                    "user_email": creds.user_email,
                    "expires_at": creds.expires_at,
                })
            );
        }
    }

    Ok(())
}

/// Absolute expiry for a token valid for `secs` more seconds.
fn expiry_from_now(secs: i64) -> Result<chrono::DateTime<chrono::Utc>> {
    let Some(valid_for) = chrono::Duration::try_seconds(secs) else {
        anyhow::bail!("--expires-in {} is out of range", secs);
    };
    match chrono::Utc::now().checked_add_signed(valid_for) {
        Some(expires_at) => Ok(expires_at),
        None => anyhow::bail!("--expires-in {} is out of range", secs),
    }
}

async fn cmd_logout(cli: &Cli) -> Result<()> {
    let existing = auth::load_credentials().await?;
    if existing.is_some() {
        auth::delete_credentials().await?;
    }

    match cli.format {
        OutputFormat::Text => {
            if existing.is_some() {
                println!("Signed out.");
            } else {
                println!("Not signed in.");
            }
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "status": if existing.is_some() { "signed_out" } else { "not_signed_in" },
                })
            );
        }
    }

    Ok(())
}

async fn cmd_status(cli: &Cli) -> Result<()> {
    let creds = auth::load_credentials().await?;

    match cli.format {
        OutputFormat::Text => {
            match &creds {
                Some(c) => {
                    println!("Status:  Signed in");
                    println!("Email:   {}", c.user_email.as_deref().unwrap_or("-"));
                    println!(
                        "Expires: {}",
                        c.expires_at
                            .map(|e| e.to_rfc3339())
                            .unwrap_or_else(|| "never".to_string())
                    );
                }
                None => {
                    println!("Status: Not signed in");
                    println!();
                    println!("Scans will be sent with 'Authorization: Bearer null'.");
                    println!("Run 'trototrack login --token <TOKEN>' to sign in.");
                }
            }
            println!();
            println!("Storage: {}", auth::credential_storage_info());
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "authenticated": creds.is_some(),
                    "user_email": creds.as_ref().and_then(|c| c.user_email.clone()),
                    "expires_at": creds.as_ref().and_then(|c| c.expires_at),
                    "storage_info": auth::credential_storage_info(),
                })
            );
        }
    }

    Ok(())
}

async fn cmd_config(cli: &Cli) -> Result<()> {
    let config = endpoint_config(cli);
    let config_path = cli
        .config_file
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(api::config::get_config_file_path_string);

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration");
            println!("=============");
            println!();
            println!("Config file:      {}", config_path);
            println!(
                "Scan endpoint:    {}/{} (from {})",
                config.scan_url,
                api::PREDICT_ROUTE,
                config.source
            );
            let scan_auth = if config.authorize_scan {
                "bearer token"
            } else {
                "none"
            };
            println!("Scan auth:        {}", scan_auth);
            println!("Request timeout:  {:?}", config.timeout);
            println!("Token wait:       {:?}", config.token_wait);
            println!("Credential store: {}", auth::credential_storage_info());
            println!("Capture dir:      {}", capture_dir().display());
            println!();
            println!("Environment variables:");
            println!("  {} - Override scan endpoint", api::config::ENV_SCAN_URL);
            println!();
            println!("Example config.toml:");
            println!();
            println!("{}", api::config::generate_example_config());
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "config_file": config_path,
                    "scan_url": config.scan_url,
                    "source": config.source.to_string(),
                    "authorize_scan": config.authorize_scan,
                    "timeout_secs": config.timeout.as_secs(),
                    "token_wait_ms": config.token_wait.as_millis() as u64,
                    "credential_storage": auth::credential_storage_info(),
                })
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_from_now() {
        let before = chrono::Utc::now();
        let expires_at = expiry_from_now(3600).unwrap();
        assert!(expires_at >= before + chrono::Duration::seconds(3600));
        assert!(expires_at <= chrono::Utc::now() + chrono::Duration::seconds(3600));
    }

    #[test]
    fn test_expiry_from_now_out_of_range() {
        assert!(expiry_from_now(i64::MAX / 1000).is_err());
        assert!(expiry_from_now(i64::MAX).is_err());
    }

    #[test]
    fn test_expires_in_must_be_positive() {
        let parse = |value: &str| {
            Cli::try_parse_from(["trototrack", "login", "--token", "t", "--expires-in", value])
        };
        assert!(parse("60").is_ok());
        assert!(parse("0").is_err());
        assert!(parse("-5").is_err());
    }
}
