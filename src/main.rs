//! DeviantArt Favourites Downloader - CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

use deviantart_favorites::{
    auth::{CodeReceiver, FileTokenStore, LocalCallbackReceiver, ManualCodeReceiver, TokenStore},
    cli::Args,
    config::{validate_config, validate_redirect_uri, Config},
    download::{run, RunSummary},
    error::{exit_codes, Error, Result},
    output::{
        print_banner, print_config_summary, print_error, print_info, print_run_summary,
        print_success, print_warning,
    },
};

#[tokio::main]
async fn main() -> ExitCode {
    match run_cli().await {
        Ok(summary) if summary.has_failures() => {
            print_warning("Some items could not be downloaded");
            ExitCode::from(exit_codes::SOME_ITEMS_FAILED as u8)
        }
        Ok(_) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(e) => {
            print_error(&format!("{}", e));
            match e {
                Error::Config(_) | Error::ConfigValidation { .. } | Error::MissingConfig(_) => {
                    ExitCode::from(exit_codes::CONFIG_ERROR as u8)
                }
                Error::AuthDenied(_)
                | Error::AuthProtocolError(_)
                | Error::AuthExpired(_)
                | Error::FetchError { .. } => ExitCode::from(exit_codes::AUTH_ERROR as u8),
                _ => ExitCode::from(exit_codes::UNEXPECTED_ERROR as u8),
            }
        }
    }
}

async fn run_cli() -> Result<RunSummary> {
    // Parse CLI arguments
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug {
        "debug"
    } else if args.quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    fmt().with_env_filter(filter).with_target(false).init();

    // Print banner
    print_banner();

    // Load configuration
    let config_path = args.config.clone();
    let mut config = if config_path.exists() {
        Config::load(&config_path)?
    } else {
        print_warning(&format!(
            "Configuration file not found: {}",
            config_path.display()
        ));
        print_info("Using default configuration with CLI arguments");
        Config::default()
    };

    // Merge CLI arguments into config
    args.merge_into_config(&mut config);

    // Validate configuration
    validate_config(&config)?;
    let redirect_uri = validate_redirect_uri(&config.oauth.redirect_uri)?;

    let download_dir = config.download_directory();
    let credentials_path = config.credentials_path();
    print_config_summary(
        config.options.username.as_deref(),
        &download_dir.display().to_string(),
        &credentials_path.display().to_string(),
    );

    let mut store = FileTokenStore::open(&credentials_path)?;
    if args.reset_auth {
        store.clear()?;
        print_info("Saved credential removed, authorization required");
    }

    let receiver = code_receiver(&config, redirect_uri);
    let summary = run(&config, &download_dir, store, receiver.as_ref()).await?;

    print_run_summary(&summary, &download_dir);

    if let Some(path) = &args.summary_json {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(path, json)?;
        print_info(&format!("Summary written to {}", path.display()));
    }

    if summary.succeeded > 0 && !summary.has_failures() {
        print_success(&format!("Downloaded {} favourites", summary.succeeded));
    }

    Ok(summary)
}

/// How the authorization code reaches us.
fn code_receiver(config: &Config, redirect_uri: Url) -> Box<dyn CodeReceiver> {
    if config.options.callback_server {
        Box::new(LocalCallbackReceiver::new(redirect_uri))
    } else {
        Box::new(ManualCodeReceiver)
    }
}
