//! Command-line argument definitions using clap.

use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;

/// DeviantArt favourites downloader CLI.
#[derive(Parser, Debug)]
#[command(
    name = "deviantart-favorites",
    version,
    about = "Download a DeviantArt favourites collection",
    long_about = "A CLI tool to download every image and video in a DeviantArt user's favourites.\n\n\
                  Authenticates through the official OAuth 2.0 API and keeps the token between runs."
)]
pub struct Args {
    /// User whose favourites are downloaded. Defaults to the authenticated user.
    #[arg(short, long)]
    pub user: Option<String>,

    /// Base directory for downloads.
    #[arg(short = 'd', long = "directory")]
    pub download_directory: Option<PathBuf>,

    /// OAuth client ID of the registered application.
    #[arg(long = "client-id", env = "DEVIANTART_CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth client secret of the registered application.
    #[arg(long = "client-secret", env = "DEVIANTART_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Redirect URI registered for the application.
    #[arg(long = "redirect-uri")]
    pub redirect_uri: Option<String>,

    /// Where the OAuth credential is stored.
    #[arg(long = "credentials-file")]
    pub credentials_file: Option<PathBuf>,

    /// Paste the authorization code instead of listening for the redirect.
    #[arg(long)]
    pub manual_code: bool,

    /// Forget the saved credential and authorize again.
    #[arg(long)]
    pub reset_auth: bool,

    /// Path to configuration file.
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Minimum milliseconds between requests.
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Attempts per page fetch or download.
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Leave out mature deviations.
    #[arg(long)]
    pub no_mature: bool,

    /// Hide progress bars and per-item messages.
    #[arg(long, short)]
    pub quiet: bool,

    /// Write the run summary as JSON to this file.
    #[arg(long)]
    pub summary_json: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long)]
    pub debug: bool,
}

impl Args {
    /// Merge CLI arguments into an existing config, overriding where specified.
    pub fn merge_into_config(&self, config: &mut Config) {
        if let Some(user) = &self.user {
            config.options.username = Some(user.clone());
        }

        // Override application credentials if provided
        if let Some(client_id) = &self.client_id {
            config.oauth.client_id = client_id.clone();
        }

        if let Some(client_secret) = &self.client_secret {
            config.oauth.client_secret = client_secret.clone();
        }

        if let Some(redirect_uri) = &self.redirect_uri {
            config.oauth.redirect_uri = redirect_uri.clone();
        }

        // Override options if provided
        if let Some(dir) = &self.download_directory {
            config.options.download_directory = Some(dir.clone());
        }

        if let Some(path) = &self.credentials_file {
            config.options.credentials_file = Some(path.clone());
        }

        if let Some(interval) = self.interval_ms {
            config.options.request_interval_ms = interval;
        }

        if let Some(attempts) = self.max_attempts {
            config.options.max_attempts = attempts;
        }

        // Boolean flags (only override if set to non-default)
        if self.manual_code {
            config.options.callback_server = false;
        }

        if self.no_mature {
            config.options.mature_content = false;
        }

        if self.quiet {
            config.options.show_progress = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_overrides() {
        let args = Args::parse_from([
            "deviantart-favorites",
            "--user",
            "someone",
            "--client-id",
            "999",
            "-d",
            "/tmp/favs",
            "--manual-code",
            "--no-mature",
            "--max-attempts",
            "2",
            "--quiet",
        ]);

        let mut config = Config::default();
        args.merge_into_config(&mut config);

        assert_eq!(config.options.username.as_deref(), Some("someone"));
        assert_eq!(config.oauth.client_id, "999");
        assert_eq!(config.download_directory(), PathBuf::from("/tmp/favs"));
        assert!(!config.options.callback_server);
        assert!(!config.options.mature_content);
        assert!(!config.options.show_progress);
        assert_eq!(config.options.max_attempts, 2);
    }

    #[test]
    fn test_defaults_leave_config_alone() {
        let args = Args::parse_from(["deviantart-favorites"]);
        let mut config = Config::default();
        config.oauth.client_id = "from-file".into();
        config.options.request_interval_ms = 900;

        args.merge_into_config(&mut config);
        assert_eq!(args.config, PathBuf::from("config.toml"));
        assert!(config.options.callback_server);
        assert_eq!(config.options.request_interval_ms, 900);
    }
}
