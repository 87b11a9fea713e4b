//! Command line / environment configuration

use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "figma-sync-server")]
#[command(about = "Watch a Rhino JSON export and serve Figma-ready scene data")]
#[command(version)]
pub struct Args {
    /// Rhino export to watch
    #[arg(long, env = "RHINO_JSON_PATH", default_value = "shapes.json")]
    pub file: PathBuf,

    #[arg(long, default_value = "0.0.0.0")]
    pub host: IpAddr,

    #[arg(long, env = "PORT", default_value = "4000")]
    pub port: u16,

    /// Quiet period after the last write before the export is processed
    #[arg(long, default_value = "1000")]
    pub stability_ms: u64,

    /// Debounce applied to raw file system events
    #[arg(long, default_value = "200")]
    pub poll_ms: u64,

    /// Figma personal access token for the diagnostic document fetch
    #[arg(long, env = "FIGMA_TOKEN", hide_env_values = true)]
    pub figma_token: Option<String>,

    /// Figma file key for the diagnostic document fetch
    #[arg(long, env = "FIGMA_FILE_KEY")]
    pub figma_file_key: Option<String>,

    #[arg(long, default_value = "https://api.figma.com")]
    pub figma_api: String,
}

impl Args {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn stability_window(&self) -> Duration {
        Duration::from_millis(self.stability_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    /// Diagnostics run only when both credentials are present.
    pub fn figma(&self) -> Option<FigmaConfig> {
        match (&self.figma_token, &self.figma_file_key) {
            (Some(token), Some(file_key)) if !token.is_empty() && !file_key.is_empty() => {
                Some(FigmaConfig {
                    api_base: self.figma_api.trim_end_matches('/').to_string(),
                    token: token.clone(),
                    file_key: file_key.clone(),
                })
            }
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct FigmaConfig {
    pub api_base: String,
    pub token: String,
    pub file_key: String,
}

impl std::fmt::Debug for FigmaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FigmaConfig")
            .field("api_base", &self.api_base)
            .field("token", &"<redacted>")
            .field("file_key", &self.file_key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("figma-sync-server").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--file", "out/shapes.json"]);
        assert_eq!(args.file, PathBuf::from("out/shapes.json"));
        assert_eq!(args.stability_window(), Duration::from_millis(1000));
        assert_eq!(args.poll_interval(), Duration::from_millis(200));
    }

    #[test]
    fn test_figma_requires_both_credentials() {
        let args = parse(&["--port", "4100", "--figma-token", "t", "--figma-file-key", "k"]);
        assert_eq!(args.addr().port(), 4100);
        let figma = args.figma().unwrap();
        assert_eq!(figma.file_key, "k");
        assert!(!format!("{:?}", figma).contains("\"t\""));

        let mut partial = args.clone();
        partial.figma_file_key = None;
        assert!(partial.figma().is_none());
    }
}
