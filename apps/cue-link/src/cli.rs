use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use cue_link::config::{Config, DEFAULT_PROJECT_NAME, DEFAULT_SERVER_ADDR, DEFAULT_SERVER_PORT};

#[derive(Parser, Debug)]
#[command(
    name = "cue-link",
    about = "Sync a timeline cue sheet with the theatre automation server",
    version
)]
pub struct Cli {
    /// Automation server address
    #[arg(long, global = true, env = "CUE_LINK_SERVER_ADDR", default_value = DEFAULT_SERVER_ADDR)]
    pub addr: String,

    /// Automation server port (1024-65535)
    #[arg(long, global = true, env = "CUE_LINK_SERVER_PORT", default_value_t = DEFAULT_SERVER_PORT)]
    pub port: u16,

    /// Project name reported when the timeline has none
    #[arg(long, global = true, env = "CUE_LINK_PROJECT_NAME", default_value = DEFAULT_PROJECT_NAME)]
    pub project_name: String,

    /// Seconds to wait for the server before giving up
    #[arg(long, global = true, env = "CUE_LINK_CONNECT_TIMEOUT_SECS", default_value_t = 5)]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replace the timeline's synchronised content with the server's project
    Download {
        /// Timeline JSON file; created if missing
        #[arg(long)]
        timeline: PathBuf,

        /// Frame rate for a new timeline, or to override a loaded one
        #[arg(long)]
        fps: Option<f64>,
    },
    /// Send every synchronised scene to the server
    Upload {
        #[arg(long)]
        timeline: PathBuf,
    },
    /// Print the server's source list
    Sources,
    /// Add a cue marker
    AddCue {
        #[arg(long)]
        timeline: PathBuf,

        #[arg(long)]
        frame: i64,

        /// Text after the `CUE` tag
        text: String,

        /// Skip the automatic number prefix
        #[arg(long)]
        no_prefix: bool,
    },
    /// Add a scene on the best scene channel
    AddScene {
        #[arg(long)]
        timeline: PathBuf,

        #[arg(long)]
        frame: i64,

        name: String,
    },
}

impl Cli {
    pub fn config(&self) -> Config {
        Config {
            server_addr: self.addr.clone(),
            server_port: self.port,
            project_name: self.project_name.clone(),
            connect_timeout: Duration::from_secs(self.timeout),
            ..Config::from_env()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::ffi::OsStr;

    #[test]
    fn every_global_setting_has_an_env_fallback() {
        let command = Cli::command();
        let env_of = |id: &str| {
            command
                .get_arguments()
                .find(|arg| arg.get_id() == id)
                .and_then(|arg| arg.get_env())
                .map(OsStr::to_owned)
        };

        assert_eq!(env_of("addr").as_deref(), Some(OsStr::new("CUE_LINK_SERVER_ADDR")));
        assert_eq!(env_of("port").as_deref(), Some(OsStr::new("CUE_LINK_SERVER_PORT")));
        assert_eq!(
            env_of("project_name").as_deref(),
            Some(OsStr::new("CUE_LINK_PROJECT_NAME"))
        );
        assert_eq!(
            env_of("timeout").as_deref(),
            Some(OsStr::new("CUE_LINK_CONNECT_TIMEOUT_SECS"))
        );
    }

    #[test]
    fn parses_add_cue() {
        let cli = Cli::try_parse_from([
            "cue-link",
            "add-cue",
            "--timeline",
            "show.json",
            "--frame",
            "240",
            "house lights",
            "--port",
            "20000",
        ])
        .expect("parse");

        assert_eq!(cli.port, 20000);
        match cli.command {
            Commands::AddCue {
                frame,
                text,
                no_prefix,
                ..
            } => {
                assert_eq!(frame, 240);
                assert_eq!(text, "house lights");
                assert!(!no_prefix);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_flags_feed_config() {
        let cli = Cli::try_parse_from([
            "cue-link",
            "--addr",
            "localhost",
            "--project-name",
            "Tempest",
            "--timeout",
            "2",
            "sources",
        ])
        .expect("parse");

        let config = cli.config();
        assert_eq!(config.server_addr, "localhost");
        assert_eq!(config.project_name, "Tempest");
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(
            config.server_url().expect("url").as_str(),
            "ws://127.0.0.1:19531/pipe"
        );
    }
}
