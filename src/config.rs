use anyhow::{Context, Result, anyhow};
use std::{
    fs,
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
};

pub const DEFAULT_PORT: u16 = 5173;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const LIBRARY_SUBDIR: &str = "library";
pub const LIBRARY_URL_PREFIX: &str = "/library/";
pub const DEFAULT_YTDLP_PATH: &str = "yt-dlp";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";

/// Values read from an optional `KEY=value` config file. Everything is
/// optional; unset keys keep the built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct FileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub static_root: Option<PathBuf>,
    pub library_dir: Option<PathBuf>,
    pub ytdlp_path: Option<PathBuf>,
    pub user_agent: Option<String>,
}

/// Everything the server and the fetchers need, resolved once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served for GET requests outside the library.
    pub static_root: PathBuf,
    /// Flat directory holding every downloaded asset.
    pub library_dir: PathBuf,
    pub ytdlp_path: PathBuf,
    pub user_agent: String,
}

impl ServerConfig {
    /// Defaults rooted at `static_root`, with the library in `library/` below it.
    pub fn with_root(static_root: impl Into<PathBuf>) -> Self {
        let static_root = static_root.into();
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            library_dir: static_root.join(LIBRARY_SUBDIR),
            static_root,
            ytdlp_path: PathBuf::from(DEFAULT_YTDLP_PATH),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn apply_file(&mut self, cfg: FileConfig) {
        if let Some(root) = cfg.static_root {
            self.library_dir = root.join(LIBRARY_SUBDIR);
            self.static_root = root;
        }
        if let Some(dir) = cfg.library_dir {
            self.library_dir = if dir.is_absolute() {
                dir
            } else {
                self.static_root.join(dir)
            };
        }
        if let Some(host) = cfg.host {
            self.host = host;
        }
        if let Some(port) = cfg.port {
            self.port = port;
        }
        if let Some(path) = cfg.ytdlp_path {
            self.ytdlp_path = path;
        }
        if let Some(agent) = cfg.user_agent {
            self.user_agent = agent;
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("Parsing listen host {:?}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Creates the library directory if it does not exist yet.
    pub fn prepare_library(&self) -> Result<()> {
        fs::create_dir_all(&self.library_dir)
            .with_context(|| format!("Creating {}", self.library_dir.display()))
    }
}

pub fn read_config_file(path: &Path) -> Result<Option<FileConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let mut cfg = FileConfig::default();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some((key, value_raw)) = trimmed.split_once('=') {
            let value = value_raw.trim().trim_matches('"');
            if value.is_empty() {
                continue;
            }
            match key.trim() {
                "HOST" => cfg.host = Some(value.to_string()),
                "PORT" => {
                    let port: u16 = value
                        .parse()
                        .with_context(|| format!("Parsing PORT from {}", path.display()))?;
                    cfg.port = Some(port);
                }
                "STATIC_ROOT" => cfg.static_root = Some(PathBuf::from(value)),
                "LIBRARY_DIR" => cfg.library_dir = Some(PathBuf::from(value)),
                "YTDLP_PATH" => cfg.ytdlp_path = Some(PathBuf::from(value)),
                "USER_AGENT" => cfg.user_agent = Some(value.to_string()),
                _ => {}
            }
        }
    }
    Ok(Some(cfg))
}

/// Parses the positional port argument. Anything that is not a valid port is
/// ignored so the caller falls back to the configured default.
pub fn parse_port(raw: Option<&str>) -> Option<u16> {
    raw.and_then(|value| value.trim().parse::<u16>().ok())
}

/// Builds the runtime configuration: defaults, then the config file, then the
/// positional port.
pub fn load_server_config(
    root: impl Into<PathBuf>,
    config_path: Option<&Path>,
    port_arg: Option<&str>,
) -> Result<ServerConfig> {
    let mut config = ServerConfig::with_root(root);
    if let Some(path) = config_path {
        let cfg = read_config_file(path)?
            .ok_or_else(|| anyhow!("Missing config file at {}", path.display()))?;
        config.apply_file(cfg);
    }
    if let Some(port) = parse_port(port_arg) {
        config.port = port;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    #[test]
    fn defaults_put_library_under_root() {
        let config = ServerConfig::with_root("/srv/app");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.library_dir, PathBuf::from("/srv/app/library"));
        assert_eq!(config.ytdlp_path, PathBuf::from(DEFAULT_YTDLP_PATH));
    }

    #[test]
    fn parse_port_ignores_garbage() {
        assert_eq!(parse_port(Some("8081")), Some(8081));
        assert_eq!(parse_port(Some("eighty")), None);
        assert_eq!(parse_port(Some("70000")), None);
        assert_eq!(parse_port(Some("-1")), None);
        assert_eq!(parse_port(None), None);
    }

    #[test]
    fn invalid_port_argument_keeps_default() {
        let config = load_server_config("/srv", None, Some("not-a-port")).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn read_config_file_extracts_keys() {
        let cfg = make_config(
            "# comment\nPORT=\"4242\"\nLIBRARY_DIR=media\nYTDLP_PATH=/opt/yt-dlp\nUSER_AGENT=\"Test/1.0\"\n",
        );
        let parsed = read_config_file(cfg.path()).unwrap().unwrap();
        assert_eq!(parsed.port, Some(4242));
        assert_eq!(parsed.library_dir, Some(PathBuf::from("media")));
        assert_eq!(parsed.ytdlp_path, Some(PathBuf::from("/opt/yt-dlp")));
        assert_eq!(parsed.user_agent.as_deref(), Some("Test/1.0"));
        assert_eq!(parsed.host, None);
    }

    #[test]
    fn read_config_file_rejects_bad_port() {
        let cfg = make_config("PORT=abc\n");
        assert!(read_config_file(cfg.path()).is_err());
    }

    #[test]
    fn cli_port_overrides_file_port() {
        let cfg = make_config("PORT=4242\nLIBRARY_DIR=media\n");
        let config = load_server_config("/srv", Some(cfg.path()), Some("9000")).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.library_dir, PathBuf::from("/srv/media"));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = load_server_config("/srv", Some(Path::new("/nonexistent/appity.env")), None)
            .unwrap_err();
        assert!(err.to_string().contains("Missing config file"));
    }

    #[test]
    fn socket_addr_uses_host_and_port() {
        let mut config = ServerConfig::with_root("/srv");
        config.port = 6000;
        assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:6000");
        config.host = "localhost-ish".into();
        assert!(config.socket_addr().is_err());
    }
}
