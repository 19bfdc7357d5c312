use std::path::PathBuf;

use clap::builder::TypedValueParser;
use clap::{Parser, ValueEnum};
use tracing::Level;

use crate::archive::ArchiveSpec;
use crate::cache::DEFAULT_CACHE_LIMIT;
use crate::config::{DEFAULT_HOST, DEFAULT_MAX_CONNECTIONS, DEFAULT_PORT, ServerConfig};

/// Bundled script library served alongside the site.
pub const DEFAULT_BUNDLE: &str = "mathjax-2.2.zip";
pub const DEFAULT_BUNDLE_PREFIX: &str = "mathjax-MathJax-727332c/";

#[derive(Parser, Debug)]
#[command(name = "zipdoc")]
#[command(version)]
#[command(about = "Serve a documentation site straight out of a zip archive", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipdoc html.zip                       serve html.zip on http://localhost:31337\n  \
  zipdoc --no-bundle -p 8080 site.zip   serve site.zip alone on port 8080\n  \
  zipdoc --open --log-level debug       serve html.zip and open a browser")]
pub struct Cli {
    /// Site archive to serve
    #[arg(value_name = "ARCHIVE", default_value = "html.zip", env = "ZIPDOC_ARCHIVE")]
    pub archive: PathBuf,

    /// Script bundle archive searched before the site archive
    #[arg(long, value_name = "PATH", default_value = DEFAULT_BUNDLE, env = "ZIPDOC_BUNDLE")]
    pub bundle: PathBuf,

    /// Directory inside the bundle that maps to the site root
    #[arg(
        long,
        value_name = "PREFIX",
        default_value = DEFAULT_BUNDLE_PREFIX,
        env = "ZIPDOC_BUNDLE_PREFIX"
    )]
    pub bundle_prefix: String,

    /// Serve the site archive only
    #[arg(long)]
    pub no_bundle: bool,

    /// Address to listen on
    #[arg(long, default_value = DEFAULT_HOST, env = "ZIPDOC_HOST")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "ZIPDOC_PORT")]
    pub port: u16,

    /// Flush the in-memory cache once it holds more than this many bytes
    #[arg(
        long,
        value_name = "BYTES",
        default_value_t = DEFAULT_CACHE_LIMIT,
        env = "ZIPDOC_CACHE_LIMIT"
    )]
    pub cache_limit: usize,

    /// Maximum number of simultaneously open connections
    #[arg(
        long,
        value_name = "N",
        default_value_t = DEFAULT_MAX_CONNECTIONS,
        value_parser = clap::value_parser!(u32).range(1..).map(|n| n as usize),
        env = "ZIPDOC_MAX_CONNECTIONS"
    )]
    pub max_connections: usize,

    /// Log verbosity (RUST_LOG overrides this)
    #[arg(long, value_enum, default_value_t = LogLevel::Info, env = "ZIPDOC_LOG_LEVEL")]
    pub log_level: LogLevel,

    /// Open the site in a web browser once the server is listening
    #[arg(long)]
    pub open: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_level(self) -> Level {
        match self {
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warning => Level::WARN,
            LogLevel::Error | LogLevel::Critical => Level::ERROR,
        }
    }
}

impl Cli {
    /// Archives in search order: the bundle (if any), then the site.
    pub fn archive_specs(&self) -> Vec<ArchiveSpec> {
        let mut specs = Vec::with_capacity(2);
        if !self.no_bundle {
            specs.push(ArchiveSpec::new(&self.bundle, &self.bundle_prefix));
        }
        specs.push(ArchiveSpec::new(&self.archive, ""));
        specs
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            cache_limit: self.cache_limit,
            max_connections: self.max_connections,
            expose_errors: self.log_level == LogLevel::Debug,
            ..ServerConfig::default()
        }
    }

    /// URL a browser should open for the site root.
    pub fn root_url(&self, port: u16) -> String {
        format!("http://{}:{}/", self.host, port)
    }
}
