use clap::{Parser, builder::BoolishValueParser};
use gsearch_store::schema::{
    DEFAULT_NUM_RESULTS,
    MAX_NUM_RESULTS,
    MIN_NUM_RESULTS,
    num_results_in_range,
};
use std::error::Error;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_CACHE_PATH: &str = "cache/google_cache.json";
const DEFAULT_REQUEST_DELAY_SECS: u64 = 5;
const DEFAULT_REQUEST_JITTER_MS: u64 = 2_000;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_MAX_BACKOFF_SECS: u64 = 60;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_LANGUAGE: &str = "en";
const DEFAULT_MCP_HTTP_ADDR: &str = "127.0.0.1:4030";

#[derive(Parser, Debug)]
#[command(name = "gsearch-mcpd", version, about = "Google search MCP daemon.")]
#[allow(clippy::struct_excessive_bools)]
struct CliArgs {
    #[arg(long, env = "GSEARCH_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,

    #[arg(long, env = "GSEARCH_LOG_FILE")]
    log_file: Option<PathBuf>,

    #[arg(long, env = "GSEARCH_CACHE_PATH", default_value = DEFAULT_CACHE_PATH)]
    cache_path: PathBuf,

    #[arg(
        long,
        env = "GSEARCH_CACHE_ENABLED",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    cache_enabled: bool,

    #[arg(long, env = "GSEARCH_CACHE_TTL_SECS", default_value_t = 0)]
    cache_ttl_secs: u64,

    #[arg(long, env = "GSEARCH_CACHE_MAX_ENTRIES")]
    cache_max_entries: Option<usize>,

    #[arg(
        long,
        env = "GSEARCH_REQUEST_DELAY_SECS",
        default_value_t = DEFAULT_REQUEST_DELAY_SECS
    )]
    request_delay_secs: u64,

    #[arg(
        long,
        env = "GSEARCH_REQUEST_JITTER_MS",
        default_value_t = DEFAULT_REQUEST_JITTER_MS
    )]
    request_jitter_ms: u64,

    #[arg(long, env = "GSEARCH_MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES)]
    max_retries: u32,

    #[arg(
        long,
        env = "GSEARCH_MAX_BACKOFF_SECS",
        default_value_t = DEFAULT_MAX_BACKOFF_SECS
    )]
    max_backoff_secs: u64,

    #[arg(long, env = "GSEARCH_NUM_RESULTS", default_value_t = DEFAULT_NUM_RESULTS)]
    num_results: u32,

    #[arg(
        long,
        env = "GSEARCH_USE_CACHE",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    use_cache: bool,

    #[arg(
        long,
        env = "GSEARCH_INCLUDE_DESCRIPTIONS",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    include_descriptions: bool,

    #[arg(
        long,
        env = "GSEARCH_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_HTTP_TIMEOUT_SECS
    )]
    http_timeout_secs: u64,

    #[arg(long, env = "GSEARCH_LANGUAGE", default_value = DEFAULT_LANGUAGE)]
    language: String,

    #[arg(long, env = "GSEARCH_REGION")]
    region: Option<String>,

    #[arg(long, env = "GSEARCH_SAFE")]
    safe: Option<String>,

    #[arg(long, env = "GSEARCH_USER_AGENTS", value_delimiter = '|')]
    user_agents: Vec<String>,

    #[arg(
        long = "http",
        env = "GSEARCH_HTTP",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    serve_http: bool,

    #[arg(long, env = "GSEARCH_MCP_HTTP_ADDR", default_value = DEFAULT_MCP_HTTP_ADDR)]
    mcp_http_addr: SocketAddr,
}

/// Runtime configuration loaded from CLI arguments and environment variables.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct GsearchConfig {
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub cache_path: Option<PathBuf>,
    pub cache_ttl: Option<Duration>,
    pub cache_max_entries: Option<usize>,
    pub request_delay: Duration,
    pub request_jitter: Duration,
    pub max_retries: u32,
    pub max_backoff: Duration,
    pub num_results: u32,
    pub use_cache: bool,
    pub include_descriptions: bool,
    pub http_timeout: Duration,
    pub language: String,
    pub region: Option<String>,
    pub safe: Option<String>,
    pub user_agents: Vec<String>,
    pub serve_http: bool,
    pub mcp_http_addr: SocketAddr,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidSetting { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSetting { name, value } => {
                write!(f, "invalid {name} value: {value}")
            }
        }
    }
}

impl Error for ConfigError {}

impl GsearchConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }
}

impl TryFrom<CliArgs> for GsearchConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.log_level.trim().is_empty() {
            return Err(ConfigError::InvalidSetting {
                name: "GSEARCH_LOG_LEVEL",
                value: args.log_level,
            });
        }
        if args.max_retries == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "GSEARCH_MAX_RETRIES",
                value: args.max_retries.to_string(),
            });
        }
        if !num_results_in_range(args.num_results) {
            return Err(ConfigError::InvalidSetting {
                name: "GSEARCH_NUM_RESULTS",
                value: format!(
                    "{} (expected {MIN_NUM_RESULTS}..={MAX_NUM_RESULTS})",
                    args.num_results
                ),
            });
        }
        if args.http_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "GSEARCH_HTTP_TIMEOUT_SECS",
                value: args.http_timeout_secs.to_string(),
            });
        }
        if args.cache_max_entries == Some(0) {
            return Err(ConfigError::InvalidSetting {
                name: "GSEARCH_CACHE_MAX_ENTRIES",
                value: "0".to_string(),
            });
        }

        let cache_path = args
            .cache_enabled
            .then_some(args.cache_path)
            .filter(|path| !path.as_os_str().is_empty());
        let cache_ttl = (args.cache_ttl_secs > 0).then(|| Duration::from_secs(args.cache_ttl_secs));
        let log_file = args.log_file.filter(|path| !path.as_os_str().is_empty());
        let region = args.region.filter(|value| !value.trim().is_empty());
        let safe = args.safe.filter(|value| !value.trim().is_empty());
        let user_agents = args
            .user_agents
            .into_iter()
            .map(|agent| agent.trim().to_string())
            .filter(|agent| !agent.is_empty())
            .collect();

        Ok(Self {
            log_level: args.log_level,
            log_file,
            cache_path,
            cache_ttl,
            cache_max_entries: args.cache_max_entries,
            request_delay: Duration::from_secs(args.request_delay_secs),
            request_jitter: Duration::from_millis(args.request_jitter_ms),
            max_retries: args.max_retries,
            max_backoff: Duration::from_secs(args.max_backoff_secs),
            num_results: args.num_results,
            use_cache: args.use_cache,
            include_descriptions: args.include_descriptions,
            http_timeout: Duration::from_secs(args.http_timeout_secs),
            language: args.language,
            region,
            safe,
            user_agents,
            serve_http: args.serve_http,
            mcp_http_addr: args.mcp_http_addr,
        })
    }
}
