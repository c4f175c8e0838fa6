use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::time::Duration;

/// Default reconnect backoff floor in milliseconds.
pub const DEFAULT_RECONNECT_FLOOR_MS: u64 = 2_000;
/// Default reconnect backoff ceiling in milliseconds.
pub const DEFAULT_RECONNECT_CEILING_MS: u64 = 30_000;
/// Default interval between downstream `: ping` comments.
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 15;

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that are allowed to receive server responses.
    /// A single `*` allows any origin.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "*"
    )]
    pub allowed_origins: Vec<String>,

    /// The upstream SSE endpoint to subscribe to
    #[arg(short, long, env)]
    target_url: String,

    /// Extra request headers sent upstream, each formatted as `Name: value`
    #[arg(long, env, value_delimiter = ',', use_value_delimiter = true)]
    upstream_headers: Vec<String>,

    /// Timeout in seconds for establishing the upstream TCP/TLS connection
    #[arg(long, env, default_value_t = 30)]
    pub upstream_connect_timeout_secs: u64,

    /// Seconds without receiving any upstream bytes before the stream is considered dead.
    /// Unset means the relay waits for the remote end to close or error.
    #[arg(long, env)]
    pub upstream_idle_timeout_secs: Option<u64>,

    /// First reconnect delay in milliseconds, also the value the delay resets to
    #[arg(long, env, default_value_t = DEFAULT_RECONNECT_FLOOR_MS)]
    pub reconnect_floor_ms: u64,

    /// Upper bound of the reconnect delay in milliseconds
    #[arg(long, env, default_value_t = DEFAULT_RECONNECT_CEILING_MS)]
    pub reconnect_ceiling_ms: u64,

    /// Factor applied to the reconnect delay after every scheduled attempt
    #[arg(long, env, default_value_t = 1.5)]
    pub reconnect_growth: f64,

    /// Interval in seconds between keep-alive comments on each downstream connection
    #[arg(long, env, default_value_t = DEFAULT_KEEP_ALIVE_SECS)]
    pub keep_alive_secs: u64,

    /// Do not connect upstream at startup, wait for the first downstream subscriber
    #[arg(long, env)]
    pub lazy_connect: bool,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "0.0.0.0")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 8080)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    pub fn set_target_url(mut self, target_url: String) -> Self {
        self.target_url = target_url;
        self
    }

    /// Raw `Name: value` header lines; validated when the relay is built.
    pub fn upstream_headers(&self) -> &[String] {
        &self.upstream_headers
    }

    pub fn interface(&self) -> &str {
        self.interface.as_deref().unwrap_or("0.0.0.0")
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|origin| origin == "*")
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn reconnect_floor(&self) -> Duration {
        Duration::from_millis(self.reconnect_floor_ms)
    }

    pub fn reconnect_ceiling(&self) -> Duration {
        Duration::from_millis(self.reconnect_ceiling_ms)
    }

    pub fn upstream_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_connect_timeout_secs)
    }

    pub fn upstream_idle_timeout(&self) -> Option<Duration> {
        self.upstream_idle_timeout_secs.map(Duration::from_secs)
    }
}
