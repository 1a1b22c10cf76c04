use clap::Parser;
use mc_core::UNKNOWN;
use mc_feed::push::DEFAULT_PUSH_URL;
use mc_gateway::config_file::default_config_path;
use mc_gateway::DEFAULT_GATEWAY_BIN;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_ADAPTER_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: String,
    pub gateway_bin: String,
    pub poll_interval: Duration,
    pub adapter_timeout: Duration,
    pub push_url: String,
    pub push_enabled: bool,
    pub push_max_attempts: u32,
    pub push_base_delay: Duration,
    pub gateway_config: Option<PathBuf>,
    pub backend_version: String,
    pub log_dir: String,
    pub log_level: String,
    pub debug: bool,
}

#[derive(Parser, Debug, Default)]
#[command(name = "mission-control")]
pub struct Args {
    #[arg(long, default_value = "")]
    pub addr: String,
    #[arg(long, default_value = "")]
    pub gateway_bin: String,
    #[arg(long)]
    pub poll_interval: Option<u64>,
    #[arg(long)]
    pub adapter_timeout: Option<u64>,
    #[arg(long, default_value = "")]
    pub push_url: String,
    #[arg(long, default_value_t = 5)]
    pub push_max_attempts: u32,
    #[arg(long, default_value_t = 1000)]
    pub push_base_delay_ms: u64,
    #[arg(long, default_value = "")]
    pub gateway_config: String,
    #[arg(long, default_value = "")]
    pub backend_version: String,
    #[arg(long, default_value = "")]
    pub log_dir: String,
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}

pub fn load_config() -> Config {
    Config::resolve(Args::parse(), |key| std::env::var(key).ok())
}

impl Config {
    /// Flag beats environment, environment beats default.
    pub fn resolve(args: Args, env: impl Fn(&str) -> Option<String>) -> Self {
        let gateway_config = resolve_string(&args.gateway_config, env("MC_GATEWAY_CONFIG"), "");
        let debug = args.debug
            || env("MC_DEBUG")
                .and_then(|value| parse_bool_flag(&value))
                .unwrap_or(false);
        let log_level = if debug {
            "debug".to_string()
        } else {
            resolve_string("", env("MC_LOG_LEVEL"), "info")
        };
        Config {
            addr: resolve_string(&args.addr, env("MC_ADDR"), DEFAULT_ADDR),
            gateway_bin: resolve_string(&args.gateway_bin, env("MC_GATEWAY_BIN"), DEFAULT_GATEWAY_BIN),
            poll_interval: resolve_secs(
                args.poll_interval,
                env("MC_POLL_INTERVAL_SECS"),
                DEFAULT_POLL_INTERVAL_SECS,
            ),
            adapter_timeout: resolve_secs(
                args.adapter_timeout,
                env("MC_ADAPTER_TIMEOUT_SECS"),
                DEFAULT_ADAPTER_TIMEOUT_SECS,
            ),
            push_url: resolve_string(&args.push_url, env("MC_PUSH_URL"), DEFAULT_PUSH_URL),
            push_enabled: env("MC_PUSH_ENABLED")
                .and_then(|value| parse_bool_flag(&value))
                .unwrap_or(true),
            push_max_attempts: args.push_max_attempts,
            push_base_delay: Duration::from_millis(args.push_base_delay_ms),
            gateway_config: if gateway_config.is_empty() {
                default_config_path()
            } else {
                Some(PathBuf::from(gateway_config))
            },
            backend_version: resolve_string(&args.backend_version, env("MC_BACKEND_VERSION"), UNKNOWN),
            log_dir: resolve_string(&args.log_dir, env("MC_LOG_DIR"), ""),
            log_level,
            debug,
        }
    }
}

pub fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn resolve_string(flag: &str, env_value: Option<String>, default: &str) -> String {
    if !flag.trim().is_empty() {
        return flag.trim().to_string();
    }
    if let Some(value) = env_value {
        if !value.trim().is_empty() {
            return value.trim().to_string();
        }
    }
    default.to_string()
}

fn resolve_secs(flag: Option<u64>, env_value: Option<String>, default: u64) -> Duration {
    let secs = flag
        .or_else(|| env_value.and_then(|value| value.trim().parse::<u64>().ok()))
        .filter(|secs| *secs > 0)
        .unwrap_or(default);
    Duration::from_secs(secs)
}
