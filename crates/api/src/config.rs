use std::time::Duration;

use musegen_modelscope::client::DEFAULT_BASE_URL;
use musegen_modelscope::poller::PollConfig;
use musegen_modelscope::vision::{DEFAULT_VISION_BASE_URL, DEFAULT_VISION_MODEL};

/// Application configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development except the
/// ModelScope cookie and the vision API key, which have no safe default;
/// endpoints needing them return 503 until they are configured.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `600`; a generate call
    /// spans a full poll cycle).
    pub request_timeout_secs: u64,

    /// Base URL of the ModelScope web API.
    pub modelscope_base_url: String,
    /// Raw browser cookie for the ModelScope session. Empty means
    /// unconfigured.
    pub modelscope_cookie: String,
    /// Prefix prepended to every positive prompt before submission.
    pub prompt_prefix: String,
    /// Default output width when a request does not specify one.
    pub default_width: u32,
    /// Default output height when a request does not specify one.
    pub default_height: u32,
    /// Directory generated images and manifests are written under.
    pub output_dir: String,
    /// Poll-loop tuning (attempt budget and per-status intervals).
    pub poll: PollConfig,

    /// API key for the vision captioning endpoint. Empty means
    /// unconfigured.
    pub vision_api_key: String,
    /// Base URL of the vision captioning endpoint.
    pub vision_base_url: String,
    /// Captioning model id.
    pub vision_model: String,
}

impl AppConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                              |
    /// |--------------------------|--------------------------------------|
    /// | `HOST`                   | `0.0.0.0`                            |
    /// | `PORT`                   | `3000`                               |
    /// | `CORS_ORIGINS`           | `http://localhost:5173`              |
    /// | `REQUEST_TIMEOUT_SECS`   | `600`                                |
    /// | `MODELSCOPE_BASE_URL`    | `https://www.modelscope.cn`          |
    /// | `MODELSCOPE_COOKIE`      | (empty)                              |
    /// | `MODELSCOPE_PROMPT_PREFIX` | (empty)                            |
    /// | `DEFAULT_WIDTH`          | `928`                                |
    /// | `DEFAULT_HEIGHT`         | `1664`                               |
    /// | `OUTPUT_DIR`             | `./output`                           |
    /// | `POLL_MAX_ATTEMPTS`      | `60`                                 |
    /// | `POLL_BASE_INTERVAL_SECS`| `10`                                 |
    /// | `VISION_API_KEY`         | (empty)                              |
    /// | `VISION_BASE_URL`        | `https://api-inference.modelscope.cn`|
    /// | `VISION_MODEL`           | `Qwen/Qwen3-VL-30B-A3B-Instruct`     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let poll_max_attempts: u32 = std::env::var("POLL_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("POLL_MAX_ATTEMPTS must be a valid u32");

        let poll_base_interval_secs: u64 = std::env::var("POLL_BASE_INTERVAL_SECS")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .expect("POLL_BASE_INTERVAL_SECS must be a valid u64");

        let poll = PollConfig {
            max_attempts: poll_max_attempts,
            base_interval: Duration::from_secs(poll_base_interval_secs),
            ..Default::default()
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            modelscope_base_url: std::env::var("MODELSCOPE_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.into()),
            modelscope_cookie: std::env::var("MODELSCOPE_COOKIE").unwrap_or_default(),
            prompt_prefix: std::env::var("MODELSCOPE_PROMPT_PREFIX").unwrap_or_default(),
            default_width: std::env::var("DEFAULT_WIDTH")
                .unwrap_or_else(|_| musegen_core::generation::DEFAULT_WIDTH.to_string())
                .parse()
                .expect("DEFAULT_WIDTH must be a valid u32"),
            default_height: std::env::var("DEFAULT_HEIGHT")
                .unwrap_or_else(|_| musegen_core::generation::DEFAULT_HEIGHT.to_string())
                .parse()
                .expect("DEFAULT_HEIGHT must be a valid u32"),
            output_dir: std::env::var("OUTPUT_DIR").unwrap_or_else(|_| "./output".into()),
            poll,
            vision_api_key: std::env::var("VISION_API_KEY").unwrap_or_default(),
            vision_base_url: std::env::var("VISION_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_VISION_BASE_URL.into()),
            vision_model: std::env::var("VISION_MODEL")
                .unwrap_or_else(|_| DEFAULT_VISION_MODEL.into()),
        }
    }

    /// Whether a ModelScope session cookie has been supplied.
    pub fn cookie_configured(&self) -> bool {
        !self.modelscope_cookie.trim().is_empty()
    }

    /// Whether the vision captioning endpoint has been supplied a key.
    pub fn vision_configured(&self) -> bool {
        !self.vision_api_key.trim().is_empty()
    }
}
