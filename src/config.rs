use envconfig::Envconfig;
use std::time::Duration;

#[derive(Envconfig)]
pub struct Config {
    #[envconfig(from = "LISTEN_ADDRESS", default = "0.0.0.0:5000")]
    pub listen_address: String,

    #[envconfig(from = "OPENAI_API_KEY")]
    pub openai_api_key: Option<String>,

    #[envconfig(from = "OPENAI_BASE_URL", default = "https://api.openai.com/v1")]
    pub openai_base_url: String,

    #[envconfig(from = "OPENAI_MODEL", default = "gpt-4o-mini")]
    pub openai_model: String,

    #[envconfig(from = "UPSTREAM_TIMEOUT_SECS", default = "60")]
    pub upstream_timeout_secs: u64,

    #[envconfig(from = "MAX_UPLOAD_BYTES", default = "10485760")]
    pub max_upload_bytes: usize,

    #[envconfig(from = "MAX_CONCURRENT_EXTRACTIONS", default = "8")]
    pub max_concurrent_extractions: usize,

    #[envconfig(from = "DEBUG", default = "false")]
    pub debug: bool,
}

impl Config {
    pub fn upstream(&self) -> UpstreamConfig {
        UpstreamConfig {
            api_key: self
                .openai_api_key
                .clone()
                .filter(|key| !key.trim().is_empty()),
            base_url: self.openai_base_url.trim_end_matches('/').to_owned(),
            model: self.openai_model.clone(),
            timeout: Duration::from_secs(self.upstream_timeout_secs),
        }
    }

    pub fn limits(&self) -> UploadLimits {
        UploadLimits {
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}

/// Settings for the inference service, fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_upload_bytes: usize,
}

impl UploadLimits {
    /// Room for multipart boundaries and part headers on top of the file itself.
    const FRAMING_ALLOWANCE: usize = 64 * 1024;

    pub fn body_limit(&self) -> usize {
        self.max_upload_bytes.saturating_add(Self::FRAMING_ALLOWANCE)
    }
}
