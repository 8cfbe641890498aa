use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub tushare: TushareConfig,
    #[serde(default)]
    pub akshare: AkshareConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TushareConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_tushare_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AkshareConfig {
    #[serde(default = "default_akshare_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    // 主后端：Gemini
    #[serde(default)]
    pub gemini_api_key: String,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    #[serde(default = "default_gemini_fallback")]
    pub gemini_model_fallback: String,
    #[serde(default = "default_gemini_url")]
    pub gemini_base_url: String,

    // 备选后端：任意 OpenAI 兼容 API（DeepSeek、通义千问、Moonshot 等）
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default)]
    pub openai_base_url: String,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    // 重试与限流
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 指数退避基准延时（秒）
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: f64,
    /// 每次分析请求前的固定延时（秒）
    #[serde(default = "default_request_delay")]
    pub request_delay_secs: f64,

    // 生成参数
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// 单次网络调用超时（秒），不约束整个重试序列
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// 数据接口请求前随机延时下限（毫秒）
    #[serde(default = "default_sleep_min")]
    pub sleep_min_ms: u64,
    /// 数据接口请求前随机延时上限（毫秒）
    #[serde(default = "default_sleep_max")]
    pub sleep_max_ms: u64,
    /// 选股接口重试次数
    #[serde(default = "default_selector_retries")]
    pub selector_max_retries: u32,
    /// 选股接口退避基准延时（秒）
    #[serde(default = "default_selector_delay")]
    pub selector_retry_delay_secs: f64,
    /// 批量分析时相邻两只股票之间的延时（秒）
    #[serde(default = "default_batch_delay")]
    pub batch_delay_secs: f64,
}

fn default_tushare_url() -> String {
    "http://api.tushare.pro".to_string()
}
fn default_akshare_url() -> String {
    "http://127.0.0.1:8080".to_string()
}
fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_gemini_fallback() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_gemini_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_openai_model() -> String {
    "deepseek-chat".to_string()
}
fn default_max_retries() -> u32 {
    4
}
fn default_retry_delay() -> f64 {
    5.0
}
fn default_request_delay() -> f64 {
    2.0
}
fn default_temperature() -> f64 {
    0.7
}
fn default_max_output_tokens() -> u32 {
    8192
}
fn default_timeout() -> u64 {
    120
}
fn default_sleep_min() -> u64 {
    500
}
fn default_sleep_max() -> u64 {
    2000
}
fn default_selector_retries() -> u32 {
    3
}
fn default_selector_delay() -> f64 {
    2.0
}
fn default_batch_delay() -> f64 {
    2.0
}

impl Default for TushareConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            base_url: default_tushare_url(),
        }
    }
}

impl Default for AkshareConfig {
    fn default() -> Self {
        Self {
            base_url: default_akshare_url(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            gemini_model: default_gemini_model(),
            gemini_model_fallback: default_gemini_fallback(),
            gemini_base_url: default_gemini_url(),
            openai_api_key: String::new(),
            openai_base_url: String::new(),
            openai_model: default_openai_model(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay(),
            request_delay_secs: default_request_delay(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            sleep_min_ms: default_sleep_min(),
            sleep_max_ms: default_sleep_max(),
            selector_max_retries: default_selector_retries(),
            selector_retry_delay_secs: default_selector_delay(),
            batch_delay_secs: default_batch_delay(),
        }
    }
}

impl LlmConfig {
    /// A key counts as configured only when it is not a placeholder
    /// ("your_xxx" template values) and has plausible length.
    pub fn gemini_key_valid(&self) -> bool {
        key_valid(&self.gemini_api_key)
    }

    pub fn openai_key_valid(&self) -> bool {
        key_valid(&self.openai_api_key)
    }
}

fn key_valid(key: &str) -> bool {
    !key.is_empty() && !key.starts_with("your_") && key.len() > 10
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    pub fn from_default() -> Result<Self, ConfigError> {
        Self::from_file("config/default.toml")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.llm.max_retries, 4);
        assert_eq!(cfg.llm.gemini_model, "gemini-2.5-flash");
        assert_eq!(cfg.fetch.sleep_min_ms, 500);
        assert!(cfg.tushare.token.is_empty());
    }

    #[test]
    fn test_partial_override() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [llm]
            gemini_api_key = "AIzaSyExampleExampleExample"
            max_retries = 6

            [tushare]
            token = "abc123"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.llm.max_retries, 6);
        assert!(cfg.llm.gemini_key_valid());
        assert_eq!(cfg.tushare.token, "abc123");
        assert_eq!(cfg.tushare.base_url, "http://api.tushare.pro");
    }

    #[test]
    fn test_placeholder_keys_are_invalid() {
        let mut llm = LlmConfig::default();
        llm.gemini_api_key = "your_gemini_api_key_here".to_string();
        assert!(!llm.gemini_key_valid());
        llm.openai_api_key = "short".to_string();
        assert!(!llm.openai_key_valid());
    }
}
