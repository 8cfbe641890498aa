//! Resilient scoring client: wraps one "generate analysis" call with
//! retry, exponential backoff, mid-sequence model substitution and
//! cross-provider escalation.
//!
//! Priority: Gemini 主模型 > Gemini 备选模型 > OpenAI 兼容 API. The
//! public `analyze` contract never raises: total failure returns a
//! neutral-default result with `success = false`.

use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, error, info, warn};

use insight_config::LlmConfig;
use insight_core::models::AnalysisResult;

use crate::client::{ChatBackend, OpenAiClient};
use crate::gemini::GeminiClient;
use crate::names;
use crate::parser::parse_response;
use crate::prompt::{format_prompt, SYSTEM_PROMPT};

pub struct Analyzer {
    primary: Option<Box<dyn ChatBackend>>,
    secondary: Option<Box<dyn ChatBackend>>,

    current_model: String,
    fallback_model: String,
    using_fallback: bool,
    secondary_model: String,

    max_retries: u32,
    base_delay: Duration,
    request_delay: Duration,
}

impl Analyzer {
    pub fn from_config(cfg: &LlmConfig) -> Self {
        let timeout = Duration::from_secs(cfg.timeout_secs);

        let primary: Option<Box<dyn ChatBackend>> = if cfg.gemini_key_valid() {
            info!("Gemini 后端初始化成功 (模型: {})", cfg.gemini_model);
            Some(Box::new(GeminiClient::new(
                &cfg.gemini_base_url,
                &cfg.gemini_api_key,
                cfg.temperature,
                cfg.max_output_tokens,
                timeout,
            )))
        } else {
            info!("Gemini API Key 未配置，尝试使用 OpenAI 兼容 API");
            None
        };

        let secondary: Option<Box<dyn ChatBackend>> = if cfg.openai_key_valid() {
            // base_url 未配置时走 OpenAI 官方默认地址
            let base_url = if cfg.openai_base_url.starts_with("http") {
                cfg.openai_base_url.clone()
            } else {
                "https://api.openai.com/v1".to_string()
            };
            info!(
                "OpenAI 兼容 API 初始化成功 (base_url: {}, model: {})",
                base_url, cfg.openai_model
            );
            Some(Box::new(OpenAiClient::new(
                &base_url,
                &cfg.openai_api_key,
                cfg.temperature,
                cfg.max_output_tokens,
                timeout,
            )))
        } else {
            None
        };

        if primary.is_none() && secondary.is_none() {
            warn!("未配置任何 AI API Key，AI 分析功能将不可用");
        }

        Self::with_backends(primary, secondary, cfg)
    }

    /// Build from pre-constructed backends; retry and model settings
    /// still come from the config.
    pub fn with_backends(
        primary: Option<Box<dyn ChatBackend>>,
        secondary: Option<Box<dyn ChatBackend>>,
        cfg: &LlmConfig,
    ) -> Self {
        Self {
            primary,
            secondary,
            current_model: cfg.gemini_model.clone(),
            fallback_model: cfg.gemini_model_fallback.clone(),
            using_fallback: false,
            secondary_model: cfg.openai_model.clone(),
            max_retries: cfg.max_retries.max(1),
            base_delay: Duration::from_secs_f64(cfg.retry_delay_secs.max(0.0)),
            request_delay: Duration::from_secs_f64(cfg.request_delay_secs.max(0.0)),
        }
    }

    pub fn is_available(&self) -> bool {
        self.primary.is_some() || self.secondary.is_some()
    }

    /// 当前生效的模型名（主后端可用时）。
    pub fn current_model(&self) -> &str {
        &self.current_model
    }

    pub fn using_fallback_model(&self) -> bool {
        self.using_fallback
    }

    /// 分析单只股票。
    ///
    /// 流程：解析显示名 → 请求前延时 → 组装提示词 → 带重试调用 →
    /// 解析响应。任何失败都折叠成 `success=false` 的中性结果。
    pub async fn analyze(&mut self, context: &Value, news_context: Option<&str>) -> AnalysisResult {
        let code = context
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string();
        let name = resolve_name(context, &code);

        if !self.is_available() {
            return AnalysisResult::failure(
                &code,
                &name,
                "AI 分析功能未启用（未配置 API Key）",
                "请配置 API Key 后重试",
                "API Key 未配置",
            );
        }

        // 连续请求之间的礼貌性延时，降低触发限流的概率
        if !self.request_delay.is_zero() {
            debug!("[LLM] 请求前等待 {:.1} 秒...", self.request_delay.as_secs_f64());
            tokio::time::sleep(self.request_delay).await;
        }

        let prompt = format_prompt(context, &name, news_context);

        info!("========== AI 分析 {}({}) ==========", name, code);
        info!("[LLM配置] 模型: {}", self.current_model);
        info!("[LLM配置] Prompt 长度: {} 字符", prompt.chars().count());
        info!("[LLM配置] 是否包含新闻: {}", if news_context.is_some() { "是" } else { "否" });

        let started = Instant::now();
        match self.call_with_retry(&prompt).await {
            Ok(text) => {
                info!(
                    "[LLM返回] 响应成功, 耗时 {:.2}s, 响应长度 {} 字符",
                    started.elapsed().as_secs_f64(),
                    text.chars().count()
                );
                let mut result = parse_response(&text, &code, &name);
                result.raw_response = Some(text);
                result.search_performed = news_context.is_some();
                info!(
                    "[LLM解析] {}({}) 分析完成: {}, 评分 {}",
                    name, code, result.trend_prediction, result.sentiment_score
                );
                result
            }
            Err(e) => {
                error!("AI 分析 {}({}) 失败: {}", name, code, e);
                let msg = e.to_string();
                AnalysisResult::failure(
                    &code,
                    &name,
                    &format!("分析过程出错: {}", truncate_chars(&msg, 100)),
                    "分析失败，请稍后重试或手动分析",
                    &msg,
                )
            }
        }
    }

    /// 批量分析；相邻两只股票之间插入固定延时。
    pub async fn batch_analyze(
        &mut self,
        contexts: &[Value],
        delay_between: Duration,
    ) -> Vec<AnalysisResult> {
        let mut results = Vec::with_capacity(contexts.len());
        for (i, context) in contexts.iter().enumerate() {
            if i > 0 && !delay_between.is_zero() {
                debug!("等待 {:.1} 秒后继续...", delay_between.as_secs_f64());
                tokio::time::sleep(delay_between).await;
            }
            results.push(self.analyze(context, None).await);
        }
        results
    }

    // ── Retry state machine ─────────────────────────────────────────

    async fn call_with_retry(&mut self, prompt: &str) -> anyhow::Result<String> {
        if self.primary.is_none() {
            return self.call_secondary(prompt).await;
        }

        match self.call_primary(prompt).await {
            Ok(text) => Ok(text),
            Err(primary_err) => {
                if self.secondary.is_none() {
                    return Err(primary_err);
                }
                warn!("[LLM] 主后端全部重试失败，切换到 OpenAI 兼容 API");
                match self.call_secondary(prompt).await {
                    Ok(text) => Ok(text),
                    Err(secondary_err) => {
                        error!("[OpenAI] 备选 API 也失败: {}", secondary_err);
                        // 主后端错误更能说明问题，优先暴露
                        Err(primary_err)
                    }
                }
            }
        }
    }

    /// 主后端重试循环：指数退避；重试过半仍失败则换备选模型，且每次
    /// 调用最多换一次。
    async fn call_primary(&mut self, prompt: &str) -> anyhow::Result<String> {
        let backend = self
            .primary
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("主后端未初始化"))?;

        let mut model = self.current_model.clone();
        let mut tried_fallback = self.using_fallback;
        let mut last_err: Option<anyhow::Error> = None;
        let mut reply: Option<String> = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(attempt, self.base_delay);
                info!(
                    "[{}] 第 {} 次重试，等待 {:.1} 秒...",
                    backend.name(),
                    attempt + 1,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }

            match backend.generate(&model, SYSTEM_PROMPT, prompt).await {
                Ok(text) => {
                    reply = Some(text);
                    break;
                }
                Err(e) => {
                    let msg = e.to_string();
                    if is_rate_limit(&msg) {
                        warn!(
                            "[{}] API 限流 (429)，第 {}/{} 次尝试: {}",
                            backend.name(),
                            attempt + 1,
                            self.max_retries,
                            truncate_chars(&msg, 100)
                        );
                    } else {
                        warn!(
                            "[{}] API 调用失败，第 {}/{} 次尝试: {}",
                            backend.name(),
                            attempt + 1,
                            self.max_retries,
                            truncate_chars(&msg, 100)
                        );
                    }

                    if attempt >= self.max_retries / 2 && !tried_fallback {
                        warn!("[{}] 切换到备选模型: {}", backend.name(), self.fallback_model);
                        model = self.fallback_model.clone();
                        tried_fallback = true;
                    }
                    last_err = Some(e);
                }
            }
        }

        // 会话状态只由本次调用序列推进
        self.current_model = model;
        self.using_fallback = tried_fallback;

        match reply {
            Some(text) => Ok(text),
            None => Err(last_err.unwrap_or_else(|| anyhow::anyhow!("主后端不可用"))),
        }
    }

    /// 备选后端重试循环：独立的尝试计数，同一退避公式。
    async fn call_secondary(&self, prompt: &str) -> anyhow::Result<String> {
        let Some(backend) = self.secondary.as_ref() else {
            anyhow::bail!("所有 AI API 调用失败，已达最大重试次数");
        };

        let mut last_err: Option<anyhow::Error> = None;
        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(attempt, self.base_delay);
                info!(
                    "[{}] 第 {} 次重试，等待 {:.1} 秒...",
                    backend.name(),
                    attempt + 1,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }

            match backend
                .generate(&self.secondary_model, SYSTEM_PROMPT, prompt)
                .await
            {
                Ok(text) => return Ok(text),
                Err(e) => {
                    let msg = e.to_string();
                    if is_rate_limit(&msg) {
                        warn!(
                            "[{}] API 限流，第 {}/{} 次尝试: {}",
                            backend.name(),
                            attempt + 1,
                            self.max_retries,
                            truncate_chars(&msg, 100)
                        );
                    } else {
                        warn!(
                            "[{}] API 调用失败，第 {}/{} 次尝试: {}",
                            backend.name(),
                            attempt + 1,
                            self.max_retries,
                            truncate_chars(&msg, 100)
                        );
                    }
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("备选后端不可用")))
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// 退避时长：attempt n (n>=1) 前等待 min(base · 2^(n-1), 60s)。
fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    (base * factor).min(Duration::from_secs(60))
}

/// 限流识别只影响日志措辞，不改变退避策略。
fn is_rate_limit(message: &str) -> bool {
    let lower = message.to_lowercase();
    message.contains("429") || lower.contains("quota") || lower.contains("rate")
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// 显示名解析优先级：调用方传入 → realtime 子记录 → 静态映射表 →
/// 合成占位名。
fn resolve_name(context: &Value, code: &str) -> String {
    if let Some(name) = context
        .get("stock_name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty() && !s.starts_with("股票"))
    {
        return name.to_string();
    }
    if let Some(name) = context
        .pointer("/realtime/name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
    {
        return name.to_string();
    }
    names::stock_name(code)
        .map(str::to_string)
        .unwrap_or_else(|| format!("股票{code}"))
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Scripted backend: pops one canned outcome per call and records
    /// the model each call was made with.
    #[derive(Clone)]
    struct ScriptedBackend {
        label: &'static str,
        script: Arc<Mutex<VecDeque<std::result::Result<String, String>>>>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedBackend {
        fn new(label: &'static str, script: Vec<std::result::Result<String, String>>) -> Self {
            Self {
                label,
                script: Arc::new(Mutex::new(script.into_iter().collect())),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn models_seen(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        fn name(&self) -> &'static str {
            self.label
        }

        async fn generate(&self, model: &str, _system: &str, _prompt: &str) -> anyhow::Result<String> {
            self.calls.lock().unwrap().push(model.to_string());
            match self.script.lock().unwrap().pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(msg)) => Err(anyhow::anyhow!(msg)),
                None => Err(anyhow::anyhow!("script exhausted")),
            }
        }
    }

    fn test_config(max_retries: u32) -> LlmConfig {
        let mut cfg = LlmConfig::default();
        cfg.max_retries = max_retries;
        cfg.retry_delay_secs = 0.0;
        cfg.request_delay_secs = 0.0;
        cfg
    }

    fn context_for(code: &str) -> Value {
        json!({ "code": code, "date": "2025-01-15" })
    }

    #[test]
    fn test_backoff_schedule() {
        let base = Duration::from_secs(5);
        assert_eq!(backoff_delay(1, base), Duration::from_secs(5));
        assert_eq!(backoff_delay(2, base), Duration::from_secs(10));
        assert_eq!(backoff_delay(3, base), Duration::from_secs(20));
        assert_eq!(backoff_delay(4, base), Duration::from_secs(40));
        // 封顶 60 秒
        assert_eq!(backoff_delay(5, base), Duration::from_secs(60));
        assert_eq!(backoff_delay(10, base), Duration::from_secs(60));
    }

    #[test]
    fn test_is_rate_limit() {
        assert!(is_rate_limit("Gemini API error (HTTP 429 Too Many Requests): ..."));
        assert!(is_rate_limit("Quota exceeded for quota metric"));
        assert!(is_rate_limit("Rate limit reached"));
        assert!(!is_rate_limit("connection timed out"));
    }

    #[test]
    fn test_resolve_name_priority() {
        // 调用方传入的名称优先
        let ctx = json!({ "stock_name": "调用方名称", "realtime": { "name": "实时名称" } });
        assert_eq!(resolve_name(&ctx, "600519"), "调用方名称");

        // 占位名视同未提供
        let ctx = json!({ "stock_name": "股票600519", "realtime": { "name": "实时名称" } });
        assert_eq!(resolve_name(&ctx, "600519"), "实时名称");

        // 映射表兜底
        let ctx = json!({});
        assert_eq!(resolve_name(&ctx, "600519"), "贵州茅台");

        // 全部缺失时合成占位名
        assert_eq!(resolve_name(&ctx, "688001"), "股票688001");
    }

    #[tokio::test]
    async fn test_retry_succeeds_midway_without_escalation() {
        // 第 0、1 次失败，第 2 次成功：返回第 2 次的响应，不触发备选后端
        let primary = ScriptedBackend::new(
            "Gemini",
            vec![
                Err("HTTP 500".to_string()),
                Err("HTTP 500".to_string()),
                Ok("分析文本".to_string()),
            ],
        );
        let secondary = ScriptedBackend::new("OpenAI", vec![Ok("不应调用".to_string())]);
        let mut analyzer = Analyzer::with_backends(
            Some(Box::new(primary.clone())),
            Some(Box::new(secondary.clone())),
            &test_config(4),
        );

        let text = analyzer.call_with_retry("prompt").await.unwrap();
        assert_eq!(text, "分析文本");
        assert_eq!(primary.models_seen().len(), 3);
        assert!(secondary.models_seen().is_empty());
    }

    #[tokio::test]
    async fn test_model_switch_happens_exactly_once() {
        // max_retries=4：第 2 次尝试（过半）失败后切换备选模型，此后不再切换
        let primary = ScriptedBackend::new(
            "Gemini",
            vec![
                Err("HTTP 429".to_string()),
                Err("HTTP 429".to_string()),
                Err("HTTP 429".to_string()),
                Err("HTTP 429".to_string()),
            ],
        );
        let mut analyzer =
            Analyzer::with_backends(Some(Box::new(primary.clone())), None, &test_config(4));

        let result = analyzer.call_with_retry("prompt").await;
        assert!(result.is_err());

        let models = primary.models_seen();
        assert_eq!(models.len(), 4);
        // 前三次主模型（切换发生在第 2 次失败之后），最后一次备选模型
        assert_eq!(models[0], "gemini-2.5-flash");
        assert_eq!(models[1], "gemini-2.5-flash");
        assert_eq!(models[2], "gemini-2.5-flash");
        assert_eq!(models[3], "gemini-2.0-flash");
        assert!(analyzer.using_fallback_model());
    }

    #[tokio::test]
    async fn test_model_switch_not_repeated_on_longer_runs() {
        let primary = ScriptedBackend::new(
            "Gemini",
            (0..6).map(|_| Err("HTTP 429".to_string())).collect(),
        );
        let mut analyzer =
            Analyzer::with_backends(Some(Box::new(primary.clone())), None, &test_config(6));

        let _ = analyzer.call_with_retry("prompt").await;
        let models = primary.models_seen();
        // 只发生一次切换：模型序列单调地从主模型变为备选模型
        let switches = models.windows(2).filter(|w| w[0] != w[1]).count();
        assert_eq!(switches, 1);
    }

    #[tokio::test]
    async fn test_provider_escalation_after_primary_exhausted() {
        let primary = ScriptedBackend::new(
            "Gemini",
            (0..4).map(|_| Err("HTTP 503".to_string())).collect(),
        );
        let secondary = ScriptedBackend::new("OpenAI", vec![Ok("备选响应".to_string())]);
        let mut analyzer = Analyzer::with_backends(
            Some(Box::new(primary.clone())),
            Some(Box::new(secondary.clone())),
            &test_config(4),
        );

        let text = analyzer.call_with_retry("prompt").await.unwrap();
        assert_eq!(text, "备选响应");
        assert_eq!(primary.models_seen().len(), 4);
        // 备选后端恰好一轮，且使用自己的模型
        assert_eq!(secondary.models_seen(), vec!["deepseek-chat".to_string()]);
    }

    #[tokio::test]
    async fn test_primary_error_preferred_when_both_fail() {
        let primary = ScriptedBackend::new(
            "Gemini",
            (0..4).map(|_| Err("primary boom".to_string())).collect(),
        );
        let secondary = ScriptedBackend::new(
            "OpenAI",
            (0..4).map(|_| Err("secondary boom".to_string())).collect(),
        );
        let mut analyzer = Analyzer::with_backends(
            Some(Box::new(primary)),
            Some(Box::new(secondary.clone())),
            &test_config(4),
        );

        let err = analyzer.call_with_retry("prompt").await.unwrap_err();
        assert!(err.to_string().contains("primary boom"));
        assert_eq!(secondary.models_seen().len(), 4);
    }

    #[tokio::test]
    async fn test_secondary_only_path() {
        let secondary = ScriptedBackend::new("OpenAI", vec![Ok("直接走备选".to_string())]);
        let mut analyzer =
            Analyzer::with_backends(None, Some(Box::new(secondary.clone())), &test_config(4));

        let text = analyzer.call_with_retry("prompt").await.unwrap();
        assert_eq!(text, "直接走备选");
        assert_eq!(secondary.models_seen().len(), 1);
    }

    #[tokio::test]
    async fn test_analyze_without_backend_returns_neutral_failure() {
        let mut analyzer = Analyzer::with_backends(None, None, &test_config(4));
        let result = analyzer.analyze(&context_for("600519"), None).await;

        assert!(!result.success);
        assert_eq!(result.sentiment_score, 50);
        assert_eq!(result.trend_prediction, "震荡");
        assert_eq!(result.operation_advice, "持有");
        assert_eq!(result.confidence_level, "低");
        assert_eq!(result.name, "贵州茅台");
        assert!(result.error_message.is_some());
    }

    #[tokio::test]
    async fn test_analyze_attaches_raw_response_and_search_flag() {
        let reply = r#"{"sentiment_score": 66, "trend_prediction": "看多"}"#;
        let primary = ScriptedBackend::new("Gemini", vec![Ok(reply.to_string())]);
        let mut analyzer =
            Analyzer::with_backends(Some(Box::new(primary)), None, &test_config(4));

        let result = analyzer
            .analyze(&context_for("600519"), Some("新闻内容"))
            .await;
        assert!(result.success);
        assert_eq!(result.sentiment_score, 66);
        assert_eq!(result.raw_response.as_deref(), Some(reply));
        assert!(result.search_performed);
    }

    #[tokio::test]
    async fn test_analyze_total_failure_truncates_message() {
        let long_err = "错".repeat(300);
        let primary = ScriptedBackend::new(
            "Gemini",
            (0..4).map(|_| Err(long_err.clone())).collect(),
        );
        let mut analyzer =
            Analyzer::with_backends(Some(Box::new(primary)), None, &test_config(4));

        let result = analyzer.analyze(&context_for("600519"), None).await;
        assert!(!result.success);
        // 摘要里的错误信息截断到 100 字符；error_message 保留完整文本
        let summary_err = result.analysis_summary.trim_start_matches("分析过程出错: ");
        assert_eq!(summary_err.chars().count(), 100);
        assert_eq!(result.error_message.as_deref(), Some(long_err.as_str()));
    }

    #[tokio::test]
    async fn test_batch_analyze_processes_sequentially() {
        let primary = ScriptedBackend::new(
            "Gemini",
            vec![
                Ok(r#"{"sentiment_score": 60}"#.to_string()),
                Ok(r#"{"sentiment_score": 40}"#.to_string()),
            ],
        );
        let mut analyzer =
            Analyzer::with_backends(Some(Box::new(primary)), None, &test_config(4));

        let contexts = vec![context_for("600519"), context_for("000001")];
        let results = analyzer.batch_analyze(&contexts, Duration::ZERO).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].sentiment_score, 60);
        assert_eq!(results[1].sentiment_score, 40);
    }
}
