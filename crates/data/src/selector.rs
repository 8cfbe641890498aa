//! Dynamic stock selection from a live market snapshot.
//!
//! Both selectors hit a single HTTP endpoint directly, so transient
//! network failures are retried with exponential backoff. Exhausted
//! retries or a malformed payload yield an empty list; callers must
//! read that as "selection unavailable", never as "market is empty".

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{error, info, warn};

use insight_core::error::{InsightError, Result};
use insight_core::utils::format_amount;

#[derive(Debug, Clone, Deserialize)]
pub struct SpotRow {
    #[serde(alias = "代码")]
    pub code: String,
    #[serde(alias = "名称")]
    pub name: String,
    #[serde(alias = "最新价", default)]
    pub price: Option<f64>,
    #[serde(alias = "涨跌幅", default)]
    pub pct_chg: Option<f64>,
    #[serde(alias = "成交额", default)]
    pub amount: Option<f64>,
}

pub struct StockSelector {
    client: Client,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl StockSelector {
    pub fn new(base_url: &str, max_retries: u32, base_delay: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: max_retries.max(1),
            base_delay,
        }
    }

    /// A股当日成交额前 N 只；失败时返回空列表。
    pub async fn top_by_volume(&self, n: usize) -> Vec<String> {
        info!("🔍 正在获取A股成交额前{}只股票...", n);
        match self.fetch_spot().await {
            Ok(rows) => {
                let picked = rank_by_amount(rows, n);
                for (code, name, amount) in &picked {
                    info!("  {} {} 成交额: {}", code, name, format_amount(*amount));
                }
                picked.into_iter().map(|(code, _, _)| code).collect()
            }
            Err(e) => {
                error!("❌ 获取动态选股失败: {}", e);
                Vec::new()
            }
        }
    }

    /// A股当日涨幅前 N 只，可排除 ST 股；失败时返回空列表。
    pub async fn top_by_change(&self, n: usize, exclude_st: bool) -> Vec<String> {
        info!("🔍 正在获取A股涨幅前{}只股票...", n);
        match self.fetch_spot().await {
            Ok(rows) => {
                let picked = rank_by_change(rows, n, exclude_st);
                for (code, name, pct) in &picked {
                    info!("  {} {} 涨跌幅: {:.2}%", code, name, pct.unwrap_or(0.0));
                }
                picked.into_iter().map(|(code, _, _)| code).collect()
            }
            Err(e) => {
                error!("❌ 获取涨幅排名失败: {}", e);
                Vec::new()
            }
        }
    }

    /// Snapshot fetch with bounded retries. Only network-class failures
    /// are retried; a malformed payload fails immediately.
    async fn fetch_spot(&self) -> Result<Vec<SpotRow>> {
        let url = format!("{}/api/public/stock_zh_a_spot_em", self.base_url);
        let mut last_err = InsightError::NetworkError("未发起请求".to_string());

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let delay = retry_backoff(attempt, self.base_delay);
                info!("[选股] 第 {} 次重试，等待 {:.1} 秒...", attempt + 1, delay.as_secs_f64());
                tokio::time::sleep(delay).await;
            }

            match self.try_fetch_spot(&url).await {
                Ok(rows) => return Ok(rows),
                Err(e @ InsightError::NetworkError(_)) => {
                    warn!("[选股] 网络错误，第 {}/{} 次尝试: {}", attempt + 1, self.max_retries, e);
                    last_err = e;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err)
    }

    async fn try_fetch_spot(&self, url: &str) -> Result<Vec<SpotRow>> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            // 服务端抖动按网络类失败处理，进入重试
            return Err(InsightError::NetworkError(format!("HTTP {status}")));
        }
        let rows: Vec<SpotRow> = resp
            .json()
            .await
            .map_err(|e| InsightError::DataError(format!("行情数据解析失败: {e}")))?;
        if rows.is_empty() {
            return Err(InsightError::DataError("未获取到A股行情数据".to_string()));
        }
        Ok(rows)
    }
}

fn retry_backoff(attempt: u32, base: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    (base * factor).min(Duration::from_secs(60))
}

// ── Ranking ─────────────────────────────────────────────────────────

fn rank_by_amount(mut rows: Vec<SpotRow>, n: usize) -> Vec<(String, String, Option<f64>)> {
    rows.sort_by(|a, b| {
        b.amount
            .unwrap_or(0.0)
            .partial_cmp(&a.amount.unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    rows.truncate(n);
    rows.into_iter().map(|r| (r.code, r.name, r.amount)).collect()
}

fn rank_by_change(
    mut rows: Vec<SpotRow>,
    n: usize,
    exclude_st: bool,
) -> Vec<(String, String, Option<f64>)> {
    if exclude_st {
        rows.retain(|r| !r.name.contains("ST"));
    }
    rows.sort_by(|a, b| {
        b.pct_chg
            .unwrap_or(f64::MIN)
            .partial_cmp(&a.pct_chg.unwrap_or(f64::MIN))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    rows.truncate(n);
    rows.into_iter().map(|r| (r.code, r.name, r.pct_chg)).collect()
}

// ── Tests ───────────────────────────────────────────────────────────
