//! Financial-indicator fetching with multi-source fallback.
//!
//! Source order: 东方财富 (three endpoints, richest first) then 新浪财经
//! (reserved). First source to produce a record wins; a record is never
//! assembled from two sources.

use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use insight_core::error::{InsightError, Result};
use insight_core::models::FinancialIndicators;
use insight_core::utils::safe_float;

use crate::throttle::RandomDelay;

type Row = Map<String, Value>;

/// One provider's attempt at producing a financial snapshot.
#[async_trait]
pub trait FinancialSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn try_fetch(&self, code: &str) -> Result<FinancialIndicators>;
}

// ── Fallback chain ──────────────────────────────────────────────────

pub struct FinancialFetcher {
    sources: Vec<Box<dyn FinancialSource>>,
}

impl FinancialFetcher {
    pub fn new(akshare_base: &str, delay: RandomDelay) -> Self {
        Self {
            sources: vec![
                Box::new(EastmoneyFinancial::new(akshare_base, delay)),
                Box::new(SinaFinancial),
            ],
        }
    }

    pub fn with_sources(sources: Vec<Box<dyn FinancialSource>>) -> Self {
        Self { sources }
    }

    /// Try each source in priority order; `None` when all fail.
    pub async fn fetch(&self, code: &str) -> Option<FinancialIndicators> {
        for source in &self.sources {
            match source.try_fetch(code).await {
                Ok(mut indicators) => {
                    indicators.update_time =
                        Some(Local::now().format("%Y-%m-%d %H:%M:%S").to_string());
                    info!(
                        "[财务数据] {} 获取成功: ROE={:?}%, 营收增长={:?}%, 利润增长={:?}% (来源: {})",
                        code,
                        indicators.roe,
                        indicators.revenue_growth,
                        indicators.profit_growth,
                        indicators.data_source
                    );
                    return Some(indicators);
                }
                Err(e) => {
                    debug!("[财务数据] {} 来源 {} 失败: {}，尝试下一数据源", code, source.name(), e);
                }
            }
        }
        warn!("[财务数据] {} 所有数据源均失败", code);
        None
    }
}

// ── 东方财富 ─────────────────────────────────────────────────────────

pub struct EastmoneyFinancial {
    client: Client,
    base_url: String,
    delay: RandomDelay,
}

impl EastmoneyFinancial {
    pub fn new(base_url: &str, delay: RandomDelay) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            delay,
        }
    }

    async fn get_rows(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Vec<Row>> {
        let url = format!("{}/api/public/{}", self.base_url, endpoint);
        debug!("[API调用] GET {} {:?}", url, query);

        let resp = self.client.get(&url).query(query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(InsightError::DataError(format!("HTTP {status}")));
        }

        let rows: Vec<Row> = resp.json().await?;
        if rows.is_empty() {
            return Err(InsightError::DataError("返回空数据".to_string()));
        }
        debug!("[API返回] {}: {} 条记录", endpoint, rows.len());
        Ok(rows)
    }

    /// 同花顺财务摘要（数据最全）
    async fn fetch_abstract(&self, code: &str) -> Result<FinancialIndicators> {
        let rows = self
            .get_rows("stock_financial_abstract_ths", &[("symbol", code)])
            .await?;
        parse_abstract_rows(code, &rows)
    }

    /// 财务分析指标
    async fn fetch_indicator(&self, code: &str) -> Result<FinancialIndicators> {
        let rows = self
            .get_rows("stock_financial_analysis_indicator", &[("symbol", code)])
            .await?;
        parse_indicator_rows(code, &rows)
    }

    /// 利润表（通过近两期比较计算增长率）
    async fn fetch_income(&self, code: &str) -> Result<FinancialIndicators> {
        let rows = self
            .get_rows(
                "stock_financial_report_sina",
                &[("stock", code), ("symbol", "利润表")],
            )
            .await?;
        parse_income_rows(code, &rows)
    }
}

#[async_trait]
impl FinancialSource for EastmoneyFinancial {
    fn name(&self) -> &'static str {
        "eastmoney"
    }

    async fn try_fetch(&self, code: &str) -> Result<FinancialIndicators> {
        info!("[财务数据] 获取 {} 的财务指标...", code);

        self.delay.wait().await;
        match self.fetch_abstract(code).await {
            Ok(indicators) => return Ok(indicators),
            Err(e) => debug!("[财务数据] 财务摘要接口失败: {}", e),
        }

        self.delay.wait().await;
        match self.fetch_indicator(code).await {
            Ok(indicators) => return Ok(indicators),
            Err(e) => debug!("[财务数据] 财务分析指标接口失败: {}", e),
        }

        self.delay.wait().await;
        match self.fetch_income(code).await {
            Ok(indicators) => return Ok(indicators),
            Err(e) => debug!("[财务数据] 利润表接口失败: {}", e),
        }

        Err(InsightError::DataError("所有东财接口均失败".to_string()))
    }
}

// ── 新浪财经（备选，接口保留） ───────────────────────────────────────

pub struct SinaFinancial;

#[async_trait]
impl FinancialSource for SinaFinancial {
    fn name(&self) -> &'static str {
        "sina"
    }

    async fn try_fetch(&self, _code: &str) -> Result<FinancialIndicators> {
        // TODO: 接入新浪财经财务指标接口
        Err(InsightError::DataError("新浪财经接口暂未实现".to_string()))
    }
}

// ── Row parsing ─────────────────────────────────────────────────────

/// First alias present in the row wins; its value is then parsed
/// leniently (unparseable values still stop the probe).
fn pick_value(row: &Row, aliases: &[&str]) -> Option<f64> {
    aliases
        .iter()
        .find_map(|key| row.get(*key))
        .and_then(safe_float)
}

fn pick_str(row: &Row, key: &str) -> Option<String> {
    row.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// 同花顺摘要按时间升序返回，最后一条为最新一期。
fn parse_abstract_rows(code: &str, rows: &[Row]) -> Result<FinancialIndicators> {
    let latest = rows
        .last()
        .ok_or_else(|| InsightError::DataError("返回空数据".to_string()))?;

    let mut indicators = FinancialIndicators::new(code, "ths_abstract");
    indicators.report_date = pick_str(latest, "报告期");
    indicators.roe = pick_value(latest, &["净资产收益率"]);
    indicators.revenue_growth = pick_value(latest, &["营业总收入同比增长率"]);
    indicators.profit_growth = pick_value(latest, &["净利润同比增长率"]);
    indicators.gross_profit_margin = pick_value(latest, &["销售毛利率"]);
    indicators.net_profit_margin = pick_value(latest, &["销售净利率"]);
    Ok(indicators)
}

/// 财务分析指标按时间倒序返回，第一条为最新一期。厂商字段名随版本
/// 漂移，按别名列表逐个探测。
fn parse_indicator_rows(code: &str, rows: &[Row]) -> Result<FinancialIndicators> {
    let latest = rows
        .first()
        .ok_or_else(|| InsightError::DataError("返回空数据".to_string()))?;

    let mut indicators = FinancialIndicators::new(code, "eastmoney_indicator");
    indicators.report_date = pick_str(latest, "日期");
    indicators.roe = pick_value(latest, &["净资产收益率", "ROE", "加权平均净资产收益率"]);
    indicators.revenue_growth = pick_value(
        latest,
        &["营业总收入同比增长", "营业收入同比增长率", "营业收入增长率"],
    );
    indicators.profit_growth =
        pick_value(latest, &["净利润同比增长", "净利润同比增长率", "净利润增长率"]);

    if indicators.has_any_metric() {
        Ok(indicators)
    } else {
        Err(InsightError::DataError("指标字段均缺失".to_string()))
    }
}

/// 利润表路径：取最近两期比较计算同比增长率。
fn parse_income_rows(code: &str, rows: &[Row]) -> Result<FinancialIndicators> {
    if rows.len() < 2 {
        return Err(InsightError::DataError("利润表记录不足两期".to_string()));
    }
    let current = &rows[0];
    let previous = &rows[1];

    let mut indicators = FinancialIndicators::new(code, "sina_income");
    indicators.report_date = pick_str(current, "报告期");
    indicators.revenue_growth = period_growth(current, previous, &["营业总收入", "营业收入"]);
    indicators.profit_growth =
        period_growth(current, previous, &["净利润", "归属于母公司股东的净利润"]);

    if indicators.revenue_growth.is_some() || indicators.profit_growth.is_some() {
        Ok(indicators)
    } else {
        Err(InsightError::DataError("无法从利润表计算增长率".to_string()))
    }
}

/// `(current - previous) / previous * 100`, only when `previous > 0`
/// (guards divide-by-zero and sign inversion on loss-making base
/// periods). Probes alias pairs until one yields a valid growth.
fn period_growth(current: &Row, previous: &Row, keys: &[&str]) -> Option<f64> {
    for key in keys {
        let cur = current.get(*key).and_then(safe_float);
        let prev = previous.get(*key).and_then(safe_float);
        if let (Some(cur), Some(prev)) = (cur, prev) {
            if prev > 0.0 {
                return Some((cur - prev) / prev * 100.0);
            }
        }
    }
    None
}

// ── Tests ───────────────────────────────────────────────────────────
