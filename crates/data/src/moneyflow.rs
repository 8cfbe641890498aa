//! Capital-flow fetching: per-stock money flow and northbound (沪深港通)
//! flow, each with a Tushare Pro → AkShare fallback chain.
//!
//! Unit invariant: every monetary amount is stored in 万元. Tushare
//! already reports 万元; AkShare reports 元 and is divided by 10,000
//! exactly once at ingestion.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Local};
use reqwest::Client;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use insight_core::error::{InsightError, Result};
use insight_core::models::{north_trend_label, MoneyFlowData, NorthFlowSummary};
use insight_core::utils::safe_float;

use crate::throttle::RandomDelay;

type Row = Map<String, Value>;

// ── Market helpers ──────────────────────────────────────────────────

/// 600519 -> 600519.SH；首位 6/9/5 为沪市，其余为深市。
pub fn to_ts_code(code: &str) -> String {
    if code.starts_with('6') || code.starts_with('9') || code.starts_with('5') {
        format!("{code}.SH")
    } else {
        format!("{code}.SZ")
    }
}

/// 600519 -> "sh"，000001 -> "sz"。
pub fn market_prefix(code: &str) -> &'static str {
    if code.starts_with('6') || code.starts_with('9') || code.starts_with('5') {
        "sh"
    } else {
        "sz"
    }
}

/// Tushare surfaces subscription-tier problems only in the error text.
pub fn is_quota_error(message: &str) -> bool {
    message.contains("权限") || message.contains("积分")
}

// ── Source traits ───────────────────────────────────────────────────

#[async_trait]
pub trait MoneyFlowSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn try_fetch(&self, code: &str, trade_date: Option<&str>) -> Result<MoneyFlowData>;
}

#[async_trait]
pub trait NorthFlowSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn try_fetch(&self, code: &str, days: usize) -> Result<NorthFlowSummary>;
}

// ── Fallback chains ─────────────────────────────────────────────────

pub struct MoneyFlowFetcher {
    flow_sources: Vec<Box<dyn MoneyFlowSource>>,
    north_sources: Vec<Box<dyn NorthFlowSource>>,
}

impl MoneyFlowFetcher {
    pub fn new(
        tushare_token: &str,
        tushare_base: &str,
        akshare_base: &str,
        delay: RandomDelay,
    ) -> Self {
        let mut flow_sources: Vec<Box<dyn MoneyFlowSource>> = Vec::new();
        let mut north_sources: Vec<Box<dyn NorthFlowSource>> = Vec::new();

        if tushare_token.is_empty() {
            debug!("[资金流] Tushare Token 未配置，仅使用 AkShare");
        } else {
            let api = TushareApi::new(tushare_token, tushare_base);
            flow_sources.push(Box::new(TushareMoneyFlow::new(api.clone(), delay.clone())));
            north_sources.push(Box::new(TushareNorthFlow::new(api, delay.clone())));
        }
        flow_sources.push(Box::new(AkshareMoneyFlow::new(akshare_base, delay.clone())));
        north_sources.push(Box::new(AkshareNorthFlow::new(akshare_base, delay)));

        Self {
            flow_sources,
            north_sources,
        }
    }

    pub fn with_sources(
        flow_sources: Vec<Box<dyn MoneyFlowSource>>,
        north_sources: Vec<Box<dyn NorthFlowSource>>,
    ) -> Self {
        Self {
            flow_sources,
            north_sources,
        }
    }

    /// 个股资金流向；全部来源失败时返回 `None`。
    pub async fn fetch(&self, code: &str, trade_date: Option<&str>) -> Option<MoneyFlowData> {
        for source in &self.flow_sources {
            match source.try_fetch(code, trade_date).await {
                Ok(data) => {
                    info!("[资金流] {} 获取成功: {} (来源: {})", code, data.main_flow_summary(), data.data_source);
                    return Some(data);
                }
                Err(e) => {
                    let msg = e.to_string();
                    if is_quota_error(&msg) {
                        warn!("[资金流] {} 来源 {} 权限不足（需600积分）: {}", code, source.name(), msg);
                    } else {
                        warn!("[资金流] {} 来源 {} 获取失败: {}，尝试下一数据源", code, source.name(), msg);
                    }
                }
            }
        }
        None
    }

    /// 北向资金最近 N 日汇总；全部来源失败时返回 `None`。
    pub async fn fetch_north(&self, code: &str, days: usize) -> Option<NorthFlowSummary> {
        for source in &self.north_sources {
            match source.try_fetch(code, days).await {
                Ok(summary) => {
                    info!(
                        "[北向资金] {} 最近{}日: {}, 累计{:.2}亿元 (来源: {})",
                        code,
                        days,
                        summary.trend,
                        summary.total_net_amount / 10_000.0,
                        summary.data_source
                    );
                    return Some(summary);
                }
                Err(e) => {
                    let msg = e.to_string();
                    if is_quota_error(&msg) {
                        warn!("[北向资金] {} 来源 {} 权限不足: {}", code, source.name(), msg);
                    } else {
                        debug!("[北向资金] {} 来源 {} 获取失败: {}", code, source.name(), msg);
                    }
                }
            }
        }
        None
    }
}

// ── Tushare Pro ─────────────────────────────────────────────────────

#[derive(Clone)]
pub struct TushareApi {
    client: Client,
    token: String,
    base_url: String,
}

struct TushareResponse {
    fields: Vec<String>,
    items: Vec<Vec<Value>>,
}

impl TushareApi {
    pub fn new(token: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            token: token.to_string(),
            base_url: base_url.to_string(),
        }
    }

    async fn request(&self, api_name: &str, params: Value, fields: &str) -> Result<TushareResponse> {
        let body = json!({
            "api_name": api_name,
            "token": self.token,
            "params": params,
            "fields": fields,
        });

        debug!("[API调用] tushare.{}({})", api_name, params);

        let resp = self.client.post(&self.base_url).json(&body).send().await?;
        let value: Value = resp.json().await?;

        // Tushare 在 HTTP 200 里通过 code/msg 报告权限、积分等错误
        if let Some(code) = value.get("code").and_then(Value::as_i64) {
            if code != 0 {
                let msg = value
                    .get("msg")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error");
                return Err(InsightError::DataError(msg.to_string()));
            }
        }

        let data = value
            .get("data")
            .ok_or_else(|| InsightError::DataError("Tushare 响应缺少 data 字段".to_string()))?;

        let fields: Vec<String> = data
            .get("fields")
            .and_then(|f| serde_json::from_value(f.clone()).ok())
            .unwrap_or_default();
        let items: Vec<Vec<Value>> = data
            .get("items")
            .and_then(|i| serde_json::from_value(i.clone()).ok())
            .unwrap_or_default();

        debug!("[API返回] tushare.{}: {} 条记录", api_name, items.len());
        Ok(TushareResponse { fields, items })
    }
}

/// Positional lookup into Tushare's fields/items row layout. Missing
/// columns and null cells both read as `None`.
struct FieldIndex {
    names: Vec<String>,
}

impl FieldIndex {
    fn new(fields: &[String]) -> Self {
        Self {
            names: fields.to_vec(),
        }
    }

    fn get_f64(&self, row: &[Value], name: &str) -> Option<f64> {
        let idx = self.names.iter().position(|n| n == name)?;
        row.get(idx).and_then(safe_float)
    }

    fn get_str(&self, row: &[Value], name: &str) -> Option<String> {
        let idx = self.names.iter().position(|n| n == name)?;
        row.get(idx)
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

pub struct TushareMoneyFlow {
    api: TushareApi,
    delay: RandomDelay,
}

impl TushareMoneyFlow {
    pub fn new(api: TushareApi, delay: RandomDelay) -> Self {
        Self { api, delay }
    }
}

const MONEYFLOW_FIELDS: &str = "ts_code,trade_date,\
    buy_sm_amount,sell_sm_amount,buy_md_amount,sell_md_amount,\
    buy_lg_amount,sell_lg_amount,buy_elg_amount,sell_elg_amount,\
    net_mf_amount";

#[async_trait]
impl MoneyFlowSource for TushareMoneyFlow {
    fn name(&self) -> &'static str {
        "tushare"
    }

    async fn try_fetch(&self, code: &str, trade_date: Option<&str>) -> Result<MoneyFlowData> {
        self.delay.wait().await;

        let ts_code = to_ts_code(code);
        // 未指定日期时拉最近一周，保证跨周末也能取到交易日数据
        let params = match trade_date {
            Some(date) => json!({ "ts_code": ts_code, "trade_date": date }),
            None => {
                let end = Local::now().format("%Y%m%d").to_string();
                let start = (Local::now() - ChronoDuration::days(7))
                    .format("%Y%m%d")
                    .to_string();
                json!({ "ts_code": ts_code, "start_date": start, "end_date": end })
            }
        };

        let resp = self.api.request("moneyflow", params, MONEYFLOW_FIELDS).await?;
        parse_tushare_flow(code, &resp.fields, &resp.items)
    }
}

/// Tushare 行情按日期倒序返回，第一行为最新交易日。金额单位已是万元。
fn parse_tushare_flow(code: &str, fields: &[String], items: &[Vec<Value>]) -> Result<MoneyFlowData> {
    let latest = items
        .first()
        .ok_or_else(|| InsightError::DataError("无资金流数据".to_string()))?;
    let idx = FieldIndex::new(fields);

    let mut data = MoneyFlowData::new(code, "tushare_moneyflow");
    data.trade_date = idx.get_str(latest, "trade_date").unwrap_or_default();

    data.buy_sm_amount = idx.get_f64(latest, "buy_sm_amount");
    data.sell_sm_amount = idx.get_f64(latest, "sell_sm_amount");
    data.buy_md_amount = idx.get_f64(latest, "buy_md_amount");
    data.sell_md_amount = idx.get_f64(latest, "sell_md_amount");
    data.buy_lg_amount = idx.get_f64(latest, "buy_lg_amount");
    data.sell_lg_amount = idx.get_f64(latest, "sell_lg_amount");
    data.buy_elg_amount = idx.get_f64(latest, "buy_elg_amount");
    data.sell_elg_amount = idx.get_f64(latest, "sell_elg_amount");
    data.net_mf_amount = idx.get_f64(latest, "net_mf_amount");

    // 分单净额 = 买入 - 卖出
    data.net_mf_sm = tier_net(data.buy_sm_amount, data.sell_sm_amount);
    data.net_mf_md = tier_net(data.buy_md_amount, data.sell_md_amount);
    data.net_mf_lg = tier_net(data.buy_lg_amount, data.sell_lg_amount);
    data.net_mf_elg = tier_net(data.buy_elg_amount, data.sell_elg_amount);

    // 主力 = 大单 + 特大单
    let net_lg = data.net_mf_lg.unwrap_or(0.0);
    let net_elg = data.net_mf_elg.unwrap_or(0.0);
    data.main_net_inflow = Some(net_lg + net_elg);

    // 成交额字段存在时才计算占比（amount 单位千元，主力净额万元）
    if let Some(amount) = idx.get_f64(latest, "amount") {
        if amount > 0.0 {
            data.main_net_inflow_rate = Some((net_lg + net_elg) * 10.0 / amount * 100.0);
        }
    }

    Ok(data)
}

fn tier_net(buy: Option<f64>, sell: Option<f64>) -> Option<f64> {
    match (buy, sell) {
        (Some(b), Some(s)) => Some(b - s),
        _ => None,
    }
}

// ── AkShare（免费备选，数据来自东方财富网） ──────────────────────────

pub struct AkshareMoneyFlow {
    client: Client,
    base_url: String,
    delay: RandomDelay,
}

impl AkshareMoneyFlow {
    pub fn new(base_url: &str, delay: RandomDelay) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            delay,
        }
    }
}

#[async_trait]
impl MoneyFlowSource for AkshareMoneyFlow {
    fn name(&self) -> &'static str {
        "akshare"
    }

    async fn try_fetch(&self, code: &str, _trade_date: Option<&str>) -> Result<MoneyFlowData> {
        self.delay.wait().await;

        let market = market_prefix(code);
        let url = format!("{}/api/public/stock_individual_fund_flow", self.base_url);
        debug!("[API调用] GET {} stock={} market={}", url, code, market);

        let resp = self
            .client
            .get(&url)
            .query(&[("stock", code), ("market", market)])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(InsightError::DataError(format!("HTTP {status}")));
        }

        let rows: Vec<Row> = resp.json().await?;
        parse_akshare_flow_rows(code, &rows)
    }
}

/// AkShare 个股资金流列名固定为中文；净额单位是元，统一除以 10,000
/// 转为万元。
fn parse_akshare_flow_rows(code: &str, rows: &[Row]) -> Result<MoneyFlowData> {
    let latest = rows
        .first()
        .ok_or_else(|| InsightError::DataError("AkShare 返回空数据".to_string()))?;

    let yuan_to_wan = |key: &str| -> Option<f64> {
        latest.get(key).and_then(safe_float).map(|v| v / 10_000.0)
    };

    let mut data = MoneyFlowData::new(code, "akshare_individual_flow");
    data.trade_date = latest
        .get("日期")
        .and_then(Value::as_str)
        .map(|d| d.replace('-', ""))
        .unwrap_or_default();

    let main = yuan_to_wan("主力净流入-净额");
    data.net_mf_elg = yuan_to_wan("超大单净流入-净额");
    data.net_mf_lg = yuan_to_wan("大单净流入-净额");
    data.net_mf_md = yuan_to_wan("中单净流入-净额");
    data.net_mf_sm = yuan_to_wan("小单净流入-净额");
    data.net_mf_amount = main;
    data.main_net_inflow = main;
    // 占比本身就是百分比，不做单位换算
    data.main_net_inflow_rate = latest.get("主力净流入-净占比").and_then(safe_float);

    Ok(data)
}

// ── Northbound: Tushare ─────────────────────────────────────────────

pub struct TushareNorthFlow {
    api: TushareApi,
    delay: RandomDelay,
}

impl TushareNorthFlow {
    pub fn new(api: TushareApi, delay: RandomDelay) -> Self {
        Self { api, delay }
    }
}

#[async_trait]
impl NorthFlowSource for TushareNorthFlow {
    fn name(&self) -> &'static str {
        "tushare"
    }

    async fn try_fetch(&self, code: &str, days: usize) -> Result<NorthFlowSummary> {
        self.delay.wait().await;

        let ts_code = to_ts_code(code);
        // 日历日按两倍窗口取，保证覆盖足够多的交易日
        let end = Local::now().format("%Y%m%d").to_string();
        let start = (Local::now() - ChronoDuration::days(days as i64 * 2))
            .format("%Y%m%d")
            .to_string();
        let params = json!({ "ts_code": ts_code, "start_date": start, "end_date": end });

        let resp = self
            .api
            .request("moneyflow_hsgt", params, "trade_date,net_amount")
            .await?;
        parse_tushare_north(code, days, &resp.fields, &resp.items)
    }
}

fn parse_tushare_north(
    code: &str,
    days: usize,
    fields: &[String],
    items: &[Vec<Value>],
) -> Result<NorthFlowSummary> {
    if items.is_empty() {
        return Err(InsightError::DataError("无北向资金数据".to_string()));
    }
    let idx = FieldIndex::new(fields);

    // 倒序序列，最近 N 条在前
    let window = &items[..days.min(items.len())];
    let amounts: Vec<f64> = window
        .iter()
        .filter_map(|row| idx.get_f64(row, "net_amount"))
        .collect();
    if amounts.is_empty() {
        return Err(InsightError::DataError("net_amount 字段缺失".to_string()));
    }

    let total: f64 = amounts.iter().sum();
    let avg = total / amounts.len() as f64;

    Ok(NorthFlowSummary {
        code: code.to_string(),
        days,
        total_net_amount: total,
        avg_net_amount: avg,
        trend: north_trend_label(total).to_string(),
        data_source: "tushare_hsgt".to_string(),
    })
}

// ── Northbound: AkShare（持股变化近似法） ────────────────────────────

pub struct AkshareNorthFlow {
    client: Client,
    base_url: String,
    delay: RandomDelay,
}

impl AkshareNorthFlow {
    pub fn new(base_url: &str, delay: RandomDelay) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            delay,
        }
    }
}

#[async_trait]
impl NorthFlowSource for AkshareNorthFlow {
    fn name(&self) -> &'static str {
        "akshare"
    }

    async fn try_fetch(&self, code: &str, days: usize) -> Result<NorthFlowSummary> {
        self.delay.wait().await;

        let url = format!("{}/api/public/stock_hsgt_individual_em", self.base_url);
        debug!("[API调用] GET {} symbol={}", url, code);

        let resp = self.client.get(&url).query(&[("symbol", code)]).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(InsightError::DataError(format!("HTTP {status}")));
        }

        let rows: Vec<Row> = resp.json().await?;
        if rows.is_empty() {
            // 不在沪深港通范围内的股票查不到持仓记录
            return Err(InsightError::DataError("可能不在沪深港通范围内".to_string()));
        }
        parse_akshare_north_rows(code, days, &rows)
    }
}

/// 该接口只给持股数变化，不给成交金额；用 持股数变化 × 收盘价 重建
/// 近似净流入（元），再转万元。
fn parse_akshare_north_rows(code: &str, days: usize, rows: &[Row]) -> Result<NorthFlowSummary> {
    let window = &rows[..days.min(rows.len())];

    let mut total_yuan = 0.0;
    for row in window {
        let share_change = row.get("北上资金-持股数变化").and_then(safe_float);
        let close = row.get("收盘价").and_then(safe_float);
        if let (Some(change), Some(price)) = (share_change, close) {
            total_yuan += change * price;
        }
    }

    let total = total_yuan / 10_000.0;
    let avg = if window.is_empty() {
        0.0
    } else {
        total / window.len() as f64
    };

    Ok(NorthFlowSummary {
        code: code.to_string(),
        days,
        total_net_amount: total,
        avg_net_amount: avg,
        trend: north_trend_label(total).to_string(),
        data_source: "akshare_hsgt".to_string(),
    })
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows_from(value: Value) -> Vec<Row> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_market_mapping() {
        assert_eq!(to_ts_code("600519"), "600519.SH");
        assert_eq!(to_ts_code("900905"), "900905.SH");
        assert_eq!(to_ts_code("510300"), "510300.SH");
        assert_eq!(to_ts_code("000001"), "000001.SZ");
        assert_eq!(to_ts_code("300750"), "300750.SZ");

        assert_eq!(market_prefix("600519"), "sh");
        assert_eq!(market_prefix("002594"), "sz");
    }

    #[test]
    fn test_is_quota_error() {
        assert!(is_quota_error("抱歉，您没有权限访问该接口"));
        assert!(is_quota_error("积分不足，需600积分"));
        assert!(!is_quota_error("connection timed out"));
    }

    #[test]
    fn test_parse_tushare_flow() {
        let fields: Vec<String> = [
            "ts_code",
            "trade_date",
            "buy_lg_amount",
            "sell_lg_amount",
            "buy_elg_amount",
            "sell_elg_amount",
            "net_mf_amount",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let items = vec![vec![
            json!("600519.SH"),
            json!("20250115"),
            json!(30_000.0),
            json!(20_000.0),
            json!(18_000.0),
            json!(8_000.0),
            json!(15_000.0),
        ]];

        let data = parse_tushare_flow("600519", &fields, &items).unwrap();
        assert_eq!(data.trade_date, "20250115");
        assert_eq!(data.net_mf_lg, Some(10_000.0));
        assert_eq!(data.net_mf_elg, Some(10_000.0));
        // 主力 = 大单净额 + 特大单净额
        assert_eq!(data.main_net_inflow, Some(20_000.0));
        assert_eq!(data.data_source, "tushare_moneyflow");
        // amount 字段不存在时不计算占比
        assert_eq!(data.main_net_inflow_rate, None);
    }

    #[test]
    fn test_parse_tushare_flow_rate_with_amount() {
        let fields: Vec<String> = ["trade_date", "buy_lg_amount", "sell_lg_amount", "amount"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        // 主力净额 1000万元 = 10000千元，成交额 100000千元 -> 10%
        let items = vec![vec![
            json!("20250115"),
            json!(3_000.0),
            json!(2_000.0),
            json!(100_000.0),
        ]];
        let data = parse_tushare_flow("600519", &fields, &items).unwrap();
        assert!((data.main_net_inflow_rate.unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_akshare_flow_converts_yuan_to_wan() {
        let rows = rows_from(json!([{
            "日期": "2025-01-15",
            "主力净流入-净额": 250_000_000.0,
            "主力净流入-净占比": 12.5,
            "超大单净流入-净额": 150_000_000.0,
            "大单净流入-净额": 100_000_000.0,
            "中单净流入-净额": -30_000_000.0,
            "小单净流入-净额": -70_000_000.0
        }]));

        let data = parse_akshare_flow_rows("600519", &rows).unwrap();
        // 元 -> 万元，且只换算一次
        assert_eq!(data.main_net_inflow, Some(25_000.0));
        assert_eq!(data.net_mf_elg, Some(15_000.0));
        assert_eq!(data.net_mf_lg, Some(10_000.0));
        assert_eq!(data.net_mf_md, Some(-3_000.0));
        assert_eq!(data.net_mf_sm, Some(-7_000.0));
        // 占比不换算
        assert_eq!(data.main_net_inflow_rate, Some(12.5));
        assert_eq!(data.trade_date, "20250115");
        assert_eq!(data.data_source, "akshare_individual_flow");
    }

    #[test]
    fn test_parse_tushare_north_window() {
        let fields: Vec<String> = ["trade_date", "net_amount"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let items: Vec<Vec<Value>> = (0..8)
            .map(|i| vec![json!(format!("2025011{i}")), json!(4_000.0)])
            .collect();

        let summary = parse_tushare_north("600519", 5, &fields, &items).unwrap();
        assert_eq!(summary.days, 5);
        // 只取最近5条：5 × 4000 = 20000万元 = 2亿 -> 持续流入
        assert!((summary.total_net_amount - 20_000.0).abs() < 1e-9);
        assert!((summary.avg_net_amount - 4_000.0).abs() < 1e-9);
        assert_eq!(summary.trend, "持续流入");
    }

    #[test]
    fn test_parse_akshare_north_reconstruction() {
        // 持股数变化 × 收盘价 ≈ 资金变化（元），再转万元
        let rows = rows_from(json!([
            {"日期": "2025-01-15", "收盘价": 100.0, "北上资金-持股数变化": 2_000_000.0},
            {"日期": "2025-01-14", "收盘价": 98.0, "北上资金-持股数变化": -1_000_000.0},
            {"日期": "2025-01-13", "收盘价": 99.0, "北上资金-持股数变化": 0.0}
        ]));

        let summary = parse_akshare_north_rows("600519", 5, &rows).unwrap();
        // (2e6*100 - 1e6*98) / 1e4 = 10200万元
        assert!((summary.total_net_amount - 10_200.0).abs() < 1e-9);
        assert_eq!(summary.trend, "持续流入");
        assert_eq!(summary.data_source, "akshare_hsgt");
    }

    // ── Fallback chain ──────────────────────────────────────────────

    struct QuotaDenied;

    #[async_trait]
    impl MoneyFlowSource for QuotaDenied {
        fn name(&self) -> &'static str {
            "quota_denied"
        }
        async fn try_fetch(&self, _code: &str, _date: Option<&str>) -> Result<MoneyFlowData> {
            Err(InsightError::DataError("抱歉，您的积分不足".to_string()))
        }
    }

    struct FixedFlow;

    #[async_trait]
    impl MoneyFlowSource for FixedFlow {
        fn name(&self) -> &'static str {
            "fixed"
        }
        async fn try_fetch(&self, code: &str, _date: Option<&str>) -> Result<MoneyFlowData> {
            let mut data = MoneyFlowData::new(code, "fixed_flow");
            data.main_net_inflow = Some(5_000.0);
            Ok(data)
        }
    }

    #[tokio::test]
    async fn test_quota_error_falls_through() {
        // 权限类错误不是终止性失败，必须继续尝试下一数据源
        let fetcher =
            MoneyFlowFetcher::with_sources(vec![Box::new(QuotaDenied), Box::new(FixedFlow)], vec![]);
        let data = fetcher.fetch("600519", None).await.unwrap();
        assert_eq!(data.data_source, "fixed_flow");
    }

    #[tokio::test]
    async fn test_all_sources_fail_yields_none() {
        let fetcher = MoneyFlowFetcher::with_sources(vec![Box::new(QuotaDenied)], vec![]);
        assert!(fetcher.fetch("600519", None).await.is_none());
        assert!(fetcher.fetch_north("600519", 5).await.is_none());
    }
}
