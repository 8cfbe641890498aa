use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Financial Indicators ─────────────────────────────────────────────

/// One stock's fundamental snapshot.
///
/// Numeric fields are `None` when the provider had no usable value;
/// sentinel strings ("--" etc.) never survive ingestion. `data_source`
/// always names the provider that produced the record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinancialIndicators {
    pub code: String,
    #[serde(default)]
    pub name: String,

    // 盈利能力
    pub roe: Option<f64>,
    pub roa: Option<f64>,
    pub gross_profit_margin: Option<f64>,
    pub net_profit_margin: Option<f64>,

    // 增长能力
    pub revenue_growth: Option<f64>,
    pub profit_growth: Option<f64>,
    pub revenue_growth_3y: Option<f64>,
    pub profit_growth_3y: Option<f64>,

    // 估值
    pub pe_ttm: Option<f64>,
    pub pb: Option<f64>,
    pub ps_ttm: Option<f64>,

    // 财务健康
    pub debt_to_asset: Option<f64>,
    pub current_ratio: Option<f64>,

    // 元数据
    pub report_date: Option<String>,
    pub update_time: Option<String>,
    pub data_source: String,
}

impl FinancialIndicators {
    pub fn new(code: &str, data_source: &str) -> Self {
        Self {
            code: code.to_string(),
            data_source: data_source.to_string(),
            ..Default::default()
        }
    }

    /// True when at least one of the headline fields was populated.
    pub fn has_any_metric(&self) -> bool {
        self.roe.is_some() || self.revenue_growth.is_some() || self.profit_growth.is_some()
    }
}

// ── Money Flow ───────────────────────────────────────────────────────

/// One stock's capital-flow snapshot for a trade date.
///
/// Every monetary amount is normalized to 万元 (ten-thousand yuan) at
/// ingestion, whichever provider produced it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MoneyFlowData {
    pub code: String,
    #[serde(default)]
    pub name: String,
    /// 交易日期 YYYYMMDD
    #[serde(default)]
    pub trade_date: String,

    // 分单买卖金额（万元）
    pub buy_sm_amount: Option<f64>,
    pub sell_sm_amount: Option<f64>,
    pub buy_md_amount: Option<f64>,
    pub sell_md_amount: Option<f64>,
    pub buy_lg_amount: Option<f64>,
    pub sell_lg_amount: Option<f64>,
    pub buy_elg_amount: Option<f64>,
    pub sell_elg_amount: Option<f64>,

    // 净流入（万元）
    pub net_mf_amount: Option<f64>,
    pub net_mf_sm: Option<f64>,
    pub net_mf_md: Option<f64>,
    pub net_mf_lg: Option<f64>,
    pub net_mf_elg: Option<f64>,

    // 主力资金（特大单+大单）
    pub main_net_inflow: Option<f64>,
    pub main_net_inflow_rate: Option<f64>,

    // 北向资金
    pub north_net_inflow: Option<f64>,
    pub north_buy: Option<f64>,
    pub north_sell: Option<f64>,

    pub data_source: String,
}

impl MoneyFlowData {
    pub fn new(code: &str, data_source: &str) -> Self {
        Self {
            code: code.to_string(),
            data_source: data_source.to_string(),
            ..Default::default()
        }
    }

    /// One-line summary of the main-force flow, in 亿元 above ±1亿.
    pub fn main_flow_summary(&self) -> String {
        let Some(inflow) = self.main_net_inflow else {
            return "数据缺失".to_string();
        };
        let inflow_yi = inflow / 10_000.0;
        if inflow_yi > 1.0 {
            format!("主力净流入 {:.2}亿元", inflow_yi)
        } else if inflow_yi > 0.0 {
            format!("主力小幅流入 {:.0}万元", inflow)
        } else if inflow_yi > -1.0 {
            format!("主力小幅流出 {:.0}万元", inflow.abs())
        } else {
            format!("主力净流出 {:.2}亿元", inflow_yi.abs())
        }
    }

    /// Coarse trend label on ±0.5亿 thresholds.
    pub fn trend_label(&self) -> &'static str {
        let Some(inflow) = self.main_net_inflow else {
            return "未知";
        };
        let inflow_yi = inflow / 10_000.0;
        if inflow_yi > 0.5 {
            "持续流入"
        } else if inflow_yi > 0.0 {
            "小幅流入"
        } else if inflow_yi > -0.5 {
            "小幅流出"
        } else {
            "持续流出"
        }
    }
}

// ── Northbound Flow ──────────────────────────────────────────────────

/// Northbound (沪深港通) flow summarized over a recent window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NorthFlowSummary {
    pub code: String,
    /// Window length in trading days.
    pub days: usize,
    /// 累计净流入（万元）
    pub total_net_amount: f64,
    /// 日均净流入（万元）
    pub avg_net_amount: f64,
    pub trend: String,
    pub data_source: String,
}

/// Trend label for a summed northbound flow (万元); ±1亿 thresholds.
pub fn north_trend_label(total_net_amount: f64) -> &'static str {
    if total_net_amount > 10_000.0 {
        "持续流入"
    } else if total_net_amount > 0.0 {
        "小幅流入"
    } else if total_net_amount > -10_000.0 {
        "小幅流出"
    } else {
        "持续流出"
    }
}

// ── Analysis Result ──────────────────────────────────────────────────

/// Structured output of one scoring call.
///
/// On failure (`success == false`) every field still holds a safe
/// neutral default; callers branch on `success`, never on missing data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub code: String,
    pub name: String,

    // 核心指标
    /// 综合评分 0-100（价值×0.4 + 资金×0.25 + 消息×0.25 + 趋势×0.1）
    pub sentiment_score: i64,
    /// 强烈看多/看多/震荡/看空/强烈看空
    pub trend_prediction: String,
    /// 买入/加仓/持有/减仓/卖出/观望
    pub operation_advice: String,
    /// 高/中/低
    pub confidence_level: String,

    // 4维度评分
    pub value_score: i64,
    pub funding_score: i64,
    pub news_score: i64,
    pub trend_score: i64,
    /// 完整的4维度数据（透传）
    pub dimensions: Option<Value>,
    /// 决策仪表盘（core_conclusion / battle_plan / action_checklist）
    pub dashboard: Option<Value>,

    // 走势分析
    pub trend_analysis: String,
    pub short_term_outlook: String,
    pub medium_term_outlook: String,

    // 技术面
    pub technical_analysis: String,
    pub ma_analysis: String,
    pub volume_analysis: String,
    pub pattern_analysis: String,

    // 基本面
    pub fundamental_analysis: String,
    pub sector_position: String,
    pub company_highlights: String,

    // 消息面
    pub news_summary: String,
    pub market_sentiment: String,
    pub hot_topics: String,

    // 综合
    pub analysis_summary: String,
    pub key_points: String,
    pub risk_warning: String,
    pub buy_reason: String,

    // 元数据
    pub raw_response: Option<String>,
    pub search_performed: bool,
    pub data_sources: String,
    pub success: bool,
    pub error_message: Option<String>,
}

impl AnalysisResult {
    /// Neutral baseline: score 50, 震荡/持有, empty narrative fields.
    pub fn baseline(code: &str, name: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            sentiment_score: 50,
            trend_prediction: "震荡".to_string(),
            operation_advice: "持有".to_string(),
            confidence_level: "中".to_string(),
            value_score: 50,
            funding_score: 50,
            news_score: 50,
            trend_score: 50,
            dimensions: None,
            dashboard: None,
            trend_analysis: String::new(),
            short_term_outlook: String::new(),
            medium_term_outlook: String::new(),
            technical_analysis: String::new(),
            ma_analysis: String::new(),
            volume_analysis: String::new(),
            pattern_analysis: String::new(),
            fundamental_analysis: String::new(),
            sector_position: String::new(),
            company_highlights: String::new(),
            news_summary: String::new(),
            market_sentiment: String::new(),
            hot_topics: String::new(),
            analysis_summary: String::new(),
            key_points: String::new(),
            risk_warning: String::new(),
            buy_reason: String::new(),
            raw_response: None,
            search_performed: false,
            data_sources: String::new(),
            success: true,
            error_message: None,
        }
    }

    /// Failure value with neutral defaults; callers never see nulls.
    pub fn failure(code: &str, name: &str, summary: &str, warning: &str, error: &str) -> Self {
        Self {
            confidence_level: "低".to_string(),
            analysis_summary: summary.to_string(),
            risk_warning: warning.to_string(),
            success: false,
            error_message: Some(error.to_string()),
            ..Self::baseline(code, name)
        }
    }

    /// Composite of the four dimension scores under the documented
    /// weights (价值40% 资金25% 消息25% 趋势10%), clamped to 0-100.
    ///
    /// May legitimately differ from the provider-supplied
    /// `sentiment_score`.
    pub fn weighted_composite(&self) -> i64 {
        let blended = 0.4 * self.value_score as f64
            + 0.25 * self.funding_score as f64
            + 0.25 * self.news_score as f64
            + 0.1 * self.trend_score as f64;
        (blended.round() as i64).clamp(0, 100)
    }

    /// 4维度评分摘要（推送显示用）
    pub fn dimension_summary(&self) -> String {
        if self.dimensions.is_none() {
            return format!("综合评分 {}分", self.sentiment_score);
        }
        format!(
            "💎价值{} 💰资金{} 📰消息{} 📈趋势{}",
            self.value_score, self.funding_score, self.news_score, self.trend_score
        )
    }

    /// One-sentence conclusion from the dashboard, falling back to the
    /// summary field.
    pub fn core_conclusion(&self) -> String {
        self.dashboard
            .as_ref()
            .and_then(|d| d.pointer("/core_conclusion/one_sentence"))
            .and_then(Value::as_str)
            .unwrap_or(&self.analysis_summary)
            .to_string()
    }

    /// Position-dependent advice from the dashboard.
    pub fn position_advice(&self, has_position: bool) -> String {
        let key = if has_position { "has_position" } else { "no_position" };
        self.dashboard
            .as_ref()
            .and_then(|d| d.pointer(&format!("/core_conclusion/position_advice/{key}")))
            .and_then(Value::as_str)
            .unwrap_or(&self.operation_advice)
            .to_string()
    }

    /// Action checklist from the dashboard, empty when absent.
    pub fn action_checklist(&self) -> Vec<String> {
        self.dashboard
            .as_ref()
            .and_then(|d| d.pointer("/action_checklist"))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn advice_emoji(&self) -> &'static str {
        match self.operation_advice.as_str() {
            "买入" | "加仓" => "🟢",
            "强烈买入" => "💚",
            "持有" => "🟡",
            "观望" => "⚪",
            "减仓" => "🟠",
            "卖出" => "🔴",
            "强烈卖出" => "❌",
            _ => "🟡",
        }
    }

    pub fn confidence_stars(&self) -> &'static str {
        match self.confidence_level.as_str() {
            "高" => "⭐⭐⭐",
            "低" => "⭐",
            _ => "⭐⭐",
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────
