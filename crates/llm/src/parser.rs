//! Response interpretation: extract the structured dashboard JSON from
//! the raw model reply, with a keyword-heuristic fallback when no
//! parseable structure exists. Interpretation never fails; a degraded
//! result is returned instead.

use regex_lite::Regex;
use serde_json::Value;
use tracing::warn;

use insight_core::models::AnalysisResult;

/// Parse a raw reply into a structured result.
pub fn parse_response(response_text: &str, code: &str, name: &str) -> AnalysisResult {
    // markdown 代码块围栏直接剥掉
    let cleaned = response_text.replace("```json", "").replace("```", "");

    let json_start = cleaned.find('{');
    let json_end = cleaned.rfind('}');

    let (Some(start), Some(end)) = (json_start, json_end) else {
        warn!("无法从响应中提取 JSON，使用原始文本分析");
        return parse_text_response(response_text, code, name);
    };
    if end < start {
        return parse_text_response(response_text, code, name);
    }

    let repaired = fix_json_string(&cleaned[start..=end]);
    match serde_json::from_str::<Value>(&repaired) {
        Ok(data) => build_result(&data, code, name),
        Err(e) => {
            warn!("JSON 解析失败: {}，尝试从文本提取", e);
            parse_text_response(response_text, code, name)
        }
    }
}

// ── Structured path ─────────────────────────────────────────────────

fn build_result(data: &Value, code: &str, name: &str) -> AnalysisResult {
    let mut result = AnalysisResult::baseline(code, name);

    result.sentiment_score = score_field(data.get("sentiment_score"));
    result.trend_prediction = str_field(data, "trend_prediction", "震荡");
    result.operation_advice = str_field(data, "operation_advice", "持有");
    result.confidence_level = str_field(data, "confidence_level", "中");

    // 4维度评分：子对象缺失或缺 score 时给中性分 50
    result.value_score = score_field(data.pointer("/dimensions/value_investment/score"));
    result.funding_score = score_field(data.pointer("/dimensions/funding_flow/score"));
    result.news_score = score_field(data.pointer("/dimensions/news_sentiment/score"));
    result.trend_score = score_field(data.pointer("/dimensions/trend_analysis/score"));
    result.dimensions = data.get("dimensions").filter(|d| d.is_object()).cloned();

    // 决策仪表盘整体透传
    result.dashboard = data.get("dashboard").filter(|d| d.is_object()).cloned();

    result.trend_analysis = str_field(data, "trend_analysis", "");
    result.short_term_outlook = str_field(data, "short_term_outlook", "");
    result.medium_term_outlook = str_field(data, "medium_term_outlook", "");
    result.technical_analysis = str_field(data, "technical_analysis", "");
    result.ma_analysis = str_field(data, "ma_analysis", "");
    result.volume_analysis = str_field(data, "volume_analysis", "");
    result.pattern_analysis = str_field(data, "pattern_analysis", "");
    result.fundamental_analysis = str_field(data, "fundamental_analysis", "");
    result.sector_position = str_field(data, "sector_position", "");
    result.company_highlights = str_field(data, "company_highlights", "");
    result.news_summary = str_field(data, "news_summary", "");
    result.market_sentiment = str_field(data, "market_sentiment", "");
    result.hot_topics = str_field(data, "hot_topics", "");
    result.analysis_summary = str_field(data, "analysis_summary", "分析完成");
    result.key_points = str_field(data, "key_points", "");
    result.risk_warning = str_field(data, "risk_warning", "");
    result.buy_reason = str_field(data, "buy_reason", "");

    result.search_performed = data
        .get("search_performed")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    result.data_sources = str_field(data, "data_sources", "技术面数据");
    result.success = true;
    result
}

fn str_field(data: &Value, key: &str, default: &str) -> String {
    data.get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

/// Score extraction: integer or float accepted, default 50, clamped to
/// the documented 0-100 range.
fn score_field(value: Option<&Value>) -> i64 {
    value
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f.round() as i64)))
        .unwrap_or(50)
        .clamp(0, 100)
}

/// Bounded repair rules for near-JSON text. Repair failures fall back
/// to the keyword heuristic; nothing more speculative is attempted.
fn fix_json_string(json_str: &str) -> String {
    // 行注释与块注释
    let mut fixed = regex_strip(json_str, r"//[^\n]*", "");
    fixed = regex_strip(&fixed, r"(?s)/\*.*?\*/", "");
    // 闭括号前的尾随逗号
    fixed = regex_strip(&fixed, r",\s*\}", "}");
    fixed = regex_strip(&fixed, r",\s*\]", "]");

    // 大写布尔字面量归一
    fixed.replace("True", "true").replace("False", "false")
}

fn regex_strip(text: &str, pattern: &str, replacement: &str) -> String {
    match Regex::new(pattern) {
        Ok(re) => re.replace_all(text, replacement).to_string(),
        Err(_) => text.to_string(),
    }
}

// ── Heuristic fallback path ─────────────────────────────────────────

const POSITIVE_KEYWORDS: &[&str] = &[
    "看多", "买入", "上涨", "突破", "强势", "利好", "加仓", "bullish", "buy",
];
const NEGATIVE_KEYWORDS: &[&str] = &[
    "看空", "卖出", "下跌", "跌破", "弱势", "利空", "减仓", "bearish", "sell",
];

/// Last-resort classification from the raw text: count which fixed
/// keyword sets appear and call the direction only on a clear margin.
fn parse_text_response(response_text: &str, code: &str, name: &str) -> AnalysisResult {
    let text_lower = response_text.to_lowercase();

    let positive_count = POSITIVE_KEYWORDS
        .iter()
        .filter(|kw| text_lower.contains(*kw))
        .count();
    let negative_count = NEGATIVE_KEYWORDS
        .iter()
        .filter(|kw| text_lower.contains(*kw))
        .count();

    let (sentiment_score, trend, advice) = if positive_count > negative_count + 1 {
        (65, "看多", "买入")
    } else if negative_count > positive_count + 1 {
        (35, "看空", "卖出")
    } else {
        (50, "震荡", "持有")
    };

    let summary: String = if response_text.is_empty() {
        "无分析结果".to_string()
    } else {
        response_text.chars().take(500).collect()
    };

    let mut result = AnalysisResult::baseline(code, name);
    result.sentiment_score = sentiment_score;
    result.trend_prediction = trend.to_string();
    result.operation_advice = advice.to_string();
    result.confidence_level = "低".to_string();
    result.analysis_summary = summary;
    result.key_points = "JSON解析失败，仅供参考".to_string();
    result.risk_warning = "分析结果可能不准确，建议结合其他信息判断".to_string();
    result.raw_response = Some(response_text.to_string());
    result.success = true;
    result
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_well_formed_dimensions() {
        let resp = r#"```json
        {
            "sentiment_score": 72,
            "trend_prediction": "看多",
            "operation_advice": "买入",
            "confidence_level": "高",
            "dimensions": {
                "value_investment": {"score": 80, "summary": "低估值高ROE"},
                "funding_flow": {"score": 60, "summary": "主力小幅流入"},
                "news_sentiment": {"score": 70, "summary": "业绩预告超预期"},
                "trend_analysis": {"score": 50, "summary": "震荡整理"}
            },
            "dashboard": {"core_conclusion": {"one_sentence": "逢低布局"}},
            "analysis_summary": "综合向好"
        }
        ```"#;

        let result = parse_response(resp, "600519", "贵州茅台");
        assert!(result.success);
        assert_eq!(result.sentiment_score, 72);
        assert_eq!(result.value_score, 80);
        assert_eq!(result.funding_score, 60);
        assert_eq!(result.news_score, 70);
        assert_eq!(result.trend_score, 50);
        // 0.4*80 + 0.25*60 + 0.25*70 + 0.1*50 = 69.5 -> 70
        // 与模型给出的 sentiment_score 允许不一致，这里只验证提取
        assert_eq!(result.weighted_composite(), 70);
        assert_eq!(result.trend_prediction, "看多");
        assert!(result.dashboard.is_some());
        assert!(result.dimensions.is_some());
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let resp = r#"{"sentiment_score": 58}"#;
        let result = parse_response(resp, "000001", "平安银行");
        assert!(result.success);
        assert_eq!(result.sentiment_score, 58);
        assert_eq!(result.value_score, 50);
        assert_eq!(result.trend_prediction, "震荡");
        assert_eq!(result.operation_advice, "持有");
        assert_eq!(result.analysis_summary, "分析完成");
        assert!(result.dashboard.is_none());
    }

    #[test]
    fn test_score_clamping_and_floats() {
        let resp = r#"{
            "sentiment_score": 120,
            "dimensions": {
                "value_investment": {"score": 79.6},
                "funding_flow": {"score": -5}
            }
        }"#;
        let result = parse_response(resp, "600519", "贵州茅台");
        assert_eq!(result.sentiment_score, 100);
        assert_eq!(result.value_score, 80);
        assert_eq!(result.funding_score, 0);
    }

    #[test]
    fn test_json_repair() {
        let resp = r#"{
            "sentiment_score": 66, // 综合评分
            /* 多行
               注释 */
            "search_performed": True,
            "key_points": "要点1，要点2",
        }"#;
        let result = parse_response(resp, "600519", "贵州茅台");
        assert!(result.success);
        assert_eq!(result.sentiment_score, 66);
        assert!(result.search_performed);
        assert_eq!(result.key_points, "要点1，要点2");
    }

    #[test]
    fn test_trailing_comma_in_array() {
        let fixed = fix_json_string("{\"a\": [1, 2, 3,], \"b\": 1,}");
        let v: Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(v["a"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_text_fallback_bullish() {
        let resp = "技术面强势，放量突破压力位，建议买入。基本面利好不断。";
        let result = parse_response(resp, "600519", "贵州茅台");
        assert!(result.success);
        assert_eq!(result.sentiment_score, 65);
        assert_eq!(result.trend_prediction, "看多");
        assert_eq!(result.operation_advice, "买入");
        assert_eq!(result.confidence_level, "低");
        assert_eq!(result.key_points, "JSON解析失败，仅供参考");
    }

    #[test]
    fn test_text_fallback_bearish() {
        let resp = "均线空头排列，跌破关键支撑，利空消息密集，建议卖出减仓，弱势难改。";
        let result = parse_response(resp, "600519", "贵州茅台");
        assert_eq!(result.sentiment_score, 35);
        assert_eq!(result.operation_advice, "卖出");
    }

    #[test]
    fn test_text_fallback_neutral_on_thin_margin() {
        // 正负关键词数量相差不超过1时保持中性
        let resp = "买入意愿与卖出压力并存。";
        let result = parse_response(resp, "600519", "贵州茅台");
        assert_eq!(result.sentiment_score, 50);
        assert_eq!(result.operation_advice, "持有");
    }

    #[test]
    fn test_text_fallback_truncates_summary() {
        let long_text = "没有结构化结论。".repeat(200);
        let result = parse_response(&long_text, "600519", "贵州茅台");
        assert_eq!(result.analysis_summary.chars().count(), 500);
        assert_eq!(result.raw_response.as_deref(), Some(long_text.as_str()));
    }

    #[test]
    fn test_broken_json_falls_back_to_text() {
        let resp = "{\"sentiment_score\": 未闭合";
        let result = parse_response(resp, "600519", "贵州茅台");
        assert!(result.success);
        assert_eq!(result.confidence_level, "低");
    }
}
