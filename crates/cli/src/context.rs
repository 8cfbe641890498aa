//! Assembly of the per-stock analysis context handed to the scoring
//! client. Keys follow the fixed contract: `code`, `stock_name`,
//! `date`, `financial`, `moneyflow`, `north_moneyflow`, `data_missing`.

use serde_json::{json, Value};

use insight_core::models::{FinancialIndicators, MoneyFlowData, NorthFlowSummary};

pub fn build_context(
    code: &str,
    stock_name: Option<&str>,
    date: &str,
    financial: Option<&FinancialIndicators>,
    moneyflow: Option<&MoneyFlowData>,
    north: Option<&NorthFlowSummary>,
) -> Value {
    let mut context = json!({
        "code": code,
        "date": date,
        // 本入口不采集行情与技术指标，提示词侧按缺失数据处理
        "data_missing": true,
    });

    if let Some(name) = stock_name.filter(|n| !n.is_empty()) {
        context["stock_name"] = json!(name);
    }
    if let Some(fin) = financial {
        context["financial"] = serde_json::to_value(fin).unwrap_or(Value::Null);
    }
    if let Some(mf) = moneyflow {
        context["moneyflow"] = serde_json::to_value(mf).unwrap_or(Value::Null);
    }
    if let Some(nf) = north {
        context["north_moneyflow"] = serde_json::to_value(nf).unwrap_or(Value::Null);
    }

    context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_shape() {
        let mut fin = FinancialIndicators::new("600519", "ths_abstract");
        fin.roe = Some(28.5);
        let mut mf = MoneyFlowData::new("600519", "tushare_moneyflow");
        mf.main_net_inflow = Some(25_000.0);

        let ctx = build_context("600519", Some("贵州茅台"), "2025-01-15", Some(&fin), Some(&mf), None);

        assert_eq!(ctx["code"], "600519");
        assert_eq!(ctx["stock_name"], "贵州茅台");
        assert_eq!(ctx["data_missing"], true);
        assert_eq!(ctx["financial"]["roe"], 28.5);
        assert_eq!(ctx["moneyflow"]["main_net_inflow"], 25_000.0);
        assert!(ctx.get("north_moneyflow").is_none());
    }

    #[test]
    fn test_context_without_data() {
        let ctx = build_context("000001", None, "2025-01-15", None, None, None);
        assert!(ctx.get("financial").is_none());
        assert!(ctx.get("stock_name").is_none());
        assert_eq!(ctx["data_missing"], true);
    }
}
