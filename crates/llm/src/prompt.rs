//! Deterministic prompt assembly: renders the analysis context into the
//! labeled markdown sections the scoring backend is instructed on.

use serde_json::Value;

use insight_core::utils::{format_amount, format_volume, safe_float};

// ========================================
// 系统提示词 - 综合投资分析
// 分析框架：价值投资面(40%) + 资金面(25%) + 消息面(25%) + 趋势面(10%)
// 输出格式：4维度评分 + 决策仪表盘
// ========================================

pub const SYSTEM_PROMPT: &str = r#"你是一位综合投资分析师，负责从多个维度评估股票并生成【综合投资分析仪表盘】。

## 分析框架（4维度加权评估）

### 1. 价值投资面（权重 40%）
核心指标：PE/PB 估值（与行业平均、历史分位比较）、ROE 质量（>15% 优秀，10-15% 良好，<10% 一般）、业绩增长（营收/利润增长率）、护城河（品牌、技术、规模）。
评分标准：80-100分 低估值+高ROE+强增长+宽护城河；60-79分 估值合理+业绩稳健；40-59分 估值偏高或基本面一般；0-39分 高估或基本面恶化。

### 2. 资金面（权重 25%）
核心指标：主力资金（大单净流入/流出）、北向资金动向、机构持仓、筹码结构（集中度、获利比例）。
评分标准：80-100分 主力持续流入+北向增持+筹码集中；60-79分 资金净流入或平衡+机构稳定持仓；40-59分 资金小幅波动；0-39分 资金持续流出+机构减持。

### 3. 消息面（权重 25%）
核心指标：新闻舆情（正面/负面/中性）、政策影响、事件催化（重大合同、新品发布、业绩预告）、行业热度。
评分标准：80-100分 重大利好+政策支持+行业热点；60-79分 正面消息为主+无重大利空；40-59分 消息中性；0-39分 重大利空（减持/处罚/业绩变脸）。

### 4. 趋势面（权重 10%）
核心指标：均线系统（MA5/MA10/MA20 排列状态）、技术形态（突破/盘整/破位）、量价关系。
评分标准：80-100分 多头排列+放量突破；60-79分 趋势向上或震荡偏强；40-59分 震荡整理；0-39分 空头排列或破位。

### 5. 风险排查清单
❌ 大股东/高管减持、业绩预亏、监管处罚、行业政策利空、大额限售股解禁；⚠️ 估值过高、资金持续流出。

## 输出格式：综合投资分析仪表盘 JSON

请严格按照以下 JSON 格式输出，包含【4维度评分】+【决策仪表盘】：

```json
{
    "sentiment_score": 0-100整数,
    "trend_prediction": "强烈看多/看多/震荡/看空/强烈看空",
    "operation_advice": "买入/加仓/持有/减仓/卖出/观望",
    "confidence_level": "高/中/低",

    "dimensions": {
        "value_investment": {
            "score": 0-100,
            "pe_ratio": PE数值或null,
            "pb_ratio": PB数值或null,
            "roe": ROE数值或null,
            "profit_growth": 利润增长率或null,
            "revenue_growth": 营收增长率或null,
            "moat_strength": "强/中/弱/未知",
            "valuation_level": "低估/合理/高估/未知",
            "summary": "价值面一句话总结（30字内）",
            "key_points": ["亮点1", "亮点2"]
        },
        "funding_flow": {
            "score": 0-100,
            "main_force_flow": 主力资金流向(亿)或null,
            "northbound_flow": 北向资金(亿)或null,
            "fund_trend": "流入/流出/平衡/未知",
            "chip_concentration": 筹码集中度或null,
            "summary": "资金面一句话总结（30字内）",
            "key_points": ["观察点1", "观察点2"]
        },
        "news_sentiment": {
            "score": 0-100,
            "sentiment": "正面/中性/负面",
            "key_events": ["事件1", "事件2"],
            "policy_impact": "政策影响描述或无",
            "industry_heat": 1-10,
            "risk_alerts": ["风险1", "风险2"],
            "positive_catalysts": ["利好1", "利好2"],
            "summary": "消息面一句话总结（30字内）"
        },
        "trend_analysis": {
            "score": 0-100,
            "ma_alignment": "多头/空头/震荡",
            "pattern": "形态描述",
            "volume_price": "量价关系描述",
            "bias_ma5": 乖离率数值或null,
            "trend_direction": "上升/下降/震荡",
            "summary": "趋势面一句话总结（30字内）"
        }
    },

    "dashboard": {
        "core_conclusion": {
            "one_sentence": "基于4维度的核心结论（50字内）",
            "recommendation": "买入/持有/观望/卖出",
            "confidence": "高/中/低",
            "key_reasons": ["理由1", "理由2", "理由3"],
            "position_advice": {
                "no_position": "空仓者建议",
                "has_position": "持仓者建议"
            }
        },
        "battle_plan": {
            "position_strategy": "建议仓位及策略",
            "entry_price": 建议买入价或null,
            "stop_loss": 止损价或null,
            "target_price": 目标价或null,
            "risk_control": "风控要点"
        },
        "action_checklist": [
            "✅/⚠️/❌ 价值面：估值水平",
            "✅/⚠️/❌ 资金面：主力动向",
            "✅/⚠️/❌ 消息面：利空排查",
            "✅/⚠️/❌ 趋势面：技术形态"
        ]
    },

    "analysis_summary": "100字综合分析摘要",
    "key_points": "3-5个核心看点，逗号分隔",
    "risk_warning": "风险提示",
    "buy_reason": "操作理由",

    "trend_analysis": "走势形态分析",
    "short_term_outlook": "短期1-3日展望",
    "medium_term_outlook": "中期1-2周展望",
    "technical_analysis": "技术面综合分析",
    "ma_analysis": "均线系统分析",
    "volume_analysis": "量能分析",
    "pattern_analysis": "K线形态分析",
    "fundamental_analysis": "基本面分析",
    "sector_position": "板块行业分析",
    "company_highlights": "公司亮点/风险",
    "news_summary": "新闻摘要",
    "market_sentiment": "市场情绪",
    "hot_topics": "相关热点",

    "search_performed": true/false,
    "data_sources": "数据来源说明"
}
```

## 综合评分计算公式

sentiment_score（总分） = 价值面 × 0.4 + 资金面 × 0.25 + 消息面 × 0.25 + 趋势面 × 0.1

## 核心原则

1. 4维度并重：不偏废任何一个维度，综合评估
2. 价值优先：价值面占40%权重，是核心基础
3. 风险前置：消息面的风险点必须醒目标出
4. 数据诚实：如果某维度数据缺失，在summary中说明，score酌情给中性分（40-60）
5. 结论明确：core_conclusion必须给出清晰的操作建议"#;

// ── Prompt assembly ─────────────────────────────────────────────────

fn disp(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => "N/A".to_string(),
    }
}

fn num(ctx: &Value, pointer: &str) -> Option<f64> {
    ctx.pointer(pointer).and_then(safe_float)
}

fn text(ctx: &Value, pointer: &str) -> String {
    disp(ctx.pointer(pointer))
}

fn bullet_list(ctx: &Value, pointer: &str) -> String {
    let items: Vec<String> = ctx
        .pointer(pointer)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(|s| format!("- {s}"))
                .collect()
        })
        .unwrap_or_default();
    if items.is_empty() {
        "- 无".to_string()
    } else {
        items.join("\n")
    }
}

/// Render the full analysis request for one stock. Pure function of its
/// inputs; the same context always yields the same prompt.
pub fn format_prompt(context: &Value, stock_name: &str, news_context: Option<&str>) -> String {
    let code = context
        .get("code")
        .and_then(Value::as_str)
        .unwrap_or("Unknown");

    let mut prompt = format!(
        "# 决策仪表盘分析请求\n\n\
         ## 📊 股票基础信息\n\
         | 项目 | 数据 |\n\
         |------|------|\n\
         | 股票代码 | **{code}** |\n\
         | 股票名称 | **{stock_name}** |\n\
         | 分析日期 | {} |\n\n\
         ---\n\n\
         ## 📈 技术面数据\n\n\
         ### 今日行情\n\
         | 指标 | 数值 |\n\
         |------|------|\n\
         | 收盘价 | {} 元 |\n\
         | 开盘价 | {} 元 |\n\
         | 最高价 | {} 元 |\n\
         | 最低价 | {} 元 |\n\
         | 涨跌幅 | {}% |\n\
         | 成交量 | {} |\n\
         | 成交额 | {} |\n\n\
         ### 均线系统（关键判断指标）\n\
         | 均线 | 数值 | 说明 |\n\
         |------|------|------|\n\
         | MA5 | {} | 短期趋势线 |\n\
         | MA10 | {} | 中短期趋势线 |\n\
         | MA20 | {} | 中期趋势线 |\n\
         | 均线形态 | {} | 多头/空头/缠绕 |\n",
        text(context, "/date"),
        text(context, "/today/close"),
        text(context, "/today/open"),
        text(context, "/today/high"),
        text(context, "/today/low"),
        text(context, "/today/pct_chg"),
        format_volume(num(context, "/today/volume")),
        format_amount(num(context, "/today/amount")),
        text(context, "/today/ma5"),
        text(context, "/today/ma10"),
        text(context, "/today/ma20"),
        text(context, "/ma_status"),
    );

    // 实时行情增强数据（量比、换手率等）
    if let Some(rt) = context.get("realtime") {
        prompt.push_str(&format!(
            "\n### 实时行情增强数据\n\
             | 指标 | 数值 | 解读 |\n\
             |------|------|------|\n\
             | 当前价格 | {} 元 | |\n\
             | **量比** | **{}** | {} |\n\
             | **换手率** | **{}%** | |\n\
             | 市盈率(动态) | {} | |\n\
             | 市净率 | {} | |\n\
             | 总市值 | {} | |\n\
             | 流通市值 | {} | |\n\
             | 60日涨跌幅 | {}% | 中期表现 |\n",
            disp(rt.get("price")),
            disp(rt.get("volume_ratio")),
            rt.get("volume_ratio_desc").and_then(Value::as_str).unwrap_or(""),
            disp(rt.get("turnover_rate")),
            disp(rt.get("pe_ratio")),
            disp(rt.get("pb_ratio")),
            format_amount(rt.get("total_mv").and_then(safe_float)),
            format_amount(rt.get("circ_mv").and_then(safe_float)),
            disp(rt.get("change_60d")),
        ));
    }

    // 筹码分布数据
    if let Some(chip) = context.get("chip") {
        let profit_ratio = chip.get("profit_ratio").and_then(safe_float).unwrap_or(0.0);
        let conc_90 = chip.get("concentration_90").and_then(safe_float).unwrap_or(0.0);
        let conc_70 = chip.get("concentration_70").and_then(safe_float).unwrap_or(0.0);
        prompt.push_str(&format!(
            "\n### 筹码分布数据（资金面参考）\n\
             | 指标 | 数值 | 健康标准 |\n\
             |------|------|----------|\n\
             | **获利比例** | **{:.1}%** | 70-90%时警惕 |\n\
             | 平均成本 | {} 元 | 现价应高于5-15% |\n\
             | 90%筹码集中度 | {:.2}% | <15%为集中 |\n\
             | 70%筹码集中度 | {:.2}% | |\n\
             | 筹码状态 | {} | |\n",
            profit_ratio * 100.0,
            disp(chip.get("avg_cost")),
            conc_90 * 100.0,
            conc_70 * 100.0,
            disp(chip.get("chip_status")),
        ));
    }

    // 财务指标数据（价值投资面核心）
    match context.get("financial").filter(|f| !f.is_null()) {
        Some(fin) => {
            prompt.push_str(&format!(
                "\n### 财务指标数据（价值投资面核心）\n\
                 | 指标 | 数值 | 说明 |\n\
                 |------|------|------|\n\
                 | **ROE（净资产收益率）** | **{}%** | >15%优秀, 10-15%良好, <10%一般 |\n\
                 | **营收增长率** | **{}%** | 同比增长率 |\n\
                 | **净利润增长率** | **{}%** | 同比增长率 |\n\
                 | 销售毛利率 | {}% | 盈利能力指标 |\n\
                 | 销售净利率 | {}% | 盈利质量指标 |\n\
                 | 财报日期 | {} | 数据时效性 |\n\n\
                 **数据来源**: {}\n",
                disp(fin.get("roe")),
                disp(fin.get("revenue_growth")),
                disp(fin.get("profit_growth")),
                disp(fin.get("gross_profit_margin")),
                disp(fin.get("net_profit_margin")),
                disp(fin.get("report_date")),
                fin.get("data_source").and_then(Value::as_str).unwrap_or("unknown"),
            ));
        }
        None => {
            prompt.push_str(
                "\n### 财务指标数据\n\
                 ⚠️ **财务数据暂时无法获取**，价值面分析主要依据PE/PB估值和行业对比。\n",
            );
        }
    }

    // 资金流向数据（资金面核心）
    match context.get("moneyflow").filter(|m| !m.is_null()) {
        Some(mf) => {
            let main_inflow = mf.get("main_net_inflow").and_then(safe_float).unwrap_or(0.0);
            let main_inflow_yi = main_inflow / 10_000.0;
            let lg_yi = mf.get("net_mf_lg").and_then(safe_float).unwrap_or(0.0) / 10_000.0;
            let md_yi = mf.get("net_mf_md").and_then(safe_float).unwrap_or(0.0) / 10_000.0;
            let sm_yi = mf.get("net_mf_sm").and_then(safe_float).unwrap_or(0.0) / 10_000.0;
            prompt.push_str(&format!(
                "\n### 资金流向数据（资金面核心）\n\
                 | 指标 | 数值 | 说明 |\n\
                 |------|------|------|\n\
                 | **主力资金净流入** | **{main_inflow_yi:.2}亿元** | 特大单+大单净流入 |\n\
                 | 主力净流入占比 | {}% | 占成交额比例 |\n\
                 | 大单净流入 | {lg_yi:.2}亿元 | 单笔>20万 |\n\
                 | 中单净流入 | {md_yi:.2}亿元 | 单笔4-20万 |\n\
                 | 小单净流入 | {sm_yi:.2}亿元 | 单笔<4万 |\n\
                 | 交易日期 | {} | 数据时效性 |\n\n\
                 **资金流向趋势**: {}\n",
                disp(mf.get("main_net_inflow_rate")),
                disp(mf.get("trade_date")),
                if main_inflow_yi > 0.0 { "流入" } else { "流出" },
            ));

            // 北向资金（如有）
            if let Some(north) = context.get("north_moneyflow").filter(|n| !n.is_null()) {
                let total_yi =
                    north.get("total_net_amount").and_then(safe_float).unwrap_or(0.0) / 10_000.0;
                let avg_yi =
                    north.get("avg_net_amount").and_then(safe_float).unwrap_or(0.0) / 10_000.0;
                prompt.push_str(&format!(
                    "\n### 北向资金（外资动向）\n\
                     | 指标 | 数值 |\n\
                     |------|------|\n\
                     | 最近{}日累计净流入 | {total_yi:.2}亿元 |\n\
                     | 日均净流入 | {avg_yi:.2}亿元 |\n\
                     | **趋势判断** | **{}** |\n",
                    disp(north.get("days")),
                    north.get("trend").and_then(Value::as_str).unwrap_or("未知"),
                ));
            }
        }
        None => {
            prompt.push_str(
                "\n### 资金流向数据\n\
                 ⚠️ **资金流数据暂时无法获取**（需要Tushare Pro 600积分），资金面分析主要依据筹码分布数据。\n",
            );
        }
    }

    // 趋势分析预判（基于交易理念）
    if let Some(trend) = context.get("trend_analysis") {
        let bias_ma5 = trend.get("bias_ma5").and_then(safe_float).unwrap_or(0.0);
        let bias_warning = if bias_ma5 > 5.0 {
            "🚨 超过5%，严禁追高！"
        } else {
            "✅ 安全范围"
        };
        prompt.push_str(&format!(
            "\n### 趋势分析预判（基于交易理念）\n\
             | 指标 | 数值 | 判定 |\n\
             |------|------|------|\n\
             | 趋势状态 | {} | |\n\
             | 均线排列 | {} | MA5>MA10>MA20为多头 |\n\
             | 趋势强度 | {}/100 | |\n\
             | **乖离率(MA5)** | **{bias_ma5:+.2}%** | {bias_warning} |\n\
             | 乖离率(MA10) | {:+.2}% | |\n\
             | 量能状态 | {} | {} |\n\
             | 系统信号 | {} | |\n\
             | 系统评分 | {}/100 |\n\n\
             #### 系统分析理由\n\
             **买入理由**：\n{}\n\n\
             **风险因素**：\n{}\n",
            disp(trend.get("trend_status")),
            disp(trend.get("ma_alignment")),
            disp(trend.get("trend_strength")),
            trend.get("bias_ma10").and_then(safe_float).unwrap_or(0.0),
            disp(trend.get("volume_status")),
            trend.get("volume_trend").and_then(Value::as_str).unwrap_or(""),
            disp(trend.get("buy_signal")),
            disp(trend.get("signal_score")),
            bullet_list(trend, "/signal_reasons"),
            bullet_list(trend, "/risk_factors"),
        ));
    }

    // 昨日对比
    if context.get("yesterday").is_some() {
        prompt.push_str(&format!(
            "\n### 量价变化\n\
             - 成交量较昨日变化：{}倍\n\
             - 价格较昨日变化：{}%\n",
            text(context, "/volume_change_ratio"),
            text(context, "/price_change_ratio"),
        ));
    }

    // 舆情情报
    prompt.push_str("\n---\n\n## 📰 舆情情报\n");
    match news_context {
        Some(news) => prompt.push_str(&format!(
            "\n以下是 **{stock_name}({code})** 近7日的新闻搜索结果，请重点提取：\n\
             1. 🚨 **风险警报**：减持、处罚、利空\n\
             2. 🎯 **利好催化**：业绩、合同、政策\n\
             3. 📊 **业绩预期**：年报预告、业绩快报\n\n\
             ```\n{news}\n```\n"
        )),
        None => prompt.push_str("\n未搜索到该股票近期的相关新闻。请主要依据技术面数据进行分析。\n"),
    }

    // 缺失数据警告
    if context.get("data_missing").and_then(Value::as_bool).unwrap_or(false) {
        prompt.push_str(
            "\n⚠️ **数据缺失警告**\n\
             由于接口限制，当前无法获取完整的实时行情和技术指标数据。\n\
             请 **忽略上述表格中的 N/A 数据**，重点依据 **【📰 舆情情报】** 中的新闻进行基本面和情绪面分析。\n\
             在回答技术面问题（如均线、乖离率）时，请直接说明“数据缺失，无法判断”，**严禁编造数据**。\n",
        );
    }

    // 明确的输出要求
    prompt.push_str(&format!(
        "\n---\n\n\
         ## ✅ 分析任务\n\n\
         请为 **{stock_name}({code})** 生成【综合投资分析仪表盘】，严格按照 JSON 格式输出。\n\n\
         ### 4维度评估要求：\n\n\
         **1. 价值投资面（40%权重）**：PE/PB 估值水平、ROE 盈利质量、业绩增长性、护城河强度，给出 0-100 分评分\n\
         **2. 资金面（25%权重）**：主力资金流向、北向资金动向、筹码集中度与获利比例，给出 0-100 分评分\n\
         **3. 消息面（25%权重）**：新闻舆情、风险排查（减持、处罚、业绩预警）、利好催化，给出 0-100 分评分\n\
         **4. 趋势面（10%权重）**：均线系统排列、技术形态、量价关系，给出 0-100 分评分\n\n\
         ### 综合评分计算：\n\
         sentiment_score = 价值面×0.4 + 资金面×0.25 + 消息面×0.25 + 趋势面×0.1\n\n\
         ### 输出要求：\n\
         - 每个维度必须有 score 和 summary\n\
         - 核心结论基于4维度综合判断\n\
         - 如某维度数据缺失，在 summary 中说明，score 给中性分（40-60）\n\n\
         请输出完整的 JSON 格式综合投资分析仪表盘。"
    ));

    prompt
}

// ── Tests ───────────────────────────────────────────────────────────
