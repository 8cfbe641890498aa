mod context;

use std::time::Duration;

use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use insight_config::AppConfig;
use insight_data::{FinancialFetcher, MoneyFlowFetcher, RandomDelay, StockSelector};
use insight_llm::Analyzer;

use context::build_context;

#[derive(Parser)]
#[command(name = "insight", about = "A股智能分析：多源数据聚合 + AI 综合评分")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 动态选股（成交额/涨幅排名）
    Select {
        /// 排名依据：volume（成交额）或 change（涨幅）
        #[arg(short, long, default_value = "volume")]
        by: String,
        /// 返回数量
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
        /// 涨幅排名时保留 ST 股票
        #[arg(long)]
        include_st: bool,
    },
    /// 分析单只股票
    Analyze {
        /// 股票代码（6位数字）
        code: String,
        /// 股票名称（可选，优先于自动解析）
        #[arg(long)]
        name: Option<String>,
        /// 预先搜索的新闻文本文件（可选）
        #[arg(long)]
        news_file: Option<String>,
        /// 输出完整 JSON 结果
        #[arg(long)]
        json: bool,
    },
    /// 批量分析多只股票（逗号分隔）
    Batch {
        /// 股票代码列表，例如 600519,000001,300750
        codes: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config = match AppConfig::from_file(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("配置文件 {} 加载失败（{}），使用默认配置", cli.config, e);
            AppConfig::default()
        }
    };

    match cli.command {
        Commands::Select {
            by,
            count,
            include_st,
        } => {
            let selector = StockSelector::new(
                &config.akshare.base_url,
                config.fetch.selector_max_retries,
                Duration::from_secs_f64(config.fetch.selector_retry_delay_secs),
            );
            let codes = match by.as_str() {
                "change" => selector.top_by_change(count, !include_st).await,
                _ => selector.top_by_volume(count).await,
            };
            if codes.is_empty() {
                // 空列表代表"选股不可用"，不是"市场无股票"
                println!("选股失败：行情接口不可用，请稍后重试");
            } else {
                println!("{}", codes.join(","));
            }
        }
        Commands::Analyze {
            code,
            name,
            news_file,
            json,
        } => {
            let news = match news_file {
                Some(path) => Some(std::fs::read_to_string(&path)?),
                None => None,
            };
            let result = analyze_one(&config, &code, name.as_deref(), news.as_deref()).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }
        }
        Commands::Batch { codes } => {
            let codes: Vec<&str> = codes
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .collect();
            let delay = Duration::from_secs_f64(config.fetch.batch_delay_secs);

            for (i, code) in codes.iter().enumerate() {
                if i > 0 {
                    tokio::time::sleep(delay).await;
                }
                let result = analyze_one(&config, code, None, None).await;
                print_result(&result);
                println!();
            }
        }
    }

    Ok(())
}

/// 完整的单股分析管线：抓数据 → 组装上下文 → AI 评分。
async fn analyze_one(
    config: &AppConfig,
    code: &str,
    name: Option<&str>,
    news: Option<&str>,
) -> insight_core::models::AnalysisResult {
    let delay = RandomDelay::from_millis(config.fetch.sleep_min_ms, config.fetch.sleep_max_ms);

    let financial_fetcher = FinancialFetcher::new(&config.akshare.base_url, delay.clone());
    let moneyflow_fetcher = MoneyFlowFetcher::new(
        &config.tushare.token,
        &config.tushare.base_url,
        &config.akshare.base_url,
        delay,
    );

    let financial = financial_fetcher.fetch(code).await;
    let moneyflow = moneyflow_fetcher.fetch(code, None).await;
    let north = moneyflow_fetcher.fetch_north(code, 5).await;

    let date = Local::now().format("%Y-%m-%d").to_string();
    let context = build_context(
        code,
        name,
        &date,
        financial.as_ref(),
        moneyflow.as_ref(),
        north.as_ref(),
    );

    let mut analyzer = Analyzer::from_config(&config.llm);
    analyzer.analyze(&context, news).await
}

fn print_result(result: &insight_core::models::AnalysisResult) {
    println!("========================================");
    println!(
        "{} {}({}) 综合评分: {}  {}",
        result.advice_emoji(),
        result.name,
        result.code,
        result.sentiment_score,
        result.confidence_stars()
    );
    println!("{}", result.dimension_summary());
    println!(
        "趋势预测: {}  操作建议: {}",
        result.trend_prediction, result.operation_advice
    );
    if !result.success {
        println!("⚠️ 分析失败: {}", result.error_message.as_deref().unwrap_or("未知错误"));
    }
    let conclusion = result.core_conclusion();
    if !conclusion.is_empty() {
        println!("核心结论: {conclusion}");
    }
    if !result.key_points.is_empty() {
        println!("核心看点: {}", result.key_points);
    }
    if !result.risk_warning.is_empty() {
        println!("风险提示: {}", result.risk_warning);
    }
    for item in result.action_checklist() {
        println!("  {item}");
    }
    info!(
        "分析完成 {}({}) success={}",
        result.name, result.code, result.success
    );
}
