//! Static code→name lookup for common tickers, used as the
//! second-to-last step of display-name resolution.

pub fn stock_name(code: &str) -> Option<&'static str> {
    let name = match code {
        // === A股 ===
        "600519" => "贵州茅台",
        "000001" => "平安银行",
        "300750" => "宁德时代",
        "002594" => "比亚迪",
        "600036" => "招商银行",
        "601318" => "中国平安",
        "000858" => "五粮液",
        "600276" => "恒瑞医药",
        "601012" => "隆基绿能",
        "002475" => "立讯精密",
        "300059" => "东方财富",
        "002415" => "海康威视",
        "600900" => "长江电力",
        "601166" => "兴业银行",
        "600028" => "中国石化",

        // === 美股 ===
        "AAPL" => "苹果",
        "TSLA" => "特斯拉",
        "MSFT" => "微软",
        "GOOGL" => "谷歌A",
        "GOOG" => "谷歌C",
        "AMZN" => "亚马逊",
        "NVDA" => "英伟达",
        "META" => "Meta",
        "AMD" => "AMD",
        "INTC" => "英特尔",
        "BABA" => "阿里巴巴",
        "PDD" => "拼多多",
        "JD" => "京东",
        "BIDU" => "百度",
        "NIO" => "蔚来",
        "XPEV" => "小鹏汽车",
        "LI" => "理想汽车",
        "COIN" => "Coinbase",
        "MSTR" => "MicroStrategy",

        // === 港股 (5位数字) ===
        "00700" => "腾讯控股",
        "03690" => "美团",
        "01810" => "小米集团",
        "09988" => "阿里巴巴",
        "09618" => "京东集团",
        "09888" => "百度集团",
        "01024" => "快手",
        "00981" => "中芯国际",
        "02015" => "理想汽车",
        "09868" => "小鹏汽车",
        "00005" => "汇丰控股",
        "01299" => "友邦保险",
        "00941" => "中国移动",
        "00883" => "中国海洋石油",

        _ => return None,
    };
    Some(name)
}
