use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 受限流保护的操作
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Submit,
    Query,
    Session,
    Trigger,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Submit => "submit",
            Operation::Query => "query",
            Operation::Session => "session",
            Operation::Trigger => "trigger",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 窗口内最多 limit 次，配置格式 `limit/window_secs`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateRule {
    pub limit: u32,
    pub window: Duration,
}

impl RateRule {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }
}

impl FromStr for RateRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (limit, window) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| format!("rate rule `{s}` must look like limit/window_secs"))?;
        let limit: u32 = limit
            .trim()
            .parse()
            .map_err(|_| format!("rate rule `{s}` has an invalid limit"))?;
        let window_secs: u64 = window
            .trim()
            .parse()
            .map_err(|_| format!("rate rule `{s}` has an invalid window"))?;
        if limit == 0 || window_secs == 0 {
            return Err(format!("rate rule `{s}` must be positive"));
        }
        Ok(RateRule::new(limit, Duration::from_secs(window_secs)))
    }
}

/// 逗号分隔的多条规则
pub fn parse_rules(raw: &str) -> Result<Vec<RateRule>, String> {
    let rules = raw
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(RateRule::from_str)
        .collect::<Result<Vec<_>, _>>()?;
    if rules.is_empty() {
        return Err(format!("no rate rules in `{raw}`"));
    }
    Ok(rules)
}

/// 滑动窗口日志，时间戳为毫秒，按时间升序
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitWindow {
    pub caller_key: String,
    pub operation: String,
    pub timestamps: Vec<i64>,
}
