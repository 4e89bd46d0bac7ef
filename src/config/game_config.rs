//! 业务配置，启动时从环境变量构建一次
use crate::config::parameter;
use crate::model::rate_limit::{parse_rules, Operation, RateRule};
use cron::Schedule;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

/// 排名计算方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RankMode {
    /// 每次总星数变化后同步全量重算
    Incremental,
    /// 由计划任务定时重算
    Batch,
}

impl FromStr for RankMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "incremental" => Ok(RankMode::Incremental),
            "batch" => Ok(RankMode::Batch),
            other => Err(format!("unknown RANK_MODE `{other}`")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub submit_rules: Vec<RateRule>,
    pub query_rules: Vec<RateRule>,
    pub session_rules: Vec<RateRule>,
    pub trigger_rules: Vec<RateRule>,
    pub rank_mode: RankMode,
    pub rank_batch_cron: String,
    pub rank_batch_deadline: Duration,
    pub rank_write_batch: usize,
    pub rank_notify_threshold: u32,
    pub daily_challenge_cron: String,
    pub store_max_retries: u32,
    pub max_level_id: u32,
    pub push_daily_topic: String,
    /// 只有来自这些地址的请求才采信 X-Forwarded-For
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            submit_rules: vec![
                RateRule::new(10, Duration::from_secs(60)),
                RateRule::new(1, Duration::from_secs(1)),
            ],
            query_rules: vec![RateRule::new(20, Duration::from_secs(60))],
            session_rules: vec![RateRule::new(10, Duration::from_secs(60))],
            trigger_rules: vec![RateRule::new(5, Duration::from_secs(60))],
            rank_mode: RankMode::Incremental,
            rank_batch_cron: "0 */10 * * * *".to_string(),
            rank_batch_deadline: Duration::from_secs(60),
            rank_write_batch: 400,
            rank_notify_threshold: 10,
            daily_challenge_cron: "0 0 0 * * *".to_string(),
            store_max_retries: 5,
            max_level_id: 500,
            push_daily_topic: "daily_challenge".to_string(),
            trusted_proxies: vec![],
        }
    }
}

fn parse_number<T: FromStr>(name: &str, raw: String) -> Result<T, String> {
    raw.trim()
        .parse()
        .map_err(|_| format!("{name} must be a number, got `{raw}`"))
}

fn parse_proxies(raw: &str) -> Result<Vec<IpAddr>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<IpAddr>()
                .map_err(|_| format!("TRUSTED_PROXIES entry `{item}` is not an IP address"))
        })
        .collect()
}

fn check_cron(name: &str, expression: &str) -> Result<(), String> {
    Schedule::from_str(expression)
        .map(|_| ())
        .map_err(|err| format!("{name} `{expression}` is not a valid cron expression: {err}"))
}

impl GameConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(parameter::get_opt)
    }

    /// 没配置的项使用默认值
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = GameConfig::default();
        let rules = |name: &str, target: &mut Vec<RateRule>| -> Result<(), String> {
            if let Some(raw) = lookup(name) {
                *target = parse_rules(&raw).map_err(|err| format!("{name}: {err}"))?;
            }
            Ok(())
        };
        rules("RATE_LIMIT_SUBMIT", &mut config.submit_rules)?;
        rules("RATE_LIMIT_QUERY", &mut config.query_rules)?;
        rules("RATE_LIMIT_SESSION", &mut config.session_rules)?;
        rules("RATE_LIMIT_TRIGGER", &mut config.trigger_rules)?;

        if let Some(raw) = lookup("RANK_MODE") {
            config.rank_mode = raw.parse()?;
        }
        if let Some(raw) = lookup("RANK_BATCH_CRON") {
            config.rank_batch_cron = raw;
        }
        if let Some(raw) = lookup("RANK_BATCH_DEADLINE_SECS") {
            config.rank_batch_deadline =
                Duration::from_secs(parse_number("RANK_BATCH_DEADLINE_SECS", raw)?);
        }
        if let Some(raw) = lookup("RANK_WRITE_BATCH") {
            config.rank_write_batch = parse_number("RANK_WRITE_BATCH", raw)?;
        }
        if let Some(raw) = lookup("RANK_NOTIFY_THRESHOLD") {
            config.rank_notify_threshold = parse_number("RANK_NOTIFY_THRESHOLD", raw)?;
        }
        if let Some(raw) = lookup("DAILY_CHALLENGE_CRON") {
            config.daily_challenge_cron = raw;
        }
        if let Some(raw) = lookup("STORE_MAX_RETRIES") {
            config.store_max_retries = parse_number("STORE_MAX_RETRIES", raw)?;
        }
        if let Some(raw) = lookup("MAX_LEVEL_ID") {
            config.max_level_id = parse_number("MAX_LEVEL_ID", raw)?;
        }
        if let Some(raw) = lookup("PUSH_DAILY_TOPIC") {
            config.push_daily_topic = raw;
        }
        if let Some(raw) = lookup("TRUSTED_PROXIES") {
            config.trusted_proxies = parse_proxies(&raw)?;
        }

        if config.rank_write_batch == 0 {
            return Err("RANK_WRITE_BATCH must be positive".to_string());
        }
        check_cron("RANK_BATCH_CRON", &config.rank_batch_cron)?;
        check_cron("DAILY_CHALLENGE_CRON", &config.daily_challenge_cron)?;
        Ok(config)
    }

    pub fn rules_for(&self, operation: Operation) -> &[RateRule] {
        match operation {
            Operation::Submit => &self.submit_rules,
            Operation::Query => &self.query_rules,
            Operation::Session => &self.session_rules,
            Operation::Trigger => &self.trigger_rules,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<GameConfig, String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GameConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.rank_mode, RankMode::Incremental);
        assert_eq!(config.rank_notify_threshold, 10);
        assert_eq!(config.rules_for(Operation::Submit).len(), 2);
        assert_eq!(config.rules_for(Operation::Query)[0].limit, 20);
        assert!(config.trusted_proxies.is_empty());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("RANK_MODE", "batch"),
            ("RATE_LIMIT_QUERY", "50/30"),
            ("RANK_WRITE_BATCH", "100"),
            ("RANK_BATCH_CRON", "0 */5 * * * *"),
        ])
        .unwrap();
        assert_eq!(config.rank_mode, RankMode::Batch);
        assert_eq!(
            config.query_rules,
            vec![RateRule::new(50, Duration::from_secs(30))]
        );
        assert_eq!(config.rank_write_batch, 100);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(config_from(&[("RANK_MODE", "sometimes")]).is_err());
        assert!(config_from(&[("RANK_WRITE_BATCH", "0")]).is_err());
        assert!(config_from(&[("DAILY_CHALLENGE_CRON", "every midnight")]).is_err());
        assert!(config_from(&[("RATE_LIMIT_SUBMIT", "10")]).is_err());
        assert!(config_from(&[("TRUSTED_PROXIES", "10.0.0.1, lb.internal")]).is_err());
    }

    #[test]
    fn trusted_proxies_are_comma_separated_ips() {
        let config = config_from(&[("TRUSTED_PROXIES", "10.0.0.1, ::1,")]).unwrap();
        assert_eq!(
            config.trusted_proxies,
            vec![
                "10.0.0.1".parse::<IpAddr>().unwrap(),
                "::1".parse::<IpAddr>().unwrap()
            ]
        );
    }
}
