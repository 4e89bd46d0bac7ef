use std::collections::HashSet;

use dotenv;
use once_cell::sync::OnceCell;

pub static CMD_ARGS: OnceCell<HashSet<String>> = OnceCell::new();

pub fn init() {
    // .env 不存在时直接用进程环境变量
    dotenv::dotenv().ok();
    // 给日志库设置环境变量
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "debug")
    }
    for required in ["JWT_SECRET", "ADMIN_SECRET"] {
        if std::env::var_os(required).is_none() {
            panic!("config -- env var `{}` is not exist ", required);
        }
    }
    let _ = CMD_ARGS.set(std::env::args().collect());
}

pub fn get(parameter: &str) -> String {
    let env_parameter = std::env::var(parameter)
        .unwrap_or_else(|_| panic!("{} is not defined in the environment.", parameter));
    return env_parameter;
}

pub fn get_opt(parameter: &str) -> Option<String> {
    std::env::var(parameter).ok().filter(|value| !value.trim().is_empty())
}

pub fn get_or(parameter: &str, default: &str) -> String {
    get_opt(parameter).unwrap_or_else(|| default.to_string())
}

/// 启动参数里是否带了某个开关
pub fn has_flag(flag: &str) -> bool {
    CMD_ARGS
        .get()
        .map(|args| args.contains(flag))
        .unwrap_or(false)
}
