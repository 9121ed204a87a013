// Underlay 配置数据结构

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::record::SshDescriptor;
use crate::retry::RetryPolicy;

// ======================== 主配置结构 ========================

/// 配置文件的完整内容
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UnderlayConfig {
    #[serde(default)]
    pub settings: UnderlaySettings,
    #[serde(default)]
    pub ssh: Vec<SshDescriptor>,
}

/// Underlay 设置
/// 进程启动时构建一次，显式传给目录，之后只读
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UnderlaySettings {
    /// 连接超时（秒）
    pub connect_timeout_secs: u64,
    /// 心跳间隔（秒），0 表示关闭
    pub keepalive_interval_secs: u64,
    /// 默认命令超时（秒），0 表示不限制
    pub command_timeout_secs: u64,
    /// keys_source_host 上拉取的私钥路径
    pub default_key_path: String,
    /// 等待节点 SSH 可用的总时长（秒）
    pub ready_timeout_secs: u64,
    /// 等待节点 SSH 可用的初始间隔（秒）
    pub ready_interval_secs: u64,
}

impl Default for UnderlaySettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            keepalive_interval_secs: 60,
            command_timeout_secs: 0,
            default_key_path: "/root/.ssh/id_rsa".to_string(),
            ready_timeout_secs: 300,
            ready_interval_secs: 5,
        }
    }
}

impl UnderlaySettings {
    /// 默认命令超时
    pub fn command_timeout(&self) -> Option<Duration> {
        (self.command_timeout_secs > 0).then(|| Duration::from_secs(self.command_timeout_secs))
    }

    /// 等待节点就绪的重试策略
    pub fn ready_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_secs(self.ready_timeout_secs),
            Duration::from_secs(self.ready_interval_secs.max(1)),
        )
        .backoff(1.5)
        .max_interval(Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_use_defaults() {
        let settings: UnderlaySettings =
            serde_json::from_str(r#"{ "connect_timeout_secs": 10 }"#).unwrap();
        assert_eq!(settings.connect_timeout_secs, 10);
        assert_eq!(settings.default_key_path, "/root/.ssh/id_rsa");
        assert_eq!(settings.command_timeout(), None);
    }

    #[test]
    fn test_command_timeout() {
        let settings = UnderlaySettings {
            command_timeout_secs: 600,
            ..Default::default()
        };
        assert_eq!(settings.command_timeout(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_ready_policy() {
        let policy = UnderlaySettings::default().ready_policy();
        assert_eq!(policy.timeout, Duration::from_secs(300));
        assert_eq!(policy.interval, Duration::from_secs(5));
        assert_eq!(policy.max_interval, Duration::from_secs(30));
    }
}
