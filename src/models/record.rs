// SSH 访问记录数据结构

use serde::{Deserialize, Serialize};

use crate::models::settings::UnderlaySettings;
use crate::ssh::{AuthMethod, KeepaliveConfig, SshConfig, DEFAULT_SSH_PORT};
use crate::underlay::UnderlayError;

/// 原始描述符（配置文件中的一项）
/// 所有字段在解析时都是可选的，校验时再报告缺失的字段
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SshDescriptor {
    pub node_name: Option<String>,
    pub address_pool: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub login: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub keys: Vec<String>,
    pub keys_source_host: Option<String>,
}

impl SshDescriptor {
    /// 使用必填字段创建描述符
    pub fn new(
        node_name: impl Into<String>,
        host: impl Into<String>,
        login: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            node_name: Some(node_name.into()),
            host: Some(host.into()),
            login: Some(login.into()),
            password: Some(password.into()),
            ..Default::default()
        }
    }

    pub fn address_pool(mut self, pool: impl Into<String>) -> Self {
        self.address_pool = Some(pool.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn key(mut self, key_pem: impl Into<String>) -> Self {
        self.keys.push(key_pem.into());
        self
    }

    pub fn keys_source_host(mut self, source: impl Into<String>) -> Self {
        self.keys_source_host = Some(source.into());
        self
    }
}

impl std::fmt::Debug for SshDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshDescriptor")
            .field("node_name", &self.node_name)
            .field("address_pool", &self.address_pool)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("login", &self.login)
            .field("keys", &self.keys.len())
            .field("keys_source_host", &self.keys_source_host)
            .finish_non_exhaustive()
    }
}

/// 规范化后的 SSH 访问记录
/// 每个 (节点, 地址池) 对应一条；目录构建完成后不可修改
#[derive(Clone, PartialEq, Eq)]
pub struct SshRecord {
    pub node_name: String,
    pub address_pool: Option<String>,
    pub host: String,
    /// 存储时不填默认值，连接时才回落到 22
    pub port: Option<u16>,
    pub login: String,
    pub password: String,
    /// 私钥内容，配置的在前，从 keys_source_host 拉取的追加在后
    pub keys: Vec<String>,
    pub keys_source_host: Option<String>,
}

/// 去掉首尾空白，空字符串视为未设置
fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 取出必填字段（去掉首尾空白），空字符串视为缺失
fn required(
    index: usize,
    field: &'static str,
    value: Option<String>,
) -> Result<String, UnderlayError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(UnderlayError::Configuration(format!(
            "SSH descriptor #{} is missing required field '{}'",
            index, field
        ))),
    }
}

impl SshRecord {
    /// 校验描述符并生成记录
    pub fn from_descriptor(index: usize, descriptor: SshDescriptor) -> Result<Self, UnderlayError> {
        let node_name = required(index, "node_name", descriptor.node_name)?;
        let host = required(index, "host", descriptor.host)?;
        let login = required(index, "login", descriptor.login)?;
        let password = required(index, "password", descriptor.password)?;

        if descriptor.port == Some(0) {
            return Err(UnderlayError::Configuration(format!(
                "SSH descriptor #{} ({}) has invalid port 0",
                index, node_name
            )));
        }

        Ok(Self {
            node_name,
            address_pool: optional(descriptor.address_pool),
            host,
            port: descriptor.port,
            login,
            password,
            keys: descriptor.keys,
            keys_source_host: optional(descriptor.keys_source_host),
        })
    }

    /// 连接端口（未配置时为 22）
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_SSH_PORT)
    }

    /// 构建 SSH 连接配置：先按顺序尝试私钥，最后尝试密码
    pub fn to_ssh_config(&self, settings: &UnderlaySettings) -> SshConfig {
        let mut auth: Vec<AuthMethod> = self
            .keys
            .iter()
            .map(|key| AuthMethod::PrivateKey {
                key_pem: key.clone(),
                passphrase: None,
            })
            .collect();
        auth.push(AuthMethod::Password(self.password.clone()));

        SshConfig {
            host: self.host.clone(),
            port: self.effective_port(),
            username: self.login.clone(),
            auth,
            connect_timeout: settings.connect_timeout_secs,
            keepalive: KeepaliveConfig {
                enabled: settings.keepalive_interval_secs > 0,
                interval: settings.keepalive_interval_secs,
                max_retries: 3,
            },
        }
    }
}

// 密码和私钥不进日志
impl std::fmt::Debug for SshRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshRecord")
            .field("node_name", &self.node_name)
            .field("address_pool", &self.address_pool)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("login", &self.login)
            .field("keys", &self.keys.len())
            .field("keys_source_host", &self.keys_source_host)
            .finish_non_exhaustive()
    }
}
