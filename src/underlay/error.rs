// Underlay 错误类型定义

use std::path::PathBuf;

use thiserror::Error;

use crate::retry::RetryError;
use crate::ssh::SshError;

/// Underlay 目录错误类型
#[derive(Debug, Error)]
pub enum UnderlayError {
    /// 描述符缺少必填字段或字段非法
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 按名称 / 地址 / 地址池查找不到记录
    #[error("No SSH record found for {lookup}")]
    RecordNotFound { lookup: String },

    /// keys_source_host 无法解析或密钥拉取失败
    #[error("Cannot harvest keys for '{record}' from '{source_host}': {reason}")]
    KeySource {
        record: String,
        source_host: String,
        reason: String,
    },

    /// 远程命令退出码不在允许范围内
    #[error(
        "Command '{command}' on {host} exited with {exit_code}, expected one of {expected:?}{}\nstdout:\n{stdout}\nstderr:\n{stderr}",
        .info.as_deref().map(|i| format!(" ({})", i)).unwrap_or_default()
    )]
    RemoteCommand {
        host: String,
        command: String,
        exit_code: u32,
        expected: Vec<u32>,
        stdout: String,
        stderr: String,
        info: Option<String>,
    },

    /// 本地文件读取失败（上传前）
    #[error("Cannot read local file {}: {source}", .path.display())]
    LocalFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 传输层错误（连接、认证、通道）
    #[error("Connection error: {0}")]
    Connection(#[from] SshError),

    /// 轮询超时
    #[error(transparent)]
    Retry(#[from] RetryError),

    /// 运行时创建失败
    #[error("Runtime error: {0}")]
    Runtime(std::io::Error),
}

impl UnderlayError {
    /// 远程命令失败时的退出码
    pub fn exit_code(&self) -> Option<u32> {
        match self {
            Self::RemoteCommand { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}
