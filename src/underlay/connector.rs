// 目录与传输层之间的接口
//
// Connector 负责建立连接，RemoteSession 是已认证的远程执行句柄。
// 生产环境使用 RusshConnector，测试中用内存实现替换。

use async_trait::async_trait;

use crate::ssh::{CommandOutput, SshClient, SshConfig, SshError, SshSession};

/// 已建立的远程会话
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// 会话 ID（日志关联用）
    fn id(&self) -> &str;

    /// 远程主机
    fn host(&self) -> &str;

    /// 执行命令，可选地写入 stdin
    async fn exec(&self, command: &str, stdin: Option<&[u8]>) -> Result<CommandOutput, SshError>;

    /// 读取远程文件
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, SshError>;

    /// 写入远程文件
    async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), SshError>;

    /// 关闭连接
    async fn close(&self) -> Result<(), SshError>;
}

/// 连接器
#[async_trait]
pub trait Connector: Send + Sync {
    /// 建立新连接；每次调用都是独立的连接
    async fn connect(&self, config: &SshConfig) -> Result<Box<dyn RemoteSession>, SshError>;
}

/// 基于 russh 的连接器
#[derive(Clone, Debug, Default)]
pub struct RusshConnector;

impl RusshConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for RusshConnector {
    async fn connect(&self, config: &SshConfig) -> Result<Box<dyn RemoteSession>, SshError> {
        let session = SshClient::new(config.clone()).connect().await?;
        Ok(Box::new(session))
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    fn id(&self) -> &str {
        SshSession::id(self)
    }

    fn host(&self) -> &str {
        SshSession::host(self)
    }

    async fn exec(&self, command: &str, stdin: Option<&[u8]>) -> Result<CommandOutput, SshError> {
        SshSession::exec(self, command, stdin).await
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, SshError> {
        SshSession::read_file(self, path).await
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), SshError> {
        SshSession::write_file(self, path, content).await
    }

    async fn close(&self) -> Result<(), SshError> {
        SshSession::close(self).await
    }
}
