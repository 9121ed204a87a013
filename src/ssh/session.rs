// SSH 会话管理
// 连接成功后的会话对象，每次执行命令或传输文件都打开新的通道

use std::sync::atomic::{AtomicBool, Ordering};

use russh::client::Handle;
use russh::{ChannelMsg, Disconnect};
use russh_sftp::client::SftpSession;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use super::error::SshError;
use super::handler::SshClientHandler;

/// SSH 扩展数据类型 1 表示 stderr
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

/// SSH 会话（连接成功后）
pub struct SshSession {
    /// 会话 ID
    id: String,
    /// russh Handle
    handle: Handle<SshClientHandler>,
    /// 服务器主机名
    host: String,
    /// 连接状态
    is_connected: AtomicBool,
}

impl SshSession {
    /// 创建新的会话
    pub fn new(
        id: String,
        handle: Handle<SshClientHandler>,
        host: String,
    ) -> Self {
        Self {
            id,
            handle,
            host,
            is_connected: AtomicBool::new(true),
        }
    }

    /// 获取会话 ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 获取主机名
    pub fn host(&self) -> &str {
        &self.host
    }

    /// 检查会话是否活跃
    pub fn is_alive(&self) -> bool {
        self.is_connected.load(Ordering::Relaxed) && !self.handle.is_closed()
    }

    fn ensure_alive(&self) -> Result<(), SshError> {
        if !self.is_alive() {
            return Err(SshError::Disconnected(format!(
                "Session {} to {} is disconnected",
                self.id, self.host
            )));
        }
        Ok(())
    }

    /// 执行命令并收集输出
    ///
    /// `stdin` 在 exec 之后写入，随后发送 EOF。
    /// 退出码可能在 EOF 之后才到达，所以一直读到通道关闭。
    pub async fn exec(&self, command: &str, stdin: Option<&[u8]>) -> Result<CommandOutput, SshError> {
        self.ensure_alive()?;

        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(SshError::from)?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| SshError::Channel(e.to_string()))?;

        if let Some(input) = stdin {
            channel
                .data(input)
                .await
                .map_err(|e| SshError::Channel(e.to_string()))?;
        }
        channel
            .eof()
            .await
            .map_err(|e| SshError::Channel(e.to_string()))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = None;
        let mut exit_signal = None;

        while let Some(channel_msg) = channel.wait().await {
            match channel_msg {
                ChannelMsg::Data { data } => {
                    stdout.extend_from_slice(&data);
                }
                ChannelMsg::ExtendedData { data, ext } => {
                    if ext == SSH_EXTENDED_DATA_STDERR {
                        stderr.extend_from_slice(&data);
                    }
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    exit_code = Some(exit_status);
                }
                ChannelMsg::ExitSignal { signal_name, .. } => {
                    debug!(
                        "[SSH] [{}] Command killed by signal {:?}",
                        self.id, signal_name
                    );
                    exit_signal = Some(format!("{:?}", signal_name));
                }
                ChannelMsg::Close => break,
                _ => {}
            }
        }

        let exit_code = exit_code.ok_or_else(|| missing_exit_status(command, exit_signal))?;

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code,
        })
    }

    /// 打开 SFTP 子系统
    async fn open_sftp(&self) -> Result<SftpSession, SshError> {
        self.ensure_alive()?;

        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(SshError::from)?;

        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(SshError::from)?;

        SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| SshError::Sftp(format!("Failed to create SFTP session: {}", e)))
    }

    /// 通过 SFTP 读取远程文件
    pub async fn read_file(&self, path: &str) -> Result<Vec<u8>, SshError> {
        debug!("[SFTP] [{}] Reading file: {}", self.id, path);

        let sftp = self.open_sftp().await?;
        let mut file = sftp
            .open(path)
            .await
            .map_err(|e| SshError::Sftp(format!("Failed to open file {}: {}", path, e)))?;

        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .await
            .map_err(|e| SshError::Sftp(format!("Failed to read file {}: {}", path, e)))?;

        debug!("[SFTP] [{}] Read {} bytes from {}", self.id, content.len(), path);
        Ok(content)
    }

    /// 通过 SFTP 写入远程文件（覆盖）
    pub async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), SshError> {
        debug!("[SFTP] [{}] Writing {} bytes to {}", self.id, content.len(), path);

        let sftp = self.open_sftp().await?;
        let mut file = sftp
            .create(path)
            .await
            .map_err(|e| SshError::Sftp(format!("Failed to create file {}: {}", path, e)))?;

        file.write_all(content)
            .await
            .map_err(|e| SshError::Sftp(format!("Failed to write file {}: {}", path, e)))?;
        file.shutdown()
            .await
            .map_err(|e| SshError::Sftp(format!("Failed to flush file {}: {}", path, e)))?;

        Ok(())
    }

    /// 关闭会话
    pub async fn close(&self) -> Result<(), SshError> {
        if !self.is_connected.swap(false, Ordering::Relaxed) {
            return Ok(());
        }
        debug!("[SSH] [{}] Closing session to {}", self.id, self.host);
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(SshError::from)
    }
}

/// 通道关闭但没有退出码时的错误，被信号终止时带上信号名
fn missing_exit_status(command: &str, signal: Option<String>) -> SshError {
    match signal {
        Some(signal) => SshError::Channel(format!(
            "Command killed by signal {}: {}",
            signal, command
        )),
        None => SshError::Channel(format!(
            "Channel closed without exit status for command: {}",
            command
        )),
    }
}

/// 命令输出
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// 标准输出
    pub stdout: Vec<u8>,
    /// 标准错误
    pub stderr: Vec<u8>,
    /// 退出码
    pub exit_code: u32,
}

impl CommandOutput {
    /// 获取标准输出字符串
    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// 获取标准错误字符串
    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// 按行拆分的标准输出
    pub fn stdout_lines(&self) -> Vec<String> {
        self.stdout_string().lines().map(str::to_string).collect()
    }

    /// 按行拆分的标准错误
    pub fn stderr_lines(&self) -> Vec<String> {
        self.stderr_string().lines().map(str::to_string).collect()
    }

    /// 检查命令是否成功
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}
