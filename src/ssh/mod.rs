// SSH 传输模块
//
// 模块结构:
// - config: 连接配置 (SshConfig, AuthMethod)
// - error: 错误类型 (SshError)
// - handler: russh Handler 实现
// - client: SSH 客户端核心（连接与认证）
// - session: SSH 会话 (SshSession, CommandOutput)

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod session;

// 公开导出
pub use client::SshClient;
pub use config::{AuthMethod, KeepaliveConfig, SshConfig, DEFAULT_SSH_PORT};
pub use error::SshError;
pub use session::{CommandOutput, SshSession};
