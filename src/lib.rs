// Underlay - 测试环境节点的 SSH 访问目录
//
// 模块结构:
// - underlay: 访问目录、查找、远程执行
// - ssh: 基于 russh 的传输层
// - models: 描述符、记录与设置
// - services: 配置文件加载
// - retry: 有界重试

pub mod models;
pub mod retry;
pub mod services;
pub mod ssh;
pub mod underlay;

pub use models::{SshDescriptor, SshRecord, UnderlayConfig, UnderlaySettings};
pub use retry::{retry_until, wait_for, RetryError, RetryPolicy};
pub use ssh::{CommandOutput, SshError};
pub use underlay::{
    BlockingUnderlay, Connector, Lookup, RemoteSession, RunOptions, RusshConnector,
    UnderlayDirectory, UnderlayError,
};
