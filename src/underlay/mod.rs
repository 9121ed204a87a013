// Underlay 目录模块
//
// 模块结构:
// - directory: SSH 访问目录 (UnderlayDirectory)
// - lookup: 查找键 (Lookup)
// - command: 执行选项与提权 (RunOptions)
// - connector: 目录与传输层的接口 (Connector, RemoteSession, RusshConnector)
// - blocking: 同步门面 (BlockingUnderlay)
// - error: 错误类型 (UnderlayError)

pub mod blocking;
pub mod command;
pub mod connector;
pub mod directory;
pub mod error;
pub mod lookup;

#[cfg(test)]
pub(crate) mod testing;

// 公开导出
pub use blocking::BlockingUnderlay;
pub use command::RunOptions;
pub use connector::{Connector, RemoteSession, RusshConnector};
pub use directory::UnderlayDirectory;
pub use error::UnderlayError;
pub use lookup::Lookup;
