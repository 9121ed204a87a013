// 数据模型模块

pub mod record;
pub mod settings;

pub use record::{SshDescriptor, SshRecord};
pub use settings::{UnderlayConfig, UnderlaySettings};
