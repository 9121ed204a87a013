// 配置文件加载服务

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::UnderlayConfig;

/// 获取配置目录路径
/// Linux: ~/.config/underlay
/// macOS: ~/Library/Application Support/underlay
pub fn get_config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .context("无法获取系统配置目录")?
        .join("underlay"))
}

/// 获取默认配置文件路径
pub fn get_config_file() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("underlay.json"))
}

/// 解析配置内容
pub fn parse_config(content: &str) -> Result<UnderlayConfig> {
    let config: UnderlayConfig = serde_json::from_str(content).context("无法解析 underlay 配置")?;
    Ok(config)
}

/// 从指定路径加载配置
pub fn load_config(path: &Path) -> Result<UnderlayConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("无法读取 underlay 配置文件 {}", path.display()))?;
    parse_config(&content).with_context(|| format!("配置文件 {} 格式错误", path.display()))
}

/// 加载默认位置的配置
pub fn load_default_config() -> Result<UnderlayConfig> {
    let path = get_config_file()?;
    load_config(&path)
}

/// 保存配置（生成示例文件或导出合并后的配置时使用）
pub fn save_config(path: &Path, config: &UnderlayConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).context("无法创建配置目录")?;
        }
    }
    let content = serde_json::to_string_pretty(config).context("无法序列化 underlay 配置")?;
    fs::write(path, content).context("无法写入 underlay 配置文件")?;
    Ok(())
}
