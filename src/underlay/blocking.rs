// 同步门面
// 持有 Tokio 运行时，每个调用阻塞直到远程操作完成

use std::path::Path;
use std::sync::Arc;

use tokio::runtime::Runtime;

use super::command::RunOptions;
use super::connector::{Connector, RusshConnector};
use super::directory::UnderlayDirectory;
use super::error::UnderlayError;
use super::lookup::Lookup;
use crate::models::{SshRecord, UnderlayConfig};
use crate::retry::RetryPolicy;
use crate::ssh::CommandOutput;

/// 阻塞式 Underlay 目录
pub struct BlockingUnderlay {
    /// Tokio 运行时，用于执行所有 SSH 异步任务
    runtime: Runtime,
    directory: UnderlayDirectory,
}

impl BlockingUnderlay {
    /// 使用 russh 连接器构建
    pub fn new(config: UnderlayConfig) -> Result<Self, UnderlayError> {
        Self::with_connector(config, Arc::new(RusshConnector::new()))
    }

    /// 使用指定连接器构建
    pub fn with_connector(
        config: UnderlayConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, UnderlayError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .thread_name("underlay-ssh")
            .build()
            .map_err(UnderlayError::Runtime)?;

        let directory =
            runtime.block_on(UnderlayDirectory::build(config.ssh, config.settings, connector))?;

        Ok(Self { runtime, directory })
    }

    /// 获取异步目录
    pub fn directory(&self) -> &UnderlayDirectory {
        &self.directory
    }

    pub fn node_names(&self) -> Vec<String> {
        self.directory.node_names().map(str::to_string).collect()
    }

    pub fn host_by_node_name(
        &self,
        node_name: &str,
        address_pool: Option<&str>,
    ) -> Result<&str, UnderlayError> {
        self.directory.host_by_node_name(node_name, address_pool)
    }

    pub fn resolve(&self, lookup: &Lookup) -> Result<&SshRecord, UnderlayError> {
        self.directory.resolve(lookup)
    }

    pub fn run(&self, lookup: &Lookup, command: &str) -> Result<CommandOutput, UnderlayError> {
        self.runtime.block_on(self.directory.run(lookup, command))
    }

    pub fn run_privileged(
        &self,
        lookup: &Lookup,
        command: &str,
    ) -> Result<CommandOutput, UnderlayError> {
        self.runtime
            .block_on(self.directory.run_privileged(lookup, command))
    }

    pub fn run_with(
        &self,
        lookup: &Lookup,
        command: &str,
        options: &RunOptions,
    ) -> Result<CommandOutput, UnderlayError> {
        self.runtime
            .block_on(self.directory.run_with(lookup, command, options))
    }

    pub fn run_until_success(
        &self,
        lookup: &Lookup,
        command: &str,
        options: &RunOptions,
        policy: &RetryPolicy,
    ) -> Result<CommandOutput, UnderlayError> {
        self.runtime.block_on(
            self.directory
                .run_until_success(lookup, command, options, policy),
        )
    }

    pub fn wait_ready(&self, lookup: &Lookup, policy: &RetryPolicy) -> Result<(), UnderlayError> {
        self.runtime
            .block_on(self.directory.wait_ready(lookup, policy))
    }

    pub fn upload(
        &self,
        lookup: &Lookup,
        local_path: &Path,
        remote_path: &str,
    ) -> Result<(), UnderlayError> {
        self.runtime
            .block_on(self.directory.upload(lookup, local_path, remote_path))
    }

    pub fn read_remote_file(
        &self,
        lookup: &Lookup,
        remote_path: &str,
    ) -> Result<Vec<u8>, UnderlayError> {
        self.runtime
            .block_on(self.directory.read_remote_file(lookup, remote_path))
    }
}
