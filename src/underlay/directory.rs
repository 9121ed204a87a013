// Underlay SSH 访问目录
//
// 从描述符列表构建一次，之后只读。负责按节点名 / 地址 / 地址池解析记录，
// 以及通过解析出的记录执行远程命令和文件传输。

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::command::{build_invocation, RunOptions};
use super::connector::{Connector, RemoteSession, RusshConnector};
use super::error::UnderlayError;
use super::lookup::Lookup;
use crate::models::{SshDescriptor, SshRecord, UnderlayConfig, UnderlaySettings};
use crate::retry::{retry_until, RetryPolicy};
use crate::ssh::{CommandOutput, SshError};

/// Underlay SSH 访问目录
pub struct UnderlayDirectory {
    /// 按插入顺序保存的记录
    records: Vec<SshRecord>,
    /// 设置
    settings: UnderlaySettings,
    /// 连接器
    connector: Arc<dyn Connector>,
}

impl UnderlayDirectory {
    /// 使用 russh 连接器从配置构建目录
    pub async fn from_config(config: UnderlayConfig) -> Result<Self, UnderlayError> {
        Self::build(config.ssh, config.settings, Arc::new(RusshConnector::new())).await
    }

    /// 构建目录
    ///
    /// 带 `keys_source_host` 的描述符必须引用列表中更早的记录（按 host，其次按节点名）；
    /// 构建时会连接该记录，读取 `default_key_path` 并追加到当前记录的密钥之后。
    pub async fn build(
        descriptors: Vec<SshDescriptor>,
        settings: UnderlaySettings,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, UnderlayError> {
        let mut records: Vec<SshRecord> = Vec::with_capacity(descriptors.len());

        for (index, descriptor) in descriptors.into_iter().enumerate() {
            let mut record = SshRecord::from_descriptor(index, descriptor)?;

            if let Some(source_host) = record.keys_source_host.clone() {
                let harvested =
                    harvest_keys(&records, &record, &source_host, &settings, connector.as_ref())
                        .await?;
                record.keys.extend(harvested);
            }

            records.push(record);
        }

        warn_on_collisions(&records);

        info!("[Underlay] Directory built with {} SSH records", records.len());

        Ok(Self {
            records,
            settings,
            connector,
        })
    }

    /// 所有记录（只读）
    pub fn records(&self) -> &[SshRecord] {
        &self.records
    }

    /// 设置
    pub fn settings(&self) -> &UnderlaySettings {
        &self.settings
    }

    /// 按首次出现顺序返回不重复的节点名
    pub fn node_names(&self) -> impl Iterator<Item = &str> + '_ {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .map(|record| record.node_name.as_str())
            .filter(move |name| seen.insert(*name))
    }

    /// 按节点名（和地址池）获取 host
    pub fn host_by_node_name(
        &self,
        node_name: &str,
        address_pool: Option<&str>,
    ) -> Result<&str, UnderlayError> {
        let mut lookup = Lookup::node(node_name);
        lookup.address_pool = address_pool.map(str::to_string);
        self.resolve(&lookup).map(|record| record.host.as_str())
    }

    /// 解析记录
    pub fn resolve(&self, lookup: &Lookup) -> Result<&SshRecord, UnderlayError> {
        lookup
            .find(&self.records)
            .ok_or_else(|| UnderlayError::RecordNotFound {
                lookup: lookup.to_string(),
            })
    }

    /// 打开到指定节点的新连接，由调用方负责关闭
    pub async fn open_connection(
        &self,
        lookup: &Lookup,
    ) -> Result<Box<dyn RemoteSession>, UnderlayError> {
        let record = self.resolve(lookup)?;
        self.connect_record(record).await
    }

    async fn connect_record(
        &self,
        record: &SshRecord,
    ) -> Result<Box<dyn RemoteSession>, UnderlayError> {
        let config = record.to_ssh_config(&self.settings);
        debug!(
            "[Underlay] Connecting to {} ({})",
            record.node_name,
            config.target()
        );
        Ok(self.connector.connect(&config).await?)
    }

    /// 以默认选项执行命令（只接受退出码 0）
    pub async fn run(&self, lookup: &Lookup, command: &str) -> Result<CommandOutput, UnderlayError> {
        self.run_with(lookup, command, &RunOptions::default()).await
    }

    /// 通过 sudo 执行命令
    pub async fn run_privileged(
        &self,
        lookup: &Lookup,
        command: &str,
    ) -> Result<CommandOutput, UnderlayError> {
        self.run_with(lookup, command, &RunOptions::default().privileged(true))
            .await
    }

    /// 执行命令
    ///
    /// 每次调用打开新连接，执行完毕后关闭。退出码不在 `options.expected` 中且
    /// `raise_on_error` 为 true 时返回 [`UnderlayError::RemoteCommand`]。
    pub async fn run_with(
        &self,
        lookup: &Lookup,
        command: &str,
        options: &RunOptions,
    ) -> Result<CommandOutput, UnderlayError> {
        let record = self.resolve(lookup)?;
        let session = self.connect_record(record).await?;

        let result = self.exec_on(session.as_ref(), record, command, options).await;
        close_session(session.as_ref()).await;
        let output = result?;

        if options.verbose {
            info!(
                "[Underlay] [{}] '{}' exited with {}",
                record.host, command, output.exit_code
            );
        }

        if !options.accepts(output.exit_code) {
            if options.raise_on_error {
                return Err(UnderlayError::RemoteCommand {
                    host: record.host.clone(),
                    command: command.to_string(),
                    exit_code: output.exit_code,
                    expected: options.expected.clone(),
                    stdout: output.stdout_string(),
                    stderr: output.stderr_string(),
                    info: options.error_info.clone(),
                });
            }
            warn!(
                "[Underlay] [{}] '{}' exited with {} (expected {:?})",
                record.host, command, output.exit_code, options.expected
            );
        }

        Ok(output)
    }

    async fn exec_on(
        &self,
        session: &dyn RemoteSession,
        record: &SshRecord,
        command: &str,
        options: &RunOptions,
    ) -> Result<CommandOutput, UnderlayError> {
        let invocation =
            build_invocation(command, options.privileged, &record.login, &record.password);

        if options.verbose {
            info!("[Underlay] [{}] Executing: {}", record.host, command);
        } else {
            debug!(
                "[Underlay] [{}] [{}] Executing: {}",
                record.host,
                session.id(),
                command
            );
        }

        let exec = session.exec(&invocation.command, invocation.stdin.as_deref());
        let output = match options.timeout.or_else(|| self.settings.command_timeout()) {
            Some(limit) => tokio::time::timeout(limit, exec)
                .await
                .map_err(|_| SshError::Timeout(limit))??,
            None => exec.await?,
        };

        Ok(output)
    }

    /// 重复执行命令直到退出码可接受（例如等待 dpkg 锁释放）
    pub async fn run_until_success(
        &self,
        lookup: &Lookup,
        command: &str,
        options: &RunOptions,
        policy: &RetryPolicy,
    ) -> Result<CommandOutput, UnderlayError> {
        let options = options.clone().raise_on_error(true);
        let options = &options;
        let operation = format!("'{}' on {}", command, lookup);
        let output = retry_until(policy, &operation, move || {
            self.run_with(lookup, command, options)
        })
        .await?;
        Ok(output)
    }

    /// 等待节点 SSH 可用（新建虚拟机启动中）
    pub async fn wait_ready(
        &self,
        lookup: &Lookup,
        policy: &RetryPolicy,
    ) -> Result<(), UnderlayError> {
        // 查不到记录不需要重试
        self.resolve(lookup)?;

        let operation = format!("ssh to {}", lookup);
        retry_until(policy, &operation, || async move {
            let session = self.open_connection(lookup).await?;
            close_session(session.as_ref()).await;
            Ok::<(), UnderlayError>(())
        })
        .await?;

        info!("[Underlay] {} is reachable over SSH", lookup);
        Ok(())
    }

    /// 上传本地文件到节点
    pub async fn upload(
        &self,
        lookup: &Lookup,
        local_path: &Path,
        remote_path: &str,
    ) -> Result<(), UnderlayError> {
        let content =
            tokio::fs::read(local_path)
                .await
                .map_err(|source| UnderlayError::LocalFile {
                    path: local_path.to_path_buf(),
                    source,
                })?;
        let record = self.resolve(lookup)?;

        info!(
            "[Underlay] [{}] Uploading {} -> {} ({} bytes)",
            record.host,
            local_path.display(),
            remote_path,
            content.len()
        );

        let session = self.connect_record(record).await?;
        let result = session.write_file(remote_path, &content).await;
        close_session(session.as_ref()).await;
        Ok(result?)
    }

    /// 读取节点上的文件
    pub async fn read_remote_file(
        &self,
        lookup: &Lookup,
        remote_path: &str,
    ) -> Result<Vec<u8>, UnderlayError> {
        let session = self.open_connection(lookup).await?;
        let result = session.read_file(remote_path).await;
        close_session(session.as_ref()).await;
        Ok(result?)
    }
}

/// 关闭会话，失败只记录日志
async fn close_session(session: &dyn RemoteSession) {
    if let Err(e) = session.close().await {
        warn!(
            "[Underlay] [{}] Failed to close session {}: {}",
            session.host(),
            session.id(),
            e
        );
    }
}

/// 从 keys_source_host 指向的更早记录上拉取默认私钥
async fn harvest_keys(
    earlier: &[SshRecord],
    record: &SshRecord,
    source_host: &str,
    settings: &UnderlaySettings,
    connector: &dyn Connector,
) -> Result<Vec<String>, UnderlayError> {
    let key_source_error = |reason: String| UnderlayError::KeySource {
        record: record.node_name.clone(),
        source_host: source_host.to_string(),
        reason,
    };

    let source = Lookup::host(source_host)
        .find(earlier)
        .or_else(|| Lookup::node(source_host).find(earlier))
        .ok_or_else(|| {
            if source_host == record.host || source_host == record.node_name {
                key_source_error("record refers to itself".to_string())
            } else {
                key_source_error(
                    "no earlier record has this host or node name (keys sources must be listed first)"
                        .to_string(),
                )
            }
        })?;

    debug!(
        "[Underlay] Harvesting {} from {} for {}",
        settings.default_key_path, source.host, record.node_name
    );

    let session = connector
        .connect(&source.to_ssh_config(settings))
        .await
        .map_err(|e| key_source_error(e.to_string()))?;
    let content = session.read_file(&settings.default_key_path).await;
    close_session(session.as_ref()).await;

    let content = content.map_err(|e| key_source_error(e.to_string()))?;
    let key = String::from_utf8(content).map_err(|_| {
        key_source_error(format!("{} is not valid UTF-8", settings.default_key_path))
    })?;

    if key.trim().is_empty() {
        return Err(key_source_error(format!(
            "{} is empty",
            settings.default_key_path
        )));
    }

    Ok(vec![key])
}

/// 重复的 host 或 (节点, 地址池) 不报错，按插入顺序第一条生效
fn warn_on_collisions(records: &[SshRecord]) {
    let mut hosts = HashSet::new();
    let mut pairs = HashSet::new();

    for record in records {
        if !hosts.insert(record.host.as_str()) {
            warn!(
                "[Underlay] Host {} is used by more than one record; lookups by host return the first ({})",
                record.host, record.node_name
            );
        }
        if !pairs.insert((record.node_name.as_str(), record.address_pool.as_deref())) {
            warn!(
                "[Underlay] Duplicate record for node {} pool {:?}; only the first is reachable",
                record.node_name, record.address_pool
            );
        }
    }
}
