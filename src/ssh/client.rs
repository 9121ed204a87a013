// SSH 客户端核心实现

use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Duration;

use russh::client::{AuthResult, Handle};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::config::{AuthMethod, SshConfig};
use super::error::SshError;
use super::handler::SshClientHandler;
use super::session::SshSession;

/// SSH 客户端
/// 负责建立 SSH 连接并返回 SshSession
pub struct SshClient {
    /// 连接配置
    config: SshConfig,
}

impl SshClient {
    /// 创建新的 SSH 客户端
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    /// 执行连接，返回认证完成的 SshSession
    pub async fn connect(&self) -> Result<SshSession, SshError> {
        let session_id = uuid::Uuid::new_v4().to_string();
        debug!(
            "[SSH] [{}] Connecting to {}",
            session_id,
            self.config.target()
        );

        // 解析地址
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let socket_addr = addr
            .to_socket_addrs()
            .map_err(|e| SshError::Config(format!("Failed to resolve address {}: {}", addr, e)))?
            .next()
            .ok_or_else(|| SshError::Config(format!("No valid address found for {}", addr)))?;

        // TCP 连接
        let connect_timeout = Duration::from_secs(self.config.connect_timeout);
        let tcp_stream = timeout(connect_timeout, TcpStream::connect(socket_addr))
            .await
            .map_err(|_| SshError::Timeout(connect_timeout))?
            .map_err(SshError::Io)?;

        // SSH 握手
        let russh_config = Arc::new(self.config.to_russh_config());
        let handler = SshClientHandler::new(self.config.host.clone());

        let mut handle = timeout(
            connect_timeout,
            russh::client::connect_stream(russh_config, tcp_stream, handler),
        )
        .await
        .map_err(|_| SshError::Timeout(connect_timeout))?
        .map_err(SshError::from)?;

        debug!("[SSH] [{}] Handshake completed", session_id);

        self.authenticate(&mut handle).await?;

        info!(
            "[SSH] [{}] Connected to {}",
            session_id,
            self.config.target()
        );

        Ok(SshSession::new(
            session_id,
            handle,
            self.config.host.clone(),
        ))
    }

    /// 依次尝试所有认证方式，任意一种成功即返回
    async fn authenticate(&self, handle: &mut Handle<SshClientHandler>) -> Result<(), SshError> {
        if self.config.auth.is_empty() {
            return Err(SshError::Auth(format!(
                "No authentication methods configured for {}",
                self.config.target()
            )));
        }

        let mut failures = Vec::new();

        for method in &self.config.auth {
            let result = match method {
                AuthMethod::PrivateKey {
                    key_pem,
                    passphrase,
                } => {
                    let key = match russh::keys::decode_secret_key(key_pem, passphrase.as_deref())
                    {
                        Ok(key) => key,
                        Err(e) => {
                            warn!(
                                "[SSH] Skipping undecodable private key for {}: {}",
                                self.config.target(),
                                e
                            );
                            failures.push(format!("key decode: {}", e));
                            continue;
                        }
                    };

                    // RSA 密钥需要协商签名哈希，否则新版 sshd 会拒绝 ssh-rsa(SHA1)
                    let hash_alg = handle
                        .best_supported_rsa_hash()
                        .await
                        .map_err(SshError::from)?
                        .flatten();
                    let key_with_alg = russh::keys::PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg);

                    handle
                        .authenticate_publickey(&self.config.username, key_with_alg)
                        .await
                        .map_err(SshError::from)?
                }
                AuthMethod::Password(password) => handle
                    .authenticate_password(&self.config.username, password)
                    .await
                    .map_err(SshError::from)?,
            };

            match result {
                AuthResult::Success => {
                    debug!("[SSH] Authenticated {} with {:?}", self.config.target(), method);
                    return Ok(());
                }
                AuthResult::Failure {
                    remaining_methods,
                    partial_success,
                } => {
                    failures.push(format!(
                        "{:?} rejected (partial: {}, server suggests: {:?})",
                        method, partial_success, remaining_methods
                    ));
                }
            }
        }

        Err(SshError::Auth(format!(
            "All authentication methods failed for {}: {}",
            self.config.target(),
            failures.join("; ")
        )))
    }
}
