// SSH 客户端 Handler 实现
// 实现 russh::client::Handler trait

use russh::keys::PublicKey;
use std::future::Future;
use tracing::debug;

/// SSH 客户端 Handler
/// 处理 SSH 连接过程中的回调
pub struct SshClientHandler {
    /// 服务器主机名（用于日志）
    host: String,
}

impl SshClientHandler {
    /// 创建新的 Handler
    pub fn new(host: String) -> Self {
        Self { host }
    }
}

impl russh::client::Handler for SshClientHandler {
    type Error = russh::Error;

    /// 检查服务器公钥
    /// 测试环境的节点每次重建都会换 host key，这里只记录指纹并接受
    fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send {
        let fingerprint = server_public_key.fingerprint(russh::keys::ssh_key::HashAlg::Sha256);

        debug!(
            "[SSH] [{}] Server key {} fingerprint: {}",
            self.host,
            server_public_key.algorithm(),
            fingerprint
        );

        async { Ok(true) }
    }
}
