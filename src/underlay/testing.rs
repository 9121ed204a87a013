// 内存中的假连接器，供单元测试使用

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::connector::{Connector, RemoteSession};
use crate::ssh::{AuthMethod, CommandOutput, SshConfig, SshError};

/// 一次连接请求的记录
#[derive(Clone, Debug)]
pub struct ConnectAttempt {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub keys: Vec<String>,
    pub password: Option<String>,
}

/// 一次命令执行的记录
#[derive(Clone, Debug)]
pub struct ExecCall {
    pub host: String,
    pub command: String,
    pub stdin: Option<Vec<u8>>,
}

#[derive(Default)]
struct State {
    files: HashMap<(String, String), Vec<u8>>,
    responses: HashMap<String, CommandOutput>,
    unreachable: HashSet<String>,
    failures_left: HashMap<String, u32>,
    exec_delay: Option<Duration>,
    connects: Vec<ConnectAttempt>,
    execs: Vec<ExecCall>,
    closed: usize,
}

/// 假连接器：按 host 存放文件，按命令返回预设输出
#[derive(Clone, Default)]
pub struct FakeConnector {
    state: Arc<Mutex<State>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, host: &str, path: &str, content: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .files
            .insert((host.to_string(), path.to_string()), content.as_bytes().to_vec());
        self
    }

    pub fn with_response(self, command: &str, exit_code: u32, stdout: &str, stderr: &str) -> Self {
        self.state.lock().unwrap().responses.insert(
            command.to_string(),
            CommandOutput {
                stdout: stdout.as_bytes().to_vec(),
                stderr: stderr.as_bytes().to_vec(),
                exit_code,
            },
        );
        self
    }

    pub fn with_unreachable(self, host: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .unreachable
            .insert(host.to_string());
        self
    }

    /// 前 `count` 次连接该 host 失败
    pub fn with_failures(self, host: &str, count: u32) -> Self {
        self.state
            .lock()
            .unwrap()
            .failures_left
            .insert(host.to_string(), count);
        self
    }

    /// 每次执行命令前先等待 `delay`
    pub fn with_exec_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().exec_delay = Some(delay);
        self
    }

    pub fn connects(&self) -> Vec<ConnectAttempt> {
        self.state.lock().unwrap().connects.clone()
    }

    pub fn execs(&self) -> Vec<ExecCall> {
        self.state.lock().unwrap().execs.clone()
    }

    pub fn file(&self, host: &str, path: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(&(host.to_string(), path.to_string()))
            .cloned()
    }

    pub fn closed(&self) -> usize {
        self.state.lock().unwrap().closed
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, config: &SshConfig) -> Result<Box<dyn RemoteSession>, SshError> {
        let mut state = self.state.lock().unwrap();

        let mut keys = Vec::new();
        let mut password = None;
        for method in &config.auth {
            match method {
                AuthMethod::PrivateKey { key_pem, .. } => keys.push(key_pem.clone()),
                AuthMethod::Password(p) => password = Some(p.clone()),
            }
        }
        state.connects.push(ConnectAttempt {
            host: config.host.clone(),
            port: config.port,
            username: config.username.clone(),
            keys,
            password,
        });

        if state.unreachable.contains(&config.host) {
            return Err(SshError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("{} refused connection", config.host),
            )));
        }
        if let Some(left) = state.failures_left.get_mut(&config.host) {
            if *left > 0 {
                *left -= 1;
                return Err(SshError::Timeout(Duration::from_secs(config.connect_timeout)));
            }
        }

        Ok(Box::new(FakeSession {
            host: config.host.clone(),
            state: self.state.clone(),
        }))
    }
}

struct FakeSession {
    host: String,
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl RemoteSession for FakeSession {
    fn id(&self) -> &str {
        "fake"
    }

    fn host(&self) -> &str {
        &self.host
    }

    async fn exec(&self, command: &str, stdin: Option<&[u8]>) -> Result<CommandOutput, SshError> {
        let (delay, output) = {
            let mut state = self.state.lock().unwrap();
            state.execs.push(ExecCall {
                host: self.host.clone(),
                command: command.to_string(),
                stdin: stdin.map(<[u8]>::to_vec),
            });
            (
                state.exec_delay,
                state.responses.get(command).cloned().unwrap_or_default(),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(output)
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, SshError> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(&(self.host.clone(), path.to_string()))
            .cloned()
            .ok_or_else(|| SshError::Sftp(format!("No such file: {}", path)))
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), SshError> {
        self.state
            .lock()
            .unwrap()
            .files
            .insert((self.host.clone(), path.to_string()), content.to_vec());
        Ok(())
    }

    async fn close(&self) -> Result<(), SshError> {
        self.state.lock().unwrap().closed += 1;
        Ok(())
    }
}
