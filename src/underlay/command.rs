// 远程命令选项与提权包装

use std::time::Duration;

/// `run` 的执行选项
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunOptions {
    /// 允许的退出码
    pub expected: Vec<u32>,
    /// 退出码不在 expected 中时是否返回错误
    pub raise_on_error: bool,
    /// 是否通过 sudo 提权执行
    pub privileged: bool,
    /// 命令超时，None 时使用设置中的默认值
    pub timeout: Option<Duration>,
    /// 以 info 级别输出命令和结果
    pub verbose: bool,
    /// 失败时附加到错误中的说明
    pub error_info: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            expected: vec![0],
            raise_on_error: true,
            privileged: false,
            timeout: None,
            verbose: false,
            error_info: None,
        }
    }
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expected(mut self, codes: impl IntoIterator<Item = u32>) -> Self {
        self.expected = codes.into_iter().collect();
        self
    }

    pub fn raise_on_error(mut self, raise: bool) -> Self {
        self.raise_on_error = raise;
        self
    }

    pub fn privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn error_info(mut self, info: impl Into<String>) -> Self {
        self.error_info = Some(info.into());
        self
    }

    /// 退出码是否可接受
    pub fn accepts(&self, exit_code: u32) -> bool {
        self.expected.contains(&exit_code)
    }
}

/// 实际发送到远端的命令及其 stdin
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Invocation {
    pub command: String,
    pub stdin: Option<Vec<u8>>,
}

/// 单引号转义，供 `sh -c` 使用
pub(crate) fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// 构建实际执行的命令
///
/// 提权只对这一次调用生效：命令被包进 `sudo -S`，密码从 stdin 写入，
/// 调用结束后远端不保留任何提权状态。root 登录时不需要包装。
pub(crate) fn build_invocation(
    command: &str,
    privileged: bool,
    login: &str,
    password: &str,
) -> Invocation {
    if !privileged || login == "root" {
        return Invocation {
            command: command.to_string(),
            stdin: None,
        };
    }

    Invocation {
        command: format!("sudo -S -p '' sh -c {}", shell_quote(command)),
        stdin: Some(format!("{}\n", password).into_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = RunOptions::default();
        assert!(options.accepts(0));
        assert!(!options.accepts(1));
        assert!(options.raise_on_error);
        assert!(!options.privileged);
    }

    #[test]
    fn test_expected_codes() {
        let options = RunOptions::new().expected([0, 1]);
        assert!(options.accepts(1));
        assert!(!options.accepts(2));
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("ls -la"), "'ls -la'");
        assert_eq!(shell_quote("echo 'hi'"), r"'echo '\''hi'\'''");
    }

    #[test]
    fn test_unprivileged_invocation_is_verbatim() {
        let invocation = build_invocation("kubectl get pods", false, "vagrant", "vagrant");
        assert_eq!(invocation.command, "kubectl get pods");
        assert_eq!(invocation.stdin, None);
    }

    #[test]
    fn test_privileged_invocation_uses_sudo_stdin() {
        let invocation = build_invocation("apt-get update", true, "vagrant", "pa$$");
        assert_eq!(invocation.command, "sudo -S -p '' sh -c 'apt-get update'");
        assert_eq!(invocation.stdin, Some(b"pa$$\n".to_vec()));
    }

    #[test]
    fn test_privileged_as_root_is_verbatim() {
        let invocation = build_invocation("id -u", true, "root", "r00tme");
        assert_eq!(invocation.command, "id -u");
        assert_eq!(invocation.stdin, None);
    }
}
