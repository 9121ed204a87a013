// Underlay 命令行
//
// underlay [--config <file>] [--sudo] <node>[@<pool>] <command...>
// underlay [--config <file>] --list

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;

use underlay::services::storage;
use underlay::{BlockingUnderlay, Lookup, RunOptions};

/// 在 underlay 节点上执行命令
#[derive(Parser, Debug)]
#[command(name = "underlay", version, about, long_about = None)]
struct Cli {
    /// 配置文件路径（默认使用系统配置目录下的 underlay.json）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 列出所有节点及其地址
    #[arg(short, long, conflicts_with_all = ["target", "command"])]
    list: bool,

    /// 通过 sudo 执行命令
    #[arg(long = "sudo")]
    privileged: bool,

    /// 目标节点，格式为 <node> 或 <node>@<pool>
    #[arg(required_unless_present = "list")]
    target: Option<String>,

    /// 远程命令，第一个词之后的参数原样传递
    #[arg(
        trailing_var_arg = true,
        allow_hyphen_values = true,
        required_unless_present = "list"
    )]
    command: Vec<String>,
}

fn run(cli: Cli) -> Result<u8> {
    let config = match &cli.config {
        Some(path) => storage::load_config(path)?,
        None => storage::load_default_config()?,
    };

    let underlay = BlockingUnderlay::new(config).context("无法构建 underlay 目录")?;

    if cli.list {
        for name in underlay.node_names() {
            let hosts: Vec<String> = underlay
                .directory()
                .records()
                .iter()
                .filter(|r| r.node_name == name)
                .map(|r| match &r.address_pool {
                    Some(pool) => format!("{}={}", pool, r.host),
                    None => r.host.clone(),
                })
                .collect();
            println!("{}\t{}", name, hosts.join(" "));
        }
        return Ok(0);
    }

    let target = cli.target.as_deref().unwrap_or_default();
    let lookup = Lookup::parse_target(target);
    let options = RunOptions::new()
        .privileged(cli.privileged)
        .raise_on_error(false)
        .verbose(true);

    let output = underlay.run_with(&lookup, &cli.command.join(" "), &options)?;
    print!("{}", output.stdout_string());
    eprint!("{}", output.stderr_string());

    Ok(u8::try_from(output.exit_code).unwrap_or(u8::MAX))
}

fn main() -> ExitCode {
    // 初始化日志系统
    // 可以通过 RUST_LOG 环境变量控制日志级别，例如：RUST_LOG=debug underlay master hostname
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // --help / --version 由 clap 打印后以 0 退出
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(255)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("underlay").chain(args.iter().copied()))
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = parse(&["-c", "env.json", "--sudo", "master@private", "ls", "-la"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("env.json")));
        assert!(cli.privileged);
        assert_eq!(cli.target.as_deref(), Some("master@private"));
        // 命令第一个词之后的参数原样传给远程命令
        assert_eq!(cli.command, vec!["ls", "-la"]);
    }

    #[test]
    fn test_parse_config_equals_form() {
        let cli = parse(&["--config=env.json", "master", "ls"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("env.json")));
        assert_eq!(cli.command, vec!["ls"]);
    }

    #[test]
    fn test_parse_flag_after_target() {
        let cli = parse(&["master", "--sudo", "ls"]).unwrap();
        assert!(cli.privileged);
        assert_eq!(cli.target.as_deref(), Some("master"));
        assert_eq!(cli.command, vec!["ls"]);
    }

    #[test]
    fn test_parse_list() {
        let cli = parse(&["--list"]).unwrap();
        assert!(cli.list);
        assert_eq!(cli.target, None);
        assert!(cli.command.is_empty());
    }

    #[test]
    fn test_help_is_not_an_error_exit() {
        let err = parse(&["--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert_eq!(err.exit_code(), 0);
    }

    #[test]
    fn test_parse_missing_command() {
        assert!(parse(&["master"]).is_err());
        assert!(parse(&[]).is_err());
        assert!(parse(&["--bogus", "master", "ls"]).is_err());
        assert!(parse(&["--list", "master", "ls"]).is_err());
    }
}
