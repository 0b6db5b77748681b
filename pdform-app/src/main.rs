use std::path::PathBuf;

use pdform_config::{AppConfig, ConfigError, FrontendMode};
use pdform_frontend::cli::CliOptions;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

const USAGE: &str = "用法: pdform [--maker | --filler] [--config <路径>] [--input <PDF>] \
[--output <PDF>] [--layout <JSON>] [--set <名称=取值>]...";

fn main() {
    let mut args = std::env::args().skip(1);
    let mut override_mode: Option<FrontendMode> = None;
    let mut config_override: Option<PathBuf> = None;
    let mut options = CliOptions::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--maker" => override_mode = Some(FrontendMode::Maker),
            "--filler" => override_mode = Some(FrontendMode::Filler),
            "--config" => config_override = Some(PathBuf::from(required_value(&mut args, &arg))),
            "--input" => options.input = Some(PathBuf::from(required_value(&mut args, &arg))),
            "--output" => options.output = Some(PathBuf::from(required_value(&mut args, &arg))),
            "--layout" => options.layout = Some(PathBuf::from(required_value(&mut args, &arg))),
            "--set" => options.assignments.push(required_value(&mut args, &arg)),
            "--help" | "-h" => {
                println!("{USAGE}");
                return;
            }
            other => {
                eprintln!("未知参数：{other}");
                eprintln!("{USAGE}");
                std::process::exit(1);
            }
        }
    }

    let config = load_configuration(config_override);
    init_logging(&config);
    info!("启动 PDF 表单工具");

    let mode = override_mode.unwrap_or(config.frontend.default_mode);
    if let Err(err) = pdform_frontend::run(mode, &config, &options) {
        error!(error = %err, ?mode, "执行失败");
        eprintln!("错误：{err}");
        std::process::exit(1);
    }
}

fn required_value(args: &mut impl Iterator<Item = String>, flag: &str) -> String {
    match args.next() {
        Some(value) => value,
        None => {
            eprintln!("`{flag}` 需要提供参数");
            std::process::exit(1);
        }
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
