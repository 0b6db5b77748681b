pub mod cli;
pub mod errors;
pub mod loader;
pub mod settings;

use cli::CliOptions;
use errors::FrontendError;
use pdform_config::{AppConfig, FrontendMode};
use tracing::info;

/// 按模式启动命令行前端。
pub fn run(mode: FrontendMode, config: &AppConfig, options: &CliOptions) -> Result<(), FrontendError> {
    match mode {
        FrontendMode::Maker => {
            info!("启动表单制作前端");
            let summary = cli::run_maker(config, options)?;
            info!(fields = summary.fields.len(), source = %summary.source, "制作流程结束");
        }
        FrontendMode::Filler => {
            info!("启动表单填写前端");
            let summary = cli::run_filler(config, options)?;
            info!(filled = summary.filled.len(), source = %summary.source, "填写流程结束");
        }
    }
    Ok(())
}
