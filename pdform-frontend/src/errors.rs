use pdform_config::ConfigError;
use pdform_engine::errors::EngineError;
use pdform_io::IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("无法解析赋值 {0:?}，应为 `名称=取值`")]
    InvalidAssignment(String),
    #[error("表单中没有名为 {0:?} 的字段")]
    UnknownField(String),
    #[error("填写表单需要通过 `--output` 指定输出文件")]
    MissingOutput,
}
