use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 指定配置文件路径的环境变量。
pub const CONFIG_ENV: &str = "PDFORM_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub frontend: FrontendConfig,
    #[serde(default)]
    pub editor: EditorConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `PDFORM_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，`level` 是一条 `EnvFilter` 指令。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 启动模式：制作表单或填写已有表单。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontendMode {
    #[default]
    Maker,
    Filler,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrontendConfig {
    #[serde(default)]
    pub default_mode: FrontendMode,
}

/// 编辑器参数。单位：偏移、步长与手柄为画布像素，复制偏移与最小尺寸为 PDF point。
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EditorConfig {
    #[serde(default = "EditorConfig::default_canvas_offset")]
    pub canvas_offset: f64,
    #[serde(default = "EditorConfig::default_min_zoom")]
    pub min_zoom: f64,
    #[serde(default = "EditorConfig::default_max_zoom")]
    pub max_zoom: f64,
    #[serde(default = "EditorConfig::default_zoom_step")]
    pub zoom_step: f64,
    #[serde(default = "EditorConfig::default_zoom")]
    pub default_zoom: f64,
    #[serde(default = "EditorConfig::default_nudge_step")]
    pub nudge_step: f64,
    #[serde(default = "EditorConfig::default_nudge_step_large")]
    pub nudge_step_large: f64,
    #[serde(default = "EditorConfig::default_duplicate_offset")]
    pub duplicate_offset: f64,
    #[serde(default = "EditorConfig::default_min_field_size")]
    pub min_field_size: f64,
    #[serde(default = "EditorConfig::default_handle_size")]
    pub handle_size: f64,
    #[serde(default = "EditorConfig::default_history_limit")]
    pub history_limit: usize,
}

impl EditorConfig {
    fn default_canvas_offset() -> f64 {
        25.0
    }

    fn default_min_zoom() -> f64 {
        0.1
    }

    fn default_max_zoom() -> f64 {
        4.0
    }

    fn default_zoom_step() -> f64 {
        0.25
    }

    fn default_zoom() -> f64 {
        1.0
    }

    fn default_nudge_step() -> f64 {
        5.0
    }

    fn default_nudge_step_large() -> f64 {
        20.0
    }

    fn default_duplicate_offset() -> f64 {
        20.0
    }

    fn default_min_field_size() -> f64 {
        4.0
    }

    fn default_handle_size() -> f64 {
        6.0
    }

    fn default_history_limit() -> usize {
        25
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            canvas_offset: Self::default_canvas_offset(),
            min_zoom: Self::default_min_zoom(),
            max_zoom: Self::default_max_zoom(),
            zoom_step: Self::default_zoom_step(),
            default_zoom: Self::default_zoom(),
            nudge_step: Self::default_nudge_step(),
            nudge_step_large: Self::default_nudge_step_large(),
            duplicate_offset: Self::default_duplicate_offset(),
            min_field_size: Self::default_min_field_size(),
            handle_size: Self::default_handle_size(),
            history_limit: Self::default_history_limit(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_returned_when_file_missing() {
        let cfg = AppConfig::discover().expect("discover should succeed");
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.frontend.default_mode, FrontendMode::Maker);
        assert_eq!(cfg.editor, EditorConfig::default());
        assert!((cfg.editor.canvas_offset - 25.0).abs() < f64::EPSILON);
        assert_eq!(cfg.editor.history_limit, 25);
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "pdform_engine=debug"

            [frontend]
            default_mode = "filler"

            [editor]
            max_zoom = 8.0
            nudge_step = 2.5
            history_limit = 100
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "pdform_engine=debug");
        assert_eq!(cfg.frontend.default_mode, FrontendMode::Filler);
        assert!((cfg.editor.max_zoom - 8.0).abs() < f64::EPSILON);
        assert!((cfg.editor.nudge_step - 2.5).abs() < f64::EPSILON);
        assert_eq!(cfg.editor.history_limit, 100);
        // 未出现的键回落到默认值
        assert!((cfg.editor.min_zoom - 0.1).abs() < f64::EPSILON);
        assert!((cfg.editor.duplicate_offset - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[frontend]\ndefault_mode = \"viewer\"").unwrap();
        let error = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(error, ConfigError::Parse { .. }));

        let missing = AppConfig::from_file("/nonexistent/pdform.toml").unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
