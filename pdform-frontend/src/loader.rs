use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use pdform_io::memory::demo_backend;
use pdform_io::{LopdfBackend, PdfBackend};
use tracing::{info, warn};

use crate::errors::FrontendError;

/// 未显式指定输入时，从该环境变量读取示例 PDF 路径。
pub const SAMPLE_PDF_ENV: &str = "PDFORM_SAMPLE_PDF";

/// 文档来源，便于前端呈现加载信息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Pdf(PathBuf),
    Demo,
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentSource::Pdf(path) => write!(f, "{}", path.display()),
            DocumentSource::Demo => f.write_str("内置示例"),
        }
    }
}

/// 加载后的文档后端与来源。
pub struct LoadedDocument {
    pub backend: Box<dyn PdfBackend>,
    pub source: DocumentSource,
}

impl fmt::Debug for LoadedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedDocument")
            .field("pages", &self.backend.page_count())
            .field("source", &self.source)
            .finish()
    }
}

/// 显式路径加载失败时直接报错；否则尝试环境变量 `PDFORM_SAMPLE_PDF`，
/// 失败则回退到内置示例。
pub fn load_document(input: Option<&Path>) -> Result<LoadedDocument, FrontendError> {
    if let Some(path) = input {
        return Ok(open_pdf(path)?);
    }

    if let Some(path) = env::var_os(SAMPLE_PDF_ENV) {
        let path = PathBuf::from(path);
        match open_pdf(&path) {
            Ok(loaded) => return Ok(loaded),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "加载示例 PDF 失败，回退到内置示例");
            }
        }
    }

    info!("使用内置示例文档");
    Ok(LoadedDocument {
        backend: Box::new(demo_backend()),
        source: DocumentSource::Demo,
    })
}

fn open_pdf(path: &Path) -> Result<LoadedDocument, pdform_io::IoError> {
    let backend = LopdfBackend::open(path)?;
    info!(path = %path.display(), pages = backend.page_count(), "从 PDF 加载文档成功");
    Ok(LoadedDocument {
        backend: Box::new(backend),
        source: DocumentSource::Pdf(path.to_path_buf()),
    })
}
