// Error types for the download core

use thiserror::Error;

/// Errno reported by the OS when a path or filename is rejected.
const EINVAL: i32 = 22;

/// Indicators in provider output that the output path/filename was rejected.
const INVALID_FILENAME_MARKERS: [&str; 2] = ["Invalid argument", "Errno 22"];

#[derive(Debug, Error)]
pub enum DownloadError {
    /// Request is missing required input (e.g. empty URL)
    #[error("{0}")]
    Validation(String),

    /// Provider could not resolve or fetch the URL
    #[error("{0}")]
    Extraction(String),

    /// Output path/filename rejected by the OS or the provider
    #[error("{0}")]
    InvalidFilename(String),

    /// Download finished but the produced file could not be located
    #[error("{0}")]
    FileNotFound(String),

    /// Requested file is not served from the managed directory
    #[error("{0}")]
    NoSuchFile(String),

    /// Raw provider failure, not yet classified by the orchestrator
    #[error("{0}")]
    Provider(String),

    #[error("Erro do sistema: {0}")]
    Io(#[from] std::io::Error),

    #[error("Erro interno: {0}")]
    Internal(String),
}

impl DownloadError {
    /// HTTP-equivalent status for the serving layer
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_)
            | Self::Extraction(_)
            | Self::InvalidFilename(_)
            | Self::Provider(_) => 400,
            Self::NoSuchFile(_) => 404,
            Self::Io(e) if e.raw_os_error() == Some(EINVAL) => 400,
            Self::FileNotFound(_) | Self::Io(_) | Self::Internal(_) => 500,
        }
    }

    /// Classify a failure raised while inspecting a URL.
    pub fn classify_inspect_failure(self) -> Self {
        match self {
            Self::Provider(msg) => Self::Extraction(format!("Erro ao obter informações: {}", msg)),
            Self::Io(e) if e.raw_os_error() != Some(EINVAL) => Self::Internal(e.to_string()),
            other => other,
        }
    }

    /// Classify a failure raised while fetching media.
    ///
    /// Anything that looks like the OS refusing our output path becomes
    /// `InvalidFilename` so the client can suggest a retry.
    pub fn classify_download_failure(self) -> Self {
        match self {
            Self::Provider(msg) => {
                if looks_like_invalid_filename(&msg) {
                    Self::InvalidFilename(
                        "Erro ao salvar arquivo: nome do arquivo inválido. \
                         Tente novamente ou escolha outro vídeo."
                            .to_string(),
                    )
                } else {
                    Self::Extraction(format!("Erro no download: {}", msg))
                }
            }
            Self::Io(e) if e.raw_os_error() == Some(EINVAL) => Self::InvalidFilename(
                "Erro ao salvar arquivo: nome do arquivo contém caracteres inválidos. \
                 Tente novamente."
                    .to_string(),
            ),
            Self::Internal(msg) if looks_like_invalid_filename(&msg) => Self::InvalidFilename(
                "Erro ao salvar arquivo: nome inválido. Tente novamente.".to_string(),
            ),
            other => other,
        }
    }
}

fn looks_like_invalid_filename(msg: &str) -> bool {
    INVALID_FILENAME_MARKERS.iter().any(|m| msg.contains(m))
}
