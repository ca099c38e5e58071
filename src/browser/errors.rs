//! Error taxonomy for the Browser Session Kernel (spec §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("navigation timed out after {0:?}")]
    NavigationTimeout(std::time::Duration),

    #[error("interactive challenge could not be cleared")]
    ChallengeUnsolved,

    #[error("browser process is dead, a new one was launched; retry the operation")]
    BrowserRecovered,

    #[error("invalid tool argument: {0}")]
    InvalidArgument(String),

    #[error("rejected path outside the secure profile base: {0}")]
    PathTraversal(String),

    #[error("tab 0 may never be closed")]
    TabZeroProtected,

    #[error("background tab ceiling ({0}) reached")]
    TooManyBackgroundTabs(usize),

    #[error("tab {0} does not exist")]
    NoSuchTab(usize),

    #[error("CDP transport error: {0}")]
    Transport(#[from] chromiumoxide::error::CdpError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
