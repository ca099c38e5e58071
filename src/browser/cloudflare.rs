//! Cloudflare challenge detection and interactive bypass.
//!
//! Grounded on the teacher's in-page JS evaluation pattern from
//! `page_extractor::extractors` (`page.evaluate(script).await?.into_value()`)
//! and on the anti-bot intent of the deleted `kromekover` stealth module —
//! reimplemented here as a self-contained detect/solve pair per spec §4.5
//! rather than the asset-file-backed evasion set that module depended on.

use chromiumoxide::Page;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use super::errors::KernelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeKind {
    None,
    Cloudflare,
    CloudflareInteractive,
}

#[derive(Debug, Deserialize)]
struct ChallengeIndicators {
    has_challenge_meta: bool,
    has_challenge_form: bool,
    title_indicates_challenge: bool,
    body_indicates_challenge: bool,
    has_interactive_checkbox: bool,
}

const DETECT_SCRIPT: &str = r#"
(() => {
    const title = (document.title || '').toLowerCase();
    const bodyText = (document.body ? document.body.innerText : '').toLowerCase().slice(0, 2000);
    return {
        has_challenge_meta: !!document.querySelector('meta[http-equiv="refresh"][content*="challenge"]')
            || !!document.querySelector('meta[name="cf-challenge"]'),
        has_challenge_form: !!document.querySelector('form#challenge-form, #challenge-running, .cf-challenge-running'),
        title_indicates_challenge: title.includes('just a moment') || title.includes('attention required'),
        body_indicates_challenge: bodyText.includes('checking your browser') || bodyText.includes('cloudflare'),
        has_interactive_checkbox: !!document.querySelector('input[type="checkbox"], .cf-turnstile'),
    };
})()
"#;

/// Evaluate an in-page script that returns indicator booleans and classify
/// into {none, cloudflare, cloudflare_interactive}. Non-destructive.
pub async fn detect_challenge(page: &Page) -> Result<ChallengeKind, KernelError> {
    let result = page
        .evaluate(DETECT_SCRIPT)
        .await
        .map_err(KernelError::Transport)?;
    let indicators: ChallengeIndicators = result
        .into_value()
        .map_err(|e| KernelError::Other(anyhow::anyhow!("challenge indicator decode failed: {e}")))?;

    if indicators.has_interactive_checkbox {
        info!("detected interactive Cloudflare challenge");
        return Ok(ChallengeKind::CloudflareInteractive);
    }
    if indicators.has_challenge_meta || indicators.has_challenge_form || indicators.title_indicates_challenge || indicators.body_indicates_challenge {
        info!("detected Cloudflare challenge page");
        return Ok(ChallengeKind::Cloudflare);
    }
    Ok(ChallengeKind::None)
}

/// Time-bounded interactive bypass: poll for the checkbox, click it with a
/// small human-like delay, then poll for the challenge to clear.
pub async fn solve_challenge(page: &Page, timeout: Duration, click_delay: Duration) -> Result<(), KernelError> {
    let deadline = tokio::time::Instant::now() + timeout;

    if let Ok(checkbox) = page.find_element("input[type='checkbox'], .cf-turnstile").await {
        tokio::time::sleep(click_delay).await;
        let _ = checkbox.click().await;
    }

    loop {
        if tokio::time::Instant::now() >= deadline {
            return Err(KernelError::ChallengeUnsolved);
        }
        match detect_challenge(page).await {
            Ok(ChallengeKind::None) => return Ok(()),
            Ok(_) => {
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
            Err(e) => {
                debug!("challenge re-check failed during solve: {e}");
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
        }
    }
}
