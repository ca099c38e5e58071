//! Browser-control tools: navigate, click, type, keys, screenshot, position,
//! network capture, and tab management. Each wraps a `BrowserKernel`
//! operation and renders its result to an observation string.

use base64::Engine;
use chromiumoxide::cdp::browser_protocol::network::EventResponseReceived;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotParams;
use futures::StreamExt;
use std::time::Duration;

use super::types::{ToolArgs, ToolError};
use crate::browser::cloudflare::{detect_challenge, solve_challenge, ChallengeKind};
use crate::browser::{BrowserKernel, NavigateResult};
use crate::utils::constants::{TIMEOUT_ELEMENT_FIND_MS, TIMEOUT_PAGE_LOAD_MS};

pub async fn navigate(kernel: &BrowserKernel, args: &ToolArgs) -> Result<String, ToolError> {
    let url = args.get_str("url")?;
    let wait_for = args.get_str_opt("wait_for");
    let result: NavigateResult = kernel
        .navigate(url, wait_for, Duration::from_millis(TIMEOUT_PAGE_LOAD_MS))
        .await?;
    Ok(format!(
        "navigated to {} (title: {}, wait_for_satisfied: {})",
        result.final_url, result.title, result.wait_for_satisfied
    ))
}

pub async fn get_current_url(kernel: &BrowserKernel) -> Result<String, ToolError> {
    let url = kernel
        .with_tab0(|page| async move { Ok(page.url().await?.unwrap_or_default()) })
        .await?;
    Ok(url)
}

pub async fn click_element(kernel: &BrowserKernel, args: &ToolArgs) -> Result<String, ToolError> {
    let selector = args.get_str("selector")?.to_string();
    kernel
        .with_tab0(|page| async move {
            let element = tokio::time::timeout(
                Duration::from_millis(TIMEOUT_ELEMENT_FIND_MS),
                page.find_element(&selector),
            )
            .await
            .map_err(|_| crate::browser::errors::KernelError::ElementNotFound(selector.clone()))?
            .map_err(crate::browser::errors::KernelError::Transport)?;
            element.click().await.map_err(crate::browser::errors::KernelError::Transport)?;
            Ok(selector)
        })
        .await
        .map(|selector| format!("clicked element matching '{selector}'"))
        .map_err(ToolError::from)
}

pub async fn type_text(kernel: &BrowserKernel, args: &ToolArgs) -> Result<String, ToolError> {
    let selector = args.get_str("selector")?.to_string();
    let text = args.get_str("text")?.to_string();
    kernel
        .with_tab0(|page| {
            let text = text.clone();
            async move {
                let element = page
                    .find_element(&selector)
                    .await
                    .map_err(crate::browser::errors::KernelError::Transport)?;
                element
                    .click()
                    .await
                    .map_err(crate::browser::errors::KernelError::Transport)?;
                element
                    .type_str(text)
                    .await
                    .map_err(crate::browser::errors::KernelError::Transport)?;
                Ok(())
            }
        })
        .await?;
    Ok(format!("typed text into '{selector}'"))
}

pub async fn press_key(kernel: &BrowserKernel, args: &ToolArgs) -> Result<String, ToolError> {
    let key = args.get_str("key")?.to_string();
    kernel
        .with_tab0(|page| {
            let key = key.clone();
            async move {
                let script = format!(
                    r#"(() => {{
                        const target = document.activeElement || document.body;
                        const event = new KeyboardEvent('keydown', {{ key: {key:?}, bubbles: true }});
                        target.dispatchEvent(event);
                        target.dispatchEvent(new KeyboardEvent('keyup', {{ key: {key:?}, bubbles: true }}));
                    }})()"#
                );
                page.evaluate(script.as_str())
                    .await
                    .map_err(crate::browser::errors::KernelError::Transport)?;
                Ok(())
            }
        })
        .await?;
    Ok(format!("pressed key '{key}'"))
}

pub async fn cloudflare_bypass(kernel: &BrowserKernel) -> Result<String, ToolError> {
    kernel
        .with_tab0(|page| async move {
            match detect_challenge(&page).await? {
                ChallengeKind::None => Ok("no active challenge".to_string()),
                _ => {
                    solve_challenge(&page, Duration::from_secs(20), Duration::from_millis(300)).await?;
                    Ok("challenge cleared".to_string())
                }
            }
        })
        .await
        .map_err(ToolError::from)
}

pub async fn take_screenshot(kernel: &BrowserKernel) -> Result<String, ToolError> {
    let bytes = kernel
        .with_tab0(|page| async move {
            page.screenshot(CaptureScreenshotParams::default())
                .await
                .map_err(crate::browser::errors::KernelError::Transport)
        })
        .await?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:image/png;base64,{encoded}"))
}

#[derive(serde::Deserialize)]
struct ElementRect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

pub async fn get_element_position(kernel: &BrowserKernel, args: &ToolArgs) -> Result<String, ToolError> {
    let selector = args.get_str("selector")?.to_string();
    kernel
        .with_tab0(|page| async move {
            page.find_element(&selector)
                .await
                .map_err(|_| crate::browser::errors::KernelError::ElementNotFound(selector.clone()))?;
            let script = format!(
                r#"(() => {{
                    const el = document.querySelector({selector:?});
                    if (!el) return null;
                    const r = el.getBoundingClientRect();
                    return {{ x: r.x, y: r.y, width: r.width, height: r.height }};
                }})()"#
            );
            let result = page
                .evaluate(script.as_str())
                .await
                .map_err(crate::browser::errors::KernelError::Transport)?;
            let rect: Option<ElementRect> = result
                .into_value()
                .map_err(|e| crate::browser::errors::KernelError::Other(anyhow::anyhow!("position decode failed: {e}")))?;
            rect.map(|r| format!("x={}, y={}, width={}, height={}", r.x, r.y, r.width, r.height))
                .ok_or_else(|| crate::browser::errors::KernelError::ElementNotFound(selector.clone()))
        })
        .await
        .map_err(ToolError::from)
}

/// One-shot network observation bound to a single navigate/click: subscribe,
/// perform the action, capture the first Document-typed response, tear down.
pub async fn capture_api_response(kernel: &BrowserKernel, args: &ToolArgs) -> Result<String, ToolError> {
    let url = args.get_str_opt("url").map(str::to_string);
    let selector = args.get_str_opt("selector").map(str::to_string);

    let body = kernel
        .with_tab0(|page| async move {
            let mut events = page
                .event_listener::<EventResponseReceived>()
                .await
                .map_err(crate::browser::errors::KernelError::Transport)?;

            if let Some(url) = &url {
                page.goto(url).await.map_err(crate::browser::errors::KernelError::Transport)?;
            } else if let Some(selector) = &selector {
                if let Ok(element) = page.find_element(selector.as_str()).await {
                    let _ = element.click().await;
                }
            }

            let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
            while tokio::time::Instant::now() < deadline {
                match tokio::time::timeout(Duration::from_millis(500), events.next()).await {
                    Ok(Some(event)) => {
                        if event.r#type == chromiumoxide::cdp::browser_protocol::network::ResourceType::Document {
                            let request_id = event.request_id.clone();
                            if let Ok(body) = page
                                .execute(
                                    chromiumoxide::cdp::browser_protocol::network::GetResponseBodyParams::new(
                                        request_id,
                                    ),
                                )
                                .await
                            {
                                return Ok(body.result.body.clone());
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(_) => continue,
                }
            }
            Err(crate::browser::errors::KernelError::Other(anyhow::anyhow!(
                "no matching network response observed within the capture window"
            )))
        })
        .await?;

    Ok(body)
}

pub async fn open_background_tab(kernel: &BrowserKernel, args: &ToolArgs) -> Result<String, ToolError> {
    let url = args.get_str("url")?;
    let index = kernel.open_background_tab(url).await?;
    Ok(format!("opened background tab index={index}"))
}

pub async fn list_tabs(kernel: &BrowserKernel) -> Result<String, ToolError> {
    let tabs = kernel.list_tabs().await?;
    let rendered: Vec<String> = tabs
        .into_iter()
        .map(|t| format!("[{}]{} {}", t.index, if t.closeable { "" } else { " (tab-0)" }, t.url))
        .collect();
    Ok(rendered.join("\n"))
}

pub async fn close_tab(kernel: &BrowserKernel, args: &ToolArgs) -> Result<String, ToolError> {
    let index = args.get_u64_opt("index", 0) as usize;
    kernel.close_tab(index).await?;
    Ok(format!("closed tab index={index}"))
}
