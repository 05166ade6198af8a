//! Bot-protection detection and alerting.
//!
//! Watches for a small set of DOM/URL indicators the game shows when it
//! suspects automation, alerts externally with a cooldown, and latches
//! closed until a human resolves it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::browser::BrowserDriver;
use crate::config::{BotProtectionConfig, TelegramConfig};
use crate::error::BotResult;
use crate::panel::PanelStateStore;

#[derive(Debug, Clone)]
pub struct DetectionPattern {
    pub name: String,
    pub selector: String,
}

/// CSS selectors covering both DE and EN variants of the game's bot-check
/// indicators, plus a URL substring check that works even when the DOM
/// fails to load.
pub fn default_patterns() -> Vec<DetectionPattern> {
    [
        ("bot_check_link", r#"a[href*="screen=bot_check"], a[href*="screen=bot_protection"]"#),
        ("bot_schutz_tooltip_de", r#"[data-title*="Bot-Schutz"]"#),
        ("bot_protection_tooltip_en", r#"[data-title*="Bot Protection"]"#),
        ("manager_icon", r#".manager_icon[href*="bot_check"]"#),
        ("bot_protection_class", r#"[class*="bot-protection"], [class*="bot_protection"]"#),
        ("bot_check_popup", "#popup_box_bot_check, #popup_box_bot_protection"),
    ]
    .into_iter()
    .map(|(name, selector)| DetectionPattern { name: name.to_string(), selector: selector.to_string() })
    .collect()
}

pub fn check_url(url: &str) -> Option<&'static str> {
    let lower = url.to_lowercase();
    if lower.contains("bot_check") || lower.contains("bot_protection") {
        Some("url_bot_check")
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Clear,
    Detected,
}

pub struct ProtectionMonitor {
    telegram: TelegramConfig,
    check_interval: Duration,
    patterns: Vec<DetectionPattern>,
    state: State,
    last_alert: Option<Instant>,
    http: reqwest::Client,
}

impl ProtectionMonitor {
    pub fn new(telegram: TelegramConfig, config: &BotProtectionConfig) -> Self {
        let mut patterns = default_patterns();
        for (i, selector) in config.extra_selectors.iter().enumerate() {
            patterns.push(DetectionPattern { name: format!("custom_{i}"), selector: selector.clone() });
        }
        Self {
            telegram,
            check_interval: Duration::from_secs(config.check_interval),
            patterns,
            state: State::Clear,
            last_alert: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn patterns(&self) -> &[DetectionPattern] {
        &self.patterns
    }

    /// Transition into `Detected` on a fresh detection; alerts externally
    /// unless within the cooldown window.
    pub async fn on_detection(&mut self, pattern: &str, village_info: &str) {
        let already_detected = self.state == State::Detected;
        self.state = State::Detected;
        if already_detected {
            return;
        }

        if let Some(last) = self.last_alert {
            if last.elapsed() < Duration::from_secs(self.telegram.alert_cooldown) {
                debug!(pattern, "bot protection alert suppressed by cooldown");
                return;
            }
        }
        self.last_alert = Some(Instant::now());
        warn!(pattern, village_info, "bot protection detected");
        let message = format!("Bot Protection Detected!\nVillage: {village_info}\nPattern: {pattern}");
        self.send_telegram(&message).await;
    }

    /// Transition back to `Clear` after a `manual_resolve` action, sending
    /// a confirmation alert.
    pub async fn manual_resolve(&mut self) {
        if self.state != State::Detected {
            return;
        }
        self.state = State::Clear;
        info!("bot protection manually resolved, resuming");
        self.send_telegram("Bot Protection Cleared\nBot resuming normal operation.").await;
    }

    async fn send_telegram(&self, message: &str) {
        if self.telegram.bot_token.is_empty() || self.telegram.chat_id.is_empty() {
            debug!("telegram alert skipped: not configured");
            return;
        }
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.telegram.bot_token);
        let body = serde_json::json!({
            "chat_id": self.telegram.chat_id,
            "text": message,
            "parse_mode": "HTML",
        });
        if let Err(err) = self.http.post(&url).json(&body).send().await {
            warn!(error = %err, "telegram send failed");
        }
    }
}

/// Probe the live DOM for the first matching selector pattern, in
/// declaration order. Separate from `check_url` since it needs a driver.
pub async fn check_page<'a>(
    driver: &dyn BrowserDriver,
    patterns: &'a [DetectionPattern],
) -> BotResult<Option<&'a str>> {
    for pattern in patterns {
        if driver.selector_present(&pattern.selector).await? {
            return Ok(Some(&pattern.name));
        }
    }
    Ok(None)
}

/// One periodic check against an already-resolved detection outcome
/// (URL-substring match or DOM-selector match, whichever fired first).
pub async fn check_once(monitor: &mut ProtectionMonitor, pattern: Option<&str>, village_info: &str) -> BotResult<()> {
    match pattern {
        Some(pattern) => monitor.on_detection(pattern, village_info).await,
        None if monitor.state() == State::Detected => {
            // DOM-level clearing is driver-provided; absence alone
            // doesn't confirm recovery, so the Orchestrator clears state
            // only via an explicit `bot_protection_resolved` action.
        }
        None => {}
    }
    Ok(())
}

/// Background sibling task: wakes every `check_interval`, checks the
/// shared driver's current URL, and flips `running` off on a fresh
/// detection. Woken early by a `bot_protection_resolved` action via
/// `resolve` instead of polling for a manual-clear flag.
pub async fn run_periodic(
    mut monitor: ProtectionMonitor,
    driver: Arc<Mutex<Box<dyn BrowserDriver>>>,
    running: Arc<AtomicBool>,
    panel: Arc<PanelStateStore>,
    resolve: Arc<Notify>,
    cancel: CancellationToken,
) {
    let interval = monitor.check_interval();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("protection monitor shutting down");
                return;
            }
            _ = tokio::time::sleep(interval) => {
                let url = {
                    let guard = driver.lock().await;
                    guard.current_url().await
                };
                match url {
                    Ok(url) => {
                        let was_clear = monitor.state() == State::Clear;
                        let mut matched = check_url(&url).map(str::to_string);
                        if matched.is_none() {
                            let guard = driver.lock().await;
                            match check_page(&**guard, monitor.patterns()).await {
                                Ok(Some(pattern)) => matched = Some(pattern.to_string()),
                                Ok(None) => {}
                                Err(err) => debug!(error = %err, "protection dom check failed"),
                            }
                        }
                        if let Err(err) = check_once(&mut monitor, matched.as_deref(), "").await {
                            warn!(error = %err, "protection check failed");
                            continue;
                        }
                        if was_clear && monitor.state() == State::Detected {
                            running.store(false, Ordering::SeqCst);
                            panel.set_bot_protection(true, matched.as_deref().unwrap_or("unknown")).await;
                            panel.add_log("Bot protection detected, pausing", "error").await;
                        }
                    }
                    Err(err) => debug!(error = %err, "protection url check failed"),
                }
            }
            _ = resolve.notified() => {
                monitor.manual_resolve().await;
                running.store(true, Ordering::SeqCst);
                panel.set_bot_protection(false, "").await;
                panel.add_log("Bot protection resolved, resuming", "info").await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_with_bot_check_is_detected() {
        assert_eq!(check_url("https://game.example/game.php?screen=bot_check"), Some("url_bot_check"));
    }

    #[test]
    fn normal_url_is_not_detected() {
        assert_eq!(check_url("https://game.example/game.php?screen=overview"), None);
    }

    #[tokio::test]
    async fn detection_then_manual_resolve_round_trips_state() {
        let mut monitor = ProtectionMonitor::new(TelegramConfig::default(), &BotProtectionConfig::default());
        monitor.on_detection("url_bot_check", "42 (500|500)").await;
        assert_eq!(monitor.state(), State::Detected);
        monitor.manual_resolve().await;
        assert_eq!(monitor.state(), State::Clear);
    }

    struct StubDriver {
        present_selector: Option<String>,
    }

    #[async_trait::async_trait]
    impl BrowserDriver for StubDriver {
        async fn navigate(&self, _village_id: u64, _screen: &str) -> BotResult<()> {
            Ok(())
        }
        async fn current_url(&self) -> BotResult<String> {
            Ok(String::new())
        }
        async fn selector_present(&self, selector: &str) -> BotResult<bool> {
            Ok(self.present_selector.as_deref() == Some(selector))
        }
        async fn submit(&self, _action: &str, _payload: serde_json::Value) -> BotResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn check_page_matches_the_present_selector() {
        let patterns = default_patterns();
        let driver = StubDriver { present_selector: Some(patterns[1].selector.clone()) };
        let matched = check_page(&driver, &patterns).await.unwrap();
        assert_eq!(matched, Some(patterns[1].name.as_str()));
    }

    #[tokio::test]
    async fn check_page_returns_none_when_nothing_matches() {
        let patterns = default_patterns();
        let driver = StubDriver { present_selector: None };
        let matched = check_page(&driver, &patterns).await.unwrap();
        assert_eq!(matched, None);
    }
}
