//! Chrome DevTools Protocol session
//!
//! A `CdpSession` owns one headless Chrome process and one tab. The process
//! is torn down when the session is dropped, so every early return in the
//! capture pipeline releases the browser.

use crate::provision::{self, BrowserSource};
use crate::{CaptureConfig, Error, Result, Viewport};
use base64::Engine as Base64Engine;
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::{Network, Page};
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, trace};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

const READY_STATE_JS: &str = "JSON.stringify(document.readyState)";

const CONTENT_SIZE_JS: &str = r#"JSON.stringify((function() {
    const doc = document.documentElement;
    const body = document.body;
    return {
        width: Math.max(doc.scrollWidth, body ? body.scrollWidth : 0),
        height: Math.max(doc.scrollHeight, body ? body.scrollHeight : 0)
    };
})())"#;

/// Scrollable size of the rendered document in CSS pixels
#[derive(Debug, Clone, Copy, Deserialize)]
struct ContentSize {
    width: f64,
    height: f64,
}

/// Requests the tab has started but not yet finished, fed by Network events
#[derive(Debug, Default)]
struct NetworkActivity {
    in_flight: HashSet<String>,
    last_activity: Option<Instant>,
}

impl NetworkActivity {
    // Redirects reuse the request id, so a redirected load stays one entry.
    fn request_started(&mut self, request_id: &str, now: Instant) {
        self.in_flight.insert(request_id.to_string());
        self.last_activity = Some(now);
    }

    fn request_done(&mut self, request_id: &str, now: Instant) {
        self.in_flight.remove(request_id);
        self.last_activity = Some(now);
    }

    fn sample(&self, document_complete: bool) -> NetworkSample {
        NetworkSample {
            document_complete,
            in_flight: self.in_flight.len(),
            last_activity: self.last_activity,
        }
    }
}

/// What the idle wait sees on each poll
#[derive(Debug, Clone, Copy)]
struct NetworkSample {
    document_complete: bool,
    in_flight: usize,
    last_activity: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdleStatus {
    Idle,
    Waiting,
    TimedOut,
}

/// Decides when a loading page has gone network-idle.
///
/// The page is idle once the document is complete and no request has been
/// in flight, started or finished for the whole quiet window. A `None`
/// deadline waits forever.
#[derive(Debug)]
struct IdleTracker {
    quiet: Duration,
    deadline: Option<Instant>,
    quiet_since: Instant,
}

impl IdleTracker {
    fn new(quiet: Duration, deadline: Option<Instant>, now: Instant) -> Self {
        Self {
            quiet,
            deadline,
            quiet_since: now,
        }
    }

    fn poll(&mut self, sample: NetworkSample, now: Instant) -> IdleStatus {
        let quiet_now = sample.document_complete && sample.in_flight == 0;
        if !quiet_now {
            self.quiet_since = now;
        } else if let Some(last) = sample.last_activity {
            self.quiet_since = self.quiet_since.max(last);
        }

        if quiet_now && now.saturating_duration_since(self.quiet_since) >= self.quiet {
            IdleStatus::Idle
        } else if self.deadline.is_some_and(|d| now >= d) {
            IdleStatus::TimedOut
        } else {
            IdleStatus::Waiting
        }
    }
}

/// Deadline `timeout_ms` from `now`; `None` when it does not fit in an `Instant`
fn deadline_after(now: Instant, timeout_ms: u64) -> Option<Instant> {
    now.checked_add(Duration::from_millis(timeout_ms))
}

/// Full-page clip for a document, never smaller than the viewport
fn page_clip(content: ContentSize, viewport: Viewport) -> Page::Viewport {
    Page::Viewport {
        x: 0.0,
        y: 0.0,
        width: content.width.ceil().max(viewport.width as f64),
        height: content.height.ceil().max(viewport.height as f64),
        scale: 1.0,
    }
}

/// One headless browser with a single tab, sized to the requested viewport
pub struct CdpSession {
    // Declared before `browser` so the tab is released first.
    tab: Arc<Tab>,
    browser: Browser,
    network: Arc<Mutex<NetworkActivity>>,
    viewport: Viewport,
    config: CaptureConfig,
}

impl CdpSession {
    /// Launch headless Chrome and open a tab with the given viewport
    pub fn launch(config: &CaptureConfig, viewport: Viewport) -> Result<Self> {
        let source = provision::locate_browser(config)?;

        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(config.sandbox)
            .path(source.path())
            .window_size(Some((viewport.width, viewport.height)))
            .build()
            .map_err(|e| Error::Launch(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options).map_err(|e| match source {
            BrowserSource::Download => {
                Error::Provisioning(format!("Failed to download or start Chromium: {}", e))
            }
            BrowserSource::Installed(_) => Error::Launch(format!("Failed to launch browser: {}", e)),
        })?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::Launch(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(Duration::from_millis(config.timeout_ms));

        let network = Arc::new(Mutex::new(NetworkActivity::default()));
        let sink = Arc::clone(&network);
        tab.add_event_listener(Arc::new(move |event: &Event| {
            let now = Instant::now();
            match event {
                Event::NetworkRequestWillBeSent(ev) => {
                    trace!("request started: {}", ev.params.request.url);
                    sink.lock().request_started(&ev.params.request_id, now);
                }
                Event::NetworkLoadingFinished(ev) => {
                    sink.lock().request_done(&ev.params.request_id, now);
                }
                Event::NetworkLoadingFailed(ev) => {
                    sink.lock().request_done(&ev.params.request_id, now);
                }
                _ => {}
            }
        }))
        .map_err(|e| Error::Launch(format!("Failed to watch network events: {}", e)))?;

        tab.call_method(Network::Enable {
            max_total_buffer_size: None,
            max_resource_buffer_size: None,
            max_post_data_size: None,
            report_direct_socket_traffic: None,
            enable_durable_messages: None,
        })
        .map_err(|e| Error::Launch(format!("Failed to enable network domain: {}", e)))?;

        debug!(
            "browser session ready ({}x{})",
            viewport.width, viewport.height
        );

        Ok(Self {
            tab,
            browser,
            network,
            viewport,
            config: config.clone(),
        })
    }

    /// OS process id of the browser, if it is still running
    pub fn process_id(&self) -> Option<u32> {
        self.browser.get_process_id()
    }

    /// Navigate to `url` and block until the page is network-idle.
    ///
    /// The navigation timeout covers both the load and the idle wait.
    pub fn load(&self, url: &Url) -> Result<()> {
        let deadline = deadline_after(Instant::now(), self.config.timeout_ms);

        debug!("navigating to {}", url);
        self.tab
            .navigate_to(url.as_str())
            .map_err(|e| Error::Navigation(format!("Navigation failed: {}", e)))?;
        self.tab.wait_until_navigated().map_err(|e| {
            if e.downcast_ref::<headless_chrome::util::Timeout>().is_some() {
                Error::Timeout(self.config.timeout_ms)
            } else {
                Error::Navigation(format!("Wait for navigation failed: {}", e))
            }
        })?;

        self.wait_for_network_idle(deadline)
    }

    fn wait_for_network_idle(&self, deadline: Option<Instant>) -> Result<()> {
        let mut tracker = IdleTracker::new(
            Duration::from_millis(self.config.network_idle_ms),
            deadline,
            Instant::now(),
        );

        loop {
            let ready_state: String = self.evaluate_json(READY_STATE_JS, Error::Navigation)?;
            let sample = self.network.lock().sample(ready_state == "complete");
            match tracker.poll(sample, Instant::now()) {
                IdleStatus::Idle => {
                    debug!("network idle");
                    return Ok(());
                }
                IdleStatus::TimedOut => {
                    debug!("still {} requests in flight at deadline", sample.in_flight);
                    return Err(Error::Timeout(self.config.timeout_ms));
                }
                IdleStatus::Waiting => std::thread::sleep(POLL_INTERVAL),
            }
        }
    }

    /// Give animations and transitions time to finish
    pub fn settle(&self) {
        if self.config.settle_ms > 0 {
            std::thread::sleep(Duration::from_millis(self.config.settle_ms));
        }
    }

    /// Capture the whole scrollable page as PNG bytes
    pub fn capture_full_page(&self) -> Result<Vec<u8>> {
        let content: ContentSize = self.evaluate_json(CONTENT_SIZE_JS, Error::Capture)?;
        let clip = page_clip(content, self.viewport);
        debug!("capturing {}x{}", clip.width, clip.height);

        let data = self
            .tab
            .call_method(Page::CaptureScreenshot {
                format: Some(Page::CaptureScreenshotFormatOption::Png),
                quality: None,
                clip: Some(clip),
                from_surface: Some(true),
                capture_beyond_viewport: Some(true),
                optimize_for_speed: None,
            })
            .map_err(|e| Error::Capture(format!("Screenshot failed: {}", e)))?
            .data;

        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| Error::Capture(format!("Screenshot data is not valid base64: {}", e)))
    }

    fn evaluate_json<T>(&self, script: &str, err: fn(String) -> Error) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| err(format!("Evaluation failed: {}", e)))?;

        let raw = match result.value {
            Some(serde_json::Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => return Err(err("No value returned from evaluation".into())),
        };

        serde_json::from_str(&raw)
            .map_err(|e| err(format!("Unexpected evaluation result {:?}: {}", raw, e)))
    }

    /// Close the browser. Dropping the session has the same effect.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for CdpSession {
    fn drop(&mut self) {
        debug!(
            "closing browser session (pid {:?})",
            self.browser.get_process_id()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn quiet(last_activity: Option<Instant>) -> NetworkSample {
        NetworkSample { document_complete: true, in_flight: 0, last_activity }
    }

    #[test]
    fn idle_requires_a_full_quiet_window() {
        let start = Instant::now();
        let mut tracker = IdleTracker::new(ms(500), None, start);

        assert_eq!(tracker.poll(quiet(None), start), IdleStatus::Waiting);
        assert_eq!(tracker.poll(quiet(None), start + ms(300)), IdleStatus::Waiting);
        assert_eq!(tracker.poll(quiet(None), start + ms(500)), IdleStatus::Idle);
    }

    #[test]
    fn pending_request_blocks_idle() {
        let start = Instant::now();
        let mut tracker = IdleTracker::new(ms(500), None, start);
        let pending = NetworkSample { document_complete: true, in_flight: 1, last_activity: Some(start) };

        // A slow request started after load keeps the page busy however long it takes.
        for i in 0..20 {
            assert_eq!(tracker.poll(pending, start + ms(100 * i)), IdleStatus::Waiting);
        }
        let finished = start + ms(2000);
        assert_eq!(tracker.poll(quiet(Some(finished)), finished), IdleStatus::Waiting);
        assert_eq!(tracker.poll(quiet(Some(finished)), finished + ms(499)), IdleStatus::Waiting);
        assert_eq!(tracker.poll(quiet(Some(finished)), finished + ms(500)), IdleStatus::Idle);
    }

    #[test]
    fn short_requests_between_polls_restart_the_window() {
        let start = Instant::now();
        let mut tracker = IdleTracker::new(ms(500), None, start);

        assert_eq!(tracker.poll(quiet(None), start), IdleStatus::Waiting);
        // A request came and went between two polls.
        let blip = start + ms(350);
        assert_eq!(tracker.poll(quiet(Some(blip)), start + ms(400)), IdleStatus::Waiting);
        assert_eq!(tracker.poll(quiet(Some(blip)), start + ms(600)), IdleStatus::Waiting);
        assert_eq!(tracker.poll(quiet(Some(blip)), start + ms(850)), IdleStatus::Idle);
    }

    #[test]
    fn loading_document_is_never_idle() {
        let start = Instant::now();
        let mut tracker = IdleTracker::new(ms(100), None, start);
        let loading = NetworkSample { document_complete: false, in_flight: 0, last_activity: None };

        for i in 0..5 {
            assert_eq!(tracker.poll(loading, start + ms(200 * i)), IdleStatus::Waiting);
        }
    }

    #[test]
    fn busy_page_times_out_at_deadline() {
        let start = Instant::now();
        let deadline = deadline_after(start, 1000);
        let mut tracker = IdleTracker::new(ms(500), deadline, start);

        let mut status = IdleStatus::Waiting;
        let mut t = start;
        while status == IdleStatus::Waiting {
            // Something new starts every 100ms.
            status = tracker.poll(quiet(Some(t)), t);
            t += ms(100);
        }
        assert_eq!(status, IdleStatus::TimedOut);
        assert!(t - start >= ms(1000));
    }

    #[test]
    fn idle_wins_over_an_expired_deadline() {
        let start = Instant::now();
        let mut tracker = IdleTracker::new(ms(500), Some(start + ms(500)), start);
        assert_eq!(tracker.poll(quiet(None), start + ms(500)), IdleStatus::Idle);
    }

    #[test]
    fn huge_timeout_does_not_overflow() {
        let now = Instant::now();
        assert_eq!(deadline_after(now, 1000), Some(now + ms(1000)));

        // Whether or not u64::MAX ms fits in an Instant on this platform,
        // the wait must behave as unbounded.
        let mut tracker = IdleTracker::new(ms(500), deadline_after(now, u64::MAX), now);
        let busy = NetworkSample { document_complete: true, in_flight: 3, last_activity: Some(now) };
        assert_eq!(tracker.poll(busy, now + Duration::from_secs(3600)), IdleStatus::Waiting);
    }

    #[test]
    fn no_deadline_never_times_out() {
        let now = Instant::now();
        let mut tracker = IdleTracker::new(ms(500), None, now);
        let busy = NetworkSample { document_complete: false, in_flight: 1, last_activity: Some(now) };
        assert_eq!(tracker.poll(busy, now + Duration::from_secs(86_400)), IdleStatus::Waiting);
    }

    #[test]
    fn network_activity_tracks_in_flight_ids() {
        let t = Instant::now();
        let mut activity = NetworkActivity::default();
        activity.request_started("1", t);
        activity.request_started("2", t + ms(10));
        // Redirect: same id announced again
        activity.request_started("2", t + ms(20));
        assert_eq!(activity.sample(true).in_flight, 2);

        activity.request_done("1", t + ms(30));
        activity.request_done("2", t + ms(40));
        // Late duplicate completion is harmless
        activity.request_done("2", t + ms(50));

        let sample = activity.sample(true);
        assert_eq!(sample.in_flight, 0);
        assert_eq!(sample.last_activity, Some(t + ms(50)));
    }

    #[test]
    fn clip_never_shrinks_below_viewport() {
        let vp = Viewport { width: 1280, height: 720 };
        let clip = page_clip(ContentSize { width: 600.0, height: 300.0 }, vp);
        assert_eq!((clip.width, clip.height), (1280.0, 720.0));
    }

    #[test]
    fn clip_extends_to_full_content_height() {
        let vp = Viewport { width: 1280, height: 720 };
        let clip = page_clip(ContentSize { width: 1280.0, height: 2400.4 }, vp);
        assert_eq!((clip.x, clip.y), (0.0, 0.0));
        assert_eq!((clip.width, clip.height), (1280.0, 2401.0));
        assert_eq!(clip.scale, 1.0);
    }

    #[test]
    fn session_launch() {
        // This test requires Chrome to be installed, so we skip it in CI
        if std::env::var("CI").is_ok() {
            return;
        }
        let result = CdpSession::launch(&CaptureConfig::default(), Viewport::default());
        if let Err(e) = result {
            eprintln!("Skipping CDP session test because Chrome is not available or failed to launch: {}", e);
            return;
        }
        assert!(result.is_ok());
    }
}
