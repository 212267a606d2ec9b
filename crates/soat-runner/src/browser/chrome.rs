use super::{Driver, Element, SessionProvider};
use crate::config::BrowserConfig;
use crate::locator::Locator;
use crate::{Error, Result};
use async_trait::async_trait;
use eoka::{Browser, Page};
use std::time::Duration;
use tracing::debug;

/// Resolves a serialized [`Locator`] and returns element snapshots as JSON.
///
/// Matched nodes get a `data-soat-ref` marker so later actions can re-find
/// the exact node, or notice it was replaced.
const QUERY_JS: &str = r#"(() => {
    const loc = __LOCATOR__;
    const norm = s => (s || '').replace(/\s+/g, ' ').trim();
    const ownText = el => norm(Array.from(el.childNodes)
        .filter(n => n.nodeType === Node.TEXT_NODE)
        .map(n => n.textContent)
        .join(' '));
    const push = (out, el) => { if (el && !out.includes(el)) out.push(el); };
    const resolve = l => {
        const out = [];
        switch (l.by) {
            case 'id':
                push(out, document.getElementById(l.id));
                break;
            case 'css':
                document.querySelectorAll(l.selector).forEach(el => push(out, el));
                break;
            case 'text': {
                const want = norm(l.text);
                document.querySelectorAll(l.scope || 'body *').forEach(el => {
                    const t = ownText(el);
                    if (l.exact ? t === want : t.toLowerCase().includes(want.toLowerCase())) push(out, el);
                });
                break;
            }
            case 'closest':
                resolve(l.inner).forEach(el => push(out, el.closest(l.ancestor)));
                break;
            case 'any':
                l.parts.forEach(p => resolve(p).forEach(el => push(out, el)));
                break;
        }
        return out;
    };
    window.__soatRef = window.__soatRef || 0;
    const dpr = window.devicePixelRatio || 1;
    return JSON.stringify(resolve(loc).map(el => {
        if (!el.hasAttribute('data-soat-ref')) el.setAttribute('data-soat-ref', String(++window.__soatRef));
        const r = el.getBoundingClientRect();
        const st = getComputedStyle(el);
        const visible = r.width > 0 && r.height > 0 && st.visibility !== 'hidden'
            && st.display !== 'none' && parseFloat(st.opacity || '1') > 0;
        return {
            handle: '[data-soat-ref="' + el.getAttribute('data-soat-ref') + '"]',
            tag: el.tagName.toLowerCase(),
            id: el.id || null,
            class_name: el.getAttribute('class') || '',
            text: ownText(el),
            visible,
            enabled: !el.disabled,
            readonly: !!el.readOnly,
            input_type: el.tagName === 'INPUT' ? (el.type || 'text') : null,
            in_label: !!el.closest('label'),
            bbox: { x: r.x, y: r.y, width: r.width, height: r.height },
            device_pixel_ratio: dpr,
        };
    }));
})()"#;

/// Launches Chrome through `eoka`, one browser per session.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeProvider;

#[async_trait]
impl SessionProvider for ChromeProvider {
    type Session = ChromeSession;

    async fn acquire(&self, config: &BrowserConfig) -> Result<ChromeSession> {
        ChromeSession::launch(config).await
    }

    async fn release(&self, session: ChromeSession) -> Result<()> {
        session.close().await
    }
}

/// A live Chrome tab.
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    page_load_timeout: Duration,
}

impl ChromeSession {
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let (width, height) = match (&config.viewport, config.maximize) {
            (Some(v), _) => (v.width, v.height),
            (None, true) => (1920, 1080),
            (None, false) => (1280, 720),
        };
        let stealth = eoka::StealthConfig {
            headless: config.headless,
            proxy: config.proxy.clone(),
            user_agent: config.user_agent.clone(),
            viewport_width: width,
            viewport_height: height,
            ..Default::default()
        };

        debug!(
            "Launching browser (headless: {}, viewport: {}x{})",
            config.headless, width, height
        );
        let browser = Browser::launch_with_config(stealth).await?;
        let page = browser.new_page("about:blank").await?;

        Ok(Self {
            browser,
            page,
            page_load_timeout: config.page_load_timeout(),
        })
    }

    /// Underlying `eoka` page.
    pub fn page(&self) -> &Page {
        &self.page
    }

    pub async fn close(self) -> Result<()> {
        debug!("Closing browser");
        self.browser.close().await?;
        Ok(())
    }

    /// Run `body` against the node behind `element`, failing if it is gone.
    async fn with_node(&self, element: &Element, body: &str) -> Result<()> {
        let js = format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return false; {} return true; }})()",
            serde_json::to_string(&element.handle)?,
            body
        );
        let found: bool = self.page.evaluate(&js).await?;
        if found {
            Ok(())
        } else {
            Err(Error::NotFound(format!("{} (detached)", element.describe())))
        }
    }

    async fn center(&self, element: &Element) -> Result<(f64, f64)> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector({});
                if (!el) return null;
                const r = el.getBoundingClientRect();
                return [r.x + r.width / 2, r.y + r.height / 2];
            }})()"#,
            serde_json::to_string(&element.handle)?
        );
        let center: Option<(f64, f64)> = self.page.evaluate(&js).await?;
        center.ok_or_else(|| Error::NotFound(format!("{} (detached)", element.describe())))
    }
}

#[async_trait]
impl Driver for ChromeSession {
    async fn goto(&self, url: &str) -> Result<()> {
        debug!("goto: {}", url);
        tokio::time::timeout(self.page_load_timeout, self.page.goto(url))
            .await
            .map_err(|_| Error::Timeout {
                condition: format!("page load of {}", url),
                elapsed: self.page_load_timeout,
            })??;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.page.url().await?)
    }

    async fn query(&self, locator: &Locator) -> Result<Vec<Element>> {
        let js = QUERY_JS.replace("__LOCATOR__", &serde_json::to_string(locator)?);
        let raw: String = self.page.evaluate(&js).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn click(&self, element: &Element) -> Result<()> {
        self.with_node(element, "").await?;
        self.page.click(&element.handle).await?;
        Ok(())
    }

    async fn script_click(&self, element: &Element) -> Result<()> {
        self.with_node(element, "el.click();").await
    }

    async fn click_parent(&self, element: &Element) -> Result<()> {
        self.with_node(element, "(el.parentElement || el).click();")
            .await
    }

    async fn hover_click(&self, element: &Element) -> Result<()> {
        let (x, y) = self.center(element).await?;
        self.page
            .session()
            .dispatch_mouse_event(eoka::cdp::MouseEventType::MouseMoved, x, y, None, None)
            .await?;
        self.page.wait(100).await;
        self.page.click_at(x, y).await?;
        Ok(())
    }

    async fn clear(&self, element: &Element) -> Result<()> {
        self.with_node(element, "el.focus(); if (el.select) el.select();")
            .await?;
        self.page.human().press_key("Delete").await?;
        Ok(())
    }

    async fn type_text(&self, element: &Element, text: &str) -> Result<()> {
        self.with_node(element, "el.focus();").await?;
        self.page.type_text(text).await?;
        Ok(())
    }

    async fn press_key(&self, element: &Element, key: &str) -> Result<()> {
        self.with_node(element, "el.focus();").await?;
        self.page.human().press_key(key).await?;
        Ok(())
    }

    async fn scroll_into_view(&self, element: &Element) -> Result<()> {
        self.with_node(element, "el.scrollIntoView({block:'center'});")
            .await
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(self.page.screenshot().await?)
    }
}
