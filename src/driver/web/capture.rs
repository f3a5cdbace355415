//! Page-side capture of user interactions
//!
//! A script installed into the page queues click, change, keyup and focusout
//! events together with a description of their target. Each poll re-installs
//! the script when missing (navigations wipe it) and drains the queue.
//!
//! The queue is mirrored into `sessionStorage` on every push, so a click that
//! navigates away is still there for the next document to hand over.

use async_trait::async_trait;
use log::{debug, warn};
use playwright::api::Page;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::driver::classify_error;
use crate::error::{MacroError, Result};
use crate::recorder::capture::{CaptureListener, RawEvent};

const CAPTURE_JS: &str = r#"
() => {
    const KEY = '__lumiCaptureQueue';
    const storage = (() => {
        try { return window.sessionStorage; } catch (e) { return null; }
    })();
    const persist = (events) => {
        if (!storage) { return; }
        try { storage.setItem(KEY, JSON.stringify(events)); } catch (e) {}
    };
    const restore = () => {
        if (!storage) { return []; }
        try {
            const saved = JSON.parse(storage.getItem(KEY) || '[]');
            return Array.isArray(saved) ? saved : [];
        } catch (e) {
            return [];
        }
    };

    if (!window.__lumiCapture) {
        // Events pushed by the previous document before it unloaded
        window.__lumiCapture = { events: restore() };

        const cssPath = (el) => {
            const path = [];
            while (el && el.nodeType === Node.ELEMENT_NODE) {
                let selector = el.nodeName.toLowerCase();
                if (el.id) {
                    path.unshift(selector + '#' + CSS.escape(el.id));
                    break;
                }
                let sib = el;
                let nth = 1;
                while ((sib = sib.previousElementSibling)) {
                    if (sib.nodeName === el.nodeName) { nth += 1; }
                }
                if (nth !== 1) { selector += ':nth-of-type(' + nth + ')'; }
                path.unshift(selector);
                el = el.parentElement;
            }
            return path.join(' > ');
        };

        const describe = (el) => ({
            id: el.id || null,
            cssPath: cssPath(el),
            text: ((el.innerText || el.textContent || '').trim()) || null,
            tag: el.tagName ? el.tagName.toLowerCase() : null,
            inputType: el.type || null,
        });

        const push = (type, evt) => {
            const el = evt.target;
            if (!el || el.nodeType !== Node.ELEMENT_NODE) { return; }
            window.__lumiCapture.events.push({
                type: type,
                target: describe(el),
                value: 'value' in el && typeof el.value === 'string' ? el.value : null,
                checked: typeof el.checked === 'boolean' ? el.checked : null,
            });
            persist(window.__lumiCapture.events);
        };

        document.addEventListener('click', e => push('click', e), true);
        document.addEventListener('change', e => push('change', e), true);
        document.addEventListener('keyup', e => push('keyup', e), true);
        document.addEventListener('focusout', e => push('blur', e), true);
    }
    const drained = window.__lumiCapture.events.splice(0);
    persist([]);
    return drained;
}
"#;

/// Capture listener polling the page's event queue
pub struct WebCaptureListener {
    page: Arc<Mutex<Page>>,
}

impl WebCaptureListener {
    pub fn new(page: Arc<Mutex<Page>>) -> Self {
        Self { page }
    }
}

#[async_trait]
impl CaptureListener for WebCaptureListener {
    async fn poll_events(&mut self) -> Result<Vec<RawEvent>> {
        let page = self.page.lock().await;
        let raw: Vec<Value> = match page.evaluate(CAPTURE_JS, ()).await {
            Ok(raw) => raw,
            Err(e) => {
                return match classify_error(&e.to_string()) {
                    MacroError::DriverSession(reason) => Err(MacroError::Capture(reason)),
                    // Page mid-navigation; the script is re-installed next poll
                    other => {
                        debug!("capture poll skipped: {}", other);
                        Ok(Vec::new())
                    }
                };
            }
        };
        drop(page);

        Ok(parse_events(raw))
    }
}

fn parse_events(raw: Vec<Value>) -> Vec<RawEvent> {
    raw.into_iter()
        .filter_map(|value| match serde_json::from_value::<RawEvent>(value) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Dropping malformed capture event: {}", e);
                None
            }
        })
        .collect()
}
