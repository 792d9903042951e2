#![forbid(unsafe_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use folio_core::PortfolioContent;
use folio_core::anchor::anchor_offset;
use folio_runtime::{Preference, StorageBackend, StorageError, StorageResult, UnavailableStorage};
use js_sys::{Array, Function};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    Element, IntersectionObserver, IntersectionObserverEntry, IntersectionObserverInit,
    MediaQueryList, MediaQueryListEvent, Storage,
};

use crate::host::{HostConfig, HostEvent, PortfolioHost};

const DARK_SCHEME_QUERY: &str = "(prefers-color-scheme: dark)";
const REDUCED_MOTION_QUERY: &str = "(prefers-reduced-motion: reduce)";

fn js_error(context: &str, value: &JsValue) -> StorageError {
    let detail = value
        .as_string()
        .unwrap_or_else(|| format!("{value:?}"));
    StorageError::Unavailable(format!("{context}: {detail}"))
}

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn media_query(query: &str) -> Option<MediaQueryList> {
    web_sys::window()?.match_media(query).ok().flatten()
}

// ---------------------------------------------------------------------------
// localStorage backend
// ---------------------------------------------------------------------------

/// [`StorageBackend`] over `window.localStorage`.
pub struct LocalStorage {
    storage: Storage,
}

impl LocalStorage {
    /// Open `window.localStorage`. Fails in sandboxed or storage-disabled pages.
    pub fn open() -> StorageResult<Self> {
        let window = web_sys::window()
            .ok_or_else(|| StorageError::Unavailable("no window".into()))?;
        let storage = window
            .local_storage()
            .map_err(|e| js_error("localStorage access denied", &e))?
            .ok_or_else(|| StorageError::Unavailable("localStorage missing".into()))?;
        Ok(Self { storage })
    }
}

impl StorageBackend for LocalStorage {
    fn name(&self) -> &str {
        "LocalStorage"
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.storage
            .get_item(key)
            .map_err(|e| js_error("localStorage.getItem", &e))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.storage
            .set_item(key, value)
            .map_err(|e| js_error("localStorage.setItem", &e))
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.storage
            .remove_item(key)
            .map_err(|e| js_error("localStorage.removeItem", &e))
    }
}

fn open_storage() -> Box<dyn StorageBackend> {
    match LocalStorage::open() {
        Ok(storage) => Box::new(storage),
        Err(e) => {
            tracing::warn!(error = %e, "falling back to in-memory theme preference");
            Box::new(UnavailableStorage::new(e.to_string()))
        }
    }
}

// ---------------------------------------------------------------------------
// JS-facing page
// ---------------------------------------------------------------------------

type EventQueue = Rc<RefCell<Vec<HostEvent>>>;
type IntersectCallback = Closure<dyn FnMut(Array, IntersectionObserver)>;

fn create_observer(
    queue: &EventQueue,
) -> Result<(IntersectionObserver, IntersectCallback), JsValue> {
    let queue = Rc::clone(queue);
    let closure = IntersectCallback::new(move |entries: Array, _observer: IntersectionObserver| {
        let mut queue = queue.borrow_mut();
        for entry in entries.iter() {
            let Ok(entry) = entry.dyn_into::<IntersectionObserverEntry>() else {
                continue;
            };
            queue.push(HostEvent::Intersection {
                region: entry.target().id(),
                ratio: entry.intersection_ratio(),
            });
        }
    });
    let init = IntersectionObserverInit::new();
    init.set_threshold(&JsValue::from_f64(folio_core::DEFAULT_THRESHOLD));
    let callback: &Function = closure.as_ref().unchecked_ref();
    let observer = IntersectionObserver::new_with_options(callback, &init)?;
    Ok((observer, closure))
}

/// Browser binding for [`PortfolioHost`].
///
/// Observer and media-query callbacks only enqueue [`HostEvent`]s; the page
/// applies them on the next `step()` call from the embedder's frame loop.
#[wasm_bindgen]
pub struct FolioWeb {
    host: PortfolioHost,
    queue: EventQueue,
    observer: Option<IntersectionObserver>,
    _on_intersect: Option<IntersectCallback>,
    scheme: Option<MediaQueryList>,
    on_scheme_change: Option<Closure<dyn FnMut(MediaQueryListEvent)>>,
}

#[wasm_bindgen]
impl FolioWeb {
    /// Build the page from its JSON content object.
    ///
    /// Content that fails to parse is replaced by empty content.
    #[wasm_bindgen(constructor)]
    pub fn new(content_json: &str) -> Result<FolioWeb, JsValue> {
        let content = PortfolioContent::from_json_or_default(content_json);
        let scheme = media_query(DARK_SCHEME_QUERY);
        let os_prefers_dark = scheme.as_ref().is_some_and(MediaQueryList::matches);
        let reduced_motion = media_query(REDUCED_MOTION_QUERY)
            .as_ref()
            .is_some_and(MediaQueryList::matches);

        let queue: EventQueue = Rc::new(RefCell::new(Vec::new()));
        let (observer, on_intersect) = match create_observer(&queue) {
            Ok((observer, closure)) => (Some(observer), Some(closure)),
            Err(e) => {
                tracing::warn!(error = ?e, "IntersectionObserver unavailable");
                (None, None)
            }
        };

        let config = HostConfig::default()
            .with_reduced_motion(reduced_motion)
            .with_reveal_without_observer(observer.is_none());
        let mut host =
            PortfolioHost::with_boxed_storage(content, open_storage(), os_prefers_dark, config);
        host.init().map_err(to_js)?;

        let on_scheme_change = scheme.as_ref().and_then(|mql| {
            let queue = Rc::clone(&queue);
            let closure = Closure::<dyn FnMut(MediaQueryListEvent)>::new(
                move |event: MediaQueryListEvent| {
                    queue
                        .borrow_mut()
                        .push(HostEvent::ColorSchemeChanged(event.matches()));
                },
            );
            mql.add_event_listener_with_callback("change", closure.as_ref().unchecked_ref())
                .ok()
                .map(|()| closure)
        });

        Ok(Self {
            host,
            queue,
            observer,
            _on_intersect: on_intersect,
            scheme,
            on_scheme_change,
        })
    }

    /// Observe a rendered skill-group section. Its `id` is the region id.
    pub fn observe(&self, element: &Element) {
        if let Some(observer) = &self.observer {
            observer.observe(element);
        }
    }

    /// Apply a preference token (`light`, `dark` or `system`).
    #[wasm_bindgen(js_name = setPreference)]
    pub fn set_preference(&mut self, token: &str) -> Result<(), JsValue> {
        let preference: Preference = token.parse().map_err(to_js)?;
        self.queue
            .borrow_mut()
            .push(HostEvent::SetPreference(preference));
        Ok(())
    }

    /// Advance host time in milliseconds.
    #[wasm_bindgen(js_name = advanceTime)]
    pub fn advance_time(&mut self, ms: f64) {
        if ms.is_finite() && ms > 0.0 {
            self.host.advance_time(Duration::from_secs_f64(ms / 1000.0));
        }
    }

    /// Milliseconds until the next typewriter tick or caret flip, or `undefined`.
    #[wasm_bindgen(js_name = msUntilNextTick)]
    pub fn ms_until_next_tick(&self) -> Option<f64> {
        let wakeup = self.host.next_wakeup()?;
        Some(wakeup.saturating_sub(self.host.now()).as_secs_f64() * 1000.0)
    }

    /// Apply queued events. Returns the snapshot JSON when something changed.
    pub fn step(&mut self) -> Result<Option<String>, JsValue> {
        let events: Vec<HostEvent> = self.queue.borrow_mut().drain(..).collect();
        for event in events {
            self.host.push_event(event);
        }
        let result = self.host.step().map_err(to_js)?;
        if !result.rendered {
            return Ok(None);
        }
        self.host.snapshot().to_json().map(Some).map_err(to_js)
    }

    /// Current snapshot JSON.
    pub fn snapshot(&self) -> Result<String, JsValue> {
        self.host.snapshot().to_json().map_err(to_js)
    }

    /// Scroll target for an in-page link under a fixed header.
    #[wasm_bindgen(js_name = scrollTarget)]
    pub fn scroll_target(element_top: f64, scroll_y: f64, header_height: f64) -> f64 {
        anchor_offset(element_top, scroll_y, header_height)
    }

    /// Explicit teardown for JS callers. Dropping the page does the same.
    pub fn destroy(&mut self) {
        self.release();
    }
}

impl FolioWeb {
    /// Disconnect browser callbacks and dispose the host. Idempotent.
    fn release(&mut self) {
        if let Some(observer) = self.observer.take() {
            observer.disconnect();
        }
        if let (Some(mql), Some(closure)) = (self.scheme.take(), self.on_scheme_change.take()) {
            let _ =
                mql.remove_event_listener_with_callback("change", closure.as_ref().unchecked_ref());
        }
        self._on_intersect = None;
        self.queue.borrow_mut().clear();
        self.host.dispose();
    }
}

impl Drop for FolioWeb {
    fn drop(&mut self) {
        self.release();
    }
}
