use super::links::{intercept_target, legacy_fragment_path, ClickContext};
use super::{CurrentRoute, RouteTable};
use leptos::ev;
use leptos::prelude::*;
use leptos_dom::helpers::{window_event_listener, window_event_listener_untyped};
use std::sync::Arc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};

/// Synthetic event raised after every programmatic history change.
pub const NAVIGATE_EVENT: &str = "gov-site:navigate";

/// Router bound to `window.location` / `window.history`.
///
/// The committed route lives in a signal; views read it through [`PathRouter::current_route`].
/// Navigation is synchronous: the latest call wins and nothing is queued.
pub struct PathRouter<H: Send + Sync + 'static> {
    table: Arc<RouteTable<H>>,
    current: RwSignal<CurrentRoute>,
}

impl<H: Send + Sync + 'static> Clone for PathRouter<H> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            current: self.current,
        }
    }
}

impl<H: Send + Sync + 'static> PathRouter<H> {
    pub fn new(table: RouteTable<H>) -> Self {
        let initial = table.current_for(&location_pathname());
        Self {
            table: Arc::new(table),
            current: RwSignal::new(initial),
        }
    }

    pub fn table(&self) -> &RouteTable<H> {
        &self.table
    }

    /// Tracked read of the committed route.
    pub fn current_route(&self) -> CurrentRoute {
        self.current.get()
    }

    pub fn current_route_untracked(&self) -> CurrentRoute {
        self.current.get_untracked()
    }

    /// Push `path` onto history and re-evaluate the route.
    pub fn navigate(&self, path: &str) {
        self.change_history(path, false);
    }

    /// Like [`navigate`](Self::navigate) but replaces the current history entry.
    pub fn replace(&self, path: &str) {
        self.change_history(path, true);
    }

    fn change_history(&self, path: &str, replace: bool) {
        let Some(history) = web_sys::window().and_then(|w| w.history().ok()) else {
            return;
        };
        let res = if replace {
            history.replace_state_with_url(&JsValue::NULL, "", Some(path))
        } else {
            history.push_state_with_url(&JsValue::NULL, "", Some(path))
        };
        if res.is_err() {
            log::warn!("history update to {path} rejected");
            return;
        }
        self.sync_from_location();
        dispatch_navigate_event();
    }

    /// Recompute the route from `window.location`. Commits (and scrolls to top) only on change.
    pub fn sync_from_location(&self) {
        let next = self.table.current_for(&location_pathname());
        if self.current.get_untracked() == next {
            return;
        }
        log::debug!("route -> {} ({})", next.path, next.pattern);
        self.current.set(next);
        if let Some(win) = web_sys::window() {
            win.scroll_to_with_x_and_y(0.0, 0.0);
        }
    }

    /// Rewrite a legacy `#/path` location into a real path. Returns whether it did.
    pub fn migrate_legacy_fragment(&self) -> bool {
        let hash = web_sys::window()
            .and_then(|w| w.location().hash().ok())
            .unwrap_or_default();
        match legacy_fragment_path(&hash) {
            Some(path) => {
                self.replace(&path);
                true
            }
            None => false,
        }
    }

    /// Install the global listeners. Call once at startup.
    pub fn start(&self) {
        let Some(win) = web_sys::window() else {
            return;
        };

        self.migrate_legacy_fragment();

        // Installed for the app lifetime; the handles are only needed to remove them.
        let r = self.clone();
        let _popstate = window_event_listener(ev::popstate, move |_ev: web_sys::PopStateEvent| {
            r.sync_from_location();
        });

        let r = self.clone();
        let _hashchange =
            window_event_listener(ev::hashchange, move |_ev: web_sys::HashChangeEvent| {
                if !r.migrate_legacy_fragment() {
                    r.sync_from_location();
                }
            });

        let r = self.clone();
        let _navigate = window_event_listener_untyped(NAVIGATE_EVENT, move |_ev: web_sys::Event| {
            r.sync_from_location();
        });

        // Capture phase, so we see the click before any bubbling handler can swallow it.
        // `window_event_listener` can't register for capture.
        let r = self.clone();
        add_capture_listener(&win, "click", move |ev: web_sys::Event| {
            let Some(ev) = ev.dyn_ref::<web_sys::MouseEvent>() else {
                return;
            };
            let Some(ctx) = click_context(ev) else {
                return;
            };
            let here = web_sys::window()
                .and_then(|w| w.location().href().ok())
                .unwrap_or_default();
            if let Some(path) = intercept_target(&ctx, &here) {
                ev.prevent_default();
                r.navigate(&path);
            }
        });
    }
}

fn add_capture_listener(
    win: &web_sys::Window,
    name: &str,
    f: impl FnMut(web_sys::Event) + 'static,
) {
    let cb = Closure::wrap(Box::new(f) as Box<dyn FnMut(web_sys::Event)>);
    let res =
        win.add_event_listener_with_callback_and_bool(name, cb.as_ref().unchecked_ref(), true);
    if res.is_err() {
        log::warn!("could not listen for {name}");
    }
    // Router lives for the app lifetime.
    cb.forget();
}

fn dispatch_navigate_event() {
    let Some(win) = web_sys::window() else {
        return;
    };
    let sent = web_sys::Event::new(NAVIGATE_EVENT).and_then(|ev| win.dispatch_event(&ev));
    if sent.is_err() {
        log::warn!("could not dispatch {NAVIGATE_EVENT}");
    }
}

fn location_pathname() -> String {
    web_sys::window()
        .and_then(|w| w.location().pathname().ok())
        .unwrap_or_else(|| "/".to_string())
}

/// Read the anchor the click landed in (if any) into a [`ClickContext`].
fn click_context(ev: &web_sys::MouseEvent) -> Option<ClickContext> {
    let el = ev.target()?.dyn_into::<web_sys::Element>().ok()?;
    let anchor = el.closest("a[href]").ok().flatten()?;

    let rel_external = anchor
        .get_attribute("rel")
        .map(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("external")))
        .unwrap_or(false);

    Some(ClickContext {
        button: ev.button(),
        default_prevented: ev.default_prevented(),
        modifier: ev.ctrl_key() || ev.meta_key() || ev.shift_key() || ev.alt_key(),
        target: anchor.get_attribute("target"),
        download: anchor.has_attribute("download"),
        external: rel_external || anchor.has_attribute("data-external"),
        opted_out: anchor.has_attribute("data-router-ignore"),
        href: anchor.get_attribute("href"),
    })
}
