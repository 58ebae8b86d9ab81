use crate::entities::{EntityKind, Identity};
use crate::keys::{entity_key, normalize_key};
use crate::models::{field, FieldValue};
use crate::router::{RouteParams, RouteTable};
use crate::state::{AppContext, AppState, PageHandler};
use crate::storage::LocalStorage;
use crate::sync::{CollectionFeed, FeedOutcome};
use leptos::prelude::*;
use leptos::task::spawn_local;
use serde_json::{Map, Value};

const SECTIONS: &[(EntityKind, &str)] = &[
    (EntityKind::News, "Новости"),
    (EntityKind::Events, "События"),
    (EntityKind::Documents, "Документы"),
    (EntityKind::Deputies, "Депутаты"),
    (EntityKind::Committees, "Комитеты"),
    (EntityKind::Convocations, "Созывы"),
    (EntityKind::Portals, "Порталы"),
];

/// `/news`, `/slider-items`, ...
pub fn section_path(kind: EntityKind) -> String {
    format!("/{}", kind.name().replace('_', "-"))
}

pub fn routes() -> RouteTable<PageHandler> {
    RouteTable::<PageHandler>::new()
        .route("/", |_| view! { <HomePage /> }.into_any())
        .route("/news", |_| list_page(EntityKind::News))
        .route("/news/:id", |p| detail_page(EntityKind::News, p))
        .route("/events", |_| list_page(EntityKind::Events))
        .route("/events/:id", |p| detail_page(EntityKind::Events, p))
        .route("/documents", |_| list_page(EntityKind::Documents))
        .route("/documents/:id", |p| detail_page(EntityKind::Documents, p))
        .route("/deputies", |_| list_page(EntityKind::Deputies))
        .route("/deputies/:id", |p| detail_page(EntityKind::Deputies, p))
        .route("/committees", |_| list_page(EntityKind::Committees))
        .route("/committees/:id", |p| detail_page(EntityKind::Committees, p))
        .route("/convocations", |_| list_page(EntityKind::Convocations))
        .route("/convocations/:key", |p| detail_page(EntityKind::Convocations, p))
        .route("/portals", |_| list_page(EntityKind::Portals))
        .route("/portals/:id", |p| detail_page(EntityKind::Portals, p))
        .route("/pages/:slug", |p| detail_page(EntityKind::Pages, p))
        .route("*", |_| view! { <NotFound /> }.into_any())
}

fn list_page(kind: EntityKind) -> AnyView {
    view! { <EntityList kind=kind /> }.into_any()
}

fn detail_page(kind: EntityKind, params: RouteParams) -> AnyView {
    let key = params.into_values().next().unwrap_or_default();
    view! { <EntityDetail kind=kind raw_key=key /> }.into_any()
}

#[component]
pub fn App(state: AppState) -> impl IntoView {
    provide_context(AppContext(state.clone()));
    let router = state.router.clone();

    view! {
        <div class="min-h-screen">
            <header class="border-b px-4 py-3">
                <nav class="flex flex-wrap gap-4 text-sm">
                    <a href="/">"Главная"</a>
                    {SECTIONS
                        .iter()
                        .map(|(kind, label)| view! { <a href=section_path(*kind)>{*label}</a> })
                        .collect_view()}
                </nav>
            </header>
            <main class="px-4 py-6">
                {move || {
                    let route = router.current_route();
                    match router.table().resolve(&route.path) {
                        Some(r) => (r.handler)(r.params),
                        None => view! { <NotFound /> }.into_any(),
                    }
                }}
            </main>
        </div>
    }
}

#[component]
fn HomePage() -> impl IntoView {
    view! {
        <div class="grid gap-6">
            <EntityList kind=EntityKind::SliderItems />
            <EntityList kind=EntityKind::News />
        </div>
    }
}

#[component]
fn NotFound() -> impl IntoView {
    view! { <div class="px-4 py-8 text-xs text-muted-foreground">"Страница не найдена"</div> }
}

/// Reconciled collection for one kind, kept live for as long as the calling component.
///
/// Re-merges when the overlay changes (this tab or another) and refreshes the base from the API
/// once on mount.
#[derive(Clone, Copy)]
struct LiveCollection {
    feed: StoredValue<CollectionFeed<LocalStorage>>,
    revision: RwSignal<u64>,
    loading: RwSignal<bool>,
    error: RwSignal<Option<String>>,
}

impl LiveCollection {
    fn new(state: &AppState, kind: EntityKind) -> Self {
        let live = Self {
            feed: StoredValue::new(CollectionFeed::new(kind, state.overlays.clone())),
            revision: RwSignal::new(0),
            loading: RwSignal::new(true),
            error: RwSignal::new(None),
        };

        let revision = live.revision;
        let sub = state.overlays.bus().subscribe(kind, move |_| {
            revision.try_update(|r| *r += 1);
        });
        on_cleanup(move || drop(sub));

        live.refresh(state);
        live
    }

    fn refresh(self, state: &AppState) {
        let Some((kind, request_id)) = self
            .feed
            .try_update_value(|f| (f.kind(), f.begin_request()))
        else {
            return;
        };
        let client = state.api_client.get_untracked();

        spawn_local(async move {
            let result = client.list(kind, None).await;
            // None: the owning component is gone.
            let Some(outcome) = self.feed.try_update_value(|f| f.complete(request_id, result))
            else {
                return;
            };
            match outcome {
                FeedOutcome::Stale => return,
                FeedOutcome::Applied => {
                    self.error.try_set(None);
                }
                FeedOutcome::Degraded(e) => {
                    self.error.try_set(Some(e.to_string()));
                }
            }
            self.loading.try_set(false);
            self.revision.try_update(|r| *r += 1);
        });
    }

    /// Tracked read of the merged view.
    fn items(self) -> Vec<Value> {
        self.revision.track();
        self.feed.try_with_value(|f| f.view()).unwrap_or_default()
    }
}

fn display_title(kind: EntityKind, item: &Value) -> String {
    match item {
        Value::String(s) => s.clone(),
        _ => field(item, kind.title_field())
            .map(|f| f.display_text())
            .filter(|s| !s.trim().is_empty())
            .or_else(|| entity_key(kind, item))
            .unwrap_or_default(),
    }
}

#[component]
fn EntityList(kind: EntityKind) -> impl IntoView {
    let AppContext(state) = expect_context::<AppContext>();
    let live = LiveCollection::new(&state, kind);
    let can_edit = state.can_edit();

    let new_title = RwSignal::new(String::new());
    let create_state = state.clone();
    let on_create = move |_: leptos::ev::MouseEvent| {
        let title = new_title.get_untracked().trim().to_string();
        if title.is_empty() {
            return;
        }
        let record = match kind.identity() {
            Identity::ByKey => Value::String(title),
            Identity::ById => {
                let mut m = Map::new();
                m.insert(kind.title_field().to_string(), Value::String(title));
                Value::Object(m)
            }
        };
        if create_state.create_entity(kind, record).is_some() {
            new_title.set(String::new());
        }
    };

    let rows_state = state.clone();
    let rows = move || {
        let items = live.items();
        let keys: Vec<String> = items.iter().filter_map(|i| entity_key(kind, i)).collect();
        items
            .into_iter()
            .enumerate()
            .filter_map(|(pos, item)| {
                let key = entity_key(kind, &item)?;
                let title = display_title(kind, &item);
                let href = format!("{}/{}", section_path(kind), urlencoding::encode(&key));

                let del_state = rows_state.clone();
                let del_key = key.clone();
                let up_state = rows_state.clone();
                let up_keys = keys.clone();

                Some(view! {
                    <li class="flex items-center gap-2">
                        <a href=href>{title}</a>
                        <Show when=move || can_edit && kind.reorderable() && (pos > 0)>
                            {
                                let up_state = up_state.clone();
                                let up_keys = up_keys.clone();
                                view! {
                                    <button
                                        class="text-xs"
                                        on:click=move |_| {
                                            let mut order = up_keys.clone();
                                            order.swap(pos - 1, pos);
                                            up_state.reorder(kind, &order);
                                        }
                                    >
                                        "↑"
                                    </button>
                                }
                            }
                        </Show>
                        <Show when=move || can_edit>
                            {
                                let del_state = del_state.clone();
                                let del_key = del_key.clone();
                                view! {
                                    <button
                                        class="text-xs text-destructive"
                                        on:click=move |_| del_state.delete_entity(kind, &del_key)
                                    >
                                        "Удалить"
                                    </button>
                                }
                            }
                        </Show>
                    </li>
                })
            })
            .collect_view()
    };

    view! {
        <section class="grid gap-2">
            <h2 class="text-lg font-semibold">{kind.name()}</h2>
            <Show when=move || live.loading.get()>
                <div class="text-xs text-muted-foreground">"Загрузка…"</div>
            </Show>
            {move || live.error.get().map(|e| view! { <div class="text-xs text-destructive">{e}</div> })}
            <ul class="grid gap-1">{rows}</ul>
            <Show when=move || can_edit>
                <div class="flex gap-2">
                    <input
                        class="border px-2 text-sm"
                        prop:value=move || new_title.get()
                        on:input=move |ev| new_title.set(event_target_value(&ev))
                    />
                    <button class="text-sm" on:click=on_create.clone()>
                        "Добавить"
                    </button>
                </div>
            </Show>
        </section>
    }
}

#[component]
fn EntityDetail(kind: EntityKind, raw_key: String) -> impl IntoView {
    let AppContext(state) = expect_context::<AppContext>();
    let live = LiveCollection::new(&state, kind);
    let key = normalize_key(kind, &raw_key);

    let title_state = state.clone();
    let title_key = key.clone();
    let on_rename = move |title: String| {
        let (Some(key), false) = (title_key.as_deref(), title.trim().is_empty()) else {
            return;
        };
        let mut patch = Map::new();
        patch.insert(kind.title_field().to_string(), Value::String(title));
        title_state.patch_entity(kind, key, patch);
    };
    let can_edit = state.can_edit() && kind.identity() == Identity::ById;

    let record = move || {
        let key = key.as_deref()?;
        live.items()
            .into_iter()
            .find(|item| entity_key(kind, item).as_deref() == Some(key))
    };

    move || match record() {
        None if live.loading.get() => {
            view! { <div class="text-xs text-muted-foreground">"Загрузка…"</div> }.into_any()
        }
        None => view! { <NotFound /> }.into_any(),
        Some(item) => {
            let title = display_title(kind, &item);
            let on_rename = on_rename.clone();
            let draft = RwSignal::new(title.clone());
            view! {
                <article class="grid gap-3">
                    <h1 class="text-xl font-semibold">{title}</h1>
                    <dl class="grid gap-1 text-sm">{record_fields(kind, &item)}</dl>
                    <Show when=move || can_edit>
                        {
                            let on_rename = on_rename.clone();
                            view! {
                                <div class="flex gap-2">
                                    <input
                                        class="border px-2 text-sm"
                                        prop:value=move || draft.get()
                                        on:input=move |ev| draft.set(event_target_value(&ev))
                                    />
                                    <button
                                        class="text-sm"
                                        on:click=move |_| on_rename(draft.get_untracked())
                                    >
                                        "Сохранить"
                                    </button>
                                </div>
                            }
                        }
                    </Show>
                </article>
            }
            .into_any()
        }
    }
}

fn record_fields(kind: EntityKind, item: &Value) -> impl IntoView {
    let Some(map) = item.as_object() else {
        return ().into_any();
    };
    map.iter()
        .filter(|(name, _)| name.as_str() != "id" && name.as_str() != kind.title_field())
        .filter_map(|(name, raw)| FieldValue::decode(raw).map(|v| (name.clone(), v)))
        .map(|(name, value)| {
            let body = match &value {
                FieldValue::Text(text) => view! { <span>{text.clone()}</span> }.into_any(),
                FieldValue::Link(_) | FieldValue::Links(_) => value
                    .links()
                    .into_iter()
                    .map(|l| view! { <a href=l.url rel="external">{l.title}</a> })
                    .collect_view()
                    .into_any(),
            };
            view! {
                <dt class="text-muted-foreground">{name}</dt>
                <dd>{body}</dd>
            }
        })
        .collect_view()
        .into_any()
}
