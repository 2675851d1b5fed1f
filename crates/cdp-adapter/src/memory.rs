//! Scripted in-memory host document.
//!
//! Pages are described with [`ElementSpec`] trees. Elements carry an optional
//! `key` so tests and simulations can address them across re-renders; the
//! [`ElementId`] handed to the agent is regenerated on every load, which makes
//! stale handles fail exactly like they do in a browser after a reload.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dropclick_core_types::ElementId;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::trace;

use crate::document::{DomEvent, ElementSnapshot, HostDocument};
use crate::errors::HostError;
use crate::selector::{SelectorList, SelectorTarget};

const EVENT_CAPACITY: usize = 256;

/// Declarative description of an element and its subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementSpec {
    tag: String,
    key: Option<String>,
    classes: Vec<String>,
    attrs: BTreeMap<String, String>,
    text: String,
    display_none: bool,
    visibility_hidden: bool,
    children: Vec<ElementSpec>,
}

impl ElementSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn disabled(self, disabled: bool) -> Self {
        if disabled {
            self.attr("disabled", "")
        } else {
            self
        }
    }

    pub fn display_none(mut self) -> Self {
        self.display_none = true;
        self
    }

    pub fn visibility_hidden(mut self) -> Self {
        self.visibility_hidden = true;
        self
    }

    pub fn child(mut self, child: ElementSpec) -> Self {
        self.children.push(child);
        self
    }
}

/// One dispatched click, as observed by the page.
#[derive(Debug, Clone)]
pub struct ClickRecord {
    pub id: ElementId,
    pub key: Option<String>,
    pub text: String,
    pub at: Instant,
}

type ClickHandler = Arc<dyn Fn(Arc<MemoryDocument>) + Send + Sync>;
type Renderer = Arc<dyn Fn(&str) -> Vec<ElementSpec> + Send + Sync>;

#[derive(Debug, Clone)]
struct Node {
    id: ElementId,
    key: Option<String>,
    tag: String,
    classes: Vec<String>,
    attrs: BTreeMap<String, String>,
    text: String,
    display_none: bool,
    visibility_hidden: bool,
    parent: Option<usize>,
    children: Vec<usize>,
    removed: bool,
}

#[derive(Debug, Clone, Default)]
struct DomTree {
    nodes: Vec<Node>,
}

#[derive(Clone, Copy)]
struct NodeRef<'a> {
    tree: &'a DomTree,
    idx: usize,
}

impl<'a> SelectorTarget for NodeRef<'a> {
    fn tag(&self) -> &str {
        &self.tree.nodes[self.idx].tag
    }

    fn has_class(&self, class: &str) -> bool {
        self.tree.nodes[self.idx].classes.iter().any(|c| c == class)
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.tree.nodes[self.idx].attrs.get(name).map(String::as_str)
    }

    fn parent(&self) -> Option<Self> {
        self.tree.nodes[self.idx].parent.map(|idx| NodeRef {
            tree: self.tree,
            idx,
        })
    }
}

impl DomTree {
    fn build(specs: &[ElementSpec], next_id: &mut u64) -> Self {
        let mut tree = DomTree::default();
        let body = ElementSpec::new("body");
        let root = tree.push(&body, None, next_id);
        for spec in specs {
            tree.insert(spec, root, next_id);
        }
        tree
    }

    fn push(&mut self, spec: &ElementSpec, parent: Option<usize>, next_id: &mut u64) -> usize {
        *next_id += 1;
        let idx = self.nodes.len();
        self.nodes.push(Node {
            id: ElementId::new(format!("n{}", next_id)),
            key: spec.key.clone(),
            tag: spec.tag.clone(),
            classes: spec.classes.clone(),
            attrs: spec.attrs.clone(),
            text: spec.text.clone(),
            display_none: spec.display_none,
            visibility_hidden: spec.visibility_hidden,
            parent,
            children: Vec::new(),
            removed: false,
        });
        if let Some(parent) = parent {
            self.nodes[parent].children.push(idx);
        }
        idx
    }

    fn insert(&mut self, spec: &ElementSpec, parent: usize, next_id: &mut u64) -> usize {
        let idx = self.push(spec, Some(parent), next_id);
        for child in &spec.children {
            self.insert(child, idx, next_id);
        }
        idx
    }

    fn live(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.nodes.len()).filter(|&idx| !self.is_detached(idx))
    }

    fn is_detached(&self, idx: usize) -> bool {
        let mut cursor = Some(idx);
        while let Some(current) = cursor {
            if self.nodes[current].removed {
                return true;
            }
            cursor = self.nodes[current].parent;
        }
        false
    }

    fn find_id(&self, id: &ElementId) -> Option<usize> {
        self.nodes.iter().position(|node| &node.id == id)
    }

    fn find_key(&self, key: &str) -> Option<usize> {
        self.live()
            .find(|&idx| self.nodes[idx].key.as_deref() == Some(key))
    }

    fn text_of(&self, idx: usize) -> String {
        let mut out = String::new();
        self.collect_text(idx, &mut out);
        out
    }

    fn collect_text(&self, idx: usize, out: &mut String) {
        let node = &self.nodes[idx];
        if node.removed {
            return;
        }
        if !node.text.is_empty() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&node.text);
        }
        for &child in &node.children {
            self.collect_text(child, out);
        }
    }

    fn ancestors_any(&self, idx: usize, pred: impl Fn(&Node) -> bool) -> bool {
        let mut cursor = Some(idx);
        while let Some(current) = cursor {
            if pred(&self.nodes[current]) {
                return true;
            }
            cursor = self.nodes[current].parent;
        }
        false
    }

    fn snapshot(&self, idx: usize) -> ElementSnapshot {
        let node = &self.nodes[idx];
        let attached = !self.is_detached(idx);
        ElementSnapshot {
            id: node.id.clone(),
            tag: node.tag.clone(),
            text: self.text_of(idx),
            classes: node.classes.clone(),
            role: node.attrs.get("role").cloned(),
            disabled: node.attrs.contains_key("disabled")
                || node.attrs.get("aria-disabled").map(String::as_str) == Some("true"),
            attached,
            rendered: attached && !self.ancestors_any(idx, |n| n.display_none),
            hidden: self.ancestors_any(idx, |n| n.visibility_hidden),
        }
    }
}

struct PageState {
    url: String,
    specs: Vec<ElementSpec>,
    tree: DomTree,
    history: Vec<(String, Vec<ElementSpec>)>,
    next_id: u64,
    renderer: Option<Renderer>,
    click_handlers: HashMap<String, ClickHandler>,
    failing_keys: HashSet<String>,
    clicks: Vec<ClickRecord>,
    reloads: usize,
    backs: usize,
}

impl PageState {
    fn load(&mut self, url: String, specs: Vec<ElementSpec>) {
        self.tree = DomTree::build(&specs, &mut self.next_id);
        self.url = url;
        self.specs = specs;
    }
}

/// In-memory [`HostDocument`] with scripted reactions.
pub struct MemoryDocument {
    me: Weak<MemoryDocument>,
    state: Mutex<PageState>,
    events: broadcast::Sender<DomEvent>,
}

impl MemoryDocument {
    pub fn new(url: impl Into<String>, specs: Vec<ElementSpec>) -> Arc<Self> {
        let (events, _rx) = broadcast::channel(EVENT_CAPACITY);
        Arc::new_cyclic(|me| {
            let mut state = PageState {
                url: String::new(),
                specs: Vec::new(),
                tree: DomTree::default(),
                history: Vec::new(),
                next_id: 0,
                renderer: None,
                click_handlers: HashMap::new(),
                failing_keys: HashSet::new(),
                clicks: Vec::new(),
                reloads: 0,
                backs: 0,
            };
            state.load(url.into(), specs);
            MemoryDocument {
                me: me.clone(),
                state: Mutex::new(state),
                events,
            }
        })
    }

    /// Page renderer consulted on reload and history traversal; it receives
    /// the URL being loaded. Without one, the stored specs are replayed.
    pub fn set_renderer<F>(&self, renderer: F)
    where
        F: Fn(&str) -> Vec<ElementSpec> + Send + Sync + 'static,
    {
        self.state.lock().renderer = Some(Arc::new(renderer));
    }

    /// Run `handler` after every click on the element carrying `key`.
    pub fn on_click<F>(&self, key: impl Into<String>, handler: F)
    where
        F: Fn(Arc<MemoryDocument>) + Send + Sync + 'static,
    {
        self.state
            .lock()
            .click_handlers
            .insert(key.into(), Arc::new(handler));
    }

    /// Make clicks on `key` raise, as a page script throwing in its handler would.
    pub fn fail_clicks_on(&self, key: impl Into<String>) {
        self.state.lock().failing_keys.insert(key.into());
    }

    pub fn navigate(&self, url: impl Into<String>, specs: Vec<ElementSpec>) {
        let url = url.into();
        {
            let mut state = self.state.lock();
            let previous = (state.url.clone(), state.specs.clone());
            state.history.push(previous);
            state.load(url.clone(), specs);
        }
        self.emit(DomEvent::Navigated { url });
    }

    /// Append `spec` under the element carrying `parent_key`, or under `<body>`.
    pub fn insert(&self, parent_key: Option<&str>, spec: ElementSpec) {
        let inserted = {
            let mut state = self.state.lock();
            let parent = match parent_key {
                Some(key) => state.tree.find_key(key),
                None => Some(0),
            };
            match parent {
                Some(parent) => {
                    let PageState { tree, next_id, .. } = &mut *state;
                    tree.insert(&spec, parent, next_id);
                    true
                }
                None => false,
            }
        };
        if inserted {
            self.emit(DomEvent::Mutated);
        }
    }

    pub fn remove(&self, key: &str) {
        self.mutate(key, |node| node.removed = true);
    }

    pub fn set_disabled(&self, key: &str, disabled: bool) {
        self.mutate(key, |node| {
            if disabled {
                node.attrs.insert("disabled".into(), String::new());
            } else {
                node.attrs.remove("disabled");
            }
        });
    }

    pub fn toggle_class(&self, key: &str, class: &str, on: bool) {
        self.mutate(key, |node| {
            node.classes.retain(|c| c != class);
            if on {
                node.classes.push(class.to_string());
            }
        });
    }

    pub fn set_display_none(&self, key: &str, none: bool) {
        self.mutate(key, |node| node.display_none = none);
    }

    pub fn set_visibility_hidden(&self, key: &str, hidden: bool) {
        self.mutate(key, |node| node.visibility_hidden = hidden);
    }

    pub fn set_text(&self, key: &str, text: &str) {
        self.mutate(key, |node| node.text = text.to_string());
    }

    pub fn url(&self) -> String {
        self.state.lock().url.clone()
    }

    pub fn clicks(&self) -> Vec<ClickRecord> {
        self.state.lock().clicks.clone()
    }

    pub fn clicks_on(&self, key: &str) -> usize {
        self.state
            .lock()
            .clicks
            .iter()
            .filter(|click| click.key.as_deref() == Some(key))
            .count()
    }

    pub fn reload_count(&self) -> usize {
        self.state.lock().reloads
    }

    pub fn back_count(&self) -> usize {
        self.state.lock().backs
    }

    /// Current handle of the live element carrying `key`.
    pub fn id_of(&self, key: &str) -> Option<ElementId> {
        let state = self.state.lock();
        state
            .tree
            .find_key(key)
            .map(|idx| state.tree.nodes[idx].id.clone())
    }

    fn mutate(&self, key: &str, change: impl FnOnce(&mut Node)) {
        let changed = {
            let mut state = self.state.lock();
            match state.tree.find_key(key) {
                Some(idx) => {
                    change(&mut state.tree.nodes[idx]);
                    true
                }
                None => false,
            }
        };
        if changed {
            self.emit(DomEvent::Mutated);
        }
    }

    fn emit(&self, event: DomEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn render(state: &PageState, url: &str, fallback: Vec<ElementSpec>) -> Vec<ElementSpec> {
        match &state.renderer {
            Some(renderer) => renderer(url),
            None => fallback,
        }
    }
}

#[async_trait]
impl HostDocument for MemoryDocument {
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementSnapshot>, HostError> {
        let selectors = SelectorList::parse(selector)?;
        let state = self.state.lock();
        let tree = &state.tree;
        Ok(tree
            .live()
            .filter(|&idx| selectors.matches(NodeRef { tree, idx }))
            .map(|idx| tree.snapshot(idx))
            .collect())
    }

    async fn inspect(&self, id: &ElementId) -> Result<Option<ElementSnapshot>, HostError> {
        let state = self.state.lock();
        Ok(state
            .tree
            .find_id(id)
            .filter(|&idx| !state.tree.is_detached(idx))
            .map(|idx| state.tree.snapshot(idx)))
    }

    async fn page_text(&self) -> Result<String, HostError> {
        let state = self.state.lock();
        Ok(state.tree.text_of(0))
    }

    async fn current_url(&self) -> Result<String, HostError> {
        Ok(self.url())
    }

    async fn click(&self, id: &ElementId) -> Result<(), HostError> {
        let handler = {
            let mut state = self.state.lock();
            let idx = state
                .tree
                .find_id(id)
                .filter(|&idx| !state.tree.is_detached(idx))
                .ok_or_else(|| HostError::Detached(id.clone()))?;
            let key = state.tree.nodes[idx].key.clone();
            if let Some(key) = &key {
                if state.failing_keys.contains(key) {
                    return Err(HostError::Script(format!("click handler on '{}' threw", key)));
                }
            }
            let record = ClickRecord {
                id: id.clone(),
                key: key.clone(),
                text: state.tree.text_of(idx),
                at: Instant::now(),
            };
            trace!(element = %id, key = ?key, "memory click");
            state.clicks.push(record);
            key.and_then(|key| state.click_handlers.get(&key).cloned())
        };
        if let (Some(handler), Some(me)) = (handler, self.me.upgrade()) {
            handler(me);
        }
        Ok(())
    }

    async fn reload(&self) -> Result<(), HostError> {
        let url = {
            let mut state = self.state.lock();
            let url = state.url.clone();
            let specs = Self::render(&state, &url, state.specs.clone());
            state.load(url.clone(), specs);
            state.reloads += 1;
            url
        };
        self.emit(DomEvent::Navigated { url });
        Ok(())
    }

    async fn history_back(&self) -> Result<(), HostError> {
        let url = {
            let mut state = self.state.lock();
            state.backs += 1;
            match state.history.pop() {
                Some((url, specs)) => {
                    let specs = Self::render(&state, &url, specs);
                    state.load(url.clone(), specs);
                    Some(url)
                }
                None => None,
            }
        };
        if let Some(url) = url {
            self.emit(DomEvent::Navigated { url });
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<DomEvent> {
        self.events.subscribe()
    }
}
