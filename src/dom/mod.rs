//! In-memory document model standing in for the host's rendering environment.
//!
//! A [`Document`] is a cheap clonable handle around a node arena. Every
//! operation is a short synchronous critical section; mutation observers and
//! event listeners are always invoked with the lock released so they are free
//! to modify the document themselves.

pub mod html;
pub mod selector;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};
use url::Url;

pub use selector::Selector;

/// Upper bound on observer delivery rounds per [`Document::deliver_mutations`]
/// call. An observer that keeps producing records it also listens to would
/// otherwise spin forever.
pub const MAX_DELIVERY_ROUNDS: usize = 32;

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "dd", "details", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "hr", "li", "main", "nav", "ol", "p", "pre", "section", "summary", "table", "tr",
    "ul",
];

const INVISIBLE_TAGS: &[&str] = &["head", "script", "style", "noscript", "template"];

/// Handle to a node. Slots are reused once a subtree is removed; the
/// generation makes a handle to a removed node stay dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ElementData {
    pub(crate) tag: String,
    attrs: Vec<(String, String)>,
}

impl ElementData {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        }
    }

    pub(crate) fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn set_attr(&mut self, name: &str, value: &str) {
        match self.attrs.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attrs.push((name.to_string(), value.to_string())),
        }
    }

    pub(crate) fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|list| list.split_whitespace().any(|c| c == class))
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<NodeData>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    ChildList {
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    Attributes {
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub kind: MutationKind,
}

impl MutationRecord {
    #[must_use]
    pub fn is_child_list(&self) -> bool {
        matches!(self.kind, MutationKind::ChildList { .. })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ObserveOptions {
    pub child_list: bool,
    pub attributes: bool,
    pub subtree: bool,
}

pub type MutationCallback = Arc<dyn Fn(&Document, &[MutationRecord]) + Send + Sync>;
pub type EventHandler = Arc<dyn Fn(&Document, NodeId) + Send + Sync>;

struct Registration {
    id: ObserverId,
    target: NodeId,
    options: ObserveOptions,
    callback: MutationCallback,
}

pub(crate) struct DocumentInner {
    slots: Vec<Slot>,
    free: Vec<usize>,
    root: NodeId,
    url: Option<Url>,
    observers: Vec<Registration>,
    next_observer: usize,
    pending: Vec<(ObserverId, MutationRecord)>,
    listeners: HashMap<(NodeId, String), Vec<EventHandler>>,
}

impl DocumentInner {
    fn empty(url: Option<Url>) -> Self {
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(NodeData {
                    kind: NodeKind::Document,
                    parent: None,
                    children: Vec::new(),
                }),
            }],
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            url,
            observers: Vec::new(),
            next_observer: 0,
            pending: Vec::new(),
            listeners: HashMap::new(),
        }
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let data = NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        };
        if let Some(index) = self.free.pop()
            && let Some(slot) = self.slots.get_mut(index)
        {
            slot.node = Some(data);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            node: Some(data),
        });
        NodeId {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Free `node` and its whole subtree, along with the listeners and
    /// observers bound to it. `node` must already be detached.
    fn release(&mut self, node: NodeId) {
        if node == self.root || self.node(node).is_none() {
            return;
        }
        let mut dead = self.descendants(node);
        dead.push(node);
        for id in &dead {
            if let Some(slot) = self.slots.get_mut(id.index) {
                slot.node = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
            }
        }
        let dead: HashSet<NodeId> = dead.into_iter().collect();
        self.listeners.retain(|(target, _), _| !dead.contains(target));
        self.observers.retain(|reg| !dead.contains(&reg.target));
    }

    fn live_nodes(&self) -> usize {
        self.slots.iter().filter(|slot| slot.node.is_some()).count()
    }

    pub(crate) fn child_ids(&self, id: NodeId) -> &[NodeId] {
        self.node(id)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    pub(crate) fn has_text(&self, id: NodeId) -> bool {
        matches!(self.node(id).map(|n| &n.kind), Some(NodeKind::Text(t)) if !t.is_empty())
    }

    pub(crate) fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub(crate) fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.node(id).map(|n| &n.kind) {
            Some(NodeKind::Element(e)) => Some(e),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match self.node_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Element(e)) => Some(e),
            _ => None,
        }
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.parent(node) {
                Some(p) => node = p,
                None => return false,
            }
        }
    }

    fn queue(&mut self, record: MutationRecord) {
        let interested: Vec<ObserverId> = self
            .observers
            .iter()
            .filter(|reg| {
                let kind_ok = match record.kind {
                    MutationKind::ChildList { .. } => reg.options.child_list,
                    MutationKind::Attributes { .. } => reg.options.attributes,
                };
                let scope_ok = record.target == reg.target
                    || (reg.options.subtree && self.is_inclusive_ancestor(reg.target, record.target));
                kind_ok && scope_ok
            })
            .map(|reg| reg.id)
            .collect();
        for id in interested {
            self.pending.push((id, record.clone()));
        }
    }

    fn detach(&mut self, child: NodeId) -> Option<NodeId> {
        let parent = self.parent(child)?;
        if let Some(p) = self.node_mut(parent) {
            p.children.retain(|&c| c != child);
        }
        if let Some(c) = self.node_mut(child) {
            c.parent = None;
        }
        Some(parent)
    }

    fn append(&mut self, parent: NodeId, child: NodeId) {
        if self.node(parent).is_none() || self.node(child).is_none() {
            warn!("Refusing to append a removed node");
            return;
        }
        if parent == child || self.is_inclusive_ancestor(child, parent) {
            warn!("Refusing to append a node into its own subtree");
            return;
        }
        if let Some(old_parent) = self.detach(child) {
            self.queue(MutationRecord {
                target: old_parent,
                kind: MutationKind::ChildList {
                    added: Vec::new(),
                    removed: vec![child],
                },
            });
        }
        if let Some(p) = self.node_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.node_mut(child) {
            c.parent = Some(parent);
        }
        self.queue(MutationRecord {
            target: parent,
            kind: MutationKind::ChildList {
                added: vec![child],
                removed: Vec::new(),
            },
        });
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        let changed = match self.element_mut(node) {
            Some(element) => {
                if element.attr(&name) == Some(value) {
                    false
                } else {
                    element.set_attr(&name, value);
                    true
                }
            }
            None => false,
        };
        if changed {
            self.queue(MutationRecord {
                target: node,
                kind: MutationKind::Attributes { name },
            });
        }
    }

    fn descendants(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match self.node(from) {
            Some(n) => n.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(n) = self.node(id) {
                stack.extend(n.children.iter().rev().copied());
            }
        }
        out
    }

    fn select(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|&id| selector.matches(self, id))
            .collect()
    }

    fn first_with_tag(&self, tag: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|&id| self.element(id).is_some_and(|e| e.tag == tag))
    }

    fn text_content(&self, node: NodeId, out: &mut String) {
        match self.node(node).map(|n| &n.kind) {
            Some(NodeKind::Text(t)) => out.push_str(t),
            Some(_) => {
                if let Some(n) = self.node(node) {
                    for &child in &n.children {
                        self.text_content(child, out);
                    }
                }
            }
            None => {}
        }
    }

    fn is_hidden(element: &ElementData) -> bool {
        if INVISIBLE_TAGS.contains(&element.tag.as_str()) || element.attr("hidden").is_some() {
            return true;
        }
        element.attr("style").is_some_and(|style| {
            parse_style(style)
                .iter()
                .any(|(name, value)| name == "display" && value.eq_ignore_ascii_case("none"))
        })
    }

    fn visible_text(&self, node: NodeId, in_pre: bool, out: &mut String) {
        let Some(data) = self.node(node) else {
            return;
        };
        match &data.kind {
            NodeKind::Text(t) => {
                if in_pre {
                    out.push_str(t);
                } else {
                    let collapsed = t.split_whitespace().collect::<Vec<_>>().join(" ");
                    let leading = t.starts_with(char::is_whitespace);
                    let trailing = t.ends_with(char::is_whitespace);
                    if collapsed.is_empty() {
                        if !t.is_empty() && !out.ends_with([' ', '\n']) && !out.is_empty() {
                            out.push(' ');
                        }
                        return;
                    }
                    if leading && !out.ends_with([' ', '\n']) && !out.is_empty() {
                        out.push(' ');
                    }
                    out.push_str(&collapsed);
                    if trailing {
                        out.push(' ');
                    }
                }
            }
            NodeKind::Element(element) => {
                if Self::is_hidden(element) {
                    return;
                }
                if element.tag == "br" {
                    out.push('\n');
                    return;
                }
                let block = BLOCK_TAGS.contains(&element.tag.as_str());
                if block && !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                let pre = in_pre || element.tag == "pre";
                for &child in &data.children {
                    self.visible_text(child, pre, out);
                }
                if block && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            NodeKind::Document => {
                for &child in &data.children {
                    self.visible_text(child, in_pre, out);
                }
            }
        }
    }
}

/// Parse an inline `style` attribute into ordered `(property, value)` pairs.
#[must_use]
pub fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim();
            if name.is_empty() || value.is_empty() {
                return None;
            }
            Some((name, value.to_string()))
        })
        .collect()
}

fn serialize_style(decls: &[(String, String)]) -> String {
    decls
        .iter()
        .map(|(n, v)| format!("{n}: {v};"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn tidy_lines(raw: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    for line in raw.lines().map(str::trim) {
        if line.is_empty() && lines.last().is_none_or(|l| l.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    lines.join("\n").trim().to_string()
}

#[derive(Clone)]
pub struct Document {
    inner: Arc<Mutex<DocumentInner>>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Document")
            .field("url", &inner.url.as_ref().map(Url::as_str))
            .field("nodes", &inner.live_nodes())
            .field("slots", &inner.slots.len())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Document {
    /// An empty `html > (head, body)` document.
    #[must_use]
    pub fn new(url: Option<Url>) -> Self {
        let mut inner = DocumentInner::empty(url);
        let root = inner.root;
        let html = inner.alloc(NodeKind::Element(ElementData::new("html")));
        let head = inner.alloc(NodeKind::Element(ElementData::new("head")));
        let body = inner.alloc(NodeKind::Element(ElementData::new("body")));
        inner.append(root, html);
        inner.append(html, head);
        inner.append(html, body);
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Two handles are the same document when they share the arena.
    #[must_use]
    pub fn same_document(&self, other: &Document) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    #[must_use]
    pub fn url(&self) -> Option<Url> {
        self.inner.lock().url.clone()
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        self.inner.lock().root
    }

    fn ensure_section(&self, tag: &str) -> NodeId {
        let mut inner = self.inner.lock();
        if let Some(found) = inner.first_with_tag(tag) {
            return found;
        }
        let html = match inner.first_with_tag("html") {
            Some(html) => html,
            None => {
                let root = inner.root;
                let html = inner.alloc(NodeKind::Element(ElementData::new("html")));
                inner.append(root, html);
                html
            }
        };
        let section = inner.alloc(NodeKind::Element(ElementData::new(tag)));
        inner.append(html, section);
        section
    }

    #[must_use]
    pub fn head(&self) -> NodeId {
        self.ensure_section("head")
    }

    #[must_use]
    pub fn body(&self) -> NodeId {
        self.ensure_section("body")
    }

    /// Text of the first `<title>`, whitespace-collapsed.
    #[must_use]
    pub fn title(&self) -> String {
        let inner = self.inner.lock();
        let Some(title) = inner.first_with_tag("title") else {
            return String::new();
        };
        let mut raw = String::new();
        inner.text_content(title, &mut raw);
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    // ---- tree construction ---------------------------------------------

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.inner
            .lock()
            .alloc(NodeKind::Element(ElementData::new(tag)))
    }

    pub fn create_text(&self, text: &str) -> NodeId {
        self.inner.lock().alloc(NodeKind::Text(text.to_string()))
    }

    pub fn append_child(&self, parent: NodeId, child: NodeId) {
        self.inner.lock().append(parent, child);
    }

    /// Create an element with attributes and append it to `parent`.
    pub fn append_element(&self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let mut inner = self.inner.lock();
        let mut data = ElementData::new(tag);
        for (name, value) in attrs {
            data.set_attr(&name.to_ascii_lowercase(), value);
        }
        let id = inner.alloc(NodeKind::Element(data));
        inner.append(parent, id);
        id
    }

    pub fn append_text(&self, parent: NodeId, text: &str) -> NodeId {
        let mut inner = self.inner.lock();
        let id = inner.alloc(NodeKind::Text(text.to_string()));
        inner.append(parent, id);
        id
    }

    /// Detach `node` from its parent and discard it with its subtree. The
    /// handles become dead: later calls with them are no-ops. Removing a node
    /// twice is harmless.
    pub fn remove(&self, node: NodeId) {
        let mut inner = self.inner.lock();
        if let Some(parent) = inner.detach(node) {
            inner.queue(MutationRecord {
                target: parent,
                kind: MutationKind::ChildList {
                    added: Vec::new(),
                    removed: vec![node],
                },
            });
        }
        inner.release(node);
    }

    /// Replace all children of `node` with a single text node.
    pub fn set_text(&self, node: NodeId, text: &str) {
        let mut inner = self.inner.lock();
        let removed = inner
            .node(node)
            .map(|n| n.children.clone())
            .unwrap_or_default();
        if inner.element(node).is_none() {
            return;
        }
        for &child in &removed {
            inner.detach(child);
            inner.release(child);
        }
        let text_node = inner.alloc(NodeKind::Text(text.to_string()));
        if let Some(n) = inner.node_mut(node) {
            n.children.push(text_node);
        }
        if let Some(t) = inner.node_mut(text_node) {
            t.parent = Some(node);
        }
        inner.queue(MutationRecord {
            target: node,
            kind: MutationKind::ChildList {
                added: vec![text_node],
                removed,
            },
        });
    }

    /// Discard every child of `node`.
    pub fn clear_children(&self, node: NodeId) {
        let mut inner = self.inner.lock();
        let removed = inner
            .node(node)
            .map(|n| n.children.clone())
            .unwrap_or_default();
        if removed.is_empty() {
            return;
        }
        for &child in &removed {
            inner.detach(child);
            inner.release(child);
        }
        inner.queue(MutationRecord {
            target: node,
            kind: MutationKind::ChildList {
                added: Vec::new(),
                removed,
            },
        });
    }

    // ---- inspection -------------------------------------------------------

    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.lock().parent(node)
    }

    #[must_use]
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.inner
            .lock()
            .node(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn tag_name(&self, node: NodeId) -> Option<String> {
        self.inner.lock().element(node).map(|e| e.tag.clone())
    }

    /// Whether `node` is reachable from the document root.
    #[must_use]
    pub fn is_connected(&self, node: NodeId) -> bool {
        let inner = self.inner.lock();
        let root = inner.root;
        inner.is_inclusive_ancestor(root, node)
    }

    #[must_use]
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.inner.lock().text_content(node, &mut out);
        out
    }

    /// Rendered text of `node`: hidden subtrees skipped, whitespace collapsed
    /// outside `pre`, block boundaries turned into line breaks.
    #[must_use]
    pub fn inner_text(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.inner.lock().visible_text(node, false, &mut out);
        tidy_lines(&out)
    }

    // ---- attributes, classes, styles -------------------------------------

    #[must_use]
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.inner
            .lock()
            .element(node)
            .and_then(|e| e.attr(&name.to_ascii_lowercase()).map(str::to_string))
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        self.inner.lock().set_attribute(node, name, value);
    }

    #[must_use]
    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.inner
            .lock()
            .element(node)
            .is_some_and(|e| e.has_class(class))
    }

    pub fn add_class(&self, node: NodeId, class: &str) {
        let mut inner = self.inner.lock();
        let Some(element) = inner.element(node) else {
            return;
        };
        if element.has_class(class) {
            return;
        }
        let list = match element.attr("class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {class}", existing.trim()),
            _ => class.to_string(),
        };
        inner.set_attribute(node, "class", &list);
    }

    #[must_use]
    pub fn style_property(&self, node: NodeId, property: &str) -> Option<String> {
        let style = self.attribute(node, "style")?;
        let property = property.to_ascii_lowercase();
        parse_style(&style)
            .into_iter()
            .find(|(n, _)| *n == property)
            .map(|(_, v)| v)
    }

    /// Set one inline style declaration, keeping the others in order.
    pub fn set_style_property(&self, node: NodeId, property: &str, value: &str) {
        let mut inner = self.inner.lock();
        let Some(element) = inner.element(node) else {
            return;
        };
        let mut decls = parse_style(element.attr("style").unwrap_or_default());
        let property = property.to_ascii_lowercase();
        match decls.iter_mut().find(|(n, _)| *n == property) {
            Some((_, v)) => *v = value.to_string(),
            None => decls.push((property, value.to_string())),
        }
        inner.set_attribute(node, "style", &serialize_style(&decls));
    }

    // ---- queries ------------------------------------------------------------

    #[must_use]
    pub fn select_all(&self, selector: &Selector) -> Vec<NodeId> {
        let inner = self.inner.lock();
        let root = inner.root;
        inner.select(root, selector)
    }

    #[must_use]
    pub fn select_first_within(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.inner.lock().select(scope, selector).into_iter().next()
    }

    /// All elements matching `selector` in document order. An unparsable
    /// selector matches nothing.
    #[must_use]
    pub fn query_selector_all(&self, selector: &str) -> Vec<NodeId> {
        match Selector::parse(selector) {
            Ok(sel) => self.select_all(&sel),
            Err(e) => {
                warn!("{}", e);
                Vec::new()
            }
        }
    }

    #[must_use]
    pub fn query_selector(&self, selector: &str) -> Option<NodeId> {
        self.query_selector_all(selector).into_iter().next()
    }

    #[must_use]
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        let inner = self.inner.lock();
        inner
            .descendants(inner.root)
            .into_iter()
            .find(|&n| inner.element(n).is_some_and(|e| e.attr("id") == Some(id)))
    }

    // ---- mutation observers -------------------------------------------------

    pub fn observe(
        &self,
        target: NodeId,
        options: ObserveOptions,
        callback: MutationCallback,
    ) -> ObserverId {
        let mut inner = self.inner.lock();
        let id = ObserverId(inner.next_observer);
        inner.next_observer += 1;
        inner.observers.push(Registration {
            id,
            target,
            options,
            callback,
        });
        id
    }

    pub fn disconnect(&self, observer: ObserverId) {
        let mut inner = self.inner.lock();
        inner.observers.retain(|reg| reg.id != observer);
        inner.pending.retain(|(id, _)| *id != observer);
    }

    /// Nodes currently alive in the arena, attached or not.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inner.lock().live_nodes()
    }

    /// Arena capacity, live and free slots together.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.inner.lock().slots.len()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn pending_mutations(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Hand queued records to their observers, batch per observer, until the
    /// queue drains or [`MAX_DELIVERY_ROUNDS`] is reached. Returns the number
    /// of records delivered.
    pub fn deliver_mutations(&self) -> usize {
        let mut delivered = 0;
        for _ in 0..MAX_DELIVERY_ROUNDS {
            let batches: Vec<(MutationCallback, Vec<MutationRecord>)> = {
                let mut inner = self.inner.lock();
                if inner.pending.is_empty() {
                    return delivered;
                }
                let pending = std::mem::take(&mut inner.pending);
                let mut grouped: Vec<(ObserverId, Vec<MutationRecord>)> = Vec::new();
                for (id, record) in pending {
                    match grouped.iter_mut().find(|(g, _)| *g == id) {
                        Some((_, records)) => records.push(record),
                        None => grouped.push((id, vec![record])),
                    }
                }
                grouped
                    .into_iter()
                    .filter_map(|(id, records)| {
                        inner
                            .observers
                            .iter()
                            .find(|reg| reg.id == id)
                            .map(|reg| (Arc::clone(&reg.callback), records))
                    })
                    .collect()
            };
            for (callback, records) in batches {
                delivered += records.len();
                callback(self, &records);
            }
        }
        if self.pending_mutations() > 0 {
            warn!(
                "Mutation delivery stopped after {} rounds with records still queued",
                MAX_DELIVERY_ROUNDS
            );
        }
        delivered
    }

    // ---- events -------------------------------------------------------------

    pub fn add_event_listener(&self, node: NodeId, event: &str, handler: EventHandler) {
        let mut inner = self.inner.lock();
        if inner.node(node).is_none() {
            debug!("Ignoring `{}` listener for a removed node", event);
            return;
        }
        inner
            .listeners
            .entry((node, event.to_string()))
            .or_default()
            .push(handler);
    }

    /// Run every handler bound to `event` on `node`. Returns false when no
    /// handler was bound.
    pub fn dispatch_event(&self, node: NodeId, event: &str) -> bool {
        let handlers: Vec<EventHandler> = self
            .inner
            .lock()
            .listeners
            .get(&(node, event.to_string()))
            .cloned()
            .unwrap_or_default();
        if handlers.is_empty() {
            debug!("No `{}` handler bound on node {:?}", event, node);
            return false;
        }
        for handler in handlers {
            handler(self, node);
        }
        true
    }

    pub fn click(&self, node: NodeId) -> bool {
        self.dispatch_event(node, "click")
    }

    // ---- loading --------------------------------------------------------------

    /// Build a document by appending children through a raw builder. Used by
    /// the HTML loader; observers cannot exist yet so nothing is queued.
    pub(crate) fn build<F>(url: Option<Url>, fill: F) -> Self
    where
        F: FnOnce(&mut DocumentBuilder<'_>),
    {
        let mut inner = DocumentInner::empty(url);
        let root = inner.root;
        fill(&mut DocumentBuilder {
            inner: &mut inner,
            root,
        });
        let doc = Self {
            inner: Arc::new(Mutex::new(inner)),
        };
        // Guarantee head/body exist even for fragments.
        let _ = doc.head();
        let _ = doc.body();
        doc
    }
}

pub(crate) struct DocumentBuilder<'a> {
    inner: &'a mut DocumentInner,
    root: NodeId,
}

impl DocumentBuilder<'_> {
    pub(crate) fn root(&self) -> NodeId {
        self.root
    }

    pub(crate) fn element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let mut data = ElementData::new(tag);
        for (name, value) in attrs {
            data.set_attr(&name.to_ascii_lowercase(), value);
        }
        let id = self.inner.alloc(NodeKind::Element(data));
        self.inner.append(parent, id);
        id
    }

    pub(crate) fn text(&mut self, parent: NodeId, text: &str) {
        let id = self.inner.alloc(NodeKind::Text(text.to_string()));
        self.inner.append(parent, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn new_document_has_head_and_body() {
        let doc = Document::default();
        let head = doc.head();
        let body = doc.body();
        assert_eq!(doc.tag_name(head).as_deref(), Some("head"));
        assert_eq!(doc.tag_name(body).as_deref(), Some("body"));
        assert!(doc.is_connected(body));
    }

    #[test]
    fn inner_text_skips_hidden_and_breaks_blocks() {
        let doc = Document::default();
        let body = doc.body();
        let p = doc.append_element(body, "p", &[]);
        doc.append_text(p, "  Hello\n   world ");
        let script = doc.append_element(body, "script", &[]);
        doc.append_text(script, "var x = 1;");
        let hidden = doc.append_element(body, "div", &[("style", "display: none")]);
        doc.append_text(hidden, "secret");
        let p2 = doc.append_element(body, "p", &[]);
        doc.append_text(p2, "Second");

        assert_eq!(doc.inner_text(body), "Hello world\nSecond");
    }

    #[test]
    fn style_properties_merge_in_order() {
        let doc = Document::default();
        let div = doc.append_element(doc.body(), "div", &[("style", "color: red")]);
        doc.set_style_property(div, "padding", "10px");
        doc.set_style_property(div, "color", "blue");
        assert_eq!(
            doc.attribute(div, "style").as_deref(),
            Some("color: blue; padding: 10px;")
        );
        assert_eq!(doc.style_property(div, "PADDING").as_deref(), Some("10px"));
    }

    #[test]
    fn observers_only_see_subscribed_kinds() {
        let doc = Document::default();
        let body = doc.body();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        doc.observe(
            body,
            ObserveOptions {
                child_list: true,
                subtree: true,
                ..ObserveOptions::default()
            },
            Arc::new(move |_: &Document, records: &[MutationRecord]| {
                counter.fetch_add(records.len(), Ordering::SeqCst);
            }),
        );

        let div = doc.append_element(body, "div", &[]);
        doc.add_class(div, "x");
        doc.append_text(div, "nested");
        assert_eq!(doc.deliver_mutations(), 2);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(doc.deliver_mutations(), 0);
    }

    #[test]
    fn self_feeding_observer_is_bounded() {
        let doc = Document::default();
        let body = doc.body();
        doc.observe(
            body,
            ObserveOptions {
                child_list: true,
                ..ObserveOptions::default()
            },
            Arc::new(|doc: &Document, _: &[MutationRecord]| {
                let body = doc.body();
                doc.append_element(body, "span", &[]);
            }),
        );
        doc.append_element(body, "div", &[]);
        assert_eq!(doc.deliver_mutations(), MAX_DELIVERY_ROUNDS);
    }

    #[test]
    fn remove_detaches_subtree() {
        let doc = Document::default();
        let outer = doc.append_element(doc.body(), "div", &[]);
        let inner = doc.append_element(outer, "span", &[]);
        doc.remove(outer);
        assert!(!doc.is_connected(outer));
        assert!(!doc.is_connected(inner));
        assert!(doc.query_selector("span").is_none());
    }

    #[test]
    fn removed_slots_are_reused_without_reviving_handles() {
        let doc = Document::default();
        let body = doc.body();
        let old = doc.append_element(body, "div", &[]);
        doc.add_event_listener(old, "click", Arc::new(|_: &Document, _: NodeId| {}));
        let before = doc.node_count();

        doc.remove(old);
        assert_eq!(doc.node_count(), before - 1);
        assert_eq!(doc.listener_count(), 0);
        assert!(!doc.click(old));

        let fresh = doc.append_element(body, "p", &[]);
        assert_eq!(fresh.index, old.index);
        assert_ne!(fresh, old);
        assert!(doc.tag_name(old).is_none());
        assert!(!doc.is_connected(old));
        doc.remove(old);
        assert!(doc.is_connected(fresh));
    }

    #[test]
    fn set_text_frees_replaced_children() {
        let doc = Document::default();
        let p = doc.append_element(doc.body(), "p", &[]);
        doc.set_text(p, "one");
        let count = doc.node_count();
        for _ in 0..50 {
            doc.set_text(p, "again");
        }
        assert_eq!(doc.node_count(), count);
        assert_eq!(doc.text_content(p), "again");
    }
}
