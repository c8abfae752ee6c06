//! Headless document tree the picker and injector operate on.
//!
//! Elements live in an arena owned by [`Document`] and are addressed through
//! copyable [`NodeId`] handles. Removing an element only detaches it, so a stale
//! handle stays valid for reads and writes but no longer takes part in queries.

use url::Url;

/// Non-owning handle to an element of one [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Layout box of an element in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }
}

/// Document-level events the picker captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MouseOver,
    Click,
    ContextMenu,
    KeyDown,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::MouseOver => "mouseover",
            EventKind::Click => "click",
            EventKind::ContextMenu => "contextmenu",
            EventKind::KeyDown => "keydown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Clone)]
struct Listener {
    id: ListenerId,
    kind: EventKind,
    capture: bool,
}

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    text: String,
    rect: Rect,
    scoped_markup: Option<String>,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            parent: None,
            children: Vec::new(),
            text: String::new(),
            rect: Rect::default(),
            scoped_markup: None,
        }
    }
}

/// A live page: element tree, location, viewport, and listener registry.
///
/// Elements live in an append-only arena. Removing an element only detaches it,
/// so a [`NodeId`] never dangles or aliases a later element, and the slot is held
/// until the document is dropped. A page is built per navigation, which bounds
/// the growth to what one page session creates.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Element>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
    location: Url,
    viewport: (f64, f64),
    prefers_dark: bool,
    listeners: Vec<Listener>,
    next_listener: u64,
}

impl Document {
    /// Create an `html > head + body` skeleton for the page at `location`.
    pub fn new(location: &str) -> Result<Self, url::ParseError> {
        let location = Url::parse(location)?;
        let mut doc = Self {
            nodes: vec![Element::new("html")],
            root: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
            location,
            viewport: (1280.0, 800.0),
            prefers_dark: false,
            listeners: Vec::new(),
            next_listener: 0,
        };
        let root = doc.root;
        doc.head = doc.append_element(root, "head", &[]);
        doc.body = doc.append_element(root, "body", &[]);
        Ok(doc)
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    /// Hostname portion of the page URL, empty for host-less schemes.
    pub fn hostname(&self) -> &str {
        self.location.host_str().unwrap_or_default()
    }

    pub fn root_element(&self) -> NodeId {
        self.root
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn viewport(&self) -> (f64, f64) {
        self.viewport
    }

    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport = (width, height);
    }

    /// Ambient `prefers-color-scheme: dark` of the host environment.
    pub fn prefers_dark_scheme(&self) -> bool {
        self.prefers_dark
    }

    pub fn set_prefers_dark_scheme(&mut self, dark: bool) {
        self.prefers_dark = dark;
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.nodes.push(Element::new(tag));
        NodeId(self.nodes.len() - 1)
    }

    /// Create an element with `attributes` and append it to `parent`.
    pub fn append_element(
        &mut self,
        parent: NodeId,
        tag: &str,
        attributes: &[(&str, &str)],
    ) -> NodeId {
        let node = self.create_element(tag);
        for (name, value) in attributes {
            self.set_attribute(node, name, value);
        }
        self.append_child(parent, node);
        node
    }

    /// Move `child` to the end of `parent`'s children.
    ///
    /// Ignored when either handle is unknown or when the move would create a cycle.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if self.element(parent).is_none() || self.element(child).is_none() {
            return;
        }
        if child == self.root || child == parent || self.ancestors(parent).contains(&child) {
            return;
        }
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Detach `node` (and its subtree) from the tree. The root cannot be removed.
    ///
    /// The detached elements stay readable through their handles.
    pub fn remove(&mut self, node: NodeId) {
        if node == self.root {
            return;
        }
        self.detach(node);
    }

    fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.element(node).and_then(|el| el.parent) else {
            return;
        };
        self.nodes[parent.0].children.retain(|child| *child != node);
        self.nodes[node.0].parent = None;
    }

    /// Whether `node` is attached to this document's tree.
    pub fn is_connected(&self, node: NodeId) -> bool {
        if self.element(node).is_none() {
            return false;
        }
        node == self.root || self.ancestors(node).last() == Some(&self.root)
    }

    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|el| el.tag.as_str())
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        let Some(el) = self.nodes.get_mut(node.0) else {
            return;
        };
        match el.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value.to_owned(),
            None => el.attributes.push((name.to_owned(), value.to_owned())),
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let Some(el) = self.nodes.get_mut(node.0) {
            el.attributes.retain(|(key, _)| key != name);
        }
    }

    /// The `id` attribute, if present.
    pub fn id(&self, node: NodeId) -> Option<&str> {
        self.attribute(node, "id")
    }

    /// Class tokens in attribute order.
    pub fn classes(&self, node: NodeId) -> impl Iterator<Item = &str> + '_ {
        self.attribute(node, "class")
            .unwrap_or_default()
            .split_ascii_whitespace()
    }

    pub fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        self.element(node)?.parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.element(node)
            .map(|el| el.children.as_slice())
            .unwrap_or_default()
    }

    /// Ancestors of `node`, nearest first.
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.parent_element(node);
        while let Some(parent) = current {
            chain.push(parent);
            current = self.parent_element(parent);
        }
        chain
    }

    pub fn text_content(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|el| el.text.as_str())
    }

    pub fn set_text_content(&mut self, node: NodeId, text: impl Into<String>) {
        if let Some(el) = self.nodes.get_mut(node.0) {
            el.text = text.into();
        }
    }

    pub fn bounding_rect(&self, node: NodeId) -> Rect {
        self.element(node).map(|el| el.rect).unwrap_or_default()
    }

    pub fn set_bounding_rect(&mut self, node: NodeId, rect: Rect) {
        if let Some(el) = self.nodes.get_mut(node.0) {
            el.rect = rect;
        }
    }

    /// Attach an isolated subtree to `host`, replacing any previous one.
    ///
    /// Scoped content is opaque to light-tree queries, the way an open shadow root is.
    pub fn attach_scoped_markup(&mut self, host: NodeId, markup: impl Into<String>) {
        if let Some(el) = self.nodes.get_mut(host.0) {
            el.scoped_markup = Some(markup.into());
        }
    }

    pub fn scoped_markup(&self, host: NodeId) -> Option<&str> {
        self.element(host)?.scoped_markup.as_deref()
    }

    /// First connected element, in document order, whose id equals `id`.
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.elements()
            .into_iter()
            .find(|node| self.id(*node) == Some(id))
    }

    /// Every connected element in document (pre-)order, root first.
    /// Number of elements ever created, detached ones included.
    pub fn allocated(&self) -> usize {
        self.nodes.len()
    }

    pub fn elements(&self) -> Vec<NodeId> {
        let mut ordered = Vec::new();
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            ordered.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        ordered
    }

    pub fn add_event_listener(&mut self, kind: EventKind, capture: bool) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push(Listener { id, kind, capture });
        id
    }

    /// Detach a listener. Returns `false` if it was not attached.
    pub fn remove_event_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|listener| listener.id != id);
        self.listeners.len() != before
    }

    pub fn has_listener(&self, id: ListenerId) -> bool {
        self.listeners.iter().any(|listener| listener.id == id)
    }

    /// Number of attached listeners of `kind` registered for the capturing phase.
    pub fn capturing_listeners(&self, kind: EventKind) -> usize {
        self.listeners
            .iter()
            .filter(|listener| listener.kind == kind && listener.capture)
            .count()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn element(&self, node: NodeId) -> Option<&Element> {
        self.nodes.get(node.0)
    }
}
