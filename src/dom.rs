//! Headless document model: typed element trees rendered into containers.
//!
//! Cards are built as `Element` values instead of markup strings, so every
//! piece of server-supplied text goes through `escape_text`/`escape_attr`
//! when the tree is serialised. Containers hand out `NodeKey`s for their
//! direct children; a key is a weak handle and never keeps a node alive.
use std::collections::BTreeMap;

/// Handle to a direct child of a `Container`. Keys are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(u64);

/// Interaction wired to an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ViewDetails,
    Subscribe(i64),
    Unsubscribe(i64),
    SuggestStore,
    OpenMenu(i64),
    CloseMenu,
    EditStore(i64),
    AddEmailInput,
    DeleteStore,
    CloseStoreModal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    attrs: BTreeMap<String, String>,
    children: Vec<Node>,
    on_click: Option<Action>,
    hidden: bool,
}

const VOID_TAGS: &[&str] = &["img", "br", "input", "hr"];

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            id: None,
            classes: Vec::new(),
            attrs: BTreeMap::new(),
            children: Vec::new(),
            on_click: None,
            hidden: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.add_class(class);
        self
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn on_click(mut self, action: Action) -> Self {
        self.on_click = Some(action);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn add_class(&mut self, class: &str) {
        if !class.is_empty() && !self.has_class(class) {
            self.classes.push(class.to_string());
        }
    }

    pub fn remove_class(&mut self, class: &str) {
        self.classes.retain(|c| c != class);
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        self.attrs.insert(name.to_string(), value.into());
    }

    pub fn action(&self) -> Option<Action> {
        self.on_click
    }

    pub fn set_action(&mut self, action: Option<Action>) {
        self.on_click = action;
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn push_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn clear_children(&mut self) {
        self.children.clear();
    }

    /// Replaces all children with a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![Node::Text(text.into())];
    }

    /// Concatenated text of all descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Element> {
        self.find(&|e: &Element| e.id() == Some(id))
    }

    pub fn find_by_id_mut(&mut self, id: &str) -> Option<&mut Element> {
        self.find_mut(&|e: &Element| e.id() == Some(id))
    }

    pub fn find_by_class(&self, class: &str) -> Option<&Element> {
        self.find(&|e: &Element| e.has_class(class))
    }

    pub fn find_by_class_mut(&mut self, class: &str) -> Option<&mut Element> {
        self.find_mut(&|e: &Element| e.has_class(class))
    }

    fn find(&self, pred: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        if pred(self) {
            return Some(self);
        }
        self.children().find_map(|c| c.find(pred))
    }

    fn find_mut(&mut self, pred: &dyn Fn(&Element) -> bool) -> Option<&mut Element> {
        if pred(self) {
            return Some(self);
        }
        for child in self.children.iter_mut() {
            if let Node::Element(e) = child {
                if let Some(found) = e.find_mut(pred) {
                    return Some(found);
                }
            }
        }
        None
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        if let Some(id) = &self.id {
            push_attr(out, "id", id);
        }
        if !self.classes.is_empty() {
            push_attr(out, "class", &self.classes.join(" "));
        }
        for (name, value) in &self.attrs {
            push_attr(out, name, value);
        }
        if self.hidden {
            push_attr(out, "style", "display: none;");
        }
        out.push('>');
        if VOID_TAGS.contains(&self.tag.as_str()) {
            return;
        }
        let raw = self.tag == "script";
        for child in &self.children {
            match child {
                Node::Element(e) => e.write_html(out),
                // Script bodies are not entity-decoded; only the closing sequence needs breaking.
                Node::Text(t) if raw => out.push_str(&t.replace("</", "<\\/")),
                Node::Text(t) => out.push_str(&escape_text(t)),
            }
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }
}

fn collect_text(e: &Element, out: &mut String) {
    for child in &e.children {
        match child {
            Node::Text(t) => out.push_str(t),
            Node::Element(c) => collect_text(c, out),
        }
    }
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&escape_attr(value));
    out.push('"');
}

pub fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;").replace('\'', "&#39;")
}

/// A list element whose direct children are addressable by `NodeKey`.
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    id: String,
    attrs: BTreeMap<String, String>,
    children: Vec<(NodeKey, Element)>,
    next_key: u64,
}

impl Container {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attrs: BTreeMap::new(),
            children: Vec::new(),
            next_key: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        self.attrs.insert(name.to_string(), value.into());
    }

    fn mint_key(&mut self) -> NodeKey {
        let key = NodeKey(self.next_key);
        self.next_key += 1;
        key
    }

    pub fn append(&mut self, element: Element) -> NodeKey {
        let key = self.mint_key();
        self.children.push((key, element));
        key
    }

    pub fn prepend(&mut self, element: Element) -> NodeKey {
        let key = self.mint_key();
        self.children.insert(0, (key, element));
        key
    }

    pub fn remove(&mut self, key: NodeKey) -> Option<Element> {
        let pos = self.children.iter().position(|(k, _)| *k == key)?;
        Some(self.children.remove(pos).1)
    }

    pub fn clear(&mut self) {
        self.children.clear();
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn last_child(&self) -> Option<NodeKey> {
        self.children.last().map(|(k, _)| *k)
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.children.iter().any(|(k, _)| *k == key)
    }

    pub fn get(&self, key: NodeKey) -> Option<&Element> {
        self.children.iter().find(|(k, _)| *k == key).map(|(_, e)| e)
    }

    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut Element> {
        self.children
            .iter_mut()
            .find(|(k, _)| *k == key)
            .map(|(_, e)| e)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeKey, &Element)> {
        self.children.iter().map(|(k, e)| (*k, e))
    }

    /// Key of the direct child that is, or contains, the element with `id`.
    pub fn key_of_id(&self, id: &str) -> Option<NodeKey> {
        self.children
            .iter()
            .find(|(_, e)| e.find_by_id(id).is_some())
            .map(|(k, _)| *k)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Element> {
        self.children.iter().find_map(|(_, e)| e.find_by_id(id))
    }

    pub fn find_by_id_mut(&mut self, id: &str) -> Option<&mut Element> {
        self.children
            .iter_mut()
            .find_map(|(_, e)| e.find_by_id_mut(id))
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        out.push_str("<div");
        push_attr(&mut out, "id", &self.id);
        for (name, value) in &self.attrs {
            push_attr(&mut out, name, value);
        }
        out.push('>');
        for (_, child) in &self.children {
            child.write_html(&mut out);
        }
        out.push_str("</div>");
        out
    }
}
