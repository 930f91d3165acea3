use thiserror::Error;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomError {
    #[error("no element with id '{id}'")]
    MissingElement { id: String },

    #[error("no row tagged with data-strike=\"{strike}\"")]
    MissingRow { strike: String },
}

pub fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl From<Element> for Node {
    fn from(value: Element) -> Self {
        Node::Element(value)
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::Text(value.to_string())
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::Text(value)
    }
}

/// Owned HTML element. Text children are always escaped on output, so
/// record-derived strings can never turn into markup.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.add_class(class);
        self
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_child(Node::Text(text.into()))
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|c| match c {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|(k, _)| k == name)
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(k, _)| k != name);
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|v| v.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let joined = match self.attr("class") {
            Some(existing) if !existing.trim().is_empty() => format!("{existing} {class}"),
            _ => class.to_string(),
        };
        self.set_attr("class", joined);
    }

    pub fn is_disabled(&self) -> bool {
        self.has_attr("disabled")
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        if disabled {
            self.set_attr("disabled", "true");
        } else {
            self.remove_attr("disabled");
        }
    }

    /// Form-control value, stored as the `value` attribute.
    pub fn value(&self) -> &str {
        self.attr("value").unwrap_or("")
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.set_attr("value", value);
    }

    pub fn append(&mut self, child: impl Into<Node>) {
        self.children.push(child.into());
    }

    pub fn clear(&mut self) {
        self.children.clear();
    }

    /// First direct child element matching `pred`, appending `make()` when
    /// there is none.
    pub fn child_or_insert_with<P, F>(&mut self, pred: P, make: F) -> &mut Element
    where
        P: Fn(&Element) -> bool,
        F: FnOnce() -> Element,
    {
        let existing = self
            .children
            .iter()
            .position(|c| matches!(c, Node::Element(e) if pred(e)));
        let idx = match existing {
            Some(i) => i,
            None => {
                self.children.push(Node::Element(make()));
                self.children.len() - 1
            }
        };
        match &mut self.children[idx] {
            Node::Element(e) => e,
            Node::Text(_) => unreachable!("index points at an element child"),
        }
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children.clear();
        self.children.push(Node::Text(text.into()));
    }

    /// Depth-first search, self included, first match wins.
    pub fn find<P>(&self, pred: &P) -> Option<&Element>
    where
        P: Fn(&Element) -> bool,
    {
        if pred(self) {
            return Some(self);
        }
        self.child_elements().find_map(|c| c.find(pred))
    }

    pub fn find_mut<P>(&mut self, pred: &P) -> Option<&mut Element>
    where
        P: Fn(&Element) -> bool,
    {
        if pred(self) {
            return Some(self);
        }
        self.child_elements_mut().find_map(|c| c.find_mut(pred))
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Element> {
        self.find(&|e: &Element| e.attr("id") == Some(id))
    }

    pub fn find_by_id_mut(&mut self, id: &str) -> Option<&mut Element> {
        self.find_mut(&|e: &Element| e.attr("id") == Some(id))
    }

    /// Visit every descendant element (self excluded) in document order.
    pub fn for_each_descendant_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut Element),
    {
        for child in self.child_elements_mut() {
            f(child);
            child.for_each_descendant_mut(f);
        }
    }

    /// Collect references to every descendant matching `pred` (self included).
    pub fn find_all<'a, P>(&'a self, pred: &P, out: &mut Vec<&'a Element>)
    where
        P: Fn(&Element) -> bool,
    {
        if pred(self) {
            out.push(self);
        }
        for child in self.child_elements() {
            child.find_all(pred, out);
        }
    }

    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            write_node(child, &mut out);
        }
        out
    }

    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        write_element(self, &mut out);
        out
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) => collect_text(&e.children, out),
        }
    }
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Text(t) => out.push_str(&escape_text(t)),
        Node::Element(e) => write_element(e, out),
    }
}

fn write_element(e: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&e.tag);
    for (k, v) in &e.attrs {
        out.push(' ');
        out.push_str(k);
        out.push_str("=\"");
        out.push_str(&escape_attr(v));
        out.push('"');
    }
    out.push('>');
    if VOID_ELEMENTS.contains(&e.tag.as_str()) {
        return;
    }
    for child in &e.children {
        write_node(child, out);
    }
    out.push_str("</");
    out.push_str(&e.tag);
    out.push('>');
}

/// A page: everything hangs off `body`.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub body: Element,
}

impl Default for Document {
    fn default() -> Self {
        Self::new(Element::new("body"))
    }
}

impl Document {
    pub fn new(body: Element) -> Self {
        Self { body }
    }

    pub fn get_element_by_id(&self, id: &str) -> Result<&Element, DomError> {
        self.body
            .find_by_id(id)
            .ok_or_else(|| DomError::MissingElement { id: id.to_string() })
    }

    pub fn get_element_by_id_mut(&mut self, id: &str) -> Result<&mut Element, DomError> {
        self.body
            .find_by_id_mut(id)
            .ok_or_else(|| DomError::MissingElement { id: id.to_string() })
    }

    /// `tr[data-strike="{strike}"]`
    pub fn query_row_by_strike_mut(&mut self, strike: &str) -> Result<&mut Element, DomError> {
        self.body
            .find_mut(&|e: &Element| e.tag() == "tr" && e.attr("data-strike") == Some(strike))
            .ok_or_else(|| DomError::MissingRow {
                strike: strike.to_string(),
            })
    }

    pub fn to_html(&self) -> String {
        self.body.outer_html()
    }
}
