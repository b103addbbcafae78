//! Headless page backend
//!
//! A small element tree implementing the `dom` contracts so the saver can
//! run without a browser. Selector support is limited to comma-separated
//! compound selectors made of a tag, `#id`, `.class`, `[attr]` and
//! `[attr=value]` parts; combinators are not supported.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use crate::dom::{ClickHandler, Document, Element, Field, Form, ListenerId, StatusTarget};

#[derive(Debug, Default)]
struct Node {
    tag: String,
    attrs: RefCell<BTreeMap<String, String>>,
    value: RefCell<String>,
    checked: Cell<bool>,
    html: RefCell<String>,
    parent: RefCell<Weak<Node>>,
    children: RefCell<Vec<Rc<Node>>>,
}

/// Shared handle to a node in the tree
#[derive(Debug, Clone)]
pub struct MemoryElement(Rc<Node>);

impl MemoryElement {
    pub fn new(tag: &str) -> Self {
        Self(Rc::new(Node {
            tag: tag.to_lowercase(),
            ..Node::default()
        }))
    }

    /// Set an attribute. `value` and `checked` also seed the live state,
    /// the way HTML defaults do.
    pub fn with_attr(self, name: &str, value: &str) -> Self {
        match name {
            "value" => *self.0.value.borrow_mut() = value.to_string(),
            "checked" => self.0.checked.set(true),
            _ => {}
        }
        self.0.attrs.borrow_mut().insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_child(self, child: &MemoryElement) -> Self {
        self.append(child);
        self
    }

    pub fn append(&self, child: &MemoryElement) {
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        self.0.children.borrow_mut().push(child.0.clone());
    }

    pub fn tag(&self) -> &str {
        &self.0.tag
    }

    /// Markup last written by the saver
    pub fn html(&self) -> String {
        self.0.html.borrow().clone()
    }

    fn parent(&self) -> Option<MemoryElement> {
        self.0.parent.borrow().upgrade().map(MemoryElement)
    }

    fn attr(&self, name: &str) -> Option<String> {
        self.0.attrs.borrow().get(name).cloned()
    }

    /// Descendants in document order, self excluded
    pub fn descendants(&self) -> Vec<MemoryElement> {
        let mut out = Vec::new();
        for child in self.0.children.borrow().iter() {
            let child = MemoryElement(child.clone());
            out.push(child.clone());
            out.extend(child.descendants());
        }
        out
    }

    pub fn matches(&self, selector: &str) -> bool {
        selector.split(',').any(|part| self.matches_compound(part.trim()))
    }

    fn matches_compound(&self, selector: &str) -> bool {
        if selector.is_empty() {
            return false;
        }
        let is_delim = |c: char| matches!(c, '#' | '.' | '[');

        let tag_end = selector.find(is_delim).unwrap_or(selector.len());
        let tag = &selector[..tag_end];
        if !tag.is_empty() && tag != "*" && !tag.eq_ignore_ascii_case(&self.0.tag) {
            return false;
        }

        let mut rest = &selector[tag_end..];
        while let Some(lead) = rest.chars().next() {
            let ok = match lead {
                '[' => {
                    let Some(end) = rest.find(']') else {
                        return false;
                    };
                    let inner = &rest[1..end];
                    rest = &rest[end + 1..];
                    match inner.split_once('=') {
                        Some((name, want)) => {
                            let want = want.trim().trim_matches(|c: char| c == '"' || c == '\'');
                            self.attr(name.trim()).as_deref() == Some(want)
                        }
                        None => self.attr(inner.trim()).is_some(),
                    }
                }
                '#' | '.' => {
                    let body = &rest[1..];
                    let end = body.find(is_delim).unwrap_or(body.len());
                    let name = &body[..end];
                    rest = &body[end..];
                    if lead == '#' {
                        self.attr("id").as_deref() == Some(name)
                    } else {
                        self.attr("class")
                            .is_some_and(|classes| classes.split_whitespace().any(|c| c == name))
                    }
                }
                _ => return false,
            };
            if !ok {
                return false;
            }
        }
        true
    }

    fn closest_element(&self, selector: &str) -> Option<MemoryElement> {
        let mut current = Some(self.clone());
        while let Some(el) = current {
            if el.matches(selector) {
                return Some(el);
            }
            current = el.parent();
        }
        None
    }
}

impl Element for MemoryElement {
    fn attribute(&self, name: &str) -> Option<String> {
        self.attr(name)
    }

    fn closest(&self, selector: &str) -> Option<Box<dyn Element>> {
        self.closest_element(selector)
            .map(|el| Box::new(el) as Box<dyn Element>)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Field for MemoryElement {
    fn kind(&self) -> String {
        let kind = match self.tag() {
            "input" => self.attr("type").unwrap_or_else(|| "text".to_string()),
            "button" => self.attr("type").unwrap_or_else(|| "submit".to_string()),
            "select" if self.attr("multiple").is_some() => "select-multiple".to_string(),
            "select" => "select-one".to_string(),
            other => other.to_string(),
        };
        kind.to_lowercase()
    }

    fn name(&self) -> String {
        self.attr("name").unwrap_or_default()
    }

    fn value(&self) -> String {
        self.0.value.borrow().clone()
    }

    fn set_value(&self, value: &str) {
        *self.0.value.borrow_mut() = value.to_string();
    }

    fn is_checked(&self) -> bool {
        self.0.checked.get()
    }

    fn set_checked(&self, checked: bool) {
        self.0.checked.set(checked);
    }

    fn has_ancestor(&self, selector: &str) -> bool {
        self.closest_element(selector).is_some()
    }
}

impl StatusTarget for MemoryElement {
    fn set_html(&self, html: &str) {
        *self.0.html.borrow_mut() = html.to_string();
    }
}

/// A `<form>` node seen through the `Form` contract
#[derive(Debug, Clone)]
pub struct MemoryForm(pub MemoryElement);

impl Form for MemoryForm {
    fn id(&self) -> String {
        self.0.attr("id").unwrap_or_default()
    }

    fn fields(&self) -> Vec<Box<dyn Field>> {
        self.0
            .descendants()
            .into_iter()
            .filter(|el| matches!(el.tag(), "input" | "select" | "textarea" | "button"))
            .map(|el| Box::new(el) as Box<dyn Field>)
            .collect()
    }

    fn status_targets(&self, selector: &str) -> Vec<Box<dyn StatusTarget>> {
        self.0
            .descendants()
            .into_iter()
            .filter(|el| el.matches(selector))
            .map(|el| Box::new(el) as Box<dyn StatusTarget>)
            .collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// In-memory page: a body element, root classes, click listeners and a
/// reload counter
pub struct MemoryDocument {
    body: MemoryElement,
    root_classes: RefCell<Vec<String>>,
    listeners: RefCell<Vec<(ListenerId, ClickHandler)>>,
    next_listener: Cell<u64>,
    reloads: Cell<u32>,
    interactive: bool,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self {
            body: MemoryElement::new("body"),
            root_classes: RefCell::new(Vec::new()),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(1),
            reloads: Cell::new(0),
            interactive: true,
        }
    }

    /// A document with no presentation context
    pub fn headless() -> Self {
        Self {
            interactive: false,
            ..Self::new()
        }
    }

    pub fn body(&self) -> &MemoryElement {
        &self.body
    }

    pub fn append(&self, el: &MemoryElement) {
        self.body.append(el);
    }

    /// Deliver a click on `target` to every listener. Returns whether any
    /// listener consumed it.
    pub fn click(&self, target: &MemoryElement) -> bool {
        let handlers: Vec<ClickHandler> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        let mut consumed = false;
        for handler in handlers {
            consumed |= handler(target);
        }
        consumed
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn reload_count(&self) -> u32 {
        self.reloads.get()
    }

    pub fn root_classes(&self) -> Vec<String> {
        self.root_classes.borrow().clone()
    }

    fn form_elements(&self) -> impl Iterator<Item = MemoryElement> {
        self.body.descendants().into_iter().filter(|el| el.tag() == "form")
    }
}

impl Document for MemoryDocument {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn forms(&self) -> Vec<Rc<dyn Form>> {
        self.form_elements()
            .map(|el| Rc::new(MemoryForm(el)) as Rc<dyn Form>)
            .collect()
    }

    fn query_form(&self, selector: &str) -> Option<Rc<dyn Form>> {
        self.form_elements()
            .find(|el| el.matches(selector))
            .map(|el| Rc::new(MemoryForm(el)) as Rc<dyn Form>)
    }

    fn root_has_class(&self, class: &str) -> bool {
        self.root_classes.borrow().iter().any(|c| c == class)
    }

    fn add_root_class(&self, class: &str) {
        if !class.is_empty() && !self.root_has_class(class) {
            self.root_classes.borrow_mut().push(class.to_string());
        }
    }

    fn remove_root_class(&self, class: &str) {
        self.root_classes.borrow_mut().retain(|c| c != class);
    }

    fn add_click_listener(&self, handler: ClickHandler) -> ListenerId {
        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, handler));
        id
    }

    fn remove_click_listener(&self, id: ListenerId) {
        self.listeners.borrow_mut().retain(|(existing, _)| *existing != id);
    }

    fn reload(&self) {
        self.reloads.set(self.reloads.get() + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_parts() {
        let el = MemoryElement::new("button")
            .with_attr("id", "go")
            .with_attr("class", "btn primary")
            .with_attr("data-form-save", "#contact");

        assert!(el.matches("button"));
        assert!(el.matches("#go"));
        assert!(el.matches(".primary"));
        assert!(el.matches("[data-form-save]"));
        assert!(el.matches("[data-form-save='#contact']"));
        assert!(el.matches("button.btn#go[data-form-save]"));
        assert!(el.matches("a, .btn"));
        assert!(!el.matches("input"));
        assert!(!el.matches("[data-form-delete]"));
        assert!(!el.matches(".btn.secondary"));
        assert!(!el.matches("div button"));
    }

    #[test]
    fn test_closest_includes_self() {
        let outer = MemoryElement::new("div").with_attr("data-form-no-save", "");
        let inner = MemoryElement::new("span");
        outer.append(&inner);

        assert!(inner.has_ancestor("[data-form-no-save]"));
        assert!(outer.has_ancestor("[data-form-no-save]"));
        assert!(inner.closest("span").is_some());
        assert!(inner.closest("form").is_none());
    }

    #[test]
    fn test_form_fields_in_order() {
        let form = MemoryElement::new("form")
            .with_attr("id", "f")
            .with_child(&MemoryElement::new("input").with_attr("name", "a"))
            .with_child(
                &MemoryElement::new("fieldset")
                    .with_child(&MemoryElement::new("textarea").with_attr("name", "b")),
            )
            .with_child(&MemoryElement::new("select").with_attr("name", "c"))
            .with_child(&MemoryElement::new("div").with_attr("data-form-status", ""));
        let form = MemoryForm(form);

        let names: Vec<String> = form.fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        let kinds: Vec<String> = form.fields().iter().map(|f| f.kind()).collect();
        assert_eq!(kinds, ["text", "textarea", "select-one"]);
        assert_eq!(form.status_targets("[data-form-status]").len(), 1);
        assert_eq!(form.id(), "f");
    }

    #[test]
    fn test_document_forms_and_classes() {
        let doc = MemoryDocument::new();
        doc.append(&MemoryElement::new("form").with_attr("id", "one"));
        doc.append(&MemoryElement::new("form").with_attr("id", "two"));

        assert_eq!(doc.forms().len(), 2);
        assert_eq!(doc.query_form("#two").map(|f| f.id()).as_deref(), Some("two"));
        assert!(doc.query_form("#three").is_none());

        doc.add_root_class("active");
        doc.add_root_class("active");
        assert_eq!(doc.root_classes(), ["active"]);
        doc.remove_root_class("active");
        assert!(doc.root_classes().is_empty());
    }
}
