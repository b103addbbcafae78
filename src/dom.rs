//! Collaborator contracts for the page the saver runs against
//!
//! The saver never talks to a browser directly. It asks these traits for
//! forms, fields and status elements, and for a delegated click listener.
//! `web` implements them over web-sys; `memory` implements them over an
//! in-memory element tree for headless use and tests.

use std::any::Any;
use std::rc::Rc;

/// Anything the page can hand back from a selector query or a click
pub trait Element {
    /// Attribute value, `None` when absent
    fn attribute(&self, name: &str) -> Option<String>;

    /// Nearest element (self included) matching `selector`
    fn closest(&self, selector: &str) -> Option<Box<dyn Element>>;

    /// Backend escape hatch (JS callbacks need the underlying node)
    fn as_any(&self) -> &dyn Any;
}

/// A form control enumerated from a form
pub trait Field {
    /// Control type as the page reports it (`text`, `checkbox`, `select-one`, ...)
    fn kind(&self) -> String;
    fn name(&self) -> String;
    fn value(&self) -> String;
    fn set_value(&self, value: &str);
    fn is_checked(&self) -> bool;
    fn set_checked(&self, checked: bool);

    /// Whether this control sits under an element matching `selector`
    fn has_ancestor(&self, selector: &str) -> bool;
}

/// Element that status markup is written into
pub trait StatusTarget {
    fn set_html(&self, html: &str);
}

/// A form on the page
pub trait Form {
    /// The form's `id` attribute (empty when unset)
    fn id(&self) -> String;

    /// All controls, in document order
    fn fields(&self) -> Vec<Box<dyn Field>>;

    /// Descendants matching `selector`
    fn status_targets(&self, selector: &str) -> Vec<Box<dyn StatusTarget>>;

    fn as_any(&self) -> &dyn Any;
}

/// Handler for a delegated click. Receives the click target and returns
/// `true` when the click was consumed (the default action should be suppressed).
pub type ClickHandler = Rc<dyn Fn(&dyn Element) -> bool>;

/// Registration handle returned by [`Document::add_click_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// The page as a whole
pub trait Document {
    /// False outside an interactive presentation context (no window/document)
    fn is_interactive(&self) -> bool;

    /// Every form, in document order
    fn forms(&self) -> Vec<Rc<dyn Form>>;

    /// First form matching `selector`
    fn query_form(&self, selector: &str) -> Option<Rc<dyn Form>>;

    fn root_has_class(&self, class: &str) -> bool;
    fn add_root_class(&self, class: &str);
    fn remove_root_class(&self, class: &str);

    fn add_click_listener(&self, handler: ClickHandler) -> ListenerId;
    fn remove_click_listener(&self, id: ListenerId);

    /// Ask for a full page reload
    fn reload(&self);
}
