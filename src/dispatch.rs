//! Click routing for save/delete triggers
//!
//! A click target is matched against each route's trigger selector in
//! order; the first trigger found (the target itself or an ancestor) wins.
//! The trigger names its form through an attribute, `data-form-save` /
//! `data-form-delete` by default.

use crate::config::Config;
use crate::dom::Element;

/// What a trigger asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerRole {
    Save,
    Delete,
}

impl TriggerRole {
    fn default_attribute(self) -> &'static str {
        match self {
            TriggerRole::Save => "data-form-save",
            TriggerRole::Delete => "data-form-delete",
        }
    }
}

#[derive(Debug, Clone)]
struct Route {
    role: TriggerRole,
    selector: String,
    target_attr: String,
}

/// A routed click: which role, the trigger element and the form it names
pub struct Dispatch {
    pub role: TriggerRole,
    pub trigger: Box<dyn Element>,
    pub form_selector: String,
}

/// Ordered trigger routes
#[derive(Debug, Clone)]
pub struct DispatchTable {
    routes: Vec<Route>,
}

/// Attribute name of a bare attribute selector (`[name]` or `[name=...]`)
fn attribute_of(selector: &str) -> Option<&str> {
    let inner = selector.trim().strip_prefix('[')?.strip_suffix(']')?;
    let name = inner.split('=').next()?.trim();
    if name.is_empty() || name.contains(|c: char| matches!(c, '[' | ']' | ',' | ' ')) {
        return None;
    }
    Some(name)
}

impl DispatchTable {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Save and delete routes from the configured trigger selectors
    pub fn from_config(config: &Config) -> Self {
        Self::new()
            .route(TriggerRole::Save, &config.selector_save)
            .route(TriggerRole::Delete, &config.selector_delete)
    }

    pub fn route(mut self, role: TriggerRole, selector: &str) -> Self {
        let target_attr = attribute_of(selector).unwrap_or(role.default_attribute());
        self.routes.push(Route {
            role,
            selector: selector.to_string(),
            target_attr: target_attr.to_string(),
        });
        self
    }

    /// Find the trigger for a click on `target`
    pub fn dispatch(&self, target: &dyn Element) -> Option<Dispatch> {
        self.routes.iter().find_map(|route| {
            let trigger = target.closest(&route.selector)?;
            let form_selector = trigger.attribute(&route.target_attr).unwrap_or_default();
            if form_selector.trim().is_empty() {
                log::warn!("{:?} trigger has no {} target", route.role, route.target_attr);
            }
            Some(Dispatch {
                role: route.role,
                trigger,
                form_selector,
            })
        })
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryElement;

    #[test]
    fn test_attribute_of() {
        assert_eq!(attribute_of("[data-form-save]"), Some("data-form-save"));
        assert_eq!(attribute_of("[data-act=save]"), Some("data-act"));
        assert_eq!(attribute_of(".save-btn"), None);
        assert_eq!(attribute_of("[a], [b]"), None);
    }

    #[test]
    fn test_routes_save_and_delete() {
        let table = DispatchTable::default();
        let save = MemoryElement::new("button").with_attr("data-form-save", "#contact");
        let delete = MemoryElement::new("button").with_attr("data-form-delete", "#contact");

        let routed = table.dispatch(&save).unwrap();
        assert_eq!(routed.role, TriggerRole::Save);
        assert_eq!(routed.form_selector, "#contact");

        let routed = table.dispatch(&delete).unwrap();
        assert_eq!(routed.role, TriggerRole::Delete);
    }

    #[test]
    fn test_click_inside_trigger() {
        let table = DispatchTable::default();
        let button = MemoryElement::new("a").with_attr("data-form-delete", "#f");
        let icon = MemoryElement::new("span");
        button.append(&icon);

        let routed = table.dispatch(&icon).unwrap();
        assert_eq!(routed.role, TriggerRole::Delete);
        assert_eq!(routed.trigger.attribute("data-form-delete").as_deref(), Some("#f"));
    }

    #[test]
    fn test_unrelated_click() {
        let table = DispatchTable::default();
        assert!(table.dispatch(&MemoryElement::new("p")).is_none());
    }

    #[test]
    fn test_class_selector_uses_default_attribute() {
        let table = DispatchTable::new().route(TriggerRole::Save, ".save");
        let button = MemoryElement::new("button")
            .with_attr("class", "save")
            .with_attr("data-form-save", "#f");
        assert_eq!(table.dispatch(&button).unwrap().form_selector, "#f");
    }
}
