//! Layered saver configuration
//!
//! The effective [`Config`] is built by laying partial [`Options`] over the
//! defaults in order: defaults, init-time options, call-time options, then
//! the `data-options` override carried by the trigger element. Later layers
//! overwrite earlier ones key by key. Keys the saver does not know about are
//! kept in `extra` and merged the same way.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::dom::{Element, Form};

/// Attribute holding a trigger's JSON override
pub const OPTIONS_ATTR: &str = "data-options";

/// Run after a save or delete with the trigger (if any) and the form
pub type ActionCallback = Rc<dyn Fn(Option<&dyn Element>, &dyn Form)>;
/// Run after a form has been loaded
pub type LoadCallback = Rc<dyn Fn(&dyn Form)>;

/// Callback hooks, one per action
#[derive(Clone, Default)]
pub struct Hooks {
    pub save: Option<ActionCallback>,
    pub delete: Option<ActionCallback>,
    pub load: Option<LoadCallback>,
}

impl Hooks {
    fn apply(&mut self, layer: &Hooks) {
        if let Some(cb) = &layer.save {
            self.save = Some(cb.clone());
        }
        if let Some(cb) = &layer.delete {
            self.delete = Some(cb.clone());
        }
        if let Some(cb) = &layer.load {
            self.load = Some(cb.clone());
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("save", &self.save.is_some())
            .field("delete", &self.delete.is_some())
            .field("load", &self.load.is_some())
            .finish()
    }
}

/// One partial configuration layer. Every recognized key is optional;
/// unrecognized keys land in `extra`.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub selector_status: Option<String>,
    pub selector_save: Option<String>,
    pub selector_delete: Option<String>,
    pub selector_ignore: Option<String>,
    pub delete_clear: Option<bool>,
    pub save_message: Option<String>,
    pub delete_message: Option<String>,
    pub save_class: Option<String>,
    pub delete_class: Option<String>,
    pub init_class: Option<String>,
    pub hooks: Hooks,
    pub extra: Map<String, Value>,
}

/// Text keys take strings as-is and stringify other scalars. Anything else
/// is skipped so the rest of the layer still applies.
fn text(key: &str, value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => {
            log::debug!("Ignoring {key}: expected text, got {other}");
            None
        }
    }
}

/// `deleteClear` arrives as a bool from code and as a string from attributes.
/// Only `true` / `"true"` enable it.
fn flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true",
        _ => false,
    }
}

impl From<Map<String, Value>> for Options {
    fn from(map: Map<String, Value>) -> Self {
        let mut options = Self::default();
        for (key, value) in map {
            let slot = match key.as_str() {
                "selectorStatus" => &mut options.selector_status,
                "selectorSave" => &mut options.selector_save,
                "selectorDelete" => &mut options.selector_delete,
                "selectorIgnore" => &mut options.selector_ignore,
                "saveMessage" => &mut options.save_message,
                "deleteMessage" => &mut options.delete_message,
                "saveClass" => &mut options.save_class,
                "deleteClass" => &mut options.delete_class,
                "initClass" => &mut options.init_class,
                "deleteClear" => {
                    options.delete_clear = Some(flag(&value));
                    continue;
                }
                _ => {
                    options.extra.insert(key, value);
                    continue;
                }
            };
            if let Some(v) = text(&key, value) {
                *slot = Some(v);
            }
        }
        options
    }
}

impl<'de> Deserialize<'de> for Options {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Map::deserialize(deserializer).map(Self::from)
    }
}

impl Options {
    /// Parse a JSON object into a layer
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Parse a trigger's `data-options` value. Anything that is not a
    /// well-formed JSON object yields an empty layer; a badly typed key only
    /// drops that key.
    pub fn from_attribute(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Self::default();
        };
        match Self::from_json(raw) {
            Ok(options) => options,
            Err(e) => {
                log::debug!("Ignoring malformed {OPTIONS_ATTR} ({e}): {raw}");
                Self::default()
            }
        }
    }

    pub fn on_save(mut self, cb: impl Fn(Option<&dyn Element>, &dyn Form) + 'static) -> Self {
        self.hooks.save = Some(Rc::new(cb));
        self
    }

    pub fn on_delete(mut self, cb: impl Fn(Option<&dyn Element>, &dyn Form) + 'static) -> Self {
        self.hooks.delete = Some(Rc::new(cb));
        self
    }

    pub fn on_load(mut self, cb: impl Fn(&dyn Form) + 'static) -> Self {
        self.hooks.load = Some(Rc::new(cb));
        self
    }
}

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub selector_status: String,
    pub selector_save: String,
    pub selector_delete: String,
    pub selector_ignore: String,
    /// Clear the page with a reload after delete, showing the message afterwards
    pub delete_clear: bool,
    pub save_message: String,
    pub delete_message: String,
    /// Wrapper class for the save message; empty means unwrapped
    pub save_class: String,
    pub delete_class: String,
    /// Class put on the root element while a session is active
    pub init_class: String,
    pub hooks: Hooks,
    pub extra: Map<String, Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            selector_status: "[data-form-status]".to_string(),
            selector_save: "[data-form-save]".to_string(),
            selector_delete: "[data-form-delete]".to_string(),
            selector_ignore: "[data-form-no-save]".to_string(),
            delete_clear: true,
            save_message: "Saved!".to_string(),
            delete_message: "Deleted!".to_string(),
            save_class: String::new(),
            delete_class: String::new(),
            init_class: "js-form-saver".to_string(),
            hooks: Hooks::default(),
            extra: Map::new(),
        }
    }
}

fn set(slot: &mut String, value: &Option<String>) {
    if let Some(v) = value {
        slot.clone_from(v);
    }
}

impl Config {
    /// Lay one partial layer over this configuration
    pub fn apply(&mut self, layer: &Options) {
        set(&mut self.selector_status, &layer.selector_status);
        set(&mut self.selector_save, &layer.selector_save);
        set(&mut self.selector_delete, &layer.selector_delete);
        set(&mut self.selector_ignore, &layer.selector_ignore);
        if let Some(flag) = layer.delete_clear {
            self.delete_clear = flag;
        }
        set(&mut self.save_message, &layer.save_message);
        set(&mut self.delete_message, &layer.delete_message);
        set(&mut self.save_class, &layer.save_class);
        set(&mut self.delete_class, &layer.delete_class);
        set(&mut self.init_class, &layer.init_class);
        self.hooks.apply(&layer.hooks);
        for (key, value) in &layer.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }
}

/// Merge `layers` over `base`, in order
pub fn resolve(base: &Config, layers: &[&Options]) -> Config {
    let mut config = base.clone();
    for layer in layers {
        config.apply(layer);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(json: &str) -> Options {
        Options::from_json(json).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.selector_status, "[data-form-status]");
        assert_eq!(config.selector_ignore, "[data-form-no-save]");
        assert!(config.delete_clear);
        assert_eq!(config.save_message, "Saved!");
        assert_eq!(config.init_class, "js-form-saver");
        assert!(config.save_class.is_empty());
    }

    #[test]
    fn test_later_layers_win() {
        let init = layer(r#"{"saveMessage": "init", "saveClass": "ok", "deleteMessage": "gone"}"#);
        let call = layer(r#"{"saveMessage": "call"}"#);
        let element = layer(r#"{"saveClass": "element"}"#);

        let config = resolve(&Config::default(), &[&init, &call, &element]);
        assert_eq!(config.save_message, "call");
        assert_eq!(config.save_class, "element");
        assert_eq!(config.delete_message, "gone");
        assert_eq!(config.selector_save, "[data-form-save]");
    }

    #[test]
    fn test_resolve_does_not_touch_base() {
        let base = Config::default();
        let _ = resolve(&base, &[&layer(r#"{"saveMessage": "changed"}"#)]);
        assert_eq!(base.save_message, "Saved!");
    }

    #[test]
    fn test_unknown_keys_pass_through() {
        let first = layer(r#"{"custom": 1, "other": "a"}"#);
        let second = layer(r#"{"custom": 2}"#);
        let config = resolve(&Config::default(), &[&first, &second]);
        assert_eq!(config.extra.get("custom"), Some(&Value::from(2)));
        assert_eq!(config.extra.get("other"), Some(&Value::from("a")));
    }

    #[test]
    fn test_delete_clear_forms() {
        assert_eq!(layer(r#"{"deleteClear": false}"#).delete_clear, Some(false));
        assert_eq!(layer(r#"{"deleteClear": "true"}"#).delete_clear, Some(true));
        assert_eq!(layer(r#"{"deleteClear": "false"}"#).delete_clear, Some(false));
        assert_eq!(layer(r#"{"deleteClear": "yes"}"#).delete_clear, Some(false));
        assert_eq!(layer("{}").delete_clear, None);
    }

    #[test]
    fn test_attribute_parsing_is_lenient() {
        assert!(Options::from_attribute(None).save_message.is_none());
        assert!(Options::from_attribute(Some("   ")).save_message.is_none());
        assert!(Options::from_attribute(Some("{not json")).save_message.is_none());
        assert!(Options::from_attribute(Some("[1, 2]")).extra.is_empty());
        assert!(Options::from_attribute(Some(r#"{"saveMessage": [5]}"#)).save_message.is_none());

        let parsed = Options::from_attribute(Some(r#" {"saveMessage": "Stored"} "#));
        assert_eq!(parsed.save_message.as_deref(), Some("Stored"));
    }

    #[test]
    fn test_bad_key_keeps_rest_of_layer() {
        let parsed = Options::from_attribute(Some(
            r#"{"deleteClear": false, "deleteMessage": {"code": 404}, "saveClass": "ok"}"#,
        ));
        assert_eq!(parsed.delete_clear, Some(false));
        assert!(parsed.delete_message.is_none());
        assert_eq!(parsed.save_class.as_deref(), Some("ok"));

        let config = resolve(&Config::default(), &[&parsed]);
        assert!(!config.delete_clear);
        assert_eq!(config.delete_message, "Deleted!");
    }

    #[test]
    fn test_scalar_text_is_stringified() {
        let parsed = layer(r#"{"deleteMessage": 404, "saveMessage": true, "deleteClear": 1}"#);
        assert_eq!(parsed.delete_message.as_deref(), Some("404"));
        assert_eq!(parsed.save_message.as_deref(), Some("true"));
        assert_eq!(parsed.delete_clear, Some(false));
    }

    #[test]
    fn test_hooks_merge_per_key() {
        let init = Options::default().on_load(|_| {}).on_save(|_, _| {});
        let call = Options::default().on_delete(|_, _| {});

        let config = resolve(&Config::default(), &[&init, &call, &Options::default()]);
        assert!(config.hooks.save.is_some());
        assert!(config.hooks.delete.is_some());
        assert!(config.hooks.load.is_some());
        assert_eq!(format!("{:?}", config.hooks), "Hooks { save: true, delete: true, load: true }");
    }
}
