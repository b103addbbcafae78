//! Browser backend and JS entry points
//!
//! Implements the `dom` contracts over web-sys, LocalStorage and
//! SessionStorage, and exposes `init`, `destroy`, `auto`, `saveForm`,
//! `deleteForm` and `loadForm` to JavaScript.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Once;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    HtmlButtonElement, HtmlFormElement, HtmlInputElement, HtmlSelectElement, HtmlTextAreaElement,
    Storage,
};

use crate::config::Options;
use crate::dom::{ClickHandler, Document, Element, Field, Form, ListenerId, StatusTarget};
use crate::lifecycle::FormSaver;
use crate::store::{KeyValueStore, PersistenceStore, StoreError};

fn backend_error(e: JsValue) -> StoreError {
    StoreError::Backend(format!("{e:?}"))
}

/// LocalStorage or SessionStorage
pub struct WebStorage(Storage);

impl WebStorage {
    pub fn local() -> Option<Self> {
        web_sys::window()?.local_storage().ok()?.map(Self)
    }

    pub fn session() -> Option<Self> {
        web_sys::window()?.session_storage().ok()?.map(Self)
    }
}

impl KeyValueStore for WebStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.0.get_item(key).map_err(backend_error)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.0.set_item(key, value).map_err(backend_error)
    }

    fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        self.0.remove_item(key).map_err(backend_error)
    }
}

/// Stand-in when the browser refuses storage access
struct NoStorage;

impl KeyValueStore for NoStorage {
    fn get_item(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable)
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }

    fn remove_item(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }
}

fn web_store() -> PersistenceStore {
    let durable: Rc<dyn KeyValueStore> = match WebStorage::local() {
        Some(storage) => Rc::new(storage),
        None => {
            log::warn!("LocalStorage unavailable");
            Rc::new(NoStorage)
        }
    };
    let transient: Rc<dyn KeyValueStore> = match WebStorage::session() {
        Some(storage) => Rc::new(storage),
        None => {
            log::warn!("SessionStorage unavailable");
            Rc::new(NoStorage)
        }
    };
    PersistenceStore::new(durable, transient)
}

pub struct WebElement(pub web_sys::Element);

impl Element for WebElement {
    fn attribute(&self, name: &str) -> Option<String> {
        self.0.get_attribute(name)
    }

    fn closest(&self, selector: &str) -> Option<Box<dyn Element>> {
        let found = self.0.closest(selector).ok().flatten()?;
        Some(Box::new(WebElement(found)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Form controls that carry a value
pub enum WebField {
    Input(HtmlInputElement),
    Select(HtmlSelectElement),
    TextArea(HtmlTextAreaElement),
    Button(HtmlButtonElement),
}

impl WebField {
    fn from_element(el: web_sys::Element) -> Option<Self> {
        let el = match el.dyn_into::<HtmlInputElement>() {
            Ok(input) => return Some(WebField::Input(input)),
            Err(el) => el,
        };
        let el = match el.dyn_into::<HtmlSelectElement>() {
            Ok(select) => return Some(WebField::Select(select)),
            Err(el) => el,
        };
        let el = match el.dyn_into::<HtmlTextAreaElement>() {
            Ok(area) => return Some(WebField::TextArea(area)),
            Err(el) => el,
        };
        el.dyn_into::<HtmlButtonElement>().ok().map(WebField::Button)
    }

    fn element(&self) -> &web_sys::Element {
        match self {
            WebField::Input(el) => el,
            WebField::Select(el) => el,
            WebField::TextArea(el) => el,
            WebField::Button(el) => el,
        }
    }
}

impl Field for WebField {
    fn kind(&self) -> String {
        match self {
            WebField::Input(el) => el.type_(),
            WebField::Select(el) => el.type_(),
            WebField::TextArea(el) => el.type_(),
            WebField::Button(el) => el.type_(),
        }
    }

    fn name(&self) -> String {
        match self {
            WebField::Input(el) => el.name(),
            WebField::Select(el) => el.name(),
            WebField::TextArea(el) => el.name(),
            WebField::Button(el) => el.name(),
        }
    }

    fn value(&self) -> String {
        match self {
            WebField::Input(el) => el.value(),
            WebField::Select(el) => el.value(),
            WebField::TextArea(el) => el.value(),
            WebField::Button(el) => el.value(),
        }
    }

    fn set_value(&self, value: &str) {
        match self {
            WebField::Input(el) => el.set_value(value),
            WebField::Select(el) => el.set_value(value),
            WebField::TextArea(el) => el.set_value(value),
            WebField::Button(el) => el.set_value(value),
        }
    }

    fn is_checked(&self) -> bool {
        matches!(self, WebField::Input(el) if el.checked())
    }

    fn set_checked(&self, checked: bool) {
        if let WebField::Input(el) = self {
            el.set_checked(checked);
        }
    }

    fn has_ancestor(&self, selector: &str) -> bool {
        matches!(self.element().closest(selector), Ok(Some(_)))
    }
}

struct WebStatus(web_sys::Element);

impl StatusTarget for WebStatus {
    fn set_html(&self, html: &str) {
        self.0.set_inner_html(html);
    }
}

pub struct WebForm(pub HtmlFormElement);

impl Form for WebForm {
    fn id(&self) -> String {
        self.0.id()
    }

    fn fields(&self) -> Vec<Box<dyn Field>> {
        let elements = self.0.elements();
        (0..elements.length())
            .filter_map(|i| elements.item(i))
            .filter_map(WebField::from_element)
            .map(|field| Box::new(field) as Box<dyn Field>)
            .collect()
    }

    fn status_targets(&self, selector: &str) -> Vec<Box<dyn StatusTarget>> {
        let Ok(nodes) = self.0.query_selector_all(selector) else {
            log::warn!("Invalid status selector {selector:?}");
            return Vec::new();
        };
        (0..nodes.length())
            .filter_map(|i| nodes.get(i))
            .filter_map(|node| node.dyn_into::<web_sys::Element>().ok())
            .map(|el| Box::new(WebStatus(el)) as Box<dyn StatusTarget>)
            .collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The live page
pub struct WebDocument {
    document: web_sys::Document,
    listeners: RefCell<HashMap<ListenerId, Closure<dyn FnMut(web_sys::Event)>>>,
    next_listener: Cell<u64>,
}

impl WebDocument {
    /// The window's document, if there is one
    pub fn current() -> Option<Self> {
        let document = web_sys::window()?.document()?;
        Some(Self {
            document,
            listeners: RefCell::new(HashMap::new()),
            next_listener: Cell::new(1),
        })
    }
}

impl Document for WebDocument {
    fn is_interactive(&self) -> bool {
        self.document.document_element().is_some()
    }

    fn forms(&self) -> Vec<Rc<dyn Form>> {
        let forms = self.document.forms();
        (0..forms.length())
            .filter_map(|i| forms.item(i))
            .filter_map(|el| el.dyn_into::<HtmlFormElement>().ok())
            .map(|form| Rc::new(WebForm(form)) as Rc<dyn Form>)
            .collect()
    }

    fn query_form(&self, selector: &str) -> Option<Rc<dyn Form>> {
        let el = self.document.query_selector(selector).ok().flatten()?;
        let form = el.dyn_into::<HtmlFormElement>().ok()?;
        Some(Rc::new(WebForm(form)))
    }

    fn root_has_class(&self, class: &str) -> bool {
        self.document
            .document_element()
            .is_some_and(|root| root.class_list().contains(class))
    }

    fn add_root_class(&self, class: &str) {
        if let Some(root) = self.document.document_element() {
            if let Err(e) = root.class_list().add_1(class) {
                log::warn!("Failed to add root class {class:?}: {e:?}");
            }
        }
    }

    fn remove_root_class(&self, class: &str) {
        if let Some(root) = self.document.document_element() {
            if let Err(e) = root.class_list().remove_1(class) {
                log::warn!("Failed to remove root class {class:?}: {e:?}");
            }
        }
    }

    fn add_click_listener(&self, handler: ClickHandler) -> ListenerId {
        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);

        let closure = Closure::<dyn FnMut(_)>::new(move |event: web_sys::Event| {
            let Some(target) = event.target().and_then(|t| t.dyn_into::<web_sys::Element>().ok()) else {
                return;
            };
            if handler(&WebElement(target)) {
                event.prevent_default();
            }
        });
        if let Err(e) = self
            .document
            .add_event_listener_with_callback("click", closure.as_ref().unchecked_ref())
        {
            log::warn!("Failed to register click listener: {e:?}");
        }
        self.listeners.borrow_mut().insert(id, closure);
        id
    }

    fn remove_click_listener(&self, id: ListenerId) {
        if let Some(closure) = self.listeners.borrow_mut().remove(&id) {
            if let Err(e) = self
                .document
                .remove_event_listener_with_callback("click", closure.as_ref().unchecked_ref())
            {
                log::warn!("Failed to remove click listener: {e:?}");
            }
        }
    }

    fn reload(&self) {
        reload_page();
    }
}

fn reload_page() {
    let Some(window) = web_sys::window() else {
        log::warn!("No window to reload");
        return;
    };
    if let Err(e) = window.location().reload() {
        log::warn!("Page reload failed: {e:?}");
    }
}

// === JS surface ===

thread_local! {
    static SAVER: RefCell<Option<Rc<FormSaver>>> = const { RefCell::new(None) };
}

fn setup_logging() {
    static LOGGING: Once = Once::new();
    LOGGING.call_once(|| {
        console_error_panic_hook::set_once();
        let _ = console_log::init_with_level(log::Level::Info);
    });
}

/// The page's saver, created on first use. `None` outside a browser page.
fn instance() -> Option<Rc<FormSaver>> {
    setup_logging();
    SAVER.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            let doc = WebDocument::current()?;
            *slot = Some(Rc::new(FormSaver::new(Rc::new(doc), web_store())));
        }
        slot.clone()
    })
}

fn js_function(options: &JsValue, key: &str) -> Option<js_sys::Function> {
    js_sys::Reflect::get(options, &JsValue::from_str(key))
        .ok()?
        .dyn_into::<js_sys::Function>()
        .ok()
}

fn trigger_js(trigger: Option<&dyn Element>) -> JsValue {
    trigger
        .and_then(|t| t.as_any().downcast_ref::<WebElement>())
        .map(|el| JsValue::from(el.0.clone()))
        .unwrap_or(JsValue::NULL)
}

fn form_js(form: &dyn Form) -> JsValue {
    form.as_any()
        .downcast_ref::<WebForm>()
        .map(|f| JsValue::from(f.0.clone()))
        .unwrap_or(JsValue::NULL)
}

/// Exceptions thrown by user callbacks propagate to the JS caller
fn rethrow(result: Result<JsValue, JsValue>) {
    if let Err(e) = result {
        wasm_bindgen::throw_val(e);
    }
}

/// Build an options layer from a JS object: data keys through JSON,
/// callbacks picked off as functions
fn options_from_js(value: &JsValue) -> Options {
    if value.is_undefined() || value.is_null() {
        return Options::default();
    }
    let json = js_sys::JSON::stringify(value).ok().and_then(|s| s.as_string());
    let mut options = Options::from_attribute(json.as_deref());

    if let Some(f) = js_function(value, "callbackSave") {
        options.hooks.save = Some(Rc::new(move |trigger: Option<&dyn Element>, form: &dyn Form| {
            rethrow(f.call2(&JsValue::NULL, &trigger_js(trigger), &form_js(form)));
        }));
    }
    if let Some(f) = js_function(value, "callbackDelete") {
        options.hooks.delete = Some(Rc::new(move |trigger: Option<&dyn Element>, form: &dyn Form| {
            rethrow(f.call2(&JsValue::NULL, &trigger_js(trigger), &form_js(form)));
        }));
    }
    if let Some(f) = js_function(value, "callbackLoad") {
        options.hooks.load = Some(Rc::new(move |form: &dyn Form| {
            rethrow(f.call1(&JsValue::NULL, &form_js(form)));
        }));
    }
    options
}

/// Start (or restart) saving forms on this page
#[wasm_bindgen(js_name = init)]
pub fn js_init(options: JsValue) {
    match instance() {
        Some(saver) => saver.init(options_from_js(&options)),
        None => log::debug!("No document, form saver not started"),
    }
}

/// Stop saving forms on this page
#[wasm_bindgen(js_name = destroy)]
pub fn js_destroy() {
    let saver = SAVER.with(|cell| cell.borrow().clone());
    if let Some(saver) = saver {
        saver.destroy();
    }
}

/// Start with default options
#[wasm_bindgen(js_name = auto)]
pub fn js_auto() {
    if let Some(saver) = instance() {
        saver.auto();
    }
}

#[wasm_bindgen(js_name = saveForm)]
pub fn js_save_form(trigger: Option<web_sys::Element>, form_selector: &str, options: JsValue) {
    let Some(saver) = instance() else {
        return;
    };
    let trigger = trigger.map(WebElement);
    saver
        .controller()
        .save_form(trigger.as_ref().map(|t| t as &dyn Element), form_selector, &options_from_js(&options));
}

#[wasm_bindgen(js_name = deleteForm)]
pub fn js_delete_form(trigger: Option<web_sys::Element>, form_selector: &str, options: JsValue) {
    let Some(saver) = instance() else {
        return;
    };
    let trigger = trigger.map(WebElement);
    let outcome = saver.controller().delete_form(
        trigger.as_ref().map(|t| t as &dyn Element),
        form_selector,
        &options_from_js(&options),
    );
    if outcome.reload_requested() {
        reload_page();
    }
}

#[wasm_bindgen(js_name = loadForm)]
pub fn js_load_form(form: HtmlFormElement, options: JsValue) {
    if let Some(saver) = instance() {
        saver.controller().load_form(&WebForm(form), &options_from_js(&options));
    }
}
