//! Session activation and teardown
//!
//! `init` marks the root element, restores every form on the page and
//! registers one delegated click listener routed through a
//! [`DispatchTable`]. `destroy` undoes all of it. Each [`FormSaver`] owns at
//! most one session at a time.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::config::{Config, Options, resolve};
use crate::controller::Controller;
use crate::dispatch::{Dispatch, DispatchTable, TriggerRole};
use crate::dom::{ClickHandler, Document, Element, Form, ListenerId};
use crate::store::PersistenceStore;

/// State alive between `init` and `destroy`
pub struct Session {
    config: Config,
    controller: Rc<Controller>,
    forms: Vec<Rc<dyn Form>>,
    listener: ListenerId,
}

impl Session {
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn controller(&self) -> &Rc<Controller> {
        &self.controller
    }

    /// Forms discovered at init
    pub fn forms(&self) -> &[Rc<dyn Form>] {
        &self.forms
    }
}

/// Run a routed trigger click
pub fn handle(controller: &Controller, doc: &dyn Document, dispatch: &Dispatch) {
    let trigger = Some(&*dispatch.trigger);
    match dispatch.role {
        TriggerRole::Save => {
            controller.save_form(trigger, &dispatch.form_selector, &Options::default());
        }
        TriggerRole::Delete => {
            let outcome = controller.delete_form(trigger, &dispatch.form_selector, &Options::default());
            if outcome.reload_requested() {
                doc.reload();
            }
        }
    }
}

fn click_handler(controller: Weak<Controller>, doc: Weak<dyn Document>, table: DispatchTable) -> ClickHandler {
    Rc::new(move |target: &dyn Element| {
        let (Some(controller), Some(doc)) = (controller.upgrade(), doc.upgrade()) else {
            return false;
        };
        let Some(dispatch) = table.dispatch(target) else {
            return false;
        };
        handle(&controller, &*doc, &dispatch);
        true
    })
}

/// Form saver bound to one page and its storage
pub struct FormSaver {
    doc: Rc<dyn Document>,
    store: PersistenceStore,
    session: RefCell<Option<Session>>,
}

impl FormSaver {
    pub fn new(doc: Rc<dyn Document>, store: PersistenceStore) -> Self {
        Self {
            doc,
            store,
            session: RefCell::new(None),
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.borrow().is_some()
    }

    /// Run `f` against the active session, if any
    pub fn with_session<R>(&self, f: impl FnOnce(&Session) -> R) -> Option<R> {
        self.session.borrow().as_ref().map(f)
    }

    /// The active session's controller, or a bare one when inactive
    pub fn controller(&self) -> Rc<Controller> {
        self.with_session(|s| s.controller.clone())
            .unwrap_or_else(|| Rc::new(Controller::new(self.doc.clone(), self.store.clone())))
    }

    /// Start a session, replacing any active one. Does nothing without an
    /// interactive page.
    pub fn init(&self, options: Options) {
        if !self.doc.is_interactive() {
            log::debug!("No interactive document, form saver stays inactive");
            return;
        }
        self.destroy();

        let config = resolve(&Config::default(), &[&options]);
        if !config.init_class.is_empty() && !self.doc.root_has_class(&config.init_class) {
            self.doc.add_root_class(&config.init_class);
        }

        let controller = Rc::new(Controller::new(self.doc.clone(), self.store.clone()).with_options(options));
        let forms = self.doc.forms();
        let table = DispatchTable::from_config(&config);
        let handler = click_handler(Rc::downgrade(&controller), Rc::downgrade(&self.doc), table);
        let listener = self.doc.add_click_listener(handler);

        log::info!("Form saver active ({} forms)", forms.len());
        *self.session.borrow_mut() = Some(Session {
            config,
            controller: controller.clone(),
            forms: forms.clone(),
            listener,
        });

        // Load callbacks may re-enter init or destroy, so the session is
        // already installed and unborrowed here.
        for form in &forms {
            controller.load_form(&**form, &Options::default());
        }
    }

    /// Start a session with default options
    pub fn auto(&self) {
        self.init(Options::default());
    }

    /// End the active session. Safe to call when none is active.
    pub fn destroy(&self) {
        let Some(session) = self.session.borrow_mut().take() else {
            return;
        };
        if !session.config.init_class.is_empty() {
            self.doc.remove_root_class(&session.config.init_class);
        }
        self.doc.remove_click_listener(session.listener);
        log::info!("Form saver destroyed");
    }
}

impl Drop for FormSaver {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Field, StatusTarget};
    use crate::field::FormRecord;
    use crate::memory::{MemoryDocument, MemoryElement};
    use crate::store::record_key;

    struct Fixture {
        doc: Rc<MemoryDocument>,
        store: PersistenceStore,
        saver: FormSaver,
        name: MemoryElement,
        status: MemoryElement,
        save: MemoryElement,
        delete: MemoryElement,
    }

    fn fixture_with(doc: MemoryDocument) -> Fixture {
        let doc = Rc::new(doc);
        let name = MemoryElement::new("input").with_attr("name", "name");
        let status = MemoryElement::new("p").with_attr("data-form-status", "");
        let save = MemoryElement::new("button").with_attr("data-form-save", "#contact");
        let delete = MemoryElement::new("button").with_attr("data-form-delete", "#contact");
        let form = MemoryElement::new("form")
            .with_attr("id", "contact")
            .with_child(&name)
            .with_child(&status)
            .with_child(&save)
            .with_child(&delete);
        doc.append(&form);

        let store = PersistenceStore::in_memory();
        let saver = FormSaver::new(doc.clone(), store.clone());
        Fixture { doc, store, saver, name, status, save, delete }
    }

    fn fixture() -> Fixture {
        fixture_with(MemoryDocument::new())
    }

    #[test]
    fn test_headless_init_is_noop() {
        let f = fixture_with(MemoryDocument::headless());
        f.saver.init(Options::default());
        assert!(!f.saver.is_active());
        assert!(f.doc.root_classes().is_empty());
        assert_eq!(f.doc.listener_count(), 0);
    }

    #[test]
    fn test_init_marks_root_once() {
        let f = fixture();
        f.doc.add_root_class("js-form-saver");
        f.saver.init(Options::default());
        f.saver.init(Options::default());
        assert_eq!(f.doc.root_classes(), ["js-form-saver"]);
        assert_eq!(f.doc.listener_count(), 1);
        assert!(f.saver.is_active());
    }

    #[test]
    fn test_init_loads_every_form() {
        let f = fixture();
        let other_field = MemoryElement::new("input").with_attr("name", "city");
        f.doc.append(&MemoryElement::new("form").with_attr("id", "address").with_child(&other_field));

        let mut contact = FormRecord::new();
        contact.insert("name".into(), "Ada".into());
        f.store.save(&record_key("contact"), &contact);
        let mut address = FormRecord::new();
        address.insert("city".into(), "London".into());
        f.store.save(&record_key("address"), &address);

        f.saver.init(Options::default());
        assert_eq!(f.name.value(), "Ada");
        assert_eq!(other_field.value(), "London");
        assert_eq!(f.saver.with_session(|s| s.forms().len()), Some(2));
    }

    #[test]
    fn test_destroy_is_repeatable() {
        let f = fixture();
        f.saver.destroy();
        f.saver.init(Options::from_json(r#"{"initClass": "saving"}"#).unwrap());
        assert_eq!(f.doc.root_classes(), ["saving"]);

        f.saver.destroy();
        f.saver.destroy();
        assert!(!f.saver.is_active());
        assert!(f.doc.root_classes().is_empty());
        assert_eq!(f.doc.listener_count(), 0);
    }

    #[test]
    fn test_click_save() {
        let f = fixture();
        f.saver.init(Options::from_json(r#"{"saveMessage": "Kept"}"#).unwrap());
        f.name.set_value("Grace");

        assert!(f.doc.click(&f.save));
        let record = f.store.load(&record_key("contact")).unwrap();
        assert_eq!(record.get("name"), Some("Grace"));
        assert_eq!(f.status.html(), "Kept");
    }

    #[test]
    fn test_click_delete_reloads_then_shows_message() {
        let f = fixture();
        f.saver.auto();
        f.name.set_value("Grace");
        f.doc.click(&f.save);

        assert!(f.doc.click(&f.delete));
        assert_eq!(f.doc.reload_count(), 1);
        assert_eq!(f.store.load(&record_key("contact")), None);

        // Fresh page after the reload
        f.name.set_value("");
        f.status.set_html("");
        f.saver.auto();
        assert_eq!(f.name.value(), "");
        assert_eq!(f.status.html(), "Deleted!");
    }

    #[test]
    fn test_click_delete_without_clear() {
        let f = fixture();
        f.saver.init(Options::from_json(r#"{"deleteClear": false}"#).unwrap());
        f.doc.click(&f.delete);
        assert_eq!(f.doc.reload_count(), 0);
        assert_eq!(f.status.html(), "Deleted!");
    }

    #[test]
    fn test_trigger_override_beats_init_options() {
        let f = fixture();
        f.saver.init(Options::from_json(r#"{"saveMessage": "init"}"#).unwrap());
        let button = MemoryElement::new("button")
            .with_attr("data-form-save", "#contact")
            .with_attr("data-options", r#"{"saveMessage": "button"}"#);
        f.doc.append(&button);

        f.doc.click(&button);
        assert_eq!(f.status.html(), "button");
    }

    #[test]
    fn test_clicks_ignored_when_unrelated_or_destroyed() {
        let f = fixture();
        f.saver.auto();
        assert!(!f.doc.click(&f.name));

        f.saver.destroy();
        f.name.set_value("late");
        assert!(!f.doc.click(&f.save));
        assert_eq!(f.store.load(&record_key("contact")), None);
    }

    #[test]
    fn test_custom_trigger_selectors() {
        let f = fixture();
        f.saver.init(Options::from_json(r#"{"selectorSave": "[data-keep]"}"#).unwrap());
        let keep = MemoryElement::new("button").with_attr("data-keep", "#contact");
        f.doc.append(&keep);
        f.name.set_value("Linus");

        assert!(!f.doc.click(&f.save));
        assert!(f.doc.click(&keep));
        assert_eq!(f.store.load(&record_key("contact")).unwrap().get("name"), Some("Linus"));
    }

    #[test]
    fn test_sessions_are_independent() {
        let a = fixture();
        let b = fixture();
        a.saver.auto();
        b.saver.auto();
        a.name.set_value("only a");
        a.doc.click(&a.save);

        assert!(a.store.load(&record_key("contact")).is_some());
        assert!(b.store.load(&record_key("contact")).is_none());
        b.saver.destroy();
        assert!(a.saver.is_active());
    }

    #[test]
    fn test_load_callback_reinit_leaves_one_listener() {
        let f = fixture();
        let saver = Rc::new(FormSaver::new(f.doc.clone(), f.store.clone()));
        let weak = Rc::downgrade(&saver);
        let options = Options::default().on_load(move |_| {
            if let Some(saver) = weak.upgrade() {
                saver.init(Options::from_json(r#"{"saveMessage": "inner"}"#).unwrap());
            }
        });

        saver.init(options);
        assert!(saver.is_active());
        assert_eq!(f.doc.listener_count(), 1);
        assert_eq!(f.doc.root_classes(), ["js-form-saver"]);

        f.doc.click(&f.save);
        assert_eq!(f.status.html(), "inner");

        saver.destroy();
        assert_eq!(f.doc.listener_count(), 0);
    }

    #[test]
    fn test_inactive_controller_uses_defaults() {
        let f = fixture();
        f.name.set_value("direct");
        f.saver.controller().save_form(None, "#contact", &Options::default());
        assert_eq!(f.status.html(), "Saved!");
    }
}
