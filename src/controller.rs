//! Save, delete and load for a single form
//!
//! Every operation resolves its configuration first (defaults, the
//! session's init options, the call's options, then the trigger's
//! `data-options`), then works field by field through the classifier and
//! finally touches storage and the form's status elements.

use std::rc::Rc;

use crate::config::{Config, OPTIONS_ATTR, Options, resolve};
use crate::dom::{Document, Element, Form};
use crate::field;
use crate::store::{PersistenceStore, message_key, record_key};

/// What a delete asks of its caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The message was written into the status elements
    Displayed,
    /// The message was stashed for the next load; the page should reload
    ReloadRequested,
    /// No form matched the selector, nothing was done
    FormNotFound,
}

impl DeleteOutcome {
    pub fn reload_requested(self) -> bool {
        self == DeleteOutcome::ReloadRequested
    }
}

/// Status markup: the message, wrapped in a classed `<div>` when a class is set
pub fn render_message(message: &str, class: &str) -> String {
    if class.is_empty() {
        message.to_string()
    } else {
        let class = class.replace('&', "&amp;").replace('"', "&quot;");
        format!(r#"<div class="{class}">{message}</div>"#)
    }
}

fn show_status(form: &dyn Form, selector: &str, html: &str) {
    for target in form.status_targets(selector) {
        target.set_html(html);
    }
}

/// Form saver operations bound to a page and its storage
pub struct Controller {
    doc: Rc<dyn Document>,
    store: PersistenceStore,
    init: Options,
}

impl Controller {
    pub fn new(doc: Rc<dyn Document>, store: PersistenceStore) -> Self {
        Self {
            doc,
            store,
            init: Options::default(),
        }
    }

    /// Init-time layer applied to every operation
    pub fn with_options(mut self, init: Options) -> Self {
        self.init = init;
        self
    }

    pub fn store(&self) -> &PersistenceStore {
        &self.store
    }

    /// Effective configuration for one call
    pub fn config(&self, trigger: Option<&dyn Element>, options: &Options) -> Config {
        let attribute = trigger.and_then(|t| t.attribute(OPTIONS_ATTR));
        let overrides = Options::from_attribute(attribute.as_deref());
        resolve(&Config::default(), &[&self.init, options, &overrides])
    }

    fn find_form(&self, selector: &str) -> Option<Rc<dyn Form>> {
        let form = self.doc.query_form(selector);
        if form.is_none() {
            log::warn!("No form matches {selector:?}");
        }
        form
    }

    /// Persist the current values of the form matching `form_selector`
    pub fn save_form(&self, trigger: Option<&dyn Element>, form_selector: &str, options: &Options) {
        let config = self.config(trigger, options);
        let Some(form) = self.find_form(form_selector) else {
            return;
        };

        let id = form.id();
        let record = field::collect(&form.fields(), &config.selector_ignore);
        self.store.save(&record_key(&id), &record);
        log::info!("Saved form {id} ({} fields)", record.len());

        let html = render_message(&config.save_message, &config.save_class);
        show_status(&*form, &config.selector_status, &html);

        if let Some(cb) = &config.hooks.save {
            cb(trigger, &*form);
        }
    }

    /// Forget the saved values of the form matching `form_selector`
    pub fn delete_form(
        &self,
        trigger: Option<&dyn Element>,
        form_selector: &str,
        options: &Options,
    ) -> DeleteOutcome {
        let config = self.config(trigger, options);
        let Some(form) = self.find_form(form_selector) else {
            return DeleteOutcome::FormNotFound;
        };

        let id = form.id();
        self.store.remove(&record_key(&id));
        log::info!("Deleted saved data for form {id}");

        let html = render_message(&config.delete_message, &config.delete_class);
        let outcome = if config.delete_clear {
            self.store.transient_set(&message_key(&id), &html);
            DeleteOutcome::ReloadRequested
        } else {
            show_status(&*form, &config.selector_status, &html);
            DeleteOutcome::Displayed
        };

        if let Some(cb) = &config.hooks.delete {
            cb(trigger, &*form);
        }
        outcome
    }

    /// Restore saved values into `form` and show any pending delete message
    pub fn load_form(&self, form: &dyn Form, options: &Options) {
        let config = self.config(None, options);
        let id = form.id();

        if let Some(record) = self.store.load(&record_key(&id)) {
            let restored = form
                .fields()
                .iter()
                .filter(|f| field::populate(&***f, &record, &config.selector_ignore))
                .count();
            log::debug!("Restored {restored} fields of form {id}");
        }

        let key = message_key(&id);
        if let Some(html) = self.store.transient_get(&key) {
            show_status(form, &config.selector_status, &html);
            self.store.transient_clear(&key);
        }

        if let Some(cb) = &config.hooks.load {
            cb(form);
        }
    }
}
