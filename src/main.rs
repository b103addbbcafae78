//! Form Saver headless demo
//!
//! In the browser the library is driven from JavaScript; natively this
//! walks one save, delete and reload cycle against the in-memory page.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use std::rc::Rc;

    use form_saver::dom::{Field, StatusTarget};
    use form_saver::memory::{MemoryDocument, MemoryElement};
    use form_saver::{FormSaver, Options, PersistenceStore};

    env_logger::init();
    log::info!("Form Saver (native) starting...");

    let doc = Rc::new(MemoryDocument::new());
    let email = MemoryElement::new("input")
        .with_attr("type", "email")
        .with_attr("name", "email");
    let subscribe = MemoryElement::new("input")
        .with_attr("type", "checkbox")
        .with_attr("name", "subscribe")
        .with_attr("value", "yes");
    let status = MemoryElement::new("div").with_attr("data-form-status", "");
    let save = MemoryElement::new("button").with_attr("data-form-save", "#contact");
    let delete = MemoryElement::new("button").with_attr("data-form-delete", "#contact");
    doc.append(
        &MemoryElement::new("form")
            .with_attr("id", "contact")
            .with_child(&email)
            .with_child(&subscribe)
            .with_child(&status)
            .with_child(&save)
            .with_child(&delete),
    );

    let saver = FormSaver::new(doc.clone(), PersistenceStore::in_memory());
    saver.init(Options::default());

    email.set_value("a@b.com");
    subscribe.set_checked(true);
    doc.click(&save);
    println!("After save: status = {:?}", status.html());

    // Simulated reload: fields reset, saver re-initialized
    email.set_value("");
    subscribe.set_checked(false);
    saver.auto();
    println!(
        "After reload: email = {:?}, subscribe checked = {}",
        email.value(),
        subscribe.is_checked()
    );

    doc.click(&delete);
    email.set_value("");
    subscribe.set_checked(false);
    status.set_html("");
    saver.auto();
    println!(
        "After delete + reload: email = {:?}, status = {:?}, reloads requested = {}",
        email.value(),
        status.html(),
        doc.reload_count()
    );
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry points are exported from `form_saver::web`
}
