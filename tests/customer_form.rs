use std::sync::{Arc, Mutex};

use bizform::prelude::*;
use futures::executor::block_on;
use gpui::SharedString;

fn customer_form() -> FormEngine {
    FormEngine::new(
        Values::new()
            .with("name", "")
            .with("email", "")
            .with("vip", false),
        ValidationRules::new()
            .field("name", [rules::required()])
            .field("email", [rules::required(), rules::email()]),
    )
}

#[test]
fn create_customer_flow() {
    let form = customer_form();
    let saved = Arc::new(Mutex::new(Vec::new()));

    let first = {
        let saved = saved.clone();
        block_on(form.handle_submit(move |values| async move {
            saved.lock().expect("saved lock").push(values);
            Ok::<_, String>(())
        }))
        .expect("first submit")
    };
    assert_eq!(first, SubmitOutcome::Invalid);
    assert!(form.is_touched("vip").expect("touched"));
    assert_eq!(
        form.field_error_for_display("email").expect("display error"),
        Some(SharedString::from("This field is required"))
    );

    form.handle_change("name", ChangeEvent::Text("Acme Ltd".into()))
        .expect("type name");
    form.handle_change("email", ChangeEvent::Text("billing@acme.test".into()))
        .expect("type email");
    form.handle_change("vip", ChangeEvent::Checked(true))
        .expect("tick vip");
    assert!(form.is_dirty().expect("dirty"));

    let second = {
        let saved = saved.clone();
        block_on(form.handle_submit(move |values| async move {
            saved.lock().expect("saved lock").push(values);
            Ok::<_, String>(())
        }))
        .expect("second submit")
    };
    assert_eq!(second, SubmitOutcome::Submitted);
    assert!(!form.is_submitting().expect("submitting"));

    let saved = saved.lock().expect("saved lock");
    assert_eq!(saved.len(), 1);
    assert_eq!(
        saved[0].get(&FieldName::from("vip")),
        Some(&FieldValue::Bool(true))
    );
}

#[test]
fn edit_mode_reset_then_feedback_on_failure() {
    let form = customer_form();
    form.reset(Some(
        Values::new()
            .with("name", "Acme Ltd")
            .with("email", "billing@acme.test")
            .with("vip", true),
    ))
    .expect("load record");
    assert!(!form.is_dirty().expect("clean"));

    let toasts = ToastManager::new();
    let feedback = SubmitFeedback::new(Arc::new(toasts.clone()));
    let outcome = block_on(form.submit_with_feedback(&feedback, |_values| async {
        Err::<(), _>("network unreachable".to_string())
    }))
    .expect("submit");

    assert_eq!(outcome.error().map(String::as_str), Some("network unreachable"));
    let shown = toasts.list(ToastPosition::TopRight);
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].kind, ToastKind::Error);
    assert_eq!(shown[0].title.to_string(), "Could not save changes");
}
