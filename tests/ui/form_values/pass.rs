use bizform::form::{FieldValue, FormValues, Values};

#[derive(Clone, Debug, PartialEq, bizform::form::FormValues)]
struct SignupForm {
    email: String,
    newsletter: bool,
    referral: Option<String>,
}

fn main() {
    let fields = SignupForm::fields();
    assert_eq!(fields.email().as_str(), "email");

    let model = SignupForm {
        email: "ops@example.com".to_string(),
        newsletter: true,
        referral: None,
    };
    let values = model.to_values();
    assert_eq!(values.get(&fields.referral()), Some(&FieldValue::Null));

    let restored = SignupForm::from_values(
        &Values::new()
            .with("email", "ops@example.com")
            .with("newsletter", true),
    )
    .expect("referral may be absent");
    assert_eq!(restored, model);
}
