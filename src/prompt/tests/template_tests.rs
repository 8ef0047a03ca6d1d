//! Tests for placeholder rendering.

use crate::prompt::{TemplateContext, render, unresolved_placeholders};
use rstest::rstest;

#[rstest]
#[case("Hello {{name}}", "Hello Bob")]
#[case("Hello {{ name }}!", "Hello Bob!")]
#[case("{{name}}{{name}}", "BobBob")]
#[case("Hello {{missing}}", "Hello {{missing}}")]
#[case("no placeholders", "no placeholders")]
#[case("{{ not closed", "{{ not closed")]
fn render_substitutes_known_names(#[case] text: &str, #[case] expected: &str) {
    let context = TemplateContext::new().with("name", "Bob");
    assert_eq!(render(text, &context), expected);
}

#[rstest]
fn render_with_empty_context_is_identity() {
    let text = "Migrate {{source_ref}} to {{targets}}";
    assert_eq!(render(text, &TemplateContext::new()), text);
}

#[rstest]
fn substituted_values_are_not_rendered_again() {
    let context = TemplateContext::new()
        .with("a", "{{b}}")
        .with("b", "nested");
    assert_eq!(render("{{a}}", &context), "{{b}}");
}

#[rstest]
fn unresolved_names_are_listed_once_in_order() {
    let context = TemplateContext::new().with("job_id", "J1");
    let text = "{{job_id}} {{zeta}} {{alpha}} {{ zeta }}";
    assert_eq!(
        unresolved_placeholders(text, &context),
        vec!["zeta".to_owned(), "alpha".to_owned()]
    );
}
