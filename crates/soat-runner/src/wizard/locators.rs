//! Where things live in the quote wizard's DOM.

use crate::locator::Locator;
use crate::wait::Predicate;

/// Class the landing page puts on the plate input when it rejects the value.
pub const PLATE_ERROR_CLASS: &str = "is-input-error";

/// Styled ancestors that frame the purchase summary.
const SUMMARY_CONTAINER: &str =
    "div[class*='rounded'], div[class*='shadow'], div[class*='border'], div[class*='bg-white']";

const VALIDITY_WORDS: &[&str] = &["válida", "valida", "inválida", "invalida", "6 d", "error"];

// Landing

pub fn plate_input() -> Locator {
    Locator::id("plate")
}

pub fn quote_button() -> Locator {
    Locator::text("COTIZAR AHORA").within("div")
}

pub fn plate_message() -> Locator {
    Locator::contains("placa")
}

/// Mentions the plate together with a validity keyword.
pub fn is_plate_error_text(text: &str) -> bool {
    let text = text.to_lowercase();
    text.contains("placa") && VALIDITY_WORDS.iter().any(|w| text.contains(w))
}

// Plan selection

pub fn edit_vehicle() -> Locator {
    Locator::contains("Editar").within("span.text-primary")
}

pub fn make_field() -> Locator {
    Locator::id("make")
}

pub fn model_field() -> Locator {
    Locator::id("model")
}

pub fn save_button() -> Locator {
    Locator::text("Guardar cambios").within("span").closest("button")
}

/// Plans are listed cheapest first.
pub fn plan_button() -> Locator {
    Locator::contains("Seleccionar plan").within("span").closest("button")
}

pub fn renewal_opt_out() -> Locator {
    Locator::contains("NO ACTIVAR").within("button")
}

pub fn continue_button() -> Locator {
    Locator::contains("CONTINUAR CON").within("button")
}

pub fn plan_selection_entry(plans_path: &str) -> Predicate {
    Predicate::All(vec![
        Predicate::url_contains(plans_path),
        Predicate::Any(vec![
            Predicate::Visible(edit_vehicle()),
            Predicate::Visible(plan_button()),
        ]),
    ])
}

// Payment

pub fn summary_label() -> Locator {
    Locator::contains("Resumen de compra").within("p")
}

pub fn summary_container() -> Locator {
    summary_label().closest(SUMMARY_CONTAINER)
}

pub fn payment_entry() -> Predicate {
    Predicate::Visible(summary_label())
}
