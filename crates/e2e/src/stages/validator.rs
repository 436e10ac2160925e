//! Hosted card field validity

use tracing::{debug, warn};

use super::StageContext;
use crate::driver::Locator;

fn has_class_token(class: &str, marker: &str) -> bool {
    class.split_whitespace().any(|token| token == marker)
}

/// True when every validity container carries the valid marker class.
///
/// The marker is matched against whole class tokens, not substrings, so
/// `invalid` and `is-valid` do not count.
///
/// Reads the current class attributes only. Any read error counts as invalid.
pub async fn payment_fields_valid(cx: &StageContext<'_>) -> bool {
    let sel = &cx.selectors.payment;
    for container in &sel.validity_containers {
        let class = match cx.driver.get_attribute(&Locator::css(container).first(), "class").await {
            Ok(class) => class.unwrap_or_default(),
            Err(e) => {
                warn!("Could not read class of {}: {}", container, e);
                return false;
            }
        };
        if !has_class_token(&class, &sel.valid_marker) {
            debug!("{} is not valid (class=\"{}\")", container, class);
            return false;
        }
    }
    true
}
