//! Scripted storefront shared by the integration tests
#![allow(dead_code)]

use std::sync::Arc;
use tempfile::TempDir;

use checkout_common::{Address, AddressBook, CardFixture, ChallengeChoice, ProductScenario};
use checkout_e2e::artifacts::{ArtifactStore, CaseArtifacts};
use checkout_e2e::config::{CheckoutConfig, ShippingPolicy};
use checkout_e2e::driver::scripted::{Effect, Element, ScriptedDriver};
use checkout_e2e::driver::{Driver, Selector};
use checkout_e2e::stages::StageContext;

pub const SHOP: &str = "https://shop.test";
pub const ACS_URL: &str = "https://acs.modirum.test/mdpayacs/challenge?id=1";
pub const ORDER_REFERENCE: &str = "000000123";
pub const SUCCESS_TEXT: &str = "Thank you for your purchase! Your order number with 000000123 is successful.";
pub const IFRAME_FAILURE_TEXT: &str = "3D Secure authentication failed";
pub const REDIRECT_FAILURE_TEXT: &str = "Declined: Your bank has declined the payment";

pub fn css(selector: &str) -> Selector {
    Selector::Css { css: selector.to_string() }
}

/// Defaults with every random choice pinned
pub fn config() -> CheckoutConfig {
    let mut config = CheckoutConfig::default();
    config.policy.shipping_method = ShippingPolicy::Standard;
    config.policy.billing_divergence_probability = 0.0;
    config
}

pub fn shipping_address() -> Address {
    Address {
        email: Some("qa@example.com".to_string()),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        company: "Analytical Ltd".to_string(),
        street1: "1 High Street".to_string(),
        street2: "Floor 2".to_string(),
        country: "GB".to_string(),
        city: "London".to_string(),
        postcode: "SW1A 1AA".to_string(),
        telephone: "02079460000".to_string(),
    }
}

pub fn billing_address() -> Address {
    Address {
        email: None,
        first_name: "Grace".to_string(),
        last_name: "Hopper".to_string(),
        company: "Compiler Co".to_string(),
        street1: "9 Mill Lane".to_string(),
        street2: "Unit 4".to_string(),
        country: "GB".to_string(),
        city: "Manchester".to_string(),
        postcode: "M1 1AE".to_string(),
        telephone: "01619460000".to_string(),
    }
}

pub fn addresses() -> AddressBook {
    AddressBook { shipping: shipping_address(), billing: billing_address() }
}

pub fn card(choice: Option<ChallengeChoice>) -> CardFixture {
    CardFixture {
        label: "visa".to_string(),
        holder_name: "Ada Lovelace".to_string(),
        number: "4111111111111111".to_string(),
        expiry: "0829".to_string(),
        cvv: "123".to_string(),
        challenge_choice: choice,
        brand: None,
        expect: None,
    }
}

pub fn scenario() -> ProductScenario {
    ProductScenario {
        label: "single".to_string(),
        product_identifiers: vec![format!("{}/gear/bag.html", SHOP)],
    }
}

/// How a rendered address block reads
pub fn summary_text(address: &Address) -> String {
    format!(
        "{} {}\n{}\n{}\n{}\n{}, {}\n{}\n{}",
        address.first_name,
        address.last_name,
        address.company,
        address.street1,
        address.street2,
        address.city,
        address.postcode,
        address.country_name(),
        address.telephone
    )
}

/// Temp output directory, config and per-case artifacts
pub struct Harness {
    pub dir: TempDir,
    pub config: CheckoutConfig,
    pub artifacts: CaseArtifacts,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(config())
    }

    pub fn with_config(mut config: CheckoutConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        config.output_dir = dir.path().to_path_buf();
        let store = Arc::new(ArtifactStore::new(dir.path()).unwrap());
        let artifacts = store.case("scripted case");
        Self { dir, config, artifacts }
    }

    pub fn context<'a>(&'a self, driver: &'a dyn Driver) -> StageContext<'a> {
        StageContext {
            driver,
            selectors: &self.config.selectors,
            timeouts: &self.config.timeouts,
            messages: &self.config.messages,
            artifacts: &self.artifacts,
        }
    }
}

/// Product page, cart and checkout with every control in place.
///
/// Terminal messages start hidden; tests decide what placing the order does.
pub fn storefront(config: &CheckoutConfig) -> ScriptedDriver {
    let driver = ScriptedDriver::new().with_url(SHOP);
    let s = &config.selectors;

    driver
        .add(Element::role("button", &s.add_to_cart_name))
        .add(Element::role("link", &s.cart_link_name))
        .add(Element::css(&s.proceed_to_checkout))
        .on_click(
            css(&s.proceed_to_checkout),
            vec![Effect::Navigate(format!("{}/checkout/#shipping", SHOP))],
        );

    let sh = &s.shipping;
    for field in [
        &sh.email,
        &sh.first_name,
        &sh.last_name,
        &sh.company,
        &sh.street1,
        &sh.street2,
        &sh.country,
        &sh.city,
        &sh.postcode,
        &sh.telephone,
        &sh.standard_method,
        &sh.priced_method,
        &sh.continue_button,
    ] {
        driver.add(Element::css(field));
    }
    driver
        .add(Element::css(&sh.priced_method_price).text("  $5.00 "))
        .add(Element::css(&sh.next_page_price).text("$5.00"));

    let p = &s.payment;
    driver
        .add(Element::css(&p.iframe_method_label))
        .add(Element::css(&p.redirect_method_label));
    for field in p.framed_inputs() {
        driver.add(Element::css(&field.input).in_frame(&field.frame));
    }
    for container in &p.validity_containers {
        driver.add(Element::css(container).attr("class", "field valid"));
    }

    let o = &s.order;
    driver
        .add(Element::css(&o.loading_mask).hidden())
        .add(Element::css(&o.place_order).text("Place Order").hidden())
        .add(Element::css(&o.place_order).text("Place Order with GooglePay"))
        .add(Element::css(&o.place_order).text("Place Order"))
        .add(Element::css(&o.redirect_place_order).text("Place Order"))
        .add(Element::css(&o.success_message).text(SUCCESS_TEXT).hidden());

    driver
        .add(Element::css(&p.redirect_form_ready).hidden())
        .on_click(
            css(&o.redirect_place_order),
            vec![
                Effect::Navigate("https://pay.test/redirect".to_string()),
                Effect::Show(css(&p.redirect_form_ready)),
            ],
        )
        .add(Element::css(&p.brand_widget))
        .add(Element::css(&p.brand_option).text("MASTERCARD"))
        .add(Element::css(&p.brand_option).text("VISA"))
        .add(Element::css(&p.card_number))
        .add(Element::css(&p.expiry_month))
        .add(Element::css(&p.expiry_year))
        .add(Element::css(&p.cvv))
        .add(Element::css(&p.next_button));

    driver
}

/// Hidden failure message carrying `text`
pub fn failure_message(driver: &ScriptedDriver, config: &CheckoutConfig, text: &str) {
    driver.add(Element::css(&config.selectors.order.failure_message).text(text).hidden());
}

pub fn show_success(config: &CheckoutConfig) -> Effect {
    Effect::Show(css(&config.selectors.order.success_message))
}

pub fn show_failure(config: &CheckoutConfig) -> Effect {
    Effect::Show(css(&config.selectors.order.failure_message))
}

/// What clicking the real "Place Order" button does
pub fn on_place_order(driver: &ScriptedDriver, config: &CheckoutConfig, effects: Vec<Effect>) {
    driver.on_click(css(&config.selectors.order.place_order), effects);
}

/// What clicking "next" on the redirect card form does
pub fn on_redirect_next(driver: &ScriptedDriver, config: &CheckoutConfig, effects: Vec<Effect>) {
    driver.on_click(css(&config.selectors.payment.next_button), effects);
}

/// Challenge buttons inside the provider frame; yes succeeds, no fails
pub fn challenge_buttons(driver: &ScriptedDriver, config: &CheckoutConfig) {
    let ch = &config.selectors.challenge;
    let yes = ch.button("yes");
    let no = ch.button("no");
    driver
        .add(Element::css(&yes).in_frame_url(ACS_URL))
        .add(Element::css(&no).in_frame_url(ACS_URL))
        .on_click(
            css(&yes),
            vec![Effect::DetachFrame("modirum".to_string()), show_success(config)],
        )
        .on_click(
            css(&no),
            vec![Effect::DetachFrame("modirum".to_string()), show_failure(config)],
        );
}

/// Same-as-shipping toggle, billing summary and the hidden new-address form.
///
/// Unchecking the toggle attaches the form (each field with a hidden clone
/// first). With `update_refreshes_summary` the update button re-renders the
/// summary with the billing address.
pub fn billing_section(
    driver: &ScriptedDriver,
    config: &CheckoutConfig,
    checked: bool,
    update_refreshes_summary: bool,
) {
    let b = &config.selectors.billing;
    let toggle = &b.same_as_shipping_toggles[0];
    driver
        .add(Element::css(toggle).checked(checked))
        .add(Element::css(&b.summary_block).text(summary_text(&shipping_address())));

    let mut form = vec![Effect::Add(Element::css(&b.new_address_form))];
    for field in [
        &b.first_name,
        &b.last_name,
        &b.company,
        &b.street1,
        &b.street2,
        &b.country,
        &b.city,
        &b.postcode,
        &b.telephone,
    ] {
        let selector = b.in_form(field);
        form.push(Effect::Add(Element::css(&selector).hidden()));
        form.push(Effect::Add(Element::css(&selector)));
    }
    form.push(Effect::Add(Element::css(&b.update_button).hidden()));
    form.push(Effect::Add(Element::css(&b.update_button)));
    driver.on_set_checked(css(toggle), false, form);

    if update_refreshes_summary {
        driver.on_click(
            css(&b.update_button),
            vec![
                Effect::Remove(css(&b.summary_block)),
                Effect::Add(Element::css(&b.summary_block).text(summary_text(&billing_address()))),
            ],
        );
    }
}
