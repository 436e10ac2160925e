//! Suite configuration
//!
//! Every section has a `Default` matching the staging storefront, so a TOML
//! file only needs the keys it overrides.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use checkout_common::ShippingMethod;

use crate::error::{E2eError, E2eResult};
use crate::playwright::PlaywrightConfig;

/// Milliseconds to `Duration`
pub(crate) fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutConfig {
    /// Storefront root, used by the preflight check
    pub base_url: String,

    /// Fixtures directory (cards, products, addresses)
    pub fixtures_dir: PathBuf,

    /// Results, screenshots and attachments land here
    pub output_dir: PathBuf,

    /// Cases run concurrently, each on its own browser
    pub workers: usize,

    pub browser: PlaywrightConfig,
    pub timeouts: Timeouts,
    pub selectors: Selectors,
    pub messages: Messages,
    pub policy: FlowPolicy,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            base_url: "https://staging.storefront.test".to_string(),
            fixtures_dir: checkout_common::default_fixtures_dir(),
            output_dir: PathBuf::from("test-results"),
            workers: 1,
            browser: PlaywrightConfig::default(),
            timeouts: Timeouts::default(),
            selectors: Selectors::default(),
            messages: Messages::default(),
            policy: FlowPolicy::default(),
        }
    }
}

impl CheckoutConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> E2eResult<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str::<Self>(&content)?
        } else {
            Self::default()
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// `HEADLESS=false` opens a visible browser
    pub fn apply_env(&mut self) {
        if let Ok(value) = std::env::var("HEADLESS") {
            self.browser.headless = !value.eq_ignore_ascii_case("false");
        }
    }

    pub fn validate(&self) -> E2eResult<()> {
        if self.workers == 0 {
            return Err(E2eError::Config("workers must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.policy.billing_divergence_probability) {
            return Err(E2eError::Config(format!(
                "billing_divergence_probability {} is outside 0..=1",
                self.policy.billing_divergence_probability
            )));
        }
        if self.selectors.billing.same_as_shipping_toggles.is_empty() {
            return Err(E2eError::Config("no billing toggle selectors".to_string()));
        }
        if self.selectors.challenge.frame_url_markers.is_empty() {
            return Err(E2eError::Config("no challenge frame markers".to_string()));
        }
        regex::Regex::new(&self.messages.order_success_pattern)
            .map_err(|e| E2eError::Config(format!("order_success_pattern: {}", e)))?;
        regex::Regex::new(&self.selectors.checkout_url_pattern)
            .map_err(|e| E2eError::Config(format!("checkout_url_pattern: {}", e)))?;
        Ok(())
    }
}

// ============================================================================
// Timeouts
// ============================================================================

/// Every bounded wait in the flow, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Fallback for plain fills and clicks
    pub element_ms: u64,
    pub add_to_cart_settle_ms: u64,
    pub cart_ready_ms: u64,
    pub checkout_button_ms: u64,
    pub navigation_ms: u64,
    /// Bound on the primary checkout click before the DOM-level fallback
    pub primary_click_ms: u64,
    pub checkout_url_ms: u64,
    pub shipping_form_ms: u64,
    pub shipping_method_ms: u64,
    pub shipping_price_ms: u64,
    pub method_checked_ms: u64,
    pub billing_toggle_probe_ms: u64,
    pub billing_form_ms: u64,
    pub billing_summary_retry_ms: u64,
    pub payment_method_ms: u64,
    pub payment_frames_ms: u64,
    pub brand_widget_ms: u64,
    pub redirect_form_ms: u64,
    pub challenge_detect_ms: u64,
    pub challenge_poll_interval_ms: u64,
    pub challenge_button_ms: u64,
    pub challenge_retry_ms: u64,
    pub challenge_fallback_ms: u64,
    pub loading_mask_ms: u64,
    pub order_button_ms: u64,
    pub page_load_ms: u64,
    pub outcome_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            element_ms: 5_000,
            add_to_cart_settle_ms: 1_000,
            cart_ready_ms: 10_000,
            checkout_button_ms: 10_000,
            navigation_ms: 15_000,
            primary_click_ms: 5_000,
            checkout_url_ms: 15_000,
            shipping_form_ms: 10_000,
            shipping_method_ms: 10_000,
            shipping_price_ms: 5_000,
            method_checked_ms: 5_000,
            billing_toggle_probe_ms: 3_000,
            billing_form_ms: 15_000,
            billing_summary_retry_ms: 1_000,
            payment_method_ms: 5_000,
            payment_frames_ms: 10_000,
            brand_widget_ms: 20_000,
            redirect_form_ms: 20_000,
            challenge_detect_ms: 20_000,
            challenge_poll_interval_ms: 250,
            challenge_button_ms: 15_000,
            challenge_retry_ms: 5_000,
            challenge_fallback_ms: 5_000,
            loading_mask_ms: 10_000,
            order_button_ms: 20_000,
            page_load_ms: 30_000,
            outcome_ms: 25_000,
        }
    }
}

// ============================================================================
// Selectors
// ============================================================================

/// The storefront's DOM contract
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    /// Accessible name of the product page's add button
    pub add_to_cart_name: String,
    /// Accessible name of the minicart link to the cart page
    pub cart_link_name: String,
    pub proceed_to_checkout: String,
    /// Regex the URL must match after leaving the cart
    pub checkout_url_pattern: String,
    pub shipping: ShippingSelectors,
    pub billing: BillingSelectors,
    pub payment: PaymentSelectors,
    pub challenge: ChallengeSelectors,
    pub order: OrderSelectors,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            add_to_cart_name: "Add to Cart".to_string(),
            cart_link_name: "shopping cart".to_string(),
            proceed_to_checkout: r#"button[data-role="proceed-to-checkout"]"#.to_string(),
            checkout_url_pattern: r"checkout/.*".to_string(),
            shipping: ShippingSelectors::default(),
            billing: BillingSelectors::default(),
            payment: PaymentSelectors::default(),
            challenge: ChallengeSelectors::default(),
            order: OrderSelectors::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingSelectors {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub street1: String,
    pub street2: String,
    pub country: String,
    pub city: String,
    pub postcode: String,
    pub telephone: String,
    pub standard_method: String,
    pub priced_method: String,
    /// Price cell scoped to the priced method's row
    pub priced_method_price: String,
    pub continue_button: String,
    /// Shipping price shown on the payment step
    pub next_page_price: String,
}

impl Default for ShippingSelectors {
    fn default() -> Self {
        Self {
            email: "input#customer-email".to_string(),
            first_name: r#"input[name="firstname"]"#.to_string(),
            last_name: r#"input[name="lastname"]"#.to_string(),
            company: r#"input[name="company"]"#.to_string(),
            street1: r#"input[name="street[0]"]"#.to_string(),
            street2: r#"input[name="street[1]"]"#.to_string(),
            country: r#"select[name="country_id"]"#.to_string(),
            city: r#"input[name="city"]"#.to_string(),
            postcode: r#"input[name="postcode"]"#.to_string(),
            telephone: r#"input[name="telephone"]"#.to_string(),
            standard_method: r#"input[type="radio"][name="ko_unique_4"]"#.to_string(),
            priced_method: r#"input[type="radio"][name="ko_unique_5"]"#.to_string(),
            priced_method_price: r#"tr:has(input[name="ko_unique_5"]) span.price"#.to_string(),
            continue_button: r#"button[data-role="opc-continue"]"#.to_string(),
            next_page_price: r#"span.price[data-th="Shipping"]"#.to_string(),
        }
    }
}

impl ShippingSelectors {
    pub fn method(&self, method: ShippingMethod) -> &str {
        match method {
            ShippingMethod::Standard => &self.standard_method,
            ShippingMethod::Priced => &self.priced_method,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingSelectors {
    /// Probed in order; the first visible one is the active toggle
    pub same_as_shipping_toggles: Vec<String>,
    pub new_address_form: String,
    /// Input/select selectors, scoped under `new_address_form`
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub street1: String,
    pub street2: String,
    pub country: String,
    pub city: String,
    pub postcode: String,
    pub telephone: String,
    pub update_button: String,
    pub summary_block: String,
}

impl Default for BillingSelectors {
    fn default() -> Self {
        Self {
            same_as_shipping_toggles: vec![
                "#billing-address-same-as-shipping-lcnetpaymentjs".to_string(),
                "#billing-address-same-as-shipping-lcnetredirect".to_string(),
                "#billing-address-same-as-shipping-shared".to_string(),
            ],
            new_address_form: "div.billing-address-form".to_string(),
            first_name: r#"input[name="firstname"]"#.to_string(),
            last_name: r#"input[name="lastname"]"#.to_string(),
            company: r#"input[name="company"]"#.to_string(),
            street1: r#"input[name="street[0]"]"#.to_string(),
            street2: r#"input[name="street[1]"]"#.to_string(),
            country: r#"select[name="country_id"]"#.to_string(),
            city: r#"input[name="city"]"#.to_string(),
            postcode: r#"input[name="postcode"]"#.to_string(),
            telephone: r#"input[name="telephone"]"#.to_string(),
            update_button: "button.action-update".to_string(),
            summary_block: "div.billing-address-details".to_string(),
        }
    }
}

impl BillingSelectors {
    /// Field selector scoped under the new-address form
    pub fn in_form(&self, field: &str) -> String {
        format!("{} {}", self.new_address_form, field)
    }
}

/// An input living inside its own iframe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramedInput {
    /// Selector of the `<iframe>` element
    pub frame: String,
    /// Selector of the input inside it
    pub input: String,
}

impl FramedInput {
    fn new(frame: &str, input: &str) -> Self {
        Self { frame: frame.to_string(), input: input.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentSelectors {
    pub iframe_method_label: String,
    pub redirect_method_label: String,
    pub name_field: FramedInput,
    pub card_field: FramedInput,
    pub expiry_field: FramedInput,
    pub cvv_field: FramedInput,
    /// Host-page containers whose class reflects field validity
    pub validity_containers: Vec<String>,
    pub valid_marker: String,
    pub brand_widget: String,
    pub brand_option: String,
    pub card_number: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub cvv: String,
    pub next_button: String,
    /// Either element signals the redirect card form has loaded
    pub redirect_form_ready: String,
}

impl Default for PaymentSelectors {
    fn default() -> Self {
        Self {
            iframe_method_label: r#"label[for="lcnetpaymentjs"]"#.to_string(),
            redirect_method_label: r#"label[for="lcnetredirect"]"#.to_string(),
            name_field: FramedInput::new("#first-data-payment-field-name", "input#name"),
            card_field: FramedInput::new("#first-data-payment-field-card", "input#card"),
            expiry_field: FramedInput::new("#first-data-payment-field-exp", "input#exp"),
            cvv_field: FramedInput::new("#first-data-payment-field-cvv", "input"),
            validity_containers: vec![
                "#cc-name".to_string(),
                "#cc-card".to_string(),
                "#cc-exp".to_string(),
                "#cc-cvv".to_string(),
            ],
            valid_marker: "valid".to_string(),
            brand_widget: "#select2-brandTypeSelect-container".to_string(),
            brand_option: ".select2-results__option".to_string(),
            card_number: "#cardNumber".to_string(),
            expiry_month: "#expiryMonth".to_string(),
            expiry_year: "#expiryYear".to_string(),
            cvv: "#cardCode_masked".to_string(),
            next_button: "#nextBtn".to_string(),
            redirect_form_ready: "input#cardNumber, #select2-brandTypeSelect-container".to_string(),
        }
    }
}

impl PaymentSelectors {
    /// Name, card, expiry, CVV, in fill order
    pub fn framed_inputs(&self) -> [&FramedInput; 4] {
        [&self.name_field, &self.card_field, &self.expiry_field, &self.cvv_field]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengeSelectors {
    /// Substrings identifying the challenge provider's frame URL
    pub frame_url_markers: Vec<String>,
    /// `{choice}` is replaced with "yes" or "no"
    pub button_template: String,
}

impl Default for ChallengeSelectors {
    fn default() -> Self {
        Self {
            frame_url_markers: vec!["modirum".to_string()],
            button_template: "button#{choice}".to_string(),
        }
    }
}

impl ChallengeSelectors {
    pub fn button(&self, choice: &str) -> String {
        self.button_template.replace("{choice}", choice)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderSelectors {
    pub place_order: String,
    /// Buttons containing this text are other payment methods' buttons
    pub exclude_text: String,
    /// Position among the filtered matches; the first one is a hidden duplicate
    pub place_order_index: usize,
    pub redirect_place_order: String,
    pub loading_mask: String,
    pub success_message: String,
    pub failure_message: String,
}

impl Default for OrderSelectors {
    fn default() -> Self {
        Self {
            place_order: r#"button:has-text("Place Order")"#.to_string(),
            exclude_text: "GooglePay".to_string(),
            place_order_index: 1,
            redirect_place_order: r#"button:has-text("Place Order"):not([disabled])"#.to_string(),
            loading_mask: ".loading-mask, .spinner, .loading-indicator".to_string(),
            success_message: r#"[data-ui-id="message-success"]"#.to_string(),
            failure_message: r#"[data-ui-id="checkout-cart-validationmessages-message-error"], .message.message-error"#
                .to_string(),
        }
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Expected terminal message wording
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    /// First capture group is the order reference
    pub order_success_pattern: String,
    pub iframe_failures: Vec<String>,
    pub redirect_failures: Vec<String>,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            order_success_pattern: r"Your order number with (\d+) is successful".to_string(),
            iframe_failures: vec![
                "3D Secure authentication failed".to_string(),
                "3DS authentication failed".to_string(),
                "An error occurred on the server. Please try to place the order again.".to_string(),
            ],
            redirect_failures: vec!["Declined: Your bank has declined the payment".to_string()],
        }
    }
}

// ============================================================================
// Policy
// ============================================================================

/// How the shipping method is picked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShippingPolicy {
    #[default]
    Standard,
    Priced,
    /// Uniform over all methods, for coverage across runs
    Random,
}

impl ShippingPolicy {
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> ShippingMethod {
        match self {
            ShippingPolicy::Standard => ShippingMethod::Standard,
            ShippingPolicy::Priced => ShippingMethod::Priced,
            ShippingPolicy::Random => {
                ShippingMethod::ALL[rng.gen_range(0..ShippingMethod::ALL.len())]
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowPolicy {
    pub shipping_method: ShippingPolicy,
    /// Chance of unchecking "billing same as shipping" when it is checked
    pub billing_divergence_probability: f64,
    /// Seed for every random choice; None draws one per run and logs it
    pub seed: Option<u64>,
}

impl Default for FlowPolicy {
    fn default() -> Self {
        Self {
            shipping_method: ShippingPolicy::Random,
            billing_divergence_probability: 0.5,
            seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml = r#"
base_url = "https://shop.example"
workers = 2

[timeouts]
outcome_ms = 40000

[policy]
shipping_method = "priced"
seed = 7
"#;
        let config: CheckoutConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.base_url, "https://shop.example");
        assert_eq!(config.workers, 2);
        assert_eq!(config.timeouts.outcome_ms, 40_000);
        assert_eq!(config.timeouts.challenge_poll_interval_ms, 250);
        assert_eq!(config.policy.shipping_method, ShippingPolicy::Priced);
        assert_eq!(config.policy.seed, Some(7));
        assert_eq!(config.selectors.order.place_order_index, 1);
        config.validate().unwrap();
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = CheckoutConfig::load(Path::new("/nonexistent/checkout.toml")).unwrap();
        assert_eq!(config.workers, 1);
    }

    #[test]
    fn test_rejects_bad_probability() {
        let mut config = CheckoutConfig::default();
        config.policy.billing_divergence_probability = 1.5;
        assert!(matches!(config.validate(), Err(E2eError::Config(_))));
    }

    #[test]
    fn test_random_policy_is_seeded() {
        let picks = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..16)
                .map(|_| ShippingPolicy::Random.choose(&mut rng))
                .collect::<Vec<_>>()
        };
        assert_eq!(picks(42), picks(42));
        assert!(picks(42).contains(&ShippingMethod::Standard));
        assert!(picks(42).contains(&ShippingMethod::Priced));
    }

    #[test]
    fn test_challenge_button_template() {
        let selectors = ChallengeSelectors::default();
        assert_eq!(selectors.button("yes"), "button#yes");
    }
}
