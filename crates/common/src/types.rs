//! Core data types for the checkout suite

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::country;
use crate::error::{FixtureError, Result};

// ============================================================================
// Addresses
// ============================================================================

/// A postal address as entered into the checkout forms.
///
/// The same shape serves shipping and billing. Billing fixtures usually
/// carry no email, so it is optional here and required only by
/// [`Address::validate_shipping`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(alias = "firstname")]
    pub first_name: String,
    #[serde(alias = "lastname")]
    pub last_name: String,
    #[serde(default)]
    pub company: String,
    pub street1: String,
    #[serde(default)]
    pub street2: String,
    /// ISO 3166-1 alpha-2 code, as the country select expects it
    pub country: String,
    pub city: String,
    pub postcode: String,
    pub telephone: String,
}

pub type ShippingAddress = Address;
pub type BillingAddress = Address;

impl Address {
    /// Values the rendered address summary must contain, in form order.
    ///
    /// The country is not included: the summary shows its display name, see
    /// [`Address::country_name`].
    pub fn summary_fields(&self) -> Vec<&str> {
        [
            self.first_name.as_str(),
            self.last_name.as_str(),
            self.company.as_str(),
            self.street1.as_str(),
            self.street2.as_str(),
            self.city.as_str(),
            self.postcode.as_str(),
            self.telephone.as_str(),
        ]
        .into_iter()
        .filter(|v| !v.is_empty())
        .collect()
    }

    /// Country display name (e.g. "United Kingdom" for "GB")
    pub fn country_name(&self) -> String {
        country::display_name_or_code(&self.country)
    }

    /// Shipping requires every field, email included
    pub fn validate_shipping(&self) -> Result<()> {
        let email = self.email.as_deref().unwrap_or_default();
        let fields = [
            ("email", email),
            ("firstName", self.first_name.as_str()),
            ("lastName", self.last_name.as_str()),
            ("company", self.company.as_str()),
            ("street1", self.street1.as_str()),
            ("street2", self.street2.as_str()),
            ("country", self.country.as_str()),
            ("city", self.city.as_str()),
            ("postcode", self.postcode.as_str()),
            ("telephone", self.telephone.as_str()),
        ];

        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(FixtureError::Invalid(format!(
                    "shipping address field '{}' is empty",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Shipping and billing address pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBook {
    pub shipping: ShippingAddress,
    pub billing: BillingAddress,
}

// ============================================================================
// Cards
// ============================================================================

/// Which 3-D Secure challenge button to press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeChoice {
    Yes,
    No,
}

impl ChallengeChoice {
    /// Button label, also used as the button id inside the challenge frame
    pub fn label(&self) -> &'static str {
        match self {
            ChallengeChoice::Yes => "yes",
            ChallengeChoice::No => "no",
        }
    }
}

impl fmt::Display for ChallengeChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Expected terminal branch of an order submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Expectation {
    #[default]
    Success,
    Failure,
    /// Either branch is acceptable
    Either,
}

impl Expectation {
    pub fn accepts(&self, outcome: &CheckoutOutcome) -> bool {
        matches!(
            (self, outcome),
            (Expectation::Either, _)
                | (Expectation::Success, CheckoutOutcome::Success { .. })
                | (Expectation::Failure, CheckoutOutcome::Failure { .. })
        )
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Success => f.write_str("success"),
            Expectation::Failure => f.write_str("failure"),
            Expectation::Either => f.write_str("either"),
        }
    }
}

/// Card brand used by the redirect form when the fixture names none
pub const DEFAULT_CARD_BRAND: &str = "VISA";

/// One card under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardFixture {
    pub label: String,
    #[serde(alias = "name")]
    pub holder_name: String,
    pub number: String,
    /// Compact `MMYY`
    #[serde(alias = "exp")]
    pub expiry: String,
    pub cvv: String,
    /// Absent means no 3-D Secure challenge is expected
    #[serde(default)]
    pub challenge_choice: Option<ChallengeChoice>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub expect: Option<Expectation>,
}

impl CardFixture {
    pub fn expiry(&self) -> Result<Expiry> {
        Expiry::parse(&self.expiry)
    }

    pub fn brand(&self) -> &str {
        self.brand.as_deref().unwrap_or(DEFAULT_CARD_BRAND)
    }

    /// Explicit expectation, else derived from the challenge choice:
    /// declining the challenge must fail, everything else must succeed.
    pub fn expectation(&self) -> Expectation {
        match (self.expect, self.challenge_choice) {
            (Some(expect), _) => expect,
            (None, Some(ChallengeChoice::No)) => Expectation::Failure,
            (None, _) => Expectation::Success,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.number.chars().any(|c| !c.is_ascii_digit()) || self.number.is_empty() {
            return Err(FixtureError::Invalid(format!(
                "card '{}' has a non-numeric number",
                self.label
            )));
        }
        self.expiry()?;
        Ok(())
    }
}

/// Card expiry split into the redirect form's month and year selects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiry {
    /// Two digits, "01".."12"
    pub month: String,
    /// Four digits, "20" prefixed
    pub year: String,
}

impl Expiry {
    /// Parse a compact `MMYY` value
    pub fn parse(compact: &str) -> Result<Self> {
        let compact = compact.trim();
        if compact.len() != 4 || !compact.chars().all(|c| c.is_ascii_digit()) {
            return Err(FixtureError::Invalid(format!(
                "expiry '{}' is not in MMYY form",
                compact
            )));
        }

        let (month, year) = compact.split_at(2);
        match month.parse::<u8>() {
            Ok(1..=12) => Ok(Self {
                month: month.to_string(),
                year: format!("20{}", year),
            }),
            _ => Err(FixtureError::Invalid(format!(
                "expiry '{}' has month out of range",
                compact
            ))),
        }
    }
}

// ============================================================================
// Products
// ============================================================================

/// A set of products added to one cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductScenario {
    pub label: String,
    /// Product page URLs, in the order they are added
    #[serde(alias = "products")]
    pub product_identifiers: Vec<String>,
}

impl ProductScenario {
    pub fn validate(&self) -> Result<()> {
        if self.product_identifiers.is_empty() {
            return Err(FixtureError::Invalid(format!(
                "product scenario '{}' has no products",
                self.label
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Derived values
// ============================================================================

/// Shipping method offered at checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShippingMethod {
    Standard,
    /// Method whose price is captured and cross-checked on the next page
    Priced,
}

impl ShippingMethod {
    pub const ALL: [ShippingMethod; 2] = [ShippingMethod::Standard, ShippingMethod::Priced];
}

/// What the shipping stage chose
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingSelection {
    pub chosen_method: ShippingMethod,
    /// Trimmed price text, captured only for [`ShippingMethod::Priced`]
    pub expected_price: Option<String>,
}

/// Payment sub-flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentFlow {
    /// In-page card form hosted in iframes
    Iframe,
    /// Card form on an external redirect page
    Redirect,
}

impl PaymentFlow {
    pub const ALL: [PaymentFlow; 2] = [PaymentFlow::Iframe, PaymentFlow::Redirect];
}

impl fmt::Display for PaymentFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentFlow::Iframe => f.write_str("iframe"),
            PaymentFlow::Redirect => f.write_str("redirect"),
        }
    }
}

/// Terminal result of one order submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckoutOutcome {
    Success { order_reference: String },
    Failure { reason_text: String },
}

impl CheckoutOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CheckoutOutcome::Success { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CheckoutOutcome::Success { .. } => "success",
            CheckoutOutcome::Failure { .. } => "failure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn card(challenge: Option<ChallengeChoice>, expect: Option<Expectation>) -> CardFixture {
        CardFixture {
            label: "visa".to_string(),
            holder_name: "Test Holder".to_string(),
            number: "4147463011110083".to_string(),
            expiry: "0829".to_string(),
            cvv: "123".to_string(),
            challenge_choice: challenge,
            brand: None,
            expect,
        }
    }

    #[test]
    fn test_expiry_split() {
        let expiry = Expiry::parse("0829").unwrap();
        assert_eq!(expiry.month, "08");
        assert_eq!(expiry.year, "2029");
    }

    #[test_case("829" ; "too short")]
    #[test_case("08/29" ; "separator")]
    #[test_case("1329" ; "month out of range")]
    #[test_case("0029" ; "month zero")]
    fn test_expiry_rejects(input: &str) {
        assert!(Expiry::parse(input).is_err());
    }

    #[test_case(None, None, Expectation::Success ; "no challenge succeeds")]
    #[test_case(Some(ChallengeChoice::Yes), None, Expectation::Success ; "accepted challenge succeeds")]
    #[test_case(Some(ChallengeChoice::No), None, Expectation::Failure ; "declined challenge fails")]
    #[test_case(None, Some(Expectation::Failure), Expectation::Failure ; "explicit wins")]
    fn test_card_expectation(
        challenge: Option<ChallengeChoice>,
        expect: Option<Expectation>,
        wanted: Expectation,
    ) {
        assert_eq!(card(challenge, expect).expectation(), wanted);
    }

    #[test]
    fn test_card_accepts_original_field_names() {
        let json = r#"{
            "label": "Visa frictionless",
            "name": "Test Holder",
            "number": "4147463011110083",
            "exp": "0829",
            "cvv": "123",
            "challengeChoice": "yes"
        }"#;
        let card: CardFixture = serde_json::from_str(json).unwrap();
        assert_eq!(card.holder_name, "Test Holder");
        assert_eq!(card.challenge_choice, Some(ChallengeChoice::Yes));
        assert_eq!(card.brand(), DEFAULT_CARD_BRAND);
    }

    #[test]
    fn test_summary_fields_skip_empty_and_country() {
        let address = Address {
            email: None,
            first_name: "Billing".to_string(),
            last_name: "Person".to_string(),
            company: String::new(),
            street1: "1 Billing Way".to_string(),
            street2: String::new(),
            country: "GB".to_string(),
            city: "London".to_string(),
            postcode: "E1 6AN".to_string(),
            telephone: "01234567890".to_string(),
        };
        let fields = address.summary_fields();
        assert_eq!(fields.len(), 6);
        assert!(!fields.contains(&"GB"));
        assert_eq!(address.country_name(), "United Kingdom");
        assert!(address.validate_shipping().is_err());
    }

    #[test]
    fn test_expectation_accepts() {
        let success = CheckoutOutcome::Success { order_reference: "1".to_string() };
        let failure = CheckoutOutcome::Failure { reason_text: "declined".to_string() };
        assert!(Expectation::Success.accepts(&success));
        assert!(!Expectation::Success.accepts(&failure));
        assert!(Expectation::Failure.accepts(&failure));
        assert!(Expectation::Either.accepts(&success));
        assert!(Expectation::Either.accepts(&failure));
    }
}
