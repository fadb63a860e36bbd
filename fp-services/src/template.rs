//! SMS message template rendering.
//!
//! Templates use `{placeholder}` tokens. Known tokens are replaced from a
//! `RenderContext`; anything else, including known tokens with no value in
//! this context, is left exactly as written. Rendering never fails.

use std::collections::HashMap;

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use rust_decimal::{Decimal, RoundingStrategy};

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{([A-Za-z][A-Za-z0-9_]*)\}").unwrap();
}

/// Placeholder names understood by the renderer.
pub mod placeholder {
    pub const CLIENT_NAME: &str = "clientName";
    pub const FIRST_NAME: &str = "firstName";
    pub const LEAD_NAME: &str = "leadName";
    pub const QUOTE_NUMBER: &str = "quoteNumber";
    pub const JOB_NUMBER: &str = "jobNumber";
    pub const INVOICE_NUMBER: &str = "invoiceNumber";
    pub const AMOUNT: &str = "amount";
    pub const DUE_DATE: &str = "dueDate";
    pub const COMPANY_NAME: &str = "companyName";
    pub const COMPANY_PHONE: &str = "companyPhone";

    pub const ALL: &[&str] = &[
        CLIENT_NAME,
        FIRST_NAME,
        LEAD_NAME,
        QUOTE_NUMBER,
        JOB_NUMBER,
        INVOICE_NUMBER,
        AMOUNT,
        DUE_DATE,
        COMPANY_NAME,
        COMPANY_PHONE,
    ];
}

/// Values available to one rendering.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    values: HashMap<&'static str, String>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a placeholder value. Empty values are ignored so the token stays
    /// visible rather than silently vanishing.
    pub fn set(mut self, key: &'static str, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.trim().is_empty() {
            self.values.insert(key, value);
        }
        self
    }

    /// Set a placeholder from an optional value.
    pub fn set_opt(self, key: &'static str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.set(key, v),
            None => self,
        }
    }

    pub fn amount(self, amount: Decimal) -> Self {
        self.set(placeholder::AMOUNT, format_amount(amount))
    }

    pub fn due_date(self, date: NaiveDate) -> Self {
        self.set(placeholder::DUE_DATE, format_date(date))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Substitute placeholders in `template` from `context`.
pub fn render(template: &str, context: &RenderContext) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let key = &caps[1];
            match context.get(key) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Placeholder tokens in a template that are not known to the renderer.
/// Used to warn when a campaign is saved with a typo.
pub fn unknown_placeholders(template: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .filter(|name| !placeholder::ALL.contains(&name.as_str()))
        .collect()
}

/// Format a dollar amount as `$1,234.56`.
pub fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}${grouped}.{cents}", if negative { "-" } else { "" })
}

/// Format a date the way Australian customers read it.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_render_known_placeholders() {
        let ctx = RenderContext::new()
            .set(placeholder::FIRST_NAME, "Jane")
            .set(placeholder::QUOTE_NUMBER, "Q-00012")
            .amount(dec!(1234.5));
        let out = render("Hi {firstName}, quote {quoteNumber} is {amount}.", &ctx);
        assert_eq!(out, "Hi Jane, quote Q-00012 is $1,234.50.");
    }

    #[test]
    fn test_unmatched_left_verbatim() {
        let ctx = RenderContext::new().set(placeholder::FIRST_NAME, "Jane");
        let out = render("Hi {firstName} {unknownThing} {dueDate} { spaced }", &ctx);
        assert_eq!(out, "Hi Jane {unknownThing} {dueDate} { spaced }");
    }

    #[test]
    fn test_repeated_placeholder() {
        let ctx = RenderContext::new().set(placeholder::CLIENT_NAME, "Acme");
        assert_eq!(render("{clientName}/{clientName}", &ctx), "Acme/Acme");
    }

    #[test]
    fn test_empty_value_keeps_token() {
        let ctx = RenderContext::new().set(placeholder::COMPANY_PHONE, "  ");
        assert_eq!(render("Call {companyPhone}", &ctx), "Call {companyPhone}");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(dec!(0)), "$0.00");
        assert_eq!(format_amount(dec!(999.999)), "$1,000.00");
        assert_eq!(format_amount(dec!(1234567.8)), "$1,234,567.80");
        assert_eq!(format_amount(dec!(-45.5)), "-$45.50");
        assert_eq!(format_amount(dec!(100)), "$100.00");
    }

    #[test]
    fn test_format_date() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(format_date(d), "07/03/2024");
    }

    #[test]
    fn test_unknown_placeholders() {
        let found = unknown_placeholders("Hi {firstName}, {frstName} {amount}");
        assert_eq!(found, vec!["frstName".to_string()]);
    }
}
