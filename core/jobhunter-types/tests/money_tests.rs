use jobhunter_types::{Currency, Money, Percent};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[test]
fn parse_decimal_strings() {
    assert_eq!(Money::parse("19.99").unwrap().cents(), 1999);
    assert_eq!(Money::parse("20").unwrap().cents(), 2000);
    assert_eq!(Money::parse("0.5").unwrap().cents(), 50);
    assert_eq!(Money::parse(".75").unwrap().cents(), 75);
    assert_eq!(Money::parse("-1.25").unwrap().cents(), -125);
}

#[test]
fn parse_rejects_bad_input() {
    assert!(Money::parse("").is_err());
    assert!(Money::parse("1.234").is_err());
    assert!(Money::parse("1,00").is_err());
    assert!(Money::parse("abc").is_err());
    assert!(Money::parse(".").is_err());
}

#[test]
fn from_major_rounds_to_cents() {
    assert_eq!(Money::from_major(29.99).unwrap().cents(), 2999);
    assert_eq!(Money::from_major(0.125).unwrap().cents(), 13);
    assert!(Money::from_major(f64::NAN).is_err());
}

#[test]
fn display_has_two_decimals() {
    assert_eq!(Money::from_cents(1999).to_string(), "19.99");
    assert_eq!(Money::from_cents(5).to_string(), "0.05");
    assert_eq!(Money::from_cents(-250).to_string(), "-2.50");
}

#[test]
fn percent_of_rounds_to_nearest_cent() {
    // 10% of 29.99 is 2.999
    let commission = Money::from_cents(2999).percent_of(Percent::from_basis_points(1000));
    assert_eq!(commission.cents(), 300);
    // 15% of 10.00
    let discount = Money::from_cents(1000).percent_of(Percent::from_basis_points(1500));
    assert_eq!(discount.cents(), 150);
}

#[test]
fn percent_of_rounds_halves_away_from_zero() {
    // 0.5% of 1.00 is exactly half a cent.
    let rate = Percent::from_basis_points(50);
    assert_eq!(Money::from_cents(100).percent_of(rate).cents(), 1);
    assert_eq!(Money::from_cents(-100).percent_of(rate).cents(), -1);
    // 0.49 cents rounds down.
    assert_eq!(Money::from_cents(98).percent_of(rate).cents(), 0);
}

#[test]
fn percent_of_large_amounts_does_not_wrap() {
    let max = Money::from_cents(i64::MAX);
    assert_eq!(max.percent_of(Percent::from_basis_points(20_000)), max);
    assert_eq!(
        Money::from_cents(i64::MIN).percent_of(Percent::from_basis_points(20_000)),
        Money::from_cents(i64::MIN)
    );
}

#[test]
fn saturating_sub_floor_zero_never_negative() {
    let amount = Money::from_cents(500);
    assert_eq!(amount.saturating_sub_floor_zero(Money::from_cents(800)), Money::ZERO);
    assert_eq!(amount.saturating_sub_floor_zero(Money::from_cents(200)).cents(), 300);
    assert_eq!(
        amount.saturating_sub_floor_zero(Money::from_cents(i64::MIN)),
        Money::from_cents(i64::MAX)
    );
}

#[test]
fn checked_arithmetic_reports_overflow() {
    let max = Money::from_cents(i64::MAX);
    assert_eq!(max.checked_add(Money::from_cents(1)), None);
    assert_eq!(Money::from_cents(i64::MIN).checked_sub(Money::from_cents(1)), None);
    assert_eq!(
        Money::from_cents(250).checked_sub(Money::from_cents(100)),
        Some(Money::from_cents(150))
    );
    // The operators clamp instead.
    assert_eq!(max + Money::from_cents(1), max);
    let mut total = max;
    total += Money::from_cents(5);
    assert_eq!(total, max);
}

#[test]
fn serde_accepts_numbers_and_strings() {
    let from_number: Money = serde_json::from_str("29.99").unwrap();
    let from_text: Money = serde_json::from_str("\"29.99\"").unwrap();
    assert_eq!(from_number, from_text);
    assert_eq!(serde_json::to_string(&from_number).unwrap(), "29.99");
}

#[test]
fn sum_of_amounts() {
    let total: Money = [100, 250, 5].into_iter().map(Money::from_cents).sum();
    assert_eq!(total.cents(), 355);
}

#[test]
fn percent_serializes_as_value() {
    let rate = Percent::from_value(12.5).unwrap();
    assert_eq!(rate.basis_points(), 1250);
    assert_eq!(serde_json::to_string(&rate).unwrap(), "12.5");
    assert_eq!(rate.to_string(), "12.50");
}

#[test]
fn currency_normalises_case() {
    let eur = Currency::parse("EUR").unwrap();
    assert_eq!(eur.as_str(), "eur");
    assert_eq!(eur.upper(), "EUR");
    assert_eq!(Currency::default().as_str(), "usd");
    assert!(Currency::parse("dollars").is_err());
}

proptest! {
    #[test]
    fn display_parse_roundtrip(cents in -1_000_000_000i64..1_000_000_000i64) {
        let money = Money::from_cents(cents);
        prop_assert_eq!(Money::parse(&money.to_string()).unwrap(), money);
    }

    #[test]
    fn percent_never_exceeds_amount(cents in 0i64..10_000_000, rate in 0i64..=10_000) {
        let part = Money::from_cents(cents).percent_of(Percent::from_basis_points(rate));
        prop_assert!(part.cents() <= cents);
    }
}
