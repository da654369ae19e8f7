//! Field extraction from payment receipt text (Сбербанк, ВТБ, Озон, Т-Банк,
//! Альфа-Банк и др.): amount, date and issuing bank.

use std::str::FromStr;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;

/// Bank keyword table, checked in order against lowercased text.
const BANK_KEYWORDS: &[(&str, &[&str])] = &[
    ("sber", &["сбербанк", "сбер", "sberbank", "sber"]),
    ("vtb", &["втб", "vtb", "внешторгбанк"]),
    ("ozon", &["озон", "ozon"]),
    ("tbank", &["т-банк", "т банк", "тинькофф", "t-bank", "tbank", "tinkoff"]),
    ("alfa", &["альфа-банк", "альфа банк", "alfa", "альфа"]),
];

/// Parser output; all fields are None when nothing could be extracted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedReceipt {
    pub parsed_amount: Option<Decimal>,
    pub parsed_date: Option<NaiveDate>,
    pub parsed_bank: Option<String>,
    pub amount_match: Option<bool>,
    pub raw_preview: String,
}

fn amount_patterns() -> &'static [Regex; 5] {
    static RES: OnceLock<[Regex; 5]> = OnceLock::new();
    RES.get_or_init(|| {
        [
            // Keyword-anchored totals: "Сумма: 1 500,00 руб"
            Regex::new(
                r"(?i)(?:сумма|итого|переведено|оплачено|к\s+оплате|всего|amount)\s*[:.]?\s*(\d[\d\s]*[,.]?\d*)\s*(?:руб\.?|р\.|₽)?",
            )
            .expect("amount keyword regex"),
            // "1 500,00 руб" / "1500.00 ₽"
            Regex::new(r"(?i)(\d[\d\s]{0,10})[,.](\d{2})\s*(?:руб\.?|р\.|₽)").expect("amount rub regex"),
            Regex::new(r"(?i)(\d[\d\s]{0,10})[,.](\d{2})\s*[рR]").expect("amount r regex"),
            // Currency sign before the number
            Regex::new(r"(?i)(?:руб|₽)\s*(\d[\d\s]*[,.]?\d*)").expect("amount prefix regex"),
            Regex::new(r"(?i)(\d{1,8})[,.](\d{2})\s*(?:руб|₽)").expect("amount plain regex"),
        ]
    })
}

fn date_patterns() -> &'static [Regex; 3] {
    static RES: OnceLock<[Regex; 3]> = OnceLock::new();
    RES.get_or_init(|| {
        [
            Regex::new(r"\b(\d{1,2})[./](\d{1,2})[./](\d{4})\b").expect("date dmy regex"),
            Regex::new(r"\b(\d{1,2})[./](\d{1,2})[./](\d{2})\b").expect("date dmy2 regex"),
            Regex::new(r"\b(\d{4})[./-](\d{1,2})[./-](\d{1,2})\b").expect("date ymd regex"),
        ]
    })
}

/// Normalize "1 500,00" / "1500.00" / "1500,50" into a Decimal.
fn normalize_amount(value: &str) -> Option<Decimal> {
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// All distinct ruble amounts found in the text, largest first. The printed
/// "итого" total is usually the largest figure on a receipt.
fn parse_amounts(text: &str) -> Vec<Decimal> {
    let upper_bound = Decimal::from(100_000_000u64);
    let mut amounts = Vec::new();
    for pat in amount_patterns() {
        for caps in pat.captures_iter(text) {
            let val = match (caps.get(1), caps.get(2)) {
                (Some(whole), Some(frac)) => {
                    normalize_amount(&format!("{}.{}", whole.as_str(), frac.as_str()))
                }
                (Some(single), None) => normalize_amount(single.as_str()),
                _ => None,
            };
            if let Some(v) = val {
                if v > Decimal::ZERO && v < upper_bound {
                    amounts.push(v);
                }
            }
        }
    }
    amounts.sort_unstable_by(|a, b| b.cmp(a));
    amounts.dedup();
    amounts
}

/// First syntactically valid date, trying dd.mm.yyyy, dd.mm.yy, yyyy-mm-dd.
fn parse_date(text: &str) -> Option<NaiveDate> {
    for (i, pat) in date_patterns().iter().enumerate() {
        if let Some(caps) = pat.captures(text) {
            let a: i32 = caps[1].parse().ok()?;
            let b: u32 = caps[2].parse().ok()?;
            let c: u32 = caps[3].parse().ok()?;
            let (year, month, day) = if i == 2 {
                (a, b, c)
            } else {
                let mut y = c as i32;
                if i == 1 {
                    y += if y < 50 { 2000 } else { 1900 };
                }
                (y, b, a as u32)
            };
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                return Some(date);
            }
        }
    }
    None
}

fn detect_bank(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    for (code, keywords) in BANK_KEYWORDS {
        if keywords.iter().any(|kw| lower.contains(kw)) {
            return code;
        }
    }
    "other"
}

/// Parse receipt text and compare the extracted amount against the invoice
/// total. Empty text is not an error: every field stays None and the receipt
/// is left for manual review.
pub fn parse_receipt(text: &str, expected_amount: Decimal) -> ParsedReceipt {
    let preview: String = text.chars().take(1500).collect();
    let mut result = ParsedReceipt {
        raw_preview: preview.trim().to_string(),
        ..Default::default()
    };
    if text.trim().is_empty() {
        return result;
    }

    let amounts = parse_amounts(text);
    result.parsed_amount = amounts.first().copied();
    result.parsed_date = parse_date(text);
    result.parsed_bank = Some(detect_bank(text).to_string());

    if let Some(amount) = result.parsed_amount {
        let tolerance = Decimal::new(1, 2); // 0.01
        result.amount_match = Some((amount - expected_amount).abs() <= tolerance);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn parses_keyword_anchored_amount() {
        let text = "СберБанк Онлайн\nПеревод клиенту\nИтого: 4 000,00 ₽\n12.03.2024";
        let res = parse_receipt(text, dec("4000.00"));
        assert_eq!(res.parsed_amount, Some(dec("4000.00")));
        assert_eq!(res.amount_match, Some(true));
        assert_eq!(res.parsed_bank.as_deref(), Some("sber"));
        assert_eq!(
            res.parsed_date,
            Some(NaiveDate::from_ymd_opt(2024, 3, 12).unwrap())
        );
    }

    #[test]
    fn largest_amount_wins() {
        // Commission lines must not shadow the total.
        let text = "Сумма: 3500,00 руб\nКомиссия: 35,00 руб";
        let res = parse_receipt(text, dec("3500.00"));
        assert_eq!(res.parsed_amount, Some(dec("3500.00")));
    }

    #[test]
    fn amount_match_boundary() {
        let text = "Оплачено 4000,00 руб";
        assert_eq!(parse_receipt(text, dec("4000.01")).amount_match, Some(true));
        assert_eq!(parse_receipt(text, dec("3999.99")).amount_match, Some(true));
        assert_eq!(parse_receipt(text, dec("4000.02")).amount_match, Some(false));
        assert_eq!(parse_receipt(text, dec("3999.98")).amount_match, Some(false));
    }

    #[test]
    fn thousands_separator_normalized() {
        let text = "К оплате: 12 500,50 руб.";
        let res = parse_receipt(text, dec("12500.50"));
        assert_eq!(res.parsed_amount, Some(dec("12500.50")));
        assert_eq!(res.amount_match, Some(true));
    }

    #[test]
    fn date_formats() {
        assert_eq!(
            parse_date("чек от 05.11.2023"),
            Some(NaiveDate::from_ymd_opt(2023, 11, 5).unwrap())
        );
        assert_eq!(
            parse_date("операция 07/01/24 выполнена"),
            Some(NaiveDate::from_ymd_opt(2024, 1, 7).unwrap())
        );
        assert_eq!(
            parse_date("timestamp 2024-02-29"),
            Some(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        assert_eq!(parse_date("без даты"), None);
    }

    #[test]
    fn invalid_calendar_date_skipped() {
        assert_eq!(parse_date("32.13.2024"), None);
    }

    #[test]
    fn bank_detection() {
        assert_eq!(detect_bank("Перевод через Тинькофф"), "tbank");
        assert_eq!(detect_bank("ВТБ Онлайн"), "vtb");
        assert_eq!(detect_bank("Ozon Банк"), "ozon");
        assert_eq!(detect_bank("АЛЬФА-БАНК"), "alfa");
        assert_eq!(detect_bank("неизвестный банк"), "other");
    }

    #[test]
    fn empty_text_degrades_to_nulls() {
        let res = parse_receipt("", dec("1000.00"));
        assert_eq!(res.parsed_amount, None);
        assert_eq!(res.parsed_date, None);
        assert_eq!(res.parsed_bank, None);
        assert_eq!(res.amount_match, None);
        assert_eq!(res.raw_preview, "");
    }

    #[test]
    fn no_amount_means_no_match_flag() {
        let res = parse_receipt("перевод выполнен успешно", dec("1000.00"));
        assert_eq!(res.parsed_amount, None);
        assert_eq!(res.amount_match, None);
        assert_eq!(res.parsed_bank.as_deref(), Some("other"));
    }

    #[test]
    fn raw_preview_truncated_to_1500_chars() {
        let text = "х".repeat(2000);
        let res = parse_receipt(&text, dec("1.00"));
        assert_eq!(res.raw_preview.chars().count(), 1500);
    }
}
