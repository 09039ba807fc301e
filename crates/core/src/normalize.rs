//! Label normalization: reduces a raw bank label to a canonical merchant token.

use regex::Regex;
use std::sync::OnceLock;

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_embedded_date, r"\b\d{2}/\d{2}/\d{2}(?:\d{2})?\b");

// Instrument markers, tried repeatedly at the start of the label.
re!(re_instrument_prefix,
    r"^(?:paiement\s+(?:par\s+)?(?:carte|cb)|carte\s+x?\d{4}|carte|cb|achat\s+cb|prlv\s+sepa|prlv|prelevement|prélèvement|vir(?:ement)?\s+(?:sepa\s+)?(?:inst(?:antane)?\s+)?(?:emis|recu|reçu)?|vir(?:ement)?|retrait\s+dab|retrait|avoir)\b[\s:]*");

// Masked card numbers at the end: "cb*8533", "x1234", "****1234", "4971xxxx1234".
re!(re_card_suffix,
    r"(?:\s+(?:cb\*+\s*\d{4}|cb\s+\d{4}|\*+\d{2,4}|x{1,}\d{4}|\d{4}x+\d*|\d{4}\*+\d*))+\s*$");

re!(re_whitespace, r"\s+");

/// Reduces a raw transaction label to its merchant token.
///
/// Never fails: a label with nothing left after stripping falls back to a
/// trimmed, lower-cased copy of itself.
pub fn normalize(raw_label: &str) -> String {
    let lowered = raw_label.to_lowercase();
    let fallback = collapse(&lowered);

    let mut text = re_embedded_date().replace_all(&lowered, " ").into_owned();
    text = collapse(&text);

    loop {
        let stripped = re_instrument_prefix().replace(&text, "").into_owned();
        if stripped == text {
            break;
        }
        text = collapse(&stripped);
    }

    text = re_card_suffix().replace(&text, "").into_owned();
    let token = collapse(&text);

    if token.is_empty() {
        fallback
    } else {
        token
    }
}

fn collapse(s: &str) -> String {
    re_whitespace().replace_all(s, " ").trim().to_string()
}
