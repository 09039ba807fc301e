use regex::Regex;
use std::sync::OnceLock;

use crate::error::ImportError;

fn re_statement_line() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        // Amounts carry exactly two decimals; thousands groups are three digits.
        Regex::new(
            r"^\s*(\d{2}/\d{2}/\d{4})\s+(.+?)\s+([-+]?\d{1,3}(?:[ .\x{a0}\x{202f}]\d{3})+,\d{2}|[-+]?\d{1,3}(?:,\d{3})+\.\d{2}|[-+]?\d+[.,]\d{2})\s*(?:€|EUR)?\s*$",
        )
        .expect("statement line regex")
    })
}

/// Extracts movement lines from a PDF statement.
pub fn read_document(bytes: &[u8]) -> Result<Vec<Vec<String>>, ImportError> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| ImportError::Document(e.to_string()))?;
    let rows = rows_from_text(&text);
    if rows.len() <= 1 {
        return Err(ImportError::NoDataRows);
    }
    Ok(rows)
}

/// Turns statement text into a grid with a synthetic `date;label;amount`
/// header. Lines that do not look like a movement are skipped.
pub fn rows_from_text(text: &str) -> Vec<Vec<String>> {
    let mut rows = vec![vec![
        "date".to_string(),
        "label".to_string(),
        "amount".to_string(),
    ]];
    for line in text.lines() {
        if let Some(caps) = re_statement_line().captures(line) {
            rows.push(vec![
                caps[1].to_string(),
                caps[2].trim().to_string(),
                caps[3].to_string(),
            ]);
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_lines_become_rows() {
        let text = "RELEVE DE COMPTE\n\
                    Date Libellé Montant\n\
                    02/01/2025 CARTE 31/12/24 FRANPRIX CB*8533 -12,50\n\
                    03/01/2025 VIR SEPA RECU SALAIRE 2 450,00 €\n\
                    Solde au 03/01/2025\n";
        let rows = rows_from_text(text);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], vec!["02/01/2025", "CARTE 31/12/24 FRANPRIX CB*8533", "-12,50"]);
        assert_eq!(rows[2][1], "VIR SEPA RECU SALAIRE");
        assert_eq!(rows[2][2], "2 450,00");
    }

    #[test]
    fn trailing_label_numbers_stay_in_label() {
        let rows = rows_from_text("03/01/2025 VIR SALAIRE JANVIER 2025 2 450,00");
        assert_eq!(rows[1], vec!["03/01/2025", "VIR SALAIRE JANVIER 2025", "2 450,00"]);

        let rows = rows_from_text("04/01/2025 PRLV LOYER REF 2025 -1.250,00 EUR");
        assert_eq!(rows[1], vec!["04/01/2025", "PRLV LOYER REF 2025", "-1.250,00"]);

        let rows = rows_from_text("05/01/2025 AMAZON ORDER 408 1,234.56");
        assert_eq!(rows[1], vec!["05/01/2025", "AMAZON ORDER 408", "1,234.56"]);
    }

    #[test]
    fn lines_without_cents_are_not_movements() {
        let rows = rows_from_text("06/01/2025 PAGE 2 SUR 3\n07/01/2025 CARTE MONOPRIX 8,40");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][1], "CARTE MONOPRIX");
    }
}
