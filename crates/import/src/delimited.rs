use crate::error::ImportError;
use crate::util::trim_cell;

const CANDIDATE_DELIMITERS: &[u8] = b";,\t|";

/// Decodes UTF-8 (dropping a BOM), falling back to Latin-1 byte-for-char.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Picks the most frequent candidate delimiter in the header line.
pub fn sniff_delimiter(header: &str) -> Option<u8> {
    CANDIDATE_DELIMITERS
        .iter()
        .map(|&d| (d, header.bytes().filter(|&b| b == d).count()))
        .filter(|(_, n)| *n > 0)
        .max_by_key(|(_, n)| *n)
        .map(|(d, _)| d)
}

/// Reads delimited text into a grid of trimmed cells, header row included.
pub fn read_delimited(bytes: &[u8]) -> Result<Vec<Vec<String>>, ImportError> {
    let text = decode_text(bytes);
    let header = text.lines().find(|l| !l.trim().is_empty()).unwrap_or_default();
    let delimiter = sniff_delimiter(header).unwrap_or(b',');

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(trim_cell).collect());
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_semicolon_over_comma() {
        assert_eq!(sniff_delimiter("dateOp;label;amount,eur"), Some(b';'));
        assert_eq!(sniff_delimiter("date,description,amount"), Some(b','));
        assert_eq!(sniff_delimiter("date\tlabel"), Some(b'\t'));
        assert_eq!(sniff_delimiter("no delimiters here"), None);
    }

    #[test]
    fn reads_quoted_semicolon_export() {
        let data = "\u{feff}dateOp;label;amount\n2025-01-02;\"CARTE 02/01/25 FRANPRIX\";-12,50\n";
        let rows = read_delimited(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["dateOp", "label", "amount"]);
        assert_eq!(rows[1][1], "CARTE 02/01/25 FRANPRIX");
        assert_eq!(rows[1][2], "-12,50");
    }

    #[test]
    fn decodes_latin1() {
        let bytes = b"Libell\xe9;Montant\n";
        assert_eq!(decode_text(bytes), "Libellé;Montant\n");
    }

    #[test]
    fn ragged_rows_are_tolerated() {
        let rows = read_delimited(b"a,b,c\n1,2\n1,2,3,4\n").unwrap();
        assert_eq!(rows[1].len(), 2);
        assert_eq!(rows[2].len(), 4);
    }
}
