use serde::{Deserialize, Serialize};
use std::fmt;

use crate::delimited::{decode_text, sniff_delimiter};
use crate::error::ImportError;

const PDF_MAGIC: &[u8] = b"%PDF-";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    /// CSV-like text.
    Delimited,
    /// xlsx / xls / ods workbook.
    Spreadsheet,
    /// PDF statement.
    Document,
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFormat::Delimited => write!(f, "delimited"),
            FileFormat::Spreadsheet => write!(f, "spreadsheet"),
            FileFormat::Document => write!(f, "document"),
        }
    }
}

/// Classifies a file by its signature, falling back to content shape for text.
/// The filename is only used for the error message.
pub fn detect_format(bytes: &[u8], filename: &str) -> Result<FileFormat, ImportError> {
    if bytes.starts_with(PDF_MAGIC) {
        return Ok(FileFormat::Document);
    }
    if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC) {
        return Ok(FileFormat::Spreadsheet);
    }
    if bytes.is_empty() || bytes.contains(&0) {
        return Err(ImportError::FormatUnsupported(filename.to_string()));
    }

    let text = decode_text(bytes);
    let header = text.lines().find(|l| !l.trim().is_empty()).unwrap_or_default();
    match sniff_delimiter(header) {
        Some(_) => Ok(FileFormat::Delimited),
        None => Err(ImportError::FormatUnsupported(filename.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_by_signature() {
        assert_eq!(detect_format(b"%PDF-1.7\n...", "x").unwrap(), FileFormat::Document);
        assert_eq!(detect_format(b"PK\x03\x04rest", "x").unwrap(), FileFormat::Spreadsheet);
        assert_eq!(detect_format(OLE_MAGIC, "x").unwrap(), FileFormat::Spreadsheet);
    }

    #[test]
    fn detects_delimited_text() {
        let csv = b"dateOp;label;amount\n2025-01-02;FRANPRIX;-12,50\n";
        assert_eq!(detect_format(csv, "export.csv").unwrap(), FileFormat::Delimited);
    }

    #[test]
    fn rejects_unknown_content() {
        let cases: [&[u8]; 3] = [b"", b"OFXHEADER:100\nDATA:OFXSGML\n", b"\x00\x01\x02binary"];
        for bytes in cases {
            let err = detect_format(bytes, "statement.bin").unwrap_err();
            assert!(matches!(err, ImportError::FormatUnsupported(ref f) if f == "statement.bin"));
        }
    }
}
