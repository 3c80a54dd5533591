use std::fs;
use std::path::Path;

use tracing::debug;

use crate::import::ImportFormat;
use crate::{ClientError, ClientResult};

/// Code points for bytes 0x80..=0x9F in Windows-1252. Undefined slots decode
/// to U+FFFD; every other byte maps to the Latin-1 code point of equal value.
const WINDOWS_1252_HIGH: [char; 32] = [
    '\u{20ac}', '\u{fffd}', '\u{201a}', '\u{0192}', '\u{201e}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02c6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{fffd}', '\u{017d}', '\u{fffd}',
    '\u{fffd}', '\u{2018}', '\u{2019}', '\u{201c}', '\u{201d}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02dc}', '\u{2122}', '\u{0161}', '\u{203a}', '\u{0153}', '\u{fffd}', '\u{017e}', '\u{0178}',
];

pub(crate) fn read_source(path: &Path) -> ClientResult<Vec<u8>> {
    fs::read(path).map_err(|error| {
        let location = path.display().to_string();
        ClientError::invalid_argument_with_recovery(
            &format!("Could not read import file `{location}`: {error}"),
            vec![
                "Verify the path exists and is readable.".to_string(),
                "Rerun `solde import create <path>`.".to_string(),
            ],
        )
    })
}

/// Decodes export bytes as UTF-8, falling back to Windows-1252 which most
/// legacy bank exports use.
pub(crate) fn decode_text(bytes: &[u8]) -> String {
    let without_bom = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(without_bom) {
        Ok(text) => text.to_string(),
        Err(_) => {
            debug!("input is not UTF-8, decoding as Windows-1252");
            without_bom.iter().map(|byte| decode_1252_byte(*byte)).collect()
        }
    }
}

fn decode_1252_byte(byte: u8) -> char {
    match byte {
        0x80..=0x9F => WINDOWS_1252_HIGH[usize::from(byte - 0x80)],
        _ => char::from(byte),
    }
}

pub(crate) fn infer_format(path: &Path) -> ClientResult<ImportFormat> {
    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("ofx" | "qfx") => Ok(ImportFormat::Ofx),
        Some("csv") => Ok(ImportFormat::Csv),
        _ => Err(ClientError::unsupported_format(path)),
    }
}
