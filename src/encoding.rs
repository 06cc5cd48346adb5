// 🔤 Text decoding cascade - UTF-8 → Latin-1 → Windows-1252
//
// Government open-data CSVs show up in any of the three encodings. The first
// decoder that accepts the bytes wins. Latin-1 is applied strictly: bytes in
// 0x80-0x9F are C1 control codes that never appear in real text, so their
// presence means the file is really Windows-1252. Windows-1252 is the last
// resort and accepts every byte: its five undefined positions decode to the
// matching C1 code point, so a stray byte only spoils the line it sits on.

use serde::Serialize;

const BOM: char = '\u{FEFF}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextEncoding {
    Utf8,
    Latin1,
    Windows1252,
}

impl TextEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Latin1 => "Latin-1",
            TextEncoding::Windows1252 => "Windows-1252",
        }
    }
}

/// Windows-1252 code points for 0x80..=0x9F. `None` marks the five bytes the
/// code page leaves undefined; those pass through as U+0080 + offset.
const CP1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'), None,            Some('\u{201A}'), Some('\u{0192}'),
    Some('\u{201E}'), Some('\u{2026}'), Some('\u{2020}'), Some('\u{2021}'),
    Some('\u{02C6}'), Some('\u{2030}'), Some('\u{0160}'), Some('\u{2039}'),
    Some('\u{0152}'), None,            Some('\u{017D}'), None,
    None,            Some('\u{2018}'), Some('\u{2019}'), Some('\u{201C}'),
    Some('\u{201D}'), Some('\u{2022}'), Some('\u{2013}'), Some('\u{2014}'),
    Some('\u{02DC}'), Some('\u{2122}'), Some('\u{0161}'), Some('\u{203A}'),
    Some('\u{0153}'), None,            Some('\u{017E}'), Some('\u{0178}'),
];

/// Decode bytes with the fallback cascade and strip a leading BOM
pub fn decode_text(bytes: &[u8]) -> (String, TextEncoding) {
    let (text, encoding) = if let Ok(text) = std::str::from_utf8(bytes) {
        (text.to_string(), TextEncoding::Utf8)
    } else if let Some(text) = decode_latin1(bytes) {
        tracing::info!("UTF-8 decoding failed, using Latin-1");
        (text, TextEncoding::Latin1)
    } else {
        tracing::info!("Latin-1 decoding failed, using Windows-1252");
        (decode_windows1252(bytes), TextEncoding::Windows1252)
    };

    (strip_bom(&text).to_string(), encoding)
}

pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix(BOM).unwrap_or(text)
}

fn decode_latin1(bytes: &[u8]) -> Option<String> {
    if bytes.iter().any(|b| (0x80..=0x9F).contains(b)) {
        return None;
    }
    Some(bytes.iter().map(|&b| b as char).collect())
}

fn decode_windows1252(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0x80..=0x9F => CP1252_HIGH[(b - 0x80) as usize].unwrap_or(b as char),
            _ => b as char,
        })
        .collect()
}
