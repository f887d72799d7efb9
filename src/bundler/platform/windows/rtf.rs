//! Plain text to RTF conversion for installer license pages.

const HEADER: &str = "{\\rtf1\\ansi\\ansicpg1252\\deff0\\deflang1033{\\fonttbl{\\f0\\fnil\\fcharset0 Arial;}}\n\\viewkind4\\uc1\\pard\\sa200\\sl276\\slmult1\\lang9\\fs20 ";

/// Whether `bytes` already hold an RTF document.
pub fn is_rtf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"{\\rtf1")
}

/// Converts plain text to RTF. Blank lines become paragraph breaks; other
/// line breaks become spaces.
pub fn text_to_rtf(text: &str) -> String {
    let mut out = String::from(HEADER);
    for line in text.lines() {
        if line.trim().is_empty() {
            out.push_str("\\par");
        } else {
            for c in line.chars() {
                push_escaped(&mut out, c);
            }
            out.push(' ');
        }
        out.push_str("\r\n");
    }
    out.push_str("}\r\n");
    out
}

fn push_escaped(out: &mut String, c: char) {
    let code = c as u32;
    if code < 0x10 {
        out.push_str(&format!("\\'0{code:x}"));
    } else if code > 0xff {
        // RTF takes signed 16-bit code units.
        let mut units = [0u16; 2];
        for unit in c.encode_utf16(&mut units) {
            out.push_str(&format!("\\u{}?", *unit as i16));
        }
    } else if code < 0x20 || code >= 0x80 || matches!(c, '\\' | '{' | '}') {
        out.push_str(&format!("\\'{code:x}"));
    } else {
        out.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_rtf() {
        assert!(is_rtf(b"{\\rtf1\\ansi hello}"));
        assert!(!is_rtf(b"MIT License"));
    }

    #[test]
    fn test_escapes_and_paragraphs() {
        let rtf = text_to_rtf("a{b}\\c\n\nd\u{e9}\u{20ac}\u{1f600}");
        assert!(rtf.starts_with("{\\rtf1\\ansi"));
        assert!(rtf.contains("a\\'7bb\\'7d\\'5cc \r\n"));
        assert!(rtf.contains("\\par\r\n"));
        assert!(rtf.contains("d\\'e9\\u8364?\\u-10179?\\u-8704? \r\n"));
        assert!(rtf.ends_with("}\r\n"));
    }

    #[test]
    fn test_control_characters() {
        let rtf = text_to_rtf("\tx\u{1b}");
        assert!(rtf.contains("\\'09x\\'1b "));
    }
}
