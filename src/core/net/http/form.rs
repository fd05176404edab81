//! `application/x-www-form-urlencoded` decoding

use heapless::{String, Vec};

const KEY_SIZE: usize = 32;

/// Find `name` in an urlencoded body and decode its value.
///
/// The value is cut to `N` bytes at a character boundary. A bare key
/// without `=` has an empty value.
pub fn form_value<const N: usize>(body: &str, name: &str) -> Option<String<N>> {
    body.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key: String<KEY_SIZE> = url_decode(key);
        (key == name).then(|| url_decode(value))
    })
}

/// Decode `%XX` escapes and `+` into a bounded string
pub fn url_decode<const N: usize>(raw: &str) -> String<N> {
    let mut bytes = Vec::<u8, N>::new();
    let input = raw.as_bytes();
    let mut i = 0;
    while i < input.len() {
        let decoded = match input[i] {
            b'+' => b' ',
            b'%' => match (input.get(i + 1).and_then(hex), input.get(i + 2).and_then(hex)) {
                (Some(hi), Some(lo)) => {
                    i += 2;
                    (hi << 4) | lo
                }
                _ => b'%',
            },
            other => other,
        };
        if bytes.push(decoded).is_err() {
            break;
        }
        i += 1;
    }

    let valid = match core::str::from_utf8(&bytes) {
        Ok(text) => text.len(),
        Err(e) => e.valid_up_to(),
    };
    let mut out = String::new();
    if let Ok(text) = core::str::from_utf8(&bytes[..valid]) {
        let _ = out.push_str(text);
    }
    out
}

fn hex(byte: &u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Lenient integer parse.
///
/// Skips leading whitespace, takes an optional sign and the longest run of
/// digits after it. Anything unparsable gives 0 and overflow saturates.
pub fn parse_int_lenient(text: &str) -> i32 {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let mut value: i32 = 0;
    for digit in digits.bytes().take_while(u8::is_ascii_digit) {
        let digit = i32::from(digit - b'0');
        value = if negative {
            value.saturating_mul(10).saturating_sub(digit)
        } else {
            value.saturating_mul(10).saturating_add(digit)
        };
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_and_decodes_fields() {
        let body = "ssid=My+Home&pass=p%40ss%21&port=1884&muser=";
        assert_eq!(form_value::<32>(body, "ssid").unwrap().as_str(), "My Home");
        assert_eq!(form_value::<32>(body, "pass").unwrap().as_str(), "p@ss!");
        assert_eq!(form_value::<32>(body, "muser").unwrap().as_str(), "");
        assert!(form_value::<32>(body, "mpass").is_none());
    }

    #[test]
    fn broken_escapes_are_kept_literally() {
        assert_eq!(url_decode::<16>("100%").as_str(), "100%");
        assert_eq!(url_decode::<16>("%zz").as_str(), "%zz");
        assert_eq!(url_decode::<16>("%C3%A9").as_str(), "é");
    }

    #[test]
    fn values_are_bounded() {
        assert_eq!(url_decode::<4>("abcdef").as_str(), "abcd");
        // Half of a two byte character is dropped
        assert_eq!(url_decode::<3>("ab%C3%A9").as_str(), "ab");
    }

    #[test]
    fn lenient_int_parsing() {
        assert_eq!(parse_int_lenient("1883"), 1883);
        assert_eq!(parse_int_lenient("  42abc"), 42);
        assert_eq!(parse_int_lenient("-7"), -7);
        assert_eq!(parse_int_lenient("abc"), 0);
        assert_eq!(parse_int_lenient(""), 0);
        assert_eq!(parse_int_lenient("99999"), 99_999);
        assert_eq!(parse_int_lenient("99999999999"), i32::MAX);
    }
}
