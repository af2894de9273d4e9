//! Label values for the method and status code dimensions.
//!
//! Common values resolve to static strings without allocating. Anything
//! outside the tables still gets a deterministic label, so cardinality is
//! only bounded for well-behaved clients.

use std::borrow::Cow;

const METHODS: [&str; 8] = [
    "get", "put", "head", "post", "delete", "connect", "options", "notify",
];

/// Lowercased method label.
pub fn sanitize_method(method: &str) -> Cow<'static, str> {
    METHODS
        .iter()
        .find(|known| method.eq_ignore_ascii_case(known))
        .map(|known| Cow::Borrowed(*known))
        .unwrap_or_else(|| Cow::Owned(method.to_lowercase()))
}

/// Decimal status code label.
pub fn sanitize_code(code: u16) -> Cow<'static, str> {
    let label = match code {
        100 => "100",
        101 => "101",

        200 => "200",
        201 => "201",
        202 => "202",
        203 => "203",
        204 => "204",
        205 => "205",
        206 => "206",

        300 => "300",
        301 => "301",
        302 => "302",
        304 => "304",
        305 => "305",
        307 => "307",

        400 => "400",
        401 => "401",
        402 => "402",
        403 => "403",
        404 => "404",
        405 => "405",
        406 => "406",
        407 => "407",
        408 => "408",
        409 => "409",
        410 => "410",
        411 => "411",
        412 => "412",
        413 => "413",
        414 => "414",
        415 => "415",
        416 => "416",
        417 => "417",
        418 => "418",
        428 => "428",
        429 => "429",
        431 => "431",

        500 => "500",
        501 => "501",
        502 => "502",
        503 => "503",
        504 => "504",
        505 => "505",
        511 => "511",

        other => return Cow::Owned(other.to_string()),
    };
    Cow::Borrowed(label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_methods_any_case() {
        for (raw, expected) in [
            ("GET", "get"),
            ("get", "get"),
            ("Get", "get"),
            ("PUT", "put"),
            ("HEAD", "head"),
            ("POST", "post"),
            ("DELETE", "delete"),
            ("CONNECT", "connect"),
            ("OPTIONS", "options"),
            ("NOTIFY", "notify"),
        ] {
            let label = sanitize_method(raw);
            assert_eq!(label, expected);
            assert!(matches!(label, Cow::Borrowed(_)), "{raw} should not allocate");
        }
    }

    #[test]
    fn test_unknown_method_lowercased() {
        assert_eq!(sanitize_method("PATCH"), "patch");
        assert_eq!(sanitize_method("PROPFIND"), "propfind");
        assert_eq!(sanitize_method(""), "");
    }

    #[test]
    fn test_enumerated_codes() {
        let table: Vec<u16> = (100..=101)
            .chain(200..=206)
            .chain([300, 301, 302, 304, 305, 307])
            .chain(400..=418)
            .chain([428, 429, 431])
            .chain(500..=505)
            .chain([511])
            .collect();
        assert_eq!(table.len(), 44);

        for code in table {
            let label = sanitize_code(code);
            assert_eq!(label, code.to_string());
            assert!(matches!(label, Cow::Borrowed(_)), "{code} should be static");
        }
    }

    #[test]
    fn test_codes_outside_table() {
        for code in [0u16, 102, 226, 303, 308, 422, 451, 599, 999] {
            let label = sanitize_code(code);
            assert_eq!(label, code.to_string());
            assert!(matches!(label, Cow::Owned(_)));
        }
    }
}
