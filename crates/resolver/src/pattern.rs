//! Compact alphanumeric lot codes ("b2", "ab12").

use std::sync::LazyLock;

use regex::Regex;

static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z]{1,2})([0-9]{1,3})$").expect("code regex"));

/// A lot code: letters plus a number. "b02" and "b2" are the same code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Code {
    pub letters: String,
    pub number: u32,
}

impl core::fmt::Display for Code {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}{}", self.letters, self.number)
    }
}

/// Extract a code from an already normalized string that is exactly one code.
pub fn extract_code(normalized: &str) -> Option<Code> {
    let caps = CODE_RE.captures(normalized)?;
    let number = caps[2].parse().ok()?;
    Some(Code {
        letters: caps[1].to_string(),
        number,
    })
}

/// Codes appearing as standalone tokens of a longer normalized name.
pub fn codes_in(normalized: &str) -> impl Iterator<Item = Code> + '_ {
    normalized
        .split(|c: char| !c.is_alphanumeric())
        .filter_map(extract_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_whole_string_codes_only() {
        assert_eq!(extract_code("b2").map(|c| c.to_string()), Some("b2".to_string()));
        assert_eq!(extract_code("ab123").map(|c| c.number), Some(123));
        assert_eq!(extract_code("abc1"), None);
        assert_eq!(extract_code("b1234"), None);
        assert_eq!(extract_code("b2 norte"), None);
        assert_eq!(extract_code(""), None);
    }

    #[test]
    fn leading_zeros_do_not_change_the_code() {
        assert_eq!(extract_code("b02"), extract_code("b2"));
    }

    #[test]
    fn finds_codes_inside_names() {
        let codes: Vec<String> = codes_in("b2 norte c-14").map(|c| c.to_string()).collect();
        assert_eq!(codes, vec!["b2"]);

        let codes: Vec<String> = codes_in("modulo a3 c14").map(|c| c.to_string()).collect();
        assert_eq!(codes, vec!["a3", "c14"]);
    }
}
