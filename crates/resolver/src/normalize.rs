//! Text normalization for lot and category matching.
//!
//! Pipeline, in order:
//! 1. accent folding, lowercase, punctuation to spaces, whitespace collapsing
//! 2. spelled numbers `cero`..`veinte` to digits (whole words)
//! 3. gluing short letter codes to adjacent digit runs ("b - 2" -> "b2"),
//!    except where the number is an age or part of a range
//! 4. stripping one leading prefix ("potrero", "lote", "el", ...)
//!
//! `normalize` is total: an empty result simply never matches anything.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

const NUMBER_WORDS: [(&str, &str); 21] = [
    ("cero", "0"),
    ("uno", "1"),
    ("dos", "2"),
    ("tres", "3"),
    ("cuatro", "4"),
    ("cinco", "5"),
    ("seis", "6"),
    ("siete", "7"),
    ("ocho", "8"),
    ("nueve", "9"),
    ("diez", "10"),
    ("once", "11"),
    ("doce", "12"),
    ("trece", "13"),
    ("catorce", "14"),
    ("quince", "15"),
    ("dieciseis", "16"),
    ("diecisiete", "17"),
    ("dieciocho", "18"),
    ("diecinueve", "19"),
    ("veinte", "20"),
];

const PREFIXES: [&str; 8] = ["potrero", "paddock", "campo", "lote", "los", "las", "el", "la"];

/// Prefixes are only stripped from inputs longer than this ("el1" stays intact).
const PREFIX_GUARD_CHARS: usize = 4;

static NUMBER_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = NUMBER_WORDS
        .iter()
        .map(|(word, _)| *word)
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(?:{alternation})\b")).expect("number word regex")
});

static WHOLE_LETTER_DIGIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z]{1,2})[\s_-]+([0-9]{1,3})$").expect("code regex"));

static WHOLE_DIGIT_LETTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{1,3})[\s_-]+([a-z]{1,2})$").expect("code regex"));

static LETTER_DIGIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([a-z]{1,2})[\s_-]+([0-9]+)").expect("glue regex"));

static DIGIT_LETTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9])[\s_-]+([a-z]{1,2})\b").expect("glue regex"));

/// What may follow a number that is a quantity, not a lot code:
/// an age unit ("a 2 anos") or the rest of a range ("de 1 a 2").
static QUANTITY_TAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\s_-]*(?:(?:anos?|mes(?:es)?|dias?|dientes?)\b|(?:a|y|o)[\s_-]+[0-9])")
        .expect("quantity tail regex")
});

static LEADING_DIGIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\s_-]*[0-9]").expect("leading digit regex"));

/// Canonicalize a free-text phrase for matching.
pub fn normalize(input: &str) -> String {
    let folded = fold(input);
    if folded.is_empty() {
        return folded;
    }

    let numbered = NUMBER_WORD_RE.replace_all(&folded, |caps: &Captures| {
        number_for(&caps[0]).map_or_else(|| caps[0].to_string(), str::to_string)
    });
    let glued = glue_codes(&numbered);

    if input.trim().chars().count() > PREFIX_GUARD_CHARS {
        if let Some(rest) = strip_prefix(&glued) {
            return rest.to_string();
        }
    }
    glued
}

/// Step 1 only: accents, case, punctuation and whitespace.
///
/// Keeps `-`, `_`, `+` and `/` since they carry meaning in codes ("b-2"),
/// age ranges ("+3 anos") and gendered labels ("terneros/as").
pub fn fold(input: &str) -> String {
    let lowered = input
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();

    let cleaned: String = lowered
        .chars()
        .map(|c| match c {
            '\u{2010}'..='\u{2015}' | '\u{2212}' => '-',
            c if c.is_alphanumeric() || matches!(c, '-' | '_' | '+' | '/') => c,
            _ => ' ',
        })
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn number_for(word: &str) -> Option<&'static str> {
    NUMBER_WORDS
        .iter()
        .find(|(w, _)| *w == word)
        .map(|(_, digits)| *digits)
}

fn glue_codes(s: &str) -> String {
    // A phrase that is nothing but a code is always glued ("a 2" -> "a2").
    if let Some(caps) = WHOLE_LETTER_DIGIT_RE.captures(s) {
        return format!("{}{}", &caps[1], &caps[2]);
    }
    if let Some(caps) = WHOLE_DIGIT_LETTER_RE.captures(s) {
        return format!("{}{}", &caps[1], &caps[2]);
    }

    let letter_digit = LETTER_DIGIT_RE.replace_all(s, |caps: &Captures| {
        if QUANTITY_TAIL_RE.is_match(tail(s, caps)) {
            caps[0].to_string()
        } else {
            format!("{}{}", &caps[1], &caps[2])
        }
    });
    // "1 a 2": the letter joins two numbers and stays apart.
    DIGIT_LETTER_RE
        .replace_all(&letter_digit, |caps: &Captures| {
            if LEADING_DIGIT_RE.is_match(tail(&letter_digit, caps)) {
                caps[0].to_string()
            } else {
                format!("{}{}", &caps[1], &caps[2])
            }
        })
        .into_owned()
}

fn tail<'h>(haystack: &'h str, caps: &Captures<'_>) -> &'h str {
    caps.get(0).map_or("", |m| &haystack[m.end()..])
}

/// Strip one leading prefix word, followed by a space or directly by a digit.
fn strip_prefix(s: &str) -> Option<&str> {
    PREFIXES.iter().find_map(|prefix| {
        let rest = s.strip_prefix(prefix)?;
        let rest = if let Some(after_space) = rest.strip_prefix(' ') {
            after_space
        } else if rest.starts_with(|c: char| c.is_ascii_digit()) {
            rest
        } else {
            return None;
        };
        let rest = rest.trim();
        (!rest.is_empty()).then_some(rest)
    })
}
