//! Presentation normalization for oracle output and user-submitted fields.
//!
//! Everything here is pure. Scores and meaning are never touched; only case,
//! whitespace and spelling variants are.

/// Trim and lower-case an email address. Used as the OTP key and before storing profiles.
pub fn normalize_email(email: &str) -> String {
  email.trim().to_lowercase()
}

/// Upper-case the first character, leave the rest as-is.
pub fn capitalize_first(s: &str) -> String {
  let s = s.trim();
  let mut chars = s.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

/// Option text: first letter upper, rest lower ("LONDON" -> "London").
pub fn capitalize_option(s: &str) -> String {
  capitalize_first(&s.trim().to_lowercase())
}

pub fn capitalize_options(options: &[String]) -> Vec<String> {
  options.iter().map(|o| capitalize_option(o)).collect()
}

/// Advice steps keep their inner casing (acronyms, names); only the first letter is raised.
pub fn capitalize_steps(steps: &[String]) -> Vec<String> {
  steps
    .iter()
    .map(|s| capitalize_first(s))
    .filter(|s| !s.is_empty())
    .collect()
}

/// "ana  maría LÓPEZ" -> "Ana María López". Hyphenated parts are cased separately.
pub fn title_case_name(name: &str) -> String {
  name
    .split_whitespace()
    .map(|word| {
      word
        .split('-')
        .map(|part| capitalize_first(&part.to_lowercase()))
        .collect::<Vec<_>>()
        .join("-")
    })
    .collect::<Vec<_>>()
    .join(" ")
}

/// Loose equality used when checking listening/reading answer sheets.
///
/// Case, surrounding punctuation, repeated whitespace, British/American spelling
/// and digit/word numerals (0-20) are all ignored.
pub fn answers_equivalent(given: &str, expected: &str) -> bool {
  let a = canonical_tokens(given);
  let b = canonical_tokens(expected);
  !a.is_empty() && a == b
}

fn canonical_tokens(s: &str) -> Vec<String> {
  s.split_whitespace()
    .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
    .filter(|w| !w.is_empty())
    .map(|w| canonical_word(&w))
    .collect()
}

const NUMBER_WORDS: [&str; 21] = [
  "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
  "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen",
  "nineteen", "twenty",
];

const SPELLING_PAIRS: &[(&str, &str)] = &[
  ("favourite", "favorite"),
  ("favourites", "favorites"),
  ("grey", "gray"),
  ("programme", "program"),
  ("programmes", "programs"),
  ("tyre", "tire"),
  ("tyres", "tires"),
  ("aluminium", "aluminum"),
  ("pyjamas", "pajamas"),
  ("plough", "plow"),
  ("mum", "mom"),
  ("jewellery", "jewelry"),
  ("travelled", "traveled"),
  ("travelling", "traveling"),
  ("traveller", "traveler"),
  ("travellers", "travelers"),
  ("cancelled", "canceled"),
  ("cancelling", "canceling"),
  ("labelled", "labeled"),
  ("modelled", "modeled"),
  ("counselling", "counseling"),
  ("enrol", "enroll"),
];

fn canonical_word(w: &str) -> String {
  if let Some(n) = NUMBER_WORDS.iter().position(|n| *n == w) {
    return n.to_string();
  }
  if let Some((_, us)) = SPELLING_PAIRS.iter().find(|(uk, _)| *uk == w) {
    return us.to_string();
  }
  american_suffix(w)
}

/// Suffix rules, guarded by length so short words like "hour" or "acre" stay put.
fn american_suffix(w: &str) -> String {
  let len = w.chars().count();
  let rules: &[(&str, &str, usize)] = &[
    ("isation", "ization", 8),
    ("ising", "izing", 7),
    ("ised", "ized", 6),
    ("ise", "ize", 6),
    ("yse", "yze", 6),
    ("ours", "ors", 7),
    ("our", "or", 6),
    ("tres", "ters", 6),
    ("tre", "ter", 5),
    ("bre", "ber", 5),
    ("ogue", "og", 7),
    ("ence", "ense", 7),
  ];
  for (uk, us, min_len) in rules {
    if len >= *min_len && w.ends_with(uk) {
      return format!("{}{}", &w[..w.len() - uk.len()], us);
    }
  }
  w.to_string()
}
