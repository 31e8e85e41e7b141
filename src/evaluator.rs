//! Answer comparison. Whitespace and case are ignored; everything else must match exactly.

/// Strip every whitespace character and lowercase the rest.
pub fn normalize(s: &str) -> String {
  s.chars().filter(|c| !c.is_whitespace()).flat_map(char::to_lowercase).collect()
}

/// No numeric parsing: "1/2" and "0.5" are different answers.
pub fn is_correct(guess: &str, canonical: &str) -> bool {
  normalize(guess) == normalize(canonical)
}
