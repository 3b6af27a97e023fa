use fancy_regex::Regex;
use once_cell::sync::Lazy;

/// Added to the previous number when a chapter has none of its own.
pub const SYNTHETIC_STEP: f64 = 0.00001;

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+\.?\d?\b").unwrap());

/// Every number printed in a chapter name, in order.
pub fn numbers_in(name: &str) -> Vec<f64> {
    NUMBER
        .find_iter(name)
        .filter_map(|m| m.ok())
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .collect()
}

/// The chapter number of a name, `None` when it has no number. With two or
/// more numbers the second is used, the first being the volume.
pub fn parse_chapter_number(name: &str) -> Option<f64> {
    let numbers = numbers_in(name);
    match numbers.as_slice() {
        [] => None,
        [only] => Some(*only),
        [_, second, ..] => Some(*second),
    }
}

/// Numbers a stream of chapters walked oldest first. A chapter whose number
/// is missing or lower than the previous one gets the previous number plus
/// [`SYNTHETIC_STEP`], so numbers never decrease along the stream.
#[derive(Debug, Default)]
pub struct ChapterNumberer {
    last: f64,
}

impl ChapterNumberer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, name: &str) -> f64 {
        let number = match parse_chapter_number(name) {
            Some(number) if number >= self.last => number,
            _ => self.last + SYNTHETIC_STEP,
        };
        self.last = number;
        number
    }
}
