//! Text utilities shared by ingestion, filtering, reranking and prompt building

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

/// Inclusive bounds for standalone years picked out of free text
pub const MIN_YEAR: i32 = 2000;
pub const MAX_YEAR: i32 = 2100;

/// Longest span an explicit `YYYY-YYYY` range may expand to
const MAX_RANGE_SPAN: i32 = 100;

fn year_range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"([0-9]{4})\s*(?:-|–|—|~|～|至|到)\s*([0-9]{4})")
            .expect("static year range pattern is valid")
    })
}

fn digit_run_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+").expect("static digit pattern is valid"))
}

fn ascii_word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[A-Za-z0-9]+").expect("static word pattern is valid"))
}

/// Explicit year ranges (`2025-2027`, `2025 至 2027`) found in text
///
/// Both years must stand alone: a match touching another digit on either
/// side is skipped and the scan resumes one character later.
pub fn extract_year_ranges(text: &str) -> Vec<(i32, i32)> {
    let mut ranges = Vec::new();
    let mut pos = 0;

    while let Some(caps) = year_range_pattern().captures_at(text, pos) {
        let Some(whole) = caps.get(0) else {
            break;
        };
        let digit_before = text[..whole.start()]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_digit());
        let digit_after = text[whole.end()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit());

        if digit_before || digit_after {
            pos = whole.start() + 1;
            continue;
        }

        if let (Ok(start), Ok(end)) = (caps[1].parse::<i32>(), caps[2].parse::<i32>()) {
            if start <= end && end - start <= MAX_RANGE_SPAN {
                ranges.push((start, end));
            }
        }
        pos = whole.end();
    }

    ranges
}

/// Standalone four-digit years in `[MIN_YEAR, MAX_YEAR]`
pub fn extract_standalone_years(text: &str) -> Vec<i32> {
    let mut years = Vec::new();
    for m in digit_run_pattern().find_iter(text) {
        if m.as_str().len() != 4 {
            continue;
        }
        if let Ok(year) = m.as_str().parse::<i32>() {
            if (MIN_YEAR..=MAX_YEAR).contains(&year) && !years.contains(&year) {
                years.push(year);
            }
        }
    }
    years
}

/// Years a question refers to: every year of its explicit ranges, or its
/// standalone years when it has no range.
pub fn extract_query_years(text: &str) -> Vec<i32> {
    let ranges = extract_year_ranges(text);
    if ranges.is_empty() {
        return extract_standalone_years(text);
    }

    let mut years = Vec::new();
    for (start, end) in ranges {
        for year in start..=end {
            if !years.contains(&year) {
                years.push(year);
            }
        }
    }
    years
}

/// Uppercase acronym-like tokens (`CBTC`, `ETCS2`), deduplicated in order
pub fn extract_acronyms(text: &str) -> Vec<String> {
    let mut acronyms: Vec<String> = Vec::new();
    for m in ascii_word_pattern().find_iter(text) {
        let token = m.as_str();
        let starts_upper = token.chars().next().is_some_and(|c| c.is_ascii_uppercase());
        let no_lowercase = !token.chars().any(|c| c.is_ascii_lowercase());
        let upper_count = token.chars().filter(char::is_ascii_uppercase).count();
        if starts_upper && no_lowercase && upper_count >= 2 && !acronyms.iter().any(|a| a == token) {
            acronyms.push(token.to_string());
        }
    }
    acronyms
}

/// Lower-cased whitespace tokens
pub fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Lower-cased ASCII words, with every other alphanumeric char (CJK) as its own token
pub fn tokenize(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut word = String::new();
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            word.push(c.to_ascii_lowercase());
            continue;
        }
        if !word.is_empty() {
            out.push(std::mem::take(&mut word));
        }
        if c.is_alphanumeric() {
            out.push(c.to_string());
        }
    }
    if !word.is_empty() {
        out.push(word);
    }
    out
}

/// First `max_chars` characters of `s`
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Truncate to `max_chars` characters, appending "..." when shortened
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        format!("{}...", truncate_chars(s, max_chars))
    } else {
        s.to_string()
    }
}

/// Clean extracted page text.
///
/// Control characters are removed, runs of spaces and tabs collapse to one
/// space, lines are trimmed and runs of blank lines collapse to one, so
/// heading lines survive for section detection.
pub fn clean_text(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut blank_run = 0;

    for raw_line in text.lines() {
        let line: String = raw_line
            .chars()
            .filter(|c| !c.is_control() || *c == '\t')
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        if line.is_empty() {
            blank_run += 1;
            if blank_run == 1 && !lines.is_empty() {
                lines.push(String::new());
            }
        } else {
            blank_run = 0;
            lines.push(line);
        }
    }

    while lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_years_from_range() {
        assert_eq!(
            extract_query_years("Single programming document 2025-2027 targets"),
            vec![2025, 2026, 2027]
        );
        assert_eq!(extract_query_years("规划文件 2025 至 2026 年"), vec![2025, 2026]);
    }

    #[test]
    fn test_query_years_standalone() {
        assert_eq!(extract_query_years("What changed in 2024 vs 1998?"), vec![2024]);
        assert_eq!(extract_query_years("2019 and 2024 reports"), vec![2019, 2024]);
        assert_eq!(extract_query_years("到2025年底"), vec![2025]);
        assert!(extract_query_years("order 12345 item 1999").is_empty());
    }

    #[test]
    fn test_reversed_range_is_ignored() {
        assert!(extract_year_ranges("2027-2025").is_empty());
    }

    #[test]
    fn test_adjacent_ranges_are_both_found() {
        assert_eq!(
            extract_year_ranges("2020-2021,2022-2023"),
            vec![(2020, 2021), (2022, 2023)]
        );
        assert_eq!(extract_year_ranges("2020-2021 2022-2023").len(), 2);
    }

    #[test]
    fn test_range_touching_other_digits_is_skipped() {
        assert!(extract_year_ranges("12025-2027").is_empty());
        assert!(extract_year_ranges("2025-20271").is_empty());
        assert_eq!(extract_year_ranges("123-2025-2027"), vec![(2025, 2027)]);
    }

    #[test]
    fn test_acronyms() {
        assert_eq!(
            extract_acronyms("CBTC系统 and ERTMS/ETCS2 in the EU, not Rail or B002"),
            vec!["CBTC", "ERTMS", "ETCS2", "EU"]
        );
    }

    #[test]
    fn test_truncate_chars_is_char_safe() {
        assert_eq!(truncate_chars("列车控制系统", 2), "列车");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_str("abcdef", 3), "abc...");
        assert_eq!(truncate_str("abc", 3), "abc");
    }

    #[test]
    fn test_clean_text_keeps_line_structure() {
        let raw = "  Title\t\tline \u{0}\n\n\n\n1.1   Scope\nbody  text  \n\n";
        assert_eq!(clean_text(raw), "Title line\n\n1.1 Scope\nbody text");
    }

    #[test]
    fn test_tokenize_splits_cjk_chars() {
        assert_eq!(tokenize("列车ETCS2系统"), vec!["列", "车", "etcs2", "系", "统"]);
        assert_eq!(tokenize("Budget, 2025!"), vec!["budget", "2025"]);
    }

    #[test]
    fn test_word_set_lowercases() {
        let words = word_set("Annual Report REPORT");
        assert_eq!(words.len(), 2);
        assert!(words.contains("report"));
    }
}
