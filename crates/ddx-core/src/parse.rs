use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ENUMERATION: Regex = Regex::new(r"^\d*\.\s*").unwrap();
}

/// Split a completion into normalized suggestions, in rank order.
///
/// Each line loses its `N.` enumeration prefix and surrounding whitespace and
/// is lower-cased. Interior blank lines are kept as empty strings so that
/// positions keep counting lines.
pub fn parse_suggestions(response: &str) -> Vec<String> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed
        .split('\n')
        .map(|line| {
            let line = line.trim_start();
            ENUMERATION.replace(line, "").trim().to_lowercase()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_list() {
        assert_eq!(
            parse_suggestions("1. Pneumonia\n2. COPD\n"),
            vec!["pneumonia", "copd"]
        );
    }

    #[test]
    fn blank_lines_keep_their_rank_slot() {
        assert_eq!(
            parse_suggestions("1. Asthma\n\n3. Croup"),
            vec!["asthma", "", "croup"]
        );
    }

    #[test]
    fn unnumbered_and_crlf_lines() {
        assert_eq!(
            parse_suggestions("  Sepsis\r\n  10.   Meningitis  \r\n"),
            vec!["sepsis", "meningitis"]
        );
    }

    #[test]
    fn indentation_before_the_number_is_ignored() {
        // Leading whitespace goes first, so an indented `2.` still counts as numbering.
        assert_eq!(
            parse_suggestions("1. Asthma\n   2. Croup\n\t3.Pertussis"),
            vec!["asthma", "croup", "pertussis"]
        );
    }

    #[test]
    fn bare_period_prefix_is_stripped() {
        assert_eq!(parse_suggestions(". GERD"), vec!["gerd"]);
    }

    #[test]
    fn only_leading_enumeration_is_removed() {
        assert_eq!(
            parse_suggestions("1. Vitamin B12. deficiency"),
            vec!["vitamin b12. deficiency"]
        );
    }

    #[test]
    fn empty_completion_has_no_suggestions() {
        assert!(parse_suggestions("").is_empty());
        assert!(parse_suggestions(" \n \n").is_empty());
    }
}
