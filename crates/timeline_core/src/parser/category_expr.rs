//! Category boolean expressions such as `dsns+tech-meme`.
//!
//! Tokens are joined by `+` (include) and `-` (exclude). Each token takes the
//! operator immediately before it; the first token defaults to include.

use crate::model::command::CategoryFilter;
use crate::model::event::normalize_category;
use once_cell::sync::Lazy;
use regex::Regex;

static EXPR_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w+\-]+").expect("valid category expression regex"));

#[derive(Clone, Copy)]
enum Operator {
    Include,
    Exclude,
}

/// Parses the leading expression run of `raw` into a filter.
///
/// Never fails: text after the run is ignored and a blank input yields the
/// empty filter.
pub fn parse_category_expr(raw: &str) -> CategoryFilter {
    let mut filter = CategoryFilter::default();
    let Some(run) = EXPR_RUN_RE.find(raw.trim_start()) else {
        return filter;
    };

    let mut operator = Operator::Include;
    let mut token = String::new();
    for ch in run.as_str().chars() {
        match ch {
            '+' | '-' => {
                push_token(&mut filter, operator, &token);
                token.clear();
                operator = if ch == '+' {
                    Operator::Include
                } else {
                    Operator::Exclude
                };
            }
            _ => token.push(ch),
        }
    }
    push_token(&mut filter, operator, &token);
    filter
}

fn push_token(filter: &mut CategoryFilter, operator: Operator, token: &str) {
    let Some(tag) = normalize_category(token) else {
        return;
    };
    match operator {
        Operator::Include => filter.include.insert(tag),
        Operator::Exclude => filter.exclude.insert(tag),
    };
}

#[cfg(test)]
mod tests {
    use super::parse_category_expr;
    use crate::model::command::CategoryFilter;

    #[test]
    fn include_and_exclude_tokens_follow_their_operator() {
        let filter = parse_category_expr("dsns+tech-meme");
        assert_eq!(filter, CategoryFilter::new(["dsns", "tech"], ["meme"]));
    }

    #[test]
    fn operator_applies_per_token_left_to_right() {
        let filter = parse_category_expr("a-b+c-d");
        assert_eq!(filter, CategoryFilter::new(["a", "c"], ["b", "d"]));
    }

    #[test]
    fn leading_minus_excludes_first_token() {
        let filter = parse_category_expr("-meme");
        assert!(filter.include.is_empty());
        assert_eq!(filter.exclude.len(), 1);
    }

    #[test]
    fn tokens_are_lowercased_and_trailing_text_ignored() {
        let filter = parse_category_expr("  DSNS+Web 以降の話");
        assert_eq!(filter, CategoryFilter::new(["dsns", "web"], Vec::<String>::new()));
    }

    #[test]
    fn empty_expression_yields_empty_filter() {
        assert!(parse_category_expr("").is_empty());
        assert!(parse_category_expr("++--").is_empty());
        assert!(parse_category_expr("？").is_empty());
    }
}
