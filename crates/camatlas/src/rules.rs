//! Ordered extraction rules combined by "first match wins".
//!
//! Each rule is a named pure function over some context. Keeping the rule
//! list as data makes precedence explicit and lets each rule be tested on
//! its own.

/// A named extraction rule over context `C` producing `T`.
pub struct Rule<C: ?Sized, T> {
    pub name: &'static str,
    pub apply: fn(&C) -> Option<T>,
}

impl<C: ?Sized, T> Rule<C, T> {
    pub const fn new(name: &'static str, apply: fn(&C) -> Option<T>) -> Self {
        Self { name, apply }
    }
}

/// Run `rules` in order and return the first produced value with its rule name.
pub fn first_match<C: ?Sized, T>(rules: &[Rule<C, T>], ctx: &C) -> Option<(&'static str, T)> {
    first_accepted(rules, ctx, |_| true)
}

/// Like [`first_match`], but a produced value must also pass `accept`.
///
/// Rejected values fall through to the next rule.
pub fn first_accepted<C: ?Sized, T>(
    rules: &[Rule<C, T>],
    ctx: &C,
    mut accept: impl FnMut(&T) -> bool,
) -> Option<(&'static str, T)> {
    for rule in rules {
        match (rule.apply)(ctx) {
            Some(value) if accept(&value) => {
                tracing::trace!("rule '{}' matched", rule.name);
                return Some((rule.name, value));
            }
            Some(_) => tracing::debug!("rule '{}' produced a rejected value", rule.name),
            None => {}
        }
    }
    None
}

/// `Some(s)` when `s` has non-whitespace content, trimmed.
pub fn non_empty(s: impl AsRef<str>) -> Option<String> {
    let trimmed = s.as_ref().trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn never(_: &i32) -> Option<i32> {
        None
    }
    fn double(x: &i32) -> Option<i32> {
        Some(x * 2)
    }
    fn triple(x: &i32) -> Option<i32> {
        Some(x * 3)
    }

    const RULES: [Rule<i32, i32>; 3] = [
        Rule::new("never", never),
        Rule::new("double", double),
        Rule::new("triple", triple),
    ];

    #[test]
    fn test_first_match_respects_order() {
        assert_eq!(first_match(&RULES, &5), Some(("double", 10)));
    }

    #[test]
    fn test_rejected_value_falls_through() {
        let hit = first_accepted(&RULES, &5, |v| *v > 10);
        assert_eq!(hit, Some(("triple", 15)));
    }

    #[test]
    fn test_no_rule_matches() {
        let rules: [Rule<i32, i32>; 1] = [Rule::new("never", never)];
        assert_eq!(first_match(&rules, &1), None);
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  x "), Some("x".to_string()));
        assert_eq!(non_empty(" \n "), None);
    }
}
