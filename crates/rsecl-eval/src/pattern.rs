//! Pattern and regexp compilation, and matching against literal sets.
//!
//! Patterns are glob-like: `*` matches any run of characters, everything else
//! is literal. They translate to anchored regexes. Regexps are compiled as
//! written. All matching uses the `regex` crate, which runs in linear time.

use std::collections::HashSet;

use regex::{Regex, RegexBuilder};
use thiserror::Error;

use crate::evaluator::{FieldValue, IN_ARRAY_WEIGHT, IN_PATTERN_ARRAY_WEIGHT, ValueType};

/// Upper bound on the compiled size of a single pattern or regexp.
const REGEX_SIZE_LIMIT: usize = 1 << 21;

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid pattern `{0}`: at least one letter, digit or `.` is required")]
    FullWildcard(String),

    #[error("invalid {value_type} `{value}`: {source}")]
    Regex {
        value_type: ValueType,
        value: String,
        #[source]
        source: regex::Error,
    },
}

/// Translate a glob-like pattern to an anchored regex string.
pub fn pattern_to_regex(pattern: &str, case_insensitive: bool) -> String {
    let mut re = String::with_capacity(pattern.len() + 8);
    if case_insensitive {
        re.push_str("(?i)");
    }
    re.push('^');
    for (i, part) in pattern.split('*').enumerate() {
        if i > 0 {
            re.push_str(".*");
        }
        re.push_str(&regex::escape(part));
    }
    re.push('$');
    re
}

/// Compile a glob-like pattern.
///
/// Patterns made only of wildcards and punctuation would match nearly
/// anything and are rejected.
pub fn compile_pattern(pattern: &str, case_insensitive: bool) -> Result<Regex, PatternError> {
    if !pattern
        .chars()
        .any(|c| c.is_ascii_alphanumeric() || c == '.')
    {
        return Err(PatternError::FullWildcard(pattern.to_string()));
    }
    build(
        &pattern_to_regex(pattern, case_insensitive),
        pattern,
        ValueType::Pattern,
    )
}

/// Compile a regexp literal.
pub fn compile_regexp(regexp: &str, case_insensitive: bool) -> Result<Regex, PatternError> {
    if case_insensitive {
        build(&format!("(?i){regexp}"), regexp, ValueType::Regexp)
    } else {
        build(regexp, regexp, ValueType::Regexp)
    }
}

/// Matcher for `value` interpreted as `value_type`; `None` for scalars.
pub fn compile(
    value: &str,
    value_type: ValueType,
    case_insensitive: bool,
) -> Result<Option<Regex>, PatternError> {
    match value_type {
        ValueType::Scalar => Ok(None),
        ValueType::Pattern => compile_pattern(value, case_insensitive).map(Some),
        ValueType::Regexp => compile_regexp(value, case_insensitive).map(Some),
    }
}

fn build(re: &str, value: &str, value_type: ValueType) -> Result<Regex, PatternError> {
    RegexBuilder::new(re)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|source| PatternError::Regex {
            value_type,
            value: value.to_string(),
            source,
        })
}

// =============================================================================
// StringMatcherSet
// =============================================================================

/// Literal members of a string array, split into exact values and matchers.
///
/// Membership is a hash lookup followed by each matcher in turn.
#[derive(Debug, Clone, Default)]
pub struct StringMatcherSet {
    scalars: HashSet<String>,
    matchers: Vec<Regex>,
}

impl StringMatcherSet {
    pub fn from_field_values(values: &[FieldValue]) -> Self {
        let mut set = StringMatcherSet::default();
        for fv in values {
            match &fv.matcher {
                Some(re) => set.matchers.push(re.clone()),
                None => {
                    set.scalars.insert(fv.value.clone());
                }
            }
        }
        set
    }

    pub fn from_values<S: AsRef<str>>(values: &[S]) -> Self {
        StringMatcherSet {
            scalars: values.iter().map(|v| v.as_ref().to_string()).collect(),
            matchers: Vec::new(),
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.scalars.contains(value) || self.matchers.iter().any(|re| re.is_match(value))
    }

    pub fn has_matchers(&self) -> bool {
        !self.matchers.is_empty()
    }

    /// Cost of a membership test against this set.
    pub fn weight(&self) -> i64 {
        if self.has_matchers() {
            IN_PATTERN_ARRAY_WEIGHT
        } else {
            IN_ARRAY_WEIGHT
        }
    }
}
