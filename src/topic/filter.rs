use std::{fmt, str::FromStr};

use super::codec::SEPARATOR;

/// Одноуровневый wildcard: совпадает ровно с одним уровнем.
pub const SINGLE_LEVEL_WILDCARD: &str = "+";
/// Многоуровневый wildcard: допустим только последним токеном.
pub const MULTI_LEVEL_WILDCARD: &str = "#";

/// Разбивает топик на уровни.
#[inline]
pub fn tokenize(topic: &str) -> Vec<&str> {
    topic.split(SEPARATOR).collect()
}

/// Разобранный фильтр топиков.
///
/// Хранит токены без завершающего `#` и флаг `multi_levels`, который
/// разрешает любое число (в том числе ноль) дополнительных уровней.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicFilter {
    tokens: Vec<String>,
    multi_levels: bool,
}

impl TopicFilter {
    /// Разбирает строку фильтра. Любая строка — корректный фильтр: `#` не в
    /// последней позиции сравнивается как обычный литерал.
    pub fn parse(filter: &str) -> Self {
        let mut tokens: Vec<String> = filter.split(SEPARATOR).map(str::to_string).collect();
        let multi_levels = tokens.last().map(String::as_str) == Some(MULTI_LEVEL_WILDCARD);
        if multi_levels {
            tokens.pop();
        }
        Self {
            tokens,
            multi_levels,
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_multi_level(&self) -> bool {
        self.multi_levels
    }

    /// Есть ли в фильтре хоть один wildcard.
    pub fn has_wildcards(&self) -> bool {
        self.multi_levels || self.tokens.iter().any(|t| t == SINGLE_LEVEL_WILDCARD)
    }

    /// Сопоставляет фильтр с топиком.
    pub fn matches(
        &self,
        topic: &str,
    ) -> bool {
        self.matches_tokens(&tokenize(topic))
    }

    /// Сопоставляет фильтр с уже разбитым на уровни топиком.
    pub fn matches_tokens<S: AsRef<str>>(
        &self,
        topic: &[S],
    ) -> bool {
        if self.tokens.len() > topic.len() {
            return false;
        }
        let levels_match = self
            .tokens
            .iter()
            .zip(topic)
            .all(|(f, t)| f == SINGLE_LEVEL_WILDCARD || f == t.as_ref());
        if !levels_match {
            return false;
        }
        self.tokens.len() == topic.len() || self.multi_levels
    }
}

impl FromStr for TopicFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for TopicFilter {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let sep = SEPARATOR.to_string();
        let body = self.tokens.join(&sep);
        match (self.multi_levels, self.tokens.is_empty()) {
            (true, true) => write!(f, "{MULTI_LEVEL_WILDCARD}"),
            (true, false) => write!(f, "{body}{SEPARATOR}{MULTI_LEVEL_WILDCARD}"),
            (false, _) => write!(f, "{body}"),
        }
    }
}
