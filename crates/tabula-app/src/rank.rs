// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Fuzzy ranking for the all-columns filter. A value is ranked against the
//! query in tiers, from exact case-sensitive equality down to a fuzzy
//! match scored by `nucleo-matcher`. Anything at or above
//! [`Ranking::Matches`] passes.

use nucleo_matcher::pattern::{AtomKind, CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Config, Matcher, Utf32Str};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Ranking {
    NoMatch,
    Matches,
    Acronym,
    Contains,
    WordStartsWith,
    StartsWith,
    Equal,
    CaseSensitiveEqual,
}

impl Ranking {
    pub const fn tier(self) -> u8 {
        match self {
            Self::NoMatch => 0,
            Self::Matches => 1,
            Self::Acronym => 2,
            Self::Contains => 3,
            Self::WordStartsWith => 4,
            Self::StartsWith => 5,
            Self::Equal => 6,
            Self::CaseSensitiveEqual => 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemRank {
    pub ranking: Ranking,
    /// Tier plus, for fuzzy matches, a fraction of the matcher score.
    pub score: f64,
    pub passed: bool,
}

impl ItemRank {
    pub const NO_MATCH: Self = Self {
        ranking: Ranking::NoMatch,
        score: 0.0,
        passed: false,
    };

    fn tiered(ranking: Ranking) -> Self {
        Self {
            ranking,
            score: f64::from(ranking.tier()),
            passed: ranking >= Ranking::Matches,
        }
    }
}

/// Ranks many values against one query, reusing the matcher's buffers.
pub struct Ranker {
    query: String,
    lowered: String,
    query_len: usize,
    pattern: Pattern,
    matcher: Matcher,
    buf: Vec<char>,
}

impl Ranker {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_owned(),
            lowered: query.to_lowercase(),
            query_len: query.chars().count(),
            pattern: Pattern::new(
                query,
                CaseMatching::Ignore,
                Normalization::Never,
                AtomKind::Fuzzy,
            ),
            matcher: Matcher::new(Config::DEFAULT),
            buf: Vec::new(),
        }
    }

    pub fn rank(&mut self, value: &str) -> ItemRank {
        if self.query_len > value.chars().count() {
            return ItemRank::NO_MATCH;
        }
        if value == self.query {
            return ItemRank::tiered(Ranking::CaseSensitiveEqual);
        }

        let value = value.to_lowercase();
        let query = self.lowered.as_str();
        if value == query {
            return ItemRank::tiered(Ranking::Equal);
        }
        if value.starts_with(query) {
            return ItemRank::tiered(Ranking::StartsWith);
        }
        if value.contains(&format!(" {query}")) {
            return ItemRank::tiered(Ranking::WordStartsWith);
        }
        if value.contains(query) {
            return ItemRank::tiered(Ranking::Contains);
        }
        if self.query_len == 1 {
            return ItemRank::NO_MATCH;
        }
        if acronym(&value).contains(query) {
            return ItemRank::tiered(Ranking::Acronym);
        }

        let haystack = Utf32Str::new(&value, &mut self.buf);
        match self.pattern.score(haystack, &mut self.matcher) {
            Some(score) => {
                let score = f64::from(score);
                ItemRank {
                    ranking: Ranking::Matches,
                    score: f64::from(Ranking::Matches.tier()) + score / (score + 100.0),
                    passed: true,
                }
            }
            None => ItemRank::NO_MATCH,
        }
    }

    /// Best rank of any value in the row.
    pub fn rank_row<I, S>(&mut self, values: I) -> ItemRank
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        values
            .into_iter()
            .map(|value| self.rank(value.as_ref()))
            .fold(ItemRank::NO_MATCH, |best, rank| {
                if rank.score > best.score { rank } else { best }
            })
    }
}

pub fn rank_item(value: &str, query: &str) -> ItemRank {
    Ranker::new(query).rank(value)
}

pub fn rank_row<I, S>(values: I, query: &str) -> ItemRank
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Ranker::new(query).rank_row(values)
}

fn acronym(value: &str) -> String {
    value
        .split(' ')
        .flat_map(|word| word.split('-'))
        .filter_map(|part| part.chars().next())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{Ranker, Ranking, rank_item, rank_row};

    fn ranking(value: &str, query: &str) -> Ranking {
        rank_item(value, query).ranking
    }

    #[test]
    fn tiers_follow_match_quality() {
        assert_eq!(ranking("Helium", "Helium"), Ranking::CaseSensitiveEqual);
        assert_eq!(ranking("Helium", "helium"), Ranking::Equal);
        assert_eq!(ranking("Helium", "hel"), Ranking::StartsWith);
        assert_eq!(ranking("Leanne Graham", "gra"), Ranking::WordStartsWith);
        assert_eq!(ranking("Hydrogen", "dro"), Ranking::Contains);
        assert_eq!(ranking("Clementine Bauch", "cb"), Ranking::Acronym);
        assert_eq!(ranking("Lithium", "lhm"), Ranking::Matches);
        assert_eq!(ranking("Lithium", "xyz"), Ranking::NoMatch);
    }

    #[test]
    fn longer_queries_never_match() {
        assert!(!rank_item("He", "Helium").passed);
    }

    #[test]
    fn single_character_needs_a_substring() {
        assert!(rank_item("Boron", "r").passed);
        assert!(!rank_item("Boron", "z").passed);
    }

    #[test]
    fn empty_query_passes_everything() {
        assert!(rank_item("Neon", "").passed);
        assert!(rank_item("", "").passed);
    }

    #[test]
    fn tight_matches_outscore_loose_ones() {
        let tight = rank_item("abcdef", "ace");
        let loose = rank_item("axxxxcxxxxe", "ace");
        assert!(tight.passed && loose.passed);
        assert!(tight.score > loose.score);
    }

    #[test]
    fn row_rank_takes_the_best_column() {
        let rank = rank_row(["1", "Helium", "He"], "he");
        assert_eq!(rank.ranking, Ranking::Equal);
        assert!(!rank_row(["1", "Helium", "He"], "zz").passed);
    }

    #[test]
    fn one_ranker_serves_many_rows() {
        let mut ranker = Ranker::new("lhm");
        assert_eq!(ranker.rank("Lithium").ranking, Ranking::Matches);
        assert!(!ranker.rank("Helium").passed);
        assert_eq!(ranker.rank_row(["3", "Lithium", "Li"]).ranking, Ranking::Matches);
    }
}
