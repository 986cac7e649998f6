use regex::Regex;
use std::sync::LazyLock;

use crate::models::batch::{BranchInfo, CohortInfo};

const SAMPLE_SIZE: usize = 5;

// 0901CD231014: college code, branch, year, serial
static INSTITUTIONAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})([A-Z]{2})(\d{2})(\d{3,})$").expect("institutional roll regex")
});

// BTCS24O1138: degree, branch, year, optional section letter, serial
static DEGREE_CODED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z]{2})([A-Z]{2})(\d{2})([A-Z]?)(\d{3,})$").expect("degree-coded roll regex")
});

/// Roll formats in match order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollPattern {
    Institutional,
    DegreeCoded,
}

impl RollPattern {
    pub const ORDERED: [RollPattern; 2] = [RollPattern::Institutional, RollPattern::DegreeCoded];

    fn regex(self) -> &'static Regex {
        match self {
            RollPattern::Institutional => &INSTITUTIONAL,
            RollPattern::DegreeCoded => &DEGREE_CODED,
        }
    }

    fn parse(self, roll: &str) -> Option<CohortInfo> {
        let caps = self.regex().captures(roll)?;
        let (degree, branch, year) = match self {
            RollPattern::Institutional => ("B.Tech".to_string(), &caps[2], &caps[3]),
            RollPattern::DegreeCoded => (degree_name(&caps[1]), &caps[2], &caps[3]),
        };
        let yy: u16 = year.parse().ok()?;
        Some(CohortInfo {
            degree,
            branch: branch.to_string(),
            branch_name: branch_name(branch).to_string(),
            joining_year: 2000 + yy,
        })
    }
}

pub fn degree_name(code: &str) -> String {
    match code {
        "BT" => "B.Tech".to_string(),
        "MT" => "M.Tech".to_string(),
        other => other.to_string(),
    }
}

pub fn branch_name(code: &str) -> &str {
    match code {
        "CS" => "Computer Science & Engineering",
        "CD" => "Computer Science & Design",
        "IT" => "Information Technology",
        "ET" => "Electronics & Telecommunication",
        "EC" => "Electronics & Communication",
        "EE" => "Electrical Engineering",
        "ME" => "Mechanical Engineering",
        "CE" => "Civil Engineering",
        other => other,
    }
}

/// Parses one roll with the first matching pattern.
pub fn parse_roll(roll: &str) -> Option<CohortInfo> {
    let roll = roll.trim();
    RollPattern::ORDERED.iter().find_map(|p| p.parse(roll))
}

/// Majority vote over the first five rolls. Ties go to the branch seen first.
pub fn detect<'a, I>(rolls: I) -> BranchInfo
where
    I: IntoIterator<Item = &'a str>,
{
    let parsed: Vec<CohortInfo> =
        rolls.into_iter().take(SAMPLE_SIZE).filter_map(parse_roll).collect();

    // (branch, votes, first match) in first-seen order
    let mut tally: Vec<(&str, usize, &CohortInfo)> = Vec::new();
    for info in &parsed {
        match tally.iter_mut().find(|(b, _, _)| *b == info.branch) {
            Some(entry) => entry.1 += 1,
            None => tally.push((info.branch.as_str(), 1, info)),
        }
    }

    let mut winner: Option<(usize, &CohortInfo)> = None;
    for (_, votes, info) in tally {
        if winner.map_or(true, |(best, _)| votes > best) {
            winner = Some((votes, info));
        }
    }

    match winner {
        Some((_, info)) => BranchInfo::Known(info.clone()),
        None => BranchInfo::unavailable(),
    }
}
