//! Response normalization.
//!
//! Maps OpenLigaDB's PascalCase payloads onto the proxy's stable
//! camelCase schema. Every lookup tries the upstream name first, then the
//! already-normalized name, then a default, so feeding normalized output
//! back in leaves it unchanged. Never fails: shapes that don't match come
//! back as `[]` or `{}`.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::types::Operation;

// ---------------------------------------------------------------------------
// Stable output shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct League {
    pub id: Value,
    pub name: Value,
    pub country: String,
    pub season: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub team1_goals: Value,
    pub team2_goals: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchSummary {
    pub id: Value,
    pub team1: String,
    pub team2: String,
    pub date: String,
    pub status: String,
    pub goals1: Value,
    pub goals2: Value,
    pub result: Option<Score>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDetail {
    pub id: Value,
    pub team1: String,
    pub team1_id: Value,
    pub team2: String,
    pub team2_id: Value,
    pub date: String,
    pub status: String,
    pub goals1: Value,
    pub goals2: Value,
    pub result: Option<Score>,
    pub location: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: Value,
    pub name: String,
    pub short_name: Value,
    pub founded_year: Value,
    pub logo: Value,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Normalize a raw upstream payload for `operation`.
pub fn normalize(operation: Operation, raw: &Value) -> Value {
    match operation {
        Operation::ListLeagues => to_json(&normalize_leagues(raw)),
        Operation::GetLeagueMatches => to_json(&normalize_matches(raw)),
        Operation::GetTeam => normalize_team(raw).map_or_else(empty_object, |t| to_json(&t)),
        // The head-to-head endpoint answers with a list; a single match
        // object gets the detailed shape.
        Operation::GetMatch => match raw {
            Value::Array(_) => to_json(&normalize_matches(raw)),
            _ => normalize_match(raw).map_or_else(empty_object, |m| to_json(&m)),
        },
    }
}

pub fn normalize_leagues(raw: &Value) -> Vec<League> {
    objects(raw)
        .map(|league| League {
            id: pick(league, "LeagueId", "id"),
            name: pick(league, "LeagueName", "name"),
            country: pick_str(league, "LeagueShortcut", "country"),
            season: pick(league, "CurrentSeason", "season"),
        })
        .collect()
}

pub fn normalize_matches(raw: &Value) -> Vec<MatchSummary> {
    objects(raw)
        .map(|m| {
            let score = final_score(m);
            MatchSummary {
                id: pick(m, "MatchID", "id"),
                team1: team_name(m, "Team1", "team1"),
                team2: team_name(m, "Team2", "team2"),
                date: pick_str(m, "MatchDateTime", "date"),
                status: status(m, score.is_some()),
                goals1: goals(m, score.as_ref(), "goals1", Score::team1),
                goals2: goals(m, score.as_ref(), "goals2", Score::team2),
                result: score,
            }
        })
        .collect()
}

pub fn normalize_team(raw: &Value) -> Option<Team> {
    let team = raw.as_object()?;
    Some(Team {
        id: pick(team, "TeamId", "id"),
        name: pick_str(team, "TeamName", "name"),
        short_name: pick(team, "ShortName", "shortName"),
        founded_year: pick(team, "FoundingYear", "foundedYear"),
        logo: pick(team, "TeamIconUrl", "logo"),
    })
}

pub fn normalize_match(raw: &Value) -> Option<MatchDetail> {
    let m = raw.as_object()?;
    let score = final_score(m);
    Some(MatchDetail {
        id: pick(m, "MatchID", "id"),
        team1: team_name(m, "Team1", "team1"),
        team1_id: team_id(m, "Team1", "team1Id"),
        team2: team_name(m, "Team2", "team2"),
        team2_id: team_id(m, "Team2", "team2Id"),
        date: pick_str(m, "MatchDateTime", "date"),
        status: status(m, score.is_some()),
        goals1: goals(m, score.as_ref(), "goals1", Score::team1),
        goals2: goals(m, score.as_ref(), "goals2", Score::team2),
        result: score,
        location: pick(m, "Location", "location"),
    })
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

type Object = Map<String, Value>;

/// Object elements of a list; anything else yields nothing.
fn objects(raw: &Value) -> impl Iterator<Item = &Object> {
    raw.as_array().into_iter().flatten().filter_map(Value::as_object)
}

/// A key is present when it exists and is not `null`.
fn present<'a>(obj: &'a Object, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

fn pick(obj: &Object, upstream: &str, normalized: &str) -> Value {
    present(obj, upstream).or_else(|| present(obj, normalized)).cloned().unwrap_or(Value::Null)
}

fn pick_str(obj: &Object, upstream: &str, normalized: &str) -> String {
    match present(obj, upstream).or_else(|| present(obj, normalized)) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// `Team1.TeamName`, falling back to `Team1.name`, then to a flat
/// `team1` string from already-normalized input.
fn team_name(m: &Object, upstream: &str, normalized: &str) -> String {
    if let Some(team) = present(m, upstream).and_then(Value::as_object) {
        return pick_str(team, "TeamName", "name");
    }
    match present(m, normalized) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(team)) => pick_str(team, "TeamName", "name"),
        _ => String::new(),
    }
}

fn team_id(m: &Object, upstream: &str, normalized: &str) -> Value {
    if let Some(team) = present(m, upstream).and_then(Value::as_object) {
        return pick(team, "TeamId", "id");
    }
    present(m, normalized).cloned().unwrap_or(Value::Null)
}

/// Final score from the last `MatchResults` entry, else a normalized
/// `result` object.
fn final_score(m: &Object) -> Option<Score> {
    if let Some(last) = present(m, "MatchResults")
        .and_then(Value::as_array)
        .and_then(|results| results.last())
    {
        let last = last.as_object();
        let points = |key: &str| last.and_then(|r| present(r, key)).cloned().unwrap_or(Value::Null);
        return Some(Score { team1_goals: points("PointsTeam1"), team2_goals: points("PointsTeam2") });
    }

    let result = present(m, "result")?.as_object()?;
    Some(Score {
        team1_goals: result.get("team1Goals").cloned().unwrap_or(Value::Null),
        team2_goals: result.get("team2Goals").cloned().unwrap_or(Value::Null),
    })
}

impl Score {
    fn team1(&self) -> &Value {
        &self.team1_goals
    }

    fn team2(&self) -> &Value {
        &self.team2_goals
    }
}

fn goals(m: &Object, score: Option<&Score>, normalized: &str, side: fn(&Score) -> &Value) -> Value {
    match score {
        Some(s) => side(s).clone(),
        None => present(m, normalized).cloned().unwrap_or(Value::Null),
    }
}

fn status(m: &Object, has_result: bool) -> String {
    match present(m, "MatchStatus").or_else(|| present(m, "status")) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None if has_result => "completed".to_string(),
        None => "scheduled".to_string(),
    }
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
