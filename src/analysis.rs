//! Wire types of the analysis engine's line-delimited JSON protocol.
//!
//! One request object per line goes to the engine's stdin; the engine answers
//! with one or more response lines carrying the same `id`. Intermediate
//! responses have `isDuringSearch: true`; the last one for an id has it false.

use serde::{Deserialize, Serialize};

use crate::board::{Color, Move};
use crate::constants::{ENGINE_RULES, N};

/// A single analysis query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub id: String,
    pub rules: String,
    pub komi: f64,
    pub board_x_size: u32,
    pub board_y_size: u32,
    /// Full game record as `[color, vertex]` pairs, e.g. `["B", "D4"]`
    pub moves: Vec<(Color, String)>,
    pub max_visits: u32,
    pub include_ownership: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_during_search_every: Option<f64>,
}

impl AnalysisRequest {
    pub fn new(id: impl Into<String>, komi: f64, moves: &[Move], max_visits: u32) -> Self {
        Self {
            id: id.into(),
            rules: ENGINE_RULES.to_string(),
            komi,
            board_x_size: N as u32,
            board_y_size: N as u32,
            moves: moves
                .iter()
                .map(|m| (m.color, m.vertex.to_string()))
                .collect(),
            max_visits: max_visits.max(1),
            include_ownership: true,
            report_during_search_every: None,
        }
    }

    /// Ask for progress reports every `seconds` (streaming mode).
    pub fn streaming(mut self, seconds: f64) -> Self {
        self.report_during_search_every = Some(seconds);
        self
    }

    /// Serialize as one protocol line, newline-terminated.
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// One ranked candidate move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(rename = "move")]
    pub mv: String,
    pub winrate: f64,
    #[serde(default)]
    pub score_lead: f64,
    #[serde(default)]
    pub visits: u32,
}

/// Statistics of the analyzed position itself.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootInfo {
    pub winrate: f64,
    #[serde(default)]
    pub score_mean: f64,
    #[serde(default)]
    pub score_lead: Option<f64>,
}

fn still_searching() -> bool {
    true
}

/// A response line. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub id: String,
    /// A line without the flag counts as intermediate
    #[serde(default = "still_searching")]
    pub is_during_search: bool,
    #[serde(default)]
    pub move_infos: Vec<Candidate>,
    #[serde(default)]
    pub root_info: Option<RootInfo>,
    /// Row-major, top row first; positive favors Black
    #[serde(default)]
    pub ownership: Option<Vec<f64>>,
    /// Set when the engine rejected the query
    #[serde(default)]
    pub error: Option<String>,
}

impl AnalysisResponse {
    /// Parse one stdout line.
    pub fn from_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }

    pub fn is_final(&self) -> bool {
        !self.is_during_search
    }

    /// The first `n` ranked candidates.
    pub fn top(&self, n: usize) -> &[Candidate] {
        &self.move_infos[..n.min(self.move_infos.len())]
    }

    pub fn best(&self) -> Option<&Candidate> {
        self.move_infos.first()
    }

    /// Win rate and score for the side to move: the root if reported,
    /// otherwise the best candidate.
    pub fn evaluation(&self) -> Option<(f64, f64)> {
        if let Some(root) = &self.root_info {
            return Some((root.winrate, root.score_lead.unwrap_or(root.score_mean)));
        }
        self.best().map(|c| (c.winrate, c.score_lead))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Point, Vertex};

    #[test]
    fn test_request_wire_format() {
        let moves = [
            Move::new(Color::Black, Vertex::Play(Point::parse("D4").unwrap())),
            Move::new(Color::White, Vertex::Pass),
        ];
        let req = AnalysisRequest::new("move_2", 7.5, &moves, 50);
        let value: serde_json::Value = serde_json::from_str(&req.to_line().unwrap()).unwrap();

        assert_eq!(value["id"], "move_2");
        assert_eq!(value["rules"], "Chinese");
        assert_eq!(value["komi"], 7.5);
        assert_eq!(value["boardXSize"], 19);
        assert_eq!(value["boardYSize"], 19);
        assert_eq!(value["moves"], serde_json::json!([["B", "D4"], ["W", "pass"]]));
        assert_eq!(value["maxVisits"], 50);
        assert_eq!(value["includeOwnership"], true);
        assert!(value.get("reportDuringSearchEvery").is_none());
    }

    #[test]
    fn test_request_is_one_line() {
        let req = AnalysisRequest::new("x", 6.5, &[], 10).streaming(0.5);
        let line = req.to_line().unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
        assert!(line.contains("\"reportDuringSearchEvery\":0.5"));
    }

    #[test]
    fn test_parse_final_response() {
        let line = r#"{"id":"move_0","isDuringSearch":false,"turnNumber":0,
            "moveInfos":[{"move":"Q16","winrate":0.47,"scoreLead":-0.4,"visits":30,"order":0},
                         {"move":"D4","winrate":0.46,"scoreLead":-0.6,"visits":12,"order":1}],
            "rootInfo":{"winrate":0.47,"scoreMean":-0.5,"scoreLead":-0.4,"visits":50}}"#;
        let resp = AnalysisResponse::from_line(line).unwrap();
        assert!(resp.is_final());
        assert_eq!(resp.best().unwrap().mv, "Q16");
        assert_eq!(resp.top(1).len(), 1);
        assert_eq!(resp.top(10).len(), 2);
        assert_eq!(resp.evaluation(), Some((0.47, -0.4)));
        assert!(resp.ownership.is_none());
    }

    #[test]
    fn test_missing_flag_means_searching() {
        let resp = AnalysisResponse::from_line(r#"{"id":"a"}"#).unwrap();
        assert!(!resp.is_final());
        assert!(resp.move_infos.is_empty());
        assert_eq!(resp.evaluation(), None);
    }

    #[test]
    fn test_error_response() {
        let resp =
            AnalysisResponse::from_line(r#"{"id":"a","error":"Illegal move 3: D4"}"#).unwrap();
        assert_eq!(resp.error.as_deref(), Some("Illegal move 3: D4"));
    }

    #[test]
    fn test_malformed_lines_fail_to_parse() {
        assert!(AnalysisResponse::from_line("KataGo v1.14 starting").is_err());
        assert!(AnalysisResponse::from_line(r#"{"isDuringSearch":false}"#).is_err());
    }
}
