//! Fixed-layout response parsers.
//!
//! Rating answers are six lines: score, four narrative sections, label.
//! Analysis answers are one line of five `|`-separated sections.

use screener_pipeline::{AnalysisSections, Label, Narrative, OracleError, OracleScore};

const RATING_LINES: usize = 6;
const ANALYSIS_PARTS: usize = 5;

/// Strip a surrounding markdown code fence, if the model added one.
fn unfence(content: &str) -> &str {
    let trimmed = content.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            // Drop an info string like ```text
            let rest = rest.split_once('\n').map_or(rest, |(_, body)| body);
            rest.trim_end().trim_end_matches("```").trim()
        }
        None => trimmed,
    }
}

fn parse_score(line: &str) -> Result<f64, OracleError> {
    let cleaned = line.trim().trim_end_matches('分').trim();
    cleaned
        .parse::<f64>()
        .map_err(|_| OracleError::Malformed(format!("score line is not a number: {line:?}")))
}

/// Parse a six-line rating answer.
///
/// Range and emptiness checks are left to the scoring stage; only the
/// layout is enforced here. An unrecognised label line yields no hint.
pub fn parse_rating(content: &str) -> Result<OracleScore, OracleError> {
    let lines: Vec<&str> = unfence(content).splitn(RATING_LINES, '\n').collect();
    if lines.len() != RATING_LINES {
        return Err(OracleError::Malformed(format!(
            "expected {RATING_LINES} lines, got {}",
            lines.len()
        )));
    }

    let score = parse_score(lines[0])?;
    let label_hint = lines[5].trim().parse::<Label>().ok();
    Ok(OracleScore {
        score,
        label_hint,
        narrative: Narrative {
            technical: lines[1].trim().to_string(),
            fundamental: lines[2].trim().to_string(),
            trade_advice: lines[3].trim().to_string(),
            risk_warning: lines[4].trim().to_string(),
        },
    })
}

/// Parse a `technical|fundamental|sentiment|advice|risk` answer.
pub fn parse_analysis(content: &str) -> Result<AnalysisSections, OracleError> {
    let parts: Vec<&str> = unfence(content).split('|').map(str::trim).collect();
    if parts.len() != ANALYSIS_PARTS {
        return Err(OracleError::Malformed(format!(
            "expected {ANALYSIS_PARTS} sections, got {}",
            parts.len()
        )));
    }
    Ok(AnalysisSections {
        technical: parts[0].to_string(),
        fundamental: parts[1].to_string(),
        sentiment: parts[2].to_string(),
        trade_advice: parts[3].to_string(),
        risk_warning: parts[4].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_six_lines() {
        let out = parse_rating("78\ntrend up\nfair value\nbuy 10%\nchoppy\n买入").unwrap();
        assert_eq!(out.score, 78.0);
        assert_eq!(out.label_hint, Some(Label::Buy));
        assert_eq!(out.narrative.technical, "trend up");
        assert_eq!(out.narrative.risk_warning, "choppy");
    }

    #[test]
    fn rating_score_with_unit_suffix() {
        let out = parse_rating("  66.5分 \na\nb\nc\nd\nhold").unwrap();
        assert_eq!(out.score, 66.5);
        assert_eq!(out.label_hint, Some(Label::Hold));
    }

    #[test]
    fn rating_extra_lines_stay_in_label_line() {
        // splitn keeps the remainder in the last field, so the hint is unreadable
        let out = parse_rating("50\na\nb\nc\nd\nsell\nextra").unwrap();
        assert_eq!(out.label_hint, None);
    }

    #[test]
    fn rating_too_few_lines() {
        let err = parse_rating("80\nonly two").unwrap_err();
        assert_eq!(err, OracleError::Malformed("expected 6 lines, got 2".into()));
        assert!(!err.is_retryable());
    }

    #[test]
    fn rating_bad_score() {
        assert!(matches!(
            parse_rating("high\na\nb\nc\nd\nbuy"),
            Err(OracleError::Malformed(_))
        ));
    }

    #[test]
    fn rating_in_code_fence() {
        let out = parse_rating("```text\n90\na\nb\nc\nd\nbuy\n```").unwrap();
        assert_eq!(out.score, 90.0);
        assert_eq!(out.label_hint, Some(Label::Buy));
    }

    #[test]
    fn analysis_five_parts() {
        let out = parse_analysis("tech | fund |news| advice |risk").unwrap();
        assert_eq!(out.technical, "tech");
        assert_eq!(out.sentiment, "news");
        assert_eq!(out.risk_warning, "risk");
    }

    #[test]
    fn analysis_wrong_part_count() {
        let err = parse_analysis("a|b|c").unwrap_err();
        assert_eq!(err, OracleError::Malformed("expected 5 sections, got 3".into()));
    }

    #[test]
    fn analysis_keeps_empty_sections_for_caller() {
        let out = parse_analysis("a||c|d|e").unwrap();
        assert_eq!(out.first_empty(), Some("fundamental"));
    }
}
