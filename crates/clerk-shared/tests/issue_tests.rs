//! Issue map extraction: every entity must be found in the source text.

use clerk_shared::issue::{source_text, IssueMap};
use clerk_shared::plan::{build_retrieval_plan, decode_plan};
use clerk_shared::config::PlannerConfig;
use clerk_shared::situation::SituationContext;

const QUESTIONS: &[(&str, &str)] = &[
    ("Did the Select Board approve the Constitution Park boardwalk contract?", ""),
    (
        "Was the Planning Board allowed to meet in nonpublic session about the Mill Pond variance?",
        "Minutes of the Planning Board, Town of Hollis, March 14, 2023.",
    ),
    ("what happened with \"the solar array lease\" last month", ""),
    ("Under RSA 32:5 can the Budget Committee cut a warrant article?", ""),
];

fn assert_entities_in_source(issue: &IssueMap, source: &str) {
    let lower = source.to_lowercase();
    for entity in &issue.entities {
        assert!(
            lower.contains(&entity.to_lowercase()),
            "entity {:?} not in source {:?}",
            entity,
            source
        );
    }
}

#[test]
fn heuristic_entities_are_substrings_of_source() {
    for (question, artifact) in QUESTIONS {
        let issue = IssueMap::heuristic(question, artifact, None, None);
        assert_entities_in_source(&issue, &source_text(question, artifact, None));
    }
}

#[test]
fn oracle_entities_outside_source_are_dropped() {
    let anchor = SituationContext::new("Constitution Park boardwalk vote", vec!["Select Board".into()]);
    let raw = r#"{
        "situation_title": "Boardwalk follow-up",
        "entities": ["Select Board", "Constitution Park", "Riverside Mall", "Governor Smith"],
        "state_queries": ["RSA 41:8"]
    }"#;
    let plan = decode_plan(raw).unwrap();
    let question = "What did they decide next?";
    let validated = plan.to_issue(question, "", Some(&anchor), None);

    assert_eq!(validated.issue.entities, vec!["Select Board", "Constitution Park"]);
    assert_eq!(validated.dropped_entities, vec!["Riverside Mall", "Governor Smith"]);
    assert_entities_in_source(&validated.issue, &source_text(question, "", Some(&anchor)));
}

#[test]
fn heuristic_plan_covers_both_lanes() {
    let (question, artifact) = QUESTIONS[1];
    let issue = IssueMap::heuristic(question, artifact, None, None);
    let plan = build_retrieval_plan(question, &issue, None, &PlannerConfig::default());

    assert!(!plan.local.queries.is_empty());
    assert!(!plan.state.queries.is_empty());
    // heuristic confidence is below the conservative threshold
    assert!(plan.conservative);
    assert!(plan.local.queries.len() <= 2);
    assert!(plan.state.queries.len() <= 2);
    assert_eq!(issue.town.as_deref(), Some("Hollis"));
}
