//! Golden tests for evidence tiering.
//!
//! These tests lock exact thresholds. Changes require explicit approval.

use clerk_shared::chunk::{Chunk, Lane};
use clerk_shared::config::TieringConfig;
use clerk_shared::issue::IssueMap;
use clerk_shared::strength::{compute_record_strength, derive_tier, Tier, TierInputs};

fn inputs(state: usize, authoritative: bool, alignment: f32, salience: f32) -> TierInputs {
    TierInputs {
        state_count: state,
        distinct_state_docs: 1,
        authoritative_state_present: authoritative,
        situation_alignment: alignment,
        legal_salience: salience,
    }
}

// === GOLDEN TESTS: Tier function ===

/// GOLDEN: state=4, authoritative, alignment 0.35 -> A
#[test]
fn golden_tier_a() {
    let (tier, promoted) = derive_tier(&inputs(4, true, 0.35, 0.0), &TieringConfig::default());
    assert_eq!(tier, Tier::A);
    assert!(!promoted);
}

/// GOLDEN: state=2, alignment 0.25 -> B
#[test]
fn golden_tier_b() {
    let (tier, _) = derive_tier(&inputs(2, false, 0.25, 0.0), &TieringConfig::default());
    assert_eq!(tier, Tier::B);
}

/// GOLDEN: state=0 -> C
#[test]
fn golden_tier_c_no_state() {
    let (tier, promoted) = derive_tier(&inputs(0, false, 0.9, 0.9), &TieringConfig::default());
    assert_eq!(tier, Tier::C);
    assert!(!promoted);
}

/// GOLDEN: would-be C with salience >= 0.6 and state >= 2 -> B
#[test]
fn golden_salient_promotion() {
    // alignment 0.1 fails the B floor
    let (tier, promoted) = derive_tier(&inputs(2, false, 0.1, 0.6), &TieringConfig::default());
    assert_eq!(tier, Tier::B);
    assert!(promoted);

    let (tier, promoted) = derive_tier(&inputs(2, false, 0.1, 0.59), &TieringConfig::default());
    assert_eq!(tier, Tier::C);
    assert!(!promoted);
}

/// GOLDEN: A needs authority or two distinct documents
#[test]
fn golden_tier_a_needs_authority_or_diversity() {
    let (tier, _) = derive_tier(&inputs(4, false, 0.5, 0.0), &TieringConfig::default());
    assert_eq!(tier, Tier::B);
}

// === Monotonicity ===

#[test]
fn more_state_evidence_never_lowers_tier() {
    let config = TieringConfig::default();
    for alignment in [0.0f32, 0.15, 0.2, 0.3, 0.6] {
        for salience in [0.0f32, 0.6] {
            for authoritative in [false, true] {
                let mut last = 0u8;
                for state in 0..10 {
                    let (tier, _) = derive_tier(&inputs(state, authoritative, alignment, salience), &config);
                    assert!(
                        tier.rank() >= last,
                        "tier dropped at state={} alignment={} salience={}",
                        state,
                        alignment,
                        salience
                    );
                    last = tier.rank();
                }
            }
        }
    }
}

#[test]
fn same_measurements_same_tier() {
    let config = TieringConfig::default();
    let a = derive_tier(&inputs(3, true, 0.22, 0.4), &config);
    let b = derive_tier(&inputs(3, true, 0.22, 0.4), &config);
    assert_eq!(a, b);
}

// === Record strength from chunks ===

#[test]
fn record_strength_from_chunks() {
    let mut chunks: Vec<Chunk> = (1..=5)
        .map(|i| Chunk::new(Lane::Local, format!("Minutes {}", i), "Select Board minutes", 0.7))
        .collect();
    chunks.push(Chunk::new(Lane::State, "RSA 91-A:3", "Nonpublic sessions", 0.9).with_document("rsa-91a"));
    chunks.push(Chunk::new(Lane::State, "RSA 91-A:4", "Minutes and records", 0.8).with_document("rsa-91a"));
    chunks.push(Chunk::new(Lane::State, "Right-to-Know memo", "Memo text", 0.7).with_document("ag-memo"));
    chunks.push(Chunk::new(Lane::State, "Right-to-Know memo 2", "Memo text", 0.6).with_document("ag-memo"));

    let issue = IssueMap {
        legal_topics: vec!["nonpublic sessions".to_string()],
        ..Default::default()
    };
    let strength = compute_record_strength(&chunks, &issue, 0.4, &TieringConfig::default());

    assert_eq!(strength.tier, Tier::A);
    assert_eq!(strength.local_count, 5);
    assert_eq!(strength.state_count, 4);
    assert_eq!(strength.distinct_state_docs, 2);
    assert!(strength.authoritative_state_present);
    assert_eq!(strength.legal_topic_coverage, 1.0);
}
