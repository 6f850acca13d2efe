mod common;

use std::sync::Arc;
use std::time::Duration;

use fieldmap_match::fuzzy::FuzzyMatcher;
use fieldmap_match::{
    Credential, CredentialPool, CredentialState, EngineConfig, MappingEngine, ProviderError,
    ReasoningCache, ReasoningConfig, ReasoningProvider, ReasoningSuggestion, SchemaSummary,
};
use fieldmap_model::{
    CandidateMatch, MappingRequest, MappingResult, MatchMethod, NormalizedName, TierDegradation,
};

use common::{FixedClock, ScriptedReasoner, candidate_store};

fn pool(credentials: Vec<Credential>) -> (Arc<CredentialPool>, Arc<FixedClock>) {
    let clock = FixedClock::new();
    let pool = Arc::new(CredentialPool::with_clock(credentials, clock.clone()));
    (pool, clock)
}

fn engine(reasoner: Arc<ScriptedReasoner>, pool: Arc<CredentialPool>) -> MappingEngine {
    engine_with(reasoner, pool, EngineConfig::default())
}

fn engine_with(
    reasoner: Arc<ScriptedReasoner>,
    pool: Arc<CredentialPool>,
    config: EngineConfig,
) -> MappingEngine {
    MappingEngine::builder(candidate_store())
        .config(config)
        .reasoning_provider(reasoner, pool)
        .build()
        .expect("build engine")
}

fn contact_table() -> Arc<ScriptedReasoner> {
    ScriptedReasoner::table(&[("Contact", "EMAIL", 0.9), ("Tel", "PHONE", 0.88)])
}

#[test]
fn partial_response_leaves_missing_column_for_review() {
    let reasoner = contact_table();
    let (pool, _) = pool(vec![Credential::new("primary", "k1", 100, 3)]);
    let engine = engine(reasoner.clone(), pool);

    let run = engine
        .map(&MappingRequest::new("candidate", ["Contact", "Tel", "Notes"]))
        .expect("map");

    assert_eq!(reasoner.call_count(), 1);
    assert_eq!(reasoner.calls()[0].1, vec!["Contact", "Tel", "Notes"]);

    let contact = run.result_for("Contact").expect("Contact result");
    let accepted = contact.accepted.as_ref().expect("Contact accepted");
    assert_eq!(accepted.target_field, "EMAIL");
    assert_eq!(accepted.method, MatchMethod::Reasoning);
    assert_eq!(accepted.rationale.as_deref(), Some("Contact looks like EMAIL"));
    assert!(!contact.needs_review);

    let tel = run.result_for("Tel").expect("Tel result");
    assert_eq!(tel.accepted_field(), Some("PHONE"));

    let notes = run.result_for("Notes").expect("Notes result");
    assert!(notes.needs_review);
    assert_ne!(notes.accepted_method(), Some(MatchMethod::Reasoning));

    assert_eq!(run.stats.reasoning_columns, 3);
    assert_eq!(run.stats.external_call_count, 1);
    assert_eq!(run.stats.credential_usage.get("primary"), Some(&1));
    assert!(run.stats.degraded.is_empty());
}

#[test]
fn resolved_columns_are_not_sent_for_reasoning() {
    let reasoner = contact_table();
    let (pool, _) = pool(vec![Credential::new("primary", "k1", 100, 3)]);
    let engine = engine(reasoner.clone(), pool);

    let run = engine
        .map(&MappingRequest::new("candidate", ["PersonID", "email", "Contact"]))
        .expect("map");
    assert_eq!(reasoner.calls()[0].1, vec!["Contact"]);
    assert_eq!(run.stats.reasoning_columns, 1);
}

#[test]
fn cached_answers_skip_the_provider() {
    let reasoner = contact_table();
    let (pool, _) = pool(vec![Credential::new("primary", "k1", 100, 3)]);
    let cache = Arc::new(ReasoningCache::new());
    let engine = MappingEngine::builder(candidate_store())
        .reasoning_provider(reasoner.clone(), pool)
        .reasoning_cache(Arc::clone(&cache))
        .build()
        .expect("build engine");
    let request = MappingRequest::new("candidate", ["Contact", "Tel"]);

    let first = engine.map(&request).expect("first run");
    assert_eq!(first.stats.external_call_count, 1);
    assert_eq!(cache.len(), 2);

    // Same key under another spelling.
    let second = engine
        .map(&MappingRequest::new("candidate", ["Contact", "TEL"]))
        .expect("second run");
    assert_eq!(reasoner.call_count(), 1);
    assert_eq!(second.stats.external_call_count, 0);
    assert_eq!(second.stats.reasoning_cache_hits, 2);
    assert_eq!(second.results[1].accepted_field(), Some("PHONE"));
    assert_eq!(first.results[0], second.results[0]);
}

#[test]
fn credential_at_quota_is_skipped() {
    let reasoner = contact_table();
    let (pool, _) = pool(vec![
        Credential::new("a", "ka", 1, 3),
        Credential::new("b", "kb", 100, 3),
    ]);
    pool.acquire().expect("use up credential a");
    let engine = engine(reasoner.clone(), Arc::clone(&pool));

    let run = engine
        .map(&MappingRequest::new("candidate", ["Contact"]))
        .expect("map");

    assert_eq!(reasoner.calls()[0].0, "b");
    assert_eq!(run.stats.credential_usage.get("a"), None);
    assert_eq!(run.stats.credential_usage.get("b"), Some(&1));
    let snapshot = pool.snapshot();
    assert_eq!(snapshot[0].used_today, 1);
    assert_eq!(snapshot[0].state, CredentialState::Standby);
    assert_eq!(snapshot[1].used_today, 1);
}

#[test]
fn quota_error_retries_on_next_credential() {
    let table = contact_table();
    let reasoner = ScriptedReasoner::new(move |credential, batch| {
        if credential.id == "a" {
            return Err(ProviderError::QuotaExceeded("daily limit".to_string()));
        }
        let summary = SchemaSummary {
            schema_id: "candidate".to_string(),
            fields: Vec::new(),
        };
        table.reason(credential, batch, &summary)
    });
    let (pool, _) = pool(vec![
        Credential::new("a", "ka", 100, 3),
        Credential::new("b", "kb", 100, 3),
    ]);
    let engine = engine(reasoner.clone(), Arc::clone(&pool));

    let run = engine
        .map(&MappingRequest::new("candidate", ["Contact"]))
        .expect("map");

    let callers: Vec<String> = reasoner.calls().into_iter().map(|(id, _)| id).collect();
    assert_eq!(callers, vec!["a", "b"]);
    assert_eq!(run.results[0].accepted_method(), Some(MatchMethod::Reasoning));
    assert_eq!(run.stats.external_call_count, 2);
    assert!(run.stats.degraded.is_empty());
    assert_eq!(pool.snapshot()[0].state, CredentialState::Standby);
    assert_eq!(pool.snapshot()[1].state, CredentialState::Active);
}

#[test]
fn rejected_credentials_retry_only_once() {
    let reasoner =
        ScriptedReasoner::new(|_, _| Err(ProviderError::Unauthorized("bad key".to_string())));
    let (pool, _) = pool(vec![
        Credential::new("a", "ka", 100, 3),
        Credential::new("b", "kb", 100, 3),
        Credential::new("c", "kc", 100, 3),
    ]);
    let engine = engine(reasoner.clone(), Arc::clone(&pool));

    let run = engine
        .map(&MappingRequest::new("candidate", ["Contact"]))
        .expect("map");

    assert_eq!(reasoner.call_count(), 2);
    assert_eq!(
        run.stats.degraded,
        vec![TierDegradation {
            tier: MatchMethod::Reasoning,
            reason: "unauthorized".to_string(),
            affected_columns: 1,
        }]
    );
    assert!(run.results[0].needs_review);
    assert_eq!(pool.snapshot()[2].state, CredentialState::Active);
}

#[test]
fn outage_degrades_the_batch() {
    let reasoner = ScriptedReasoner::new(|_, _| Err(ProviderError::Unavailable("503".to_string())));
    let (pool, _) = pool(vec![Credential::new("a", "ka", 100, 3)]);
    let engine = engine(reasoner.clone(), Arc::clone(&pool));

    let run = engine
        .map(&MappingRequest::new("candidate", ["Contact", "Tel"]))
        .expect("map");

    assert_eq!(reasoner.call_count(), 1);
    assert!(run.stats.is_degraded(MatchMethod::Reasoning));
    assert_eq!(run.stats.degraded[0].reason, "unavailable");
    assert_eq!(run.stats.degraded[0].affected_columns, 2);
    assert!(run.results.iter().all(|r| r.needs_review));
    assert_eq!(pool.snapshot()[0].consecutive_failures, 1);
    assert!(!run.stats.quota_exhausted);
}

#[test]
fn slow_reasoner_times_out() {
    let reasoner = ScriptedReasoner::new(|_, _| {
        std::thread::sleep(Duration::from_millis(500));
        Ok(Vec::new())
    });
    let (pool, _) = pool(vec![Credential::new("a", "ka", 100, 3)]);
    let config = EngineConfig {
        reasoning: ReasoningConfig {
            timeout_ms: 25,
            ..ReasoningConfig::default()
        },
        ..EngineConfig::default()
    };
    let engine = engine_with(reasoner, pool, config);

    let run = engine
        .map(&MappingRequest::new("candidate", ["Contact"]))
        .expect("map");
    assert_eq!(run.stats.degraded[0].reason, "timeout");
}

#[test]
fn exhausted_pool_sets_quota_flag_until_the_day_rolls_over() {
    let reasoner = contact_table();
    let (pool, clock) = pool(vec![Credential::new("a", "ka", 1, 3)]);
    let engine = engine(reasoner.clone(), Arc::clone(&pool));
    let request = MappingRequest::new("candidate", ["Contact"]);

    let first = engine.map(&request).expect("first run");
    assert!(!first.stats.quota_exhausted);

    engine.clear_caches();
    let second = engine.map(&request).expect("second run");
    assert!(second.stats.quota_exhausted);
    assert_eq!(second.stats.external_call_count, 0);
    assert_eq!(second.stats.degraded[0].reason, "no eligible credential");
    assert_eq!(reasoner.call_count(), 1);

    clock.advance();
    let third = engine.map(&request).expect("third run");
    assert!(!third.stats.quota_exhausted);
    assert_eq!(third.results[0].accepted_method(), Some(MatchMethod::Reasoning));
    assert_eq!(reasoner.call_count(), 2);
}

#[test]
fn columns_are_batched_and_duplicates_share_an_entry() {
    let reasoner = contact_table();
    let (pool, _) = pool(vec![Credential::new("a", "ka", 100, 3)]);
    let config = EngineConfig {
        reasoning: ReasoningConfig {
            batch_size: 2,
            ..ReasoningConfig::default()
        },
        ..EngineConfig::default()
    };
    let engine = engine_with(reasoner.clone(), pool, config);

    let run = engine
        .map(&MappingRequest::new(
            "candidate",
            ["Contact", "Tel", "Notes", "contact", "Misc", "Extra"],
        ))
        .expect("map");

    let sizes: Vec<usize> = reasoner.calls().iter().map(|(_, columns)| columns.len()).collect();
    assert_eq!(sizes, vec![2, 2, 1]);
    assert_eq!(run.stats.external_call_count, 3);
    assert_eq!(run.results[3].accepted_field(), Some("EMAIL"));
    assert_eq!(run.results[3].accepted_method(), Some(MatchMethod::Reasoning));
}

#[test]
fn answers_for_unknown_fields_are_dropped() {
    let reasoner = ScriptedReasoner::new(|_, _| {
        Ok(vec![
            ReasoningSuggestion {
                column: "Contact".to_string(),
                target_field: "SALARY".to_string(),
                confidence: 0.99,
                rationale: String::new(),
            },
            ReasoningSuggestion {
                column: "Elsewhere".to_string(),
                target_field: "EMAIL".to_string(),
                confidence: 0.99,
                rationale: String::new(),
            },
            ReasoningSuggestion {
                column: "Tel".to_string(),
                target_field: "phone".to_string(),
                confidence: 1.7,
                rationale: String::new(),
            },
        ])
    });
    let (pool, _) = pool(vec![Credential::new("a", "ka", 100, 3)]);
    let engine = engine(reasoner, pool);

    let run = engine
        .map(&MappingRequest::new("candidate", ["Contact", "Tel"]))
        .expect("map");

    assert_ne!(run.results[0].accepted_method(), Some(MatchMethod::Reasoning));
    let tel = run.results[1].accepted.as_ref().expect("Tel accepted");
    assert_eq!(tel.target_field, "PHONE");
    assert_eq!(tel.confidence, 1.0);
    assert!(tel.rationale.is_none());
}

#[test]
fn disabled_reasoning_makes_no_calls() {
    let reasoner = contact_table();
    let (pool, _) = pool(vec![Credential::new("a", "ka", 100, 3)]);
    let config = EngineConfig {
        reasoning: ReasoningConfig {
            enabled: false,
            ..ReasoningConfig::default()
        },
        ..EngineConfig::default()
    };
    let engine = engine_with(reasoner.clone(), pool, config);
    let run = engine
        .map(&MappingRequest::new("candidate", ["Contact"]))
        .expect("map");
    assert_eq!(reasoner.call_count(), 0);
    assert!(run.stats.degraded.is_empty());
    assert!(engine.credential_pool().is_none());
}

/// Answers every column with the same `(field, confidence)` list.
fn guesses(entries: Vec<(&'static str, f32)>) -> Arc<ScriptedReasoner> {
    ScriptedReasoner::new(move |_, batch| {
        Ok(batch
            .iter()
            .flat_map(|item| {
                entries
                    .iter()
                    .map(move |(field, confidence)| ReasoningSuggestion {
                        column: item.column.clone(),
                        target_field: field.to_string(),
                        confidence: *confidence,
                        rationale: format!("guess {field}"),
                    })
            })
            .collect())
    })
}

fn fuzzy_candidates(column: &str, floor: f32) -> Vec<CandidateMatch> {
    let store = candidate_store();
    let schema = store.get_schema("candidate").expect("candidate schema");
    let aliases = store.get_aliases("candidate").expect("candidate aliases");
    FuzzyMatcher::new(&schema, &aliases, floor).propose(&NormalizedName::new(column))
}

fn ranked(candidates: &[CandidateMatch]) -> Vec<(&str, MatchMethod, f32)> {
    candidates
        .iter()
        .map(|c| (c.target_field.as_str(), c.method, c.confidence))
        .collect()
}

fn accepted(result: &MappingResult) -> (&str, MatchMethod, f32) {
    let accepted = result.accepted.as_ref().expect("accepted candidate");
    (accepted.target_field.as_str(), accepted.method, accepted.confidence)
}

fn strict_fuzzy(max_alternatives: usize) -> EngineConfig {
    EngineConfig {
        fuzzy_floor: 0.75,
        max_alternatives,
        ..EngineConfig::default()
    }
}

#[test]
fn weaker_reasoning_answer_keeps_fuzzy_candidate() {
    let fuzzy = fuzzy_candidates("Emial Adress", 0.75);
    assert_eq!(fuzzy.len(), 1);
    assert_eq!(fuzzy[0].target_field, "EMAIL");
    let score = fuzzy[0].confidence;
    assert!(score < 0.85, "{score}");

    let reasoner = guesses(vec![("EMAIL", score - 0.2), ("PHONE", 0.3)]);
    let (pool, _) = pool(vec![Credential::new("primary", "k1", 100, 3)]);
    let engine = engine_with(reasoner.clone(), pool, strict_fuzzy(2));

    let run = engine
        .map(&MappingRequest::new("candidate", ["Emial Adress"]))
        .expect("map");

    assert_eq!(reasoner.calls()[0].1, vec!["Emial Adress"]);
    let result = &run.results[0];
    assert_eq!(accepted(result), ("EMAIL", MatchMethod::Fuzzy, score));
    assert_eq!(ranked(&result.alternatives), vec![("PHONE", MatchMethod::Reasoning, 0.3)]);
    assert!(result.needs_review);
}

#[test]
fn equal_confidence_prefers_reasoning_then_declaration_order() {
    let fuzzy = fuzzy_candidates("Emial Adress", 0.75);
    assert_eq!(fuzzy.len(), 1);
    let score = fuzzy[0].confidence;

    let reasoner = guesses(vec![("PHONE", 0.5), ("EMAIL", score), ("LAST_NAME", 0.5)]);
    let (pool, _) = pool(vec![Credential::new("primary", "k1", 100, 3)]);
    let engine = engine_with(reasoner, pool, strict_fuzzy(2));

    let run = engine
        .map(&MappingRequest::new("candidate", ["Emial Adress"]))
        .expect("map");

    let result = &run.results[0];
    assert_eq!(accepted(result), ("EMAIL", MatchMethod::Reasoning, score));
    assert_eq!(
        result.accepted.as_ref().and_then(|c| c.rationale.as_deref()),
        Some("guess EMAIL")
    );
    assert_eq!(
        ranked(&result.alternatives),
        vec![
            ("LAST_NAME", MatchMethod::Reasoning, 0.5),
            ("PHONE", MatchMethod::Reasoning, 0.5),
        ]
    );
}

#[test]
fn alternatives_are_ranked_and_capped() {
    assert!(fuzzy_candidates("Contact", 0.75).is_empty());
    let answers = vec![
        ("LAST_NAME", 0.4),
        ("PHONE", 0.6),
        ("EMAIL", 0.7),
        ("FIRST_NAME", 0.6),
    ];
    let request = MappingRequest::new("candidate", ["Contact"]);

    let (pool_one, _) = pool(vec![Credential::new("primary", "k1", 100, 3)]);
    let capped = engine_with(guesses(answers.clone()), pool_one, strict_fuzzy(1))
        .map(&request)
        .expect("map with one alternative");
    let result = &capped.results[0];
    assert_eq!(accepted(result), ("EMAIL", MatchMethod::Reasoning, 0.7));
    assert_eq!(
        ranked(&result.alternatives),
        vec![("FIRST_NAME", MatchMethod::Reasoning, 0.6)]
    );

    let (pool_all, _) = pool(vec![Credential::new("primary", "k1", 100, 3)]);
    let full = engine_with(guesses(answers), pool_all, strict_fuzzy(5))
        .map(&request)
        .expect("map with all alternatives");
    assert_eq!(
        ranked(&full.results[0].alternatives),
        vec![
            ("FIRST_NAME", MatchMethod::Reasoning, 0.6),
            ("PHONE", MatchMethod::Reasoning, 0.6),
            ("LAST_NAME", MatchMethod::Reasoning, 0.4),
        ]
    );
}
