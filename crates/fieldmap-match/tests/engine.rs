mod common;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use fieldmap_match::{EngineConfig, MappingEngine, MappingError, ProviderError};
use fieldmap_model::{MappingRequest, MatchMethod, RequestError, TierDegradation};
use fieldmap_schema::SchemaStore;
use serde::Serialize;

use common::{BrokenEmbedder, ConceptEmbedder, candidate_store};

fn semantic_engine(embedder: Arc<ConceptEmbedder>) -> MappingEngine {
    MappingEngine::builder(candidate_store())
        .embedding_provider(embedder)
        .build()
        .expect("build engine")
}

fn scenario() -> MappingRequest {
    MappingRequest::new("candidate", ["PersonID", "WorkEmails", "XYZ_123"])
}

#[derive(Serialize)]
struct Decision<'a> {
    source: &'a str,
    field: Option<&'a str>,
    method: Option<MatchMethod>,
    needs_review: bool,
}

#[test]
fn alias_semantic_and_unmatched_columns() {
    let embedder = ConceptEmbedder::new();
    let engine = semantic_engine(Arc::clone(&embedder));
    let run = engine.map(&scenario()).expect("map");

    let person = run.result_for("PersonID").expect("PersonID result");
    let accepted = person.accepted.as_ref().expect("PersonID accepted");
    assert_eq!(accepted.target_field, "CANDIDATE_ID");
    assert_eq!(accepted.method, MatchMethod::Alias);
    assert!(accepted.confidence >= 0.95);
    assert!(!person.needs_review);

    let work = run.result_for("WorkEmails").expect("WorkEmails result");
    let accepted = work.accepted.as_ref().expect("WorkEmails accepted");
    assert_eq!(accepted.target_field, "EMAIL");
    assert_eq!(accepted.method, MatchMethod::Semantic);
    assert!(accepted.confidence >= 0.55 && accepted.confidence < 0.95);
    assert!(!work.needs_review);

    let unknown = run.result_for("XYZ_123").expect("XYZ_123 result");
    assert!(unknown.accepted.is_none());
    assert!(unknown.alternatives.is_empty());
    assert!(unknown.needs_review);

    assert_eq!(run.stats.above_threshold, 2);
    assert_eq!(run.stats.unmatched, 1);
    assert_eq!(run.stats.needs_review, 1);
    assert!(run.stats.degraded.is_empty());
    assert_eq!(run.stats.external_call_count, 0);

    // One call for the five target fields, one for the two unresolved columns.
    let batches = embedder.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].len(), 5);
    assert_eq!(batches[1], vec!["work emails".to_string(), "xyz 123".to_string()]);

    let decisions: Vec<Decision<'_>> = run
        .results
        .iter()
        .map(|r| Decision {
            source: &r.source_name,
            field: r.accepted_field(),
            method: r.accepted_method(),
            needs_review: r.needs_review,
        })
        .collect();
    insta::assert_json_snapshot!(decisions, @r#"
    [
      {
        "source": "PersonID",
        "field": "CANDIDATE_ID",
        "method": "alias",
        "needs_review": false
      },
      {
        "source": "WorkEmails",
        "field": "EMAIL",
        "method": "semantic",
        "needs_review": false
      },
      {
        "source": "XYZ_123",
        "field": null,
        "method": null,
        "needs_review": true
      }
    ]
    "#);
}

#[test]
fn exact_matches_never_reach_the_embedder() {
    let embedder = ConceptEmbedder::new();
    let engine = semantic_engine(Arc::clone(&embedder));
    let run = engine
        .map(&MappingRequest::new(
            "candidate",
            ["email", "Person-ID", "candidate_id", "EMAIL"],
        ))
        .expect("map");

    assert_eq!(embedder.batch_count(), 0);
    let methods: Vec<_> = run.results.iter().map(|r| r.accepted_method()).collect();
    assert_eq!(
        methods,
        vec![
            Some(MatchMethod::Exact),
            Some(MatchMethod::Alias),
            Some(MatchMethod::Exact),
            Some(MatchMethod::Exact),
        ]
    );
    assert_eq!(run.results[0].accepted.as_ref().map(|c| c.confidence), Some(1.0));
    // Two columns may land on the same field.
    assert_eq!(run.results[0].accepted_field(), run.results[3].accepted_field());
}

#[test]
fn fuzzy_tier_resolves_typos_without_an_embedder() {
    let engine = MappingEngine::builder(candidate_store())
        .build()
        .expect("build engine");
    let run = engine
        .map(&MappingRequest::new("candidate", ["Frist Name"]))
        .expect("map");
    let result = &run.results[0];
    assert_eq!(result.accepted_field(), Some("FIRST_NAME"));
    assert_eq!(result.accepted_method(), Some(MatchMethod::Fuzzy));
    assert!(!result.needs_review);
    assert!(run.stats.degraded.is_empty());
}

#[test]
fn target_vectors_are_computed_once_per_schema_version() {
    let embedder = ConceptEmbedder::new();
    let engine = semantic_engine(Arc::clone(&embedder));
    engine.map(&scenario()).expect("first run");
    engine.map(&scenario()).expect("second run");

    // Targets once, sources once per run.
    let batches = embedder.batches();
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[2].len(), 2);
    assert_eq!(engine.target_cache().len(), 1);
}

#[test]
fn source_vectors_can_be_kept_across_runs() {
    let embedder = ConceptEmbedder::new();
    let config = EngineConfig {
        cache_source_vectors: true,
        ..EngineConfig::default()
    };
    let engine = MappingEngine::builder(candidate_store())
        .config(config)
        .embedding_provider(embedder.clone())
        .build()
        .expect("build engine");
    engine.map(&scenario()).expect("first run");
    engine.map(&scenario()).expect("second run");
    assert_eq!(embedder.batch_count(), 2);
}

#[test]
fn sample_values_feed_the_source_text() {
    let embedder = ConceptEmbedder::new();
    let engine = semantic_engine(Arc::clone(&embedder));
    let request = MappingRequest::new("candidate", ["WorkEmails"])
        .with_samples("WorkEmails", [" a@x.io ", "", "a@x.io", "b@x.io"]);
    engine.map(&request).expect("map");
    assert_eq!(
        embedder.batches()[1],
        vec!["work emails | a@x.io, b@x.io".to_string()]
    );
}

#[test]
fn embedding_failure_degrades_to_fuzzy() {
    let engine = MappingEngine::builder(candidate_store())
        .embedding_provider(Arc::new(BrokenEmbedder {
            error: ProviderError::Unavailable("connection refused".to_string()),
            delay: Duration::ZERO,
        }))
        .build()
        .expect("build engine");
    let run = engine.map(&scenario()).expect("map");

    assert_eq!(
        run.stats.degraded,
        vec![TierDegradation {
            tier: MatchMethod::Semantic,
            reason: "unavailable".to_string(),
            affected_columns: 2,
        }]
    );
    let person = run.result_for("PersonID").expect("PersonID result");
    assert_eq!(person.accepted_method(), Some(MatchMethod::Alias));

    let work = run.result_for("WorkEmails").expect("WorkEmails result");
    assert_eq!(work.accepted_field(), Some("EMAIL"));
    assert_eq!(work.accepted_method(), Some(MatchMethod::Fuzzy));
    assert!(work.needs_review);
}

#[test]
fn slow_embedder_times_out() {
    let config = EngineConfig {
        embedding_timeout_ms: 25,
        ..EngineConfig::default()
    };
    let engine = MappingEngine::builder(candidate_store())
        .config(config)
        .embedding_provider(Arc::new(BrokenEmbedder {
            error: ProviderError::Unavailable("late".to_string()),
            delay: Duration::from_millis(500),
        }))
        .build()
        .expect("build engine");
    let run = engine.map(&scenario()).expect("map");
    assert!(run.stats.is_degraded(MatchMethod::Semantic));
    assert_eq!(run.stats.degraded[0].reason, "timeout");
    assert_eq!(run.results.len(), 3);
}

const SCHEMA_V1: &str = r#"
[[fields]]
name = "CANDIDATE_ID"
data_type = "string"

[[fields]]
name = "EMAIL"
data_type = "email"
"#;

const SCHEMA_V2: &str = r#"
[[fields]]
name = "CANDIDATE_ID"
data_type = "string"

[[fields]]
name = "EMAIL"
data_type = "email"
description = "Primary email address"
"#;

#[test]
fn schema_change_recomputes_target_vectors() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("candidate.schema.toml");
    fs::write(&path, SCHEMA_V1).expect("write schema");

    let store = Arc::new(SchemaStore::load_dir(dir.path()).expect("load store"));
    let embedder = ConceptEmbedder::new();
    let engine = MappingEngine::builder(store)
        .embedding_provider(embedder.clone())
        .build()
        .expect("build engine");

    let request = MappingRequest::new("candidate", ["WorkEmails"]);
    let first = engine.map(&request).expect("first run");
    assert_eq!(embedder.batch_count(), 2);
    assert!(!engine.refresh_schemas().expect("refresh"));

    fs::write(&path, SCHEMA_V2).expect("rewrite schema");
    assert!(engine.refresh_schemas().expect("refresh"));

    let second = engine.map(&request).expect("second run");
    assert_ne!(first.schema_version, second.schema_version);
    let batches = embedder.batches();
    assert_eq!(batches.len(), 4);
    assert_eq!(batches[2].len(), 2);
    assert!(batches[2][1].contains("Primary email address"));
    assert_eq!(engine.target_cache().len(), 1);
}

#[test]
fn request_threshold_overrides_config() {
    let engine = semantic_engine(ConceptEmbedder::new());
    let run = engine
        .map(&scenario().with_threshold(0.96))
        .expect("map");
    assert_eq!(run.auto_accept_threshold, 0.96);
    let person = run.result_for("PersonID").expect("PersonID result");
    assert_eq!(person.accepted_field(), Some("CANDIDATE_ID"));
    assert!(person.needs_review);
}

#[test]
fn invalid_requests_are_rejected() {
    let engine = semantic_engine(ConceptEmbedder::new());

    let err = engine
        .map(&MappingRequest::new("vendor", ["email"]))
        .unwrap_err();
    assert_eq!(err, MappingError::SchemaNotFound { id: "vendor".to_string() });

    let err = engine
        .map(&MappingRequest::new("candidate", Vec::<String>::new()))
        .unwrap_err();
    assert_eq!(err, MappingError::InvalidRequest(RequestError::NoColumns));

    let err = engine
        .map(&scenario().with_threshold(1.5))
        .unwrap_err();
    assert!(matches!(
        err,
        MappingError::InvalidRequest(RequestError::InvalidThreshold(_))
    ));
}

#[test]
fn repeated_runs_give_identical_results() {
    let engine = semantic_engine(ConceptEmbedder::new());
    let request = scenario().with_samples("WorkEmails", ["jane@corp.example"]);
    let first = engine.map(&request).expect("first run");
    engine.clear_caches();
    let second = engine.map(&request).expect("second run");
    let third = engine.map(&request).expect("third run");
    assert_eq!(first.results, second.results);
    assert_eq!(second.results, third.results);
    assert_eq!(first.stats, second.stats);
}

#[test]
fn invalid_config_fails_build() {
    let config = EngineConfig {
        auto_accept_threshold: 1.2,
        ..EngineConfig::default()
    };
    assert!(
        MappingEngine::builder(candidate_store())
            .config(config)
            .build()
            .is_err()
    );
}
