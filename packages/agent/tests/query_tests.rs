mod common;

use std::time::Duration;

use common::{blocked, empty, sample_documents, text, RecordingBackoff, ScriptedBackend};
use formagent::answer::{Confidence, ExtractedAnswer};
use formagent::llm::LlmTransport;
use formagent::query::UNPARSED_ERROR;
use formagent::{AgentConfig, Diagnostic, FormAgentError, FormStore, QueryOrchestrator};
use pretty_assertions::assert_eq;
use serde_json::json;

fn orchestrator(
    responses: Vec<formagent::Result<formagent::llm::BackendResponse>>,
    config: &AgentConfig,
) -> QueryOrchestrator<ScriptedBackend, RecordingBackoff> {
    let transport = LlmTransport::with_backoff(
        ScriptedBackend::new(responses),
        RecordingBackoff::default(),
        config,
    );
    QueryOrchestrator::with_transport(transport, config)
}

fn default_config() -> AgentConfig {
    AgentConfig::builder("test-key").build()
}

#[test]
fn test_single_answer_e2e() {
    let config = default_config();
    let o = orchestrator(
        vec![text(
            "<JSON>\n{\n  \"mode\": \"single\",\n  \"file\": \"3f2a9c1e\",\n  \"answer\": \"Alex Johnson\",\n  \"evidence\": [{\"file\": \"3f2a9c1e\", \"snippet\": \"Full Name: Alex Johnson\"}],\n  \"confidence\": \"HIGH\"\n}\n</JSON>",
        )],
        &config,
    );

    let result = o
        .answer_question(&sample_documents(), "What is the applicant's name?")
        .unwrap();

    assert!(result.success);
    let Some(ExtractedAnswer::Single(single)) = &result.result else {
        panic!("expected single answer, got {:?}", result.result);
    };
    assert_eq!(single.file.as_deref(), Some("3f2a9c1e"));
    assert_eq!(single.answer.as_deref(), Some("Alex Johnson"));
    assert_eq!(single.evidence.len(), 1);
    assert_eq!(single.confidence, Confidence::High);

    let requests = o.transport().backend().requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, config.model);
    assert_eq!(requests[0].temperature, 0.0);
    assert_eq!(requests[0].max_output_tokens, config.max_output_tokens);
}

#[test]
fn test_multi_answer_from_fenced_output() {
    let o = orchestrator(
        vec![text(
            "Here are the matches:\n```json\n[\n  {\"file\": \"8b71d0aa\", \"extracted\": {\"claim_amount\": 600000}, \"evidence\": [{\"snippet\": \"Claim amount: 600000\"}], \"confidence\": \"MEDIUM\"}\n]\n```",
        )],
        &default_config(),
    );

    let result = o
        .answer_question(&sample_documents(), "Which forms claim more than 500000?")
        .unwrap();

    let Some(ExtractedAnswer::Multi(items)) = result.result else {
        panic!("expected multi answer");
    };
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].file.as_deref(), Some("8b71d0aa"));
    assert_eq!(items[0].extracted["claim_amount"], Some(json!(600000)));
    assert_eq!(items[0].confidence, Confidence::Medium);
}

#[test]
fn test_balanced_recovery_from_prose() {
    let o = orchestrator(
        vec![text("The result is {\"a\": [1,2,{\"b\":3}]} as requested.")],
        &default_config(),
    );
    let result = o.answer_question(&sample_documents(), "q").unwrap();

    assert!(result.success);
    assert_eq!(result.value, Some(json!({"a": [1, 2, {"b": 3}]})));
}

#[test]
fn test_unparsable_output_keeps_raw_verbatim() {
    let o = orchestrator(vec![text("not json at all")], &default_config());
    let result = o.answer_question(&sample_documents(), "q").unwrap();

    assert!(!result.success);
    assert!(result.result.is_none());
    assert_eq!(result.error.as_deref(), Some(UNPARSED_ERROR));
    assert_eq!(result.raw, "not json at all");
}

#[test]
fn test_empty_first_attempt_then_truncated_retry() {
    let config = AgentConfig::builder("test-key")
        .retries(1)
        .retry_truncate_chars(40)
        .backoff_unit(Duration::from_millis(250))
        .build();
    let o = orchestrator(
        vec![empty(), text("{\"mode\":\"single\",\"answer\":\"second\"}")],
        &config,
    );

    let result = o.answer_question(&sample_documents(), "q").unwrap();

    let Some(ExtractedAnswer::Single(single)) = result.result else {
        panic!("expected single answer");
    };
    assert_eq!(single.answer.as_deref(), Some("second"));

    let prompts = o.transport().backend().prompts();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[1].chars().count(), 40);
    assert!(prompts[0].starts_with(&prompts[1]));
    assert_eq!(
        o.transport().backoff().waits(),
        vec![Duration::from_millis(250)]
    );
}

#[test]
fn test_exhausted_attempts_surface_as_diagnostic() {
    let config = AgentConfig::builder("test-key").retries(2).build();
    let o = orchestrator(vec![empty(), empty(), empty()], &config);

    let result = o.answer_question(&sample_documents(), "q").unwrap();

    // The diagnostic itself is valid JSON, so it parses.
    assert!(result.success);
    let diagnostic = result.diagnostic().unwrap();
    assert!(matches!(diagnostic, Diagnostic::NoContentGenerated { .. }));
    assert_eq!(o.transport().backend().prompts().len(), 3);
    assert_eq!(
        o.transport().backoff().waits(),
        vec![Duration::from_secs(1), Duration::from_secs(3)]
    );
}

#[test]
fn test_safety_block_stops_attempts() {
    let config = AgentConfig::builder("test-key").retries(3).build();
    let o = orchestrator(
        vec![
            blocked("HARM_CATEGORY_DANGEROUS_CONTENT", "HIGH"),
            text("{\"answer\":\"never\"}"),
        ],
        &config,
    );

    let result = o.summarize(&sample_documents()).unwrap();

    assert_eq!(
        result.diagnostic(),
        Some(Diagnostic::BlockedBySafety {
            safety_reason: "HARM_CATEGORY_DANGEROUS_CONTENT:HIGH".into()
        })
    );
    assert_eq!(o.transport().backend().prompts().len(), 1);
    assert!(o.transport().backoff().waits().is_empty());
}

#[test]
fn test_excerpts_are_capped_per_document() {
    let config = AgentConfig::builder("test-key").per_file_char_limit(10).build();
    let o = orchestrator(vec![text("[]")], &config);
    let docs = sample_documents();

    let result = o.answer_question(&docs, "q").unwrap();
    assert_eq!(result.result, Some(ExtractedAnswer::Empty));

    let prompt = &o.transport().backend().prompts()[0];
    for doc in &docs {
        let label = format!("--- FILE: {} ---\n", doc.id);
        assert_eq!(prompt.matches(&label).count(), 1);
        let excerpt: String = doc.text.chars().take(10).collect();
        assert!(prompt.contains(&format!("{label}{excerpt}\n")));
    }
    assert!(!prompt.contains("Bangalore"));
}

#[test]
fn test_summary_of_stored_forms() {
    let dir = tempfile::tempdir().unwrap();
    let store = FormStore::new(dir.path());
    store
        .save("claim.png", b"\x89PNG", "Claimant: Priya Sharma\nClaim amount: 600000")
        .unwrap();
    let docs = store.load_all().unwrap();

    let o = orchestrator(
        vec![text(
            "{\"summary\":\"Insurance claim by Priya Sharma.\",\"key_fields\":{\"claim_amount\":\"600000\"},\"warnings\":[],\"form_type\":\"Insurance claim\"}",
        )],
        &default_config(),
    );
    let result = o.summarize(&docs).unwrap();

    let report = result.result.unwrap();
    assert_eq!(report.form_type.as_deref(), Some("Insurance claim"));
    assert_eq!(report.key_fields["claim_amount"].as_deref(), Some("600000"));

    let prompt = &o.transport().backend().prompts()[0];
    assert!(prompt.contains("Form: claim.png\n\nOCR Text:\nClaimant: Priya Sharma"));
}

#[test]
fn test_fatal_config_error_propagates() {
    let o = orchestrator(
        vec![Err(FormAgentError::Config("key revoked".into()))],
        &default_config(),
    );
    let err = o.answer_question(&sample_documents(), "q").unwrap_err();
    assert!(matches!(err, FormAgentError::Config(_)));
}

#[test]
fn test_orchestrator_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<QueryOrchestrator<ScriptedBackend, RecordingBackoff>>();

    let o = orchestrator(
        vec![text("{\"answer\":\"a\"}"), text("{\"answer\":\"b\"}")],
        &default_config(),
    );
    let docs = sample_documents();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|_| scope.spawn(|| o.answer_question(&docs, "q").unwrap()))
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().success);
        }
    });
    assert_eq!(o.transport().backend().prompts().len(), 2);
}
