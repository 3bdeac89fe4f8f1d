//! Cross-verification of a single item.
//!
//! The same prompt goes to every verification model in parallel. Each
//! model that answers with a parseable verdict casts one vote; models that
//! fail or ramble are left out of the tally.

use crate::agent::extract_json;
use crate::gateway::{ModelGateway, Prompt};
use crate::models::{
    Consensus, CrossVerification, IntelItem, VerificationResult, VerificationVote,
};
use futures::future::join_all;
use tracing::{debug, info};

pub fn build_verification_prompt(item: &IntelItem, language: &str) -> String {
    let mut prompt = format!(
        "Verify this intel: \"{}\" - {} (Source: {})\n",
        item.headline, item.summary, item.source
    );
    prompt.push_str(&format!(
        r#"Search for corroboration. Return ONLY JSON: {{"verified":<bool>,"confidence":<0-100>,"corroborating_sources":["<sources>"],"notes":"<note in {}>"}}"#,
        language
    ));
    prompt
}

/// Combine votes into a verdict; `None` when nobody answered.
///
/// The verdict holds when at least half the responders, rounded up,
/// confirmed the item.
pub fn tally(votes: &[VerificationVote], models_queried: usize) -> Option<VerificationResult> {
    if votes.is_empty() {
        return None;
    }

    let responded = votes.len();
    let confirmed = votes.iter().filter(|v| v.verified).count();
    let confidence_sum: u32 = votes.iter().map(|v| u32::from(v.confidence)).sum();
    let confidence = (f64::from(confidence_sum) / responded as f64).round() as u8;

    let mut sources: Vec<String> = Vec::new();
    for source in votes.iter().flat_map(|v| &v.sources) {
        if !sources.contains(source) {
            sources.push(source.clone());
        }
    }

    let consensus = if confirmed == responded {
        Consensus::Unanimous
    } else if confirmed > 0 {
        Consensus::Partial
    } else {
        Consensus::Unconfirmed
    };

    Some(VerificationResult {
        verified: confirmed >= responded.div_ceil(2),
        confidence,
        corroborating_sources: sources,
        notes: votes.iter().find_map(|v| v.notes.clone()),
        cross_verification: CrossVerification {
            models_queried,
            models_responded: responded,
            models_confirmed: confirmed,
            consensus,
        },
    })
}

/// Ask every model in `models` about `item` and return the majority verdict.
pub async fn verify(
    gateway: &dyn ModelGateway,
    api_key: &str,
    item: &IntelItem,
    models: &[String],
    language: &str,
    max_tokens: u32,
) -> Option<VerificationResult> {
    let text = build_verification_prompt(item, language);

    let outcomes = join_all(models.iter().map(|model| {
        let prompt = Prompt::new(text.clone(), max_tokens)
            .with_model(Some(model))
            .pinned();
        async move { (model, gateway.invoke(api_key, &prompt).await) }
    }))
    .await;

    let votes: Vec<VerificationVote> = outcomes
        .into_iter()
        .filter_map(|(model, outcome)| match outcome {
            Ok(completion) => {
                let vote = extract_json(&completion.text)
                    .and_then(|v| VerificationVote::from_value(&v, &completion.model));
                if vote.is_none() {
                    debug!("Verification reply from {} did not parse", model);
                }
                vote
            }
            Err(e) => {
                debug!("Verification by {} failed: {}", model, e);
                None
            }
        })
        .collect();

    let result = tally(&votes, models.len());
    match result {
        Some(ref r) => info!(
            "Verified \"{}\": {} ({}/{} confirmed, {})",
            item.headline,
            r.verified,
            r.cross_verification.models_confirmed,
            r.cross_verification.models_responded,
            r.cross_verification.consensus
        ),
        None => info!("No verification model answered for \"{}\"", item.headline),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::test_agent;
    use crate::gateway::testing::ScriptedGateway;
    use serde_json::json;

    fn item() -> IntelItem {
        IntelItem::from_value(
            &json!({"headline": "Strike reported", "summary": "Explosions heard", "source": "X"}),
            &test_agent("sigint"),
            "m",
            0,
        )
        .unwrap()
    }

    fn models() -> Vec<String> {
        vec!["m1".to_string(), "m2".to_string(), "m3".to_string()]
    }

    fn vote(verified: bool, confidence: u8) -> VerificationVote {
        VerificationVote {
            model: "m".to_string(),
            verified,
            confidence,
            sources: vec![],
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_two_confirm_one_fails() {
        let gateway = ScriptedGateway::new()
            .reply_for_model(
                "m1",
                r#"{"verified":true,"confidence":80,"corroborating_sources":["Reuters","AP"],"notes":"Matches wire reports"}"#,
            )
            .reply_for_model(
                "m2",
                r#"{"verified":true,"confidence":60,"corroborating_sources":["AP","BBC"],"notes":"Seen on BBC"}"#,
            )
            .fail_for_model("m3", 503);

        let result = verify(&gateway, "key", &item(), &models(), "English", 600)
            .await
            .unwrap();

        assert!(result.verified);
        assert_eq!(result.confidence, 70);
        assert_eq!(
            result.corroborating_sources,
            vec!["Reuters".to_string(), "AP".to_string(), "BBC".to_string()]
        );
        assert_eq!(result.notes.as_deref(), Some("Matches wire reports"));
        assert_eq!(result.cross_verification.models_queried, 3);
        assert_eq!(result.cross_verification.models_responded, 2);
        assert_eq!(result.cross_verification.models_confirmed, 2);
        assert_eq!(result.cross_verification.consensus, Consensus::Unanimous);
        assert_eq!(gateway.calls(), 3);
        assert!(gateway.prompts().iter().all(|p| !p.fallback));
    }

    #[tokio::test]
    async fn test_nobody_answers() {
        let gateway = ScriptedGateway::new()
            .fail_for_model("m1", 429)
            .fail_for_model("m2", 500)
            .reply_for_model("m3", "I could not find anything.");

        assert!(verify(&gateway, "key", &item(), &models(), "English", 600)
            .await
            .is_none());
    }

    #[test]
    fn test_tie_rounds_up() {
        let result = tally(&[vote(true, 90), vote(false, 10)], 2).unwrap();
        assert!(result.verified);
        assert_eq!(result.confidence, 50);
        assert_eq!(result.cross_verification.consensus, Consensus::Partial);
    }

    #[test]
    fn test_minority_is_not_verified() {
        let result = tally(&[vote(true, 90), vote(false, 10), vote(false, 20)], 3).unwrap();
        assert!(!result.verified);
        assert_eq!(result.cross_verification.models_confirmed, 1);
        assert_eq!(result.cross_verification.consensus, Consensus::Partial);
    }

    #[test]
    fn test_unconfirmed() {
        let result = tally(&[vote(false, 30)], 3).unwrap();
        assert!(!result.verified);
        assert_eq!(result.cross_verification.consensus, Consensus::Unconfirmed);
        assert!(tally(&[], 3).is_none());
    }
}
