//! Recommendation stage: actionable resume edits keyed to the score breakdown.

use serde::Deserialize;

use crate::analysis::models::{GapFindings, Recommendation, RequirementSet, ScoreBreakdown};
use crate::analysis::orchestrator::AnalysisError;
use crate::analysis::prompts::{
    fill_template, RECOMMENDATION_PROMPT_TEMPLATE, RECOMMENDATION_SYSTEM,
};
use crate::analysis::schema::{FieldKind, FieldSpec, ShapeSpec};
use crate::analysis::stage::{decode, prompt_json, Stage, StageContext, StageRequest};

pub const RECOMMENDATION_CALL: &str = "recommendations";

const CATEGORIES: &[&str] = &["keyword", "reframing", "omission", "quantification"];
const PRIORITIES: &[&str] = &["high", "medium", "low"];

#[derive(Debug, Deserialize)]
struct RecommendationList {
    recommendations: Vec<Recommendation>,
}

pub fn recommendations_shape() -> ShapeSpec {
    ShapeSpec::object(
        "Recommendations",
        vec![FieldSpec::required(
            "recommendations",
            FieldKind::bounded_list(
                FieldKind::object(vec![
                    FieldSpec::required("action", FieldKind::non_empty_text()),
                    FieldSpec::required("category", FieldKind::one_of(CATEGORIES)),
                    FieldSpec::required("priority", FieldKind::one_of(PRIORITIES)),
                    FieldSpec::required("rationale", FieldKind::text()),
                ]),
                1,
                None,
            ),
        )],
    )
}

/// Stable sort: high before medium before low, model order kept within a priority.
pub fn order_by_priority(mut recommendations: Vec<Recommendation>) -> Vec<Recommendation> {
    recommendations.sort_by_key(|r| r.priority);
    recommendations
}

pub async fn generate_recommendations(
    ctx: &StageContext<'_>,
    score: &ScoreBreakdown,
    gaps: &GapFindings,
    requirements: &RequirementSet,
) -> Result<Vec<Recommendation>, AnalysisError> {
    let score_json = prompt_json("score", score)?;
    let gaps_json = prompt_json("gap findings", gaps)?;
    let requirements_json = prompt_json("requirements", requirements)?;
    let prompt = fill_template(
        RECOMMENDATION_PROMPT_TEMPLATE,
        &[
            ("score_json", score_json.as_str()),
            ("gaps_json", gaps_json.as_str()),
            ("requirements_json", requirements_json.as_str()),
        ],
    );

    let shape = recommendations_shape();
    let request = StageRequest {
        stage: Stage::Recommendation,
        call: RECOMMENDATION_CALL,
        system: RECOMMENDATION_SYSTEM,
        prompt,
        shape: &shape,
    };
    let recommendations = ctx
        .run(request, |value| {
            decode::<RecommendationList>(value, &shape)
                .map(|list| order_by_priority(list.recommendations))
        })
        .await?;
    Ok(recommendations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::analysis::models::{Priority, RecommendationCategory};
    use crate::analysis::schema::SchemaValidator;
    use crate::analysis::scoring::score;
    use crate::analysis::testing::{
        sample_gaps, sample_profile, sample_requirements, RecordingObserver, ScriptedTransport,
        RECOMMENDATIONS_OUTPUT,
    };

    fn rec(action: &str, priority: Priority) -> Recommendation {
        Recommendation {
            action: action.to_string(),
            category: RecommendationCategory::Keyword,
            priority,
            rationale: String::new(),
        }
    }

    #[test]
    fn test_priority_order_is_stable() {
        let ordered = order_by_priority(vec![
            rec("a", Priority::Low),
            rec("b", Priority::High),
            rec("c", Priority::Medium),
            rec("d", Priority::High),
        ]);
        let actions: Vec<&str> = ordered.iter().map(|r| r.action.as_str()).collect();
        assert_eq!(actions, vec!["b", "d", "c", "a"]);
    }

    #[tokio::test]
    async fn test_model_order_low_high_medium_is_reordered() {
        let transport = ScriptedTransport::new(vec![Ok(RECOMMENDATIONS_OUTPUT.to_string())]);
        let observer = RecordingObserver::default();
        let ctx = StageContext {
            transport: &transport,
            validator: SchemaValidator::default(),
            llm_timeout: Duration::from_secs(5),
            observer: &observer,
        };
        let breakdown = score(&sample_profile(), &sample_requirements(), &sample_gaps());

        let recommendations =
            generate_recommendations(&ctx, &breakdown, &sample_gaps(), &sample_requirements())
                .await
                .unwrap();
        let priorities: Vec<Priority> = recommendations.iter().map(|r| r.priority).collect();
        assert_eq!(
            priorities,
            vec![Priority::High, Priority::Medium, Priority::Low]
        );
        assert!(transport.prompts()[0].contains("\"skill_match\""));
    }

    #[tokio::test]
    async fn test_empty_recommendation_list_is_rejected() {
        let empty = r#"{"recommendations": []}"#;
        let transport =
            ScriptedTransport::new(vec![Ok(empty.to_string()), Ok(empty.to_string())]);
        let observer = RecordingObserver::default();
        let ctx = StageContext {
            transport: &transport,
            validator: SchemaValidator::default(),
            llm_timeout: Duration::from_secs(5),
            observer: &observer,
        };
        let breakdown = score(&sample_profile(), &sample_requirements(), &sample_gaps());

        let err = generate_recommendations(&ctx, &breakdown, &sample_gaps(), &sample_requirements())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Stage(ref failure) if failure.stage == Stage::Recommendation
        ));
    }

    #[tokio::test]
    async fn test_unknown_category_is_rejected_then_corrected() {
        let wrong = r#"{"recommendations": [
            {"action": "Add Kubernetes", "category": "networking", "priority": "high", "rationale": "x"}
        ]}"#;
        let fixed = r#"{"recommendations": [
            {"action": "Add Kubernetes", "category": "Keyword", "priority": "HIGH", "rationale": "x"}
        ]}"#;
        let transport =
            ScriptedTransport::new(vec![Ok(wrong.to_string()), Ok(fixed.to_string())]);
        let observer = RecordingObserver::default();
        let ctx = StageContext {
            transport: &transport,
            validator: SchemaValidator::default(),
            llm_timeout: Duration::from_secs(5),
            observer: &observer,
        };
        let breakdown = score(&sample_profile(), &sample_requirements(), &sample_gaps());

        let recommendations =
            generate_recommendations(&ctx, &breakdown, &sample_gaps(), &sample_requirements())
                .await
                .unwrap();
        assert_eq!(recommendations[0].category, RecommendationCategory::Keyword);
        assert!(transport.prompts()[1].contains("recommendations[0].category"));
    }
}
