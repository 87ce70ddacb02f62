//! AI critique of source fragments.
//!
//! Each flow pairs an input type, a prompt template and an output type whose
//! JSON schema is sent along with the prompt. The backend's answer is accepted
//! only if it deserializes into the output type.

use anyhow::{Result, anyhow};
use minijinja::Environment;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::domain::errors::{AnalysisCause, AnalysisError};
use crate::domain::model::SourceBundle;
use crate::infra::backend::{GenerationBackend, GenerationRequest};

/// Snapshot of the fragments sent for error detection.
///
/// An empty fragment is treated exactly like an absent one: both render as
/// "no code provided" for that language.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisRequest {
    /// The HTML code to check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// The CSS code to check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
    /// The JavaScript code to check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub javascript: Option<String>,
}

impl AnalysisRequest {
    pub fn new(html: Option<String>, css: Option<String>, javascript: Option<String>) -> Self {
        Self {
            html: present(html),
            css: present(css),
            javascript: present(javascript),
        }
    }

    /// Copy with empty fragments dropped.
    pub fn normalized(&self) -> Self {
        Self::new(
            self.html.clone(),
            self.css.clone(),
            self.javascript.clone(),
        )
    }
}

impl From<&SourceBundle> for AnalysisRequest {
    fn from(bundle: &SourceBundle) -> Self {
        Self::new(
            Some(bundle.html.clone()),
            Some(bundle.css.clone()),
            Some(bundle.javascript.clone()),
        )
    }
}

fn present(fragment: Option<String>) -> Option<String> {
    fragment.filter(|text| !text.is_empty())
}

/// Snapshot of the fragments sent for improvement suggestions. All required.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ImprovementRequest {
    /// The HTML code to improve.
    pub html: String,
    /// The CSS code to improve.
    pub css: String,
    /// The JavaScript code to improve.
    pub javascript: String,
}

impl From<&SourceBundle> for ImprovementRequest {
    fn from(bundle: &SourceBundle) -> Self {
        Self {
            html: bundle.html.clone(),
            css: bundle.css.clone(),
            javascript: bundle.javascript.clone(),
        }
    }
}

/// Findings of the error-detection flow. An absent list means none reported.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    /// Errors found in the HTML code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_errors: Option<Vec<String>>,
    /// Errors found in the CSS code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css_errors: Option<Vec<String>>,
    /// Errors found in the JavaScript code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub javascript_errors: Option<Vec<String>>,
    /// Suggestions on how to fix the errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

impl ErrorReport {
    /// True when no list carries an entry.
    pub fn is_clean(&self) -> bool {
        [
            &self.html_errors,
            &self.css_errors,
            &self.javascript_errors,
            &self.suggestions,
        ]
        .into_iter()
        .all(|list| list.as_ref().is_none_or(Vec::is_empty))
    }
}

/// Prose produced by the improvement flow.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ImprovementReport {
    /// Suggestions for improving the code.
    pub suggestions: String,
}

/// A prompt/response contract understood by [`AnalysisPipeline`].
pub trait Flow {
    /// Stable flow identifier, also used as template and schema name.
    const NAME: &'static str;
    const TEMPLATE: &'static str;
    type Input: Serialize;
    type Output: DeserializeOwned + JsonSchema;
}

/// Finds errors per language and proposes fixes.
#[derive(Debug, Clone, Copy)]
pub struct ErrorDetectionFlow;

impl Flow for ErrorDetectionFlow {
    const NAME: &'static str = "detectCodeErrors";
    const TEMPLATE: &'static str = ERROR_DETECTION_TEMPLATE;
    type Input = AnalysisRequest;
    type Output = ErrorReport;
}

/// Suggests structural, stylistic and performance improvements.
#[derive(Debug, Clone, Copy)]
pub struct ImprovementFlow;

impl Flow for ImprovementFlow {
    const NAME: &'static str = "improveCode";
    const TEMPLATE: &'static str = IMPROVEMENT_TEMPLATE;
    type Input = ImprovementRequest;
    type Output = ImprovementReport;
}

/// Renders prompts and validates backend answers for every [`Flow`].
pub struct AnalysisPipeline<B> {
    backend: B,
    env: Environment<'static>,
}

impl<B: GenerationBackend> AnalysisPipeline<B> {
    /// Create a pipeline with the built-in flow templates registered.
    pub fn new(backend: B) -> Result<Self> {
        Ok(Self {
            backend,
            env: default_environment()?,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Render the prompt `F` would send for `input`.
    pub fn render_prompt<F: Flow>(&self, input: &F::Input) -> Result<String, minijinja::Error> {
        self.env.get_template(F::NAME)?.render(input)
    }

    /// Run one flow: render, call the backend once, validate the answer.
    pub async fn execute<F: Flow>(&self, input: &F::Input) -> Result<F::Output, AnalysisError> {
        let prompt = self
            .render_prompt::<F>(input)
            .map_err(|err| AnalysisError::unavailable(F::NAME, err))?;
        let request = GenerationRequest {
            flow: F::NAME.to_string(),
            prompt,
            output_schema: output_schema::<F>()?,
        };

        info!(flow = F::NAME, "requesting analysis");
        let answer = self.backend.generate(request).await.map_err(|err| {
            warn!(flow = F::NAME, error = %err, "backend call failed");
            AnalysisError::unavailable(F::NAME, err)
        })?;

        serde_json::from_value(answer).map_err(|err| {
            warn!(flow = F::NAME, error = %err, "backend answer failed validation");
            AnalysisError::unavailable(F::NAME, err)
        })
    }

    /// Detect errors in whichever fragments are present.
    pub async fn analyze_errors(
        &self,
        request: &AnalysisRequest,
    ) -> Result<ErrorReport, AnalysisError> {
        self.execute::<ErrorDetectionFlow>(&request.normalized()).await
    }

    /// Ask for free-form improvement suggestions on all three fragments.
    pub async fn analyze_improvements(
        &self,
        request: &ImprovementRequest,
    ) -> Result<ImprovementReport, AnalysisError> {
        self.execute::<ImprovementFlow>(request).await
    }
}

/// JSON schema of a flow's output type.
pub fn output_schema<F: Flow>() -> Result<Value, AnalysisError> {
    let schema = schemars::schema_for!(F::Output);
    serde_json::to_value(schema)
        .map_err(|err| AnalysisError::unavailable(F::NAME, AnalysisCause::Schema(err)))
}

fn default_environment() -> Result<Environment<'static>> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_template(ErrorDetectionFlow::NAME, ErrorDetectionFlow::TEMPLATE)
        .map_err(|err| anyhow!("failed to register error detection template: {err}"))?;
    env.add_template(ImprovementFlow::NAME, ImprovementFlow::TEMPLATE)
        .map_err(|err| anyhow!("failed to register improvement template: {err}"))?;
    Ok(env)
}

const ERROR_DETECTION_TEMPLATE: &str = r#"You review small web pages written in HTML, CSS and JavaScript. Find the mistakes in the code below and explain how to fix each one.

List the problems per language and add concrete fix suggestions. Leave out any list that would be empty.

HTML:
{% if html %}
{{ html }}
{% else %}
No HTML code provided.
{% endif %}

CSS:
{% if css %}
{{ css }}
{% else %}
No CSS code provided.
{% endif %}

JavaScript:
{% if javascript %}
{{ javascript }}
{% else %}
No JavaScript code provided.
{% endif %}

Answer using the output schema.
"#;

const IMPROVEMENT_TEMPLATE: &str = r#"You review small web pages written in HTML, CSS and JavaScript. Suggest how to improve the structure, style and behaviour of the code below. Point out likely bugs, readability problems and performance issues.

HTML:
{{ html }}

CSS:
{{ css }}

JavaScript:
{{ javascript }}

Answer using the output schema.
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::backend::{BackendError, MockGenerationBackend};
    use serde_json::json;

    fn pipeline(backend: MockGenerationBackend) -> AnalysisPipeline<MockGenerationBackend> {
        AnalysisPipeline::new(backend).expect("templates register")
    }

    fn idle() -> AnalysisPipeline<MockGenerationBackend> {
        pipeline(MockGenerationBackend::new())
    }

    #[test]
    fn empty_request_renders_every_placeholder_branch() {
        let prompt = idle()
            .render_prompt::<ErrorDetectionFlow>(&AnalysisRequest::default())
            .unwrap();
        assert!(prompt.contains("No HTML code provided."));
        assert!(prompt.contains("No CSS code provided."));
        assert!(prompt.contains("No JavaScript code provided."));
    }

    #[test]
    fn present_fragments_are_rendered_verbatim() {
        let request = AnalysisRequest::new(
            Some("<p class=\"a\">x</p>".into()),
            None,
            Some("if (a < b && c) {}".into()),
        );
        let prompt = idle()
            .render_prompt::<ErrorDetectionFlow>(&request)
            .unwrap();
        assert!(prompt.contains("<p class=\"a\">x</p>"));
        assert!(prompt.contains("if (a < b && c) {}"));
        assert!(prompt.contains("No CSS code provided."));
        assert!(!prompt.contains("No HTML code provided."));
    }

    #[test]
    fn empty_fragment_counts_as_absent() {
        let request = AnalysisRequest {
            html: Some(String::new()),
            ..AnalysisRequest::default()
        };
        assert_eq!(request.normalized(), AnalysisRequest::default());
        let prompt = idle()
            .render_prompt::<ErrorDetectionFlow>(&request)
            .unwrap();
        assert!(prompt.contains("No HTML code provided."));
    }

    #[test]
    fn improvement_prompt_includes_all_fragments() {
        let request = ImprovementRequest {
            html: "<main></main>".into(),
            css: "main{}".into(),
            javascript: "run()".into(),
        };
        let prompt = idle().render_prompt::<ImprovementFlow>(&request).unwrap();
        assert!(prompt.contains("<main></main>"));
        assert!(prompt.contains("main{}"));
        assert!(prompt.contains("run()"));
    }

    #[test]
    fn schemas_describe_output_fields() {
        let schema = output_schema::<ErrorDetectionFlow>().unwrap();
        let properties = &schema["properties"];
        assert!(properties.get("htmlErrors").is_some());
        assert!(properties.get("javascriptErrors").is_some());
        assert_eq!(
            properties["suggestions"]["description"],
            "Suggestions on how to fix the errors."
        );

        let schema = output_schema::<ImprovementFlow>().unwrap();
        assert_eq!(schema["required"], json!(["suggestions"]));
    }

    #[tokio::test]
    async fn analyze_errors_sends_placeholders_for_missing_code() {
        let mut backend = MockGenerationBackend::new();
        backend
            .expect_generate()
            .times(1)
            .withf(|request| {
                request.flow == "detectCodeErrors"
                    && request.prompt.contains("No HTML code provided.")
                    && request.prompt.contains("No CSS code provided.")
                    && request.prompt.contains("No JavaScript code provided.")
                    && request.output_schema["properties"].get("cssErrors").is_some()
            })
            .returning(|_| Ok(json!({})));

        let report = pipeline(backend)
            .analyze_errors(&AnalysisRequest::default())
            .await
            .unwrap();
        assert_eq!(report, ErrorReport::default());
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn analyze_errors_returns_backend_findings() {
        let mut backend = MockGenerationBackend::new();
        backend.expect_generate().times(1).returning(|_| {
            Ok(json!({
                "javascriptErrors": ["Missing closing parenthesis"],
                "suggestions": ["Add ')' after the argument list"],
                "htmlErrors": null
            }))
        });

        let report = pipeline(backend)
            .analyze_errors(&AnalysisRequest::new(None, None, Some("log(1".into())))
            .await
            .unwrap();
        assert_eq!(
            report.javascript_errors,
            Some(vec!["Missing closing parenthesis".to_string()])
        );
        assert_eq!(report.html_errors, None);
        assert_eq!(report.css_errors, None);
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn wrong_shape_is_unavailable() {
        let mut backend = MockGenerationBackend::new();
        backend
            .expect_generate()
            .times(1)
            .returning(|_| Ok(json!({ "cssErrors": "none" })));

        let err = pipeline(backend)
            .analyze_errors(&AnalysisRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err.cause(), AnalysisCause::InvalidShape(_)));
    }

    #[tokio::test]
    async fn backend_failure_is_unavailable_without_retry() {
        let mut backend = MockGenerationBackend::new();
        backend.expect_generate().times(1).returning(|_| {
            Err(BackendError::Status {
                status: 503,
                body: "overloaded".into(),
            })
        });

        let err = pipeline(backend)
            .analyze_improvements(&ImprovementRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err.cause(), AnalysisCause::Backend(_)));
        assert!(err.to_string().contains("improveCode"));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn improvement_requires_suggestions_field() {
        let mut backend = MockGenerationBackend::new();
        backend
            .expect_generate()
            .times(1)
            .returning(|_| Ok(json!({ "advice": "rename things" })));

        let err = pipeline(backend)
            .analyze_improvements(&ImprovementRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err.cause(), AnalysisCause::InvalidShape(_)));
    }

    #[tokio::test]
    async fn improvement_returns_prose() {
        let mut backend = MockGenerationBackend::new();
        backend
            .expect_generate()
            .withf(|request| request.flow == "improveCode")
            .times(1)
            .returning(|_| Ok(json!({ "suggestions": "Use semantic elements." })));

        let report = pipeline(backend)
            .analyze_improvements(&ImprovementRequest::from(&SourceBundle::starter()))
            .await
            .unwrap();
        assert_eq!(report.suggestions, "Use semantic elements.");
    }
}
