//! The editing session: one bundle, its live preview, and the sandbox hosting it.

use tracing::debug;

use crate::app::analysis::{AnalysisRequest, ImprovementRequest};
use crate::app::capture::capture_run;
use crate::app::compose::compose;
use crate::app::sandbox::{Sandbox, SandboxLimits};
use crate::domain::errors::SandboxError;
use crate::domain::model::{ComposedDocument, Fragment, OutputLog, SourceBundle};

/// Single owner of the source bundle and the sandbox realm.
///
/// Every edit recomposes the document and reloads the sandbox, so the preview
/// always reflects the latest fragments.
#[derive(Debug)]
pub struct Playground {
    bundle: SourceBundle,
    document: ComposedDocument,
    sandbox: Sandbox,
}

impl Playground {
    pub fn new(bundle: SourceBundle, limits: SandboxLimits) -> Self {
        Self::with_sandbox(bundle, Sandbox::new(limits))
    }

    /// Host the bundle in a caller-provided sandbox.
    pub fn with_sandbox(bundle: SourceBundle, mut sandbox: Sandbox) -> Self {
        let document = compose(&bundle);
        sandbox.load(&document);
        Self {
            bundle,
            document,
            sandbox,
        }
    }

    pub fn bundle(&self) -> &SourceBundle {
        &self.bundle
    }

    /// The document currently shown in the preview.
    pub fn document(&self) -> &ComposedDocument {
        &self.document
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Replace one fragment and refresh the preview.
    pub fn edit(&mut self, fragment: Fragment, value: impl Into<String>) {
        self.bundle.set(fragment, value);
        debug!(%fragment, "fragment edited");
        self.refresh();
    }

    /// Empty all fragments and refresh the preview.
    pub fn clear(&mut self) {
        self.bundle.clear();
        self.refresh();
    }

    /// Re-run the script fragment against the live realm, propagating failures.
    pub fn run(&mut self) -> Result<(), SandboxError> {
        let script = self.bundle.javascript.clone();
        self.sandbox.run(&script)
    }

    /// Re-run the script fragment and collect its console output.
    pub fn capture(&mut self) -> Result<OutputLog, SandboxError> {
        let script = self.bundle.javascript.clone();
        capture_run(&mut self.sandbox, &script)
    }

    pub fn error_request(&self) -> AnalysisRequest {
        AnalysisRequest::from(&self.bundle)
    }

    pub fn improvement_request(&self) -> ImprovementRequest {
        ImprovementRequest::from(&self.bundle)
    }

    fn refresh(&mut self) {
        self.document = compose(&self.bundle);
        self.sandbox.load(&self.document);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::capture::NO_OUTPUT_MESSAGE;
    use crate::domain::model::CapturedLine;

    #[test]
    fn new_playground_is_loaded() {
        let playground = Playground::new(SourceBundle::starter(), SandboxLimits::default());
        assert!(playground.sandbox().is_loaded());
        assert!(playground.document().as_str().contains("Hello, Web Weaver!"));
    }

    #[test]
    fn edit_recomposes_and_reloads() {
        let mut playground = Playground::new(SourceBundle::default(), SandboxLimits::default());
        let first_realm = playground.sandbox().realm_id();

        playground.edit(Fragment::Css, "h1 { color: teal; }");
        assert!(playground.document().as_str().contains("h1 { color: teal; }"));
        assert_ne!(first_realm, playground.sandbox().realm_id());
    }

    #[test]
    fn capture_runs_current_script() {
        let mut playground = Playground::new(SourceBundle::default(), SandboxLimits::default());
        assert_eq!(
            playground.capture().unwrap().lines(),
            &[CapturedLine::log(NO_OUTPUT_MESSAGE)]
        );

        playground.edit(Fragment::Javascript, "console.log('edited')");
        assert_eq!(
            playground.capture().unwrap().lines(),
            &[CapturedLine::log("edited")]
        );
    }

    #[test]
    fn run_propagates_thrown_errors() {
        let mut playground = Playground::new(
            SourceBundle::new("", "", "throw new Error('raw')"),
            SandboxLimits::default(),
        );
        assert_eq!(playground.run(), Err(SandboxError::execution("raw")));
    }

    #[test]
    fn clear_leaves_an_empty_live_document() {
        let mut playground = Playground::new(SourceBundle::starter(), SandboxLimits::default());
        playground.clear();
        assert!(playground.bundle().is_empty());
        assert!(playground.document().as_str().contains("<script></script>"));
        assert!(playground.sandbox().is_loaded());
        assert_eq!(playground.error_request(), AnalysisRequest::default());
    }
}
