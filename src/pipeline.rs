//! Manifest stream to review envelopes to evaluator outcome.
//!
//! A run acquires a fresh [`Workspace`], stages one primary artifact per
//! document plus a `_pods` artifact for each workload pod template, hands the
//! workspace to the [`Evaluator`], and turns its status into an [`Outcome`].
//! The workspace is dropped on every path out of [`Pipeline::run`].
use serde_json::Value;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use crate::decode::decode;
use crate::envelope;
use crate::error::{GatekeeperError, Result};
use crate::evaluator::{EvaluationOutcome, Evaluator};
use crate::interrupt;
use crate::sink::{ArtifactSink, POD_TEMPLATE_SUFFIX, PRIMARY_SUFFIX};
use crate::split::split;
use crate::workload;
use crate::workspace::Workspace;

/// Exit code for every failure of this tool itself.
pub const INTERNAL_ERROR_EXIT: u8 = 5;

/// Evaluator statuses are shifted past 1 and 2, which the evaluator's own
/// caller reserves.
const FINDINGS_EXIT_OFFSET: i32 = 2;

/// Final result of one run.
#[derive(Debug)]
pub enum Outcome {
    Success,
    /// The evaluator exited with this non-zero status.
    Findings(i32),
    Failed(GatekeeperError),
}

impl Outcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Success => 0,
            Outcome::Findings(status) => {
                let shifted = status.saturating_add(FINDINGS_EXIT_OFFSET).clamp(3, 255);
                u8::try_from(shifted).unwrap_or(u8::MAX)
            }
            Outcome::Failed(_) => INTERNAL_ERROR_EXIT,
        }
    }

    fn from_status(status: i32) -> Self {
        if status == 0 {
            Outcome::Success
        } else {
            Outcome::Findings(status)
        }
    }
}

/// Counters for the staging pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub documents: usize,
    pub empty_documents: usize,
    pub primary_artifacts: usize,
    pub pod_artifacts: usize,
    pub malformed_workloads: usize,
}

/// Kind and `metadata.name` of a document; absent values are empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceIdentity {
    pub kind: String,
    pub name: String,
}

impl ResourceIdentity {
    pub fn of(document: &Value) -> Self {
        let kind = document.get("kind").and_then(Value::as_str).unwrap_or_default();
        let name = document
            .get("metadata")
            .and_then(|metadata| metadata.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        ResourceIdentity {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }
}

pub struct Pipeline<'a, E: Evaluator + ?Sized> {
    evaluator: &'a E,
    max_document_bytes: usize,
    workspace_root: Option<PathBuf>,
}

impl<'a, E: Evaluator + ?Sized> Pipeline<'a, E> {
    pub fn new(
        evaluator: &'a E,
        max_document_bytes: usize,
        workspace_root: Option<PathBuf>,
    ) -> Self {
        Pipeline {
            evaluator,
            max_document_bytes,
            workspace_root,
        }
    }

    /// Run the whole pipeline, echoing the evaluator output to `echo`.
    pub fn run<R: BufRead, W: Write>(
        &self,
        input: R,
        parameters: &Value,
        forwarded: &[String],
        echo: &mut W,
    ) -> Outcome {
        match self.try_run(input, parameters, forwarded, echo) {
            Ok(evaluation) => Outcome::from_status(evaluation.status),
            Err(err) => Outcome::Failed(err),
        }
    }

    fn try_run<R: BufRead, W: Write>(
        &self,
        input: R,
        parameters: &Value,
        forwarded: &[String],
        echo: &mut W,
    ) -> Result<EvaluationOutcome> {
        let workspace = Workspace::acquire(self.workspace_root.as_deref())?;
        let sink = ArtifactSink::new(workspace.path());
        let report = stage_documents(input, parameters, &sink, self.max_document_bytes)?;
        tracing::info!(
            documents = report.documents,
            empty = report.empty_documents,
            primary = report.primary_artifacts,
            pods = report.pod_artifacts,
            malformed_workloads = report.malformed_workloads,
            "staged review envelopes"
        );
        interrupt::check()?;
        let evaluation = self.evaluator.evaluate(workspace.path(), forwarded)?;
        echo.write_all(&evaluation.output)
            .and_then(|()| echo.flush())
            .map_err(|err| GatekeeperError::io("echo evaluator output", err))?;
        workspace.release()?;
        Ok(evaluation)
    }
}

/// Decode every document of `input` and write its envelopes through `sink`.
///
/// A document that cannot be decoded fails the whole stream. A workload whose
/// pod template cannot be located only loses its `_pods` artifact.
pub fn stage_documents<R: BufRead>(
    input: R,
    parameters: &Value,
    sink: &ArtifactSink,
    max_document_bytes: usize,
) -> Result<StageReport> {
    let mut report = StageReport::default();
    for (index, chunk) in split(input, max_document_bytes).enumerate() {
        interrupt::check()?;
        let chunk = chunk?;
        let document = decode(&chunk).map_err(|err| match err {
            GatekeeperError::MalformedInput(message) => {
                GatekeeperError::MalformedInput(format!("document {index}: {message}"))
            }
            other => other,
        })?;
        report.documents += 1;
        if document.is_null() {
            tracing::debug!(index, "skipping empty document");
            report.empty_documents += 1;
            continue;
        }
        stage_document(index, &document, parameters, sink, &mut report)?;
    }
    Ok(report)
}

fn stage_document(
    index: usize,
    document: &Value,
    parameters: &Value,
    sink: &ArtifactSink,
    report: &mut StageReport,
) -> Result<()> {
    let identity = ResourceIdentity::of(document);
    let primary = envelope::build(parameters, document).to_bytes()?;
    sink.store(&identity.kind, &identity.name, PRIMARY_SUFFIX, &primary)?;
    report.primary_artifacts += 1;

    match workload::extract(&identity.kind, document) {
        Ok(Some(template)) => {
            let pods = envelope::build(parameters, template).to_bytes()?;
            sink.store(&identity.kind, &identity.name, POD_TEMPLATE_SUFFIX, &pods)?;
            report.pod_artifacts += 1;
        }
        Ok(None) => {}
        Err(err @ GatekeeperError::MalformedWorkload { .. }) => {
            tracing::warn!(
                index,
                kind = %identity.kind,
                name = %identity.name,
                error = %err,
                "skipping pod template"
            );
            report.malformed_workloads += 1;
        }
        Err(err) => return Err(err),
    }
    Ok(())
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
