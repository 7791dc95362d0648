use anyhow::{anyhow, Context, Result};
use log::error;
use rocket::data::ToByteUnit;
use rocket::response::stream::TextStream;
use rocket::serde::json::Json;
use rocket::{post, routes, Data, Route, State};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::spawn_blocking;

use crate::api::wire::{request_from_uploads, FileUploadDto, ProcessingRequestDto};
use crate::api::{AppError, AppResult, RequestGuard};
use crate::models::{OperationKind, OperationOutcome, ProcessingRequest, ProcessingSummary};
use crate::workflow::WorkflowExecutor;

/// Unary: run the whole workflow and answer with one aggregated summary.
#[post("/process", format = "json", data = "<request>")]
pub async fn process_file(
    executor: &State<Arc<WorkflowExecutor>>,
    request: Json<ProcessingRequestDto>,
) -> AppResult<Json<ProcessingSummary>> {
    let executor = Arc::clone(executor.inner());
    let guard = RequestGuard::begin(Arc::clone(executor.metrics()));

    let model = match request.into_inner().into_model() {
        Ok(model) => model,
        Err(err) => {
            guard.fail();
            return Err(AppError::bad_request(err));
        }
    };

    match spawn_blocking(move || executor.process_workflow(&model)).await {
        Ok(summary) => Ok(Json(summary)),
        Err(err) => {
            guard.fail();
            Err(anyhow::Error::from(err)
                .context("File processing failed")
                .into())
        }
    }
}

/// Server-streaming: one NDJSON line per operation result, in completion
/// order; the stream closes when the workflow handle settles.
#[post("/process/stream", format = "json", data = "<request>")]
pub async fn stream_file_operations(
    executor: &State<Arc<WorkflowExecutor>>,
    request: Json<ProcessingRequestDto>,
) -> AppResult<TextStream![String]> {
    let executor = Arc::clone(executor.inner());
    let guard = RequestGuard::begin(Arc::clone(executor.metrics()));

    let model = match request.into_inner().into_model() {
        Ok(model) => model,
        Err(err) => {
            guard.fail();
            return Err(AppError::bad_request(err));
        }
    };

    let (results, mut delivered) = mpsc::unbounded_channel::<OperationOutcome>();
    // Drive the workflow on a blocking thread; the guard rides along so the
    // request is recorded once the last result went out.
    spawn_blocking(move || {
        let _guard = guard;
        let handle = executor.process_workflow_streamed(
            &model,
            Box::new(move |outcome| {
                let _ = results.send(outcome);
            }),
        );
        if handle.wait().is_err() {
            _guard.fail();
        }
    });

    Ok(TextStream! {
        while let Some(outcome) = delivered.recv().await {
            if let Ok(line) = serde_json::to_string(&outcome) {
                yield format!("{line}\n");
            }
        }
    })
}

/// Client-streaming: the body is NDJSON, one file-plus-operations element per
/// line; all elements are collected into a single workflow whose summary is
/// the response.
#[post("/upload", data = "<data>")]
pub async fn upload_files(
    executor: &State<Arc<WorkflowExecutor>>,
    data: Data<'_>,
) -> AppResult<Json<ProcessingSummary>> {
    let executor = Arc::clone(executor.inner());
    let guard = RequestGuard::begin(Arc::clone(executor.metrics()));

    let mut lines = BufReader::new(data.open(1.gibibytes())).lines();
    let mut uploads = Vec::new();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                let upload = serde_json::from_str::<FileUploadDto>(&line)
                    .map_err(anyhow::Error::from)
                    .and_then(|dto| dto.into_model());
                match upload {
                    Ok(upload) => uploads.push(upload),
                    Err(err) => {
                        guard.fail();
                        return Err(AppError::bad_request(err.context("Invalid file data")));
                    }
                }
            }
            Ok(None) => break,
            Err(err) => {
                guard.fail();
                return Err(anyhow::Error::from(err)
                    .context("Failed to read upload stream")
                    .into());
            }
        }
    }

    if uploads.is_empty() {
        guard.fail();
        return Err(AppError::bad_request(anyhow!(
            "upload stream contained no files"
        )));
    }
    let model = match request_from_uploads(uploads) {
        Ok(model) => model,
        Err(err) => {
            guard.fail();
            return Err(AppError::bad_request(err));
        }
    };

    match spawn_blocking(move || executor.process_workflow(&model)).await {
        Ok(summary) => Ok(Json(summary)),
        Err(err) => {
            guard.fail();
            Err(anyhow::Error::from(err)
                .context("Upload processing failed")
                .into())
        }
    }
}

/// Bidirectional: each NDJSON line on the request body starts an immediate
/// single-file workflow, and results from all of them interleave on the
/// response stream as they complete. The response ends once the input is
/// exhausted and every workflow has drained.
#[post("/process/live", data = "<data>")]
pub async fn live_file_processing<'r>(
    executor: &State<Arc<WorkflowExecutor>>,
    data: Data<'r>,
) -> TextStream![String + 'r] {
    let executor = Arc::clone(executor.inner());
    let guard = RequestGuard::begin(Arc::clone(executor.metrics()));

    TextStream! {
        let _guard = guard;
        let mut lines = BufReader::new(data.open(1.gibibytes())).lines();
        let (results, mut delivered) = mpsc::unbounded_channel::<OperationOutcome>();
        // Dropping the master sender after the input ends lets the receiver
        // run dry exactly when the last workflow finishes.
        let mut intake = Some(results);

        loop {
            let emit: Option<String> = tokio::select! {
                line = lines.next_line(), if intake.is_some() => {
                    match line {
                        Ok(Some(line)) if line.trim().is_empty() => None,
                        Ok(Some(line)) => match parse_live_upload(&line) {
                            Ok(model) => {
                                if let Some(sender) = intake.as_ref() {
                                    let executor = Arc::clone(&executor);
                                    let results = sender.clone();
                                    spawn_blocking(move || {
                                        let handle = executor.process_workflow_streamed(
                                            &model,
                                            Box::new(move |outcome| {
                                                let _ = results.send(outcome);
                                            }),
                                        );
                                        let _ = handle.wait();
                                    });
                                }
                                None
                            }
                            Err(err) => {
                                error!("Error processing incoming file: {err:#}");
                                _guard.fail();
                                Some(format!(
                                    "{}\n",
                                    json!({ "error": format!("Invalid file data: {err}") })
                                ))
                            }
                        },
                        Ok(None) | Err(_) => {
                            intake.take();
                            None
                        }
                    }
                }
                outcome = delivered.recv() => {
                    match outcome {
                        Some(outcome) => serde_json::to_string(&outcome)
                            .ok()
                            .map(|line| format!("{line}\n")),
                        None => break,
                    }
                }
            };

            if let Some(chunk) = emit {
                yield chunk;
            }
        }
    }
}

/// One live upload line becomes a single-file request; an empty operation
/// list defaults to plain validation.
fn parse_live_upload(line: &str) -> Result<ProcessingRequest> {
    let dto: FileUploadDto =
        serde_json::from_str(line).context("Malformed upload line")?;
    let upload = dto.into_model()?;
    let operations = if upload.operations.is_empty() {
        vec![OperationKind::Validate]
    } else {
        upload.operations
    };
    ProcessingRequest::new(vec![upload.file], operations, HashMap::new())
}

pub fn generate_processing_routes() -> Vec<Route> {
    routes![
        process_file,
        stream_file_operations,
        upload_files,
        live_file_processing
    ]
}
