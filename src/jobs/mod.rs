// src/jobs/mod.rs — Background summarization worker
//
// The webhook processor enqueues and moves on; it never blocks on or retries
// summarization. The worker fetches the transcript blob, asks the model for
// a summary, stores it, and completes the meeting.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::provider::{parse_transcript_jsonl, ChatModel, ModelMessage};
use crate::store::StoreHandle;

/// Keep prompts bounded for very long meetings.
const MAX_TRANSCRIPT_CHARS: usize = 24_000;

const SUMMARY_SYSTEM_PROMPT: &str = "You are an expert meeting note-taker. You are given the \
transcript of a meeting between participants and an AI agent. Write a concise summary: an \
overview paragraph followed by the key points, decisions, and action items discussed. Refer to \
speakers by their ids when names are unavailable.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizeJob {
    pub meeting_id: String,
    pub transcript_url: String,
}

/// Fire-and-forget handle to the summarization queue.
#[derive(Clone)]
pub struct SummaryQueue {
    tx: mpsc::Sender<SummarizeJob>,
}

impl SummaryQueue {
    pub fn enqueue(&self, job: SummarizeJob) {
        if let Err(e) = self.tx.try_send(job) {
            // Dropping the job leaves the meeting in PROCESSING; the operator
            // can re-deliver the transcription webhook to retry.
            error!("summarization queue rejected job: {e}");
        }
    }
}

/// A queue plus its receiving end, for wiring a worker (or a test observer).
pub fn queue(capacity: usize) -> (SummaryQueue, mpsc::Receiver<SummarizeJob>) {
    let (tx, rx) = mpsc::channel(capacity);
    (SummaryQueue { tx }, rx)
}

pub fn spawn_summary_worker(
    store: StoreHandle,
    model: Arc<dyn ChatModel>,
) -> (SummaryQueue, tokio::task::JoinHandle<()>) {
    let (summary_queue, rx) = queue(64);
    let join_handle = tokio::spawn(run_summary_worker(store, model, rx));
    (summary_queue, join_handle)
}

async fn run_summary_worker(
    store: StoreHandle,
    model: Arc<dyn ChatModel>,
    mut rx: mpsc::Receiver<SummarizeJob>,
) {
    let http = reqwest::Client::new();
    while let Some(job) = rx.recv().await {
        let meeting_id = job.meeting_id.clone();
        match summarize(&store, model.as_ref(), &http, job).await {
            Ok(()) => info!("meeting {meeting_id} summarized and completed"),
            Err(e) => error!("summarizing meeting {meeting_id}: {e}"),
        }
    }
}

async fn summarize(
    store: &StoreHandle,
    model: &dyn ChatModel,
    http: &reqwest::Client,
    job: SummarizeJob,
) -> anyhow::Result<()> {
    let raw = http
        .get(&job.transcript_url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let items = parse_transcript_jsonl(&raw);
    if items.is_empty() {
        warn!(
            "transcript for meeting {} is empty or unparseable",
            job.meeting_id
        );
    }

    let mut transcript = String::new();
    for item in &items {
        if transcript.len() >= MAX_TRANSCRIPT_CHARS {
            transcript.push_str("\n[transcript truncated]");
            break;
        }
        transcript.push_str(&format!("{}: {}\n", item.speaker_id, item.text));
    }

    let summary = model
        .complete(
            SUMMARY_SYSTEM_PROMPT,
            &[ModelMessage::user(format!(
                "Summarize the following meeting transcript:\n\n{transcript}"
            ))],
        )
        .await?;

    store.set_summary(&job.meeting_id, &summary).await?;
    if !store.complete_processing(&job.meeting_id).await? {
        warn!(
            "meeting {} was not in PROCESSING when its summary landed",
            job.meeting_id
        );
    }
    Ok(())
}
