//! Queued-job transport: one JSON envelope per line in, one per line out.

use anyhow::Result;
use fresco_core::{GenerationJob, JobResponse, Orchestrator};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Option<String>,
    input: GenerationJob,
}

#[derive(Debug, Serialize)]
struct Reply {
    id: Option<String>,
    output: JobResponse,
}

/// Processes jobs strictly one at a time until `reader` is exhausted. Bad
/// lines produce an error reply and the loop carries on.
pub async fn run<R, W>(orchestrator: &Orchestrator, mut reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = Vec::new();
    let mut processed = 0usize;

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }

        let reply = match std::str::from_utf8(&line) {
            Ok(text) if text.trim().is_empty() => continue,
            Ok(text) => handle_line(orchestrator, text).await,
            Err(e) => {
                tracing::warn!(error = %e, "job input is not valid UTF-8");
                Reply {
                    id: None,
                    output: JobResponse::failure(format!("invalid job input: {e}")),
                }
            }
        };

        let mut encoded = serde_json::to_vec(&reply)?;
        encoded.push(b'\n');
        writer.write_all(&encoded).await?;
        writer.flush().await?;
        processed += 1;
    }

    tracing::info!(processed, "input closed, worker stopping");
    Ok(())
}

async fn handle_line(orchestrator: &Orchestrator, line: &str) -> Reply {
    let envelope = match serde_json::from_str::<Envelope>(line) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, "invalid job input");
            return Reply {
                id: recover_id(line),
                output: JobResponse::failure(format!("invalid job input: {e}")),
            };
        }
    };

    tracing::info!(id = ?envelope.id, "job received");
    let result = orchestrator.run(envelope.input).await;
    Reply {
        id: envelope.id,
        output: JobResponse::from(result),
    }
}

/// Best effort: keep the caller's id even when the input is unusable.
fn recover_id(line: &str) -> Option<String> {
    let value: Value = serde_json::from_str(line).ok()?;
    value.get("id")?.as_str().map(str::to_string)
}
