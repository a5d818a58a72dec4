// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Process Output Sequencer
//!
//! Wraps one spawned OS process and turns its merged stdout/stderr into a
//! pull-based sequence of [`ProcessRecord`]s: every output line in the order
//! it was read, then exactly one [`ProcessRecord::Exit`] carrying the exit
//! status.
//!
//! Both pipes are drained concurrently by a dedicated reader task, so a
//! process that fills one pipe while the reader waits on the other cannot
//! deadlock. Relative ordering between a stdout line and a stderr line
//! written at nearly the same moment is not guaranteed.
//!
//! The terminal record follows process exit, not pipe EOF. Output still
//! buffered in the pipes when the process exits is forwarded first; a pipe
//! kept open by a detached grandchild is dropped once it goes idle.
//!
//! The reader hands records over through a channel of capacity 1 and only
//! reads further once the consumer has pulled, which bounds buffering to a
//! handful of lines regardless of how much the process writes.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Agent-side process execution

use futures::Stream;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, warn};

use crate::domain::invocation::RunRequest;

/// Exit status reported when the process was terminated by a signal.
pub const SIGNALED_EXIT_STATUS: i32 = -1;

/// After the process exits, a pipe that stays silent this long is closed
/// even if a background child still holds its write end.
pub const EXIT_DRAIN_IDLE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessRecord {
    Line(String),
    /// Terminal record; nothing follows it.
    Exit(i32),
}

#[derive(Debug, Error)]
pub enum SequencerError {
    #[error("Empty executable in run request")]
    EmptyCommand,

    #[error("Failed to spawn '{executable}': {source}")]
    Spawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },
}

pub struct ProcessOutputSequencer {
    pid: Option<u32>,
    receiver: mpsc::Receiver<ProcessRecord>,
}

impl ProcessOutputSequencer {
    /// Spawn `request` with stdin closed and wrap it. Fails without
    /// producing any record when the process cannot be started.
    pub fn spawn(request: &RunRequest) -> Result<Self, SequencerError> {
        if request.executable.is_empty() {
            return Err(SequencerError::EmptyCommand);
        }

        let mut command = Command::new(&request.executable);
        command
            .args(&request.arguments)
            .envs(&request.environment)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|source| SequencerError::Spawn {
            executable: request.executable.clone(),
            source,
        })?;

        Ok(Self::from_child(child))
    }

    /// Wrap an already spawned child whose stdout and stderr are piped.
    pub fn from_child(mut child: Child) -> Self {
        let pid = child.id();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (sender, receiver) = mpsc::channel(1);

        tokio::spawn(pump_output(child, stdout, stderr, sender));

        Self { pid, receiver }
    }

    /// OS process id, if the process had not already been reaped
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Wait for the next record. Returns `None` after the terminal record.
    pub async fn next(&mut self) -> Option<ProcessRecord> {
        self.receiver.recv().await
    }
}

impl Stream for ProcessOutputSequencer {
    type Item = ProcessRecord;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

async fn pump_output<O, E>(
    mut child: Child,
    stdout: Option<O>,
    stderr: Option<E>,
    sender: mpsc::Sender<ProcessRecord>,
) where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let (exited_tx, exited_rx) = watch::channel(false);
    let readers = async {
        tokio::join!(
            forward_lines(stdout, &sender, exited_rx.clone()),
            forward_lines(stderr, &sender, exited_rx)
        )
    };
    tokio::pin!(readers);

    // Completion is decided by the process, not by the pipes: a background
    // child may keep them open long after the build command has exited.
    let finished = tokio::select! {
        open = &mut readers => Err(open),
        result = child.wait() => Ok(result),
    };

    let (wait_result, (stdout_open, stderr_open)) = match finished {
        Ok(result) => {
            let _ = exited_tx.send(true);
            (Some(result), readers.await)
        }
        Err(open) => (None, open),
    };

    if !(stdout_open && stderr_open) {
        debug!(pid = ?child.id(), "Output consumer went away");
        if wait_result.is_none() {
            if let Err(e) = child.start_kill() {
                warn!(error = %e, "Failed to kill abandoned process");
            }
        }
        return;
    }

    let wait_result = match wait_result {
        Some(result) => result,
        None => child.wait().await,
    };
    let status = match wait_result {
        Ok(status) => status.code().unwrap_or(SIGNALED_EXIT_STATUS),
        Err(e) => {
            error!(error = %e, "Failed to wait for process");
            SIGNALED_EXIT_STATUS
        }
    };

    // The consumer may already be gone; nothing left to clean up then
    let _ = sender.send(ProcessRecord::Exit(status)).await;
}

/// Forward every line of `reader` until EOF. Once `exited` flips, the
/// reader only keeps going while output is still arriving within
/// [`EXIT_DRAIN_IDLE`]; the pipe is dropped after that. Returns `false` if
/// the consumer dropped its end.
async fn forward_lines<R>(
    reader: Option<R>,
    sender: &mpsc::Sender<ProcessRecord>,
    mut exited: watch::Receiver<bool>,
) -> bool
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return true;
    };
    let mut reader = BufReader::new(reader);
    // read_until keeps partial input in the buffer when cancelled
    let mut buffer = Vec::new();

    loop {
        let read = if *exited.borrow() {
            match tokio::time::timeout(EXIT_DRAIN_IDLE, reader.read_until(b'\n', &mut buffer)).await {
                Ok(read) => read,
                Err(_) => {
                    if !buffer.is_empty() {
                        debug!("Process exited with a partial line pending");
                        return send_line(sender, &buffer).await;
                    }
                    return true;
                }
            }
        } else {
            tokio::select! {
                read = reader.read_until(b'\n', &mut buffer) => read,
                changed = exited.changed() => {
                    if changed.is_err() {
                        return true;
                    }
                    continue;
                }
            }
        };

        match read {
            // A cancelled read may have left an unterminated line behind
            Ok(0) if !buffer.is_empty() => return send_line(sender, &buffer).await,
            Ok(0) => return true,
            Ok(_) => {
                if !send_line(sender, &buffer).await {
                    return false;
                }
                buffer.clear();
            }
            Err(e) => {
                warn!(error = %e, "Error reading process output");
                return true;
            }
        }
    }
}

async fn send_line(sender: &mpsc::Sender<ProcessRecord>, raw: &[u8]) -> bool {
    let line = String::from_utf8_lossy(trim_line_ending(raw)).into_owned();
    sender.send(ProcessRecord::Line(line)).await.is_ok()
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::collections::HashMap;

    fn shell(script: &str) -> RunRequest {
        RunRequest {
            executable: "sh".to_string(),
            arguments: vec!["-c".to_string(), script.to_string()],
            environment: HashMap::new(),
        }
    }

    async fn collect(sequencer: ProcessOutputSequencer) -> Vec<ProcessRecord> {
        sequencer.collect().await
    }

    #[tokio::test]
    async fn test_lines_then_exit_status() {
        let sequencer = ProcessOutputSequencer::spawn(&shell("echo one; echo two; exit 3")).unwrap();
        assert!(sequencer.pid().is_some());

        assert_eq!(
            collect(sequencer).await,
            vec![
                ProcessRecord::Line("one".to_string()),
                ProcessRecord::Line("two".to_string()),
                ProcessRecord::Exit(3),
            ]
        );
    }

    #[tokio::test]
    async fn test_silent_success_yields_only_terminal_record() {
        let sequencer = ProcessOutputSequencer::spawn(&shell("exit 0")).unwrap();
        assert_eq!(collect(sequencer).await, vec![ProcessRecord::Exit(0)]);
    }

    #[tokio::test]
    async fn test_stderr_is_merged() {
        let sequencer = ProcessOutputSequencer::spawn(&shell("echo out; echo err 1>&2")).unwrap();
        let records = collect(sequencer).await;

        assert_eq!(records.len(), 3);
        assert!(records.contains(&ProcessRecord::Line("out".to_string())));
        assert!(records.contains(&ProcessRecord::Line("err".to_string())));
        assert_eq!(records.last(), Some(&ProcessRecord::Exit(0)));
    }

    #[tokio::test]
    async fn test_large_output_on_both_pipes_does_not_deadlock() {
        let script = "i=0; while [ $i -lt 5000 ]; do echo out$i; echo err$i 1>&2; i=$((i+1)); done";
        let sequencer = ProcessOutputSequencer::spawn(&shell(script)).unwrap();

        let records = tokio::time::timeout(std::time::Duration::from_secs(30), collect(sequencer))
            .await
            .unwrap();
        assert_eq!(records.len(), 10_001);
        assert_eq!(records.last(), Some(&ProcessRecord::Exit(0)));
    }

    #[tokio::test]
    async fn test_terminal_record_follows_exit_not_pipe_eof() {
        // The background sleep inherits stdout and keeps it open
        let sequencer = ProcessOutputSequencer::spawn(&shell("echo hi; sleep 10 &")).unwrap();
        let started = std::time::Instant::now();

        let records = tokio::time::timeout(std::time::Duration::from_secs(5), collect(sequencer))
            .await
            .expect("terminal record waited for the background child");
        assert_eq!(
            records,
            vec![ProcessRecord::Line("hi".to_string()), ProcessRecord::Exit(0)]
        );
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_output_buffered_at_exit_is_not_lost() {
        let script = "i=0; while [ $i -lt 200 ]; do echo line$i; i=$((i+1)); done; sleep 10 &";
        let mut sequencer = ProcessOutputSequencer::spawn(&shell(script)).unwrap();

        // Let the shell exit while nearly all of its output is still unread
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;

        let mut lines = Vec::new();
        while let Some(record) = sequencer.next().await {
            match record {
                ProcessRecord::Line(line) => lines.push(line),
                ProcessRecord::Exit(status) => assert_eq!(status, 0),
            }
        }
        assert_eq!(lines.len(), 200);
        assert_eq!(lines[0], "line0");
        assert_eq!(lines[199], "line199");
    }

    #[tokio::test]
    async fn test_reader_stays_within_channel_capacity() {
        let script = "i=0; while [ $i -lt 2000 ]; do echo line$i; i=$((i+1)); done";
        let mut sequencer = ProcessOutputSequencer::spawn(&shell(script)).unwrap();

        // The process is free to fill its pipe while nobody pulls
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        assert!(sequencer.receiver.len() <= 1);

        assert_eq!(sequencer.next().await, Some(ProcessRecord::Line("line0".to_string())));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(sequencer.receiver.len() <= 1);

        let rest = collect(sequencer).await;
        assert_eq!(rest.len(), 2000);
        assert_eq!(rest[0], ProcessRecord::Line("line1".to_string()));
        assert_eq!(rest.last(), Some(&ProcessRecord::Exit(0)));
    }

    #[tokio::test]
    async fn test_environment_is_passed() {
        let mut request = shell("echo $RELAY_TEST_VALUE");
        request
            .environment
            .insert("RELAY_TEST_VALUE".to_string(), "forty-two".to_string());

        let records = collect(ProcessOutputSequencer::spawn(&request).unwrap()).await;
        assert_eq!(records[0], ProcessRecord::Line("forty-two".to_string()));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let sequencer = ProcessOutputSequencer::spawn(&shell("printf 'a\\377b\\r\\n'")).unwrap();
        let records = collect(sequencer).await;
        assert_eq!(records[0], ProcessRecord::Line("a\u{FFFD}b".to_string()));
    }

    #[tokio::test]
    async fn test_spawn_failure_produces_no_records() {
        let request = RunRequest {
            executable: "/nonexistent/relay-test-binary".to_string(),
            arguments: vec![],
            environment: HashMap::new(),
        };
        let err = ProcessOutputSequencer::spawn(&request).err().unwrap();
        match err {
            SequencerError::Spawn { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_empty_executable_is_rejected() {
        let request = RunRequest {
            executable: String::new(),
            arguments: vec![],
            environment: HashMap::new(),
        };
        assert!(matches!(
            ProcessOutputSequencer::spawn(&request),
            Err(SequencerError::EmptyCommand)
        ));
    }
}
