use std::process::Stdio;

use agdalink_dispatch::{ClassifyPayload, Handler, Scheduler};
use agdalink_frame::UnitCodec;
use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::error::{ConnectionError, Result};
use crate::metadata::{probe, resolve_executable, SessionMetadata};
use crate::request::{encode, Request};

/// One long-lived connection to an interaction process.
///
/// The session exclusively owns the child and its pipeline; nothing else
/// writes to the process. Requests go down through [`send`](Self::send);
/// everything coming back is framed, classified, and turn-ordered before it
/// reaches the single subscriber.
pub struct ProcessSession {
    metadata: SessionMetadata,
    config: SessionConfig,
    child: Child,
    stdin: ChildStdin,
    /// Present until `subscribe` moves it into the reader task.
    stdout: Option<ChildStdout>,
    reader_task: Option<JoinHandle<()>>,
    stderr_task: JoinHandle<()>,
    closed: bool,
}

impl ProcessSession {
    /// Resolve, validate, and spawn the interaction process.
    ///
    /// The executable comes from configuration or a PATH search, is
    /// tilde-expanded, and must pass the `--version` probe before the
    /// long-lived process is spawned with `--interaction`.
    pub async fn open(config: SessionConfig) -> Result<Self> {
        let path = resolve_executable(&config)?;
        let metadata = probe(&path, &config.args).await?;

        let mut child = tokio::process::Command::new(&metadata.path)
            .args(&metadata.args)
            .arg("--interaction")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ConnectionError::Process(std::io::Error::other("no stdin handle")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ConnectionError::Process(std::io::Error::other("no stdout handle")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ConnectionError::Process(std::io::Error::other("no stderr handle")))?;

        // Stderr is not part of the protocol; drain it so the child never
        // blocks on a full pipe, surfacing lines only through logging.
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(%line, "prover stderr");
            }
        });

        info!(
            path = %metadata.path.display(),
            version = %metadata.version,
            "interaction process spawned"
        );

        Ok(Self {
            metadata,
            config,
            child,
            stdin,
            stdout: Some(stdout),
            reader_task: None,
            stderr_task,
            closed: false,
        })
    }

    /// Identity of the validated installation backing this session.
    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    /// The version negotiated by the probe.
    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    /// Register the session's single response callback and start the
    /// pipeline. Holds for the session's whole lifetime; a second call
    /// fails with [`ConnectionError::AlreadySubscribed`].
    pub fn subscribe(&mut self, handler: Handler) -> Result<()> {
        self.subscribe_with(handler, None)
    }

    /// Like [`subscribe`](Self::subscribe) with an explicit payload
    /// classifier instead of the default.
    pub fn subscribe_with(
        &mut self,
        handler: Handler,
        classifier: Option<Box<dyn ClassifyPayload>>,
    ) -> Result<()> {
        if self.closed {
            return Err(ConnectionError::Closed);
        }
        let stdout = self.stdout.take().ok_or(ConnectionError::AlreadySubscribed)?;

        let mut scheduler = match classifier {
            Some(classifier) => Scheduler::with_classifier(classifier, handler),
            None => Scheduler::new(handler),
        };

        self.reader_task = Some(tokio::spawn(async move {
            let mut units = FramedRead::new(stdout, UnitCodec::new());
            while let Some(next) = units.next().await {
                match next {
                    Ok(unit) => {
                        trace!(?unit, "unit received");
                        scheduler.handle_unit(unit).await;
                    }
                    Err(err) => {
                        warn!(%err, "interaction stream failed");
                        scheduler.handle_session_error(err.to_string()).await;
                        break;
                    }
                }
            }
            debug!("interaction stream ended");
        }));

        Ok(())
    }

    /// Encode and write one request. Fire-and-forget: replies arrive later
    /// through the subscriber.
    pub async fn send(&mut self, request: &Request) -> Result<()> {
        if self.closed {
            return Err(ConnectionError::Closed);
        }
        let line = encode(request, &self.metadata.version, &self.config);
        trace!(%line, "request sent");
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Tear the session down. Idempotent. Buffered-but-undelivered turn
    /// state dies with the pipeline; callers who care about delivery
    /// guarantees must not close mid-turn.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        self.stderr_task.abort();
        if let Err(err) = self.child.kill().await {
            debug!(%err, "child already gone at close");
        }
        info!("session closed");
    }
}
