use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use agdalink_frame::Unit;
use tracing::{debug, trace};

use crate::classify::{classify, Classified};
use crate::error::DispatchError;
use crate::latch::CompletionLatch;
use crate::response::{Class, ClassifyPayload, Event, LastAnnotation};

/// Boxed future returned by a subscriber callback.
pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// The session's single response callback.
pub type Handler = Arc<dyn Fn(Event) -> HandlerFuture + Send + Sync>;

/// Wrap an async closure as a session [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |event| Box::pin(f(event)))
}

/// Whether end-of-turn signaling is live yet.
///
/// The prover prints one prompt on startup, before any interaction. That
/// first prompt is an artifact and must not complete a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arming {
    AwaitingFirstPrompt,
    Armed,
}

/// Where the scheduler is within a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No turn in progress.
    Idle,
    /// Responses arriving, prompt not yet seen.
    Collecting,
    /// Prompt seen; waiting for NonLast handlers to settle.
    Draining,
    /// Emitting the sorted Last tail, one handler at a time.
    Dispatching,
}

/// A Last response parked until its turn ends.
///
/// `seq` is the arrival index; sorting on `(priority, seq)` keeps ties in
/// arrival order regardless of the sort algorithm underneath.
#[derive(Debug)]
struct BufferedLast {
    priority: i32,
    seq: u64,
    payload: String,
}

/// Orchestrates one turn at a time over a session's decoded units.
///
/// NonLast responses are handed off through the [`CompletionLatch`] without
/// blocking the pipeline; Last responses buffer until the armed prompt, then
/// flow out behind a synthetic [`Event::TurnCompleted`] marker, in ascending
/// priority, each callback awaited before the next starts. The same
/// instance serves every turn of the session, so turn N's tail fully drains
/// before turn N+1 can deliver anything.
pub struct Scheduler {
    classifier: Box<dyn ClassifyPayload>,
    handler: Handler,
    latch: CompletionLatch,
    buffer: Vec<BufferedLast>,
    seq: u64,
    arming: Arming,
    phase: Phase,
}

impl Scheduler {
    /// Scheduler with the default `((last . N)` classifier.
    pub fn new(handler: Handler) -> Self {
        Self::with_classifier(Box::new(LastAnnotation), handler)
    }

    /// Scheduler with an explicit payload classifier.
    pub fn with_classifier(classifier: Box<dyn ClassifyPayload>, handler: Handler) -> Self {
        Self {
            classifier,
            handler,
            latch: CompletionLatch::new(),
            buffer: Vec::new(),
            seq: 0,
            arming: Arming::AwaitingFirstPrompt,
            phase: Phase::Idle,
        }
    }

    /// The latch tracking this scheduler's in-flight NonLast handlers.
    pub fn latch(&self) -> &CompletionLatch {
        &self.latch
    }

    /// Feed one decoded unit through classification and turn scheduling.
    ///
    /// Returns immediately for buffered Last responses and NonLast
    /// hand-offs; for an armed prompt it resolves only after the whole
    /// drain-and-dispatch sequence has finished.
    pub async fn handle_unit(&mut self, unit: Unit) {
        match classify(unit, self.classifier.as_ref()) {
            Classified::Error(error) => self.deliver_error(error).await,
            Classified::Prompt => self.handle_prompt().await,
            Classified::Response(Class::NonLast, payload) => {
                if self.phase == Phase::Idle {
                    self.phase = Phase::Collecting;
                }
                trace!(phase = ?self.phase, "non-last response handed off");
                // The callback itself runs now, in arrival order; only its
                // future rides a task. The guard rides along so the turn
                // cannot complete under a still-running handler.
                let guard = self.latch.track();
                let fut = (self.handler)(Event::Response(payload));
                tokio::spawn(async move {
                    fut.await;
                    drop(guard);
                });
            }
            Classified::Response(Class::Last(priority), payload) => {
                if self.phase == Phase::Idle {
                    self.phase = Phase::Collecting;
                }
                let seq = self.seq;
                self.seq += 1;
                trace!(priority, seq, "last response buffered");
                self.buffer.push(BufferedLast {
                    priority,
                    seq,
                    payload,
                });
            }
        }
    }

    /// Forward a session-level failure (transport error) in-band.
    pub async fn handle_session_error(&mut self, reason: impl Into<String>) {
        self.deliver_error(DispatchError::Session(reason.into())).await;
    }

    async fn deliver_error(&self, error: DispatchError) {
        // Errors bypass turn ordering entirely.
        (self.handler)(Event::Error(error)).await;
    }

    async fn handle_prompt(&mut self) {
        if self.arming == Arming::AwaitingFirstPrompt {
            self.arming = Arming::Armed;
            debug!("startup prompt swallowed; end-of-turn signaling armed");
            return;
        }

        self.buffer.sort_by_key(|last| (last.priority, last.seq));

        self.phase = Phase::Draining;
        trace!(
            buffered = self.buffer.len(),
            in_flight = self.latch.in_flight(),
            "turn boundary reached, draining"
        );
        self.latch.drained().await;

        self.phase = Phase::Dispatching;
        (self.handler)(Event::TurnCompleted).await;
        for last in self.buffer.drain(..) {
            trace!(priority = last.priority, "dispatching last response");
            (self.handler)(Event::Response(last.payload)).await;
        }

        self.phase = Phase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use agdalink_frame::{TokenizeError, Tokenizer, PROMPT};

    use super::*;
    use crate::response::ResponseParseError;

    fn prompt() -> Unit {
        Unit::Expr(PROMPT.to_string())
    }

    fn expr(text: &str) -> Unit {
        Unit::Expr(text.to_string())
    }

    /// Handler that records `enter:`/`exit:` lines around an optional
    /// per-event delay, exposing both invocation and settle order.
    fn recording_handler(
        log: Arc<Mutex<Vec<String>>>,
        delay: impl Fn(&Event) -> Duration + Send + Sync + 'static,
    ) -> Handler {
        handler(move |event| {
            let log = Arc::clone(&log);
            let pause = delay(&event);
            let label = match &event {
                Event::Response(payload) => payload.clone(),
                Event::TurnCompleted => "<turn>".to_string(),
                Event::Error(error) => format!("<error:{error}>"),
            };
            async move {
                log.lock().unwrap().push(format!("enter:{label}"));
                if !pause.is_zero() {
                    tokio::time::sleep(pause).await;
                }
                log.lock().unwrap().push(format!("exit:{label}"));
            }
        })
    }

    fn entries(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    async fn settle() {
        // Let spawned NonLast handler tasks run to completion.
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn first_prompt_is_swallowed() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = Scheduler::new(recording_handler(Arc::clone(&log), |_| {
            Duration::ZERO
        }));

        scheduler.handle_unit(prompt()).await;
        settle().await;
        assert!(entries(&log).is_empty(), "startup prompt must not deliver");

        scheduler.handle_unit(prompt()).await;
        assert_eq!(entries(&log), vec!["enter:<turn>", "exit:<turn>"]);
    }

    #[tokio::test]
    async fn non_last_responses_fire_in_arrival_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = Scheduler::new(recording_handler(Arc::clone(&log), |_| {
            Duration::ZERO
        }));
        scheduler.handle_unit(prompt()).await;

        scheduler.handle_unit(expr("(a)")).await;
        scheduler.handle_unit(expr("(b)")).await;
        scheduler.handle_unit(expr("(c)")).await;
        settle().await;

        let log = entries(&log);
        let enters: Vec<_> = log.iter().filter(|l| l.starts_with("enter:")).collect();
        assert_eq!(enters, vec!["enter:(a)", "enter:(b)", "enter:(c)"]);
    }

    #[tokio::test]
    async fn turn_completes_only_after_non_last_handlers_settle() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = Scheduler::new(recording_handler(Arc::clone(&log), |event| {
            match event {
                // Slow NonLast handlers: still in flight when the prompt
                // arrives.
                Event::Response(payload) if !payload.starts_with("((last") => {
                    Duration::from_millis(30)
                }
                _ => Duration::ZERO,
            }
        }));
        scheduler.handle_unit(prompt()).await;

        scheduler.handle_unit(expr("(slow-1)")).await;
        scheduler.handle_unit(expr("(slow-2)")).await;
        scheduler.handle_unit(expr("((last . 1) . (tail))")).await;
        scheduler.handle_unit(prompt()).await;

        let log = entries(&log);
        let turn_at = log.iter().position(|l| l == "enter:<turn>").unwrap();
        for exit in ["exit:(slow-1)", "exit:(slow-2)"] {
            let exit_at = log.iter().position(|l| l == exit).unwrap();
            assert!(
                exit_at < turn_at,
                "{exit} must settle before the turn marker, got {log:?}"
            );
        }
        assert_eq!(log.last().unwrap(), "exit:((last . 1) . (tail))");
    }

    #[tokio::test]
    async fn last_responses_sort_by_priority_with_stable_ties() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = Scheduler::new(recording_handler(Arc::clone(&log), |_| {
            Duration::ZERO
        }));
        scheduler.handle_unit(prompt()).await;

        scheduler.handle_unit(expr("((last . 2) . (second-a))")).await;
        scheduler.handle_unit(expr("((last . 1) . (first))")).await;
        scheduler.handle_unit(expr("((last . 2) . (second-b))")).await;
        scheduler.handle_unit(prompt()).await;

        let enters: Vec<_> = entries(&log)
            .into_iter()
            .filter(|l| l.starts_with("enter:"))
            .collect();
        assert_eq!(
            enters,
            vec![
                "enter:<turn>",
                "enter:((last . 1) . (first))",
                "enter:((last . 2) . (second-a))",
                "enter:((last . 2) . (second-b))",
            ]
        );
    }

    #[tokio::test]
    async fn last_dispatch_is_strictly_sequential() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = Scheduler::new(recording_handler(Arc::clone(&log), |event| {
            match event {
                Event::Response(_) => Duration::from_millis(15),
                _ => Duration::ZERO,
            }
        }));
        scheduler.handle_unit(prompt()).await;

        scheduler.handle_unit(expr("((last . 1) . (x))")).await;
        scheduler.handle_unit(expr("((last . 2) . (y))")).await;
        scheduler.handle_unit(expr("((last . 3) . (z))")).await;
        scheduler.handle_unit(prompt()).await;

        // Every exit must come before the next enter: no interleaving.
        let log = entries(&log);
        let mut open: Option<&str> = None;
        for line in &log {
            if let Some(label) = line.strip_prefix("enter:") {
                assert!(open.is_none(), "handler started while {open:?} ran: {log:?}");
                open = Some(label);
            } else if let Some(label) = line.strip_prefix("exit:") {
                assert_eq!(open, Some(label));
                open = None;
            }
        }
    }

    #[tokio::test]
    async fn spec_example_two_chunks() {
        // Chunks ["(a) (b", ") Agda2>"] where (a) is NonLast and (b) is
        // Last(1): (a) fires immediately, (b) follows the turn marker.
        let log = Arc::new(Mutex::new(Vec::new()));

        struct SecondIsLast;
        impl ClassifyPayload for SecondIsLast {
            fn classify(&self, expr: &str) -> Result<Class, ResponseParseError> {
                Ok(if expr == "(b)" {
                    Class::Last(1)
                } else {
                    Class::NonLast
                })
            }
        }

        let mut scheduler = Scheduler::with_classifier(
            Box::new(SecondIsLast),
            recording_handler(Arc::clone(&log), |_| Duration::ZERO),
        );
        // Arm end-of-turn signaling the way a real session does: the
        // startup prompt has already been seen.
        scheduler.handle_unit(prompt()).await;

        let mut tokenizer = Tokenizer::new();
        let mut units = Vec::new();
        tokenizer.feed(b"(a) (b", |unit| units.push(unit));
        tokenizer.feed(b") Agda2>", |unit| units.push(unit));
        tokenizer.finish(|unit| units.push(unit));

        for unit in units {
            scheduler.handle_unit(unit).await;
        }
        settle().await;

        let enters: Vec<_> = entries(&log)
            .into_iter()
            .filter(|l| l.starts_with("enter:"))
            .collect();
        assert_eq!(enters, vec!["enter:(a)", "enter:<turn>", "enter:(b)"]);
    }

    #[tokio::test]
    async fn errors_deliver_immediately_without_advancing_the_turn() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = Scheduler::new(recording_handler(Arc::clone(&log), |_| {
            Duration::ZERO
        }));
        scheduler.handle_unit(prompt()).await;

        scheduler.handle_unit(expr("((last . 9) . (tail))")).await;
        scheduler
            .handle_unit(Unit::Malformed {
                fragment: ")".to_string(),
                error: TokenizeError::UnbalancedClose,
            })
            .await;

        // The error arrived mid-turn, before any prompt.
        let mid_turn = entries(&log);
        assert_eq!(mid_turn.len(), 2);
        assert!(mid_turn[0].starts_with("enter:<error:"));

        // The buffered Last still dispatches normally afterwards.
        scheduler.handle_unit(prompt()).await;
        let log = entries(&log);
        assert!(log.contains(&"enter:<turn>".to_string()));
        assert_eq!(log.last().unwrap(), "exit:((last . 9) . (tail))");
    }

    #[tokio::test]
    async fn session_errors_are_forwarded_in_band() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = Scheduler::new(recording_handler(Arc::clone(&log), |_| {
            Duration::ZERO
        }));
        scheduler.handle_session_error("broken pipe").await;
        let log = entries(&log);
        assert!(log[0].contains("broken pipe"));
    }

    #[tokio::test]
    async fn consecutive_turns_reuse_the_pipeline() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = Scheduler::new(recording_handler(Arc::clone(&log), |_| {
            Duration::ZERO
        }));
        scheduler.handle_unit(prompt()).await;

        scheduler.handle_unit(expr("((last . 1) . (t1))")).await;
        scheduler.handle_unit(prompt()).await;
        scheduler.handle_unit(expr("((last . 1) . (t2))")).await;
        scheduler.handle_unit(prompt()).await;

        let enters: Vec<_> = entries(&log)
            .into_iter()
            .filter(|l| l.starts_with("enter:"))
            .collect();
        assert_eq!(
            enters,
            vec![
                "enter:<turn>",
                "enter:((last . 1) . (t1))",
                "enter:<turn>",
                "enter:((last . 1) . (t2))",
            ]
        );
    }
}
