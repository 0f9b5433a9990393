use agdalink_dispatch::{handler, DispatchError, Event};
use agdalink_process::{ProcessSession, Request, SessionConfig};
use tokio::sync::mpsc;

use crate::cmd::{parse_duration, LoadArgs};
use crate::exit::{connection_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_event, OutputFormat};

pub async fn run(args: LoadArgs, format: OutputFormat) -> CliResult<i32> {
    let deadline = parse_duration(&args.timeout)
        .ok_or_else(|| CliError::new(USAGE, format!("bad --timeout value {:?}", args.timeout)))?;

    let config = SessionConfig {
        executable: args.path,
        program: args.program,
        ..SessionConfig::default()
    };

    let mut session = ProcessSession::open(config)
        .await
        .map_err(|err| connection_error("open", err))?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    session
        .subscribe(handler(move |event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event);
            }
        }))
        .map_err(|err| connection_error("subscribe", err))?;

    session
        .send(&Request::new(args.file, "Cmd_load {file} {libraries}"))
        .await
        .map_err(|err| connection_error("send", err))?;

    // Print everything up to and including the completed turn's tail. The
    // tail arrives after TurnCompleted, so drain until the channel idles.
    let mut code = SUCCESS;
    let mut turn_done = false;
    loop {
        let next = if turn_done {
            // Tail events follow immediately; a short idle ends the drain.
            match tokio::time::timeout(std::time::Duration::from_millis(200), rx.recv()).await {
                Ok(event) => event,
                Err(_) => break,
            }
        } else {
            match tokio::time::timeout(deadline, rx.recv()).await {
                Ok(event) => event,
                Err(_) => {
                    session.close().await;
                    return Err(CliError::new(
                        TIMEOUT,
                        format!("no completed turn within {}", args.timeout),
                    ));
                }
            }
        };

        let Some(event) = next else {
            break;
        };
        print_event(&event, format);
        match &event {
            Event::TurnCompleted => turn_done = true,
            Event::Error(DispatchError::Session(_)) => {
                code = FAILURE;
                break;
            }
            _ => {}
        }
    }

    session.close().await;
    Ok(code)
}
