use agdalink_process::{probe, resolve_executable, SessionConfig};

use crate::cmd::ProbeArgs;
use crate::exit::{connection_error, CliResult, SUCCESS};
use crate::output::{print_kv, OutputFormat};

pub async fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = SessionConfig {
        executable: args.path,
        program: args.program,
        ..SessionConfig::default()
    };

    let path = resolve_executable(&config).map_err(|err| connection_error("resolve", err))?;
    let metadata = probe(&path, &config.args)
        .await
        .map_err(|err| connection_error("probe", err))?;

    print_kv(
        &[
            ("path", metadata.path.display().to_string()),
            ("version", metadata.version.clone()),
        ],
        format,
    );

    Ok(SUCCESS)
}
