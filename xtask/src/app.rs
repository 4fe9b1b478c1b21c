use anyhow::Result;

pub fn run(cli: crate::cli::Cli) -> Result<()> {
    match cli.cmd {
        crate::cli::Cmd::Scenario {
            deferred_us,
            hang,
            json,
        } => crate::tasks::scenario::run(&crate::tasks::scenario::ScenarioOptions {
            deferred_us,
            hang,
            json,
        }),
        crate::cli::Cmd::Exercise {
            size_mb,
            threads,
            requests,
            request_kb,
            completion,
            deferred_us,
            json,
        } => crate::tasks::exercise::run(&crate::tasks::exercise::ExerciseOptions {
            size_mb,
            threads,
            requests,
            request_kb,
            completion,
            deferred_us,
            json,
        }),
        crate::cli::Cmd::Ioctl {
            cmd,
            size_mb,
            warmup,
            json,
        } => crate::tasks::diag::run(cmd, size_mb, warmup, json),
    }
}
