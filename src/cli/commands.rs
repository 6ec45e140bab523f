use std::time::Duration;

use tracing::info;

use crate::agent::{
    agent_model::Strategy,
    ai_model::{ChatCompletionsBackend, InferenceStrategy},
    config::AgentConfig,
    coordinator::ActionCoordinator,
    error::{AgentError, AgentResult},
    last_resort::LastResortStrategy,
    runner::TaskRunner,
    structural::StructuralStrategy,
    task::Task,
};
use crate::cli::config::{AppConfig, InferenceMode, OutputFormat, RunArgs, build_agent_config};
use crate::device::adb::AdbDevice;
use crate::report::console::{format_console_report, format_json_report};
use crate::trace::logger::TraceLogger;

// ============================================================================
// run subcommand
// ============================================================================

/// Run one task and return whether it completed.
pub fn cmd_run(args: &RunArgs, config: &AppConfig) -> AgentResult<bool> {
    let agent = build_agent_config(config, args)?;
    let task = Task::new(&args.task, args.app.as_deref());

    let strategies = build_strategies(args.inference, config, &agent)?;

    let serial = args.serial.as_deref().or(config.device.serial.as_deref());
    let device = AdbDevice::connect(
        &config.device.adb_binary,
        serial,
        agent.device_timeout(),
        Duration::from_millis(config.device.settle_ms),
    )?;

    info!(
        task = %task.instruction,
        app = task.app.as_ref().map(|a| a.package.as_str()).unwrap_or("-"),
        serial = device.serial(),
        "run configured"
    );

    let coordinator = ActionCoordinator::new(task, agent, strategies, device);
    let mut runner = TaskRunner::new(coordinator);
    if let Some(path) = &args.trace {
        runner = runner.with_tracer(TraceLogger::new(path));
    }

    let report = runner.run();

    let rendered = match args.format {
        OutputFormat::Console => format_console_report(&report),
        OutputFormat::Json => format_json_report(&report)? + "\n",
    };
    print!("{}", rendered);

    Ok(report.succeeded())
}

/// Strategy chain in priority order. Offline mode leaves out inference.
pub fn build_strategies(
    mode: InferenceMode,
    config: &AppConfig,
    agent: &AgentConfig,
) -> AgentResult<Vec<Box<dyn Strategy>>> {
    let mut strategies: Vec<Box<dyn Strategy>> = Vec::new();

    if mode == InferenceMode::Chat {
        let token = std::env::var(&config.inference.token_env).map_err(|_| {
            AgentError::Config(format!(
                "{} is not set (use --inference offline to run without a reasoning service)",
                config.inference.token_env
            ))
        })?;

        let backend = ChatCompletionsBackend::new(
            &config.inference.endpoint,
            &config.inference.model,
            &token,
        )
        .with_sampling(config.inference.temperature, config.inference.max_tokens);

        strategies.push(Box::new(InferenceStrategy::new(
            Box::new(backend),
            agent.inference_timeout(),
            agent.reference_max_dimension,
        )));
    }

    strategies.push(Box::new(StructuralStrategy));
    strategies.push(Box::new(LastResortStrategy));
    Ok(strategies)
}
