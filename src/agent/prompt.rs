use crate::{
    agent::{
        agent_model::StrategyContext,
        milestone::{MilestoneSpec, MilestoneTrigger},
    },
    screen::screen_model::Resolution,
};

/// Build the request text for one step.
///
/// The prompt carries the task, the step counter, milestone flags, a short
/// list of recent actions (so the service does not repeat itself), the
/// coordinate frame of the attached screenshot, and the reply grammar for the
/// current phase.
pub fn build_prompt(ctx: &StrategyContext<'_>, frame: Resolution) -> String {
    let progress = ctx.state.progress();

    let flags = progress
        .statuses()
        .iter()
        .map(|s| format!("- {}: {}", s.name, if s.achieved { "done" } else { "pending" }))
        .collect::<Vec<_>>()
        .join("\n");

    let recent = if ctx.recent.is_empty() {
        "(none)".to_string()
    } else {
        ctx.recent
            .iter()
            .map(|e| format!("- {}", e.summary()))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let app = ctx
        .task
        .app
        .as_ref()
        .map(|a| a.identifier.as_str())
        .unwrap_or("unknown");

    format!(
r#"Task: {task}
App: {app}
Step: {step}/{max}

Progress:
{flags}

Recent actions (do NOT repeat an action that left the screen unchanged):
{recent}

The screenshot is {w}x{h} pixels; give coordinates in that frame.

CRITICAL: Respond with ONLY ONE action line in the exact format shown below.

{phase}

Do NOT provide explanations. Only respond with the action line."#,
        task = ctx.task.instruction,
        app = app,
        step = ctx.state.step_index() + 1,
        max = ctx.max_steps,
        flags = if flags.is_empty() { "(no milestones)".to_string() } else { flags },
        recent = recent,
        w = frame.width,
        h = frame.height,
        phase = phase_guidance(progress.next_pending(), ctx.task.query_text().as_deref()),
    )
}

fn phase_guidance(pending: Option<&MilestoneSpec>, query: Option<&str>) -> String {
    match pending.map(|m| &m.trigger) {
        Some(MilestoneTrigger::TapMatching { keywords }) => format!(
            "Locate the element to tap next (look for: {}).\n\n\
             RESPOND WITH EXACTLY ONE OF THESE:\n\
             TAP (x,y) # Search bar\n\
             TAP (x,y) # Search icon\n\
             SCROLL down # to find it",
            keywords.join(", ")
        ),
        Some(MilestoneTrigger::TextEntered) => format!(
            "Look for a text input field or search box where you can type.\n\n\
             RESPOND WITH EXACTLY ONE OF THESE:\n\
             TYPE '{}' # search query\n\
             TAP (x,y) # search input field\n\
             SCROLL down # to find input",
            query.unwrap_or("<query>")
        ),
        Some(MilestoneTrigger::CompletionClaimed) | None => "Look for search results or product filters.\n\n\
             RESPOND WITH EXACTLY ONE OF THESE:\n\
             TAP (x,y) # product or filter\n\
             SCROLL down # see more results\n\
             BACK # leave this screen\n\
             TASK_COMPLETE: <what was found>"
            .to_string(),
    }
}
