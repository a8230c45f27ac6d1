use super::{
    AgentLaunchContext, format_binary_invocation, resolve_agent_binary, resumption_args,
    split_extra_args,
};

pub const BYPASS_SANDBOX_FLAG: &str = "--dangerously-bypass-approvals-and-sandbox";

pub fn launch_command(ctx: &AgentLaunchContext) -> String {
    let binary = match ctx.binary_override {
        Some(path) => path.to_string(),
        None => resolve_agent_binary("codex"),
    };

    let mut parts = vec![format_binary_invocation(&binary), resumption_args(ctx)];

    if ctx.skip_permissions {
        parts.push(BYPASS_SANDBOX_FLAG.to_string());
    }

    // codex has no MCP config flag; a configured path is simply not applicable.
    if ctx.mcp_config_path.is_some() {
        log::debug!("Ignoring MCP config path for codex launch");
    }

    parts.extend(split_extra_args(ctx.extra_args));

    parts.retain(|p| !p.is_empty());
    parts.join(" ")
}
