use super::{
    AgentLaunchContext, format_binary_invocation, resolve_agent_binary, resumption_args, sh_quote,
    split_extra_args,
};

pub const SKIP_PERMISSIONS_FLAG: &str = "--dangerously-skip-permissions";

pub fn launch_command(ctx: &AgentLaunchContext) -> String {
    let binary = match ctx.binary_override {
        Some(path) => path.to_string(),
        None => resolve_agent_binary("claude"),
    };

    let mut parts = vec![format_binary_invocation(&binary), resumption_args(ctx)];

    if ctx.skip_permissions {
        parts.push(SKIP_PERMISSIONS_FLAG.to_string());
    }

    if let Some(path) = ctx.mcp_config_path {
        parts.push(format!(
            "--mcp-config {}",
            sh_quote(&path.display().to_string())
        ));
    }

    parts.extend(split_extra_args(ctx.extra_args));

    parts.retain(|p| !p.is_empty());
    parts.join(" ")
}
