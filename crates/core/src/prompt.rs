const TEMPLATE: &str = include_str!("./system_prompt.md");

const DEFAULT_INSTRUCTIONS: &str = "You are a helpful assistant that solves \
    the user's request step by step, using the available tools when needed.";

const NO_TOOLS: &str = "(no tools are available, answer directly or abort)";

/// Renders the system prompt with the decision format and the tool catalog.
pub fn render_system_prompt(instructions: Option<&str>, catalog: &str) -> String {
    let catalog = if catalog.trim().is_empty() {
        NO_TOOLS
    } else {
        catalog
    };
    TEMPLATE
        .replace("{{INSTRUCTIONS}}", instructions.unwrap_or(DEFAULT_INSTRUCTIONS))
        .replace("{{TOOLS}}", catalog)
}
