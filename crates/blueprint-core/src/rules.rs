//! Architecture plan rules. Single source of truth for model prompts and the
//! MCP `get_rules` tool.

/// Output shape every response must follow.
pub const OUTPUT_RULES: &str = "\
Return ONLY JSON (no markdown outside the JSON block, no extra text). \
The JSON MUST be a single object with exactly these four keys:\n\
{\n\
  \"summary\": \"An HTML-formatted architecture summary.\",\n\
  \"pattern_id\": \"id of the pattern you are closest to (or 'custom' if none fits)\",\n\
  \"components\": [\n\
    {\"id\": \"short_id\", \"label\": \"Readable name\", \"type\": \"e.g. web, app, db, cache, queue, mobile_client\"}\n\
  ],\n\
  \"connections\": [\n\
    {\"from\": \"component_id\", \"to\": \"component_id\", \"label\": \"protocol or purpose\"}\n\
  ]\n\
}\n\
IDs must be valid graph node identifiers (letters, digits, underscores only). \
Use about 4-12 components to keep the diagram readable.";

/// Structure and length of the `summary` field.
pub const SUMMARY_RULES: &str = "\
The `summary` field MUST be valid HTML, not markdown. Use exactly these sections:\n\
- <h3>Overview</h3>\n\
- <h3>Key Components</h3>\n\
- <h3>Data Flow</h3>\n\
- <h3>Scalability & Reliability</h3>\n\
Within each section, use <ul><li>...</li></ul> bullet lists, nesting lists where a point has sub-points.\n\n\
SUMMARY LENGTH RULES:\n\
- Keep the HTML formatting EXACTLY as above (h3 headings + bullet lists).\n\
- Shorten each bullet point using brief, telegraphic text.\n\
- Keep the meaning but remove verbosity.\n\
- Target 40-60% of the usual summary length.";

/// How a previous plan constrains a follow-up turn.
pub const REFINEMENT_RULES: &str = "\
REFINEMENT RULES:\n\
- If a previous architecture plan is provided, treat it as the authoritative BASELINE.\n\
- Keep existing component IDs and labels as stable as possible.\n\
- Prefer to ADD components or connections rather than renaming or deleting.\n\
- Only change or remove existing components if the new requirements clearly conflict with them.\n\
- If a previous pattern_id is provided, keep the same pattern_id unless the new requirements explicitly conflict with it.";

/// All rules joined, as shown to MCP clients.
pub fn all_rules() -> String {
    format!("{OUTPUT_RULES}\n\n{SUMMARY_RULES}\n\n{REFINEMENT_RULES}")
}
