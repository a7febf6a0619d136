use regex::Regex;
use std::sync::OnceLock;

const FENCE: &str = "```";

/// Lines carrying one of these are prose, not code.
const NARRATIVE_MARKERS: &[&str] = &[
    "Main changes:",
    "Key changes:",
    "Changes made:",
    "Explanation:",
    "Please check",
    "Please review",
    "主要变更:",
    "请查看",
];

/// A line carrying one of these opens a "how to run it" section that lasts
/// until the end of the fenced block following it.
const COMMAND_MARKERS: &[&str] = &[
    "Test execution command:",
    "To run the test",
    "Run the test with",
    "测试执行命令:",
];

fn think_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"))
}

/// Returns just the code of an oracle response.
pub fn clean_generated_code(response: &str) -> String {
    let without_reasoning = think_re().replace_all(response, "");
    let code = extract_fenced_block(&without_reasoning).unwrap_or(&*without_reasoning);

    let mut kept: Vec<&str> = Vec::new();
    let mut skipping = false;
    let mut in_fence = false;

    for line in code.lines() {
        if skipping {
            if line.trim_start().starts_with(FENCE) {
                if in_fence {
                    skipping = false;
                }
                in_fence = !in_fence;
            }
            continue;
        }
        if COMMAND_MARKERS.iter().any(|m| line.contains(m)) {
            skipping = true;
            in_fence = false;
            continue;
        }
        if NARRATIVE_MARKERS.iter().any(|m| line.contains(m)) {
            continue;
        }
        if line.trim_start().starts_with(FENCE) {
            continue;
        }
        kept.push(line);
    }

    let mut out = kept.join("\n").trim().to_string();
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Body of the first ```go block, or of the first untagged block when none is
/// tagged `go`. Blocks in other languages (shell snippets) never count. The
/// block runs to the next fence line or to the end of text.
fn extract_fenced_block(text: &str) -> Option<&str> {
    let mut fences: Vec<(usize, usize, &str)> = Vec::new();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim();
        if let Some(tag) = trimmed.strip_prefix(FENCE) {
            fences.push((offset, offset + line.len(), tag.trim()));
        }
        offset += line.len();
    }

    let mut i = 0;
    let mut first_untagged: Option<&str> = None;
    while i < fences.len() {
        let (_, body_start, tag) = fences[i];
        let body_end = fences.get(i + 1).map(|f| f.0).unwrap_or(text.len());
        let body = &text[body_start..body_end];
        if tag == "go" || tag == "golang" {
            return Some(body);
        }
        if tag.is_empty() {
            first_untagged.get_or_insert(body);
        }
        i += 2;
    }
    first_untagged
}
