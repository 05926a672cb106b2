use lexdesk_core::MotionRequest;

/// Contract text beyond this many characters is cut before prompting.
pub const MAX_CONTRACT_CHARS: usize = 120_000;

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Prompt for a structured contract review. The model must answer with the
/// JSON shape `AnalysisResult` deserializes.
pub fn contract_prompt(text: &str, jurisdiction: &str) -> String {
    let mut s = String::new();
    s.push_str("You are an experienced contract attorney.\n");
    s.push_str(&format!(
        "Review the contract below under the law of {jurisdiction}.\n\n"
    ));
    s.push_str(
        "Respond ONLY with JSON: {\"summary\":\"...\",\
         \"risks\":[{\"clause\":\"...\",\"severity\":\"low|medium|high|critical\",\"description\":\"...\"}],\
         \"missing_clauses\":[\"...\"],\"suggested_fixes\":[\"...\"],\
         \"key_dates\":[{\"label\":\"...\",\"date\":\"YYYY-MM-DD\"}]}\n",
    );
    s.push_str("Use ISO dates where the contract states a calendar date.\n\n---\n\n");
    s.push_str(truncate(text, MAX_CONTRACT_CHARS));
    s
}

pub fn research_prompt(query: &str, jurisdiction: &str) -> String {
    format!(
        "You are a legal research assistant for {jurisdiction}.\n\n\
         Question: {query}\n\n\
         Respond ONLY with JSON: {{\"answer\":\"...\",\"citations\":[\"...\"]}}. \
         Cite statutes and cases by their official citation."
    )
}

pub fn motion_prompt(req: &MotionRequest) -> String {
    let mut s = format!(
        "Draft a {} for filing in {}.\n\n",
        req.motion_type, req.jurisdiction
    );
    if !req.case_caption.is_empty() {
        s.push_str(&format!("Caption: {}\n\n", req.case_caption));
    }
    s.push_str(&format!("Facts:\n{}\n", req.facts));
    if !req.relief_sought.is_empty() {
        s.push_str(&format!("\nRelief sought:\n{}\n", req.relief_sought));
    }
    s.push_str("\nRespond ONLY with JSON: {\"title\":\"...\",\"body\":\"...\"}.");
    s
}
