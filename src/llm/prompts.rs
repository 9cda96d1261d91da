//! Prompt templates for the tiered answer strategies

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use super::ChatMessage;
use crate::models::SearchResult;
use crate::models::SubAnswer;
use crate::text::truncate_chars;
use crate::text::truncate_str;

/// Excerpt length of each document grounding a sub-answer
pub const SUB_ANSWER_DOC_CHARS: usize = 400;
/// Documents grounding a sub-answer
pub const SUB_ANSWER_DOCS: usize = 2;
/// Sub-answer length inside the final synthesis prompt
pub const SUMMARY_ANSWER_CHARS: usize = 200;
/// Sources listed per sub-question in the final synthesis prompt
pub const SUMMARY_SOURCES: usize = 2;
/// Supporting document excerpts in the final synthesis prompt
pub const FINAL_DOCS: usize = 5;
pub const FINAL_DOC_CHARS: usize = 300;
/// Shortest decomposed sub-question kept, in characters
pub const MIN_SUB_QUESTION_CHARS: usize = 6;

/// Template for generating prompts
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    variables: Vec<String>,
}

impl PromptTemplate {
    /// Create a new prompt template
    pub fn new(template: impl Into<String>) -> Self {
        let template = template.into();
        let variables = extract_variables(&template);
        Self {
            template,
            variables,
        }
    }

    /// Fill in the template with variables
    ///
    /// Placeholders are resolved in a single pass over the template, so
    /// `{{name}}` text inside a substituted value is written out verbatim.
    /// Unknown placeholders are kept as they appear.
    #[must_use]
    pub fn render(&self, values: &HashMap<&str, String>) -> String {
        let mut output = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(start) = rest.find("{{") {
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                break;
            };
            output.push_str(&rest[..start]);
            match values.get(after[..end].trim()) {
                Some(value) => output.push_str(value),
                None => output.push_str(&rest[start..start + 2 + end + 2]),
            }
            rest = &after[end + 2..];
        }

        output.push_str(rest);
        output
    }

    /// Get required variables
    #[must_use]
    pub fn variables(&self) -> &[String] {
        &self.variables
    }
}

/// Extract `{{name}}` variable names from template
fn extract_variables(template: &str) -> Vec<String> {
    let mut variables = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        let name = after[..end].trim();
        if !name.is_empty() && !variables.iter().any(|v| v == name) {
            variables.push(name.to_string());
        }
        rest = &after[end + 2..];
    }

    variables
}

const BASIC_SYSTEM: &str = r"You are a precise question answering assistant. Answer the user's question using only the document excerpt provided.

Requirements:
1. Base the answer strictly on the excerpt; never add information it does not contain
2. Keep the answer short and exact
3. End the answer with its source in the form [source, page]
4. If the excerpt does not contain the needed information, say so plainly";

const BASIC_USER: &str = r"Reference document:
{{citation}}
{{content}}

Question: {{question}}

Answer from the document above and cite the source at the end.";

const INTERMEDIATE_SYSTEM: &str = r"You are a question answering assistant. The passages below come from different parts of one document; combine them into a complete, well organised answer.

Requirements:
1. Integrate every relevant passage into one coherent answer
2. Keep the logic of the answer systematic and complete
3. Cite every passage you use in the form [source, page]
4. Include complementary details from different passages";

const INTERMEDIATE_USER: &str = r"Reference passages (same document):
{{passages}}

Question: {{question}}

Combine all passages above into a complete answer and cite the sources.";

const DECOMPOSE_SYSTEM: &str = r"You are a question analysis expert. Break the complex question into 2 to {{max}} simpler sub-questions.

Requirements:
1. Each sub-question must be self-contained and specific
2. Together the answers must cover the original question
3. For comparisons, write a separate sub-question for each compared item
4. Output only the sub-questions, one per line, each with a leading number";

const DECOMPOSE_USER: &str = r"Decompose this question into sub-questions:
{{question}}";

const SUB_ANSWER_SYSTEM: &str = "You are a question answering assistant. Answer briefly.";

const SUB_ANSWER_USER: &str = r"Documents:
{{documents}}

Question: {{question}}

Brief answer:";

const FINAL_SYSTEM: &str = r"You are a technical document analyst. Synthesize information spread over several documents.

Requirements:
1. Combine the sub-question answers with the document excerpts
2. Contrast the differences between documents
3. Answer clearly and point by point
4. Cite every source used in the form [source, page]";

const FINAL_USER: &str = r"Question: {{question}}

Sub-question analysis:
{{sub_answers}}

Reference documents:
{{documents}}

Give a combined answer and cite the sources.";

fn render(template: &str, values: &[(&str, String)]) -> String {
    let values: HashMap<&str, String> = values.iter().cloned().collect();
    PromptTemplate::new(template).render(&values)
}

/// Basic tier: answer strictly from one document
pub fn basic_answer(question: &str, document: &SearchResult) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(BASIC_SYSTEM),
        ChatMessage::user(render(
            BASIC_USER,
            &[
                ("citation", document.citation()),
                ("content", document.content.clone()),
                ("question", question.to_string()),
            ],
        )),
    ]
}

/// Intermediate tier: integrate every passage of one source, each cited
pub fn intermediate_answer(question: &str, documents: &[SearchResult]) -> Vec<ChatMessage> {
    let mut passages = String::new();
    for (i, doc) in documents.iter().enumerate() {
        passages.push_str(&format!(
            "\n\n--- Passage {} {} ---\n{}",
            i + 1,
            doc.citation(),
            doc.content
        ));
    }

    vec![
        ChatMessage::system(INTERMEDIATE_SYSTEM),
        ChatMessage::user(render(
            INTERMEDIATE_USER,
            &[("passages", passages), ("question", question.to_string())],
        )),
    ]
}

pub fn decomposition(question: &str, max_sub_questions: usize) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(render(
            DECOMPOSE_SYSTEM,
            &[("max", max_sub_questions.max(2).to_string())],
        )),
        ChatMessage::user(render(DECOMPOSE_USER, &[("question", question.to_string())])),
    ]
}

/// Brief answer to one sub-question from its first two hits
pub fn sub_answer(sub_question: &str, documents: &[SearchResult]) -> Vec<ChatMessage> {
    let mut context = String::new();
    for (i, doc) in documents.iter().take(SUB_ANSWER_DOCS).enumerate() {
        context.push_str(&format!(
            "\n[Document {}] {}\n{}...\n",
            i + 1,
            doc.citation(),
            truncate_chars(&doc.content, SUB_ANSWER_DOC_CHARS)
        ));
    }

    vec![
        ChatMessage::system(SUB_ANSWER_SYSTEM),
        ChatMessage::user(render(
            SUB_ANSWER_USER,
            &[("documents", context), ("question", sub_question.to_string())],
        )),
    ]
}

/// Final Advanced synthesis over sub-answers and pooled documents
pub fn final_synthesis(
    question: &str,
    sub_answers: &[SubAnswer],
    documents: &[SearchResult],
) -> Vec<ChatMessage> {
    let mut summary = String::new();
    for (i, sub) in sub_answers.iter().enumerate() {
        let sources = sub
            .sources
            .iter()
            .take(SUMMARY_SOURCES)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        summary.push_str(&format!(
            "\n{}. {}\n   {}\n   Sources: {}\n",
            i + 1,
            sub.question,
            truncate_str(&sub.answer, SUMMARY_ANSWER_CHARS),
            sources
        ));
    }

    let mut excerpts = String::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for doc in documents {
        if seen.len() >= FINAL_DOCS {
            break;
        }
        let excerpt = truncate_chars(&doc.content, FINAL_DOC_CHARS);
        if seen.insert(excerpt) {
            excerpts.push_str(&format!(
                "\n[Document {}] {}\n{}...\n",
                seen.len(),
                doc.citation(),
                excerpt
            ));
        }
    }

    vec![
        ChatMessage::system(FINAL_SYSTEM),
        ChatMessage::user(render(
            FINAL_USER,
            &[
                ("question", question.to_string()),
                ("sub_answers", summary),
                ("documents", excerpts),
            ],
        )),
    ]
}

fn enumeration_marker() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[\s\d.()（）\[\]、]+").expect("static enumeration pattern is valid")
    })
}

/// Clean a decomposition response into sub-questions.
///
/// Leading enumeration markers are stripped from each line, lines shorter
/// than six characters are dropped and at most `max` are kept. An unusable
/// response falls back to the original question.
pub fn parse_sub_questions(response: &str, original: &str, max: usize) -> Vec<String> {
    let mut questions: Vec<String> = response
        .lines()
        .map(|line| enumeration_marker().replace(line.trim(), "").trim().to_string())
        .filter(|line| line.chars().count() >= MIN_SUB_QUESTION_CHARS)
        .collect();
    questions.truncate(max.max(1));

    if questions.is_empty() {
        vec![original.to_string()]
    } else {
        questions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use crate::models::Metadata;
    use serde_json::json;

    fn hit(content: &str, source: &str, page: i64) -> SearchResult {
        let metadata: Metadata = json!({"source": source, "page": page})
            .as_object()
            .cloned()
            .unwrap();
        SearchResult {
            content: content.to_string(),
            metadata,
            distance: Some(0.1),
        }
    }

    #[test]
    fn test_template_variables_and_render() {
        let template = PromptTemplate::new("Q: {{question}} / {{ context }} / {{question}}");
        assert_eq!(template.variables(), ["question", "context"]);

        let values = HashMap::from([("question", "why".to_string())]);
        assert_eq!(template.render(&values), "Q: why / {{ context }} / why");
    }

    #[test]
    fn test_render_keeps_placeholders_inside_values() {
        let template = PromptTemplate::new("{{content}} | {{question}}");
        let values = HashMap::from([
            ("content", "uses {{question}} markers".to_string()),
            ("question", "asks about {{content}}".to_string()),
        ]);
        assert_eq!(
            template.render(&values),
            "uses {{question}} markers | asks about {{content}}"
        );
    }

    #[test]
    fn test_basic_prompt_keeps_document_text_verbatim() {
        let doc = hit("Template syntax uses {{question}} markers.", "t.txt", 1);
        let content = &basic_answer("What is X?", &doc)[1].content;
        assert!(content.contains("Template syntax uses {{question}} markers."));
        assert!(content.contains("Question: What is X?"));
    }

    #[test]
    fn test_final_prompt_keeps_question_verbatim() {
        let docs = vec![hit("passage body", "a.txt", 1)];
        let content = &final_synthesis("Compare {{documents}} and more", &[], &docs)[1].content;
        assert!(content.contains("Compare {{documents}} and more"));
        assert_eq!(content.matches("passage body").count(), 1);
    }

    #[test]
    fn test_parse_numbered_lines() {
        let parsed = parse_sub_questions("1. What is X?\n2. What is Y?\n", "orig", 4);
        assert_eq!(parsed, vec!["What is X?", "What is Y?"]);
    }

    #[test]
    fn test_parse_strips_mixed_markers_and_short_lines() {
        let response = "(1) Budget of line A?\n[2] 第二个子问题是什么？\n3、 ok\n4) What was the 2019 figure?";
        let parsed = parse_sub_questions(response, "orig", 4);
        assert_eq!(
            parsed,
            vec!["Budget of line A?", "第二个子问题是什么？", "What was the 2019 figure?"]
        );
    }

    #[test]
    fn test_parse_truncates_and_falls_back() {
        let response = "1. aaaaaa\n2. bbbbbb\n3. cccccc\n4. dddddd\n5. eeeeee";
        assert_eq!(parse_sub_questions(response, "orig", 4).len(), 4);
        assert_eq!(parse_sub_questions("1.\n2. no\n", "orig", 4), vec!["orig"]);
        assert_eq!(parse_sub_questions("", "orig", 4), vec!["orig"]);
    }

    #[test]
    fn test_basic_prompt_carries_citation() {
        let messages = basic_answer("What is the limit?", &hit("Speed limit is 80.", "rules.txt", 3));
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[1].content.contains("[rules.txt, 3]"));
        assert!(messages[1].content.contains("Speed limit is 80."));
        assert!(messages[1].content.contains("Question: What is the limit?"));
    }

    #[test]
    fn test_sub_answer_uses_two_truncated_docs() {
        let long = "x".repeat(500);
        let docs = vec![hit(&long, "a.txt", 1), hit("second", "b.txt", 2), hit("third", "c.txt", 3)];
        let content = &sub_answer("sub?", &docs)[1].content;
        assert!(content.contains(&format!("{}...", "x".repeat(400))));
        assert!(!content.contains(&"x".repeat(401)));
        assert!(content.contains("[b.txt, 2]"));
        assert!(!content.contains("third"));
    }

    #[test]
    fn test_final_prompt_limits_docs_and_dedupes_excerpts() {
        let shared = "y".repeat(350);
        let mut docs = vec![hit(&shared, "a.txt", 1), hit(&format!("{shared}tail"), "a.txt", 2)];
        for i in 0..6 {
            docs.push(hit(&format!("doc {i}"), "c.txt", i));
        }
        let subs = vec![SubAnswer {
            question: "Sub one?".to_string(),
            answer: "z".repeat(250),
            sources: vec!["[a.txt, 1]".into(), "[b.txt, 2]".into(), "[c.txt, 3]".into()],
        }];

        let content = &final_synthesis("Main?", &subs, &docs)[1].content;
        assert!(content.contains(&format!("{}...", "z".repeat(200))));
        assert!(content.contains("Sources: [a.txt, 1], [b.txt, 2]\n"));
        assert!(!content.contains("[a.txt, 2]"));
        assert!(content.contains("[Document 5]"));
        assert!(!content.contains("[Document 6]"));
        assert!(content.contains("doc 3"));
        assert!(!content.contains("doc 4"));
    }
}
