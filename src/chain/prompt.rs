//! Prompt templates with `{context}`, `{history}` and `{question}` slots

use std::fmt;
use thiserror::Error;

/// Template used when a persona names no prompt of its own
pub const BUILTIN_TEMPLATE: &str = "Answer the question using the following context along with your existing knowledge. If you don't know the answer, please say so.

Your response should:
- Reflect the tone of voice (casual, friendly) of the content writer.
- Incorporate specific phrases, idioms, or jargon that are characteristic of the content writer.
- Match the pacing and rhythm of the content writer, using short, punchy sentences.
- Use sentence structures and complexity that mirror the content writer's style.
- Convey the same emotional undertone (enthusiasm, skepticism, calmness, etc.) found in the context.
- Maintain the same point of view as the content writer, whether it's first person, third person, etc.
- Include cultural or contextual references that align with those found in the context.
- Incorporate humor or sarcasm if it matches the style of the content writer.

Context:
{context}

Question: {question}";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    #[error("Unknown placeholder '{{{0}}}' (allowed: context, history, question)")]
    UnknownPlaceholder(String),

    #[error("Template has no {{question}} placeholder")]
    MissingQuestion,

    #[error("Unmatched '{brace}' at byte {offset}; write '{brace}{brace}' for a literal brace")]
    UnmatchedBrace { brace: char, offset: usize },
}

pub type PromptResult<T> = Result<T, PromptError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Context,
    History,
    Question,
}

impl Slot {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "context" => Some(Self::Context),
            "history" => Some(Self::History),
            "question" => Some(Self::Question),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(Slot),
}

/// Values substituted into a template
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptVars<'a> {
    pub context: &'a str,
    pub history: &'a str,
    pub question: &'a str,
}

/// A validated prompt template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    pub fn parse(source: &str) -> PromptResult<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, '{')) | None => {
                                return Err(PromptError::UnmatchedBrace { brace: '{', offset })
                            }
                            Some((_, c)) => name.push(c),
                        }
                    }
                    let slot = Slot::parse(name.trim())
                        .ok_or_else(|| PromptError::UnknownPlaceholder(name.clone()))?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Slot(slot));
                }
                '}' => return Err(PromptError::UnmatchedBrace { brace: '}', offset }),
                c => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        let template = Self { segments };
        if !template.uses(Slot::Question) {
            return Err(PromptError::MissingQuestion);
        }
        Ok(template)
    }

    pub fn builtin() -> Self {
        Self::parse(BUILTIN_TEMPLATE).unwrap_or_else(|_| Self {
            segments: vec![Segment::Slot(Slot::Question)],
        })
    }

    pub fn uses(&self, slot: Slot) -> bool {
        self.segments.contains(&Segment::Slot(slot))
    }

    pub fn render(&self, vars: &PromptVars<'_>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(Slot::Context) => out.push_str(vars.context),
                Segment::Slot(Slot::History) => out.push_str(vars.history),
                Segment::Slot(Slot::Question) => out.push_str(vars.question),
            }
        }
        out
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Display for PromptTemplate {
    /// Writes the template back in source form
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => write!(f, "{}", text.replace('{', "{{").replace('}', "}}"))?,
                Segment::Slot(Slot::Context) => write!(f, "{{context}}")?,
                Segment::Slot(Slot::History) => write!(f, "{{history}}")?,
                Segment::Slot(Slot::Question) => write!(f, "{{question}}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_all_slots() {
        let template =
            PromptTemplate::parse("C: {context}\nH: {history}\nQ: {question}").unwrap();
        let rendered = template.render(&PromptVars {
            context: "ctx",
            history: "User: hi",
            question: "why?",
        });
        assert_eq!(rendered, "C: ctx\nH: User: hi\nQ: why?");
    }

    #[test]
    fn test_escaped_braces() {
        let template = PromptTemplate::parse("Reply as JSON {{\"a\": 1}} to {question}").unwrap();
        let rendered = template.render(&PromptVars {
            question: "me",
            ..PromptVars::default()
        });
        assert_eq!(rendered, "Reply as JSON {\"a\": 1} to me");
        assert_eq!(
            template.to_string(),
            "Reply as JSON {{\"a\": 1}} to {question}"
        );
    }

    #[test]
    fn test_unknown_placeholder() {
        let err = PromptTemplate::parse("{question} {input}").unwrap_err();
        assert_eq!(err, PromptError::UnknownPlaceholder("input".to_string()));
    }

    #[test]
    fn test_missing_question() {
        let err = PromptTemplate::parse("Context: {context}").unwrap_err();
        assert_eq!(err, PromptError::MissingQuestion);
    }

    #[test]
    fn test_unmatched_braces() {
        assert_eq!(
            PromptTemplate::parse("{question").unwrap_err(),
            PromptError::UnmatchedBrace {
                brace: '{',
                offset: 0
            }
        );
        assert_eq!(
            PromptTemplate::parse("{question} }").unwrap_err(),
            PromptError::UnmatchedBrace {
                brace: '}',
                offset: 11
            }
        );
    }

    #[test]
    fn test_builtin_template() {
        let template = PromptTemplate::builtin();
        assert!(template.uses(Slot::Context));
        assert!(template.uses(Slot::Question));
        assert!(!template.uses(Slot::History));

        let rendered = template.render(&PromptVars {
            context: "Tablets dissolve slowly.",
            history: "",
            question: "How fast do tablets dissolve?",
        });
        assert!(rendered.starts_with("Answer the question using the following context"));
        assert!(rendered.contains("Context:\nTablets dissolve slowly.\n\nQuestion: How fast"));
    }

    #[test]
    fn test_values_are_not_reinterpreted() {
        let template = PromptTemplate::parse("{question}").unwrap();
        let rendered = template.render(&PromptVars {
            question: "what is {context}?",
            ..PromptVars::default()
        });
        assert_eq!(rendered, "what is {context}?");
    }
}
